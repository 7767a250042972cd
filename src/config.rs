use std::env;
use std::path::PathBuf;

/// Numerical knobs for the solvers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// A direct or Cholesky factorisation whose smallest pivot is below
    /// `pivot_tolerance * largest pivot` is treated as singular.
    pub pivot_tolerance: f64,
    /// Relative singular-value cutoff for the pseudo-inverse. `None` uses
    /// `max(rows, cols) * f64::EPSILON`.
    pub pinv_rcond: Option<f64>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            pivot_tolerance: 1e-10,
            pinv_rcond: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingConfig {
    /// Only qualification matches numbered below this take part.
    pub match_ceiling: Option<u32>,
    pub solver: SolverSettings,
}

impl RatingConfig {
    /// Defaults overridden by `RATINGS_*` variables, after loading `.env.local` and `.env`.
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unparsable or out-of-range values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = SolverSettings::default();
        let match_ceiling = lookup("RATINGS_MATCH_CEILING")
            .and_then(|val| val.trim().parse::<u32>().ok());
        let pivot_tolerance = lookup("RATINGS_PIVOT_TOLERANCE")
            .and_then(|val| val.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(defaults.pivot_tolerance);
        let pinv_rcond = lookup("RATINGS_PINV_RCOND")
            .and_then(|val| val.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0);

        Self {
            match_ceiling,
            solver: SolverSettings {
                pivot_tolerance,
                pinv_rcond,
            },
        }
    }
}

/// Where rating snapshots live: `RATINGS_CACHE_DIR`, else the XDG cache dir.
pub fn cache_dir() -> Option<PathBuf> {
    cache_dir_from(|key| env::var(key).ok())
}

pub fn cache_dir_from(lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    if let Some(dir) = non_empty("RATINGS_CACHE_DIR") {
        return Some(PathBuf::from(dir.trim()));
    }
    if let Some(base) = non_empty("XDG_CACHE_HOME") {
        return Some(PathBuf::from(base).join("alliance_ratings"));
    }
    let home = non_empty("HOME")?;
    Some(PathBuf::from(home).join(".cache").join("alliance_ratings"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn no_variables_gives_defaults() {
        assert_eq!(RatingConfig::from_lookup(vars(&[])), RatingConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let cfg = RatingConfig::from_lookup(vars(&[
            ("RATINGS_MATCH_CEILING", " 40 "),
            ("RATINGS_PIVOT_TOLERANCE", "1e-8"),
            ("RATINGS_PINV_RCOND", "0"),
        ]));
        assert_eq!(cfg.match_ceiling, Some(40));
        assert_eq!(cfg.solver.pivot_tolerance, 1e-8);
        assert_eq!(cfg.solver.pinv_rcond, Some(0.0));
    }

    #[test]
    fn bad_values_fall_back() {
        let cfg = RatingConfig::from_lookup(vars(&[
            ("RATINGS_MATCH_CEILING", "-3"),
            ("RATINGS_PIVOT_TOLERANCE", "0"),
            ("RATINGS_PINV_RCOND", "NaN"),
        ]));
        assert_eq!(cfg, RatingConfig::default());
        let cfg = RatingConfig::from_lookup(vars(&[("RATINGS_PIVOT_TOLERANCE", "abc")]));
        assert_eq!(cfg.solver.pivot_tolerance, 1e-10);
    }

    #[test]
    fn cache_dir_resolution_order() {
        let all = [
            ("RATINGS_CACHE_DIR", "/tmp/ratings"),
            ("XDG_CACHE_HOME", "/xdg"),
            ("HOME", "/home/u"),
        ];
        assert_eq!(cache_dir_from(vars(&all)), Some(PathBuf::from("/tmp/ratings")));
        assert_eq!(
            cache_dir_from(vars(&[("RATINGS_CACHE_DIR", "  "), ("XDG_CACHE_HOME", "/xdg"), ("HOME", "/home/u")])),
            Some(PathBuf::from("/xdg/alliance_ratings"))
        );
        assert_eq!(
            cache_dir_from(vars(&[("HOME", "/home/u")])),
            Some(PathBuf::from("/home/u/.cache/alliance_ratings"))
        );
        assert_eq!(cache_dir_from(vars(&[])), None);
    }
}
