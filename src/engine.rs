use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::debug;

use crate::assembler::{RegressionSystem, assemble};
use crate::config::RatingConfig;
use crate::error::Result;
use crate::event::EventData;
use crate::fixed_form::{component_system, opr_system};
use crate::flatten::flatten_match;
use crate::pattern::{self, BLUE_SCORE, Pattern, RED_SCORE};
use crate::solver::{Factorization, SolveMethod, Solution, solve_least_squares, solve_square};
use crate::team_index::TeamIndex;

/// Ratings from a pattern, keyed by `team + suffix` (`frc254_OPR`).
#[derive(Debug, Clone, PartialEq)]
pub struct PatternRatings {
    pub ratings: HashMap<String, f64>,
    pub method: SolveMethod,
    pub rows: usize,
    pub matches_used: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRatings {
    pub components: BTreeMap<String, Vec<f64>>,
    pub method: SolveMethod,
}

/// Stateless rating computations over one event's data.
///
/// The team index is built once here and reused by every call; build a new
/// engine if the team list changes.
#[derive(Debug, Clone)]
pub struct RatingEngine<'a> {
    event: &'a EventData,
    index: TeamIndex,
    config: RatingConfig,
}

impl<'a> RatingEngine<'a> {
    pub fn new(event: &'a EventData) -> Self {
        Self::with_config(event, RatingConfig::default())
    }

    pub fn with_config(event: &'a EventData, config: RatingConfig) -> Self {
        Self {
            event,
            index: TeamIndex::from_keys(event.team_keys().iter().cloned()),
            config,
        }
    }

    pub fn event(&self) -> &EventData {
        self.event
    }

    pub fn team_index(&self) -> &TeamIndex {
        &self.index
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    pub fn rating_patterns() -> BTreeMap<&'static str, &'static str> {
        pattern::rating_patterns()
    }

    /// Assemble without solving; useful for inspecting a pattern's system.
    pub fn pattern_system(
        &self,
        pattern: &str,
        match_ceiling: Option<u32>,
    ) -> Result<RegressionSystem> {
        let pattern = Pattern::parse(pattern)?;
        let ceiling = match_ceiling.or(self.config.match_ceiling);
        assemble(&pattern, self.event, &self.index, ceiling)
    }

    pub fn solve_pattern(
        &self,
        pattern: &str,
        match_ceiling: Option<u32>,
    ) -> Result<HashMap<String, f64>> {
        Ok(self.solve_pattern_detailed(pattern, match_ceiling)?.ratings)
    }

    pub fn solve_pattern_detailed(
        &self,
        pattern: &str,
        match_ceiling: Option<u32>,
    ) -> Result<PatternRatings> {
        if self.index.is_empty() {
            // Still reject a broken pattern.
            Pattern::parse(pattern)?;
            return Ok(PatternRatings {
                ratings: HashMap::new(),
                method: SolveMethod::LeastSquares,
                rows: 0,
                matches_used: 0,
            });
        }
        let system = self.pattern_system(pattern, match_ceiling)?;
        let rows = system.a.nrows();
        if rows == 0 || system.a.ncols() == 0 {
            return Ok(PatternRatings {
                ratings: HashMap::new(),
                method: SolveMethod::LeastSquares,
                rows,
                matches_used: system.matches_used,
            });
        }

        let Solution { values, method } =
            solve_least_squares(&system.a, &system.b, &self.config.solver)?;
        let suffix_count = system.suffixes.len();
        let mut ratings = HashMap::with_capacity(values.len());
        for (team_pos, team) in self.index.keys().iter().enumerate() {
            for (suffix_pos, suffix) in system.suffixes.iter().enumerate() {
                let col = RegressionSystem::column(team_pos, suffix_pos, suffix_count);
                ratings.insert(format!("{team}{suffix}"), values[col]);
            }
        }
        debug!(
            "pattern solved: {} ratings from {} rows over {} matches",
            ratings.len(),
            rows,
            system.matches_used
        );
        Ok(PatternRatings {
            ratings,
            method,
            rows,
            matches_used: system.matches_used,
        })
    }

    /// OPR by direct solve of the normal equations, falling back to least squares.
    /// Uses the configured match ceiling, like `solve_pattern` with `None`.
    pub fn opr_solution(&self) -> Result<Solution> {
        let empty = Solution {
            values: Vec::new(),
            method: SolveMethod::Direct,
        };
        if self.index.is_empty() {
            return Ok(empty);
        }
        let system = opr_system(self.event, &self.index, self.config.match_ceiling)?;
        if system.matches_used == 0 {
            return Ok(empty);
        }
        solve_square(&system.a, &system.b, &self.config.solver)
    }

    /// Indexed by `team_index()`. Empty when no qualification match has been played.
    pub fn array_oprs(&self) -> Result<Vec<f64>> {
        Ok(self.opr_solution()?.values)
    }

    pub fn dict_oprs(&self) -> Result<HashMap<String, f64>> {
        let values = self.array_oprs()?;
        if values.is_empty() {
            return Ok(HashMap::new());
        }
        self.index.to_map(&values)
    }

    pub fn component_solution(&self) -> Result<ComponentRatings> {
        let empty = ComponentRatings {
            components: BTreeMap::new(),
            method: SolveMethod::Cholesky,
        };
        if self.index.is_empty() {
            return Ok(empty);
        }
        let system = component_system(self.event, &self.index, self.config.match_ceiling)?;
        if system.matches_used == 0 || system.components.is_empty() {
            return Ok(empty);
        }
        let factor = Factorization::new(&system.a, &self.config.solver)?;
        let mut components = BTreeMap::new();
        for (name, rhs) in &system.components {
            components.insert(name.clone(), factor.solve(rhs)?);
        }
        Ok(ComponentRatings {
            components,
            method: factor.method(),
        })
    }

    /// Component name -> ratings indexed by `team_index()`.
    pub fn component_oprs(&self) -> Result<BTreeMap<String, Vec<f64>>> {
        Ok(self.component_solution()?.components)
    }

    pub fn component_oprs_by_team(&self) -> Result<BTreeMap<String, HashMap<String, f64>>> {
        let mut out = BTreeMap::new();
        for (name, values) in self.component_oprs()? {
            out.insert(name, self.index.to_map(&values)?);
        }
        Ok(out)
    }

    /// Names usable as constants on a pattern's right-hand side, taken from one match.
    pub fn valid_pattern_fields(&self, sample_match_key: &str) -> Result<BTreeSet<String>> {
        let m = self.event.match_info(sample_match_key)?;
        let mut fields: BTreeSet<String> = flatten_match(m).into_keys().collect();
        fields.insert(BLUE_SCORE.to_string());
        fields.insert(RED_SCORE.to_string());
        Ok(fields)
    }
}
