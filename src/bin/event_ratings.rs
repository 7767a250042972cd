use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use log::warn;

use alliance_ratings::config::RatingConfig;
use alliance_ratings::event::EventData;
use alliance_ratings::persist::{self, RatingSnapshot};
use alliance_ratings::synthetic::{self, SyntheticConfig};
use alliance_ratings::{RatingEngine, pattern};

fn main() -> Result<()> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let log_level = if has_flag(&args, "--verbose") { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = RatingConfig::from_env();
    let event = load_event(&args)?;
    let engine = RatingEngine::with_config(&event, config);

    println!("Event: {}", event.event_key);
    println!(
        "Teams: {}  qualification matches: {}  rated: {}",
        event.team_keys().len(),
        event.qual_match_count(),
        event.rated_matches(engine.config().match_ceiling).len()
    );

    if let Some(sample) = arg_value(&args, "--fields") {
        for field in engine.valid_pattern_fields(&sample)? {
            println!("{field}");
        }
        return Ok(());
    }

    let solution = engine.opr_solution()?;
    if solution.method.is_degraded() {
        warn!("OPR system was singular; reporting the least-squares fit");
    }
    let oprs = if solution.values.is_empty() {
        HashMap::new()
    } else {
        engine.team_index().to_map(&solution.values)?
    };
    print_ratings("OPR", &oprs);

    if has_flag(&args, "--components") {
        for (name, ratings) in engine.component_oprs_by_team()? {
            print_ratings(&name, &ratings);
        }
    }

    let ceiling = arg_value(&args, "--ceiling").and_then(|raw| raw.trim().parse::<u32>().ok());
    let mut snapshots = vec![RatingSnapshot::new(&event.event_key, "OPR", oprs)];
    if let Some(requested) = arg_value(&args, "--pattern") {
        let presets = pattern::rating_patterns();
        let (label, source) = match presets.get(requested.as_str()) {
            Some(source) => (requested.clone(), source.to_string()),
            None => ("pattern".to_string(), requested.clone()),
        };
        let detailed = engine
            .solve_pattern_detailed(&source, ceiling)
            .with_context(|| format!("solve pattern {source}"))?;
        println!(
            "{label}: {} rows over {} matches ({:?})",
            detailed.rows, detailed.matches_used, detailed.method
        );
        print_ratings(&label, &detailed.ratings);
        snapshots.push(RatingSnapshot::new(&event.event_key, &label, detailed.ratings));
    }

    if has_flag(&args, "--save") {
        let dir = arg_value(&args, "--out")
            .map(PathBuf::from)
            .or_else(persist::default_snapshot_dir)
            .context("unable to resolve snapshot directory")?;
        for snapshot in &snapshots {
            persist::save_snapshot(&dir, snapshot)?;
        }
    }

    Ok(())
}

fn load_event(args: &[String]) -> Result<EventData> {
    match (arg_value(args, "--dir"), arg_value(args, "--event")) {
        (Some(dir), Some(event_key)) => EventData::load_dir(&PathBuf::from(dir), &event_key),
        (Some(_), None) => Err(anyhow!("--dir needs --event <key>")),
        _ => {
            let defaults = SyntheticConfig::default();
            let cfg = SyntheticConfig {
                teams: parse_or(args, "--teams", defaults.teams),
                rounds: parse_or(args, "--rounds", defaults.rounds),
                noise: parse_or(args, "--noise", defaults.noise),
                unplayed: parse_or(args, "--unplayed", defaults.unplayed),
                seed: parse_or(args, "--seed", defaults.seed),
            };
            Ok(synthetic::generate(cfg).event)
        }
    }
}

fn print_ratings(label: &str, ratings: &HashMap<String, f64>) {
    let mut rows = ratings.iter().collect::<Vec<_>>();
    rows.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
    println!("{label}:");
    for (team, value) in rows {
        println!("  {team:<16} {value:>9.3}");
    }
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|arg| arg == name)
}

fn parse_or<T: std::str::FromStr>(args: &[String], name: &str, default: T) -> T {
    arg_value(args, name)
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn arg_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(prefix.as_str()) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.clone());
        }
    }
    None
}
