use serde_json::Map;

use alliance_ratings::config::RatingConfig;
use alliance_ratings::event::{Alliance, Alliances, EventData, Match};
use alliance_ratings::pattern::{Pattern, discover_suffixes};
use alliance_ratings::solver::SolveMethod;
use alliance_ratings::synthetic::{SyntheticConfig, SyntheticEvent, generate};
use alliance_ratings::{RatingEngine, RatingError};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0)
}

fn qual(number: u32, blue: [&str; 3], bs: i64, red: [&str; 3], rs: i64) -> Match {
    let alliance = |teams: [&str; 3], score: i64| Alliance {
        score,
        team_keys: teams.iter().map(|t| t.to_string()).collect(),
        extra: Map::new(),
    };
    Match {
        key: format!("qm{number}"),
        comp_level: "qm".to_string(),
        match_number: number,
        set_number: Some(1),
        alliances: Alliances {
            red: alliance(red, rs),
            blue: alliance(blue, bs),
        },
        score_breakdown: None,
        extra: Map::new(),
    }
}

fn six_teams() -> Vec<String> {
    ["a", "b", "c", "d", "e", "f"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}

fn full_event() -> SyntheticEvent {
    generate(SyntheticConfig {
        teams: 24,
        rounds: 10,
        ..SyntheticConfig::default()
    })
}

#[test]
fn noiseless_oprs_recover_contributions() {
    let synthetic = full_event();
    let engine = RatingEngine::new(&synthetic.event);
    let solution = engine.opr_solution().unwrap();
    assert_eq!(solution.method, SolveMethod::Direct);

    let oprs = engine.dict_oprs().unwrap();
    assert_eq!(oprs.len(), 24);
    for (team, expected) in &synthetic.contributions {
        assert!(close(oprs[team], *expected), "{team}: {} vs {expected}", oprs[team]);
    }
}

#[test]
fn dict_oprs_follow_team_index() {
    let synthetic = generate(SyntheticConfig {
        noise: 6.0,
        ..SyntheticConfig::default()
    });
    let engine = RatingEngine::new(&synthetic.event);
    let array = engine.array_oprs().unwrap();
    let dict = engine.dict_oprs().unwrap();
    assert_eq!(array.len(), dict.len());
    for (pos, team) in engine.team_index().keys().iter().enumerate() {
        assert_eq!(dict[team], array[pos]);
    }
}

#[test]
fn opr_preset_agrees_with_fixed_form() {
    let synthetic = generate(SyntheticConfig {
        noise: 10.0,
        ..SyntheticConfig::default()
    });
    let engine = RatingEngine::new(&synthetic.event);
    let fixed = engine.dict_oprs().unwrap();
    let presets = RatingEngine::rating_patterns();
    let generic = engine.solve_pattern(presets["OPR"], None).unwrap();
    assert_eq!(generic.len(), fixed.len());
    for (team, value) in &fixed {
        let key = format!("{team}_OPR");
        assert!(close(generic[&key], *value), "{key}");
    }
}

#[test]
fn total_points_component_matches_opr() {
    let synthetic = full_event();
    let engine = RatingEngine::new(&synthetic.event);
    let solution = engine.component_solution().unwrap();
    assert_eq!(solution.method, SolveMethod::Cholesky);
    assert!(solution.components.contains_key("autoPoints"));
    assert!(solution.components.contains_key("teleopPoints"));
    assert!(!solution.components.contains_key("robotStatus"));

    let oprs = engine.array_oprs().unwrap();
    let totals = &solution.components["totalPoints"];
    for (opr, total) in oprs.iter().zip(totals) {
        assert!(close(*opr, *total));
    }
}

#[test]
fn single_match_falls_back_to_least_squares() {
    let event = EventData::new(
        "t",
        vec![qual(1, ["a", "b", "c"], 30, ["d", "e", "f"], 21)],
        six_teams(),
    );
    let engine = RatingEngine::new(&event);
    let solution = engine.opr_solution().unwrap();
    assert_eq!(solution.method, SolveMethod::LeastSquares);
    let oprs = engine.dict_oprs().unwrap();
    for team in ["a", "b", "c"] {
        assert!(close(oprs[team], 10.0));
    }
    for team in ["d", "e", "f"] {
        assert!(close(oprs[team], 7.0));
    }

    let generic = engine
        .solve_pattern("B1 + B2 + B3 = BS; R1 + R2 + R3 = RS", None)
        .unwrap();
    assert!(close(generic["a"], 10.0));
    assert!(close(generic["f"], 7.0));
}

#[test]
fn preset_shapes() {
    let synthetic = full_event();
    let engine = RatingEngine::new(&synthetic.event);
    let presets = RatingEngine::rating_patterns();
    assert_eq!(
        presets.keys().copied().collect::<Vec<_>>(),
        vec!["DPR", "EPR", "GPR", "OPR"]
    );

    let dpr = engine.solve_pattern_detailed(presets["DPR"], None).unwrap();
    assert_eq!(dpr.ratings.len(), 48);
    assert_eq!(dpr.rows, 80);
    assert!(dpr.ratings.contains_key("frc100_OPR"));
    assert!(dpr.ratings.contains_key("frc100_DPR"));

    let gpr = engine.solve_pattern_detailed(presets["GPR"], None).unwrap();
    assert_eq!(gpr.rows, 40);
    assert_eq!(gpr.ratings.len(), 24);

    let epr = engine.solve_pattern_detailed(presets["EPR"], None).unwrap();
    assert_eq!(epr.rows, 120);
    assert!(epr.ratings.contains_key("frc123_EPR"));
}

#[test]
fn suffixes_are_discovered_from_unknowns() {
    let suffixes = discover_suffixes("B1_O + B2_O + B3_O - R1_D - R2_D - R3_D = BS").unwrap();
    assert_eq!(
        suffixes.into_iter().collect::<Vec<_>>(),
        vec!["_D".to_string(), "_O".to_string()]
    );
    let pattern = Pattern::parse("B1 + B2 + B3 = BS").unwrap();
    assert_eq!(pattern.suffixes(), &[String::new()]);
}

#[test]
fn bilinear_pattern_is_rejected_before_solving() {
    let synthetic = full_event();
    let engine = RatingEngine::new(&synthetic.event);
    let err = engine.solve_pattern("B1 * B2 = BS", None).unwrap_err();
    assert!(matches!(err, RatingError::BilinearTerm { .. }), "{err}");
    let err = engine.solve_pattern("BS / R1 = 2", None).unwrap_err();
    assert!(matches!(err, RatingError::BilinearTerm { .. }), "{err}");
}

#[test]
fn malformed_pattern_reports_syntax_error() {
    let synthetic = full_event();
    let engine = RatingEngine::new(&synthetic.event);
    let err = engine.solve_pattern("B1 + = BS", None).unwrap_err();
    assert!(matches!(err, RatingError::PatternSyntax { .. }), "{err}");
}

#[test]
fn solving_twice_gives_identical_ratings() {
    let synthetic = generate(SyntheticConfig {
        noise: 5.0,
        ..SyntheticConfig::default()
    });
    let engine = RatingEngine::new(&synthetic.event);
    let dpr = RatingEngine::rating_patterns()["DPR"];
    let first = engine.solve_pattern(dpr, None).unwrap();
    let second = engine.solve_pattern(dpr, None).unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.array_oprs().unwrap(), engine.array_oprs().unwrap());
}

#[test]
fn match_ceiling_limits_rows() {
    let synthetic = full_event();
    let engine = RatingEngine::new(&synthetic.event);
    let opr = RatingEngine::rating_patterns()["OPR"];
    let limited = engine.solve_pattern_detailed(opr, Some(5)).unwrap();
    assert_eq!(limited.matches_used, 4);
    assert_eq!(limited.rows, 8);

    let all = engine.solve_pattern_detailed(opr, None).unwrap();
    assert_eq!(all.matches_used, 40);
}

#[test]
fn unplayed_matches_are_ignored() {
    let synthetic = generate(SyntheticConfig {
        teams: 24,
        rounds: 12,
        unplayed: 8,
        ..SyntheticConfig::default()
    });
    let engine = RatingEngine::new(&synthetic.event);
    let detailed = engine
        .solve_pattern_detailed(RatingEngine::rating_patterns()["OPR"], None)
        .unwrap();
    assert_eq!(detailed.matches_used, 40);
    for (team, expected) in &synthetic.contributions {
        assert!(close(detailed.ratings[&format!("{team}_OPR")], *expected));
    }
}

#[test]
fn empty_event_gives_empty_results() {
    let event = EventData::default();
    let engine = RatingEngine::new(&event);
    assert!(engine.array_oprs().unwrap().is_empty());
    assert!(engine.dict_oprs().unwrap().is_empty());
    assert!(engine.component_oprs().unwrap().is_empty());
    assert!(
        engine
            .solve_pattern(RatingEngine::rating_patterns()["OPR"], None)
            .unwrap()
            .is_empty()
    );
}

#[test]
fn no_played_matches_gives_empty_results() {
    let event = EventData::new(
        "t",
        vec![qual(1, ["a", "b", "c"], -1, ["d", "e", "f"], -1)],
        six_teams(),
    );
    let engine = RatingEngine::new(&event);
    assert!(engine.array_oprs().unwrap().is_empty());
    assert!(engine.component_oprs_by_team().unwrap().is_empty());
    assert!(engine.solve_pattern("B1 = BS", None).unwrap().is_empty());
}

#[test]
fn team_outside_team_list_is_an_error() {
    let event = EventData::new(
        "t",
        vec![qual(1, ["a", "b", "c"], 30, ["d", "e", "zz"], 21)],
        six_teams(),
    );
    let engine = RatingEngine::new(&event);
    assert_eq!(
        engine.array_oprs().unwrap_err(),
        RatingError::UnknownTeam {
            team: "zz".to_string(),
            match_key: "qm1".to_string(),
        }
    );
    assert!(matches!(
        engine.solve_pattern("R3 = RS", None),
        Err(RatingError::UnknownTeam { .. })
    ));
}

#[test]
fn short_alliance_is_an_error() {
    let mut m = qual(1, ["a", "b", "c"], 30, ["d", "e", "f"], 21);
    m.alliances.red.team_keys.pop();
    let event = EventData::new("t", vec![m], six_teams());
    let engine = RatingEngine::new(&event);
    assert!(matches!(
        engine.array_oprs(),
        Err(RatingError::MalformedAlliance { count: 2, .. })
    ));
}

#[test]
fn configured_ceiling_applies_to_every_path() {
    let synthetic = generate(SyntheticConfig {
        noise: 10.0,
        ..SyntheticConfig::default()
    });
    let config = RatingConfig {
        match_ceiling: Some(20),
        ..RatingConfig::default()
    };
    let engine = RatingEngine::with_config(&synthetic.event, config);
    let fixed = engine.dict_oprs().unwrap();
    let opr = RatingEngine::rating_patterns()["OPR"];
    let detailed = engine.solve_pattern_detailed(opr, None).unwrap();
    assert_eq!(detailed.matches_used, 19);
    for (team, value) in &fixed {
        let key = format!("{team}_OPR");
        assert!(close(detailed.ratings[&key], *value), "{key}");
    }

    let unlimited = RatingEngine::new(&synthetic.event).dict_oprs().unwrap();
    assert!(fixed.iter().any(|(team, v)| !close(unlimited[team], *v)));

    let totals = &engine.component_oprs_by_team().unwrap()["totalPoints"];
    for (team, value) in &fixed {
        assert!(close(totals[team], *value), "{team}");
    }
}

#[test]
fn empty_team_list_with_played_matches_gives_empty_results() {
    let synthetic = generate(SyntheticConfig {
        teams: 6,
        rounds: 2,
        ..SyntheticConfig::default()
    });
    let event = EventData::new("t", synthetic.event.matches.into_values().collect(), Vec::new());
    let engine = RatingEngine::new(&event);
    assert!(engine.array_oprs().unwrap().is_empty());
    assert!(engine.dict_oprs().unwrap().is_empty());
    assert!(engine.component_oprs().unwrap().is_empty());
    let opr = RatingEngine::rating_patterns()["OPR"];
    assert!(engine.solve_pattern(opr, None).unwrap().is_empty());
    assert!(matches!(
        engine.solve_pattern("B1 * B2 = BS", None),
        Err(RatingError::BilinearTerm { .. })
    ));
}
