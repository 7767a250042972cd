use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value, json};

use crate::event::{Alliance, Alliances, EventData, Match, UNPLAYED_SCORE};

/// Shape of a generated event.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticConfig {
    pub teams: usize,
    pub rounds: usize,
    /// Uniform +/- noise added to each alliance's score.
    pub noise: f64,
    /// Extra qualification matches scheduled but not played yet.
    pub unplayed: usize,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            teams: 24,
            rounds: 10,
            noise: 0.0,
            unplayed: 0,
            seed: 7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticEvent {
    pub event: EventData,
    /// The per-match contribution each team was generated with.
    pub contributions: HashMap<String, f64>,
}

/// Random 3v3 qualification schedule where alliance scores are the sum of
/// fixed team contributions, split into `autoPoints` (30%) and
/// `teleopPoints` (70%), with a non-numeric `robotStatus` field alongside.
pub fn generate(cfg: SyntheticConfig) -> SyntheticEvent {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let teams: Vec<String> = (0..cfg.teams).map(|i| format!("frc{}", 100 + i)).collect();
    let contributions: HashMap<String, f64> = teams
        .iter()
        .map(|t| (t.clone(), rng.gen_range(5.0..40.0_f64).round()))
        .collect();

    let scheduled = cfg.rounds * (cfg.teams / 6);
    let played = scheduled.saturating_sub(cfg.unplayed);
    let mut matches = Vec::new();
    let mut number = 1u32;
    for _ in 0..cfg.rounds {
        let mut order = teams.clone();
        order.shuffle(&mut rng);
        for group in order.chunks_exact(6) {
            let mut m = build_match(number, group, &contributions, cfg.noise, &mut rng);
            if number as usize > played {
                m.alliances.red.score = UNPLAYED_SCORE;
                m.alliances.blue.score = UNPLAYED_SCORE;
                m.score_breakdown = None;
            }
            matches.push(m);
            number += 1;
        }
    }

    SyntheticEvent {
        event: EventData::new("synthetic", matches, teams),
        contributions,
    }
}

fn build_match(
    number: u32,
    group: &[String],
    contributions: &HashMap<String, f64>,
    noise: f64,
    rng: &mut StdRng,
) -> Match {
    let (blue, red) = group.split_at(3);
    let mut alliance = |teams: &[String]| {
        let base: f64 = teams.iter().map(|t| contributions[t]).sum();
        let jitter = if noise > 0.0 {
            rng.gen_range(-noise..=noise)
        } else {
            0.0
        };
        let total = (base + jitter).round().max(0.0);
        let auto = (base * 0.3).round();
        let status = if rng.gen_bool(0.5) { "Parked" } else { "None" };
        let breakdown = json!({
            "autoPoints": auto,
            "teleopPoints": total - auto,
            "totalPoints": total,
            "robotStatus": status,
        });
        (
            Alliance {
                score: total as i64,
                team_keys: teams.to_vec(),
                extra: Map::new(),
            },
            breakdown,
        )
    };
    let (blue_alliance, blue_breakdown) = alliance(blue);
    let (red_alliance, red_breakdown) = alliance(red);

    let mut extra = Map::new();
    extra.insert("event_key".into(), Value::String("synthetic".into()));
    Match {
        key: format!("synthetic_qm{number}"),
        comp_level: "qm".into(),
        match_number: number,
        set_number: Some(1),
        alliances: Alliances {
            red: red_alliance,
            blue: blue_alliance,
        },
        score_breakdown: Some(json!({"blue": blue_breakdown, "red": red_breakdown})),
        extra,
    }
}
