//! Normal equations for the default "alliance score = sum of its three
//! teams' contributions" model, built directly without the pattern machinery.

use std::collections::BTreeMap;

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::error::Result;
use crate::event::{AllianceColor, EventData, Match};
use crate::flatten::value_as_f64;
use crate::team_index::TeamIndex;

const COLORS: [AllianceColor; 2] = [AllianceColor::Red, AllianceColor::Blue];

/// `a` counts how often each ordered pair of teams shared an alliance
/// (diagonal = matches played); `b` sums each team's alliance scores.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalEquations {
    pub a: DMatrix<f64>,
    pub b: DVector<f64>,
    pub matches_used: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentEquations {
    pub a: DMatrix<f64>,
    /// One right-hand side per numeric breakdown field.
    pub components: BTreeMap<String, DVector<f64>>,
    pub matches_used: usize,
}

fn alliance_indices(m: &Match, color: AllianceColor, index: &TeamIndex) -> Result<[usize; 3]> {
    let teams = m.teams(color)?;
    Ok([
        index.index_of(teams[0], &m.key)?,
        index.index_of(teams[1], &m.key)?,
        index.index_of(teams[2], &m.key)?,
    ])
}

fn add_pairs(a: &mut DMatrix<f64>, teams: &[usize; 3]) {
    for &i in teams {
        for &j in teams {
            a[(i, j)] += 1.0;
        }
    }
}

pub fn opr_system(
    event: &EventData,
    index: &TeamIndex,
    match_ceiling: Option<u32>,
) -> Result<NormalEquations> {
    let n = index.len();
    let mut a = DMatrix::zeros(n, n);
    let mut b = DVector::zeros(n);
    let matches = event.rated_matches(match_ceiling);

    for m in &matches {
        for color in COLORS {
            let teams = alliance_indices(m, color, index)?;
            add_pairs(&mut a, &teams);
            let score = m.score(color) as f64;
            for &i in &teams {
                b[i] += score;
            }
        }
    }

    Ok(NormalEquations {
        a,
        b,
        matches_used: matches.len(),
    })
}

/// Numeric fields of the red breakdown of the first rated match that has one.
pub fn discover_components(matches: &[&Match]) -> Vec<String> {
    let Some(breakdown) = matches
        .iter()
        .find_map(|m| m.breakdown(AllianceColor::Red))
    else {
        return Vec::new();
    };
    breakdown
        .iter()
        .filter(|(_, v)| value_as_f64(v).is_some())
        .map(|(k, _)| k.clone())
        .collect()
}

pub fn component_system(
    event: &EventData,
    index: &TeamIndex,
    match_ceiling: Option<u32>,
) -> Result<ComponentEquations> {
    let n = index.len();
    let mut a = DMatrix::zeros(n, n);
    let matches = event.rated_matches(match_ceiling);
    let names = discover_components(&matches);
    let mut components: BTreeMap<String, DVector<f64>> = names
        .iter()
        .map(|name| (name.clone(), DVector::zeros(n)))
        .collect();
    debug!("component fields: {names:?}");

    for m in &matches {
        for color in COLORS {
            let teams = alliance_indices(m, color, index)?;
            add_pairs(&mut a, &teams);
            let breakdown = m.breakdown(color);
            for (name, rhs) in components.iter_mut() {
                let value = breakdown
                    .and_then(|bd| bd.get(name))
                    .and_then(value_as_f64);
                let Some(value) = value else {
                    debug!("match {} {} has no numeric {name}", m.key, color.label());
                    continue;
                };
                for &i in &teams {
                    rhs[i] += value;
                }
            }
        }
    }

    Ok(ComponentEquations {
        a,
        components,
        matches_used: matches.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Alliance, Alliances};
    use serde_json::{Map, Value, json};

    fn mk_match(number: u32, blue: [&str; 3], bs: i64, red: [&str; 3], rs: i64, breakdown: Option<Value>) -> Match {
        let alliance = |teams: [&str; 3], score: i64| Alliance {
            score,
            team_keys: teams.iter().map(|t| t.to_string()).collect(),
            extra: Map::new(),
        };
        Match {
            key: format!("qm{number}"),
            comp_level: "qm".into(),
            match_number: number,
            set_number: Some(1),
            alliances: Alliances {
                red: alliance(red, rs),
                blue: alliance(blue, bs),
            },
            score_breakdown: breakdown,
            extra: Map::new(),
        }
    }

    fn teams() -> Vec<String> {
        ["a", "b", "c", "d", "e", "f"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn counts_teammate_pairs_and_scores() {
        let event = EventData::new(
            "t",
            vec![
                mk_match(1, ["a", "b", "c"], 30, ["d", "e", "f"], 21, None),
                mk_match(2, ["a", "d", "e"], 10, ["b", "c", "f"], -1, None),
            ],
            teams(),
        );
        let index = TeamIndex::from_keys(teams());
        let sys = opr_system(&event, &index, None).unwrap();
        assert_eq!(sys.matches_used, 1);
        assert_eq!(sys.a[(0, 0)], 1.0);
        assert_eq!(sys.a[(0, 1)], 1.0);
        assert_eq!(sys.a[(0, 3)], 0.0);
        assert_eq!(sys.b.as_slice(), &[30.0, 30.0, 30.0, 21.0, 21.0, 21.0]);
        assert_eq!(sys.a, sys.a.transpose());
    }

    #[test]
    fn components_skip_non_numeric_fields() {
        let bd = json!({
            "red": {"autoPoints": 8, "robotStatus": "Parked", "rotorBonus": true},
            "blue": {"autoPoints": 3, "robotStatus": "None", "rotorBonus": false}
        });
        let event = EventData::new(
            "t",
            vec![mk_match(1, ["a", "b", "c"], 30, ["d", "e", "f"], 21, Some(bd))],
            teams(),
        );
        let index = TeamIndex::from_keys(teams());
        let sys = component_system(&event, &index, None).unwrap();
        assert!(sys.components.contains_key("autoPoints"));
        assert!(sys.components.contains_key("rotorBonus"));
        assert!(!sys.components.contains_key("robotStatus"));
        assert_eq!(
            sys.components["autoPoints"].as_slice(),
            &[3.0, 3.0, 3.0, 8.0, 8.0, 8.0]
        );
    }

    #[test]
    fn ceiling_drops_later_matches() {
        let event = EventData::new(
            "t",
            vec![
                mk_match(1, ["a", "b", "c"], 30, ["d", "e", "f"], 21, None),
                mk_match(2, ["a", "d", "e"], 10, ["b", "c", "f"], 12, None),
            ],
            teams(),
        );
        let index = TeamIndex::from_keys(teams());
        let sys = opr_system(&event, &index, Some(2)).unwrap();
        assert_eq!(sys.matches_used, 1);
        assert_eq!(sys.a[(0, 3)], 0.0);
        let sys = opr_system(&event, &index, None).unwrap();
        assert_eq!(sys.matches_used, 2);
        assert_eq!(sys.a[(0, 3)], 1.0);
    }

    #[test]
    fn no_breakdown_means_no_components() {
        let event = EventData::new(
            "t",
            vec![mk_match(1, ["a", "b", "c"], 30, ["d", "e", "f"], 21, None)],
            teams(),
        );
        let index = TeamIndex::from_keys(teams());
        let sys = component_system(&event, &index, None).unwrap();
        assert!(sys.components.is_empty());
        assert_eq!(sys.a[(3, 4)], 1.0);
    }
}
