use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RatingError;

/// Score the provider reports for a match that has not been played yet.
pub const UNPLAYED_SCORE: i64 = -1;

pub const QUALIFICATION_LEVEL: &str = "qm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllianceColor {
    Blue,
    Red,
}

impl AllianceColor {
    pub fn label(self) -> &'static str {
        match self {
            AllianceColor::Blue => "blue",
            AllianceColor::Red => "red",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alliance {
    pub score: i64,
    pub team_keys: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alliances {
    pub red: Alliance,
    pub blue: Alliance,
}

/// One match as served by the statistics provider.
///
/// Fields the engine does not model are kept in `extra` so flattening sees
/// the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub key: String,
    pub comp_level: String,
    pub match_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_number: Option<u32>,
    pub alliances: Alliances,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_breakdown: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Match {
    pub fn is_qualification(&self) -> bool {
        self.comp_level == QUALIFICATION_LEVEL
    }

    pub fn has_valid_scores(&self) -> bool {
        self.alliances.red.score != UNPLAYED_SCORE && self.alliances.blue.score != UNPLAYED_SCORE
    }

    /// Counted in the regression: a played qualification match.
    pub fn is_rated(&self) -> bool {
        self.is_qualification() && self.has_valid_scores()
    }

    pub fn alliance(&self, color: AllianceColor) -> &Alliance {
        match color {
            AllianceColor::Blue => &self.alliances.blue,
            AllianceColor::Red => &self.alliances.red,
        }
    }

    pub fn score(&self, color: AllianceColor) -> i64 {
        self.alliance(color).score
    }

    pub fn teams(&self, color: AllianceColor) -> crate::error::Result<[&str; 3]> {
        let keys = &self.alliance(color).team_keys;
        match keys.as_slice() {
            [a, b, c] => Ok([a.as_str(), b.as_str(), c.as_str()]),
            _ => Err(RatingError::MalformedAlliance {
                match_key: self.key.clone(),
                color: color.label(),
                count: keys.len(),
            }),
        }
    }

    /// Per-alliance breakdown object, if the provider reported one.
    pub fn breakdown(&self, color: AllianceColor) -> Option<&Map<String, Value>> {
        self.score_breakdown
            .as_ref()
            .and_then(|b| b.get(color.label()))
            .and_then(|v| v.as_object())
    }
}

/// Everything the rating engine needs for one event, already in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventData {
    pub event_key: String,
    pub matches: BTreeMap<String, Match>,
    pub teams: Vec<String>,
}

impl EventData {
    pub fn new(event_key: impl Into<String>, matches: Vec<Match>, teams: Vec<String>) -> Self {
        let event_key = event_key.into();
        let matches = matches
            .into_iter()
            .map(|m| (short_match_key(&event_key, &m.key), m))
            .collect();
        Self {
            event_key,
            matches,
            teams,
        }
    }

    /// Parse the provider's `event/<key>/matches` and `event/<key>/teams/keys` payloads.
    pub fn from_json(event_key: &str, matches_json: &str, teams_json: &str) -> Result<Self> {
        let matches = parse_matches_json(matches_json)
            .with_context(|| format!("parse matches for {event_key}"))?;
        let teams = serde_json::from_str::<Vec<String>>(teams_json)
            .with_context(|| format!("parse team list for {event_key}"))?;
        Ok(Self::new(event_key, matches, teams))
    }

    /// Load `<event>-matches.json` and `<event>-teamlist.json` from a cache directory.
    pub fn load_dir(dir: &Path, event_key: &str) -> Result<Self> {
        let matches_path = dir.join(format!("{event_key}-matches.json"));
        let teams_path = dir.join(format!("{event_key}-teamlist.json"));
        let matches_raw = fs::read_to_string(&matches_path)
            .with_context(|| format!("read {}", matches_path.display()))?;
        let teams_raw = fs::read_to_string(&teams_path)
            .with_context(|| format!("read {}", teams_path.display()))?;
        Self::from_json(event_key, &matches_raw, &teams_raw)
    }

    pub fn team_keys(&self) -> &[String] {
        &self.teams
    }

    pub fn match_info(&self, key: &str) -> crate::error::Result<&Match> {
        self.matches
            .get(key)
            .ok_or_else(|| RatingError::UnknownMatch(key.to_string()))
    }

    pub fn qual_matches(&self) -> impl Iterator<Item = &Match> {
        self.matches.values().filter(|m| m.is_qualification())
    }

    pub fn elim_matches(&self) -> impl Iterator<Item = &Match> {
        self.matches.values().filter(|m| !m.is_qualification())
    }

    pub fn qual_match_count(&self) -> usize {
        self.qual_matches().count()
    }

    /// Played qualification matches below `ceiling`, ordered by match number.
    pub fn rated_matches(&self, ceiling: Option<u32>) -> Vec<&Match> {
        let mut out: Vec<&Match> = self
            .matches
            .values()
            .filter(|m| m.is_rated())
            .filter(|m| ceiling.is_none_or(|c| m.match_number < c))
            .collect();
        out.sort_by(|a, b| a.match_number.cmp(&b.match_number).then(a.key.cmp(&b.key)));
        out
    }
}

pub fn parse_matches_json(raw: &str) -> Result<Vec<Match>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<Match>>(trimmed).context("invalid matches json")
}

/// `2017cc_qm12` -> `qm12`; keys without the event prefix are kept as-is.
pub fn short_match_key(event_key: &str, key: &str) -> String {
    key.strip_prefix(event_key)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(key)
        .to_string()
}
