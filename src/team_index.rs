use std::collections::HashMap;

use crate::error::{RatingError, Result};

/// Dense `0..N` numbering of an event's teams, used as matrix coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamIndex {
    keys: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl TeamIndex {
    /// Duplicates keep their first position.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Self::default();
        for key in keys {
            let key = key.into();
            if out.lookup.contains_key(&key) {
                continue;
            }
            out.lookup.insert(key.clone(), out.keys.len());
            out.keys.push(key);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn get(&self, team: &str) -> Option<usize> {
        self.lookup.get(team).copied()
    }

    pub fn index_of(&self, team: &str, match_key: &str) -> Result<usize> {
        self.get(team).ok_or_else(|| RatingError::UnknownTeam {
            team: team.to_string(),
            match_key: match_key.to_string(),
        })
    }

    pub fn to_map(&self, values: &[f64]) -> Result<HashMap<String, f64>> {
        if values.len() != self.keys.len() {
            return Err(RatingError::LengthMismatch {
                expected: self.keys.len(),
                actual: values.len(),
            });
        }
        Ok(self
            .keys
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .collect())
    }
}
