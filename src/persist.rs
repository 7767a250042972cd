use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::cache_dir;

const SNAPSHOT_VERSION: u32 = 1;

/// A computed rating map written for later display; the engine never reads it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub version: u32,
    pub event_key: String,
    /// `OPR`, a component name, or a pattern preset name.
    pub kind: String,
    pub generated_at: String,
    #[serde(default)]
    pub ratings: BTreeMap<String, f64>,
}

impl RatingSnapshot {
    pub fn new<I, K>(event_key: &str, kind: &str, ratings: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            version: SNAPSHOT_VERSION,
            event_key: event_key.to_string(),
            kind: kind.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            ratings: ratings.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn file_name(&self) -> String {
        snapshot_file_name(&self.event_key, &self.kind)
    }
}

pub fn snapshot_file_name(event_key: &str, kind: &str) -> String {
    let kind: String = kind
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{event_key}-{kind}.json")
}

pub fn default_snapshot_dir() -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join("ratings"))
}

/// Atomic write (tmp file + rename) into `dir`.
pub fn save_snapshot(dir: &Path, snapshot: &RatingSnapshot) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(snapshot.file_name());
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(snapshot).context("serialize rating snapshot")?;
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, &path).with_context(|| format!("swap {}", path.display()))?;
    info!(
        "saved {} {} ratings to {}",
        snapshot.ratings.len(),
        snapshot.kind,
        path.display()
    );
    Ok(path)
}

/// `Ok(None)` when no snapshot exists or it was written by another version.
pub fn load_snapshot(dir: &Path, event_key: &str, kind: &str) -> Result<Option<RatingSnapshot>> {
    let path = dir.join(snapshot_file_name(event_key, kind));
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let snapshot = serde_json::from_str::<RatingSnapshot>(&raw)
        .with_context(|| format!("parse {}", path.display()))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Ok(None);
    }
    Ok(Some(snapshot))
}
