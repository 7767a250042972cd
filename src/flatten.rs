use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::event::Match;

/// Single-level view of a nested record: `score_breakdown.red.foulPoints`
/// becomes `score_breakdown_red_foulPoints`.
pub type FlatRecord = HashMap<String, Value>;

pub const KEY_SEPARATOR: char = '_';

pub fn flatten_object(object: &Map<String, Value>) -> FlatRecord {
    let mut out = FlatRecord::with_capacity(object.len());
    flatten_into(&mut out, None, object);
    out
}

pub fn flatten_match(m: &Match) -> FlatRecord {
    match serde_json::to_value(m) {
        Ok(Value::Object(object)) => flatten_object(&object),
        // Match always serializes to an object.
        _ => FlatRecord::new(),
    }
}

fn flatten_into(out: &mut FlatRecord, prefix: Option<&str>, object: &Map<String, Value>) {
    for (key, value) in object {
        let path = match prefix {
            Some(p) => format!("{p}{KEY_SEPARATOR}{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) => flatten_into(out, Some(&path), inner),
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

/// Numeric reading of a leaf: numbers, booleans as 1/0, and numeric strings.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// The constant namespace a pattern is evaluated against.
pub fn numeric_constants(flat: &FlatRecord) -> HashMap<String, f64> {
    flat.iter()
        .filter_map(|(k, v)| value_as_f64(v).map(|x| (k.clone(), x)))
        .collect()
}
