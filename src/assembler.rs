use std::collections::HashMap;

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::error::{RatingError, Result};
use crate::event::{AllianceColor, EventData, Match};
use crate::flatten::{flatten_match, numeric_constants};
use crate::linear::{EvalError, LinearForm, Scope, Symbol, evaluate};
use crate::pattern::{BLUE_SCORE, Pattern, RED_SCORE, SLOTS, Slot, split_unknown};
use crate::team_index::TeamIndex;

/// `a * x ≈ b`, one row per equation per rated match, one column per
/// (team, suffix) pair at `team_index * suffix_count + suffix_position`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionSystem {
    pub a: DMatrix<f64>,
    pub b: DVector<f64>,
    pub suffixes: Vec<String>,
    pub matches_used: usize,
}

impl RegressionSystem {
    pub fn column(team_index: usize, suffix_position: usize, suffix_count: usize) -> usize {
        team_index * suffix_count + suffix_position
    }
}

/// Names visible to one match's equations.
struct MatchScope<'p> {
    pattern: &'p Pattern,
    /// Team index of each slot, in `SLOTS` order.
    slot_teams: [usize; 6],
    constants: HashMap<String, f64>,
}

impl MatchScope<'_> {
    fn slot_team(&self, slot: Slot) -> usize {
        let base = match slot.color {
            AllianceColor::Blue => 0,
            AllianceColor::Red => 3,
        };
        self.slot_teams[base + slot.position]
    }
}

impl Scope for MatchScope<'_> {
    fn resolve(&self, name: &str) -> Option<Symbol> {
        if let Some((slot, suffix)) = split_unknown(name) {
            let position = self.pattern.suffix_position(suffix)?;
            let column = RegressionSystem::column(
                self.slot_team(slot),
                position,
                self.pattern.suffixes().len(),
            );
            return Some(Symbol::Unknown(column));
        }
        self.constants.get(name).copied().map(Symbol::Constant)
    }
}

pub fn assemble(
    pattern: &Pattern,
    event: &EventData,
    index: &TeamIndex,
    match_ceiling: Option<u32>,
) -> Result<RegressionSystem> {
    let suffixes = pattern.suffixes().to_vec();
    let cols = suffixes.len() * index.len();
    let equations = pattern.equations();
    let matches = event.rated_matches(match_ceiling);
    let rows = matches.len() * equations.len();

    let mut a = DMatrix::zeros(rows, cols);
    let mut b = DVector::zeros(rows);

    for (match_pos, m) in matches.iter().enumerate() {
        let scope = match_scope(pattern, m, index)?;
        for (eq_pos, equation) in equations.iter().enumerate() {
            let row = match_pos * equations.len() + eq_pos;
            let lhs = evaluate(&equation.lhs, &scope).map_err(|e| eval_error(e, pattern, m))?;
            let rhs = evaluate(&equation.rhs, &scope).map_err(|e| eval_error(e, pattern, m))?;
            let form: LinearForm = lhs.minus(rhs);
            for (&col, &coef) in &form.coefficients {
                a[(row, col)] = coef;
            }
            b[row] = -form.constant;
        }
    }

    debug!(
        "assembled {}x{} system from {} matches, {} equations, suffixes {:?}",
        rows,
        cols,
        matches.len(),
        equations.len(),
        suffixes
    );

    Ok(RegressionSystem {
        a,
        b,
        suffixes,
        matches_used: matches.len(),
    })
}

fn match_scope<'p>(pattern: &'p Pattern, m: &Match, index: &TeamIndex) -> Result<MatchScope<'p>> {
    let mut slot_teams = [0usize; 6];
    for (i, slot) in SLOTS.iter().enumerate() {
        let team = m.teams(slot.color)?[slot.position];
        slot_teams[i] = index.index_of(team, &m.key)?;
    }

    let mut constants = numeric_constants(&flatten_match(m));
    constants.insert(BLUE_SCORE.to_string(), m.score(AllianceColor::Blue) as f64);
    constants.insert(RED_SCORE.to_string(), m.score(AllianceColor::Red) as f64);

    Ok(MatchScope {
        pattern,
        slot_teams,
        constants,
    })
}

fn eval_error(err: EvalError, pattern: &Pattern, m: &Match) -> RatingError {
    match err {
        EvalError::UnknownName(name) => RatingError::UnknownName {
            pattern: pattern.source().to_string(),
            name,
            match_key: m.key.clone(),
        },
        EvalError::NonLinear(term) => RatingError::BilinearTerm {
            pattern: pattern.source().to_string(),
            term,
        },
        EvalError::DivisionByZero => RatingError::DivisionByZero {
            pattern: pattern.source().to_string(),
            match_key: m.key.clone(),
        },
    }
}
