//! Rating patterns: `;`-separated linear equations over per-team unknowns.
//!
//! Unknowns are written as a slot prefix (`B1`..`B3`, `R1`..`R3`) followed by
//! a caller-chosen suffix. `B1_OPR` and `R3_OPR` are the same rating category
//! applied to two different teams of a match. `BS`/`RS` name the blue/red
//! alliance scores; every other identifier is a flattened match field.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::error::{RatingError, Result};
use crate::event::AllianceColor;
use crate::expr::{self, BinOp, Expr, TokenKind};

pub const STATEMENT_SEPARATOR: char = ';';
pub const BLUE_SCORE: &str = "BS";
pub const RED_SCORE: &str = "RS";

/// One of the six team positions of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub color: AllianceColor,
    /// 0-based position in the alliance's team list.
    pub position: usize,
}

pub const SLOTS: [Slot; 6] = [
    Slot { color: AllianceColor::Blue, position: 0 },
    Slot { color: AllianceColor::Blue, position: 1 },
    Slot { color: AllianceColor::Blue, position: 2 },
    Slot { color: AllianceColor::Red, position: 0 },
    Slot { color: AllianceColor::Red, position: 1 },
    Slot { color: AllianceColor::Red, position: 2 },
];

impl Slot {
    pub fn prefix(self) -> &'static str {
        match (self.color, self.position) {
            (AllianceColor::Blue, 0) => "B1",
            (AllianceColor::Blue, 1) => "B2",
            (AllianceColor::Blue, _) => "B3",
            (AllianceColor::Red, 0) => "R1",
            (AllianceColor::Red, 1) => "R2",
            (AllianceColor::Red, _) => "R3",
        }
    }
}

/// Split `B2_OPR` into its slot and suffix (`_OPR`). Bare `B2` has an empty suffix.
pub fn split_unknown(name: &str) -> Option<(Slot, &str)> {
    SLOTS
        .iter()
        .find_map(|slot| name.strip_prefix(slot.prefix()).map(|rest| (*slot, rest)))
}

/// Named presets shipped with the engine.
pub fn rating_patterns() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        (
            "OPR",
            "B1_OPR + B2_OPR + B3_OPR = BS; R1_OPR + R2_OPR + R3_OPR = RS",
        ),
        (
            "DPR",
            "B1_OPR + B2_OPR + B3_OPR - R1_DPR - R2_DPR - R3_DPR = BS; \
             R1_OPR + R2_OPR + R3_OPR - B1_DPR - B2_DPR - B3_DPR = RS",
        ),
        (
            "GPR",
            "R1_GPR + R2_GPR + R3_GPR + (-1)*B1_GPR + (-1)*B2_GPR + (-1)*B3_GPR = RS - BS",
        ),
        (
            "EPR",
            "R1_EPR + R2_EPR + R3_EPR + (-1)*B1_EPR + (-1)*B2_EPR + (-1)*B3_EPR = RS - BS; \
             B1_EPR + B2_EPR + B3_EPR = BS; R1_EPR + R2_EPR + R3_EPR = RS",
        ),
    ])
}

/// Distinct suffixes of every unknown referenced anywhere in `pattern`.
pub fn discover_suffixes(pattern: &str) -> Result<BTreeSet<String>> {
    let tokens = expr::tokenize(pattern).map_err(|e| RatingError::PatternSyntax {
        pattern: pattern.to_string(),
        message: e.message,
        offset: e.offset,
    })?;
    Ok(tokens
        .iter()
        .filter_map(|tok| match &tok.kind {
            TokenKind::Ident(name) => split_unknown(name).map(|(_, suffix)| suffix.to_string()),
            _ => None,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub text: String,
    pub lhs: Expr,
    pub rhs: Expr,
}

/// A parsed, validated pattern. Construction fails on syntax errors and on
/// any term that is not linear in the unknowns.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    source: String,
    equations: Vec<Equation>,
    suffixes: Vec<String>,
}

impl Pattern {
    pub fn parse(source: &str) -> Result<Self> {
        let mut equations = Vec::new();
        let mut base = 0usize;
        for statement in source.split(STATEMENT_SEPARATOR) {
            let offset = base;
            base += statement.len() + STATEMENT_SEPARATOR.len_utf8();
            if statement.trim().is_empty() {
                continue;
            }
            let (lhs, rhs) =
                expr::parse_equation(statement).map_err(|e| RatingError::PatternSyntax {
                    pattern: source.to_string(),
                    message: e.message,
                    offset: offset + e.offset,
                })?;
            for side in [&lhs, &rhs] {
                if let Some(term) = first_nonlinear_term(side) {
                    return Err(RatingError::BilinearTerm {
                        pattern: source.to_string(),
                        term: term.to_string(),
                    });
                }
            }
            equations.push(Equation {
                text: statement.trim().to_string(),
                lhs,
                rhs,
            });
        }

        let suffixes = discover_suffixes(source)?.into_iter().collect();
        Ok(Self {
            source: source.to_string(),
            equations,
            suffixes,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    /// Sorted; a suffix's position here is its column offset within a team's block.
    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    pub fn suffix_position(&self, suffix: &str) -> Option<usize> {
        self.suffixes
            .binary_search_by(|s| s.as_str().cmp(suffix))
            .ok()
    }
}

impl FromStr for Pattern {
    type Err = RatingError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn references_unknown(expr: &Expr) -> bool {
    let mut found = false;
    expr.visit_names(&mut |name| {
        if split_unknown(name).is_some() {
            found = true;
        }
    });
    found
}

fn first_nonlinear_term(expr: &Expr) -> Option<&Expr> {
    match expr {
        Expr::Number(_) | Expr::Name(_) => None,
        Expr::Neg(inner) => first_nonlinear_term(inner),
        Expr::Binary { op, lhs, rhs } => {
            if let Some(inner) = first_nonlinear_term(lhs).or_else(|| first_nonlinear_term(rhs)) {
                return Some(inner);
            }
            let bad = match op {
                BinOp::Mul => references_unknown(lhs) && references_unknown(rhs),
                BinOp::Div => references_unknown(rhs),
                BinOp::Add | BinOp::Sub => false,
            };
            bad.then_some(expr)
        }
    }
}
