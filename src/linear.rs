//! Symbolic coefficient extraction: reduces an expression over unknowns and
//! constants to `sum(coefficient * unknown) + constant`.

use std::collections::BTreeMap;

use crate::expr::{BinOp, Expr};

/// What a name resolves to within one match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Symbol {
    /// Column of the regression matrix.
    Unknown(usize),
    Constant(f64),
}

pub trait Scope {
    fn resolve(&self, name: &str) -> Option<Symbol>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    UnknownName(String),
    NonLinear(String),
    DivisionByZero,
}

/// `sum(coefficients[col] * x[col]) + constant`.
///
/// A column that was referenced keeps its entry even if the coefficient
/// cancels to zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearForm {
    pub coefficients: BTreeMap<usize, f64>,
    pub constant: f64,
}

impl LinearForm {
    pub fn constant(value: f64) -> Self {
        Self {
            coefficients: BTreeMap::new(),
            constant: value,
        }
    }

    pub fn unknown(column: usize) -> Self {
        let mut coefficients = BTreeMap::new();
        coefficients.insert(column, 1.0);
        Self {
            coefficients,
            constant: 0.0,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn coefficient(&self, column: usize) -> f64 {
        self.coefficients.get(&column).copied().unwrap_or(0.0)
    }

    fn add_scaled(mut self, other: LinearForm, sign: f64) -> Self {
        for (col, c) in other.coefficients {
            *self.coefficients.entry(col).or_insert(0.0) += sign * c;
        }
        self.constant += sign * other.constant;
        self
    }

    fn scale(mut self, factor: f64) -> Self {
        for c in self.coefficients.values_mut() {
            *c *= factor;
        }
        self.constant *= factor;
        self
    }

    /// `self - other`
    pub fn minus(self, other: LinearForm) -> Self {
        self.add_scaled(other, -1.0)
    }
}

/// Reduce `expr` to a linear form in the columns `scope` resolves.
///
/// This is ordinary linear algebra: a repeated unknown accumulates
/// (`2*B1 + B1` is `3*B1`) and constants on either side of an equation are
/// kept, so the caller moves them into the right-hand side.
pub fn evaluate(expr: &Expr, scope: &impl Scope) -> Result<LinearForm, EvalError> {
    match expr {
        Expr::Number(n) => Ok(LinearForm::constant(*n)),
        Expr::Name(name) => match scope.resolve(name) {
            Some(Symbol::Unknown(col)) => Ok(LinearForm::unknown(col)),
            Some(Symbol::Constant(v)) => Ok(LinearForm::constant(v)),
            None => Err(EvalError::UnknownName(name.clone())),
        },
        Expr::Neg(inner) => Ok(evaluate(inner, scope)?.scale(-1.0)),
        Expr::Binary { op, lhs, rhs } => {
            let l = evaluate(lhs, scope)?;
            let r = evaluate(rhs, scope)?;
            match op {
                BinOp::Add => Ok(l.add_scaled(r, 1.0)),
                BinOp::Sub => Ok(l.add_scaled(r, -1.0)),
                BinOp::Mul => match (l.is_constant(), r.is_constant()) {
                    (_, true) => Ok(l.scale(r.constant)),
                    (true, false) => Ok(r.scale(l.constant)),
                    (false, false) => Err(EvalError::NonLinear(expr.to_string())),
                },
                BinOp::Div => {
                    if !r.is_constant() {
                        return Err(EvalError::NonLinear(expr.to_string()));
                    }
                    if r.constant == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    Ok(l.scale(1.0 / r.constant))
                }
            }
        }
    }
}
