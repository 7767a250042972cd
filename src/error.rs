use thiserror::Error;

pub type Result<T> = std::result::Result<T, RatingError>;

/// Errors raised while building or solving a rating system.
///
/// Pattern errors always carry the pattern text so a caller can tell which
/// configured metric is broken.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RatingError {
    #[error("pattern `{pattern}`: {message} (at offset {offset})")]
    PatternSyntax {
        pattern: String,
        message: String,
        offset: usize,
    },

    #[error("pattern `{pattern}`: `{term}` is not linear in the unknowns")]
    BilinearTerm { pattern: String, term: String },

    #[error("pattern `{pattern}`: `{name}` is not a numeric field of match {match_key}")]
    UnknownName {
        pattern: String,
        name: String,
        match_key: String,
    },

    #[error("pattern `{pattern}`: division by zero in match {match_key}")]
    DivisionByZero { pattern: String, match_key: String },

    #[error("team {team} in match {match_key} is not part of the team index")]
    UnknownTeam { team: String, match_key: String },

    #[error("match {match_key}: {color} alliance has {count} teams, expected 3")]
    MalformedAlliance {
        match_key: String,
        color: &'static str,
        count: usize,
    },

    #[error("no match with key {0}")]
    UnknownMatch(String),

    #[error("expected {expected} values (one per team), got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("solver failed: {0}")]
    Solver(String),
}
