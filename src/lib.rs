pub mod assembler;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod expr;
pub mod fixed_form;
pub mod flatten;
pub mod linear;
pub mod pattern;
pub mod persist;
pub mod solver;
pub mod synthetic;
pub mod team_index;

pub use engine::RatingEngine;
pub use error::{RatingError, Result};
pub use event::EventData;
