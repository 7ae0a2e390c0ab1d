//! Practice Mode: quiz state machine, answer checking and scoring
//!
//! # Components
//! - `sampler.rs`: Fisher–Yates draw of the session queue
//! - `evaluator.rs`: Trim + case-fold answer comparison
//! - `score.rs`: Score, error log and the once-per-card guard
//! - `session.rs`: PracticeEngine driving setup → active → results

pub mod evaluator;
pub mod sampler;
pub mod score;
pub mod session;

use thiserror::Error;

pub use score::{ErrorEntry, Score, Scorecard};
pub use session::{
    ActiveSnapshot, Feedback, PracticeEngine, PracticeSnapshot, PracticeView, Preset,
    ResultsSnapshot, Session,
};

/// Rejected practice actions; the engine is left unchanged
#[derive(Debug, Error)]
pub enum PracticeError {
    #[error("No cards available for practice")]
    NoCards,

    #[error("Invalid session size: {0:?}")]
    InvalidLimit(String),

    #[error("Cannot {action} while in {view:?}")]
    InvalidTransition {
        action: &'static str,
        view: PracticeView,
    },
}
