//! Running score and error log of a practice run
//!
//! Every queue position may be scored at most once. The `attempted_current`
//! flag is what enforces it: `record` only counts while it is clear, and only
//! the session clears it, when moving to the next position.

use serde::Serialize;

use crate::card::Card;

/// Correct answers out of scored positions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Score {
    pub correct: u32,
    pub total: u32,
}

impl Score {
    /// Percentage of scored positions answered correctly, rounded
    ///
    /// `None` when nothing was scored, e.g. every card was skipped.
    pub fn accuracy(&self) -> Option<u32> {
        if self.total == 0 {
            return None;
        }
        Some((100.0 * self.correct as f64 / self.total as f64).round() as u32)
    }
}

/// A missed card together with what the learner typed
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    pub card: Card,
    pub user_answer: String,
}

/// Score plus error log plus the once-per-position guard
#[derive(Clone, Debug, Default)]
pub struct Scorecard {
    score: Score,
    errors: Vec<ErrorEntry>,
    attempted_current: bool,
}

impl Scorecard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the first check of the current position
    ///
    /// Returns `false` without touching anything when the position has
    /// already been scored.
    pub fn record(&mut self, card: &Card, user_answer: &str, correct: bool) -> bool {
        if self.attempted_current {
            return false;
        }

        self.score.total += 1;
        if correct {
            self.score.correct += 1;
        } else {
            self.errors.push(ErrorEntry {
                card: card.clone(),
                user_answer: user_answer.to_string(),
            });
        }
        self.attempted_current = true;
        true
    }

    /// Re-arm scoring for the next queue position
    pub(crate) fn next_position(&mut self) {
        self.attempted_current = false;
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    pub fn attempted_current(&self) -> bool {
        self.attempted_current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardDraft;
    use chrono::Utc;

    fn card() -> Card {
        CardDraft {
            term: "Apfel".into(),
            meaning: "apple".into(),
            ..Default::default()
        }
        .into_card("c1".into(), Utc::now())
    }

    #[test]
    fn test_accuracy_rounding() {
        assert_eq!(Score { correct: 2, total: 3 }.accuracy(), Some(67));
        assert_eq!(Score { correct: 1, total: 3 }.accuracy(), Some(33));
        assert_eq!(Score { correct: 1, total: 8 }.accuracy(), Some(13));
        assert_eq!(Score { correct: 5, total: 5 }.accuracy(), Some(100));
        assert_eq!(Score::default().accuracy(), None);
    }

    #[test]
    fn test_record_once_per_position() {
        let mut sheet = Scorecard::new();
        let c = card();

        assert!(sheet.record(&c, "apple", false));
        assert!(!sheet.record(&c, "Apfel", true));
        assert_eq!(sheet.score(), Score { correct: 0, total: 1 });
        assert_eq!(sheet.errors().len(), 1);
        assert_eq!(sheet.errors()[0].user_answer, "apple");

        sheet.next_position();
        assert!(!sheet.attempted_current());
        assert!(sheet.record(&c, "Apfel", true));
        assert_eq!(sheet.score(), Score { correct: 1, total: 2 });
        assert_eq!(sheet.errors().len(), 1);
    }
}
