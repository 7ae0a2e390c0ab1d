//! Practice run lifecycle: setup, active quiz, results
//!
//! The engine owns a snapshot of the user's cards and at most one running
//! [`Session`]. Every action takes `&mut self` and either completes its
//! transition or returns an error without mutating anything.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::PracticeError;
use super::evaluator;
use super::sampler;
use super::score::{ErrorEntry, Score, Scorecard};
use crate::audio::audio_url;
use crate::card::Card;
use crate::storage::CardRepository;

/// Fixed session sizes offered on the setup screen, besides "All"
pub const SESSION_PRESETS: [usize; 3] = [10, 20, 50];

/// Which screen the engine is on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PracticeView {
    /// No cards to practice with
    Empty,
    Setup,
    Active,
    Results,
}

/// Outcome shown for the current card
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    /// Waiting for an answer
    #[default]
    None,
    Correct,
    Incorrect,
}

/// One bounded run over a sampled queue of cards
#[derive(Clone, Debug)]
pub struct Session {
    queue: Vec<Card>,
    position: usize,
    scorecard: Scorecard,
    feedback: Feedback,
    hint_shown: bool,
    skipped: u32,
}

impl Session {
    fn new(queue: Vec<Card>) -> Self {
        Session {
            queue,
            position: 0,
            scorecard: Scorecard::new(),
            feedback: Feedback::None,
            hint_shown: false,
            skipped: 0,
        }
    }

    pub fn queue(&self) -> &[Card] {
        &self.queue
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current_card(&self) -> Option<&Card> {
        self.queue.get(self.position)
    }

    pub fn score(&self) -> Score {
        self.scorecard.score()
    }

    pub fn errors(&self) -> &[ErrorEntry] {
        self.scorecard.errors()
    }

    pub fn feedback(&self) -> Feedback {
        self.feedback
    }

    pub fn hint_shown(&self) -> bool {
        self.hint_shown
    }

    pub fn attempted_current(&self) -> bool {
        self.scorecard.attempted_current()
    }

    /// Positions advanced past without ever being checked
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    fn clear_feedback(&mut self) {
        self.feedback = Feedback::None;
        self.hint_shown = false;
    }
}

enum Phase {
    Empty,
    Setup,
    Active(Session),
    Results(Session),
}

impl Phase {
    fn view(&self) -> PracticeView {
        match self {
            Phase::Empty => PracticeView::Empty,
            Phase::Setup => PracticeView::Setup,
            Phase::Active(_) => PracticeView::Active,
            Phase::Results(_) => PracticeView::Results,
        }
    }
}

/// A session size choice on the setup screen
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub limit: usize,
    pub label: String,
    pub enabled: bool,
}

/// Read-only view of the engine for a presentation layer
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum PracticeSnapshot {
    Empty,
    Setup {
        available: usize,
        presets: Vec<Preset>,
    },
    Active(ActiveSnapshot),
    Results(ResultsSnapshot),
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSnapshot {
    /// Zero-based index of the current card
    pub position: usize,
    pub queue_len: usize,
    pub card_id: String,
    /// The side shown to the learner
    pub prompt: String,
    pub has_hint: bool,
    /// Present once the learner asked for it
    pub hint: Option<String>,
    /// Present only when the card has a recording
    pub audio_url: Option<String>,
    pub feedback: Feedback,
    /// The expected answer, revealed once the card has been checked
    pub answer: Option<String>,
    pub score: Score,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsSnapshot {
    pub score: Score,
    pub accuracy: Option<u32>,
    pub skipped: u32,
    pub errors: Vec<ErrorEntry>,
}

/// Quiz state machine over a fixed snapshot of cards
pub struct PracticeEngine<R = StdRng> {
    cards: Vec<Card>,
    phase: Phase,
    rng: R,
}

impl PracticeEngine<StdRng> {
    /// Engine seeded from the operating system
    pub fn with_entropy(cards: Vec<Card>) -> Self {
        Self::new(cards, StdRng::from_entropy())
    }
}

impl<R: Rng> PracticeEngine<R> {
    /// Engine over `cards`; starts in `Setup`, or `Empty` without cards
    pub fn new(cards: Vec<Card>, rng: R) -> Self {
        let mut engine = PracticeEngine {
            cards: Vec::new(),
            phase: Phase::Empty,
            rng,
        };
        engine.reload(cards);
        engine
    }

    /// Engine over a user's cards fetched from `repo`
    ///
    /// A failed fetch is treated as having no cards.
    pub fn load<C>(repo: &C, username: &str, rng: R) -> Self
    where
        C: CardRepository + ?Sized,
    {
        let cards = repo.list_cards(username).unwrap_or_else(|e| {
            warn!("Could not load cards for {}: {}", username, e);
            Vec::new()
        });
        Self::new(cards, rng)
    }

    /// Replace the card snapshot
    ///
    /// A running session keeps its queue; the new cards are used from the
    /// next start on.
    pub fn reload(&mut self, cards: Vec<Card>) {
        let before = cards.len();
        self.cards = cards.into_iter().filter(Card::is_practicable).collect();
        if self.cards.len() < before {
            warn!(
                "Ignoring {} card(s) with an empty side",
                before - self.cards.len()
            );
        }

        if matches!(self.phase, Phase::Empty | Phase::Setup) {
            self.phase = self.idle_phase();
        }
    }

    fn idle_phase(&self) -> Phase {
        if self.cards.is_empty() {
            Phase::Empty
        } else {
            Phase::Setup
        }
    }

    pub fn view(&self) -> PracticeView {
        self.phase.view()
    }

    /// Number of cards a session can draw from
    pub fn available(&self) -> usize {
        self.cards.len()
    }

    /// The running or finished session, if any
    pub fn session(&self) -> Option<&Session> {
        match &self.phase {
            Phase::Active(session) | Phase::Results(session) => Some(session),
            Phase::Empty | Phase::Setup => None,
        }
    }

    /// Setup choices; a preset above 10 is disabled when there are fewer cards
    pub fn presets(&self) -> Vec<Preset> {
        let available = self.cards.len();
        let mut presets: Vec<Preset> = SESSION_PRESETS
            .iter()
            .map(|&limit| Preset {
                limit,
                label: format!("{} Words", limit),
                enabled: available >= limit || limit == SESSION_PRESETS[0],
            })
            .collect();
        presets.push(Preset {
            limit: available,
            label: format!("All ({})", available),
            enabled: available > 0,
        });
        presets
    }

    /// Draw up to `limit` cards and begin quizzing
    ///
    /// Allowed from `Setup`, or from `Results` to go straight into a new run.
    pub fn start(&mut self, limit: usize) -> Result<(), PracticeError> {
        match self.phase {
            Phase::Setup | Phase::Results(_) => {}
            Phase::Empty => return Err(PracticeError::NoCards),
            Phase::Active(_) => return Err(self.invalid("start")),
        }
        if limit == 0 {
            return Err(PracticeError::InvalidLimit(limit.to_string()));
        }

        let queue = sampler::sample(&self.cards, limit, &mut self.rng);
        debug!(
            "Starting practice with {} of {} cards",
            queue.len(),
            self.cards.len()
        );
        self.phase = Phase::Active(Session::new(queue));
        Ok(())
    }

    /// Start a run over every available card
    pub fn start_all(&mut self) -> Result<(), PracticeError> {
        self.start(self.cards.len())
    }

    /// Start from free-form text typed by the learner
    ///
    /// Anything but a positive whole number is rejected.
    pub fn start_custom(&mut self, input: &str) -> Result<(), PracticeError> {
        let limit = match input.trim().parse::<i64>() {
            Ok(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
            _ => return Err(PracticeError::InvalidLimit(input.to_string())),
        };
        self.start(limit)
    }

    /// Check an answer for the current card
    ///
    /// Only the first check of a position is scored. While feedback is
    /// showing, further submissions change nothing and return the feedback
    /// already on screen.
    pub fn submit(&mut self, answer: &str) -> Result<Feedback, PracticeError> {
        let session = self.active_mut("submit")?;
        if session.feedback != Feedback::None {
            return Ok(session.feedback);
        }

        let Some(card) = session.queue.get(session.position) else {
            return Ok(session.feedback);
        };
        let answer = answer.trim();
        let correct = evaluator::is_correct(answer, &card.term);
        let scored = session.scorecard.record(card, answer, correct);

        session.feedback = if correct {
            Feedback::Correct
        } else {
            Feedback::Incorrect
        };
        debug!(
            "Position {} checked: {:?} (scored: {})",
            session.position, session.feedback, scored
        );
        Ok(session.feedback)
    }

    /// Clear the feedback so the same card can be typed again
    pub fn retype(&mut self) -> Result<(), PracticeError> {
        self.active_mut("retype")?.clear_feedback();
        Ok(())
    }

    /// Show the current card's hint; `false` when there is none to show
    pub fn reveal_hint(&mut self) -> Result<bool, PracticeError> {
        let session = self.active_mut("reveal a hint")?;
        let has_hint = session
            .current_card()
            .is_some_and(|card| card.hint().is_some());
        if has_hint && session.feedback == Feedback::None {
            session.hint_shown = true;
        }
        Ok(session.hint_shown)
    }

    /// Move to the next card, or to `Results` after the last one
    ///
    /// Advancing without checking is allowed; the position then counts as
    /// skipped and stays out of the score.
    pub fn advance(&mut self) -> Result<PracticeView, PracticeError> {
        let session = self.active_mut("advance")?;
        if !session.scorecard.attempted_current() {
            session.skipped += 1;
        }

        if session.position + 1 < session.queue.len() {
            session.position += 1;
            session.clear_feedback();
            session.scorecard.next_position();
            return Ok(PracticeView::Active);
        }

        if let Phase::Active(session) = std::mem::replace(&mut self.phase, Phase::Empty) {
            debug!(
                "Practice finished: {}/{} correct, {} skipped",
                session.score().correct,
                session.score().total,
                session.skipped
            );
            self.phase = Phase::Results(session);
        }
        Ok(PracticeView::Results)
    }

    /// Abandon the running or finished session
    pub fn exit(&mut self) -> Result<(), PracticeError> {
        match self.phase {
            Phase::Active(_) | Phase::Results(_) => {
                debug!("Practice session discarded");
                self.phase = self.idle_phase();
                Ok(())
            }
            Phase::Empty | Phase::Setup => Err(self.invalid("exit")),
        }
    }

    /// Leave the results screen for a fresh setup
    pub fn restart(&mut self) -> Result<(), PracticeError> {
        match self.phase {
            Phase::Results(_) => {
                self.phase = self.idle_phase();
                Ok(())
            }
            _ => Err(self.invalid("restart")),
        }
    }

    pub fn snapshot(&self) -> PracticeSnapshot {
        match &self.phase {
            Phase::Empty => PracticeSnapshot::Empty,
            Phase::Setup => PracticeSnapshot::Setup {
                available: self.cards.len(),
                presets: self.presets(),
            },
            Phase::Active(session) => match session.current_card() {
                Some(card) => PracticeSnapshot::Active(active_snapshot(session, card)),
                None => PracticeSnapshot::Empty,
            },
            Phase::Results(session) => PracticeSnapshot::Results(ResultsSnapshot {
                score: session.score(),
                accuracy: session.score().accuracy(),
                skipped: session.skipped,
                errors: session.errors().to_vec(),
            }),
        }
    }

    fn active_mut(&mut self, action: &'static str) -> Result<&mut Session, PracticeError> {
        let view = self.phase.view();
        match &mut self.phase {
            Phase::Active(session) => Ok(session),
            _ => Err(PracticeError::InvalidTransition { action, view }),
        }
    }

    fn invalid(&self, action: &'static str) -> PracticeError {
        PracticeError::InvalidTransition {
            action,
            view: self.phase.view(),
        }
    }
}

fn active_snapshot(session: &Session, card: &Card) -> ActiveSnapshot {
    let checked = session.feedback != Feedback::None;
    ActiveSnapshot {
        position: session.position,
        queue_len: session.queue.len(),
        card_id: card.id.clone(),
        prompt: card.meaning.clone(),
        has_hint: card.hint().is_some(),
        hint: card
            .hint()
            .filter(|_| session.hint_shown)
            .map(str::to_string),
        audio_url: card.has_audio.then(|| audio_url(&card.id)),
        feedback: session.feedback,
        answer: checked.then(|| card.term.clone()),
        score: session.score(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardDraft;
    use chrono::Utc;

    fn card(id: &str, term: &str, meaning: &str) -> Card {
        CardDraft {
            term: term.to_string(),
            meaning: meaning.to_string(),
            ..Default::default()
        }
        .into_card(id.to_string(), Utc::now())
    }

    fn deck(n: usize) -> Vec<Card> {
        (0..n)
            .map(|i| card(&format!("c{}", i), &format!("wort{}", i), &format!("word{}", i)))
            .collect()
    }

    fn engine(cards: Vec<Card>) -> PracticeEngine<StdRng> {
        PracticeEngine::new(cards, StdRng::seed_from_u64(9))
    }

    fn expected(engine: &PracticeEngine<StdRng>) -> String {
        engine.session().unwrap().current_card().unwrap().term.clone()
    }

    #[test]
    fn test_initial_view() {
        assert_eq!(engine(deck(3)).view(), PracticeView::Setup);
        assert_eq!(engine(Vec::new()).view(), PracticeView::Empty);
    }

    #[test]
    fn test_start_clamps_to_available() {
        let mut e = engine(deck(4));
        e.start(10).unwrap();
        assert_eq!(e.view(), PracticeView::Active);
        assert_eq!(e.session().unwrap().queue().len(), 4);
        assert_eq!(e.session().unwrap().position(), 0);
        assert_eq!(e.session().unwrap().score(), Score::default());
    }

    #[test]
    fn test_invalid_limits_leave_setup() {
        let mut e = engine(deck(4));
        assert!(matches!(e.start(0), Err(PracticeError::InvalidLimit(_))));
        assert!(matches!(e.start_custom("abc"), Err(PracticeError::InvalidLimit(_))));
        assert!(matches!(e.start_custom("-2"), Err(PracticeError::InvalidLimit(_))));
        assert!(matches!(e.start_custom(""), Err(PracticeError::InvalidLimit(_))));
        assert_eq!(e.view(), PracticeView::Setup);

        e.start_custom(" 2 ").unwrap();
        assert_eq!(e.session().unwrap().queue().len(), 2);
    }

    #[test]
    fn test_empty_engine_refuses_start() {
        let mut e = engine(Vec::new());
        assert!(matches!(e.start(5), Err(PracticeError::NoCards)));
        assert_eq!(e.view(), PracticeView::Empty);
    }

    #[test]
    fn test_double_submit_scores_once() {
        let mut e = engine(deck(3));
        e.start(3).unwrap();

        assert_eq!(e.submit("wrong").unwrap(), Feedback::Incorrect);
        assert_eq!(e.submit("wrong again").unwrap(), Feedback::Incorrect);

        let session = e.session().unwrap();
        assert_eq!(session.score(), Score { correct: 0, total: 1 });
        assert_eq!(session.errors().len(), 1);
        assert_eq!(session.errors()[0].user_answer, "wrong");
    }

    #[test]
    fn test_retype_does_not_rescore() {
        let mut e = engine(deck(3));
        e.start(3).unwrap();

        e.submit("nope").unwrap();
        e.retype().unwrap();
        assert_eq!(e.session().unwrap().feedback(), Feedback::None);
        assert!(e.session().unwrap().attempted_current());

        let answer = expected(&e);
        assert_eq!(e.submit(&answer).unwrap(), Feedback::Correct);
        assert_eq!(e.session().unwrap().score(), Score { correct: 0, total: 1 });
    }

    #[test]
    fn test_full_run_reaches_results() {
        let mut e = engine(deck(5));
        e.start(3).unwrap();

        for i in 0..3 {
            let answer = if i == 1 { "miss".to_string() } else { expected(&e) };
            e.submit(&answer).unwrap();
            let next = e.advance().unwrap();
            let want = if i < 2 {
                PracticeView::Active
            } else {
                PracticeView::Results
            };
            assert_eq!(next, want);
        }

        let PracticeSnapshot::Results(results) = e.snapshot() else {
            panic!("expected results");
        };
        assert_eq!(results.score, Score { correct: 2, total: 3 });
        assert_eq!(results.accuracy, Some(67));
        assert_eq!(results.skipped, 0);
        assert_eq!(results.errors.len(), 1);
        assert_eq!(results.errors[0].user_answer, "miss");
    }

    #[test]
    fn test_advance_without_check_counts_as_skipped() {
        let mut e = engine(deck(2));
        e.start(2).unwrap();
        e.advance().unwrap();
        e.advance().unwrap();

        let session = e.session().unwrap();
        assert_eq!(e.view(), PracticeView::Results);
        assert_eq!(session.skipped(), 2);
        assert_eq!(session.score().total, 0);
        assert_eq!(session.score().accuracy(), None);
    }

    #[test]
    fn test_actions_outside_active_are_rejected() {
        let mut e = engine(deck(2));
        assert!(matches!(
            e.submit("x"),
            Err(PracticeError::InvalidTransition { action: "submit", view: PracticeView::Setup })
        ));
        assert!(e.advance().is_err());
        assert!(e.retype().is_err());
        assert!(e.exit().is_err());
        assert!(e.restart().is_err());

        e.start(1).unwrap();
        assert!(e.start(1).is_err());
        assert!(e.restart().is_err());
    }

    #[test]
    fn test_exit_and_restart_discard_session() {
        let mut e = engine(deck(2));
        e.start(2).unwrap();
        e.submit("x").unwrap();
        e.exit().unwrap();
        assert_eq!(e.view(), PracticeView::Setup);
        assert!(e.session().is_none());

        e.start(1).unwrap();
        e.advance().unwrap();
        assert_eq!(e.view(), PracticeView::Results);
        e.restart().unwrap();
        assert_eq!(e.view(), PracticeView::Setup);
    }

    #[test]
    fn test_new_run_straight_from_results() {
        let mut e = engine(deck(2));
        e.start(1).unwrap();
        e.submit("x").unwrap();
        e.advance().unwrap();
        e.start(2).unwrap();
        let session = e.session().unwrap();
        assert_eq!(session.queue().len(), 2);
        assert_eq!(session.score(), Score::default());
        assert!(session.errors().is_empty());
    }

    #[test]
    fn test_hint_reveal() {
        let mut with_hint = card("h", "Apfel", "apple");
        with_hint.hint = Some("fruit".into());
        let mut e = engine(vec![with_hint]);
        e.start(1).unwrap();

        let PracticeSnapshot::Active(active) = e.snapshot() else {
            panic!("expected active");
        };
        assert!(active.has_hint);
        assert_eq!(active.hint, None);

        assert!(e.reveal_hint().unwrap());
        let PracticeSnapshot::Active(active) = e.snapshot() else {
            panic!("expected active");
        };
        assert_eq!(active.hint.as_deref(), Some("fruit"));

        e.submit("Apfel").unwrap();
        e.retype().unwrap();
        assert!(!e.session().unwrap().hint_shown());
    }

    #[test]
    fn test_hint_absent() {
        let mut e = engine(deck(1));
        e.start(1).unwrap();
        assert!(!e.reveal_hint().unwrap());
    }

    #[test]
    fn test_snapshot_reveals_answer_after_check() {
        let mut audio = card("a1", "Haus", "house");
        audio.has_audio = true;
        let mut e = engine(vec![audio]);
        e.start(1).unwrap();

        let PracticeSnapshot::Active(before) = e.snapshot() else {
            panic!("expected active");
        };
        assert_eq!(before.prompt, "house");
        assert_eq!(before.answer, None);
        assert_eq!(before.audio_url.as_deref(), Some("/api/audio/a1"));

        e.submit("haus").unwrap();
        let PracticeSnapshot::Active(after) = e.snapshot() else {
            panic!("expected active");
        };
        assert_eq!(after.feedback, Feedback::Correct);
        assert_eq!(after.answer.as_deref(), Some("Haus"));
    }

    #[test]
    fn test_presets() {
        let e = engine(deck(15));
        let presets = e.presets();
        let enabled: Vec<(usize, bool)> = presets.iter().map(|p| (p.limit, p.enabled)).collect();
        assert_eq!(enabled, vec![(10, true), (20, false), (50, false), (15, true)]);
        assert_eq!(presets[3].label, "All (15)");

        let few = engine(deck(3)).presets();
        assert!(few[0].enabled);
    }

    #[test]
    fn test_reload_applies_to_next_run() {
        let mut e = engine(deck(2));
        e.start(2).unwrap();
        e.reload(deck(6));
        assert_eq!(e.session().unwrap().queue().len(), 2);

        e.exit().unwrap();
        e.start_all().unwrap();
        assert_eq!(e.session().unwrap().queue().len(), 6);

        let mut empty = engine(Vec::new());
        empty.reload(deck(1));
        assert_eq!(empty.view(), PracticeView::Setup);
        empty.reload(Vec::new());
        assert_eq!(empty.view(), PracticeView::Empty);
    }

    #[test]
    fn test_blank_cards_are_ignored() {
        let e = engine(vec![card("x", "", "nothing"), card("y", "ja", "yes")]);
        assert_eq!(e.available(), 1);
    }
}
