use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

use crate::model::{Question, QuestionBank, QuestionId, RawAnswer};

//
// ─── STATES ────────────────────────────────────────────────────────────────────
//

/// Lifecycle of a quiz attempt: `NotStarted -> InProgress -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    InProgress,
    Completed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::NotStarted => "not started",
            SessionState::InProgress => "in progress",
            SessionState::Completed => "completed",
        })
    }
}

/// Mutating operations, named in transition errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    Start,
    Submit,
    Advance,
}

impl fmt::Display for SessionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionOp::Start => "start",
            SessionOp::Submit => "submit an answer",
            SessionOp::Advance => "advance",
        })
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("cannot {operation} while the session is {state}")]
    InvalidStateTransition {
        operation: SessionOp,
        state: SessionState,
    },

    #[error("question order does not match the bank")]
    OrderMismatch,

    #[error("invalid session snapshot: {0}")]
    InvalidSnapshot(&'static str),
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub question_id: QuestionId,
    pub answer: RawAnswer,
}

/// Persisted form of a [`QuizSession`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub order: Vec<QuestionId>,
    pub question_index: usize,
    pub state: SessionState,
    pub answers: Vec<AnswerEntry>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One learner's attempt at a question bank.
///
/// All mutation goes through [`start`](Self::start), [`submit_answer`](Self::submit_answer),
/// [`advance`](Self::advance) and [`reset`](Self::reset). Answers are keyed by
/// question id, so the presentation order may differ from bank order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSession {
    order: Vec<QuestionId>,
    question_index: usize,
    state: SessionState,
    answers: BTreeMap<QuestionId, RawAnswer>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl QuizSession {
    /// A fresh session presenting questions in bank order.
    #[must_use]
    pub fn new(bank: &QuestionBank) -> Self {
        Self::unchecked(bank.ids().collect())
    }

    /// A fresh session presenting questions in a custom order.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OrderMismatch` unless `order` is a permutation of the bank's ids.
    pub fn with_order(bank: &QuestionBank, order: Vec<QuestionId>) -> Result<Self, SessionError> {
        check_order(bank, &order)?;
        Ok(Self::unchecked(order))
    }

    fn unchecked(order: Vec<QuestionId>) -> Self {
        Self {
            order,
            question_index: 0,
            state: SessionState::NotStarted,
            answers: BTreeMap::new(),
            started_at: None,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state != SessionState::NotStarted
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == SessionState::Completed
    }

    /// Current position, between 0 and `question_count()` inclusive.
    #[must_use]
    pub fn question_index(&self) -> usize {
        self.question_index
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.order.len()
    }

    /// Presentation order of question ids.
    #[must_use]
    pub fn order(&self) -> &[QuestionId] {
        &self.order
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<QuestionId, RawAnswer> {
        &self.answers
    }

    #[must_use]
    pub fn answer_for(&self, id: QuestionId) -> Option<&RawAnswer> {
        self.answers.get(&id)
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Id of the question being shown; `None` unless the session is in progress.
    #[must_use]
    pub fn current_question_id(&self) -> Option<QuestionId> {
        if self.state == SessionState::InProgress {
            self.order.get(self.question_index).copied()
        } else {
            None
        }
    }

    #[must_use]
    pub fn current_question<'b>(&self, bank: &'b QuestionBank) -> Option<&'b Question> {
        self.current_question_id().and_then(|id| bank.get(id))
    }

    /// `NotStarted -> InProgress`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidStateTransition` if the session was already started.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.require(SessionOp::Start, SessionState::NotStarted)?;
        self.state = SessionState::InProgress;
        self.question_index = 0;
        self.started_at = Some(now);
        log::debug!("quiz session started with {} questions", self.order.len());
        Ok(())
    }

    /// Record an answer for the current question without moving on.
    ///
    /// Resubmitting replaces the earlier answer.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidStateTransition` unless the session is in progress.
    /// `answers` is left untouched on error.
    pub fn submit_answer(&mut self, answer: RawAnswer) -> Result<QuestionId, SessionError> {
        self.require(SessionOp::Submit, SessionState::InProgress)?;
        let id = self
            .current_question_id()
            .ok_or(SessionError::InvalidStateTransition {
                operation: SessionOp::Submit,
                state: self.state,
            })?;

        if let Some(previous) = self.answers.insert(id, answer) {
            log::debug!("question {id}: replaced earlier answer {previous}");
        }
        Ok(id)
    }

    /// Move to the next question, completing the session after the last one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidStateTransition` unless the session is in progress.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<SessionState, SessionError> {
        self.require(SessionOp::Advance, SessionState::InProgress)?;
        self.question_index += 1;
        if self.question_index >= self.order.len() {
            self.question_index = self.order.len();
            self.state = SessionState::Completed;
            self.completed_at = Some(now);
            log::debug!("quiz session completed");
        }
        Ok(self.state)
    }

    /// Return to `NotStarted` from any state, dropping all answers. Idempotent.
    pub fn reset(&mut self) {
        self.state = SessionState::NotStarted;
        self.question_index = 0;
        self.answers.clear();
        self.started_at = None;
        self.completed_at = None;
    }

    fn require(&self, operation: SessionOp, expected: SessionState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidStateTransition {
                operation,
                state: self.state,
            })
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            order: self.order.clone(),
            question_index: self.question_index,
            state: self.state,
            answers: self
                .answers
                .iter()
                .map(|(id, answer)| AnswerEntry {
                    question_id: *id,
                    answer: answer.clone(),
                })
                .collect(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    /// Rehydrate a session, checking it against the bank it will be used with.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OrderMismatch` if the stored order is not a permutation
    /// of the bank, and `SessionError::InvalidSnapshot` if position, state, answers or
    /// timestamps are inconsistent with each other.
    pub fn from_snapshot(
        bank: &QuestionBank,
        snapshot: SessionSnapshot,
    ) -> Result<Self, SessionError> {
        check_order(bank, &snapshot.order)?;
        let count = snapshot.order.len();

        match snapshot.state {
            SessionState::NotStarted => {
                if snapshot.question_index != 0
                    || !snapshot.answers.is_empty()
                    || snapshot.started_at.is_some()
                    || snapshot.completed_at.is_some()
                {
                    return Err(SessionError::InvalidSnapshot("unstarted session carries progress"));
                }
            }
            SessionState::InProgress => {
                if snapshot.question_index >= count {
                    return Err(SessionError::InvalidSnapshot("position past the last question"));
                }
                if snapshot.started_at.is_none() || snapshot.completed_at.is_some() {
                    return Err(SessionError::InvalidSnapshot("timestamps do not match state"));
                }
            }
            SessionState::Completed => {
                if snapshot.question_index != count {
                    return Err(SessionError::InvalidSnapshot(
                        "completed session is not at the end",
                    ));
                }
                match (snapshot.started_at, snapshot.completed_at) {
                    (Some(started), Some(completed)) if completed >= started => {}
                    _ => return Err(SessionError::InvalidSnapshot("timestamps do not match state")),
                }
            }
        }

        let mut answers = BTreeMap::new();
        for entry in snapshot.answers {
            if !bank.contains(entry.question_id) {
                return Err(SessionError::InvalidSnapshot("answer for unknown question"));
            }
            if answers.insert(entry.question_id, entry.answer).is_some() {
                return Err(SessionError::InvalidSnapshot("duplicate answer entry"));
            }
        }

        Ok(Self {
            order: snapshot.order,
            question_index: snapshot.question_index,
            state: snapshot.state,
            answers,
            started_at: snapshot.started_at,
            completed_at: snapshot.completed_at,
        })
    }
}

fn check_order(bank: &QuestionBank, order: &[QuestionId]) -> Result<(), SessionError> {
    if order.len() != bank.len() {
        return Err(SessionError::OrderMismatch);
    }
    let mut seen = HashSet::with_capacity(order.len());
    for id in order {
        if !bank.contains(*id) || !seen.insert(*id) {
            return Err(SessionError::OrderMismatch);
        }
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
