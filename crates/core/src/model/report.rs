use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{QuestionBank, QuestionId, QuizSession, SessionState};
use crate::validator::is_correct;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReportError {
    #[error("session is {state}; reports need a completed session")]
    SessionNotComplete { state: SessionState },

    #[error("correct count ({correct}) does not match per-question results ({actual})")]
    CountMismatch { correct: usize, actual: usize },

    #[error("completed_at is before started_at")]
    InvalidTimeRange,
}

/// Result for one question, in bank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: QuestionId,
    pub answered: bool,
    pub was_correct: bool,
    pub feedback: String,
}

/// Serialized shape of a [`Report`]; checked on the way back in.
#[derive(Serialize, Deserialize)]
pub struct ReportRecord {
    total_questions: usize,
    correct_count: usize,
    per_question: Vec<QuestionOutcome>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// Score and feedback derived from a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ReportRecord", into = "ReportRecord")]
pub struct Report {
    correct_count: usize,
    per_question: Vec<QuestionOutcome>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// Score a completed session against its bank.
///
/// Every bank question appears exactly once, in bank order; unanswered questions
/// count as incorrect.
///
/// # Errors
///
/// Returns `ReportError::SessionNotComplete` unless the session is completed.
pub fn summarize(session: &QuizSession, bank: &QuestionBank) -> Result<Report, ReportError> {
    if !session.is_completed() {
        return Err(ReportError::SessionNotComplete {
            state: session.state(),
        });
    }

    let per_question: Vec<QuestionOutcome> = bank
        .questions()
        .iter()
        .map(|question| {
            let answer = session.answer_for(question.id());
            QuestionOutcome {
                question_id: question.id(),
                answered: answer.is_some(),
                was_correct: answer.is_some_and(|a| is_correct(question, a)),
                feedback: question.feedback().to_owned(),
            }
        })
        .collect();

    let correct_count = per_question.iter().filter(|o| o.was_correct).count();
    log::info!(
        "quiz completed: {correct_count}/{} correct",
        per_question.len()
    );

    Ok(Report {
        correct_count,
        per_question,
        started_at: session.started_at(),
        completed_at: session.completed_at(),
    })
}

impl Report {
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.per_question.len()
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.per_question.iter().filter(|o| o.answered).count()
    }

    #[must_use]
    pub fn per_question(&self) -> &[QuestionOutcome] {
        &self.per_question
    }

    #[must_use]
    pub fn outcome(&self, id: QuestionId) -> Option<&QuestionOutcome> {
        self.per_question.iter().find(|o| o.question_id == id)
    }

    /// Share of correct answers in `0.0..=100.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self) -> f64 {
        if self.per_question.is_empty() {
            return 0.0;
        }
        self.correct_count as f64 * 100.0 / self.per_question.len() as f64
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

impl TryFrom<ReportRecord> for Report {
    type Error = ReportError;

    fn try_from(record: ReportRecord) -> Result<Self, Self::Error> {
        let actual = record.per_question.iter().filter(|o| o.was_correct).count();
        if actual != record.correct_count || record.total_questions != record.per_question.len() {
            return Err(ReportError::CountMismatch {
                correct: record.correct_count,
                actual,
            });
        }
        if let (Some(started), Some(completed)) = (record.started_at, record.completed_at) {
            if completed < started {
                return Err(ReportError::InvalidTimeRange);
            }
        }

        Ok(Self {
            correct_count: record.correct_count,
            per_question: record.per_question,
            started_at: record.started_at,
            completed_at: record.completed_at,
        })
    }
}

impl From<Report> for ReportRecord {
    fn from(report: Report) -> Self {
        Self {
            total_questions: report.per_question.len(),
            correct_count: report.correct_count,
            per_question: report.per_question,
            started_at: report.started_at,
            completed_at: report.completed_at,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
