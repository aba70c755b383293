use std::fmt;

use quiz_core::model::{Question, QuestionBank, QuestionId, QuizSession, SessionKey, SessionState};
use serde::Serialize;

use super::progress::SessionProgress;

/// Immediate result of submitting an answer, before moving on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerFeedback {
    pub question_id: QuestionId,
    pub was_correct: bool,
    pub feedback: String,
}

/// A learner's quiz attempt together with the key it is stored under.
pub struct QuizAttempt {
    key: SessionKey,
    session: QuizSession,
    report_id: Option<i64>,
}

impl QuizAttempt {
    pub(crate) fn new(key: SessionKey, session: QuizSession) -> Self {
        Self {
            key,
            session,
            report_id: None,
        }
    }

    #[must_use]
    pub fn key(&self) -> SessionKey {
        self.key
    }

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    pub(crate) fn session_mut(&mut self) -> &mut QuizSession {
        &mut self.session
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.session.is_completed()
    }

    /// Id of the stored report, once the attempt is completed and persisted.
    #[must_use]
    pub fn report_id(&self) -> Option<i64> {
        self.report_id
    }

    pub(crate) fn set_report_id(&mut self, id: Option<i64>) {
        self.report_id = id;
    }

    #[must_use]
    pub fn current_question<'b>(&self, bank: &'b QuestionBank) -> Option<&'b Question> {
        self.session.current_question(bank)
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.session.question_count();
        let index = self.session.question_index();
        let position = match self.session.state() {
            SessionState::NotStarted => 0,
            SessionState::InProgress => index + 1,
            SessionState::Completed => total,
        };

        SessionProgress {
            total,
            answered: self.session.answers().len(),
            position,
            remaining: total.saturating_sub(index),
            is_complete: self.session.is_completed(),
        }
    }
}

impl fmt::Debug for QuizAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizAttempt")
            .field("key", &self.key)
            .field("state", &self.session.state())
            .field("question_index", &self.session.question_index())
            .field("answers_len", &self.session.answers().len())
            .field("report_id", &self.report_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::RawAnswer;
    use quiz_core::time::fixed_now;

    #[test]
    fn progress_tracks_position_and_answers() {
        let bank = QuestionBank::embedded().unwrap();
        let mut attempt = QuizAttempt::new(SessionKey::generate(), QuizSession::new(&bank));

        let progress = attempt.progress();
        assert_eq!(progress.position, 0);
        assert_eq!(progress.remaining, 10);

        let session = attempt.session_mut();
        session.start(fixed_now()).unwrap();
        session.submit_answer(RawAnswer::choice(1)).unwrap();
        session.advance(fixed_now()).unwrap();

        let progress = attempt.progress();
        assert_eq!(progress.total, 10);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.position, 2);
        assert_eq!(progress.remaining, 9);
        assert!(!progress.is_complete);
    }

    #[test]
    fn finished_attempt_reports_no_remaining() {
        let bank = QuestionBank::embedded().unwrap();
        let mut attempt = QuizAttempt::new(SessionKey::generate(), QuizSession::new(&bank));
        let session = attempt.session_mut();
        session.start(fixed_now()).unwrap();
        while !session.is_completed() {
            session.advance(fixed_now()).unwrap();
        }

        let progress = attempt.progress();
        assert_eq!(progress.position, 10);
        assert_eq!(progress.remaining, 0);
        assert!(progress.is_complete);
        assert!(attempt.current_question(&bank).is_none());
    }
}
