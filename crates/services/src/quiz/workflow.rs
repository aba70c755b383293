use std::sync::Arc;

use quiz_core::model::{
    QuestionBank, QuestionId, QuizSession, RawAnswer, Report, SessionError, SessionKey,
    SessionState, summarize,
};
use quiz_core::{Clock, is_correct};
use rand::seq::SliceRandom;
use storage::repository::{QuizSessionRepository, ReportRepository, Storage};

use super::service::{AnswerFeedback, QuizAttempt};
use crate::auth::AuthProvider;
use crate::bank_source::{BankSource, load_bank};
use crate::error::QuizServiceError;

/// Result of moving past a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceResult {
    pub state: SessionState,
    pub is_complete: bool,
    pub report_id: Option<i64>,
}

/// Orchestrates quiz attempts: auth gate, answering, persistence and reporting.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    bank: Arc<QuestionBank>,
    auth: Arc<dyn AuthProvider>,
    sessions: Arc<dyn QuizSessionRepository>,
    reports: Arc<dyn ReportRepository>,
    shuffle: bool,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        bank: Arc<QuestionBank>,
        auth: Arc<dyn AuthProvider>,
        sessions: Arc<dyn QuizSessionRepository>,
        reports: Arc<dyn ReportRepository>,
    ) -> Self {
        Self {
            clock: Clock::default(),
            bank,
            auth,
            sessions,
            reports,
            shuffle: false,
        }
    }

    /// Load a bank from `source` and wire it to `storage`.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Source` if the bank cannot be fetched or fails validation.
    pub async fn load(
        source: &dyn BankSource,
        storage: &Storage,
        auth: Arc<dyn AuthProvider>,
    ) -> Result<Self, QuizServiceError> {
        let bank = load_bank(source).await?;
        Ok(Self::new(
            Arc::new(bank),
            auth,
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.reports),
        ))
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Present questions in a random order per attempt.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    fn require_auth(&self) -> Result<(), QuizServiceError> {
        match self.auth.get_session() {
            Some(_) => Ok(()),
            None => {
                log::warn!("refused to start quiz: no signed-in learner");
                Err(QuizServiceError::Unauthenticated)
            }
        }
    }

    fn fresh_session(&self) -> Result<QuizSession, QuizServiceError> {
        if !self.shuffle {
            return Ok(QuizSession::new(&self.bank));
        }
        let mut order: Vec<QuestionId> = self.bank.ids().collect();
        order.shuffle(&mut rand::rng());
        Ok(QuizSession::with_order(&self.bank, order)?)
    }

    async fn persist(
        &self,
        key: SessionKey,
        session: &QuizSession,
    ) -> Result<(), QuizServiceError> {
        if let Err(err) = self.sessions.save_session(key, &session.snapshot()).await {
            log::warn!("failed to save quiz session {key}: {err}");
            return Err(err.into());
        }
        Ok(())
    }

    /// Start a new attempt for the signed-in learner.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Unauthenticated` when nobody is signed in, or
    /// `QuizServiceError::Storage` if the new attempt cannot be saved.
    pub async fn start_session(&self) -> Result<QuizAttempt, QuizServiceError> {
        self.require_auth()?;
        let mut session = self.fresh_session()?;
        session.start(self.clock.now())?;

        let key = SessionKey::generate();
        self.persist(key, &session).await?;
        log::info!("started quiz attempt {key}");
        Ok(QuizAttempt::new(key, session))
    }

    /// Record an answer for the current question and return its feedback.
    ///
    /// The attempt stays on the same question until [`advance`](Self::advance).
    /// Nothing changes in `attempt` unless the answer was saved.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Session` if the attempt is not in progress, or
    /// `QuizServiceError::Storage` if the answer cannot be saved.
    pub async fn submit(
        &self,
        attempt: &mut QuizAttempt,
        answer: RawAnswer,
    ) -> Result<AnswerFeedback, QuizServiceError> {
        let mut session = attempt.session().clone();
        let question_id = session.submit_answer(answer)?;
        let question = self
            .bank
            .get(question_id)
            .ok_or(SessionError::OrderMismatch)?;
        let recorded = session
            .answer_for(question_id)
            .ok_or(SessionError::OrderMismatch)?;

        let feedback = AnswerFeedback {
            question_id,
            was_correct: is_correct(question, recorded),
            feedback: question.feedback().to_owned(),
        };

        self.persist(attempt.key(), &session).await?;
        *attempt.session_mut() = session;
        Ok(feedback)
    }

    /// Move to the next question. After the last one the report is stored
    /// and the session snapshot is dropped.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Session` if the attempt is not in progress, or
    /// `QuizServiceError::Storage` if persistence fails. A failed save leaves
    /// `attempt` where it was. Once the attempt is completed, a failed report
    /// append or cleanup can be retried with [`finalize_report`](Self::finalize_report).
    pub async fn advance(
        &self,
        attempt: &mut QuizAttempt,
    ) -> Result<AdvanceResult, QuizServiceError> {
        let mut session = attempt.session().clone();
        let state = session.advance(self.clock.now())?;
        self.persist(attempt.key(), &session).await?;
        *attempt.session_mut() = session;

        if state == SessionState::Completed {
            self.finalize_report(attempt).await?;
        }

        Ok(AdvanceResult {
            state,
            is_complete: attempt.is_complete(),
            report_id: attempt.report_id(),
        })
    }

    /// Store the report of a completed attempt and drop its snapshot.
    ///
    /// At most one report is stored per session key, so calling this again
    /// after a partial failure only finishes the cleanup.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Report` if the attempt is not complete, or
    /// `QuizServiceError::Storage` if persistence fails.
    pub async fn finalize_report(
        &self,
        attempt: &mut QuizAttempt,
    ) -> Result<i64, QuizServiceError> {
        let key = attempt.key();
        let report = self.report(attempt)?;

        let id = match attempt.report_id() {
            Some(id) => id,
            None => match self.reports.report_id_for_session(key).await? {
                Some(id) => {
                    log::debug!("report {id} already stored for {key}");
                    id
                }
                None => match self.reports.append_report(key, &report).await {
                    Ok(id) => id,
                    Err(err) => {
                        log::warn!("failed to store report for {key}: {err}");
                        return Err(err.into());
                    }
                },
            },
        };
        attempt.set_report_id(Some(id));

        if let Err(err) = self.sessions.delete_session(key).await {
            log::warn!("failed to drop finished quiz session {key}: {err}");
            return Err(err.into());
        }
        Ok(id)
    }

    /// Score a completed attempt without storing anything.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Report` if the attempt is not complete.
    pub fn report(&self, attempt: &QuizAttempt) -> Result<Report, QuizServiceError> {
        Ok(summarize(attempt.session(), &self.bank)?)
    }

    /// Drop all answers and return the attempt to `NotStarted`.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` if the reset attempt cannot be saved.
    pub async fn reset(&self, attempt: &mut QuizAttempt) -> Result<(), QuizServiceError> {
        let mut session = attempt.session().clone();
        session.reset();
        self.persist(attempt.key(), &session).await?;
        *attempt.session_mut() = session;
        attempt.set_report_id(None);
        Ok(())
    }

    /// Reset and immediately start again under the same key.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Unauthenticated` when nobody is signed in, or
    /// `QuizServiceError::Storage` if persistence fails.
    pub async fn restart(&self, attempt: &mut QuizAttempt) -> Result<(), QuizServiceError> {
        self.require_auth()?;
        let mut session = attempt.session().clone();
        session.reset();
        session.start(self.clock.now())?;
        self.persist(attempt.key(), &session).await?;
        *attempt.session_mut() = session;
        attempt.set_report_id(None);
        Ok(())
    }

    /// Reload a stored attempt.
    ///
    /// Returns `Ok(None)` for unknown keys and for finished attempts that were
    /// cleaned up. A completed attempt is only returned when its finalization was
    /// interrupted; hand it to [`finalize_report`](Self::finalize_report).
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` for backend failures and
    /// `QuizServiceError::Session` if the stored snapshot does not fit the loaded bank.
    pub async fn resume(&self, key: SessionKey) -> Result<Option<QuizAttempt>, QuizServiceError> {
        let Some(snapshot) = self.sessions.load_session(key).await? else {
            return Ok(None);
        };
        let session = QuizSession::from_snapshot(&self.bank, snapshot)?;
        log::debug!("resumed quiz attempt {key} ({})", session.state());

        let mut attempt = QuizAttempt::new(key, session);
        if attempt.is_complete() {
            attempt.set_report_id(self.reports.report_id_for_session(key).await?);
        }
        Ok(Some(attempt))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthSession, AuthState};
    use async_trait::async_trait;
    use quiz_core::model::SessionSnapshot;
    use quiz_core::time::fixed_clock;
    use std::sync::atomic::{AtomicBool, Ordering};
    use storage::repository::{InMemoryRepository, ReportRow, StorageError};

    /// In-memory storage whose writes can be switched to fail.
    #[derive(Clone, Default)]
    struct Faulty {
        inner: InMemoryRepository,
        fail_save: Arc<AtomicBool>,
        fail_delete: Arc<AtomicBool>,
        fail_append: Arc<AtomicBool>,
    }

    fn unavailable() -> StorageError {
        StorageError::Connection("unavailable".into())
    }

    #[async_trait]
    impl QuizSessionRepository for Faulty {
        async fn save_session(
            &self,
            key: SessionKey,
            snapshot: &SessionSnapshot,
        ) -> Result<(), StorageError> {
            if self.fail_save.load(Ordering::SeqCst) {
                return Err(unavailable());
            }
            self.inner.save_session(key, snapshot).await
        }

        async fn load_session(
            &self,
            key: SessionKey,
        ) -> Result<Option<SessionSnapshot>, StorageError> {
            self.inner.load_session(key).await
        }

        async fn delete_session(&self, key: SessionKey) -> Result<(), StorageError> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(unavailable());
            }
            self.inner.delete_session(key).await
        }
    }

    #[async_trait]
    impl ReportRepository for Faulty {
        async fn append_report(
            &self,
            key: SessionKey,
            report: &Report,
        ) -> Result<i64, StorageError> {
            if self.fail_append.load(Ordering::SeqCst) {
                return Err(unavailable());
            }
            self.inner.append_report(key, report).await
        }

        async fn get_report(&self, id: i64) -> Result<Report, StorageError> {
            self.inner.get_report(id).await
        }

        async fn report_id_for_session(
            &self,
            key: SessionKey,
        ) -> Result<Option<i64>, StorageError> {
            self.inner.report_id_for_session(key).await
        }

        async fn list_reports(&self, limit: u32) -> Result<Vec<ReportRow>, StorageError> {
            self.inner.list_reports(limit).await
        }
    }

    fn faulty_service() -> (QuizLoopService, Faulty) {
        let repo = Faulty::default();
        let svc = QuizLoopService::new(
            Arc::new(QuestionBank::embedded().unwrap()),
            Arc::new(signed_in()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
        .with_clock(fixed_clock());
        (svc, repo)
    }

    async fn advance_to_last(svc: &QuizLoopService, attempt: &mut QuizAttempt) {
        while attempt.session().question_index() + 1 < attempt.session().question_count() {
            svc.advance(attempt).await.unwrap();
        }
    }

    fn service(auth: AuthState) -> (QuizLoopService, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        let svc = QuizLoopService::new(
            Arc::new(QuestionBank::embedded().unwrap()),
            Arc::new(auth),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
        .with_clock(fixed_clock());
        (svc, repo)
    }

    fn signed_in() -> AuthState {
        AuthState::signed_in(AuthSession::new("learner"))
    }

    #[tokio::test]
    async fn start_requires_signed_in_learner() {
        let (svc, _) = service(AuthState::signed_out());
        let err = svc.start_session().await.unwrap_err();
        assert!(matches!(err, QuizServiceError::Unauthenticated));
    }

    #[tokio::test]
    async fn submit_returns_feedback_without_advancing() {
        let (svc, _) = service(signed_in());
        let mut attempt = svc.start_session().await.unwrap();

        let fb = svc.submit(&mut attempt, RawAnswer::choice(1)).await.unwrap();
        assert_eq!(fb.question_id, QuestionId::new(1));
        assert!(fb.was_correct);
        assert!(fb.feedback.contains("1887"));
        assert_eq!(attempt.session().question_index(), 0);

        let fb = svc.submit(&mut attempt, RawAnswer::choice(3)).await.unwrap();
        assert!(!fb.was_correct);
    }

    #[tokio::test]
    async fn completing_stores_report_once_and_drops_snapshot() {
        let (svc, repo) = service(signed_in());
        let mut attempt = svc.start_session().await.unwrap();
        svc.submit(&mut attempt, RawAnswer::choice(1)).await.unwrap();

        let mut last = None;
        while !attempt.is_complete() {
            last = Some(svc.advance(&mut attempt).await.unwrap());
        }
        let last = last.unwrap();
        assert!(last.is_complete);
        let report_id = last.report_id.unwrap();

        assert_eq!(svc.finalize_report(&mut attempt).await.unwrap(), report_id);
        assert_eq!(repo.list_reports(10).await.unwrap().len(), 1);

        let stored = repo.get_report(report_id).await.unwrap();
        assert_eq!(stored.correct_count(), 1);
        assert!(svc.resume(attempt.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resume_restores_in_progress_attempt() {
        let (svc, _) = service(signed_in());
        let mut attempt = svc.start_session().await.unwrap();
        svc.submit(&mut attempt, RawAnswer::choice(1)).await.unwrap();
        svc.advance(&mut attempt).await.unwrap();

        let resumed = svc.resume(attempt.key()).await.unwrap().unwrap();
        assert_eq!(resumed.session(), attempt.session());
        assert_eq!(resumed.progress().position, 2);
    }

    #[tokio::test]
    async fn operations_on_finished_attempt_fail() {
        let (svc, _) = service(signed_in());
        let mut attempt = svc.start_session().await.unwrap();
        while !attempt.is_complete() {
            svc.advance(&mut attempt).await.unwrap();
        }
        let err = svc
            .submit(&mut attempt, RawAnswer::text("late"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QuizServiceError::Session(SessionError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn report_before_completion_fails() {
        let (svc, _) = service(signed_in());
        let attempt = svc.start_session().await.unwrap();
        assert!(matches!(
            svc.report(&attempt),
            Err(QuizServiceError::Report(_))
        ));
    }

    #[tokio::test]
    async fn restart_clears_answers_and_starts_again() {
        let (svc, _) = service(signed_in());
        let mut attempt = svc.start_session().await.unwrap();
        svc.submit(&mut attempt, RawAnswer::choice(1)).await.unwrap();

        svc.restart(&mut attempt).await.unwrap();
        assert_eq!(attempt.state(), SessionState::InProgress);
        assert!(attempt.session().answers().is_empty());

        svc.reset(&mut attempt).await.unwrap();
        assert_eq!(attempt.state(), SessionState::NotStarted);
    }

    #[tokio::test]
    async fn shuffled_attempt_still_covers_the_bank() {
        let (svc, _) = service(signed_in());
        let svc = svc.with_shuffle(true);
        let attempt = svc.start_session().await.unwrap();

        let mut order: Vec<u32> = attempt.session().order().iter().map(|id| id.value()).collect();
        order.sort_unstable();
        assert_eq!(order, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn failed_save_leaves_attempt_untouched() {
        let (svc, repo) = faulty_service();
        let mut attempt = svc.start_session().await.unwrap();
        repo.fail_save.store(true, Ordering::SeqCst);

        let err = svc
            .submit(&mut attempt, RawAnswer::choice(1))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizServiceError::Storage(_)));
        assert!(attempt.session().answers().is_empty());

        assert!(svc.advance(&mut attempt).await.is_err());
        assert_eq!(attempt.session().question_index(), 0);

        repo.fail_save.store(false, Ordering::SeqCst);
        svc.submit(&mut attempt, RawAnswer::choice(1)).await.unwrap();
        svc.advance(&mut attempt).await.unwrap();
        assert_eq!(attempt.session().question_index(), 1);

        let stored = repo.load_session(attempt.key()).await.unwrap().unwrap();
        assert_eq!(&stored, &attempt.session().snapshot());
    }

    #[tokio::test]
    async fn failed_final_save_can_be_retried() {
        let (svc, repo) = faulty_service();
        let mut attempt = svc.start_session().await.unwrap();
        advance_to_last(&svc, &mut attempt).await;

        repo.fail_save.store(true, Ordering::SeqCst);
        assert!(svc.advance(&mut attempt).await.is_err());
        assert!(!attempt.is_complete());

        repo.fail_save.store(false, Ordering::SeqCst);
        let result = svc.advance(&mut attempt).await.unwrap();
        assert!(result.is_complete);
        assert!(result.report_id.is_some());
    }

    #[tokio::test]
    async fn interrupted_cleanup_never_stores_a_second_report() {
        let (svc, repo) = faulty_service();
        let mut attempt = svc.start_session().await.unwrap();
        advance_to_last(&svc, &mut attempt).await;

        repo.fail_delete.store(true, Ordering::SeqCst);
        assert!(svc.advance(&mut attempt).await.is_err());
        let first_id = attempt.report_id().unwrap();

        repo.fail_delete.store(false, Ordering::SeqCst);
        let mut resumed = svc.resume(attempt.key()).await.unwrap().unwrap();
        assert!(resumed.is_complete());
        assert_eq!(resumed.report_id(), Some(first_id));

        assert_eq!(svc.finalize_report(&mut resumed).await.unwrap(), first_id);
        assert_eq!(repo.list_reports(10).await.unwrap().len(), 1);
        assert!(svc.resume(attempt.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_append_is_stored_on_resume() {
        let (svc, repo) = faulty_service();
        let mut attempt = svc.start_session().await.unwrap();
        advance_to_last(&svc, &mut attempt).await;

        repo.fail_append.store(true, Ordering::SeqCst);
        assert!(svc.advance(&mut attempt).await.is_err());
        assert!(attempt.is_complete());
        assert!(attempt.report_id().is_none());

        repo.fail_append.store(false, Ordering::SeqCst);
        let mut resumed = svc.resume(attempt.key()).await.unwrap().unwrap();
        assert!(resumed.report_id().is_none());

        let id = svc.finalize_report(&mut resumed).await.unwrap();
        assert_eq!(repo.list_reports(10).await.unwrap().len(), 1);
        assert_eq!(repo.report_id_for_session(attempt.key()).await.unwrap(), Some(id));
        assert!(svc.resume(attempt.key()).await.unwrap().is_none());
    }
}
