use async_trait::async_trait;
use quiz_core::model::{Report, SessionKey, SessionSnapshot};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A stored report with its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub id: i64,
    pub session_key: SessionKey,
    pub report: Report,
}

/// Save/load contract for in-flight quiz sessions.
///
/// Sessions are stored as snapshots; rehydrating them needs the question bank,
/// which is the services layer's job.
#[async_trait]
pub trait QuizSessionRepository: Send + Sync {
    /// Insert or replace the snapshot stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save_session(
        &self,
        key: SessionKey,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError>;

    /// Fetch the snapshot stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend or decoding failures.
    async fn load_session(&self, key: SessionKey) -> Result<Option<SessionSnapshot>, StorageError>;

    /// Remove the snapshot stored under `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn delete_session(&self, key: SessionKey) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Append a report and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the report cannot be stored.
    async fn append_report(&self, key: SessionKey, report: &Report) -> Result<i64, StorageError>;

    /// Fetch a report by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_report(&self, id: i64) -> Result<Report, StorageError>;

    /// Id of the report stored for `key`, if one was appended.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn report_id_for_session(&self, key: SessionKey) -> Result<Option<i64>, StorageError>;

    /// Most recent reports first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend or decoding failures.
    async fn list_reports(&self, limit: u32) -> Result<Vec<ReportRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<SessionKey, SessionSnapshot>>>,
    reports: Arc<Mutex<Vec<ReportRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl QuizSessionRepository for InMemoryRepository {
    async fn save_session(
        &self,
        key: SessionKey,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        guard.insert(key, snapshot.clone());
        Ok(())
    }

    async fn load_session(&self, key: SessionKey) -> Result<Option<SessionSnapshot>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard.get(&key).cloned())
    }

    async fn delete_session(&self, key: SessionKey) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        guard.remove(&key);
        Ok(())
    }
}

#[async_trait]
impl ReportRepository for InMemoryRepository {
    async fn append_report(&self, key: SessionKey, report: &Report) -> Result<i64, StorageError> {
        let mut guard = self.reports.lock().map_err(poisoned)?;
        let id = i64::try_from(guard.len() + 1)
            .map_err(|_| StorageError::Serialization("report id overflow".into()))?;
        guard.push(ReportRow {
            id,
            session_key: key,
            report: report.clone(),
        });
        Ok(id)
    }

    async fn get_report(&self, id: i64) -> Result<Report, StorageError> {
        let guard = self.reports.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.report.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn report_id_for_session(&self, key: SessionKey) -> Result<Option<i64>, StorageError> {
        let guard = self.reports.lock().map_err(poisoned)?;
        Ok(guard.iter().find(|row| row.session_key == key).map(|row| row.id))
    }

    async fn list_reports(&self, limit: u32) -> Result<Vec<ReportRow>, StorageError> {
        let guard = self.reports.lock().map_err(poisoned)?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(guard.iter().rev().take(limit).cloned().collect())
    }
}

/// Aggregates session and report repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn QuizSessionRepository>,
    pub reports: Arc<dyn ReportRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sessions: Arc<dyn QuizSessionRepository> = Arc::new(repo.clone());
        let reports: Arc<dyn ReportRepository> = Arc::new(repo);
        Self { sessions, reports }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{QuestionBank, QuizSession, RawAnswer, summarize};
    use quiz_core::time::fixed_now;

    fn completed_report(bank: &QuestionBank) -> Report {
        let mut session = QuizSession::new(bank);
        session.start(fixed_now()).unwrap();
        session.submit_answer(RawAnswer::choice(1)).unwrap();
        while !session.is_completed() {
            session.advance(fixed_now()).unwrap();
        }
        summarize(&session, bank).unwrap()
    }

    #[tokio::test]
    async fn saves_and_replaces_sessions() {
        let repo = InMemoryRepository::new();
        let bank = QuestionBank::embedded().unwrap();
        let key = SessionKey::generate();

        let mut session = QuizSession::new(&bank);
        repo.save_session(key, &session.snapshot()).await.unwrap();

        session.start(fixed_now()).unwrap();
        repo.save_session(key, &session.snapshot()).await.unwrap();

        let loaded = repo.load_session(key).await.unwrap().unwrap();
        assert_eq!(loaded, session.snapshot());
    }

    #[tokio::test]
    async fn missing_session_loads_as_none() {
        let repo = InMemoryRepository::new();
        assert!(repo.load_session(SessionKey::generate()).await.unwrap().is_none());
        repo.delete_session(SessionKey::generate()).await.unwrap();
    }

    #[tokio::test]
    async fn reports_list_newest_first() {
        let repo = InMemoryRepository::new();
        let bank = QuestionBank::embedded().unwrap();
        let report = completed_report(&bank);

        let first = repo.append_report(SessionKey::generate(), &report).await.unwrap();
        let second = repo.append_report(SessionKey::generate(), &report).await.unwrap();
        assert!(second > first);

        let rows = repo.list_reports(10).await.unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), [second, first]);
        assert_eq!(repo.list_reports(1).await.unwrap().len(), 1);
        assert_eq!(repo.get_report(first).await.unwrap(), report);
        assert!(matches!(
            repo.get_report(99).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn report_lookup_by_session_key() {
        let repo = InMemoryRepository::new();
        let bank = QuestionBank::embedded().unwrap();
        let report = completed_report(&bank);
        let key = SessionKey::generate();

        assert_eq!(repo.report_id_for_session(key).await.unwrap(), None);
        repo.append_report(SessionKey::generate(), &report).await.unwrap();
        let id = repo.append_report(key, &report).await.unwrap();
        assert_eq!(repo.report_id_for_session(key).await.unwrap(), Some(id));
    }
}
