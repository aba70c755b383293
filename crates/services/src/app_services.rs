use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::auth::AuthProvider;
use crate::bank_source::BankSource;
use crate::error::AppServicesError;
use crate::quiz::QuizLoopService;

/// Where quiz sessions and reports are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    InMemory,
    Sqlite(String),
}

/// Assembles app-facing services.
#[derive(Clone)]
pub struct AppServices {
    quiz_loop: Arc<QuizLoopService>,
}

impl AppServices {
    /// Open storage, load the bank and build the quiz loop.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or bank loading fails.
    pub async fn new(
        storage: &StorageConfig,
        source: &dyn BankSource,
        auth: Arc<dyn AuthProvider>,
        clock: Clock,
        shuffle: bool,
    ) -> Result<Self, AppServicesError> {
        let storage = match storage {
            StorageConfig::InMemory => Storage::in_memory(),
            StorageConfig::Sqlite(url) => Storage::sqlite(url).await?,
        };

        let quiz_loop = QuizLoopService::load(source, &storage, auth)
            .await?
            .with_clock(clock)
            .with_shuffle(shuffle);

        Ok(Self {
            quiz_loop: Arc::new(quiz_loop),
        })
    }

    #[must_use]
    pub fn quiz_loop(&self) -> Arc<QuizLoopService> {
        Arc::clone(&self.quiz_loop)
    }
}
