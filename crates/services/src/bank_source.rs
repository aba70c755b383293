//! Where question banks come from.
//!
//! Loading is the only asynchronous step of a quiz. A [`QuizLoopService`](crate::QuizLoopService)
//! can only be built from a loaded bank, so no session operation can run before it completes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use quiz_core::model::{EMBEDDED_WORKSHEET, QuestionBank};

use crate::error::BankSourceError;

#[async_trait]
pub trait BankSource: Send + Sync {
    /// Human-readable origin, used in logs.
    fn describe(&self) -> String;

    /// Fetch the raw JSON document.
    ///
    /// # Errors
    ///
    /// Returns `BankSourceError::Io` if the document cannot be read.
    async fn fetch(&self) -> Result<String, BankSourceError>;
}

/// The worksheet compiled into `quiz-core`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedBank;

#[async_trait]
impl BankSource for EmbeddedBank {
    fn describe(&self) -> String {
        "embedded worksheet".into()
    }

    async fn fetch(&self) -> Result<String, BankSourceError> {
        Ok(EMBEDDED_WORKSHEET.to_owned())
    }
}

/// A JSON bank on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileBank {
    path: PathBuf,
}

impl FileBank {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BankSource for FileBank {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<String, BankSourceError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| BankSourceError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Fetch and validate a bank. A schema failure yields no bank at all.
///
/// # Errors
///
/// Returns `BankSourceError` if fetching fails or the document fails validation.
pub async fn load_bank(source: &dyn BankSource) -> Result<QuestionBank, BankSourceError> {
    let json = source.fetch().await?;
    match QuestionBank::from_json(&json) {
        Ok(bank) => {
            log::info!(
                "loaded {} questions from {}",
                bank.len(),
                source.describe()
            );
            Ok(bank)
        }
        Err(err) => {
            log::error!("rejected question bank from {}: {err}", source.describe());
            Err(err.into())
        }
    }
}
