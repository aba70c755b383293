#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth;
pub mod bank_source;
pub mod error;
pub mod quiz;

pub use quiz_core::Clock;

pub use app_services::{AppServices, StorageConfig};
pub use auth::{AuthProvider, AuthSession, AuthState};
pub use bank_source::{BankSource, EmbeddedBank, FileBank, load_bank};
pub use error::{AppServicesError, BankSourceError, QuizServiceError};
pub use quiz::{AdvanceResult, AnswerFeedback, QuizAttempt, QuizLoopService, SessionProgress};
