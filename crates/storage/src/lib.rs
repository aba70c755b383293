#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemoryRepository, QuizSessionRepository, ReportRepository, ReportRow, Storage, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
