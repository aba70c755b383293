mod progress;
mod service;
mod workflow;

// Public API of the quiz subsystem.
pub use crate::error::QuizServiceError;
pub use progress::SessionProgress;
pub use service::{AnswerFeedback, QuizAttempt};
pub use workflow::{AdvanceResult, QuizLoopService};
