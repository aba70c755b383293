#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod time;
pub mod validator;

pub use error::Error;
pub use model::{QuestionBank, QuizSession, RawAnswer, Report};
pub use time::Clock;
pub use validator::is_correct;
