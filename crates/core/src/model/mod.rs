mod answer;
mod bank;
mod ids;
mod question;
mod report;
mod session;

pub use ids::{ParseIdError, QuestionId, SessionKey};

pub use answer::RawAnswer;
pub use bank::{BankError, EMBEDDED_WORKSHEET, QuestionBank};
pub use question::{
    AcceptedAnswers, PHRASING_SEPARATOR, Question, QuestionBody, QuestionError, QuestionKind,
};
pub use report::{QuestionOutcome, Report, ReportError, summarize};
pub use session::{
    AnswerEntry, QuizSession, SessionError, SessionOp, SessionSnapshot, SessionState,
};
