use serde::{Deserialize, Serialize};
use std::fmt;

/// An answer exactly as the learner submitted it.
///
/// Multiple-choice answers are zero-based option indices; free-text answers are
/// kept verbatim and only normalized when validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawAnswer {
    Choice(usize),
    Text(String),
}

impl RawAnswer {
    #[must_use]
    pub fn choice(index: usize) -> Self {
        Self::Choice(index)
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

impl From<usize> for RawAnswer {
    fn from(index: usize) -> Self {
        Self::Choice(index)
    }
}

impl From<&str> for RawAnswer {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for RawAnswer {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for RawAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawAnswer::Choice(index) => write!(f, "option #{index}"),
            RawAnswer::Text(text) => write!(f, "{text:?}"),
        }
    }
}
