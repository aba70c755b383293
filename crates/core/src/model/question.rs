use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::validator::normalize;

/// Separator between acceptable phrasings in a free-text reference answer.
pub const PHRASING_SEPARATOR: &str = " or ";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question id must be positive")]
    InvalidId,

    #[error("{field} cannot be empty")]
    EmptyField { field: &'static str },

    #[error("multiple-choice question needs at least one option")]
    MissingOptions,

    #[error("{kind} question cannot carry options")]
    UnexpectedOptions { kind: QuestionKind },

    #[error("correct answer index {index} is out of range for {len} options")]
    ChoiceOutOfRange { index: u64, len: usize },

    #[error("{kind} question expects {expected} as its correct answer")]
    InvalidAnswerKey {
        kind: QuestionKind,
        expected: &'static str,
    },
}

//
// ─── KIND ──────────────────────────────────────────────────────────────────────
//

/// Type tag of a question; decides how answers are rendered and checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice,
    FillBlank,
    ShortAnswer,
}

impl QuestionKind {
    /// Tag used in bank files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple-choice",
            QuestionKind::FillBlank => "fill-blank",
            QuestionKind::ShortAnswer => "short-answer",
        }
    }

    /// Parses a bank file tag. Tags are matched exactly.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "multiple-choice" => Some(Self::MultipleChoice),
            "fill-blank" => Some(Self::FillBlank),
            "short-answer" => Some(Self::ShortAnswer),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_free_text(self) -> bool {
        !matches!(self, QuestionKind::MultipleChoice)
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── ACCEPTED ANSWERS ──────────────────────────────────────────────────────────
//

/// Reference answer of a free-text question, pre-split into normalized phrasings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedAnswers {
    reference: String,
    phrasings: Vec<String>,
}

impl AcceptedAnswers {
    /// Splits `reference` on the literal [`PHRASING_SEPARATOR`], then normalizes
    /// each phrasing.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyField` if no non-blank phrasing remains.
    pub fn parse(reference: impl Into<String>) -> Result<Self, QuestionError> {
        let reference = reference.into();
        let phrasings: Vec<String> = reference
            .split(PHRASING_SEPARATOR)
            .map(normalize)
            .filter(|p| !p.is_empty())
            .collect();

        if phrasings.is_empty() {
            return Err(QuestionError::EmptyField {
                field: "correctAnswer",
            });
        }

        Ok(Self {
            reference,
            phrasings,
        })
    }

    /// Reference text exactly as authored.
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Lower-cased, trimmed phrasings; never empty.
    #[must_use]
    pub fn phrasings(&self) -> &[String] {
        &self.phrasings
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Per-kind payload of a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionBody {
    MultipleChoice { options: Vec<String>, correct: usize },
    FillBlank(AcceptedAnswers),
    ShortAnswer(AcceptedAnswers),
}

/// A single immutable quiz question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    body: QuestionBody,
    feedback: String,
}

impl Question {
    /// Build a multiple-choice question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the id is zero, the prompt is blank, there are no
    /// options, or `correct` does not index into `options`.
    pub fn multiple_choice(
        id: QuestionId,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct: usize,
        feedback: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let prompt = validate_common(id, prompt.into())?;
        if options.is_empty() {
            return Err(QuestionError::MissingOptions);
        }
        if options.iter().any(|o| o.trim().is_empty()) {
            return Err(QuestionError::EmptyField { field: "options" });
        }
        if correct >= options.len() {
            return Err(QuestionError::ChoiceOutOfRange {
                index: correct as u64,
                len: options.len(),
            });
        }

        Ok(Self {
            id,
            prompt,
            body: QuestionBody::MultipleChoice { options, correct },
            feedback: feedback.into(),
        })
    }

    /// Build a fill-in-the-blank question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the id is zero or the prompt or reference is blank.
    pub fn fill_blank(
        id: QuestionId,
        prompt: impl Into<String>,
        reference: impl Into<String>,
        feedback: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let prompt = validate_common(id, prompt.into())?;
        Ok(Self {
            id,
            prompt,
            body: QuestionBody::FillBlank(AcceptedAnswers::parse(reference)?),
            feedback: feedback.into(),
        })
    }

    /// Build a short-answer question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the id is zero or the prompt or reference is blank.
    pub fn short_answer(
        id: QuestionId,
        prompt: impl Into<String>,
        reference: impl Into<String>,
        feedback: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let prompt = validate_common(id, prompt.into())?;
        Ok(Self {
            id,
            prompt,
            body: QuestionBody::ShortAnswer(AcceptedAnswers::parse(reference)?),
            feedback: feedback.into(),
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        match self.body {
            QuestionBody::MultipleChoice { .. } => QuestionKind::MultipleChoice,
            QuestionBody::FillBlank(_) => QuestionKind::FillBlank,
            QuestionBody::ShortAnswer(_) => QuestionKind::ShortAnswer,
        }
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn body(&self) -> &QuestionBody {
        &self.body
    }

    /// Choices for multiple-choice questions; empty for free-text kinds.
    #[must_use]
    pub fn options(&self) -> &[String] {
        match &self.body {
            QuestionBody::MultipleChoice { options, .. } => options,
            QuestionBody::FillBlank(_) | QuestionBody::ShortAnswer(_) => &[],
        }
    }

    /// Explanation shown after answering, whether or not the answer was right.
    #[must_use]
    pub fn feedback(&self) -> &str {
        &self.feedback
    }
}

fn validate_common(id: QuestionId, prompt: String) -> Result<String, QuestionError> {
    if id.value() == 0 {
        return Err(QuestionError::InvalidId);
    }
    if prompt.trim().is_empty() {
        return Err(QuestionError::EmptyField { field: "prompt" });
    }
    Ok(prompt)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
