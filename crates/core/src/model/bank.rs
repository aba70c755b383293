use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::question::{Question, QuestionError, QuestionKind};

/// The ten-question history worksheet shipped with the crate.
pub const EMBEDDED_WORKSHEET: &str = include_str!("../../data/worksheet.json");

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Schema validation failure. A bank that fails validation is never partially loaded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BankError {
    #[error("question bank is malformed: {0}")]
    Parse(String),

    #[error("question bank has no questions")]
    Empty,

    #[error("duplicate question id {0}")]
    DuplicateId(QuestionId),

    #[error("question {id}: unknown type `{tag}`")]
    UnknownType { id: u32, tag: String },

    #[error("question {id}: {source}")]
    Question {
        id: u32,
        #[source]
        source: QuestionError,
    },
}

//
// ─── FILE SHAPE ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordAnswer {
    Index(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct QuestionRecord {
    id: u32,
    #[serde(rename = "type")]
    kind: String,
    prompt: String,
    #[serde(default)]
    options: Vec<String>,
    correct_answer: RecordAnswer,
    feedback: String,
}

impl QuestionRecord {
    fn into_question(self) -> Result<Question, BankError> {
        let raw_id = self.id;
        let id = QuestionId::new(raw_id);
        let wrap = |source| BankError::Question { id: raw_id, source };

        let kind = QuestionKind::from_tag(&self.kind).ok_or_else(|| BankError::UnknownType {
            id: raw_id,
            tag: self.kind.clone(),
        })?;

        if kind.is_free_text() && !self.options.is_empty() {
            return Err(wrap(QuestionError::UnexpectedOptions { kind }));
        }

        match (kind, self.correct_answer) {
            (QuestionKind::MultipleChoice, RecordAnswer::Index(index)) => {
                let correct = usize::try_from(index).map_err(|_| {
                    wrap(QuestionError::ChoiceOutOfRange {
                        index,
                        len: self.options.len(),
                    })
                })?;
                Question::multiple_choice(id, self.prompt, self.options, correct, self.feedback)
                    .map_err(wrap)
            }
            (QuestionKind::FillBlank, RecordAnswer::Text(reference)) => {
                Question::fill_blank(id, self.prompt, reference, self.feedback).map_err(wrap)
            }
            (QuestionKind::ShortAnswer, RecordAnswer::Text(reference)) => {
                Question::short_answer(id, self.prompt, reference, self.feedback).map_err(wrap)
            }
            (QuestionKind::MultipleChoice, RecordAnswer::Text(_)) => {
                Err(wrap(QuestionError::InvalidAnswerKey {
                    kind,
                    expected: "an option index",
                }))
            }
            (QuestionKind::FillBlank | QuestionKind::ShortAnswer, RecordAnswer::Index(_)) => {
                Err(wrap(QuestionError::InvalidAnswerKey {
                    kind,
                    expected: "a reference string",
                }))
            }
        }
    }
}

//
// ─── BANK ──────────────────────────────────────────────────────────────────────
//

/// Ordered, immutable collection of questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Build a bank from already-constructed questions, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Empty` for an empty list and `BankError::DuplicateId`
    /// if two questions share an id.
    pub fn new(questions: Vec<Question>) -> Result<Self, BankError> {
        if questions.is_empty() {
            return Err(BankError::Empty);
        }

        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(BankError::DuplicateId(question.id()));
            }
        }

        Ok(Self { questions })
    }

    /// Parse and validate a bank from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns `BankError` on malformed JSON, missing fields, unknown type tags,
    /// out-of-range choice indices, duplicate ids, or an empty list.
    pub fn from_json(json: &str) -> Result<Self, BankError> {
        let records: Vec<QuestionRecord> =
            serde_json::from_str(json).map_err(|e| BankError::Parse(e.to_string()))?;

        let questions = records
            .into_iter()
            .map(QuestionRecord::into_question)
            .collect::<Result<Vec<_>, _>>()?;

        let bank = Self::new(questions)?;
        log::debug!("loaded question bank with {} questions", bank.len());
        Ok(bank)
    }

    /// The worksheet bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns `BankError` only if the bundled data is corrupt.
    pub fn embedded() -> Result<Self, BankError> {
        Self::from_json(EMBEDDED_WORKSHEET)
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always false for a constructed bank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> impl DoubleEndedIterator<Item = QuestionId> + ExactSizeIterator + '_ {
        self.questions.iter().map(Question::id)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
