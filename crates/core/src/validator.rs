//! Answer checking, one branch per question kind.
//!
//! Free-text matching is deliberately lenient: after lower-casing and trimming,
//! an answer is accepted when it equals, contains, or is contained in any accepted
//! phrasing. Short fragments can therefore match broadly (`"rizal"` is accepted for
//! "Rizal Park"). Blank input is never accepted.

use crate::model::{AcceptedAnswers, Question, QuestionBody, RawAnswer};

/// Lower-case and trim, the only normalization applied to free text.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Returns whether `answer` is correct for `question`.
///
/// An answer of the wrong shape (text for a multiple-choice question, or an
/// index for a free-text one) is simply incorrect.
#[must_use]
pub fn is_correct(question: &Question, answer: &RawAnswer) -> bool {
    match (question.body(), answer) {
        (QuestionBody::MultipleChoice { correct, .. }, RawAnswer::Choice(index)) => {
            index == correct
        }
        (
            QuestionBody::FillBlank(accepted) | QuestionBody::ShortAnswer(accepted),
            RawAnswer::Text(text),
        ) => matches_free_text(accepted, text),
        (QuestionBody::MultipleChoice { .. }, RawAnswer::Text(_))
        | (QuestionBody::FillBlank(_) | QuestionBody::ShortAnswer(_), RawAnswer::Choice(_)) => {
            false
        }
    }
}

fn matches_free_text(accepted: &AcceptedAnswers, input: &str) -> bool {
    let input = normalize(input);
    if input.is_empty() {
        return false;
    }

    accepted
        .phrasings()
        .iter()
        .any(|phrasing| phrasing.contains(&input) || input.contains(phrasing.as_str()))
}
