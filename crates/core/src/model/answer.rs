use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId};
use crate::model::question::{Question, QuestionKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("question {0} is not part of this test")]
    UnknownQuestion(QuestionId),

    #[error("question {question} has no option {option}")]
    UnknownOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("question {0} expects a different kind of answer")]
    WrongKind(QuestionId),
}

/// A learner's answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    Single(OptionId),
    Multi(BTreeSet<OptionId>),
    Text(String),
}

/// Raw input coming from the answering surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerInput {
    /// Pick an option. Replaces on single-select, toggles on multi-select.
    Choose(OptionId),
    /// Free-text entry. Replaces any previous text.
    Text(String),
}

/// Answers keyed by question id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AnswerSheet(BTreeMap<QuestionId, Answer>);

impl AnswerSheet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, question: &QuestionId) -> Option<&Answer> {
        self.0.get(question)
    }

    #[must_use]
    pub fn is_answered(&self, question: &QuestionId) -> bool {
        self.0.contains_key(question)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, &Answer)> {
        self.0.iter()
    }

    /// Apply an input to `question`.
    ///
    /// Multi-select uses set semantics: choosing a selected option removes it,
    /// and an emptied selection removes the entry entirely.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` when the option does not belong to the question or
    /// the input shape does not match the question kind. The sheet is left
    /// unchanged on error.
    pub fn apply(&mut self, question: &Question, input: AnswerInput) -> Result<(), AnswerError> {
        let id = question.id().clone();
        match (question.kind(), input) {
            (QuestionKind::SingleSelect, AnswerInput::Choose(option)) => {
                ensure_option(question, &option)?;
                self.0.insert(id, Answer::Single(option));
            }
            (QuestionKind::MultiSelect, AnswerInput::Choose(option)) => {
                ensure_option(question, &option)?;
                let mut selected = match self.0.remove(&id) {
                    Some(Answer::Multi(set)) => set,
                    _ => BTreeSet::new(),
                };
                if !selected.remove(&option) {
                    selected.insert(option);
                }
                if !selected.is_empty() {
                    self.0.insert(id, Answer::Multi(selected));
                }
            }
            (QuestionKind::FreeText, AnswerInput::Text(text)) => {
                self.0.insert(id, Answer::Text(text));
            }
            _ => return Err(AnswerError::WrongKind(id)),
        }
        Ok(())
    }
}

fn ensure_option(question: &Question, option: &OptionId) -> Result<(), AnswerError> {
    if question.has_option(option) {
        Ok(())
    } else {
        Err(AnswerError::UnknownOption {
            question: question.id().clone(),
            option: option.clone(),
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
