use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question id cannot be empty")]
    BlankId,

    #[error("question {0} has no text")]
    BlankText(QuestionId),

    #[error("question {question} needs at least two options, got {count}")]
    TooFewOptions { question: QuestionId, count: usize },

    #[error("question {question} repeats option {option}")]
    DuplicateOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("question {question} answer key references unknown option {option}")]
    UnknownKeyOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("question {0} answer key does not match its type")]
    KeyShape(QuestionId),

    #[error("free-text question {0} must not carry options")]
    UnexpectedOptions(QuestionId),
}

//
// ─── KINDS & OPTIONS ───────────────────────────────────────────────────────────
//

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionKind {
    #[serde(rename = "mcq", alias = "single", alias = "single-select")]
    SingleSelect,
    #[serde(rename = "msq", alias = "multi", alias = "multi-select")]
    MultiSelect,
    #[serde(rename = "sa", alias = "text", alias = "free-text")]
    FreeText,
}

impl QuestionKind {
    #[must_use]
    pub fn is_select(self) -> bool {
        matches!(self, Self::SingleSelect | Self::MultiSelect)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: OptionId,
    pub text: String,
}

impl QuestionOption {
    #[must_use]
    pub fn new(id: impl Into<OptionId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// The reference answer carried by a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Option(OptionId),
    Options(BTreeSet<OptionId>),
    Text(String),
}

/// Wire shape of `correctAnswer`: a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerKeyPayload {
    One(String),
    Many(Vec<String>),
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Raw question as produced by the content generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub text: String,
    #[serde(default)]
    pub options: Option<Vec<QuestionOption>>,
    pub correct_answer: AnswerKeyPayload,
    pub explanation: String,
}

/// A validated question within a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "QuestionPayload")]
pub struct Question {
    id: QuestionId,
    #[serde(rename = "type")]
    kind: QuestionKind,
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    options: Vec<QuestionOption>,
    correct_answer: CorrectAnswer,
    explanation: String,
}

impl Question {
    /// Build a question, enforcing the option and answer-key invariants.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when a select question has fewer than two
    /// options, repeats an option id, or its key references unknown options;
    /// or when a free-text question carries options.
    pub fn new(
        id: QuestionId,
        kind: QuestionKind,
        text: impl Into<String>,
        options: Vec<QuestionOption>,
        correct_answer: CorrectAnswer,
        explanation: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        if id.is_blank() {
            return Err(QuestionError::BlankId);
        }
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::BlankText(id));
        }

        match kind {
            QuestionKind::FreeText => {
                if !options.is_empty() {
                    return Err(QuestionError::UnexpectedOptions(id));
                }
                if !matches!(correct_answer, CorrectAnswer::Text(_)) {
                    return Err(QuestionError::KeyShape(id));
                }
            }
            QuestionKind::SingleSelect | QuestionKind::MultiSelect => {
                if options.len() < 2 {
                    return Err(QuestionError::TooFewOptions {
                        question: id,
                        count: options.len(),
                    });
                }
                let mut seen = BTreeSet::new();
                for option in &options {
                    if !seen.insert(&option.id) {
                        return Err(QuestionError::DuplicateOption {
                            question: id,
                            option: option.id.clone(),
                        });
                    }
                }
                let keyed: Vec<&OptionId> = match (&correct_answer, kind) {
                    (CorrectAnswer::Option(option), QuestionKind::SingleSelect) => vec![option],
                    (CorrectAnswer::Options(set), QuestionKind::MultiSelect) if !set.is_empty() => {
                        set.iter().collect()
                    }
                    _ => return Err(QuestionError::KeyShape(id)),
                };
                if let Some(missing) = keyed.into_iter().find(|key| !seen.contains(key)) {
                    return Err(QuestionError::UnknownKeyOption {
                        question: id,
                        option: missing.clone(),
                    });
                }
            }
        }

        Ok(Self {
            id,
            kind,
            text,
            options,
            correct_answer,
            explanation: explanation.into(),
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[QuestionOption] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &CorrectAnswer {
        &self.correct_answer
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn has_option(&self, option: &OptionId) -> bool {
        self.options.iter().any(|candidate| &candidate.id == option)
    }
}

impl TryFrom<QuestionPayload> for Question {
    type Error = QuestionError;

    fn try_from(payload: QuestionPayload) -> Result<Self, Self::Error> {
        let options = payload.options.unwrap_or_default();
        let correct_answer = match (payload.kind, payload.correct_answer) {
            (QuestionKind::FreeText, AnswerKeyPayload::One(text)) => CorrectAnswer::Text(text),
            (QuestionKind::SingleSelect, AnswerKeyPayload::One(option)) => {
                CorrectAnswer::Option(OptionId::new(option))
            }
            (QuestionKind::SingleSelect, AnswerKeyPayload::Many(mut options))
                if options.len() == 1 =>
            {
                CorrectAnswer::Option(OptionId::new(options.remove(0)))
            }
            (QuestionKind::MultiSelect, AnswerKeyPayload::One(option)) => {
                CorrectAnswer::Options(BTreeSet::from([OptionId::new(option)]))
            }
            (QuestionKind::MultiSelect, AnswerKeyPayload::Many(options)) => {
                CorrectAnswer::Options(options.into_iter().map(OptionId::new).collect())
            }
            _ => return Err(QuestionError::KeyShape(payload.id)),
        };

        Question::new(
            payload.id,
            payload.kind,
            payload.text,
            options,
            correct_answer,
            payload.explanation,
        )
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
