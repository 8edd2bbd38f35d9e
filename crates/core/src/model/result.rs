use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum TestResultError {
    #[error("result is missing `{0}`")]
    MissingField(&'static str),

    #[error("score {0} is outside 0-100")]
    ScoreOutOfRange(f64),

    #[error("correct answers ({correct}) exceed total questions ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("`{0}` must list at least one item")]
    EmptyList(&'static str),
}

/// Graded outcome of a submitted test. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "TestResultPayload")]
pub struct TestResult {
    score: f64,
    correct_answers: u32,
    total_questions: u32,
    ai_summary: String,
    strengths: Vec<String>,
    weaknesses: Vec<String>,
}

impl TestResult {
    /// # Errors
    ///
    /// Returns `TestResultError` if the score is not a finite value in 0-100,
    /// `correct_answers > total_questions`, or either feedback list is empty.
    pub fn new(
        score: f64,
        correct_answers: u32,
        total_questions: u32,
        ai_summary: impl Into<String>,
        strengths: Vec<String>,
        weaknesses: Vec<String>,
    ) -> Result<Self, TestResultError> {
        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            return Err(TestResultError::ScoreOutOfRange(score));
        }
        if correct_answers > total_questions {
            return Err(TestResultError::CorrectExceedsTotal {
                correct: correct_answers,
                total: total_questions,
            });
        }
        let strengths = non_blank(strengths);
        if strengths.is_empty() {
            return Err(TestResultError::EmptyList("strengths"));
        }
        let weaknesses = non_blank(weaknesses);
        if weaknesses.is_empty() {
            return Err(TestResultError::EmptyList("weaknesses"));
        }

        Ok(Self {
            score,
            correct_answers,
            total_questions,
            ai_summary: ai_summary.into(),
            strengths,
            weaknesses,
        })
    }

    /// Percentage score in 0-100.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn ai_summary(&self) -> &str {
        &self.ai_summary
    }

    #[must_use]
    pub fn strengths(&self) -> &[String] {
        &self.strengths
    }

    #[must_use]
    pub fn weaknesses(&self) -> &[String] {
        &self.weaknesses
    }
}

fn non_blank(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Raw grading output before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultPayload {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub correct_answers: Option<u32>,
    #[serde(default)]
    pub total_questions: Option<u32>,
    #[serde(default)]
    pub ai_summary: Option<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

impl TryFrom<TestResultPayload> for TestResult {
    type Error = TestResultError;

    fn try_from(payload: TestResultPayload) -> Result<Self, Self::Error> {
        TestResult::new(
            payload.score.ok_or(TestResultError::MissingField("score"))?,
            payload
                .correct_answers
                .ok_or(TestResultError::MissingField("correctAnswers"))?,
            payload
                .total_questions
                .ok_or(TestResultError::MissingField("totalQuestions"))?,
            payload.ai_summary.unwrap_or_default(),
            payload.strengths,
            payload.weaknesses,
        )
    }
}
