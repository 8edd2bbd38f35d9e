mod answer;
mod config;
mod ids;
mod question;
mod result;
mod submission;

pub use answer::{Answer, AnswerError, AnswerInput, AnswerSheet};
pub use config::{
    ConfigError, CustomConfig, Difficulty, EXAM_PRESETS, ExamPreset, GenerationConfig,
    GenerationRequest, LengthClass, PresetConfig, QuestionFormat, find_preset,
};
pub use ids::{JobHandle, OptionId, ParseIdError, QuestionId, TestId};
pub use practice_test::{Test, TestDefaults, TestError, TestPayload};
pub use question::{
    AnswerKeyPayload, CorrectAnswer, Question, QuestionError, QuestionKind, QuestionOption,
    QuestionPayload,
};
pub use result::{TestResult, TestResultError, TestResultPayload};
pub use submission::{SubmissionPayload, SubmissionTrigger};
