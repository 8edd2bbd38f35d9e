use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("exam name cannot be empty")]
    EmptyName,

    #[error("question count must be > 0")]
    InvalidQuestionCount,

    #[error("custom duration must be > 0 minutes")]
    InvalidDuration,

    #[error("unknown exam preset: {0}")]
    UnknownPreset(String),

    #[error("preset exams need a length class")]
    MissingLengthClass,

    #[error("no syllabus attached")]
    MissingSyllabus,

    #[error("no test configuration has been set")]
    NotConfigured,
}

//
// ─── CHOICES ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Standard,
    Hard,
}

/// Preset exam length, expressed as a target question count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthClass {
    Quick,
    #[default]
    Standard,
    Endurance,
}

impl LengthClass {
    #[must_use]
    pub fn question_count(self) -> u32 {
        match self {
            Self::Quick => 5,
            Self::Standard => 10,
            Self::Endurance => 25,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionFormat {
    /// Select-type questions only.
    Objective,
    /// Free-text questions only.
    Subjective,
    #[default]
    Mixed,
}

/// Minutes allotted per question for preset exams.
pub const PRESET_MINUTES_PER_QUESTION: u32 = 2;

/// Minutes allotted per question for custom exams without an explicit duration.
pub const CUSTOM_MINUTES_PER_QUESTION: u32 = 5;

//
// ─── PRESET CATALOG ────────────────────────────────────────────────────────────
//

/// A named, pre-configured exam template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub topics: &'static [&'static str],
}

pub const EXAM_PRESETS: &[ExamPreset] = &[
    ExamPreset {
        id: "GRE",
        name: "GRE",
        topics: &[
            "Verbal Reasoning",
            "Quantitative Reasoning",
            "Analytical Writing Prompts",
        ],
    },
    ExamPreset {
        id: "SAT",
        name: "SAT",
        topics: &[
            "Reading Comprehension",
            "Writing and Language",
            "Math (Calculator)",
            "Math (No Calculator)",
        ],
    },
];

/// Look up a preset by id, ignoring case and surrounding whitespace.
#[must_use]
pub fn find_preset(id: &str) -> Option<&'static ExamPreset> {
    let id = id.trim();
    EXAM_PRESETS
        .iter()
        .find(|preset| preset.id.eq_ignore_ascii_case(id))
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetConfig {
    pub preset: String,
    pub difficulty: Difficulty,
    pub length: Option<LengthClass>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomConfig {
    pub name: String,
    pub difficulty: Difficulty,
    pub question_count: u32,
    pub format: QuestionFormat,
    /// Topics stated by the learner or extracted from the syllabus.
    pub topics: Vec<String>,
    pub duration_minutes: Option<u32>,
}

/// What kind of test to generate. Exactly one variant is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationConfig {
    Preset(PresetConfig),
    Custom(CustomConfig),
}

impl GenerationConfig {
    /// Check the active variant.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a custom exam has no name, a zero question
    /// count or a zero duration, or a preset is unknown or has no length class.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Preset(preset) => {
                find_preset(&preset.preset)
                    .ok_or_else(|| ConfigError::UnknownPreset(preset.preset.clone()))?;
                if preset.length.is_none() {
                    return Err(ConfigError::MissingLengthClass);
                }
            }
            Self::Custom(custom) => {
                if custom.name.trim().is_empty() {
                    return Err(ConfigError::EmptyName);
                }
                if custom.question_count == 0 {
                    return Err(ConfigError::InvalidQuestionCount);
                }
                if custom.duration_minutes == Some(0) {
                    return Err(ConfigError::InvalidDuration);
                }
            }
        }
        Ok(())
    }

    /// Duration to use when the generated test does not state one.
    #[must_use]
    pub fn planned_duration_minutes(&self) -> u32 {
        match self {
            Self::Preset(preset) => preset
                .length
                .unwrap_or_default()
                .question_count()
                .saturating_mul(PRESET_MINUTES_PER_QUESTION),
            Self::Custom(custom) => custom.duration_minutes.unwrap_or_else(|| {
                custom
                    .question_count
                    .saturating_mul(CUSTOM_MINUTES_PER_QUESTION)
            }),
        }
    }

    /// Display name of the exam being configured.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Preset(preset) => find_preset(&preset.preset)
                .map_or_else(|| preset.preset.clone(), |found| found.name.to_string()),
            Self::Custom(custom) => custom.name.trim().to_string(),
        }
    }

    /// Subject label for the generated test.
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::Preset(preset) => preset.preset.trim().to_ascii_uppercase(),
            Self::Custom(_) => "Custom".to_string(),
        }
    }

    /// Resolve into the request sent to the content generation service.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn to_request(&self, syllabus: Option<&str>) -> Result<GenerationRequest, ConfigError> {
        self.validate()?;
        let syllabus_content = syllabus
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string);

        let request = match self {
            Self::Preset(preset) => {
                let found = find_preset(&preset.preset)
                    .ok_or_else(|| ConfigError::UnknownPreset(preset.preset.clone()))?;
                let length = preset.length.ok_or(ConfigError::MissingLengthClass)?;
                GenerationRequest {
                    exam_type: found.id.to_string(),
                    difficulty: preset.difficulty,
                    exam_name: None,
                    num_questions: Some(length.question_count()),
                    question_format: None,
                    preset_duration: Some(length),
                    syllabus_content,
                    topics: found.topics.iter().map(|topic| (*topic).to_string()).collect(),
                    duration_minutes: Some(self.planned_duration_minutes()),
                }
            }
            Self::Custom(custom) => GenerationRequest {
                exam_type: "custom".to_string(),
                difficulty: custom.difficulty,
                exam_name: Some(custom.name.trim().to_string()),
                num_questions: Some(custom.question_count),
                question_format: Some(custom.format),
                preset_duration: None,
                syllabus_content,
                topics: custom
                    .topics
                    .iter()
                    .map(|topic| topic.trim())
                    .filter(|topic| !topic.is_empty())
                    .map(str::to_string)
                    .collect(),
                duration_minutes: Some(self.planned_duration_minutes()),
            },
        };
        Ok(request)
    }
}

/// Body of a test generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub exam_type: String,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_questions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_format: Option<QuestionFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_duration: Option<LengthClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syllabus_content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(name: &str, count: u32) -> GenerationConfig {
        GenerationConfig::Custom(CustomConfig {
            name: name.into(),
            difficulty: Difficulty::Hard,
            question_count: count,
            format: QuestionFormat::Objective,
            topics: vec!["Stoichiometry".into(), "  ".into()],
            duration_minutes: None,
        })
    }

    fn preset(id: &str, length: Option<LengthClass>) -> GenerationConfig {
        GenerationConfig::Preset(PresetConfig {
            preset: id.into(),
            difficulty: Difficulty::Standard,
            length,
        })
    }

    #[test]
    fn custom_requires_name_and_count() {
        assert_eq!(custom("  ", 4).validate(), Err(ConfigError::EmptyName));
        assert_eq!(custom("Chem", 0).validate(), Err(ConfigError::InvalidQuestionCount));
        assert_eq!(custom("Chem", 4).validate(), Ok(()));
    }

    #[test]
    fn preset_requires_known_id_and_length() {
        assert_eq!(
            preset("LSAT", Some(LengthClass::Quick)).validate(),
            Err(ConfigError::UnknownPreset("LSAT".into()))
        );
        assert_eq!(preset("gre", None).validate(), Err(ConfigError::MissingLengthClass));
        assert_eq!(preset("gre", Some(LengthClass::Quick)).validate(), Ok(()));
    }

    #[test]
    fn preset_request_uses_catalog_topics_and_length() {
        let request = preset("sat", Some(LengthClass::Endurance))
            .to_request(None)
            .unwrap();
        assert_eq!(request.exam_type, "SAT");
        assert_eq!(request.num_questions, Some(25));
        assert_eq!(request.topics.len(), 4);
        assert_eq!(request.duration_minutes, Some(50));
    }

    #[test]
    fn custom_request_forwards_syllabus_verbatim() {
        let syllabus = "Unit 1: moles\nUnit 2: gases";
        let request = custom("Chem", 4).to_request(Some(syllabus)).unwrap();
        assert_eq!(request.syllabus_content.as_deref(), Some(syllabus));
        assert_eq!(request.topics, vec!["Stoichiometry".to_string()]);
        assert_eq!(request.duration_minutes, Some(20));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["examType"], "custom");
        assert_eq!(json["questionFormat"], "objective");
        assert_eq!(json["difficulty"], "hard");
        assert!(json.get("presetDuration").is_none());
    }

    #[test]
    fn custom_without_syllabus_may_still_proceed() {
        let request = custom("Chem", 3).to_request(Some("   ")).unwrap();
        assert!(request.syllabus_content.is_none());
    }
}
