use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing an ID from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cannot be blank", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

// Identifiers are minted by the generation/grading services, so they are
// opaque strings rather than numeric keys.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ParseIdError {
                        kind: stringify!($name),
                    });
                }
                Ok(Self::new(trimmed))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id! {
    /// Unique identifier for a generated Test
    TestId
}

string_id! {
    /// Identifier of a Question, unique within its Test
    QuestionId
}

string_id! {
    /// Identifier of a selectable option, unique within its Question
    OptionId
}

string_id! {
    /// Opaque handle returned by an asynchronous grading call
    JobHandle
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_id_display() {
        let id = QuestionId::new("q1");
        assert_eq!(id.to_string(), "q1");
        assert_eq!(format!("{id:?}"), "QuestionId(\"q1\")");
    }

    #[test]
    fn test_option_id_from_str_trims() {
        let id: OptionId = "  q1-o2 ".parse().unwrap();
        assert_eq!(id.as_str(), "q1-o2");
    }

    #[test]
    fn test_blank_id_is_rejected() {
        let err = "   ".parse::<JobHandle>().unwrap_err();
        assert_eq!(err.to_string(), "JobHandle cannot be blank");
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&TestId::new("t-1")).unwrap();
        assert_eq!(json, "\"t-1\"");
        let back: TestId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TestId::new("t-1"));
    }
}
