//! User answers: a closed three-valued vocabulary and token normalization.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::memory::FactStatus;

/// What the user can say about a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerValue {
    Yes,
    No,
    Unknown,
}

/// Result of reading a free-form answer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedAnswer {
    pub value: AnswerValue,
    /// The token was outside the vocabulary and was read as `Unknown`.
    pub normalized: bool,
}

impl AnswerValue {
    /// Read a token, case-insensitively and ignoring surrounding whitespace.
    ///
    /// `yes`, `y`, `true` → Yes; `no`, `n`, `false` → No;
    /// `unknown`, `?`, `dont-know` → Unknown. Anything else is Unknown with
    /// `normalized` set.
    pub fn parse_token(token: &str) -> ParsedAnswer {
        let value = match token.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" => Some(Self::Yes),
            "no" | "n" | "false" => Some(Self::No),
            "unknown" | "?" | "dont-know" => Some(Self::Unknown),
            _ => None,
        };
        match value {
            Some(value) => ParsedAnswer {
                value,
                normalized: false,
            },
            None => ParsedAnswer {
                value: Self::Unknown,
                normalized: true,
            },
        }
    }
}

impl From<AnswerValue> for FactStatus {
    fn from(value: AnswerValue) -> Self {
        match value {
            AnswerValue::Yes => FactStatus::True,
            AnswerValue::No => FactStatus::False,
            AnswerValue::Unknown => FactStatus::Unknown,
        }
    }
}

impl From<bool> for AnswerValue {
    fn from(value: bool) -> Self {
        if value { Self::Yes } else { Self::No }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "yes"),
            Self::No => write!(f, "no"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_tokens() {
        for token in ["yes", "Y", " TRUE "] {
            let parsed = AnswerValue::parse_token(token);
            assert_eq!(parsed.value, AnswerValue::Yes, "{token}");
            assert!(!parsed.normalized);
        }
        for token in ["no", "n", "False"] {
            assert_eq!(AnswerValue::parse_token(token).value, AnswerValue::No);
        }
        for token in ["unknown", "?", "dont-know"] {
            let parsed = AnswerValue::parse_token(token);
            assert_eq!(parsed.value, AnswerValue::Unknown);
            assert!(!parsed.normalized);
        }
    }

    #[test]
    fn anything_else_is_normalized_to_unknown() {
        for token in ["maybe", "", "oui", "yess"] {
            let parsed = AnswerValue::parse_token(token);
            assert_eq!(parsed.value, AnswerValue::Unknown);
            assert!(parsed.normalized, "{token:?} should be flagged");
        }
    }

    #[test]
    fn maps_to_fact_status() {
        assert_eq!(FactStatus::from(AnswerValue::Yes), FactStatus::True);
        assert_eq!(FactStatus::from(AnswerValue::No), FactStatus::False);
        assert_eq!(FactStatus::from(AnswerValue::Unknown), FactStatus::Unknown);
        assert_eq!(AnswerValue::from(false), AnswerValue::No);
    }
}
