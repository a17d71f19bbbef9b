//! Intent classification types
//!
//! The structured output of intent detection. Intents form a closed enum so
//! routing downstream is an exhaustive match; arbitrary tags coming back
//! from a remote classifier are folded onto the closed set at the
//! `Intent::from_tag` boundary.

use serde::{Deserialize, Serialize};

/// Detected intent of a user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    /// Salutation / small talk
    Greeting,
    /// Question over connected data
    ReadData,
    /// Everything else (summaries, follow-ups, meta questions)
    Other,
}

impl Intent {
    /// Fold a remote tag onto the closed intent set.
    ///
    /// Unknown tags map to `Other`; they are answered through the
    /// summarize path rather than rejected.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "greeting" => Self::Greeting,
            "read-data" => Self::ReadData,
            _ => Self::Other,
        }
    }

    /// Canonical wire tag for this intent
    #[inline]
    #[must_use]
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::ReadData => "read-data",
            Self::Other => "other",
        }
    }
}

/// Estimated complexity of answering the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Complexity {
    /// Answerable in a single step
    Simple,
    /// Requires multi-step reasoning or heavy retrieval
    Complex,
}

/// Structured output of intent detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Detected intent
    pub intent: Intent,
    /// Estimated complexity
    pub complexity: Complexity,
    /// Whether the answer should carry a chart
    pub needs_chart: bool,
    /// Whether answering requires generated SQL
    pub needs_sql: bool,
}

impl Classification {
    /// Create a classification
    #[inline]
    #[must_use]
    pub fn new(intent: Intent, complexity: Complexity, needs_chart: bool, needs_sql: bool) -> Self {
        Self {
            intent,
            complexity,
            needs_chart,
            needs_sql,
        }
    }

    /// The degraded classification used when the remote classifier is
    /// terminally unavailable: other / simple / no chart / no SQL.
    ///
    /// Classification failure must never block a request; callers proceed
    /// with this value instead.
    #[inline]
    #[must_use]
    pub fn fallback() -> Self {
        Self::new(Intent::Other, Complexity::Simple, false, false)
    }

    /// Shorthand for a plain classification of the given intent
    #[inline]
    #[must_use]
    pub fn of_intent(intent: Intent) -> Self {
        Self::new(intent, Complexity::Simple, false, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tag_maps_known_tags() {
        assert_eq!(Intent::from_tag("greeting"), Intent::Greeting);
        assert_eq!(Intent::from_tag("read-data"), Intent::ReadData);
        assert_eq!(Intent::from_tag("other"), Intent::Other);
    }

    #[test]
    fn from_tag_folds_unknown_to_other() {
        assert_eq!(Intent::from_tag("write-data"), Intent::Other);
        assert_eq!(Intent::from_tag(""), Intent::Other);
        assert_eq!(Intent::from_tag("GREETING"), Intent::Other);
    }

    #[test]
    fn tags_round_trip() {
        for intent in [Intent::Greeting, Intent::ReadData, Intent::Other] {
            assert_eq!(Intent::from_tag(intent.as_tag()), intent);
        }
    }

    #[test]
    fn fallback_is_inert() {
        let fallback = Classification::fallback();
        assert_eq!(fallback.intent, Intent::Other);
        assert_eq!(fallback.complexity, Complexity::Simple);
        assert!(!fallback.needs_chart);
        assert!(!fallback.needs_sql);
    }

    #[test]
    fn intent_serializes_kebab_case() {
        let json = serde_json::to_string(&Intent::ReadData).unwrap();
        assert_eq!(json, "\"read-data\"");
        let back: Intent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Intent::ReadData);
    }
}
