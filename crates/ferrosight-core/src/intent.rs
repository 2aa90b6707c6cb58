//! Intent catalog.
//!
//! The set of analytical operations is closed. Every table keyed by [`Intent`]
//! (prompt templates, output schemas, typed result models) is an exhaustive
//! `match`, so adding a variant without its entries does not compile. Only
//! lookups by *name* can miss, and they fail with
//! [`IntentError::UnknownIntent`].

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IntentError;

/// Analytical operation requested from a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Explain,
    Forecast,
    DetectAnomaly,
    Summarize,
    Classify,
    Optimize,
    Compare,
    Cluster,
}

impl Intent {
    pub const ALL: [Intent; 8] = [
        Self::Explain,
        Self::Forecast,
        Self::DetectAnomaly,
        Self::Summarize,
        Self::Classify,
        Self::Optimize,
        Self::Compare,
        Self::Cluster,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Explain => "EXPLAIN",
            Self::Forecast => "FORECAST",
            Self::DetectAnomaly => "DETECT_ANOMALY",
            Self::Summarize => "SUMMARIZE",
            Self::Classify => "CLASSIFY",
            Self::Optimize => "OPTIMIZE",
            Self::Compare => "COMPARE",
            Self::Cluster => "CLUSTER",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Explain => "Narrative explanation with drivers and notable points",
            Self::Forecast => "Future values with confidence intervals",
            Self::DetectAnomaly => "Outlying records with reason and severity",
            Self::Summarize => "Short summary with key points",
            Self::Classify => "Category label per record",
            Self::Optimize => "Actionable recommendations toward an objective",
            Self::Compare => "Similarities and differences against a target",
            Self::Cluster => "Groups of similar records",
        }
    }

    /// Whether the prompt renders `Context::selection` for this intent.
    pub const fn uses_selection(self) -> bool {
        matches!(
            self,
            Self::Explain | Self::DetectAnomaly | Self::Classify | Self::Compare
        )
    }

    /// Position in [`Intent::ALL`]; used to index static per-intent tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Parses a wire name. Case-insensitive, `-` and `_` are interchangeable.
    pub fn parse(input: &str) -> Result<Self, IntentError> {
        let normalized = input.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|intent| intent.as_str() == normalized)
            .ok_or_else(|| IntentError::unknown_intent(input))
    }
}

impl Display for Intent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = IntentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Anything that names an [`Intent`].
///
/// Entry points accept an `IntentKey` so string-addressed callers and typed
/// callers share the same `UnknownIntent` failure path.
pub trait IntentKey {
    fn resolve(&self) -> Result<Intent, IntentError>;
}

impl IntentKey for Intent {
    fn resolve(&self) -> Result<Intent, IntentError> {
        Ok(*self)
    }
}

impl IntentKey for &str {
    fn resolve(&self) -> Result<Intent, IntentError> {
        Intent::parse(self)
    }
}

impl IntentKey for String {
    fn resolve(&self) -> Result<Intent, IntentError> {
        Intent::parse(self)
    }
}

impl IntentKey for &String {
    fn resolve(&self) -> Result<Intent, IntentError> {
        Intent::parse(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_canonical_and_relaxed_names() {
        assert_eq!(Intent::parse("DETECT_ANOMALY"), Ok(Intent::DetectAnomaly));
        assert_eq!(Intent::parse("detect-anomaly"), Ok(Intent::DetectAnomaly));
        assert_eq!(Intent::parse(" summarize "), Ok(Intent::Summarize));
    }

    #[test]
    fn parse_rejects_unknown_names() {
        let error = Intent::parse("FOO").expect_err("FOO is not an intent");
        assert_eq!(error, IntentError::unknown_intent("FOO"));
    }

    #[test]
    fn index_matches_catalog_position() {
        for (position, intent) in Intent::ALL.into_iter().enumerate() {
            assert_eq!(intent.index(), position);
            assert_eq!(Intent::parse(intent.as_str()), Ok(intent));
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        let encoded = serde_json::to_string(&Intent::DetectAnomaly).expect("serialize");
        assert_eq!(encoded, "\"DETECT_ANOMALY\"");
        let decoded: Intent = serde_json::from_str("\"CLUSTER\"").expect("deserialize");
        assert_eq!(decoded, Intent::Cluster);
    }
}
