//! Intent router
//!
//! Pure decision function from a classification to exactly one response
//! strategy. The intent enum is closed, so the match is exhaustive; an
//! unmapped intent is a compile error here, not a silent fallthrough.

use crate::strategy::StrategyKind;
use converse_core::{Classification, Intent};

/// Select the strategy for a classification
#[inline]
#[must_use]
pub fn route(classification: &Classification) -> StrategyKind {
    match classification.intent {
        Intent::Greeting => StrategyKind::Greeting,
        Intent::ReadData => StrategyKind::DataRetrieval,
        Intent::Other => StrategyKind::Summarize,
    }
}
