//! # Domain Models
//!
//! Typed views over intent results.
//!
//! Backends return JSON; [`IntentResult::typed`](crate::IntentResult::typed)
//! decodes it into one of these models once the value has passed schema
//! validation. Each model carries `confidence` plus the intent-specific
//! fields of its schema.
//!
//! | Intent | Model |
//! |--------|-------|
//! | `EXPLAIN` | [`ExplainResult`] |
//! | `FORECAST` | [`ForecastResult`] |
//! | `DETECT_ANOMALY` | [`AnomalyResult`] |
//! | `SUMMARIZE` | [`SummaryResult`] |
//! | `CLASSIFY` | [`ClassificationResult`] |
//! | `OPTIMIZE` | [`OptimizationResult`] |
//! | `COMPARE` | [`ComparisonResult`] |
//! | `CLUSTER` | [`ClusterResult`] |

mod models;

pub use models::{
    Anomaly, AnomalyNote, AnomalyResult, Classification, ClassificationResult, Cluster,
    ClusterResult, ComparisonResult, Difference, Driver, ExplainResult, ForecastResult,
    IntentOutput, OptimizationResult, Prediction, Recommendation, Severity, SummaryResult,
};
