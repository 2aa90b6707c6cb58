use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::intent::Intent;

/// Typed model bound to exactly one intent.
pub trait IntentOutput: DeserializeOwned {
    const INTENT: Intent;

    fn confidence(&self) -> f64;
}

macro_rules! intent_output {
    ($model:ty => $intent:expr) => {
        impl IntentOutput for $model {
            const INTENT: Intent = $intent;

            fn confidence(&self) -> f64 {
                self.confidence
            }
        }
    };
}

/// `EXPLAIN` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainResult {
    pub explanation: String,
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(default)]
    pub drivers: Vec<Driver>,
    #[serde(default)]
    pub anomalies: Vec<AnomalyNote>,
    pub confidence: f64,
}

/// Factor behind the observed behaviour; `impact` ranges over -100..=100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub name: String,
    pub impact: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyNote {
    pub index: usize,
    pub reason: String,
}

/// `FORECAST` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon: Option<u32>,
    pub predictions: Vec<Prediction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub confidence: f64,
}

/// Predicted value with its confidence interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub period: String,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Prediction {
    pub fn interval_width(&self) -> f64 {
        self.upper - self.lower
    }

    /// True when `lower <= value <= upper`.
    pub fn is_consistent(&self) -> bool {
        self.lower <= self.value && self.value <= self.upper
    }
}

/// `DETECT_ANOMALY` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub anomalies: Vec<Anomaly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub confidence: f64,
}

impl AnomalyResult {
    /// Anomalies at or above `severity`, most severe first.
    pub fn at_least(&self, severity: Severity) -> Vec<&Anomaly> {
        let mut matching: Vec<&Anomaly> = self
            .anomalies
            .iter()
            .filter(|anomaly| anomaly.severity >= severity)
            .collect();
        matching.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.index.cmp(&b.index)));
        matching
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub reason: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// `SUMMARIZE` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    pub confidence: f64,
}

/// `CLASSIFY` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(default)]
    pub labels: Vec<String>,
    pub classifications: Vec<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub index: usize,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// `OPTIMIZE` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub tradeoffs: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub action: String,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_impact: Option<String>,
}

/// `COMPARE` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub summary: String,
    #[serde(default)]
    pub similarities: Vec<String>,
    pub differences: Vec<Difference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Difference {
    pub aspect: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
}

/// `CLUSTER` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult {
    pub clusters: Vec<Cluster>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub confidence: f64,
}

impl ClusterResult {
    /// Cluster id owning record `index`, if any.
    pub fn cluster_of(&self, index: usize) -> Option<u32> {
        self.clusters
            .iter()
            .find(|cluster| cluster.members.contains(&index))
            .map(|cluster| cluster.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: u32,
    pub label: String,
    pub members: Vec<usize>,
    #[serde(default)]
    pub characteristics: Vec<String>,
}

intent_output!(ExplainResult => Intent::Explain);
intent_output!(ForecastResult => Intent::Forecast);
intent_output!(AnomalyResult => Intent::DetectAnomaly);
intent_output!(SummaryResult => Intent::Summarize);
intent_output!(ClassificationResult => Intent::Classify);
intent_output!(OptimizationResult => Intent::Optimize);
intent_output!(ComparisonResult => Intent::Compare);
intent_output!(ClusterResult => Intent::Cluster);
