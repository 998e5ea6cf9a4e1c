//! Plain data carried inline in the PipelineState document rather than as
//! `taskgraph::Store` collections - `performanceMetrics` and
//! `learnedPatterns` are append-only maps read-modify-written with the
//! whole document.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub timestamp: i64,
    pub description: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correlation {
    pub a: String,
    pub b: String,
    pub strength: f64,
    pub observed_at: i64,
}
