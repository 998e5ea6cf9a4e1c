//! PhaseRecord: per-phase run history and adaptive counters (§4.8.3).

use serde::{Deserialize, Serialize};
use taskgraph::{IndexValue, Record, now_ms};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRun {
    pub started_at: i64,
    pub ended_at: i64,
    pub success: bool,
    pub files_created: u32,
    pub files_modified: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub name: String,
    #[serde(default)]
    pub runs: Vec<PhaseRun>,
    pub experience_count: u32,
    pub awareness_level: f64,
}

impl PhaseRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runs: Vec::new(),
            experience_count: 0,
            awareness_level: 0.0,
        }
    }

    /// Append a run record and update the adaptive counters per §4.8.3:
    /// `awarenessLevel = log(1+experienceCount)/log(100)` clamped to [0,1].
    pub fn record_run(&mut self, started_at: i64, success: bool, files_created: u32, files_modified: u32, error: Option<String>) {
        self.runs.push(PhaseRun {
            started_at,
            ended_at: now_ms(),
            success,
            files_created,
            files_modified,
            error,
        });
        self.experience_count += 1;
        self.awareness_level = ((1.0 + self.experience_count as f64).ln() / 100f64.ln()).clamp(0.0, 1.0);
    }
}

impl Record for PhaseRecord {
    fn collection() -> &'static str {
        "phases"
    }

    fn id(&self) -> &str {
        &self.name
    }

    fn index_fields(&self) -> Vec<(&'static str, IndexValue)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn awareness_level_grows_with_experience_and_stays_clamped() {
        let mut record = PhaseRecord::new("coding");
        for _ in 0..5 {
            record.record_run(0, true, 1, 0, None);
        }
        assert_eq!(record.experience_count, 5);
        assert!(record.awareness_level > 0.0 && record.awareness_level <= 1.0);
    }

    #[test]
    fn awareness_level_never_exceeds_one_even_with_huge_experience() {
        let mut record = PhaseRecord::new("coding");
        record.experience_count = 100_000;
        record.awareness_level = ((1.0 + record.experience_count as f64).ln() / 100f64.ln()).clamp(0.0, 1.0);
        assert!(record.awareness_level <= 1.0);
    }
}
