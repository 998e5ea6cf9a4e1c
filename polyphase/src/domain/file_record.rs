//! FileRecord: tracked target-project files with creation/modification
//! timestamps and per-file verification status.

use serde::{Deserialize, Serialize};
use taskgraph::{IndexValue, Record, now_ms};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Verified,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub created: i64,
    pub modified: i64,
    #[serde(default)]
    pub associated_task_ids: Vec<String>,
    pub verification_status: VerificationStatus,
}

impl FileRecord {
    pub fn new(path: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            path: path.into(),
            created: now,
            modified: now,
            associated_task_ids: Vec::new(),
            verification_status: VerificationStatus::Unverified,
        }
    }

    pub fn touch(&mut self, task_id: Option<&str>) {
        self.modified = now_ms();
        if let Some(task_id) = task_id {
            if !self.associated_task_ids.iter().any(|id| id == task_id) {
                self.associated_task_ids.push(task_id.to_string());
            }
        }
    }
}

impl Record for FileRecord {
    fn collection() -> &'static str {
        "files"
    }

    fn id(&self) -> &str {
        &self.path
    }

    fn index_fields(&self) -> Vec<(&'static str, IndexValue)> {
        vec![("verification_status", IndexValue::Text(format!("{:?}", self.verification_status)))]
    }
}
