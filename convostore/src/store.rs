//! Thread persistence: append/trim in memory, snapshot to disk on demand.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ConvoError;
use crate::message::{Message, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationThread {
    pub thread_id: String,
    pub phase: String,
    pub version: u64,
    pub messages: Vec<Message>,
}

impl ConversationThread {
    pub fn new(thread_id: impl Into<String>, phase: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            phase: phase.into(),
            version: 0,
            messages: Vec::new(),
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop the oldest droppable messages until total tokens fit `token_budget`.
    ///
    /// Never drops a `System` message, and never drops the last message in
    /// the thread - that's the currently in-flight turn (typically a tool
    /// result the assistant is about to see).
    pub fn trim(&mut self, token_budget: usize) {
        loop {
            let total: usize = self.messages.iter().map(Message::approx_tokens).sum();
            if total <= token_budget {
                return;
            }
            let last_index = self.messages.len().saturating_sub(1);
            let droppable = self
                .messages
                .iter()
                .enumerate()
                .position(|(i, m)| i != last_index && m.role != Role::System);
            match droppable {
                Some(idx) => {
                    self.messages.remove(idx);
                }
                None => return,
            }
        }
    }

    pub fn total_tokens(&self) -> usize {
        self.messages.iter().map(Message::approx_tokens).sum()
    }
}

/// Persists `ConversationThread` snapshots under `<root>/<thread_id>.json`.
pub struct ThreadStore {
    root: PathBuf,
}

impl ThreadStore {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, thread_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", thread_id))
    }

    /// Load a persisted thread, or a fresh empty one if none exists yet.
    pub fn load(&self, thread_id: &str, phase: &str) -> Result<ConversationThread, ConvoError> {
        let path = self.path_for(thread_id);
        if !path.exists() {
            return Ok(ConversationThread::new(thread_id, phase));
        }
        let bytes = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Atomically persist `thread` (temp file + fsync + rename), bumping its version.
    pub fn snapshot_thread(&self, thread: &mut ConversationThread) -> Result<(), ConvoError> {
        std::fs::create_dir_all(&self.root)?;
        thread.version += 1;

        let path = self.path_for(&thread.thread_id);
        let tmp_path = self.root.join(format!(".{}.json.tmp-{}", thread.thread_id, std::process::id()));

        let bytes = serde_json::to_vec_pretty(thread)?;
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    pub fn delete(&self, thread_id: &str) -> Result<(), ConvoError> {
        let path = self.path_for(thread_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<String>, ConvoError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stripped) = name.strip_suffix(".json") {
                if !stripped.starts_with('.') {
                    ids.push(stripped.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn trim_never_drops_system_or_last_message() {
        let mut thread = ConversationThread::new("t1", "coding");
        thread.append(Message::system("you are a coding agent"));
        for i in 0..20 {
            thread.append(Message::user(format!("message body number {i} padded out to cost real tokens")));
        }
        thread.append(Message::tool("run_command", "final in-flight tool result"));

        thread.trim(20);

        assert_eq!(thread.messages.first().unwrap().role, Role::System);
        assert_eq!(thread.messages.last().unwrap().tool_name.as_deref(), Some("run_command"));
        assert!(thread.total_tokens() <= 20 || thread.messages.len() == 2);
    }

    #[test]
    fn snapshot_then_load_round_trips_and_bumps_version() {
        let dir = tempdir().unwrap();
        let store = ThreadStore::open(dir.path());

        let mut thread = ConversationThread::new("t1", "planning");
        thread.append(Message::system("plan the feature"));
        store.snapshot_thread(&mut thread).unwrap();
        assert_eq!(thread.version, 1);

        let reloaded = store.load("t1", "planning").unwrap();
        assert_eq!(reloaded.version, 1);
        assert_eq!(reloaded.messages.len(), 1);
    }

    #[test]
    fn load_missing_thread_returns_fresh_empty_thread() {
        let dir = tempdir().unwrap();
        let store = ThreadStore::open(dir.path());
        let thread = store.load("unknown", "qa").unwrap();
        assert_eq!(thread.version, 0);
        assert!(thread.messages.is_empty());
    }

    #[test]
    fn list_returns_persisted_thread_ids() {
        let dir = tempdir().unwrap();
        let store = ThreadStore::open(dir.path());
        let mut t1 = ConversationThread::new("t1", "coding");
        let mut t2 = ConversationThread::new("t2", "qa");
        store.snapshot_thread(&mut t1).unwrap();
        store.snapshot_thread(&mut t2).unwrap();

        let ids = store.list().unwrap();
        assert_eq!(ids, vec!["t1".to_string(), "t2".to_string()]);
    }
}
