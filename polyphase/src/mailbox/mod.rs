//! IPC Mailboxes (C9, §4.9): per-phase READ/WRITE markdown documents with
//! a small structured header, used as advisory cross-phase hints. The
//! mailbox never dictates behaviour by itself - `PhaseRunner` and the
//! coordinator's selector still validate everything they act on.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The structured header parsed out of a mailbox document's YAML front
/// matter. All fields optional - a mailbox may carry only prose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpcHint {
    pub next_phase: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    pub reason: Option<String>,
    /// Which phase wrote this hint - filled in by the reader, not present
    /// in the document itself.
    #[serde(skip)]
    pub from_phase: String,
}

/// One phase's mailbox pair: `READ_p` (others write, `p` reads) and
/// `WRITE_p` (`p` writes, others may read).
pub struct Mailbox {
    dir: PathBuf,
    phase: String,
}

impl Mailbox {
    pub fn new(mailboxes_dir: impl Into<PathBuf>, phase: impl Into<String>) -> Self {
        Self {
            dir: mailboxes_dir.into(),
            phase: phase.into(),
        }
    }

    fn read_path(&self) -> PathBuf {
        self.dir.join(format!("{}.read.md", self.phase))
    }

    fn write_path(&self) -> PathBuf {
        self.dir.join(format!("{}.write.md", self.phase))
    }

    /// Read this phase's inbox (other phases' `WRITE_x` documents that
    /// named this phase, already merged by the coordinator into a single
    /// file per phase via `publish`).
    pub fn read_hint(&self) -> std::io::Result<Option<IpcHint>> {
        let path = self.read_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(parse_header(&content).map(|mut hint| {
            hint.from_phase = self.phase.clone();
            hint
        }))
    }

    /// Write this phase's outbox: a structured YAML header followed by
    /// free-form markdown body.
    pub fn write(&self, hint: &IpcHint, body: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let header = serde_yaml::to_string(hint).unwrap_or_default();
        let content = format!("---\n{header}---\n\n{body}\n");
        fs::write(self.write_path(), content)
    }

    pub fn write_path_for_publish(&self) -> PathBuf {
        self.write_path()
    }
}

/// Parse a document's leading `---\n...\n---` YAML front matter into an
/// `IpcHint`. Returns `None` if there's no front matter (a pure-prose
/// mailbox is valid - it just carries no structured signal).
fn parse_header(content: &str) -> Option<IpcHint> {
    let rest = content.strip_prefix("---\n")?;
    let end = rest.find("\n---")?;
    let header = &rest[..end];
    serde_yaml::from_str(header).ok()
}

/// Scan every `WRITE_*` document under `mailboxes_dir` and fan each one's
/// hint into the inbox (`READ_*`) of every *other* phase, per §4.9's "others
/// may read" semantics. Called by the coordinator between phase runs.
pub fn publish_all(mailboxes_dir: &Path, phases: &[String]) -> std::io::Result<()> {
    let mut hints = Vec::new();
    for phase in phases {
        let mailbox = Mailbox::new(mailboxes_dir, phase);
        if let Some(hint) = mailbox.read_hint_of_write(phase)? {
            hints.push((phase.clone(), hint));
        }
    }

    for target in phases {
        let merged: Vec<&IpcHint> = hints.iter().filter(|(writer, _)| writer != target).map(|(_, hint)| hint).collect();
        if let Some(hint) = merged.into_iter().next() {
            let read_path = mailboxes_dir.join(format!("{target}.read.md"));
            let header = serde_yaml::to_string(hint).unwrap_or_default();
            fs::write(read_path, format!("---\n{header}---\n"))?;
        }
    }
    Ok(())
}

impl Mailbox {
    /// Read this phase's own `WRITE_p` document (used by `publish_all` to
    /// collect what every phase last wrote).
    fn read_hint_of_write(&self, _phase: &str) -> std::io::Result<Option<IpcHint>> {
        let path = self.write_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(parse_header(&content).map(|mut hint| {
            hint.from_phase = self.phase.clone();
            hint
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips_structured_header() {
        let dir = tempdir().unwrap();
        let mailbox = Mailbox::new(dir.path(), "coding");
        let hint = IpcHint {
            next_phase: Some("qa".into()),
            files: vec!["a.rs".into()],
            reason: Some("ready for review".into()),
            from_phase: String::new(),
        };
        mailbox.write(&hint, "coding finished the task").unwrap();

        let written = mailbox.read_hint_of_write("coding").unwrap().unwrap();
        assert_eq!(written.next_phase.as_deref(), Some("qa"));
        assert_eq!(written.files, vec!["a.rs".to_string()]);
    }

    #[test]
    fn missing_mailbox_reads_as_none() {
        let dir = tempdir().unwrap();
        let mailbox = Mailbox::new(dir.path(), "coding");
        assert!(mailbox.read_hint().unwrap().is_none());
    }

    #[test]
    fn prose_only_document_has_no_structured_hint() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join("coding.write.md"), "just some notes, no front matter").unwrap();
        let mailbox = Mailbox::new(dir.path(), "coding");
        assert!(mailbox.read_hint_of_write("coding").unwrap().is_none());
    }

    #[test]
    fn publish_fans_writer_hint_into_other_phases_inboxes() {
        let dir = tempdir().unwrap();
        let writer = Mailbox::new(dir.path(), "qa");
        writer
            .write(
                &IpcHint {
                    next_phase: Some("debugging".into()),
                    files: vec![],
                    reason: Some("found a bug".into()),
                    from_phase: String::new(),
                },
                "qa report",
            )
            .unwrap();

        publish_all(dir.path(), &["qa".to_string(), "debugging".to_string()]).unwrap();

        let reader = Mailbox::new(dir.path(), "debugging");
        let hint = reader.read_hint().unwrap().unwrap();
        assert_eq!(hint.next_phase.as_deref(), Some("debugging"));

        // The writer never receives its own hint back in its inbox.
        let self_reader = Mailbox::new(dir.path(), "qa");
        assert!(self_reader.read_hint().unwrap().is_none());
    }
}
