//! Optional git-backed snapshot backups.
//!
//! Mirrors `.pipeline/backups/<op>_<ts>/` from the persisted-state layout:
//! before a risky mutation (verifier-triggered rewrite, refactor merge) the
//! caller copies the affected files here. If the target directory happens to
//! be a git repository, the snapshot is also staged and committed so a
//! human can `git log`/`git diff` the backup trail; if it isn't a repo, the
//! plain file copy still lands and no error is raised.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Copy `source` into `backups_root/<op>_<ts>/<source file name>` and, if
/// `backups_root`'s ancestor is a git work tree, best-effort commit it.
pub fn snapshot_dir(backups_root: &Path, op: &str, ts_ms: i64, source: &Path) -> Result<PathBuf, BackupError> {
    let dest_dir = backups_root.join(format!("{}_{}", op, ts_ms));
    std::fs::create_dir_all(&dest_dir)?;

    let file_name = source.file_name().unwrap_or_default();
    let dest = dest_dir.join(file_name);
    if source.is_file() {
        std::fs::copy(source, &dest)?;
    }

    try_git_commit(&dest_dir, op);

    Ok(dest_dir)
}

fn try_git_commit(dest_dir: &Path, op: &str) {
    let Some(repo_root) = find_git_root(dest_dir) else {
        return;
    };
    let _ = std::process::Command::new("git")
        .args(["add", "-A", "--"])
        .arg(dest_dir)
        .current_dir(&repo_root)
        .output();
    let _ = std::process::Command::new("git")
        .args(["commit", "-m", &format!("backup: {}", op), "--no-verify", "--quiet"])
        .current_dir(&repo_root)
        .output();
}

fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(".git").exists() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}
