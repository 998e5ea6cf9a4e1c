//! Verifier (C4): classifies file mutations as wrap-vs-replace and checks
//! them back against what actually landed on disk, plus crash detection
//! over a runtime test's stderr tail.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("io error reading back file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Wrapping,
    Replacement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Ok { kind: EditKind },
    WrappedCodeMissing,
    NewCodeMissing,
    OriginalStillPresent,
}

impl VerificationOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, VerificationOutcome::Ok { .. })
    }
}

/// Collapse runs of whitespace to a single space, per §4.4's normalisation rule.
fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

const WRAP_THRESHOLD: f64 = 1.3;

/// Classify and verify a mutation: `orig` is the file's content before the
/// tool ran, `new` is what the tool intended to write, `written` is what
/// was actually read back from disk afterward.
pub fn verify_mutation(orig: &str, new: &str, written: &str) -> VerificationOutcome {
    let orig_n = normalize(orig);
    let new_n = normalize(new);
    let written_n = normalize(written);

    let is_wrapping = new_n.contains(&orig_n) && !orig_n.is_empty() && (new_n.len() as f64) > WRAP_THRESHOLD * (orig_n.len() as f64);

    if is_wrapping {
        if written_n.contains(&new_n) {
            VerificationOutcome::Ok { kind: EditKind::Wrapping }
        } else {
            VerificationOutcome::WrappedCodeMissing
        }
    } else {
        if !written_n.contains(&new_n) {
            return VerificationOutcome::NewCodeMissing;
        }
        if !new_n.contains(&orig_n) && written_n.contains(&orig_n) {
            return VerificationOutcome::OriginalStillPresent;
        }
        VerificationOutcome::Ok { kind: EditKind::Replacement }
    }
}

/// Scan the tail of a runtime test's stderr for crash markers when the
/// process exited non-zero and log-file tailing found nothing actionable.
pub fn detect_runtime_crash(stderr: &str, exit_success: bool) -> Option<String> {
    if exit_success {
        return None;
    }

    const TAIL_LINES: usize = 50;
    let lines: Vec<&str> = stderr.lines().collect();
    let tail = &lines[lines.len().saturating_sub(TAIL_LINES)..];

    let crash_line = tail.iter().find(|line| line.contains("Traceback") || line.contains("Error:"));

    crash_line.map(|line| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_try_except_verifies_even_though_orig_is_a_substring() {
        let orig = "result = risky_call()";
        let new = "try:\n    result = risky_call()\nexcept Exception as e:\n    log(e)\n    result = None";
        let outcome = verify_mutation(orig, new, new);
        assert_eq!(outcome, VerificationOutcome::Ok { kind: EditKind::Wrapping });
    }

    #[test]
    fn wrapping_missing_from_disk_is_reported() {
        let orig = "result = risky_call()";
        let new = "try:\n    result = risky_call()\nexcept Exception:\n    pass\n    pass\n    pass";
        let written = "result = risky_call()";
        assert_eq!(verify_mutation(orig, new, written), VerificationOutcome::WrappedCodeMissing);
    }

    #[test]
    fn plain_replacement_verifies_when_original_is_gone() {
        let orig = "return old_value";
        let new = "return new_value";
        let outcome = verify_mutation(orig, new, new);
        assert_eq!(outcome, VerificationOutcome::Ok { kind: EditKind::Replacement });
    }

    #[test]
    fn replacement_reports_new_code_missing() {
        let orig = "return old_value";
        let new = "return new_value";
        let written = "return old_value";
        assert_eq!(verify_mutation(orig, new, written), VerificationOutcome::NewCodeMissing);
    }

    #[test]
    fn replacement_reports_original_still_present_when_disjoint_but_leftover() {
        let orig = "return old_value";
        let new = "return new_value";
        let written = "return new_value\nreturn old_value";
        assert_eq!(verify_mutation(orig, new, written), VerificationOutcome::OriginalStillPresent);
    }

    #[test]
    fn runtime_crash_detected_from_traceback_marker() {
        let stderr = "some log line\nTraceback (most recent call last):\n  File x, line 1\nKeyError: 'url'";
        let crash = detect_runtime_crash(stderr, false);
        assert!(crash.is_some());
    }

    #[test]
    fn successful_exit_never_reports_a_crash() {
        let stderr = "Traceback (most recent call last):\nKeyError: 'url'";
        assert!(detect_runtime_crash(stderr, true).is_none());
    }
}
