//! Error-set comparison across iterations: tells a model hammering the
//! same bug apart from one that's actually making progress through
//! successive distinct failures.

use std::collections::HashSet;

/// Identifies one error instance. Two errors are the same iff all four
/// fields match - a changed line number on an otherwise-identical error
/// counts as a different error, since that's often exactly the signal
/// that the fix moved something.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorSignature {
    pub error_type: String,
    pub normalised_message: String,
    pub file: String,
    pub line: u32,
}

impl ErrorSignature {
    pub fn new(error_type: impl Into<String>, normalised_message: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            error_type: error_type.into(),
            normalised_message: normalised_message.into(),
            file: file.into(),
            line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Some errors fixed, some new ones appeared - still progress.
    BugTransition,
    /// Some errors fixed, none new.
    BugFixed,
    /// No errors fixed, but new ones appeared.
    NewBug,
    /// Same non-empty error set as last iteration.
    NoProgress,
    /// No errors this iteration or last - nothing to compare.
    Clean,
}

impl Transition {
    /// Whether this transition counts as forward movement for
    /// `LoopDetector::note_progress` - anything that fixed at least one
    /// error, per §4.6.
    pub fn is_progress(&self) -> bool {
        matches!(self, Transition::BugTransition | Transition::BugFixed)
    }
}

/// Compares one iteration's error set to the previous iteration's.
pub struct ProgressTracker {
    previous: HashSet<ErrorSignature>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self { previous: HashSet::new() }
    }

    /// Ingest the current iteration's errors, compare against the
    /// previous iteration, and classify the transition. The current set
    /// becomes `previous` for the next call.
    pub fn observe(&mut self, current: impl IntoIterator<Item = ErrorSignature>) -> Transition {
        let current: HashSet<ErrorSignature> = current.into_iter().collect();

        let fixed = self.previous.difference(&current).count();
        let new = current.difference(&self.previous).count();

        let transition = match (fixed > 0, new > 0) {
            (true, true) => Transition::BugTransition,
            (true, false) => Transition::BugFixed,
            (false, true) => Transition::NewBug,
            (false, false) if !current.is_empty() => Transition::NoProgress,
            (false, false) => Transition::Clean,
        };

        self.previous = current;
        transition
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(n: u32) -> ErrorSignature {
        ErrorSignature::new("KeyError", format!("missing key {n}"), "app.py", n)
    }

    #[test]
    fn first_observation_with_errors_is_new_bug_not_no_progress() {
        let mut tracker = ProgressTracker::new();
        let transition = tracker.observe([sig(1), sig(2)]);
        // Nothing fixed (previous was empty), but these errors are new.
        assert_eq!(transition, Transition::NewBug);
        assert!(!transition.is_progress());
    }

    #[test]
    fn fixing_all_errors_with_no_new_ones_is_bug_fixed() {
        let mut tracker = ProgressTracker::new();
        tracker.observe([sig(1), sig(2)]);
        let transition = tracker.observe([]);
        assert_eq!(transition, Transition::BugFixed);
        assert!(transition.is_progress());
    }

    #[test]
    fn same_errors_again_is_no_progress() {
        let mut tracker = ProgressTracker::new();
        tracker.observe([sig(1)]);
        let transition = tracker.observe([sig(1)]);
        assert_eq!(transition, Transition::NoProgress);
        assert!(!transition.is_progress());
    }

    #[test]
    fn fixing_one_and_introducing_another_is_bug_transition() {
        let mut tracker = ProgressTracker::new();
        tracker.observe([sig(1)]);
        let transition = tracker.observe([sig(2)]);
        assert_eq!(transition, Transition::BugTransition);
        assert!(transition.is_progress());
    }

    #[test]
    fn new_error_with_none_fixed_is_new_bug() {
        let mut tracker = ProgressTracker::new();
        tracker.observe([sig(1)]);
        let transition = tracker.observe([sig(1), sig(2)]);
        assert_eq!(transition, Transition::NewBug);
        assert!(!transition.is_progress());
    }

    #[test]
    fn line_number_change_counts_as_a_distinct_error() {
        let mut tracker = ProgressTracker::new();
        tracker.observe([ErrorSignature::new("KeyError", "missing key", "app.py", 10)]);
        let transition = tracker.observe([ErrorSignature::new("KeyError", "missing key", "app.py", 11)]);
        assert_eq!(transition, Transition::BugTransition);
    }

    #[test]
    fn empty_to_empty_is_clean() {
        let mut tracker = ProgressTracker::new();
        tracker.observe([]);
        let transition = tracker.observe([]);
        assert_eq!(transition, Transition::Clean);
    }
}
