//! LoopDetector / ProgressTracker (C6): fingerprints every tool call to
//! spot repetition, and compares error sets across iterations to tell
//! genuine repetition from a model hammering on a succession of distinct
//! bugs with the same tool.

mod progress;

pub use progress::{ErrorSignature, ProgressTracker, Transition};

use std::collections::VecDeque;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::Value;

const WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionFingerprint(pub u64);

impl ActionFingerprint {
    pub fn new(phase: &str, tool_name: &str, args: &Value) -> Self {
        let normalised = normalise_args(args);
        let mut hasher = DefaultHasher::new();
        phase.hash(&mut hasher);
        tool_name.hash(&mut hasher);
        normalised.hash(&mut hasher);
        ActionFingerprint(hasher.finish())
    }
}

/// Sort object keys and drop whitespace-only differences so two
/// functionally identical calls with reordered JSON keys fingerprint the same.
fn normalise_args(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by_key(|(k, _)| k.clone());
                let mut out = serde_json::Map::new();
                for (k, v) in entries {
                    out.insert(k.clone(), sorted(v));
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopReport {
    ActionLoop,
    OscillatingLoop,
    SaturatedLoop,
}

/// Sliding window of the last `K=20` fingerprints for one task.
pub struct LoopDetector {
    window: VecDeque<ActionFingerprint>,
    /// Set by `ProgressTracker` each iteration; while true, `ActionLoop`
    /// reports are suppressed even if fingerprints repeat (§4.6).
    progress_seen_this_round: bool,
}

impl LoopDetector {
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(WINDOW),
            progress_seen_this_round: false,
        }
    }

    pub fn record(&mut self, fingerprint: ActionFingerprint) {
        if self.window.len() == WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(fingerprint);
    }

    /// Progress overrides repetition: call this once per iteration with
    /// whether the error signature changed from the previous one.
    pub fn note_progress(&mut self, error_signature_changed: bool) {
        self.progress_seen_this_round = error_signature_changed;
    }

    /// Evaluate the three detection rules in order (§4.6). Progress
    /// suppresses only `ActionLoop`, never the stronger saturation signal.
    pub fn check(&self) -> Option<LoopReport> {
        match self.check_action_loop() {
            Some(LoopReport::ActionLoop) if self.progress_seen_this_round => None,
            other => other,
        }
    }

    /// Detection rules evaluated in priority order:
    /// 1. ActionLoop, 2. OscillatingLoop, 3. SaturatedLoop.
    fn check_action_loop(&self) -> Option<LoopReport> {
        let entries: Vec<&ActionFingerprint> = self.window.iter().collect();
        let n = entries.len();

        if n >= 5 {
            let last5 = &entries[n - 5..];
            for fp in last5 {
                let count = last5.iter().filter(|e| *e == fp).count();
                if count >= 3 {
                    return Some(LoopReport::ActionLoop);
                }
            }
        }

        if n >= 10 {
            let last10 = &entries[n - 10..];
            for fp in last10 {
                let count = last10.iter().filter(|e| *e == fp).count();
                if count >= 5 {
                    let positions: Vec<usize> = last10
                        .iter()
                        .enumerate()
                        .filter_map(|(i, e)| if *e == fp { Some(i) } else { None })
                        .collect();
                    let has_gap = positions.windows(2).any(|w| w[1] - w[0] > 1);
                    if has_gap {
                        return Some(LoopReport::OscillatingLoop);
                    }
                }
            }
        }

        if n >= 8 {
            let full_count = |fp: &ActionFingerprint| entries.iter().filter(|e| **e == fp).count();
            if entries.iter().any(|fp| full_count(fp) >= 8) {
                return Some(LoopReport::SaturatedLoop);
            }
        }

        None
    }

    /// Whether the current window is stuck with no offsetting progress -
    /// used by `PhaseRunner` to decide whether to inject a guidance message.
    pub fn stuck_without_progress(&self) -> bool {
        !self.progress_seen_this_round && self.check_action_loop().is_some()
    }
}

impl Default for LoopDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(n: u64) -> ActionFingerprint {
        ActionFingerprint(n)
    }

    #[test]
    fn fingerprint_ignores_key_order() {
        let a = ActionFingerprint::new("coding", "modify_file", &serde_json::json!({"path": "a.rs", "find": "x"}));
        let b = ActionFingerprint::new("coding", "modify_file", &serde_json::json!({"find": "x", "path": "a.rs"}));
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_by_phase() {
        let a = ActionFingerprint::new("coding", "grep", &serde_json::json!({"pattern": "x"}));
        let b = ActionFingerprint::new("qa", "grep", &serde_json::json!({"pattern": "x"}));
        assert_ne!(a, b);
    }

    #[test]
    fn three_repeats_in_last_five_triggers_action_loop() {
        let mut d = LoopDetector::new();
        for f in [fp(1), fp(2), fp(1), fp(3), fp(1)] {
            d.record(f);
        }
        assert_eq!(d.check(), Some(LoopReport::ActionLoop));
    }

    #[test]
    fn progress_suppresses_action_loop() {
        let mut d = LoopDetector::new();
        for f in [fp(1), fp(2), fp(1), fp(3), fp(1)] {
            d.record(f);
        }
        d.note_progress(true);
        assert_eq!(d.check(), None);
    }

    #[test]
    fn eight_occurrences_spread_across_window_is_saturated() {
        // fp(9) appears 8 times, spread thinly enough that neither the
        // ActionLoop nor OscillatingLoop windows trip first.
        let mut d = LoopDetector::new();
        for i in 0..20u64 {
            if i % 2 == 0 && i <= 14 {
                d.record(fp(9));
            } else {
                d.record(fp(100 + i));
            }
        }
        assert_eq!(d.check(), Some(LoopReport::SaturatedLoop));
    }

    #[test]
    fn no_repeats_reports_nothing() {
        let mut d = LoopDetector::new();
        for f in [fp(1), fp(2), fp(3), fp(4), fp(5)] {
            d.record(f);
        }
        assert_eq!(d.check(), None);
    }
}
