//! Selection (§4.8.2): tactical overrides, then a weighted-dot-product
//! score over each candidate's `Dim7` profile.

use std::collections::HashSet;

use crate::coordinator::polytope::{Dim7, PolytopeState};
use crate::coordinator::situation::{Complexity, ErrorSeverity, Situation};
use crate::domain::PipelineState;

/// Always-available sinks, regardless of the polytope's edge set -
/// refactoring, investigation, and documentation are reachable from
/// anywhere (§4.8.2).
const ALWAYS_AVAILABLE_SINKS: &[&str] = &["refactoring", "investigation", "documentation"];

/// Force a refactoring pass every K=20 outer-loop iterations as a
/// periodic hygiene sweep.
const HYGIENE_PASS_PERIOD: u64 = 20;

/// File-creation burst that makes refactoring a forced candidate.
const FILE_CREATION_BURST_THRESHOLD: usize = 15;

/// Build the situation-derived weight vector (§4.8.2's bullet list).
fn situation_weights(situation: &Situation) -> Dim7 {
    let mut weights = Dim7::new(1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0);

    if situation.error_severity >= ErrorSeverity::High {
        weights.error *= 3.0;
        weights.context *= 2.0;
    }
    if situation.complexity == Complexity::High {
        weights.functional *= 2.0;
        weights.integration *= 2.0;
    }
    if situation.urgency > 0.5 {
        weights.temporal *= 2.0;
    }
    if situation.recent_file_creations >= FILE_CREATION_BURST_THRESHOLD {
        weights.data *= 2.0;
    }

    weights
}

/// `select(situation, state, G)` (§4.8.2). `curr` is the last vertex run
/// (`None` on the very first iteration, in which case every vertex is a
/// candidate). Never returns `None` - on an empty candidate set it falls
/// back to `curr` itself, per spec.
pub fn select(situation: &Situation, state: &PipelineState, curr: Option<&str>, polytope: &PolytopeState) -> String {
    // --- tactical overrides, checked before scoring ---
    if situation.has_errors && situation.error_severity >= ErrorSeverity::Medium {
        if polytope.vertices.contains_key("debugging") {
            return "debugging".to_string();
        }
    }
    if let Some(task) = state.current_in_progress_task() {
        if task.category == "documentation" && polytope.vertices.contains_key("documentation") {
            return "documentation".to_string();
        }
    }
    for hint in &situation.ipc_hints {
        if let Some(next) = &hint.next_phase {
            let would_ping_pong = curr.is_some() && hint.from_phase == *next;
            if !would_ping_pong && polytope.vertices.contains_key(next) {
                return next.clone();
            }
        }
    }

    // --- candidate set: curr's successors + always-available sinks ---
    let mut candidates: HashSet<String> = match curr {
        Some(c) => polytope.successors(c),
        None => polytope.vertices.keys().cloned().collect(),
    };
    for sink in ALWAYS_AVAILABLE_SINKS {
        if polytope.vertices.contains_key(*sink) {
            candidates.insert(sink.to_string());
        }
    }
    if situation.recent_file_creations >= FILE_CREATION_BURST_THRESHOLD && polytope.vertices.contains_key("refactoring") {
        candidates.insert("refactoring".to_string());
    }
    if situation.iterations_completed > 0 && situation.iterations_completed % HYGIENE_PASS_PERIOD == 0 && polytope.vertices.contains_key("refactoring") {
        candidates.insert("refactoring".to_string());
    }

    if candidates.is_empty() {
        return curr.unwrap_or_default().to_string();
    }

    let weights = situation_weights(situation);
    let mut best: Option<(String, f64)> = None;
    for name in &candidates {
        let Some(dims) = polytope.dimensions(name) else { continue };
        let score = dims.dot(&weights);
        if best.as_ref().map(|(_, s)| score > *s).unwrap_or(true) {
            best = Some((name.clone(), score));
        }
    }

    match best {
        Some((name, score)) if score > 0.0 => name,
        _ => {
            // All candidates scored <= 0: fall back to curr's
            // highest-dimension-sum neighbour.
            candidates
                .into_iter()
                .filter_map(|name| polytope.dimensions(&name).map(|d| (name, d.sum())))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(name, _)| name)
                .unwrap_or_else(|| curr.unwrap_or_default().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::situation::{Complexity, ErrorSeverity};
    use tempfile::tempdir;

    fn empty_state() -> PipelineState {
        let dir = tempdir().unwrap();
        PipelineState::load(dir.path()).unwrap()
    }

    fn base_situation() -> Situation {
        Situation {
            has_errors: false,
            error_severity: ErrorSeverity::None,
            complexity: Complexity::Low,
            urgency: 0.0,
            pending_task_count: 0,
            recent_file_creations: 0,
            duplicate_patterns_detected: false,
            ipc_hints: Vec::new(),
            iterations_completed: 0,
        }
    }

    fn sample_polytope() -> PolytopeState {
        let mut polytope = PolytopeState::new();
        polytope.add_vertex("coding", Dim7::new(0.5, 0.8, 0.2, 0.2, 0.1, 0.1, 0.3));
        polytope.add_vertex("qa", Dim7::new(0.2, 0.3, 0.1, 0.1, 0.6, 0.4, 0.2));
        polytope.add_vertex("debugging", Dim7::new(0.3, 0.2, 0.1, 0.2, 0.9, 0.7, 0.2));
        polytope.add_edge("coding", "qa");
        polytope.add_edge("qa", "debugging");
        polytope.add_edge("qa", "coding");
        polytope
    }

    #[test]
    fn high_error_severity_forces_debugging_override() {
        let polytope = sample_polytope();
        let mut situation = base_situation();
        situation.has_errors = true;
        situation.error_severity = ErrorSeverity::High;
        let state = empty_state();
        assert_eq!(select(&situation, &state, Some("coding"), &polytope), "debugging");
    }

    #[test]
    fn no_current_vertex_scores_across_all_vertices() {
        let polytope = sample_polytope();
        let situation = base_situation();
        let state = empty_state();
        let chosen = select(&situation, &state, None, &polytope);
        assert!(polytope.vertices.contains_key(&chosen));
    }

    #[test]
    fn empty_candidate_set_falls_back_to_curr() {
        let mut polytope = PolytopeState::new();
        polytope.add_vertex("lonely", Dim7::zero());
        let situation = base_situation();
        let state = empty_state();
        assert_eq!(select(&situation, &state, Some("lonely"), &polytope), "lonely");
    }

    #[test]
    fn ipc_hint_is_honoured_unless_it_would_ping_pong() {
        let polytope = sample_polytope();
        let mut situation = base_situation();
        situation.ipc_hints.push(crate::mailbox::IpcHint {
            next_phase: Some("debugging".into()),
            files: vec![],
            reason: None,
            from_phase: "qa".into(),
        });
        let state = empty_state();
        assert_eq!(select(&situation, &state, Some("coding"), &polytope), "debugging");
    }

    #[test]
    fn current_documentation_task_overrides_everything_but_errors() {
        let polytope = sample_polytope();
        let mut situation = base_situation();
        situation.ipc_hints.push(crate::mailbox::IpcHint {
            next_phase: Some("debugging".into()),
            files: vec![],
            reason: None,
            from_phase: "qa".into(),
        });

        let mut docs_polytope = polytope.clone();
        docs_polytope.add_vertex("documentation", Dim7::new(0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.9));

        let mut state = empty_state();
        let task = crate::domain::Task::new("write docs", "d", crate::domain::Priority::Low, "documentation", None);
        let task_id = task.id.clone();
        state.create_task(task).unwrap();
        state.start_task(&task_id).unwrap();

        assert_eq!(select(&situation, &state, Some("coding"), &docs_polytope), "documentation");
    }

    #[test]
    fn documentation_override_yields_to_high_error_severity() {
        let mut polytope = sample_polytope();
        polytope.add_vertex("documentation", Dim7::new(0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.9));
        let mut situation = base_situation();
        situation.has_errors = true;
        situation.error_severity = ErrorSeverity::High;

        let mut state = empty_state();
        let task = crate::domain::Task::new("write docs", "d", crate::domain::Priority::Low, "documentation", None);
        let task_id = task.id.clone();
        state.create_task(task).unwrap();
        state.start_task(&task_id).unwrap();

        assert_eq!(select(&situation, &state, Some("coding"), &polytope), "debugging");
    }
}
