//! Phase implementations (C10): each phase is a thin configuration of
//! `PhaseRunner` - a name, a system prompt, an allow-list of tools, a
//! polytope vertex, and the two hooks that decide when its task is
//! picked up and when it's done. None of them own the conversational
//! loop itself; that lives in `phase_runner`.

mod coding;
mod debugging;
mod documentation;
mod investigation;
mod planning;
mod project_planning;
mod qa;
mod refactoring;
mod self_improvement;

pub use coding::CodingPhase;
pub use debugging::DebuggingPhase;
pub use documentation::DocumentationPhase;
pub use investigation::InvestigationPhase;
pub use planning::PlanningPhase;
pub use project_planning::ProjectPlanningPhase;
pub use qa::QaPhase;
pub use refactoring::RefactoringPhase;
pub use self_improvement::SelfImprovementPhase;

use std::collections::HashMap;

use crate::coordinator::polytope::{Dim7, PolytopeState};
use crate::domain::PipelineState;
use crate::errors::PipelineError;
use crate::phase_runner::RunState;
use crate::tools::ToolProfile;

/// Minimum contract every phase satisfies (§4.10). `selectOrCreateTask`
/// and the tool-result hooks may mutate state; everything else is a pure
/// read of it.
pub trait Phase: Send + Sync {
    fn name(&self) -> &str;

    /// Registered as this phase's vertex in the polytope.
    fn dim7(&self) -> Dim7;

    fn system_prompt(&self, state: &PipelineState) -> String;

    fn allowed_tools(&self, state: &PipelineState) -> Vec<String>;

    /// Most phases see the full tool surface; read-only investigative
    /// phases override this to `ToolProfile::ReadOnly`.
    fn tool_profile(&self) -> ToolProfile {
        ToolProfile::Full
    }

    /// Find this phase's next unit of work, creating one if none exists.
    /// Returns `Ok(None)` when there's genuinely nothing to do this run.
    fn select_or_create_task(&self, state: &mut PipelineState) -> Result<Option<String>, PipelineError>;

    /// Called by `PhaseRunner` after every dispatched tool call (§4.10's
    /// "tools never mutate PipelineState themselves" - phases may, since
    /// they own the task they selected). Default: no-op.
    fn on_tool_result(&self, _state: &mut PipelineState, _task_id: &str, _tool_name: &str, _args: &serde_json::Value, _success: bool) {}

    fn completion_predicate(&self, state: &PipelineState, run_state: &RunState) -> bool;
}

/// Name -> phase map, plus the polytope vertex/edge wiring every phase
/// registers at construction (§4.8.1's G = (V, E, dims)).
pub struct PhaseRegistry {
    phases: HashMap<String, Box<dyn Phase>>,
}

impl PhaseRegistry {
    pub fn new() -> Self {
        Self { phases: HashMap::new() }
    }

    pub fn register(&mut self, phase: Box<dyn Phase>) {
        self.phases.insert(phase.name().to_string(), phase);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Phase> {
        self.phases.get(name).map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.phases.keys().cloned().collect()
    }

    /// The nine built-in phases (planning, coding, qa, debugging,
    /// investigation, refactoring, documentation, project_planning,
    /// self_improvement), wired into a fresh `PolytopeState`.
    pub fn standard() -> (Self, PolytopeState) {
        let mut registry = Self::new();
        registry.register(Box::new(PlanningPhase));
        registry.register(Box::new(CodingPhase));
        registry.register(Box::new(QaPhase));
        registry.register(Box::new(DebuggingPhase));
        registry.register(Box::new(InvestigationPhase));
        registry.register(Box::new(RefactoringPhase));
        registry.register(Box::new(DocumentationPhase));
        registry.register(Box::new(ProjectPlanningPhase));
        registry.register(Box::new(SelfImprovementPhase));

        let mut polytope = PolytopeState::new();
        for name in registry.names() {
            let dims = registry.get(&name).expect("just registered").dim7();
            polytope.add_vertex(name, dims);
        }

        // The linear happy path: planning feeds coding, coding feeds qa,
        // qa feeds debugging on failure or loops back to coding on pass.
        polytope.add_edge("planning", "coding");
        polytope.add_edge("coding", "qa");
        polytope.add_edge("qa", "debugging");
        polytope.add_edge("qa", "coding");
        polytope.add_edge("debugging", "qa");
        polytope.add_edge("project_planning", "coding");
        polytope.add_edge("self_improvement", "planning");

        // refactoring, investigation, documentation are always-available
        // sinks per §4.8.2 - `selection::select` adds them to every
        // candidate set regardless of the edge set, but registering the
        // obvious return edges keeps `successors` meaningful too.
        for sink in ["refactoring", "investigation", "documentation"] {
            polytope.add_edge("coding", sink);
            polytope.add_edge("qa", sink);
            polytope.add_edge("debugging", sink);
            polytope.add_edge(sink, "coding");
        }

        (registry, polytope)
    }
}

impl Default for PhaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_all_nine_phases_as_polytope_vertices() {
        let (registry, polytope) = PhaseRegistry::standard();
        let expected = [
            "planning",
            "coding",
            "qa",
            "debugging",
            "investigation",
            "refactoring",
            "documentation",
            "project_planning",
            "self_improvement",
        ];
        for name in expected {
            assert!(registry.get(name).is_some(), "missing phase {name}");
            assert!(polytope.vertices.contains_key(name), "missing vertex {name}");
        }
    }

    #[test]
    fn coding_is_a_successor_of_planning() {
        let (_, polytope) = PhaseRegistry::standard();
        assert!(polytope.successors("planning").contains("coding"));
    }
}
