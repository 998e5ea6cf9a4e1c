//! The polytope graph (§4.8): a labelled directed multigraph of phases,
//! each carrying a 7-dimensional profile used to score candidates during
//! selection.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Fixed 7-tuple of unit-interval values describing a phase's profile.
/// Field order matches spec order: temporal, functional, data, state,
/// error, context, integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dim7 {
    pub temporal: f64,
    pub functional: f64,
    pub data: f64,
    pub state: f64,
    pub error: f64,
    pub context: f64,
    pub integration: f64,
}

impl Dim7 {
    pub fn new(temporal: f64, functional: f64, data: f64, state: f64, error: f64, context: f64, integration: f64) -> Self {
        Self {
            temporal,
            functional,
            data,
            state,
            error,
            context,
            integration,
        }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    /// Weighted dot product against a situation-derived weight vector.
    pub fn dot(&self, weights: &Dim7) -> f64 {
        self.temporal * weights.temporal
            + self.functional * weights.functional
            + self.data * weights.data
            + self.state * weights.state
            + self.error * weights.error
            + self.context * weights.context
            + self.integration * weights.integration
    }

    /// Sum of all seven dimensions - the tie-break used when every
    /// candidate scores <= 0 (§4.8.2).
    pub fn sum(&self) -> f64 {
        self.temporal + self.functional + self.data + self.state + self.error + self.context + self.integration
    }
}

impl Default for Dim7 {
    fn default() -> Self {
        Self::zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexType {
    Phase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub vertex_type: VertexType,
    pub dimensions: Dim7,
}

/// `PolytopeState` - vertices are phase names with a `Dim7` profile,
/// edges encode allowed transitions. Every vertex must have an
/// entry in `edges`, even if its successor set is empty.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PolytopeState {
    pub vertices: HashMap<String, Vertex>,
    pub edges: HashMap<String, HashSet<String>>,
}

impl PolytopeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a phase vertex, creating an empty successor set if one
    /// doesn't already exist - keeps every edge endpoint registered as a vertex.
    pub fn add_vertex(&mut self, name: impl Into<String>, dimensions: Dim7) {
        let name = name.into();
        self.vertices.insert(
            name.clone(),
            Vertex {
                vertex_type: VertexType::Phase,
                dimensions,
            },
        );
        self.edges.entry(name).or_default();
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.edges.entry(from.into()).or_default().insert(to.into());
    }

    pub fn successors(&self, phase: &str) -> HashSet<String> {
        self.edges.get(phase).cloned().unwrap_or_default()
    }

    pub fn dimensions(&self, phase: &str) -> Option<Dim7> {
        self.vertices.get(phase).map(|v| v.dimensions)
    }

    /// Every vertex name must be present in `edges` as a key.
    pub fn satisfies_edge_closure(&self) -> bool {
        self.vertices.keys().all(|name| self.edges.contains_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_vertex_creates_empty_successor_set() {
        let mut polytope = PolytopeState::new();
        polytope.add_vertex("coding", Dim7::zero());
        assert!(polytope.satisfies_edge_closure());
        assert!(polytope.successors("coding").is_empty());
    }

    #[test]
    fn dot_product_weighs_each_dimension() {
        let profile = Dim7::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0);
        let weights = Dim7::new(2.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0);
        assert_eq!(profile.dot(&weights), 5.0);
    }

    #[test]
    fn edges_cover_every_vertex() {
        let mut polytope = PolytopeState::new();
        polytope.add_vertex("coding", Dim7::zero());
        polytope.add_vertex("qa", Dim7::zero());
        polytope.add_edge("coding", "qa");
        assert!(polytope.satisfies_edge_closure());
        assert!(polytope.successors("coding").contains("qa"));
    }
}
