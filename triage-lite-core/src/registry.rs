use crate::error::{DefinitionError, FlowError};
use crate::types::{StepDefinition, StepId};
use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered collection of step definitions for one workflow.
///
/// Metadata is immutable for the registry's lifetime; per-step status lives
/// in the session. Construction validates the definitions and fails fast on
/// configuration errors, so a registry in hand is always well-formed.
#[derive(Debug)]
pub struct StepRegistry {
    steps: Vec<Arc<StepDefinition>>,
    index: HashMap<StepId, usize>,
}

impl StepRegistry {
    pub fn new(definitions: Vec<StepDefinition>) -> Result<Self, FlowError> {
        let errors = validate_definitions(&definitions);
        if !errors.is_empty() {
            return Err(FlowError::InvalidDefinition { errors });
        }

        let steps: Vec<Arc<StepDefinition>> = definitions.into_iter().map(Arc::new).collect();
        let index = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        Ok(Self { steps, index })
    }

    pub fn get(&self, id: &str) -> Result<&Arc<StepDefinition>, FlowError> {
        self.index
            .get(id)
            .map(|&i| &self.steps[i])
            .ok_or_else(|| FlowError::StepNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All steps in declaration order.
    pub fn steps(&self) -> &[Arc<StepDefinition>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Validate step definitions before a registry is built. Returns all
/// violations found, not just the first.
fn validate_definitions(definitions: &[StepDefinition]) -> Vec<DefinitionError> {
    let mut errors = Vec::new();
    let mut seen: HashMap<&str, &StepDefinition> = HashMap::new();

    // D1: step ids must be unique
    for def in definitions {
        if seen.contains_key(def.id.as_str()) {
            errors.push(DefinitionError {
                rule: "D1",
                message: format!("Duplicate step id: {}", def.id),
            });
        } else {
            seen.insert(def.id.as_str(), def);
        }
    }

    // D2: requirements must reference known steps
    for def in definitions {
        for req in &def.requirements {
            if !seen.contains_key(req.as_str()) {
                errors.push(DefinitionError {
                    rule: "D2",
                    message: format!("Step {}: unknown requirement '{}'", def.id, req),
                });
            }
        }
    }

    // D3: a step must not require itself
    for def in definitions {
        if def.requirements.iter().any(|req| req == &def.id) {
            errors.push(DefinitionError {
                rule: "D3",
                message: format!("Step {} requires itself", def.id),
            });
        }
    }

    // D4: the requirements graph must be acyclic
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for def in definitions {
        graph.add_node(def.id.as_str());
        for req in &def.requirements {
            if req != &def.id && seen.contains_key(req.as_str()) {
                graph.add_edge(req.as_str(), def.id.as_str(), ());
            }
        }
    }
    if is_cyclic_directed(&graph) {
        errors.push(DefinitionError {
            rule: "D4",
            message: "Requirements graph contains a cycle".to_string(),
        });
    }

    errors
}
