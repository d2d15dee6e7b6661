// src/core/call_graph/call_graph.rs
use std::collections::BTreeMap;
use serde::Serialize;

use super::super::metadata::{ChildWorkflowCall, WorkflowMetadata};

/// Directed parent -> child edge between workflows
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WorkflowRelationship {
    pub parent: String,
    pub child: String,
}

/// Workflows reachable from one entry workflow through child calls.
///
/// Nodes are keyed by workflow name, so a workflow called from two parents
/// appears once in `child_workflows` with two relationship edges.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowCallGraph {
    pub root_workflow: WorkflowMetadata,
    /// Every distinct child workflow by name
    pub child_workflows: BTreeMap<String, WorkflowMetadata>,
    /// Parent/child edges in discovery order; acyclic by construction
    pub call_relationships: Vec<WorkflowRelationship>,
    /// Every child call fact seen while walking the graph
    pub all_child_calls: Vec<ChildWorkflowCall>,
    pub total_workflows: usize,
}

impl WorkflowCallGraph {
    pub fn new(
        root_workflow: WorkflowMetadata,
        child_workflows: BTreeMap<String, WorkflowMetadata>,
        call_relationships: Vec<WorkflowRelationship>,
        all_child_calls: Vec<ChildWorkflowCall>,
    ) -> Self {
        let total_workflows = 1 + child_workflows.len();
        Self {
            root_workflow,
            child_workflows,
            call_relationships,
            all_child_calls,
            total_workflows,
        }
    }

    /// Look up the root or a child workflow by name
    pub fn workflow(&self, name: &str) -> Option<&WorkflowMetadata> {
        if self.root_workflow.name() == name {
            Some(&self.root_workflow)
        } else {
            self.child_workflows.get(name)
        }
    }

    /// Whether the resolver followed the call from `parent` into `child`
    pub fn has_relationship(&self, parent: &str, child: &str) -> bool {
        self.call_relationships
            .iter()
            .any(|r| r.parent == parent && r.child == child)
    }

    /// Children called directly by a workflow, in discovery order
    pub fn children_of(&self, parent: &str) -> Vec<&str> {
        self.call_relationships
            .iter()
            .filter(|r| r.parent == parent)
            .map(|r| r.child.as_str())
            .collect()
    }

    /// Workflows that call the given workflow
    pub fn parents_of(&self, child: &str) -> Vec<&str> {
        self.call_relationships
            .iter()
            .filter(|r| r.child == child)
            .map(|r| r.parent.as_str())
            .collect()
    }
}
