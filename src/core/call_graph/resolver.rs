// src/core/call_graph/resolver.rs
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::call_graph::{WorkflowCallGraph, WorkflowRelationship};
use crate::core::metadata::{ChildWorkflowCall, WorkflowMetadata};
use crate::core::parser::WorkflowParser;
use crate::error::{Result, WorkflowGraphError};

/// Builds a [`WorkflowCallGraph`] by following child workflow calls from an
/// entry file.
///
/// Child workflows are located in three tiers: the calling file, the
/// caller's imports, then a recursive search of the configured search paths.
pub struct CallGraphResolver {
    search_paths: Vec<PathBuf>,
    max_depth: usize,
}

/// Mutable state for one resolution run
#[derive(Default)]
struct WalkState {
    /// Workflows currently being expanded, outermost first
    open_stack: Vec<String>,
    open_set: HashSet<String>,
    child_workflows: BTreeMap<String, WorkflowMetadata>,
    relationships: Vec<WorkflowRelationship>,
    seen_edges: HashSet<WorkflowRelationship>,
    all_child_calls: Vec<ChildWorkflowCall>,
    /// (parent, call id) pairs already in `all_child_calls`
    seen_calls: HashSet<(String, String)>,
    /// Shallowest depth each cached child has been walked at
    expanded_depth: HashMap<String, usize>,
}

impl WalkState {
    fn enter(&mut self, name: &str) {
        self.open_stack.push(name.to_string());
        self.open_set.insert(name.to_string());
    }

    fn leave(&mut self, name: &str) {
        self.open_stack.pop();
        self.open_set.remove(name);
    }

    fn cycle_chain(&self, repeated: &str) -> Vec<String> {
        let mut chain = self.open_stack.clone();
        chain.push(repeated.to_string());
        chain
    }

    fn record_edge(&mut self, parent: &str, child: &str) {
        let edge = WorkflowRelationship {
            parent: parent.to_string(),
            child: child.to_string(),
        };
        if self.seen_edges.insert(edge.clone()) {
            self.relationships.push(edge);
        }
    }

    fn record_call(&mut self, call: &ChildWorkflowCall) {
        let key = (call.parent_workflow.clone(), call.call_id.clone());
        if self.seen_calls.insert(key) {
            self.all_child_calls.push(call.clone());
        }
    }
}

impl CallGraphResolver {
    pub fn new(search_paths: Vec<PathBuf>, max_depth: usize) -> Self {
        Self {
            search_paths,
            max_depth,
        }
    }

    /// Resolve the call graph rooted at the first workflow in `entry_file`
    pub fn resolve<P: AsRef<Path>>(
        &self,
        entry_file: P,
        parser: &mut WorkflowParser,
    ) -> Result<WorkflowCallGraph> {
        let root = parser.analyze(entry_file.as_ref())?;
        info!(
            "Resolving call graph for {} (max depth {})",
            root.name(),
            self.max_depth
        );

        let mut state = WalkState::default();
        state.enter(root.name());
        self.walk(&root, 0, parser, &mut state)?;
        state.leave(root.name());

        let graph = WorkflowCallGraph::new(
            root,
            state.child_workflows,
            state.relationships,
            state.all_child_calls,
        );
        info!(
            "Call graph resolved: {} workflows, {} relationships",
            graph.total_workflows,
            graph.call_relationships.len()
        );
        Ok(graph)
    }

    fn walk(
        &self,
        current: &WorkflowMetadata,
        depth: usize,
        parser: &mut WorkflowParser,
        state: &mut WalkState,
    ) -> Result<()> {
        let calls: Vec<ChildWorkflowCall> = current.child_calls().cloned().collect();
        if calls.is_empty() {
            return Ok(());
        }

        if depth >= self.max_depth {
            info!(
                "Max expansion depth {} reached at {}; leaving {} child calls unexpanded",
                self.max_depth,
                current.name(),
                calls.len()
            );
            return Ok(());
        }

        for call in calls {
            state.record_call(&call);
            let child_name = call.workflow_name.as_str();

            if state.open_set.contains(child_name) {
                return Err(WorkflowGraphError::CycleDetected {
                    chain: state.cycle_chain(child_name),
                });
            }

            state.record_edge(current.name(), child_name);

            // A cached child cut off deeper down may still have calls within reach
            if let Some(&walked_at) = state.expanded_depth.get(child_name) {
                if depth + 1 >= walked_at {
                    debug!("{} already resolved, reusing", child_name);
                    continue;
                }
                if let Some(child) = state.child_workflows.get(child_name).cloned() {
                    debug!(
                        "Re-expanding {} at depth {} (previously {})",
                        child_name,
                        depth + 1,
                        walked_at
                    );
                    self.descend(&child, depth + 1, parser, state)?;
                }
                continue;
            }

            let child_file = self.resolve_child_file(&call, current, parser)?;
            let child = parser.workflow_in(&child_file, child_name)?;
            debug!(
                "Resolved {} -> {} in {}",
                current.name(),
                child_name,
                child_file.display()
            );

            state
                .child_workflows
                .insert(child_name.to_string(), child.clone());
            self.descend(&child, depth + 1, parser, state)?;
        }

        Ok(())
    }

    /// Walk a child with it on the open stack, recording the depth reached
    fn descend(
        &self,
        child: &WorkflowMetadata,
        depth: usize,
        parser: &mut WorkflowParser,
        state: &mut WalkState,
    ) -> Result<()> {
        state
            .expanded_depth
            .insert(child.name().to_string(), depth);
        state.enter(child.name());
        self.walk(child, depth, parser, state)?;
        state.leave(child.name());
        Ok(())
    }

    /// Locate the file defining a called child workflow
    fn resolve_child_file(
        &self,
        call: &ChildWorkflowCall,
        current: &WorkflowMetadata,
        parser: &mut WorkflowParser,
    ) -> Result<PathBuf> {
        let name = call.workflow_name.as_str();
        let current_file = current.source_file().to_path_buf();
        let mut searched = Vec::new();

        // Tier 1: same file
        searched.push(current_file.clone());
        if parser.defines_workflow(&current_file, name)? {
            debug!("{} found in the calling file", name);
            return Ok(current_file);
        }

        // Tier 2: imports of the calling file
        let imports = parser.imports(&current_file)?;
        if let Some(module) = imports.get(name) {
            for candidate in parser.module_candidates(&current_file, module) {
                searched.push(candidate.clone());
                if candidate.is_file() {
                    debug!("{} found via import of {}", name, module);
                    return Ok(candidate);
                }
            }
        }

        // Tier 3: search paths
        for root in &self.search_paths {
            searched.push(root.clone());
            if let Some(found) = parser.find_workflow_in_dir(root, name) {
                debug!("{} found under {}", name, root.display());
                return Ok(found);
            }
        }

        Err(WorkflowGraphError::UnresolvedWorkflow {
            workflow: name.to_string(),
            referenced_by: current.name().to_string(),
            searched,
        })
    }
}
