// src/core/expansion.rs
//! Combines per-workflow path sets across child workflow calls.
//!
//! `reference` keeps child calls as opaque steps, `inline` splices every
//! child path into every parent path at the call site, and `subgraph`
//! produces the same paths as `reference` (it only changes how a renderer
//! groups nodes).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, WorkflowGraphError};
use super::call_graph::WorkflowCallGraph;
use super::metadata::{StepKind, WorkflowMetadata};
use super::path_generator::{ExecutionPath, PathGenerator, PathStep, PathStepKind};

/// How child workflow paths combine with their parent's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionMode {
    #[default]
    Reference,
    Inline,
    Subgraph,
}

impl FromStr for ExpansionMode {
    type Err = WorkflowGraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "reference" => Ok(ExpansionMode::Reference),
            "inline" => Ok(ExpansionMode::Inline),
            "subgraph" => Ok(ExpansionMode::Subgraph),
            other => Err(WorkflowGraphError::Config(format!(
                "Unknown expansion mode '{}' (expected reference, inline or subgraph)",
                other
            ))),
        }
    }
}

impl fmt::Display for ExpansionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpansionMode::Reference => "reference",
            ExpansionMode::Inline => "inline",
            ExpansionMode::Subgraph => "subgraph",
        };
        f.write_str(name)
    }
}

/// Marks the point where a path crosses into or back out of a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowTransition {
    /// Index into the merged step list of the first step after the crossing
    pub step_index: usize,
    pub from_workflow: String,
    pub to_workflow: String,
}

/// A path step tagged with the workflow it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiPathStep {
    pub workflow: String,
    #[serde(flatten)]
    pub step: PathStep,
}

/// An execution path that may span several workflows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiWorkflowPath {
    path_id: String,
    workflows: Vec<String>,
    steps: Vec<MultiPathStep>,
    workflow_transitions: Vec<WorkflowTransition>,
    decisions: BTreeMap<String, bool>,
}

impl MultiWorkflowPath {
    fn from_path(path: &ExecutionPath) -> Self {
        let workflow = path.workflow().to_string();
        Self {
            path_id: path.path_id().to_string(),
            workflows: vec![workflow.clone()],
            steps: path
                .steps()
                .iter()
                .map(|step| MultiPathStep {
                    workflow: workflow.clone(),
                    step: step.clone(),
                })
                .collect(),
            workflow_transitions: Vec::new(),
            decisions: path.decisions().clone(),
        }
    }

    pub fn path_id(&self) -> &str {
        &self.path_id
    }

    /// Workflows visited, in order
    pub fn workflows(&self) -> &[String] {
        &self.workflows
    }

    pub fn steps(&self) -> &[MultiPathStep] {
        &self.steps
    }

    pub fn workflow_transitions(&self) -> &[WorkflowTransition] {
        &self.workflow_transitions
    }

    /// Branch outcomes; child decisions are keyed `<call_id>.<decision_id>`
    pub fn decisions(&self) -> &BTreeMap<String, bool> {
        &self.decisions
    }

    /// Splice a child path in after the current last step
    fn splice(&mut self, call_id: &str, child: &MultiWorkflowPath) {
        let parent = self.workflows[0].clone();
        let child_root = child.workflows[0].clone();
        let offset = self.steps.len();

        self.workflow_transitions.push(WorkflowTransition {
            step_index: offset,
            from_workflow: parent.clone(),
            to_workflow: child_root.clone(),
        });
        self.workflow_transitions
            .extend(child.workflow_transitions.iter().map(|t| WorkflowTransition {
                step_index: t.step_index + offset,
                ..t.clone()
            }));
        self.steps.extend(child.steps.iter().cloned());
        self.workflow_transitions.push(WorkflowTransition {
            step_index: self.steps.len(),
            from_workflow: child_root.clone(),
            to_workflow: parent,
        });

        self.workflows.extend(child.workflows.iter().cloned());
        self.decisions.extend(
            child
                .decisions
                .iter()
                .map(|(id, outcome)| (format!("{}.{}", call_id, id), *outcome)),
        );
        self.path_id = format!("{}|{}:{}", self.path_id, child_root, child.path_id);
    }
}

/// Turns a call graph into cross-workflow paths under a path ceiling
pub struct PathCombinator {
    generator: PathGenerator,
    max_paths: usize,
}

impl PathCombinator {
    pub fn new(generator: PathGenerator, max_paths: usize) -> Self {
        Self {
            generator,
            max_paths,
        }
    }

    /// Number of paths a mode would produce, without generating them
    pub fn count_paths(&self, graph: &WorkflowCallGraph, mode: ExpansionMode) -> Result<u128> {
        match mode {
            ExpansionMode::Reference | ExpansionMode::Subgraph => {
                self.generator.check_limits(&graph.root_workflow)?;
                Ok(graph.root_workflow.total_paths() as u128)
            }
            ExpansionMode::Inline => {
                let mut counts = Vec::new();
                self.inline_count(&graph.root_workflow, graph, &mut counts)
            }
        }
    }

    pub fn combine(
        &self,
        graph: &WorkflowCallGraph,
        mode: ExpansionMode,
    ) -> Result<Vec<MultiWorkflowPath>> {
        info!(
            "Combining paths for {} in {} mode",
            graph.root_workflow.name(),
            mode
        );
        match mode {
            ExpansionMode::Reference => self.reference(graph),
            ExpansionMode::Subgraph => {
                debug!("Subgraph mode shares reference paths");
                self.reference(graph)
            }
            ExpansionMode::Inline => self.inline(graph),
        }
    }

    fn reference(&self, graph: &WorkflowCallGraph) -> Result<Vec<MultiWorkflowPath>> {
        // Only the decision ceiling bounds the root's own paths here
        let paths = self.generator.generate_paths(&graph.root_workflow)?;
        Ok(paths.iter().map(MultiWorkflowPath::from_path).collect())
    }

    fn inline(&self, graph: &WorkflowCallGraph) -> Result<Vec<MultiWorkflowPath>> {
        let mut counts = Vec::new();
        let total = self.inline_count(&graph.root_workflow, graph, &mut counts)?;
        self.check_ceiling(total, counts)?;

        let mut memo = HashMap::new();
        let paths = self.inline_paths(&graph.root_workflow, graph, &mut memo)?;
        info!("Inline expansion produced {} paths", paths.len());
        Ok(paths)
    }

    /// Product of path counts along every followed call, recording each
    /// workflow's own count for error reporting
    fn inline_count(
        &self,
        workflow: &WorkflowMetadata,
        graph: &WorkflowCallGraph,
        counts: &mut Vec<String>,
    ) -> Result<u128> {
        self.generator.check_limits(workflow)?;
        let own = workflow.total_paths() as u128;
        let entry = describe(workflow, own);
        if !counts.contains(&entry) {
            counts.push(entry);
        }

        let mut total = own;
        for child in expanded_children(workflow, graph) {
            let child_total = self.inline_count(child, graph, counts)?;
            total = total.saturating_mul(child_total);
        }
        Ok(total)
    }

    fn inline_paths(
        &self,
        workflow: &WorkflowMetadata,
        graph: &WorkflowCallGraph,
        memo: &mut HashMap<String, Vec<MultiWorkflowPath>>,
    ) -> Result<Vec<MultiWorkflowPath>> {
        if let Some(paths) = memo.get(workflow.name()) {
            return Ok(paths.clone());
        }

        let mut combined = Vec::new();
        for own in self.generator.generate_paths(workflow)? {
            let mut partials = vec![MultiWorkflowPath {
                path_id: own.path_id().to_string(),
                workflows: vec![workflow.name().to_string()],
                steps: Vec::with_capacity(own.steps().len()),
                workflow_transitions: Vec::new(),
                decisions: own.decisions().clone(),
            }];

            for step in own.steps() {
                let tagged = MultiPathStep {
                    workflow: workflow.name().to_string(),
                    step: step.clone(),
                };
                for partial in &mut partials {
                    partial.steps.push(tagged.clone());
                }

                let PathStepKind::ChildWorkflow { workflow_name, call_id } = &step.kind else {
                    continue;
                };
                if !graph.has_relationship(workflow.name(), workflow_name) {
                    continue;
                }
                let Some(child) = graph.workflow(workflow_name) else {
                    continue;
                };

                let child_paths = self.inline_paths(child, graph, memo)?;
                let mut next = Vec::with_capacity(partials.len() * child_paths.len());
                for partial in &partials {
                    for child_path in &child_paths {
                        let mut spliced = partial.clone();
                        spliced.splice(call_id, child_path);
                        next.push(spliced);
                    }
                }
                partials = next;
            }

            combined.extend(partials);
        }

        memo.insert(workflow.name().to_string(), combined.clone());
        Ok(combined)
    }

    fn check_ceiling(&self, total: u128, workflows: Vec<String>) -> Result<()> {
        if total > self.max_paths as u128 {
            return Err(WorkflowGraphError::CrossWorkflowExplosion {
                total,
                limit: self.max_paths,
                workflows,
            });
        }
        Ok(())
    }
}

/// Child workflows whose calls the resolver followed, in step order
fn expanded_children<'a>(
    workflow: &'a WorkflowMetadata,
    graph: &'a WorkflowCallGraph,
) -> impl Iterator<Item = &'a WorkflowMetadata> + 'a {
    workflow.steps().iter().filter_map(move |step| match &step.kind {
        StepKind::ChildWorkflow(call)
            if graph.has_relationship(workflow.name(), &call.workflow_name) =>
        {
            graph.workflow(&call.workflow_name)
        }
        _ => None,
    })
}

fn describe(workflow: &WorkflowMetadata, paths: u128) -> String {
    format!("{} ({} paths)", workflow.name(), paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::call_graph::WorkflowRelationship;
    use crate::core::metadata::StepFact;
    use pretty_assertions::assert_eq;

    fn decisions(prefix: &str, k: usize, first_line: usize) -> Vec<StepFact> {
        (0..k)
            .map(|i| StepFact::decision(format!("{}{}", prefix, i), first_line + i, vec![], vec![]))
            .collect()
    }

    fn graph(root: WorkflowMetadata, children: Vec<WorkflowMetadata>) -> WorkflowCallGraph {
        let mut relationships = Vec::new();
        let mut calls = Vec::new();
        let mut map = BTreeMap::new();
        for workflow in std::iter::once(&root).chain(children.iter()) {
            for call in workflow.child_calls() {
                relationships.push(WorkflowRelationship {
                    parent: workflow.name().to_string(),
                    child: call.workflow_name.clone(),
                });
                calls.push(call.clone());
            }
        }
        for child in children {
            map.insert(child.name().to_string(), child);
        }
        WorkflowCallGraph::new(root, map, relationships, calls)
    }

    /// Root: 2 decisions, then a call to Child; Child: 1 decision
    fn root_and_child() -> WorkflowCallGraph {
        let mut root_steps = vec![StepFact::activity("start", 1)];
        root_steps.extend(decisions("Root", 2, 2));
        root_steps.push(StepFact::child_workflow("Root", "Child", 5));
        root_steps.push(StepFact::activity("finish", 6));
        let root = WorkflowMetadata::new("Root", "root.py", root_steps);

        let mut child_steps = vec![StepFact::activity("child_work", 1)];
        child_steps.extend(decisions("Child", 1, 2));
        let child = WorkflowMetadata::new("Child", "child.py", child_steps);

        graph(root, vec![child])
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("inline".parse::<ExpansionMode>().unwrap(), ExpansionMode::Inline);
        assert_eq!("Subgraph".parse::<ExpansionMode>().unwrap(), ExpansionMode::Subgraph);
        assert_eq!(ExpansionMode::default().to_string(), "reference");

        let err = "flatten".parse::<ExpansionMode>().unwrap_err();
        assert!(matches!(err, WorkflowGraphError::Config(_)));
    }

    #[test]
    fn test_reference_mode_keeps_child_opaque() {
        let combinator = PathCombinator::new(PathGenerator::default(), 1024);
        let paths = combinator
            .combine(&root_and_child(), ExpansionMode::Reference)
            .unwrap();

        assert_eq!(paths.len(), 4);
        for path in &paths {
            assert_eq!(path.workflows(), ["Root".to_string()]);
            assert!(path.workflow_transitions().is_empty());
            assert!(path.steps().iter().all(|s| s.workflow == "Root"));
        }
    }

    #[test]
    fn test_subgraph_matches_reference() {
        let combinator = PathCombinator::new(PathGenerator::default(), 1024);
        let graph = root_and_child();
        assert_eq!(
            combinator.combine(&graph, ExpansionMode::Subgraph).unwrap(),
            combinator.combine(&graph, ExpansionMode::Reference).unwrap()
        );
    }

    #[test]
    fn test_path_ceiling_does_not_limit_reference_or_subgraph() {
        let combinator = PathCombinator::new(PathGenerator::default(), 1);
        let graph = root_and_child();

        assert_eq!(combinator.combine(&graph, ExpansionMode::Reference).unwrap().len(), 4);
        assert_eq!(combinator.combine(&graph, ExpansionMode::Subgraph).unwrap().len(), 4);
        assert!(matches!(
            combinator.combine(&graph, ExpansionMode::Inline),
            Err(WorkflowGraphError::CrossWorkflowExplosion { .. })
        ));
    }

    #[test]
    fn test_inline_multiplies_paths_and_marks_transitions() {
        let combinator = PathCombinator::new(PathGenerator::default(), 1024);
        let graph = root_and_child();
        assert_eq!(combinator.count_paths(&graph, ExpansionMode::Inline).unwrap(), 8);

        let paths = combinator.combine(&graph, ExpansionMode::Inline).unwrap();
        assert_eq!(paths.len(), 8);

        for path in &paths {
            assert_eq!(path.workflow_transitions().len(), 2);
            assert_eq!(path.workflows(), ["Root".to_string(), "Child".to_string()]);
        }

        let first = &paths[0];
        let names: Vec<(&str, &str)> = first
            .steps()
            .iter()
            .map(|s| (s.workflow.as_str(), s.step.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Root", "start"),
                ("Root", "Root0"),
                ("Root", "Root1"),
                ("Root", "Child"),
                ("Child", "child_work"),
                ("Child", "Child0"),
                ("Root", "finish"),
            ]
        );
        assert_eq!(
            first.workflow_transitions(),
            [
                WorkflowTransition {
                    step_index: 4,
                    from_workflow: "Root".to_string(),
                    to_workflow: "Child".to_string(),
                },
                WorkflowTransition {
                    step_index: 6,
                    from_workflow: "Child".to_string(),
                    to_workflow: "Root".to_string(),
                },
            ]
        );
        assert_eq!(first.path_id(), "path_00|Child:path_0");
        assert_eq!(
            first.decisions().get("child_child_5.d_child0_2"),
            Some(&false)
        );
        assert_eq!(first.decisions().len(), 3);
    }

    #[test]
    fn test_inline_ids_are_unique() {
        let combinator = PathCombinator::new(PathGenerator::default(), 1024);
        let paths = combinator
            .combine(&root_and_child(), ExpansionMode::Inline)
            .unwrap();
        let ids: std::collections::HashSet<&str> = paths.iter().map(|p| p.path_id()).collect();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn test_inline_recurses_through_grandchildren() {
        let root = WorkflowMetadata::new(
            "Root",
            "root.py",
            vec![
                StepFact::decision("R", 1, vec![], vec![]),
                StepFact::child_workflow("Root", "Child", 2),
            ],
        );
        let child = WorkflowMetadata::new(
            "Child",
            "child.py",
            vec![
                StepFact::decision("C", 1, vec![], vec![]),
                StepFact::child_workflow("Child", "Grandchild", 2),
            ],
        );
        let grandchild = WorkflowMetadata::new(
            "Grandchild",
            "grandchild.py",
            vec![StepFact::decision("G", 1, vec![], vec![])],
        );

        let paths = PathCombinator::new(PathGenerator::default(), 1024)
            .combine(&graph(root, vec![child, grandchild]), ExpansionMode::Inline)
            .unwrap();

        assert_eq!(paths.len(), 8);
        assert_eq!(paths[0].workflow_transitions().len(), 4);
        assert_eq!(
            paths[0].workflows(),
            ["Root".to_string(), "Child".to_string(), "Grandchild".to_string()]
        );
        assert!(paths[0]
            .decisions()
            .contains_key("child_child_2.child_grandchild_2.d_g_1"));
    }

    #[test]
    fn test_unfollowed_call_stays_opaque() {
        let root = WorkflowMetadata::new(
            "Root",
            "root.py",
            vec![
                StepFact::decision("R", 1, vec![], vec![]),
                StepFact::child_workflow("Root", "Child", 2),
            ],
        );
        // Depth-limited graph: the call was never followed
        let graph = WorkflowCallGraph::new(root, BTreeMap::new(), Vec::new(), Vec::new());

        let paths = PathCombinator::new(PathGenerator::default(), 1024)
            .combine(&graph, ExpansionMode::Inline)
            .unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].workflow_transitions().is_empty());
    }

    #[test]
    fn test_inline_ceiling_reports_exact_total() {
        let mut root_steps = decisions("Root", 5, 1);
        root_steps.push(StepFact::child_workflow("Root", "Child", 10));
        let root = WorkflowMetadata::new("Root", "root.py", root_steps);
        let child = WorkflowMetadata::new("Child", "child.py", decisions("Child", 5, 1));

        let err = PathCombinator::new(PathGenerator::default(), 1023)
            .combine(&graph(root, vec![child]), ExpansionMode::Inline)
            .unwrap_err();

        match &err {
            WorkflowGraphError::CrossWorkflowExplosion {
                total,
                limit,
                workflows,
            } => {
                assert_eq!(*total, 1024);
                assert_eq!(*limit, 1023);
                assert_eq!(workflows, &["Root (32 paths)", "Child (32 paths)"]);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(err.to_string().contains("1024"));
    }
}
