// src/core/metadata.rs
//! Immutable facts about a single workflow definition.
//!
//! A [`WorkflowMetadata`] is produced once by a front-end extractor and then
//! only read by the path generator, the call graph resolver and the signal
//! graph resolver. Branch membership is expressed with indices into the
//! workflow's own step list so that metadata never holds references to other
//! metadata.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

/// Labels used for decision point outcomes
pub const DECISION_TRUE_LABEL: &str = "yes";
pub const DECISION_FALSE_LABEL: &str = "no";

/// Labels used for signal wait outcomes
pub const SIGNAL_TRUE_LABEL: &str = "Signaled";
pub const SIGNAL_FALSE_LABEL: &str = "Timeout";

/// A two-outcome branch point (decision or signal wait)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchPoint {
    /// Stable identifier, used as the key in a path's decision map
    pub id: String,
    pub true_label: String,
    pub false_label: String,
    /// Indices of steps that only run when the outcome is `true`
    pub true_branch: Vec<usize>,
    /// Indices of steps that only run when the outcome is `false`
    pub false_branch: Vec<usize>,
}

impl BranchPoint {
    /// Steps belonging to the given outcome
    pub fn branch(&self, outcome: bool) -> &[usize] {
        if outcome {
            &self.true_branch
        } else {
            &self.false_branch
        }
    }

    /// Label describing the given outcome
    pub fn label(&self, outcome: bool) -> &str {
        if outcome {
            &self.true_label
        } else {
            &self.false_label
        }
    }

    pub(crate) fn record(&mut self, outcome: bool, step_index: usize) {
        let branch = if outcome {
            &mut self.true_branch
        } else {
            &mut self.false_branch
        };
        if !branch.contains(&step_index) {
            branch.push(step_index);
        }
    }
}

/// A call to another workflow definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildWorkflowCall {
    /// Name of the called workflow class
    pub workflow_name: String,
    /// Deterministic identifier derived from name and line
    pub call_id: String,
    pub line: usize,
    /// Workflow containing the call
    pub parent_workflow: String,
}

/// Identity of the workflow an outbound signal is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TargetPattern {
    /// A plain string literal workflow id
    Literal(String),
    /// An interpolated id with each interpolation replaced by `*`
    Wildcard(String),
    /// The target cannot be determined statically
    Dynamic,
}

/// A peer-to-peer signal sent to another running workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSignal {
    pub signal_name: String,
    pub target: TargetPattern,
    pub node_id: String,
    pub line: usize,
    /// Workflow sending the signal
    pub source_workflow: String,
}

/// A method that receives a named signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalHandler {
    pub signal_name: String,
    pub method_name: String,
    pub node_id: String,
    pub line: usize,
    /// Workflow owning the handler
    pub workflow_name: String,
}

impl SignalHandler {
    pub fn new(
        workflow_name: impl Into<String>,
        signal_name: impl Into<String>,
        method_name: impl Into<String>,
        line: usize,
    ) -> Self {
        let signal_name = signal_name.into();
        Self {
            node_id: format!("sig_handler_{}_{}", slug(&signal_name), line),
            signal_name,
            method_name: method_name.into(),
            line,
            workflow_name: workflow_name.into(),
        }
    }
}

/// Type-specific payload of a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    Activity,
    Decision(BranchPoint),
    Signal(BranchPoint),
    ChildWorkflow(ChildWorkflowCall),
    ExternalSignal(ExternalSignal),
}

/// One fact extracted from a workflow's run method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFact {
    pub name: String,
    /// Source line, only used for ordering
    pub line: usize,
    pub kind: StepKind,
}

impl StepFact {
    pub fn activity(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            line,
            kind: StepKind::Activity,
        }
    }

    pub fn decision(
        name: impl Into<String>,
        line: usize,
        true_branch: Vec<usize>,
        false_branch: Vec<usize>,
    ) -> Self {
        let name = name.into();
        Self {
            kind: StepKind::Decision(BranchPoint {
                id: format!("d_{}_{}", slug(&name), line),
                true_label: DECISION_TRUE_LABEL.to_string(),
                false_label: DECISION_FALSE_LABEL.to_string(),
                true_branch,
                false_branch,
            }),
            name,
            line,
        }
    }

    pub fn signal(
        name: impl Into<String>,
        line: usize,
        signaled_branch: Vec<usize>,
        timeout_branch: Vec<usize>,
    ) -> Self {
        let name = name.into();
        Self {
            kind: StepKind::Signal(BranchPoint {
                id: format!("s_{}_{}", slug(&name), line),
                true_label: SIGNAL_TRUE_LABEL.to_string(),
                false_label: SIGNAL_FALSE_LABEL.to_string(),
                true_branch: signaled_branch,
                false_branch: timeout_branch,
            }),
            name,
            line,
        }
    }

    pub fn child_workflow(
        parent_workflow: impl Into<String>,
        workflow_name: impl Into<String>,
        line: usize,
    ) -> Self {
        let workflow_name = workflow_name.into();
        Self {
            name: workflow_name.clone(),
            line,
            kind: StepKind::ChildWorkflow(ChildWorkflowCall {
                call_id: format!("child_{}_{}", slug(&workflow_name), line),
                workflow_name,
                line,
                parent_workflow: parent_workflow.into(),
            }),
        }
    }

    pub fn external_signal(
        source_workflow: impl Into<String>,
        signal_name: impl Into<String>,
        target: TargetPattern,
        line: usize,
    ) -> Self {
        let signal_name = signal_name.into();
        Self {
            name: signal_name.clone(),
            line,
            kind: StepKind::ExternalSignal(ExternalSignal {
                node_id: format!("ext_sig_{}_{}", slug(&signal_name), line),
                signal_name,
                target,
                line,
                source_workflow: source_workflow.into(),
            }),
        }
    }

    /// The branch point carried by decision and signal steps
    pub fn branch_point(&self) -> Option<&BranchPoint> {
        match &self.kind {
            StepKind::Decision(point) | StepKind::Signal(point) => Some(point),
            _ => None,
        }
    }

    pub(crate) fn branch_point_mut(&mut self) -> Option<&mut BranchPoint> {
        match &mut self.kind {
            StepKind::Decision(point) | StepKind::Signal(point) => Some(point),
            _ => None,
        }
    }

    /// Steps that stay in every path regardless of enclosing branches.
    ///
    /// Child calls and outbound signals nested inside a branch are still
    /// reported on every path.
    pub fn is_branch_insensitive(&self) -> bool {
        matches!(
            self.kind,
            StepKind::ChildWorkflow(_) | StepKind::ExternalSignal(_)
        )
    }
}

/// Everything known about one workflow definition.
///
/// Constructed once and never mutated afterwards; `total_paths` is derived
/// from the step list at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowMetadata {
    workflow_class: String,
    run_method: String,
    source_file: PathBuf,
    source_hash: Option<String>,
    steps: Vec<StepFact>,
    signal_handlers: Vec<SignalHandler>,
    total_paths: u64,
}

impl WorkflowMetadata {
    pub fn new(
        workflow_class: impl Into<String>,
        source_file: impl Into<PathBuf>,
        steps: Vec<StepFact>,
    ) -> Self {
        let branch_points = steps.iter().filter(|s| s.branch_point().is_some()).count();
        Self {
            workflow_class: workflow_class.into(),
            run_method: "run".to_string(),
            source_file: source_file.into(),
            source_hash: None,
            steps,
            signal_handlers: Vec::new(),
            total_paths: 1u64.checked_shl(branch_points as u32).unwrap_or(u64::MAX),
        }
    }

    pub fn with_run_method(mut self, run_method: impl Into<String>) -> Self {
        self.run_method = run_method.into();
        self
    }

    pub fn with_signal_handlers(mut self, signal_handlers: Vec<SignalHandler>) -> Self {
        self.signal_handlers = signal_handlers;
        self
    }

    pub fn with_source_hash(mut self, source_hash: impl Into<String>) -> Self {
        self.source_hash = Some(source_hash.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.workflow_class
    }

    pub fn run_method(&self) -> &str {
        &self.run_method
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    pub fn source_hash(&self) -> Option<&str> {
        self.source_hash.as_deref()
    }

    pub fn steps(&self) -> &[StepFact] {
        &self.steps
    }

    pub fn signal_handlers(&self) -> &[SignalHandler] {
        &self.signal_handlers
    }

    /// 2^(decision_count + signal_count), saturating at `u64::MAX`
    pub fn total_paths(&self) -> u64 {
        self.total_paths
    }

    pub fn decision_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.kind, StepKind::Decision(_)))
            .count()
    }

    pub fn signal_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.kind, StepKind::Signal(_)))
            .count()
    }

    pub fn branch_point_count(&self) -> usize {
        self.decision_count() + self.signal_count()
    }

    /// Decision and signal points in step order, with their step index
    pub fn branch_points(&self) -> impl Iterator<Item = (usize, &StepFact, &BranchPoint)> {
        self.steps
            .iter()
            .enumerate()
            .filter_map(|(i, step)| step.branch_point().map(|point| (i, step, point)))
    }

    pub fn child_calls(&self) -> impl Iterator<Item = &ChildWorkflowCall> {
        self.steps.iter().filter_map(|step| match &step.kind {
            StepKind::ChildWorkflow(call) => Some(call),
            _ => None,
        })
    }

    pub fn external_signals(&self) -> impl Iterator<Item = &ExternalSignal> {
        self.steps.iter().filter_map(|step| match &step.kind {
            StepKind::ExternalSignal(signal) => Some(signal),
            _ => None,
        })
    }
}

/// Lowercase identifier fragment used in node ids
pub(crate) fn slug(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
