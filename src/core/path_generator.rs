// src/core/path_generator.rs
//! Enumerates every execution path of a single workflow.
//!
//! Bit ordering: with `n` branch points sorted by step order, point `j` is bit
//! `n - 1 - j` of a counter running from `0` to `2^n - 1`. The first branch
//! point therefore changes slowest and every position yields `false` before
//! `true`. A path id is `path_` followed by the bits in point order, or
//! `path_0` when the workflow has no branch points.

use std::collections::{BTreeMap, HashSet};
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, WorkflowGraphError};
use super::metadata::{BranchPoint, StepFact, StepKind, WorkflowMetadata};

/// Hard cap keeping the path counter inside a `u64`
const MAX_SUPPORTED_POINTS: usize = 63;

/// A step as it appears on a generated path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathStep {
    /// Index into the workflow's step list
    pub step_index: usize,
    pub name: String,
    pub line: usize,
    #[serde(flatten)]
    pub kind: PathStepKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PathStepKind {
    Activity,
    Decision { id: String, outcome: bool, label: String },
    Signal { id: String, outcome: bool, label: String },
    ChildWorkflow { workflow_name: String, call_id: String },
    ExternalSignal { signal_name: String, node_id: String },
}

/// One outcome combination through a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPath {
    path_id: String,
    workflow: String,
    steps: Vec<PathStep>,
    decisions: BTreeMap<String, bool>,
}

impl ExecutionPath {
    pub fn path_id(&self) -> &str {
        &self.path_id
    }

    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Branch point id to the outcome taken on this path
    pub fn decisions(&self) -> &BTreeMap<String, bool> {
        &self.decisions
    }
}

/// Generates the 2^n execution paths of a workflow
#[derive(Debug, Clone)]
pub struct PathGenerator {
    max_decision_points: usize,
}

impl PathGenerator {
    pub fn new(max_decision_points: usize) -> Self {
        Self { max_decision_points }
    }

    pub fn max_decision_points(&self) -> usize {
        self.max_decision_points
    }

    /// Fail if the workflow has more branch points than allowed
    pub fn check_limits(&self, metadata: &WorkflowMetadata) -> Result<()> {
        let n = metadata.branch_point_count();
        if n > self.max_decision_points || n > MAX_SUPPORTED_POINTS {
            return Err(WorkflowGraphError::PathExplosion {
                workflow: metadata.name().to_string(),
                decision_count: n,
                path_count: 1u128.checked_shl(n as u32).unwrap_or(u128::MAX),
                limit: self.max_decision_points.min(MAX_SUPPORTED_POINTS),
            });
        }
        Ok(())
    }

    /// Generate every execution path of the workflow
    pub fn generate_paths(&self, metadata: &WorkflowMetadata) -> Result<Vec<ExecutionPath>> {
        self.check_limits(metadata)?;

        let points: Vec<(usize, &BranchPoint)> = metadata
            .branch_points()
            .map(|(index, _, point)| (index, point))
            .collect();
        let n = points.len();
        let total: u64 = 1 << n;

        debug!(
            "Generating {} paths for {} ({} branch points)",
            total,
            metadata.name(),
            n
        );

        let mut paths = Vec::with_capacity(total as usize);
        for counter in 0..total {
            let outcomes: Vec<bool> = (0..n).map(|j| (counter >> (n - 1 - j)) & 1 == 1).collect();
            paths.push(self.build_path(metadata, &points, &outcomes));
        }

        Ok(paths)
    }

    fn build_path(
        &self,
        metadata: &WorkflowMetadata,
        points: &[(usize, &BranchPoint)],
        outcomes: &[bool],
    ) -> ExecutionPath {
        let mut excluded = HashSet::new();
        let mut outcome_by_step = BTreeMap::new();
        let mut decisions = BTreeMap::new();

        for ((step_index, point), &outcome) in points.iter().zip(outcomes) {
            excluded.extend(point.branch(!outcome).iter().copied());
            outcome_by_step.insert(*step_index, outcome);
            decisions.insert(point.id.clone(), outcome);
        }

        let steps = metadata
            .steps()
            .iter()
            .enumerate()
            .filter(|(i, step)| step.is_branch_insensitive() || !excluded.contains(i))
            .map(|(i, step)| path_step(i, step, outcome_by_step.get(&i).copied()))
            .collect();

        ExecutionPath {
            path_id: path_id(outcomes),
            workflow: metadata.name().to_string(),
            steps,
            decisions,
        }
    }
}

impl Default for PathGenerator {
    fn default() -> Self {
        Self::new(10)
    }
}

fn path_id(outcomes: &[bool]) -> String {
    if outcomes.is_empty() {
        return "path_0".to_string();
    }
    let bits: String = outcomes.iter().map(|&o| if o { '1' } else { '0' }).collect();
    format!("path_{}", bits)
}

fn path_step(step_index: usize, step: &StepFact, outcome: Option<bool>) -> PathStep {
    let outcome = outcome.unwrap_or(false);
    let kind = match &step.kind {
        StepKind::Activity => PathStepKind::Activity,
        StepKind::Decision(point) => PathStepKind::Decision {
            id: point.id.clone(),
            outcome,
            label: point.label(outcome).to_string(),
        },
        StepKind::Signal(point) => PathStepKind::Signal {
            id: point.id.clone(),
            outcome,
            label: point.label(outcome).to_string(),
        },
        StepKind::ChildWorkflow(call) => PathStepKind::ChildWorkflow {
            workflow_name: call.workflow_name.clone(),
            call_id: call.call_id.clone(),
        },
        StepKind::ExternalSignal(signal) => PathStepKind::ExternalSignal {
            signal_name: signal.signal_name.clone(),
            node_id: signal.node_id.clone(),
        },
    };

    PathStep {
        step_index,
        name: step.name.clone(),
        line: step.line,
        kind,
    }
}
