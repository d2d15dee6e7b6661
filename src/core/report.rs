// src/core/report.rs
//! Serializable results handed to renderers, each with a count-only summary.

use serde::Serialize;

use super::call_graph::WorkflowCallGraph;
use super::expansion::{ExpansionMode, MultiWorkflowPath};
use super::metadata::WorkflowMetadata;
use super::path_generator::ExecutionPath;
use super::signal_graph::PeerSignalGraph;

/// Counts a renderer can print without walking the full structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisSummary {
    pub total_paths: u64,
    pub total_workflows: usize,
}

/// Execution paths of a single workflow
#[derive(Debug, Clone, Serialize)]
pub struct PathReport {
    pub workflow: WorkflowMetadata,
    pub paths: Vec<ExecutionPath>,
    pub summary: AnalysisSummary,
}

impl PathReport {
    pub fn new(workflow: WorkflowMetadata, paths: Vec<ExecutionPath>) -> Self {
        let summary = AnalysisSummary {
            total_paths: paths.len() as u64,
            total_workflows: 1,
        };
        Self {
            workflow,
            paths,
            summary,
        }
    }
}

/// A resolved call graph; `total_paths` is the root's own path count
#[derive(Debug, Clone, Serialize)]
pub struct CallGraphReport {
    pub graph: WorkflowCallGraph,
    pub summary: AnalysisSummary,
}

impl CallGraphReport {
    pub fn new(graph: WorkflowCallGraph) -> Self {
        let summary = AnalysisSummary {
            total_paths: graph.root_workflow.total_paths(),
            total_workflows: graph.total_workflows,
        };
        Self { graph, summary }
    }
}

/// A resolved peer signal graph; `total_paths` is the root's own path count
#[derive(Debug, Clone, Serialize)]
pub struct SignalGraphReport {
    pub graph: PeerSignalGraph,
    pub summary: AnalysisSummary,
}

impl SignalGraphReport {
    pub fn new(graph: PeerSignalGraph) -> Self {
        let summary = AnalysisSummary {
            total_paths: graph.root_workflow.total_paths(),
            total_workflows: graph.total_workflows(),
        };
        Self { graph, summary }
    }
}

/// Cross-workflow paths under one expansion mode
#[derive(Debug, Clone, Serialize)]
pub struct ExpansionReport {
    pub root_workflow: String,
    pub mode: ExpansionMode,
    pub paths: Vec<MultiWorkflowPath>,
    pub summary: AnalysisSummary,
}

impl ExpansionReport {
    pub fn new(graph: &WorkflowCallGraph, mode: ExpansionMode, paths: Vec<MultiWorkflowPath>) -> Self {
        let summary = AnalysisSummary {
            total_paths: paths.len() as u64,
            total_workflows: graph.total_workflows,
        };
        Self {
            root_workflow: graph.root_workflow.name().to_string(),
            mode,
            paths,
            summary,
        }
    }
}
