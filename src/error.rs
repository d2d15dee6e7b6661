use std::path::PathBuf;
use thiserror::Error;

/// Main error type for workflow graph analysis
#[derive(Error, Debug)]
pub enum WorkflowGraphError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parser error: {0}")]
    Parser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No @workflow.defn class found in {}", .path.display())]
    NoWorkflowDefinition { path: PathBuf },

    #[error(
        "Could not resolve child workflow '{workflow}' referenced by '{referenced_by}'; searched: {}",
        format_searched(.searched)
    )]
    UnresolvedWorkflow {
        workflow: String,
        referenced_by: String,
        searched: Vec<PathBuf>,
    },

    #[error("Circular workflow call detected: {}", .chain.join(" -> "))]
    CycleDetected { chain: Vec<String> },

    #[error(
        "Workflow '{workflow}' has {decision_count} decision/signal points, \
         producing {path_count} paths (limit: {limit} points)"
    )]
    PathExplosion {
        workflow: String,
        decision_count: usize,
        path_count: u128,
        limit: usize,
    },

    #[error(
        "Cross-workflow expansion would produce {total} paths (limit: {limit}) across workflows: {}",
        .workflows.join(", ")
    )]
    CrossWorkflowExplosion {
        total: u128,
        limit: usize,
        workflows: Vec<String>,
    },
}

fn format_searched(searched: &[PathBuf]) -> String {
    if searched.is_empty() {
        return "<nothing>".to_string();
    }
    searched
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, WorkflowGraphError>;
