// src/core/mod.rs
mod engine;
mod expansion;
mod metadata;
mod parser;
mod path_generator;
mod report;

// Cross-file graph resolution
mod call_graph;
mod signal_graph;

// Language-specific front-ends
mod languages;

#[cfg(test)]
mod test_support;

pub use metadata::{
    BranchPoint, ChildWorkflowCall, ExternalSignal, SignalHandler, StepFact, StepKind,
    TargetPattern, WorkflowMetadata,
};
pub use parser::{ParsedWorkflowFile, WorkflowParser};
pub use path_generator::{ExecutionPath, PathGenerator, PathStep, PathStepKind};
pub use expansion::{
    ExpansionMode, MultiPathStep, MultiWorkflowPath, PathCombinator, WorkflowTransition,
};
pub use languages::{ExtractedFile, PythonWorkflowExtractor, WorkflowExtractor};
pub use report::{
    AnalysisSummary, CallGraphReport, ExpansionReport, PathReport, SignalGraphReport,
};

pub use call_graph::{CallGraphResolver, WorkflowCallGraph, WorkflowRelationship};
pub use signal_graph::{
    IndexedHandler, PeerSignalGraph, SignalConnection, SignalGraphResolver, SignalHandlerIndex,
};

// Export the main engine
pub use engine::{Engine, CONFIG_FILE_NAME};
