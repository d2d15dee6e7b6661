// src/core/call_graph/mod.rs
//! Parent/child workflow call graph
//!
//! Follows child workflow calls from an entry workflow, locating each child's
//! source file and rejecting cyclic call chains.

mod call_graph;
mod resolver;

pub use call_graph::{WorkflowCallGraph, WorkflowRelationship};
pub use resolver::CallGraphResolver;
