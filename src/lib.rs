//! Static analysis of durable workflow definitions.
//!
//! Enumerates every execution path of a workflow, resolves the graph of child
//! workflow calls and peer signals across files, and combines path sets across
//! workflow boundaries.

pub mod config;
pub mod core;
pub mod error;

pub use crate::config::Config;
pub use crate::core::Engine;
pub use crate::error::{Result, WorkflowGraphError};
