// src/core/signal_graph/peer_signal_graph.rs
use std::collections::BTreeMap;
use serde::Serialize;

use crate::core::metadata::{ExternalSignal, SignalHandler, WorkflowMetadata};

/// A resolved sender -> receiver signal edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalConnection {
    pub sender_workflow: String,
    pub receiver_workflow: String,
    pub signal_name: String,
    pub sender_line: usize,
    pub receiver_line: usize,
    /// Node id of the outbound signal step
    pub sender_node_id: String,
    /// Node id of the receiving handler
    pub receiver_node_id: String,
}

/// Workflows linked to an entry workflow through peer signals
#[derive(Debug, Clone, Serialize)]
pub struct PeerSignalGraph {
    pub root_workflow: WorkflowMetadata,
    /// Every discovered workflow by name, root included
    pub workflows: BTreeMap<String, WorkflowMetadata>,
    /// Handlers of all discovered workflows grouped by signal name
    pub signal_handlers: BTreeMap<String, Vec<SignalHandler>>,
    pub connections: Vec<SignalConnection>,
    /// Outbound signals nobody handles
    pub unresolved_signals: Vec<ExternalSignal>,
}

impl PeerSignalGraph {
    pub fn new(
        root_workflow: WorkflowMetadata,
        workflows: BTreeMap<String, WorkflowMetadata>,
        connections: Vec<SignalConnection>,
        unresolved_signals: Vec<ExternalSignal>,
    ) -> Self {
        let mut signal_handlers: BTreeMap<String, Vec<SignalHandler>> = BTreeMap::new();
        for workflow in workflows.values() {
            for handler in workflow.signal_handlers() {
                signal_handlers
                    .entry(handler.signal_name.clone())
                    .or_default()
                    .push(handler.clone());
            }
        }

        Self {
            root_workflow,
            workflows,
            signal_handlers,
            connections,
            unresolved_signals,
        }
    }

    pub fn total_workflows(&self) -> usize {
        self.workflows.len()
    }

    /// Connections leaving the given workflow
    pub fn outgoing(&self, sender: &str) -> impl Iterator<Item = &SignalConnection> {
        let sender = sender.to_string();
        self.connections
            .iter()
            .filter(move |c| c.sender_workflow == sender)
    }
}
