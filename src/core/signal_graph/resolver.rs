// src/core/signal_graph/resolver.rs
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

use super::handler_index::SignalHandlerIndex;
use super::peer_signal_graph::{PeerSignalGraph, SignalConnection};
use crate::core::metadata::{ExternalSignal, WorkflowMetadata};
use crate::core::parser::WorkflowParser;
use crate::error::{Result, WorkflowGraphError};

/// Builds a [`PeerSignalGraph`] by following outbound signals to the
/// workflows that handle them.
///
/// Revisiting a receiver is not an error: the edge is recorded and the
/// receiver is simply not expanded again.
pub struct SignalGraphResolver {
    max_depth: usize,
}

#[derive(Default)]
struct WalkState {
    visited: HashSet<String>,
    workflows: BTreeMap<String, WorkflowMetadata>,
    connections: Vec<SignalConnection>,
    unresolved: Vec<ExternalSignal>,
}

impl SignalGraphResolver {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn resolve<P: AsRef<Path>>(
        &self,
        entry_file: P,
        parser: &mut WorkflowParser,
        index: &SignalHandlerIndex,
    ) -> Result<PeerSignalGraph> {
        if !index.is_built() {
            return Err(WorkflowGraphError::Config(
                "Signal handler index must be built before resolving a signal graph".to_string(),
            ));
        }

        let root = parser.analyze(entry_file.as_ref())?;
        info!(
            "Resolving signal graph for {} (max depth {})",
            root.name(),
            self.max_depth
        );

        let mut state = WalkState::default();
        state.visited.insert(root.name().to_string());
        state
            .workflows
            .insert(root.name().to_string(), root.clone());
        self.walk(&root, 0, parser, index, &mut state);

        let graph = PeerSignalGraph::new(
            root,
            state.workflows,
            state.connections,
            state.unresolved,
        );
        info!(
            "Signal graph resolved: {} workflows, {} connections, {} unresolved signals",
            graph.total_workflows(),
            graph.connections.len(),
            graph.unresolved_signals.len()
        );
        Ok(graph)
    }

    fn walk(
        &self,
        current: &WorkflowMetadata,
        depth: usize,
        parser: &mut WorkflowParser,
        index: &SignalHandlerIndex,
        state: &mut WalkState,
    ) {
        let signals: Vec<ExternalSignal> = current.external_signals().cloned().collect();
        if signals.is_empty() {
            return;
        }

        if depth >= self.max_depth {
            info!(
                "Max signal depth {} reached at {}; not following {} signals",
                self.max_depth,
                current.name(),
                signals.len()
            );
            return;
        }

        for signal in signals {
            let handlers = index.find_handlers(&signal.signal_name);
            if handlers.is_empty() {
                debug!(
                    "No handler for signal '{}' sent by {}",
                    signal.signal_name,
                    current.name()
                );
                state.unresolved.push(signal);
                continue;
            }

            for indexed in handlers {
                let receiver_name = indexed.handler.workflow_name.as_str();
                state.connections.push(SignalConnection {
                    sender_workflow: current.name().to_string(),
                    receiver_workflow: receiver_name.to_string(),
                    signal_name: signal.signal_name.clone(),
                    sender_line: signal.line,
                    receiver_line: indexed.handler.line,
                    sender_node_id: signal.node_id.clone(),
                    receiver_node_id: indexed.handler.node_id.clone(),
                });

                if state.visited.contains(receiver_name) {
                    continue;
                }

                let receiver = match parser.workflow_in(&indexed.file, receiver_name) {
                    Ok(receiver) => receiver,
                    Err(e) => {
                        warn!(
                            "Skipping signal receiver {} in {}: {}",
                            receiver_name,
                            indexed.file.display(),
                            e
                        );
                        continue;
                    }
                };

                state.visited.insert(receiver_name.to_string());
                state
                    .workflows
                    .insert(receiver_name.to_string(), receiver.clone());
                self.walk(&receiver, depth + 1, parser, index, state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{SignalHandler, StepFact, TargetPattern};
    use crate::core::test_support::Fixture;

    fn send(source: &str, signal: &str, line: usize) -> StepFact {
        StepFact::external_signal(
            source,
            signal,
            TargetPattern::Literal("peer-1".to_string()),
            line,
        )
    }

    fn resolve(fixture: Fixture, entry: &str, max_depth: usize) -> PeerSignalGraph {
        let (dir, mut parser) = fixture.build();
        let mut index = SignalHandlerIndex::new(vec![dir.path().to_path_buf()]);
        index.build(&mut parser);
        SignalGraphResolver::new(max_depth)
            .resolve(dir.path().join(entry), &mut parser, &index)
            .unwrap()
    }

    #[test]
    fn test_unmatched_signal_is_recorded_not_raised() {
        let graph = resolve(
            Fixture::new().workflow("sender.wf", "Sender", vec![send("Sender", "nobody", 5)]),
            "sender.wf",
            10,
        );

        assert_eq!(graph.unresolved_signals.len(), 1);
        assert_eq!(graph.unresolved_signals[0].signal_name, "nobody");
        assert!(graph.connections.is_empty());
        assert_eq!(graph.total_workflows(), 1);
    }

    #[test]
    fn test_connection_carries_both_ends() {
        let graph = resolve(
            Fixture::new()
                .workflow("sender.wf", "Sender", vec![send("Sender", "ready", 5)])
                .workflow_with_handlers(
                    "receiver.wf",
                    "Receiver",
                    vec![],
                    vec![SignalHandler::new("Receiver", "ready", "on_ready", 12)],
                ),
            "sender.wf",
            10,
        );

        assert_eq!(
            graph.connections,
            vec![SignalConnection {
                sender_workflow: "Sender".to_string(),
                receiver_workflow: "Receiver".to_string(),
                signal_name: "ready".to_string(),
                sender_line: 5,
                receiver_line: 12,
                sender_node_id: "ext_sig_ready_5".to_string(),
                receiver_node_id: "sig_handler_ready_12".to_string(),
            }]
        );
        assert_eq!(graph.signal_handlers["ready"].len(), 1);
    }

    #[test]
    fn test_ping_pong_records_edges_without_looping() {
        let graph = resolve(
            Fixture::new()
                .workflow_with_handlers(
                    "ping.wf",
                    "Ping",
                    vec![send("Ping", "ping", 4)],
                    vec![SignalHandler::new("Ping", "pong", "on_pong", 9)],
                )
                .workflow_with_handlers(
                    "pong.wf",
                    "Pong",
                    vec![send("Pong", "pong", 4)],
                    vec![SignalHandler::new("Pong", "ping", "on_ping", 9)],
                ),
            "ping.wf",
            10,
        );

        assert_eq!(graph.total_workflows(), 2);
        assert_eq!(graph.connections.len(), 2);
        assert_eq!(graph.connections[1].sender_workflow, "Pong");
        assert_eq!(graph.connections[1].receiver_workflow, "Ping");
    }

    #[test]
    fn test_every_listener_receives_the_signal() {
        let graph = resolve(
            Fixture::new()
                .workflow("sender.wf", "Sender", vec![send("Sender", "ready", 5)])
                .workflow_with_handlers(
                    "a.wf",
                    "A",
                    vec![],
                    vec![SignalHandler::new("A", "ready", "on_ready", 3)],
                )
                .workflow_with_handlers(
                    "b.wf",
                    "B",
                    vec![],
                    vec![SignalHandler::new("B", "ready", "on_ready", 3)],
                ),
            "sender.wf",
            10,
        );

        let receivers: Vec<&str> = graph
            .outgoing("Sender")
            .map(|c| c.receiver_workflow.as_str())
            .collect();
        assert_eq!(receivers, vec!["A", "B"]);
        assert_eq!(graph.total_workflows(), 3);
    }

    #[test]
    fn test_depth_ceiling_stops_expansion() {
        let graph = resolve(
            Fixture::new()
                .workflow("a.wf", "A", vec![send("A", "to_b", 2)])
                .workflow_with_handlers(
                    "b.wf",
                    "B",
                    vec![send("B", "to_c", 2)],
                    vec![SignalHandler::new("B", "to_b", "on_b", 6)],
                )
                .workflow_with_handlers(
                    "c.wf",
                    "C",
                    vec![],
                    vec![SignalHandler::new("C", "to_c", "on_c", 6)],
                ),
            "a.wf",
            1,
        );

        assert_eq!(graph.total_workflows(), 2);
        assert!(graph.workflows.contains_key("B"));
        assert!(!graph.workflows.contains_key("C"));
    }

    #[test]
    fn test_unbuilt_index_is_rejected() {
        let (dir, mut parser) = Fixture::new().workflow("a.wf", "A", vec![]).build();
        let index = SignalHandlerIndex::new(vec![dir.path().to_path_buf()]);

        let err = SignalGraphResolver::new(10)
            .resolve(dir.path().join("a.wf"), &mut parser, &index)
            .unwrap_err();
        assert!(matches!(err, WorkflowGraphError::Config(_)));
    }
}
