// src/core/signal_graph/mod.rs
//! Peer-to-peer signal graph
//!
//! Links workflows that signal one another by name, using a handler index
//! built once over the search roots.

mod handler_index;
mod peer_signal_graph;
mod resolver;

pub use handler_index::{IndexedHandler, SignalHandlerIndex};
pub use peer_signal_graph::{PeerSignalGraph, SignalConnection};
pub use resolver::SignalGraphResolver;
