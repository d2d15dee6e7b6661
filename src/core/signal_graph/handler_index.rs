// src/core/signal_graph/handler_index.rs
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::metadata::SignalHandler;
use crate::core::parser::WorkflowParser;
use crate::error::WorkflowGraphError;

/// A signal handler and the file that defines it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedHandler {
    pub file: PathBuf,
    pub handler: SignalHandler,
}

/// Signal name -> handler lookup across every file under the search roots.
///
/// Built once per analysis run and read-only afterwards; [`rebuild`] discards
/// the table and scans again.
///
/// [`rebuild`]: SignalHandlerIndex::rebuild
#[derive(Debug, Default)]
pub struct SignalHandlerIndex {
    search_paths: Vec<PathBuf>,
    handlers: HashMap<String, Vec<IndexedHandler>>,
    built: bool,
}

impl SignalHandlerIndex {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            handlers: HashMap::new(),
            built: false,
        }
    }

    /// Scan the search roots unless the index is already built
    pub fn build(&mut self, parser: &mut WorkflowParser) {
        if self.built {
            return;
        }

        let mut seen_files = HashSet::new();
        let mut scanned = 0usize;

        for root in &self.search_paths {
            if !root.exists() {
                warn!("Search path {} does not exist, skipping", root.display());
                continue;
            }

            for file in parser.candidate_files(root) {
                if !seen_files.insert(file.clone()) {
                    continue;
                }
                scanned += 1;

                let workflows = match parser.workflows_in(&file) {
                    Ok(workflows) => workflows,
                    Err(WorkflowGraphError::Io(e)) => {
                        warn!("Skipping unreadable file {}: {}", file.display(), e);
                        continue;
                    }
                    Err(e) => {
                        debug!("Skipping {}: {}", file.display(), e);
                        continue;
                    }
                };

                for workflow in &workflows {
                    for handler in workflow.signal_handlers() {
                        self.handlers
                            .entry(handler.signal_name.clone())
                            .or_default()
                            .push(IndexedHandler {
                                file: file.clone(),
                                handler: handler.clone(),
                            });
                    }
                }
            }
        }

        self.built = true;
        info!(
            "Indexed {} signal names across {} files",
            self.handlers.len(),
            scanned
        );
    }

    /// Discard the table and scan again
    pub fn rebuild(&mut self, parser: &mut WorkflowParser) {
        self.handlers.clear();
        self.built = false;
        self.build(parser);
    }

    /// Every handler registered for a signal name, in scan order
    pub fn find_handlers(&self, signal_name: &str) -> &[IndexedHandler] {
        self.handlers
            .get(signal_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Number of distinct signal names
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
