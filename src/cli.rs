use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use tracing::info;

use workflow_graphs::config::Config;
use workflow_graphs::core::{Engine, ExpansionMode};

#[derive(Parser)]
#[command(name = "workflow-graphs")]
#[command(about = "Static path and graph analysis for durable workflow definitions")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write JSON output to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Directory searched for child workflows and signal handlers (repeatable)
    #[arg(long = "search-path", global = true)]
    pub search_paths: Vec<PathBuf>,

    /// Maximum call graph and signal graph depth
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    /// Maximum number of cross-workflow paths in inline mode
    #[arg(long, global = true)]
    pub max_paths: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Enumerate every execution path of a workflow
    Paths {
        /// Workflow source file
        file: PathBuf,
    },

    /// Resolve the child workflow call graph
    CallGraph {
        /// Entry workflow source file
        file: PathBuf,
    },

    /// Resolve the peer signal graph
    SignalGraph {
        /// Entry workflow source file
        file: PathBuf,
    },

    /// Combine paths across child workflow calls
    Expand {
        /// Entry workflow source file
        file: PathBuf,

        /// Expansion mode (reference, inline, subgraph)
        #[arg(long)]
        mode: Option<ExpansionMode>,
    },
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if !self.search_paths.is_empty() {
            config.project.search_paths = self.search_paths.clone();
        }
        if let Some(depth) = self.max_depth {
            config.analysis.max_expansion_depth = depth;
            config.analysis.max_signal_depth = depth;
        }
        if let Some(max_paths) = self.max_paths {
            config.analysis.max_paths = max_paths;
        }
    }

    pub fn execute(self, mut engine: Engine) -> Result<()> {
        let pretty = engine.config().output.pretty;
        let output = self.output.as_deref();

        match self.command {
            Commands::Init { path, force } => {
                let written = engine.init(path, force)?;
                println!("Created {}", written.display());
                Ok(())
            }
            Commands::Paths { file } => {
                let report = engine.paths(&file)?;
                write_report(&report, output, pretty)
            }
            Commands::CallGraph { file } => {
                let report = engine.call_graph(&file)?;
                write_report(&report, output, pretty)
            }
            Commands::SignalGraph { file } => {
                let report = engine.signal_graph(&file)?;
                write_report(&report, output, pretty)
            }
            Commands::Expand { file, mode } => {
                let report = engine.expand(&file, mode)?;
                write_report(&report, output, pretty)
            }
        }
    }
}

fn write_report<T: Serialize>(report: &T, output: Option<&Path>, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
