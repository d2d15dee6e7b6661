// src/core/engine.rs
use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::config::Config;
use super::{
    CallGraphReport, CallGraphResolver, ExpansionMode, ExpansionReport, PathCombinator,
    PathGenerator, PathReport, SignalGraphReport, SignalGraphResolver, SignalHandlerIndex,
    WorkflowCallGraph, WorkflowParser,
};

/// Default file name written by `init`
pub const CONFIG_FILE_NAME: &str = "workflow-graphs.toml";

/// Main orchestration engine for workflow graph analysis.
///
/// Owns the validated configuration and a parser whose file cache lives as
/// long as the engine, so one engine should serve one analysis run.
pub struct Engine {
    config: Config,
    parser: WorkflowParser,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        debug!("Loaded configuration: {:?}", config);

        let parser = WorkflowParser::new(&config.parsing, &config.project.ignore_patterns)?;
        Ok(Self { config, parser })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Enumerate the execution paths of the first workflow in a file
    pub fn paths(&mut self, file: &Path) -> Result<PathReport> {
        info!("Generating execution paths for {}", file.display());

        let workflow = self.parser.analyze(file)?;
        let paths = self.generator().generate_paths(&workflow)?;

        info!(
            "{}: {} decisions, {} signals, {} paths",
            workflow.name(),
            workflow.decision_count(),
            workflow.signal_count(),
            paths.len()
        );
        Ok(PathReport::new(workflow, paths))
    }

    /// Resolve the child workflow call graph rooted at a file
    pub fn call_graph(&mut self, file: &Path) -> Result<CallGraphReport> {
        let graph = self.resolve_call_graph(file)?;
        Ok(CallGraphReport::new(graph))
    }

    /// Resolve the peer signal graph rooted at a file
    pub fn signal_graph(&mut self, file: &Path) -> Result<SignalGraphReport> {
        info!("Indexing signal handlers");
        let mut index = SignalHandlerIndex::new(self.config.project.search_paths.clone());
        index.build(&mut self.parser);

        let resolver = SignalGraphResolver::new(self.config.analysis.max_signal_depth);
        let graph = resolver
            .resolve(file, &mut self.parser, &index)
            .with_context(|| format!("Signal graph resolution failed for {}", file.display()))?;
        Ok(SignalGraphReport::new(graph))
    }

    /// Combine paths across the call graph; `mode` overrides the configured one
    pub fn expand(&mut self, file: &Path, mode: Option<ExpansionMode>) -> Result<ExpansionReport> {
        let mode = mode.unwrap_or(self.config.analysis.expansion_mode);
        let graph = self.resolve_call_graph(file)?;

        let combinator = PathCombinator::new(self.generator(), self.config.analysis.max_paths);
        let paths = combinator.combine(&graph, mode)?;

        info!(
            "{} mode: {} paths across {} workflows",
            mode,
            paths.len(),
            graph.total_workflows
        );
        Ok(ExpansionReport::new(&graph, mode, paths))
    }

    /// Write the current configuration as a starting config file
    pub fn init(&self, path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
        let target_dir = match path {
            Some(dir) => dir,
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let config_path = target_dir.join(CONFIG_FILE_NAME);
        info!("Initializing workflow-graphs in: {}", target_dir.display());

        if config_path.exists() && !force {
            bail!(
                "{} already exists (use --force to overwrite)",
                config_path.display()
            );
        }

        std::fs::create_dir_all(&target_dir)
            .with_context(|| format!("Failed to create {}", target_dir.display()))?;
        self.config.save(&config_path)?;
        info!("Wrote {}", config_path.display());
        Ok(config_path)
    }

    fn resolve_call_graph(&mut self, file: &Path) -> Result<WorkflowCallGraph> {
        let resolver = CallGraphResolver::new(
            self.config.project.search_paths.clone(),
            self.config.analysis.max_expansion_depth,
        );
        let graph = resolver
            .resolve(file, &mut self.parser)
            .with_context(|| format!("Call graph resolution failed for {}", file.display()))?;
        Ok(graph)
    }

    fn generator(&self) -> PathGenerator {
        PathGenerator::new(self.config.analysis.max_decision_points)
    }
}
