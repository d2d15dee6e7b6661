use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::ExpansionMode;
use crate::error::{Result, WorkflowGraphError};

/// Largest number of branch points whose paths fit in a `u64` counter
const MAX_SUPPORTED_DECISION_POINTS: usize = 63;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Source parsing configuration
    pub parsing: ParsingConfig,

    /// Path and graph analysis limits
    pub analysis: AnalysisConfig,

    /// Output settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Directories searched when resolving child workflows and signal handlers
    pub search_paths: Vec<PathBuf>,

    /// Patterns excluded from directory searches
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingConfig {
    /// File extensions to parse
    pub file_extensions: Vec<String>,

    /// Maximum file size to parse (in bytes)
    pub max_file_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Decision/signal points per workflow before refusing to generate paths
    pub max_decision_points: usize,

    /// Maximum number of paths produced by cross-workflow expansion
    pub max_paths: usize,

    /// Maximum recursion depth when resolving child workflows
    pub max_expansion_depth: usize,

    /// Maximum recursion depth when following peer signals
    pub max_signal_depth: usize,

    /// How child workflow paths combine with their parent's
    pub expansion_mode: ExpansionMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Pretty-print JSON output
    pub pretty: bool,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            file_extensions: vec!["py".to_string()],
            max_file_size: 1024 * 1024, // 1MB
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_decision_points: 10,
            max_paths: 1024,
            max_expansion_depth: 2,
            max_signal_depth: 10,
            expansion_mode: ExpansionMode::Reference,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig {
                name: "Unnamed Project".to_string(),
                search_paths: vec![PathBuf::from(".")],
                ignore_patterns: vec![
                    "target/".to_string(),
                    "node_modules/".to_string(),
                    ".git/".to_string(),
                    ".venv/".to_string(),
                    "__pycache__/".to_string(),
                ],
            },
            parsing: ParsingConfig::default(),
            analysis: AnalysisConfig::default(),
            output: OutputConfig { pretty: true },
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| WorkflowGraphError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| WorkflowGraphError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Err(WorkflowGraphError::Config(format!(
                        "Configuration file not found: {}",
                        p.as_ref().display()
                    )))
                }
            }
            None => {
                // Try common config file locations
                let candidates = [
                    "WorkflowGraphs.toml",
                    "workflow-graphs.toml",
                    ".workflow-graphs.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    /// Check limits before any analysis runs
    pub fn validate(&self) -> Result<()> {
        let analysis = &self.analysis;

        if analysis.max_decision_points == 0 || analysis.max_decision_points > MAX_SUPPORTED_DECISION_POINTS {
            return Err(WorkflowGraphError::Config(format!(
                "max_decision_points must be between 1 and {}, got {}",
                MAX_SUPPORTED_DECISION_POINTS, analysis.max_decision_points
            )));
        }
        if analysis.max_paths == 0 {
            return Err(WorkflowGraphError::Config(
                "max_paths must be at least 1".to_string(),
            ));
        }
        if self.parsing.file_extensions.is_empty() {
            return Err(WorkflowGraphError::Config(
                "parsing.file_extensions must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
