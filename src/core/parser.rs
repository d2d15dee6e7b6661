use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::ParsingConfig;
use crate::error::{Result, WorkflowGraphError};
use super::languages::{ExtractedFile, PythonWorkflowExtractor, WorkflowExtractor};
use super::metadata::WorkflowMetadata;

/// A parsed workflow source file
#[derive(Debug, Clone)]
pub struct ParsedWorkflowFile {
    pub path: PathBuf,

    /// Language detected from the extension
    pub language: String,

    /// SHA-256 of the file content
    pub content_hash: String,

    /// Workflow definitions in source order
    pub workflows: Vec<WorkflowMetadata>,

    /// Local name to imported module path
    pub imports: BTreeMap<String, String>,
}

/// Reads workflow sources and delegates to language extractors.
///
/// Parsed files are cached for the lifetime of the parser, so one parser
/// should be used per analysis run.
pub struct WorkflowParser {
    config: ParsingConfig,
    ignore_patterns: Vec<String>,
    extractors: Vec<Box<dyn WorkflowExtractor>>,
    cache: HashMap<PathBuf, ParsedWorkflowFile>,
}

impl WorkflowParser {
    pub fn new(config: &ParsingConfig, ignore_patterns: &[String]) -> Result<Self> {
        let python = PythonWorkflowExtractor::new()?;
        Ok(Self::with_extractors(config, ignore_patterns, vec![Box::new(python)]))
    }

    /// Build a parser around explicit extractors
    pub fn with_extractors(
        config: &ParsingConfig,
        ignore_patterns: &[String],
        extractors: Vec<Box<dyn WorkflowExtractor>>,
    ) -> Self {
        Self {
            config: config.clone(),
            ignore_patterns: ignore_patterns.to_vec(),
            extractors,
            cache: HashMap::new(),
        }
    }

    /// Parse a single source file, reusing earlier results
    pub fn parse_file<P: AsRef<Path>>(&mut self, file_path: P) -> Result<&ParsedWorkflowFile> {
        let path = file_path.as_ref().to_path_buf();

        if !self.cache.contains_key(&path) {
            let parsed = self.read_and_extract(&path)?;
            debug!(
                "Parsed {} ({} workflows)",
                path.display(),
                parsed.workflows.len()
            );
            self.cache.insert(path.clone(), parsed);
        }

        self.cache
            .get(&path)
            .ok_or_else(|| WorkflowGraphError::Parser(format!("Cache miss for {}", path.display())))
    }

    /// All workflow definitions in a file
    pub fn workflows_in<P: AsRef<Path>>(&mut self, file_path: P) -> Result<Vec<WorkflowMetadata>> {
        Ok(self.parse_file(file_path)?.workflows.clone())
    }

    /// The first workflow defined in a file
    pub fn analyze<P: AsRef<Path>>(&mut self, file_path: P) -> Result<WorkflowMetadata> {
        let path = file_path.as_ref();
        self.parse_file(path)?
            .workflows
            .first()
            .cloned()
            .ok_or_else(|| WorkflowGraphError::NoWorkflowDefinition {
                path: path.to_path_buf(),
            })
    }

    /// A specific workflow defined in a file
    pub fn workflow_in<P: AsRef<Path>>(&mut self, file_path: P, name: &str) -> Result<WorkflowMetadata> {
        let path = file_path.as_ref();
        self.parse_file(path)?
            .workflows
            .iter()
            .find(|w| w.name() == name)
            .cloned()
            .ok_or_else(|| {
                WorkflowGraphError::Parser(format!(
                    "Workflow '{}' is not defined in {}",
                    name,
                    path.display()
                ))
            })
    }

    pub fn defines_workflow<P: AsRef<Path>>(&mut self, file_path: P, name: &str) -> Result<bool> {
        Ok(self
            .parse_file(file_path)?
            .workflows
            .iter()
            .any(|w| w.name() == name))
    }

    pub fn imports<P: AsRef<Path>>(&mut self, file_path: P) -> Result<BTreeMap<String, String>> {
        Ok(self.parse_file(file_path)?.imports.clone())
    }

    /// Candidate files for an imported module, relative to the importing file
    pub fn module_candidates(&self, importing_file: &Path, module: &str) -> Vec<PathBuf> {
        let current_dir = importing_file.parent().unwrap_or_else(|| Path::new(""));
        match self.extractor_for(importing_file) {
            Some(extractor) => extractor.module_candidates(module, current_dir),
            None => Vec::new(),
        }
    }

    /// Every parseable file under a root, sorted by path
    pub fn candidate_files(&self, root: &Path) -> Vec<PathBuf> {
        if root.is_file() {
            return if self.should_parse_file(root) {
                vec![root.to_path_buf()]
            } else {
                Vec::new()
            };
        }

        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(false)
            .git_ignore(true)
            .sort_by_file_name(|a, b| a.cmp(b));

        if !self.ignore_patterns.is_empty() {
            let mut overrides = OverrideBuilder::new(root);
            for pattern in &self.ignore_patterns {
                if let Err(e) = overrides.add(&format!("!{}", pattern)) {
                    warn!("Ignoring invalid ignore pattern '{}': {}", pattern, e);
                }
            }
            match overrides.build() {
                Ok(overrides) => {
                    builder.overrides(overrides);
                }
                Err(e) => warn!("Failed to build ignore patterns: {}", e),
            }
        }

        let mut files = Vec::new();
        for entry in builder.build() {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && self.should_parse_file(path) {
                        files.push(path.to_path_buf());
                    }
                }
                Err(e) => warn!("Skipping unreadable entry under {}: {}", root.display(), e),
            }
        }

        files
    }

    /// Search a directory tree for a file defining the named workflow.
    ///
    /// Files that cannot be read or parsed are skipped.
    pub fn find_workflow_in_dir(&mut self, root: &Path, name: &str) -> Option<PathBuf> {
        for file in self.candidate_files(root) {
            match self.defines_workflow(&file, name) {
                Ok(true) => return Some(file),
                Ok(false) => {}
                Err(WorkflowGraphError::Io(e)) => {
                    warn!("Skipping unreadable file {}: {}", file.display(), e)
                }
                Err(e) => debug!("Skipping {}: {}", file.display(), e),
            }
        }
        None
    }

    fn read_and_extract(&mut self, path: &Path) -> Result<ParsedWorkflowFile> {
        let index = self.extractor_index(path).ok_or_else(|| {
            WorkflowGraphError::Parser(format!("No workflow extractor for file: {}", path.display()))
        })?;

        let source_content = std::fs::read_to_string(path)?;

        if source_content.len() > self.config.max_file_size {
            return Err(WorkflowGraphError::Parser(format!(
                "File {} exceeds maximum size limit",
                path.display()
            )));
        }

        let content_hash = calculate_hash(&source_content);
        let extractor = &mut self.extractors[index];
        let language = extractor.language_name().to_string();
        let ExtractedFile { workflows, imports } = extractor.extract(&source_content, path)?;

        let workflows = workflows
            .into_iter()
            .map(|w| w.with_source_hash(content_hash.clone()))
            .collect();

        Ok(ParsedWorkflowFile {
            path: path.to_path_buf(),
            language,
            content_hash,
            workflows,
            imports,
        })
    }

    /// Determine if a file should be parsed based on configuration
    fn should_parse_file(&self, path: &Path) -> bool {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(extension) => {
                self.config.file_extensions.iter().any(|e| e == extension)
                    && self.extractor_index(path).is_some()
            }
            None => false,
        }
    }

    fn extractor_index(&self, path: &Path) -> Option<usize> {
        let extension = path.extension().and_then(|ext| ext.to_str())?;
        self.extractors
            .iter()
            .position(|extractor| extractor.file_extensions().contains(&extension))
    }

    fn extractor_for(&self, path: &Path) -> Option<&dyn WorkflowExtractor> {
        self.extractor_index(path).map(|i| self.extractors[i].as_ref())
    }
}

/// Calculate SHA256 hash of content
fn calculate_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
