//! Fixtures for exercising resolvers without a real language front-end.
//!
//! A [`Fixture`] writes placeholder files into a temporary directory and
//! serves hand-built metadata for them through [`FakeExtractor`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::ParsingConfig;
use crate::error::{Result, WorkflowGraphError};
use super::languages::{ExtractedFile, WorkflowExtractor};
use super::metadata::{SignalHandler, StepFact, WorkflowMetadata};
use super::parser::WorkflowParser;

const EXTENSION: &str = "wf";

#[derive(Clone, Default)]
struct FakeFile {
    workflows: Vec<(String, Vec<StepFact>, Vec<SignalHandler>)>,
    imports: BTreeMap<String, String>,
    broken: bool,
}

pub(crate) struct FakeExtractor {
    files: BTreeMap<String, FakeFile>,
}

impl WorkflowExtractor for FakeExtractor {
    fn extract(&mut self, _content: &str, file_path: &Path) -> Result<ExtractedFile> {
        let file = self
            .files
            .iter()
            .filter(|(key, _)| file_path.ends_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, file)| file.clone())
            .unwrap_or_default();

        if file.broken {
            return Err(WorkflowGraphError::Parser(format!(
                "Syntax errors in {}",
                file_path.display()
            )));
        }

        let workflows = file
            .workflows
            .into_iter()
            .map(|(name, steps, handlers)| {
                WorkflowMetadata::new(name, file_path, steps).with_signal_handlers(handlers)
            })
            .collect();

        Ok(ExtractedFile {
            workflows,
            imports: file.imports,
        })
    }

    fn module_candidates(&self, module: &str, current_dir: &Path) -> Vec<PathBuf> {
        vec![current_dir.join(module.replace('.', "/")).with_extension(EXTENSION)]
    }

    fn file_extensions(&self) -> &[&str] {
        &[EXTENSION]
    }

    fn language_name(&self) -> &str {
        "fake"
    }
}

/// Builder for a directory of fake workflow files
#[derive(Default)]
pub(crate) struct Fixture {
    files: BTreeMap<String, FakeFile>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflow(self, file: &str, name: &str, steps: Vec<StepFact>) -> Self {
        self.workflow_with_handlers(file, name, steps, Vec::new())
    }

    pub fn workflow_with_handlers(
        mut self,
        file: &str,
        name: &str,
        steps: Vec<StepFact>,
        handlers: Vec<SignalHandler>,
    ) -> Self {
        self.files
            .entry(file.to_string())
            .or_default()
            .workflows
            .push((name.to_string(), steps, handlers));
        self
    }

    pub fn import(mut self, file: &str, name: &str, module: &str) -> Self {
        self.files
            .entry(file.to_string())
            .or_default()
            .imports
            .insert(name.to_string(), module.to_string());
        self
    }

    /// A file that fails to parse
    pub fn broken(mut self, file: &str) -> Self {
        self.files.entry(file.to_string()).or_default().broken = true;
        self
    }

    /// Write the files and return a parser serving their metadata
    pub fn build(self) -> (TempDir, WorkflowParser) {
        let dir = TempDir::new().unwrap();
        for file in self.files.keys() {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, "").unwrap();
        }

        let config = ParsingConfig {
            file_extensions: vec![EXTENSION.to_string()],
            ..ParsingConfig::default()
        };
        let parser = WorkflowParser::with_extractors(
            &config,
            &[],
            vec![Box::new(FakeExtractor { files: self.files })],
        );
        (dir, parser)
    }
}
