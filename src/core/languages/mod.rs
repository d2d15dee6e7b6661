//! Language front-ends that turn workflow source text into metadata
//!
//! Each language gets its own module implementing [`WorkflowExtractor`]. The
//! analysis core never looks at source text; it only consumes the
//! [`ExtractedFile`] these front-ends produce.

mod python;

pub use python::PythonWorkflowExtractor;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use super::metadata::WorkflowMetadata;

/// Everything a front-end extracts from one source file
#[derive(Debug, Clone, Default)]
pub struct ExtractedFile {
    /// Workflow definitions in source order
    pub workflows: Vec<WorkflowMetadata>,
    /// Locally bound name to the module path it was imported from
    pub imports: BTreeMap<String, String>,
}

/// Trait that all workflow front-ends must implement
pub trait WorkflowExtractor {
    /// Parse source code and extract every workflow definition and import
    fn extract(&mut self, content: &str, file_path: &Path) -> Result<ExtractedFile>;

    /// Translate an imported module path into candidate source files,
    /// most specific first
    fn module_candidates(&self, module: &str, current_dir: &Path) -> Vec<PathBuf>;

    /// Get the file extensions this extractor handles
    fn file_extensions(&self) -> &[&str];

    /// Get the language name
    fn language_name(&self) -> &str;
}
