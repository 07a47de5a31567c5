// ABOUTME: Source-loading seam for GetLib/GetFile (file-backed script inclusion)

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SourceConfig;

#[derive(Debug, thiserror::Error)]
pub enum SourceLoadError {
    #[error("source file '{0}' not found in any configured search path")]
    NotFound(String),
    #[error("source file '{path}' exceeds the configured maximum size of {max} bytes")]
    TooLarge { path: String, max: usize },
    #[error("failed to read '{path}': {cause}")]
    Io { path: String, cause: String },
}

/// Resolves a library/file name to source text. The CLI/REPL only wires up
/// `GetMod` against the in-process `ModuleRegistry`; `GetLib`/`GetFile`
/// remain reserved keywords backed by this trait so an embedder can supply
/// their own resolution policy (a virtual filesystem, a network fetch, an
/// in-memory test fixture) without touching the evaluator.
pub trait SourceLoader {
    fn load(&self, name: &str) -> Result<String, SourceLoadError>;
}

pub struct FsSourceLoader {
    config: SourceConfig,
}

impl FsSourceLoader {
    pub fn new(config: SourceConfig) -> Self {
        FsSourceLoader { config }
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        for root in &self.config.search_paths {
            let candidate = root.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
            let with_ext = root.join(format!("{name}.lox"));
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }
        None
    }
}

impl SourceLoader for FsSourceLoader {
    fn load(&self, name: &str) -> Result<String, SourceLoadError> {
        let path = self.resolve(name).ok_or_else(|| SourceLoadError::NotFound(name.to_string()))?;
        let metadata = fs::metadata(&path).map_err(|e| SourceLoadError::Io { path: display(&path), cause: e.to_string() })?;
        if metadata.len() as usize > self.config.max_file_size {
            return Err(SourceLoadError::TooLarge { path: display(&path), max: self.config.max_file_size });
        }
        fs::read_to_string(&path).map_err(|e| SourceLoadError::Io { path: display(&path), cause: e.to_string() })
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
