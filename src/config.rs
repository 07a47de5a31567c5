// ABOUTME: Configuration and constants for the interpreter
// This module holds version info, welcome messages, and source-loading configuration.

use std::path::PathBuf;

pub const VERSION: &str = "1.0.0";
pub const WELCOME_MESSAGE: &str = "loxrs v1.0";
pub const WELCOME_SUBTITLE: &str = "A tree-walking interpreter for a small class-based scripting language";

pub const HELP_TEXT: &str = r#"
Available REPL commands:
  quit or exit         - Exit the REPL
  help                 - Show this help message
  clear                - Clear the screen

Type any program statement to evaluate it. Use Ctrl-D or `quit` to exit.
"#;

/// Search-path configuration for `GetLib`/`GetFile` source loading.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub search_paths: Vec<PathBuf>,
    pub max_file_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            search_paths: vec![PathBuf::from("."), PathBuf::from("./lib"), PathBuf::from("./scripts")],
            max_file_size: 10 * 1024 * 1024,
        }
    }
}
