use std::path::PathBuf;

/// Errors that can occur while reading or writing formula files.
#[derive(Debug, thiserror::Error)]
pub enum FormulaError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("formula '{name}' not found (searched {searched})")]
    NotFound { name: String, searched: String },

    #[error("cannot serialize formula: {0}")]
    Serialize(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
