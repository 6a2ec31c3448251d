//! Error taxonomy for the loader.
//!
//! Every variant is scoped to a single file. Nothing here aborts the session
//! except [`BuildError::Setup`], which is only produced while the compiler host
//! is being created.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A component resource (stylesheet, template) could not be read.
    #[error("Unable to locate component resource: {}", path.display())]
    ResourceNotFound { path: PathBuf },

    /// `emit` was asked for a file the current program does not know about.
    #[error("Unable to retrieve source file: {}", path.display())]
    UnknownSource { path: PathBuf },

    /// The program produced no JavaScript artifact for the file.
    #[error("Failed to emit file: {}", path.display())]
    EmitFailure { path: PathBuf },

    #[error("Transform failed for {}: {message}", path.display())]
    TransformFailure { path: PathBuf, message: String },

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Compiler setup failed: {0}")]
    Setup(String),
}

impl BuildError {
    pub fn transform(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        BuildError::TransformFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}

/// What the host bundler receives when one module fails to load.
#[derive(Debug, thiserror::Error)]
#[error("[angular-loader] {}: {source}", path.display())]
pub struct LoadError {
    pub path: PathBuf,
    #[source]
    pub source: BuildError,
}

impl LoadError {
    pub fn new(path: impl Into<PathBuf>, source: BuildError) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}
