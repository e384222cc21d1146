//! Error types for the registration core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubmanError {
    #[error("invalid parameters: {0}")]
    Validation(String),

    #[error("required binary not found: {0}")]
    BinaryNotFound(String),

    #[error("'{command}' failed with exit code {code}: {stderr}")]
    ExternalTool {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("cannot resolve pool: {0}")]
    UnresolvedPool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SubmanError>;
