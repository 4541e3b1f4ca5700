//! Defines custom error types for the application.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
/// Error type returned when loading, converting or publishing an article fails.
pub enum PublishError {
    #[error("Missing configuration file: {}", .0.display())]
    ConfigMissing(PathBuf),

    #[error("Invalid configuration in {}: {reason}", path.display())]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("The session cookie contains characters that cannot be sent in an HTTP header.")]
    InvalidCookie,

    #[error("File not found: {}", .0.display())]
    ArticleNotFound(PathBuf),

    #[error("Failed to parse Markdown: {0}")]
    MarkdownParse(String),

    #[error("Substack returned HTTP {status} for {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Request to Substack failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PublishError>;
