//! Loads the JSON configuration and resolves the paths the publisher works with.

use crate::error::{PublishError, Result};
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the base directory.
pub const CONFIG_FILE_NAME: &str = ".substack-config.json";

/// Location of the publish log relative to the base directory.
pub const DEFAULT_LOG_FILE: &str = "published/index.md";

/// Whether an existing post with the same title is looked up and updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// Update the post whose title matches, creating one only if none exists.
    #[default]
    Upsert,
    /// Always create a new post.
    Create,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Value of the `substack.sid` session cookie.
    pub cookie: String,
    pub publication_url: String,
    #[serde(default)]
    pub mode: Option<PublishMode>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("cookie", &"<redacted>")
            .field("publication_url", &self.publication_url)
            .field("mode", &self.mode)
            .field("log_file", &self.log_file)
            .finish()
    }
}

impl Config {
    /// Reads and validates the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PublishError::ConfigMissing(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: Config =
            serde_json::from_str(&content).map_err(|err| PublishError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |reason: &str| PublishError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if self.cookie.trim().is_empty() {
            return Err(invalid("`cookie` must not be empty"));
        }
        let url = self.publication_url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(invalid("`publicationUrl` must be an http(s) URL"));
        }
        Ok(())
    }

    /// The publication URL without a trailing slash.
    pub fn publication_base(&self) -> &str {
        self.publication_url.trim().trim_end_matches('/')
    }

    /// Where the publish log lives; relative paths are taken from `base_dir`.
    pub fn log_path(&self, base_dir: &Path) -> PathBuf {
        let log_file = self
            .log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
        base_dir.join(log_file)
    }

    /// The skeleton printed when no configuration file exists.
    pub fn template() -> String {
        format!(
            "{:#}",
            json!({
                "cookie": "your substack.sid cookie value",
                "publicationUrl": "https://yourname.substack.com",
            })
        )
    }
}

/// The public address of a post.
pub fn post_url(publication_base: &str, slug: &str) -> String {
    format!("{}/p/{}", publication_base.trim_end_matches('/'), slug)
}

/// Directory holding the running executable, used as the default base directory.
pub fn executable_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Finds the article file, first as given, then relative to `base_dir`.
pub fn resolve_article_path(path: &Path, base_dir: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    let fallback = base_dir.join(path);
    if fallback.is_file() {
        return Ok(fallback);
    }

    Err(PublishError::ArticleNotFound(path.to_path_buf()))
}
