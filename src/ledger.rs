//! The local record of published articles: a Markdown table that only grows.

use crate::error::Result;
use chrono::NaiveDate;
use log::debug;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Number of body characters kept in a row's summary.
pub const SUMMARY_CHARS: usize = 60;

/// One row of the publish log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishLogEntry {
    pub date: NaiveDate,
    pub title: String,
    pub filename: String,
    pub summary: String,
}

impl PublishLogEntry {
    pub fn new(date: NaiveDate, title: &str, filename: &str, body: &str) -> Self {
        Self {
            date,
            title: title.to_string(),
            filename: filename.to_string(),
            summary: summarize(body),
        }
    }

    /// Renders the entry as `| YYYY-MM-DD | [title](filename) | summary... |`.
    ///
    /// The title and filename are escaped so neither can end the cell or the link early.
    pub fn to_row(&self) -> String {
        format!(
            "| {} | [{}]({}) | {}... |\n",
            self.date.format("%Y-%m-%d"),
            escape_link_text(&self.title),
            escape_link_target(&self.filename),
            self.summary
        )
    }

    /// Appends the row to `path`, creating the file and its parent directories if needed.
    pub fn append_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(self.to_row().as_bytes())?;
        debug!("Appended publish log row to {}", path.display());
        Ok(())
    }
}

/// Takes the first characters of `body` and neutralizes what would break a table row.
pub fn summarize(body: &str) -> String {
    body.chars()
        .take(SUMMARY_CHARS)
        .filter(|&c| c != '\r')
        .map(|c| match c {
            '\n' => ' ',
            '|' => '/',
            other => other,
        })
        .collect()
}

fn escape_link_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '|' => escaped.push('/'),
            '\r' => {}
            '\n' => escaped.push(' '),
            '[' | ']' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            other => escaped.push(other),
        }
    }
    escaped
}

fn escape_link_target(target: &str) -> String {
    let mut escaped = String::with_capacity(target.len());
    for c in target.chars() {
        match c {
            '|' => escaped.push_str("%7C"),
            ' ' => escaped.push_str("%20"),
            '(' => escaped.push_str("%28"),
            ')' => escaped.push_str("%29"),
            '<' => escaped.push_str("%3C"),
            '>' => escaped.push_str("%3E"),
            other => escaped.push(other),
        }
    }
    escaped
}
