//! Splits a Markdown file into the title line and the body that follows it.

use crate::error::Result;
use std::fs;
use std::path::Path;

/// A title and Markdown body extracted from an article file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Article {
    pub title: String,
    pub body: String,
}

impl Article {
    /// Parses raw file text. Never fails: an empty input yields an empty title and body.
    pub fn parse(content: &str) -> Self {
        let lines: Vec<&str> = content.split('\n').collect();

        let mut title = String::new();
        let mut body_start = lines.len();
        for (idx, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                title = clean_title(trimmed);
                body_start = idx + 1;
                break;
            }
        }

        let mut rule_seen = false;
        while let Some(line) = lines.get(body_start) {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                body_start += 1;
            } else if !rule_seen && is_horizontal_rule(trimmed) {
                rule_seen = true;
                body_start += 1;
            } else {
                break;
            }
        }

        let body = lines
            .get(body_start..)
            .map(|rest| rest.join("\n"))
            .unwrap_or_default()
            .trim()
            .to_string();

        Self { title, body }
    }

    /// Reads and parses an article from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }
}

/// Strips heading markers, emphasis markers and whitespace from both ends.
fn clean_title(line: &str) -> String {
    line.trim_matches(|c: char| c == '*' || c == '#' || c.is_whitespace())
        .to_string()
}

fn is_horizontal_rule(line: &str) -> bool {
    matches!(line, "---" | "***" | "___")
}
