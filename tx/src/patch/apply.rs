//! Applying update hunks to file content in memory

use thiserror::Error;
use tracing::debug;

use super::matching::{MatchFailure, Needle, Tier, find_anchor, locate};
use super::types::{Hunk, HunkLine};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HunkError {
    #[error("hunk {hunk}: context not found (first expected line: '{expected}')")]
    NotFound { hunk: usize, expected: String },

    #[error("hunk {hunk}: only adds lines and has no context, anchor or end-of-file marker to place them")]
    NoContext { hunk: usize },

    /// `lines` are 1-based start lines of every candidate
    #[error("hunk {hunk}: context matches {} locations (lines {})", .lines.len(), join_lines(.lines))]
    Ambiguous { hunk: usize, lines: Vec<usize> },
}

impl HunkError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "patch_context_not_found",
            Self::Ambiguous { .. } => "patch_context_not_unique",
            Self::NoContext { .. } => "invalid_patch_format",
        }
    }
}

fn join_lines(lines: &[usize]) -> String {
    lines.iter().map(usize::to_string).collect::<Vec<_>>().join(", ")
}

/// Result of applying every hunk of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub content: String,
    /// At least one hunk only matched after whitespace or punctuation folding
    pub fuzzy: bool,
}

/// Split on `\n`, dropping `\r` and the empty tail after a final newline
pub fn split_content_lines(content: &str) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<String> = content
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
        .collect();
    if content.ends_with('\n') && lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

pub(crate) fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Shift an added line from the hunk's indentation to the file's
pub(crate) fn reindent(text: &str, hunk_indent: &str, file_indent: &str) -> String {
    if hunk_indent == file_indent {
        return text.to_string();
    }
    match text.strip_prefix(hunk_indent) {
        Some(rest) => format!("{}{}", file_indent, rest),
        None => text.to_string(),
    }
}

/// Apply hunks in order; later hunks search past earlier ones.
///
/// Matched context keeps the file's own text, so loose matches never rewrite
/// lines the hunk did not mean to touch. Line endings and the trailing newline
/// of the input are preserved.
pub fn apply_hunks(content: &str, hunks: &[Hunk]) -> Result<Applied, HunkError> {
    debug!(hunks = hunks.len(), "apply_hunks: called");
    let line_ending = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let had_trailing_newline = content.is_empty() || content.ends_with('\n');
    let mut lines = split_content_lines(content);
    let mut search_from = 0usize;
    let mut fuzzy = false;

    for (idx, hunk) in hunks.iter().enumerate() {
        let number = idx + 1;
        let old_lines = hunk.old_lines();

        if old_lines.is_empty() {
            let added: Vec<String> = hunk.new_lines();
            let insert_at = if hunk.end_of_file || lines.is_empty() {
                lines.len()
            } else if let Some(anchor) = hunk.anchor.as_deref() {
                let at = find_anchor(&lines, anchor, search_from).ok_or_else(|| HunkError::NotFound {
                    hunk: number,
                    expected: anchor.to_string(),
                })?;
                at + 1
            } else {
                return Err(HunkError::NoContext { hunk: number });
            };
            debug!(number, insert_at, "apply_hunks: pure insertion");
            search_from = insert_at + added.len();
            lines.splice(insert_at..insert_at, added);
            continue;
        }

        let needle = Needle {
            lines: &old_lines,
            anchor: hunk.anchor.as_deref(),
            end_of_file: hunk.end_of_file,
        };
        let located = locate(&lines, needle, search_from).map_err(|failure| match failure {
            MatchFailure::NotFound => HunkError::NotFound {
                hunk: number,
                expected: hunk.first_expected().unwrap_or_default().to_string(),
            },
            MatchFailure::Ambiguous(positions) => HunkError::Ambiguous {
                hunk: number,
                lines: positions.into_iter().map(|p| p + 1).collect(),
            },
        })?;
        if located.tier != Tier::Exact {
            debug!(number, tier = ?located.tier, "apply_hunks: loose match");
            fuzzy = true;
        }

        let position = located.position;
        let hunk_indent = leading_whitespace(&old_lines[0]).to_string();
        let file_indent = leading_whitespace(&lines[position]).to_string();

        let mut replacement = Vec::with_capacity(old_lines.len() + hunk.added());
        let mut cursor = position;
        for line in &hunk.lines {
            match line {
                HunkLine::Context(_) => {
                    replacement.push(lines[cursor].clone());
                    cursor += 1;
                }
                HunkLine::Remove(_) => cursor += 1,
                HunkLine::Add(text) => replacement.push(reindent(text, &hunk_indent, &file_indent)),
            }
        }

        search_from = position + replacement.len();
        lines.splice(position..position + old_lines.len(), replacement);
    }

    let mut updated = lines.join(line_ending);
    if had_trailing_newline && !lines.is_empty() {
        updated.push_str(line_ending);
    }
    Ok(Applied { content: updated, fuzzy })
}
