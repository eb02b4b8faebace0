//! Parser for the `*** Begin Patch` envelope format

use thiserror::Error;
use tracing::debug;

use super::types::{Hunk, HunkLine, OpCounts, Patch, PatchOperation};

const BEGIN: &str = "*** Begin Patch";
const END: &str = "*** End Patch";
const ADD: &str = "*** Add File:";
const DELETE: &str = "*** Delete File:";
const UPDATE: &str = "*** Update File:";
const MOVE: &str = "*** Move to:";
const END_OF_FILE: &str = "*** End of File";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid patch format: {0}")]
    Format(String),

    #[error("unexpected line in patch for {path}: '{line}'. Hunk lines must start with ' ' (context), '-' (remove) or '+' (add)")]
    UnexpectedLine { path: String, line: String },

    #[error("invalid line in Add File section for {path}: '{line}'. Every line of a new file must start with '+'")]
    InvalidAddLine { path: String, line: String },
}

impl ParseError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Format(_) => "invalid_patch_format",
            Self::UnexpectedLine { .. } => "unexpected_patch_line",
            Self::InvalidAddLine { .. } => "invalid_add_line",
        }
    }
}

fn format_err(message: impl Into<String>) -> ParseError {
    ParseError::Format(message.into())
}

fn header_path<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix).map(str::trim)
}

fn is_operation_start(line: &str) -> bool {
    line.starts_with(ADD) || line.starts_with(DELETE) || line.starts_with(UPDATE) || line.trim_end() == END
}

/// `@@ fn main` carries an anchor; `@@` and `@@ -1,3 +1,4 @@` do not
fn parse_anchor(header: &str) -> Option<String> {
    let rest = header.trim_start_matches('@').trim();
    let rest = rest.trim_end_matches('@').trim();
    if rest.is_empty() {
        return None;
    }
    let looks_like_range = rest
        .split_whitespace()
        .all(|part| part.starts_with(['-', '+']) && part[1..].chars().all(|c| c.is_ascii_digit() || c == ','));
    if looks_like_range { None } else { Some(rest.to_string()) }
}

/// Parse patch text into operations.
///
/// Blank lines inside a hunk count as empty context lines unless they trail
/// the hunk, in which case they are separator noise and dropped.
pub fn parse_patch(text: &str) -> Result<Patch, ParseError> {
    debug!(len = text.len(), "parse_patch: called");
    let lines: Vec<&str> = text.lines().map(|l| l.strip_suffix('\r').unwrap_or(l)).collect();

    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    let (Some(first), Some(last)) = (first, last) else {
        return Err(format_err("patch is empty"));
    };
    if lines[first].trim() != BEGIN {
        return Err(format_err(format!("patch must start with '{}'", BEGIN)));
    }
    if first == last || lines[last].trim() != END {
        return Err(format_err(format!("patch must end with '{}'", END)));
    }

    let body = &lines[first + 1..last];
    let mut operations = Vec::new();
    let mut counts = OpCounts::default();
    let mut idx = 0usize;

    while idx < body.len() {
        let line = body[idx];
        if line.trim().is_empty() {
            idx += 1;
            continue;
        }

        if let Some(path) = header_path(line, ADD) {
            idx += 1;
            let mut added = Vec::new();
            let mut blanks = 0usize;
            while idx < body.len() && !is_operation_start(body[idx]) {
                let raw = body[idx];
                if raw.is_empty() {
                    blanks += 1;
                } else if let Some(payload) = raw.strip_prefix('+') {
                    added.extend(std::iter::repeat_n(String::new(), blanks));
                    blanks = 0;
                    added.push(payload.to_string());
                } else {
                    return Err(ParseError::InvalidAddLine {
                        path: path.to_string(),
                        line: raw.to_string(),
                    });
                }
                idx += 1;
            }
            require_path(path, ADD)?;
            operations.push(PatchOperation::Add {
                path: path.to_string(),
                lines: added,
            });
            counts.add += 1;
            continue;
        }

        if let Some(path) = header_path(line, DELETE) {
            require_path(path, DELETE)?;
            operations.push(PatchOperation::Delete { path: path.to_string() });
            counts.delete += 1;
            idx += 1;
            continue;
        }

        if let Some(path) = header_path(line, UPDATE) {
            require_path(path, UPDATE)?;
            idx += 1;
            let mut move_to = None;
            if let Some(target) = body.get(idx).and_then(|l| header_path(l, MOVE)) {
                require_path(target, MOVE)?;
                move_to = Some(target.to_string());
                counts.moved += 1;
                idx += 1;
            }

            let (hunks, next) = parse_hunks(path, body, idx)?;
            idx = next;
            if hunks.is_empty() {
                return Err(format_err(format!("Update File section for {} has no hunks", path)));
            }
            operations.push(PatchOperation::Update {
                path: path.to_string(),
                move_to,
                hunks,
            });
            counts.update += 1;
            continue;
        }

        return Err(format_err(format!(
            "unknown patch operation line: '{}'. Expected '*** Add File:', '*** Delete File:' or '*** Update File:'",
            line
        )));
    }

    if operations.is_empty() {
        return Err(format_err("patch contains no operations"));
    }
    debug!(%counts, "parse_patch: parsed");
    Ok(Patch { operations, counts })
}

fn require_path(path: &str, header: &str) -> Result<(), ParseError> {
    if path.is_empty() {
        return Err(format_err(format!("'{}' header is missing a path", header)));
    }
    Ok(())
}

fn parse_hunks(path: &str, body: &[&str], mut idx: usize) -> Result<(Vec<Hunk>, usize), ParseError> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;
    let mut blanks = 0usize;

    while idx < body.len() && !is_operation_start(body[idx]) {
        let raw = body[idx];
        idx += 1;

        if raw.starts_with("@@") {
            if let Some(hunk) = current.take() {
                push_hunk(&mut hunks, hunk);
            }
            blanks = 0;
            current = Some(Hunk {
                anchor: parse_anchor(raw),
                lines: Vec::new(),
                end_of_file: false,
            });
            continue;
        }

        if raw.trim_end() == END_OF_FILE {
            if let Some(hunk) = current.as_mut() {
                hunk.end_of_file = true;
            }
            blanks = 0;
            continue;
        }

        if raw.is_empty() {
            blanks += 1;
            continue;
        }

        let (prefix, rest) = raw.split_at(raw.chars().next().map_or(0, char::len_utf8));
        let parsed = match prefix {
            " " => HunkLine::Context(rest.to_string()),
            "-" => HunkLine::Remove(rest.to_string()),
            "+" => HunkLine::Add(rest.to_string()),
            _ => {
                return Err(ParseError::UnexpectedLine {
                    path: path.to_string(),
                    line: raw.to_string(),
                });
            }
        };

        // an update may start straight with hunk lines, no `@@` header
        let hunk = current.get_or_insert_with(|| Hunk {
            anchor: None,
            lines: Vec::new(),
            end_of_file: false,
        });
        hunk.lines
            .extend(std::iter::repeat_n(HunkLine::Context(String::new()), blanks));
        blanks = 0;
        hunk.lines.push(parsed);
    }

    if let Some(hunk) = current {
        push_hunk(&mut hunks, hunk);
    }
    Ok((hunks, idx))
}

fn push_hunk(hunks: &mut Vec<Hunk>, hunk: Hunk) {
    if !hunk.lines.is_empty() {
        hunks.push(hunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_update() {
        let patch = "\
*** Begin Patch
*** Update File: a.txt
@@ replace
-one
+two
*** End Patch";

        let parsed = parse_patch(patch).unwrap();
        assert_eq!(parsed.operations.len(), 1);
        assert_eq!(parsed.counts.update, 1);
        let PatchOperation::Update { path, hunks, move_to } = &parsed.operations[0] else {
            panic!("expected update");
        };
        assert_eq!(path, "a.txt");
        assert!(move_to.is_none());
        assert_eq!(hunks[0].anchor.as_deref(), Some("replace"));
        assert_eq!(hunks[0].old_lines(), vec!["one"]);
        assert_eq!(hunks[0].new_lines(), vec!["two"]);
    }

    #[test]
    fn test_parse_all_operations() {
        let patch = "\
*** Begin Patch
*** Add File: new.txt
+hello

+world
*** Delete File: old.txt
*** Update File: src/a.rs
*** Move to: src/b.rs
@@ -1,2 +1,2 @@
 fn main() {
-    old();
+    new();
*** End of File
*** End Patch
";
        let parsed = parse_patch(patch).unwrap();
        assert_eq!(parsed.counts, OpCounts { add: 1, update: 1, delete: 1, moved: 1 });
        assert_eq!(
            parsed.operations[0],
            PatchOperation::Add {
                path: "new.txt".to_string(),
                lines: vec!["hello".to_string(), String::new(), "world".to_string()],
            }
        );
        let PatchOperation::Update { move_to, hunks, .. } = &parsed.operations[2] else {
            panic!("expected update");
        };
        assert_eq!(move_to.as_deref(), Some("src/b.rs"));
        assert!(hunks[0].anchor.is_none());
        assert!(hunks[0].end_of_file);
    }

    #[test]
    fn test_implicit_hunk_and_trailing_blanks() {
        let patch = "*** Begin Patch\r\n*** Update File: a.txt\r\n a\r\n\r\n-b\r\n+c\r\n\r\n*** End Patch\r\n";
        let parsed = parse_patch(patch).unwrap();
        let PatchOperation::Update { hunks, .. } = &parsed.operations[0] else {
            panic!("expected update");
        };
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old_lines(), vec!["a", "", "b"]);
        assert_eq!(hunks[0].lines.len(), 4);
    }

    #[test]
    fn test_missing_envelope() {
        let err = parse_patch("*** Update File: a.txt\n-a\n+b\n").unwrap_err();
        assert_eq!(err.code(), "invalid_patch_format");
        assert!(err.to_string().contains("*** Begin Patch"));

        let err = parse_patch("*** Begin Patch\n*** Update File: a.txt\n-a\n+b\n").unwrap_err();
        assert!(err.to_string().contains("*** End Patch"));

        assert_eq!(parse_patch("").unwrap_err().code(), "invalid_patch_format");
    }

    #[test]
    fn test_unexpected_line() {
        let err = parse_patch("*** Begin Patch\n*** Update File: a.txt\n@@\n a\n>b\n*** End Patch").unwrap_err();
        assert_eq!(err.code(), "unexpected_patch_line");
        assert!(err.to_string().contains("'>b'"));
    }

    #[test]
    fn test_invalid_add_line() {
        let err = parse_patch("*** Begin Patch\n*** Add File: n.txt\nhello\n*** End Patch").unwrap_err();
        assert_eq!(err.code(), "invalid_add_line");
    }

    #[test]
    fn test_update_without_hunks() {
        let err = parse_patch("*** Begin Patch\n*** Update File: a.txt\n*** End Patch").unwrap_err();
        assert!(err.to_string().contains("has no hunks"));
    }

    #[test]
    fn test_parse_anchor() {
        assert_eq!(parse_anchor("@@ def handler():"), Some("def handler():".to_string()));
        assert_eq!(parse_anchor("@@"), None);
        assert_eq!(parse_anchor("@@ -10,4 +10,5 @@"), None);
        assert_eq!(parse_anchor("@@ class Foo @@"), Some("class Foo".to_string()));
    }
}
