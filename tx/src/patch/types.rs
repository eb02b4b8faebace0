//! Parsed patch model

use std::fmt;

/// Per-operation tallies for a parsed patch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpCounts {
    pub add: usize,
    pub update: usize,
    pub delete: usize,
    pub moved: usize,
}

impl fmt::Display for OpCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "add={} update={} delete={} move={}",
            self.add, self.update, self.delete, self.moved
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub operations: Vec<PatchOperation>,
    pub counts: OpCounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOperation {
    Add {
        path: String,
        lines: Vec<String>,
    },
    Delete {
        path: String,
    },
    Update {
        path: String,
        move_to: Option<String>,
        hunks: Vec<Hunk>,
    },
}

impl PatchOperation {
    /// Path named in the operation header
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Delete { path } | Self::Update { path, .. } => path,
        }
    }

    /// Content of an added file, newline-terminated
    pub fn added_content(lines: &[String]) -> String {
        if lines.is_empty() {
            return String::new();
        }
        let mut content = lines.join("\n");
        content.push('\n');
        content
    }
}

/// One `@@` section of an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// Text after `@@`, used to narrow where the hunk applies
    pub anchor: Option<String>,
    pub lines: Vec<HunkLine>,
    /// Context must sit at the end of the file
    pub end_of_file: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

impl Hunk {
    /// Lines the hunk expects to find (context and removals)
    pub fn old_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                HunkLine::Context(text) | HunkLine::Remove(text) => Some(text.clone()),
                HunkLine::Add(_) => None,
            })
            .collect()
    }

    /// Lines the hunk leaves behind (context and additions)
    pub fn new_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                HunkLine::Context(text) | HunkLine::Add(text) => Some(text.clone()),
                HunkLine::Remove(_) => None,
            })
            .collect()
    }

    /// First context or removed line, for error messages
    pub fn first_expected(&self) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            HunkLine::Context(text) | HunkLine::Remove(text) => Some(text.as_str()),
            HunkLine::Add(_) => None,
        })
    }

    pub fn added(&self) -> usize {
        self.lines.iter().filter(|l| matches!(l, HunkLine::Add(_))).count()
    }

    pub fn removed(&self) -> usize {
        self.lines.iter().filter(|l| matches!(l, HunkLine::Remove(_))).count()
    }
}
