//! Hunk-based patches: parsing, context matching and in-memory application
//!
//! Filesystem effects (staging, commit, restore) live in the `apply_patch`
//! tool; everything here is pure.

mod apply;
mod matching;
mod parser;
mod types;

pub(crate) use apply::{leading_whitespace, reindent};
pub use apply::{Applied, HunkError, apply_hunks, split_content_lines};
pub use matching::{Located, MatchFailure, Needle, Tier, find_all, find_anchor, locate, normalize_line};
pub use parser::{ParseError, parse_patch};
pub use types::{Hunk, HunkLine, OpCounts, Patch, PatchOperation};
