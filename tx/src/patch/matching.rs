//! Locating hunk context in file lines

use tracing::debug;

/// How strictly lines are compared; tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Exact,
    TrimEnd,
    Normalized,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Exact, Tier::TrimEnd, Tier::Normalized];

    fn key(&self, line: &str) -> String {
        match self {
            Self::Exact => line.to_string(),
            Self::TrimEnd => line.trim_end().to_string(),
            Self::Normalized => normalize_line(line),
        }
    }
}

/// Why a hunk could not be placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchFailure {
    NotFound,
    /// 0-based start positions of the equally good candidates
    Ambiguous(Vec<usize>),
}

/// Where a hunk applies and how loosely it matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub position: usize,
    pub tier: Tier,
}

/// What a hunk is looking for
#[derive(Debug, Clone, Copy)]
pub struct Needle<'a> {
    pub lines: &'a [String],
    pub anchor: Option<&'a str>,
    pub end_of_file: bool,
}

/// Collapse whitespace runs and fold typographic quotes and dashes to ASCII
pub fn normalize_line(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut saw_whitespace = false;

    for ch in input.chars() {
        if ch.is_whitespace() {
            saw_whitespace = true;
            continue;
        }
        if saw_whitespace && !result.is_empty() {
            result.push(' ');
        }
        saw_whitespace = false;
        result.push(canonical_char(ch));
    }
    result
}

fn canonical_char(ch: char) -> char {
    match ch {
        '\u{2018}' | '\u{2019}' | '\u{02BC}' => '\'',
        '\u{201C}' | '\u{201D}' => '"',
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => '-',
        _ => ch,
    }
}

/// Every start index where `needle` occurs in `haystack` under `tier`
pub fn find_all(haystack: &[String], needle: &[String], tier: Tier) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    let hay: Vec<String> = haystack.iter().map(|l| tier.key(l)).collect();
    let pin: Vec<String> = needle.iter().map(|l| tier.key(l)).collect();
    (0..=hay.len() - pin.len())
        .filter(|&idx| hay[idx..idx + pin.len()] == pin[..])
        .collect()
}

/// First line at or after `from` (else anywhere) containing the anchor text
pub fn find_anchor(haystack: &[String], anchor: &str, from: usize) -> Option<usize> {
    let wanted = normalize_line(anchor);
    if wanted.is_empty() {
        return None;
    }
    let hit = |line: &String| normalize_line(line).contains(&wanted);
    haystack
        .iter()
        .skip(from)
        .position(hit)
        .map(|idx| idx + from)
        .or_else(|| haystack.iter().position(hit))
}

/// Find the single place a hunk applies.
///
/// Tiers are tried strictest first; the first tier with any candidate
/// decides. An anchor narrows the candidates to those at or after the anchor
/// line, and `search_from` narrows them further. The hunk applies only when
/// exactly one candidate is left; anything else is ambiguous.
pub fn locate(haystack: &[String], needle: Needle<'_>, search_from: usize) -> Result<Located, MatchFailure> {
    debug!(lines = needle.lines.len(), ?needle.anchor, needle.end_of_file, search_from, "locate: called");
    for tier in Tier::ALL {
        let mut candidates = find_all(haystack, needle.lines, tier);
        if needle.end_of_file {
            candidates.retain(|&pos| pos + needle.lines.len() == haystack.len());
        }
        if candidates.is_empty() {
            continue;
        }

        if let Some(anchor) = needle.anchor
            && let Some(anchor_at) = find_anchor(haystack, anchor, search_from)
        {
            let after_anchor: Vec<usize> = candidates.iter().copied().filter(|&pos| pos >= anchor_at).collect();
            if !after_anchor.is_empty() {
                debug!(anchor_at, remaining = after_anchor.len(), "locate: anchor narrowed candidates");
                candidates = after_anchor;
            }
        }
        if let [position] = candidates[..] {
            return Ok(Located { position, tier });
        }

        let ahead: Vec<usize> = candidates.iter().copied().filter(|&pos| pos >= search_from).collect();
        if let [position] = ahead[..] {
            return Ok(Located { position, tier });
        }

        debug!(?tier, count = candidates.len(), "locate: ambiguous");
        return Err(MatchFailure::Ambiguous(candidates));
    }
    Err(MatchFailure::NotFound)
}
