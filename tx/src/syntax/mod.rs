//! Syntax guard - rejects edits that break a previously valid file
//!
//! Structured formats are checked with their real parsers. Source files get a
//! delimiter-balance pass that understands strings and comments well enough to
//! catch the usual damage from a bad snippet replacement: a dropped brace, an
//! unterminated string, a stray closer.

use std::path::Path;
use tracing::debug;

/// Languages the guard knows how to check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Json,
    Yaml,
    Toml,
    Rust,
    CLike,
    JavaScript,
    Go,
    Python,
}

impl Language {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        let lang = match ext.as_str() {
            "json" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            "toml" => Self::Toml,
            "rs" => Self::Rust,
            "c" | "h" | "cc" | "cpp" | "cxx" | "hpp" | "java" | "cs" | "kt" | "scala" | "swift" | "css" => Self::CLike,
            "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" | "php" => Self::JavaScript,
            "go" => Self::Go,
            "py" | "pyi" => Self::Python,
            _ => return None,
        };
        Some(lang)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Yaml => "YAML",
            Self::Toml => "TOML",
            Self::Rust => "Rust",
            Self::CLike => "C-family source",
            Self::JavaScript => "JavaScript/TypeScript",
            Self::Go => "Go",
            Self::Python => "Python",
        }
    }
}

/// Why a guarded change was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxRejection {
    pub language: &'static str,
    pub reason: String,
}

/// Check `content` as the language implied by `path`
pub fn check(path: &Path, content: &str) -> Result<(), String> {
    match Language::from_path(path) {
        Some(lang) => check_language(lang, content),
        None => Ok(()),
    }
}

pub fn check_language(lang: Language, content: &str) -> Result<(), String> {
    match lang {
        Language::Json => {
            if content.trim().is_empty() {
                return Ok(());
            }
            serde_json::from_str::<serde::de::IgnoredAny>(content)
                .map(|_| ())
                .map_err(|e| e.to_string())
        }
        Language::Yaml => serde_yaml::from_str::<serde_yaml::Value>(content)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Language::Toml => toml::from_str::<toml::Table>(content).map(|_| ()).map_err(|e| e.message().to_string()),
        Language::Python => Lexer::python().check(content),
        Language::Rust => Lexer::rust().check(content),
        Language::JavaScript => Lexer::javascript().check(content),
        Language::Go => Lexer::go().check(content),
        Language::CLike => Lexer::c_like().check(content),
    }
}

/// Guard a change from `before` to `after`.
///
/// A file that did not parse before is never blocked, so broken files can
/// still be repaired one edit at a time.
pub fn guard(path: &Path, before: Option<&str>, after: &str) -> Result<(), SyntaxRejection> {
    let Some(lang) = Language::from_path(path) else {
        return Ok(());
    };
    if let Some(before) = before
        && check_language(lang, before).is_err()
    {
        debug!(?path, "guard: file was already invalid, not blocking");
        return Ok(());
    }
    check_language(lang, after).map_err(|reason| {
        debug!(?path, %reason, "guard: change rejected");
        SyntaxRejection {
            language: lang.name(),
            reason,
        }
    })
}

/// Delimiter-balance lexer configuration
struct Lexer {
    line_comment: &'static [&'static str],
    block_comment: bool,
    single_quote_strings: bool,
    backtick_strings: bool,
    triple_quotes: bool,
    rust_raw_strings: bool,
}

impl Lexer {
    fn rust() -> Self {
        Self {
            line_comment: &["//"],
            block_comment: true,
            single_quote_strings: false,
            backtick_strings: false,
            triple_quotes: false,
            rust_raw_strings: true,
        }
    }

    fn c_like() -> Self {
        Self {
            line_comment: &["//"],
            block_comment: true,
            single_quote_strings: false,
            backtick_strings: false,
            triple_quotes: false,
            rust_raw_strings: false,
        }
    }

    fn javascript() -> Self {
        Self {
            line_comment: &["//"],
            block_comment: true,
            single_quote_strings: true,
            backtick_strings: true,
            triple_quotes: false,
            rust_raw_strings: false,
        }
    }

    fn go() -> Self {
        Self {
            backtick_strings: true,
            ..Self::c_like()
        }
    }

    fn python() -> Self {
        Self {
            line_comment: &["#"],
            block_comment: false,
            single_quote_strings: true,
            backtick_strings: false,
            triple_quotes: true,
            rust_raw_strings: false,
        }
    }

    fn check(&self, content: &str) -> Result<(), String> {
        let chars: Vec<char> = content.chars().collect();
        let mut stack: Vec<(char, usize)> = Vec::new();
        let mut line = 1usize;
        let mut i = 0usize;

        let starts_with = |i: usize, pat: &str| pat.chars().enumerate().all(|(k, c)| chars.get(i + k) == Some(&c));

        while i < chars.len() {
            let ch = chars[i];

            if ch == '\n' {
                line += 1;
                i += 1;
                continue;
            }

            if self.line_comment.iter().any(|pat| starts_with(i, pat)) {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }

            if self.block_comment && starts_with(i, "/*") {
                let start_line = line;
                i += 2;
                loop {
                    if i >= chars.len() {
                        return Err(format!("unterminated block comment starting at line {}", start_line));
                    }
                    if starts_with(i, "*/") {
                        i += 2;
                        break;
                    }
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
                continue;
            }

            if self.rust_raw_strings
                && ch == 'r'
                && (i == 0 || !(chars[i - 1].is_alphanumeric() || chars[i - 1] == '_'))
            {
                let mut j = i + 1;
                while chars.get(j) == Some(&'#') {
                    j += 1;
                }
                if chars.get(j) == Some(&'"') {
                    let hashes = j - i - 1;
                    let start_line = line;
                    i = j + 1;
                    loop {
                        if i >= chars.len() {
                            return Err(format!("unterminated raw string starting at line {}", start_line));
                        }
                        if chars[i] == '"' && (1..=hashes).all(|k| chars.get(i + k) == Some(&'#')) {
                            i += 1 + hashes;
                            break;
                        }
                        if chars[i] == '\n' {
                            line += 1;
                        }
                        i += 1;
                    }
                    continue;
                }
            }

            if self.triple_quotes && (starts_with(i, "\"\"\"") || starts_with(i, "'''")) {
                let quote: String = chars[i..i + 3].iter().collect();
                let start_line = line;
                i += 3;
                loop {
                    if i >= chars.len() {
                        return Err(format!("unterminated triple-quoted string starting at line {}", start_line));
                    }
                    if chars[i] == '\\' {
                        i += 2;
                        continue;
                    }
                    if starts_with(i, &quote) {
                        i += 3;
                        break;
                    }
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
                continue;
            }

            let is_string_quote =
                ch == '"' || (ch == '\'' && self.single_quote_strings) || (ch == '`' && self.backtick_strings);
            if is_string_quote {
                let start_line = line;
                let multiline = ch == '`';
                i += 1;
                loop {
                    if i >= chars.len() {
                        return Err(format!("unterminated string starting at line {}", start_line));
                    }
                    let c = chars[i];
                    if c == '\\' {
                        if chars.get(i + 1) == Some(&'\n') {
                            line += 1;
                        }
                        i += 2;
                        continue;
                    }
                    if c == ch {
                        i += 1;
                        break;
                    }
                    if c == '\n' {
                        // only Rust lets ordinary strings span lines
                        if !multiline && !self.rust_raw_strings {
                            return Err(format!("unterminated string starting at line {}", start_line));
                        }
                        line += 1;
                    }
                    i += 1;
                }
                continue;
            }

            if ch == '\'' && !self.single_quote_strings {
                // char literal like 'x' or '\n'; anything else is a lifetime or label
                if let Some(len) = char_literal_len(&chars[i..]) {
                    i += len;
                    continue;
                }
                i += 1;
                continue;
            }

            match ch {
                '(' | '[' | '{' => stack.push((ch, line)),
                ')' | ']' | '}' => {
                    let expected = match ch {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        Some((open, open_line)) => {
                            return Err(format!(
                                "'{}' at line {} does not close '{}' opened at line {}",
                                ch, line, open, open_line
                            ));
                        }
                        None => return Err(format!("unexpected '{}' at line {}", ch, line)),
                    }
                }
                _ => {}
            }
            i += 1;
        }

        match stack.pop() {
            Some((open, open_line)) => Err(format!("unclosed '{}' opened at line {}", open, open_line)),
            None => Ok(()),
        }
    }
}

fn char_literal_len(chars: &[char]) -> Option<usize> {
    match chars {
        ['\'', '\\', 'u', '{', rest @ ..] => rest.iter().position(|c| *c == '}').and_then(|p| {
            (rest.get(p + 1) == Some(&'\'')).then_some(4 + p + 2)
        }),
        ['\'', '\\', _, '\'', ..] => Some(4),
        ['\'', '\\', 'x', _, _, '\'', ..] => Some(6),
        ['\'', c, '\'', ..] if *c != '\\' => Some(3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_path(Path::new("a/b.rs")), Some(Language::Rust));
        assert_eq!(Language::from_path(Path::new("x.YML")), Some(Language::Yaml));
        assert_eq!(Language::from_path(Path::new("notes.txt")), None);
        assert_eq!(Language::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_structured_formats() {
        assert!(check(Path::new("a.json"), r#"{"a": [1, 2]}"#).is_ok());
        assert!(check(Path::new("a.json"), r#"{"a": [1, 2}"#).is_err());
        assert!(check(Path::new("a.toml"), "[package]\nname = \"x\"\n").is_ok());
        assert!(check(Path::new("a.toml"), "[package\nname = \"x\"\n").is_err());
        assert!(check(Path::new("a.yaml"), "a: 1\nb: [1, 2]\n").is_ok());
        assert!(check(Path::new("a.yaml"), "a: [1, 2\n").is_err());
    }

    #[test]
    fn test_rust_balance() {
        let ok = "fn main() {\n    let s = \"}\"; // }\n    let c = '{';\n    let r = r#\"{\"#;\n}\nfn f<'a>(x: &'a str) -> &'a str { x }\n";
        assert!(check(Path::new("m.rs"), ok).is_ok());

        let err = check(Path::new("m.rs"), "fn main() {\n    if x {\n}\n").unwrap_err();
        assert!(err.contains("unclosed '{'"));

        let err = check(Path::new("m.rs"), "fn main() {\n}\n}\n").unwrap_err();
        assert!(err.contains("unexpected '}' at line 3"));
    }

    #[test]
    fn test_python_strings_and_comments() {
        let ok = "def f(x):\n    # (\n    s = '''(\n'''\n    return [x, \"]\"]\n";
        assert!(check(Path::new("a.py"), ok).is_ok());
        assert!(check(Path::new("a.py"), "def f(x:\n    return x\n").is_err());
        assert!(check(Path::new("a.py"), "s = 'abc\n").is_err());
    }

    #[test]
    fn test_javascript_template_and_block_comment() {
        let ok = "const a = `{${x}`;\n/* { */\nfunction f() { return 'a}'; }\n";
        assert!(check(Path::new("a.js"), ok).is_ok());
        assert!(check(Path::new("a.ts"), "function f() {\n  return [1, 2;\n}\n").is_err());
    }

    #[test]
    fn test_guard_blocks_only_newly_broken() {
        let path = Path::new("cfg.json");
        let rejection = guard(path, Some("{\"a\": 1}"), "{\"a\": 1").unwrap_err();
        assert_eq!(rejection.language, "JSON");

        // already broken before: never blocked
        assert!(guard(path, Some("{\"a\": "), "{\"a\": 2").is_ok());
        // unknown language
        assert!(guard(Path::new("x.txt"), Some("a"), "{{{").is_ok());
        // new file
        assert!(guard(path, None, "{}").is_ok());
    }
}
