//! Configuration types for toolexec

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::hooks::FeedbackRule;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level when RUST_LOG is not set
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    pub sandbox: SandboxConfig,

    pub limits: LimitsConfig,

    pub escalation: EscalationConfig,

    pub feedback: FeedbackConfig,

    pub session: SessionConfig,

    pub shell: ShellConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: ./toolexec.yml
        let local_config = PathBuf::from("toolexec.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/toolexec/toolexec.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("toolexec").join("toolexec.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

/// Sandbox root behaviour and test-file classification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Glob patterns marking test files. Patterns without a `/` match the file
    /// name, others match any trailing part of the sandbox-relative path.
    #[serde(rename = "test-patterns")]
    pub test_patterns: Vec<String>,

    /// Allow write/edit/patch on test files
    #[serde(rename = "allow-test-edits")]
    pub allow_test_edits: bool,

    /// Search the tree for a unique basename when a read path is missing
    #[serde(rename = "autocorrect-paths")]
    pub autocorrect_paths: bool,

    /// Directory names skipped by search and auto-correction
    #[serde(rename = "ignore-dirs")]
    pub ignore_dirs: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            test_patterns: [
                "test_*.py",
                "*_test.py",
                "conftest.py",
                "*_test.go",
                "*.test.js",
                "*.test.ts",
                "*.test.jsx",
                "*.test.tsx",
                "*.spec.js",
                "*.spec.ts",
                "*Test.java",
                "*_spec.rb",
                "tests/**",
                "test/**",
                "__tests__/**",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            allow_test_edits: false,
            autocorrect_paths: true,
            ignore_dirs: [".git", "node_modules", "__pycache__", "target", ".toolexec"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Output and size limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest file read whole, in bytes
    #[serde(rename = "max-file-size")]
    pub max_file_size: u64,

    #[serde(rename = "default-read-limit")]
    pub default_read_limit: usize,

    #[serde(rename = "max-line-length")]
    pub max_line_length: usize,

    #[serde(rename = "batch-read-max")]
    pub batch_read_max: usize,

    /// Hard cap on glob/grep/ls results
    #[serde(rename = "search-cap")]
    pub search_cap: usize,

    /// FileVersion cache entries kept per session
    #[serde(rename = "version-cache-size")]
    pub version_cache_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: 250 * 1024,
            default_read_limit: 2000,
            max_line_length: 2000,
            batch_read_max: 10,
            search_cap: 100,
            version_cache_size: 200,
        }
    }
}

/// No-op and edit escalation knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Consecutive no-op-only turns before the session signals stop
    #[serde(rename = "noop-turn-limit")]
    pub noop_turn_limit: u32,

    /// Successful edits per file after which acknowledgments go minimal
    #[serde(rename = "edit-cap")]
    pub edit_cap: Option<u32>,

    /// Acknowledgment used past the edit cap
    #[serde(rename = "edit-cap-message")]
    pub edit_cap_message: String,

    #[serde(rename = "require-read-before-edit")]
    pub require_read_before_edit: bool,

    #[serde(rename = "syntax-guard")]
    pub syntax_guard: bool,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            noop_turn_limit: 3,
            edit_cap: None,
            edit_cap_message: "ok".to_string(),
            require_read_before_edit: false,
            syntax_guard: true,
        }
    }
}

/// Feedback rule engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub enabled: bool,

    /// Extra rules, consulted before the built-in table
    pub rules: Vec<FeedbackRule>,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: Vec::new(),
        }
    }
}

/// Session persistence and event logging
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory for session snapshot files
    #[serde(rename = "store-dir")]
    pub store_dir: Option<PathBuf>,

    /// JSONL file receiving every hook event
    #[serde(rename = "log-events")]
    pub log_events: Option<PathBuf>,
}

/// The optional `shell` tool and its sandbox policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Register the shell tool with the standard executor
    pub enabled: bool,

    #[serde(rename = "default-timeout-ms")]
    pub default_timeout_ms: u64,

    #[serde(rename = "max-timeout-ms")]
    pub max_timeout_ms: u64,

    /// Combined stdout/stderr kept; the middle is elided past this
    #[serde(rename = "max-output-chars")]
    pub max_output_chars: usize,

    /// Bare command names the shell may run
    #[serde(rename = "allowed-commands")]
    pub allowed_commands: Vec<String>,

    /// Refuse commands that mention running tests
    #[serde(rename = "block-test-commands")]
    pub block_test_commands: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_timeout_ms: 30_000,
            max_timeout_ms: 10 * 60 * 1000,
            max_output_chars: 30_000,
            allowed_commands: [
                "python", "python3", "node", "ls", "cat", "head", "tail", "wc", "sort", "uniq", "tr", "cut", "tee",
                "echo", "printf", "true", "false", "test", "expr", "cp", "mv", "mkdir", "touch", "chmod", "dirname",
                "basename", "realpath", "find", "xargs", "grep", "egrep", "fgrep", "rg", "ag", "sed", "awk", "diff",
                "patch", "git", "npm", "npx", "yarn", "pnpm", "pip", "pip3", "cargo", "make", "go", "rustc", "javac",
                "java", "gcc", "g++", "clang", "clang++", "env", "which", "file", "stat", "du", "df", "uname", "date",
                "whoami",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            block_test_commands: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.limits.search_cap, 100);
        assert_eq!(config.limits.version_cache_size, 200);
        assert_eq!(config.escalation.noop_turn_limit, 3);
        assert!(config.escalation.edit_cap.is_none());
        assert!(config.sandbox.ignore_dirs.contains(&".git".to_string()));
        assert!(config.feedback.enabled);
    }

    #[test]
    fn test_parse_yaml_kebab_case() {
        let yaml = r#"
log-level: debug
sandbox:
  allow-test-edits: true
limits:
  search-cap: 5
escalation:
  edit-cap: 4
  edit-cap-message: "done"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(config.sandbox.allow_test_edits);
        assert_eq!(config.limits.search_cap, 5);
        assert_eq!(config.limits.default_read_limit, 2000);
        assert_eq!(config.escalation.edit_cap, Some(4));
        assert_eq!(config.escalation.edit_cap_message, "done");
        assert_eq!(config.escalation.noop_turn_limit, 3);
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toolexec.yml");
        fs::write(&path, "limits:\n  batch-read-max: 3\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.limits.batch_read_max, 3);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/toolexec.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
