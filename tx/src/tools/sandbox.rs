//! Sandbox - path resolution and containment against a fixed root

use glob::{MatchOptions, Pattern};
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::SandboxConfig;

use super::ToolError;

/// Upper bound on entries visited while looking for a corrected path
const AUTOCORRECT_WALK_LIMIT: usize = 50_000;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("path is empty")]
    EmptyPath,

    #[error("path {path} escapes sandbox root {root}")]
    Escape { path: String, root: PathBuf },

    #[error("file not found: {path}")]
    NotFound { path: String },

    #[error("cannot open sandbox root {root}: {source}")]
    Root {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<SandboxError> for ToolError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::EmptyPath => ToolError::validation("missing_path", "path is empty"),
            SandboxError::Escape { path, root } => ToolError::SandboxViolation { path, root },
            SandboxError::NotFound { path } => ToolError::not_found("file_not_found", format!("File not found: {}", path)),
            SandboxError::Root { root, source } => ToolError::io(format!("sandbox root {}", root.display()), source),
        }
    }
}

/// A path that passed containment checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute path under the canonical root
    pub path: PathBuf,
    /// Path relative to the root, `/`-separated
    pub relative: String,
    /// The originally requested path when auto-correction replaced it
    pub corrected_from: Option<String>,
}

impl ResolvedPath {
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Fixed sandbox root plus test-file classification
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    test_patterns: Vec<Pattern>,
    ignore_dirs: Vec<String>,
    autocorrect: bool,
}

impl Sandbox {
    /// Open a sandbox; the root is canonicalized once and fixed afterwards
    pub fn new(root: impl AsRef<Path>, config: &SandboxConfig) -> Result<Self, SandboxError> {
        let root = root.as_ref();
        debug!(?root, "Sandbox::new: called");
        let canonical = root.canonicalize().map_err(|source| SandboxError::Root {
            root: root.to_path_buf(),
            source,
        })?;

        let test_patterns = config
            .test_patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = %p, %e, "Sandbox::new: skipping invalid test pattern");
                    None
                }
            })
            .collect();

        Ok(Self {
            root: canonical,
            test_patterns,
            ignore_dirs: config.ignore_dirs.clone(),
            autocorrect: config.autocorrect_paths,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ignore_dirs(&self) -> &[String] {
        &self.ignore_dirs
    }

    /// Resolve a requested path inside the sandbox.
    ///
    /// Relative paths are joined to the root, `..` is folded lexically and the
    /// longest existing ancestor is canonicalized so symlinks cannot leave the
    /// root. With `must_exist`, a missing file may be auto-corrected to the
    /// unique file in the tree with the same basename.
    pub fn resolve(&self, path: &str, must_exist: bool) -> Result<ResolvedPath, SandboxError> {
        debug!(%path, must_exist, "Sandbox::resolve: called");
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(SandboxError::EmptyPath);
        }

        let resolved = self.contain(trimmed)?;
        if !must_exist || resolved.exists() {
            debug!(?resolved.path, "Sandbox::resolve: resolved");
            return Ok(resolved);
        }

        if self.autocorrect
            && let Some(corrected) = self.autocorrect(&resolved.path)
        {
            debug!(from = %trimmed, to = %corrected.relative, "Sandbox::resolve: auto-corrected");
            return Ok(ResolvedPath {
                corrected_from: Some(trimmed.to_string()),
                ..corrected
            });
        }

        debug!(%trimmed, "Sandbox::resolve: not found");
        Err(SandboxError::NotFound {
            path: trimmed.to_string(),
        })
    }

    fn contain(&self, requested: &str) -> Result<ResolvedPath, SandboxError> {
        let escape = || SandboxError::Escape {
            path: requested.to_string(),
            root: self.root.clone(),
        };

        let candidate = Path::new(requested);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let normalized = normalize_lexically(&joined);

        // Canonicalize the deepest existing ancestor, keep the missing tail
        let mut existing = normalized.as_path();
        let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
        loop {
            if existing.symlink_metadata().is_ok() {
                break;
            }
            match (existing.file_name(), existing.parent()) {
                (Some(name), Some(parent)) => {
                    tail.push(name);
                    existing = parent;
                }
                _ => break,
            }
        }

        let mut real = match existing.canonicalize() {
            Ok(real) => real,
            Err(e) => {
                // A dangling symlink could point anywhere once created
                debug!(?existing, %e, "Sandbox::contain: cannot canonicalize ancestor");
                return Err(escape());
            }
        };
        for name in tail.iter().rev() {
            real.push(name);
        }

        if !real.starts_with(&self.root) {
            debug!(?real, root = ?self.root, "Sandbox::contain: escape detected");
            return Err(escape());
        }

        Ok(ResolvedPath {
            relative: self.relative(&real),
            path: real,
            corrected_from: None,
        })
    }

    /// Sandbox-relative display form of an absolute path under the root
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let text = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        if text.is_empty() { ".".to_string() } else { text }
    }

    fn autocorrect(&self, missing: &Path) -> Option<ResolvedPath> {
        let basename = missing.file_name()?;
        let mut found: Option<PathBuf> = None;

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.is_ignored_dir(e.path()))
            .take(AUTOCORRECT_WALK_LIMIT);
        for entry in walker.flatten() {
            if entry.file_type().is_file() && entry.file_name() == basename {
                if found.is_some() {
                    debug!(?basename, "Sandbox::autocorrect: ambiguous basename");
                    return None;
                }
                found = Some(entry.into_path());
            }
        }

        let path = found?;
        Some(ResolvedPath {
            relative: self.relative(&path),
            path,
            corrected_from: None,
        })
    }

    /// True for directories search and auto-correction should not descend into
    pub fn is_ignored_dir(&self, path: &Path) -> bool {
        if path == self.root {
            return false;
        }
        path.is_dir()
            && path
                .file_name()
                .map(|n| n.to_string_lossy())
                .is_some_and(|n| self.ignore_dirs.iter().any(|d| d == n.as_ref()))
    }

    /// Classify a sandbox path as a test file
    pub fn is_test_file(&self, path: &Path) -> bool {
        let relative = self.relative(path);
        let parts: Vec<&str> = relative.split('/').collect();
        let file_name = parts.last().copied().unwrap_or_default();
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };

        self.test_patterns.iter().any(|pattern| {
            if pattern.as_str().contains('/') {
                // Match any suffix that starts at a component boundary
                (0..parts.len()).any(|i| pattern.matches_with(&parts[i..].join("/"), options))
            } else {
                pattern.matches_with(file_name, options)
            }
        })
    }
}

/// Fold `.` and `..` without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sandbox(root: &Path) -> Sandbox {
        Sandbox::new(root, &SandboxConfig::default()).unwrap()
    }

    #[test]
    fn test_resolve_relative_inside() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "x").unwrap();
        let sb = sandbox(temp.path());

        let resolved = sb.resolve("a.txt", true).unwrap();
        assert_eq!(resolved.relative, "a.txt");
        assert!(resolved.path.starts_with(sb.root()));
        assert!(resolved.corrected_from.is_none());
    }

    #[test]
    fn test_resolve_rejects_parent_escape() {
        let temp = tempdir().unwrap();
        let sb = sandbox(temp.path());

        assert!(matches!(sb.resolve("../outside.txt", false), Err(SandboxError::Escape { .. })));
        assert!(matches!(sb.resolve("a/../../x", false), Err(SandboxError::Escape { .. })));
        assert!(matches!(sb.resolve("/etc/passwd", false), Err(SandboxError::Escape { .. })));
    }

    #[test]
    fn test_resolve_allows_inner_parent_segments() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        let sb = sandbox(temp.path());

        let resolved = sb.resolve("src/../new.txt", false).unwrap();
        assert_eq!(resolved.relative, "new.txt");
    }

    #[test]
    fn test_resolve_absolute_inside_root() {
        let temp = tempdir().unwrap();
        let sb = sandbox(temp.path());
        let abs = temp.path().join("deep/file.rs");

        let resolved = sb.resolve(abs.to_str().unwrap(), false).unwrap();
        assert_eq!(resolved.relative, "deep/file.rs");
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_symlink_escape() {
        let temp = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();
        let sb = sandbox(temp.path());

        assert!(matches!(sb.resolve("link/secret.txt", true), Err(SandboxError::Escape { .. })));
        assert!(matches!(sb.resolve("link/new.txt", false), Err(SandboxError::Escape { .. })));
    }

    #[test]
    fn test_resolve_relative_root() {
        let temp = tempdir().unwrap();
        let cwd = std::env::current_dir().unwrap();
        let Ok(rel_root) = temp.path().strip_prefix(&cwd) else {
            // Temp dir not under cwd; absolute roots are covered elsewhere
            return;
        };
        let sb = sandbox(rel_root);
        assert!(sb.root().is_absolute());
        assert!(matches!(sb.resolve("../x", false), Err(SandboxError::Escape { .. })));
    }

    #[test]
    fn test_autocorrect_unique_basename() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src/util")).unwrap();
        fs::write(temp.path().join("src/util/helpers.py"), "x").unwrap();
        let sb = sandbox(temp.path());

        let resolved = sb.resolve("helpers.py", true).unwrap();
        assert_eq!(resolved.relative, "src/util/helpers.py");
        assert_eq!(resolved.corrected_from.as_deref(), Some("helpers.py"));
    }

    #[test]
    fn test_autocorrect_ambiguous_reports_original() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("a")).unwrap();
        fs::create_dir_all(temp.path().join("b")).unwrap();
        fs::write(temp.path().join("a/mod.py"), "x").unwrap();
        fs::write(temp.path().join("b/mod.py"), "y").unwrap();
        let sb = sandbox(temp.path());

        match sb.resolve("mod.py", true) {
            Err(SandboxError::NotFound { path }) => assert_eq!(path, "mod.py"),
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_autocorrect_skips_ignored_dirs() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("node_modules/pkg")).unwrap();
        fs::write(temp.path().join("node_modules/pkg/index.js"), "x").unwrap();
        let sb = sandbox(temp.path());

        assert!(matches!(sb.resolve("index.js", true), Err(SandboxError::NotFound { .. })));
    }

    #[test]
    fn test_empty_path() {
        let temp = tempdir().unwrap();
        let sb = sandbox(temp.path());
        assert!(matches!(sb.resolve("  ", false), Err(SandboxError::EmptyPath)));
    }

    #[test]
    fn test_is_test_file() {
        let temp = tempdir().unwrap();
        let sb = sandbox(temp.path());
        let root = sb.root().to_path_buf();

        assert!(sb.is_test_file(&root.join("test_app.py")));
        assert!(sb.is_test_file(&root.join("pkg/app_test.go")));
        assert!(sb.is_test_file(&root.join("web/button.spec.ts")));
        assert!(sb.is_test_file(&root.join("tests/integration.rs")));
        assert!(sb.is_test_file(&root.join("crate/tests/it.rs")));
        assert!(!sb.is_test_file(&root.join("src/app.py")));
        assert!(!sb.is_test_file(&root.join("src/testing.rs")));
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(normalize_lexically(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize_lexically(Path::new("/a/../../b")), PathBuf::from("/b"));
    }
}
