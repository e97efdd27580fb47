//! Path validation and workspace boundary enforcement.
//!
//! Validation runs in three stages: a pre-normalisation suspicion screen
//! (traversal sequences, backslashes on non-Windows platforms,
//! percent-encoded traversal up to three decode rounds), resolution
//! against the workspace root following symlinks, and ignore-pattern
//! filtering from `.gambiarraignore` plus a fixed default set.

use globset::{Glob, GlobMatcher};
use serde_json::{Map, Value, json};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the workspace-root ignore file.
pub const IGNORE_FILE: &str = ".gambiarraignore";

/// Patterns applied on top of `.gambiarraignore`.
const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git/**",
    ".git",
    "node_modules/**",
    "node_modules",
    "__pycache__/**",
    "__pycache__",
    "*.pyc",
    "*.pyo",
    ".env",
    ".env.*",
    "*.log",
    ".DS_Store",
    "Thumbs.db",
];

/// Percent-encoded sequences that indicate a traversal attempt even
/// before decoding.
const ENCODED_TRAVERSAL: &[&str] = &["%2e%2e", "%252e%252e", "%c0%af", "%c0%5c"];

/// Maximum URL-decode rounds applied during the suspicion screen.
const DECODE_ROUNDS: usize = 3;

/// A path was rejected by the sandbox.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SecurityViolation {
    /// Human-readable explanation naming the rule that fired.
    pub message: String,
    /// Structured details for the error frame.
    pub details: Map<String, Value>,
}

impl SecurityViolation {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Map::new(),
        }
    }

    fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

/// Workspace-rooted path sandbox.
#[derive(Debug)]
pub struct PathSandbox {
    root: PathBuf,
    patterns: Vec<(String, GlobMatcher)>,
}

impl PathSandbox {
    /// Create a sandbox for a workspace root, loading `.gambiarraignore`
    /// if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be resolved to an absolute
    /// path.
    pub fn new(workspace_root: &Path) -> std::io::Result<Self> {
        let root = resolve(&std::path::absolute(workspace_root)?);

        let mut lines: Vec<String> = Vec::new();
        let ignore_file = root.join(IGNORE_FILE);
        if let Ok(text) = std::fs::read_to_string(&ignore_file) {
            let loaded: Vec<String> = text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(ToString::to_string)
                .collect();
            debug!(count = loaded.len(), file = %ignore_file.display(), "loaded ignore patterns");
            lines.extend(loaded);
        }
        lines.extend(DEFAULT_IGNORE_PATTERNS.iter().map(ToString::to_string));

        let patterns = lines
            .into_iter()
            .filter_map(|pattern| match Glob::new(&pattern) {
                Ok(glob) => Some((pattern, glob.compile_matcher())),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "skipping invalid ignore pattern");
                    None
                },
            })
            .collect();

        Ok(Self { root, patterns })
    }

    /// The resolved workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate an input path, returning its resolved absolute form.
    ///
    /// # Errors
    ///
    /// Returns a [`SecurityViolation`] naming the rule that rejected the
    /// path.
    pub fn validate(&self, input: &str) -> Result<PathBuf, SecurityViolation> {
        self.screen_suspicious(input)?;

        let candidate = Path::new(input);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let resolved = resolve(&joined);

        let Ok(relative) = resolved.strip_prefix(&self.root) else {
            return Err(SecurityViolation::new(format!(
                "Path traversal detected: '{input}' resolves outside workspace"
            ))
            .with_detail("resolved_path", json!(resolved.display().to_string()))
            .with_detail("workspace_root", json!(self.root.display().to_string())));
        };

        if self.is_ignored(relative) {
            return Err(SecurityViolation::new(format!(
                "Access denied by ignore patterns: '{input}'"
            ))
            .with_detail("relative_path", json!(relative.display().to_string()))
            .with_detail(
                "matching_patterns",
                json!(self.matching_patterns(relative)),
            ));
        }

        Ok(resolved)
    }

    /// Check a workspace-relative path against the ignore patterns,
    /// including every successive prefix so a directory rule blocks its
    /// descendants.
    #[must_use]
    pub fn is_ignored(&self, relative: &Path) -> bool {
        for prefix in prefixes(relative) {
            if self.patterns.iter().any(|(_, m)| m.is_match(&prefix)) {
                return true;
            }
        }
        false
    }

    /// Check an already-validated absolute path against the ignore
    /// patterns.
    #[must_use]
    pub fn is_ignored_abs(&self, absolute: &Path) -> bool {
        absolute
            .strip_prefix(&self.root)
            .map(|relative| self.is_ignored(relative))
            .unwrap_or(true)
    }

    fn matching_patterns(&self, relative: &Path) -> Vec<String> {
        let mut matched = Vec::new();
        for prefix in prefixes(relative) {
            for (pattern, matcher) in &self.patterns {
                if matcher.is_match(&prefix) && !matched.contains(pattern) {
                    matched.push(pattern.clone());
                }
            }
        }
        matched
    }

    /// Reject traversal attempts before any normalisation happens, on the
    /// raw input and on up to three URL-decoded versions of it.
    fn screen_suspicious(&self, input: &str) -> Result<(), SecurityViolation> {
        let mut current = input.to_string();
        for _ in 0..=DECODE_ROUNDS {
            let lower = current.to_lowercase();

            if current.contains("../") || current.contains("..\\") {
                return Err(SecurityViolation::new(format!(
                    "Path traversal detected: suspicious pattern in path '{input}'"
                ))
                .with_detail("reason", json!("Contains directory traversal sequence")));
            }
            // On Windows the backslash is the legitimate separator; only
            // elsewhere is it a smuggling attempt.
            if cfg!(not(windows)) && current.contains('\\') {
                return Err(SecurityViolation::new(format!(
                    "Path traversal detected: suspicious backslash pattern in path '{input}'"
                ))
                .with_detail("reason", json!("Contains Windows-style path separators")));
            }
            for pattern in ENCODED_TRAVERSAL {
                if lower.contains(pattern) {
                    return Err(SecurityViolation::new(format!(
                        "Path traversal detected: encoded suspicious pattern in path '{input}'"
                    ))
                    .with_detail("detected_pattern", json!(pattern))
                    .with_detail("reason", json!("Contains encoded traversal patterns")));
                }
            }

            let decoded =
                String::from_utf8_lossy(&urlencoding::decode_binary(current.as_bytes()))
                    .into_owned();
            if decoded == current {
                break;
            }
            current = decoded;
        }
        Ok(())
    }
}

/// Resolve a path, following symlinks for every prefix that exists.
/// Non-existent trailing components are appended verbatim, so paths that
/// are about to be created still resolve deterministically.
fn resolve(path: &Path) -> PathBuf {
    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            other => {
                resolved.push(other);
                if let Ok(canonical) = resolved.canonicalize() {
                    resolved = canonical;
                }
            },
        }
    }
    resolved
}

/// Successive prefixes of a relative path, rendered with `/` separators.
fn prefixes(relative: &Path) -> Vec<String> {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (1..=parts.len()).map(|i| parts[..i].join("/")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, PathSandbox) {
        let dir = TempDir::new().unwrap();
        let sandbox = PathSandbox::new(dir.path()).unwrap();
        (dir, sandbox)
    }

    #[test]
    fn test_relative_path_resolves_inside_workspace() {
        let (dir, sandbox) = sandbox();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let validated = sandbox.validate("a.txt").unwrap();
        assert!(validated.starts_with(sandbox.root()));
        assert!(validated.ends_with("a.txt"));
    }

    #[test]
    fn test_nonexistent_path_still_validates() {
        let (_dir, sandbox) = sandbox();
        let validated = sandbox.validate("new/deep/file.txt").unwrap();
        assert!(validated.starts_with(sandbox.root()));
    }

    #[test]
    fn test_traversal_sequence_rejected() {
        let (_dir, sandbox) = sandbox();
        let err = sandbox.validate("../../etc/passwd").unwrap_err();
        assert!(err.message.contains("Path traversal detected"));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_backslash_rejected() {
        let (_dir, sandbox) = sandbox();
        assert!(sandbox.validate("sub\\file.txt").is_err());
    }

    #[test]
    fn test_encoded_traversal_rejected() {
        let (_dir, sandbox) = sandbox();
        for input in [
            "%2e%2e/etc/passwd",
            "%252e%252e/etc/passwd",
            "%c0%af../x",
            "%C0%AFetc",
        ] {
            assert!(sandbox.validate(input).is_err(), "{input} should be rejected");
        }
    }

    #[test]
    fn test_double_encoded_traversal_rejected() {
        let (_dir, sandbox) = sandbox();
        // "%252e%252e%252fetc" decodes to "%2e%2e%2fetc" then "../etc"
        assert!(sandbox.validate("%252e%252e%252fetc").is_err());
    }

    #[test]
    fn test_absolute_path_outside_workspace_rejected() {
        let (_dir, sandbox) = sandbox();
        let err = sandbox.validate("/etc/passwd").unwrap_err();
        assert!(err.message.contains("outside workspace"));
    }

    #[test]
    fn test_absolute_path_inside_workspace_accepted() {
        let (dir, sandbox) = sandbox();
        let inside = dir.path().join("inner.txt");
        std::fs::write(&inside, "x").unwrap();
        assert!(sandbox.validate(&inside.to_string_lossy()).is_ok());
    }

    #[test]
    fn test_default_ignore_patterns() {
        let (_dir, sandbox) = sandbox();
        for path in [
            ".git/config",
            "node_modules/pkg/index.js",
            "__pycache__/mod.pyc",
            "app.log",
            ".env",
            ".env.production",
            ".DS_Store",
        ] {
            assert!(sandbox.validate(path).is_err(), "{path} should be ignored");
        }
    }

    #[test]
    fn test_directory_rule_blocks_descendants() {
        let (_dir, sandbox) = sandbox();
        // ".git" has no "/**" in the bare form, but prefix matching blocks
        // arbitrarily deep descendants
        assert!(sandbox.validate(".git/objects/ab/cdef").is_err());
    }

    #[test]
    fn test_gambiarraignore_loaded() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(IGNORE_FILE),
            "# comment\n\nsecrets/**\n*.pem\n",
        )
        .unwrap();
        let sandbox = PathSandbox::new(dir.path()).unwrap();

        assert!(sandbox.validate("secrets/key.txt").is_err());
        assert!(sandbox.validate("server.pem").is_err());
        assert!(sandbox.validate("src/main.rs").is_ok());
    }

    #[test]
    fn test_violation_reports_matching_patterns() {
        let (_dir, sandbox) = sandbox();
        let err = sandbox.validate(".env").unwrap_err();
        let patterns = err.details["matching_patterns"].as_array().unwrap();
        assert!(patterns.iter().any(|p| p == ".env"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s").unwrap();

        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let sandbox = PathSandbox::new(dir.path()).unwrap();

        assert!(sandbox.validate("link/secret.txt").is_err());
    }
}
