//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - Production code does its I/O asynchronously
//! - Library code returns errors instead of panicking
//! - No sleep() in production code
//!
//! The helpers here find production sources and decide, line by line,
//! whether a line belongs to test code or to which kind of function.

use std::fs;
use std::path::{Path, PathBuf};

/// Source trees checked by the policies, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["scribe/core/src", "scribe/cli/src"];

/// Workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// A production source file, already split into lines
pub struct SourceFile {
    /// Path as shown in violation reports
    pub path: PathBuf,
    /// File content
    pub content: String,
}

impl SourceFile {
    /// Lines of the file
    pub fn lines(&self) -> Vec<&str> {
        self.content.lines().collect()
    }

    /// Format a violation at zero-based line `idx`
    pub fn violation(&self, idx: usize, what: &str, line: &str) -> String {
        format!("{}:{} - {}: {}", self.path.display(), idx + 1, what, line.trim())
    }
}

/// All `.rs` files under `dir` (relative to the workspace root)
pub fn rust_sources(dir: &str) -> Vec<SourceFile> {
    let root = workspace_root();
    let path = root.join(dir);
    if !path.exists() {
        return Vec::new();
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(&path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
            continue;
        }
        if let Ok(content) = fs::read_to_string(entry.path()) {
            let shown = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_path_buf();
            files.push(SourceFile {
                path: shown,
                content,
            });
        }
    }
    files
}

/// Code part of a line, without trailing `//` comments.
///
/// Returns an empty string for doc and comment lines.
pub fn code_part(line: &str) -> &str {
    let trimmed = line.trim_start();
    if trimmed.starts_with("//") {
        return "";
    }
    line.split("//").next().unwrap_or(line)
}

/// Index of the first `#[cfg(test)]` line; everything after it is test code
pub fn test_module_start(lines: &[&str]) -> usize {
    lines
        .iter()
        .position(|l| l.trim() == "#[cfg(test)]")
        .unwrap_or(lines.len())
}

/// Check if line is inside a test function
pub fn is_in_test_function(lines: &[&str], current_idx: usize) -> bool {
    if current_idx >= test_module_start(lines) {
        return true;
    }

    let Some(fn_idx) = enclosing_fn(lines, current_idx) else {
        return false;
    };

    // Attributes directly above the signature
    for i in (0..fn_idx).rev() {
        let line = lines[i].trim();
        if line.starts_with("#[test]") || line.starts_with("#[tokio::test") {
            return true;
        }
        if !(line.starts_with("#[") || line.starts_with("///")) {
            break;
        }
    }
    false
}

/// Check if line is inside an `async fn`
pub fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    enclosing_fn(lines, current_idx).is_some_and(|i| lines[i].contains("async fn"))
}

/// Check if line is inside a plain (non-async) `fn`
pub fn is_in_non_async_function(lines: &[&str], current_idx: usize) -> bool {
    enclosing_fn(lines, current_idx).is_some_and(|i| !lines[i].contains("async fn"))
}

/// Nearest function signature at or above `current_idx`
fn enclosing_fn(lines: &[&str], current_idx: usize) -> Option<usize> {
    for i in (0..=current_idx.min(lines.len().saturating_sub(1))).rev() {
        let line = code_part(lines[i]).trim();

        if line.starts_with("fn ") || line.contains(" fn ") {
            return Some(i);
        }

        // Stop at module boundaries
        if line.starts_with("mod ") || line.starts_with("pub mod ") {
            return None;
        }
        if (line.starts_with("impl ") || line.starts_with("impl<")) && line.contains('{') {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
fn setup() {
    let x = 1;
}

async fn serve() {
    let y = 2;
}

#[tokio::test]
async fn test_serve() {
    let z = 3;
}

#[cfg(test)]
mod tests {
    fn helper() {}
}
";

    #[test]
    fn test_function_classification() {
        let lines: Vec<&str> = SAMPLE.lines().collect();

        assert!(is_in_non_async_function(&lines, 1));
        assert!(!is_in_async_function(&lines, 1));
        assert!(is_in_async_function(&lines, 5));
        assert!(!is_in_test_function(&lines, 5));
        assert!(is_in_test_function(&lines, 10));
        assert!(is_in_test_function(&lines, 15));
    }

    #[test]
    fn test_code_part() {
        assert_eq!(code_part("    /// x.unwrap()"), "");
        assert_eq!(code_part("let a = b; // note"), "let a = b; ");
    }

    #[test]
    fn test_workspace_root_has_production_dirs() {
        let root = workspace_root();
        for dir in PRODUCTION_DIRS {
            assert!(root.join(dir).exists(), "{dir} missing under {}", root.display());
        }
    }
}
