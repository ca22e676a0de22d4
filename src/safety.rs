//! Path normalization for names reported by archivers.
//!
//! Tools print member names verbatim, including absolute paths and `..`
//! components. Everything that ends up in the tree or gets joined onto a
//! local directory goes through [`sanitize_entry_path`] first.

use std::path::{Component, Path, PathBuf};

/// Turn a tool-reported name into a safe relative path using `/` separators.
///
/// Leading roots, `.` and `..` components and empty segments are dropped, and
/// backslashes are treated as separators. Returns `None` when nothing is left.
pub fn sanitize_entry_path(raw: &str) -> Option<String> {
    let segments: Vec<&str> = raw
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Whether a raw name ends with a path separator (directory convention).
pub fn has_trailing_separator(raw: &str) -> bool {
    raw.ends_with('/') || raw.ends_with('\\')
}

/// Join an archive-relative path onto `root`, refusing anything that would
/// escape it.
pub fn contained_join(root: &Path, relative: &str) -> Option<PathBuf> {
    let clean = sanitize_entry_path(relative)?;
    let joined = root.join(&clean);
    let escapes = Path::new(&clean)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    (!escapes).then_some(joined)
}
