//! Root-node removal for extraction
//!
//! The archiver extracts into a hidden staging directory inside the
//! destination; afterwards the subtree below the common root node is moved
//! up into the destination and the staging directory is dropped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::safety::{contained_join, sanitize_entry_path};

pub(crate) fn staging_dir(dest: &Path) -> io::Result<tempfile::TempDir> {
    tempfile::Builder::new().prefix(".arkwrap-").tempdir_in(dest)
}

/// Deepest directory shared by the parents of every id.
///
/// With no ids (whole archive) there is nothing to compare against; the root
/// is then taken from what actually landed in the staging directory.
pub(crate) fn common_root(ids: &[String]) -> Option<String> {
    let mut parents = ids.iter().filter_map(|id| {
        let clean = sanitize_entry_path(id)?;
        let mut segments: Vec<String> = clean.split('/').map(str::to_string).collect();
        segments.pop();
        Some(segments)
    });

    let mut common = parents.next()?;
    for parent in parents {
        let shared = common
            .iter()
            .zip(&parent)
            .take_while(|(a, b)| a == b)
            .count();
        common.truncate(shared);
    }

    (!common.is_empty()).then(|| common.join("/"))
}

/// Single top-level directory of an extracted tree, if that is all there is.
pub(crate) fn sole_directory(staging: &Path) -> io::Result<Option<String>> {
    let mut children = fs::read_dir(staging)?;
    let Some(first) = children.next().transpose()? else {
        return Ok(None);
    };
    if children.next().is_some() || !first.file_type()?.is_dir() {
        return Ok(None);
    }
    Ok(Some(first.file_name().to_string_lossy().into_owned()))
}

/// Move everything below `staging/root` into `dest`. Returns the number of
/// files moved; existing files are skipped unless `overwrite` is set.
pub(crate) fn promote(
    staging: &Path,
    root: Option<&str>,
    dest: &Path,
    overwrite: bool,
) -> io::Result<usize> {
    // Flattened extraction leaves no root node behind
    let source: PathBuf = root
        .and_then(|root| contained_join(staging, root))
        .filter(|p| p.is_dir())
        .unwrap_or_else(|| staging.to_path_buf());

    let mut moved = 0;
    for entry in WalkDir::new(&source).min_depth(1) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(&source)
            .map_err(io::Error::other)?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if target.symlink_metadata().is_ok() {
            if !overwrite {
                log::debug!("keeping existing {}", target.display());
                continue;
            }
            fs::remove_file(&target)?;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(entry.path(), &target)?;
        moved += 1;
    }

    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_root() {
        let ids = vec!["photos/2024/a.jpg".to_string(), "photos/2024/b/c.jpg".to_string()];
        assert_eq!(common_root(&ids).as_deref(), Some("photos/2024"));

        let ids = vec!["photos/a.jpg".to_string(), "notes.txt".to_string()];
        assert_eq!(common_root(&ids), None);
        assert_eq!(common_root(&[]), None);
    }

    #[test]
    fn test_promote_strips_root() {
        let dest = tempfile::tempdir().unwrap();
        let staging = staging_dir(dest.path()).unwrap();
        fs::create_dir_all(staging.path().join("top/sub")).unwrap();
        fs::write(staging.path().join("top/a.txt"), "a").unwrap();
        fs::write(staging.path().join("top/sub/b.txt"), "b").unwrap();

        let root = sole_directory(staging.path()).unwrap();
        assert_eq!(root.as_deref(), Some("top"));

        let moved = promote(staging.path(), root.as_deref(), dest.path(), false).unwrap();
        assert_eq!(moved, 2);
        assert_eq!(fs::read_to_string(dest.path().join("a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dest.path().join("sub/b.txt")).unwrap(), "b");
        assert!(!dest.path().join("top").exists());
    }

    #[test]
    fn test_promote_respects_overwrite() {
        let dest = tempfile::tempdir().unwrap();
        fs::write(dest.path().join("a.txt"), "old").unwrap();

        let staging = staging_dir(dest.path()).unwrap();
        fs::create_dir_all(staging.path().join("r")).unwrap();
        fs::write(staging.path().join("r/a.txt"), "new").unwrap();
        promote(staging.path(), Some("r"), dest.path(), false).unwrap();
        assert_eq!(fs::read_to_string(dest.path().join("a.txt")).unwrap(), "old");

        promote(staging.path(), Some("r"), dest.path(), true).unwrap();
        assert_eq!(fs::read_to_string(dest.path().join("a.txt")).unwrap(), "new");
    }
}
