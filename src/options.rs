//! Options consumed by extract and add operations

use std::path::{Path, PathBuf};

/// Extraction behaviour. Absent options are `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Keep the directory structure stored in the archive
    pub preserve_paths: bool,
    /// Drop the common leading directory of the selected entries
    pub remove_root_node: bool,
    /// Replace existing files instead of skipping them
    pub overwrite: bool,
}

impl ExtractionOptions {
    pub fn preserving_paths() -> Self {
        Self {
            preserve_paths: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressionOptions {
    /// Base directory; added paths are stored relative to it
    pub global_work_dir: Option<PathBuf>,
}

impl CompressionOptions {
    pub fn with_work_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            global_work_dir: Some(dir.into()),
        }
    }

    /// Path as it should appear on the archiver's command line.
    pub fn relative_path<'a>(&self, path: &'a Path) -> &'a Path {
        match &self.global_work_dir {
            Some(base) => path.strip_prefix(base).unwrap_or(path),
            None => path,
        }
    }
}

/// Work out the GlobalWorkDir for files dropped at `path_in_archive`.
///
/// Dropping `/home/user/somedir/file.txt` into `somedir/` must store it as
/// `somedir/file.txt`, so the work dir is `/home/user`.
pub fn global_work_dir_for(files: &[PathBuf], path_in_archive: &str) -> Option<PathBuf> {
    let first = files.first()?.to_string_lossy().into_owned();
    let mut base = if path_in_archive.is_empty() {
        first
    } else {
        first.replacen(path_in_archive, "", 1)
    };
    while base.len() > 1 && base.ends_with('/') {
        base.pop();
    }

    let parent = Path::new(&base).parent()?.to_path_buf();
    std::path::absolute(&parent).ok()
}
