//! Archive backends
//!
//! A [`Backend`] binds one archive file to the [`Descriptor`] of the tool
//! that handles it. Operations run through a [`Session`], and a backend
//! admits only one session at a time.

mod commands;
mod descriptor;
mod format;
pub mod process;
mod staging;

#[cfg(test)]
pub(crate) mod fake;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub use descriptor::{Descriptor, ToolCommand};
pub use format::ArchiveFormat;
pub use process::{OutputHandler, OutputLine, RunContext, Stream};

use crate::config::ProgramOverrides;
use crate::entry::ArchiveEntry;
use crate::error::{Error, Result};
use crate::options::{CompressionOptions, ExtractionOptions};
use crate::parser::{ColumnParser, LineOutcome};
use process::{Exit, Invocation};

/// Result of one list run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    /// Entries in listing order, unique by internal id
    pub entries: Vec<ArchiveEntry>,
    /// Archive comment printed ahead of the listing
    pub comment: Option<String>,
    /// False when the lister was killed before it finished
    pub complete: bool,
}

#[derive(Debug, Clone)]
pub struct Backend {
    descriptor: Arc<Descriptor>,
    archive: PathBuf,
    busy: Arc<AtomicBool>,
}

impl Backend {
    pub fn new(descriptor: Descriptor, archive: impl Into<PathBuf>) -> Self {
        let archive = archive.into();
        // Add runs inside the work dir, so the archive path must not be relative
        let archive = std::path::absolute(&archive).unwrap_or(archive);
        Self {
            descriptor: Arc::new(descriptor),
            archive,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Pick the built-in backend for `path` and apply program overrides.
    pub fn for_path(path: &Path, overrides: &ProgramOverrides) -> Result<Self> {
        let format = ArchiveFormat::detect(path);
        let descriptor = Descriptor::builtin(format)
            .ok_or(Error::Unsupported {
                backend: format.name(),
                operation: "open",
            })?
            .with_overrides(overrides);

        if !descriptor.unarchiver.is_available() {
            log::warn!(
                "{} not found; {} archives cannot be opened",
                descriptor.unarchiver.display_name(),
                format.name()
            );
        }

        Ok(Self::new(descriptor, path))
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn format(&self) -> ArchiveFormat {
        self.descriptor.format
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn is_read_only(&self) -> bool {
        self.descriptor.read_only
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the backend for one operation.
    pub fn try_acquire(&self) -> Result<Session> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        Ok(Session {
            backend: self.clone(),
        })
    }
}

/// Exclusive access to a backend; released on drop.
#[derive(Debug)]
pub struct Session {
    backend: Backend,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.backend.busy.store(false, Ordering::Release);
    }
}

impl Session {
    fn descriptor(&self) -> &Descriptor {
        &self.backend.descriptor
    }

    fn archive(&self) -> &Path {
        &self.backend.archive
    }

    fn unsupported(&self, operation: &'static str) -> Error {
        Error::Unsupported {
            backend: self.descriptor().format.name(),
            operation,
        }
    }

    pub async fn list(&self, ctx: &RunContext) -> Result<Listing> {
        let descriptor = self.descriptor();
        let invocation = Invocation::new(
            &descriptor.unarchiver,
            commands::list_args(descriptor.format, self.archive()),
        );

        let mut parser = ColumnParser::new(&descriptor.listing);
        let mut entries: Vec<ArchiveEntry> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();

        let finished = process::run(&invocation, ctx, |line| match parser.parse_line(line) {
            LineOutcome::Entry(entry) => match by_id.get(&entry.internal_id) {
                Some(&i) => entries[i] = entry,
                None => {
                    by_id.insert(entry.internal_id.clone(), entries.len());
                    entries.push(entry);
                }
            },
            LineOutcome::Preamble(text) => ctx.emit(Stream::Stdout, &text),
            LineOutcome::Malformed(reason) => log::debug!("skipping row {line:?}: {reason}"),
            LineOutcome::Ignored => {}
        })
        .await?;

        if !parser.header_seen() {
            log::warn!(
                "{} printed no listing header for {}",
                invocation.program_name(),
                self.archive().display()
            );
        }

        let exit = finished.exit;
        let complete = match exit {
            Exit::Signal => {
                log::warn!("listing of {} was interrupted", self.archive().display());
                false
            }
            Exit::Code(_) => {
                finished.into_result(&invocation)?;
                true
            }
        };

        Ok(Listing {
            entries,
            comment: parser.comment(),
            complete,
        })
    }

    /// Extract `ids` (everything when empty) into `destination`.
    pub async fn extract(
        &self,
        ids: &[String],
        destination: &Path,
        options: &ExtractionOptions,
        ctx: &RunContext,
    ) -> Result<PathBuf> {
        if destination.as_os_str().is_empty() {
            return Err(Error::invalid_input("extraction destination is empty"));
        }
        let descriptor = self.descriptor();
        let members = commands::escape_ids(descriptor.format, ids)?;
        tokio::fs::create_dir_all(destination).await?;

        let stage = if options.remove_root_node {
            Some(staging::staging_dir(destination)?)
        } else {
            None
        };
        let target = stage.as_ref().map_or(destination, |s| s.path());

        let invocation = Invocation::new(
            &descriptor.unarchiver,
            commands::extract_args(descriptor.format, self.archive(), &members, target, options),
        );
        process::run(&invocation, ctx, |line| ctx.emit(Stream::Stdout, line))
            .await?
            .into_result(&invocation)?;

        if let Some(stage) = stage {
            let ids = ids.to_vec();
            let dest = destination.to_path_buf();
            let overwrite = options.overwrite;
            let moved = tokio::task::spawn_blocking(move || {
                let root = match staging::common_root(&ids) {
                    Some(root) => Some(root),
                    None if ids.is_empty() => staging::sole_directory(stage.path())?,
                    None => None,
                };
                staging::promote(stage.path(), root.as_deref(), &dest, overwrite)
            })
            .await
            .map_err(std::io::Error::other)??;
            log::debug!("moved {moved} files out of the root node");
        }

        Ok(destination.to_path_buf())
    }

    /// Add files, then re-list.
    pub async fn add(
        &self,
        paths: &[PathBuf],
        options: &CompressionOptions,
        ctx: &RunContext,
    ) -> Result<Listing> {
        if self.descriptor().read_only {
            return Err(self.unsupported("add"));
        }
        if paths.is_empty() {
            return Err(Error::invalid_input("no files to add"));
        }

        let relative: Vec<&Path> = paths.iter().map(|p| options.relative_path(p)).collect();
        let descriptor = self.descriptor();
        let args = commands::add_args(descriptor.format, self.archive(), &relative)
            .ok_or_else(|| self.unsupported("add"))?;
        let invocation = Invocation::new(&descriptor.archiver, args)
            .in_dir(options.global_work_dir.clone());

        process::run(&invocation, ctx, |line| ctx.emit(Stream::Stdout, line))
            .await?
            .into_result(&invocation)?;
        self.list(ctx).await
    }

    /// Delete entries by internal id, then re-list.
    pub async fn remove(&self, ids: &[String], ctx: &RunContext) -> Result<Listing> {
        if self.descriptor().read_only {
            return Err(self.unsupported("delete"));
        }
        if ids.is_empty() {
            return Err(Error::invalid_input("no entries to delete"));
        }

        let descriptor = self.descriptor();
        let members = commands::escape_ids(descriptor.format, ids)?;
        let args = commands::delete_args(descriptor.format, self.archive(), &members)
            .ok_or_else(|| self.unsupported("delete"))?;
        let invocation = Invocation::new(&descriptor.archiver, args);

        process::run(&invocation, ctx, |line| ctx.emit(Stream::Stdout, line))
            .await?
            .into_result(&invocation)?;
        self.list(ctx).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use super::fake::{FakeTools, ZIP_LISTING};

    #[tokio::test]
    async fn test_list_parses_tool_output() {
        let tools = FakeTools::new();
        let backend = tools.zip_backend(None, None);
        let session = backend.try_acquire().unwrap();

        let listing = session.list(&RunContext::new()).await.unwrap();
        assert!(listing.complete);
        assert_eq!(listing.comment.as_deref(), Some("release notes"));
        let ids: Vec<&str> = listing.entries.iter().map(|e| e.internal_id.as_str()).collect();
        assert_eq!(ids, ["docs/", "docs/readme.txt", "photos/beach.jpg"]);
    }

    #[tokio::test]
    async fn test_duplicate_internal_id_keeps_later_row() {
        let tools = FakeTools::new();
        let listing = ZIP_LISTING.replace(
            "     2048  2024-01-15 10:31   photos/beach.jpg\n",
            "     2048  2024-01-15 10:31   photos/beach.jpg\n     \
             4096  2024-01-16 10:31   photos/beach.jpg\n",
        );
        let backend = tools.zip_backend(Some(tools.lister("dup.sh", &listing)), None);
        let listing = backend.try_acquire().unwrap().list(&RunContext::new()).await.unwrap();
        assert_eq!(listing.entries.len(), 3);
        assert_eq!(listing.entries[2].size, 4096);
    }

    #[tokio::test]
    async fn test_list_failure_reports_stderr() {
        let tools = FakeTools::new();
        let failing = tools.script("bad.sh", "echo 'cannot find zipfile' >&2\nexit 9\n");
        let backend = tools.zip_backend(Some(failing), None);
        let err = backend
            .try_acquire()
            .unwrap()
            .list(&RunContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ProcessFailure);
        assert_eq!(err.detail(), Some("cannot find zipfile"));
    }

    #[tokio::test]
    async fn test_killed_lister_gives_incomplete_listing() {
        let tools = FakeTools::new();
        let body = format!("cat <<'LISTING'\n{ZIP_LISTING}LISTING\nkill -9 $$\n");
        let backend = tools.zip_backend(Some(tools.script("killed.sh", &body)), None);
        let listing = backend.try_acquire().unwrap().list(&RunContext::new()).await.unwrap();
        assert!(!listing.complete);
        assert_eq!(listing.entries.len(), 3);
    }

    #[test]
    fn test_busy_until_session_dropped() {
        let tools = FakeTools::new();
        let backend = tools.zip_backend(None, None);
        let session = backend.try_acquire().unwrap();
        assert!(backend.is_busy());
        assert_eq!(backend.clone().try_acquire().unwrap_err(), Error::Busy);
        drop(session);
        assert!(!backend.is_busy());
        assert!(backend.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_empty_destination_fails_before_spawning() {
        let tools = FakeTools::new();
        let marker = tools.path("spawned");
        let tool = tools.script("mark.sh", &format!("touch '{}'\n", marker.display()));
        let backend = tools.zip_backend(Some(tool), None);

        let err = backend
            .try_acquire()
            .unwrap()
            .extract(&[], Path::new(""), &ExtractionOptions::default(), &RunContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_extract_all_passes_no_ids() {
        let tools = FakeTools::new();
        let args_file = tools.path("args");
        let backend = tools.zip_backend(Some(tools.unzip(&args_file, "")), None);
        let dest = tools.path("out");

        let opts = ExtractionOptions::preserving_paths();
        let result = backend
            .try_acquire()
            .unwrap()
            .extract(&[], &dest, &opts, &RunContext::new())
            .await
            .unwrap();
        assert_eq!(result, dest);
        assert!(dest.is_dir());

        let archive = backend.archive().to_string_lossy().into_owned();
        let dest = dest.to_string_lossy().into_owned();
        assert_eq!(tools.read_args(&args_file), ["-n", archive.as_str(), "-d", dest.as_str()]);
    }

    #[tokio::test]
    async fn test_extract_remove_root_node() {
        let tools = FakeTools::new();
        let args_file = tools.path("args");
        let extra = "mkdir -p \"$last/photos/2024\" && echo x > \"$last/photos/2024/a.jpg\"";
        let backend = tools.zip_backend(Some(tools.unzip(&args_file, extra)), None);
        let dest = tools.path("out");

        let opts = ExtractionOptions {
            preserve_paths: true,
            remove_root_node: true,
            ..Default::default()
        };
        backend
            .try_acquire()
            .unwrap()
            .extract(&["photos/2024/a.jpg".into()], &dest, &opts, &RunContext::new())
            .await
            .unwrap();

        assert!(dest.join("a.jpg").is_file());
        assert!(!dest.join("photos").exists());
        let leftovers: Vec<_> = std::fs::read_dir(&dest).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_selects_bracketed_id_literally() {
        let tools = FakeTools::new();
        let args_file = tools.path("args");
        let zip = tools.recorder("zip.sh", &args_file, "");
        let backend = tools.zip_backend(None, Some(zip));

        backend
            .try_acquire()
            .unwrap()
            .remove(&["a[1].txt".into()], &RunContext::new())
            .await
            .unwrap();

        let archive = backend.archive().to_string_lossy().into_owned();
        assert_eq!(tools.read_args(&args_file), ["-d", archive.as_str(), "a[[]1[]].txt"]);
    }

    #[tokio::test]
    async fn test_rar_wildcard_id_is_refused_without_spawning() {
        let tools = FakeTools::new();
        let marker = tools.path("spawned");
        let tool = tools.script("mark.sh", &format!("touch '{}'\n", marker.display()));
        let descriptor = Descriptor::builtin(ArchiveFormat::Rar)
            .unwrap()
            .with_archiver(tool.clone())
            .with_unarchiver(tool);
        let backend = Backend::new(descriptor, tools.path("test.rar"));
        let session = backend.try_acquire().unwrap();
        let ctx = RunContext::new();

        let err = session.remove(&["notes*.txt".into()], &ctx).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
        let err = session
            .extract(&["why?.txt".into()], &tools.path("out"), &ExtractionOptions::default(), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
        assert!(!marker.exists());
        assert!(!tools.path("out").exists());
    }

    #[tokio::test]
    async fn test_read_only_rejects_mutation_without_spawning() {
        let tools = FakeTools::new();
        let marker = tools.path("spawned");
        let tool = tools.script("mark.sh", &format!("touch '{}'\n", marker.display()));
        let descriptor = Descriptor::builtin(ArchiveFormat::Ace)
            .unwrap()
            .with_archiver(tool.clone())
            .with_unarchiver(tool);
        let backend = Backend::new(descriptor, tools.archive("old.ace"));
        let session = backend.try_acquire().unwrap();
        let ctx = RunContext::new();

        let err = session
            .add(&[tools.path("x")], &CompressionOptions::default(), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnsupportedOperation);
        let err = session.remove(&["a".into()], &ctx).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnsupportedOperation);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_add_runs_in_work_dir_and_relists() {
        let tools = FakeTools::new();
        let args_file = tools.path("zip-args");
        let pwd_file = tools.path("pwd");
        let extra = format!("pwd > '{}'", pwd_file.display());
        let zip = tools.recorder("zip.sh", &args_file, &extra);
        let backend = tools.zip_backend(None, Some(zip));

        let work = tools.path("work");
        std::fs::create_dir_all(work.join("docs")).unwrap();
        let opts = CompressionOptions::with_work_dir(&work);
        let listing = backend
            .try_acquire()
            .unwrap()
            .add(&[work.join("docs/new.txt")], &opts, &RunContext::new())
            .await
            .unwrap();

        assert_eq!(listing.entries.len(), 3);
        let archive = backend.archive().to_string_lossy().into_owned();
        assert_eq!(tools.read_args(&args_file), ["-r", archive.as_str(), "docs/new.txt"]);
        let pwd = std::fs::read_to_string(pwd_file).unwrap();
        assert_eq!(
            std::fs::canonicalize(pwd.trim()).unwrap(),
            std::fs::canonicalize(&work).unwrap()
        );
    }

    #[test]
    fn test_for_path_unknown_format() {
        let err = Backend::for_path(Path::new("notes.txt"), &ProgramOverrides::default()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnsupportedOperation);
    }
}
