//! Archive model
//!
//! Owns the archive tree and the bound backend. Jobs run on the tokio
//! runtime and report back through a channel; the owner applies those
//! updates with [`ArchiveModel::poll_updates`], [`ArchiveModel::next_update`]
//! or [`ArchiveModel::settle`], so the tree only ever changes on the owner.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::backend::Backend;
use crate::config::{ProgramOverrides, Settings};
use crate::entry::ArchiveEntry;
use crate::error::{Error, Result};
use crate::jobs::{Job, JobEvent, JobId, JobKind, JobOutput, JobStatus};
use crate::options::{CompressionOptions, ExtractionOptions};
use crate::tree::{ArchiveTree, TreeNode};

/// Notifications for the presentation layer
#[derive(Clone, Debug, PartialEq)]
pub enum ModelEvent {
    LoadingStarted,
    LoadingFinished { job: JobId, status: JobStatus },
    Error { message: String, detail: Option<String> },
    /// Archiver diagnostics, verbatim
    Output(String),
}

struct Update {
    generation: u64,
    event: JobEvent,
}

pub struct ArchiveModel {
    settings: Settings,
    backend: Option<Backend>,
    /// Bumped whenever the backend is replaced; older updates are stale
    generation: u64,
    tree: ArchiveTree,
    comment: Option<String>,
    jobs: Vec<Job>,
    next_id: JobId,
    update_tx: mpsc::UnboundedSender<Update>,
    update_rx: mpsc::UnboundedReceiver<Update>,
    observers: Vec<Box<dyn FnMut(&ModelEvent)>>,
}

impl Default for ArchiveModel {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl ArchiveModel {
    pub fn new(settings: Settings) -> Self {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        Self {
            settings,
            backend: None,
            generation: 0,
            tree: ArchiveTree::new(),
            comment: None,
            jobs: Vec::new(),
            next_id: 0,
            update_tx,
            update_rx,
            observers: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Observe model events as they are applied.
    pub fn on_event<F>(&mut self, observer: F)
    where
        F: FnMut(&ModelEvent) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    // ==================== Archive binding ====================

    /// Bind a new backend (or none). Jobs of the previous backend are
    /// cancelled and their late updates ignored. Returns the unstarted job
    /// that loads the new archive.
    pub fn set_archive(&mut self, backend: Option<Backend>) -> Option<Job> {
        for job in self.jobs.drain(..) {
            job.cancel();
        }
        self.generation += 1;
        self.tree = ArchiveTree::new();
        self.comment = None;
        self.backend = backend;

        let backend = self.backend.clone()?;
        log::info!("archive set to {}", backend.archive().display());
        Some(self.new_job(backend, JobKind::Open))
    }

    /// Bind the built-in backend for `path`.
    pub fn open_path(&mut self, path: &Path, overrides: &ProgramOverrides) -> Result<Job> {
        let backend = Backend::for_path(path, overrides)?;
        self.set_archive(Some(backend))
            .ok_or_else(|| Error::invalid_input("no backend bound"))
    }

    pub fn backend(&self) -> Option<&Backend> {
        self.backend.as_ref()
    }

    pub fn archive_path(&self) -> Option<&Path> {
        self.backend.as_ref().map(|b| b.archive())
    }

    pub fn is_read_only(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_read_only())
    }

    // ==================== Job creation ====================

    pub fn extract_entries(
        &mut self,
        ids: Vec<String>,
        destination: impl Into<PathBuf>,
        options: ExtractionOptions,
    ) -> Result<Job> {
        let backend = self.require_backend()?;
        self.require_known(&ids)?;
        Ok(self.new_job(backend, JobKind::Extract {
            ids,
            destination: destination.into(),
            options,
        }))
    }

    pub fn add_files(&mut self, paths: Vec<PathBuf>, options: CompressionOptions) -> Result<Job> {
        let backend = self.require_backend()?;
        if paths.is_empty() {
            return Err(Error::invalid_input("no files to add"));
        }
        Ok(self.new_job(backend, JobKind::Add { paths, options }))
    }

    pub fn delete_entries(&mut self, ids: Vec<String>) -> Result<Job> {
        let backend = self.require_backend()?;
        if ids.is_empty() {
            return Err(Error::invalid_input("no entries to delete"));
        }
        self.require_known(&ids)?;
        Ok(self.new_job(backend, JobKind::Delete { ids }))
    }

    /// Extract one file into a private temporary directory for viewing.
    pub fn preview_entry(&mut self, internal_id: &str) -> Result<Preview> {
        let backend = self.require_backend()?;
        let entry = self
            .tree
            .lookup(internal_id)
            .ok_or_else(|| Error::invalid_input(format!("unknown entry {internal_id:?}")))?;

        if entry.is_dir {
            return Err(Error::invalid_input("directories cannot be previewed"));
        }
        if entry.is_link {
            return Err(Error::invalid_input("links cannot be previewed"));
        }
        if let Some(limit) = self.settings.preview_limit_bytes()
            && entry.size >= limit
        {
            return Err(Error::invalid_input(format!(
                "{} is not below the preview limit of {} MB",
                entry.name, self.settings.preview_size_limit_mb
            )));
        }

        let dir = tempfile::Builder::new().prefix("arkwrap-preview-").tempdir()?;
        let path = dir.path().join(&entry.full_path);
        let options = ExtractionOptions {
            preserve_paths: true,
            overwrite: true,
            ..Default::default()
        };
        let job = self.new_job(backend, JobKind::Extract {
            ids: vec![internal_id.to_string()],
            destination: dir.path().to_path_buf(),
            options,
        });

        Ok(Preview {
            job,
            path,
            read_only: self.is_read_only(),
            _dir: dir,
        })
    }

    fn require_backend(&self) -> Result<Backend> {
        self.backend
            .clone()
            .ok_or_else(|| Error::invalid_input("no archive is open"))
    }

    fn require_known(&self, ids: &[String]) -> Result<()> {
        match ids.iter().find(|id| self.tree.lookup(id).is_none()) {
            Some(id) => Err(Error::invalid_input(format!("unknown entry {id:?}"))),
            None => Ok(()),
        }
    }

    fn new_job(&mut self, backend: Backend, kind: JobKind) -> Job {
        self.prune_abandoned();
        let id = self.next_id;
        self.next_id += 1;

        let job = Job::new(id, kind, backend).with_grace(self.settings.termination_grace);

        let tx = self.update_tx.clone();
        let generation = self.generation;
        job.on_event(move |event| {
            let _ = tx.send(Update {
                generation,
                event: event.clone(),
            });
        });

        self.jobs.push(job.clone());
        job
    }

    /// Forget pending jobs nobody outside the model can start any more.
    fn prune_abandoned(&mut self) {
        self.jobs.retain(|job| {
            let keep = job.status() != JobStatus::Pending || job.is_shared();
            if !keep {
                log::debug!("dropping abandoned job {}: {}", job.id(), job.description());
            }
            keep
        });
    }

    // ==================== Updates ====================

    /// Jobs issued for the current archive and not yet applied. Pending
    /// jobs whose handles were all dropped go away on the next poll.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn has_active_jobs(&self) -> bool {
        self.jobs.iter().any(|j| j.status() != JobStatus::Pending)
    }

    /// Non-blocking poll for updates
    pub fn poll_updates(&mut self) -> Vec<ModelEvent> {
        self.prune_abandoned();
        let mut events = Vec::new();
        while let Ok(update) = self.update_rx.try_recv() {
            self.apply_update(update, &mut events);
        }
        events
    }

    /// Wait for the next job update and apply it.
    pub async fn next_update(&mut self) -> Vec<ModelEvent> {
        let mut events = Vec::new();
        if let Some(update) = self.update_rx.recv().await {
            self.apply_update(update, &mut events);
        }
        events
    }

    /// Apply updates until every started job has been accounted for.
    /// Jobs that were never started are left alone.
    pub async fn settle(&mut self) -> Vec<ModelEvent> {
        let mut events = self.poll_updates();
        while self.has_active_jobs() {
            events.extend(self.next_update().await);
        }
        events
    }

    fn apply_update(&mut self, update: Update, events: &mut Vec<ModelEvent>) {
        if update.generation != self.generation {
            log::debug!("ignoring update from a discarded archive: {:?}", update.event);
            return;
        }

        match update.event {
            JobEvent::Output { line, .. } => self.emit(ModelEvent::Output(line.text), events),
            JobEvent::StatusChanged { id, status } => {
                let Some(pos) = self.jobs.iter().position(|j| j.id() == id) else {
                    return;
                };
                let is_open = matches!(self.jobs[pos].kind(), JobKind::Open);
                if status == JobStatus::Running {
                    if is_open {
                        self.emit(ModelEvent::LoadingStarted, events);
                    }
                    return;
                }
                if !status.is_terminal() {
                    return;
                }

                let job = self.jobs.remove(pos);
                self.apply_result(&job, events);
                if is_open {
                    self.emit(ModelEvent::LoadingFinished { job: id, status }, events);
                }
            }
        }
    }

    fn apply_result(&mut self, job: &Job, events: &mut Vec<ModelEvent>) {
        let Some(result) = job.result() else {
            return;
        };
        match result {
            Ok(JobOutput::Listing(listing)) => {
                if !listing.complete {
                    self.emit(
                        ModelEvent::Error {
                            message: "The archive listing is incomplete".into(),
                            detail: Some(format!("{} was interrupted", job.description())),
                        },
                        events,
                    );
                }
                self.comment = listing.comment;
                self.tree = ArchiveTree::from_entries(listing.entries);
            }
            Ok(JobOutput::Modified(listing)) => {
                self.comment = listing.comment;
                self.tree = ArchiveTree::from_entries(listing.entries);
            }
            Ok(JobOutput::Extracted { destination }) => {
                log::info!("extracted into {}", destination.display());
            }
            Err(Error::Cancelled) => {}
            Err(e) => {
                if matches!(job.kind(), JobKind::Open) {
                    self.clear();
                }
                self.emit(
                    ModelEvent::Error {
                        message: format!("{} failed", job.description()),
                        detail: Some(e.to_string()),
                    },
                    events,
                );
            }
        }
    }

    /// Back to the no-archive state without touching the update generation
    /// of the failing job.
    fn clear(&mut self) {
        for job in self.jobs.drain(..) {
            job.cancel();
        }
        self.generation += 1;
        self.backend = None;
        self.tree = ArchiveTree::new();
        self.comment = None;
    }

    fn emit(&mut self, event: ModelEvent, events: &mut Vec<ModelEvent>) {
        for observer in &mut self.observers {
            observer(&event);
        }
        events.push(event);
    }

    // ==================== Accessors ====================

    pub fn lookup(&self, internal_id: &str) -> Option<&ArchiveEntry> {
        self.tree.lookup(internal_id)
    }

    pub fn entry_at(&self, path: &str) -> Option<&ArchiveEntry> {
        self.tree.entry_at(path)
    }

    pub fn children(&self, path: &str) -> Vec<&TreeNode> {
        self.tree.children(path)
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        self.tree.entries()
    }

    pub fn tree(&self) -> &ArchiveTree {
        &self.tree
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn is_single_folder_archive(&self) -> bool {
        self.tree.is_single_folder()
    }

    /// Folder an "extract here" would produce: the archive's own top-level
    /// folder, or else the archive name without its extension.
    pub fn subfolder_name(&self) -> Option<String> {
        if let Some(folder) = self.tree.single_folder() {
            return Some(folder.to_string());
        }
        let archive = self.archive_path()?;
        archive
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
    }

    /// Destination for extracting the whole archive into `dir` without
    /// scattering loose files there.
    pub fn quick_extract_destination(&self, dir: &Path) -> Option<PathBuf> {
        if self.is_single_folder_archive() {
            return Some(dir.to_path_buf());
        }
        self.subfolder_name().map(|name| dir.join(name))
    }
}

/// A file being extracted for viewing. The temporary directory lives as
/// long as the preview.
#[derive(Debug)]
pub struct Preview {
    job: Job,
    path: PathBuf,
    read_only: bool,
    _dir: tempfile::TempDir,
}

impl Preview {
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Where the extracted file will be.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the extraction and hand out the file path. Files from
    /// read-only archives are made read-only so viewers do not offer to save.
    pub async fn finish(&self) -> Result<&Path> {
        self.job.wait().await?;
        if !self.path.is_file() {
            return Err(Error::Io(format!(
                "{} was not extracted",
                self.path.display()
            )));
        }
        if self.read_only {
            let mut permissions = tokio::fs::metadata(&self.path).await?.permissions();
            permissions.set_readonly(true);
            tokio::fs::set_permissions(&self.path, permissions).await?;
        }
        Ok(&self.path)
    }
}
