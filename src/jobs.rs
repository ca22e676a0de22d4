use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::backend::process::DEFAULT_GRACE;
use crate::backend::{Backend, Listing, OutputLine, RunContext, Session};
use crate::error::{Error, Result};
use crate::options::{CompressionOptions, ExtractionOptions};

pub type JobId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

#[derive(Clone, Debug)]
pub enum JobKind {
    Open,
    Extract {
        ids: Vec<String>,
        destination: PathBuf,
        options: ExtractionOptions,
    },
    Add {
        paths: Vec<PathBuf>,
        options: CompressionOptions,
    },
    Delete {
        ids: Vec<String>,
    },
}

/// What a successful job produced.
#[derive(Clone, Debug, PartialEq)]
pub enum JobOutput {
    Listing(Listing),
    Extracted { destination: PathBuf },
    /// Listing taken right after the archive was modified
    Modified(Listing),
}

/// Messages from a job to its observers
#[derive(Clone, Debug)]
pub enum JobEvent {
    StatusChanged { id: JobId, status: JobStatus },
    Output { id: JobId, line: OutputLine },
}

pub type JobObserver = Arc<dyn Fn(&JobEvent) + Send + Sync>;

struct JobState {
    status: JobStatus,
    result: Option<Result<JobOutput>>,
    completed_at: Option<Instant>,
}

struct JobCore {
    id: JobId,
    kind: JobKind,
    description: String,
    backend: Backend,
    created_at: Instant,
    grace: Duration,
    state: Mutex<JobState>,
    observers: Mutex<Vec<JobObserver>>,
    cancel: CancellationToken,
    done: watch::Sender<bool>,
}

/// One asynchronous operation against a backend.
///
/// Handles are cheap to clone and all refer to the same job.
#[derive(Clone)]
pub struct Job {
    core: Arc<JobCore>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.core.id)
            .field("description", &self.core.description)
            .field("status", &self.status())
            .finish()
    }
}

impl Job {
    pub fn new(id: JobId, kind: JobKind, backend: Backend) -> Self {
        let name = backend
            .archive()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let description = match &kind {
            JobKind::Open => format!("Open {}", name),
            JobKind::Extract { ids, .. } if ids.is_empty() => format!("Extract {}", name),
            JobKind::Extract { ids, .. } => format!("Extract {} entries from {}", ids.len(), name),
            JobKind::Add { paths, .. } => format!("Add {} files to {}", paths.len(), name),
            JobKind::Delete { ids } => format!("Delete {} entries from {}", ids.len(), name),
        };
        let (done, _) = watch::channel(false);

        Self {
            core: Arc::new(JobCore {
                id,
                kind,
                description,
                backend,
                created_at: Instant::now(),
                grace: DEFAULT_GRACE,
                state: Mutex::new(JobState {
                    status: JobStatus::Pending,
                    result: None,
                    completed_at: None,
                }),
                observers: Mutex::new(Vec::new()),
                cancel: CancellationToken::new(),
                done,
            }),
        }
    }

    /// Time the archiver gets to exit after SIGTERM before it is killed.
    /// Only effective before the job is shared.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        if let Some(core) = Arc::get_mut(&mut self.core) {
            core.grace = grace;
        }
        self
    }

    pub fn id(&self) -> JobId {
        self.core.id
    }

    pub fn kind(&self) -> &JobKind {
        &self.core.kind
    }

    pub fn description(&self) -> &str {
        &self.core.description
    }

    pub fn backend(&self) -> &Backend {
        &self.core.backend
    }

    pub fn created_at(&self) -> Instant {
        self.core.created_at
    }

    pub fn completed_at(&self) -> Option<Instant> {
        self.state().completed_at
    }

    pub fn status(&self) -> JobStatus {
        self.state().status
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status(), JobStatus::Pending | JobStatus::Running)
    }

    /// Terminal result; `None` while the job is pending or running.
    pub fn result(&self) -> Option<Result<JobOutput>> {
        self.state().result.clone()
    }

    /// True while another handle to this job exists.
    pub(crate) fn is_shared(&self) -> bool {
        Arc::strong_count(&self.core) > 1
    }

    /// Register an observer. It sees every later status change and output line.
    pub fn on_event<F>(&self, observer: F)
    where
        F: Fn(&JobEvent) + Send + Sync + 'static,
    {
        self.observers().push(Arc::new(observer));
    }

    /// Run the job on the current tokio runtime.
    ///
    /// Fails with `InvalidInput` unless the job is pending. A busy backend
    /// does not fail the call; the job itself ends `Failed`.
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::invalid_input("jobs must be started inside a tokio runtime"))?;

        {
            let mut state = self.state();
            if state.status != JobStatus::Pending {
                return Err(Error::invalid_input(format!(
                    "job {} cannot start from {:?}",
                    self.core.id, state.status
                )));
            }
            state.status = JobStatus::Running;
        }
        log::info!("job {} started: {}", self.core.id, self.core.description);
        self.notify(&JobEvent::StatusChanged {
            id: self.core.id,
            status: JobStatus::Running,
        });

        let session = match self.core.backend.try_acquire() {
            Ok(session) => session,
            Err(e) => {
                self.finish(Err(e));
                return Ok(());
            }
        };

        let job = self.clone();
        runtime.spawn(async move {
            let result = job.execute(&session).await;
            drop(session);
            job.finish(result);
        });
        Ok(())
    }

    /// Cancel the job. Pending jobs end immediately; running jobs terminate
    /// their archiver and end `Cancelled` once it is gone.
    pub fn cancel(&self) {
        self.core.cancel.cancel();
        let pending = self.state().status == JobStatus::Pending;
        if pending {
            self.transition(JobStatus::Cancelled, Err(Error::Cancelled));
        }
    }

    /// Wait for the terminal result. Never resolves for a job that is not
    /// started or cancelled.
    pub async fn wait(&self) -> Result<JobOutput> {
        let mut done = self.core.done.subscribe();
        if done.wait_for(|finished| *finished).await.is_err() {
            return Err(Error::Cancelled);
        }
        self.result().unwrap_or(Err(Error::Cancelled))
    }

    async fn execute(&self, session: &Session) -> Result<JobOutput> {
        let ctx = self.run_context();
        match &self.core.kind {
            JobKind::Open => session.list(&ctx).await.map(JobOutput::Listing),
            JobKind::Extract {
                ids,
                destination,
                options,
            } => session
                .extract(ids, destination, options, &ctx)
                .await
                .map(|destination| JobOutput::Extracted { destination }),
            JobKind::Add { paths, options } => {
                session.add(paths, options, &ctx).await.map(JobOutput::Modified)
            }
            JobKind::Delete { ids } => session.remove(ids, &ctx).await.map(JobOutput::Modified),
        }
    }

    fn run_context(&self) -> RunContext {
        let job = self.clone();
        RunContext::new()
            .with_cancel(self.core.cancel.clone())
            .with_grace(self.core.grace)
            .with_output(Arc::new(move |line: OutputLine| {
                job.notify(&JobEvent::Output {
                    id: job.core.id,
                    line,
                });
            }))
    }

    fn finish(&self, result: Result<JobOutput>) {
        let (status, result) = match result {
            _ if self.core.cancel.is_cancelled() => (JobStatus::Cancelled, Err(Error::Cancelled)),
            Ok(output) => (JobStatus::Succeeded, Ok(output)),
            Err(Error::Cancelled) => (JobStatus::Cancelled, Err(Error::Cancelled)),
            Err(e) => (JobStatus::Failed, Err(e)),
        };
        self.transition(status, result);
    }

    fn transition(&self, status: JobStatus, result: Result<JobOutput>) {
        {
            let mut state = self.state();
            if state.status.is_terminal() {
                return;
            }
            if let Err(e) = &result {
                if status == JobStatus::Failed {
                    log::warn!("job {} failed: {}", self.core.id, e);
                }
            }
            state.status = status;
            state.result = Some(result);
            state.completed_at = Some(Instant::now());
        }
        log::info!("job {} {:?}: {}", self.core.id, status, self.core.description);

        self.notify(&JobEvent::StatusChanged {
            id: self.core.id,
            status,
        });
        self.core.done.send_replace(true);
    }

    fn notify(&self, event: &JobEvent) {
        let observers = self.observers().clone();
        for observer in observers {
            observer(event);
        }
    }

    fn state(&self) -> MutexGuard<'_, JobState> {
        self.core.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn observers(&self) -> MutexGuard<'_, Vec<JobObserver>> {
        self.core.observers.lock().unwrap_or_else(|e| e.into_inner())
    }
}
