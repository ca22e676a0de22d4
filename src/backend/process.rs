//! Archiver subprocess plumbing
//!
//! One call to [`run`] spawns a process, streams its stdout line by line to a
//! callback, forwards stderr as diagnostics and waits for it to exit. A
//! tripped cancellation token stops reading immediately and terminates the
//! process: SIGTERM first, SIGKILL once the grace period has passed.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use super::ToolCommand;
use crate::error::{Error, Result};
use crate::parser::LineBuffer;

pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

/// Keep the tail of stderr for error details.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// A diagnostics line produced by an archiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: Stream,
    pub text: String,
}

pub type OutputHandler = Arc<dyn Fn(OutputLine) + Send + Sync>;

/// Per-operation context: cancellation and where diagnostics go.
#[derive(Clone)]
pub struct RunContext {
    pub cancel: CancellationToken,
    pub grace: Duration,
    output: Option<OutputHandler>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            grace: DEFAULT_GRACE,
            output: None,
        }
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn with_output(mut self, handler: OutputHandler) -> Self {
        self.output = Some(handler);
        self
    }

    pub fn emit(&self, stream: Stream, text: &str) {
        if let Some(handler) = &self.output {
            handler(OutputLine {
                stream,
                text: text.to_string(),
            });
        }
    }
}

/// A fully resolved command line.
#[derive(Debug, Clone)]
pub(crate) struct Invocation {
    pub tool: ToolCommand,
    pub args: Vec<OsString>,
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(tool: &ToolCommand, args: Vec<OsString>) -> Self {
        Self {
            tool: tool.clone(),
            args,
            current_dir: None,
        }
    }

    pub fn in_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.current_dir = dir;
        self
    }

    pub fn program_name(&self) -> String {
        self.tool.display_name()
    }

    fn command_line(&self) -> String {
        std::iter::once(self.tool.program.as_os_str())
            .chain(self.tool.leading_args.iter().map(|a| a.as_os_str()))
            .chain(self.args.iter().map(|a| a.as_os_str()))
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exit {
    Code(i32),
    Signal,
}

#[derive(Debug)]
pub(crate) struct Finished {
    pub exit: Exit,
    pub stderr: String,
}

impl Finished {
    /// Map a nonzero exit to a process failure.
    pub fn into_result(self, invocation: &Invocation) -> Result<()> {
        match self.exit {
            Exit::Code(0) => Ok(()),
            Exit::Code(code) => Err(Error::Process {
                program: invocation.program_name(),
                code: Some(code),
                detail: self.stderr,
            }),
            Exit::Signal => Err(Error::Process {
                program: invocation.program_name(),
                code: None,
                detail: self.stderr,
            }),
        }
    }
}

pub(crate) async fn run(
    invocation: &Invocation,
    ctx: &RunContext,
    mut on_stdout: impl FnMut(&str),
) -> Result<Finished> {
    if ctx.cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let mut child = spawn(invocation)?;
    let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
        terminate(&mut child, ctx.grace).await;
        return Err(Error::Spawn {
            program: invocation.program_name(),
            detail: "output pipes unavailable".into(),
        });
    };

    let mut out_lines = LineBuffer::new();
    let mut err_lines = LineBuffer::new();
    let mut stderr_tail: Vec<String> = Vec::new();
    let mut out_chunk = [0u8; 8192];
    let mut err_chunk = [0u8; 4096];
    let mut out_open = true;
    let mut err_open = true;

    let on_stderr = |line: String, tail: &mut Vec<String>| {
        log::warn!("{}: {}", invocation.program_name(), line);
        ctx.emit(Stream::Stderr, &line);
        if tail.len() == STDERR_TAIL_LINES {
            tail.remove(0);
        }
        tail.push(line);
    };

    while out_open || err_open {
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                terminate(&mut child, ctx.grace).await;
                return Err(Error::Cancelled);
            }
            read = stdout.read(&mut out_chunk), if out_open => match read? {
                0 => {
                    out_open = false;
                    if let Some(line) = out_lines.finish() {
                        on_stdout(&line);
                    }
                }
                n => {
                    for line in out_lines.push(&out_chunk[..n]) {
                        on_stdout(&line);
                    }
                }
            },
            read = stderr.read(&mut err_chunk), if err_open => match read? {
                0 => {
                    err_open = false;
                    if let Some(line) = err_lines.finish() {
                        on_stderr(line, &mut stderr_tail);
                    }
                }
                n => {
                    for line in err_lines.push(&err_chunk[..n]) {
                        on_stderr(line, &mut stderr_tail);
                    }
                }
            },
        }
    }

    let status = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => {
            terminate(&mut child, ctx.grace).await;
            return Err(Error::Cancelled);
        }
        status = child.wait() => status?,
    };

    let exit = match status.code() {
        Some(code) => Exit::Code(code),
        None => Exit::Signal,
    };
    log::debug!("{} finished: {:?}", invocation.program_name(), exit);

    Ok(Finished {
        exit,
        stderr: stderr_tail.join("\n"),
    })
}

fn spawn(invocation: &Invocation) -> Result<Child> {
    let program = which::which(&invocation.tool.program).map_err(|e| Error::Spawn {
        program: invocation.program_name(),
        detail: e.to_string(),
    })?;

    log::debug!("running {}", invocation.command_line());

    let mut command = Command::new(program);
    command
        .args(&invocation.tool.leading_args)
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &invocation.current_dir {
        command.current_dir(dir);
    }

    command.spawn().map_err(|e| Error::Spawn {
        program: invocation.program_name(),
        detail: e.to_string(),
    })
}

async fn terminate(child: &mut Child, grace: Duration) {
    if request_exit(child) {
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(_) => return,
            Err(_) => log::warn!("process ignored SIGTERM for {:?}, killing", grace),
        }
    }
    if let Err(e) = child.kill().await {
        log::warn!("failed to kill archiver process: {e}");
    }
}

#[cfg(unix)]
fn request_exit(child: &Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    // SAFETY: pid belongs to our own child, which has not been reaped yet
    // because `child.id()` still returned it.
    unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn request_exit(_child: &Child) -> bool {
    false
}
