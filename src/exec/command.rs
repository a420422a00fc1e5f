// src/exec/command.rs

//! Shell command executor.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dag::StepSpec;
use crate::exec::executor::{ExecFuture, ExecOutput, StepExecutor};
use crate::sink::StatusSink;

/// How many trailing output lines are kept as the attempt's message.
pub const OUTPUT_TAIL_LINES: usize = 30;

/// Executes a step's `cmd` through the platform shell.
///
/// - The step context (`env` plus `NODE_ID`) is added to the inherited
///   environment.
/// - stdout and stderr are both captured line by line; every line is
///   forwarded to the optional log sink as it arrives and the last
///   [`OUTPUT_TAIL_LINES`] become the output excerpt.
/// - On unix the shell leads its own process group. Dropping the returned
///   future (a per-attempt timeout) kills the whole group, so commands the
///   shell started do not outlive the attempt.
#[derive(Default, Clone)]
pub struct CommandExecutor {
    working_dir: Option<PathBuf>,
    log_sink: Option<Arc<dyn StatusSink>>,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every command from this directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Stream live output lines to this sink.
    pub fn with_log_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    fn build_command(&self, step: &StepSpec) -> Command {
        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&step.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&step.cmd);
            c
        };

        cmd.envs(step.context())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    async fn run_command(&self, step: &StepSpec) -> anyhow::Result<ExecOutput> {
        info!(step = %step.name, cmd = %step.cmd, "starting step process");

        let mut child = self
            .build_command(step)
            .spawn()
            .with_context(|| format!("spawning process for step '{}'", step.name))?;
        #[cfg(unix)]
        let mut group = child.id().map(ProcessGroupGuard::new);

        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, line_tx.clone()));
        }
        drop(line_tx);

        // Drain until both pipes close, then reap the child.
        let mut tail: VecDeque<String> = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
        while let Some(line) = line_rx.recv().await {
            if let Some(sink) = &self.log_sink {
                sink.on_log_line(&step.name, &line);
            }
            if tail.len() == OUTPUT_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of step '{}'", step.name))?;
        #[cfg(unix)]
        if let Some(group) = group.as_mut() {
            group.disarm();
        }

        let code = status.code().unwrap_or(-1);
        info!(
            step = %step.name,
            exit_code = code,
            success = status.success(),
            "step process exited"
        );

        let mut output = tail.into_iter().collect::<Vec<_>>().join("\n");
        if !status.success() {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&format!("exited with status {code}"));
        }

        Ok(ExecOutput {
            success: status.success(),
            output,
        })
    }
}

impl StepExecutor for CommandExecutor {
    fn run<'a>(&'a self, step: &'a StepSpec) -> ExecFuture<'a> {
        Box::pin(self.run_command(step))
    }
}

/// Sends `SIGKILL` to a step's process group when dropped while armed.
#[cfg(unix)]
struct ProcessGroupGuard {
    pgid: libc::pid_t,
    armed: bool,
}

#[cfg(unix)]
impl ProcessGroupGuard {
    fn new(pid: u32) -> Self {
        Self {
            pgid: pid as libc::pid_t,
            armed: true,
        }
    }

    /// The shell exited on its own; leave the group alone.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

#[cfg(unix)]
impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!(pgid = self.pgid, "killing process group of abandoned step");
        // SAFETY: killpg takes plain integers and only sends a signal; a
        // group that already exited yields ESRCH, which is ignored.
        unsafe {
            libc::killpg(self.pgid, libc::SIGKILL);
        }
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim_end();
                if line.is_empty() {
                    continue;
                }
                if tx.send(line.to_string()).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "stopped reading step output");
                break;
            }
        }
    }
}
