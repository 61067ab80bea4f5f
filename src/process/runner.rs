use crate::error::SessionError;
use crate::local_logger::suspend_progress_bar;
use crate::logger::CHILD_OUTPUT_TARGET;
use crate::prelude::*;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io::Write;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};

/// Where the standard output of a child goes.
///
/// Standard error is always forwarded to the supervisor's own stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPolicy {
    /// Write every chunk to the inherited stdout as soon as it is read.
    Forward,
    /// Keep every chunk in memory, in arrival order, and hand the text over on exit.
    Accumulate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationRequest {
    /// SIGINT, lets the child flush its state and exit on its own.
    Graceful,
    /// SIGKILL.
    Forced,
}

/// Sends termination requests to a running child.
///
/// Requests are only delivered while the child has not been reaped, so a recycled pid can
/// never be signaled.
#[derive(Debug, Clone)]
pub struct ChildControl {
    requests: mpsc::UnboundedSender<TerminationRequest>,
}

impl ChildControl {
    /// Returns `false` if the child has already terminated, in which case nothing is sent.
    pub fn request(&self, request: TerminationRequest) -> bool {
        self.requests.send(request).is_ok()
    }

    pub fn is_terminated(&self) -> bool {
        self.requests.is_closed()
    }
}

/// What a child left behind once it terminated.
#[derive(Debug)]
pub struct ChildExit {
    /// `None` if the status could not be collected.
    pub status: Option<ExitStatus>,
    /// The accumulated stdout, only under [`OutputPolicy::Accumulate`].
    pub output: Option<String>,
}

impl ChildExit {
    pub fn describe(&self) -> String {
        match self.status {
            Some(status) => match (status.code(), status.signal()) {
                (Some(code), _) => format!("exit code {code}"),
                (None, Some(signal)) => format!("signal {signal}"),
                (None, None) => "unknown status".to_string(),
            },
            None => "unknown status".to_string(),
        }
    }
}

pub struct ChildHandle {
    command: String,
    pid: Option<u32>,
    control: ChildControl,
    exit: oneshot::Receiver<ChildExit>,
}

impl ChildHandle {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn control(&self) -> ChildControl {
        self.control.clone()
    }

    /// Resolves once, when the child has terminated and its output streams are drained.
    pub async fn wait(self) -> ChildExit {
        self.exit.await.unwrap_or(ChildExit {
            status: None,
            output: None,
        })
    }
}

/// Human readable rendering of a command, used in logs and errors.
pub fn display_command(cmd: &Command) -> String {
    let cmd = cmd.as_std();
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|part| part.to_string_lossy())
        .join(" ")
}

/// Spawn `cmd` with piped output handled according to `policy`.
///
/// Spawning does not block: the output is pumped and the child is awaited by background tasks,
/// and the returned handle resolves when the child terminates. A non-zero exit is not an error.
pub fn spawn(mut cmd: Command, policy: OutputPolicy) -> Result<ChildHandle, SessionError> {
    let command = display_command(&cmd);
    debug!("Spawning `{command}` ({policy:?})");

    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| SessionError::Spawn {
            command: command.clone(),
            source,
        })?;
    let pid = child.id();

    let stdout = child.stdout.take().map(|stdout| {
        tokio::spawn(async move {
            match policy {
                OutputPolicy::Forward => pump(stdout, std::io::stdout(), "").await.map(|_| vec![]),
                OutputPolicy::Accumulate => accumulate(stdout).await,
            }
        })
    });
    let stderr = child.stderr.take().map(|stderr| {
        tokio::spawn(async move { pump(stderr, std::io::stderr(), "[stderr]").await })
    });

    let (request_tx, mut request_rx) = mpsc::unbounded_channel();
    let (exit_tx, exit_rx) = oneshot::channel();
    let task_command = command.clone();
    tokio::spawn(async move {
        let status = loop {
            tokio::select! {
                status = child.wait() => break status,
                Some(request) = request_rx.recv() => deliver(&mut child, request),
            }
        };
        // Closed before the exit notification so that the child is seen as terminated by then.
        drop(request_rx);

        let status = match status {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("Failed to wait for `{task_command}`: {e}");
                None
            }
        };

        let mut stdout_bytes = vec![];
        if let Some(stdout) = stdout {
            match stdout.await {
                Ok(Ok(bytes)) => stdout_bytes = bytes,
                Ok(Err(e)) => warn!("Failed to read the output of `{task_command}`: {e}"),
                Err(e) => warn!("Output task of `{task_command}` failed: {e}"),
            }
        }
        if let Some(stderr) = stderr {
            if let Ok(Err(e)) = stderr.await {
                warn!("Failed to read the error output of `{task_command}`: {e}");
            }
        }

        let exit = ChildExit {
            status,
            output: (policy == OutputPolicy::Accumulate)
                .then(|| String::from_utf8_lossy(&stdout_bytes).into_owned()),
        };
        debug!("`{task_command}` terminated with {}", exit.describe());
        let _ = exit_tx.send(exit);
    });

    Ok(ChildHandle {
        command,
        pid,
        control: ChildControl {
            requests: request_tx,
        },
        exit: exit_rx,
    })
}

fn deliver(child: &mut Child, request: TerminationRequest) {
    let Some(pid) = child.id() else {
        return;
    };

    let result = match request {
        TerminationRequest::Graceful => {
            signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT).map_err(std::io::Error::from)
        }
        TerminationRequest::Forced => child.start_kill(),
    };
    match result {
        Ok(()) => debug!("Sent {request:?} termination request to pid {pid}"),
        Err(e) => warn!("Failed to send {request:?} termination request to pid {pid}: {e}"),
    }
}

/// Copy `reader` to `writer` as it arrives, flushing whole lines so that the child's output
/// interleaves cleanly with the supervisor's own log lines.
async fn pump(
    mut reader: impl AsyncRead + Unpin,
    mut writer: impl Write,
    log_prefix: &str,
) -> std::io::Result<()> {
    let mut buffer = [0; 1024];
    let mut line_buffer = Vec::new();

    loop {
        let bytes_read = reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            if !line_buffer.is_empty() {
                write_through(&mut writer, &line_buffer, log_prefix)?;
            }
            break;
        }

        line_buffer.extend_from_slice(&buffer[..bytes_read]);

        if let Some(last_newline_pos) = line_buffer.iter().rposition(|&b| b == b'\n' || b == b'\r')
        {
            write_through(&mut writer, &line_buffer[..=last_newline_pos], log_prefix)?;
            line_buffer.drain(..=last_newline_pos);
        }
    }
    Ok(())
}

fn write_through(writer: &mut impl Write, bytes: &[u8], log_prefix: &str) -> std::io::Result<()> {
    suspend_progress_bar(|| {
        writer.write_all(bytes)?;
        writer.flush()
    })?;
    trace!(
        target: CHILD_OUTPUT_TARGET,
        "{}{}",
        log_prefix,
        String::from_utf8_lossy(bytes)
    );
    Ok(())
}

async fn accumulate(mut reader: impl AsyncRead + Unpin) -> std::io::Result<Vec<u8>> {
    let mut buffer = [0; 1024];
    let mut accumulated = Vec::new();

    loop {
        let bytes_read = reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        trace!(target: CHILD_OUTPUT_TARGET, "received {bytes_read} bytes");
        accumulated.extend_from_slice(&buffer[..bytes_read]);
    }
    Ok(accumulated)
}
