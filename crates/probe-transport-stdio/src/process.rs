//! Server process supervision.
//!
//! A [`ServerProcess`] is the single owner of the child. It is created
//! once by [`ServerProcess::start`] and released once by
//! [`ServerProcess::stop`], which consumes it. If the owner is dropped
//! without stopping (panic, cancelled future) the child is killed by
//! tokio's `kill_on_drop`.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::transport::LineTransport;

/// Executable, fixed arguments and environment for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    /// Executable name or path.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Working directory, if not inherited.
    pub working_dir: Option<PathBuf>,
}

impl ServerCommand {
    /// Creates a command with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            working_dir: None,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Program and arguments joined for display.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How the server went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// The process had already exited before termination was requested.
    pub already_exited: bool,
    /// The grace period expired and the process was killed.
    pub forced: bool,
}

/// A running server under test.
pub struct ServerProcess {
    child: Child,
    program: String,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl std::fmt::Debug for ServerProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerProcess")
            .field("program", &self.program)
            .field("pid", &self.child.id())
            .finish()
    }
}

impl ServerProcess {
    /// Launches the server with stdin, stdout and stderr piped.
    pub fn start(command: &ServerCommand) -> Result<Self, TransportError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| TransportError::Launch {
            program: command.program.clone(),
            reason: e.to_string(),
            not_found: e.kind() == ErrorKind::NotFound,
        })?;

        info!(
            program = %command.display(),
            pid = ?child.id(),
            "server process spawned"
        );

        Ok(Self {
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
            child,
            program: command.program.clone(),
        })
    }

    /// OS process id, if the process has not been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Takes the stdin/stdout pair as a line transport. Succeeds once.
    pub fn take_transport(
        &mut self,
    ) -> Result<LineTransport<ChildStdout, ChildStdin>, TransportError> {
        let stdout = self
            .stdout
            .take()
            .ok_or(TransportError::PipeUnavailable("stdout"))?;
        let stdin = self
            .stdin
            .take()
            .ok_or(TransportError::PipeUnavailable("stdin"))?;
        Ok(LineTransport::new(stdout, stdin))
    }

    /// Takes the stderr pipe. Succeeds once.
    pub fn take_stderr(&mut self) -> Result<ChildStderr, TransportError> {
        self.stderr
            .take()
            .ok_or(TransportError::PipeUnavailable("stderr"))
    }

    /// Terminates the server and waits for it to exit.
    ///
    /// Sends SIGTERM (unix) and waits up to `grace`; if the process is
    /// still alive it is killed and reaped.
    pub async fn stop(mut self, grace: Duration) -> Result<ShutdownReport, TransportError> {
        // Pipes we still hold are closed first.
        drop(self.stdin.take());
        drop(self.stdout.take());
        drop(self.stderr.take());

        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(program = %self.program, ?status, "server already exited");
                return Ok(ShutdownReport {
                    exit_code: status.code(),
                    already_exited: true,
                    forced: false,
                });
            }
            Ok(None) => {}
            Err(e) => return Err(TransportError::Shutdown(e.to_string())),
        }

        self.signal_terminate();

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(program = %self.program, ?status, "server exited after termination signal");
                return Ok(ShutdownReport {
                    exit_code: status.code(),
                    already_exited: false,
                    forced: false,
                });
            }
            Ok(Err(e)) => return Err(TransportError::Shutdown(e.to_string())),
            Err(_) => {
                warn!(
                    program = %self.program,
                    grace_ms = grace.as_millis() as u64,
                    "server ignored termination signal, killing"
                );
            }
        }

        self.child
            .start_kill()
            .map_err(|e| TransportError::Shutdown(e.to_string()))?;
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => Ok(ShutdownReport {
                exit_code: status.code(),
                already_exited: false,
                forced: true,
            }),
            Ok(Err(e)) => Err(TransportError::Shutdown(e.to_string())),
            Err(_) => Err(TransportError::Shutdown(format!(
                "process did not exit {}ms after kill",
                grace.as_millis()
            ))),
        }
    }

    #[cfg(unix)]
    fn signal_terminate(&mut self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            return;
        };
        debug!(pid, "sending SIGTERM");
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            warn!(pid, error = %e, "SIGTERM failed");
        }
    }

    #[cfg(not(unix))]
    fn signal_terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            warn!(error = %e, "terminate failed");
        }
    }
}
