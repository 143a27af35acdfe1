//! Subprocess shunt: spawns a child process and exposes its stdin/stdout
//! (and, optionally, stderr) as pipe shunts, plus a side channel reporting
//! its exit status as a `stream.end`/`exec.run_error` control event.

use std::process::{Child, Command, Stdio};

use flow_core::event::{codes, DetailedEvent};
use tracing::warn;

use crate::options::ShuntOptions;
use crate::pipe::{PipeDirection, PipeShunt};

/// The three shunts wired to a spawned child's standard streams, plus a
/// handle used to report its exit status once the pipes have drained.
pub struct ProcessShunts {
    pub stdin: PipeShunt,
    pub stdout: PipeShunt,
    pub stderr: Option<PipeShunt>,
    child: Child,
}

impl ProcessShunts {
    /// Spawns `command`, wiring its stdio as pipe shunts. `capture_stderr`
    /// controls whether stderr is piped back (as its own shunt) or
    /// inherited from the parent.
    pub fn spawn(mut command: Command, capture_stderr: bool, options: ShuntOptions) -> crate::error::Result<Self> {
        command.stdin(Stdio::piped()).stdout(Stdio::piped());
        command.stderr(if capture_stderr { Stdio::piped() } else { Stdio::inherit() });

        let program = format!("{command:?}");
        let mut child = command.spawn().map_err(|source| crate::error::ShuntError::Spawn {
            command: program,
            source,
        })?;

        #[cfg(unix)]
        let (stdin, stdout, stderr) = {
            use std::os::unix::io::{FromRawFd, IntoRawFd, OwnedFd};
            let stdin_fd = unsafe { OwnedFd::from_raw_fd(child.stdin.take().expect("piped stdin").into_raw_fd()) };
            let stdout_fd = unsafe { OwnedFd::from_raw_fd(child.stdout.take().expect("piped stdout").into_raw_fd()) };
            let stderr_fd = if capture_stderr {
                Some(unsafe { OwnedFd::from_raw_fd(child.stderr.take().expect("piped stderr").into_raw_fd()) })
            } else {
                None
            };

            let stdin = PipeShunt::new("process.stdin", stdin_fd, PipeDirection::Write, options)?;
            let stdout = PipeShunt::new("process.stdout", stdout_fd, PipeDirection::Read, options)?;
            let stderr = stderr_fd
                .map(|fd| PipeShunt::new("process.stderr", fd, PipeDirection::Read, options))
                .transpose()?;
            (stdin, stdout, stderr)
        };

        #[cfg(not(unix))]
        compile_error!("flow-shunt's process module currently targets unix pipe semantics only");

        Ok(Self {
            stdin,
            stdout,
            stderr,
            child,
        })
    }

    /// Non-blocking poll of the child's exit status; `None` while still
    /// running.
    pub fn try_wait(&mut self) -> std::io::Result<Option<std::process::ExitStatus>> {
        self.child.try_wait()
    }

    /// Classifies a finished child's exit status into the event vocabulary.
    #[must_use]
    pub fn exit_event(status: std::process::ExitStatus) -> DetailedEvent {
        if status.success() {
            DetailedEvent::stream_end()
        } else {
            DetailedEvent::new(
                format!("child process exited with {status}"),
                [(codes::EXEC, codes::EXEC_RUN_ERROR)],
            )
        }
    }
}

impl Drop for ProcessShunts {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            if let Err(e) = self.child.kill() {
                warn!(error = %e, "failed to kill still-running child process on shunt teardown");
            }
        }
    }
}
