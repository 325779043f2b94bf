//! External encoder invocation
//!
//! Every encoder (`toktx`, `gltf-transform`) runs as an isolated child
//! process through [`Tool::run`]: stdout is discarded, stderr is captured so
//! a failure carries the encoder's own message, and a hung encoder is killed
//! once the configured timeout elapses.

pub mod gltf_transform;
pub mod ktx;

use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STDERR_TAIL_LINES: usize = 12;

/// An external program with a bounded run time.
#[derive(Debug, Clone)]
pub struct Tool {
    program: String,
    timeout: Option<Duration>,
}

impl Tool {
    /// `timeout` of `None` waits forever.
    pub fn new(program: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Probe with `--version`. Any exit status counts; only a failed spawn does not.
    pub fn is_available(&self) -> bool {
        let child = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match child {
            Ok(mut child) => self.wait(&mut child).is_ok(),
            Err(e) => {
                tracing::debug!("`{}` is not available: {e}", self.program);
                false
            }
        }
    }

    /// Run to completion; non-zero exit, spawn failure and timeout are errors.
    pub fn run<I, S>(&self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        tracing::debug!(
            "$ {} {}",
            self.program,
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut stderr = tempfile::tempfile()?;
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr.try_clone()?))
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let status = self.wait(&mut child)?;
        if status.success() {
            return Ok(());
        }
        Err(Error::ToolFailed {
            tool: self.program.clone(),
            status: status.to_string(),
            stderr: read_tail(&mut stderr),
        })
    }

    fn spawn_error(&self, err: io::Error) -> Error {
        if err.kind() == io::ErrorKind::NotFound {
            Error::ToolNotFound {
                tool: self.program.clone(),
            }
        } else {
            Error::Io(err)
        }
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            let now = Instant::now();
            if now >= deadline {
                if let Err(e) = child.kill() {
                    tracing::warn!("Failed to kill `{}`: {e}", self.program);
                }
                let _ = child.wait();
                return Err(Error::ToolTimedOut {
                    tool: self.program.clone(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

fn read_tail(file: &mut File) -> String {
    let mut text = String::new();
    if file.seek(SeekFrom::Start(0)).is_err() || file.read_to_string(&mut text).is_err() {
        return String::new();
    }
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(timeout: Option<Duration>) -> Tool {
        Tool::new("sh", timeout)
    }

    #[test]
    fn test_run_success() {
        sh(None).run(["-c", "exit 0"]).unwrap();
    }

    #[test]
    fn test_run_failure_captures_stderr() {
        let err = sh(None)
            .run(["-c", "echo 'bad input' >&2; exit 3"])
            .unwrap_err();
        match err {
            Error::ToolFailed { stderr, .. } => assert_eq!(stderr, "bad input"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_run_timeout_kills_child() {
        let started = Instant::now();
        let err = sh(Some(Duration::from_millis(200)))
            .run(["-c", "sleep 5"])
            .unwrap_err();
        assert!(matches!(err, Error::ToolTimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_missing_tool() {
        let tool = Tool::new("assetpack-no-such-encoder", None);
        assert!(!tool.is_available());
        assert!(matches!(tool.run(["x"]), Err(Error::ToolNotFound { .. })));
    }
}
