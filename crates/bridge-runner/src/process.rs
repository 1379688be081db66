//! Backend process management

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::error::{BridgeError, Result};

/// Bytes of stderr kept for error reporting
const STDERR_TAIL_BYTES: usize = 8 * 1024;

/// Program, arguments and working directory of a backend invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, working_dir: PathBuf) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir,
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Push `flag value` when `value` is set
    pub fn opt(&mut self, flag: &str, value: Option<impl Into<String>>) -> &mut Self {
        if let Some(value) = value {
            self.args.push(flag.to_string());
            self.args.push(value.into());
        }
        self
    }

    /// Value following `flag`, if present
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

/// How the backend process ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code; `None` when killed by a signal
    pub code: Option<i32>,
    /// Trailing portion of everything written to stderr
    pub stderr: String,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A blocking source of raw upstream lines, consumed one at a time
#[async_trait]
pub trait UpstreamSource: Send {
    /// Next stdout line without its terminator; `None` once stdout closes
    async fn next_line(&mut self) -> Result<Option<String>>;

    /// Wait for the source to finish after its output is drained
    async fn wait(&mut self) -> Result<ProcessExit>;
}

/// A running backend process
pub struct AgentProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_handle: Option<JoinHandle<String>>,
}

impl AgentProcess {
    /// Spawn `spec` with stdout and stderr captured separately
    pub fn spawn(backend: &str, spec: &CommandSpec) -> Result<Self> {
        info!(
            "Spawning {} in {:?} with {} args",
            spec.program,
            spec.working_dir,
            spec.args.len()
        );

        // A missing cwd fails spawn with NotFound too; keep it apart from a missing binary
        if !spec.working_dir.is_dir() {
            return Err(BridgeError::working_dir_not_found(&spec.working_dir));
        }

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::spawn(backend, &spec.program, e))?;

        debug!(pid = ?child.id(), "{} started", backend);

        let stdout = child.stdout.take().ok_or_else(|| {
            BridgeError::Io(std::io::Error::other("failed to capture stdout"))
        })?;
        let stderr_handle = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(collect_stderr_tail(stderr, STDERR_TAIL_BYTES)));

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            stderr_handle,
        })
    }

    /// Get the process ID
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

#[async_trait]
impl UpstreamSource for AgentProcess {
    async fn next_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        if self.stdout.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buf);
        trace!("stdout: {}", line.trim_end());
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }

    async fn wait(&mut self) -> Result<ProcessExit> {
        let status = self.child.wait().await?;
        let stderr = match self.stderr_handle.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        debug!(code = ?status.code(), "backend exited");

        Ok(ProcessExit {
            code: status.code(),
            stderr,
        })
    }
}

/// Drain `reader` line by line, keeping roughly the last `limit` bytes
async fn collect_stderr_tail<R>(reader: R, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut tail: VecDeque<String> = VecDeque::new();
    let mut size = 0;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                trace!("stderr: {}", line.trim_end());
                size += line.len();
                tail.push_back(line);
                while size > limit && tail.len() > 1 {
                    if let Some(dropped) = tail.pop_front() {
                        size -= dropped.len();
                    }
                }
            }
        }
    }

    tail.into_iter().collect()
}
