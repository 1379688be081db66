//! Backend drivers
//!
//! A driver turns a [`TaskConfig`](bridge_core::TaskConfig) into a backend
//! command line, reduces the backend's stdout vocabulary to canonical
//! [`Event`]s and decides the terminal event once the process has exited.
//! The line loop itself is shared by every driver.

use tracing::{debug, info, warn};

use bridge_core::{Event, Supervisor};

use crate::error::Result;
use crate::process::{AgentProcess, CommandSpec, ProcessExit, UpstreamSource};

pub mod cli;
pub mod sdk;

/// One backend vocabulary
pub trait AgentBackend: Send {
    /// Short backend name used in messages (`claude`, `codex`)
    fn name(&self) -> &'static str;

    /// Program, arguments and working directory to launch
    fn command(&self) -> CommandSpec;

    /// Consume one non-blank stdout line, returning any events to forward
    fn handle_line(&mut self, line: &str) -> Vec<Event>;

    /// Decide the terminal event once stdout has closed and the process exited
    fn finish(self, exit: ProcessExit) -> Result<Event>
    where
        Self: Sized;
}

/// Spawn the backend and drive it to its terminal event
pub async fn run_backend<B>(backend: B, supervisor: &Supervisor) -> Result<Event>
where
    B: AgentBackend,
{
    let spec = backend.command();
    let mut process = AgentProcess::spawn(backend.name(), &spec)?;
    info!(pid = ?process.pid(), "{} running", backend.name());
    drive(backend, &mut process, supervisor).await
}

/// Feed every line of `source` through `backend`, forwarding events as they
/// are produced
pub async fn drive<B, S>(mut backend: B, source: &mut S, supervisor: &Supervisor) -> Result<Event>
where
    B: AgentBackend,
    S: UpstreamSource + ?Sized,
{
    let mut forwarded = 0usize;
    while let Some(line) = source.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        for event in backend.handle_line(&line) {
            // Only the supervisor writes terminal events
            if event.is_terminal() {
                warn!(
                    kind = event.kind(),
                    "{} produced a terminal event mid-stream",
                    backend.name()
                );
                continue;
            }
            supervisor.emit(&event);
            forwarded += 1;
        }
    }

    let exit = source.wait().await?;
    debug!(code = ?exit.code, forwarded, "{} stream closed", backend.name());
    backend.finish(exit)
}
