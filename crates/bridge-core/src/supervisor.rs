//! Lifecycle supervision: one terminal event, one sentinel, one exit code

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::event::Event;
use crate::sink::OutputSink;

/// Exit code for application-level failures
pub const EXIT_FAILURE: i32 = 1;

/// Lifecycle state of a sidecar run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    ShuttingDown,
}

/// Owns the output sink, the sentinel path and the shutdown guard
///
/// Every exit path goes through [`Supervisor::complete`] or
/// [`Supervisor::on_signal`]. The first caller moves the run to
/// `ShuttingDown`, writes the terminal event, creates the sentinel and gets
/// the exit code back; later callers get `None` and must not write anything.
pub struct Supervisor {
    sink: OutputSink,
    sentinel: Option<PathBuf>,
    shutting_down: AtomicBool,
}

impl Supervisor {
    pub fn new(sink: OutputSink, sentinel: Option<PathBuf>) -> Self {
        Self {
            sink,
            sentinel,
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> LifecycleState {
        if self.shutting_down.load(Ordering::SeqCst) {
            LifecycleState::ShuttingDown
        } else {
            LifecycleState::Running
        }
    }

    pub fn sentinel_path(&self) -> Option<&Path> {
        self.sentinel.as_deref()
    }

    /// Forward a progress event while the run is live
    pub fn emit(&self, event: &Event) {
        if self.state() == LifecycleState::ShuttingDown {
            debug!(kind = event.kind(), "dropping event after shutdown");
            return;
        }
        if let Err(e) = self.sink.write_event(event) {
            warn!("Failed to write {} event: {}", event.kind(), e);
        }
    }

    /// Finish the run with a terminal `result` or `error` event
    ///
    /// Returns the process exit code, or `None` when shutdown was already
    /// claimed.
    pub fn complete(&self, event: Event) -> Option<i32> {
        let code = match event {
            Event::Result { .. } => 0,
            _ => EXIT_FAILURE,
        };
        self.shutdown(&event, code)
    }

    /// Finish the run with an `error` event
    pub fn fail(&self, message: impl Into<String>) -> Option<i32> {
        self.complete(Event::error(message))
    }

    /// Termination signal handler; a no-op once shutdown has begun
    pub fn on_signal(&self, signum: i32) -> Option<i32> {
        let event = Event::error(format!("bridge terminated by signal {}", signum));
        self.shutdown(&event, 128 + signum)
    }

    fn shutdown(&self, event: &Event, code: i32) -> Option<i32> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            debug!(kind = event.kind(), "shutdown already claimed");
            return None;
        }

        info!(kind = event.kind(), code, "shutting down");
        if let Err(e) = self.sink.write_event(event) {
            warn!("Failed to write terminal {} event: {}", event.kind(), e);
        }
        if let Some(path) = &self.sentinel {
            if let Err(e) = touch_sentinel(path) {
                warn!("Failed to create sentinel {}: {}", path.display(), e);
            }
        }
        Some(code)
    }
}

/// Create the zero-byte completion marker
pub fn touch_sentinel(path: &Path) -> io::Result<()> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    Ok(())
}

/// Termination signals the sidecar reacts to
///
/// Handlers are registered on construction, so build this before any other
/// work so that a signal during config intake is caught too.
#[cfg(unix)]
pub struct SignalListener {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalListener {
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            terminate: signal(SignalKind::from_raw(libc::SIGTERM))?,
            interrupt: signal(SignalKind::from_raw(libc::SIGINT))?,
            hangup: signal(SignalKind::from_raw(libc::SIGHUP))?,
        })
    }

    /// Wait for the next signal and return its number
    ///
    /// When several are already pending the order is SIGTERM, SIGINT, SIGHUP.
    pub async fn recv(&mut self) -> i32 {
        tokio::select! {
            biased;
            _ = self.terminate.recv() => libc::SIGTERM,
            _ = self.interrupt.recv() => libc::SIGINT,
            _ = self.hangup.recv() => libc::SIGHUP,
        }
    }
}

#[cfg(not(unix))]
pub struct SignalListener;

#[cfg(not(unix))]
impl SignalListener {
    pub fn install() -> io::Result<Self> {
        Ok(Self)
    }

    /// Wait for Ctrl-C, reported as SIGINT (2)
    pub async fn recv(&mut self) -> i32 {
        match tokio::signal::ctrl_c().await {
            Ok(()) => 2,
            Err(_) => std::future::pending().await,
        }
    }
}
