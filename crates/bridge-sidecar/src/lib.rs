//! Sidecar entry flow shared by `cc-bridge` and `codex-bridge`
//!
//! A sidecar reads one task config from stdin, runs a single backend to
//! completion and writes NDJSON events to stdout or `--output-file`. Every
//! exit path ends with exactly one terminal event and, for file output, a
//! `.done` marker next to the file.

use std::path::PathBuf;

use anyhow::Context;
use tokio::io::BufReader;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use bridge_core::{
    read_task_config, touch_sentinel, Event, OutputSink, OutputTarget, SignalListener, Supervisor,
    EXIT_FAILURE,
};
use bridge_runner::{run_backend, BridgeError, CliDriver, SdkDriver};

/// Command-line flags common to both sidecars
#[derive(Debug, Clone, Default, clap::Args)]
pub struct BridgeArgs {
    /// Write events to this file instead of stdout; `.done` is created next to it on exit
    #[arg(long, value_name = "PATH")]
    pub output_file: Option<PathBuf>,
}

/// Which backend a sidecar drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Claude agent SDK stream
    Sdk,
    /// Codex CLI
    Cli,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sdk => "claude",
            Self::Cli => "codex",
        }
    }
}

/// Log to stderr; stdout may carry the event stream
///
/// Filter comes from `RUST_LOG`, defaulting to `warn`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

enum Outcome {
    Finished(Result<Event, BridgeError>),
    Signalled(i32),
}

/// Run one sidecar session and return the process exit code
pub async fn run_sidecar(backend: Backend, args: BridgeArgs) -> i32 {
    let run_id = Uuid::new_v4();
    let span = info_span!("bridge", %run_id, backend = backend.name());
    run(backend, args).instrument(span).await
}

async fn run(backend: Backend, args: BridgeArgs) -> i32 {
    // Registered first so that a signal during config intake is observed
    let mut signals = match SignalListener::install() {
        Ok(signals) => Some(signals),
        Err(e) => {
            warn!("Failed to install signal handlers: {}", e);
            None
        }
    };

    let target = OutputTarget::from_option(args.output_file);
    let sentinel = target.sentinel_path();
    let sink = match open_sink(&target) {
        Ok(sink) => sink,
        Err(e) => {
            error!("{:#}", e);
            if let Some(path) = &sentinel {
                if let Err(e) = touch_sentinel(path) {
                    warn!("Failed to create sentinel {}: {}", path.display(), e);
                }
            }
            return EXIT_FAILURE;
        }
    };
    let supervisor = Supervisor::new(sink, sentinel);

    let outcome = tokio::select! {
        result = execute(backend, &supervisor) => Outcome::Finished(result),
        signum = next_signal(&mut signals) => Outcome::Signalled(signum),
    };

    let code = match outcome {
        Outcome::Finished(Ok(event)) => {
            info!(kind = event.kind(), "backend finished");
            supervisor.complete(event)
        }
        Outcome::Finished(Err(e)) => {
            error!("{}", e);
            supervisor.fail(e.to_string())
        }
        Outcome::Signalled(signum) => {
            warn!(signum, "terminating on signal");
            supervisor.on_signal(signum)
        }
    };
    let code = code.unwrap_or(EXIT_FAILURE);
    info!(code, sentinel = ?supervisor.sentinel_path(), "exiting");
    code
}

fn open_sink(target: &OutputTarget) -> anyhow::Result<OutputSink> {
    OutputSink::open(target).with_context(|| match target {
        OutputTarget::Stdout => "failed to open stdout".to_string(),
        OutputTarget::File(path) => format!("failed to open output file {}", path.display()),
    })
}

async fn execute(backend: Backend, supervisor: &Supervisor) -> Result<Event, BridgeError> {
    let mut stdin = BufReader::new(tokio::io::stdin());
    let config = read_task_config(&mut stdin).await?;
    info!(mode = ?config.execution_mode, "config accepted");

    match backend {
        Backend::Sdk => run_backend(SdkDriver::new(config), supervisor).await,
        Backend::Cli => run_backend(CliDriver::new(config), supervisor).await,
    }
}

async fn next_signal(signals: &mut Option<SignalListener>) -> i32 {
    match signals {
        Some(signals) => signals.recv().await,
        None => std::future::pending().await,
    }
}
