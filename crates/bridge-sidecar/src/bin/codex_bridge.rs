//! codex-bridge: runs one task through the Codex CLI

use clap::Parser;

use bridge_sidecar::{init_tracing, run_sidecar, Backend, BridgeArgs};

#[derive(Parser)]
#[command(name = "codex-bridge")]
#[command(about = "Run one Codex task and stream bridge events")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    args: BridgeArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let code = run_sidecar(Backend::Cli, cli.args).await;
    std::process::exit(code);
}
