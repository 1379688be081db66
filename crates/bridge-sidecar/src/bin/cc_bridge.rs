//! cc-bridge: runs one task through the Claude agent SDK stream

use clap::Parser;

use bridge_sidecar::{init_tracing, run_sidecar, Backend, BridgeArgs};

#[derive(Parser)]
#[command(name = "cc-bridge")]
#[command(about = "Run one Claude task and stream bridge events")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    args: BridgeArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let code = run_sidecar(Backend::Sdk, cli.args).await;
    std::process::exit(code);
}
