//! Bridge Runner - backend drivers for the agent bridge sidecars
//!
//! This crate spawns an agent backend (Claude, Codex), reads its JSON-lines
//! stream and reduces it to the canonical bridge events.

pub mod driver;
mod error;
pub mod parser;
mod process;
pub mod tools;

pub use driver::cli::CliDriver;
pub use driver::sdk::SdkDriver;
pub use driver::{drive, run_backend, AgentBackend};
pub use error::{BridgeError, Result};
pub use process::{AgentProcess, CommandSpec, ProcessExit, UpstreamSource};
