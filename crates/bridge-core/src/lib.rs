//! Core library for the agent bridge sidecars
//!
//! This crate holds the protocol contract shared by every backend driver:
//! - Canonical events and their NDJSON sink
//! - Task config intake
//! - Lifecycle supervision (terminal event, sentinel, signals)

pub mod config;
pub mod error;
pub mod event;
pub mod sink;
pub mod supervisor;

pub use config::{read_task_config, ExecutionMode, TaskConfig, PLAN_MODE_DIRECTIVE};
pub use error::ConfigError;
pub use event::Event;
pub use sink::{sentinel_path_for, OutputSink, OutputTarget, SENTINEL_FILE_NAME};
pub use supervisor::{touch_sentinel, LifecycleState, SignalListener, Supervisor, EXIT_FAILURE};
