//! Application orchestration module

pub mod execution;
pub mod initialization;

pub use execution::{run_relay, RunSummary};
pub use initialization::{configure_logging, load_configuration, resolve_listen_args};
