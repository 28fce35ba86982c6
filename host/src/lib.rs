// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Host bindings for `crashlog`.
//!
//! Wires the core crash pipeline to a simulated platform: a device registry
//! with console routing, a flash image for the log store, a recovery file
//! on the host filesystem and process-level halting.

pub mod config;
pub mod console;
pub mod errors;
pub mod manager;
pub mod panic_hook;
pub mod platform;
pub mod producers;
pub mod recovery;
pub mod telemetry;

pub use config::{CrashlogConfig, HaltMode, ProducerToggles};
pub use errors::{CrashlogError, Result};
pub use manager::{Collaborators, LogManager};
pub use platform::{HostPlatform, ProcessExit};
pub use recovery::{recover_abort_log, RecoveryReport};
