// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![no_std]

//! crashlog: crash capture and replay for resource-constrained firmware.
//!
//! While the system is healthy, console output is duplicated into a
//! flash-resident store through a virtual sink device. On a hard fault or
//! assertion failure the abort controller redirects the console to that
//! sink, drains a fixed list of diagnostic producers into it and halts.
//! The next boot replays the stored records into a plain log file.

extern crate alloc;

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod config;
pub mod error;
pub mod store;
pub mod device;
pub mod producer;
pub mod sink;
pub mod abort;

pub use abort::{AbortController, AbortState, BusyWait, Halt};
pub use device::{CharDevice, ConsoleRouter, ConsoleWriter, DeviceRegistry, OpenFlags};
pub use error::{DeviceError, StoreError, StoreResult};
pub use producer::{AbortTrigger, AssertInfo, DiagnosticProducer, FaultContext, ProducerKind, ProducerList};
pub use sink::VirtualSink;
pub use store::{LogRecord, LogStore, Visit};

#[cfg(test)]
pub mod tests;
