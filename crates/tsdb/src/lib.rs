// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Time-series log store on a simulated flash partition.
//!
//! Reference storage engine for `crashlog`: fixed-size erase sectors,
//! records packed behind a crc64-sealed header, append-only until the
//! region is full. No wear leveling and no rollover.

pub mod layout;
pub mod partition;
pub mod tsdb;

pub use partition::{FilePartition, FlashPartition, PartitionTable, RamPartition};
pub use tsdb::{TsDb, TsDbBuilder};
