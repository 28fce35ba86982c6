// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use alloc::string::String;
use thiserror::Error;

/// Failures reported by the persistent log store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The medium could not be prepared (bad partition, corrupt metadata, bad bounds).
    #[error("store initialization failed: {0}")]
    InitFailed(String),
    /// The region is exhausted or the record cannot fit a record slot.
    #[error("store is full")]
    Full,
    #[error("store I/O error: {0}")]
    Io(String),
}

/// Failures reported by the character device layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("operation not supported")]
    Unsupported,
    #[error("device not found: {0}")]
    NotFound(String),
    #[error("device already registered: {0}")]
    AlreadyRegistered(String),
}

pub type StoreResult<T> = core::result::Result<T, StoreError>;
pub type DeviceResult<T> = core::result::Result<T, DeviceError>;
