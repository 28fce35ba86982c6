// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::io;
use std::path::PathBuf;

use crashlog::error::{DeviceError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrashlogError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
    #[error("Recovery file {path:?} failed: {source}")]
    Recovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid config: {0}")]
    Config(String),
    #[error("Log manager already initialized")]
    AlreadyInitialized,
}

pub type Result<T> = std::result::Result<T, CrashlogError>;
