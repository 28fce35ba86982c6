// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Boot recovery
//!
//! Drains records left in the log store by a previous crash into a plain
//! file, then clears the store. Runs once per boot, before the sink accepts
//! new writes.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crashlog::store::LogStore;

use crate::errors::{CrashlogError, Result};
use crate::telemetry::{RECOVERED_BYTES, RECOVERED_RECORDS, RECOVERY_DURATION, STORE_PENDING};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub records: usize,
    pub bytes: u64,
    /// `None` when the store was empty and no file was written.
    pub path: Option<PathBuf>,
}

/// Streams every pending record into `path` (truncating it) and clears the
/// store. On any file error the store is left untouched so the next boot
/// can try again.
pub fn recover_abort_log(store: &dyn LogStore, path: &Path) -> Result<RecoveryReport> {
    let pending = store.count_pending();
    metrics::gauge!(STORE_PENDING, pending as f64);
    if pending == 0 {
        tracing::debug!("No crash records pending");
        return Ok(RecoveryReport::default());
    }

    tracing::info!("Recovering {} crash record(s) into {:?}", pending, path);
    let start = Instant::now();
    let file_err = |source: io::Error| CrashlogError::Recovery {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(file_err)?;
    let mut writer = BufWriter::new(file);
    let mut records = 0usize;
    let mut bytes = 0u64;
    let mut write_err = None;

    store.iterate(&mut |record| match writer.write_all(record.payload) {
        Ok(()) => {
            records += 1;
            bytes += record.len() as u64;
            ControlFlow::Continue(())
        }
        Err(e) => {
            write_err = Some(e);
            ControlFlow::Break(())
        }
    })?;
    if let Some(e) = write_err {
        return Err(file_err(e));
    }

    let file = writer.into_inner().map_err(|e| file_err(e.into_error()))?;
    file.sync_all().map_err(file_err)?;
    drop(file);

    store.clear()?;

    metrics::counter!(RECOVERED_RECORDS, records as u64);
    metrics::counter!(RECOVERED_BYTES, bytes);
    metrics::histogram!(RECOVERY_DURATION, start.elapsed().as_secs_f64());
    tracing::info!("Recovered {} record(s), {} bytes, into {:?}", records, bytes, path);

    Ok(RecoveryReport {
        records,
        bytes,
        path: Some(path.to_path_buf()),
    })
}
