// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Persistent log store contract.
//!
//! The storage engine itself (sector management, wear, erase) lives outside
//! this crate. The sink and boot recovery only rely on this trait.

use core::ops::ControlFlow;

use crate::error::StoreResult;

/// Visitor verdict: `Continue(())` keeps iterating, `Break(())` stops.
pub type Visit = ControlFlow<()>;

/// One persisted log record, borrowed from the store during iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord<'a> {
    /// Sequence index assigned at append time. Restarts at zero every boot.
    pub seq: u64,
    pub payload: &'a [u8],
}

impl<'a> LogRecord<'a> {
    pub fn new(seq: u64, payload: &'a [u8]) -> Self {
        Self { seq, payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Append-only time-series store of raw log records.
///
/// Implementations serialize `append` internally; the sink may be written
/// from several call sites at once.
pub trait LogStore: Send + Sync {
    /// Appends one record. Every call is a synchronous write to the medium.
    fn append(&self, payload: &[u8]) -> StoreResult<()>;

    /// Number of records currently stored.
    fn count_pending(&self) -> usize;

    /// Visits records in append order until the visitor breaks.
    fn iterate(&self, visit: &mut dyn FnMut(LogRecord<'_>) -> Visit) -> StoreResult<()>;

    /// Removes every record. Idempotent.
    fn clear(&self) -> StoreResult<()>;

    /// Visits records whose sequence index lies in `[from, to]`, in append order.
    fn iterate_range(
        &self,
        from: u64,
        to: u64,
        visit: &mut dyn FnMut(LogRecord<'_>) -> Visit,
    ) -> StoreResult<()> {
        self.iterate(&mut |record| {
            if record.seq < from || record.seq > to {
                return ControlFlow::Continue(());
            }
            visit(record)
        })
    }

    /// Number of records whose sequence index lies in `[from, to]`.
    fn query_count(&self, from: u64, to: u64) -> usize {
        let mut count = 0;
        let scanned = self.iterate_range(from, to, &mut |_| {
            count += 1;
            ControlFlow::Continue(())
        });
        if scanned.is_err() {
            tracing::warn!("log store scan failed while counting records");
        }
        count
    }
}
