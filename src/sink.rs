// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Virtual sink device.
//!
//! A write-only pseudo device that fans every write out to the persistent
//! log store and then to the original platform console. Both paths are
//! best effort: logging must never fail the caller it is diagnosing.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::config::SINK_DEVICE_NAME;
use crate::device::{CharDevice, OpenFlags};
use crate::store::LogStore;

pub struct VirtualSink {
    store: Option<Arc<dyn LogStore>>,
    console: Option<Arc<dyn CharDevice>>,
    max_record_len: usize,
    store_failed: AtomicBool,
}

impl VirtualSink {
    /// `console` is the platform console captured at session start; it must
    /// not be the sink itself.
    pub fn new(
        store: Option<Arc<dyn LogStore>>,
        console: Option<Arc<dyn CharDevice>>,
        max_record_len: usize,
    ) -> Self {
        Self {
            store,
            console,
            max_record_len: max_record_len.max(1),
            store_failed: AtomicBool::new(false),
        }
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn console(&self) -> Option<&Arc<dyn CharDevice>> {
        self.console.as_ref()
    }

    pub fn max_record_len(&self) -> usize {
        self.max_record_len
    }

    /// Appends `buf` to the store as one or more records of at most
    /// `max_record_len` bytes. Stops at the first rejected chunk.
    fn persist(&self, buf: &[u8]) {
        let Some(store) = &self.store else {
            return;
        };

        for chunk in buf.chunks(self.max_record_len) {
            if let Err(e) = store.append(chunk) {
                if self.store_failed.swap(true, Ordering::Relaxed) {
                    tracing::debug!("log store append failed: {}", e);
                } else {
                    tracing::warn!("log store append failed, console output only: {}", e);
                }
                return;
            }
        }
    }

    /// Forwards `buf` to the platform console in stream mode, restoring the
    /// console's flags afterwards.
    fn forward(&self, buf: &[u8]) {
        let Some(console) = &self.console else {
            return;
        };

        let old_flags = console.open_flags();
        console.set_open_flags(old_flags | OpenFlags::STREAM);
        let written = console.write(0, buf);
        console.set_open_flags(old_flags);

        if written < buf.len() {
            tracing::trace!("console accepted {} of {} bytes", written, buf.len());
        }
    }
}

impl CharDevice for VirtualSink {
    fn name(&self) -> &str {
        SINK_DEVICE_NAME
    }

    fn write(&self, _pos: usize, buf: &[u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        self.persist(buf);
        self.forward(buf);
        buf.len()
    }
}
