// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants.

use alloc::format;

use crate::error::{StoreError, StoreResult};

/// Well-known name the virtual sink device is registered under.
pub const SINK_DEVICE_NAME: &str = "logmgr";

/// Name of the platform console the sink forwards to.
pub const DEFAULT_CONSOLE_NAME: &str = "uart0";

/// Store namespace used when opening the persistent log store.
pub const STORE_NAMESPACE: &str = "logmgr";

/// Flash partition backing the persistent log store.
pub const STORE_PARTITION: &str = "logmgr";

/// Erase-sector size of the store partition in bytes.
pub const SECTOR_SIZE: u32 = 4096;

/// Maximum size of the store region in bytes.
pub const MAX_SIZE: u32 = 65536;

/// Maximum payload length of a single log record.
pub const MAX_RECORD_LEN: usize = 512;

/// Default path of the recovery file on the device filesystem.
pub const ABORT_FILE_PATH: &str = "/abort.log";

/// Flash program granularity. Sector sizes must be a multiple of it.
pub const WRITE_GRANULARITY: u32 = 4;

pub const BUILD_DATE: &str = env!("CRASHLOG_BUILD_DATE");
pub const BUILD_TIME: &str = env!("CRASHLOG_BUILD_TIME");

/// Physical bounds of the persistent log store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub sector_size: u32,
    pub max_size: u32,
    pub max_record_len: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sector_size: SECTOR_SIZE,
            max_size: MAX_SIZE,
            max_record_len: MAX_RECORD_LEN,
        }
    }
}

impl StoreConfig {
    pub fn new(sector_size: u32, max_size: u32) -> Self {
        Self {
            sector_size,
            max_size,
            ..Self::default()
        }
    }

    pub fn with_max_record_len(mut self, max_record_len: usize) -> Self {
        self.max_record_len = max_record_len;
        self
    }

    /// Number of erase sectors in the store region.
    pub fn sector_count(&self) -> u32 {
        if self.sector_size == 0 {
            0
        } else {
            self.max_size / self.sector_size
        }
    }

    /// Checks the bounds before the store binds to a partition.
    pub fn validate(&self) -> StoreResult<()> {
        if self.sector_size == 0 || self.sector_size % WRITE_GRANULARITY != 0 {
            return Err(StoreError::InitFailed(format!(
                "sector size {} is not a non-zero multiple of {}",
                self.sector_size, WRITE_GRANULARITY
            )));
        }
        if self.max_size == 0 || self.max_size % self.sector_size != 0 {
            return Err(StoreError::InitFailed(format!(
                "max size {} is not a non-zero multiple of the sector size {}",
                self.max_size, self.sector_size
            )));
        }
        if self.sector_count() < 2 {
            return Err(StoreError::InitFailed(format!(
                "max size {} holds fewer than two sectors",
                self.max_size
            )));
        }
        if self.max_record_len == 0 || self.max_record_len >= self.sector_size as usize {
            return Err(StoreError::InitFailed(format!(
                "max record length {} does not fit a {} byte sector",
                self.max_record_len, self.sector_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_firmware_constants() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.sector_size, 4096);
        assert_eq!(cfg.max_size, 65536);
        assert_eq!(cfg.max_record_len, 512);
        assert_eq!(cfg.sector_count(), 16);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_bounds() {
        assert!(StoreConfig::new(0, 65536).validate().is_err());
        assert!(StoreConfig::new(4095, 65536).validate().is_err());
        assert!(StoreConfig::new(4096, 6000).validate().is_err());
        assert!(StoreConfig::new(4096, 4096).validate().is_err());
        assert!(StoreConfig::new(4096, 8192).with_max_record_len(4096).validate().is_err());
        assert!(StoreConfig::new(4096, 8192).with_max_record_len(0).validate().is_err());
    }
}
