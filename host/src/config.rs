// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::fs;
use std::path::{Path, PathBuf};

use crashlog::config::{
    StoreConfig, DEFAULT_CONSOLE_NAME, MAX_RECORD_LEN, MAX_SIZE, SECTOR_SIZE, STORE_NAMESPACE, STORE_PARTITION,
};
use crashlog::producer::ProducerKind;
use serde::{Deserialize, Serialize};

use crate::errors::{CrashlogError, Result};

/// Recovery file written next to the working directory on a host.
pub const HOST_ABORT_FILE: &str = "abort.log";

/// What the processor does once the abort log is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HaltMode {
    /// Spin forever, as the firmware does.
    Spin,
    /// Terminate the process with a non-zero status.
    #[default]
    Exit,
}

/// Which built-in producer categories run on a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerToggles {
    pub backtrace: bool,
    pub ipc: bool,
    pub kernel_trace: bool,
    pub load: bool,
    pub memory: bool,
}

impl Default for ProducerToggles {
    fn default() -> Self {
        Self {
            backtrace: true,
            ipc: true,
            kernel_trace: true,
            load: true,
            memory: true,
        }
    }
}

impl ProducerToggles {
    /// Custom producers are always enabled.
    pub fn is_enabled(&self, kind: ProducerKind) -> bool {
        match kind {
            ProducerKind::Backtrace => self.backtrace,
            ProducerKind::Ipc => self.ipc,
            ProducerKind::KernelTrace => self.kernel_trace,
            ProducerKind::Load => self.load,
            ProducerKind::Memory => self.memory,
            ProducerKind::Custom => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashlogConfig {
    pub namespace: String,
    pub partition: String,
    pub sector_size: u32,
    pub max_size: u32,
    pub max_record_len: usize,
    pub recovery_path: PathBuf,
    pub console_device: String,
    pub producers: ProducerToggles,
    pub halt: HaltMode,
}

impl Default for CrashlogConfig {
    fn default() -> Self {
        Self {
            namespace: STORE_NAMESPACE.to_string(),
            partition: STORE_PARTITION.to_string(),
            sector_size: SECTOR_SIZE,
            max_size: MAX_SIZE,
            max_record_len: MAX_RECORD_LEN,
            recovery_path: PathBuf::from(HOST_ABORT_FILE),
            console_device: DEFAULT_CONSOLE_NAME.to_string(),
            producers: ProducerToggles::default(),
            halt: HaltMode::default(),
        }
    }
}

impl CrashlogConfig {
    /// Reads a JSON config. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| CrashlogError::Config(format!("failed to read {:?}: {}", path, e)))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| CrashlogError::Config(format!("failed to parse {:?}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.sector_size, self.max_size).with_max_record_len(self.max_record_len)
    }

    pub fn validate(&self) -> Result<()> {
        self.store_config()
            .validate()
            .map_err(|e| CrashlogError::Config(e.to_string()))?;
        if self.console_device.is_empty() {
            return Err(CrashlogError::Config("console device name is empty".to_string()));
        }
        if self.recovery_path.as_os_str().is_empty() {
            return Err(CrashlogError::Config("recovery path is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_firmware() {
        let cfg = CrashlogConfig::default();
        assert_eq!(cfg.namespace, "logmgr");
        assert_eq!(cfg.partition, "logmgr");
        assert_eq!(cfg.store_config(), StoreConfig::default());
        assert_eq!(cfg.console_device, "uart0");
        assert!(cfg.producers.is_enabled(ProducerKind::Memory));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_partial_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crashlog.json");
        fs::write(
            &path,
            r#"{ "recovery_path": "/tmp/crash.log", "producers": { "ipc": false }, "halt": "spin" }"#,
        )
        .unwrap();

        let cfg = CrashlogConfig::load(&path).unwrap();
        assert_eq!(cfg.recovery_path, PathBuf::from("/tmp/crash.log"));
        assert!(!cfg.producers.is_enabled(ProducerKind::Ipc));
        assert!(cfg.producers.is_enabled(ProducerKind::Load));
        assert_eq!(cfg.halt, HaltMode::Spin);
        assert_eq!(cfg.sector_size, 4096);
    }

    #[test]
    fn test_load_rejects_bad_bounds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crashlog.json");
        fs::write(&path, r#"{ "sector_size": 4096, "max_size": 5000 }"#).unwrap();
        assert!(matches!(CrashlogConfig::load(&path), Err(CrashlogError::Config(_))));
        assert!(matches!(
            CrashlogConfig::load(dir.path().join("missing.json")),
            Err(CrashlogError::Config(_))
        ));
    }
}
