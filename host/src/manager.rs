// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Process-wide crash log context.
//!
//! Init order: store, boot recovery, sink registration, hook installation.
//! Recovery must finish before the sink exists, otherwise the new session's
//! output would be replayed into the recovery file.

use std::sync::Arc;

use crashlog::abort::{AbortController, BusyWait, Halt};
use crashlog::config::SINK_DEVICE_NAME;
use crashlog::device::{CharDevice, ConsoleRouter, DeviceRegistry, OpenFlags};
use crashlog::error::StoreError;
use crashlog::producer::DiagnosticProducer;
use crashlog::sink::VirtualSink;
use crashlog::store::LogStore;
use crashlog_tsdb::{PartitionTable, TsDb};

use crate::config::{CrashlogConfig, HaltMode};
use crate::errors::{CrashlogError, Result};
use crate::platform::{HostPlatform, ProcessExit};
use crate::producers::select_producers;
use crate::recovery::{recover_abort_log, RecoveryReport};

/// External pieces the manager binds together.
pub struct Collaborators {
    pub platform: Arc<HostPlatform>,
    pub partitions: PartitionTable,
    /// Candidates; the config decides which categories run.
    pub producers: Vec<Box<dyn DiagnosticProducer>>,
    /// Overrides the halt selected by `CrashlogConfig::halt`.
    pub halt: Option<Arc<dyn Halt>>,
}

impl Collaborators {
    pub fn new(platform: Arc<HostPlatform>, partitions: PartitionTable) -> Self {
        Self {
            platform,
            partitions,
            producers: Vec::new(),
            halt: None,
        }
    }

    pub fn with_producer<P: DiagnosticProducer + 'static>(mut self, producer: P) -> Self {
        self.producers.push(Box::new(producer));
        self
    }

    pub fn with_halt(mut self, halt: Arc<dyn Halt>) -> Self {
        self.halt = Some(halt);
        self
    }
}

pub struct LogManager {
    config: CrashlogConfig,
    platform: Arc<HostPlatform>,
    store: Option<Arc<TsDb>>,
    sink: Arc<VirtualSink>,
    controller: Arc<AbortController>,
    recovery: RecoveryReport,
    partitions: PartitionTable,
}

impl LogManager {
    pub fn init(config: CrashlogConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let Collaborators {
            platform,
            mut partitions,
            producers,
            halt,
        } = collaborators;

        if platform.has_hooks() {
            tracing::warn!("logmgr abort is already initialized.");
            return Err(CrashlogError::AlreadyInitialized);
        }

        let opened = TsDb::configure(config.store_config()).open(&config.namespace, &config.partition, &mut partitions);
        let store = match opened {
            Ok(db) => Some(Arc::new(db)),
            Err(StoreError::InitFailed(reason)) => {
                tracing::warn!("logmgr tsdb initialized failed: {}. Crash output goes to the console only.", reason);
                None
            }
            Err(e) => return Err(e.into()),
        };

        let recovery = match &store {
            Some(db) => recover_abort_log(db.as_ref(), &config.recovery_path)?,
            None => RecoveryReport::default(),
        };

        let console = platform.find(&config.console_device);
        if console.is_none() {
            tracing::warn!("console device {} not found, crash output is only persisted", config.console_device);
        }
        let sink = Arc::new(VirtualSink::new(
            store.clone().map(|db| db as Arc<dyn LogStore>),
            console,
            config.max_record_len,
        ));
        platform.register(sink.clone(), OpenFlags::RDWR | OpenFlags::INT_RX)?;

        let halt: Arc<dyn Halt> = match (halt, config.halt) {
            (Some(halt), _) => halt,
            (None, HaltMode::Spin) => Arc::new(BusyWait),
            (None, HaltMode::Exit) => Arc::new(ProcessExit),
        };
        let controller = Arc::new(AbortController::new(
            platform.clone(),
            SINK_DEVICE_NAME,
            select_producers(producers, &config.producers),
            halt,
        ));
        if !platform.install_hooks(controller.clone()) {
            platform.unregister(SINK_DEVICE_NAME);
            tracing::warn!("logmgr abort is already initialized.");
            return Err(CrashlogError::AlreadyInitialized);
        }

        tracing::info!("logmgr abort initialized success.");
        Ok(Self {
            config,
            platform,
            store,
            sink,
            controller,
            recovery,
            partitions,
        })
    }

    pub fn config(&self) -> &CrashlogConfig {
        &self.config
    }

    pub fn platform(&self) -> &Arc<HostPlatform> {
        &self.platform
    }

    /// `None` when the store could not be opened.
    pub fn store(&self) -> Option<&Arc<TsDb>> {
        self.store.as_ref()
    }

    pub fn sink(&self) -> &Arc<VirtualSink> {
        &self.sink
    }

    pub fn controller(&self) -> &Arc<AbortController> {
        &self.controller
    }

    /// What boot recovery did during `init`.
    pub fn recovery(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Partitions not claimed by the store.
    pub fn partitions(&self) -> &PartitionTable {
        &self.partitions
    }

    /// Makes the sink the active console, so that all console output is
    /// persisted during normal operation.
    pub fn capture_console(&self) -> Result<()> {
        self.platform.set_active(self.sink.name())?;
        Ok(())
    }

    /// Uninstalls the hooks, unregisters the sink and hands the console
    /// back to the default device.
    pub fn teardown(self) {
        if let Some(hook) = self.platform.uninstall_hooks() {
            if !Arc::ptr_eq(&hook, &self.controller) {
                // Somebody else's hook; leave it in place.
                self.platform.install_hooks(hook);
            }
        }

        let sink_active = self.platform.active_name().as_deref() == Some(SINK_DEVICE_NAME);
        self.platform.unregister(SINK_DEVICE_NAME);
        if sink_active {
            if let Err(e) = self.platform.set_active(&self.config.console_device) {
                tracing::warn!("failed to restore console {}: {}", self.config.console_device, e);
            }
        }
        tracing::debug!("logmgr torn down");
    }
}
