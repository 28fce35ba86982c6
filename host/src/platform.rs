// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Simulated platform: device table, console routing and the fault/assert
//! hook slot.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crashlog::abort::{AbortController, Halt};
use crashlog::device::{CharDevice, ConsoleRouter, ConsoleWriter, DeviceRegistry, OpenFlags};
use crashlog::error::{DeviceError, DeviceResult};
use crashlog::producer::FaultContext;
use rustc_hash::FxHashMap;

/// Exit status of a process halted after a crash.
pub const ABORT_EXIT_CODE: i32 = 134;

/// Ends the process once the abort log is written.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl Halt for ProcessExit {
    fn halt(&self) -> ! {
        std::process::exit(ABORT_EXIT_CODE)
    }
}

struct Registered {
    device: Arc<dyn CharDevice>,
    flags: OpenFlags,
}

#[derive(Default)]
pub struct HostPlatform {
    devices: RwLock<FxHashMap<String, Registered>>,
    active: RwLock<Option<String>>,
    hook: Mutex<Option<Arc<AbortController>>>,
}

impl HostPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_name(&self) -> Option<String> {
        self.active.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Flags the device was registered with.
    pub fn registered_flags(&self, name: &str) -> Option<OpenFlags> {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        devices.get(name).map(|r| r.flags)
    }

    /// Installs `controller` as both the fault and the assert hook. Returns
    /// false if hooks are already installed.
    pub fn install_hooks(&self, controller: Arc<AbortController>) -> bool {
        let mut hook = self.hook.lock().unwrap_or_else(PoisonError::into_inner);
        if hook.is_some() {
            return false;
        }
        *hook = Some(controller);
        true
    }

    pub fn uninstall_hooks(&self) -> Option<Arc<AbortController>> {
        self.hook.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn has_hooks(&self) -> bool {
        self.hook.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn hook(&self) -> Option<Arc<AbortController>> {
        self.hook.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Prints to the active console.
    pub fn print(&self, text: &str) {
        let _ = ConsoleWriter::new(self).write_str(text);
    }

    /// Dispatches a hard fault to the installed hook.
    pub fn raise_hard_fault(&self, context: &FaultContext) -> ! {
        match self.hook() {
            Some(controller) => controller.on_hardware_fault(context),
            None => panic!("hard fault at {:#x} with no handler installed", context.address()),
        }
    }

    /// Dispatches a failed assertion to the installed hook.
    pub fn raise_assert(&self, expression: &str, function: &str, line: u32) -> ! {
        match self.hook() {
            Some(controller) => controller.on_assertion_failure(expression, function, line),
            None => panic!("({}) assertion failed at function:{}, line number:{}", expression, function, line),
        }
    }
}

impl DeviceRegistry for HostPlatform {
    fn register(&self, device: Arc<dyn CharDevice>, flags: OpenFlags) -> DeviceResult<()> {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        let name = device.name().to_string();
        if devices.contains_key(&name) {
            return Err(DeviceError::AlreadyRegistered(name));
        }
        tracing::debug!("device {} registered with flags {:?}", name, flags);
        devices.insert(name, Registered { device, flags });
        Ok(())
    }

    fn unregister(&self, name: &str) -> Option<Arc<dyn CharDevice>> {
        let removed = self
            .devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)?;
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if active.as_deref() == Some(name) {
            *active = None;
        }
        Some(removed.device)
    }

    fn find(&self, name: &str) -> Option<Arc<dyn CharDevice>> {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        devices.get(name).map(|r| r.device.clone())
    }
}

impl ConsoleRouter for HostPlatform {
    fn set_active(&self, name: &str) -> DeviceResult<()> {
        if self.find(name).is_none() {
            return Err(DeviceError::NotFound(name.to_string()));
        }
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(name.to_string());
        Ok(())
    }

    fn active(&self) -> Option<Arc<dyn CharDevice>> {
        let name = self.active_name()?;
        self.find(&name)
    }
}
