// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Character device and console routing contracts.

use alloc::sync::Arc;
use core::fmt;

use bitflags::bitflags;

use crate::error::{DeviceError, DeviceResult};

bitflags! {
    /// Device open and registration flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u16 {
        const RDONLY = 0x001;
        const WRONLY = 0x002;
        const RDWR = Self::RDONLY.bits() | Self::WRONLY.bits();
        /// Stream mode: the write is delivered as-is and never dropped.
        const STREAM = 0x040;
        const INT_RX = 0x100;
        const INT_TX = 0x400;
    }
}

/// A character device as seen by the console layer.
///
/// Only `write` is mandatory. The remaining operations default to
/// `DeviceError::Unsupported`.
pub trait CharDevice: Send + Sync {
    fn name(&self) -> &str;

    /// Writes `buf` and returns the number of bytes accepted.
    fn write(&self, pos: usize, buf: &[u8]) -> usize;

    fn open(&self, _flags: OpenFlags) -> DeviceResult<()> {
        Err(DeviceError::Unsupported)
    }

    fn read(&self, _pos: usize, _buf: &mut [u8]) -> DeviceResult<usize> {
        Err(DeviceError::Unsupported)
    }

    fn control(&self, _cmd: u32) -> DeviceResult<()> {
        Err(DeviceError::Unsupported)
    }

    fn open_flags(&self) -> OpenFlags {
        OpenFlags::empty()
    }

    fn set_open_flags(&self, _flags: OpenFlags) {}
}

/// Name-keyed device table owned by the platform.
pub trait DeviceRegistry: Send + Sync {
    fn register(&self, device: Arc<dyn CharDevice>, flags: OpenFlags) -> DeviceResult<()>;

    fn unregister(&self, name: &str) -> Option<Arc<dyn CharDevice>>;

    fn find(&self, name: &str) -> Option<Arc<dyn CharDevice>>;
}

/// Global console routing.
pub trait ConsoleRouter: Send + Sync {
    /// Makes the registered device `name` the target of console output.
    fn set_active(&self, name: &str) -> DeviceResult<()>;

    fn active(&self) -> Option<Arc<dyn CharDevice>>;
}

/// `fmt::Write` adapter over whatever device is currently the console.
pub struct ConsoleWriter<'a> {
    router: &'a dyn ConsoleRouter,
}

impl<'a> ConsoleWriter<'a> {
    pub fn new(router: &'a dyn ConsoleRouter) -> Self {
        Self { router }
    }
}

impl fmt::Write for ConsoleWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if let Some(device) = self.router.active() {
            device.write(0, s.as_bytes());
        }
        Ok(())
    }
}
