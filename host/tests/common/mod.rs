#![allow(dead_code)]

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crashlog::abort::Halt;
use crashlog::device::{ConsoleRouter, DeviceRegistry, OpenFlags};
use crashlog_host::console::{SharedBuffer, UartConsole};
use crashlog_host::HostPlatform;

/// Payload used to unwind out of a halted abort sequence.
pub struct Halted;

/// Halt that unwinds back into the test instead of stopping the process.
pub struct Trap;

impl Halt for Trap {
    fn halt(&self) -> ! {
        panic::resume_unwind(Box::new(Halted))
    }
}

/// Runs `f` and reports whether it ended in a halt.
pub fn catch_halt<F: FnOnce()>(f: F) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => false,
        Err(payload) => payload.is::<Halted>(),
    }
}

/// Platform with a captured `uart0` as the active console.
pub fn platform_with_uart() -> (Arc<HostPlatform>, SharedBuffer) {
    let platform = Arc::new(HostPlatform::new());
    let out = SharedBuffer::new();
    platform
        .register(Arc::new(UartConsole::new("uart0", out.clone())), OpenFlags::RDWR | OpenFlags::INT_RX)
        .unwrap();
    platform.set_active("uart0").unwrap();
    (platform, out)
}
