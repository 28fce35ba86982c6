mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::platform_with_uart;
use crashlog::abort::{AbortState, Halt};
use crashlog_host::panic_hook::install_panic_hook;
use crashlog_host::{Collaborators, CrashlogConfig, LogManager};
use crashlog_tsdb::{PartitionTable, RamPartition};
use tempfile::tempdir;

/// A panic hook cannot unwind, so the panicking thread parks for good.
struct Park;

impl Halt for Park {
    fn halt(&self) -> ! {
        loop {
            thread::park();
        }
    }
}

#[test]
fn test_panic_routed_to_assertion_path() {
    let dir = tempdir().unwrap();
    let (platform, uart) = platform_with_uart();
    let config = CrashlogConfig {
        recovery_path: dir.path().join("abort.log"),
        ..CrashlogConfig::default()
    };
    let manager = LogManager::init(
        config,
        Collaborators::new(platform, PartitionTable::new().with(RamPartition::new("logmgr", 65536)))
            .with_halt(Arc::new(Park)),
    )
    .unwrap();
    install_panic_hook(manager.controller().clone());

    thread::spawn(|| {
        panic!("queue overflow");
    });

    let deadline = Instant::now() + Duration::from_secs(10);
    while manager.controller().state() != AbortState::Halted && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(manager.controller().state(), AbortState::Halted);
    let text = uart.text();
    assert!(text.contains("(queue overflow) assertion failed at function:"));
    assert!(text.contains("panic_hook_tests.rs"));
}
