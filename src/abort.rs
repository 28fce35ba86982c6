// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Abort sequence controller.
//!
//! Entered from the platform's fault or assert hook. Redirects the console
//! to the virtual sink, prints a banner, drains the producers and never
//! returns. No locks are taken: the hook mechanism guarantees a single,
//! non-reentrant entry on this device class.

use alloc::string::String;
use alloc::sync::Arc;
use core::fmt::Write;
use core::sync::atomic::{AtomicU8, Ordering};

use crate::config::{BUILD_DATE, BUILD_TIME};
use crate::device::{ConsoleRouter, ConsoleWriter};
use crate::producer::{write_section_header, AbortTrigger, AssertInfo, DiagnosticProducer, FaultContext, ProducerList};

/// Terminal state of the processor once the abort log is written.
pub trait Halt: Send + Sync {
    fn halt(&self) -> !;
}

/// Spins forever. Only an external reset or watchdog gets out.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusyWait;

impl Halt for BusyWait {
    fn halt(&self) -> ! {
        loop {
            core::hint::spin_loop();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AbortState {
    Normal = 0,
    Redirecting = 1,
    Halted = 2,
}

impl AbortState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => AbortState::Normal,
            1 => AbortState::Redirecting,
            _ => AbortState::Halted,
        }
    }
}

pub struct AbortController {
    router: Arc<dyn ConsoleRouter>,
    sink_name: String,
    producers: ProducerList,
    halt: Arc<dyn Halt>,
    state: AtomicU8,
}

impl AbortController {
    pub fn new(
        router: Arc<dyn ConsoleRouter>,
        sink_name: impl Into<String>,
        producers: ProducerList,
        halt: Arc<dyn Halt>,
    ) -> Self {
        Self {
            router,
            sink_name: sink_name.into(),
            producers,
            halt,
            state: AtomicU8::new(AbortState::Normal as u8),
        }
    }

    pub fn state(&self) -> AbortState {
        AbortState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn producers(&self) -> &ProducerList {
        &self.producers
    }

    pub fn sink_name(&self) -> &str {
        &self.sink_name
    }

    /// Hard fault entry point. Runs every enabled producer with the fault
    /// context, then halts.
    pub fn on_hardware_fault(&self, context: &FaultContext) -> ! {
        if !self.enter() {
            self.finish();
        }

        let trigger = AbortTrigger::Fault(context);
        self.run(self.producers.for_fault(), &trigger);
        self.finish()
    }

    /// Assertion entry point. Runs only the producers that work without a
    /// fault context, then halts.
    pub fn on_assertion_failure(&self, expression: &str, function: &str, line: u32) -> ! {
        if !self.enter() {
            self.finish();
        }

        let info = AssertInfo {
            expression,
            function,
            line,
        };
        let mut out = ConsoleWriter::new(self.router.as_ref());
        let _ = writeln!(
            out,
            "({}) assertion failed at function:{}, line number:{} ",
            expression, function, line
        );

        let trigger = AbortTrigger::Assertion(&info);
        self.run(self.producers.for_assertion(), &trigger);
        self.finish()
    }

    /// Moves `Normal -> Redirecting`, swaps the console and prints the
    /// banner. Returns false on a nested entry.
    fn enter(&self) -> bool {
        if self
            .state
            .compare_exchange(
                AbortState::Normal as u8,
                AbortState::Redirecting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return false;
        }

        if let Err(e) = self.router.set_active(&self.sink_name) {
            // Keep going on whatever console is active; the dump still reaches a human.
            tracing::error!("console redirect to {} failed: {}", self.sink_name, e);
        }

        let mut out = ConsoleWriter::new(self.router.as_ref());
        let _ = writeln!(out, "Logmgr Abort Start {} {}", BUILD_DATE, BUILD_TIME);
        true
    }

    fn run<'a>(&self, producers: impl Iterator<Item = &'a dyn DiagnosticProducer>, trigger: &AbortTrigger<'_>) {
        let mut out = ConsoleWriter::new(self.router.as_ref());
        for producer in producers {
            let _ = write_section_header(&mut out, producer.name());
            let _ = producer.dump(&mut out, trigger);
        }
    }

    fn finish(&self) -> ! {
        self.state.store(AbortState::Halted as u8, Ordering::SeqCst);
        self.halt.halt()
    }
}
