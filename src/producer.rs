// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Diagnostic producers and their fixed execution order.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ffi::c_void;
use core::fmt;

/// Opaque machine context handed over by the platform's fault dispatch.
///
/// The core never looks inside; backtrace producers decode it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultContext {
    addr: usize,
}

impl FaultContext {
    pub fn from_raw(ptr: *const c_void) -> Self {
        Self { addr: ptr as usize }
    }

    pub const fn from_address(addr: usize) -> Self {
        Self { addr }
    }

    pub fn as_ptr(&self) -> *const c_void {
        self.addr as *const c_void
    }

    pub fn address(&self) -> usize {
        self.addr
    }
}

/// Location of a failed assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssertInfo<'a> {
    pub expression: &'a str,
    pub function: &'a str,
    pub line: u32,
}

/// What started the abort session.
#[derive(Debug, Clone, Copy)]
pub enum AbortTrigger<'a> {
    Fault(&'a FaultContext),
    Assertion(&'a AssertInfo<'a>),
}

impl<'a> AbortTrigger<'a> {
    pub fn fault_context(&self) -> Option<&'a FaultContext> {
        match self {
            AbortTrigger::Fault(ctx) => Some(ctx),
            AbortTrigger::Assertion(_) => None,
        }
    }

    pub fn assert_info(&self) -> Option<&'a AssertInfo<'a>> {
        match self {
            AbortTrigger::Fault(_) => None,
            AbortTrigger::Assertion(info) => Some(info),
        }
    }
}

/// Category of a producer. The declaration order is the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProducerKind {
    Backtrace,
    Ipc,
    KernelTrace,
    Load,
    Memory,
    Custom,
}

impl ProducerKind {
    /// Section title printed ahead of the producer's output.
    pub const fn section_title(self) -> &'static str {
        match self {
            ProducerKind::Backtrace => "CmBacktrace Log",
            ProducerKind::Ipc => "System IPC Log",
            ProducerKind::KernelTrace => "Kernel Running Log",
            ProducerKind::Load => "System Load Log",
            ProducerKind::Memory => "System Memory Log",
            ProducerKind::Custom => "Custom Log",
        }
    }
}

/// A routine that dumps one category of system state as text.
pub trait DiagnosticProducer: Send + Sync {
    fn kind(&self) -> ProducerKind;

    fn name(&self) -> &str {
        self.kind().section_title()
    }

    /// Producers that cannot run without a fault context are skipped on
    /// assertion failures.
    fn requires_fault_context(&self) -> bool {
        true
    }

    fn dump(&self, out: &mut dyn fmt::Write, trigger: &AbortTrigger<'_>) -> fmt::Result;
}

const FRAME: &str = "/**********************************************************/";

/// Writes the boxed header that opens a producer section.
pub fn write_section_header(out: &mut dyn fmt::Write, name: &str) -> fmt::Result {
    out.write_str("\n")?;
    writeln!(out, "{FRAME}")?;
    writeln!(out, "/**************     {name:>20}     **************/")?;
    writeln!(out, "{FRAME}")?;
    out.write_str("\n")
}

/// Writes the one-line header used between sub-dumps of a grouped producer.
pub fn write_subsection_header(out: &mut dyn fmt::Write, name: &str) -> fmt::Result {
    write!(out, "\n/******  {name}  ******/\n")
}

/// Statically ordered list of enabled producers.
///
/// Producers run in `ProducerKind` order no matter the order they were
/// added in; producers of the same kind keep their insertion order.
#[derive(Default)]
pub struct ProducerList {
    producers: Vec<Box<dyn DiagnosticProducer>>,
}

impl ProducerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<P: DiagnosticProducer + 'static>(mut self, producer: P) -> Self {
        self.push(Box::new(producer));
        self
    }

    pub fn push(&mut self, producer: Box<dyn DiagnosticProducer>) {
        let kind = producer.kind();
        let pos = self
            .producers
            .iter()
            .position(|p| p.kind() > kind)
            .unwrap_or(self.producers.len());
        self.producers.insert(pos, producer);
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn DiagnosticProducer> + '_ {
        self.producers.iter().map(|p| p.as_ref())
    }

    /// Producers that run on a hard fault: all of them.
    pub fn for_fault(&self) -> impl Iterator<Item = &dyn DiagnosticProducer> + '_ {
        self.iter()
    }

    /// Producers that run on an assertion failure.
    pub fn for_assertion(&self) -> impl Iterator<Item = &dyn DiagnosticProducer> + '_ {
        self.iter().filter(|p| !p.requires_fault_context())
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|p| p.name()).collect()
    }
}
