// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Producer adapters for plugging host-side dump routines into the abort
//! sequence.

use std::backtrace::Backtrace;
use std::fmt;

use crashlog::producer::{write_subsection_header, AbortTrigger, DiagnosticProducer, ProducerKind, ProducerList};

use crate::config::ProducerToggles;

type DumpFn = Box<dyn Fn(&mut dyn fmt::Write, &AbortTrigger<'_>) -> fmt::Result + Send + Sync>;
type SectionFn = Box<dyn Fn(&mut dyn fmt::Write) -> fmt::Result + Send + Sync>;

/// A producer backed by a closure.
pub struct FnProducer {
    kind: ProducerKind,
    name: Option<String>,
    context_free: bool,
    dump: DumpFn,
}

impl FnProducer {
    pub fn new<F>(kind: ProducerKind, dump: F) -> Self
    where
        F: Fn(&mut dyn fmt::Write, &AbortTrigger<'_>) -> fmt::Result + Send + Sync + 'static,
    {
        Self {
            kind,
            name: None,
            context_free: false,
            dump: Box::new(dump),
        }
    }

    /// Overrides the section title.
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Also run this producer on assertion failures.
    pub fn context_free(mut self) -> Self {
        self.context_free = true;
        self
    }
}

impl DiagnosticProducer for FnProducer {
    fn kind(&self) -> ProducerKind {
        self.kind
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.kind.section_title())
    }

    fn requires_fault_context(&self) -> bool {
        !self.context_free
    }

    fn dump(&self, out: &mut dyn fmt::Write, trigger: &AbortTrigger<'_>) -> fmt::Result {
        (self.dump)(out, trigger)
    }
}

/// Groups several sub-dumps under one section, each opened by a
/// second-level header.
pub struct SectionedProducer {
    kind: ProducerKind,
    sections: Vec<(String, SectionFn)>,
}

impl SectionedProducer {
    pub fn new(kind: ProducerKind) -> Self {
        Self {
            kind,
            sections: Vec::new(),
        }
    }

    pub fn section<F>(mut self, name: &str, dump: F) -> Self
    where
        F: Fn(&mut dyn fmt::Write) -> fmt::Result + Send + Sync + 'static,
    {
        self.sections.push((name.to_string(), Box::new(dump)));
        self
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl DiagnosticProducer for SectionedProducer {
    fn kind(&self) -> ProducerKind {
        self.kind
    }

    fn dump(&self, out: &mut dyn fmt::Write, _trigger: &AbortTrigger<'_>) -> fmt::Result {
        for (name, dump) in &self.sections {
            write_subsection_header(out, name)?;
            dump(out)?;
        }
        Ok(())
    }
}

/// Backtrace of the crashing thread, captured with `std::backtrace`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostBacktrace;

impl DiagnosticProducer for HostBacktrace {
    fn kind(&self) -> ProducerKind {
        ProducerKind::Backtrace
    }

    fn requires_fault_context(&self) -> bool {
        false
    }

    fn dump(&self, out: &mut dyn fmt::Write, trigger: &AbortTrigger<'_>) -> fmt::Result {
        match trigger {
            AbortTrigger::Fault(ctx) => writeln!(
                out,
                "Fault on thread {:?}, context at {:#x}",
                std::thread::current().name(),
                ctx.address()
            )?,
            AbortTrigger::Assertion(info) => writeln!(
                out,
                "Assert on thread {:?}: ({}) in {}:{}",
                std::thread::current().name(),
                info.expression,
                info.function,
                info.line
            )?,
        }
        writeln!(out, "{}", Backtrace::force_capture())
    }
}

/// Keeps the producers whose category is enabled, in execution order.
pub fn select_producers(producers: Vec<Box<dyn DiagnosticProducer>>, toggles: &ProducerToggles) -> ProducerList {
    let mut list = ProducerList::new();
    for producer in producers {
        if toggles.is_enabled(producer.kind()) {
            list.push(producer);
        } else {
            tracing::debug!("producer {} disabled by config", producer.name());
        }
    }
    list
}
