// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use crashlog::device::{ConsoleRouter, DeviceRegistry, OpenFlags};
use crashlog::producer::{FaultContext, ProducerKind};
use crashlog_host::console::UartConsole;
use crashlog_host::panic_hook::install_panic_hook;
use crashlog_host::producers::{FnProducer, HostBacktrace, SectionedProducer};
use crashlog_host::telemetry::{init_telemetry, render_metrics};
use crashlog_host::{Collaborators, CrashlogConfig, HostPlatform, LogManager};
use crashlog_tsdb::{FilePartition, PartitionTable};

#[derive(Parser)]
#[command(name = "crashlog")]
#[command(about = "Crash capture and replay on a simulated device", long_about = None)]
struct Cli {
    /// JSON config file. Defaults match the firmware constants.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Flash image backing the log store partition
    #[arg(long, default_value = "flash.img")]
    flash_image: PathBuf,

    /// Crash the simulated device after boot
    #[arg(long, value_enum)]
    simulate: Option<Crash>,

    /// Print the metrics collected during boot
    #[arg(long)]
    metrics: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Crash {
    Fault,
    Assert,
    Panic,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry();

    let config = match &cli.config {
        Some(path) => CrashlogConfig::load(path)?,
        None => CrashlogConfig::default(),
    };

    let platform = Arc::new(HostPlatform::new());
    platform.register(
        Arc::new(UartConsole::stdout(&config.console_device)),
        OpenFlags::RDWR | OpenFlags::INT_RX,
    )?;
    platform.set_active(&config.console_device)?;

    let flash = FilePartition::open(&config.partition, &cli.flash_image, config.max_size as usize)
        .with_context(|| format!("failed to open flash image {:?}", cli.flash_image))?;
    let partitions = PartitionTable::new().with(flash);

    let booted = Instant::now();
    let collaborators = Collaborators::new(platform.clone(), partitions)
        .with_producer(HostBacktrace)
        .with_producer(
            SectionedProducer::new(ProducerKind::Ipc)
                .section("semaphore log", |out| {
                    writeln!(out, "semaphore v   suspend thread")?;
                    writeln!(out, "-------- --- --------------")?;
                    writeln!(out, "shrx     000 0")
                })
                .section("mutex log", |out| {
                    writeln!(out, "mutex      owner  hold suspend thread")?;
                    writeln!(out, "-------- -------- ---- --------------")?;
                    writeln!(out, "fslock   (NULL)   0000 0")
                }),
        )
        .with_producer(FnProducer::new(ProducerKind::Load, move |out, _| {
            writeln!(out, "uptime {:.3}s", booted.elapsed().as_secs_f64())
        }))
        .with_producer(
            SectionedProducer::new(ProducerKind::Memory).section("sys memory log", |out| {
                writeln!(out, "heap usage is not tracked on the host")
            }),
        );

    let manager = LogManager::init(config, collaborators)?;
    let report = manager.recovery();
    if let Some(path) = &report.path {
        println!("Recovered {} record(s), {} bytes, into {}", report.records, report.bytes, path.display());
    }
    if cli.metrics {
        println!("{}", render_metrics());
    }

    let Some(crash) = cli.simulate else {
        manager.teardown();
        return Ok(());
    };

    manager.capture_console()?;
    platform.print("application running\n");
    match crash {
        Crash::Fault => platform.raise_hard_fault(&FaultContext::from_address(0x2000_0f80)),
        Crash::Assert => platform.raise_assert("buffer != RT_NULL", "app_main", 42),
        Crash::Panic => {
            install_panic_hook(manager.controller().clone());
            panic!("simulated panic");
        }
    }
}
