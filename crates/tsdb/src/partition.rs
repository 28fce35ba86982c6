// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Flash partitions.
//!
//! Programming follows NOR semantics: a write can only clear bits, so the
//! stored byte becomes `old & new`. Only an erase brings bytes back to
//! `0xFF`.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use memmap2::MmapMut;

use crate::layout::ERASED_BYTE;

/// A named region of non-volatile memory.
pub trait FlashPartition: Send {
    fn name(&self) -> &str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> io::Result<()>;

    /// Programs `data` at `offset`. Returns only once the bytes are durable.
    fn write(&mut self, offset: usize, data: &[u8]) -> io::Result<()>;

    /// Resets `len` bytes at `offset` to the erased state.
    fn erase(&mut self, offset: usize, len: usize) -> io::Result<()>;
}

fn check_bounds(offset: usize, len: usize, size: usize) -> io::Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("flash access {}..{} outside partition of {} bytes", offset, offset.saturating_add(len), size),
        )),
    }
}

fn program(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d &= *s;
    }
}

/// RAM-backed flash. Clones share the same memory, which is how tests keep
/// "flash" contents across a simulated reboot.
#[derive(Clone)]
pub struct RamPartition {
    name: String,
    mem: Arc<Mutex<Vec<u8>>>,
}

impl RamPartition {
    pub fn new(name: &str, size: usize) -> Self {
        Self {
            name: name.to_string(),
            mem: Arc::new(Mutex::new(vec![ERASED_BYTE; size])),
        }
    }

    /// Copy of the raw partition contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.mem.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Overwrites bytes without NOR semantics. Used to simulate corruption.
    pub fn poke(&self, offset: usize, data: &[u8]) -> io::Result<()> {
        let mut mem = self.mem.lock().unwrap_or_else(PoisonError::into_inner);
        check_bounds(offset, data.len(), mem.len())?;
        mem[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}

impl FlashPartition for RamPartition {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.mem.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> io::Result<()> {
        let mem = self.mem.lock().unwrap_or_else(PoisonError::into_inner);
        check_bounds(offset, buf.len(), mem.len())?;
        buf.copy_from_slice(&mem[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> io::Result<()> {
        let mut mem = self.mem.lock().unwrap_or_else(PoisonError::into_inner);
        check_bounds(offset, data.len(), mem.len())?;
        program(&mut mem[offset..offset + data.len()], data);
        Ok(())
    }

    fn erase(&mut self, offset: usize, len: usize) -> io::Result<()> {
        let mut mem = self.mem.lock().unwrap_or_else(PoisonError::into_inner);
        check_bounds(offset, len, mem.len())?;
        mem[offset..offset + len].fill(ERASED_BYTE);
        Ok(())
    }
}

/// Flash image kept in a file and memory-mapped. Every write and erase is
/// flushed before returning.
pub struct FilePartition {
    name: String,
    map: MmapMut,
}

impl FilePartition {
    /// Opens the image at `path`, creating or growing it to `size` bytes.
    /// New space reads as erased flash.
    pub fn open(name: &str, path: impl AsRef<Path>, size: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        let current = file.metadata()?.len() as usize;
        if current < size {
            file.set_len(size as u64)?;
        }

        // The image is owned by this process for the lifetime of the map.
        let mut map = unsafe { MmapMut::map_mut(&file)? };
        if current < size {
            map[current..size].fill(ERASED_BYTE);
            map.flush()?;
        }

        Ok(Self {
            name: name.to_string(),
            map,
        })
    }
}

impl FlashPartition for FilePartition {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> io::Result<()> {
        check_bounds(offset, buf.len(), self.map.len())?;
        buf.copy_from_slice(&self.map[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> io::Result<()> {
        check_bounds(offset, data.len(), self.map.len())?;
        program(&mut self.map[offset..offset + data.len()], data);
        self.map.flush_range(offset, data.len())
    }

    fn erase(&mut self, offset: usize, len: usize) -> io::Result<()> {
        check_bounds(offset, len, self.map.len())?;
        self.map[offset..offset + len].fill(ERASED_BYTE);
        self.map.flush_range(offset, len)
    }
}

/// Partitions available to be claimed by a store. A store takes its
/// partition out of the table and owns it exclusively from then on.
#[derive(Default)]
pub struct PartitionTable {
    partitions: Vec<Box<dyn FlashPartition>>,
}

impl PartitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<P: FlashPartition + 'static>(mut self, partition: P) -> Self {
        self.insert(Box::new(partition));
        self
    }

    /// Adds a partition, replacing any partition with the same name.
    pub fn insert(&mut self, partition: Box<dyn FlashPartition>) {
        self.partitions.retain(|p| p.name() != partition.name());
        self.partitions.push(partition);
    }

    pub fn take(&mut self, name: &str) -> Option<Box<dyn FlashPartition>> {
        let pos = self.partitions.iter().position(|p| p.name() == name)?;
        Some(self.partitions.remove(pos))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.partitions.iter().any(|p| p.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.partitions.iter().map(|p| p.name()).collect()
    }
}
