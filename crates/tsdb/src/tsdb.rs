// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Sector-based time-series store.
//!
//! Records are appended sequentially from sector 0 upwards and never
//! straddle a sector boundary. Sectors are formatted lazily on first use.
//! The sequence counter restarts at zero on every open.

use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crashlog::config::StoreConfig;
use crashlog::error::{StoreError, StoreResult};
use crashlog::store::{LogRecord, LogStore, Visit};

use crate::layout::{is_erased, scan_sector, RecordHeader, SectorEnd, SectorHeader};
use crate::partition::{FlashPartition, PartitionTable};

fn io_err(e: io::Error) -> StoreError {
    StoreError::Io(e.to_string())
}

/// Write position. `offset == 0` means the sector is not formatted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    sector: u32,
    offset: usize,
}

struct Engine {
    partition: Box<dyn FlashPartition>,
    config: StoreConfig,
    cursor: Cursor,
    count: usize,
    next_seq: u64,
}

impl Engine {
    fn sector_size(&self) -> usize {
        self.config.sector_size as usize
    }

    fn sector_base(&self, sector: u32) -> usize {
        sector as usize * self.sector_size()
    }

    fn read_sector(&self, sector: u32) -> StoreResult<Vec<u8>> {
        let mut buf = vec![0u8; self.sector_size()];
        self.partition
            .read(self.sector_base(sector), &mut buf)
            .map_err(io_err)?;
        Ok(buf)
    }

    fn format(&mut self, sector: u32) -> StoreResult<()> {
        let base = self.sector_base(sector);
        self.partition
            .write(base, &SectorHeader::new(sector).to_bytes())
            .map_err(io_err)?;
        self.cursor = Cursor {
            sector,
            offset: SectorHeader::SIZE,
        };
        Ok(())
    }

    /// Rebuilds cursor and record count from what is already on flash.
    ///
    /// Formatted sectors form a contiguous run from sector 0. Every one of
    /// them is scanned; the first erased sector header ends the run. A
    /// sector is usually closed with slack at its end, because a record
    /// that does not fit moves on to the next sector.
    fn scan(&mut self) -> StoreResult<()> {
        let mut cursor = Cursor { sector: 0, offset: 0 };
        let mut count = 0;
        let mut torn = 0;

        for sector in 0..self.config.sector_count() {
            let buf = self.read_sector(sector)?;
            let raw = &buf[..SectorHeader::SIZE];
            if is_erased(raw) {
                break;
            }
            if !SectorHeader::from_bytes(raw).is_valid_for(sector) {
                return Err(StoreError::InitFailed(format!(
                    "corrupt header in sector {} of partition {}",
                    sector,
                    self.partition.name()
                )));
            }

            let (end, stats) = scan_sector(&buf, self.config.max_record_len, |_, _| true);
            count += stats.records;
            torn += stats.torn;

            let offset = match end {
                SectorEnd::Open(offset) => offset,
                SectorEnd::Abandoned(offset) => {
                    tracing::warn!(
                        "log store sector {} has an unreadable record at offset {}, skipping the rest of it",
                        sector,
                        offset
                    );
                    self.sector_size()
                }
            };
            // Appends resume at the end of the last formatted sector and
            // open the next one when a record no longer fits.
            cursor = Cursor { sector, offset };
        }

        if torn > 0 {
            tracing::warn!("log store skipped {} torn record(s)", torn);
        }

        self.cursor = cursor;
        self.count = count;
        Ok(())
    }

    fn append(&mut self, payload: &[u8]) -> StoreResult<()> {
        if payload.len() > self.config.max_record_len {
            return Err(StoreError::Full);
        }

        let footprint = RecordHeader::footprint(payload.len());
        if self.cursor.offset == 0 {
            self.format(self.cursor.sector)?;
        } else if self.cursor.offset + footprint > self.sector_size() {
            let next = self.cursor.sector + 1;
            if next >= self.config.sector_count() {
                return Err(StoreError::Full);
            }
            self.format(next)?;
        }

        let at = self.sector_base(self.cursor.sector) + self.cursor.offset;
        // The slot is consumed even if programming fails half way; the scan
        // treats whatever landed there as a torn record.
        self.cursor.offset += footprint;

        let header = RecordHeader::seal(self.next_seq, payload);
        self.partition.write(at, &header.to_bytes()).map_err(io_err)?;
        if !payload.is_empty() {
            self.partition
                .write(at + RecordHeader::SIZE, payload)
                .map_err(io_err)?;
        }

        self.next_seq += 1;
        self.count += 1;
        Ok(())
    }

    /// Sectors that may hold records.
    fn used_sectors(&self) -> u32 {
        if self.cursor.offset == 0 {
            self.cursor.sector
        } else {
            self.cursor.sector + 1
        }
    }

    fn iterate(&self, visit: &mut dyn FnMut(LogRecord<'_>) -> Visit) -> StoreResult<()> {
        for sector in 0..self.used_sectors() {
            let buf = self.read_sector(sector)?;
            let mut stopped = false;
            scan_sector(&buf, self.config.max_record_len, |seq, payload| {
                stopped = visit(LogRecord::new(seq, payload)).is_break();
                !stopped
            });
            if stopped {
                break;
            }
        }
        Ok(())
    }

    /// Erases every sector carrying a header, including any the cursor
    /// does not account for.
    fn clear(&mut self) -> StoreResult<()> {
        let len = self.sector_size();
        let mut header = [0u8; SectorHeader::SIZE];
        for sector in 0..self.config.sector_count() {
            let base = self.sector_base(sector);
            self.partition.read(base, &mut header).map_err(io_err)?;
            if !is_erased(&header) {
                self.partition.erase(base, len).map_err(io_err)?;
            }
        }
        self.cursor = Cursor { sector: 0, offset: 0 };
        self.count = 0;
        Ok(())
    }
}

/// Persistent log store bound to one flash partition.
pub struct TsDb {
    namespace: String,
    partition: String,
    config: StoreConfig,
    engine: Mutex<Engine>,
}

/// A configured store that has not been bound to a partition yet.
#[derive(Debug, Clone, Copy)]
pub struct TsDbBuilder {
    config: StoreConfig,
}

impl TsDb {
    /// Sets the physical bounds. Opening is only possible afterwards.
    pub fn configure(config: StoreConfig) -> TsDbBuilder {
        TsDbBuilder { config }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Sequence index the next append will get.
    pub fn next_seq(&self) -> u64 {
        self.lock().next_seq
    }

    // Logging must keep working after a panic elsewhere, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TsDbBuilder {
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Binds to `partition`, taking it out of `table`. On failure the
    /// partition is put back so the caller may retry.
    pub fn open(self, namespace: &str, partition: &str, table: &mut PartitionTable) -> StoreResult<TsDb> {
        let config = self.config;
        config.validate()?;
        if SectorHeader::SIZE + RecordHeader::footprint(config.max_record_len) > config.sector_size as usize {
            return Err(StoreError::InitFailed(format!(
                "a {} byte record does not fit a {} byte sector",
                config.max_record_len, config.sector_size
            )));
        }

        let part = table
            .take(partition)
            .ok_or_else(|| StoreError::InitFailed(format!("partition {} not found", partition)))?;
        if part.len() < config.max_size as usize {
            let msg = format!(
                "partition {} holds {} bytes, {} required",
                partition,
                part.len(),
                config.max_size
            );
            table.insert(part);
            return Err(StoreError::InitFailed(msg));
        }

        let mut engine = Engine {
            partition: part,
            config,
            cursor: Cursor { sector: 0, offset: 0 },
            count: 0,
            next_seq: 0,
        };
        if let Err(e) = engine.scan() {
            table.insert(engine.partition);
            return Err(e);
        }

        tracing::debug!(
            "log store {}/{} opened with {} pending record(s)",
            namespace,
            partition,
            engine.count
        );

        Ok(TsDb {
            namespace: namespace.to_string(),
            partition: partition.to_string(),
            config,
            engine: Mutex::new(engine),
        })
    }
}

impl LogStore for TsDb {
    fn append(&self, payload: &[u8]) -> StoreResult<()> {
        self.lock().append(payload)
    }

    fn count_pending(&self) -> usize {
        self.lock().count
    }

    /// Visitors run with the store locked and must not call back into it.
    fn iterate(&self, visit: &mut dyn FnMut(LogRecord<'_>) -> Visit) -> StoreResult<()> {
        self.lock().iterate(visit)
    }

    fn clear(&self) -> StoreResult<()> {
        self.lock().clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::RamPartition;
    use std::ops::ControlFlow;

    fn table(size: usize) -> (PartitionTable, RamPartition) {
        let flash = RamPartition::new("logmgr", size);
        (PartitionTable::new().with(flash.clone()), flash)
    }

    fn open(table: &mut PartitionTable, config: StoreConfig) -> TsDb {
        TsDb::configure(config).open("logmgr", "logmgr", table).unwrap()
    }

    fn collect(db: &TsDb) -> Vec<(u64, Vec<u8>)> {
        let mut out = Vec::new();
        db.iterate(&mut |r| {
            out.push((r.seq, r.payload.to_vec()));
            ControlFlow::Continue(())
        })
        .unwrap();
        out
    }

    #[test]
    fn test_fresh_store_is_empty() {
        let (mut table, flash) = table(65536);
        let db = open(&mut table, StoreConfig::default());
        assert_eq!(db.count_pending(), 0);
        assert!(collect(&db).is_empty());
        // Nothing is formatted until the first append.
        assert!(flash.snapshot().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_records_move_to_next_sector() {
        let (mut table, _flash) = table(1024);
        let config = StoreConfig::new(256, 1024).with_max_record_len(64);
        let db = open(&mut table, config);

        // 16 header + 3 * (20 + 64) = 268 > 256, so the third record opens sector 1.
        for i in 0..3u8 {
            db.append(&[i; 64]).unwrap();
        }
        assert_eq!(db.count_pending(), 3);
        let seen: Vec<u64> = collect(&db).iter().map(|(seq, _)| *seq).collect();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn test_cursor_rebuilt_after_reopen() {
        let (mut table, flash) = table(1024);
        let config = StoreConfig::new(256, 1024).with_max_record_len(64);
        {
            let db = open(&mut table, config);
            for i in 0..5u8 {
                db.append(&[i; 40]).unwrap();
            }
        }

        let mut table = PartitionTable::new().with(flash.clone());
        let db = open(&mut table, config);
        assert_eq!(db.count_pending(), 5);
        assert_eq!(db.next_seq(), 0);

        db.append(b"after reboot").unwrap();
        let records = collect(&db);
        assert_eq!(records.len(), 6);
        assert_eq!(records[5], (0, b"after reboot".to_vec()));
        assert_eq!(records[4].1, vec![4u8; 40]);
    }

    #[test]
    fn test_reopen_sees_sectors_after_slack() {
        let (mut table, flash) = table(1024);
        let config = StoreConfig::new(256, 1024).with_max_record_len(64);
        {
            let db = open(&mut table, config);
            // 16 + 2 * 84 = 184 leaves 72 bytes of slack in sector 0.
            for i in 0..3u8 {
                db.append(&[i; 64]).unwrap();
            }
        }

        let mut table = PartitionTable::new().with(flash.clone());
        let db = open(&mut table, config);
        assert_eq!(db.count_pending(), 3);
        assert_eq!(collect(&db).iter().map(|(_, p)| p[0]).collect::<Vec<_>>(), vec![0, 1, 2]);

        // The cursor sits in sector 1, so sector 1 keeps its data.
        db.append(&[3; 64]).unwrap();
        assert_eq!(collect(&db).iter().map(|(_, p)| p[0]).collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        db.clear().unwrap();
        assert_eq!(db.count_pending(), 0);
        assert!(flash.snapshot().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_open_fails_on_missing_partition() {
        let mut table = PartitionTable::new();
        let err = TsDb::configure(StoreConfig::default())
            .open("logmgr", "logmgr", &mut table)
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::InitFailed(_)));
    }

    #[test]
    fn test_open_fails_on_small_partition_and_returns_it() {
        let (mut table, _flash) = table(4096);
        let err = TsDb::configure(StoreConfig::default())
            .open("logmgr", "logmgr", &mut table)
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::InitFailed(_)));
        assert!(table.contains("logmgr"));
    }

    #[test]
    fn test_clear_erases_and_is_idempotent() {
        let (mut table, flash) = table(65536);
        let db = open(&mut table, StoreConfig::default());
        db.append(b"one").unwrap();
        db.append(b"two").unwrap();

        db.clear().unwrap();
        db.clear().unwrap();

        assert_eq!(db.count_pending(), 0);
        assert!(flash.snapshot().iter().all(|&b| b == 0xFF));
        db.append(b"three").unwrap();
        assert_eq!(collect(&db), vec![(2, b"three".to_vec())]);
    }
}
