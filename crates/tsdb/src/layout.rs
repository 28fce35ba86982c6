// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! On-flash layout of sectors and records.
//!
//! ```text
//! sector: [SectorHeader: 16][RecordHeader: 20][payload, padded to 4]...[0xFF...]
//! ```
//!
//! All integers are little-endian. Erased flash reads as `0xFF`, so an
//! all-`0xFF` header marks unused space.

use byteorder::{ByteOrder, LittleEndian};
use crc64fast::Digest;

/// "TSL0"
pub const SECTOR_MAGIC: u32 = 0x304C_5354;

pub const ERASED_BYTE: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorHeader {
    pub magic: u32,
    pub index: u32,
    pub reserved: u64,
}

impl SectorHeader {
    pub const SIZE: usize = 4 + 4 + 8; // 16 bytes

    pub fn new(index: u32) -> Self {
        Self {
            magic: SECTOR_MAGIC,
            index,
            reserved: u64::MAX,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.magic);
        LittleEndian::write_u32(&mut buf[4..8], self.index);
        LittleEndian::write_u64(&mut buf[8..16], self.reserved);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            magic: LittleEndian::read_u32(&buf[0..4]),
            index: LittleEndian::read_u32(&buf[4..8]),
            reserved: LittleEndian::read_u64(&buf[8..16]),
        }
    }

    pub fn is_valid_for(&self, index: u32) -> bool {
        self.magic == SECTOR_MAGIC && self.index == index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub seq: u64,
    pub len: u32,
    pub checksum: u64,
}

impl RecordHeader {
    pub const SIZE: usize = 8 + 4 + 8; // 20 bytes

    /// Builds the header for `payload` appended as `seq`.
    pub fn seal(seq: u64, payload: &[u8]) -> Self {
        let len = payload.len() as u32;
        Self {
            seq,
            len,
            checksum: checksum(seq, len, payload),
        }
    }

    pub fn verify(&self, payload: &[u8]) -> bool {
        payload.len() == self.len as usize && checksum(self.seq, self.len, payload) == self.checksum
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u64(&mut buf[0..8], self.seq);
        LittleEndian::write_u32(&mut buf[8..12], self.len);
        LittleEndian::write_u64(&mut buf[12..20], self.checksum);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            seq: LittleEndian::read_u64(&buf[0..8]),
            len: LittleEndian::read_u32(&buf[8..12]),
            checksum: LittleEndian::read_u64(&buf[12..20]),
        }
    }

    /// Bytes the record occupies on flash, header included.
    pub fn footprint(len: usize) -> usize {
        Self::SIZE + padded_len(len)
    }
}

pub fn checksum(seq: u64, len: u32, payload: &[u8]) -> u64 {
    let mut digest = Digest::new();
    digest.write(&seq.to_le_bytes());
    digest.write(&len.to_le_bytes());
    digest.write(payload);
    digest.sum64()
}

/// Rounds up to the 4-byte program granularity.
pub fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

pub fn is_erased(buf: &[u8]) -> bool {
    buf.iter().all(|&b| b == ERASED_BYTE)
}

/// How a sector scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorEnd {
    /// Data ends at this offset; the rest of the sector is writable.
    Open(usize),
    /// An implausible header was found; nothing after it can be trusted
    /// or written.
    Abandoned(usize),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SectorStats {
    pub records: usize,
    pub torn: usize,
}

/// Walks the records of one sector image, calling `on_record` for every
/// record whose checksum holds. Records failing the checksum (torn writes)
/// are skipped when their length is plausible.
pub fn scan_sector(
    sector: &[u8],
    max_record_len: usize,
    mut on_record: impl FnMut(u64, &[u8]) -> bool,
) -> (SectorEnd, SectorStats) {
    let mut stats = SectorStats::default();
    let mut offset = SectorHeader::SIZE;

    while offset + RecordHeader::SIZE <= sector.len() {
        let raw = &sector[offset..offset + RecordHeader::SIZE];
        if is_erased(raw) {
            return (SectorEnd::Open(offset), stats);
        }

        let header = RecordHeader::from_bytes(raw);
        let len = header.len as usize;
        let body = offset + RecordHeader::SIZE;
        if len > max_record_len || body + len > sector.len() {
            return (SectorEnd::Abandoned(offset), stats);
        }

        let payload = &sector[body..body + len];
        if header.verify(payload) {
            stats.records += 1;
            if !on_record(header.seq, payload) {
                return (SectorEnd::Open(offset), stats);
            }
        } else {
            stats.torn += 1;
        }
        offset += RecordHeader::footprint(len);
    }

    (SectorEnd::Open(offset.min(sector.len())), stats)
}
