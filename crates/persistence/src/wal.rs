// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Log File Format
//!
//! ```text
//! [Header: 16 bytes][Frame][Frame][Frame]...
//! ```
//!
//! Header:
//! - magic: `b"ANNL"`
//! - version: u32 LE
//! - reserved: u64 (0)
//!
//! Frame:
//! - index: u64 LE
//! - len: u32 LE
//! - crc64: u64 LE over index, len and row bytes
//! - row: JSON-encoded [`RecordRow`]
//!
//! A frame cut short by end-of-file is a torn write and is dropped with a
//! warning. A complete frame with a bad checksum is corruption and fails the read.

use crate::error::{PersistenceError, Result};
use annal_kernel::config::LOG_FORMAT_VERSION;
use annal_kernel::event::RecordRow;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use crc64fast::Digest;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use tracing::warn;

/// Upper bound on a single row, to reject garbage lengths before allocating.
pub const MAX_ROW_LEN: u32 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub reserved: u64,
}

impl Default for LogHeader {
    fn default() -> Self {
        Self {
            magic: Self::MAGIC,
            version: LOG_FORMAT_VERSION,
            reserved: 0,
        }
    }
}

impl LogHeader {
    pub const SIZE: usize = 4 + 4 + 8; // 16 bytes
    pub const MAGIC: [u8; 4] = *b"ANNL";

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        LittleEndian::write_u32(&mut buf[4..8], self.version);
        LittleEndian::write_u64(&mut buf[8..16], self.reserved);
        buf
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != Self::MAGIC {
            return Err(PersistenceError::InvalidMagic);
        }

        let version = reader.read_u32::<LittleEndian>()?;
        if version != LOG_FORMAT_VERSION {
            return Err(PersistenceError::UnsupportedVersion(version));
        }
        let reserved = reader.read_u64::<LittleEndian>()?;

        Ok(Self {
            magic,
            version,
            reserved,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub index: u64,
    pub len: u32,
    pub checksum: u64,
}

impl FrameHeader {
    pub const SIZE: usize = 8 + 4 + 8; // 20 bytes

    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            index: LittleEndian::read_u64(&buf[0..8]),
            len: LittleEndian::read_u32(&buf[8..12]),
            checksum: LittleEndian::read_u64(&buf[12..20]),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u64(&mut buf[0..8], self.index);
        LittleEndian::write_u32(&mut buf[8..12], self.len);
        LittleEndian::write_u64(&mut buf[12..20], self.checksum);
        buf
    }
}

pub fn frame_checksum(index: u64, row: &[u8]) -> u64 {
    let mut digest = Digest::new();
    digest.write(&index.to_le_bytes());
    digest.write(&(row.len() as u32).to_le_bytes());
    digest.write(row);
    digest.sum64()
}

/// Header plus row bytes, ready to write.
pub fn encode_frame(index: u64, row: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(row.len())
        .ok()
        .filter(|len| *len <= MAX_ROW_LEN)
        .ok_or_else(|| PersistenceError::InvalidFormat(format!("row {} is {} bytes", index, row.len())))?;

    let header = FrameHeader {
        index,
        len,
        checksum: frame_checksum(index, row),
    };
    let mut frame = Vec::with_capacity(FrameHeader::SIZE + row.len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(row);
    Ok(frame)
}

pub struct Frame {
    pub header: FrameHeader,
    pub row: Vec<u8>,
}

impl Frame {
    pub fn decode_row(&self) -> Result<RecordRow> {
        let row: RecordRow = serde_json::from_slice(&self.row)?;
        if row.index != self.header.index {
            return Err(PersistenceError::InvalidFormat(format!(
                "frame index {} holds row index {}",
                self.header.index, row.index
            )));
        }
        Ok(row)
    }
}

/// Streams frames after a validated header.
pub struct LogReader<R> {
    reader: R,
    valid_len: u64,
    done: bool,
}

impl LogReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read> LogReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        LogHeader::read_from(&mut reader)?;
        Ok(Self {
            reader,
            valid_len: LogHeader::SIZE as u64,
            done: false,
        })
    }

    /// Bytes covered by the header and every complete frame read so far.
    pub fn valid_len(&self) -> u64 {
        self.valid_len
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut header_buf = [0u8; FrameHeader::SIZE];
        match read_full(&mut self.reader, &mut header_buf)? {
            0 => return Ok(None),
            n if n < FrameHeader::SIZE => {
                warn!(offset = self.valid_len, "Ignoring torn frame header at end of log");
                return Ok(None);
            }
            _ => {}
        }

        let header = FrameHeader::from_bytes(&header_buf);
        if header.len > MAX_ROW_LEN {
            return Err(PersistenceError::InvalidFormat(format!(
                "frame {} declares {} bytes",
                header.index, header.len
            )));
        }

        let mut row = vec![0u8; header.len as usize];
        if read_full(&mut self.reader, &mut row)? < row.len() {
            warn!(offset = self.valid_len, index = header.index, "Ignoring torn frame at end of log");
            return Ok(None);
        }

        let found = frame_checksum(header.index, &row);
        if found != header.checksum {
            return Err(PersistenceError::ChecksumMismatch {
                expected: header.checksum,
                found,
            });
        }

        self.valid_len += (FrameHeader::SIZE + row.len()) as u64;
        Ok(Some(Frame { header, row }))
    }
}

impl<R: Read> Iterator for LogReader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read until `buf` is full or EOF. Returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Every complete row, plus the byte length they cover.
pub fn scan(path: impl AsRef<Path>) -> Result<(Vec<RecordRow>, u64)> {
    let mut reader = LogReader::open(path)?;
    let mut rows = Vec::new();
    for frame in reader.by_ref() {
        rows.push(frame?.decode_row()?);
    }
    Ok((rows, reader.valid_len()))
}

pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<RecordRow>> {
    Ok(scan(path)?.0)
}

/// Write a complete log file: header, then one frame per row.
pub fn write_rows(path: impl AsRef<Path>, rows: &[RecordRow]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(&LogHeader::default().to_bytes())?;
    for row in rows {
        let bytes = serde_json::to_vec(row)?;
        file.write_all(&encode_frame(row.index, &bytes)?)?;
    }
    file.sync_all()?;
    Ok(())
}
