// client-gateway/src/archive.rs
//! In-memory store for the packaged client archive.
//!
//! The archive is a Zip32 container read fully into memory at startup and
//! shared read-only for the process lifetime. Supported entries are stored
//! (method 0) and deflate (method 8); encrypted entries and Zip64 archives
//! are rejected. All sizes and offsets are untrusted and validated against
//! the buffer length.

use chrono::{DateTime, TimeZone, Utc};
use flate2::read::DeflateDecoder;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;

const SIG_EOCD: u32 = 0x0605_4b50;
const SIG_CDFH: u32 = 0x0201_4b50;
const SIG_LFH: u32 = 0x0403_4b50;

const EOCD_MIN_LEN: usize = 22;
/// 64 KiB comment + header margin.
const EOCD_SEARCH_MAX: usize = 66 * 1024;

/// Central directory fixed header length.
const CDFH_LEN: usize = 46;
/// Local file header fixed length.
const LFH_LEN: usize = 30;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("client package unavailable: {0}")]
    Unavailable(#[from] std::io::Error),
    #[error("malformed client package: {0}")]
    Malformed(&'static str),
}

/// Metadata for one archive entry, parsed from the central directory.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    method: u16,
    compressed_size: usize,
    local_header_offset: usize,
}

/// Immutable path-keyed view over the client package.
#[derive(Debug)]
pub struct ClientArchive {
    data: Vec<u8>,
    entries: HashMap<String, ArchiveEntry>,
    last_modified: DateTime<Utc>,
}

impl ClientArchive {
    /// Load the archive from disk.
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let data = fs::read(path)?;
        let modified = fs::metadata(path)?.modified()?;
        Self::from_vec(data, modified)
    }

    /// Parse an archive already held in memory.
    pub fn from_vec(data: Vec<u8>, modified: SystemTime) -> Result<Self, ArchiveError> {
        let entries = parse_central_directory(&data)?;
        let millis = modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        let last_modified = Utc
            .timestamp_millis_opt(minute_floor_millis(millis))
            .single()
            .ok_or(ArchiveError::Malformed("archive timestamp out of range"))?;

        Ok(Self {
            data,
            entries,
            last_modified,
        })
    }

    /// Archive modification time, floored to the minute.
    ///
    /// HTTP date headers are only accurate to the second; flooring to the
    /// minute additionally absorbs filesystem timestamp jitter.
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Look up the entry for a request path.
    ///
    /// An empty or `/` path maps to `index.html`; otherwise the leading
    /// separator is stripped and the remainder is matched verbatim.
    pub fn lookup(&self, request_path: &str) -> Option<&ArchiveEntry> {
        self.entries.get(entry_path(request_path))
    }

    /// Read and decompress an entry's payload.
    pub fn read(&self, entry: &ArchiveEntry) -> Result<Vec<u8>, ArchiveError> {
        let lfh_end = entry
            .local_header_offset
            .checked_add(LFH_LEN)
            .filter(|end| *end <= self.data.len())
            .ok_or(ArchiveError::Malformed("local header out of bounds"))?;
        let lfh = &self.data[entry.local_header_offset..lfh_end];

        if le_u32(&lfh[0..4]) != SIG_LFH {
            return Err(ArchiveError::Malformed("bad local header signature"));
        }
        let name_len = le_u16(&lfh[26..28]) as usize;
        let extra_len = le_u16(&lfh[28..30]) as usize;

        let data_start = lfh_end
            .checked_add(name_len)
            .and_then(|p| p.checked_add(extra_len))
            .ok_or(ArchiveError::Malformed("entry data out of bounds"))?;
        let data_end = data_start
            .checked_add(entry.compressed_size)
            .filter(|end| *end <= self.data.len())
            .ok_or(ArchiveError::Malformed("entry data out of bounds"))?;
        let payload = &self.data[data_start..data_end];

        match entry.method {
            METHOD_STORED => Ok(payload.to_vec()),
            METHOD_DEFLATE => {
                let mut out = Vec::new();
                DeflateDecoder::new(payload)
                    .read_to_end(&mut out)
                    .map_err(|_| ArchiveError::Malformed("deflate stream corrupt"))?;
                Ok(out)
            }
            _ => Err(ArchiveError::Malformed("unsupported compression method")),
        }
    }
}

/// Archive key for a request path: `""` and `"/"` map to `index.html`,
/// anything else loses its leading separator.
pub fn entry_path(request_path: &str) -> &str {
    match request_path {
        "" | "/" => "index.html",
        path => path.strip_prefix('/').unwrap_or(path),
    }
}

/// Floor a millisecond timestamp to the minute.
pub fn minute_floor_millis(millis: i64) -> i64 {
    millis - millis.rem_euclid(60_000)
}

fn parse_central_directory(data: &[u8]) -> Result<HashMap<String, ArchiveEntry>, ArchiveError> {
    if data.len() < EOCD_MIN_LEN {
        return Err(ArchiveError::Malformed("too short for an archive"));
    }

    // Find the EOCD record scanning backward through the tail window.
    let win_start = data.len().saturating_sub(EOCD_SEARCH_MAX);
    let win = &data[win_start..];
    let eocd_rel = rfind_sig(win, SIG_EOCD)
        .ok_or(ArchiveError::Malformed("end of central directory not found"))?;
    let eocd = &win[eocd_rel..];
    if eocd.len() < EOCD_MIN_LEN {
        return Err(ArchiveError::Malformed("truncated end of central directory"));
    }

    let disk_no = le_u16(&eocd[4..6]);
    let cd_disk = le_u16(&eocd[6..8]);
    let entries_disk = le_u16(&eocd[8..10]);
    let entries_total = le_u16(&eocd[10..12]);
    let cd_size = le_u32(&eocd[12..16]) as usize;
    let cd_off = le_u32(&eocd[16..20]) as usize;

    if disk_no != 0 || cd_disk != 0 || entries_disk != entries_total {
        return Err(ArchiveError::Malformed("multi-disk archives unsupported"));
    }
    if entries_total == 0xFFFF || cd_size == 0xFFFF_FFFF || cd_off == 0xFFFF_FFFF {
        return Err(ArchiveError::Malformed("zip64 archives unsupported"));
    }
    let cd_end = cd_off
        .checked_add(cd_size)
        .filter(|end| *end <= data.len())
        .ok_or(ArchiveError::Malformed("central directory out of bounds"))?;

    let mut entries = HashMap::with_capacity(entries_total as usize);
    let mut pos = cd_off;
    for _ in 0..entries_total {
        if pos + CDFH_LEN > cd_end {
            return Err(ArchiveError::Malformed("truncated central directory"));
        }
        let hdr = &data[pos..pos + CDFH_LEN];
        if le_u32(&hdr[0..4]) != SIG_CDFH {
            return Err(ArchiveError::Malformed("bad central directory signature"));
        }

        let flags = le_u16(&hdr[8..10]);
        let method = le_u16(&hdr[10..12]);
        let compressed_size = le_u32(&hdr[20..24]) as usize;
        let name_len = le_u16(&hdr[28..30]) as usize;
        let extra_len = le_u16(&hdr[30..32]) as usize;
        let comment_len = le_u16(&hdr[32..34]) as usize;
        let local_header_offset = le_u32(&hdr[42..46]) as usize;

        let name_end = pos + CDFH_LEN + name_len;
        if name_end > cd_end {
            return Err(ArchiveError::Malformed("truncated entry name"));
        }
        let name = String::from_utf8_lossy(&data[pos + CDFH_LEN..name_end]).into_owned();
        pos = name_end + extra_len + comment_len;

        let is_dir = name.ends_with('/');
        let encrypted = flags & 0x0001 != 0;
        let supported = method == METHOD_STORED || method == METHOD_DEFLATE;
        if is_dir {
            continue;
        }
        if encrypted || !supported {
            tracing::warn!(entry = %name, method, encrypted, "skipping unreadable archive entry");
            continue;
        }

        entries.insert(
            name,
            ArchiveEntry {
                method,
                compressed_size,
                local_header_offset,
            },
        );
    }

    Ok(entries)
}

fn rfind_sig(window: &[u8], sig: u32) -> Option<usize> {
    if window.len() < 4 {
        return None;
    }
    (0..=window.len() - 4).rev().find(|&i| le_u32(&window[i..i + 4]) == sig)
}

fn le_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
