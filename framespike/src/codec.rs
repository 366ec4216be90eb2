//! The capture codec: one frame to and from a compressed byte buffer.
//!
//! The uncompressed layout is little-endian and packed:
//!
//!    start_time     u64
//!    end_time       u64
//!    prev_frame     u64
//!    platform_id    u8
//!    cpu_frequency  u64
//!    num_scopes     u32
//!      per scope:   start u64, end u64, thread_id u64,
//!                   name_idx u32, file_idx u32, line u32, level u32
//!    num_threads    u32
//!      per thread:  thread_id u64, name_idx u32
//!    num_strings    u32
//!      per string:  length u32, bytes (no terminator)
//!
//! Strings are deduplicated into a table indexed in first-seen order (scope
//! names and files first, then thread names). The whole buffer is LZ4
//! block-compressed with the uncompressed size prepended as a `u32`, so a
//! load decompresses in one shot. Captures written without the size prefix
//! are still read through a retry loop with a doubling output buffer.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};

use crate::clock;
use crate::frame::{FrameData, ScopeRecord, ScopeStats, TextRange, ThreadEntry};

/// Errors produced by the codec and the capture-file container.
#[derive(Debug)]
pub enum Error {
    /// The output buffer cannot hold the compressed capture. Nothing was
    /// written.
    BufferTooSmall,
    /// The buffer does not decode to a capture.
    CorruptCapture,
    /// The capture ended in the middle of a record.
    PrematureEnd,
    /// A capture file did not start with the expected magic.
    BadMagic,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "output buffer too small"),
            Self::CorruptCapture => write!(f, "corrupt capture"),
            Self::PrematureEnd => write!(f, "capture ended prematurely"),
            Self::BadMagic => write!(f, "not a capture file"),
        }
    }
}

impl std::error::Error for Error {}

/// Codec result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Upper bound for the legacy decompression retry loop.
const LEGACY_DECOMPRESS_CAP: usize = 64 * 1024 * 1024;

/// Sanity bound on record counts while parsing; a well-formed capture never
/// comes close.
const MAX_RECORDS: u32 = 1 << 24;

/// Deduplicates strings into dense indices in first-seen order.
#[derive(Default)]
struct StringTable<'a> {
    indices: HashMap<&'a str, u32>,
    strings: Vec<&'a str>,
}

impl<'a> StringTable<'a> {
    fn add(&mut self, text: &'a str) -> u32 {
        *self.indices.entry(text).or_insert_with(|| {
            self.strings.push(text);
            self.strings.len() as u32 - 1
        })
    }
}

fn serialize(frame: &FrameData) -> Vec<u8> {
    let mut table = StringTable::default();
    let scope_indices: Vec<(u32, u32)> = frame
        .scopes
        .iter()
        .map(|s| (table.add(frame.scope_name(s)), table.add(frame.scope_file(s))))
        .collect();
    let thread_indices: Vec<u32> = frame
        .threads
        .iter()
        .map(|t| table.add(t.name.as_ref()))
        .collect();

    let string_bytes: usize = table.strings.iter().map(|s| 4 + s.len()).sum();
    let total = 33 + 4 + frame.scopes.len() * 40 + 4 + frame.threads.len() * 12 + 4 + string_bytes;

    let mut w = Vec::with_capacity(total);
    w.write_u64::<LE>(frame.start_time).expect("can't fail");
    w.write_u64::<LE>(frame.end_time).expect("can't fail");
    w.write_u64::<LE>(frame.prev_frame_time).expect("can't fail");
    w.write_u8(frame.platform_id).expect("can't fail");
    w.write_u64::<LE>(frame.cpu_frequency).expect("can't fail");

    w.write_u32::<LE>(frame.scopes.len() as u32).expect("can't fail");
    for (scope, &(name_idx, file_idx)) in frame.scopes.iter().zip(&scope_indices) {
        w.write_u64::<LE>(scope.start).expect("can't fail");
        w.write_u64::<LE>(scope.end).expect("can't fail");
        w.write_u64::<LE>(scope.thread_id).expect("can't fail");
        w.write_u32::<LE>(name_idx).expect("can't fail");
        w.write_u32::<LE>(file_idx).expect("can't fail");
        w.write_u32::<LE>(scope.line).expect("can't fail");
        w.write_u32::<LE>(scope.level).expect("can't fail");
    }

    w.write_u32::<LE>(frame.threads.len() as u32).expect("can't fail");
    for (thread, &name_idx) in frame.threads.iter().zip(&thread_indices) {
        w.write_u64::<LE>(thread.thread_id).expect("can't fail");
        w.write_u32::<LE>(name_idx).expect("can't fail");
    }

    w.write_u32::<LE>(table.strings.len() as u32).expect("can't fail");
    for s in &table.strings {
        w.write_u32::<LE>(s.len() as u32).expect("can't fail");
        w.extend_from_slice(s.as_bytes());
    }

    debug_assert_eq!(w.len(), total);
    w
}

/// Encodes `frame` into `out`, returning the number of bytes written.
///
/// # Errors
///
/// [`Error::BufferTooSmall`] when the compressed capture does not fit; `out`
/// is left with unspecified contents but nothing partial is ever reported.
pub fn save(frame: &FrameData, out: &mut [u8]) -> Result<usize> {
    let raw = serialize(frame);
    if out.len() < 4 {
        return Err(Error::BufferTooSmall);
    }
    out[..4].copy_from_slice(&(raw.len() as u32).to_le_bytes());
    let compressed = lz4_flex::block::compress_into(&raw, &mut out[4..])
        .map_err(|_| Error::BufferTooSmall)?;
    Ok(4 + compressed)
}

/// Encodes `frame` into a freshly allocated buffer.
pub fn save_to_vec(frame: &FrameData) -> Vec<u8> {
    lz4_flex::compress_prepend_size(&serialize(frame))
}

fn decompress(buf: &[u8]) -> Result<Vec<u8>> {
    if buf.len() >= 4 {
        // A capture written by this crate leads with its uncompressed size.
        // Legacy captures start with compressed data instead, so an absurd
        // "size" must not be trusted with an allocation.
        let size = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if size <= LEGACY_DECOMPRESS_CAP {
            if let Ok(raw) = lz4_flex::decompress_size_prepended(buf) {
                return Ok(raw);
            }
        }
    }

    // Captures written by older tools carry no size prefix; their
    // uncompressed size has to be discovered by retrying.
    let mut capacity = buf.len().max(64) * 2;
    loop {
        let mut raw = vec![0_u8; capacity];
        match lz4_flex::block::decompress_into(buf, &mut raw) {
            Ok(size) => {
                raw.truncate(size);
                return Ok(raw);
            }
            Err(lz4_flex::block::DecompressError::OutputTooSmall { .. })
                if capacity < LEGACY_DECOMPRESS_CAP =>
            {
                capacity *= 2;
            }
            Err(_) => return Err(Error::CorruptCapture),
        }
    }
}

fn read_count(r: &mut Cursor<&[u8]>) -> Result<u32> {
    let count = r.read_u32::<LE>().map_err(|_| Error::PrematureEnd)?;
    if count > MAX_RECORDS {
        return Err(Error::CorruptCapture);
    }
    Ok(count)
}

/// Decodes a capture into `frame` and computes its statistics tables.
///
/// On success the frame owns everything it references. On failure the frame
/// is left cleared.
///
/// # Errors
///
/// [`Error::CorruptCapture`] or [`Error::PrematureEnd`] when the buffer does
/// not decode.
pub fn load(frame: &mut FrameData, buf: &[u8]) -> Result<()> {
    frame.clear();

    let raw = decompress(buf)?;
    let mut r = Cursor::new(raw.as_slice());
    let read_err = |_| Error::PrematureEnd;

    let start_time = r.read_u64::<LE>().map_err(read_err)?;
    let end_time = r.read_u64::<LE>().map_err(read_err)?;
    let prev_frame_time = r.read_u64::<LE>().map_err(read_err)?;
    let platform_id = r.read_u8().map_err(read_err)?;
    let cpu_frequency = r.read_u64::<LE>().map_err(read_err)?;

    struct RawScope {
        start: u64,
        end: u64,
        thread_id: u64,
        name_idx: u32,
        file_idx: u32,
        line: u32,
        level: u32,
    }

    let num_scopes = read_count(&mut r)?;
    let mut raw_scopes = Vec::with_capacity(num_scopes as usize);
    for _ in 0..num_scopes {
        let scope = RawScope {
            start: r.read_u64::<LE>().map_err(read_err)?,
            end: r.read_u64::<LE>().map_err(read_err)?,
            thread_id: r.read_u64::<LE>().map_err(read_err)?,
            name_idx: r.read_u32::<LE>().map_err(read_err)?,
            file_idx: r.read_u32::<LE>().map_err(read_err)?,
            line: r.read_u32::<LE>().map_err(read_err)?,
            level: r.read_u32::<LE>().map_err(read_err)?,
        };
        if scope.end < scope.start {
            return Err(Error::CorruptCapture);
        }
        raw_scopes.push(scope);
    }

    let num_threads = read_count(&mut r)?;
    let mut raw_threads = Vec::with_capacity(num_threads as usize);
    for _ in 0..num_threads {
        let thread_id = r.read_u64::<LE>().map_err(read_err)?;
        let name_idx = r.read_u32::<LE>().map_err(read_err)?;
        raw_threads.push((thread_id, name_idx));
    }

    let num_strings = read_count(&mut r)?;
    let mut strings = Vec::with_capacity(num_strings as usize);
    for _ in 0..num_strings {
        let len = r.read_u32::<LE>().map_err(read_err)? as usize;
        let begin = r.position() as usize;
        let end = begin.checked_add(len).ok_or(Error::CorruptCapture)?;
        let bytes = raw.get(begin..end).ok_or(Error::PrematureEnd)?;
        strings.push(String::from_utf8_lossy(bytes).into_owned());
        r.set_position(end as u64);
    }

    // Rebuild a text arena from the string table and resolve the indices.
    let mut text = String::with_capacity(strings.iter().map(String::len).sum());
    let ranges: Vec<TextRange> = strings
        .iter()
        .map(|s| {
            let offset = text.len() as u32;
            text.push_str(s);
            TextRange {
                offset,
                len: s.len() as u32,
            }
        })
        .collect();
    let resolve = |idx: u32| ranges.get(idx as usize).copied().ok_or(Error::CorruptCapture);

    let mut scopes = Vec::with_capacity(raw_scopes.len());
    let mut stats = Vec::with_capacity(raw_scopes.len());
    for (i, raw_scope) in raw_scopes.iter().enumerate() {
        scopes.push(ScopeRecord {
            start: raw_scope.start,
            end: raw_scope.end,
            thread_id: raw_scope.thread_id,
            name: resolve(raw_scope.name_idx)?,
            file: resolve(raw_scope.file_idx)?,
            line: raw_scope.line,
            level: raw_scope.level,
            stats: Some(i as u32),
        });
        let inclusive = raw_scope.end - raw_scope.start;
        stats.push(ScopeStats {
            inclusive_time: inclusive,
            exclusive_time: inclusive,
            inclusive_time_total: 0,
            exclusive_time_total: 0,
            occurrences: 0,
        });
    }

    let mut threads = Vec::with_capacity(raw_threads.len());
    for (thread_id, name_idx) in raw_threads {
        let name = strings.get(name_idx as usize).ok_or(Error::CorruptCapture)?;
        threads.push(ThreadEntry {
            thread_id,
            name: Arc::from(name.as_str()),
        });
    }

    // Exclusive time: subtract each immediate child, identified by strict
    // time-containment at the next level on the same thread.
    for i in 0..scopes.len() {
        for j in 0..scopes.len() {
            let (si, sj) = (scopes[i], scopes[j]);
            if sj.thread_id == si.thread_id
                && sj.level == si.level + 1
                && sj.start > si.start
                && sj.end < si.end
            {
                stats[i].exclusive_time =
                    stats[i].exclusive_time.saturating_sub(stats[j].inclusive_time);
            }
        }
    }

    // Per-name aggregation: totals accumulate on the stats record of the
    // first occurrence, which the aggregate table points at.
    let text_of = |range: TextRange| {
        text.get(range.offset as usize..(range.offset + range.len) as usize)
            .unwrap_or_default()
    };
    let mut aggregate: Vec<ScopeRecord> = Vec::new();
    for i in 0..scopes.len() {
        stats[i].inclusive_time_total = stats[i].inclusive_time;
        stats[i].exclusive_time_total = stats[i].exclusive_time;

        let found = aggregate
            .iter()
            .position(|a| text_of(a.name) == text_of(scopes[i].name));
        match found.and_then(|j| aggregate[j].stats) {
            None => {
                aggregate.push(scopes[i]);
                stats[i].occurrences = 1;
            }
            Some(k) => {
                let k = k as usize;
                stats[k].inclusive_time_total += stats[i].inclusive_time;
                stats[k].exclusive_time_total += stats[i].exclusive_time;
                stats[k].occurrences += 1;
            }
        }
    }

    frame.scopes = scopes;
    frame.threads = threads;
    frame.start_time = start_time;
    frame.end_time = end_time;
    frame.prev_frame_time = prev_frame_time;
    frame.cpu_frequency = cpu_frequency;
    frame.platform_id = platform_id;
    frame.aggregate = aggregate;
    frame.text = Arc::new(text);
    frame.stats = stats;
    Ok(())
}

/// Decodes only the frame duration, in milliseconds.
///
/// Fast path for capture-file navigators that index many frames without
/// allocating their scope arrays.
///
/// # Errors
///
/// Same failure modes as [`load`].
pub fn load_time_only(buf: &[u8]) -> Result<f32> {
    let raw = decompress(buf)?;
    let mut r = Cursor::new(raw.as_slice());
    let read_err = |_| Error::PrematureEnd;

    let start_time = r.read_u64::<LE>().map_err(read_err)?;
    let end_time = r.read_u64::<LE>().map_err(read_err)?;
    let _prev_frame_time = r.read_u64::<LE>().map_err(read_err)?;
    let _platform_id = r.read_u8().map_err(read_err)?;
    let cpu_frequency = r.read_u64::<LE>().map_err(read_err)?;

    if end_time < start_time {
        return Err(Error::CorruptCapture);
    }
    Ok(clock::clock_to_ms(end_time - start_time, cpu_frequency))
}

// ----------------------------------------------------------------------------
