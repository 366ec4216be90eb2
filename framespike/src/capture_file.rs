//! Multi-frame capture files.
//!
//! Applications that stream captures to disk concatenate frames into one
//! file: a 4-byte magic, then repeated `{u32 frame_size, frame_size bytes of
//! codec output}` records until end of file, no trailer. A file without the
//! magic is treated as a single bare frame, which is what a one-off
//! [`codec::save_to_vec`] dump produces.
//!
//! [`codec::save_to_vec`]: crate::codec::save_to_vec

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context as _;
use byteorder::{LittleEndian as LE, WriteBytesExt as _};

use crate::codec;
use crate::frame::FrameData;

/// Leading magic of a multi-frame capture file.
pub const CAPTURE_MAGIC: u32 = 0x2323_2323;

/// Appends frames to a multi-frame capture stream.
pub struct CaptureFileWriter<W: Write> {
    writer: W,
}

impl<W: Write> CaptureFileWriter<W> {
    /// Starts a capture stream on `writer` by writing the magic.
    ///
    /// # Errors
    ///
    /// Any error of the underlying writer.
    pub fn new(mut writer: W) -> anyhow::Result<Self> {
        writer.write_u32::<LE>(CAPTURE_MAGIC)?;
        Ok(Self { writer })
    }

    /// Encodes `frame` and appends it as one record.
    ///
    /// # Errors
    ///
    /// Any error of the underlying writer.
    pub fn append(&mut self, frame: &FrameData) -> anyhow::Result<()> {
        let bytes = codec::save_to_vec(frame);
        self.writer.write_u32::<LE>(bytes.len() as u32)?;
        self.writer.write_all(&bytes)?;
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Any error of the underlying writer.
    pub fn finish(mut self) -> anyhow::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl CaptureFileWriter<BufWriter<File>> {
    /// Creates a capture file at `path`.
    ///
    /// # Errors
    ///
    /// File creation or write errors.
    pub fn create(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("creating capture file {}", path.display()))?;
        Self::new(BufWriter::new(file))
    }
}

/// Index entry for one frame in a capture file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameRecord {
    /// Byte offset of the frame's codec output within the file.
    pub offset: usize,
    /// Size of the codec output in bytes.
    pub size: usize,
    /// Frame duration in milliseconds, decoded up front for navigation.
    pub time_ms: f32,
}

/// A capture file held in memory, with a per-frame navigation index.
///
/// Frames are decoded lazily: building the index only reads each frame's
/// header via [`codec::load_time_only`]; [`Self::load_frame`] decodes one
/// frame in full on demand.
pub struct CaptureFile {
    data: Vec<u8>,
    records: Vec<FrameRecord>,
    multi_frame: bool,
}

impl CaptureFile {
    /// Indexes a capture held in `data`.
    ///
    /// # Errors
    ///
    /// [`codec::Error`] when a record is truncated or does not decode.
    pub fn from_bytes(data: Vec<u8>) -> codec::Result<Self> {
        let multi_frame = data.len() >= 4
            && u32::from_le_bytes([data[0], data[1], data[2], data[3]]) == CAPTURE_MAGIC;

        let mut records = Vec::new();
        if multi_frame {
            let mut offset = 4_usize;
            while offset < data.len() {
                let header = data
                    .get(offset..offset + 4)
                    .ok_or(codec::Error::PrematureEnd)?;
                let size = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
                let begin = offset + 4;
                let end = begin.checked_add(size).ok_or(codec::Error::CorruptCapture)?;
                let bytes = data.get(begin..end).ok_or(codec::Error::PrematureEnd)?;
                records.push(FrameRecord {
                    offset: begin,
                    size,
                    time_ms: codec::load_time_only(bytes)?,
                });
                offset = end;
            }
        } else {
            // No magic: the file must be one bare frame.
            let time_ms = codec::load_time_only(&data).map_err(|_| codec::Error::BadMagic)?;
            records.push(FrameRecord {
                offset: 0,
                size: data.len(),
                time_ms,
            });
        }

        Ok(Self {
            data,
            records,
            multi_frame,
        })
    }

    /// Reads and indexes the capture file at `path`.
    ///
    /// # Errors
    ///
    /// Read errors, or [`codec::Error`] for malformed captures.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("reading capture file {}", path.display()))?;
        Ok(Self::from_bytes(data)?)
    }

    /// Whether the file carried the multi-frame magic.
    pub fn is_multi_frame(&self) -> bool {
        self.multi_frame
    }

    /// The navigation index, in file order.
    pub fn frames(&self) -> &[FrameRecord] {
        &self.records
    }

    /// Fully decodes the frame at `index` into `out`.
    ///
    /// # Errors
    ///
    /// [`codec::Error::PrematureEnd`] for an out-of-range index, or any
    /// [`codec::load`] failure.
    pub fn load_frame(&self, index: usize, out: &mut FrameData) -> codec::Result<()> {
        let record = self.records.get(index).ok_or(codec::Error::PrematureEnd)?;
        codec::load(out, &self.data[record.offset..record.offset + record.size])
    }
}
