use std::cmp::min;
use std::io::{self, Read, Seek, SeekFrom};

use tracing::debug;

use crate::error::{Result, StreamError};

/// Reference point for a seek, numbered like the classic seekable-stream modes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start = 0,
    Current = 1,
    End = 2,
}

impl TryFrom<i32> for Whence {
    type Error = StreamError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Whence::Start),
            1 => Ok(Whence::Current),
            2 => Ok(Whence::End),
            v => Err(StreamError::InvalidMode(v)),
        }
    }
}

/// Outcome of a `read` or `seek` call.
///
/// `Exhausted` and `InvalidOffset` are distinct here, but both surface as
/// [`Signal::EndOfStream`] to callers that only see the collapsed signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Exhausted,
    InvalidOffset,
    InvalidMode,
}

/// The externally observed form of a [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Ok,
    EndOfStream,
    InvalidArgument,
}

impl Status {
    pub fn signal(self) -> Signal {
        match self {
            Status::Ok => Signal::Ok,
            Status::Exhausted | Status::InvalidOffset => Signal::EndOfStream,
            Status::InvalidMode => Signal::InvalidArgument,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

/// A deterministic virtual byte stream.
///
/// For a position `p`:
/// - `p < block_size * block_count`: the byte is `(p / block_size) % 256`
/// - `p < total_size()`: the byte is `0`
/// - otherwise there is no byte (end of stream)
///
/// The cursor may be placed anywhere at or after zero, including past the end.
/// The stream has no internal synchronization; wrap it for shared use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticStream {
    block_size: u64,
    block_count: u64,
    extra_len: u64,
    cursor: u64,
}

impl SyntheticStream {
    /// Creates a stream positioned at 0.
    ///
    /// Fails if `block_size` is zero or the total size does not fit in a `u64`.
    pub fn new(block_size: u64, block_count: u64, extra_len: u64) -> Result<Self> {
        let invalid = StreamError::InvalidLayout {
            block_size,
            block_count,
            extra_len,
        };
        if block_size == 0 {
            return Err(invalid);
        }
        block_size
            .checked_mul(block_count)
            .and_then(|blocks| blocks.checked_add(extra_len))
            .ok_or(invalid)?;

        Ok(Self {
            block_size,
            block_count,
            extra_len,
            cursor: 0,
        })
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    pub fn extra_len(&self) -> u64 {
        self.extra_len
    }

    /// Size of the block region.
    pub fn blocks_size(&self) -> u64 {
        self.block_size * self.block_count
    }

    pub fn total_size(&self) -> u64 {
        self.blocks_size() + self.extra_len
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// The byte at `pos`, or `None` at or past the end.
    pub fn byte_at(&self, pos: u64) -> Option<u8> {
        if pos >= self.total_size() {
            None
        } else if pos >= self.blocks_size() {
            Some(0)
        } else {
            Some((pos / self.block_size % 256) as u8)
        }
    }

    /// Fills `buf` from the cursor, advancing it by the number of bytes produced.
    ///
    /// A short fill is reported together with [`Status::Exhausted`] in the same call.
    /// An empty buffer is a no-op returning `(0, Status::Ok)`.
    pub fn read(&mut self, buf: &mut [u8]) -> (usize, Status) {
        if buf.is_empty() {
            return (0, Status::Ok);
        }

        let total = self.total_size();
        let blocks = self.blocks_size();
        let mut written = 0;

        while written < buf.len() {
            let pos = self.cursor;
            if pos >= total {
                return (written, Status::Exhausted);
            }

            // Fill one uniform run at a time: the rest of the current block, or the zero tail.
            let (value, run_end) = if pos < blocks {
                let block = pos / self.block_size;
                ((block % 256) as u8, (block + 1) * self.block_size)
            } else {
                (0, total)
            };

            let n = min(run_end - pos, (buf.len() - written) as u64) as usize;
            buf[written..written + n].fill(value);
            written += n;
            self.cursor += n as u64;
        }

        (written, Status::Ok)
    }

    /// Moves the cursor relative to `whence`.
    ///
    /// There is no upper bound. A target below zero (or one that overflows) is rejected
    /// with [`Status::InvalidOffset`] and leaves the cursor unchanged.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> (u64, Status) {
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => self.cursor,
            Whence::End => self.total_size(),
        };

        match base.checked_add_signed(offset) {
            Some(target) => {
                self.cursor = target;
                (target, Status::Ok)
            },
            None => {
                debug!(offset, ?whence, cursor = self.cursor, "rejected seek target");
                (self.cursor, Status::InvalidOffset)
            },
        }
    }

    /// Same as [`seek`](Self::seek), taking the numeric mode. Unknown modes return
    /// [`Status::InvalidMode`] without touching the cursor.
    pub fn seek_raw(&mut self, offset: i64, whence: i32) -> (u64, Status) {
        match Whence::try_from(whence) {
            Ok(whence) => self.seek(offset, whence),
            Err(e) => {
                debug!(whence, "{e}");
                (self.cursor, Status::InvalidMode)
            },
        }
    }
}

impl Read for SyntheticStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (n, _) = SyntheticStream::read(self, buf);
        Ok(n)
    }
}

impl Seek for SyntheticStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(target) => {
                self.cursor = target;
                return Ok(target);
            },
            SeekFrom::Current(offset) => (offset, Whence::Current),
            SeekFrom::End(offset) => (offset, Whence::End),
        };

        match SyntheticStream::seek(self, offset, whence) {
            (target, Status::Ok) => Ok(target),
            _ => Err(StreamError::InvalidOffset.into()),
        }
    }
}
