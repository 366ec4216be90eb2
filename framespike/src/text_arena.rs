//! Fixed-capacity string interning for scope names and source paths.

use crate::frame::TextRange;

/// Interned in place of the caller's string when an arena runs out of room.
pub(crate) const OUT_OF_SPACE: &str = "Not enough space!";

/// A bump interner over a capped `String` buffer.
///
/// The buffer grows lazily up to `capacity`; once full, every further intern
/// resolves to the [`OUT_OF_SPACE`] sentinel until the next [`reset`].
///
/// [`reset`]: Self::reset
pub(crate) struct TextArena {
    buf: String,
    capacity: usize,
    sentinel: TextRange,
    warned: bool,
}

impl TextArena {
    pub fn new(capacity: usize) -> Self {
        let mut arena = Self {
            buf: String::new(),
            capacity,
            sentinel: TextRange::default(),
            warned: false,
        };
        arena.reset();
        arena
    }

    /// Discards all interned strings. The overflow sentinel is re-interned
    /// first so it is always resolvable.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.buf.push_str(OUT_OF_SPACE);
        self.sentinel = TextRange {
            offset: 0,
            len: OUT_OF_SPACE.len() as u32,
        };
        self.warned = false;
    }

    /// Copies `text` into the arena and returns its range, or the sentinel
    /// range when the arena is full.
    pub fn intern(&mut self, text: &str) -> TextRange {
        if self.buf.len() + text.len() > self.capacity {
            if !self.warned {
                log::warn!("profiler text arena full; scope names will be dropped");
                self.warned = true;
            }
            return self.sentinel;
        }
        let offset = self.buf.len() as u32;
        self.buf.push_str(text);
        TextRange {
            offset,
            len: text.len() as u32,
        }
    }

    /// Resolves a range previously returned by [`Self::intern`].
    pub fn get(&self, range: TextRange) -> &str {
        self.buf
            .get(range.offset as usize..(range.offset + range.len) as usize)
            .unwrap_or_default()
    }

    /// Takes the backing buffer, leaving the arena empty. Pair with
    /// [`Self::restore`] and [`Self::reset`].
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.buf)
    }

    /// Reclaims a previously published buffer if nobody else holds it,
    /// keeping its allocation for the next capture period.
    pub fn restore(&mut self, buf: std::sync::Arc<String>) {
        self.buf = match std::sync::Arc::try_unwrap(buf) {
            Ok(mut owned) => {
                owned.clear();
                owned
            }
            Err(_) => String::new(),
        };
    }
}
