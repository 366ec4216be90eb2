//! The externally visible frame snapshot and its statistics types.

use std::sync::Arc;

use crate::clock;

/// A slice of a frame's text arena.
///
/// Scope names and file paths are stored once per frame in a shared text
/// buffer; records carry ranges instead of owned strings so snapshots stay
/// cheap to copy. Resolve with [`FrameData::text`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextRange {
    /// Byte offset into the frame's text buffer.
    pub offset: u32,
    /// Length in bytes.
    pub len: u32,
}

/// One recorded open→close interval on one thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScopeRecord {
    /// Tick at which the scope was opened.
    pub start: u64,
    /// Tick at which the scope was closed. Equal to `start` while open.
    pub end: u64,
    /// Stable id of the thread the scope ran on.
    pub thread_id: u64,
    /// Scope name.
    pub name: TextRange,
    /// Source file the scope was opened in.
    pub file: TextRange,
    /// Source line the scope was opened at.
    pub line: u32,
    /// Nesting depth on the owning thread, 0 for the outermost scope.
    pub level: u32,
    /// Index into the owning frame's statistics table. Only present in
    /// loaded frames; live captures carry `None`.
    pub stats: Option<u32>,
}

/// A registered thread and its display name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThreadEntry {
    /// Stable thread id, as reported by [`clock::thread_id`].
    pub thread_id: u64,
    /// Name registered for the thread.
    pub name: Arc<str>,
}

/// Per-scope timing statistics, populated when a capture is loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScopeStats {
    /// Duration of this occurrence, in ticks.
    pub inclusive_time: u64,
    /// [`Self::inclusive_time`] minus the inclusive time of immediate
    /// children.
    pub exclusive_time: u64,
    /// Inclusive time accumulated across all same-named occurrences.
    pub inclusive_time_total: u64,
    /// Exclusive time accumulated across all same-named occurrences.
    pub exclusive_time_total: u64,
    /// Number of same-named occurrences. Non-zero only on the entry the
    /// aggregate table points at.
    pub occurrences: u32,
}

/// One frame worth of profiling data.
///
/// Produced either by [`Profiler::get_frame`] (a live snapshot) or by
/// [`codec::load`] (a capture read back from bytes, with the statistics
/// tables filled in).
///
/// [`Profiler::get_frame`]: crate::Profiler::get_frame
/// [`codec::load`]: crate::codec::load
#[derive(Clone, Debug, Default)]
pub struct FrameData {
    /// Recorded scopes, sorted by `(thread_id, level, start)`.
    pub scopes: Vec<ScopeRecord>,
    /// Registered threads, ascending by id.
    pub threads: Vec<ThreadEntry>,
    /// Tick of the frame's beginning boundary.
    pub start_time: u64,
    /// Tick of the frame's ending boundary.
    pub end_time: u64,
    /// Duration of the frame in ticks (`end_time - start_time`).
    pub prev_frame_time: u64,
    /// Tick frequency at capture time.
    pub cpu_frequency: u64,
    /// Threshold in milliseconds that was configured at capture time.
    pub time_threshold: f32,
    /// Threshold level that was configured at capture time; 0 means the
    /// whole-frame threshold.
    pub level_threshold: u32,
    /// Platform the frame was captured on. See [`clock::platform_name`].
    pub platform_id: u8,
    /// One entry per distinct scope name, present in loaded frames only.
    /// Each entry's [`ScopeRecord::stats`] points at the statistics record
    /// that accumulates totals for that name.
    pub aggregate: Vec<ScopeRecord>,

    pub(crate) text: Arc<String>,
    pub(crate) stats: Vec<ScopeStats>,
}

impl FrameData {
    /// Resolves a text range against this frame's text buffer.
    pub fn text(&self, range: TextRange) -> &str {
        self.text
            .get(range.offset as usize..(range.offset + range.len) as usize)
            .unwrap_or_default()
    }

    /// The name of a scope belonging to this frame.
    pub fn scope_name(&self, scope: &ScopeRecord) -> &str {
        self.text(scope.name)
    }

    /// The source file of a scope belonging to this frame.
    pub fn scope_file(&self, scope: &ScopeRecord) -> &str {
        self.text(scope.file)
    }

    /// The statistics record of a scope, if this frame was loaded from a
    /// capture.
    pub fn scope_stats(&self, scope: &ScopeRecord) -> Option<&ScopeStats> {
        scope.stats.and_then(|i| self.stats.get(i as usize))
    }

    /// Frame duration in milliseconds.
    pub fn duration_ms(&self) -> f32 {
        clock::clock_to_ms(
            self.end_time.saturating_sub(self.start_time),
            self.cpu_frequency,
        )
    }

    /// Drops everything the frame owns, leaving it as if default-constructed.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Starts building a synthetic frame, e.g. for importing data recorded
    /// elsewhere or for test fixtures.
    pub fn builder() -> FrameBuilder {
        FrameBuilder::default()
    }
}

/// Builds a [`FrameData`] from scratch, interning strings into an owned text
/// buffer.
#[derive(Default)]
pub struct FrameBuilder {
    text: String,
    scopes: Vec<ScopeRecord>,
    threads: Vec<ThreadEntry>,
    start_time: u64,
    end_time: u64,
    cpu_frequency: u64,
    platform_id: u8,
}

impl FrameBuilder {
    /// Sets the frame boundary ticks.
    pub fn bounds(mut self, start_time: u64, end_time: u64) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    /// Sets the tick frequency. Defaults to the live clock's frequency.
    pub fn frequency(mut self, ticks_per_second: u64) -> Self {
        self.cpu_frequency = ticks_per_second;
        self
    }

    /// Sets the platform id. Defaults to the running platform.
    pub fn platform(mut self, platform_id: u8) -> Self {
        self.platform_id = platform_id;
        self
    }

    /// Adds a registered thread.
    pub fn thread(mut self, thread_id: u64, name: &str) -> Self {
        self.threads.push(ThreadEntry {
            thread_id,
            name: Arc::from(name),
        });
        self
    }

    /// Adds a scope record.
    #[expect(clippy::too_many_arguments)]
    pub fn scope(
        mut self,
        thread_id: u64,
        level: u32,
        name: &str,
        file: &str,
        line: u32,
        start: u64,
        end: u64,
    ) -> Self {
        let name = self.intern(name);
        let file = self.intern(file);
        self.scopes.push(ScopeRecord {
            start,
            end,
            thread_id,
            name,
            file,
            line,
            level,
            stats: None,
        });
        self
    }

    fn intern(&mut self, text: &str) -> TextRange {
        let offset = self.text.len() as u32;
        self.text.push_str(text);
        TextRange {
            offset,
            len: text.len() as u32,
        }
    }

    /// Finishes the frame. Scopes are sorted the way a published live frame
    /// would be.
    pub fn build(self) -> FrameData {
        let mut scopes = self.scopes;
        scopes.sort_by_key(|s| (s.thread_id, s.level, s.start));
        FrameData {
            scopes,
            threads: self.threads,
            start_time: self.start_time,
            end_time: self.end_time,
            prev_frame_time: self.end_time.saturating_sub(self.start_time),
            cpu_frequency: if self.cpu_frequency == 0 {
                clock::ticks_per_second()
            } else {
                self.cpu_frequency
            },
            time_threshold: 0.0,
            level_threshold: 0,
            platform_id: if self.platform_id == 0 {
                clock::platform_id()
            } else {
                self.platform_id
            },
            aggregate: Vec::new(),
            text: Arc::new(self.text),
            stats: Vec::new(),
        }
    }
}
