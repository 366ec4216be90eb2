//! The profiler context: scope capture, frame transitions, thresholding.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::clock;
use crate::frame::{FrameData, ScopeRecord, TextRange, ThreadEntry};
use crate::free_list::FreeList;
use crate::text_arena::TextArena;
use crate::{MAX_DRAW_THREADS, MAX_SCOPES, TEXT_CAPACITY};

thread_local! {
    /// Nesting depth of open scopes on this thread.
    static SCOPE_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Identifies a scope handed out by [`Profiler::begin_scope`].
///
/// Handles are opaque and cheap to copy. An invalid handle (returned when
/// the profiler is out of scope slots) is accepted everywhere as a no-op, so
/// instrumented code never has to branch on exhaustion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeHandle {
    index: u32,
    generation: u32,
}

impl ScopeHandle {
    /// The handle returned when no scope slot could be allocated.
    pub const INVALID: Self = Self {
        index: u32::MAX,
        generation: 0,
    };

    /// Whether this handle refers to an allocated scope.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.index != u32::MAX
    }
}

/// Data for one scope slot, mutated only under the context mutex.
///
/// The closing timestamp lives outside the mutex (see [`Profiler::ends`])
/// so `end_scope` stays lock-free.
#[derive(Clone, Copy, Default)]
struct SlotData {
    start: u64,
    thread_id: u64,
    name: TextRange,
    file: TextRange,
    line: u32,
    level: u32,
}

struct Inner {
    allocator: FreeList,
    slots: Box<[SlotData]>,
    /// Slots of every scope begun since the last frame boundary, open or
    /// closed. Compacted to the still-open ones at `begin_frame`.
    open_scopes: Vec<u32>,

    /// Interning target for scopes begun in the current frame.
    capture: TextArena,
    /// Transient re-intern source for scopes straddling the frame boundary.
    open: TextArena,

    /// Text of the most recently published frame, shared with snapshots.
    display_text: Arc<String>,
    display_scopes: Vec<ScopeRecord>,
    display_start: u64,
    display_end: u64,

    /// Tick recorded by the previous `begin_frame` call.
    last_frame_tick: Option<u64>,

    threshold_crossed: bool,
    time_threshold: f32,
    level_threshold: u32,
    paused: bool,

    thread_names: BTreeMap<u64, Arc<str>>,
}

/// A profiler context.
///
/// Owns the scope allocator, the capture and display buffers, the threshold
/// configuration and the thread-name registry. All mutations are serialized
/// by a single mutex, except [`Self::end_scope`], which only touches the
/// per-slot atomic closing timestamp — it is the most frequent operation and
/// deliberately never locks.
///
/// Most applications use the process-wide instance via [`Profiler::global`];
/// embedding an explicit `Profiler` value works the same way.
pub struct Profiler {
    inner: Mutex<Inner>,
    /// Closing tick per slot; equal to the slot's `start` while open.
    ends: Box<[AtomicU64]>,
    /// Bumped when a slot is freed, invalidating outstanding handles.
    generations: Box<[AtomicU32]>,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Profiler {
    /// Creates a context with the default capacities ([`MAX_SCOPES`],
    /// [`TEXT_CAPACITY`]).
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                allocator: FreeList::new(MAX_SCOPES as u32),
                slots: vec![SlotData::default(); MAX_SCOPES].into_boxed_slice(),
                open_scopes: Vec::with_capacity(MAX_SCOPES),
                capture: TextArena::new(TEXT_CAPACITY),
                open: TextArena::new(TEXT_CAPACITY),
                display_text: Arc::new(String::new()),
                display_scopes: Vec::new(),
                display_start: 0,
                display_end: 0,
                last_frame_tick: None,
                threshold_crossed: false,
                time_threshold: 0.0,
                level_threshold: 0,
                paused: false,
                thread_names: BTreeMap::new(),
            }),
            ends: (0..MAX_SCOPES).map(|_| AtomicU64::new(0)).collect(),
            generations: (0..MAX_SCOPES).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// The process-wide profiler instance.
    pub fn global() -> &'static Self {
        static GLOBAL: std::sync::OnceLock<Profiler> = std::sync::OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Sets the capture threshold.
    ///
    /// A frame is promoted to the display buffer when it crosses the
    /// threshold: with `level == 0` the whole frame must last at least `ms`
    /// milliseconds; with `level > 0` some scope at nesting depth
    /// `level - 1` must.
    pub fn set_threshold(&self, ms: f32, level: u32) {
        let mut inner = self.inner.lock();
        inner.time_threshold = ms;
        inner.level_threshold = level;
    }

    /// Registers a display name for the calling thread.
    pub fn register_thread(&self, name: &str) {
        self.register_thread_id(clock::thread_id(), name);
    }

    /// Registers a display name for an arbitrary thread id. A second
    /// registration for the same id overwrites the first.
    pub fn register_thread_id(&self, thread_id: u64, name: &str) {
        self.inner
            .lock()
            .thread_names
            .insert(thread_id, Arc::from(name));
    }

    /// Removes a thread's display name.
    pub fn unregister_thread(&self, thread_id: u64) {
        self.inner.lock().thread_names.remove(&thread_id);
    }

    /// Whether capture is paused. While paused, frames are never promoted to
    /// the display buffer.
    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    /// Pauses or resumes capture.
    pub fn set_paused(&self, paused: bool) {
        self.inner.lock().paused = paused;
    }

    /// Whether the last completed frame crossed the configured threshold.
    /// Always `false` while paused.
    pub fn was_threshold_crossed(&self) -> bool {
        let inner = self.inner.lock();
        !inner.paused && inner.threshold_crossed
    }

    /// Opens a scope on the calling thread.
    ///
    /// Returns [`ScopeHandle::INVALID`] when the profiler is out of scope
    /// slots; the scope is then silently dropped and closing the handle is a
    /// no-op. Prefer [`Self::scope`] or [`profile_scope!`], which pair the
    /// close automatically.
    ///
    /// [`profile_scope!`]: crate::profile_scope
    pub fn begin_scope(&self, file: &str, line: u32, name: &str) -> ScopeHandle {
        let thread_id = clock::thread_id();
        let level = SCOPE_DEPTH.get();

        let handle = {
            let mut inner = self.inner.lock();
            if inner.open_scopes.len() == MAX_SCOPES {
                return ScopeHandle::INVALID;
            }
            let Some(index) = inner.allocator.alloc() else {
                return ScopeHandle::INVALID;
            };

            let name = inner.capture.intern(name);
            let file = inner.capture.intern(file);
            let start = clock::now();
            inner.slots[index as usize] = SlotData {
                start,
                thread_id,
                name,
                file,
                line,
                level,
            };
            self.ends[index as usize].store(start, Ordering::Relaxed);
            inner.open_scopes.push(index);

            ScopeHandle {
                index,
                generation: self.generations[index as usize].load(Ordering::Relaxed),
            }
        };

        SCOPE_DEPTH.set(level + 1);
        handle
    }

    /// Closes a scope. Takes no lock: the closing tick is a single atomic
    /// store into the slot handed out by [`Self::begin_scope`].
    ///
    /// No-op on invalid handles and on handles whose slot has since been
    /// recycled.
    pub fn end_scope(&self, handle: ScopeHandle) {
        if !handle.is_valid() {
            return;
        }
        let index = handle.index as usize;
        if self.generations[index].load(Ordering::Acquire) != handle.generation {
            return;
        }

        // `start == end` means "still open", so a scope closed on the tick it
        // was opened must claim at least one tick.
        let start = self.ends[index].load(Ordering::Relaxed);
        let end = clock::now().max(start + 1);
        self.ends[index].store(end, Ordering::Release);

        let depth = SCOPE_DEPTH.get();
        debug_assert!(depth > 0, "end_scope without matching begin_scope");
        SCOPE_DEPTH.set(depth.saturating_sub(1));
    }

    /// Opens a guarded scope that closes itself at the end of the enclosing
    /// block.
    pub fn scope<'p>(&'p self, file: &str, line: u32, name: &str) -> ScopeGuard<'p> {
        ScopeGuard {
            profiler: self,
            handle: self.begin_scope(file, line, name),
            _not_send: std::marker::PhantomData,
        }
    }

    /// Marks a frame boundary. Call once per main-loop iteration.
    ///
    /// Closed scopes are harvested and, if the threshold was crossed while
    /// capture is not paused, published to the display buffer together with
    /// the frame bounds. Scopes still open at the boundary are carried into
    /// the new frame and will be published in the frame in which they close,
    /// keeping their original start tick.
    pub fn begin_frame(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let frame_end = clock::now();
        let frame_begin = inner.last_frame_tick.unwrap_or(frame_end);
        inner.last_frame_tick = Some(frame_end);

        inner.threshold_crossed = false;
        let threshold_level = i64::from(inner.level_threshold) - 1;
        let frequency = clock::ticks_per_second();

        inner.open.reset();
        let mut display: Vec<ScopeRecord> = Vec::with_capacity(inner.open_scopes.len());
        let mut retained: Vec<(u32, TextRange, TextRange)> = Vec::new();

        for &index in &inner.open_scopes {
            let slot = inner.slots[index as usize];
            let end = self.ends[index as usize].load(Ordering::Acquire);
            let still_open = end == slot.start;

            if still_open {
                // Keep the scope for the next frame; its name and file must
                // survive the capture arena reset below.
                let name = inner.open.intern(inner.capture.get(slot.name));
                let file = inner.open.intern(inner.capture.get(slot.file));
                retained.push((index, name, file));
            } else {
                display.push(ScopeRecord {
                    start: slot.start,
                    end,
                    thread_id: slot.thread_id,
                    name: slot.name,
                    file: slot.file,
                    line: slot.line,
                    level: slot.level,
                    stats: None,
                });
                self.generations[index as usize].fetch_add(1, Ordering::Release);
                inner.allocator.free(index);
            }

            if threshold_level == i64::from(slot.level) {
                let effective_end = if still_open { frame_end } else { end };
                let elapsed = clock::clock_to_ms(effective_end - slot.start, frequency);
                if inner.time_threshold <= elapsed {
                    inner.threshold_crossed = true;
                }
            }
        }

        if threshold_level == -1 {
            let frame_ms = clock::clock_to_ms(frame_end - frame_begin, frequency);
            if inner.time_threshold <= frame_ms {
                inner.threshold_crossed = true;
            }
        }

        if inner.threshold_crossed && !inner.paused {
            display.sort_by_key(|s| (s.thread_id, s.level, s.start));

            // Swap the capture text into display; the outgoing display
            // buffer is reclaimed for the next capture period if no snapshot
            // still holds it.
            let published = Arc::new(inner.capture.take());
            let reclaimed = std::mem::replace(&mut inner.display_text, published);
            inner.capture.restore(reclaimed);

            inner.display_scopes = display;
            inner.display_start = frame_begin;
            inner.display_end = frame_end;
        }

        inner.capture.reset();
        inner.open_scopes.clear();
        for (index, name, file) in retained {
            let slot = &mut inner.slots[index as usize];
            slot.name = inner.capture.intern(inner.open.get(name));
            slot.file = inner.capture.intern(inner.open.get(file));
            inner.open_scopes.push(index);
        }
    }

    /// Copies the most recently published frame into `out`.
    ///
    /// The thread list is the current registry, clipped to
    /// [`MAX_DRAW_THREADS`] entries.
    pub fn get_frame(&self, out: &mut FrameData) {
        let inner = self.inner.lock();

        out.scopes.clear();
        out.scopes.extend_from_slice(&inner.display_scopes);
        out.threads = inner
            .thread_names
            .iter()
            .take(MAX_DRAW_THREADS)
            .map(|(&thread_id, name)| ThreadEntry {
                thread_id,
                name: Arc::clone(name),
            })
            .collect();
        out.start_time = inner.display_start;
        out.end_time = inner.display_end;
        out.prev_frame_time = inner.display_end - inner.display_start;
        out.cpu_frequency = clock::ticks_per_second();
        out.time_threshold = inner.time_threshold;
        out.level_threshold = inner.level_threshold;
        out.platform_id = clock::platform_id();
        out.text = Arc::clone(&inner.display_text);
        out.aggregate.clear();
        out.stats.clear();
    }
}

/// Closes its scope when dropped, pairing `begin_scope`/`end_scope` across
/// any non-local control transfer.
///
/// Deliberately `!Send`: a scope must start and stop on the same thread, so
/// the guard must not migrate in async code.
pub struct ScopeGuard<'p> {
    profiler: &'p Profiler,
    handle: ScopeHandle,
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Drop for ScopeGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.profiler.end_scope(self.handle);
    }
}
