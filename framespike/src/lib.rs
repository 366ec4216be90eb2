//! Threshold-triggered instrumentation profiler for frame-based
//! applications.
//!
//! Instrumented code opens and closes scopes on any thread; once per
//! main-loop iteration the application marks a frame boundary. When a frame
//! crosses the configured latency threshold it is promoted to the display
//! buffer, where it can be inspected or serialized to a compact compressed
//! capture.
//!
//! Usage:
//!
//! ``` no_run
//! fn main() {
//!     let profiler = framespike::Profiler::global();
//!     profiler.set_threshold(16.0, 0); // capture frames longer than 16 ms
//!
//!     // game loop
//!     loop {
//!         profiler.begin_frame();
//!
//!         {
//!             framespike::profile_scope!("slow_code");
//!             slow_code();
//!         }
//!
//!         if profiler.was_threshold_crossed() {
//!             let mut frame = framespike::FrameData::default();
//!             profiler.get_frame(&mut frame);
//!             // inspect or save `frame`
//!         }
//!     }
//! }
//!
//! # fn slow_code(){}
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod capture_file;
pub mod clock;
pub mod codec;
mod context;
mod frame;
mod free_list;
mod text_arena;

pub use capture_file::{CaptureFile, CaptureFileWriter, FrameRecord, CAPTURE_MAGIC};
pub use codec::{Error, Result};
pub use context::{Profiler, ScopeGuard, ScopeHandle};
pub use frame::{FrameBuilder, FrameData, ScopeRecord, ScopeStats, TextRange, ThreadEntry};

/// Maximum number of scopes alive between two frame boundaries. Scopes begun
/// beyond this are silently dropped.
pub const MAX_SCOPES: usize = 16 * 1024;

/// Capacity in bytes of each of the profiler's text arenas. Once an arena is
/// full, further scope names degrade to a sentinel string.
pub const TEXT_CAPACITY: usize = 1024 * 1024;

/// Maximum number of thread entries reported by [`Profiler::get_frame`].
/// Registrations beyond this are kept but not displayed.
pub const MAX_DRAW_THREADS: usize = 1024;

/// Profiles the current block on the global [`Profiler`].
///
/// Opens a scope named `$name` at the call site and closes it at the end of
/// the enclosing block, whichever way it is left.
///
/// ```
/// fn load_level() {
///     framespike::profile_scope!("load_level");
///     /* … */
/// }
/// ```
#[macro_export]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profiler_scope = $crate::Profiler::global().scope(file!(), line!(), $name);
    };
}
