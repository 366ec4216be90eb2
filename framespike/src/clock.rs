//! Monotonic tick source and platform probes.
//!
//! Ticks are nanoseconds counted from a process-wide anchor taken the first
//! time the clock is read. Everything in a capture stays in ticks; conversion
//! to milliseconds happens only at presentation, via [`clock_to_ms`].

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Returns the current tick count.
#[inline]
pub fn now() -> u64 {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    ANCHOR.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// Number of ticks per second.
#[inline]
pub fn ticks_per_second() -> u64 {
    1_000_000_000
}

/// Converts a tick count to milliseconds given a tick frequency.
///
/// Returns `0.0` for a zero frequency, which only occurs on frames that were
/// never captured.
#[inline]
pub fn clock_to_ms(ticks: u64, frequency: u64) -> f32 {
    if frequency == 0 {
        0.0
    } else {
        (ticks as f64 / frequency as f64 * 1000.0) as f32
    }
}

/// A stable identifier for the calling thread.
///
/// Ids are assigned on first use and never reused within the process; they
/// are not OS thread ids.
pub fn thread_id() -> u64 {
    static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);
    thread_local! {
        static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
    }
    THREAD_ID.with(|id| *id)
}

/// Identifies the platform a capture was recorded on.
pub fn platform_id() -> u8 {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "windows")] {
            const PLATFORM_ID: u8 = 1;
        } else if #[cfg(target_os = "linux")] {
            const PLATFORM_ID: u8 = 2;
        } else if #[cfg(target_os = "ios")] {
            const PLATFORM_ID: u8 = 3;
        } else if #[cfg(target_os = "macos")] {
            const PLATFORM_ID: u8 = 4;
        } else if #[cfg(target_os = "android")] {
            const PLATFORM_ID: u8 = 7;
        } else if #[cfg(target_arch = "wasm32")] {
            const PLATFORM_ID: u8 = 9;
        } else {
            const PLATFORM_ID: u8 = 0xFF;
        }
    }
    PLATFORM_ID
}

/// Human-readable name for a platform id found in a capture.
///
/// Covers ids this crate never produces itself, so captures recorded by other
/// implementations of the format still render.
pub fn platform_name(platform_id: u8) -> &'static str {
    match platform_id {
        1 => "Windows",
        2 => "Linux",
        3 => "iOS",
        4 => "OSX",
        5 => "PlayStation 3",
        6 => "PlayStation 4",
        7 => "Android",
        8 => "XboxOne",
        9 => "WebGL",
        10 => "Nintendo Switch",
        _ => "Unknown platform",
    }
}
