#![allow(dead_code)]

use std::thread;
use std::time::Duration;

use framespike::{FrameData, Profiler, ScopeRecord};

pub fn sleep_ms(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}

/// Snapshot of the profiler's display buffer.
pub fn frame_of(profiler: &Profiler) -> FrameData {
    let mut frame = FrameData::default();
    profiler.get_frame(&mut frame);
    frame
}

/// All scopes in `frame` with the given name.
pub fn scopes_named<'f>(frame: &'f FrameData, name: &str) -> Vec<&'f ScopeRecord> {
    frame
        .scopes
        .iter()
        .filter(|s| frame.scope_name(s) == name)
        .collect()
}

pub fn scope_ms(frame: &FrameData, scope: &ScopeRecord) -> f32 {
    framespike::clock::clock_to_ms(scope.end - scope.start, frame.cpu_frequency)
}

/// Asserts the display ordering contract: ascending `(thread_id, level,
/// start)`.
pub fn assert_sorted(frame: &FrameData) {
    let key = |s: &ScopeRecord| (s.thread_id, s.level, s.start);
    assert!(
        frame.scopes.windows(2).all(|w| key(&w[0]) <= key(&w[1])),
        "display scopes out of order"
    );
}
