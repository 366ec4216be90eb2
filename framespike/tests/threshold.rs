mod common;

use common::{assert_sorted, frame_of, scope_ms, scopes_named, sleep_ms};
use framespike::Profiler;

#[test]
fn quiet_frame_stays_under_threshold() {
    let profiler = Profiler::new();
    profiler.set_threshold(500.0, 0);

    profiler.begin_frame();
    let scope = profiler.begin_scope(file!(), line!(), "a");
    sleep_ms(1);
    profiler.end_scope(scope);
    profiler.begin_frame();

    assert!(!profiler.was_threshold_crossed());
}

#[test]
fn slow_frame_crosses_frame_level_threshold() {
    let profiler = Profiler::new();
    profiler.set_threshold(5.0, 0);

    profiler.begin_frame();
    let scope = profiler.begin_scope(file!(), line!(), "a");
    sleep_ms(20);
    profiler.end_scope(scope);
    profiler.begin_frame();

    assert!(profiler.was_threshold_crossed());
    let frame = frame_of(&profiler);
    let scopes = scopes_named(&frame, "a");
    assert_eq!(scopes.len(), 1);
    assert_eq!(scopes[0].level, 0);
    assert!(scope_ms(&frame, scopes[0]) >= 20.0);
    assert_eq!(frame.scope_file(scopes[0]), file!());
}

#[test]
fn scope_level_threshold_matches_level_minus_one() {
    let profiler = Profiler::new();

    // Level 1 threshold looks at scopes of depth 0.
    profiler.set_threshold(5.0, 1);
    profiler.begin_frame();
    let scope = profiler.begin_scope(file!(), line!(), "slow");
    sleep_ms(20);
    profiler.end_scope(scope);
    profiler.begin_frame();
    assert!(profiler.was_threshold_crossed());

    // A fast scope does not trip it, and with level > 0 the frame duration
    // itself never does.
    profiler.set_threshold(5000.0, 1);
    profiler.begin_frame();
    let scope = profiler.begin_scope(file!(), line!(), "fast");
    sleep_ms(1);
    profiler.end_scope(scope);
    profiler.begin_frame();
    assert!(!profiler.was_threshold_crossed());
}

#[test]
fn display_survives_non_crossing_frames() {
    let profiler = Profiler::new();
    profiler.set_threshold(5.0, 0);

    profiler.begin_frame();
    let scope = profiler.begin_scope(file!(), line!(), "slow");
    sleep_ms(10);
    profiler.end_scope(scope);
    profiler.begin_frame();
    assert!(profiler.was_threshold_crossed());
    let published = frame_of(&profiler);
    assert_eq!(scopes_named(&published, "slow").len(), 1);

    // A quiet frame must leave the last published display intact.
    profiler.begin_frame();
    assert!(!profiler.was_threshold_crossed());
    let still_there = frame_of(&profiler);
    assert_eq!(still_there.start_time, published.start_time);
    assert_eq!(scopes_named(&still_there, "slow").len(), 1);
}

#[test]
fn display_is_sorted_across_threads() {
    let profiler = Profiler::new();
    profiler.set_threshold(0.0, 0);
    profiler.begin_frame();

    std::thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                let outer = profiler.begin_scope(file!(), line!(), "outer");
                let inner = profiler.begin_scope(file!(), line!(), "inner");
                sleep_ms(1);
                profiler.end_scope(inner);
                profiler.end_scope(outer);
            });
        }
    });
    profiler.begin_frame();

    assert!(profiler.was_threshold_crossed());
    let frame = frame_of(&profiler);
    assert_eq!(frame.scopes.len(), 4);
    assert_sorted(&frame);

    for outer in scopes_named(&frame, "outer") {
        assert_eq!(outer.level, 0);
    }
    for inner in scopes_named(&frame, "inner") {
        assert_eq!(inner.level, 1);
    }
    // Every scope is contained in its frame.
    for scope in &frame.scopes {
        assert!(scope.end >= scope.start);
        assert!(scope.start >= frame.start_time);
        assert!(scope.end <= frame.end_time);
    }
}
