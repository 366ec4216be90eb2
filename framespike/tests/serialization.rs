mod common;

use common::{frame_of, scopes_named, sleep_ms};
use framespike::{codec, FrameData, Profiler};

#[test]
fn nested_scopes_exclusive_time() {
    let profiler = Profiler::new();
    profiler.set_threshold(0.0, 0);
    profiler.begin_frame();

    let parent = profiler.begin_scope(file!(), line!(), "parent");
    sleep_ms(10);
    let child = profiler.begin_scope(file!(), line!(), "child_a");
    sleep_ms(3);
    profiler.end_scope(child);
    let child = profiler.begin_scope(file!(), line!(), "child_b");
    sleep_ms(4);
    profiler.end_scope(child);
    sleep_ms(2);
    profiler.end_scope(parent);

    profiler.begin_frame();
    let frame = frame_of(&profiler);

    let mut loaded = FrameData::default();
    codec::load(&mut loaded, &codec::save_to_vec(&frame)).unwrap();

    let parent = scopes_named(&loaded, "parent")[0];
    let child_a = scopes_named(&loaded, "child_a")[0];
    let child_b = scopes_named(&loaded, "child_b")[0];
    assert_eq!(parent.level, 0);
    assert_eq!(child_a.level, 1);
    assert_eq!(child_b.level, 1);

    let p = loaded.scope_stats(parent).unwrap();
    let a = loaded.scope_stats(child_a).unwrap();
    let b = loaded.scope_stats(child_b).unwrap();

    let freq = loaded.cpu_frequency;
    let ms = |ticks| framespike::clock::clock_to_ms(ticks, freq);
    assert!(ms(p.inclusive_time) >= 19.0);
    assert!(ms(a.inclusive_time) >= 3.0);
    assert!(ms(b.inclusive_time) >= 4.0);

    // Exclusive time subtracts exactly the immediate children.
    assert_eq!(
        p.exclusive_time,
        p.inclusive_time - a.inclusive_time - b.inclusive_time
    );
    assert_eq!(a.exclusive_time, a.inclusive_time);
    assert_eq!(b.exclusive_time, b.inclusive_time);
    assert!(ms(p.exclusive_time) >= 12.0);
}

#[test]
fn aggregation_accumulates_repeats() {
    let profiler = Profiler::new();
    profiler.set_threshold(0.0, 0);
    profiler.begin_frame();

    for _ in 0..3 {
        let scope = profiler.begin_scope(file!(), line!(), "x");
        sleep_ms(1);
        profiler.end_scope(scope);
    }

    profiler.begin_frame();
    let frame = frame_of(&profiler);

    let mut loaded = FrameData::default();
    codec::load(&mut loaded, &codec::save_to_vec(&frame)).unwrap();

    let x: Vec<_> = loaded.aggregate.iter().filter(|s| loaded.scope_name(s) == "x").collect();
    assert_eq!(x.len(), 1);
    let stats = loaded.scope_stats(x[0]).unwrap();
    assert_eq!(stats.occurrences, 3);

    let occurrences = scopes_named(&loaded, "x");
    assert_eq!(occurrences.len(), 3);
    let inclusive_sum: u64 = occurrences
        .iter()
        .map(|s| loaded.scope_stats(s).unwrap().inclusive_time)
        .sum();
    let exclusive_sum: u64 = occurrences
        .iter()
        .map(|s| loaded.scope_stats(s).unwrap().exclusive_time)
        .sum();
    assert_eq!(stats.inclusive_time_total, inclusive_sum);
    assert_eq!(stats.exclusive_time_total, exclusive_sum);
}

#[test]
fn synthetic_round_trip_is_bitwise() {
    let frame = FrameData::builder()
        .bounds(10_000, 90_000)
        .frequency(2_500_000)
        .platform(1)
        .thread(1, "main")
        .thread(2, "render")
        .thread(3, "audio")
        .scope(1, 0, "update", "game.rs", 10, 11_000, 30_000)
        .scope(1, 1, "physics", "physics.rs", 210, 12_000, 20_000)
        .scope(1, 1, "scripts", "scripts.rs", 95, 21_000, 29_000)
        .scope(1, 2, "collide", "physics.rs", 300, 13_000, 18_000)
        .scope(2, 0, "render", "render.rs", 40, 11_500, 60_000)
        .scope(2, 1, "culling", "render.rs", 77, 12_500, 25_000)
        .scope(2, 1, "submit", "render.rs", 120, 26_000, 59_000)
        .scope(3, 0, "mix", "audio.rs", 8, 15_000, 22_000)
        .scope(3, 0, "mix", "audio.rs", 8, 40_000, 47_000)
        .scope(3, 1, "resample", "audio.rs", 31, 41_000, 45_000)
        .build();

    let mut buffer = vec![0_u8; 32 * 1024];
    let written = codec::save(&frame, &mut buffer).unwrap();

    let mut loaded = FrameData::default();
    codec::load(&mut loaded, &buffer[..written]).unwrap();

    assert_eq!(loaded.scopes.len(), 10);
    for (a, b) in frame.scopes.iter().zip(&loaded.scopes) {
        assert_eq!(a.start, b.start);
        assert_eq!(a.end, b.end);
        assert_eq!(a.thread_id, b.thread_id);
        assert_eq!(a.line, b.line);
        assert_eq!(a.level, b.level);
        assert_eq!(frame.scope_name(a), loaded.scope_name(b));
        assert_eq!(frame.scope_file(a), loaded.scope_file(b));
    }
    for (a, b) in frame.threads.iter().zip(&loaded.threads) {
        assert_eq!(a.thread_id, b.thread_id);
        assert_eq!(a.name, b.name);
    }

    loaded.clear();
    assert!(loaded.scopes.is_empty());
    assert!(loaded.aggregate.is_empty());
}

#[test]
fn registered_threads_survive_the_codec() {
    let profiler = Profiler::new();
    profiler.set_threshold(0.0, 0);
    profiler.register_thread("driver");
    profiler.register_thread_id(900, "worker");

    profiler.begin_frame();
    let scope = profiler.begin_scope(file!(), line!(), "tick");
    sleep_ms(1);
    profiler.end_scope(scope);
    profiler.begin_frame();

    let frame = frame_of(&profiler);
    let mut loaded = FrameData::default();
    codec::load(&mut loaded, &codec::save_to_vec(&frame)).unwrap();

    assert_eq!(loaded.threads.len(), 2);
    let names: Vec<_> = loaded.threads.iter().map(|t| t.name.as_ref()).collect();
    assert!(names.contains(&"driver"));
    assert!(names.contains(&"worker"));
}

#[test]
fn time_only_matches_frame_duration() {
    let profiler = Profiler::new();
    profiler.set_threshold(0.0, 0);
    profiler.begin_frame();
    sleep_ms(10);
    profiler.begin_frame();

    let frame = frame_of(&profiler);
    let bytes = codec::save_to_vec(&frame);
    let ms = codec::load_time_only(&bytes).unwrap();
    assert_eq!(ms, frame.duration_ms());
    assert!(ms >= 10.0);
}
