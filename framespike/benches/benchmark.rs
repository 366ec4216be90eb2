use criterion::{criterion_group, criterion_main, Criterion};
use framespike::Profiler;

pub fn criterion_benchmark(c: &mut Criterion) {
    let profiler = Profiler::new();
    profiler.begin_frame();

    c.bench_function("scope_open_close", |b| {
        // Drain the open set periodically so the allocator never saturates
        // mid-measurement.
        let mut since_frame = 0_u32;
        b.iter(|| {
            if since_frame == 8192 {
                profiler.begin_frame();
                since_frame = 0;
            }
            since_frame += 1;
            let _scope = profiler.scope(file!(), line!(), "bench scope");
        });
    });

    c.bench_function("scope_open_close_exhausted", |b| {
        // Saturate the allocator; this measures the dropped-scope path.
        let filler: Vec<_> = std::iter::from_fn(|| {
            let handle = profiler.begin_scope(file!(), line!(), "filler");
            handle.is_valid().then_some(handle)
        })
        .collect();
        b.iter(|| {
            let _scope = profiler.scope(file!(), line!(), "bench scope");
        });
        for handle in filler.into_iter().rev() {
            profiler.end_scope(handle);
        }
        profiler.begin_frame();
    });

    c.bench_function("begin_frame_empty", |b| {
        b.iter(|| profiler.begin_frame());
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
