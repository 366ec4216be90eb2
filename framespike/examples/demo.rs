//! Drives the profiler through a simulated game loop and writes every frame
//! that crosses the threshold to a capture file.

use std::time::Duration;

use framespike::{CaptureFile, CaptureFileWriter, FrameData, Profiler};

fn sleep_ms(ms: u64) {
    std::thread::sleep(Duration::from_millis(ms));
}

fn simulate(frame_counter: u32) {
    {
        framespike::profile_scope!("input");
        sleep_ms(1);
    }
    {
        framespike::profile_scope!("update");
        sleep_ms(3);
        {
            framespike::profile_scope!("physics");
            sleep_ms(2);
        }
        // Give us something to capture:
        if frame_counter % 7 == 0 {
            framespike::profile_scope!("spike");
            sleep_ms(12);
        }
    }
    {
        framespike::profile_scope!("render");
        sleep_ms(4);
    }
}

#[expect(clippy::unwrap_used)]
#[expect(clippy::print_stderr)]
fn main() {
    let profiler = Profiler::global();
    profiler.register_thread("main");
    profiler.set_threshold(15.0, 0);

    let path = std::env::temp_dir().join("framespike_demo.fspike");
    let mut writer = CaptureFileWriter::create(&path).unwrap();
    let mut captured = 0_u32;

    for frame_counter in 0..30 {
        profiler.begin_frame();
        simulate(frame_counter);

        if profiler.was_threshold_crossed() {
            let mut frame = FrameData::default();
            profiler.get_frame(&mut frame);
            writer.append(&frame).unwrap();
            captured += 1;
            eprintln!(
                "frame {frame_counter}: {:.2} ms, {} scopes captured",
                frame.duration_ms(),
                frame.scopes.len()
            );
        }
    }
    writer.finish().unwrap();

    let capture = CaptureFile::open(&path).unwrap();
    eprintln!(
        "wrote {} frame(s) to {} ({} in navigator index)",
        captured,
        path.display(),
        capture.frames().len()
    );
}
