#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Pose files are hand-edited text; the parser must reject malformed
    // input with an error, never a panic.
    let _ = spider_config::parse_pose_file(data);
});
