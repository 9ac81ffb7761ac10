use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use spider_config::PoseEntry;
use spider_core::engine::EngineCfg;
use spider_core::mocks::MockTransport;
use spider_core::{AnimationEngine, PlayOutcome, PoseTable, ServoLink, Step};
use spider_traits::clock::TestClock;
use spider_traits::Clock;

const CMD_SET_MULTIPLE: u8 = 0x1F;
const CMD_SET_SPEED: u8 = 0x07;
const CMD_SET_ACCEL: u8 = 0x09;

fn entry(name: &str, value: i32) -> PoseEntry {
    PoseEntry {
        name: name.to_string(),
        legs: [[value; 4]; 6],
    }
}

fn table() -> Arc<PoseTable> {
    let entries = vec![
        entry("park", 1500),
        entry("extend", 2000),
        entry("extend_half", 1750),
    ];
    let mut routes = BTreeMap::new();
    routes.insert("extend".to_string(), vec!["extend_half".to_string()]);
    Arc::new(PoseTable::new(entries, &routes).unwrap())
}

fn cfg() -> EngineCfg {
    EngineCfg {
        poll_ms: 10,
        motion_timeout_ms: 5000,
        default_duration_ms: 1500,
        settle_ms: 3000,
    }
}

fn engine(transport: MockTransport) -> AnimationEngine<MockTransport, TestClock> {
    AnimationEngine::new(
        ServoLink::new(transport),
        table(),
        TestClock::new(),
        cfg(),
        "park",
    )
    .unwrap()
}

#[test]
fn animate_routes_via_fallback_and_issues_two_batches() {
    let transport = MockTransport::new();
    let mut engine = engine(transport.clone());
    // First motion poll reports busy, second reports idle.
    transport.push_read(&[1, 0]);

    let stop = AtomicBool::new(false);
    let outcome = engine.animate("extend", [1500; 6], &stop).unwrap();
    assert_eq!(outcome, PlayOutcome::Completed);
    assert_eq!(engine.current_pose(), "extend");

    // Two legs (park waypoint, then extend), each split across the two
    // devices on the wire.
    let batches = transport.frames_with_command(CMD_SET_MULTIPLE);
    assert_eq!(batches.len(), 4);

    // Speed and accel precede the position batch for every joint.
    let writes = transport.writes();
    let first_batch = writes
        .iter()
        .position(|f| f[2] == CMD_SET_MULTIPLE)
        .unwrap();
    let speed_count = writes[..first_batch]
        .iter()
        .filter(|f| f[2] == CMD_SET_SPEED)
        .count();
    let accel_count = writes[..first_batch]
        .iter()
        .filter(|f| f[2] == CMD_SET_ACCEL)
        .count();
    assert_eq!(speed_count, 24);
    assert_eq!(accel_count, 24);
}

#[test]
fn animate_to_unknown_pose_changes_nothing() {
    let transport = MockTransport::new();
    let mut engine = engine(transport.clone());
    let stop = AtomicBool::new(false);
    assert!(engine.animate("handstand", [1500; 6], &stop).is_err());
    assert_eq!(engine.current_pose(), "park");
    assert!(transport.writes().is_empty());
}

#[test]
fn zero_leg_duration_falls_back_to_default() {
    let transport = MockTransport::new();
    let mut engine = engine(transport.clone());
    let stop = AtomicBool::new(false);
    let outcome = engine.animate("extend", [0; 6], &stop).unwrap();
    assert_eq!(outcome, PlayOutcome::Completed);
}

#[test]
fn play_skips_script_matching_current_pose() {
    let transport = MockTransport::new();
    let mut engine = engine(transport.clone());
    let script = spider_core::AnimationScript {
        name: "park".to_string(),
        steps: vec![Step::pose("park", 1000)],
    };
    let stop = AtomicBool::new(false);
    assert_eq!(engine.play(&script, &stop).unwrap(), PlayOutcome::Skipped);
    assert!(transport.writes().is_empty());
}

#[test]
fn play_cancels_between_steps() {
    let transport = MockTransport::new();
    let mut engine = engine(transport.clone());
    let script = spider_core::AnimationScript {
        name: "breathe".to_string(),
        steps: vec![Step::pose("extend", 1000), Step::pose("park", 1000)],
    };
    let stop = AtomicBool::new(true);
    assert_eq!(engine.play(&script, &stop).unwrap(), PlayOutcome::Cancelled);
    assert!(transport.writes().is_empty());
}

#[test]
fn pause_steps_only_advance_the_clock() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    let mut engine = AnimationEngine::new(
        ServoLink::new(transport.clone()),
        table(),
        clock.clone(),
        cfg(),
        "park",
    )
    .unwrap();

    let script = spider_core::AnimationScript {
        name: "waiting".to_string(),
        steps: vec![Step::pause(450)],
    };
    let stop = AtomicBool::new(false);
    let before = clock.now();
    assert_eq!(engine.play(&script, &stop).unwrap(), PlayOutcome::Completed);
    // Pause plus grace plus the settle window, no hardware writes.
    let elapsed = clock.now().duration_since(before).as_millis();
    assert_eq!(elapsed, 450 + 100 + 3000);
    assert!(transport.writes().is_empty());
}

#[test]
fn rejected_batch_leaves_current_pose_unchanged() {
    let transport = MockTransport::new();
    let entries = vec![entry("park", 1500), entry("bad", 9000)];
    let table = Arc::new(PoseTable::new(entries, &BTreeMap::new()).unwrap());
    let mut engine = AnimationEngine::new(
        ServoLink::new(transport.clone()),
        table,
        TestClock::new(),
        cfg(),
        "park",
    )
    .unwrap();

    let stop = AtomicBool::new(false);
    assert!(engine.animate("bad", [1500; 6], &stop).is_err());
    assert_eq!(engine.current_pose(), "park");

    // The rejected leg wrote nothing, not even speed/accel: the last frame
    // on the wire is the waypoint leg's position batch.
    let writes = transport.writes();
    assert_eq!(writes.last().unwrap()[2], CMD_SET_MULTIPLE);
}

#[test]
fn reentrant_animate_is_a_noop() {
    // The busy flag is observable only across threads; exercise the flag
    // directly through play's contract instead: a second call after a
    // completed one is not busy.
    let transport = MockTransport::new();
    let mut engine = engine(transport.clone());
    let stop = AtomicBool::new(false);
    assert_eq!(
        engine.animate("extend", [1500; 6], &stop).unwrap(),
        PlayOutcome::Completed
    );
    assert_eq!(
        engine.animate("park", [1500; 6], &stop).unwrap(),
        PlayOutcome::Completed
    );
}
