// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::*;
use std::sync::atomic::AtomicUsize;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

const MS: i64 = 1_000_000;

fn counting_handler(
    clock: &Clock,
    threshold: JumpThreshold,
) -> (JumpHandle, Arc<AtomicUsize>, Arc<StdMutex<Vec<TimeJump>>>) {
    let pre_count = Arc::new(AtomicUsize::new(0));
    let jumps = Arc::new(StdMutex::new(Vec::new()));
    let pre = Arc::clone(&pre_count);
    let post = Arc::clone(&jumps);
    let handle = clock
        .create_jump_callback(
            Some(Box::new(move || {
                pre.fetch_add(1, Ordering::SeqCst);
            })),
            Some(Box::new(move |jump: &TimeJump| {
                post.lock().expect("jumps lock").push(*jump);
            })),
            threshold,
        )
        .expect("register jump callback");
    (handle, pre_count, jumps)
}

#[test]
fn steady_clock_is_monotonic() {
    let clock = Clock::new(ClockKind::Steady);
    let first = clock.now().expect("now");
    let second = clock.now().expect("now");
    assert!(second.nanoseconds() >= first.nanoseconds());
    assert_eq!(first.kind(), ClockKind::Steady);
}

#[test]
fn system_clock_reports_epoch_time() {
    let clock = Clock::new(ClockKind::System);
    let now = clock.now().expect("now");
    // Anything after 2020-01-01.
    assert!(now.nanoseconds() > 1_577_836_800 * 1_000_000_000);
    assert_eq!(now.kind(), ClockKind::System);
}

#[test]
fn override_query_on_non_ros_clock_is_false() {
    let clock = Clock::new(ClockKind::Steady);
    assert!(!clock.is_override_active());
    assert!(matches!(
        clock.enable_override(),
        Err(Error::ClockKindMismatch {
            expected: ClockKind::Ros,
            actual: ClockKind::Steady
        })
    ));
}

#[test]
fn ros_clock_reports_override_value() {
    let clock = Clock::new(ClockKind::Ros);
    clock.set_override_time(42 * MS).expect("set while disabled");
    assert!(!clock.is_override_active());
    assert_ne!(clock.now().expect("now").nanoseconds(), 42 * MS);

    clock.enable_override().expect("enable");
    assert!(clock.is_override_active());
    assert_eq!(clock.now().expect("now").nanoseconds(), 42 * MS);

    clock.set_override_time(50 * MS).expect("set");
    assert_eq!(clock.now().expect("now").nanoseconds(), 50 * MS);

    clock.disable_override().expect("disable");
    assert!(!clock.is_override_active());
}

#[test]
fn forward_threshold_gates_notifications() {
    let clock = Clock::new(ClockKind::Ros);
    clock.enable_override().expect("enable");
    clock.set_override_time(1_000 * MS).expect("set");

    let threshold = JumpThreshold::deltas(Duration::from_millis(100), Duration::ZERO);
    let (_handle, pre_count, jumps) = counting_handler(&clock, threshold);

    clock.set_override_time(1_050 * MS).expect("50ms jump");
    assert_eq!(pre_count.load(Ordering::SeqCst), 0);
    assert!(jumps.lock().expect("jumps").is_empty());

    clock.set_override_time(1_200 * MS).expect("150ms jump");
    assert_eq!(pre_count.load(Ordering::SeqCst), 1);
    let recorded = jumps.lock().expect("jumps").clone();
    assert_eq!(
        recorded,
        vec![TimeJump {
            clock_change: ClockChange::RosTimeNoChange,
            delta: 150 * MS,
        }]
    );
}

#[test]
fn any_change_threshold_sees_every_jump() {
    let clock = Clock::new(ClockKind::Ros);
    let (_handle, pre_count, jumps) = counting_handler(&clock, JumpThreshold::any_change());

    clock.set_override_time(10 * MS).expect("set while disabled");
    assert_eq!(pre_count.load(Ordering::SeqCst), 0, "disabled override is silent");

    clock.enable_override().expect("enable");
    clock.set_override_time(11 * MS).expect("forward");
    clock.set_override_time(5 * MS).expect("backward");
    clock.set_override_time(5 * MS).expect("no-op");
    clock.disable_override().expect("disable");

    let recorded = jumps.lock().expect("jumps").clone();
    let changes: Vec<ClockChange> = recorded.iter().map(|jump| jump.clock_change).collect();
    assert_eq!(
        changes,
        vec![
            ClockChange::RosTimeActivated,
            ClockChange::RosTimeNoChange,
            ClockChange::RosTimeNoChange,
            ClockChange::RosTimeDeactivated,
        ]
    );
    assert_eq!(recorded[1].delta, MS);
    assert_eq!(recorded[2].delta, -6 * MS);
    assert!(recorded[0].clock_change.is_kind_change());
    assert_eq!(pre_count.load(Ordering::SeqCst), 4);
}

#[test]
fn pre_callback_runs_before_value_changes() {
    let clock = Clock::new(ClockKind::Ros);
    clock.enable_override().expect("enable");
    clock.set_override_time(100).expect("set");

    let observed = Arc::new(StdMutex::new(Vec::new()));
    let pre_clock = clock.clone();
    let post_clock = clock.clone();
    let pre_seen = Arc::clone(&observed);
    let post_seen = Arc::clone(&observed);
    let _handle = clock
        .create_jump_callback(
            Some(Box::new(move || {
                let now = pre_clock.now().expect("now").nanoseconds();
                pre_seen.lock().expect("lock").push(now);
            })),
            Some(Box::new(move |_jump: &TimeJump| {
                let now = post_clock.now().expect("now").nanoseconds();
                post_seen.lock().expect("lock").push(now);
            })),
            JumpThreshold::any_change(),
        )
        .expect("register");

    clock.set_override_time(300).expect("jump");
    assert_eq!(*observed.lock().expect("lock"), vec![100, 300]);
}

#[test]
fn dropping_handle_deregisters_once() {
    let clock = Clock::new(ClockKind::Ros);
    clock.enable_override().expect("enable");
    let (handle, pre_count, _jumps) = counting_handler(&clock, JumpThreshold::any_change());
    assert_eq!(clock.jump_handler_count(), 1);

    drop(handle);
    assert_eq!(clock.jump_handler_count(), 0);

    clock.set_override_time(1).expect("jump");
    assert_eq!(pre_count.load(Ordering::SeqCst), 0);
}

#[test]
fn handle_outliving_clock_drops_quietly() {
    let clock = Clock::new(ClockKind::Ros);
    let (handle, _pre, _jumps) = counting_handler(&clock, JumpThreshold::any_change());
    drop(clock);
    drop(handle);
}

#[test]
fn invalid_threshold_leaves_no_handler() {
    let clock = Clock::new(ClockKind::Ros);
    let threshold = JumpThreshold {
        on_clock_change: false,
        min_forward: -1,
        min_backward: 0,
    };
    let result = clock.create_jump_callback(None, None, threshold);
    assert!(matches!(result, Err(Error::Registration(_))));
    assert_eq!(clock.jump_handler_count(), 0);
}

#[test]
fn callback_may_drop_its_own_handle() {
    let clock = Clock::new(ClockKind::Ros);
    clock.enable_override().expect("enable");

    let slot: Arc<StdMutex<Option<JumpHandle>>> = Arc::new(StdMutex::new(None));
    let inner_slot = Arc::clone(&slot);
    let handle = clock
        .create_jump_callback(
            None,
            Some(Box::new(move |_jump: &TimeJump| {
                inner_slot.lock().expect("slot").take();
            })),
            JumpThreshold::any_change(),
        )
        .expect("register");
    *slot.lock().expect("slot") = Some(handle);

    clock.set_override_time(7).expect("jump");
    assert_eq!(clock.jump_handler_count(), 0);
}
