//! End-to-end bridge behaviour over the simulated stack
//!
//! Stack events are produced on their own threads, the way a real BLE
//! stack delivers them; the test thread plays the cooperative script task
//! and drains the dispatch queue.
//!
//! Run with:
//!   cargo test --test ble_lifecycle

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ble_script_bridge::ble::simulated::SimBleStack;
use ble_script_bridge::ble::{
    Ble, ConnectionState, ADVERTISING_START_EVENT, POWERED_ON, STATE_CHANGE_EVENT,
};
use ble_script_bridge::{
    BridgeConfig, CallbackRef, CooperativeRunner, Dispatch, EventPayload, FnCallback, ScriptValue,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Calls = Arc<Mutex<Vec<(String, ScriptValue, thread::ThreadId)>>>;

fn recorder(name: &str, calls: &Calls) -> CallbackRef {
    let name = name.to_string();
    let calls = Arc::clone(calls);
    FnCallback::new(move |arg| {
        calls
            .lock()
            .unwrap()
            .push((name.clone(), arg, thread::current().id()));
        Ok(ScriptValue::Undefined)
    })
}

fn make_ble(config: BridgeConfig) -> (Ble, CooperativeRunner, Arc<SimBleStack>) {
    let stack = SimBleStack::new();
    let (ble, runner) = Ble::new(&config, stack.clone()).unwrap();
    (ble, runner, stack)
}

/// Drain until at least `expected` callbacks ran or the deadline passes.
fn drain_until(runner: &mut CooperativeRunner, expected: usize) -> usize {
    let mut ran = 0;
    for _ in 0..200 {
        ran += runner.drain();
        if ran >= expected {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    ran
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn power_on_and_advertise_from_stack_thread() {
    let stack = SimBleStack::with_auto_ready();
    let (ble, mut runner) = Ble::new(&BridgeConfig::default(), stack.clone()).unwrap();
    let calls: Calls = Arc::default();
    ble.on(STATE_CHANGE_EVENT, recorder("state", &calls)).unwrap();
    ble.on(ADVERTISING_START_EVENT, recorder("adv", &calls))
        .unwrap();

    ble.enable().unwrap();
    assert_eq!(drain_until(&mut runner, 1), 1);

    ble.start_advertising().unwrap();
    assert_eq!(runner.drain(), 1);

    let calls = calls.lock().unwrap();
    let main = thread::current().id();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "state");
    assert_eq!(calls[0].1, ScriptValue::String(POWERED_ON.into()));
    assert_eq!(calls[1].0, "adv");
    assert_eq!(calls[1].1, ScriptValue::UInt32(0));
    assert!(calls.iter().all(|(_, _, t)| *t == main));
}

#[test]
fn sequential_notifies_run_in_submission_order() {
    let (ble, mut runner, _stack) = make_ble(BridgeConfig::default());
    let calls: Calls = Arc::default();
    for name in ["first", "second", "third"] {
        ble.on(name, recorder(name, &calls)).unwrap();
    }

    let bridge = ble.bridge().clone();
    thread::spawn(move || {
        for (i, name) in ["first", "second", "third"].iter().enumerate() {
            bridge
                .notify(name, EventPayload::ResultCode(i as i32))
                .unwrap();
        }
    })
    .join()
    .unwrap();

    assert_eq!(runner.drain(), 3);
    let order: Vec<_> = calls
        .lock()
        .unwrap()
        .iter()
        .map(|(name, value, _)| (name.clone(), value.clone()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("first".to_string(), ScriptValue::UInt32(0)),
            ("second".to_string(), ScriptValue::UInt32(1)),
            ("third".to_string(), ScriptValue::UInt32(2)),
        ]
    );
}

#[test]
fn each_notify_runs_exactly_once() {
    let (ble, mut runner, _stack) = make_ble(BridgeConfig::default());
    let calls: Calls = Arc::default();
    ble.on("advertisingStart", recorder("adv", &calls)).unwrap();

    for code in 0..5 {
        ble.bridge()
            .notify("advertisingStart", EventPayload::ResultCode(code))
            .unwrap();
    }
    assert_eq!(runner.drain(), 5);
    assert_eq!(runner.drain(), 0);
    assert_eq!(calls.lock().unwrap().len(), 5);
}

#[test]
fn prefix_lookup_boundary_and_duplicates() {
    let (ble, mut runner, _stack) = make_ble(BridgeConfig::default());
    let calls: Calls = Arc::default();
    ble.on("stateChange", recorder("older", &calls)).unwrap();
    ble.on("stateChange", recorder("newer", &calls)).unwrap();

    let bridge = ble.bridge();
    assert_eq!(
        bridge
            .notify("stateChange", EventPayload::ResultCode(1))
            .unwrap(),
        Dispatch::Queued
    );
    // shorter search strings match by prefix
    assert_eq!(
        bridge.notify("state", EventPayload::ResultCode(2)).unwrap(),
        Dispatch::Queued
    );
    assert_eq!(
        bridge
            .notify("stateChanged", EventPayload::ResultCode(3))
            .unwrap(),
        Dispatch::NoSubscriber
    );
    assert_eq!(
        bridge
            .notify("connect", EventPayload::ResultCode(4))
            .unwrap(),
        Dispatch::NoSubscriber
    );

    assert_eq!(runner.drain(), 2);
    let calls = calls.lock().unwrap();
    assert!(calls.iter().all(|(name, _, _)| name == "newer"));
}

#[test]
fn connect_disconnect_cycle_over_simulated_link() {
    let (ble, _runner, stack) = make_ble(BridgeConfig::default());
    ble.enable().unwrap();
    stack.complete_power_on(0);

    assert_eq!(ble.connections().state(), ConnectionState::Idle);

    for _ in 0..3 {
        ble.start_advertising().unwrap();
        let peer_stack = stack.clone();
        let conn = thread::spawn(move || peer_stack.connect_peer().unwrap())
            .join()
            .unwrap();
        assert_eq!(ble.connections().state(), ConnectionState::Connected);
        assert_eq!(Arc::strong_count(&conn), 2);

        stack.disconnect_peer(&conn, 0x13).unwrap();
        assert_eq!(ble.connections().state(), ConnectionState::Idle);
        assert_eq!(Arc::strong_count(&conn), 1);
    }

    // failed attempts never produce a handle
    stack.fail_connect(0x3e);
    assert_eq!(ble.connections().state(), ConnectionState::Idle);
}

#[test]
fn small_queue_reports_allocation_failure() {
    let config = BridgeConfig {
        queue_capacity: 2,
        ..BridgeConfig::default()
    };
    let (ble, mut runner, _stack) = make_ble(config);
    let calls: Calls = Arc::default();
    ble.on("tick", recorder("tick", &calls)).unwrap();

    let bridge = ble.bridge();
    bridge.notify("tick", EventPayload::ResultCode(0)).unwrap();
    bridge.notify("tick", EventPayload::ResultCode(1)).unwrap();
    assert!(bridge.notify("tick", EventPayload::ResultCode(2)).is_err());

    assert_eq!(runner.drain(), 2);
    bridge.notify("tick", EventPayload::ResultCode(3)).unwrap();
    assert_eq!(runner.drain(), 1);
}

#[tokio::test]
async fn runner_loop_delivers_until_shutdown() {
    let (ble, runner, stack) = make_ble(BridgeConfig::default());
    let calls: Calls = Arc::default();
    ble.on(STATE_CHANGE_EVENT, recorder("state", &calls)).unwrap();
    ble.enable().unwrap();

    let task = tokio::spawn(runner.run());
    stack.complete_power_on(0);

    // Dropping the BLE object and the stack (which holds the ready
    // callback's bridge clone only until it fires) closes the queue.
    drop(ble);
    drop(stack);
    task.await.unwrap();

    assert_eq!(calls.lock().unwrap().len(), 1);
}
