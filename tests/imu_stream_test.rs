//! End-to-end IMU flow against the simulated endpoint

mod common;

use common::{SimulatedImu, wait_until};
use parking_lot::Mutex;
use setu_io::controller::ProgrammaticController;
use setu_io::model::ImuControlStatus;
use setu_io::orchestrator::Orchestrator;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Observable milestones in arrival order
#[derive(Debug, Clone, PartialEq)]
enum Event {
    StartResult(bool),
    Connected,
    Disconnected,
    State(bool),
    Sample,
}

fn record_events(orch: &Orchestrator) -> Arc<Mutex<Vec<Event>>> {
    let events: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));
    let hub = orch.hub();

    let e = Arc::clone(&events);
    hub.subscribe_results(move |r| {
        e.lock().push(Event::StartResult(r.success));
    });
    let e = Arc::clone(&events);
    hub.subscribe_imu_connected(move |_| e.lock().push(Event::Connected));
    let e = Arc::clone(&events);
    hub.subscribe_imu_disconnected(move |_| e.lock().push(Event::Disconnected));
    let e = Arc::clone(&events);
    hub.subscribe_imu_state(move |s| e.lock().push(Event::State(s.is_on)));
    let e = Arc::clone(&events);
    hub.subscribe_imu_samples(move |_| e.lock().push(Event::Sample));

    events
}

#[test]
fn start_connects_rearms_and_streams() {
    let sim = SimulatedImu::start();

    let orch = Orchestrator::new();
    let ctl = Arc::new(ProgrammaticController::new("c1"));
    orch.register_controller(ctl.clone());
    let events = record_events(&orch);
    assert!(orch.start());

    let result = ctl.start_imu(&sim.start_payload()).unwrap();
    assert_eq!(result.status, ImuControlStatus::Success);
    assert!(result.is_connected);

    // Within the scenario budget: start result, connection, device ON, and
    // at least one streamed sample
    assert!(wait_until(Duration::from_secs(3), || {
        let events = events.lock();
        events.contains(&Event::State(true)) && events.contains(&Event::Sample)
    }));

    let snapshot = events.lock().clone();
    assert!(snapshot.contains(&Event::StartResult(true)));
    assert!(snapshot.contains(&Event::Connected));

    // The device started OFF, so the client's re-arm produced an OFF
    // report before the ON one
    let first_on = snapshot.iter().position(|e| e == &Event::State(true)).unwrap();
    let first_off = snapshot.iter().position(|e| e == &Event::State(false)).unwrap();
    assert!(first_off < first_on);

    // No sample may precede the first ON state
    let first_sample = snapshot.iter().position(|e| e == &Event::Sample).unwrap();
    assert!(first_on < first_sample);

    // Stop releases the session and reports the disconnect
    let result = ctl.stop_imu().unwrap();
    assert_eq!(result.status, ImuControlStatus::Success);
    assert!(!result.is_connected);
    assert!(wait_until(Duration::from_secs(2), || {
        events.lock().contains(&Event::Disconnected)
    }));
    assert!(!orch.imu().is_connected());

    orch.stop();
}

#[test]
fn disconnect_is_idempotent_after_session_end() {
    let sim = SimulatedImu::start();

    let orch = Orchestrator::new();
    let ctl = Arc::new(ProgrammaticController::new("c1"));
    orch.register_controller(ctl.clone());

    let disconnects = Arc::new(AtomicU64::new(0));
    let d = Arc::clone(&disconnects);
    orch.hub().subscribe_imu_disconnected(move |_| {
        d.fetch_add(1, Ordering::SeqCst);
    });

    assert!(orch.start());
    ctl.start_imu(&sim.start_payload()).unwrap();
    ctl.stop_imu().unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        disconnects.load(Ordering::SeqCst) == 1
    }));

    // Repeated disconnects from the idle state publish nothing further
    let imu = orch.imu();
    for _ in 0..5 {
        imu.disconnect();
    }
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);

    orch.stop();
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
}

#[test]
fn endpoint_going_away_publishes_single_disconnect() {
    let mut sim = SimulatedImu::start();

    let orch = Orchestrator::new();
    let ctl = Arc::new(ProgrammaticController::new("c1"));
    orch.register_controller(ctl.clone());

    let disconnects = Arc::new(AtomicU64::new(0));
    let d = Arc::clone(&disconnects);
    orch.hub().subscribe_imu_disconnected(move |_| {
        d.fetch_add(1, Ordering::SeqCst);
    });

    assert!(orch.start());
    ctl.start_imu(&sim.start_payload()).unwrap();
    assert!(orch.imu().is_connected());

    // Kill the endpoint; the receive loop must observe EOF and close the
    // session on its own
    sim.stop();
    assert!(wait_until(Duration::from_secs(3), || {
        !orch.imu().is_connected()
    }));
    assert!(wait_until(Duration::from_secs(2), || {
        disconnects.load(Ordering::SeqCst) == 1
    }));

    // A later stop command stays a clean no-op on the session
    let result = ctl.stop_imu().unwrap();
    assert_eq!(result.status, ImuControlStatus::Success);
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);

    orch.stop();
}

#[test]
fn reconnect_replaces_previous_session() {
    let sim_a = SimulatedImu::start();
    let sim_b = SimulatedImu::start();

    let orch = Orchestrator::new();
    let ctl = Arc::new(ProgrammaticController::new("c1"));
    orch.register_controller(ctl.clone());
    assert!(orch.start());

    ctl.start_imu(&sim_a.start_payload()).unwrap();
    ctl.stop_imu().unwrap();

    // The session is free again; connecting to a second endpoint works and
    // leaves exactly one live session
    let result = ctl.start_imu(&sim_b.start_payload()).unwrap();
    assert_eq!(result.status, ImuControlStatus::Success);
    assert!(orch.imu().is_connected());

    orch.stop();
    assert!(!orch.imu().is_connected());
}
