#![allow(dead_code)]

//! Simulated IMU endpoint for hardware-free integration tests
//!
//! Speaks the gateway's wire protocol over a real TCP socket:
//! - on accept, immediately reports the current acquisition state;
//! - `SET_IMU_STATE` updates the state and re-broadcasts `IMU_STATE`;
//! - while ON, streams `IMU_DATA` at ~50 Hz with deterministic values.
//!
//! The device starts OFF so tests exercise the client's reactive re-arm.

use setu_io::imu::protocol::{self, MSG_SET_IMU_STATE};
use setu_io::model::ImuSample;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Interval between streamed samples while the device is ON (~50 Hz)
const SAMPLE_INTERVAL: Duration = Duration::from_millis(20);

pub struct SimulatedImu {
    port: u16,
    shutdown: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
    samples_sent: Arc<AtomicU64>,
}

impl SimulatedImu {
    /// Bind an ephemeral port and start accepting sessions
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind simulated IMU");
        listener.set_nonblocking(true).expect("nonblocking listener");
        let port = listener.local_addr().expect("local addr").port();

        let shutdown = Arc::new(AtomicBool::new(false));
        let samples_sent = Arc::new(AtomicU64::new(0));

        let accept_thread = {
            let shutdown = Arc::clone(&shutdown);
            let samples_sent = Arc::clone(&samples_sent);
            thread::Builder::new()
                .name("sim-imu-accept".to_string())
                .spawn(move || {
                    let mut sessions: Vec<JoinHandle<()>> = Vec::new();
                    while !shutdown.load(Ordering::Relaxed) {
                        match listener.accept() {
                            Ok((stream, _addr)) => {
                                let shutdown = Arc::clone(&shutdown);
                                let samples_sent = Arc::clone(&samples_sent);
                                let handle = thread::Builder::new()
                                    .name("sim-imu-session".to_string())
                                    .spawn(move || {
                                        session_loop(stream, shutdown, samples_sent);
                                    })
                                    .expect("spawn session thread");
                                sessions.push(handle);
                            }
                            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                                thread::sleep(Duration::from_millis(10));
                            }
                            Err(_) => break,
                        }
                    }
                    for handle in sessions {
                        let _ = handle.join();
                    }
                })
                .expect("spawn accept thread")
        };

        Self {
            port,
            shutdown,
            accept_thread: Some(accept_thread),
            samples_sent,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn samples_sent(&self) -> u64 {
        self.samples_sent.load(Ordering::Relaxed)
    }

    /// JSON start payload pointing at this endpoint
    pub fn start_payload(&self) -> String {
        format!(r#"{{"address":"127.0.0.1","port":{}}}"#, self.port)
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SimulatedImu {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One client session: report state, honor SET_IMU_STATE, stream while ON
fn session_loop(mut stream: TcpStream, shutdown: Arc<AtomicBool>, samples_sent: Arc<AtomicU64>) {
    // Short read timeout so the loop can interleave reads with streaming
    let _ = stream.set_read_timeout(Some(Duration::from_millis(5)));
    let _ = stream.set_nodelay(true);

    // Device starts OFF; tell the client right away
    let mut is_on = false;
    if stream.write_all(&protocol::imu_state_frame(is_on)).is_err() {
        return;
    }

    let mut last_sample = Instant::now();
    let mut sample_index: u64 = 0;

    while !shutdown.load(Ordering::Relaxed) {
        // Inbound: a SET_IMU_STATE request, when one is waiting
        let mut header = [0u8; protocol::HEADER_LEN];
        match stream.read_exact(&mut header) {
            Ok(()) => {
                let payload_len =
                    u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;
                let mut payload = vec![0u8; payload_len];
                if payload_len > 0 && stream.read_exact(&mut payload).is_err() {
                    return;
                }
                if header[0] == MSG_SET_IMU_STATE && payload_len == 1 {
                    is_on = payload[0] == 1;
                    if stream.write_all(&protocol::imu_state_frame(is_on)).is_err() {
                        return;
                    }
                }
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(_) => return,
        }

        // Outbound: stream measurements while ON
        if is_on && last_sample.elapsed() >= SAMPLE_INTERVAL {
            last_sample = Instant::now();
            sample_index += 1;
            let sample = ImuSample {
                timestamp_ns: sample_index * SAMPLE_INTERVAL.as_nanos() as u64,
                gyro: [0.01, -0.02, 0.03],
                accel: [0.0, 0.0, 9.81],
            };
            if stream.write_all(&protocol::imu_data_frame(&sample)).is_err() {
                return;
            }
            samples_sent.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Poll `predicate` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    predicate()
}
