//! IMU TCP client - session management and receive loop
//!
//! Owns at most one TCP connection to an IMU endpoint and translates the
//! framed binary protocol into hub events. When the device reports OFF, the
//! receive loop immediately requests ON again (reactive re-arm), so a
//! connected session converges to a streaming device without caller
//! involvement.
//!
//! # Session lifecycle
//!
//! ```text
//! Idle --connect--> Connected(state unknown)
//!      <--disconnect / EOF / protocol violation / I/O error--
//! ```
//!
//! `connect` tears down any previous session before opening the new socket,
//! so it is safe to call while an old session is still winding down.
//! `ImuDisconnected` is published exactly once per session, by whichever of
//! `disconnect` or the reader thread observes the teardown first.

use parking_lot::Mutex;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};
use crate::hub::NotificationHub;
use crate::imu::protocol::{self, MSG_IMU_DATA, MSG_IMU_STATE};
use crate::model::{ConnectionEvent, StateEvent};

/// One live TCP session
struct Session {
    /// Original stream handle, kept to unblock the reader on teardown
    stream: TcpStream,
    reader: Option<JoinHandle<()>>,
    /// Tells the reader a teardown is deliberate
    stop: Arc<AtomicBool>,
    /// First to swap this publishes the disconnect event
    closed: Arc<AtomicBool>,
    remote: String,
}

/// TCP client for a single IMU endpoint
pub struct ImuClient {
    hub: Arc<NotificationHub>,
    connected: Arc<AtomicBool>,
    session: Mutex<Option<Session>>,
    frames_received: Arc<AtomicU64>,
    samples_received: Arc<AtomicU64>,
}

impl ImuClient {
    pub fn new(hub: Arc<NotificationHub>) -> Self {
        Self {
            hub,
            connected: Arc::new(AtomicBool::new(false)),
            session: Mutex::new(None),
            frames_received: Arc::new(AtomicU64::new(0)),
            samples_received: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether a session is currently established
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Frame and sample counters since process start
    pub fn get_stats(&self) -> (u64, u64) {
        (
            self.frames_received.load(Ordering::Relaxed),
            self.samples_received.load(Ordering::Relaxed),
        )
    }

    /// Connect to an IMU endpoint and start the receive loop
    ///
    /// Any previous session is torn down first. On success an
    /// `ImuConnected` event is published before this returns; on failure
    /// the client stays disconnected and no event is published.
    pub fn connect(&self, address: &str, port: u16) -> Result<()> {
        let mut session = self.session.lock();
        self.teardown_locked(&mut session);

        log::info!("ImuClient: connecting to {}:{}", address, port);
        let stream = match TcpStream::connect((address, port)) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("ImuClient: connect to {}:{} failed: {}", address, port, e);
                return Err(Error::Io(e));
            }
        };

        let remote = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| format!("{}:{}", address, port));

        let read_stream = stream.try_clone()?;
        let write_stream = Arc::new(Mutex::new(stream.try_clone()?));

        let stop = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));

        // Publish before the reader starts so a session that dies instantly
        // still reports connected before disconnected.
        self.connected.store(true, Ordering::SeqCst);
        self.hub.notify_imu_connected(&ConnectionEvent {
            connected: true,
            remote_endpoint: Some(remote.clone()),
        });
        log::info!("ImuClient: connected to {}", remote);

        let reader = {
            let reader_stop = Arc::clone(&stop);
            let reader_closed = Arc::clone(&closed);
            let connected = Arc::clone(&self.connected);
            let hub = Arc::clone(&self.hub);
            let frames = Arc::clone(&self.frames_received);
            let samples = Arc::clone(&self.samples_received);
            let reader_remote = remote.clone();
            thread::Builder::new()
                .name("imu-reader".to_string())
                .spawn(move || {
                    receive_loop(
                        read_stream,
                        write_stream,
                        &reader_stop,
                        &frames,
                        &samples,
                        &hub,
                    );
                    finish_session(&connected, &hub, &reader_closed, &reader_remote);
                })
        };

        let reader = match reader {
            Ok(handle) => handle,
            Err(e) => {
                finish_session(&self.connected, &self.hub, &closed, &remote);
                return Err(Error::Other(format!("Failed to spawn imu-reader: {}", e)));
            }
        };

        *session = Some(Session {
            stream,
            reader: Some(reader),
            stop,
            closed,
            remote,
        });
        Ok(())
    }

    /// Close the current session, if any
    ///
    /// Idempotent: calling from the idle state is a no-op and publishes
    /// nothing.
    pub fn disconnect(&self) {
        let mut session = self.session.lock();
        self.teardown_locked(&mut session);
    }

    /// Tear down the session held in `slot`, waiting for the reader to exit
    fn teardown_locked(&self, slot: &mut Option<Session>) {
        let Some(mut s) = slot.take() else {
            return;
        };

        s.stop.store(true, Ordering::SeqCst);
        // Unblocks a reader parked in read_exact
        let _ = s.stream.shutdown(Shutdown::Both);

        if let Some(handle) = s.reader.take() {
            if handle.join().is_err() {
                log::error!("ImuClient: reader thread panicked");
            }
        }

        finish_session(&self.connected, &self.hub, &s.closed, &s.remote);
    }
}

impl Drop for ImuClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Mark the session closed, publishing the disconnect event exactly once
fn finish_session(
    connected: &AtomicBool,
    hub: &NotificationHub,
    closed: &AtomicBool,
    remote: &str,
) {
    if !closed.swap(true, Ordering::SeqCst) {
        connected.store(false, Ordering::SeqCst);
        hub.notify_imu_disconnected(&ConnectionEvent {
            connected: false,
            remote_endpoint: Some(remote.to_string()),
        });
        log::info!("ImuClient: disconnected from {}", remote);
    }
}

/// Receive loop - runs on the `imu-reader` thread until teardown or error
///
/// Frames with unknown message ids are consumed and skipped. An IMU_DATA
/// frame with the wrong payload size is a protocol violation and ends the
/// session, matching the oversized-length check in the header reader.
fn receive_loop(
    mut read: TcpStream,
    write: Arc<Mutex<TcpStream>>,
    stop: &AtomicBool,
    frames: &AtomicU64,
    samples: &AtomicU64,
    hub: &NotificationHub,
) {
    let mut payload = Vec::with_capacity(protocol::IMU_DATA_PAYLOAD_LEN);

    loop {
        let header = match protocol::read_header(&mut read) {
            Ok(h) => h,
            Err(Error::Io(e)) => {
                if stop.load(Ordering::SeqCst) {
                    log::debug!("ImuClient: reader stopping");
                } else if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    log::info!("ImuClient: endpoint closed the connection");
                } else {
                    log::error!("ImuClient: read error: {}", e);
                }
                break;
            }
            Err(e) => {
                log::error!("ImuClient: {}", e);
                break;
            }
        };

        payload.clear();
        payload.resize(header.payload_len, 0);
        if let Err(e) = read.read_exact(&mut payload) {
            if !stop.load(Ordering::SeqCst) {
                log::error!("ImuClient: payload read error: {}", e);
            }
            break;
        }

        frames.fetch_add(1, Ordering::Relaxed);

        match header.message_id {
            MSG_IMU_STATE => {
                if payload.is_empty() {
                    log::warn!("ImuClient: empty IMU_STATE payload, skipping");
                    continue;
                }
                let is_on = payload[0] == 1;
                log::debug!("ImuClient: device state {}", if is_on { "ON" } else { "OFF" });
                hub.notify_imu_state(&StateEvent { is_on });

                if !is_on {
                    // Re-arm: ask the device to turn back on right away
                    let frame = protocol::set_imu_state_frame(true);
                    let mut w = write.lock();
                    if let Err(e) = w.write_all(&frame) {
                        log::error!("ImuClient: re-arm write failed: {}", e);
                        break;
                    }
                    log::debug!("ImuClient: re-arm requested");
                }
            }
            MSG_IMU_DATA => match protocol::decode_imu_sample(&payload) {
                Ok(sample) => {
                    samples.fetch_add(1, Ordering::Relaxed);
                    hub.notify_imu_sample(&sample);
                }
                Err(e) => {
                    log::error!("ImuClient: {}", e);
                    break;
                }
            },
            other => {
                log::trace!("ImuClient: ignoring message id 0x{:02X}", other);
            }
        }
    }
}
