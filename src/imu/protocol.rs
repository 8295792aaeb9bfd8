//! IMU wire protocol framing and codecs
//!
//! # TCP Protocol Specification
//!
//! Every message is a fixed 5-byte header followed by a variable payload:
//!
//! ```text
//! ┌────────────────────┬───────────────────────────┬──────────────────┐
//! │ message_id (1 byte)│ payload_length (4 bytes)  │ payload          │
//! │                    │ u32 little-endian         │ payload_length B │
//! └────────────────────┴───────────────────────────┴──────────────────┘
//! ```
//!
//! Message ids:
//!
//! | ID     | Name            | Direction       | Payload                  |
//! |--------|-----------------|-----------------|--------------------------|
//! | `0x01` | IMU_STATE       | device → client | 1 byte: 0=OFF, 1=ON      |
//! | `0x02` | IMU_DATA        | device → client | 32 bytes (see below)     |
//! | `0x81` | SET_IMU_STATE   | client → device | 1 byte: 0=OFF, 1=ON      |
//!
//! IMU_DATA payload, all little-endian: `u64` timestamp (ns), 3×`f32` gyro
//! (rad/s), 3×`f32` accel (m/s²).
//!
//! Payloads above [`MAX_PAYLOAD_LEN`] are rejected as protocol violations
//! and terminate the session.

use crate::error::{Error, Result};
use crate::model::ImuSample;
use std::io::Read;

/// Device reports acquisition state
pub const MSG_IMU_STATE: u8 = 0x01;
/// Device streams one measurement
pub const MSG_IMU_DATA: u8 = 0x02;
/// Client requests acquisition state
pub const MSG_SET_IMU_STATE: u8 = 0x81;

/// Frame header size in bytes
pub const HEADER_LEN: usize = 5;
/// Exact payload size of an IMU_DATA frame
pub const IMU_DATA_PAYLOAD_LEN: usize = 32;
/// Maximum accepted payload length; larger frames are protocol violations
pub const MAX_PAYLOAD_LEN: usize = 1_000_000;

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub message_id: u8,
    pub payload_len: usize,
}

/// Block-read one frame header
///
/// Fails with `Error::Io` on EOF or stream error, and `Error::Protocol`
/// when the advertised payload length exceeds [`MAX_PAYLOAD_LEN`].
pub fn read_header<R: Read>(reader: &mut R) -> Result<FrameHeader> {
    let mut buf = [0u8; HEADER_LEN];
    reader.read_exact(&mut buf)?;

    let message_id = buf[0];
    let payload_len = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;

    if payload_len > MAX_PAYLOAD_LEN {
        return Err(Error::Protocol(format!(
            "payload length {} exceeds limit {}",
            payload_len, MAX_PAYLOAD_LEN
        )));
    }

    Ok(FrameHeader {
        message_id,
        payload_len,
    })
}

/// Encode a header into its 5-byte wire form
pub fn encode_header(message_id: u8, payload_len: u32) -> [u8; HEADER_LEN] {
    let len = payload_len.to_le_bytes();
    [message_id, len[0], len[1], len[2], len[3]]
}

/// Build a complete SET_IMU_STATE frame
pub fn set_imu_state_frame(on: bool) -> [u8; HEADER_LEN + 1] {
    let mut frame = [0u8; HEADER_LEN + 1];
    frame[..HEADER_LEN].copy_from_slice(&encode_header(MSG_SET_IMU_STATE, 1));
    frame[HEADER_LEN] = on as u8;
    frame
}

/// Build a complete IMU_STATE frame (device side; used by simulators)
pub fn imu_state_frame(on: bool) -> [u8; HEADER_LEN + 1] {
    let mut frame = [0u8; HEADER_LEN + 1];
    frame[..HEADER_LEN].copy_from_slice(&encode_header(MSG_IMU_STATE, 1));
    frame[HEADER_LEN] = on as u8;
    frame
}

/// Decode an IMU_DATA payload
///
/// The payload must be exactly [`IMU_DATA_PAYLOAD_LEN`] bytes.
pub fn decode_imu_sample(payload: &[u8]) -> Result<ImuSample> {
    if payload.len() != IMU_DATA_PAYLOAD_LEN {
        return Err(Error::Protocol(format!(
            "IMU_DATA payload must be {} bytes, got {}",
            IMU_DATA_PAYLOAD_LEN,
            payload.len()
        )));
    }

    let timestamp_ns = u64::from_le_bytes(payload[0..8].try_into().unwrap());

    let mut fields = [0f32; 6];
    for (i, field) in fields.iter_mut().enumerate() {
        let off = 8 + i * 4;
        *field = f32::from_le_bytes(payload[off..off + 4].try_into().unwrap());
    }

    Ok(ImuSample {
        timestamp_ns,
        gyro: [fields[0], fields[1], fields[2]],
        accel: [fields[3], fields[4], fields[5]],
    })
}

/// Encode an IMU_DATA payload (device side; used by simulators)
pub fn encode_imu_sample(sample: &ImuSample) -> [u8; IMU_DATA_PAYLOAD_LEN] {
    let mut payload = [0u8; IMU_DATA_PAYLOAD_LEN];
    payload[0..8].copy_from_slice(&sample.timestamp_ns.to_le_bytes());
    for (i, v) in sample.gyro.iter().chain(sample.accel.iter()).enumerate() {
        let off = 8 + i * 4;
        payload[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }
    payload
}

/// Build a complete IMU_DATA frame (device side; used by simulators)
pub fn imu_data_frame(sample: &ImuSample) -> [u8; HEADER_LEN + IMU_DATA_PAYLOAD_LEN] {
    let mut frame = [0u8; HEADER_LEN + IMU_DATA_PAYLOAD_LEN];
    frame[..HEADER_LEN].copy_from_slice(&encode_header(MSG_IMU_DATA, IMU_DATA_PAYLOAD_LEN as u32));
    frame[HEADER_LEN..].copy_from_slice(&encode_imu_sample(sample));
    frame
}
