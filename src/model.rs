//! Core data types for commands, results, and IMU events.
//!
//! Key types for controller and subscriber implementers:
//! - [`ModelCommand`]: Inbound command emitted by a controller
//! - [`ModelResult`]: Outcome produced by the command handler
//! - [`ConnectionEvent`], [`StateEvent`], [`ImuSample`]: IMU events fanned
//!   out through the notification hub

use serde::Deserialize;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as microseconds since the Unix epoch
pub fn epoch_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Command verb carried by a [`ModelCommand`]
///
/// Unknown verbs are preserved verbatim so the handler can reject them with
/// a descriptive result instead of dropping them at the parse boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Claim the IMU session, optionally connecting to an endpoint
    Start,
    /// Release the IMU session and disconnect
    End,
    /// Anything else; rejected by the handler
    Other(String),
}

impl CommandKind {
    /// Parse a controller-supplied verb
    pub fn parse(s: &str) -> Self {
        match s {
            "start" => CommandKind::Start,
            "end" => CommandKind::End,
            other => CommandKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Start => write!(f, "start"),
            CommandKind::End => write!(f, "end"),
            CommandKind::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Immutable command record emitted by a controller
#[derive(Debug, Clone)]
pub struct ModelCommand {
    /// Stable identifier of the emitting controller
    pub controller_id: String,
    /// Command verb
    pub kind: CommandKind,
    /// Textual payload (UTF-8 JSON by convention); parsed best-effort
    pub raw_payload: String,
    /// When present, the emitter can await the matching result
    pub correlation_id: Option<String>,
    /// Emission time, microseconds since Unix epoch
    pub timestamp_us: u64,
}

impl ModelCommand {
    /// Create a command stamped with the current time
    pub fn new(
        controller_id: impl Into<String>,
        kind: CommandKind,
        raw_payload: impl Into<String>,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            controller_id: controller_id.into(),
            kind,
            raw_payload: raw_payload.into(),
            correlation_id,
            timestamp_us: epoch_micros(),
        }
    }
}

/// Outcome category for IMU control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImuControlStatus {
    /// Command admitted and executed
    Success,
    /// Duplicate `start` by the current owner; treated as success
    AlreadyRunning,
    /// Command rejected because another controller owns the session
    OwnershipError,
    /// Command failed (connect error, unknown verb)
    Failed,
}

impl ImuControlStatus {
    /// Whether this status counts as a successful outcome
    pub fn is_success(self) -> bool {
        matches!(self, ImuControlStatus::Success | ImuControlStatus::AlreadyRunning)
    }
}

/// Typed payload attached to every IMU control result
///
/// `is_connected` is a snapshot taken right after the operation, not a
/// liveness signal. Observers that care about the long-lived session state
/// must subscribe to the connection events instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ImuCommandPayload {
    pub status: ImuControlStatus,
    pub is_connected: bool,
    pub message: Option<String>,
}

/// Immutable result record produced by the command handler
#[derive(Debug, Clone)]
pub struct ModelResult {
    /// Copied from the command
    pub controller_id: String,
    /// Copied from the command
    pub kind: CommandKind,
    /// Copied from the command
    pub correlation_id: Option<String>,
    /// True iff `payload.status` is `Success` or `AlreadyRunning`
    pub success: bool,
    /// Human-readable message when `success` is false
    pub error: Option<String>,
    /// Typed outcome payload
    pub payload: ImuCommandPayload,
    /// Result production time, microseconds since Unix epoch
    pub completed_at_us: u64,
}

impl ModelResult {
    /// Build a result for a command from its outcome payload
    pub fn for_command(cmd: &ModelCommand, payload: ImuCommandPayload, error: Option<String>) -> Self {
        Self {
            controller_id: cmd.controller_id.clone(),
            kind: cmd.kind.clone(),
            correlation_id: cmd.correlation_id.clone(),
            success: payload.status.is_success(),
            error,
            payload,
            completed_at_us: epoch_micros(),
        }
    }
}

/// IMU TCP session opened or closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub connected: bool,
    /// Peer address of the session, when known
    pub remote_endpoint: Option<String>,
}

/// IMU reported its acquisition state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateEvent {
    pub is_on: bool,
}

/// One decoded IMU measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    /// Device timestamp in nanoseconds (pass-through, no clock sync)
    pub timestamp_ns: u64,
    /// Gyroscope (rad/s): x, y, z
    pub gyro: [f32; 3],
    /// Accelerometer (m/s²): x, y, z
    pub accel: [f32; 3],
}

/// Optional endpoint carried by a `start` payload
///
/// Parsed best-effort: a malformed document or missing fields simply mean
/// "no endpoint" and the start proceeds as a bare ownership claim.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartPayload {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl StartPayload {
    /// Parse a raw payload, degrading to an empty payload on any error
    pub fn parse(raw: &str) -> Self {
        let parsed: StartPayload = serde_json::from_str(raw).unwrap_or_default();
        // Port 0 is not connectable; treat it the same as an absent field.
        match parsed.port {
            Some(0) => StartPayload {
                address: parsed.address,
                port: None,
            },
            _ => parsed,
        }
    }

    /// The endpoint, when both fields are present
    pub fn endpoint(&self) -> Option<(&str, u16)> {
        match (&self.address, self.port) {
            (Some(addr), Some(port)) => Some((addr.as_str(), port)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_kind_parse() {
        assert_eq!(CommandKind::parse("start"), CommandKind::Start);
        assert_eq!(CommandKind::parse("end"), CommandKind::End);
        assert_eq!(
            CommandKind::parse("reboot"),
            CommandKind::Other("reboot".to_string())
        );
        assert_eq!(CommandKind::parse("reboot").to_string(), "reboot");
    }

    #[test]
    fn test_start_payload_full() {
        let p = StartPayload::parse(r#"{"address":"10.0.0.5","port":7000}"#);
        assert_eq!(p.endpoint(), Some(("10.0.0.5", 7000)));
    }

    #[test]
    fn test_start_payload_partial_has_no_endpoint() {
        let p = StartPayload::parse(r#"{"address":"10.0.0.5"}"#);
        assert_eq!(p.endpoint(), None);

        let p = StartPayload::parse(r#"{"port":7000}"#);
        assert_eq!(p.endpoint(), None);
    }

    #[test]
    fn test_start_payload_malformed_degrades() {
        let p = StartPayload::parse("not json at all");
        assert_eq!(p.endpoint(), None);

        // Out-of-range port fails deserialization of the whole document
        let p = StartPayload::parse(r#"{"address":"a","port":70000}"#);
        assert_eq!(p.endpoint(), None);
    }

    #[test]
    fn test_start_payload_port_zero_is_no_endpoint() {
        let p = StartPayload::parse(r#"{"address":"10.0.0.5","port":0}"#);
        assert_eq!(p.endpoint(), None);
    }

    #[test]
    fn test_status_success_mapping() {
        assert!(ImuControlStatus::Success.is_success());
        assert!(ImuControlStatus::AlreadyRunning.is_success());
        assert!(!ImuControlStatus::OwnershipError.is_success());
        assert!(!ImuControlStatus::Failed.is_success());
    }

    #[test]
    fn test_result_copies_command_fields() {
        let cmd = ModelCommand::new(
            "c1",
            CommandKind::Start,
            "{}",
            Some("corr-1".to_string()),
        );
        let result = ModelResult::for_command(
            &cmd,
            ImuCommandPayload {
                status: ImuControlStatus::Success,
                is_connected: false,
                message: None,
            },
            None,
        );
        assert_eq!(result.controller_id, "c1");
        assert_eq!(result.correlation_id.as_deref(), Some("corr-1"));
        assert!(result.success);
        assert!(result.completed_at_us >= cmd.timestamp_us);
    }
}
