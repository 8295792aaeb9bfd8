//! In-process controller with request/response semantics
//!
//! Where the HTTP adapter is fire-and-forget, this controller gives the
//! host process a direct call surface: `start_imu`/`stop_imu` synthesize a
//! command with a fresh correlation id, run it through the pipeline's
//! `execute` rendezvous, and project the typed outcome back to the caller.
//!
//! The pipeline is attached by the orchestrator on registration; calls made
//! before registration (or after unregistration) fail fast.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::command::CommandPipeline;
use crate::controller::{CommandListener, Controller};
use crate::error::{Error, Result};
use crate::model::{CommandKind, ImuControlStatus, ModelCommand, ModelResult};

/// Default wait budget for one command round trip
const EXECUTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Caller-facing projection of an IMU control outcome
#[derive(Debug, Clone, PartialEq)]
pub struct ImuControlResult {
    pub status: ImuControlStatus,
    pub is_connected: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl From<ModelResult> for ImuControlResult {
    fn from(result: ModelResult) -> Self {
        Self {
            status: result.payload.status,
            is_connected: result.payload.is_connected,
            message: result.payload.message,
            error: result.error,
        }
    }
}

/// Controller driven by direct method calls from the host process
pub struct ProgrammaticController {
    id: String,
    pipeline: Mutex<Option<Arc<CommandPipeline>>>,
    listener: Mutex<Option<CommandListener>>,
    seq: AtomicU64,
}

impl ProgrammaticController {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pipeline: Mutex::new(None),
            listener: Mutex::new(None),
            seq: AtomicU64::new(1),
        }
    }

    /// Claim the IMU session, optionally connecting to the endpoint named
    /// in `payload_json` (see the start payload convention)
    pub fn start_imu(&self, payload_json: &str) -> Result<ImuControlResult> {
        self.round_trip(CommandKind::Start, payload_json)
    }

    /// Release the IMU session
    pub fn stop_imu(&self) -> Result<ImuControlResult> {
        self.round_trip(CommandKind::End, "{}")
    }

    fn round_trip(&self, kind: CommandKind, payload: &str) -> Result<ImuControlResult> {
        let pipeline = self
            .pipeline
            .lock()
            .clone()
            .ok_or(Error::PipelineNotAttached)?;

        let correlation_id = format!("{}-{}", self.id, self.seq.fetch_add(1, Ordering::Relaxed));
        let cmd = ModelCommand::new(&self.id, kind, payload, Some(correlation_id));

        let result = pipeline.execute(cmd, EXECUTE_TIMEOUT)?;
        Ok(ImuControlResult::from(result))
    }
}

impl Controller for ProgrammaticController {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_command_listener(&self, listener: Option<CommandListener>) {
        *self.listener.lock() = listener;
    }

    fn attach_pipeline(&self, pipeline: Option<Arc<CommandPipeline>>) {
        *self.pipeline.lock() = pipeline;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandHandler;
    use crate::hub::NotificationHub;
    use crate::imu::ImuClient;

    #[test]
    fn test_calls_fail_without_pipeline() {
        let c = ProgrammaticController::new("prog");
        let err = c.start_imu("{}").unwrap_err();
        assert!(matches!(err, Error::PipelineNotAttached));
        let err = c.stop_imu().unwrap_err();
        assert!(matches!(err, Error::PipelineNotAttached));
    }

    #[test]
    fn test_round_trip_through_pipeline() {
        let hub = Arc::new(NotificationHub::new());
        let imu = Arc::new(ImuClient::new(Arc::clone(&hub)));
        let handler = Arc::new(CommandHandler::new(imu));
        let pipeline = Arc::new(CommandPipeline::new(handler, hub));
        pipeline.start();

        let c = ProgrammaticController::new("prog");
        c.attach_pipeline(Some(Arc::clone(&pipeline)));

        let result = c.start_imu("{}").unwrap();
        assert_eq!(result.status, ImuControlStatus::Success);

        let result = c.start_imu("{}").unwrap();
        assert_eq!(result.status, ImuControlStatus::AlreadyRunning);

        let result = c.stop_imu().unwrap();
        assert_eq!(result.status, ImuControlStatus::Success);

        pipeline.stop();
    }

    #[test]
    fn test_detach_restores_fail_fast() {
        let hub = Arc::new(NotificationHub::new());
        let imu = Arc::new(ImuClient::new(Arc::clone(&hub)));
        let handler = Arc::new(CommandHandler::new(imu));
        let pipeline = Arc::new(CommandPipeline::new(handler, hub));
        pipeline.start();

        let c = ProgrammaticController::new("prog");
        c.attach_pipeline(Some(Arc::clone(&pipeline)));
        c.attach_pipeline(None);
        assert!(matches!(
            c.start_imu("{}").unwrap_err(),
            Error::PipelineNotAttached
        ));

        pipeline.stop();
    }
}
