//! Command handler - ownership-enforcing execution of controller commands
//!
//! The handler is the only mutator of session ownership. A `start` admitted
//! for a controller makes that controller the owner; until it issues a
//! successful `end` (or is unregistered, or the orchestrator tears down),
//! control commands from other controllers are rejected with
//! `OwnershipError`.
//!
//! The handler never returns an error: every failure becomes a
//! `ModelResult` so the processing loop stays alive regardless of what
//! controllers throw at it.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::imu::ImuClient;
use crate::model::{
    CommandKind, ImuCommandPayload, ImuControlStatus, ModelCommand, ModelResult, StartPayload,
};

/// Executes [`ModelCommand`]s against the IMU client under ownership rules
pub struct CommandHandler {
    imu: Arc<ImuClient>,
    /// `None` means no controller owns the IMU session
    owner: Mutex<Option<String>>,
}

impl CommandHandler {
    pub fn new(imu: Arc<ImuClient>) -> Self {
        Self {
            imu,
            owner: Mutex::new(None),
        }
    }

    /// The controller currently owning the session, if any
    pub fn current_owner(&self) -> Option<String> {
        self.owner.lock().clone()
    }

    /// Execute one command and produce its result
    pub fn handle(&self, cmd: &ModelCommand) -> ModelResult {
        match &cmd.kind {
            CommandKind::Start => self.handle_start(cmd),
            CommandKind::End => self.handle_end(cmd),
            CommandKind::Other(kind) => {
                log::warn!(
                    "Handler: unknown command type '{}' from {}",
                    kind,
                    cmd.controller_id
                );
                self.result(cmd, ImuControlStatus::Failed, None, Some("Unknown command type".to_string()))
            }
        }
    }

    fn handle_start(&self, cmd: &ModelCommand) -> ModelResult {
        // Best-effort parse; a malformed payload is a bare ownership claim,
        // not a command error.
        let payload = StartPayload::parse(&cmd.raw_payload);

        let mut owner = self.owner.lock();
        let current = owner.clone();
        match current.as_deref() {
            None => {
                if let Some((address, port)) = payload.endpoint() {
                    if let Err(e) = self.imu.connect(address, port) {
                        log::warn!(
                            "Handler: start from {} failed to connect {}:{}: {}",
                            cmd.controller_id,
                            address,
                            port,
                            e
                        );
                        return self.result(
                            cmd,
                            ImuControlStatus::Failed,
                            None,
                            Some(e.to_string()),
                        );
                    }
                }

                *owner = Some(cmd.controller_id.clone());
                let message = match payload.endpoint() {
                    Some((address, port)) => format!(
                        "IMU session started by {} on {}:{}",
                        cmd.controller_id, address, port
                    ),
                    None => format!("IMU session started by {}", cmd.controller_id),
                };
                log::info!("Handler: {}", message);
                self.result(cmd, ImuControlStatus::Success, Some(message), None)
            }
            Some(current) if current == cmd.controller_id => {
                log::debug!("Handler: duplicate start from owner {}", cmd.controller_id);
                self.result(
                    cmd,
                    ImuControlStatus::AlreadyRunning,
                    Some(format!("{} already owns the IMU session", cmd.controller_id)),
                    None,
                )
            }
            Some(current) => {
                log::warn!(
                    "Handler: start from {} rejected, session owned by {}",
                    cmd.controller_id,
                    current
                );
                self.result(
                    cmd,
                    ImuControlStatus::OwnershipError,
                    None,
                    Some(format!("IMU session is owned by {}", current)),
                )
            }
        }
    }

    fn handle_end(&self, cmd: &ModelCommand) -> ModelResult {
        let mut owner = self.owner.lock();
        let current = owner.clone();
        match current.as_deref() {
            None => {
                // Disconnect is idempotent; stop with no owner still makes
                // sure the device is released.
                self.imu.disconnect();
                log::info!("Handler: stop from {}, no owner was assigned", cmd.controller_id);
                self.result(
                    cmd,
                    ImuControlStatus::Success,
                    Some("no owner was assigned".to_string()),
                    None,
                )
            }
            Some(current) if current == cmd.controller_id => {
                *owner = None;
                self.imu.disconnect();
                let message = format!("IMU session stopped by {}", cmd.controller_id);
                log::info!("Handler: {}", message);
                self.result(cmd, ImuControlStatus::Success, Some(message), None)
            }
            Some(current) => {
                log::warn!(
                    "Handler: stop from {} rejected, session owned by {}",
                    cmd.controller_id,
                    current
                );
                self.result(
                    cmd,
                    ImuControlStatus::OwnershipError,
                    None,
                    Some(format!("IMU session is owned by {}", current)),
                )
            }
        }
    }

    /// Release ownership held by `controller_id`, without disconnecting
    ///
    /// Used when a controller is unregistered. Returns true when ownership
    /// was actually held by that controller.
    pub fn release_ownership(&self, controller_id: &str) -> bool {
        let mut owner = self.owner.lock();
        if owner.as_deref() == Some(controller_id) {
            *owner = None;
            log::info!("Handler: ownership released for {}", controller_id);
            true
        } else {
            false
        }
    }

    /// Unconditionally clear ownership; used at orchestrator teardown after
    /// the IMU is already disconnecting
    pub fn reset_ownership(&self) {
        let mut owner = self.owner.lock();
        if let Some(prev) = owner.take() {
            log::info!("Handler: ownership reset (was {})", prev);
        }
    }

    fn result(
        &self,
        cmd: &ModelCommand,
        status: ImuControlStatus,
        message: Option<String>,
        error: Option<String>,
    ) -> ModelResult {
        ModelResult::for_command(
            cmd,
            ImuCommandPayload {
                status,
                is_connected: self.imu.is_connected(),
                message,
            },
            error,
        )
    }
}
