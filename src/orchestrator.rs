//! Application orchestration for the SetuIO gateway
//!
//! Composes the hub, IMU client, command handler, and pipeline into a
//! running system, owns the controller registry, and exposes lifecycle to
//! the host process. The orchestrator is a library surface: it consumes no
//! environment and persists nothing.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::command::{CommandHandler, CommandPipeline};
use crate::controller::{CommandListener, Controller};
use crate::hub::NotificationHub;
use crate::imu::ImuClient;

struct Lifecycle {
    running: bool,
    disposed: bool,
}

/// Main application structure wiring controllers to the IMU session
pub struct Orchestrator {
    hub: Arc<NotificationHub>,
    imu: Arc<ImuClient>,
    handler: Arc<CommandHandler>,
    pipeline: Arc<CommandPipeline>,
    controllers: Mutex<Vec<Arc<dyn Controller>>>,
    lifecycle: Mutex<Lifecycle>,
}

impl Orchestrator {
    /// Build the full component graph, not yet running
    pub fn new() -> Self {
        let hub = Arc::new(NotificationHub::new());
        let imu = Arc::new(ImuClient::new(Arc::clone(&hub)));
        let handler = Arc::new(CommandHandler::new(Arc::clone(&imu)));
        let pipeline = Arc::new(CommandPipeline::new(
            Arc::clone(&handler),
            Arc::clone(&hub),
        ));

        Self {
            hub,
            imu,
            handler,
            pipeline,
            controllers: Mutex::new(Vec::new()),
            lifecycle: Mutex::new(Lifecycle {
                running: false,
                disposed: false,
            }),
        }
    }

    // === Component access ===

    pub fn hub(&self) -> Arc<NotificationHub> {
        Arc::clone(&self.hub)
    }

    pub fn imu(&self) -> Arc<ImuClient> {
        Arc::clone(&self.imu)
    }

    pub fn handler(&self) -> Arc<CommandHandler> {
        Arc::clone(&self.handler)
    }

    pub fn pipeline(&self) -> Arc<CommandPipeline> {
        Arc::clone(&self.pipeline)
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.lock().running
    }

    // === Controller registry ===

    /// Register a controller, wiring its emissions into the pipeline
    ///
    /// Duplicate registrations (same id) are ignored. Registration does not
    /// start the controller; controllers are started, in registration
    /// order, by [`start`](Self::start).
    pub fn register_controller(&self, controller: Arc<dyn Controller>) {
        let mut controllers = self.controllers.lock();
        if controllers.iter().any(|c| c.id() == controller.id()) {
            log::warn!(
                "Orchestrator: controller {} already registered",
                controller.id()
            );
            return;
        }

        let pipeline = Arc::clone(&self.pipeline);
        let listener: CommandListener = Arc::new(move |cmd| {
            if !pipeline.try_enqueue(cmd) {
                log::warn!("Orchestrator: command dropped, pipeline not running");
            }
        });
        controller.set_command_listener(Some(listener));
        controller.attach_pipeline(Some(Arc::clone(&self.pipeline)));

        log::info!("Orchestrator: registered controller {}", controller.id());
        controllers.push(controller);
    }

    /// Remove a controller by id
    ///
    /// Clears its listener, detaches the pipeline, and releases any
    /// ownership it held. Does **not** disconnect the IMU.
    pub fn unregister_controller(&self, id: &str) -> bool {
        let removed = {
            let mut controllers = self.controllers.lock();
            match controllers.iter().position(|c| c.id() == id) {
                Some(index) => Some(controllers.remove(index)),
                None => None,
            }
        };

        let Some(controller) = removed else {
            return false;
        };

        controller.set_command_listener(None);
        controller.attach_pipeline(None);
        self.handler.release_ownership(id);
        log::info!("Orchestrator: unregistered controller {}", id);
        true
    }

    // === Lifecycle ===

    /// Start the pipeline and all registered controllers
    ///
    /// Returns false when already running, disposed, or when a controller
    /// fails to start; in the failure case everything started so far is
    /// rolled back in reverse order.
    pub fn start(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.running || lifecycle.disposed {
            return false;
        }

        self.pipeline.start();

        let controllers: Vec<Arc<dyn Controller>> = self.controllers.lock().clone();
        let mut started: Vec<Arc<dyn Controller>> = Vec::with_capacity(controllers.len());

        for controller in controllers {
            if controller.start() {
                started.push(controller);
            } else {
                log::error!(
                    "Orchestrator: controller {} failed to start, rolling back",
                    controller.id()
                );
                for c in started.iter().rev() {
                    if !c.stop() {
                        log::warn!("Orchestrator: controller {} failed to stop", c.id());
                    }
                }
                self.pipeline.stop();
                self.imu.disconnect();
                self.handler.reset_ownership();
                return false;
            }
        }

        lifecycle.running = true;
        log::info!("Orchestrator: started ({} controllers)", started.len());
        true
    }

    /// Stop controllers and pipeline, disconnect the IMU, clear ownership
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock();
        self.stop_locked(&mut lifecycle);
    }

    /// Stop and permanently retire this orchestrator
    pub fn dispose(&self) {
        let mut lifecycle = self.lifecycle.lock();
        self.stop_locked(&mut lifecycle);
        if !lifecycle.disposed {
            lifecycle.disposed = true;
            log::info!("Orchestrator: disposed");
        }
    }

    fn stop_locked(&self, lifecycle: &mut Lifecycle) {
        if !lifecycle.running {
            return;
        }

        log::info!("Orchestrator: stopping");

        // Pipeline first: drains queued commands and cancels pending
        // correlation slots before controllers lose their transports.
        self.pipeline.stop();

        for controller in self.controllers.lock().iter() {
            if !controller.stop() {
                log::warn!(
                    "Orchestrator: controller {} reported stop failure",
                    controller.id()
                );
            }
        }

        self.imu.disconnect();
        self.handler.reset_ownership();

        lifecycle.running = false;
        log::info!("Orchestrator: stopped");
    }

    /// Log periodic runtime statistics
    pub fn log_statistics(&self) {
        let (frames, samples) = self.imu.get_stats();
        log::info!(
            "Orchestrator: commands={} imu_connected={} frames={} samples={} owner={}",
            self.pipeline.commands_processed(),
            self.imu.is_connected(),
            frames,
            samples,
            self.handler.current_owner().as_deref().unwrap_or("-"),
        );
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ProgrammaticController;

    #[test]
    fn test_start_stop_cycle() {
        let orch = Orchestrator::new();
        assert!(!orch.is_running());
        assert!(orch.start());
        assert!(orch.is_running());
        assert!(!orch.start());
        orch.stop();
        assert!(!orch.is_running());
        // Restartable after a plain stop
        assert!(orch.start());
        orch.stop();
    }

    #[test]
    fn test_dispose_refuses_restart() {
        let orch = Orchestrator::new();
        assert!(orch.start());
        orch.dispose();
        assert!(!orch.start());
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let orch = Orchestrator::new();
        orch.register_controller(Arc::new(ProgrammaticController::new("c1")));
        orch.register_controller(Arc::new(ProgrammaticController::new("c1")));
        assert!(orch.unregister_controller("c1"));
        assert!(!orch.unregister_controller("c1"));
    }

    #[test]
    fn test_unregister_unknown_returns_false() {
        let orch = Orchestrator::new();
        assert!(!orch.unregister_controller("ghost"));
    }

    struct FailingController {
        id: String,
    }

    impl Controller for FailingController {
        fn id(&self) -> &str {
            &self.id
        }
        fn set_command_listener(&self, _listener: Option<CommandListener>) {}
        fn start(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_controller_start_failure_rolls_back() {
        let orch = Orchestrator::new();
        orch.register_controller(Arc::new(ProgrammaticController::new("ok")));
        orch.register_controller(Arc::new(FailingController {
            id: "broken".to_string(),
        }));

        assert!(!orch.start());
        assert!(!orch.is_running());
        assert!(!orch.pipeline().is_running());
    }
}
