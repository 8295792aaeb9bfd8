//! Command pipeline - serialized execution and result dispatch
//!
//! Two unbounded FIFO queues connect three parties: controllers enqueue
//! [`ModelCommand`]s, a single **processor** thread executes them one at a
//! time through the [`CommandHandler`], and a single **dispatcher** thread
//! publishes each [`ModelResult`] through the hub and resolves any waiting
//! correlation slot.
//!
//! Guarantees:
//! - at most one command executes at any instant (single consumer);
//! - results are published in enqueue order (single dispatcher);
//! - for one command, hub publication happens before the correlation waiter
//!   unblocks, so synchronous subscribers observe the result first.
//!
//! `stop` drops the command sender; the processor drains what was already
//! queued, exits on channel disconnect, and its own sender drop lets the
//! dispatcher drain the same way. Outstanding correlation slots are then
//! canceled by dropping their senders.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::command::handler::CommandHandler;
use crate::error::{Error, Result};
use crate::hub::NotificationHub;
use crate::model::{ImuCommandPayload, ImuControlStatus, ModelCommand, ModelResult};

type PendingTable = Arc<Mutex<HashMap<String, Sender<ModelResult>>>>;

struct Workers {
    command_tx: Sender<ModelCommand>,
    processor: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

/// Serial command executor with correlation-based request/response
pub struct CommandPipeline {
    handler: Arc<CommandHandler>,
    hub: Arc<NotificationHub>,
    pending: PendingTable,
    running: Arc<AtomicBool>,
    workers: Mutex<Option<Workers>>,
    processed: Arc<AtomicU64>,
}

impl CommandPipeline {
    pub fn new(handler: Arc<CommandHandler>, hub: Arc<NotificationHub>) -> Self {
        Self {
            handler,
            hub,
            pending: Arc::new(Mutex::new(HashMap::new())),
            running: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(None),
            processed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether the workers are accepting commands
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Commands executed since process start
    pub fn commands_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Start the processor and dispatcher workers
    ///
    /// Returns false if the pipeline is already running.
    pub fn start(&self) -> bool {
        let mut workers = self.workers.lock();
        if workers.is_some() {
            return false;
        }

        let (command_tx, command_rx) = unbounded::<ModelCommand>();
        let (result_tx, result_rx) = unbounded::<ModelResult>();

        self.running.store(true, Ordering::SeqCst);

        let processor = {
            let handler = Arc::clone(&self.handler);
            let processed = Arc::clone(&self.processed);
            thread::Builder::new()
                .name("pipeline-processor".to_string())
                .spawn(move || processor_loop(command_rx, result_tx, handler, processed))
                .expect("Failed to spawn pipeline-processor")
        };

        let dispatcher = {
            let hub = Arc::clone(&self.hub);
            let pending = Arc::clone(&self.pending);
            thread::Builder::new()
                .name("pipeline-dispatcher".to_string())
                .spawn(move || dispatcher_loop(result_rx, hub, pending))
                .expect("Failed to spawn pipeline-dispatcher")
        };

        *workers = Some(Workers {
            command_tx,
            processor,
            dispatcher,
        });

        log::info!("Pipeline: started");
        true
    }

    /// Enqueue a command for execution
    ///
    /// Returns false only when the pipeline is not running.
    pub fn try_enqueue(&self, cmd: ModelCommand) -> bool {
        let workers = self.workers.lock();
        match workers.as_ref() {
            Some(w) if self.running.load(Ordering::SeqCst) => w.command_tx.send(cmd).is_ok(),
            _ => false,
        }
    }

    /// Enqueue a command and wait for its result
    ///
    /// The command must carry a correlation id that is not already pending.
    /// `timeout` bounds the caller's exposure to a slow handler; on expiry
    /// the pending slot is withdrawn and the eventual result is delivered
    /// only through the hub.
    pub fn execute(&self, cmd: ModelCommand, timeout: Duration) -> Result<ModelResult> {
        let correlation_id = cmd
            .correlation_id
            .clone()
            .ok_or(Error::MissingCorrelation)?;

        if !self.is_running() {
            return Err(Error::PipelineStopped);
        }

        let (tx, rx) = bounded::<ModelResult>(1);
        {
            let mut pending = self.pending.lock();
            if pending.contains_key(&correlation_id) {
                return Err(Error::DuplicateCorrelation(correlation_id));
            }
            pending.insert(correlation_id.clone(), tx);
        }

        if !self.try_enqueue(cmd) {
            self.pending.lock().remove(&correlation_id);
            return Err(Error::PipelineStopped);
        }

        match rx.recv_timeout(timeout) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Timeout) => {
                self.pending.lock().remove(&correlation_id);
                Err(Error::ExecuteTimeout(correlation_id))
            }
            Err(RecvTimeoutError::Disconnected) => {
                // Slot was canceled by stop()
                self.pending.lock().remove(&correlation_id);
                Err(Error::PipelineStopped)
            }
        }
    }

    /// Stop both workers, draining queued work, and cancel pending slots
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);

        let Some(workers) = self.workers.lock().take() else {
            return;
        };

        // Dropping the command sender lets the processor drain and exit;
        // the processor's result sender drop then drains the dispatcher.
        drop(workers.command_tx);
        if workers.processor.join().is_err() {
            log::error!("Pipeline: processor thread panicked");
        }
        if workers.dispatcher.join().is_err() {
            log::error!("Pipeline: dispatcher thread panicked");
        }

        // Cancel whoever is still waiting on a correlation slot
        let canceled: Vec<String> = {
            let mut pending = self.pending.lock();
            let keys = pending.keys().cloned().collect();
            pending.clear();
            keys
        };
        for id in &canceled {
            log::debug!("Pipeline: canceled pending correlation {}", id);
        }

        log::info!(
            "Pipeline: stopped ({} commands processed)",
            self.processed.load(Ordering::Relaxed)
        );
    }
}

impl Drop for CommandPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Single-consumer execution loop
fn processor_loop(
    command_rx: Receiver<ModelCommand>,
    result_tx: Sender<ModelResult>,
    handler: Arc<CommandHandler>,
    processed: Arc<AtomicU64>,
) {
    for cmd in command_rx.iter() {
        let result = match catch_unwind(AssertUnwindSafe(|| handler.handle(&cmd))) {
            Ok(result) => result,
            Err(_) => {
                log::error!(
                    "Pipeline: handler panicked on '{}' from {}",
                    cmd.kind,
                    cmd.controller_id
                );
                ModelResult::for_command(
                    &cmd,
                    ImuCommandPayload {
                        status: ImuControlStatus::Failed,
                        is_connected: false,
                        message: None,
                    },
                    Some("internal error while handling command".to_string()),
                )
            }
        };

        processed.fetch_add(1, Ordering::Relaxed);

        if result_tx.send(result).is_err() {
            break;
        }
    }

    log::debug!("Pipeline: processor exiting");
}

/// Single-consumer dispatch loop: hub first, then the correlation waiter
fn dispatcher_loop(
    result_rx: Receiver<ModelResult>,
    hub: Arc<NotificationHub>,
    pending: PendingTable,
) {
    for result in result_rx.iter() {
        hub.notify_result(&result);

        let slot = result
            .correlation_id
            .as_ref()
            .and_then(|id| pending.lock().remove(id));
        if let Some(tx) = slot {
            // A full or disconnected slot means the waiter already gave up
            let _ = tx.try_send(result);
        }
    }

    log::debug!("Pipeline: dispatcher exiting");
}
