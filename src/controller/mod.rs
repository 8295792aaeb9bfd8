//! Controller contract - the seam every command source implements
//!
//! A controller is anything that can emit [`ModelCommand`]s: an HTTP
//! adapter, an in-process API, a future message-queue bridge. The
//! orchestrator observes emissions through a [`CommandListener`] installed
//! at registration; the controller invokes it synchronously on whatever
//! thread produces the command.

pub mod http;
pub mod programmatic;

use std::sync::Arc;

use crate::command::CommandPipeline;
use crate::model::ModelCommand;

/// Callback through which a controller hands commands to the orchestrator
pub type CommandListener = Arc<dyn Fn(ModelCommand) + Send + Sync>;

/// Contract for command sources
pub trait Controller: Send + Sync {
    /// Stable unique identifier; also used as the command `controller_id`
    fn id(&self) -> &str;

    /// Install or clear the listener receiving emitted commands
    ///
    /// The orchestrator installs a listener at registration and clears it
    /// at unregistration. Controllers must tolerate emitting with no
    /// listener installed (the command is dropped).
    fn set_command_listener(&self, listener: Option<CommandListener>);

    /// Installer hook for pipeline-aware controllers
    ///
    /// Controllers that need request/response semantics (the programmatic
    /// controller's `execute` path) receive the pipeline here; everyone
    /// else keeps the default no-op.
    fn attach_pipeline(&self, _pipeline: Option<Arc<CommandPipeline>>) {}

    /// Acquire external resources (e.g. bind a listener)
    ///
    /// Called by the orchestrator in registration order. Returning false
    /// aborts orchestrator startup.
    fn start(&self) -> bool {
        true
    }

    /// Release external resources; failures are reported, not propagated
    fn stop(&self) -> bool {
        true
    }
}

pub use http::HttpController;
pub use programmatic::{ImuControlResult, ProgrammaticController};
