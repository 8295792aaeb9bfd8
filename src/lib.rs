//! SetuIO - command gateway between controllers and a TCP-attached IMU
//!
//! This library mediates between external command sources ("controllers")
//! and a downstream IMU reached over a framed binary TCP protocol. It
//! enforces serialized command execution, exclusive ownership of the IMU
//! session across competing controllers, and fans sensor state and sample
//! streams out to observers through a synchronous notification hub.
//!
//! ## Components
//!
//! - [`orchestrator::Orchestrator`]: lifecycle and wiring
//! - [`command::CommandPipeline`]: serial executor with correlation
//!   rendezvous
//! - [`command::CommandHandler`]: ownership-enforcing command execution
//! - [`imu::ImuClient`]: TCP session, frame decoding, state re-arm
//! - [`hub::NotificationHub`]: synchronous event fan-out
//! - [`controller`]: the controller contract plus the HTTP and in-process
//!   reference implementations

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod hub;
pub mod imu;
pub mod model;
pub mod orchestrator;

// Re-export commonly used types
pub use error::{Error, Result};
pub use hub::{NotificationHub, SubscriptionId};
pub use model::{
    CommandKind, ConnectionEvent, ImuCommandPayload, ImuControlStatus, ImuSample, ModelCommand,
    ModelResult, StateEvent,
};
pub use orchestrator::Orchestrator;
