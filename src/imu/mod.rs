//! IMU connectivity: wire protocol and TCP session client

pub mod client;
pub mod protocol;

pub use client::ImuClient;
