//! Bridge between a remote-control host and Panasonic Viera TVs
//!
//! One [`session::DeviceSession`] runs per configured TV. Commands from the
//! host are routed through [`command::CommandExecutor`]; state changes flow
//! back as [`shared::EntityUpdate`] events. New TVs are paired with
//! [`pairing::PairingFlow`].

pub mod client;
pub mod command;
pub mod config;
pub mod pairing;
pub mod session;
pub mod wake;

pub use viera_shared as shared;
