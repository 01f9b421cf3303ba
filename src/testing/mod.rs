//! Testing utilities and mock implementations
//!
//! Fakes for the session and clock seams so the connection manager can be
//! exercised without an MQTT broker.

pub mod mocks;

pub use crate::link::LinkFlag;
pub use mocks::*;
