//! Input modules
//!
//! Modules that produce values or receive data from outside the network.

mod async_listener;
mod send_scalar;

pub use async_listener::AsyncScalarListener;
pub use send_scalar::{SendScalar, SendScalarConfig};
