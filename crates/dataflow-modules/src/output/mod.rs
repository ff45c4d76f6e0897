//! Output modules
//!
//! Modules that consume values and expose them to observers.

mod receive_scalar;

pub use receive_scalar::ReceiveScalar;
