//! RESP wire protocol.
//!
//! - [`codec`] - encoder and incremental decoder
//! - [`error`] - the crate-wide error taxonomy
//! - [`frame`] - frame types exchanged with the server

pub mod codec;
/// Error types.
pub mod error;
pub mod frame;
