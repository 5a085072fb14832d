//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): request, transport and parse errors
//! - [`LoadState`](loadstate::LoadState): per-request progress states
//! - [`IoResultExt`](context::IoResultExt): contextual I/O error mapping

pub mod context;
pub mod loadstate;
pub mod neterror;
