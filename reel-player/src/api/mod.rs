//! HTTP control surface
//!
//! Triggers, state, asset serving, dashboard reads and the SSE stream.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{router, run, AppContext};
