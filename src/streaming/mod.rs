//! Streaming module for chunked body rewriting
//!
//! This module provides streaming primitives that:
//! - Use fixed memory allocation (carryover buffer)
//! - Handle tokens split across chunks
//! - Dispatch on stop bytes with a tiny FSM (no regex)

pub mod carryover;
pub mod stop_bytes;

pub use carryover::Carryover;
pub use stop_bytes::Stop;
