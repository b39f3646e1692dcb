//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the event-stream endpoint
//! and the database-backed message resolver. The core streaming machinery
//! (channel contract, session state machine, typed events) lives in the
//! `sse` crate to avoid circular dependencies.

pub(crate) mod handler;
pub(crate) mod resolver;
