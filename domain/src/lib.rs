//! Business logic layer for the chat platform.
//!
//! Sits between `entity_api` (persistence) and `web` (HTTP). The web layer
//! depends on this crate only, never on `entity_api` directly; errors are
//! translated at each boundary (see `error`).

pub mod error;
pub mod message;
pub mod user;

pub use entity::{messages, users, Id};
