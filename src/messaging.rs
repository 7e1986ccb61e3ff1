//! Messaging platform adapters.

pub mod discord;
pub mod traits;

pub use traits::{InboundStream, Messaging};
