//! Halo - per-display attention rings for terminal coding assistants

pub mod agent;
pub mod alerts;
pub mod animation;
pub mod clock;
pub mod config;
pub mod error;
pub mod ipc;
pub mod platform;
pub mod render;
pub mod resolve;
pub mod server;
pub mod trigger;

pub use error::{Error, ResolveError, Result};
