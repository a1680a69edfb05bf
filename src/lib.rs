//! Aura — HUD for AI coding agents
//!
//! The event-driven core: adapters normalize agent activity into
//! [`AgentEvent`]s, the [`registry`](crate::registry) folds them into session
//! state, and [`view`](crate::view) projects that state into what the overlay
//! surfaces must display.

pub mod config;
mod event;
pub mod ipc;
mod session;

pub use event::*;
pub use session::*;

pub mod agents;
pub mod registry;
pub mod server;
pub mod view;
