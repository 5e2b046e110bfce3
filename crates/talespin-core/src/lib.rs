//! Shared types, configuration, and runtime utilities for the talespin game server.
//!
//! This crate provides the foundation used throughout the talespin workspace:
//! a type-safe identifier, a boot-time configuration record assembled once
//! from the environment, and logging/shutdown plumbing shared by every
//! binary and background task.

mod config;
mod id;
pub mod runtime;

pub use config::CardFormat;
pub use config::Config;
pub use config::ConfigError;
pub use id::Unique;
pub use id::ID;
