//! Relay Common - Shared types, utilities, and configuration for the relay bot.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Error types and handling utilities
//! - Logging setup and structured logging helpers
//! - Small string helpers used across the workspace

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;

pub use config::{
    BackendConfig, ChannelKind, Config, ConversationConfig, DiscordConfig, ObservabilityConfig,
};
pub use error::{Error, Result};

