// src/models/mod.rs

//! Domain models for the announcer.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod announcement;
mod config;
mod stream;

// Re-export all public types
pub use announcement::{Announcement, UNKNOWN_AUTHOR};
pub use config::{
    BlackboardConfig, Config, DiscordConfig, ENV_BLACKBOARD_COOKIE, ENV_DISCORD_CHANNEL,
    ENV_DISCORD_TOKEN, PollerConfig, SourceConfig, StorageConfig,
};
pub use stream::{RawEntry, StreamEntry, StreamPayload, parse_entries};
