// src/services/mod.rs

//! Service layer for the announcer.
//!
//! This module contains the business logic for:
//! - Fetching the raw stream (`StreamSource`)
//! - Deduplicating and tracking read state (`AnnouncementStore`)
//! - Delivering announcements (`AnnouncementListener` implementations)

mod console;
mod discord;
pub mod source;
mod store;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Announcement;

pub use console::ConsoleNotifier;
pub use discord::{DiscordNotifier, Embed, EmbedFooter, MessagePayload, render_embed};
pub use source::{BlackboardSource, FileSource, StreamSource};
pub use store::AnnouncementStore;

/// Subscriber receiving batches of newly unread announcements.
#[async_trait]
pub trait AnnouncementListener: Send + Sync {
    /// Deliver a batch, in the order the announcements were first seen.
    async fn update(&self, announcements: &[Announcement]) -> Result<()>;

    /// Name used in logs.
    fn name(&self) -> &str;
}
