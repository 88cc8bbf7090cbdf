// src/storage/mod.rs

//! Storage abstractions for announcement state.
//!
//! The store lives in memory; a backend only keeps a snapshot of it so a
//! restart does not re-post everything the feed still lists.
//!
//! ## Snapshot Layout
//!
//! ```text
//! {
//!   "updated_at": "2026-01-05T09:00:00Z",
//!   "announcements": [ { "title": ..., "read": true, ... } ]
//! }
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Announcement;

// Re-export for convenience
pub use local::LocalStorage;

/// Serialized form of an announcement store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// When the snapshot was taken
    pub updated_at: DateTime<Utc>,
    /// Announcements in insertion order
    pub announcements: Vec<Announcement>,
}

/// Trait for state storage backends.
#[async_trait]
pub trait AnnouncementStorage: Send + Sync {
    /// Replace the stored snapshot.
    async fn save(&self, snapshot: &StoreSnapshot) -> Result<()>;

    /// Load the stored snapshot, `None` when nothing was saved yet.
    async fn load(&self) -> Result<Option<StoreSnapshot>>;
}
