// src/services/console.rs

//! Console notifier for dry runs.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Announcement;
use crate::services::AnnouncementListener;
use crate::utils::text::truncate_body;

/// Logs announcements instead of posting them.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }

    /// Render an announcement the way it would appear in the channel.
    pub fn render(announcement: &Announcement) -> String {
        let when = announcement
            .published_at()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        format!(
            "[{}] {}\n{}\n-- {}",
            when,
            announcement.title,
            truncate_body(&announcement.body),
            announcement.footer()
        )
    }
}

#[async_trait]
impl AnnouncementListener for ConsoleNotifier {
    async fn update(&self, announcements: &[Announcement]) -> Result<()> {
        for announcement in announcements {
            log::info!("{}", Self::render(announcement));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
