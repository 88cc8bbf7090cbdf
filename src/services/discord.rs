// src/services/discord.rs

//! Discord channel notifier.
//!
//! Posts one embed per announcement through the REST API as a bot user.
//! Rate-limited posts (HTTP 429) wait for the advertised `retry_after` and
//! are sent again, up to `MAX_ATTEMPTS` tries in total.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Announcement, DiscordConfig};
use crate::services::AnnouncementListener;
use crate::utils::join_url;
use crate::utils::text::truncate_body;

/// Embed colour (green).
const EMBED_COLOR: u32 = 0x00FF00;

/// Per-request timeout for the REST API.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tries per message, the first one included.
const MAX_ATTEMPTS: u32 = 5;

/// Wait used when a 429 carries no usable `retry_after`.
const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(1);

/// Upper bound for a single rate-limit wait.
const MAX_RETRY_WAIT: Duration = Duration::from_secs(60);

/// Message body accepted by `POST /channels/{id}/messages`.
#[derive(Debug, Serialize)]
pub struct MessagePayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub footer: EmbedFooter,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct EmbedFooter {
    pub text: String,
}

/// Body of a 429 response.
#[derive(Debug, Deserialize)]
struct RateLimited {
    /// Seconds until the bucket resets
    retry_after: f64,
}

/// How long Discord asks us to back off. The JSON body is more precise
/// than the header, so it wins when both are present.
async fn retry_delay(response: Response) -> Duration {
    let header = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok());
    let body = response
        .json::<RateLimited>()
        .await
        .ok()
        .map(|r| r.retry_after);

    body.or(header)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .map_or(DEFAULT_RETRY_WAIT, |wait| wait.min(MAX_RETRY_WAIT))
}

/// Render an announcement as an embed.
pub fn render_embed(announcement: &Announcement) -> Embed {
    Embed {
        title: announcement.title.clone(),
        description: truncate_body(&announcement.body).into_owned(),
        color: EMBED_COLOR,
        timestamp: announcement.published_at().map(|t| t.to_rfc3339()),
        footer: EmbedFooter {
            text: announcement.footer(),
        },
    }
}

/// Posts announcements to a single Discord channel.
pub struct DiscordNotifier {
    client: Client,
    messages_url: Url,
    authorization: String,
}

impl DiscordNotifier {
    pub fn new(config: &DiscordConfig) -> Result<Self> {
        let messages_url = join_url(
            &config.api_base,
            &format!("channels/{}/messages", config.channel_id.trim()),
        )?;

        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            messages_url,
            authorization: format!("Bot {}", config.token.trim()),
        })
    }

    async fn post(&self, announcement: &Announcement) -> Result<()> {
        let payload = MessagePayload {
            embeds: vec![render_embed(announcement)],
        };

        let mut attempt = 1;
        loop {
            let response = self
                .client
                .post(self.messages_url.clone())
                .header(AUTHORIZATION, &self.authorization)
                .json(&payload)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_ATTEMPTS {
                let wait = retry_delay(response).await;
                log::warn!(
                    "Rate limited posting '{}', retrying in {:?} ({}/{})",
                    announcement.title,
                    wait,
                    attempt,
                    MAX_ATTEMPTS
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }

            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::notify(
                &announcement.title,
                format!("Discord answered {status} after {attempt} attempts: {detail}"),
            ));
        }
    }
}

#[async_trait]
impl AnnouncementListener for DiscordNotifier {
    async fn update(&self, announcements: &[Announcement]) -> Result<()> {
        let mut failures = 0;

        // Sequential so the channel shows announcements in feed order
        for announcement in announcements {
            if let Err(e) = self.post(announcement).await {
                failures += 1;
                log::warn!("Failed to post '{}': {}", announcement.title, e);
            }
        }

        if failures > 0 {
            return Err(AppError::notify(
                "discord",
                format!("{failures} of {} messages failed", announcements.len()),
            ));
        }
        log::info!("Posted {} announcements to Discord", announcements.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "discord"
    }
}
