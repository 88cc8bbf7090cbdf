// src/services/source.rs

//! Announcement stream sources.
//!
//! A source hands back the raw `loadStream` JSON. Parsing happens in the
//! poller so every source fails the same way on a bad payload.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, CACHE_CONTROL, COOKIE};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{BlackboardConfig, SourceConfig};
use crate::utils::{http, join_url};

/// Path of the stream endpoint below the Blackboard root.
const STREAM_PATH: &str = "webapps/streamViewer/streamViewer";

/// Form fields requesting the alerts stream.
const STREAM_FORM: [(&str, &str); 4] = [
    ("cmd", "loadStream"),
    ("streamName", "alerts"),
    ("providers", "{}"),
    ("forOverview", "false"),
];

/// Producer of raw stream payloads.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Fetch the current stream as a JSON string.
    async fn fetch(&self) -> Result<String>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Build the source selected in the configuration.
pub fn from_config(config: &SourceConfig) -> Result<Box<dyn StreamSource>> {
    match config {
        SourceConfig::Blackboard(bb) => Ok(Box::new(BlackboardSource::new(bb)?)),
        SourceConfig::File { path } => Ok(Box::new(FileSource::new(path))),
    }
}

/// Reads a saved payload from disk on every fetch.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StreamSource for FileSource {
    async fn fetch(&self) -> Result<String> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Pulls the alerts stream from a Blackboard instance using an existing
/// session cookie.
///
/// The endpoint answers the first request of a session with an empty
/// stream, so every fetch sends the same request twice and keeps the
/// second answer.
pub struct BlackboardSource {
    client: Client,
    endpoint: Url,
    cookie: String,
    settle_delay: Duration,
}

impl BlackboardSource {
    pub fn new(config: &BlackboardConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(config)?,
            endpoint: join_url(&config.base_url, STREAM_PATH)?,
            cookie: config.cookie.clone(),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        })
    }

    async fn load_stream(&self) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "*/*")
            .header(CACHE_CONTROL, "no-cache")
            .header("X-Requested-With", "XMLHttpRequest")
            .header(COOKIE, &self.cookie)
            .form(&STREAM_FORM)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(
                self.endpoint.as_str(),
                format!("unexpected status {status}"),
            ));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl StreamSource for BlackboardSource {
    async fn fetch(&self) -> Result<String> {
        let primed = self.load_stream().await?;
        log::debug!("Priming request returned {} bytes", primed.len());

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        self.load_stream().await
    }

    fn describe(&self) -> String {
        format!("blackboard {}", self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_source_reads_payload() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stream.json");
        std::fs::write(&path, r#"{"sv_streamEntries": []}"#).unwrap();

        let source = FileSource::new(&path);
        assert_eq!(source.fetch().await.unwrap(), r#"{"sv_streamEntries": []}"#);
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = FileSource::new("/nonexistent/stream.json");
        assert!(matches!(source.fetch().await, Err(AppError::Io(_))));
    }

    #[test]
    fn test_blackboard_endpoint() {
        let config = BlackboardConfig {
            base_url: "https://lms.example.com/".into(),
            cookie: "JSESSIONID=1".into(),
            ..BlackboardConfig::default()
        };
        let source = BlackboardSource::new(&config).unwrap();
        assert_eq!(
            source.endpoint.as_str(),
            "https://lms.example.com/webapps/streamViewer/streamViewer"
        );
        assert!(source.describe().starts_with("blackboard "));
    }

    #[test]
    fn test_from_config_file() {
        let source = from_config(&SourceConfig::File {
            path: "fixtures/stream.json".into(),
        })
        .unwrap();
        assert_eq!(source.describe(), "file fixtures/stream.json");
    }
}
