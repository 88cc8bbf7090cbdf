// src/models/announcement.rs

//! Announcement data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An announcement posted to a course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Announcement {
    /// Stream entry identifier (empty if the source did not provide one)
    #[serde(default)]
    pub id: String,

    /// Announcement title, unique within a store
    pub title: String,

    /// Plain text body
    pub body: String,

    /// Display name of the poster
    pub author: String,

    /// Course the announcement belongs to
    #[serde(default)]
    pub subject: Option<String>,

    /// Publication time in epoch milliseconds
    pub timestamp: i64,

    /// Whether the announcement has been handed to subscribers
    #[serde(default)]
    pub read: bool,
}

impl Announcement {
    /// Create a new, unread announcement.
    pub fn new(title: impl Into<String>, body: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            body: body.into(),
            author: UNKNOWN_AUTHOR.to_string(),
            subject: None,
            timestamp,
            read: false,
        }
    }

    /// Whether the announcement has not been delivered yet.
    pub fn is_unread(&self) -> bool {
        !self.read
    }

    /// Mark as read and hand back a copy for delivery.
    pub(crate) fn mark_read(&mut self) -> Self {
        self.read = true;
        self.clone()
    }

    /// Publication time as a UTC date, if the timestamp is in range.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Footer line shown under a rendered announcement.
    pub fn footer(&self) -> String {
        match &self.subject {
            Some(subject) if !subject.is_empty() => format!("{} - {}", self.author, subject),
            _ => self.author.clone(),
        }
    }
}

/// Author name used when a stream entry carries none.
pub const UNKNOWN_AUTHOR: &str = "unknown";
