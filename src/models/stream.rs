// src/models/stream.rs

//! Blackboard stream payload.
//!
//! The `loadStream` endpoint answers with a JSON object whose
//! `sv_streamEntries` array holds one object per stream entry. Course
//! names live separately under `sv_extras.sx_courses`.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::Result;

/// Top-level `loadStream` response.
#[derive(Debug, Default, Deserialize)]
pub struct StreamPayload {
    #[serde(rename = "sv_streamEntries", default)]
    pub entries: Vec<StreamEntry>,

    #[serde(rename = "sv_extras", default)]
    pub extras: StreamExtras,
}

/// A single stream entry as emitted by the feed.
#[derive(Debug, Default, Deserialize)]
pub struct StreamEntry {
    #[serde(rename = "se_id", default)]
    pub id: Option<String>,

    #[serde(rename = "se_courseId", default)]
    pub course_id: Option<String>,

    #[serde(rename = "se_timestamp", default)]
    pub timestamp: Option<i64>,

    #[serde(rename = "itemSpecificData", default)]
    pub item: Option<ItemData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemData {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(rename = "notificationDetails", default)]
    pub details: Option<NotificationDetails>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationDetails {
    #[serde(rename = "announcementBody", default)]
    pub body: Option<String>,

    #[serde(rename = "announcementFirstName", default)]
    pub first_name: Option<String>,

    #[serde(rename = "announcementLastName", default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamExtras {
    #[serde(rename = "sx_courses", default)]
    pub courses: Vec<Course>,
}

/// Course lookup entry. Either field may be missing or null in the feed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Course {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Flattened view of a stream entry, ready for ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    /// Body as delivered by the feed (HTML)
    pub body: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub timestamp: i64,
}

impl StreamPayload {
    /// Parse a raw `loadStream` response. Any syntax or type error fails
    /// the whole payload.
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Flatten every entry, resolving course names.
    pub fn into_raw_entries(self) -> Vec<RawEntry> {
        let courses: HashMap<String, String> = self
            .extras
            .courses
            .into_iter()
            .filter_map(|c| Some((c.id?, c.name?)))
            .collect();

        self.entries
            .into_iter()
            .map(|entry| entry.flatten(&courses))
            .collect()
    }
}

impl StreamEntry {
    fn flatten(self, courses: &HashMap<String, String>) -> RawEntry {
        let subject = self
            .course_id
            .as_ref()
            .and_then(|id| courses.get(id))
            .cloned();
        let (title, details) = match self.item {
            Some(item) => (item.title, item.details),
            None => (None, None),
        };
        let (body, author) = match details {
            Some(d) => {
                let author = author_name(d.first_name.as_deref(), d.last_name.as_deref());
                (d.body, author)
            }
            None => (None, None),
        };

        RawEntry {
            id: self.id,
            title,
            body,
            author,
            subject,
            timestamp: self.timestamp.unwrap_or_default(),
        }
    }
}

fn author_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    let name = [first.unwrap_or(""), last.unwrap_or("")]
        .join(" ")
        .trim()
        .to_string();
    (!name.is_empty()).then_some(name)
}

/// Parse a payload straight into raw entries.
pub fn parse_entries(json: &str) -> Result<Vec<RawEntry>> {
    Ok(StreamPayload::parse(json)?.into_raw_entries())
}
