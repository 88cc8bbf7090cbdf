// src/services/store.rs

//! Announcement store.
//!
//! Keeps every announcement ever seen, in the order it was first observed.
//! Titles are the identity key: a second entry with a known title is
//! dropped even if its body or timestamp differ.

use std::collections::HashSet;

use chrono::Utc;

use crate::models::{Announcement, RawEntry, UNKNOWN_AUTHOR};
use crate::storage::StoreSnapshot;
use crate::utils::text::html_to_text;

/// In-memory set of seen announcements with per-entry read flags.
#[derive(Debug, Default)]
pub struct AnnouncementStore {
    announcements: Vec<Announcement>,
    titles: HashSet<String>,
}

impl AnnouncementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a saved snapshot. Later duplicates of a title
    /// are discarded so the uniqueness invariant holds for any input.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut store = Self::new();
        for announcement in snapshot.announcements {
            store.insert(announcement);
        }
        store
    }

    /// Capture the current contents for persistence.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            updated_at: Utc::now(),
            announcements: self.announcements.clone(),
        }
    }

    /// Add every entry whose title has not been seen yet.
    ///
    /// Entries without a title or body are skipped. Returns the number of
    /// announcements inserted.
    pub fn ingest(&mut self, entries: &[RawEntry]) -> usize {
        let mut inserted = 0;

        for entry in entries {
            let (Some(title), Some(body)) = (&entry.title, &entry.body) else {
                log::debug!("Skipping stream entry {:?}: no title or body", entry.id);
                continue;
            };
            if self.titles.contains(title) {
                continue;
            }

            let announcement = Announcement {
                id: entry.id.clone().unwrap_or_default(),
                title: title.clone(),
                body: html_to_text(body),
                author: entry
                    .author
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
                subject: entry.subject.clone(),
                timestamp: entry.timestamp,
                read: false,
            };

            if self.insert(announcement) {
                inserted += 1;
            }
        }

        inserted
    }

    /// Return all unread announcements in insertion order and mark them read.
    ///
    /// A second call without an ingest in between returns nothing.
    pub fn get_unread(&mut self) -> Vec<Announcement> {
        self.announcements
            .iter_mut()
            .filter(|a| a.is_unread())
            .map(Announcement::mark_read)
            .collect()
    }

    /// Check for unread announcements without changing any flag.
    pub fn has_unread(&self) -> bool {
        self.announcements.iter().any(Announcement::is_unread)
    }

    /// All stored announcements, oldest first.
    pub fn announcements(&self) -> &[Announcement] {
        &self.announcements
    }

    pub fn len(&self) -> usize {
        self.announcements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.announcements.is_empty()
    }

    fn insert(&mut self, announcement: Announcement) -> bool {
        if !self.titles.insert(announcement.title.clone()) {
            return false;
        }
        self.announcements.push(announcement);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, body: &str) -> RawEntry {
        RawEntry {
            id: Some(format!("id-{title}")),
            title: Some(title.to_string()),
            body: Some(body.to_string()),
            author: Some("Kari".to_string()),
            subject: None,
            timestamp: 1_000,
        }
    }

    #[test]
    fn test_same_entry_twice_is_stored_once() {
        let mut store = AnnouncementStore::new();
        assert_eq!(store.ingest(&[entry("A", "body")]), 1);
        assert_eq!(store.ingest(&[entry("A", "body")]), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_title_keeps_first_body() {
        let mut store = AnnouncementStore::new();
        let inserted = store.ingest(&[
            entry("A", "first"),
            entry("B", "other"),
            entry("A", "changed"),
        ]);

        assert_eq!(inserted, 2);
        let titles: Vec<_> = store.announcements().iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["A", "B"]);
        assert_eq!(store.announcements()[0].body, "first");
    }

    #[test]
    fn test_titles_are_case_sensitive() {
        let mut store = AnnouncementStore::new();
        assert_eq!(store.ingest(&[entry("Exam", "x"), entry("exam", "y")]), 2);
    }

    #[test]
    fn test_entries_without_title_or_body_are_skipped() {
        let mut store = AnnouncementStore::new();
        let no_body = RawEntry {
            body: None,
            ..entry("No body", "")
        };
        let no_title = RawEntry {
            title: None,
            ..entry("", "orphan body")
        };

        assert_eq!(store.ingest(&[no_body, no_title]), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_unread_marks_read() {
        let mut store = AnnouncementStore::new();
        store.ingest(&[entry("A", "a"), entry("B", "b")]);
        assert!(store.has_unread());

        let unread = store.get_unread();
        assert_eq!(unread.len(), 2);
        assert!(unread.iter().all(|a| a.read));
        assert!(!store.has_unread());
        assert!(store.get_unread().is_empty());
    }

    #[test]
    fn test_has_unread_has_no_side_effect() {
        let mut store = AnnouncementStore::new();
        store.ingest(&[entry("A", "a")]);
        assert!(store.has_unread());
        assert!(store.has_unread());
        assert_eq!(store.get_unread().len(), 1);
    }

    #[test]
    fn test_only_new_entries_are_unread() {
        let mut store = AnnouncementStore::new();
        store.ingest(&[entry("A", "a")]);
        store.get_unread();

        store.ingest(&[entry("A", "a"), entry("C", "c")]);
        let unread = store.get_unread();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].title, "C");
    }

    #[test]
    fn test_body_is_stripped_and_author_defaulted() {
        let mut store = AnnouncementStore::new();
        let raw = RawEntry {
            author: None,
            ..entry("Html", "<p>Line <b>one</b></p><p>Line two</p>")
        };
        store.ingest(&[raw]);

        let stored = &store.announcements()[0];
        assert_eq!(stored.body, "Line one\nLine two");
        assert_eq!(stored.author, UNKNOWN_AUTHOR);
        assert_eq!(stored.id, "id-Html");
    }

    #[test]
    fn test_snapshot_round_trip_keeps_flags() {
        let mut store = AnnouncementStore::new();
        store.ingest(&[entry("A", "a")]);
        store.get_unread();
        store.ingest(&[entry("B", "b")]);

        let restored = AnnouncementStore::from_snapshot(store.snapshot());
        assert_eq!(restored.len(), 2);
        assert!(restored.announcements()[0].read);
        assert!(!restored.announcements()[1].read);
    }

    #[test]
    fn test_from_snapshot_drops_duplicate_titles() {
        let snapshot = StoreSnapshot {
            updated_at: Utc::now(),
            announcements: vec![
                Announcement::new("A", "one", 1),
                Announcement::new("A", "two", 2),
            ],
        };
        let store = AnnouncementStore::from_snapshot(snapshot);
        assert_eq!(store.len(), 1);
        assert_eq!(store.announcements()[0].body, "one");
    }
}
