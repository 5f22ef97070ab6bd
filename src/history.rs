// SPDX-License-Identifier: GPL-3.0-only

//! In-memory scan history
//!
//! Newest entries first, bounded to a maximum size. Exported as
//! `{"exported_at": …, "count": …, "items": […]}`.

use crate::constants::history::DEFAULT_MAX_ITEMS;
use crate::frame_processor::ScanPayload;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};

/// One remembered scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryItem {
    pub id: String,
    pub data: ScanPayload,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// `"text"` or `"object"`
    #[serde(rename = "type")]
    pub kind: String,
    /// Caller-supplied fields stored alongside the scan
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ScanHistory {
    items: Vec<HistoryItem>,
    max_items: usize,
}

impl Default for ScanHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITEMS)
    }
}

impl ScanHistory {
    /// History keeping at most `max_items` entries, never fewer than one
    pub fn new(max_items: usize) -> Self {
        Self {
            items: Vec::new(),
            max_items: max_items.max(1),
        }
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Record a scan, dropping the oldest entries beyond the limit
    pub fn add(&mut self, data: ScanPayload, metadata: Map<String, Value>) -> &HistoryItem {
        self.add_at(data, metadata, Utc::now())
    }

    pub fn add_at(
        &mut self,
        data: ScanPayload,
        metadata: Map<String, Value>,
        at: DateTime<Utc>,
    ) -> &HistoryItem {
        let item = HistoryItem {
            id: uuid::Uuid::new_v4().to_string(),
            kind: data.kind().to_string(),
            data,
            timestamp: at.timestamp_millis(),
            metadata,
        };
        self.items.insert(0, item);
        self.items.truncate(self.max_items);
        &self.items[0]
    }

    /// Remove an entry by id; returns whether it existed
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn by_kind(&self, kind: &str) -> Vec<&HistoryItem> {
        self.items.iter().filter(|item| item.kind == kind).collect()
    }

    /// Case-insensitive substring search; an empty term matches everything
    pub fn search(&self, term: &str) -> Vec<&HistoryItem> {
        let term = term.to_lowercase();
        self.items
            .iter()
            .filter(|item| term.is_empty() || item.data.to_text().to_lowercase().contains(&term))
            .collect()
    }

    pub fn export(&self) -> Value {
        self.export_at(Utc::now())
    }

    pub fn export_at(&self, at: DateTime<Utc>) -> Value {
        json!({
            "exported_at": at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "count": self.items.len(),
            "items": self.items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str) -> ScanPayload {
        ScanPayload::Raw(text.to_string())
    }

    #[test]
    fn test_newest_first_and_bounded() {
        let mut history = ScanHistory::new(2);
        history.add(raw("one"), Map::new());
        history.add(raw("two"), Map::new());
        history.add(raw("three"), Map::new());

        let texts: Vec<String> = history.items().iter().map(|i| i.data.to_text()).collect();
        assert_eq!(texts, vec!["three", "two"]);
    }

    #[test]
    fn test_zero_limit_keeps_latest() {
        let mut history = ScanHistory::new(0);
        assert_eq!(history.max_items(), 1);

        assert_eq!(history.add(raw("one"), Map::new()).data, raw("one"));
        assert_eq!(history.add(raw("two"), Map::new()).data, raw("two"));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_remove_by_id() {
        let mut history = ScanHistory::default();
        let id = history.add(raw("one"), Map::new()).id.clone();
        assert!(history.remove(&id));
        assert!(!history.remove(&id));
        assert!(history.is_empty());
    }

    #[test]
    fn test_search_covers_structured_data() {
        let mut history = ScanHistory::default();
        history.add(ScanPayload::from_text(r#"{"exam_id":"MATH-101"}"#), Map::new());
        history.add(raw("Physics"), Map::new());

        assert_eq!(history.search("math").len(), 1);
        assert_eq!(history.search("PHYSICS").len(), 1);
        assert_eq!(history.search("").len(), 2);
        assert_eq!(history.by_kind("object").len(), 1);
    }

    #[test]
    fn test_metadata_is_flattened_into_items() {
        let mut history = ScanHistory::default();
        let mut metadata = Map::new();
        metadata.insert("device".to_string(), json!("/dev/video0"));
        history.add(raw("x"), metadata);

        let export = history.export();
        assert_eq!(export["count"], 1);
        assert_eq!(export["items"][0]["device"], "/dev/video0");
        assert_eq!(export["items"][0]["type"], "text");
        assert_eq!(export["items"][0]["data"], "x");
    }
}
