use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

/// Telegram user id; in private chats it doubles as the chat id.
pub type OwnerId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }

    pub fn parse_kind(s: &str) -> Option<Self> {
        match s {
            "photo" | "image" => Some(MediaKind::Photo),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Video => "mp4",
        }
    }
}

/// Content-source item id.
///
/// Ids made only of ASCII digits are compared numerically and sort before any
/// other id; everything else compares lexicographically. Newer items compare
/// greater.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<&str> {
        if !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit()) {
            let trimmed = self.0.trim_start_matches('0');
            Some(if trimmed.is_empty() { "0" } else { trimmed })
        } else {
            None
        }
    }
}

impl Ord for ItemId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a
                .len()
                .cmp(&b.len())
                .then_with(|| a.cmp(b))
                .then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ItemId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    pub owner_id: OwnerId,
    pub target: String,
    pub cursor: Option<ItemId>,
}

impl Subscription {
    pub fn new(owner_id: OwnerId, target: impl Into<String>) -> Self {
        Self {
            owner_id,
            target: target.into(),
            cursor: None,
        }
    }

    /// Whether `id` has not been delivered yet for this subscription.
    pub fn is_new(&self, id: &ItemId) -> bool {
        self.cursor.as_ref().map_or(true, |cursor| id > cursor)
    }
}

/// A staged media file waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub path: PathBuf,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub id: ItemId,
    pub media: Vec<MediaRef>,
    pub like_count: i64,
    pub comment_count: i64,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryItem {
    pub id: ItemId,
    pub path: PathBuf,
    pub kind: MediaKind,
    pub taken_at: DateTime<Utc>,
}
