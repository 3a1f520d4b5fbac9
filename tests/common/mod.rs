#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use insta_watchbot::conversation::Conversation;
use insta_watchbot::db::Pool;
use insta_watchbot::locale::Lang;
use insta_watchbot::messenger::{ChatRef, Keyboard, MessageRef, Messenger};
use insta_watchbot::model::{ContentItem, ItemId, MediaKind, MediaRef, StoryItem};
use insta_watchbot::notify::{CountPolicy, Notifier};
use insta_watchbot::session::Sessions;
use insta_watchbot::source::{ContentSource, SourceError};
use insta_watchbot::sync::SyncEngine;

pub async fn setup_pool() -> Pool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat: ChatRef,
        id: MessageRef,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Photo {
        chat: ChatRef,
        path: PathBuf,
    },
    Video {
        chat: ChatRef,
        path: PathBuf,
    },
    Edit {
        chat: ChatRef,
        id: MessageRef,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Delete {
        chat: ChatRef,
        id: MessageRef,
    },
}

/// Messenger fake that records every outbound call.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicI32,
    pub fail_media: AtomicBool,
    pub fail_edits: AtomicBool,
    /// Every call fails, as during a Telegram outage.
    pub fail_all: AtomicBool,
}

impl RecordingMessenger {
    pub async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }

    pub async fn texts(&self) -> Vec<String> {
        self.sent()
            .await
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub async fn last_text(&self) -> Option<String> {
        self.texts().await.pop()
    }

    /// Keyboard of the newest text or edit carrying one.
    pub async fn last_keyboard(&self) -> Option<Keyboard> {
        self.sent().await.into_iter().rev().find_map(|s| match s {
            Sent::Text { keyboard, .. } | Sent::Edit { keyboard, .. } => keyboard,
            _ => None,
        })
    }

    pub async fn media(&self) -> Vec<PathBuf> {
        self.sent()
            .await
            .into_iter()
            .filter_map(|s| match s {
                Sent::Photo { path, .. } | Sent::Video { path, .. } => Some(path),
                _ => None,
            })
            .collect()
    }

    fn down(&self) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(anyhow!("telegram unreachable"));
        }
        Ok(())
    }

    fn next(&self) -> MessageRef {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat: ChatRef, text: &str, keyboard: Option<&Keyboard>) -> Result<MessageRef> {
        self.down()?;
        let id = self.next();
        self.sent.lock().await.push(Sent::Text {
            chat,
            id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(id)
    }

    async fn send_photo(&self, chat: ChatRef, path: &Path) -> Result<MessageRef> {
        self.down()?;
        self.sent.lock().await.push(Sent::Photo {
            chat,
            path: path.to_path_buf(),
        });
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(anyhow!("photo upload rejected"));
        }
        Ok(self.next())
    }

    async fn send_video(&self, chat: ChatRef, path: &Path) -> Result<MessageRef> {
        self.down()?;
        self.sent.lock().await.push(Sent::Video {
            chat,
            path: path.to_path_buf(),
        });
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(anyhow!("video upload rejected"));
        }
        Ok(self.next())
    }

    async fn edit_text(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        self.down()?;
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(anyhow!("message is not modified"));
        }
        self.sent.lock().await.push(Sent::Edit {
            chat,
            id: message,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn delete_message(&self, chat: ChatRef, message: MessageRef) -> Result<()> {
        self.down()?;
        self.sent.lock().await.push(Sent::Delete { chat, id: message });
        Ok(())
    }
}

/// Content source fake driven by per-target scripts.
///
/// Posts are listed newest first and returned whole by `new_items_since`,
/// ignoring the cursor, so callers must do their own filtering.
#[derive(Default)]
pub struct ScriptedSource {
    posts: Mutex<HashMap<String, Vec<ContentItem>>>,
    stories: Mutex<HashMap<String, Vec<StoryItem>>>,
    missing: Mutex<HashSet<String>>,
    broken: Mutex<HashSet<String>>,
    newer_than_seen: Mutex<Vec<Option<DateTime<Utc>>>>,
    expiries: AtomicUsize,
    pub logins: AtomicUsize,
}

impl ScriptedSource {
    pub async fn set_posts(&self, target: &str, items: Vec<ContentItem>) {
        self.posts.lock().await.insert(target.to_string(), items);
    }

    pub async fn set_stories(&self, target: &str, items: Vec<StoryItem>) {
        self.stories.lock().await.insert(target.to_string(), items);
    }

    pub async fn set_missing(&self, target: &str) {
        self.missing.lock().await.insert(target.to_string());
    }

    pub async fn set_broken(&self, target: &str) {
        self.broken.lock().await.insert(target.to_string());
    }

    /// The next `n` data calls fail with an expired session.
    pub fn expire_sessions(&self, n: usize) {
        self.expiries.store(n, Ordering::SeqCst);
    }

    pub async fn newer_than_seen(&self) -> Vec<Option<DateTime<Utc>>> {
        self.newer_than_seen.lock().await.clone()
    }

    async fn gate(&self, target: &str) -> Result<(), SourceError> {
        let expired = self
            .expiries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if expired {
            return Err(SourceError::AuthExpired);
        }
        if self.missing.lock().await.contains(target) {
            return Err(SourceError::TargetNotFound(target.to_string()));
        }
        if self.broken.lock().await.contains(target) {
            return Err(SourceError::transient("gateway returned 502"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentSource for ScriptedSource {
    async fn authenticate(&self) -> Result<(), SourceError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn item_count(&self, target: &str) -> Result<u64, SourceError> {
        self.gate(target).await?;
        let posts = self.posts.lock().await;
        Ok(posts.get(target).map_or(0, |p| p.len() as u64))
    }

    async fn new_items_since(
        &self,
        target: &str,
        _cursor: Option<&ItemId>,
        newer_than: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContentItem>, SourceError> {
        self.gate(target).await?;
        self.newer_than_seen.lock().await.push(newer_than);
        let posts = self.posts.lock().await;
        Ok(posts.get(target).cloned().unwrap_or_default())
    }

    async fn item_at(&self, target: &str, index: u64) -> Result<Option<ContentItem>, SourceError> {
        self.gate(target).await?;
        let posts = self.posts.lock().await;
        Ok(posts
            .get(target)
            .and_then(|p| p.get(index as usize))
            .cloned())
    }

    async fn ephemeral_items(&self, target: &str) -> Result<Vec<StoryItem>, SourceError> {
        self.gate(target).await?;
        let stories = self.stories.lock().await;
        Ok(stories.get(target).cloned().unwrap_or_default())
    }
}

/// A post whose caption is its id, without media.
pub fn post(id: &str) -> ContentItem {
    ContentItem {
        id: ItemId::from(id),
        media: vec![],
        like_count: 10,
        comment_count: 1,
        caption: format!("post {id}"),
    }
}

/// A post with one photo staged as a real file under `dir`.
pub fn staged_post(dir: &Path, id: &str) -> ContentItem {
    let path = dir.join(format!("{id}.jpg"));
    std::fs::write(&path, b"jpeg").unwrap();
    ContentItem {
        media: vec![MediaRef {
            path,
            kind: MediaKind::Photo,
        }],
        ..post(id)
    }
}

/// Stories staged in a fresh sub-directory of `dir`, like one real fetch.
pub fn staged_stories(dir: &Path, target: &str, ids: &[&str]) -> (PathBuf, Vec<StoryItem>) {
    let staging = dir.join(format!("{target}-stories"));
    std::fs::create_dir_all(&staging).unwrap();
    let stories = ids
        .iter()
        .map(|id| {
            let path = staging.join(format!("{id}.mp4"));
            std::fs::write(&path, b"mp4").unwrap();
            StoryItem {
                id: ItemId::from(*id),
                path,
                kind: MediaKind::Video,
                taken_at: Utc::now(),
            }
        })
        .collect();
    (staging, stories)
}

pub const BLOCKED: [&str; 2] = ["lncemep", "crazyportes"];

pub struct Harness {
    pub pool: Pool,
    pub source: Arc<ScriptedSource>,
    pub messenger: Arc<RecordingMessenger>,
    pub sessions: Arc<Sessions>,
    pub engine: Arc<SyncEngine>,
    pub conversation: Conversation,
}

pub async fn harness_with(lang: Option<Lang>) -> Harness {
    let pool = setup_pool().await;
    let source = Arc::new(ScriptedSource::default());
    let messenger = Arc::new(RecordingMessenger::default());
    let sessions = Arc::new(Sessions::new(lang));
    let notifier = Notifier::new(messenger.clone(), CountPolicy::default());
    let engine = Arc::new(SyncEngine::new(
        pool.clone(),
        source.clone(),
        notifier.clone(),
        sessions.clone(),
        Some(chrono::Duration::hours(24)),
    ));
    let conversation = Conversation::new(
        pool.clone(),
        source.clone(),
        notifier,
        sessions.clone(),
        engine.clone(),
        BLOCKED.iter().map(|s| s.to_string()).collect(),
    );
    Harness {
        pool,
        source,
        messenger,
        sessions,
        engine,
        conversation,
    }
}

pub async fn harness() -> Harness {
    harness_with(Some(Lang::En)).await
}
