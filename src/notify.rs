//! Delivery of posts and stories to a chat, with cleanup of staged files.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::locale::{self, Key, Lang};
use crate::messenger::{ChatRef, Messenger};
use crate::model::{ContentItem, MediaKind, StoryItem};

/// Decides which like/comment counts are shown as "hidden".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountPolicy {
    pub hidden_max: i64,
}

impl Default for CountPolicy {
    fn default() -> Self {
        Self { hidden_max: 3 }
    }
}

impl CountPolicy {
    /// Negative counts are the platform's "owner hid this" marker.
    pub fn is_hidden(&self, count: i64) -> bool {
        count <= self.hidden_max
    }

    pub fn render(&self, lang: Lang, count: i64, hidden: Key, shown: Key) -> String {
        if self.is_hidden(count) {
            locale::text(lang, hidden).to_string()
        } else {
            locale::format(lang, shown, &[("count", &count.to_string())])
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub sent: usize,
    pub failed: usize,
}

impl Delivery {
    /// Whether anything at all reached the chat.
    pub fn reached(&self) -> bool {
        self.sent > 0
    }

    fn record(&mut self, ok: bool) {
        if ok {
            self.sent += 1;
        } else {
            self.failed += 1;
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    messenger: Arc<dyn Messenger>,
    policy: CountPolicy,
}

impl Notifier {
    pub fn new(messenger: Arc<dyn Messenger>, policy: CountPolicy) -> Self {
        Self { messenger, policy }
    }

    pub fn messenger(&self) -> &Arc<dyn Messenger> {
        &self.messenger
    }

    /// Caption text sent after a post's media.
    pub fn format_caption(&self, lang: Lang, header: Option<&str>, item: &ContentItem) -> String {
        let mut lines = Vec::with_capacity(4);
        if let Some(header) = header {
            lines.push(header.to_string());
        }
        lines.push(self.policy.render(lang, item.like_count, Key::LikesHidden, Key::Likes));
        lines.push(self.policy.render(lang, item.comment_count, Key::CommentsHidden, Key::Comments));
        if !item.caption.trim().is_empty() {
            lines.push(format!("📄 {}", item.caption));
        }
        lines.join("\n")
    }

    /// Send every media file of `item`, then its caption, then remove the
    /// staged files whatever the outcome.
    #[instrument(skip_all, fields(chat = chat, item = %item.id))]
    pub async fn dispatch_post(
        &self,
        chat: ChatRef,
        lang: Lang,
        header: Option<&str>,
        item: &ContentItem,
    ) -> Delivery {
        let mut delivery = Delivery::default();
        for media in &item.media {
            delivery.record(self.send_media(chat, media.kind, &media.path).await);
        }
        let caption = self.format_caption(lang, header, item);
        match self.messenger.send_text(chat, &caption, None).await {
            Ok(_) => delivery.record(true),
            Err(err) => {
                warn!(?err, "failed to send caption");
                delivery.record(false);
            }
        }
        discard_item(item).await;
        delivery
    }

    /// Send each story, remove its file, then drop the staging directories.
    #[instrument(skip_all, fields(chat = chat, count = stories.len()))]
    pub async fn dispatch_stories(
        &self,
        chat: ChatRef,
        header: Option<&str>,
        stories: &[StoryItem],
    ) -> Delivery {
        let mut delivery = Delivery::default();
        if stories.is_empty() {
            return delivery;
        }
        if let Some(header) = header {
            if let Err(err) = self.messenger.send_text(chat, header, None).await {
                warn!(?err, "failed to send stories header");
            }
        }
        for story in stories {
            delivery.record(self.send_media(chat, story.kind, &story.path).await);
            remove_staged_file(&story.path).await;
        }
        let dirs: BTreeSet<PathBuf> = stories
            .iter()
            .filter_map(|s| s.path.parent().map(Path::to_path_buf))
            .collect();
        for dir in dirs {
            remove_staging_dir(&dir).await;
        }
        delivery
    }

    async fn send_media(&self, chat: ChatRef, kind: MediaKind, path: &Path) -> bool {
        let res = match kind {
            MediaKind::Photo => self.messenger.send_photo(chat, path).await,
            MediaKind::Video => self.messenger.send_video(chat, path).await,
        };
        match res {
            Ok(_) => true,
            Err(err) => {
                warn!(?err, path=%path.display(), kind = kind.as_str(), "failed to send media");
                false
            }
        }
    }
}

/// Drop the staged media of an item that will not be delivered.
pub async fn discard_item(item: &ContentItem) {
    for media in &item.media {
        remove_staged_file(&media.path).await;
    }
}

async fn remove_staged_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path=%path.display(), "removed staged file"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(?err, path=%path.display(), "failed to remove staged file"),
    }
}

async fn remove_staging_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(dir=%dir.display(), "removed staging dir"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(?err, dir=%dir.display(), "failed to remove staging dir"),
    }
}
