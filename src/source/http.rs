use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::model::{
    LoginReq, LoginResp, PostsResp, ProfileResp, StoriesResp, WireMedia, WirePost,
};
use super::{ContentSource, SourceError};
use crate::config::Config;
use crate::model::{ContentItem, ItemId, MediaKind, MediaRef, StoryItem};

/// Posts requested per feed page while scanning for new items.
const PAGE_SIZE: u64 = 50;

/// Client for the content-source JSON gateway.
pub struct HttpContentSource {
    http: Client,
    base_url: Url,
    username: String,
    password: String,
    session_file: PathBuf,
    temp_dir: PathBuf,
    token: RwLock<Option<String>>,
}

impl fmt::Debug for HttpContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpContentSource")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl HttpContentSource {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.source.base_url).context("invalid source.base_url")?;
        let http = Client::builder()
            .user_agent("insta-watchbot/0.1")
            .timeout(Duration::from_secs(cfg.source.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        let session_file = Path::new(&cfg.source.session_dir)
            .join(format!("session-{}", cfg.source.username.to_lowercase()));
        Ok(Self {
            http,
            base_url,
            username: cfg.source.username.clone(),
            password: cfg.source.password.clone(),
            session_file,
            temp_dir: PathBuf::from(&cfg.app.temp_dir),
            token: RwLock::new(None),
        })
    }

    /// Reuse a saved session token when one exists, otherwise log in.
    pub async fn restore_or_login(&self) -> Result<(), SourceError> {
        match tokio::fs::read_to_string(&self.session_file).await {
            Ok(token) if !token.trim().is_empty() => {
                info!(file=%self.session_file.display(), "restored content source session");
                *self.token.write().await = Some(token.trim().to_string());
                Ok(())
            }
            Ok(_) | Err(_) => {
                info!(file=%self.session_file.display(), "no saved session; logging in");
                self.authenticate().await
            }
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, SourceError> {
        self.base_url.join(path).map_err(SourceError::transient)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        target: &str,
    ) -> Result<T, SourceError> {
        let token = self.token.read().await.clone().ok_or(SourceError::AuthExpired)?;
        let res = self
            .http
            .get(self.endpoint(path)?)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        let res = check_status(res, target).await?;
        let body = res.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            SourceError::Transient(format!("invalid gateway response for {}: {}", path, e))
        })
    }

    async fn profile(&self, target: &str) -> Result<ProfileResp, SourceError> {
        self.get_json(&profile_path(target, "")?, &[], target).await
    }

    async fn list_posts(&self, target: &str, offset: u64, limit: u64) -> Result<Vec<WirePost>, SourceError> {
        let resp: PostsResp = self
            .get_json(
                &profile_path(target, "/posts")?,
                &[("offset", offset.to_string()), ("limit", limit.to_string())],
                target,
            )
            .await?;
        Ok(resp.items)
    }

    /// Download every media entry of `post`. Entries that fail to download are
    /// skipped; the post itself is still returned.
    async fn stage_post(&self, target: &str, post: WirePost) -> ContentItem {
        let stamp = uuid::Uuid::new_v4().simple().to_string();
        let mut media = Vec::with_capacity(post.media.len());
        for (n, WireMedia { url, kind }) in post.media.iter().enumerate() {
            let Some(kind) = MediaKind::parse_kind(kind) else {
                warn!(handle = %target, post=%post.id, %kind, "unsupported media kind; skipping");
                continue;
            };
            let path = self.temp_dir.join(format!(
                "{}_{}_{}_{}.{}",
                file_stem(target),
                file_stem(&post.id),
                n + 1,
                &stamp[..8],
                kind.extension()
            ));
            match self.download(url, &path).await {
                Ok(()) => media.push(MediaRef { path, kind }),
                Err(err) => warn!(?err, handle = %target, post=%post.id, "media download failed; skipping"),
            }
        }
        ContentItem {
            id: ItemId::new(post.id),
            media,
            like_count: post.like_count,
            comment_count: post.comment_count,
            caption: post.caption.unwrap_or_default(),
        }
    }

    #[instrument(skip_all)]
    async fn download(&self, url: &str, dest: &Path) -> Result<(), SourceError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let res = self.http.get(url).send().await?;
        let res = check_status(res, url).await?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = res.bytes_stream();
        let written = async {
            while let Some(chunk) = stream.next().await {
                file.write_all(&chunk?).await?;
            }
            file.flush().await?;
            Ok::<(), SourceError>(())
        }
        .await;
        if written.is_err() {
            let _ = tokio::fs::remove_file(dest).await;
        }
        written
    }
}

/// Map gateway status codes onto the error taxonomy.
/// Gateway path for `target`. Handles that would escape the profile path are
/// treated as unknown.
fn profile_path(target: &str, suffix: &str) -> Result<String, SourceError> {
    let escapes = target.is_empty()
        || target.chars().all(|c| c == '.')
        || target.contains(['/', '\\', '?', '#', '%']);
    if escapes {
        return Err(SourceError::TargetNotFound(target.to_string()));
    }
    Ok(format!("v1/profiles/{}{}", target, suffix))
}

/// File-name-safe form of a gateway id.
fn file_stem(id: &str) -> String {
    let stem: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "item".to_string()
    } else {
        stem
    }
}

async fn check_status(res: Response, target: &str) -> Result<Response, SourceError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SourceError::AuthExpired),
        StatusCode::NOT_FOUND => Err(SourceError::TargetNotFound(target.to_string())),
        StatusCode::TOO_MANY_REQUESTS => {
            let body = res.text().await.unwrap_or_default();
            warn!("rate limited by content source: {}", body);
            Err(SourceError::Transient(format!("received 429: {}", body)))
        }
        _ => {
            let body = res.text().await.unwrap_or_default();
            Err(SourceError::Transient(format!("gateway error {}: {}", status, body)))
        }
    }
}

/// Keep posts from one feed page that are newer than `cursor` and, when a bound
/// is given, taken after `newer_than`.
pub(crate) fn select_new(
    page: &[WirePost],
    cursor: Option<&ItemId>,
    newer_than: Option<DateTime<Utc>>,
) -> Vec<WirePost> {
    page.iter()
        .filter(|p| newer_than.map_or(true, |bound| p.taken_at >= bound))
        .filter(|p| cursor.map_or(true, |c| ItemId::new(p.id.as_str()) > *c))
        .cloned()
        .collect()
}

#[async_trait]
impl ContentSource for HttpContentSource {
    #[instrument(skip_all)]
    async fn authenticate(&self) -> Result<(), SourceError> {
        let res = self
            .http
            .post(self.endpoint("v1/login")?)
            .json(&LoginReq {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "content source login rejected");
            return Err(SourceError::Transient(format!("login rejected {}: {}", status, body)));
        }
        let LoginResp { token } = res.json().await?;
        if let Some(dir) = self.session_file.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        if let Err(err) = tokio::fs::write(&self.session_file, &token).await {
            warn!(?err, file=%self.session_file.display(), "failed to save session");
        }
        *self.token.write().await = Some(token);
        info!(username=%self.username, "logged in to content source");
        Ok(())
    }

    async fn item_count(&self, target: &str) -> Result<u64, SourceError> {
        Ok(self.profile(target).await?.media_count)
    }

    #[instrument(skip_all, fields(handle = %target))]
    async fn new_items_since(
        &self,
        target: &str,
        cursor: Option<&ItemId>,
        newer_than: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContentItem>, SourceError> {
        let mut fresh = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.list_posts(target, offset, PAGE_SIZE).await?;
            let exhausted = (page.len() as u64) < PAGE_SIZE;
            let keep = select_new(&page, cursor, newer_than);
            debug!(handle = %target, offset, fetched = page.len(), kept = keep.len(), "scanned feed page");
            let nothing_new = keep.is_empty();
            fresh.extend(keep);
            if exhausted || nothing_new {
                break;
            }
            offset += PAGE_SIZE;
        }

        let mut items = Vec::with_capacity(fresh.len());
        for post in fresh {
            items.push(self.stage_post(target, post).await);
        }
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn item_at(&self, target: &str, index: u64) -> Result<Option<ContentItem>, SourceError> {
        let mut page = self.list_posts(target, index, 1).await?;
        if page.is_empty() {
            return Ok(None);
        }
        let post = page.swap_remove(0);
        Ok(Some(self.stage_post(target, post).await))
    }

    #[instrument(skip_all, fields(handle = %target))]
    async fn ephemeral_items(&self, target: &str) -> Result<Vec<StoryItem>, SourceError> {
        let profile = self.profile(target).await?;
        if !profile.has_viewable_story {
            info!(handle = %target, "no viewable stories");
            return Ok(vec![]);
        }
        let resp: StoriesResp = self
            .get_json(&profile_path(target, "/stories")?, &[], target)
            .await?;

        let dir = self
            .temp_dir
            .join(format!("{}-{}", file_stem(target), uuid::Uuid::new_v4().simple()));
        let mut stories = Vec::with_capacity(resp.items.len());
        for story in resp.items {
            let Some(kind) = MediaKind::parse_kind(&story.kind) else {
                warn!(handle = %target, story=%story.id, kind=%story.kind, "unsupported story kind; skipping");
                continue;
            };
            let path = dir.join(format!("{}.{}", file_stem(&story.id), kind.extension()));
            match self.download(&story.url, &path).await {
                Ok(()) => stories.push(StoryItem {
                    id: ItemId::new(story.id),
                    path,
                    kind,
                    taken_at: story.taken_at,
                }),
                Err(err) => warn!(?err, handle = %target, story=%story.id, "story download failed; skipping"),
            }
        }
        if stories.is_empty() {
            let _ = tokio::fs::remove_dir_all(&dir).await;
        }
        debug!(handle = %target, profile=%profile.username, count = stories.len(), "staged stories");
        Ok(stories)
    }
}
