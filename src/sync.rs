//! Periodic subscription sweeps: fetch what is new past each cursor, deliver
//! it oldest first, then move the cursor forward once.
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::db::{self, Pool};
use crate::locale::{self, Key, Lang};
use crate::model::{ContentItem, Subscription};
use crate::notify::{self, Notifier};
use crate::session::Sessions;
use crate::source::{or_empty, with_reauth, ContentSource};

#[derive(Debug, Clone)]
pub enum SweepScope {
    /// Every stored subscription, bounded by the recency window.
    All,
    /// One caller-supplied subscription, e.g. an on-demand check.
    Single(Subscription),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub posts: usize,
    pub stories: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionReport {
    pub posts: usize,
    pub stories: usize,
    /// Failed halves (posts, stories). Each half is attempted regardless.
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct PostBatch {
    delivered: usize,
    /// An item could not be delivered at all; later items were held back.
    stalled: bool,
}

pub struct SyncEngine {
    pool: Pool,
    source: Arc<dyn ContentSource>,
    notifier: Notifier,
    sessions: Arc<Sessions>,
    recent_window: Option<chrono::Duration>,
}

impl SyncEngine {
    pub fn new(
        pool: Pool,
        source: Arc<dyn ContentSource>,
        notifier: Notifier,
        sessions: Arc<Sessions>,
        recent_window: Option<chrono::Duration>,
    ) -> Self {
        Self {
            pool,
            source,
            notifier,
            sessions,
            recent_window,
        }
    }

    /// Sweep everything now and then once per `period`, forever.
    pub async fn run_forever(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.sweep(SweepScope::All).await;
        }
    }

    #[instrument(skip_all)]
    pub async fn sweep(&self, scope: SweepScope) -> SweepReport {
        let mut report = SweepReport::default();
        let (subscriptions, bounded) = match scope {
            SweepScope::All => match db::list_subscriptions(&self.pool).await {
                Ok(subs) => (subs, true),
                Err(err) => {
                    error!(?err, "failed to list subscriptions");
                    report.failures += 1;
                    return report;
                }
            },
            SweepScope::Single(sub) => (vec![sub], false),
        };

        for sub in &subscriptions {
            report.checked += 1;
            let res = self.sync_subscription(sub, self.newer_than(bounded)).await;
            report.posts += res.posts;
            report.stories += res.stories;
            if res.errors > 0 {
                report.failures += 1;
            }
        }
        info!(
            checked = report.checked,
            posts = report.posts,
            stories = report.stories,
            failures = report.failures,
            "sweep finished"
        );
        report
    }

    /// Lower time bound for a fetch. Only unattended full sweeps are bounded.
    fn newer_than(&self, bounded: bool) -> Option<DateTime<Utc>> {
        if bounded {
            self.recent_window.map(|window| Utc::now() - window)
        } else {
            None
        }
    }

    #[instrument(skip_all, fields(owner = sub.owner_id, handle = %sub.target))]
    pub async fn sync_subscription(
        &self,
        sub: &Subscription,
        newer_than: Option<DateTime<Utc>>,
    ) -> SubscriptionReport {
        let lang = self.sessions.lang_or_default(sub.owner_id);
        let mut report = SubscriptionReport::default();

        match self.sync_posts(sub, lang, newer_than).await {
            Ok(batch) => {
                report.posts = batch.delivered;
                if batch.stalled {
                    report.errors += 1;
                }
            }
            Err(err) => {
                warn!(?err, "post sync failed");
                report.errors += 1;
            }
        }
        match self.sync_stories(sub, lang).await {
            Ok(n) => report.stories = n,
            Err(err) => {
                warn!(?err, "story sync failed");
                report.errors += 1;
            }
        }
        report
    }

    /// Deliver fresh posts oldest first. The batch stops at the first item
    /// of which nothing reached the chat, and the cursor only covers items
    /// that did.
    async fn sync_posts(
        &self,
        sub: &Subscription,
        lang: Lang,
        newer_than: Option<DateTime<Utc>>,
    ) -> anyhow::Result<PostBatch> {
        let source = self.source.as_ref();
        let items = or_empty(
            with_reauth(source, || {
                source.new_items_since(&sub.target, sub.cursor.as_ref(), newer_than)
            })
            .await,
        )?;

        let fresh = select_fresh(sub, items).await;
        if fresh.is_empty() {
            debug!("nothing new");
            return Ok(PostBatch::default());
        }

        let header = locale::format(lang, Key::NewPostFrom, &[("username", &sub.target)]);
        let mut batch = PostBatch::default();
        let mut newest = None;
        let mut pending = fresh.into_iter();
        for item in pending.by_ref() {
            let delivery = self
                .notifier
                .dispatch_post(sub.owner_id, lang, Some(&header), &item)
                .await;
            if !delivery.reached() {
                warn!(item = %item.id, "nothing delivered; batch stopped");
                batch.stalled = true;
                break;
            }
            if delivery.failed > 0 {
                warn!(item = %item.id, failed = delivery.failed, "post partially delivered");
            }
            batch.delivered += 1;
            newest = Some(item.id);
        }
        for item in pending {
            notify::discard_item(&item).await;
        }

        if let Some(newest) = newest {
            let advanced = db::advance_cursor(&self.pool, sub.owner_id, &sub.target, &newest).await?;
            info!(count = batch.delivered, cursor = %newest, advanced, "delivered new posts");
        }
        Ok(batch)
    }

    async fn sync_stories(&self, sub: &Subscription, lang: Lang) -> anyhow::Result<usize> {
        let source = self.source.as_ref();
        let stories = or_empty(with_reauth(source, || source.ephemeral_items(&sub.target)).await)?;
        if stories.is_empty() {
            return Ok(0);
        }
        let header = locale::format(lang, Key::NewStoryFrom, &[("username", &sub.target)]);
        let delivery = self
            .notifier
            .dispatch_stories(sub.owner_id, Some(&header), &stories)
            .await;
        info!(sent = delivery.sent, failed = delivery.failed, "delivered stories");
        Ok(stories.len())
    }
}

/// Keep items past the cursor, oldest first and unique by id. Staged media of
/// everything dropped is removed.
async fn select_fresh(sub: &Subscription, mut items: Vec<ContentItem>) -> Vec<ContentItem> {
    items.sort_by(|a, b| a.id.cmp(&b.id));
    let mut fresh: Vec<ContentItem> = Vec::with_capacity(items.len());
    for item in items {
        let duplicate = fresh.last().is_some_and(|last| last.id == item.id);
        if duplicate || !sub.is_new(&item.id) {
            notify::discard_item(&item).await;
        } else {
            fresh.push(item);
        }
    }
    fresh
}
