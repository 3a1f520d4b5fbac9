use super::model::SubscriptionRow;
use crate::model::{ItemId, OwnerId, Subscription};
use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// Normalise a SQLite URL: expand a leading `~/`, make sure the parent directory
/// exists and ask SQLite to create the file. In-memory URLs pass through.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let query = match query_part {
        Some(q) if q.contains("mode=") => q.to_string(),
        Some(q) => format!("{}&mode=rwc", q),
        None => "mode=rwc".to_string(),
    };
    format!("sqlite://{}?{}", expanded_path, query)
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Create a subscription with an empty cursor. Returns `false` when the pair
/// already existed (nothing changes).
#[instrument(skip_all)]
pub async fn insert_subscription(pool: &Pool, owner_id: OwnerId, target: &str) -> Result<bool> {
    let res = sqlx::query(
        "INSERT OR IGNORE INTO subscriptions (owner_id, target, cursor) VALUES (?, ?, NULL)",
    )
    .bind(owner_id)
    .bind(target)
    .execute(pool)
    .await
    .context("failed to insert subscription")?;
    Ok(res.rows_affected() > 0)
}

/// Remove a subscription. Returns `false` when there was nothing to remove.
#[instrument(skip_all)]
pub async fn delete_subscription(pool: &Pool, owner_id: OwnerId, target: &str) -> Result<bool> {
    let res = sqlx::query("DELETE FROM subscriptions WHERE owner_id = ? AND target = ?")
        .bind(owner_id)
        .bind(target)
        .execute(pool)
        .await
        .context("failed to delete subscription")?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn list_subscriptions(pool: &Pool) -> Result<Vec<Subscription>> {
    let rows: Vec<SubscriptionRow> = sqlx::query_as(
        "SELECT owner_id, target, cursor FROM subscriptions ORDER BY owner_id, target",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Subscription::from).collect())
}

#[instrument(skip_all)]
pub async fn list_subscriptions_for(pool: &Pool, owner_id: OwnerId) -> Result<Vec<Subscription>> {
    let rows: Vec<SubscriptionRow> = sqlx::query_as(
        "SELECT owner_id, target, cursor FROM subscriptions WHERE owner_id = ? ORDER BY target",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Subscription::from).collect())
}

#[instrument(skip_all)]
pub async fn find_subscription(
    pool: &Pool,
    owner_id: OwnerId,
    target: &str,
) -> Result<Option<Subscription>> {
    let row: Option<SubscriptionRow> = sqlx::query_as(
        "SELECT owner_id, target, cursor FROM subscriptions WHERE owner_id = ? AND target = ?",
    )
    .bind(owner_id)
    .bind(target)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Subscription::from))
}

/// Overwrite the cursor unconditionally.
#[instrument(skip_all)]
pub async fn set_cursor(pool: &Pool, owner_id: OwnerId, target: &str, cursor: &ItemId) -> Result<()> {
    sqlx::query(
        "UPDATE subscriptions SET cursor = ?, updated_at = CURRENT_TIMESTAMP WHERE owner_id = ? AND target = ?",
    )
    .bind(cursor.as_str())
    .bind(owner_id)
    .bind(target)
    .execute(pool)
    .await
    .context("failed to persist cursor")?;
    Ok(())
}

/// Move the cursor forward to `cursor` if it is newer than the stored one.
///
/// Returns `true` when the row was updated. A missing row or an older value is
/// left alone, so concurrent writers can never move a cursor backwards.
#[instrument(skip_all)]
pub async fn advance_cursor(
    pool: &Pool,
    owner_id: OwnerId,
    target: &str,
    cursor: &ItemId,
) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let current: Option<Option<String>> = sqlx::query_scalar(
        "SELECT cursor FROM subscriptions WHERE owner_id = ? AND target = ?",
    )
    .bind(owner_id)
    .bind(target)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(current) = current else {
        debug!(owner_id, handle = target, "subscription gone; cursor not stored");
        return Ok(false);
    };
    if let Some(current) = current.filter(|c| !c.is_empty()).map(ItemId::new) {
        if *cursor <= current {
            debug!(owner_id, handle = target, %current, %cursor, "stored cursor is newer; keeping it");
            return Ok(false);
        }
    }

    sqlx::query(
        "UPDATE subscriptions SET cursor = ?, updated_at = CURRENT_TIMESTAMP WHERE owner_id = ? AND target = ?",
    )
    .bind(cursor.as_str())
    .bind(owner_id)
    .bind(target)
    .execute(&mut *tx)
    .await
    .context("failed to advance cursor")?;
    tx.commit().await?;
    Ok(true)
}
