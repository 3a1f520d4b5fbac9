//! Row models used by repositories.
//!
//! Keep these structs focused on the data returned by queries. Business logic
//! should live in higher layers.

use crate::model::{ItemId, Subscription};

/// One `subscriptions` row as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionRow {
    pub owner_id: i64,
    pub target: String,
    pub cursor: Option<String>,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Subscription {
            owner_id: row.owner_id,
            target: row.target,
            cursor: row.cursor.filter(|c| !c.is_empty()).map(ItemId::new),
        }
    }
}
