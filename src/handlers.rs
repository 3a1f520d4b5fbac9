//! Telegram update glue: decode messages and button presses into
//! conversation events.
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, instrument, warn};

use crate::conversation::{Conversation, Event};
use crate::model::OwnerId;

/// Users allowed to talk to the bot. Empty means everyone.
#[derive(Debug, Clone, Default)]
pub struct Access {
    allowed: Vec<OwnerId>,
}

impl Access {
    pub fn new(allowed: Vec<OwnerId>) -> Self {
        Self { allowed }
    }

    pub fn permits(&self, owner: OwnerId) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&owner)
    }
}

pub struct BotState {
    pub conversation: Arc<Conversation>,
    pub access: Access,
}

#[instrument(skip_all)]
pub async fn handle_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let owner = user.id.0 as OwnerId;
    if !state.access.permits(owner) {
        debug!(owner, "ignoring message from user outside the access list");
        return Ok(());
    }
    let Some(text) = msg.text() else {
        debug!(owner, "ignoring non-text message");
        return Ok(());
    };

    state
        .conversation
        .handle(msg.chat.id.0, owner, Event::from_text(text))
        .await;
    Ok(())
}

#[instrument(skip_all)]
pub async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<BotState>) -> ResponseResult<()> {
    if let Err(err) = bot.answer_callback_query(q.id.clone()).await {
        warn!(?err, "failed to answer callback query");
    }

    let owner = q.from.id.0 as OwnerId;
    if !state.access.permits(owner) {
        debug!(owner, "ignoring callback from user outside the access list");
        return Ok(());
    }
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let Some(event) = Event::from_callback(data) else {
        warn!(data, "unknown callback payload");
        return Ok(());
    };
    let chat = q.message.as_ref().map_or(owner, |m| m.chat.id.0);

    state.conversation.handle(chat, owner, event).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_access_list_allows_everyone() {
        let access = Access::default();
        assert!(access.permits(1));
        assert!(access.permits(-42));
    }

    #[test]
    fn access_list_filters_users() {
        let access = Access::new(vec![10, 20]);
        assert!(access.permits(10));
        assert!(!access.permits(11));
    }
}
