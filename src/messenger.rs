//! Outbound messaging seam and its Telegram implementation.
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId};
use tracing::instrument;

pub type ChatRef = i64;
pub type MessageRef = i32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Inline keyboard rows, platform independent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn row(mut self, row: Vec<Button>) -> Self {
        if !row.is_empty() {
            self.rows.push(row);
        }
        self
    }

    /// All callback payloads in display order.
    pub fn data(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flatten()
            .map(|b| b.data.as_str())
            .collect()
    }
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(
        &self,
        chat: ChatRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef>;

    async fn send_photo(&self, chat: ChatRef, path: &Path) -> Result<MessageRef>;

    async fn send_video(&self, chat: ChatRef, path: &Path) -> Result<MessageRef>;

    async fn edit_text(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()>;

    async fn delete_message(&self, chat: ChatRef, message: MessageRef) -> Result<()>;
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

#[async_trait]
impl Messenger for TelegramMessenger {
    #[instrument(skip_all)]
    async fn send_text(
        &self,
        chat: ChatRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef> {
        let mut req = self.bot.send_message(ChatId(chat), text);
        if let Some(kb) = keyboard {
            req = req.reply_markup(markup(kb));
        }
        let msg = req.await.context("telegram sendMessage failed")?;
        Ok(msg.id.0)
    }

    #[instrument(skip_all)]
    async fn send_photo(&self, chat: ChatRef, path: &Path) -> Result<MessageRef> {
        let msg = self
            .bot
            .send_photo(ChatId(chat), InputFile::file(path))
            .await
            .with_context(|| format!("telegram sendPhoto failed for {}", path.display()))?;
        Ok(msg.id.0)
    }

    #[instrument(skip_all)]
    async fn send_video(&self, chat: ChatRef, path: &Path) -> Result<MessageRef> {
        let msg = self
            .bot
            .send_video(ChatId(chat), InputFile::file(path))
            .await
            .with_context(|| format!("telegram sendVideo failed for {}", path.display()))?;
        Ok(msg.id.0)
    }

    #[instrument(skip_all)]
    async fn edit_text(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        let mut req = self
            .bot
            .edit_message_text(ChatId(chat), MessageId(message), text);
        if let Some(kb) = keyboard {
            req = req.reply_markup(markup(kb));
        }
        req.await.context("telegram editMessageText failed")?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn delete_message(&self, chat: ChatRef, message: MessageRef) -> Result<()> {
        self.bot
            .delete_message(ChatId(chat), MessageId(message))
            .await
            .context("telegram deleteMessage failed")?;
        Ok(())
    }
}
