//! Per-user in-memory conversation data.
//!
//! Entries are keyed by owner id. Every accessor takes the entry's shard lock
//! for the duration of one read or write and never across an `.await`.
use dashmap::DashMap;

use crate::conversation::ConvState;
use crate::locale::Lang;
use crate::messenger::MessageRef;
use crate::model::OwnerId;

#[derive(Debug, Clone, Default)]
struct UserSession {
    state: ConvState,
    lang: Option<Lang>,
    last_message: Option<MessageRef>,
}

#[derive(Debug, Default)]
pub struct Sessions {
    entries: DashMap<OwnerId, UserSession>,
    default_lang: Option<Lang>,
}

impl Sessions {
    pub fn new(default_lang: Option<Lang>) -> Self {
        Self {
            entries: DashMap::new(),
            default_lang,
        }
    }

    pub fn state(&self, owner: OwnerId) -> ConvState {
        self.entries
            .get(&owner)
            .map(|s| s.state.clone())
            .unwrap_or_default()
    }

    pub fn set_state(&self, owner: OwnerId, state: ConvState) {
        self.entries.entry(owner).or_default().state = state;
    }

    /// Chosen language, or the configured default.
    pub fn lang(&self, owner: OwnerId) -> Option<Lang> {
        self.entries
            .get(&owner)
            .and_then(|s| s.lang)
            .or(self.default_lang)
    }

    /// Language to render with when the user never picked one.
    pub fn lang_or_default(&self, owner: OwnerId) -> Lang {
        self.lang(owner).unwrap_or_default()
    }

    pub fn set_lang(&self, owner: OwnerId, lang: Lang) {
        self.entries.entry(owner).or_default().lang = Some(lang);
    }

    /// Forget and return the tracked UI message for this chat.
    pub fn take_last_message(&self, owner: OwnerId) -> Option<MessageRef> {
        self.entries
            .get_mut(&owner)
            .and_then(|mut s| s.last_message.take())
    }

    pub fn last_message(&self, owner: OwnerId) -> Option<MessageRef> {
        self.entries.get(&owner).and_then(|s| s.last_message)
    }

    pub fn set_last_message(&self, owner: OwnerId, message: MessageRef) {
        self.entries.entry(owner).or_default().last_message = Some(message);
    }
}
