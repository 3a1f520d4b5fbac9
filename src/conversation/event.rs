//! Inbound conversation events and their callback-button encoding.
use super::state::Action;
use crate::locale::Lang;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKey {
    Action(Action),
    ListSubscriptions,
    ChooseLanguage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start,
    Menu(MenuKey),
    Text(String),
    PageNav(Direction),
    /// One-based item number on the current browse.
    ItemSelect(u64),
    Cancel,
    Language(Lang),
}

pub const CANCEL: &str = "cancel";
pub const PAGE_PREV: &str = "page:prev";
pub const PAGE_NEXT: &str = "page:next";
const SELECT_PREFIX: &str = "select_post:";
const LANG_PREFIX: &str = "lang:";

impl MenuKey {
    pub fn callback(&self) -> &'static str {
        match self {
            MenuKey::Action(Action::ViewStory) => "ask_username_story",
            MenuKey::Action(Action::ViewPost) => "ask_username_post",
            MenuKey::Action(Action::Add) => "ask_username_add",
            MenuKey::Action(Action::Remove) => "ask_username_remove",
            MenuKey::Action(Action::CheckNow) => "ask_username_check",
            MenuKey::ListSubscriptions => "list_subscriptions",
            MenuKey::ChooseLanguage => "choose_language",
        }
    }

    fn from_callback(data: &str) -> Option<Self> {
        let key = match data {
            "ask_username_story" => MenuKey::Action(Action::ViewStory),
            "ask_username_post" => MenuKey::Action(Action::ViewPost),
            "ask_username_add" => MenuKey::Action(Action::Add),
            "ask_username_remove" => MenuKey::Action(Action::Remove),
            "ask_username_check" => MenuKey::Action(Action::CheckNow),
            "list_subscriptions" => MenuKey::ListSubscriptions,
            "choose_language" => MenuKey::ChooseLanguage,
            _ => return None,
        };
        Some(key)
    }
}

pub fn select_callback(number: u64) -> String {
    format!("{SELECT_PREFIX}{number}")
}

pub fn lang_callback(lang: Lang) -> String {
    format!("{LANG_PREFIX}{}", lang.code())
}

impl Event {
    /// Decode an inline-button payload. Unknown payloads yield `None`.
    pub fn from_callback(data: &str) -> Option<Event> {
        match data {
            CANCEL => return Some(Event::Cancel),
            PAGE_PREV => return Some(Event::PageNav(Direction::Prev)),
            PAGE_NEXT => return Some(Event::PageNav(Direction::Next)),
            _ => {}
        }
        if let Some(n) = data.strip_prefix(SELECT_PREFIX) {
            return n.parse().ok().map(Event::ItemSelect);
        }
        if let Some(code) = data.strip_prefix(LANG_PREFIX) {
            return Lang::parse(code).map(Event::Language);
        }
        MenuKey::from_callback(data).map(Event::Menu)
    }

    /// Decode a plain chat message. Slash commands map to their events.
    pub fn from_text(text: &str) -> Event {
        let trimmed = text.trim();
        let command = trimmed
            .split_whitespace()
            .next()
            .map(|c| c.split('@').next().unwrap_or(c));
        match command {
            Some("/start") => Event::Start,
            Some("/cancel") => Event::Cancel,
            _ => Event::Text(text.to_string()),
        }
    }
}
