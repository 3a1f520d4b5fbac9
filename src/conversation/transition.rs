//! Pure state transitions. No I/O happens here; [`super::Conversation`]
//! executes the returned [`Step`].
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::event::{Direction, Event, MenuKey};
use super::state::{Action, Browse, ConvState};
use crate::locale::Lang;
use crate::pagination;

static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9._]{1,30}$").expect("handle pattern compiles"));

/// Why a handle typed by the user was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Reserved handle; the bot refuses to track it.
    Blocked,
    InvalidHandle(String),
    UnknownAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `/start`: language picker for new users, menu otherwise.
    Start,
    /// Reset to `Idle` and render the menu. `cancelled` picks the wording.
    Menu { cancelled: bool },
    /// Idle chatter; the menu is shown again without touching state.
    PickCommand,
    LanguagePicker,
    SetLanguage(Lang),
    ListSubscriptions,
    Prompt(Action),
    Reject(Rejection),
    Run(Action, String),
    /// Re-render the browse at this page.
    Turn(Browse),
    /// Deliver item `number` (one-based) of the browse.
    Select(Browse, u64),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("page controls used outside of browsing")]
    NotBrowsing,
    #[error("item {selected} is outside 1..={total}")]
    OutOfRange { selected: u64, total: u64 },
}

/// Trim, drop a leading `@` and lower-case a typed handle.
pub fn normalize_handle(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('@')
        .unwrap_or(trimmed)
        .trim()
        .to_lowercase()
}

/// Lower-case letters, digits, `.` and `_`, up to 30 chars, and not dots only.
pub fn is_valid_handle(handle: &str) -> bool {
    HANDLE_RE.is_match(handle) && !handle.chars().all(|c| c == '.')
}

pub fn transition(state: &ConvState, event: Event, blocked: &[String]) -> Result<Step, TransitionError> {
    let step = match (state, event) {
        (_, Event::Start) => Step::Start,
        (_, Event::Menu(MenuKey::Action(action))) => Step::Prompt(action),
        (_, Event::Menu(MenuKey::ListSubscriptions)) => Step::ListSubscriptions,
        (_, Event::Menu(MenuKey::ChooseLanguage)) => Step::LanguagePicker,
        (_, Event::Language(lang)) => Step::SetLanguage(lang),
        (ConvState::Idle, Event::Cancel) => Step::Menu { cancelled: false },
        (_, Event::Cancel) => Step::Menu { cancelled: true },

        (ConvState::Idle, Event::Text(_)) => Step::PickCommand,
        (ConvState::Paginating(_), Event::Text(_)) => Step::Reject(Rejection::UnknownAction),
        (ConvState::AwaitingUsername(action), Event::Text(text)) => {
            let handle = normalize_handle(&text);
            if blocked.iter().any(|b| b.eq_ignore_ascii_case(&handle)) {
                Step::Reject(Rejection::Blocked)
            } else if !is_valid_handle(&handle) {
                Step::Reject(Rejection::InvalidHandle(handle))
            } else {
                Step::Run(*action, handle)
            }
        }

        (ConvState::Paginating(browse), Event::PageNav(direction)) => {
            let delta = match direction {
                Direction::Prev => -1,
                Direction::Next => 1,
            };
            let page = pagination::clamp_page(browse.current_page as i64 + delta, browse.total_pages);
            Step::Turn(Browse {
                current_page: page,
                ..browse.clone()
            })
        }
        (ConvState::Paginating(browse), Event::ItemSelect(selected)) => {
            if selected == 0 || selected > browse.total_count {
                return Err(TransitionError::OutOfRange {
                    selected,
                    total: browse.total_count,
                });
            }
            Step::Select(browse.clone(), selected)
        }
        (_, Event::PageNav(_)) | (_, Event::ItemSelect(_)) => return Err(TransitionError::NotBrowsing),
    };
    Ok(step)
}
