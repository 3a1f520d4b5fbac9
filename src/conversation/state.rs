use crate::locale::Key;

/// What the user asked to do with the handle they are about to type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Add,
    Remove,
    ViewStory,
    ViewPost,
    CheckNow,
}

impl Action {
    pub fn prompt(&self) -> Key {
        match self {
            Action::Add => Key::AskUsernameAdd,
            Action::Remove => Key::AskUsernameRemove,
            Action::ViewStory => Key::AskUsernameStory,
            Action::ViewPost => Key::AskUsernamePost,
            Action::CheckNow => Key::AskUsernameCheck,
        }
    }

    pub fn label(&self) -> Key {
        match self {
            Action::Add => Key::AddAccount,
            Action::Remove => Key::RemoveAccount,
            Action::ViewStory => Key::ViewStory,
            Action::ViewPost => Key::ViewPost,
            Action::CheckNow => Key::CheckNow,
        }
    }
}

/// Browsing position over one target's posts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Browse {
    pub target: String,
    pub total_count: u64,
    pub total_pages: u32,
    pub items_per_page: u32,
    pub current_page: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConvState {
    #[default]
    Idle,
    AwaitingUsername(Action),
    Paginating(Browse),
}
