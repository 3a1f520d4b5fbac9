//! Per-user conversation: inbound events go through [`transition`] and the
//! resulting [`Step`] is executed against the store, the content source and
//! the messenger.
//!
//! Every UI render deletes the previously tracked message of the chat before
//! sending its replacement, so a chat shows at most one live menu or prompt.
//! Delivered content (media and captions) is never tracked.
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn, Instrument};

use crate::db::{self, Pool};
use crate::locale::{self, Key, Lang};
use crate::messenger::{Button, ChatRef, Keyboard, Messenger};
use crate::model::OwnerId;
use crate::notify::Notifier;
use crate::pagination::{self, ITEMS_PER_PAGE};
use crate::session::Sessions;
use crate::source::{or_empty, with_reauth, ContentSource};
use crate::sync::{SweepScope, SyncEngine};

pub mod event;
pub mod state;
pub mod transition;

pub use event::{Direction, Event, MenuKey};
pub use state::{Action, Browse, ConvState};
pub use transition::{transition, Rejection, Step, TransitionError};

#[derive(Debug, Clone, Copy)]
struct Ctx {
    chat: ChatRef,
    owner: OwnerId,
    lang: Lang,
}

#[derive(Clone)]
pub struct Conversation {
    pool: Pool,
    source: Arc<dyn ContentSource>,
    notifier: Notifier,
    sessions: Arc<Sessions>,
    sync: Arc<SyncEngine>,
    blocked: Arc<Vec<String>>,
    /// Story deliveries running off the handler path.
    background: Arc<Mutex<JoinSet<()>>>,
}

impl Conversation {
    pub fn new(
        pool: Pool,
        source: Arc<dyn ContentSource>,
        notifier: Notifier,
        sessions: Arc<Sessions>,
        sync: Arc<SyncEngine>,
        blocked: Vec<String>,
    ) -> Self {
        Self {
            pool,
            source,
            notifier,
            sessions,
            sync,
            blocked: Arc::new(blocked),
            background: Arc::default(),
        }
    }

    /// Wait until every spawned story delivery has finished.
    pub async fn settle(&self) {
        let mut tasks = self.background.lock().await;
        while let Some(done) = tasks.join_next().await {
            if let Err(err) = done {
                warn!(?err, "story delivery task failed");
            }
        }
    }

    pub fn sessions(&self) -> &Arc<Sessions> {
        &self.sessions
    }

    fn messenger(&self) -> &dyn Messenger {
        self.notifier.messenger().as_ref()
    }

    /// Feed one event for `owner` talking in `chat`. Failures are reported to
    /// the user and logged; nothing is returned to the caller.
    #[instrument(skip_all, fields(owner = owner, chat = chat))]
    pub async fn handle(&self, chat: ChatRef, owner: OwnerId, event: Event) {
        let state = self.sessions.state(owner);
        let step = match transition(&state, event, &self.blocked) {
            Ok(step) => step,
            Err(err) => {
                warn!(%err, "event ignored");
                return;
            }
        };
        let ctx = Ctx {
            chat,
            owner,
            lang: self.sessions.lang_or_default(owner),
        };
        self.execute(ctx, step).await;
    }

    async fn execute(&self, ctx: Ctx, step: Step) {
        match step {
            Step::Start => {
                self.idle(ctx);
                if self.sessions.lang(ctx.owner).is_none() {
                    self.language_picker(ctx).await;
                } else {
                    self.menu(ctx, Key::StartText).await;
                }
            }
            Step::Menu { cancelled } => {
                self.idle(ctx);
                let key = if cancelled { Key::CancelDone } else { Key::StartText };
                self.menu(ctx, key).await;
            }
            Step::PickCommand => self.menu(ctx, Key::PickCommand).await,
            Step::LanguagePicker => {
                self.idle(ctx);
                self.language_picker(ctx).await;
            }
            Step::SetLanguage(lang) => {
                self.sessions.set_lang(ctx.owner, lang);
                self.idle(ctx);
                self.menu(Ctx { lang, ..ctx }, Key::LangChosen).await;
            }
            Step::ListSubscriptions => {
                self.idle(ctx);
                self.list_subscriptions(ctx).await;
            }
            Step::Prompt(action) => {
                self.sessions.set_state(ctx.owner, ConvState::AwaitingUsername(action));
                let keyboard = cancel_keyboard(ctx.lang);
                self.show(ctx, locale::text(ctx.lang, action.prompt()), Some(&keyboard))
                    .await;
            }
            Step::Reject(rejection) => {
                self.idle(ctx);
                let text = match rejection {
                    Rejection::Blocked => locale::text(ctx.lang, Key::BotOwnerText).to_string(),
                    Rejection::InvalidHandle(handle) => {
                        locale::format(ctx.lang, Key::InvalidUsername, &[("username", &handle)])
                    }
                    Rejection::UnknownAction => locale::text(ctx.lang, Key::UnknownAction).to_string(),
                };
                self.menu_with(ctx, &text).await;
            }
            Step::Run(action, handle) => {
                info!(?action, handle = %handle, "running action");
                match action {
                    Action::Add => self.add(ctx, &handle).await,
                    Action::Remove => self.remove(ctx, &handle).await,
                    Action::ViewStory => self.view_stories(ctx, handle).await,
                    Action::ViewPost => self.start_browse(ctx, handle).await,
                    Action::CheckNow => self.check_now(ctx, &handle).await,
                }
            }
            Step::Turn(browse) => {
                self.sessions
                    .set_state(ctx.owner, ConvState::Paginating(browse.clone()));
                self.render_page(ctx, &browse, None, true).await;
            }
            Step::Select(browse, number) => self.select(ctx, browse, number).await,
        }
    }

    fn idle(&self, ctx: Ctx) {
        self.sessions.set_state(ctx.owner, ConvState::Idle);
    }

    async fn add(&self, ctx: Ctx, handle: &str) {
        self.idle(ctx);
        match db::insert_subscription(&self.pool, ctx.owner, handle).await {
            Ok(inserted) => {
                info!(handle, inserted, "subscription added");
                let text = locale::format(ctx.lang, Key::AddAccountSuccess, &[("username", handle)]);
                self.menu_with(ctx, &text).await;
            }
            Err(err) => {
                warn!(?err, handle, "failed to add subscription");
                self.menu(ctx, Key::AddAccountError).await;
            }
        }
    }

    async fn remove(&self, ctx: Ctx, handle: &str) {
        self.idle(ctx);
        match db::delete_subscription(&self.pool, ctx.owner, handle).await {
            Ok(removed) => {
                info!(handle, removed, "subscription removed");
                let text = locale::format(ctx.lang, Key::RemoveAccountSuccess, &[("username", handle)]);
                self.menu_with(ctx, &text).await;
            }
            Err(err) => {
                warn!(?err, handle, "failed to remove subscription");
                self.menu(ctx, Key::RemoveAccountError).await;
            }
        }
    }

    async fn list_subscriptions(&self, ctx: Ctx) {
        match db::list_subscriptions_for(&self.pool, ctx.owner).await {
            Ok(subs) if subs.is_empty() => self.menu(ctx, Key::NoSubs).await,
            Ok(subs) => {
                let mut text = locale::text(ctx.lang, Key::SubsListHeader).to_string();
                for sub in &subs {
                    text.push_str("• ");
                    text.push_str(&sub.target);
                    text.push('\n');
                }
                self.menu_with(ctx, text.trim_end()).await;
            }
            Err(err) => {
                warn!(?err, "failed to list subscriptions");
                self.menu(ctx, Key::SubsListError).await;
            }
        }
    }

    /// Show the loading notice and hand the fetch to a background task,
    /// which replies once the stories are out.
    async fn view_stories(&self, ctx: Ctx, handle: String) {
        self.idle(ctx);
        self.loading(ctx).await;

        let this = self.clone();
        let mut tasks = self.background.lock().await;
        while let Some(done) = tasks.try_join_next() {
            if let Err(err) = done {
                warn!(?err, "story delivery task failed");
            }
        }
        tasks.spawn(async move { this.deliver_stories(ctx, handle).await }.in_current_span());
    }

    async fn deliver_stories(&self, ctx: Ctx, handle: String) {
        let source = self.source.as_ref();
        match or_empty(with_reauth(source, || source.ephemeral_items(&handle)).await) {
            Ok(stories) if stories.is_empty() => {
                let text = locale::format(ctx.lang, Key::StoriesNone, &[("username", &handle)]);
                self.menu_with(ctx, &text).await;
            }
            Ok(stories) => {
                let delivery = self.notifier.dispatch_stories(ctx.chat, None, &stories).await;
                info!(sent = delivery.sent, failed = delivery.failed, "stories delivered");
                self.menu(ctx, Key::StoriesSent).await;
            }
            Err(err) => {
                warn!(?err, handle = %handle, "failed to fetch stories");
                self.menu(ctx, Key::StoriesError).await;
            }
        }
    }

    async fn start_browse(&self, ctx: Ctx, handle: String) {
        self.idle(ctx);
        self.loading(ctx).await;

        let source = self.source.as_ref();
        let count = or_empty(with_reauth(source, || source.item_count(&handle)).await);
        match count {
            Ok(0) => {
                let text = locale::format(ctx.lang, Key::NoPublicationsUser, &[("username", &handle)]);
                self.menu_with(ctx, &text).await;
            }
            Ok(total_count) => {
                let browse = Browse {
                    target: handle,
                    total_count,
                    total_pages: pagination::total_pages(total_count, ITEMS_PER_PAGE),
                    items_per_page: ITEMS_PER_PAGE,
                    current_page: 1,
                };
                self.sessions
                    .set_state(ctx.owner, ConvState::Paginating(browse.clone()));
                self.render_page(ctx, &browse, None, false).await;
            }
            Err(err) => {
                warn!(?err, handle = %handle, "failed to count posts");
                self.menu(ctx, Key::PublicationsError).await;
            }
        }
    }

    async fn select(&self, ctx: Ctx, browse: Browse, number: u64) {
        self.loading(ctx).await;

        let source = self.source.as_ref();
        let index = number - 1;
        let fetched = or_empty(with_reauth(source, || source.item_at(&browse.target, index)).await);
        match fetched {
            Ok(Some(item)) => {
                let delivery = self.notifier.dispatch_post(ctx.chat, ctx.lang, None, &item).await;
                info!(item = %item.id, sent = delivery.sent, failed = delivery.failed, "post delivered");
                self.render_page(ctx, &browse, None, false).await;
            }
            Ok(None) => {
                let notice = locale::text(ctx.lang, Key::NoPublicationsPlain);
                self.render_page(ctx, &browse, Some(notice), false).await;
            }
            Err(err) => {
                warn!(?err, handle = %browse.target, number, "failed to fetch post");
                self.idle(ctx);
                self.menu(ctx, Key::PublicationsError).await;
            }
        }
    }

    async fn check_now(&self, ctx: Ctx, handle: &str) {
        self.idle(ctx);
        let sub = match db::find_subscription(&self.pool, ctx.owner, handle).await {
            Ok(Some(sub)) => sub,
            Ok(None) => {
                let text = locale::format(ctx.lang, Key::NotSubscribed, &[("username", handle)]);
                self.menu_with(ctx, &text).await;
                return;
            }
            Err(err) => {
                warn!(?err, handle, "failed to look up subscription");
                self.menu(ctx, Key::CheckError).await;
                return;
            }
        };

        self.loading(ctx).await;
        let report = self.sync.sweep(SweepScope::Single(sub)).await;
        if report.failures > 0 {
            self.menu(ctx, Key::CheckError).await;
            return;
        }
        let text = locale::format(
            ctx.lang,
            Key::CheckDone,
            &[
                ("username", handle),
                ("posts", &report.posts.to_string()),
                ("stories", &report.stories.to_string()),
            ],
        );
        self.menu_with(ctx, &text).await;
    }

    /// Page text and controls. With `edit` the tracked message is updated in
    /// place, falling back to a fresh message if that fails.
    async fn render_page(&self, ctx: Ctx, browse: &Browse, notice: Option<&str>, edit: bool) {
        let found = locale::format(
            ctx.lang,
            Key::FoundPublications,
            &[
                ("count", &browse.total_count.to_string()),
                ("page", &browse.current_page.to_string()),
                ("pages", &browse.total_pages.to_string()),
            ],
        );
        let text = match notice {
            Some(notice) => format!("{notice}\n\n{found}"),
            None => found,
        };
        let keyboard = page_keyboard(ctx.lang, browse);

        if edit {
            if let Some(message) = self.sessions.last_message(ctx.owner) {
                match self
                    .messenger()
                    .edit_text(ctx.chat, message, &text, Some(&keyboard))
                    .await
                {
                    Ok(()) => return,
                    Err(err) => warn!(?err, message, "failed to edit page; sending a new one"),
                }
            }
        }
        self.show(ctx, &text, Some(&keyboard)).await;
    }

    async fn language_picker(&self, ctx: Ctx) {
        self.show(ctx, locale::text(ctx.lang, Key::ChooseLanguage), Some(&language_keyboard()))
            .await;
    }

    async fn loading(&self, ctx: Ctx) {
        self.show(ctx, locale::text(ctx.lang, Key::Loading), None).await;
    }

    async fn menu(&self, ctx: Ctx, key: Key) {
        self.menu_with(ctx, locale::text(ctx.lang, key)).await;
    }

    async fn menu_with(&self, ctx: Ctx, text: &str) {
        self.show(ctx, text, Some(&main_menu(ctx.lang))).await;
    }

    /// Replace the chat's tracked UI message with a new one.
    async fn show(&self, ctx: Ctx, text: &str, keyboard: Option<&Keyboard>) {
        if let Some(previous) = self.sessions.take_last_message(ctx.owner) {
            if let Err(err) = self.messenger().delete_message(ctx.chat, previous).await {
                warn!(?err, message = previous, "failed to delete previous message");
            }
        }
        match self.messenger().send_text(ctx.chat, text, keyboard).await {
            Ok(message) => self.sessions.set_last_message(ctx.owner, message),
            Err(err) => warn!(?err, "failed to send message"),
        }
    }
}

pub fn main_menu(lang: Lang) -> Keyboard {
    let entries = [
        MenuKey::Action(Action::ViewStory),
        MenuKey::Action(Action::ViewPost),
        MenuKey::Action(Action::Add),
        MenuKey::Action(Action::Remove),
        MenuKey::ListSubscriptions,
        MenuKey::Action(Action::CheckNow),
        MenuKey::ChooseLanguage,
    ];
    entries.into_iter().fold(Keyboard::default(), |kb, key| {
        let label = match key {
            MenuKey::Action(action) => action.label(),
            MenuKey::ListSubscriptions => Key::MySubscriptions,
            MenuKey::ChooseLanguage => Key::ChangeLanguage,
        };
        kb.row(vec![Button::new(locale::text(lang, label), key.callback())])
    })
}

fn cancel_keyboard(lang: Lang) -> Keyboard {
    Keyboard::default().row(vec![Button::new(
        locale::text(lang, Key::CancelAction),
        event::CANCEL,
    )])
}

fn language_keyboard() -> Keyboard {
    Keyboard::default().row(vec![
        Button::new("🇷🇺 Русский", event::lang_callback(Lang::Ru)),
        Button::new("🇬🇧 English", event::lang_callback(Lang::En)),
    ])
}

pub fn page_keyboard(lang: Lang, browse: &Browse) -> Keyboard {
    let window = pagination::window(browse.total_count, browse.items_per_page, browse.current_page);
    let numbers = window
        .indices
        .map(|n| Button::new(n.to_string(), event::select_callback(n)))
        .collect();

    let mut nav = Vec::with_capacity(3);
    if window.has_prev {
        nav.push(Button::new("◀️", event::PAGE_PREV));
    }
    if window.has_next {
        nav.push(Button::new("▶️", event::PAGE_NEXT));
    }
    nav.push(Button::new(locale::text(lang, Key::CancelAction), event::CANCEL));

    Keyboard::default().row(numbers).row(nav)
}
