//! User-facing strings in every supported language.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Ru,
    En,
}

impl Lang {
    pub fn code(&self) -> &'static str {
        match self {
            Lang::Ru => "ru",
            Lang::En => "en",
        }
    }

    pub fn parse(code: &str) -> Option<Lang> {
        match code {
            "ru" => Some(Lang::Ru),
            "en" => Some(Lang::En),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ChooseLanguage,
    LangChosen,
    StartText,
    CancelDone,
    ViewStory,
    ViewPost,
    AddAccount,
    RemoveAccount,
    MySubscriptions,
    CheckNow,
    ChangeLanguage,
    CancelAction,
    AskUsernameAdd,
    AskUsernameRemove,
    AskUsernameStory,
    AskUsernamePost,
    AskUsernameCheck,
    NoSubs,
    SubsListHeader,
    SubsListError,
    FoundPublications,
    NoPublicationsUser,
    NoPublicationsPlain,
    PublicationsError,
    AddAccountSuccess,
    AddAccountError,
    RemoveAccountSuccess,
    RemoveAccountError,
    StoriesSent,
    StoriesError,
    StoriesNone,
    NotSubscribed,
    CheckDone,
    CheckError,
    UnknownAction,
    PickCommand,
    BotOwnerText,
    InvalidUsername,
    Loading,
    NewPostFrom,
    NewStoryFrom,
    LikesHidden,
    Likes,
    CommentsHidden,
    Comments,
}

/// Look up the template for `key`. Placeholders are `{name}`.
pub fn text(lang: Lang, key: Key) -> &'static str {
    match lang {
        Lang::Ru => ru(key),
        Lang::En => en(key),
    }
}

/// Look up `key` and substitute each `{name}` placeholder.
pub fn format(lang: Lang, key: Key, args: &[(&str, &str)]) -> String {
    let mut out = text(lang, key).to_string();
    for (name, value) in args {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}

fn ru(key: Key) -> &'static str {
    match key {
        Key::ChooseLanguage => "Choose a language:",
        Key::LangChosen => "Выбран язык: Русский.",
        Key::StartText => "👋 Привет! Я помогу тебе отслеживать публикации и истории в Instagram. Выбери действие:",
        Key::CancelDone => "❌ Действие отменено. Выбери другое действие:",
        Key::ViewStory => "📱 Посмотреть историю",
        Key::ViewPost => "📷 Посмотреть публикацию",
        Key::AddAccount => "➕ Добавить аккаунт",
        Key::RemoveAccount => "➖ Удалить аккаунт",
        Key::MySubscriptions => "📋 Мои подписки",
        Key::CheckNow => "🔄 Проверить сейчас",
        Key::ChangeLanguage => "🌍 Поменять язык",
        Key::CancelAction => "🔙 Назад",
        Key::AskUsernameAdd => "Введите никнейм аккаунта, который вы хотите добавить:",
        Key::AskUsernameRemove => "Введите никнейм аккаунта, который вы хотите удалить:",
        Key::AskUsernameStory => "Введите никнейм аккаунта, чтобы посмотреть его истории:",
        Key::AskUsernamePost => "🔍 Введите никнейм аккаунта, чтобы посмотреть его публикации:",
        Key::AskUsernameCheck => "Введите никнейм отслеживаемого аккаунта для проверки:",
        Key::NoSubs => "❌ У вас пока нет подписок.",
        Key::SubsListHeader => "Ваши подписки:\n",
        Key::SubsListError => "❌ Не удалось загрузить подписки. Попробуйте позже.",
        Key::FoundPublications => "📄 Найдено {count} публикаций. Выберите публикацию (страница {page}/{pages}):",
        Key::NoPublicationsUser => "❌ У аккаунта {username} нет доступных публикаций.",
        Key::NoPublicationsPlain => "❌ Не удалось загрузить публикацию. Попробуйте снова.",
        Key::PublicationsError => "❌ Не удалось получить публикации. Попробуйте позже.",
        Key::AddAccountSuccess => "✅ Аккаунт {username} добавлен.",
        Key::AddAccountError => "❌ Ошибка при добавлении. Попробуйте позже.",
        Key::RemoveAccountSuccess => "❌ Аккаунт {username} удалён.",
        Key::RemoveAccountError => "❌ Не удалось удалить аккаунт. Попробуйте позже.",
        Key::StoriesSent => "Все доступные истории отправлены!",
        Key::StoriesError => "❌ Не удалось получить истории. Попробуйте позже.",
        Key::StoriesNone => "❌ У аккаунта {username} нет доступных историй.",
        Key::NotSubscribed => "❌ Вы не подписаны на {username}.",
        Key::CheckDone => "✅ Проверка {username} завершена. Новых публикаций: {posts}, историй: {stories}.",
        Key::CheckError => "❌ Не удалось проверить обновления. Попробуйте позже.",
        Key::UnknownAction => "❌ Неизвестное действие. Возвращаюсь в главное меню.",
        Key::PickCommand => "Пожалуйста, выберите команду из меню:",
        Key::BotOwnerText => "Я не могу следить за своим создателем.",
        Key::InvalidUsername => "❌ Некорректный никнейм: {username}",
        Key::Loading => "Загрузка… Пожалуйста, подождите...",
        Key::NewPostFrom => "Новый пост от {username}:",
        Key::NewStoryFrom => "Новые истории от {username}",
        Key::LikesHidden => "Лайки: скрыты",
        Key::Likes => "👍 Лайков: {count}",
        Key::CommentsHidden => "Комментарии: скрыты",
        Key::Comments => "📝 Комментариев: {count}",
    }
}

fn en(key: Key) -> &'static str {
    match key {
        Key::ChooseLanguage => "Choose a language:",
        Key::LangChosen => "Language selected: English.",
        Key::StartText => "👋 Hello! I will help you track Instagram posts and stories. Choose an action:",
        Key::CancelDone => "❌ Action canceled. Choose another action:",
        Key::ViewStory => "📱 View story",
        Key::ViewPost => "📷 View publication",
        Key::AddAccount => "➕ Add account",
        Key::RemoveAccount => "➖ Delete account",
        Key::MySubscriptions => "📋 My subscriptions",
        Key::CheckNow => "🔄 Check now",
        Key::ChangeLanguage => "🌎 Change language",
        Key::CancelAction => "🔙 Back",
        Key::AskUsernameAdd => "Enter the username you want to add:",
        Key::AskUsernameRemove => "Enter the username you want to remove:",
        Key::AskUsernameStory => "Enter the username to view stories:",
        Key::AskUsernamePost => "🔍 Enter the username to view posts:",
        Key::AskUsernameCheck => "Enter a tracked username to check now:",
        Key::NoSubs => "❌ You have no subscriptions yet.",
        Key::SubsListHeader => "Your subscriptions:\n",
        Key::SubsListError => "❌ Could not load your subscriptions. Try later.",
        Key::FoundPublications => "📄 Found {count} publications. Choose one (page {page}/{pages}):",
        Key::NoPublicationsUser => "❌ This user has no available publications: {username}",
        Key::NoPublicationsPlain => "❌ Could not load the publication. Try again.",
        Key::PublicationsError => "❌ Could not retrieve publications. Try later.",
        Key::AddAccountSuccess => "✅ Account {username} has been added.",
        Key::AddAccountError => "❌ Unable to add account. Try later.",
        Key::RemoveAccountSuccess => "❌ Account {username} has been removed.",
        Key::RemoveAccountError => "❌ Could not remove the account. Try later.",
        Key::StoriesSent => "All available stories have been sent!",
        Key::StoriesError => "❌ Could not retrieve stories. Try later.",
        Key::StoriesNone => "❌ This user has no available stories: {username}",
        Key::NotSubscribed => "❌ You are not subscribed to {username}.",
        Key::CheckDone => "✅ Checked {username}. New posts: {posts}, stories: {stories}.",
        Key::CheckError => "❌ Could not check for updates. Try later.",
        Key::UnknownAction => "❌ Unknown action. Returning to main menu.",
        Key::PickCommand => "Please choose a command from the menu:",
        Key::BotOwnerText => "I cannot track my creator.",
        Key::InvalidUsername => "❌ Invalid username: {username}",
        Key::Loading => "Loading… Please wait...",
        Key::NewPostFrom => "New post from {username}:",
        Key::NewStoryFrom => "New stories from {username}",
        Key::LikesHidden => "Likes: hidden",
        Key::Likes => "👍 Likes: {count}",
        Key::CommentsHidden => "Comments: hidden",
        Key::Comments => "📝 Comments: {count}",
    }
}
