use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{info, warn};

use insta_watchbot::config;
use insta_watchbot::conversation::Conversation;
use insta_watchbot::db;
use insta_watchbot::handlers::{self, Access, BotState};
use insta_watchbot::messenger::TelegramMessenger;
use insta_watchbot::notify::{CountPolicy, Notifier};
use insta_watchbot::session::Sessions;
use insta_watchbot::source::{ContentSource, HttpContentSource};
use insta_watchbot::sync::SyncEngine;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let source = HttpContentSource::from_config(&cfg)?;
    if let Err(err) = source.restore_or_login().await {
        // Requests re-authenticate on demand.
        warn!(?err, "content source login failed at startup");
    }
    let source: Arc<dyn ContentSource> = Arc::new(source);

    let bot = Bot::new(cfg.telegram.bot_token.clone());
    let notifier = Notifier::new(
        Arc::new(TelegramMessenger::new(bot.clone())),
        CountPolicy {
            hidden_max: cfg.app.hidden_count_max,
        },
    );
    let sessions = Arc::new(Sessions::new(cfg.app.default_language));

    let engine = Arc::new(SyncEngine::new(
        pool.clone(),
        Arc::clone(&source),
        notifier.clone(),
        Arc::clone(&sessions),
        cfg.recent_window(),
    ));
    tokio::spawn(Arc::clone(&engine).run_forever(cfg.sync_interval()));

    let conversation = Conversation::new(
        pool,
        source,
        notifier,
        sessions,
        engine,
        cfg.conversation.blocked_handles.clone(),
    );
    let conversation = Arc::new(conversation);
    let state = Arc::new(BotState {
        conversation: Arc::clone(&conversation),
        access: Access::new(cfg.telegram.allowed_users.clone()),
    });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handlers::handle_message))
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback));

    info!("starting telegram bot");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    conversation.settle().await;

    Ok(())
}
