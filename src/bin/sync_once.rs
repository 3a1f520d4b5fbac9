use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::Bot;
use tracing::{info, warn};

use insta_watchbot::config;
use insta_watchbot::db;
use insta_watchbot::messenger::TelegramMessenger;
use insta_watchbot::notify::{CountPolicy, Notifier};
use insta_watchbot::session::Sessions;
use insta_watchbot::source::HttpContentSource;
use insta_watchbot::sync::{SweepScope, SyncEngine};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Run one sweep over every subscription and exit"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Ignore the recency window and deliver everything past each cursor
    #[arg(long)]
    unbounded: bool,
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
        warn!(?err, "content source login failed; requests will retry it");
    }

    let bot = Bot::new(cfg.telegram.bot_token.clone());
    let notifier = Notifier::new(
        Arc::new(TelegramMessenger::new(bot)),
        CountPolicy {
            hidden_max: cfg.app.hidden_count_max,
        },
    );
    let window = if args.unbounded { None } else { cfg.recent_window() };
    let engine = SyncEngine::new(
        pool,
        Arc::new(source),
        notifier,
        Arc::new(Sessions::new(cfg.app.default_language)),
        window,
    );

    info!("starting one-off sweep");
    let report = engine.sweep(SweepScope::All).await;
    info!(
        checked = report.checked,
        posts = report.posts,
        stories = report.stories,
        failures = report.failures,
        "one-off sweep complete"
    );
    if report.failures > 0 {
        anyhow::bail!("{} subscription(s) failed to sync", report.failures);
    }
    Ok(())
}
