//! Herald bot binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the
//! subscriber store, arms the daily triggers and answers Telegram commands
//! until interrupted.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chrono::Utc;
use clap::Parser;
use herald_bot::{
  BotConfig, CommandHandler, NotificationDispatcher, TelegramClient, Uptime, config::expand_tilde,
  telegram,
};
use herald_core::store::SubscriberStore as _;
use herald_feed::{DatasetCache, HttpDatasetSource, HttpJokeSource};
use herald_scheduler::TriggerScheduler;
use herald_store_sqlite::VersionedStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const TIMESTAMP: &str = "%Y-%m-%d %H:%M:%SZ";

#[derive(Parser)]
#[command(author, version, about = "Herald notification bot")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = BotConfig::load(&cli.config).context("failed to load configuration")?;
  let triggers = cfg.triggers().context("invalid trigger time")?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = VersionedStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let users = store.count_users().await.context("failed to count users")?;

  let client = TelegramClient::new(&cfg.telegram_token, cfg.fetch_timeout())
    .context("failed to build Telegram client")?;
  let me = client.get_me().await.context("Telegram getMe failed")?;
  let bot_name = me.username.clone().unwrap_or_else(|| me.first_name.clone());
  tracing::info!(id = me.id, name = %bot_name, users, "bot identity confirmed");

  let source = HttpDatasetSource::new(&cfg.dataset_url, cfg.fetch_timeout())
    .context("failed to build dataset client")?;
  let jokes = HttpJokeSource::new(&cfg.joke_url, cfg.joke_args.clone(), cfg.fetch_timeout())
    .context("failed to build joke client")?;

  let dispatcher = Arc::new(NotificationDispatcher::new(
    Arc::new(store),
    Arc::new(client.clone()),
    Arc::new(DatasetCache::new(source, cfg.cache_config())),
    Arc::new(jokes),
    Uptime::start(),
    cfg.fanout_concurrency,
  ));

  let scheduler = TriggerScheduler::new(triggers).start(dispatcher.clone());
  tracing::info!(triggers = scheduler.len(), "scheduler armed");

  let handler = Arc::new(CommandHandler::new(dispatcher.clone(), cfg.command_options()));

  let started = format!("'{bot_name}' started receiving at {}", Utc::now().format(TIMESTAMP));
  dispatcher.notify_admins(&started, false).await;

  tokio::select! {
    () = telegram::run_polling(client, handler) => {}
    signal = tokio::signal::ctrl_c() => {
      signal.context("failed to listen for shutdown signal")?;
      tracing::info!("shutdown requested");
    }
  }

  scheduler.shutdown();
  let stopped = format!("'{bot_name}' stopped at {}", Utc::now().format(TIMESTAMP));
  dispatcher.notify_admins(&stopped, true).await;

  Ok(())
}
