//! Runtime configuration, deserialised from `config.toml` and `HERALD_*`
//! environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use herald_core::action::Action;
use herald_feed::{CacheConfig, Staleness};
use herald_scheduler::Trigger;
use serde::Deserialize;

use crate::handler::CommandOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
  pub store_path:            PathBuf,
  pub telegram_token:        String,
  pub dataset_url:           String,
  #[serde(default = "default_region")]
  pub dataset_region:        String,
  #[serde(default = "default_fetch_timeout_secs")]
  pub fetch_timeout_secs:    u64,
  #[serde(default = "default_fanout_concurrency")]
  pub fanout_concurrency:    usize,
  /// `HH:MM:SS` (UTC) times of the daily dataset broadcast.
  #[serde(default)]
  pub broadcast_at:          Vec<String>,
  #[serde(default)]
  pub maintenance_at:        Vec<String>,
  #[serde(default)]
  pub joke_at:               Vec<String>,
  #[serde(default)]
  pub first_user_gets_admin: bool,
  #[serde(default = "default_pics_dir")]
  pub pics_dir:              PathBuf,
  #[serde(default = "default_joke_url")]
  pub joke_url:              String,
  #[serde(default)]
  pub joke_args:             Vec<String>,
}

fn default_region() -> String { "Europe".into() }
fn default_fetch_timeout_secs() -> u64 { 60 }
fn default_fanout_concurrency() -> usize { 8 }
fn default_pics_dir() -> PathBuf { PathBuf::from("pics") }
fn default_joke_url() -> String { "http://rzhunemogu.ru/Rand.aspx?CType=".into() }

/// Trigger lists, read from the environment as comma-separated values.
const ENV_LIST_KEYS: [&str; 3] = ["broadcast_at", "maintenance_at", "joke_at"];

fn environment() -> config::Environment {
  ENV_LIST_KEYS.iter().fold(
    config::Environment::with_prefix("HERALD").try_parsing(true).list_separator(","),
    |env, key| env.with_list_parse_key(key),
  )
}

impl BotConfig {
  /// Layer the optional file at `path` with `HERALD_*` environment variables.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    Self::load_with(path, environment())
  }

  fn load_with(path: &Path, env: config::Environment) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(env)
      .build()?
      .try_deserialize()
  }

  pub fn fetch_timeout(&self) -> Duration { Duration::from_secs(self.fetch_timeout_secs.max(1)) }

  pub fn cache_config(&self) -> CacheConfig {
    CacheConfig {
      region:        self.dataset_region.clone(),
      fetch_timeout: self.fetch_timeout(),
      staleness:     Staleness::CalendarDay,
    }
  }

  pub fn command_options(&self) -> CommandOptions {
    CommandOptions {
      first_user_gets_admin: self.first_user_gets_admin,
      pics_dir:              expand_tilde(&self.pics_dir),
    }
  }

  /// Every configured trigger, in configuration order.
  pub fn triggers(&self) -> Result<Vec<Trigger>, herald_scheduler::Error> {
    [
      (Action::DatasetBroadcast, &self.broadcast_at),
      (Action::Maintenance, &self.maintenance_at),
      (Action::Joke, &self.joke_at),
    ]
    .into_iter()
    .flat_map(|(action, times)| times.iter().map(move |at| Trigger::parse(at, action)))
    .collect()
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use chrono::NaiveTime;

  use super::*;

  fn load(toml: &str) -> BotConfig {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(toml.as_bytes()).unwrap();
    BotConfig::load(file.path()).unwrap()
  }

  #[test]
  fn minimal_file_gets_defaults() {
    let cfg = load(
      r#"
        store_path     = "/tmp/herald.db"
        telegram_token = "123:abc"
        dataset_url    = "https://example.org/data.json"
      "#,
    );
    assert_eq!(cfg.dataset_region, "Europe");
    assert_eq!(cfg.fetch_timeout(), Duration::from_secs(60));
    assert_eq!(cfg.fanout_concurrency, 8);
    assert!(cfg.joke_url.starts_with("http://"));
    assert!(!cfg.first_user_gets_admin);
    assert!(cfg.triggers().unwrap().is_empty());
  }

  #[test]
  fn triggers_are_collected_per_action() {
    let cfg = load(
      r#"
        store_path     = "/tmp/herald.db"
        telegram_token = "123:abc"
        dataset_url    = "https://example.org/data.json"
        broadcast_at   = ["08:00:00", "20:00:00"]
        maintenance_at = ["03:30:00"]
        joke_at        = ["12:00:00"]
      "#,
    );
    let triggers = cfg.triggers().unwrap();
    assert_eq!(triggers.len(), 4);
    assert_eq!(triggers[0].action, Action::DatasetBroadcast);
    let half_past_three = NaiveTime::from_hms_opt(3, 30, 0).unwrap();
    assert_eq!(triggers[2], Trigger::new(half_past_three, Action::Maintenance));
    assert_eq!(triggers[3].action, Action::Joke);
  }

  #[test]
  fn environment_overrides_file_and_splits_trigger_lists() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(b"store_path = \"/tmp/herald.db\"\njoke_at = [\"09:00:00\"]\n").unwrap();
    let vars: config::Map<String, String> = [
      ("HERALD_TELEGRAM_TOKEN", "123:abc"),
      ("HERALD_DATASET_URL", "https://example.org/data.json"),
      ("HERALD_FETCH_TIMEOUT_SECS", "15"),
      ("HERALD_FIRST_USER_GETS_ADMIN", "true"),
      ("HERALD_BROADCAST_AT", "08:00:00,20:00:00"),
      ("HERALD_JOKE_AT", "12:00:00"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect();

    let cfg = BotConfig::load_with(file.path(), environment().source(Some(vars))).unwrap();
    assert_eq!(cfg.telegram_token, "123:abc");
    assert_eq!(cfg.fetch_timeout(), Duration::from_secs(15));
    assert!(cfg.first_user_gets_admin);
    assert_eq!(cfg.broadcast_at, ["08:00:00", "20:00:00"]);
    assert_eq!(cfg.joke_at, ["12:00:00"]);
    assert_eq!(cfg.triggers().unwrap().len(), 3);
  }

  #[test]
  fn bad_trigger_time_is_reported() {
    let cfg = load(
      r#"
        store_path     = "/tmp/herald.db"
        telegram_token = "123:abc"
        dataset_url    = "https://example.org/data.json"
        joke_at        = ["noon"]
      "#,
    );
    assert!(cfg.triggers().is_err());
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/pics")), PathBuf::from(home).join("pics"));
    assert_eq!(expand_tilde(Path::new("/srv/pics")), PathBuf::from("/srv/pics"));
  }
}
