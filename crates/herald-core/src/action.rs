//! Actions that a scheduled trigger can fire.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A named piece of work bound to one or more daily triggers.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
  /// Refresh the remote dataset and push the report to every subscriber.
  DatasetBroadcast,
  /// Compact the store and send the uptime report to administrators.
  Maintenance,
  /// Send a random joke to every subscriber.
  Joke,
}

impl Action {
  /// Parse a configuration value such as `"dataset_broadcast"`.
  pub fn parse(s: &str) -> crate::Result<Self> {
    s.parse()
      .map_err(|_| crate::Error::UnknownAction(s.to_owned()))
  }
}
