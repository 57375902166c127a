//! Chat commands.

/// A parsed chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Start,
  Stop,
  Help,
  Uptime,
  Date,
  Pic,
  /// `/corona [-override]`: the flag forces a refetch.
  Corona { force: bool },
  /// `/fuelcost [distance] [efficiency] [price]`, arguments unparsed.
  FuelCost { args: Vec<String> },
  Joke,
  Unknown(String),
}

impl Command {
  /// Parse on the first whitespace-separated token, case-insensitively.
  /// A `@botname` suffix on the command (group chats) is ignored.
  pub fn parse(text: &str) -> Self {
    let mut tokens = text.split_whitespace();
    let Some(head) = tokens.next() else {
      return Self::Unknown(String::new());
    };
    let name = head.split('@').next().unwrap_or(head).to_lowercase();

    match name.as_str() {
      "/start" => Self::Start,
      "/stop" => Self::Stop,
      "/help" => Self::Help,
      "/uptime" => Self::Uptime,
      "/date" => Self::Date,
      "/pic" => Self::Pic,
      "/corona" => Self::Corona { force: tokens.any(|t| t.eq_ignore_ascii_case("-override")) },
      "/fuelcost" => Self::FuelCost { args: tokens.map(str::to_owned).collect() },
      "/joke" => Self::Joke,
      _ => Self::Unknown(head.to_owned()),
    }
  }
}

pub const HELP: &str = "This bot supports following commands:\n\
  <b>/start</b> - subscribe to receive messages from the bot;\n\
  <b>/stop</b> - stop receiving messages from the bot;\n\
  <b>/help</b> - display help info;\n\
  <b>/uptime</b> - display service uptime info;\n\
  <b>/date</b> - show current date in UTC format;\n\
  <b>/pic</b> - receive random picture;\n\
  <b>/corona</b> - get current corona situation update;\n\
  <b>/joke</b> - get random joke;\n\
  <b>/fuelcost</b> - fuel consumption calculator.";

pub const UNKNOWN: &str = "Unknown command detected.\nType in /help to display help info";
