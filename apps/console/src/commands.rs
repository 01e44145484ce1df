//! Console command parsing.

use shared::domain::{PostDraft, PostId};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  home                      show the intelligence feed
  open <id>                 show one report
  admin                     open the admin dashboard (login when signed out)
  login <user> <password>   start a session
  logout                    end the session
  publish                   compose and publish a report
  delete <id>               expunge a report
  refresh                   reload the feed
  help                      show this list
  quit                      leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Home,
    Open(PostId),
    Admin,
    Login { username: String, password: String },
    Logout,
    Publish,
    Delete(PostId),
    Refresh,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("unknown command {0:?}; type `help`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid report id {0:?}")]
    InvalidId(String),
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, ParseError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err(ParseError::Empty);
    };
    let args: Vec<&str> = words.collect();

    let command = match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("home", []) => ConsoleCommand::Home,
        ("open", [id]) => ConsoleCommand::Open(parse_id(id)?),
        ("open", _) => return Err(ParseError::Usage("open <id>")),
        ("admin", []) => ConsoleCommand::Admin,
        ("login", [username, password]) => ConsoleCommand::Login {
            username: (*username).to_string(),
            password: (*password).to_string(),
        },
        ("login", _) => return Err(ParseError::Usage("login <user> <password>")),
        ("logout", []) => ConsoleCommand::Logout,
        ("publish", []) => ConsoleCommand::Publish,
        ("delete", [id]) => ConsoleCommand::Delete(parse_id(id)?),
        ("delete", _) => return Err(ParseError::Usage("delete <id>")),
        ("refresh", []) => ConsoleCommand::Refresh,
        ("help" | "?", _) => ConsoleCommand::Help,
        ("quit" | "exit", _) => ConsoleCommand::Quit,
        _ => return Err(ParseError::Unknown(line.trim().to_string())),
    };
    Ok(command)
}

fn parse_id(raw: &str) -> Result<PostId, ParseError> {
    raw.trim_start_matches('#')
        .parse::<i64>()
        .map(PostId)
        .map_err(|_| ParseError::InvalidId(raw.to_string()))
}

/// Splits the comma-separated attachment prompt answer.
pub fn parse_attachments(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Prompt labels for the compose form, each defaulting to the kept draft's value.
pub fn compose_fields(previous: &PostDraft) -> [(&'static str, &str); 3] {
    [
        ("title", previous.title.as_str()),
        ("author", previous.author.as_str()),
        ("content", previous.content.as_str()),
    ]
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
