//! Bot command parsing.
//!
//! Arguments are whitespace separated; double quotes (straight or curly)
//! group words into one argument. A `@botname` suffix on the command word
//! is ignored.

use gatekeeper_types::{ChatId, GroupId, PolicyScope, UserId};
use thiserror::Error;

use crate::messages::{MANAGE_GROUPS_USAGE, POLICY_USAGE};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Groups,
    Stats,
    Ban(UserId),
    Unban(UserId),
    Decline { user: UserId, chat: ChatId },
    Redrive(UserId),
    ManageGroups(GroupAction),
    Policy(PolicyAction),
    Unknown(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupAction {
    Add {
        name: String,
        description: String,
        link: String,
    },
    Remove(GroupId),
    List,
    Refresh,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyAction {
    Show,
    Set {
        scope: PolicyScope,
        codes: Vec<String>,
    },
    Clear(PolicyScope),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Wrong shape; the payload is the usage text to show.
    #[error("{0}")]
    Usage(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Command {
    /// Parse a message text. `None` when the text is not a command.
    pub fn parse(text: &str) -> Option<Result<Command, CommandError>> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;
        let mut args = tokenize(body);
        if args.is_empty() {
            return None;
        }
        let word = args.remove(0);
        let name = word
            .split('@')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        Some(Self::from_parts(&name, &args))
    }

    fn from_parts(name: &str, args: &[String]) -> Result<Command, CommandError> {
        match name {
            "start" => Ok(Self::Start),
            "help" => Ok(Self::Help),
            "groups" => Ok(Self::Groups),
            "stats" => Ok(Self::Stats),
            "ban" => Ok(Self::Ban(single_user(args, "Usage: /ban <user_id>")?)),
            "unban" => Ok(Self::Unban(single_user(args, "Usage: /unban <user_id>")?)),
            "redrive" => Ok(Self::Redrive(single_user(args, "Usage: /redrive <user_id>")?)),
            "decline" => match args {
                [user, chat] => Ok(Self::Decline {
                    user: parse_arg(user)?,
                    chat: parse_arg(chat)?,
                }),
                _ => Err(CommandError::Usage("Usage: /decline <user_id> <chat_id>")),
            },
            "manage_groups" => GroupAction::parse(args).map(Self::ManageGroups),
            "policy" => PolicyAction::parse(args).map(Self::Policy),
            other => Ok(Self::Unknown(other.to_string())),
        }
    }

    /// Commands only the configured administrator may run.
    pub fn is_admin_only(&self) -> bool {
        matches!(
            self,
            Self::Stats
                | Self::Ban(_)
                | Self::Unban(_)
                | Self::Decline { .. }
                | Self::Redrive(_)
                | Self::ManageGroups(_)
                | Self::Policy(_)
        )
    }
}

impl GroupAction {
    fn parse(args: &[String]) -> Result<Self, CommandError> {
        let Some((action, rest)) = args.split_first() else {
            return Err(CommandError::Usage(MANAGE_GROUPS_USAGE));
        };
        match (action.to_ascii_lowercase().as_str(), rest) {
            ("add", [name, description, link]) => Ok(Self::Add {
                name: name.clone(),
                description: description.clone(),
                link: link.clone(),
            }),
            ("remove", [id]) => Ok(Self::Remove(parse_arg(id)?)),
            ("list", []) => Ok(Self::List),
            ("refresh", []) => Ok(Self::Refresh),
            _ => Err(CommandError::Usage(MANAGE_GROUPS_USAGE)),
        }
    }
}

impl PolicyAction {
    fn parse(args: &[String]) -> Result<Self, CommandError> {
        match args {
            [] => Ok(Self::Show),
            [action] if action.eq_ignore_ascii_case("show") => Ok(Self::Show),
            [action, scope, codes @ ..] if action.eq_ignore_ascii_case("set") && !codes.is_empty() => {
                Ok(Self::Set {
                    scope: parse_arg(scope)?,
                    codes: codes
                        .iter()
                        .flat_map(|c| c.split(','))
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(str::to_string)
                        .collect(),
                })
            }
            [action, scope] if action.eq_ignore_ascii_case("clear") => {
                Ok(Self::Clear(parse_arg(scope)?))
            }
            _ => Err(CommandError::Usage(POLICY_USAGE)),
        }
    }
}

fn single_user(args: &[String], usage: &'static str) -> Result<UserId, CommandError> {
    match args {
        [id] => parse_arg(id),
        _ => Err(CommandError::Usage(usage)),
    }
}

fn parse_arg<T>(raw: &str) -> Result<T, CommandError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| CommandError::InvalidArgument(format!("{raw}: {e}")))
}

/// Split on whitespace, keeping quoted runs together.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_token = false;

    for ch in input.chars() {
        match ch {
            '"' | '\u{201C}' | '\u{201D}' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}
