//! Chat command grammar.
//!
//! A chat line like `!event schedule -d "bring snacks" "Game Night" "in 2 hours"`
//! is tokenized by [`eventbot_core::argv::parse`], the prefix token is dropped
//! and the rest is parsed here into an [`EventCommand`].

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "!event", no_binary_name = true, disable_version_flag = true)]
#[command(arg_required_else_help = true)]
struct CommandLine {
    #[command(subcommand)]
    command: EventCommand,
}

/// Commands understood after the prefix.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum EventCommand {
    /// Schedule a new event
    Schedule {
        /// Longer description shown with the event
        #[arg(short, long, default_value = "")]
        description: String,

        /// How long the event lasts, e.g. "2 hours"
        #[arg(long)]
        duration: Option<String>,

        /// Event name
        name: String,

        /// When it starts, e.g. "in 1 hour", "tomorrow 19:30"
        when: String,
    },

    /// List scheduled events
    List,

    /// Show an event and who is coming
    Show {
        /// Event id
        id: String,
    },

    /// Attend an event
    Attend {
        /// Event id
        id: String,
    },

    /// Skip an event
    Skip {
        /// Event id
        id: String,
    },

    /// Invite people to an event
    Invite {
        /// Event id
        id: String,

        /// People to invite, as mentions or user ids
        #[arg(required = true)]
        people: Vec<String>,
    },

    /// Cancel an event
    Cancel {
        /// Event id
        id: String,
    },
}

/// Parses the arguments that follow the command prefix.
///
/// # Errors
///
/// Returns the clap error for unknown commands, missing or extra arguments,
/// and `--help`; its `Display` output is suitable as a chat reply.
pub fn parse_command<I, T>(args: I) -> Result<EventCommand, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    CommandLine::try_parse_from(args).map(|line| line.command)
}

/// Extracts a user id from `<@id>`, `<@!id>` or a bare id.
pub fn parse_mention(target: &str) -> Option<&str> {
    let target = target.trim();
    let id = match target.strip_prefix("<@") {
        Some(inner) => {
            let inner = inner.strip_suffix('>')?;
            inner.strip_prefix('!').unwrap_or(inner)
        }
        None => target,
    };
    (!id.is_empty() && !id.contains(char::is_whitespace)).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_with_options() {
        let command = parse_command([
            "schedule",
            "-d",
            "bring snacks",
            "--duration",
            "2 hours",
            "Game Night",
            "in 1 hour",
        ])
        .unwrap();

        assert_eq!(
            command,
            EventCommand::Schedule {
                description: "bring snacks".to_string(),
                duration: Some("2 hours".to_string()),
                name: "Game Night".to_string(),
                when: "in 1 hour".to_string(),
            }
        );
    }

    #[test]
    fn schedule_defaults() {
        let command = parse_command(["schedule", "Test", "now"]).unwrap();
        assert_eq!(
            command,
            EventCommand::Schedule {
                description: String::new(),
                duration: None,
                name: "Test".to_string(),
                when: "now".to_string(),
            }
        );
    }

    #[test]
    fn id_commands() {
        assert_eq!(parse_command(["list"]).unwrap(), EventCommand::List);
        assert_eq!(
            parse_command(["show", "3"]).unwrap(),
            EventCommand::Show { id: "3".into() }
        );
        assert_eq!(
            parse_command(["attend", "3"]).unwrap(),
            EventCommand::Attend { id: "3".into() }
        );
        assert_eq!(
            parse_command(["skip", "3"]).unwrap(),
            EventCommand::Skip { id: "3".into() }
        );
        assert_eq!(
            parse_command(["cancel", "3"]).unwrap(),
            EventCommand::Cancel { id: "3".into() }
        );
    }

    #[test]
    fn invite_takes_many_people() {
        assert_eq!(
            parse_command(["invite", "3", "<@u1>", "u2"]).unwrap(),
            EventCommand::Invite {
                id: "3".into(),
                people: vec!["<@u1>".into(), "u2".into()],
            }
        );
        assert!(parse_command(["invite", "3"]).is_err());
    }

    #[test]
    fn bad_input_is_an_error() {
        assert!(parse_command(["frobnicate"]).is_err());
        assert!(parse_command(["schedule", "only-a-name"]).is_err());
        assert!(parse_command(["show", "1", "2"]).is_err());
        assert!(parse_command(Vec::<String>::new()).is_err());
    }

    #[test]
    fn help_renders_usage() {
        let err = parse_command(["--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        assert!(err.to_string().contains("schedule"));
    }

    #[test]
    fn mentions() {
        assert_eq!(parse_mention("<@123>"), Some("123"));
        assert_eq!(parse_mention("<@!123>"), Some("123"));
        assert_eq!(parse_mention("alice"), Some("alice"));
        assert_eq!(parse_mention("<@>"), None);
        assert_eq!(parse_mention("<@123"), None);
        assert_eq!(parse_mention(""), None);
    }
}
