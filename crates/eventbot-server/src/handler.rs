//! Chat command dispatch.
//!
//! [`CommandHandler::handle`] takes one chat message, ignores it unless it
//! starts with the command prefix, and returns the reply to post back.
//! Every mutation holds the store write lock for its whole read-modify-write.

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone, Utc};
use tracing::{Span, debug, info, warn};

use eventbot_core::{EventRecord, WhenError, argv, humanize, parse_duration, parse_when};

use crate::command::{EventCommand, parse_command, parse_mention};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::notify::mention;
use crate::scheduler::{ArmOutcome, Scheduler};
use crate::store::SharedStore;

/// An incoming chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub author_id: String,
    pub channel_id: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(
        author_id: impl Into<String>,
        channel_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            author_id: author_id.into(),
            channel_id: channel_id.into(),
            content: content.into(),
        }
    }
}

/// Text to post in a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub channel_id: String,
    pub text: String,
}

/// Routes chat commands to event operations.
pub struct CommandHandler {
    store: SharedStore,
    scheduler: Scheduler,
    config: ServerConfig,
}

impl CommandHandler {
    pub fn new(store: SharedStore, scheduler: Scheduler, config: ServerConfig) -> Self {
        Self {
            store,
            scheduler,
            config,
        }
    }

    /// Returns the text after the command prefix, or `None` if `content` is
    /// not a command.
    pub fn strip_prefix<'a>(&self, content: &'a str) -> Option<&'a str> {
        let rest = content
            .trim_start()
            .strip_prefix(self.config.command_prefix.as_str())?;
        (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(rest)
    }

    /// Handles one chat message. Returns `None` for non-command messages.
    #[tracing::instrument(
        skip(self, message),
        fields(author = %message.author_id, channel = %message.channel_id, command, duration_ms)
    )]
    pub async fn handle(&self, message: &ChatMessage) -> Option<Reply> {
        let rest = self.strip_prefix(&message.content)?;
        let started = std::time::Instant::now();

        let text = match argv::parse(rest) {
            Err(e) => {
                debug!(error = %e, "Could not tokenize command");
                e.to_string()
            }
            Ok(args) => match parse_command(&args) {
                Err(e) => {
                    debug!(kind = ?e.kind(), "Could not parse command");
                    e.to_string().trim_end().to_string()
                }
                Ok(command) => {
                    Span::current().record("command", tracing::field::debug(&command));
                    match self.execute(command, message).await {
                        Ok(text) => text,
                        Err(e) if e.is_user_facing() => e.to_string(),
                        Err(e) => {
                            warn!(error = %e, "Command failed");
                            format!("Something went wrong: {e}")
                        }
                    }
                }
            },
        };

        Span::current().record("duration_ms", started.elapsed().as_millis() as u64);
        Some(Reply {
            channel_id: message.channel_id.clone(),
            text,
        })
    }

    async fn execute(&self, command: EventCommand, message: &ChatMessage) -> ServerResult<String> {
        match command {
            EventCommand::Schedule {
                description,
                duration,
                name,
                when,
            } => {
                self.schedule(message, name, description, &when, duration.as_deref())
                    .await
            }
            EventCommand::List => Ok(self.list().await),
            EventCommand::Show { id } => self.show(&id).await,
            EventCommand::Attend { id } => {
                let (event, ()) = self
                    .mutate(&id, |event| event.add_attendee(&message.author_id))
                    .await?;
                Ok(join_lines(
                    format!(
                        "Attending (#{}) **{}** {}",
                        event.id(),
                        event.name,
                        starting_phrase(&event)
                    ),
                    attendance_lines(&event),
                ))
            }
            EventCommand::Skip { id } => {
                let (event, ()) = self
                    .mutate(&id, |event| event.add_skipper(&message.author_id))
                    .await?;
                Ok(join_lines(
                    format!(
                        "Skipping (#{}) **{}** {}",
                        event.id(),
                        event.name,
                        starting_phrase(&event)
                    ),
                    attendance_lines(&event),
                ))
            }
            EventCommand::Invite { id, people } => self.invite(&id, &people).await,
            EventCommand::Cancel { id } => self.cancel(&id).await,
        }
    }

    async fn schedule(
        &self,
        message: &ChatMessage,
        name: String,
        description: String,
        when: &str,
        duration: Option<&str>,
    ) -> ServerResult<String> {
        let now = Local::now();
        let start = parse_when(when, &now)?;
        if start <= Utc::now() {
            return Err(ServerError::PastSchedule { start });
        }

        let end = match duration {
            Some(text) => Some(end_time(start, parse_duration(text)?, text)?),
            None => match self
                .config
                .default_event_length
                .and_then(|d| chrono::Duration::from_std(d).ok())
            {
                Some(length) => Some(end_time(start, length, when)?),
                None => None,
            },
        };

        let event = {
            let mut store = self.store.write().await;
            let mut event = EventRecord::new(
                store.next_event_id()?,
                name,
                description,
                start,
                &message.author_id,
                &message.channel_id,
            );
            if let Some(end) = end {
                event = event.with_end_time(end);
            }
            if let Err(e) = store.upsert_event(event.clone()) {
                warn!(event_id = event.id(), error = %e, "Failed to persist new event");
            }
            event
        };

        let outcome = self.scheduler.arm(&event).await;
        info!(event_id = event.id(), name = %event.name, ?outcome, "Scheduled event");
        ensure_armed(outcome, &event)?;

        let mut lines = vec![
            format!(
                "Scheduled (#{}) **{}** _{}_ from now",
                event.id(),
                event.name,
                humanize(event.time_until_start())
            ),
            created_by_line(&event),
        ];
        lines.extend(description_lines(&event));
        Ok(lines.join("\n"))
    }

    async fn list(&self) -> String {
        let events = self.store.read().await.get_events().to_vec();
        render_list(&events, &Local::now())
    }

    async fn show(&self, id: &str) -> ServerResult<String> {
        let event = self
            .store
            .read()
            .await
            .get_event(id)
            .cloned()
            .ok_or_else(|| ServerError::not_found(id))?;

        let mut lines = vec![
            format!(
                "**(#{}) {}** {}",
                event.id(),
                event.name,
                starting_phrase(&event)
            ),
            created_by_line(&event),
        ];
        lines.extend(description_lines(&event));
        if let Some(end) = event.end_time() {
            lines.push(format!("Lasts: _{}_", humanize(end - event.start_time())));
        }
        lines.extend(attendance_lines(&event));
        Ok(lines.join("\n"))
    }

    async fn invite(&self, id: &str, people: &[String]) -> ServerResult<String> {
        let (event, invited) = self
            .mutate(id, |event| {
                people
                    .iter()
                    .filter_map(|person| parse_mention(person))
                    .filter(|user| event.add_invited_if_not_already(user))
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .await?;
        debug!(event_id = id, invited = invited.len(), "Invited users");

        let headline = if invited.is_empty() {
            format!(
                "All users were already invited to (#{}) **{}** {}",
                event.id(),
                event.name,
                starting_phrase(&event)
            )
        } else {
            let names: Vec<String> = invited.iter().map(|u| mention(u)).collect();
            format!(
                "Invited {} to (#{}) **{}** {}",
                names.join(","),
                event.id(),
                event.name,
                starting_phrase(&event)
            )
        };
        Ok(join_lines(headline, attendance_lines(&event)))
    }

    async fn cancel(&self, id: &str) -> ServerResult<String> {
        let event = {
            let mut store = self.store.write().await;
            let event = store
                .get_event(id)
                .cloned()
                .ok_or_else(|| ServerError::not_found(id))?;
            self.scheduler.cancel_timers(id);
            if let Err(e) = store.remove_event(id) {
                warn!(event_id = id, error = %e, "Failed to persist cancelled event removal");
            }
            event
        };
        info!(event_id = id, name = %event.name, "Cancelled event");
        Ok(format!("Cancelled (#{}) **{}**", event.id(), event.name))
    }

    /// Applies `f` to a copy of the event and stores the result.
    async fn mutate<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut EventRecord) -> T,
    ) -> ServerResult<(EventRecord, T)> {
        let mut store = self.store.write().await;
        let mut event = store
            .get_event(id)
            .cloned()
            .ok_or_else(|| ServerError::not_found(id))?;
        let out = f(&mut event);
        if let Err(e) = store.upsert_event(event.clone()) {
            warn!(event_id = id, error = %e, "Failed to persist event update");
        }
        Ok((event, out))
    }
}

fn end_time(
    start: DateTime<Utc>,
    length: chrono::Duration,
    input: &str,
) -> ServerResult<DateTime<Utc>> {
    start
        .checked_add_signed(length)
        .ok_or_else(|| WhenError::OutOfRange(input.trim().to_string()).into())
}

/// A start that passed between parsing and arming means the scheduler has
/// already dropped the event.
fn ensure_armed(outcome: ArmOutcome, event: &EventRecord) -> ServerResult<()> {
    match outcome {
        ArmOutcome::Expired => Err(ServerError::PastSchedule {
            start: event.start_time(),
        }),
        ArmOutcome::Armed | ArmOutcome::AlreadyArmed => Ok(()),
    }
}

fn join_lines(first: String, rest: Vec<String>) -> String {
    std::iter::once(first)
        .chain(rest)
        .collect::<Vec<_>>()
        .join("\n")
}

fn starting_phrase(event: &EventRecord) -> String {
    let until = event.time_until_start();
    if until > chrono::Duration::zero() {
        format!("starting _{}_ from now", humanize(until))
    } else {
        format!("started _{}_ ago", humanize(until))
    }
}

fn created_by_line(event: &EventRecord) -> String {
    format!("Created by: _{}_", mention(event.creator_id()))
}

fn description_lines(event: &EventRecord) -> Vec<String> {
    if event.description.is_empty() {
        Vec::new()
    } else {
        vec![format!("Description: _{}_", event.description)]
    }
}

fn attendance_lines(event: &EventRecord) -> Vec<String> {
    if event.attending().is_empty() && event.invited().is_empty() && event.skipping().is_empty() {
        return Vec::new();
    }
    let mut out = vec!["Attendance:".to_string()];
    out.extend(
        event
            .attending()
            .iter()
            .map(|u| format!("  - **{}** :white_check_mark:", mention(u))),
    );
    out.extend(
        event
            .invited()
            .iter()
            .map(|u| format!("  - **{}** :question:", mention(u))),
    );
    out.extend(
        event
            .skipping()
            .iter()
            .map(|u| format!("  - ~~{}~~ :x:", mention(u))),
    );
    out
}

/// Renders events grouped by calendar day in `now`'s timezone.
fn render_list<Tz>(events: &[EventRecord], now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if events.is_empty() {
        return "No events are currently scheduled.\nTry `!event schedule \"Test\" \"in 1 hour\"`"
            .to_string();
    }

    let tz = now.timezone();
    let mut sorted: Vec<&EventRecord> = events.iter().collect();
    sorted.sort_by_key(|e| e.start_time());

    let mut lines = vec!["**Events:**".to_string()];
    let mut current_day = String::new();
    for event in sorted {
        let local = event.start_time().with_timezone(&tz);
        let day = local.format("%A, %b %-d %Y").to_string();
        if day != current_day {
            lines.push(String::new());
            lines.push(day.clone());
            current_day = day;
        }
        lines.push(format!(
            "  (#{}) **{}** at {}",
            event.id(),
            event.name,
            local.format("%-I:%M %P")
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "Current time is {}",
        now.format("%A, %b %-d %Y, %-I:%M %P")
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::notify::{ChannelNotifier, Notice};
    use crate::store::{EventStore, new_shared_store};
    use eventbot_core::Participation;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Fixture {
        handler: CommandHandler,
        store: SharedStore,
        scheduler: Scheduler,
        _notices: UnboundedReceiver<Notice>,
    }

    fn fixture(config: ServerConfig) -> Fixture {
        let store = new_shared_store(EventStore::in_memory());
        let (notifier, notices) = ChannelNotifier::new();
        let scheduler = Scheduler::new(store.clone(), Arc::new(notifier));
        Fixture {
            handler: CommandHandler::new(store.clone(), scheduler.clone(), config),
            store,
            scheduler,
            _notices: notices,
        }
    }

    async fn say(f: &Fixture, author: &str, content: &str) -> String {
        f.handler
            .handle(&ChatMessage::new(author, "general", content))
            .await
            .map(|r| r.text)
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn ignores_non_commands() {
        let f = fixture(ServerConfig::in_memory());
        let message = ChatMessage::new("u1", "general", "hello there");
        assert!(f.handler.handle(&message).await.is_none());
        let message = ChatMessage::new("u1", "general", "!eventually");
        assert!(f.handler.handle(&message).await.is_none());
    }

    #[tokio::test]
    async fn reply_goes_to_source_channel() {
        let f = fixture(ServerConfig::in_memory());
        let reply = f
            .handler
            .handle(&ChatMessage::new("u1", "games", "!event list"))
            .await
            .unwrap();
        assert_eq!(reply.channel_id, "games");
    }

    #[tokio::test]
    async fn schedule_creates_and_arms() {
        let f = fixture(ServerConfig::in_memory());
        let text = say(
            &f,
            "u1",
            r#"!event schedule -d "bring snacks" "Game Night" "in 2 hours""#,
        )
        .await;

        assert!(
            text.starts_with("Scheduled (#0) **Game Night** _"),
            "unexpected reply: {text}"
        );
        assert!(text.contains("Created by: _<@u1>_"));
        assert!(text.contains("Description: _bring snacks_"));

        let store = f.store.read().await;
        let event = store.get_event("0").unwrap();
        assert_eq!(event.creator_id(), "u1");
        assert_eq!(event.channel_id, "general");
        assert!(event.end_time().is_none());
        assert!(f.scheduler.is_armed("0"));
        f.scheduler.shutdown();
    }

    #[tokio::test]
    async fn schedule_rejects_past_times() {
        let f = fixture(ServerConfig::in_memory());
        let text = say(&f, "u1", r#"!event schedule Old "2000-01-01T00:00:00Z""#).await;

        assert!(text.starts_with("I can't schedule an event in the past!"));
        assert!(f.store.read().await.is_empty());
        assert_eq!(f.scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn schedule_rejects_unknown_when() {
        let f = fixture(ServerConfig::in_memory());
        let text = say(&f, "u1", r#"!event schedule Test "whenever""#).await;
        assert_eq!(text, r#"I don't understand when "whenever" is"#);
        assert!(f.store.read().await.is_empty());
    }

    #[tokio::test]
    async fn schedule_sets_end_time() {
        let f = fixture(
            ServerConfig::in_memory().with_default_event_length(Some(Duration::from_secs(3600))),
        );
        say(&f, "u1", r#"!event schedule A "in 1 hour""#).await;
        say(&f, "u1", r#"!event schedule --duration 30m B "in 1 hour""#).await;

        let store = f.store.read().await;
        let a = store.get_event("0").unwrap();
        let b = store.get_event("1").unwrap();
        assert_eq!(a.end_time(), Some(a.start_time() + chrono::Duration::hours(1)));
        assert_eq!(b.end_time(), Some(b.start_time() + chrono::Duration::minutes(30)));
        f.scheduler.shutdown();
    }

    #[tokio::test]
    async fn schedule_rejects_times_beyond_the_calendar() {
        let f = fixture(ServerConfig::in_memory());
        let cases = [
            (
                r#"!event schedule X "in 20000000 weeks""#,
                r#""in 20000000 weeks" is too far away"#,
            ),
            (
                r#"!event schedule X "in 10000000000 weeks 10000000000 weeks""#,
                r#""in 10000000000 weeks 10000000000 weeks" is too far away"#,
            ),
            (
                r#"!event schedule --duration "13000000 weeks" X "in 13000000 weeks""#,
                r#""13000000 weeks" is too far away"#,
            ),
        ];
        for (command, reply) in cases {
            assert_eq!(say(&f, "u1", command).await, reply, "for {command}");
        }
        assert!(f.store.read().await.is_empty());
        assert_eq!(f.scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn schedule_reports_exhausted_ids() {
        let f = fixture(ServerConfig::in_memory());
        let last = EventRecord::new(
            u64::MAX.to_string(),
            "Last",
            "",
            Utc::now() + chrono::Duration::hours(1),
            "u1",
            "general",
        );
        f.store.write().await.upsert_event(last).unwrap();

        let text = say(&f, "u1", r#"!event schedule Next "in 1 hour""#).await;
        assert_eq!(text, "Something went wrong: Store error: no event ids left");
        assert_eq!(f.store.read().await.len(), 1);
        assert_eq!(f.scheduler.pending(), 0);
    }

    #[test]
    fn expired_arming_is_a_past_schedule() {
        let start = Utc::now() - chrono::Duration::seconds(1);
        let event = EventRecord::new("0", "Gone", "", start, "u1", "general");

        let err = ensure_armed(ArmOutcome::Expired, &event).unwrap_err();
        assert!(matches!(err, ServerError::PastSchedule { start: s } if s == start));
        assert!(err.is_user_facing());
        assert!(ensure_armed(ArmOutcome::Armed, &event).is_ok());
        assert!(ensure_armed(ArmOutcome::AlreadyArmed, &event).is_ok());
    }

    #[tokio::test]
    async fn tokenizer_errors_are_replies() {
        let f = fixture(ServerConfig::in_memory());
        let text = say(&f, "u1", r#"!event schedule "Game Night in 1 hour"#).await;
        assert_eq!(text, "unterminated double quote in command");
        assert!(f.store.read().await.is_empty());
    }

    #[tokio::test]
    async fn argument_errors_are_replies() {
        let f = fixture(ServerConfig::in_memory());
        let text = say(&f, "u1", "!event frobnicate").await;
        assert!(text.contains("frobnicate"), "unexpected reply: {text}");
    }

    #[tokio::test]
    async fn unknown_id() {
        let f = fixture(ServerConfig::in_memory());
        for command in ["show 9", "attend 9", "skip 9", "invite 9 u2", "cancel 9"] {
            let text = say(&f, "u1", &format!("!event {command}")).await;
            assert_eq!(text, "Sorry, I couldn't find that event.", "for {command}");
        }
    }

    #[tokio::test]
    async fn attend_skip_scenario() {
        let f = fixture(ServerConfig::in_memory());
        say(&f, "u1", r#"!event schedule E "in 10 minutes""#).await;

        let text = say(&f, "u2", "!event attend 0").await;
        assert!(text.starts_with("Attending (#0) **E** starting _"));
        assert!(text.contains("  - **<@u2>** :white_check_mark:"));

        let text = say(&f, "u1", "!event skip 0").await;
        assert!(text.starts_with("Skipping (#0) **E**"));
        assert!(text.contains("  - ~~<@u1>~~ :x:"));

        let store = f.store.read().await;
        let event = store.get_event("0").unwrap();
        assert_eq!(event.attending(), ["u2"]);
        assert_eq!(event.skipping(), ["u1"]);
        assert!(event.invited().is_empty());
        f.scheduler.shutdown();
    }

    #[tokio::test]
    async fn invite_reports_new_invites_only() {
        let f = fixture(ServerConfig::in_memory());
        say(&f, "u1", r#"!event schedule E "in 10 minutes""#).await;

        let text = say(&f, "u1", "!event invite 0 <@u2> <@!u3> u1").await;
        assert!(text.starts_with("Invited <@u2>,<@u3> to (#0) **E**"), "{text}");
        assert!(text.contains("  - **<@u2>** :question:"));

        let text = say(&f, "u1", "!event invite 0 u2 u3").await;
        assert!(text.starts_with("All users were already invited to (#0) **E**"));

        let store = f.store.read().await;
        let event = store.get_event("0").unwrap();
        assert_eq!(event.participation("u1"), Some(Participation::Attending));
        assert_eq!(event.invited(), ["u2", "u3"]);
        f.scheduler.shutdown();
    }

    #[tokio::test]
    async fn show_includes_details() {
        let f = fixture(ServerConfig::in_memory());
        say(&f, "u1", r#"!event schedule -d "snacks" --duration 2h E "in 10 minutes""#).await;

        let text = say(&f, "u2", "!event show 0").await;
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("**(#0) E** starting _"));
        assert_eq!(lines[1], "Created by: _<@u1>_");
        assert_eq!(lines[2], "Description: _snacks_");
        assert_eq!(lines[3], "Lasts: _2 hours_");
        assert_eq!(lines[4], "Attendance:");
        assert_eq!(lines[5], "  - **<@u1>** :white_check_mark:");
        f.scheduler.shutdown();
    }

    #[tokio::test]
    async fn cancel_removes_and_disarms() {
        let f = fixture(ServerConfig::in_memory());
        say(&f, "u1", r#"!event schedule E "in 10 minutes""#).await;
        assert!(f.scheduler.is_armed("0"));

        let text = say(&f, "u2", "!event cancel 0").await;
        assert_eq!(text, "Cancelled (#0) **E**");
        assert!(f.store.read().await.get_event("0").is_none());
        assert!(!f.scheduler.is_armed("0"));

        let text = say(&f, "u2", "!event cancel 0").await;
        assert_eq!(text, "Sorry, I couldn't find that event.");
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_cancel() {
        let f = fixture(ServerConfig::in_memory());
        say(&f, "u1", r#"!event schedule A "in 10 minutes""#).await;
        say(&f, "u1", r#"!event schedule B "in 10 minutes""#).await;
        say(&f, "u1", "!event cancel 1").await;
        let text = say(&f, "u1", r#"!event schedule C "in 10 minutes""#).await;
        assert!(text.starts_with("Scheduled (#2) **C**"));
        f.scheduler.shutdown();
    }

    #[tokio::test]
    async fn custom_prefix() {
        let f = fixture(ServerConfig::in_memory().with_command_prefix("!ev"));
        assert!(f.handler.strip_prefix("!event list").is_none());
        let text = say(&f, "u1", "!ev list").await;
        assert!(text.starts_with("No events are currently scheduled."));
    }

    #[test]
    fn list_groups_by_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let at = |d, h| Utc.with_ymd_and_hms(2026, 3, d, h, 0, 0).unwrap();
        let events = vec![
            EventRecord::new("2", "Late", "", at(3, 20), "u1", "c"),
            EventRecord::new("0", "Early", "", at(2, 18), "u1", "c"),
            EventRecord::new("1", "Same day", "", at(3, 10), "u1", "c"),
        ];

        assert_eq!(
            render_list(&events, &now),
            "**Events:**\n\
             \n\
             Monday, Mar 2 2026\n  (#0) **Early** at 6:00 pm\n\
             \n\
             Tuesday, Mar 3 2026\n  (#1) **Same day** at 10:00 am\n  (#2) **Late** at 8:00 pm\n\
             \n\
             Current time is Monday, Mar 2 2026, 9:00 am"
        );
    }

    #[test]
    fn list_empty_hint() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        assert_eq!(
            render_list(&[], &now),
            "No events are currently scheduled.\nTry `!event schedule \"Test\" \"in 1 hour\"`"
        );
    }
}
