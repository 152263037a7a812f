//! Console chat adapter.
//!
//! Each input line is a chat message from the configured user in the
//! configured channel. A leading `@name` token sends the rest of the line as
//! `name` instead, so several people can be played from one terminal:
//!
//! ```text
//! !event schedule "Game Night" "in 2 hours"
//! @bob !event attend 0
//! ```
//!
//! Replies and start/end notices are written to the output as
//! `[#channel] text`.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use eventbot_server::{ChatMessage, CommandHandler, Notice, Scheduler, ShutdownSignal, mention};

use crate::error::CliResult;

/// Drives a [`CommandHandler`] from line-oriented input.
pub struct Console {
    handler: CommandHandler,
    scheduler: Scheduler,
    user_id: String,
    channel_id: String,
}

impl Console {
    pub fn new(
        handler: CommandHandler,
        scheduler: Scheduler,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            handler,
            scheduler,
            user_id: user_id.into(),
            channel_id: channel_id.into(),
        }
    }

    /// Turns an input line into a chat message. Blank lines are `None`.
    pub fn to_message(&self, line: &str) -> Option<ChatMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(rest) = line.strip_prefix('@') {
            let (user, content) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            if !user.is_empty() {
                return Some(ChatMessage::new(user, &self.channel_id, content.trim_start()));
            }
        }
        Some(ChatMessage::new(&self.user_id, &self.channel_id, line))
    }

    /// Handles one input line and returns what to print, if anything.
    pub async fn process_line(&self, line: &str) -> Option<String> {
        let message = self.to_message(line)?;
        if message.content == "ping" {
            return Some(format_line(
                &message.channel_id,
                &format!("pong {}", mention(&message.author_id)),
            ));
        }

        let reply = self.handler.handle(&message).await?;
        Some(format_line(&reply.channel_id, &reply.text))
    }

    /// Runs until shutdown is requested, or until input has ended and no
    /// timers are left to fire.
    pub async fn run<R, W>(
        &self,
        input: R,
        output: &mut W,
        notices: &mut UnboundedReceiver<Notice>,
        shutdown: ShutdownSignal,
    ) -> CliResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut input_open = true;
        let mut idle_check = tokio::time::interval(Duration::from_secs(1));
        let shutdown = shutdown.wait();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                Some(notice) = notices.recv() => {
                    debug!(?notice, "Printing notice");
                    write_out(output, &format_line(notice.channel_id(), &notice.render())).await?;
                }
                line = lines.next_line(), if input_open => match line? {
                    Some(line) => {
                        if let Some(text) = self.process_line(&line).await {
                            write_out(output, &text).await?;
                        }
                    }
                    None => {
                        info!(pending = self.scheduler.pending(), "End of input");
                        input_open = false;
                    }
                },
                _ = idle_check.tick(), if !input_open => {
                    if self.scheduler.pending() == 0 {
                        // Flush notices sent just before the last timer finished.
                        while let Ok(notice) = notices.try_recv() {
                            write_out(output, &format_line(notice.channel_id(), &notice.render())).await?;
                        }
                        info!("No pending events left");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

fn format_line(channel_id: &str, text: &str) -> String {
    format!("[#{channel_id}] {text}")
}

async fn write_out<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> CliResult<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
