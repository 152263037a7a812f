//! Start/end notifications.
//!
//! The scheduler hands a [`StartNotice`] or [`EndNotice`] to a [`Notifier`]
//! and moves on; delivery problems are the notifier's to log. Backends:
//! - [`LogNotifier`]: tracing only
//! - [`ChannelNotifier`]: forwards notices to the chat adapter over mpsc
//! - [`DesktopNotifier`]: desktop popups through `notify-rust`
//! - [`FanoutNotifier`]: delivers to several backends

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use notify_rust::Notification;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sent when an event starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartNotice {
    pub event_id: String,
    pub name: String,
    pub description: String,
    /// Attendees at the moment the start timer fired.
    pub attending: Vec<String>,
    pub channel_id: String,
}

/// Sent when an event ends and has been removed from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndNotice {
    pub event_id: String,
    pub name: String,
    pub channel_id: String,
}

/// Either kind of notice, as forwarded by [`ChannelNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Started(StartNotice),
    Ended(EndNotice),
}

impl Notice {
    /// Destination channel of the notice.
    pub fn channel_id(&self) -> &str {
        match self {
            Self::Started(n) => &n.channel_id,
            Self::Ended(n) => &n.channel_id,
        }
    }

    /// Chat message announcing the notice.
    pub fn render(&self) -> String {
        match self {
            Self::Started(n) => {
                let mut lines = vec![format!("(#{}) **{}** is starting now!", n.event_id, n.name)];
                if !n.description.is_empty() {
                    lines.push(format!("Description: _{}_", n.description));
                }
                if !n.attending.is_empty() {
                    lines.push(
                        n.attending
                            .iter()
                            .map(|u| mention(u))
                            .collect::<Vec<_>>()
                            .join(" "),
                    );
                }
                lines.join("\n")
            }
            Self::Ended(n) => format!("(#{}) **{}** just ended.", n.event_id, n.name),
        }
    }
}

/// Renders a user id as a chat mention.
pub fn mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}

/// Receives event lifecycle notifications.
///
/// Calls are fire-and-continue: implementations log their own failures and
/// the scheduler never waits for a delivery confirmation.
pub trait Notifier: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    fn event_started(&self, notice: StartNotice) -> BoxFuture<'_, ()>;

    fn event_ended(&self, notice: EndNotice) -> BoxFuture<'_, ()>;
}

/// Logs notices and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn event_started(&self, notice: StartNotice) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            info!(
                event_id = %notice.event_id,
                name = %notice.name,
                channel = %notice.channel_id,
                attending = notice.attending.len(),
                "Event starting"
            );
        })
    }

    fn event_ended(&self, notice: EndNotice) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            info!(
                event_id = %notice.event_id,
                name = %notice.name,
                channel = %notice.channel_id,
                "Event ended"
            );
        })
    }
}

/// Forwards notices to whoever owns the receiving end (the chat adapter).
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiver to drain.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            warn!("Notice receiver dropped, notice discarded");
        }
    }
}

impl Notifier for ChannelNotifier {
    fn name(&self) -> &str {
        "channel"
    }

    fn event_started(&self, notice: StartNotice) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.forward(Notice::Started(notice)) })
    }

    fn event_ended(&self, notice: EndNotice) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.forward(Notice::Ended(notice)) })
    }
}

/// Configuration for [`DesktopNotifier`].
#[derive(Debug, Clone)]
pub struct DesktopConfig {
    /// Application name shown by the notification daemon.
    pub app_name: String,
    /// Popup timeout.
    pub timeout: Duration,
    /// Custom icon path.
    pub icon_path: Option<String>,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            app_name: "eventbot".to_string(),
            timeout: Duration::from_secs(10),
            icon_path: None,
        }
    }
}

impl DesktopConfig {
    /// Builder: set app name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Builder: set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder: set icon path.
    pub fn with_icon_path(mut self, path: impl Into<String>) -> Self {
        self.icon_path = Some(path.into());
        self
    }
}

/// Shows desktop notifications.
#[derive(Debug, Clone, Default)]
pub struct DesktopNotifier {
    config: DesktopConfig,
}

impl DesktopNotifier {
    pub fn new(config: DesktopConfig) -> Self {
        Self { config }
    }

    async fn show(&self, summary: String, body: String) {
        let mut notification = Notification::new();
        notification
            .appname(&self.config.app_name)
            .summary(&summary)
            .body(&body)
            .timeout(self.config.timeout);
        if let Some(ref icon) = self.config.icon_path {
            notification.icon(icon);
        }

        debug!(summary = %summary, "Sending desktop notification");
        // show() talks to the session bus synchronously.
        let result = tokio::task::spawn_blocking(move || {
            notification
                .show()
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .await;
        match result {
            Ok(Ok(())) => debug!(summary = %summary, "Desktop notification sent"),
            Ok(Err(e)) => {
                error!(error = %e, summary = %summary, "Failed to send desktop notification")
            }
            Err(e) => error!(error = %e, "Desktop notification task failed"),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn name(&self) -> &str {
        "desktop"
    }

    fn event_started(&self, notice: StartNotice) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let summary = format!("Starting now: {}", notice.name);
            let body = if notice.description.is_empty() {
                format!("{} attending", notice.attending.len())
            } else {
                notice.description.clone()
            };
            self.show(summary, body).await;
        })
    }

    fn event_ended(&self, notice: EndNotice) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.show(format!("Ended: {}", notice.name), String::new())
                .await;
        })
    }
}

/// Delivers every notice to each inner notifier, in order.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    targets: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a target.
    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.targets.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Notifier for FanoutNotifier {
    fn name(&self) -> &str {
        "fanout"
    }

    fn event_started(&self, notice: StartNotice) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            for target in &self.targets {
                debug!(target = target.name(), "Delivering start notice");
                target.event_started(notice.clone()).await;
            }
        })
    }

    fn event_ended(&self, notice: EndNotice) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            for target in &self.targets {
                debug!(target = target.name(), "Delivering end notice");
                target.event_ended(notice.clone()).await;
            }
        })
    }
}
