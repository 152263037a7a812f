//! Event lifecycle engine.
//!
//! This crate holds everything between a chat line and a notification:
//! - [`EventStore`]: durable JSON snapshot of scheduled events
//! - [`Scheduler`]: start/end timers, one task per event
//! - [`Notifier`] backends for start/end notices
//! - [`CommandHandler`]: parses `!event ...` commands and applies them
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use eventbot_server::{
//!     ChatMessage, CommandHandler, EventStore, LogNotifier, Scheduler, ServerConfig,
//!     new_shared_store,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut store = EventStore::new("/tmp/events.json");
//!     store.load()?;
//!     let store = new_shared_store(store);
//!
//!     let scheduler = Scheduler::new(store.clone(), Arc::new(LogNotifier));
//!     scheduler.arm_all().await;
//!
//!     let handler = CommandHandler::new(store, scheduler, ServerConfig::default());
//!     let message = ChatMessage::new("u1", "general", "!event list");
//!     if let Some(reply) = handler.handle(&message).await {
//!         println!("{}", reply.text);
//!     }
//!     Ok(())
//! }
//! ```

mod command;
mod config;
mod error;
mod handler;
mod notify;
mod scheduler;
mod signals;
mod store;

pub use command::{EventCommand, parse_command, parse_mention};
pub use config::{DEFAULT_PREFIX, ServerConfig, default_data_path};
pub use error::{ServerError, ServerResult};
pub use handler::{ChatMessage, CommandHandler, Reply};
pub use notify::{
    BoxFuture, ChannelNotifier, DesktopConfig, DesktopNotifier, EndNotice, FanoutNotifier,
    LogNotifier, Notice, Notifier, StartNotice, mention,
};
pub use scheduler::{ArmOutcome, ReplaySummary, Scheduler};
pub use signals::{ShutdownSignal, SignalHandler};
pub use store::{EventStore, SharedStore, StoreError, StoreResult, new_shared_store};
