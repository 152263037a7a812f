//! Run command: the bot on the console, in the foreground.
//!
//! Wires every component together:
//! - Event store (loaded from the snapshot, corrupt files moved aside)
//! - Signal handler (SIGTERM/SIGINT for shutdown)
//! - Notifiers (log, console channel, optional desktop)
//! - Scheduler (replays stored events, then arms new ones)
//! - Command handler and console adapter

use std::path::Path;
use std::sync::Arc;

use tokio::io::BufReader;
use tracing::{info, warn};

use eventbot_server::{
    ChannelNotifier, CommandHandler, DesktopNotifier, EventStore, FanoutNotifier, LogNotifier,
    Scheduler, SignalHandler, StoreError, new_shared_store,
};

use crate::cli::Cli;
use crate::config::BotConfig;
use crate::console::Console;
use crate::error::CliResult;

/// Runs the bot until stdin ends with nothing left to fire, or a shutdown
/// signal arrives.
pub async fn run(cli: &Cli, config: &BotConfig) -> CliResult<()> {
    config.validate()?;

    // 1. Store
    let data_file = (!cli.in_memory).then(|| config.data_file(cli.data_file.as_deref()));
    let server_config = config.server_config(data_file);
    let store = new_shared_store(open_store(server_config.data_file.as_deref())?);

    // 2. Signal handler
    let signal_handler = SignalHandler::new();
    signal_handler.spawn_listener();

    // 3. Notifiers
    let (channel_notifier, mut notices) = ChannelNotifier::new();
    let mut notifier = FanoutNotifier::new()
        .with(Arc::new(LogNotifier))
        .with(Arc::new(channel_notifier));
    if cli.desktop || config.notifications.desktop {
        notifier = notifier.with(Arc::new(DesktopNotifier::new(config.desktop_config())));
    }
    info!(notifiers = notifier.len(), "Notifiers ready");

    // 4. Scheduler, re-arming whatever survived the last run
    let scheduler = Scheduler::new(store.clone(), Arc::new(notifier));
    scheduler.arm_all().await;

    // 5. Console
    let user_id = cli.user.as_deref().unwrap_or(&config.console.user_id);
    let channel_id = cli.channel.as_deref().unwrap_or(&config.console.channel_id);
    info!(
        user = user_id,
        channel = channel_id,
        prefix = %server_config.command_prefix,
        "Reading commands from stdin"
    );
    let handler = CommandHandler::new(store, scheduler.clone(), server_config);
    let console = Console::new(handler, scheduler.clone(), user_id, channel_id);

    let mut stdout = tokio::io::stdout();
    let result = console
        .run(
            BufReader::new(tokio::io::stdin()),
            &mut stdout,
            &mut notices,
            signal_handler.shutdown(),
        )
        .await;

    info!("Shutting down...");
    scheduler.shutdown();
    result
}

/// Opens the event store. A corrupt snapshot is moved aside and the bot
/// starts empty; any other load failure is fatal.
fn open_store(path: Option<&Path>) -> CliResult<EventStore> {
    let Some(path) = path else {
        info!("Keeping events in memory only");
        return Ok(EventStore::in_memory());
    };

    let mut store = EventStore::new(path);
    match store.load() {
        Ok(count) => info!(path = %path.display(), count, "Loaded events"),
        Err(e @ StoreError::Corrupt { .. }) => {
            warn!(error = %e, "Event snapshot is corrupt, starting with no events");
            store.quarantine()?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(store)
}
