//! Subcommand implementations

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::info;
use trapline_client::{EventStream, MailtrapClient, MessageId};
use trapline_core::{
    notifications_enabled, toggle_notifications, MessageStore, Notifier, PreferenceStore,
    SyncCommand, SyncEngine, SyncEvent,
};

use crate::cli::{Cli, Command, NotificationAction};
use crate::{desktop, render};

struct App {
    store: Arc<MessageStore>,
    prefs: Arc<PreferenceStore>,
    notifier: Arc<dyn Notifier>,
}

impl App {
    fn new(cli: &Cli) -> Result<Self> {
        let client = MailtrapClient::new(cli.client_config())
            .with_context(|| format!("invalid server address {}", cli.url))?;
        let path = PreferenceStore::default_path()?;
        let prefs = Arc::new(PreferenceStore::load(path));
        let notifier = desktop::notifier();
        let store = Arc::new(MessageStore::new(Arc::new(client), notifier.clone()));
        Ok(Self {
            store,
            prefs,
            notifier,
        })
    }

    async fn load(&self) -> Result<()> {
        self.store
            .load_all()
            .await
            .context("failed to load the message list")?;
        Ok(())
    }
}

pub async fn run(cli: &Cli) -> Result<()> {
    let app = App::new(cli)?;

    match cli.subcommand() {
        Command::Watch { filter } => watch(cli, &app, filter).await,
        Command::List { filter } => list(&app, filter).await,
        Command::Show { id } => show(&app, MessageId::new(id)).await,
        Command::Delete { id } => delete(&app, MessageId::new(id)).await,
        Command::Clear => {
            app.store.clear_remote().await.context("failed to clear")?;
            println!("Deleted all messages");
            Ok(())
        }
        Command::Terminate => {
            app.store
                .terminate_remote()
                .await
                .context("failed to terminate the server")?;
            println!("Server terminated");
            Ok(())
        }
        Command::Notifications { action } => notifications(&app, action),
    }
}

async fn list(app: &App, filter: Option<String>) -> Result<()> {
    app.load().await?;
    if let Some(term) = filter {
        app.store.set_filter(&term);
    }
    for message in app.store.visible() {
        println!("{}", render::summary_line(&message));
    }
    Ok(())
}

async fn show(app: &App, id: MessageId) -> Result<()> {
    app.load().await?;
    match app.store.select(&id).await? {
        Some(message) => {
            print!("{}", render::detail(&message));
            Ok(())
        }
        None => bail!("message {} is no longer available", id),
    }
}

async fn delete(app: &App, id: MessageId) -> Result<()> {
    app.load().await?;
    app.store
        .delete_remote(&id)
        .await
        .with_context(|| format!("failed to delete message {}", id))?;
    println!("Deleted message {}", id);
    Ok(())
}

fn notifications(app: &App, action: NotificationAction) -> Result<()> {
    let enabled = match action {
        NotificationAction::Status => notifications_enabled(&app.prefs, app.notifier.as_ref()),
        NotificationAction::Toggle => toggle_notifications(&app.prefs, app.notifier.as_ref())?,
        NotificationAction::On | NotificationAction::Off => {
            let wanted = action == NotificationAction::On;
            if notifications_enabled(&app.prefs, app.notifier.as_ref()) == wanted {
                wanted
            } else {
                toggle_notifications(&app.prefs, app.notifier.as_ref())?
            }
        }
    };
    println!(
        "Desktop notifications are {}",
        if enabled { "on" } else { "off" }
    );
    Ok(())
}

async fn watch(cli: &Cli, app: &App, filter: Option<String>) -> Result<()> {
    if let Some(term) = filter {
        app.store.set_filter(&term);
    }

    let (stream, stream_rx) = EventStream::start(&cli.client_config())?;
    let (command_tx, command_rx) = mpsc::channel(8);
    let (event_tx, mut event_rx) = mpsc::channel(64);

    let engine = SyncEngine::new(
        app.store.clone(),
        app.prefs.clone(),
        app.notifier.clone(),
        stream_rx,
        command_rx,
        event_tx,
    );
    let engine_task = tokio::spawn(engine.run());

    command_tx.send(SyncCommand::Resync).await?;
    info!("Watching {} (Ctrl-C to quit)", cli.url);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(event) => print_event(app, &event),
                None => break,
            },
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    app.store.close_notifications();
    let _ = command_tx.send(SyncCommand::Shutdown).await;
    stream.shutdown().await;
    let _ = engine_task.await;
    Ok(())
}

fn print_event(app: &App, event: &SyncEvent) {
    // Messages hidden by the filter are cached but not announced
    if let SyncEvent::MessageAdded(message) = event {
        let visible = app.store.visible();
        if !visible.iter().any(|m| m.id() == message.id()) {
            return;
        }
    }

    if let Some(line) = render::event_line(event) {
        println!("{}", line);
    }
    if let SyncEvent::Resynced { .. } = event {
        for message in app.store.visible() {
            println!("  {}", render::summary_line(&message));
        }
    }
}
