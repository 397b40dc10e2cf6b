//! Live-sync engine
//!
//! Applies server events from the [`trapline_client::EventStream`] to
//! the [`MessageStore`] and reports every change to the front end.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use trapline_client::{MessageId, StreamEvent, StreamMessage};

use crate::notifications::{notifications_enabled, Notifier};
use crate::settings::PreferenceStore;
use crate::store::{Message, MessageStore};
use crate::CoreResult;

/// Commands sent from the front end to the sync engine
#[derive(Debug, Clone)]
pub enum SyncCommand {
    /// Reload the whole message list
    Resync,
    /// Stop the sync engine
    Shutdown,
}

/// Events sent from the sync engine to the front end
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Event stream is up
    Connected,
    /// Event stream was lost; the inbox may be out of date until reconnect
    Disconnected,
    /// Message list reloaded from the server
    Resynced { count: usize },
    /// A new message arrived
    MessageAdded(Message),
    /// A message was removed; `selected` is the selection afterwards
    MessageDeleted {
        id: MessageId,
        selected: Option<MessageId>,
    },
    /// All messages were removed
    Cleared,
    /// Error occurred
    Error { message: String },
}

/// Sync engine that runs in a background tokio task
pub struct SyncEngine {
    store: Arc<MessageStore>,
    prefs: Arc<PreferenceStore>,
    notifier: Arc<dyn Notifier>,
    stream_rx: mpsc::Receiver<StreamMessage>,
    command_rx: mpsc::Receiver<SyncCommand>,
    event_tx: mpsc::Sender<SyncEvent>,
    /// The last reload failed; the store may be missing messages
    stale: bool,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(
        store: Arc<MessageStore>,
        prefs: Arc<PreferenceStore>,
        notifier: Arc<dyn Notifier>,
        stream_rx: mpsc::Receiver<StreamMessage>,
        command_rx: mpsc::Receiver<SyncCommand>,
        event_tx: mpsc::Sender<SyncEvent>,
    ) -> Self {
        Self {
            store,
            prefs,
            notifier,
            stream_rx,
            command_rx,
            event_tx,
            stale: false,
        }
    }

    /// Run the sync engine until shutdown or until the stream ends
    pub async fn run(mut self) {
        info!("Sync engine started");

        loop {
            let result = tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(SyncCommand::Resync) => self.resync().await,
                    Some(SyncCommand::Shutdown) | None => {
                        info!("Sync engine shutting down");
                        break;
                    }
                },
                message = self.stream_rx.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => {
                        info!("Event stream closed");
                        break;
                    }
                },
            };

            if let Err(e) = result {
                error!("Error applying server event: {}", e);
                self.emit(SyncEvent::Error {
                    message: e.to_string(),
                })
                .await;
            }
        }

        info!("Sync engine stopped");
    }

    async fn emit(&self, event: SyncEvent) {
        let _ = self.event_tx.send(event).await;
    }

    /// Handle one message from the event stream
    async fn handle_message(&mut self, message: StreamMessage) -> CoreResult<()> {
        match message {
            StreamMessage::Connected => {
                self.emit(SyncEvent::Connected).await;
                if self.stale {
                    info!("Retrying the failed reload now that the server is reachable");
                    self.resync().await?;
                }
            }
            StreamMessage::Disconnected => {
                warn!("Lost connection to server");
                self.emit(SyncEvent::Disconnected).await;
            }
            StreamMessage::Reconnected => {
                // Events sent while we were away are gone; start over
                self.emit(SyncEvent::Connected).await;
                self.resync().await?;
            }
            StreamMessage::Event(event) => self.apply(event).await?,
        }
        Ok(())
    }

    async fn apply(&self, event: StreamEvent) -> CoreResult<()> {
        match event {
            StreamEvent::Add(id) => {
                let notify = notifications_enabled(&self.prefs, self.notifier.as_ref());
                if let Some(message) = self.store.remote_add(&id, notify).await? {
                    self.emit(SyncEvent::MessageAdded(message)).await;
                }
            }
            StreamEvent::Delete(id) => {
                if self.store.delete(&id).is_some() {
                    let selected = self.store.selected_id();
                    self.emit(SyncEvent::MessageDeleted { id, selected }).await;
                } else {
                    debug!("Ignoring delete of unknown message {}", id);
                }
            }
            StreamEvent::ClearAll => {
                self.store.clear();
                self.emit(SyncEvent::Cleared).await;
            }
        }
        Ok(())
    }

    async fn resync(&mut self) -> CoreResult<()> {
        let result = self.store.load_all().await;
        self.stale = result.is_err();
        let count = result?;
        self.emit(SyncEvent::Resynced { count }).await;
        Ok(())
    }
}
