//! Live event stream over WebSocket
//!
//! Keeps a persistent connection to the server's `/ws` endpoint,
//! reconnecting at a fixed interval whenever it drops, and forwards
//! decoded events to the application.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::client::ClientConfig;
use crate::error::ClientResult;
use crate::events::StreamEvent;

/// Messages sent from the stream worker to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    /// First connection established
    Connected,
    /// Connection re-established after a drop; events may have been missed
    Reconnected,
    /// An established connection was lost (will auto-reconnect)
    Disconnected,
    /// A decoded server event
    Event(StreamEvent),
}

/// Handle to the running stream worker
pub struct EventStream {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl EventStream {
    /// Start the stream worker.
    ///
    /// Returns the handle and a receiver for stream messages. The worker
    /// stops when [`EventStream::shutdown`] is called or the receiver is
    /// dropped.
    pub fn start(config: &ClientConfig) -> ClientResult<(Self, mpsc::Receiver<StreamMessage>)> {
        let url = config.websocket_url()?;
        let retry = config.retry_interval();
        let (event_tx, event_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!("Starting event stream for {}", url);
        let task = tokio::spawn(stream_worker_loop(url, retry, event_tx, shutdown_rx));

        Ok((
            Self {
                shutdown_tx,
                task: Some(task),
            },
            event_rx,
        ))
    }

    /// Stop the worker and wait for it to finish
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Worker loop that maintains the WebSocket connection
async fn stream_worker_loop(
    url: Url,
    retry: Duration,
    event_tx: mpsc::Sender<StreamMessage>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut connected_before = false;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let connect_result = tokio::select! {
            _ = shutdown_rx.changed() => break,
            result = connect_async(url.as_str()) => result,
        };

        match connect_result {
            Err(e) => {
                error!("Event stream connect failed for {}: {}", url, e);
            }
            Ok((socket, _)) => {
                info!("Event stream connected to {}", url);
                let status = if connected_before {
                    StreamMessage::Reconnected
                } else {
                    StreamMessage::Connected
                };
                connected_before = true;
                if event_tx.send(status).await.is_err() {
                    return;
                }

                let (mut write, mut read) = socket.split();

                loop {
                    let frame = tokio::select! {
                        _ = shutdown_rx.changed() => {
                            let _ = write.close().await;
                            return;
                        }
                        frame = read.next() => frame,
                    };

                    match frame {
                        Some(Ok(Message::Text(text))) => match StreamEvent::decode(&text) {
                            Ok(Some(event)) => {
                                debug!("Event stream: {:?}", event);
                                if event_tx.send(StreamMessage::Event(event)).await.is_err() {
                                    return;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => warn!("Skipping undecodable frame {:?}: {}", text, e),
                        },
                        Some(Ok(Message::Close(_))) | None => {
                            info!("Server closed event stream");
                            break;
                        }
                        Some(Ok(_)) => {
                            // Pings are answered by tungstenite itself
                        }
                        Some(Err(e)) => {
                            warn!("Event stream error: {}", e);
                            break;
                        }
                    }
                }

                if event_tx.send(StreamMessage::Disconnected).await.is_err() {
                    return;
                }
            }
        }

        // Fixed retry interval, no backoff
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = tokio::time::sleep(retry) => {}
        }
    }

    info!("Event stream stopped");
}
