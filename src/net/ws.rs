//! WebSocket server link on a dedicated network thread.

use super::protocol::{self, ClientEvent, ServerEvent};
use super::{NetError, ServerLink};
use crate::system::bus::SessionEvent;
use crossbeam_channel::Sender;
use futures_util::{SinkExt, StreamExt};
use std::thread;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Sends client events to a remote server; replies are pushed onto the
/// session event queue by the network thread.
pub struct WsLink {
    outbound: UnboundedSender<ClientEvent>,
}

impl WsLink {
    /// Spawns the network thread and starts connecting in the background.
    ///
    /// A failed connection surfaces as a `game_error` on the event queue.
    /// The link never retries.
    pub fn connect(url: String, events_tx: Sender<SessionEvent>) -> Self {
        let (outbound, outbound_rx) = unbounded_channel();

        thread::Builder::new()
            .name("Network Thread".to_string())
            .spawn(move || {
                log::info!("NET: Thread started");

                let rt = match tokio::runtime::Runtime::new() {
                    Ok(rt) => rt,
                    Err(e) => {
                        log::error!("NET: Failed to create tokio runtime: {}", e);
                        report_error(&events_tx, format!("network runtime unavailable: {e}"));
                        return;
                    }
                };

                if let Err(e) = rt.block_on(run_link(&url, outbound_rx, &events_tx)) {
                    log::error!("NET: {}", e);
                    report_error(&events_tx, e.to_string());
                }

                log::info!("NET: Thread stopped");
            })
            .expect("Failed to spawn Network thread");

        Self { outbound }
    }
}

impl ServerLink for WsLink {
    fn send(&mut self, event: ClientEvent) -> Result<(), NetError> {
        self.outbound
            .send(event)
            .map_err(|_| NetError::ChannelClosed)
    }
}

fn report_error(events_tx: &Sender<SessionEvent>, error: String) {
    let _ = events_tx.send(SessionEvent::Server(ServerEvent::GameError { error }));
}

async fn run_link(
    url: &str,
    mut outbound_rx: UnboundedReceiver<ClientEvent>,
    events_tx: &Sender<SessionEvent>,
) -> Result<(), NetError> {
    let (stream, _) = connect_async(url)
        .await
        .map_err(|e| NetError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    log::info!("NET: Connected to {}", url);

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                let Some(event) = outgoing else {
                    // Every WsLink handle is gone: the client is shutting down.
                    let _ = write.close().await;
                    return Ok(());
                };

                let text = protocol::encode(&event)?;
                log::debug!("NET: -> {}", text);
                if write.send(Message::Text(text)).await.is_err() {
                    return Err(NetError::ChannelClosed);
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => match protocol::decode(&text) {
                        Ok(event) => {
                            log::debug!("NET: <- {:?}", event);
                            if events_tx.send(SessionEvent::Server(event)).is_err() {
                                return Ok(());
                            }
                        }
                        Err(e) => log::debug!("NET: Ignoring message ({}): {}", e, text),
                    },
                    Some(Ok(Message::Close(_))) | None => return Err(NetError::ChannelClosed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::warn!("NET: Read failed: {}", e);
                        return Err(NetError::ChannelClosed);
                    }
                }
            }
        }
    }
}
