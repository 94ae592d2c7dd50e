//! WebSocket transport.
//!
//! The render loop is synchronous, so the socket lives on its own thread with
//! a single-threaded runtime. Traffic crosses over on unbounded channels and
//! the render loop polls without blocking the frame.

use futures::{SinkExt, StreamExt};
use shared::protocol::{ClientMsg, ServerMsg};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Connection lifecycle and traffic, as seen by the render loop.
#[derive(Debug)]
pub enum NetEvent {
    /// The socket connected.
    Open,
    /// One parsed server frame.
    Message(ServerMsg),
    /// The socket closed or failed. No further events follow.
    Closed,
}

/// Handle held by the render loop.
pub struct NetHandle {
    outgoing: UnboundedSender<ClientMsg>,
    incoming: UnboundedReceiver<NetEvent>,
}

impl NetHandle {
    /// Queues one message for the server. A failed send means the socket
    /// thread is gone; the Closed event reports that on its own.
    pub fn send(&self, msg: ClientMsg) {
        if self.outgoing.send(msg).is_err() {
            debug!("dropping message, socket thread has exited");
        }
    }

    /// Next pending event, if any.
    pub fn poll(&mut self) -> Option<NetEvent> {
        self.incoming.try_recv().ok()
    }
}

/// Spawns the socket thread and starts connecting to `url`.
pub fn connect(url: String) -> NetHandle {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!("Failed to start socket runtime: {err}");
                let _ = in_tx.send(NetEvent::Closed);
                return;
            }
        };
        runtime.block_on(run(url, out_rx, in_tx));
    });

    NetHandle {
        outgoing: out_tx,
        incoming: in_rx,
    }
}

async fn run(url: String, mut out_rx: UnboundedReceiver<ClientMsg>, events: UnboundedSender<NetEvent>) {
    let (mut stream, _) = match connect_async(&url).await {
        Ok(pair) => pair,
        Err(err) => {
            warn!("Connect to {url} failed: {err}");
            let _ = events.send(NetEvent::Closed);
            return;
        }
    };
    info!("Connected to {url}");
    let _ = events.send(NetEvent::Open);

    loop {
        tokio::select! {
            outbound = out_rx.recv() => {
                let Some(msg) = outbound else {
                    break;
                };
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!("Failed to encode client message: {err}");
                        continue;
                    }
                };
                if let Err(err) = stream.send(Message::Text(text)).await {
                    debug!("Socket write failed: {err}");
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerMsg>(&text) {
                        Ok(msg) => {
                            let _ = events.send(NetEvent::Message(msg));
                        }
                        Err(err) => warn!("Unreadable server frame: {err}"),
                    },
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!("Socket read failed: {err}");
                        break;
                    }
                }
            }
        }
    }

    let _ = events.send(NetEvent::Closed);
}
