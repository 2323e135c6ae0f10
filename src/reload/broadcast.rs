//! Reload channel fan-out.
//!
//! Channels live in an id-keyed map. A failed send removes only the failing
//! channel; every other channel still receives the message.

use std::fmt;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tungstenite::{Message, WebSocket};

use super::ReloadMessage;

/// A connected reload client.
pub trait ReloadChannel: Send {
    /// Deliver one message. An error unregisters the channel.
    fn send(&mut self, message: &ReloadMessage) -> Result<()>;

    /// Whether the peer has gone away. Polled by the reaper.
    fn is_closed(&mut self) -> bool {
        false
    }
}

/// In-process channel, used by embedders and tests.
impl ReloadChannel for UnboundedSender<ReloadMessage> {
    fn send(&mut self, message: &ReloadMessage) -> Result<()> {
        UnboundedSender::send(self, message.clone())
            .map_err(|_| anyhow::anyhow!("receiver dropped"))
    }

    fn is_closed(&mut self) -> bool {
        UnboundedSender::is_closed(self)
    }
}

/// Browser client over a nonblocking WebSocket.
pub struct WebSocketChannel {
    ws: WebSocket<TcpStream>,
}

impl WebSocketChannel {
    pub fn new(ws: WebSocket<TcpStream>) -> Self {
        Self { ws }
    }
}

impl ReloadChannel for WebSocketChannel {
    fn send(&mut self, message: &ReloadMessage) -> Result<()> {
        match self.ws.send(Message::Text(message.to_json().into())) {
            Ok(()) => Ok(()),
            // Frame is queued and flushed on the next write
            Err(tungstenite::Error::Io(e)) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn is_closed(&mut self) -> bool {
        loop {
            match self.ws.read() {
                Ok(Message::Close(_)) => return true,
                Ok(_) => continue,
                Err(tungstenite::Error::Io(e)) if e.kind() == ErrorKind::WouldBlock => {
                    return false;
                }
                Err(_) => return true,
            }
        }
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        let _ = self.ws.close(None);
        let _ = self.ws.flush();
    }
}

/// Identifier returned by [`Broadcaster::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

type Channel = Mutex<Box<dyn ReloadChannel>>;

/// Shared set of reload channels. Clones share the same set.
#[derive(Clone, Default)]
pub struct Broadcaster {
    channels: Arc<DashMap<ConnectionId, Channel>>,
    next_id: Arc<AtomicU64>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, channel: Box<dyn ReloadChannel>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.channels.insert(id, Mutex::new(channel));
        crate::debug!("reload"; "client {} connected (total: {})", id, self.channels.len());
        id
    }

    /// Remove a channel. Returns whether it was registered.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.channels.remove(&id).is_some();
        if removed {
            crate::debug!("reload"; "client {} disconnected", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Send `message` to every channel, dropping the ones that fail.
    pub fn broadcast(&self, message: &ReloadMessage) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        self.channels.retain(|id, channel| match channel.get_mut().send(message) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(e) => {
                crate::debug!("reload"; "client {} dropped: {}", id, e);
                report.dropped += 1;
                false
            }
        });
        crate::debug!("reload"; "broadcast to {} client(s)", report.delivered);
        report
    }

    /// Unregister channels whose peer has gone away. Returns how many.
    pub fn reap_closed(&self) -> usize {
        let mut reaped = 0;
        self.channels.retain(|id, channel| {
            if channel.get_mut().is_closed() {
                crate::debug!("reload"; "client {} closed", id);
                reaped += 1;
                false
            } else {
                true
            }
        });
        reaped
    }

    /// Drop every channel.
    pub fn clear(&self) {
        self.channels.clear();
    }
}
