//! Live reload: message protocol, channel fan-out and the WebSocket acceptor.

mod broadcast;
mod message;
mod server;

pub use broadcast::{BroadcastReport, Broadcaster, ConnectionId, ReloadChannel, WebSocketChannel};
pub use message::ReloadMessage;
pub use server::{ReloadServer, client_snippet};
