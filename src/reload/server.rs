//! WebSocket acceptor for live reload.
//!
//! Upgraded connections are handed to the registry's broadcaster. The
//! handshake is refused with `503 Service Unavailable` while the registry is
//! not watching, so clients never subscribe to a pipeline that cannot change.

use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;

use super::WebSocketChannel;
use crate::log;
use crate::registry::Registry;

/// Ports tried after the configured one is busy.
const MAX_PORT_RETRIES: u16 = 10;
/// Accept and reaper poll interval.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Handshake read timeout per connection.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

const CLIENT_JS: &str = include_str!("client.js");

/// `<script>` block that reloads the page on a reload message.
pub fn client_snippet(port: u16) -> String {
    let js = CLIENT_JS.replace("__BUNDLEWRIGHT_WS_PORT__", &port.to_string());
    format!("<script>\n{}</script>", js)
}

/// Running reload server. Stops when dropped.
pub struct ReloadServer {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
}

impl ReloadServer {
    /// Bind `interface:base_port` (or one of the next ports) and start the
    /// acceptor and reaper threads.
    pub fn start(registry: Registry, interface: IpAddr, base_port: u16) -> Result<Self> {
        let (listener, addr) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
        listener.set_nonblocking(true)?;
        let stop = Arc::new(AtomicBool::new(false));

        {
            let stop = Arc::clone(&stop);
            let registry = registry.clone();
            thread::spawn(move || accept_loop(listener, registry, stop));
        }
        {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    thread::sleep(POLL_INTERVAL);
                    registry.reap_closed();
                }
            });
        }

        log!("reload"; "listening on ws://{}", addr);
        Ok(Self { addr, stop })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Drop for ReloadServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(listener: TcpListener, registry: Registry, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                crate::debug!("reload"; "connection from {}", peer);
                let registry = registry.clone();
                thread::spawn(move || handshake(stream, registry));
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                log!("reload"; "accept error: {}", e);
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
    crate::debug!("reload"; "acceptor stopped");
}

fn handshake(stream: TcpStream, registry: Registry) {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT));

    let watching = registry.clone();
    let callback = move |_req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        if watching.is_watching() {
            Ok(resp)
        } else {
            let mut refusal = ErrorResponse::new(Some("live reload is disabled".to_string()));
            *refusal.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
            Err(refusal)
        }
    };

    let ws = match tungstenite::accept_hdr(stream, callback) {
        Ok(ws) => ws,
        Err(e) => {
            crate::debug!("reload"; "handshake refused: {}", e);
            return;
        }
    };

    let _ = ws.get_ref().set_read_timeout(None);
    let _ = ws.get_ref().set_nonblocking(true);
    if let Err(e) = registry.connect(Box::new(WebSocketChannel::new(ws))) {
        crate::debug!("reload"; "client rejected: {}", e);
    }
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(TcpListener, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                let addr = listener.local_addr()?;
                return Ok((listener, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "failed to bind reload server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
