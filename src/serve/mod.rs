//! Read-only HTTP server for the bundle directory.
//!
//! Serves `GET`/`HEAD <public_prefix>/<file>` from the bundle directory with
//! immutable caching. Everything else is a 404 (unknown path) or a 405
//! (other methods).

mod path;
mod response;

pub use path::resolve_path;

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tiny_http::{Request, Server};

use crate::log;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;
/// Request worker threads.
const WORKERS: usize = 4;

pub struct StaticServer {
    server: Arc<Server>,
    addr: SocketAddr,
    root: PathBuf,
    prefix: String,
}

impl StaticServer {
    /// Bind `interface:port` (retrying the next ports when busy).
    pub fn bind(
        interface: IpAddr,
        port: u16,
        root: impl Into<PathBuf>,
        prefix: impl Into<String>,
    ) -> Result<Self> {
        let (server, addr) = bind_with_retry(interface, port)?;
        Ok(Self {
            server: Arc::new(server),
            addr,
            root: root.into(),
            prefix: prefix.into(),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Handle used to stop [`run`](Self::run) from another thread.
    pub fn handle(&self) -> Arc<Server> {
        Arc::clone(&self.server)
    }

    /// Serve requests until the server is unblocked.
    pub fn run(&self) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(WORKERS)
            .build()
            .context("failed to create request pool")?;

        log!("serve"; "http://{}{}/", self.addr, self.prefix.trim_end_matches('/'));
        for request in self.server.incoming_requests() {
            let root = self.root.clone();
            let prefix = self.prefix.clone();
            pool.spawn(move || {
                if let Err(e) = handle_request(request, &root, &prefix) {
                    log!("serve"; "request error: {e}");
                }
            });
        }
        Ok(())
    }
}

fn handle_request(request: Request, root: &Path, prefix: &str) -> Result<()> {
    if !response::is_read_method(&request) {
        return response::respond_method_not_allowed(request);
    }

    match resolve_path(request.url(), prefix, root) {
        Some(path) => {
            crate::debug!("serve"; "{} {}", request.method(), request.url());
            response::respond_file(request, &path)
        }
        None => response::respond_not_found(request),
    }
}

/// Bind to the specified interface and port, with automatic port retry.
fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match Server::http(SocketAddr::new(interface, port)) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                let addr = server
                    .server_addr()
                    .to_ip()
                    .unwrap_or_else(|| SocketAddr::new(interface, port));
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Read, Write};
    use std::net::{Ipv4Addr, TcpStream};
    use tempfile::TempDir;

    fn request(addr: SocketAddr, method: &str, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(
            stream,
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
        )
        .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_serves_bundles_with_immutable_cache() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("styles-0123456789ab.css"), ".a{}").unwrap();

        let server = StaticServer::bind(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
            dir.path(),
            "/static/bundles",
        )
        .unwrap();
        let addr = server.addr();
        let handle = server.handle();
        let thread = std::thread::spawn(move || server.run());

        let ok = request(addr, "GET", "/static/bundles/styles-0123456789ab.css");
        assert!(ok.starts_with("HTTP/1.1 200"));
        assert!(ok.contains("max-age=31536000, immutable"));
        assert!(ok.ends_with(".a{}"));

        let missing = request(addr, "GET", "/static/bundles/../etc/passwd");
        assert!(missing.starts_with("HTTP/1.1 404"));

        let post = request(addr, "POST", "/static/bundles/styles-0123456789ab.css");
        assert!(post.starts_with("HTTP/1.1 405"));

        handle.unblock();
        thread.join().unwrap().unwrap();
    }
}
