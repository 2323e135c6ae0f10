//! HTTP responses for the bundle server.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::manifest::MANIFEST_FILE;
use crate::utils::mime::{self, types::PLAIN};

/// Fingerprinted bundles never change under the same name.
const IMMUTABLE: &str = "public, max-age=31536000, immutable";
/// The manifest is rewritten in place.
const NO_CACHE: &str = "no-cache";

pub fn is_read_method(request: &Request) -> bool {
    matches!(request.method(), Method::Get | Method::Head)
}

/// Respond with a bundle file.
pub fn respond_file(request: Request, path: &Path) -> Result<()> {
    let content_type = mime::from_path(path);
    let cache = if path.file_name().is_some_and(|n| n == MANIFEST_FILE) {
        NO_CACHE
    } else {
        IMMUTABLE
    };

    if request.method() == &Method::Head {
        let response = Response::empty(StatusCode(200))
            .with_header(make_header("Content-Type", content_type))
            .with_header(make_header("Cache-Control", cache));
        request.respond(response)?;
        return Ok(());
    }

    let body = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let response = Response::from_data(body)
        .with_header(make_header("Content-Type", content_type))
        .with_header(make_header("Cache-Control", cache));
    request.respond(response)?;
    Ok(())
}

pub fn respond_not_found(request: Request) -> Result<()> {
    send_plain(request, 404, "404 Not Found", None)
}

pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    send_plain(
        request,
        405,
        "405 Method Not Allowed",
        Some(make_header("Allow", "GET, HEAD")),
    )
}

fn send_plain(request: Request, status: u16, body: &str, extra: Option<Header>) -> Result<()> {
    let mut response = Response::from_string(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", PLAIN));
    if let Some(header) = extra {
        response.add_header(header);
    }
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).expect("static header is valid")
}
