//! Registry error types.

use thiserror::Error;

/// Errors surfaced by the [`Registry`](crate::Registry) API.
///
/// Sandbox rejections and build failures never appear here: they are logged
/// and the affected file or bundle is skipped.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("manifest not configured, call Registry::initialize first")]
    ManifestNotConfigured,

    #[error("cannot register `{name}` while the registry is initialized")]
    RegistrationClosed { name: String },

    #[error("registry is already initialized")]
    AlreadyInitialized,

    #[error("live reload is disabled, the watcher is not running")]
    LiveReloadDisabled,

    #[error("file watcher error")]
    Watch(#[from] notify::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),
}
