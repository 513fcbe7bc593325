//! DataGate: an S3-compatible gateway over a filesystem directory with
//! asynchronous git+DVC dataset sync.
//!
//! Clients talk AWS SigV4-signed S3 to a local directory tree; every
//! successful upload nudges a background coordinator that periodically
//! regenerates the aggregated dataset manifest and pushes it through DVC
//! and git.

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod manifest;
pub mod repo;
pub mod server;
pub mod store;
pub mod sync;
pub mod xml;

use std::sync::Arc;

use auth::Credential;
use config::Config;
use store::ObjectStore;
use sync::SyncCoordinator;

/// Shared state handed to every handler and the auth middleware.
pub struct AppState {
    pub config: Config,
    /// The single accepted credential, resolved once at startup.
    pub credential: Credential,
    pub store: Arc<ObjectStore>,
    pub sync: Arc<SyncCoordinator>,
}
