//! garden_client: async client core for the community-garden program
//!
//! Typed access to the garden REST API (people, tools, seeds, grounds and their
//! beds, bed schedules, volunteer assignments) plus the view-state logic the
//! pages build on top of it.
//! - Session: access/refresh tokens, one shared refresh-and-retry on 401
//! - Beds: free/occupied/complete resolution and card fields
//! - Terrain: ground + per-bed lookups through a stale-time query cache
//! - Modals, notifications, validation: page state without rendering

pub mod api;
pub mod auth;
pub mod beds;
pub mod cache;
pub mod config;
pub mod error;
pub mod guard;
pub mod logging;
pub mod modal;
pub mod models;
pub mod notify;
pub mod session;
pub mod storage;
pub mod terrain;
pub mod transport;
pub mod util;
pub mod validation;

use std::sync::Arc;

use crate::api::Api;
use crate::cache::QueryCache;
use crate::config::Config;
use crate::error::ApiResult;
use crate::session::SessionController;
use crate::storage::TokenStore;
use crate::transport::HttpTransport;

/// Wires the HTTP transport, the persisted session and the query cache.
pub fn connect(config: &Config) -> ApiResult<Api> {
    let transport = Arc::new(HttpTransport::from_config(config)?);
    let store = TokenStore::open(&config.session_path)?;
    let session = SessionController::new(transport, store)?;
    Ok(Api::new(session, Arc::new(QueryCache::new(config.stale_time))))
}
