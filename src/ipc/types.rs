use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::draft::{DraftCache, DEFAULT_DEBOUNCE};
use crate::remote::SqliteRemote;
use crate::sync::SyncLock;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub data_dir: Option<PathBuf>,
    pub db: Option<Connection>,
    pub remote: Option<SqliteRemote>,
    /// Latest connectivity hint from the host runtime. Assumed online
    /// until told otherwise.
    pub online: bool,
    pub drafts: DraftCache,
    pub sync_lock: SyncLock,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            data_dir: None,
            db: None,
            remote: None,
            online: true,
            drafts: DraftCache::new(DEFAULT_DEBOUNCE),
            sync_lock: SyncLock::default(),
        }
    }
}
