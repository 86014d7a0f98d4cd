use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::remote::{ensure_remote_schema, SqliteRemote};
use crate::store;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "dataDir": state.data_dir.as_ref().map(|p| p.to_string_lossy().to_string()),
            "remotePath": state.remote.as_ref().map(|r| r.path().to_string_lossy().to_string()),
            "online": state.online
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match store::open_store(&path) {
        Ok(conn) => {
            state.data_dir = Some(path.clone());
            state.db = Some(conn);
            state.drafts.clear();
            ok(&req.id, json!({ "dataDir": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn handle_remote_configure(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match ensure_remote_schema(&path) {
        Ok(()) => {
            state.remote = Some(SqliteRemote::new(path.clone()));
            ok(&req.id, json!({ "remotePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "remote_configure_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "remote.configure" => Some(handle_remote_configure(state, req)),
        _ => None,
    }
}
