use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::sync::{run_sync_pass, HostReported, SkipReason, SyncPass};
use serde_json::json;

fn pass_json(pass: &SyncPass) -> serde_json::Value {
    match pass {
        SyncPass::Skipped(reason) => {
            let reason = match reason {
                SkipReason::Offline => "offline",
                SkipReason::AlreadyRunning => "sync_in_flight",
            };
            json!({ "ran": false, "reason": reason })
        }
        SyncPass::Completed(outcome) => json!({
            "ran": true,
            "success": outcome.success,
            "deliveredCount": outcome.delivered,
            "remaining": outcome.remaining,
            "message": outcome.message
        }),
    }
}

fn run_pass(state: &mut AppState) -> Result<SyncPass, (&'static str, String)> {
    let online = state.online;
    let Some(conn) = state.db.as_ref() else {
        return Err(("no_workspace", "select a workspace first".to_string()));
    };
    let Some(remote) = state.remote.as_mut() else {
        return Err(("no_remote", "configure the remote store first".to_string()));
    };
    run_sync_pass(conn, remote, &HostReported(online), &mut state.sync_lock)
        .map_err(|e| ("storage_unavailable", format!("{e:#}")))
}

fn handle_sync_run(state: &mut AppState, req: &Request) -> serde_json::Value {
    match run_pass(state) {
        Ok(pass) => ok(&req.id, pass_json(&pass)),
        Err((code, message)) => err(&req.id, code, message, None),
    }
}

fn handle_connectivity_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(online) = req.params.get("online").and_then(|v| v.as_bool()) else {
        return err(&req.id, "bad_params", "missing params.online", None);
    };
    let was_online = state.online;
    state.online = online;

    // Regaining connectivity is the main trigger for draining the queue.
    // Missing workspace/remote is not an error here: the signal may
    // arrive before the host finishes configuration.
    let sync = if online && !was_online {
        run_pass(state).ok().map(|pass| pass_json(&pass))
    } else {
        None
    };

    ok(
        &req.id,
        json!({
            "online": online,
            "sync": sync
        }),
    )
}

fn handle_connectivity_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "online": state.online }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sync.run" => Some(handle_sync_run(state, req)),
        "connectivity.set" => Some(handle_connectivity_set(state, req)),
        "connectivity.get" => Some(handle_connectivity_get(state, req)),
        _ => None,
    }
}
