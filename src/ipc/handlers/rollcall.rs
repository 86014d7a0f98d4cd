use crate::ipc::error::{err, ok};
use crate::ipc::handlers::draft::persist_staged_draft;
use crate::ipc::types::{AppState, Request};
use crate::model::AttendanceBatch;
use crate::store;
use crate::sync::{submit_batch, HostReported, SubmitOutcome};
use log::warn;
use serde_json::json;

fn parse_batch(params: &serde_json::Value) -> Result<AttendanceBatch, String> {
    let batch: AttendanceBatch =
        serde_json::from_value(params.clone()).map_err(|e| format!("invalid batch: {}", e))?;
    batch.validate()?;
    Ok(batch)
}

fn handle_rollcall_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let batch = match parse_batch(&req.params) {
        Ok(b) => b,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    // The draft may still be sitting in the debounce window; settle it so
    // a failed submission leaves a recoverable draft on disk.
    persist_staged_draft(state);

    let online = state.online;
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let outcome = match state.remote.as_mut() {
        Some(remote) => submit_batch(conn, remote, &HostReported(online), &batch),
        // No remote configured yet: same handling as being offline.
        None => store::enqueue(conn, &batch).map(|_| SubmitOutcome::Queued),
    };

    match outcome {
        Ok(result) => {
            // Handed off (committed or queued): the roll call is no longer
            // an unfinished draft.
            state.drafts.clear();
            if let Err(e) = store::clear_draft(conn) {
                warn!("stored draft could not be cleared after submit: {e:#}");
            }
            let delivered = result == SubmitOutcome::Delivered;
            ok(
                &req.id,
                json!({
                    "delivered": delivered,
                    "queued": !delivered
                }),
            )
        }
        // Neither delivered nor queued: the batch would be lost, so this
        // must surface to the user. The draft is kept for retry.
        Err(e) => err(&req.id, "storage_unavailable", format!("{e:#}"), None),
    }
}

fn handle_queue_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match store::list_pending(conn) {
        Ok(entries) => {
            let count = entries.len();
            ok(&req.id, json!({ "entries": entries, "count": count }))
        }
        Err(e) => err(&req.id, "storage_unavailable", format!("{e:#}"), None),
    }
}

fn handle_queue_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match store::clear_pending(conn) {
        Ok(()) => ok(&req.id, json!({ "cleared": true })),
        Err(e) => err(&req.id, "storage_unavailable", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "rollcall.submit" => Some(handle_rollcall_submit(state, req)),
        "queue.list" => Some(handle_queue_list(state, req)),
        "queue.clear" => Some(handle_queue_clear(state, req)),
        _ => None,
    }
}
