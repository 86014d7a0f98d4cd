use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{parse_date, SessionDraft};
use crate::store;
use log::warn;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Instant;

struct HandlerErr {
    code: &'static str,
    message: String,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, None)
    }
}

fn bad_params(message: impl Into<String>) -> HandlerErr {
    HandlerErr {
        code: "bad_params",
        message: message.into(),
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| bad_params(format!("missing {}", key)))
}

fn parse_marks(params: &serde_json::Value) -> Result<BTreeMap<String, Option<bool>>, HandlerErr> {
    let Some(obj) = params.get("marks").and_then(|v| v.as_object()) else {
        return Err(bad_params("missing marks object"));
    };
    let mut marks = BTreeMap::new();
    for (student_id, value) in obj {
        let mark = match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(*b),
            _ => {
                return Err(bad_params(format!(
                    "mark for {} must be true, false or null",
                    student_id
                )))
            }
        };
        marks.insert(student_id.clone(), mark);
    }
    Ok(marks)
}

fn parse_draft_key(params: &serde_json::Value) -> Result<(String, String), HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let date = get_required_str(params, "date")?;
    parse_date(&date).map_err(bad_params)?;
    Ok((class_id, date))
}

/// Writes the staged draft through to the device store if the debounce
/// quiet period has elapsed. Called by the main loop between requests.
/// Persistence is best-effort: a storage failure keeps the in-memory
/// draft working for the rest of the session.
pub fn persist_due_draft(state: &mut AppState) {
    let Some(draft) = state.drafts.take_due(Instant::now()) else {
        return;
    };
    if !write_draft(state, &draft) {
        state.drafts.mark_unpersisted(Instant::now());
    }
}

/// Forces any staged draft to storage, ignoring the debounce deadline.
/// Called before draft reads and at shutdown so no change is lost to the
/// quiet period.
pub fn persist_staged_draft(state: &mut AppState) {
    let Some(draft) = state.drafts.flush() else {
        return;
    };
    if !write_draft(state, &draft) {
        state.drafts.mark_unpersisted(Instant::now());
    }
}

fn write_draft(state: &AppState, draft: &SessionDraft) -> bool {
    let Some(conn) = state.db.as_ref() else {
        return false;
    };
    match store::save_draft(conn, draft) {
        Ok(()) => true,
        Err(e) => {
            warn!("draft persistence failed, will retry from memory: {e:#}");
            false
        }
    }
}

fn handle_draft_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let (class_id, date) = match parse_draft_key(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let marks = match parse_marks(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if marks.is_empty() {
        // Nothing worth saving yet.
        return ok(&req.id, json!({ "staged": false }));
    }
    state.drafts.stage(
        SessionDraft {
            class_id,
            date,
            marks,
        },
        Instant::now(),
    );
    ok(&req.id, json!({ "staged": true }))
}

fn handle_draft_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (class_id, date) = match parse_draft_key(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    // The staged copy is newer than anything on disk; persist it first so
    // memory and storage agree on what the latest draft is.
    persist_staged_draft(state);

    if let Some(draft) = state.drafts.latest() {
        if draft.matches(&class_id, &date) {
            return ok(&req.id, json!({ "draft": draft }));
        }
        // A draft for some other screen is treated as absent, not deleted.
        return ok(&req.id, json!({ "draft": null }));
    }

    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match store::load_draft(conn) {
        Ok(Some(draft)) if draft.matches(&class_id, &date) => {
            ok(&req.id, json!({ "draft": draft }))
        }
        Ok(_) => ok(&req.id, json!({ "draft": null })),
        Err(e) => {
            // Degrade to "no draft": the screen starts blank instead of
            // the daemon failing the open.
            warn!("draft load failed: {e:#}");
            ok(&req.id, json!({ "draft": null }))
        }
    }
}

fn handle_draft_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.drafts.clear();
    if let Some(conn) = state.db.as_ref() {
        if let Err(e) = store::clear_draft(conn) {
            warn!("stored draft could not be cleared: {e:#}");
        }
    }
    ok(&req.id, json!({ "cleared": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "draft.save" => Some(handle_draft_save(state, req)),
        "draft.load" => Some(handle_draft_load(state, req)),
        "draft.clear" => Some(handle_draft_clear(state, req)),
        _ => None,
    }
}
