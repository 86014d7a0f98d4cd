use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::model::{AttendanceBatch, PendingEntry, SessionDraft};

/// Opens (creating if needed) the per-device database that backs the
/// draft slot and the pending queue. The schema is applied idempotently
/// so reopening an existing data directory is always safe.
pub fn open_store(data_dir: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("chamada.sqlite3");
    let conn = Connection::open(db_path)?;

    // Single-slot table: there is at most one in-progress roll call at a
    // time, matching the single roll-call screen.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS session_draft(
            slot INTEGER PRIMARY KEY CHECK (slot = 0),
            class_id TEXT NOT NULL,
            date TEXT NOT NULL,
            marks TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS pending_queue(
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            class_id TEXT NOT NULL,
            date TEXT NOT NULL,
            marks TEXT NOT NULL,
            enqueued_at TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pending_queue_key ON pending_queue(class_id, date)",
        [],
    )?;

    Ok(conn)
}

pub fn save_draft(conn: &Connection, draft: &SessionDraft) -> anyhow::Result<()> {
    let marks_json = serde_json::to_string(&draft.marks)?;
    conn.execute(
        "INSERT INTO session_draft(slot, class_id, date, marks, updated_at)
         VALUES(0, ?, ?, ?, ?)
         ON CONFLICT(slot) DO UPDATE SET
           class_id = excluded.class_id,
           date = excluded.date,
           marks = excluded.marks,
           updated_at = excluded.updated_at",
        (
            &draft.class_id,
            &draft.date,
            &marks_json,
            Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(())
}

/// Returns whatever draft is stored, regardless of class/date. The caller
/// decides whether it applies to the screen being opened.
pub fn load_draft(conn: &Connection) -> anyhow::Result<Option<SessionDraft>> {
    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT class_id, date, marks FROM session_draft WHERE slot = 0",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((class_id, date, marks_json)) = row else {
        return Ok(None);
    };
    let marks = serde_json::from_str(&marks_json)?;
    Ok(Some(SessionDraft {
        class_id,
        date,
        marks,
    }))
}

pub fn clear_draft(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("DELETE FROM session_draft WHERE slot = 0", [])?;
    Ok(())
}

/// Appends a batch to the queue. A batch already queued for the same
/// `(class_id, date)` is superseded rather than duplicated: the stale
/// entry is dropped and the new one takes the tail position.
pub fn enqueue(conn: &Connection, batch: &AttendanceBatch) -> anyhow::Result<PendingEntry> {
    let marks_json = serde_json::to_string(&batch.marks)?;
    let entry = PendingEntry {
        id: Uuid::new_v4().to_string(),
        batch: batch.clone(),
        enqueued_at: Utc::now().to_rfc3339(),
        attempts: 0,
    };
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM pending_queue WHERE class_id = ? AND date = ?",
        (&batch.class_id, &batch.date),
    )?;
    tx.execute(
        "INSERT INTO pending_queue(id, class_id, date, marks, enqueued_at, attempts)
         VALUES(?, ?, ?, ?, ?, 0)",
        (
            &entry.id,
            &batch.class_id,
            &batch.date,
            &marks_json,
            &entry.enqueued_at,
        ),
    )?;
    tx.commit()?;
    Ok(entry)
}

/// Fresh FIFO snapshot of the queue, oldest first.
pub fn list_pending(conn: &Connection) -> anyhow::Result<Vec<PendingEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, class_id, date, marks, enqueued_at, attempts
         FROM pending_queue
         ORDER BY seq",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, i64>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut entries = Vec::with_capacity(rows.len());
    for (id, class_id, date, marks_json, enqueued_at, attempts) in rows {
        let marks = serde_json::from_str(&marks_json)?;
        entries.push(PendingEntry {
            id,
            batch: AttendanceBatch {
                class_id,
                date,
                marks,
            },
            enqueued_at,
            attempts,
        });
    }
    Ok(entries)
}

pub fn remove_pending(conn: &Connection, entry_id: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM pending_queue WHERE id = ?", [entry_id])?;
    Ok(())
}

pub fn clear_pending(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("DELETE FROM pending_queue", [])?;
    Ok(())
}

pub fn bump_attempts(conn: &Connection, entry_id: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE pending_queue SET attempts = attempts + 1 WHERE id = ?",
        [entry_id],
    )?;
    Ok(())
}
