use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{Connection, OpenFlags};

use crate::model::AttendanceBatch;

/// Write half of the school-server attendance store. A committed batch
/// fully replaces whatever was previously stored for its
/// `(class_id, date)` key, which makes redelivery after a false-negative
/// failure signal harmless.
pub trait RemoteStore {
    fn write_batch(&mut self, batch: &AttendanceBatch) -> anyhow::Result<()>;
}

/// Shipped implementation: the central attendance database is a SQLite
/// file on a school-server path, typically a network mount. Every write
/// opens the database fresh so a vanished mount shows up as a failed
/// write instead of a stale handle.
pub struct SqliteRemote {
    path: PathBuf,
}

impl SqliteRemote {
    pub fn new(path: PathBuf) -> Self {
        SqliteRemote { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> anyhow::Result<Connection> {
        // Never create: opening a missing file would silently shadow the
        // real store with an empty local one while the mount is gone.
        if !self.path.is_file() {
            anyhow::bail!("remote store not reachable at {}", self.path.display());
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }
}

impl RemoteStore for SqliteRemote {
    fn write_batch(&mut self, batch: &AttendanceBatch) -> anyhow::Result<()> {
        let conn = self.open()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM attendance_marks WHERE class_id = ? AND date = ?",
            (&batch.class_id, &batch.date),
        )?;
        let recorded_at = Utc::now().to_rfc3339();
        for mark in &batch.marks {
            tx.execute(
                "INSERT INTO attendance_marks(class_id, date, student_id, present, justified, recorded_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                (
                    &batch.class_id,
                    &batch.date,
                    &mark.student_id,
                    mark.present as i64,
                    mark.justified as i64,
                    &recorded_at,
                ),
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// Creates the attendance table if the configured database does not have
/// it yet. Called once when the remote path is configured, never on the
/// write path.
pub fn ensure_remote_schema(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_marks(
            class_id TEXT NOT NULL,
            date TEXT NOT NULL,
            student_id TEXT NOT NULL,
            present INTEGER NOT NULL,
            justified INTEGER NOT NULL DEFAULT 0,
            recorded_at TEXT,
            PRIMARY KEY(class_id, date, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_marks_key ON attendance_marks(class_id, date)",
        [],
    )?;
    Ok(())
}
