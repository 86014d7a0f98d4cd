use std::time::{Duration, Instant};

use crate::model::SessionDraft;

/// Trailing-edge debounce for draft persistence. Marks change one student
/// at a time, so every change restarts a short quiet period and only the
/// newest draft is written once the period elapses. The in-memory copy is
/// authoritative for the current process; the write is a durability aid.
pub struct DraftCache {
    interval: Duration,
    current: Option<SessionDraft>,
    dirty: bool,
    deadline: Option<Instant>,
}

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

impl DraftCache {
    pub fn new(interval: Duration) -> Self {
        DraftCache {
            interval,
            current: None,
            dirty: false,
            deadline: None,
        }
    }

    /// Records a new draft state and restarts the quiet period.
    pub fn stage(&mut self, draft: SessionDraft, now: Instant) {
        self.current = Some(draft);
        self.dirty = true;
        self.deadline = Some(now + self.interval);
    }

    /// The newest draft this process has seen, persisted or not.
    pub fn latest(&self) -> Option<&SessionDraft> {
        self.current.as_ref()
    }

    /// Returns the draft to persist if the quiet period has elapsed since
    /// the last change. Returning it marks the cache clean; a later change
    /// makes it dirty again.
    pub fn take_due(&mut self, now: Instant) -> Option<SessionDraft> {
        if !self.dirty {
            return None;
        }
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.dirty = false;
                self.deadline = None;
                self.current.clone()
            }
            _ => None,
        }
    }

    /// Returns any unpersisted draft regardless of the deadline. Used
    /// before reads, before submission, and at shutdown.
    pub fn flush(&mut self) -> Option<SessionDraft> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        self.deadline = None;
        self.current.clone()
    }

    /// Re-arms persistence after a failed write so a later tick retries
    /// once storage recovers, instead of staying memory-only for the
    /// rest of the session.
    pub fn mark_unpersisted(&mut self, now: Instant) {
        if self.current.is_some() {
            self.dirty = true;
            self.deadline = Some(now + self.interval);
        }
    }

    /// Drops the draft entirely (successful hand-off or explicit discard).
    pub fn clear(&mut self) {
        self.current = None;
        self.dirty = false;
        self.deadline = None;
    }
}
