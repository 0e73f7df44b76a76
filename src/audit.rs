//! Append-only audit log.
//!
//! Each validator and executor owns (or is handed) one log for its lifetime.
//! Entries are never mutated after append; readers only get clones or a
//! shared borrow for aggregation. Appends are serialized by a mutex so one
//! log can be shared across concurrent callers through an `Arc`.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// An instance-scoped, append-only sequence of audit records.
#[derive(Debug)]
pub struct AuditLog<T> {
    entries: Mutex<Vec<T>>,
}

impl<T> Default for AuditLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AuditLog<T> {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Appends a record to the end of the log.
    pub fn append(&self, entry: T) {
        self.lock().push(entry);
    }

    /// Returns the number of records appended so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Runs `f` against the current records without copying them.
    pub fn with_entries<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        let entries = self.lock();
        f(&entries)
    }

    // A panic while holding the lock cannot leave a half-written Vec::push
    // behind, so a poisoned log is still consistent.
    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> AuditLog<T> {
    /// Returns a copy of every record in append order.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().clone()
    }
}

/// Formats `successes / total` as a percentage with one decimal place.
///
/// Returns `"0%"` when nothing has been recorded.
pub fn success_rate(successes: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{:.1}%", successes as f64 / total as f64 * 100.0)
}
