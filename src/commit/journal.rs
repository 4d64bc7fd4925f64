use crate::catalog::types::RowKey;
use crate::store::{ChangeSet, RowData};
use std::collections::VecDeque;

/// Compensating statement for one successful write. Applying it is a manual
/// decision; nothing is rolled back automatically.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoEntry {
    /// Restore the values an update overwrote.
    Update {
        table: String,
        key: RowKey,
        previous: ChangeSet,
    },
    /// Remove a row created by an insert.
    Insert { table: String, key: RowKey },
    /// Re-create a deleted row with its last known values.
    Delete {
        table: String,
        key: RowKey,
        values: RowData,
    },
}

impl UndoEntry {
    pub fn table(&self) -> &str {
        match self {
            UndoEntry::Update { table, .. }
            | UndoEntry::Insert { table, .. }
            | UndoEntry::Delete { table, .. } => table,
        }
    }

    pub fn key(&self) -> RowKey {
        match self {
            UndoEntry::Update { key, .. }
            | UndoEntry::Insert { key, .. }
            | UndoEntry::Delete { key, .. } => *key,
        }
    }
}

/// Bounded undo log, oldest entries dropped first.
#[derive(Debug)]
pub(crate) struct Journal {
    capacity: usize,
    entries: VecDeque<UndoEntry>,
}

impl Journal {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
        }
    }

    pub(crate) fn record(&mut self, entry: UndoEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub(crate) fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop_back()
    }

    pub(crate) fn entries(&self) -> Vec<UndoEntry> {
        self.entries.iter().cloned().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{Journal, UndoEntry};

    fn insert(key: i64) -> UndoEntry {
        UndoEntry::Insert {
            table: "users".into(),
            key,
        }
    }

    #[test]
    fn drops_oldest_beyond_capacity() {
        let mut journal = Journal::new(2);
        journal.record(insert(1));
        journal.record(insert(2));
        journal.record(insert(3));
        let keys: Vec<_> = journal.entries().iter().map(UndoEntry::key).collect();
        assert_eq!(keys, vec![2, 3]);
        assert_eq!(journal.pop().map(|e| e.key()), Some(3));
    }

    #[test]
    fn zero_capacity_disables_recording() {
        let mut journal = Journal::new(0);
        journal.record(insert(1));
        assert!(journal.entries().is_empty());
    }
}
