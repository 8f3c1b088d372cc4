use chrono::{DateTime, Utc};

use tillbook_core::{DeletedItemId, DomainError, DomainResult};
use tillbook_store::{InMemoryStore, KeyValueStore};

use crate::deleted::{DeletedItem, DeletedKind, DeletedRecord};

/// Store of soft-deleted entity snapshots.
///
/// `tombstone` files a snapshot, `take` consumes it for restore (at most
/// once), `purge` drops it irreversibly. The bin never mutates entries in
/// place; a snapshot is exactly what the entity looked like at delete time.
pub struct RecycleBin {
    items: InMemoryStore<DeletedItemId, DeletedItem>,
}

impl RecycleBin {
    pub fn new() -> Self {
        Self {
            items: InMemoryStore::new(),
        }
    }

    /// File a snapshot and return the bin entry id.
    pub fn tombstone(&self, record: DeletedRecord, now: DateTime<Utc>) -> DeletedItemId {
        let id = DeletedItemId::new();
        self.items.insert(
            id,
            DeletedItem {
                id,
                record,
                deleted_at: now,
            },
        );
        id
    }

    /// Read an entry without consuming it (restore validates before it
    /// commits, so failed restores leave the entry for a later retry).
    pub fn peek(&self, id: DeletedItemId) -> DomainResult<DeletedItem> {
        self.items.get(&id).ok_or(DomainError::TombstoneNotFound)
    }

    /// Consume an entry on successful restore.
    pub fn take(&self, id: DeletedItemId) -> DomainResult<DeletedItem> {
        self.items.remove(&id).ok_or(DomainError::TombstoneNotFound)
    }

    /// Permanently delete: the entry is dropped and can never be restored.
    /// The underlying entity was already fully reversed when it was
    /// tombstoned, so there is nothing to compensate.
    pub fn purge(&self, id: DeletedItemId) -> DomainResult<()> {
        self.items
            .remove(&id)
            .map(|_| ())
            .ok_or(DomainError::TombstoneNotFound)
    }

    /// All entries, most recently deleted first.
    pub fn list(&self) -> Vec<DeletedItem> {
        let mut items = self.items.list();
        items.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        items
    }

    /// Entries of one kind, most recently deleted first.
    pub fn list_kind(&self, kind: DeletedKind) -> Vec<DeletedItem> {
        self.list()
            .into_iter()
            .filter(|item| item.record.kind() == kind)
            .collect()
    }
}

impl Default for RecycleBin {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillbook_core::ExpenseId;
    use tillbook_expenses::Expense;

    fn expense_record(description: &str) -> DeletedRecord {
        DeletedRecord::Expense(
            Expense::new(ExpenseId::new(), description, "misc", 100, Utc::now()).unwrap(),
        )
    }

    #[test]
    fn tombstone_then_take_round_trips_the_snapshot() {
        let bin = RecycleBin::new();
        let record = expense_record("Rent");
        let id = bin.tombstone(record.clone(), Utc::now());

        let item = bin.take(id).unwrap();
        assert_eq!(item.record, record);

        // Consumed: a second take fails.
        let err = bin.take(id).unwrap_err();
        assert_eq!(err, DomainError::TombstoneNotFound);
    }

    #[test]
    fn peek_does_not_consume() {
        let bin = RecycleBin::new();
        let id = bin.tombstone(expense_record("Rent"), Utc::now());

        bin.peek(id).unwrap();
        bin.peek(id).unwrap();
        assert_eq!(bin.list().len(), 1);
    }

    #[test]
    fn purge_is_irreversible() {
        let bin = RecycleBin::new();
        let id = bin.tombstone(expense_record("Rent"), Utc::now());

        bin.purge(id).unwrap();
        assert_eq!(bin.peek(id).unwrap_err(), DomainError::TombstoneNotFound);
        assert_eq!(bin.purge(id).unwrap_err(), DomainError::TombstoneNotFound);
    }

    #[test]
    fn list_is_most_recent_first_and_filterable_by_kind() {
        let bin = RecycleBin::new();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::minutes(5);
        bin.tombstone(expense_record("Rent"), t0);
        let newest = bin.tombstone(expense_record("Electricity"), t1);

        let all = bin.list();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, newest);

        assert_eq!(bin.list_kind(DeletedKind::Expense).len(), 2);
        assert!(bin.list_kind(DeletedKind::Invoice).is_empty());
    }
}
