//! Cursor: detached, fail-fast traversal over an [`OpenTable`].
//!
//! Shared borrows make interleaved mutation unrepresentable for a borrowing
//! iterator, so the fail-fast protocol lives on a detached cursor that is
//! handed the table at every step, in the same pass-the-owner shape as a
//! handle-based map API. The cursor captures the table's modification
//! counter at creation; a mismatch at any later step surfaces as
//! [`TableError::ConcurrentModification`] instead of yielding stale slots.

use crate::open_table::{OpenTable, TableError};

/// One-shot forward traversal over occupied slots in array order.
///
/// Created by [`OpenTable::cursor`]. A fresh cursor is required to traverse
/// again; an exhausted one keeps returning `Ok(None)`.
///
/// A cursor is only meaningful with the table that created it. Handing a
/// step a different table is detected whenever the counters or slot states
/// disagree and surfaces as [`TableError::ConcurrentModification`]; two
/// tables with identical mutation histories cannot be told apart, so
/// keeping cursor and table paired is the caller's contract.
pub struct Cursor {
    /// Next slot index to examine.
    scan: usize,
    /// Slot index of the element most recently yielded by [`next`](Self::next).
    current: Option<usize>,
    /// Modification counter captured at creation (or re-captured by a
    /// sanctioned [`remove`](Self::remove)).
    mods: u64,
    poisoned: bool,
}

impl Cursor {
    pub(crate) fn new(mods: u64) -> Self {
        Cursor {
            scan: 0,
            current: None,
            mods,
            poisoned: false,
        }
    }

    fn check<K, V, S>(&mut self, table: &OpenTable<K, V, S>) -> Result<(), TableError> {
        if self.poisoned || self.mods != table.mods() {
            self.poisoned = true;
            return Err(TableError::ConcurrentModification);
        }
        Ok(())
    }

    /// Advance to the next occupied slot of `table`, or `Ok(None)` once the
    /// traversal is exhausted.
    ///
    /// Fails with [`TableError::ConcurrentModification`] if the table was
    /// mutated since this cursor was created, other than through
    /// [`remove`](Self::remove) on this same cursor. A failed cursor stays
    /// failed.
    pub fn next<'t, K, V, S>(
        &mut self,
        table: &'t OpenTable<K, V, S>,
    ) -> Result<Option<(&'t K, &'t V)>, TableError> {
        self.check(table)?;
        while self.scan < table.capacity() {
            let i = self.scan;
            self.scan += 1;
            if let Some(pair) = table.pair_at(i) {
                self.current = Some(i);
                return Ok(Some(pair));
            }
        }
        self.current = None;
        Ok(None)
    }

    /// Remove the element most recently yielded by [`next`](Self::next) from
    /// `table`: the one sanctioned mutation during a traversal. The cursor
    /// re-captures the modification counter and remains valid for further
    /// steps.
    ///
    /// Returns `Ok(None)` when there is no current element: before the first
    /// `next`, after exhaustion, or when the element was already removed.
    pub fn remove<K, V, S>(
        &mut self,
        table: &mut OpenTable<K, V, S>,
    ) -> Result<Option<(K, V)>, TableError> {
        self.check(table)?;
        let Some(i) = self.current.take() else {
            return Ok(None);
        };
        match table.remove_at(i) {
            Some(pair) => {
                self.mods = table.mods();
                Ok(Some(pair))
            }
            // The current slot is not occupied even though the counter
            // matched: `table` is not the table this cursor came from.
            // Nothing was mutated; refuse the cursor from here on.
            None => {
                self.poisoned = true;
                Err(TableError::ConcurrentModification)
            }
        }
    }
}
