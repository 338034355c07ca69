//! Undo journals for open transaction frames.
//!
//! A frame records how to undo each effect it has, at the time it has it.
//! Ledger transfers are journaled as [`TransferRecord`]s because the tokens
//! live outside the module; state changes are journaled by
//! [`ModuleState`](crate::state::ModuleState) as prior values of the keys
//! they touch. A failing frame hands back only its own entries, newest first.

use royalty_core::types::{Address, TokenId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferRecord {
    pub token: TokenId,
    pub from: Address,
    pub to: Address,
    pub amount: u64,
}

impl TransferRecord {
    /// The transfer that undoes this one.
    pub fn reversed(&self) -> Self {
        Self {
            token: self.token,
            from: self.to,
            to: self.from,
            amount: self.amount,
        }
    }
}

#[derive(Debug)]
pub struct Journal<E> {
    /// Start offset of every open frame, innermost last.
    marks: Vec<usize>,
    entries: Vec<E>,
}

impl<E> Default for Journal<E> {
    fn default() -> Self {
        Self {
            marks: Vec::new(),
            entries: Vec::new(),
        }
    }
}

impl<E> Journal<E> {
    /// Open a frame and return its mark.
    pub fn open(&mut self) -> usize {
        let mark = self.entries.len();
        self.marks.push(mark);
        mark
    }

    /// Record an entry in the innermost frame. Outside any frame there is
    /// nothing to undo and the entry is dropped.
    pub fn record(&mut self, entry: E) {
        if !self.marks.is_empty() {
            self.entries.push(entry);
        }
    }

    /// Entries of the innermost open frame.
    pub fn current(&self) -> &[E] {
        match self.marks.last() {
            Some(mark) => &self.entries[*mark..],
            None => &[],
        }
    }

    /// Close the innermost frame successfully. Its entries fold into the
    /// enclosing frame, or are forgotten when it was the outermost.
    pub fn commit(&mut self) {
        self.marks.pop();
        if self.marks.is_empty() {
            self.entries.clear();
        }
    }

    /// Close the innermost frame as failed and hand back its entries in the
    /// order they must be undone.
    pub fn rollback(&mut self, mark: usize) -> Vec<E> {
        self.marks.pop();
        let mut undo = self.entries.split_off(mark.min(self.entries.len()));
        undo.reverse();
        if self.marks.is_empty() {
            self.entries.clear();
        }
        undo
    }

    pub fn depth(&self) -> usize {
        self.marks.len()
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(n: u8) -> TransferRecord {
        TransferRecord {
            token: TokenId([1; 32]),
            from: Address([n; 32]),
            to: Address([n + 100; 32]),
            amount: n as u64,
        }
    }

    #[test]
    fn outside_frames_nothing_is_kept() {
        let mut journal: Journal<TransferRecord> = Journal::default();
        journal.record(rec(1));
        assert_eq!(journal.pending(), 0);
    }

    #[test]
    fn outer_commit_clears() {
        let mut journal: Journal<TransferRecord> = Journal::default();
        journal.open();
        journal.record(rec(1));
        let _inner = journal.open();
        journal.record(rec(2));
        journal.commit();
        assert_eq!(journal.pending(), 2);
        journal.commit();
        assert_eq!(journal.pending(), 0);
        assert_eq!(journal.depth(), 0);
    }

    #[test]
    fn inner_rollback_returns_only_its_transfers_newest_first() {
        let mut journal: Journal<TransferRecord> = Journal::default();
        journal.open();
        journal.record(rec(1));
        let inner = journal.open();
        journal.record(rec(2));
        journal.record(rec(3));
        let undo = journal.rollback(inner);
        assert_eq!(undo, vec![rec(3), rec(2)]);
        assert_eq!(journal.pending(), 1);
        assert_eq!(journal.depth(), 1);
    }

    #[test]
    fn reversed_swaps_ends() {
        let r = rec(7).reversed();
        assert_eq!(r.from, Address([107; 32]));
        assert_eq!(r.to, Address([7; 32]));
        assert_eq!(r.amount, 7);
    }

    #[test]
    fn current_sees_only_the_innermost_frame() {
        let mut journal: Journal<TransferRecord> = Journal::default();
        assert!(journal.current().is_empty());
        journal.open();
        journal.record(rec(1));
        journal.open();
        journal.record(rec(2));
        assert_eq!(journal.current(), &[rec(2)]);
        journal.commit();
        assert_eq!(journal.current(), &[rec(1), rec(2)]);
    }

    #[test]
    fn outer_rollback_empties_the_journal() {
        let mut journal: Journal<u32> = Journal::default();
        let outer = journal.open();
        journal.record(1);
        journal.open();
        journal.record(2);
        journal.commit();
        assert_eq!(journal.rollback(outer), vec![2, 1]);
        assert_eq!(journal.depth(), 0);
        assert_eq!(journal.pending(), 0);
    }
}
