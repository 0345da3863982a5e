// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! History ledger: how an accumulated identity was built.
//!
//! The ledger is an ordered list of entries. Each entry is keyed by an
//! accumulated identity and optionally records the constituent identities
//! folded into it. Only the tail entry (`last`) is ever edited in place;
//! everything before it is frozen history.
//!
//! # Invariants
//!
//! - Composing every key in ledger order yields the container's total
//!   identity ([`Ledger::total`]).
//! - An entry with members holds at least two unordered identities and its
//!   key is their composition.
//! - Ordered identities never fold: each one is its own entry.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::trace;

use crate::hosh::Hosh;

/// Errors raised by ledger edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Attempted to remove an identity from a ledger with no entries.
    #[error("[LEDGER_EMPTY] cannot remove {removed} from an empty ledger")]
    EmptyLedger {
        /// Identity whose removal was requested.
        removed: Hosh,
    },
}

/// One ledger entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Accumulated identity of this entry.
    pub key: Hosh,
    /// Constituents folded into `key`; `None` when the entry is a single
    /// identity.
    pub members: Option<BTreeSet<Hosh>>,
}

impl LedgerEntry {
    fn single(key: Hosh) -> Self {
        Self { key, members: None }
    }

    /// Whether a following unordered identity may fold into this entry.
    fn is_mergeable(&self) -> bool {
        self.key.is_unordered()
    }
}

/// Which path a [`Ledger::rewrite`] took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rewrite {
    /// The removed identity was the whole tail entry.
    Tail,
    /// The removed identity was subtracted out of the tail fold.
    Subtracted,
    /// The removed identity sat in frozen history; the ledger was rebuilt.
    Rebuilt,
}

/// Ordered record of accumulated identities.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds `hoshes` from an empty ledger, in order.
    pub fn rebuild<I>(hoshes: I) -> Self
    where
        I: IntoIterator<Item = Hosh>,
    {
        let mut ledger = Self::new();
        for h in hoshes {
            ledger.extend(h);
        }
        ledger
    }

    /// Entries in ledger order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Number of entries (not constituents).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key of the most recently written entry.
    pub fn last(&self) -> Option<Hosh> {
        self.entries.last().map(|e| e.key)
    }

    /// Composition of every key in ledger order.
    pub fn total(&self) -> Hosh {
        self.entries
            .iter()
            .fold(Hosh::IDENTITY, |acc, e| acc.compose(e.key))
    }

    /// Appends `hosh`.
    ///
    /// Unordered identities fold into an unordered tail entry; anything else
    /// opens a fresh entry.
    pub fn extend(&mut self, hosh: Hosh) {
        let fold = hosh.is_unordered()
            && self.entries.last().is_some_and(LedgerEntry::is_mergeable);
        if !fold {
            trace!(hosh = %hosh.short(), "ledger: new entry");
            self.entries.push(LedgerEntry::single(hosh));
            return;
        }
        let Some(tail) = self.entries.last_mut() else {
            return;
        };
        let previous = tail.key;
        let merged = previous.compose(hosh);
        let members = match tail.members.take() {
            None => BTreeSet::from([previous, hosh]),
            Some(mut many) => {
                many.insert(hosh);
                many
            }
        };
        trace!(hosh = %hosh.short(), merged = %merged.short(), "ledger: folded into tail");
        tail.key = merged;
        tail.members = Some(members);
    }

    /// Removes `removed` from the ledger.
    ///
    /// `remaining` must list the identities still present after removal, in
    /// encounter order; it is only consumed when `removed` is not at the tail
    /// and the ledger has to be re-folded from scratch.
    ///
    /// # Errors
    ///
    /// [`LedgerError::EmptyLedger`] when the ledger has no entries.
    pub fn rewrite<I>(&mut self, removed: Hosh, remaining: I) -> Result<Rewrite, LedgerError>
    where
        I: IntoIterator<Item = Hosh>,
    {
        let Some(tail) = self.entries.last_mut() else {
            return Err(LedgerError::EmptyLedger { removed });
        };

        if tail.key == removed {
            self.entries.pop();
            trace!(removed = %removed.short(), "ledger: dropped tail entry");
            return Ok(Rewrite::Tail);
        }

        if let Some(members) = tail.members.as_mut() {
            if members.remove(&removed) {
                tail.key = tail.key.decompose(removed);
                if members.len() == 1 {
                    tail.members = None;
                }
                trace!(
                    removed = %removed.short(),
                    tail = %tail.key.short(),
                    "ledger: subtracted from tail"
                );
                return Ok(Rewrite::Subtracted);
            }
        }

        *self = Self::rebuild(remaining);
        trace!(removed = %removed.short(), entries = self.len(), "ledger: rebuilt");
        Ok(Rewrite::Rebuilt)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn u(label: &str) -> Hosh {
        Hosh::unordered_from("field", label.as_bytes())
    }

    fn o(label: &str) -> Hosh {
        Hosh::ordered_from("step", label.as_bytes())
    }

    #[test]
    fn unordered_identities_fold_into_one_entry() {
        let mut ledger = Ledger::new();
        ledger.extend(u("x"));
        ledger.extend(u("y"));
        assert_eq!(ledger.len(), 1);
        let entry = &ledger.entries()[0];
        assert_eq!(entry.key, u("x") * u("y"));
        assert_eq!(entry.members, Some(BTreeSet::from([u("x"), u("y")])));

        ledger.extend(u("z"));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entries()[0].members.as_ref().map(BTreeSet::len), Some(3));
    }

    #[test]
    fn ordered_identities_open_new_entries() {
        let mut ledger = Ledger::new();
        ledger.extend(u("x"));
        ledger.extend(o("f"));
        ledger.extend(u("y"));
        ledger.extend(u("w"));
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.entries()[1].key, o("f"));
        // Unordered identities after an ordered entry start a fresh fold.
        assert_eq!(ledger.entries()[2].key, u("y") * u("w"));
        assert_eq!(ledger.total(), u("x") * o("f") * u("y") * u("w"));
    }

    #[test]
    fn removing_tail_member_subtracts_it() {
        let mut ledger = Ledger::rebuild([u("x"), u("y")]);
        let path = ledger.rewrite(u("x"), [u("y")]).unwrap();
        assert_eq!(path, Rewrite::Subtracted);
        assert_eq!(ledger, Ledger::rebuild([u("y")]));
    }

    #[test]
    fn removing_whole_tail_drops_entry() {
        let mut ledger = Ledger::rebuild([u("x"), o("f")]);
        let path = ledger.rewrite(o("f"), [u("x")]).unwrap();
        assert_eq!(path, Rewrite::Tail);
        assert_eq!(ledger.last(), Some(u("x")));
    }

    #[test]
    fn removing_sole_entry_leaves_empty_ledger() {
        let mut ledger = Ledger::rebuild([u("x")]);
        ledger.rewrite(u("x"), []).unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.total(), Hosh::IDENTITY);
    }

    #[test]
    fn removing_from_frozen_history_rebuilds() {
        let mut ledger = Ledger::rebuild([u("x"), o("f"), u("y")]);
        let path = ledger.rewrite(u("x"), [o("f"), u("y")]).unwrap();
        assert_eq!(path, Rewrite::Rebuilt);
        assert_eq!(ledger, Ledger::rebuild([o("f"), u("y")]));
    }

    #[test]
    fn rewrite_on_empty_ledger_fails() {
        let mut ledger = Ledger::new();
        assert_eq!(
            ledger.rewrite(u("x"), []),
            Err(LedgerError::EmptyLedger { removed: u("x") })
        );
    }
}
