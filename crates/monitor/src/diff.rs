//! Works out which signatures in a newest-first window have not been reported
//! yet for a target.

use walletwatch_domain::model::Cursor;

use crate::rpc::SignatureInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// The ledger returned no signatures; nothing to do and nothing to store.
    Empty,
    /// First observation of the target. Pre-existing history is suppressed
    /// and the cursor is set to the newest signature.
    Seeded(Cursor),
    /// `fresh` is ordered oldest first. The cursor moves to the newest
    /// signature of the window even when `fresh` is empty.
    Advanced {
        fresh: Vec<SignatureInfo>,
        cursor: Cursor,
    },
}

/// Diffs a newest-first `window` against the stored cursor.
///
/// Scanning stops at the stored signature, or at the first entry from an
/// older slot than the cursor. When the cursor is not found inside the window
/// every newer entry counts as fresh: a burst larger than the window between
/// two polls loses its oldest items.
pub fn diff_signatures(window: &[SignatureInfo], stored: Option<&Cursor>) -> DiffOutcome {
    let Some(newest) = window.first() else {
        return DiffOutcome::Empty;
    };
    let cursor = Cursor::new(newest.signature.clone(), newest.slot);

    let Some(stored) = stored else {
        return DiffOutcome::Seeded(cursor);
    };

    let mut fresh: Vec<SignatureInfo> = window
        .iter()
        .take_while(|info| info.signature != stored.signature && info.slot >= stored.slot)
        .cloned()
        .collect();
    fresh.reverse();

    DiffOutcome::Advanced { fresh, cursor }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(entries: &[(&str, u64)]) -> Vec<SignatureInfo> {
        entries
            .iter()
            .map(|(sig, slot)| SignatureInfo::new(*sig, *slot))
            .collect()
    }

    fn signatures(outcome: &DiffOutcome) -> Vec<&str> {
        match outcome {
            DiffOutcome::Advanced { fresh, .. } => {
                fresh.iter().map(|info| info.signature.as_str()).collect()
            }
            other => panic!("expected an advanced diff, got {other:?}"),
        }
    }

    #[test]
    fn empty_window_is_a_noop() {
        assert_eq!(diff_signatures(&[], None), DiffOutcome::Empty);
        assert_eq!(
            diff_signatures(&[], Some(&Cursor::new("S1", 1))),
            DiffOutcome::Empty
        );
    }

    #[test]
    fn first_observation_seeds_without_history() {
        let listing = window(&[("S3", 3), ("S2", 2), ("S1", 1)]);
        assert_eq!(
            diff_signatures(&listing, None),
            DiffOutcome::Seeded(Cursor::new("S3", 3))
        );
    }

    #[test]
    fn yields_unseen_signatures_oldest_first() {
        let listing = window(&[("S5", 5), ("S4", 4), ("S3", 3), ("S2", 2), ("S1", 1)]);
        let outcome = diff_signatures(&listing, Some(&Cursor::new("S2", 2)));

        assert_eq!(signatures(&outcome), vec!["S3", "S4", "S5"]);
        let DiffOutcome::Advanced { cursor, .. } = outcome else {
            unreachable!()
        };
        assert_eq!(cursor, Cursor::new("S5", 5));
    }

    #[test]
    fn unchanged_window_yields_nothing_new() {
        let listing = window(&[("S2", 2), ("S1", 1)]);
        let outcome = diff_signatures(&listing, Some(&Cursor::new("S2", 2)));
        assert_eq!(
            outcome,
            DiffOutcome::Advanced {
                fresh: Vec::new(),
                cursor: Cursor::new("S2", 2),
            }
        );
    }

    #[test]
    fn cursor_outside_window_treats_whole_window_as_new() {
        let listing: Vec<SignatureInfo> = (11..=20)
            .rev()
            .map(|slot| SignatureInfo::new(format!("S{slot}"), slot))
            .collect();
        let outcome = diff_signatures(&listing, Some(&Cursor::new("S0", 0)));

        let fresh = signatures(&outcome);
        assert_eq!(fresh.len(), 10);
        assert_eq!(fresh.first(), Some(&"S11"));
        assert_eq!(fresh.last(), Some(&"S20"));
    }

    #[test]
    fn never_reports_signatures_older_than_the_cursor() {
        // A lagging node answers with a window that predates the cursor.
        let listing = window(&[("S4", 4), ("S3", 3)]);
        let outcome = diff_signatures(&listing, Some(&Cursor::new("S9", 9)));
        assert!(signatures(&outcome).is_empty());
    }

    #[test]
    fn same_slot_siblings_after_the_cursor_are_reported() {
        let listing = window(&[("S7b", 7), ("S7a", 7), ("S6", 6)]);
        let outcome = diff_signatures(&listing, Some(&Cursor::new("S7a", 7)));
        assert_eq!(signatures(&outcome), vec!["S7b"]);
    }
}
