// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Algebraic laws of identity composition and the history ledger.

#![allow(missing_docs)]
use echo_ident::{Hosh, Ledger, Rewrite};
use proptest::prelude::*;

fn hosh_of(ordered: bool, seed: u64) -> Hosh {
    let bytes = seed.to_le_bytes();
    if ordered {
        Hosh::ordered_from("prop", &bytes)
    } else {
        Hosh::unordered_from("prop", &bytes)
    }
}

/// Distinct identities (the seed index is folded in so no two collide).
fn arb_hoshes(max: usize) -> impl Strategy<Value = Vec<Hosh>> {
    prop::collection::vec((any::<bool>(), any::<u32>()), 1..max).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (ordered, seed))| hosh_of(ordered, (u64::from(seed) << 16) | i as u64))
            .collect()
    })
}

proptest! {
    #[test]
    fn unordered_folding_commutes(a in any::<u64>(), b in any::<u64>()) {
        let (ha, hb) = (hosh_of(false, a), hosh_of(false, b));
        let ab = Ledger::rebuild([ha, hb]);
        let ba = Ledger::rebuild([hb, ha]);
        prop_assert_eq!(ab.total(), ba.total());
        prop_assert_eq!(ab.last(), ba.last());
    }

    #[test]
    fn composition_is_associative(
        a in any::<u64>(),
        b in any::<u64>(),
        c in any::<u64>(),
        oa in any::<bool>(),
        ob in any::<bool>(),
        oc in any::<bool>(),
    ) {
        let (x, y, z) = (hosh_of(oa, a), hosh_of(ob, b), hosh_of(oc, c));
        prop_assert_eq!((x * y) * z, x * (y * z));
        prop_assert_eq!(((x * y) / y), x);
    }

    #[test]
    fn tail_removal_undoes_tail_append(
        prefix in arb_hoshes(12),
        ordered in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let before = Ledger::rebuild(prefix.iter().copied());
        let h = hosh_of(ordered, seed);
        prop_assume!(!prefix.contains(&h));

        let mut after = before.clone();
        after.extend(h);
        let path = after.rewrite(h, prefix.iter().copied());
        prop_assert!(matches!(path, Ok(Rewrite::Tail | Rewrite::Subtracted)));
        prop_assert_eq!(after, before);
    }

    #[test]
    fn rebuild_after_middle_removal_matches_direct_fold(
        hoshes in arb_hoshes(12),
        pick in any::<prop::sample::Index>(),
    ) {
        let victim = pick.index(hoshes.len());
        let removed = hoshes[victim];
        let remaining: Vec<Hosh> = hoshes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != victim)
            .map(|(_, h)| *h)
            .collect();

        let mut ledger = Ledger::rebuild(hoshes.iter().copied());
        let result = ledger.rewrite(removed, remaining.iter().copied());
        prop_assert!(result.is_ok());

        let direct = Ledger::rebuild(remaining.iter().copied());
        prop_assert_eq!(ledger.total(), direct.total());
        if result == Ok(Rewrite::Rebuilt) {
            prop_assert_eq!(ledger, direct);
        }
    }

    #[test]
    fn total_matches_sequential_composition(hoshes in arb_hoshes(16)) {
        let ledger = Ledger::rebuild(hoshes.iter().copied());
        let expected = hoshes.iter().fold(Hosh::IDENTITY, |acc, h| acc * *h);
        prop_assert_eq!(ledger.total(), expected);
    }
}
