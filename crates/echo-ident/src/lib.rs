// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Composable content identities for Echo lazy containers.
//!
//! `echo-ident` provides two pieces:
//!
//! - [`Hosh`]: a fixed-width content identity with an associative, invertible
//!   composition operator. Every identity carries an [`Etype`]: *unordered*
//!   identities commute with each other, *ordered* identities do not.
//! - [`Ledger`]: an ordered log describing how a container's accumulated
//!   identity was built from its constituent identities. Unordered
//!   constituents fold into a single accumulated entry; ordered constituents
//!   each get their own entry so that sequence is preserved.
//!
//! # Algebra
//!
//! A `Hosh` is an element of the affine group over `Z/2^128`: the pair
//! `(m, t)` acts as `v ↦ m·v + t` with `m` odd. Composition is function
//! composition, so it is associative and every element has an inverse.
//! Unordered identities are pure translations (`m = 1`); translations form an
//! abelian subgroup, which is exactly the "commutative only within the
//! unordered group" property containers rely on.
//!
//! The algebra is about *composition*, not collision resistance: the digests
//! feeding [`Hosh::ordered_from`] and [`Hosh::unordered_from`] come from
//! BLAKE3, but composed identities are linear in their constituents.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod hosh;
mod ledger;

pub use hosh::{Etype, Hosh, HOSH_LEN};
pub use ledger::{Ledger, LedgerEntry, LedgerError, Rewrite};
