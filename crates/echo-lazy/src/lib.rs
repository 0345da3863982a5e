// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lazy, immutable, content-identified containers.
//!
//! A [`FrozenDict`] holds named fields whose values are either concrete or
//! deferred. Composition never mutates: merging a [`Patch`], applying a
//! [`Function`] or rebinding the [`Sampler`] each return a new container.
//! Applying a function resolves its inputs and parameters up front (sampling
//! range-valued parameters from the bound sampler) and stores one pending
//! field per declared output; the function runs once, on the first read of
//! any of them.
//!
//! Every field carries an identity ([`echo_ident::Hosh`]) and the container's
//! identity is the fold of its history [`echo_ident::Ledger`], so equal
//! computations over equal inputs produce equal identities.
//!
//! ```
//! use echo_lazy::{Config, FrozenDict, Function, Patch, Value};
//!
//! # fn main() -> Result<(), echo_lazy::LazyError> {
//! let f = Function::introspect("fn f(x, y, a=1, b=1) -> z", |args| {
//!     Ok(Value::Int(args.int("a")? * args.int("x")? + args.int("b")? * args.int("y")?))
//! })?;
//! let d = FrozenDict::new()
//!     .merge(&Patch::new().set("x", 5).set("y", 7))?
//!     .apply_with(&f, &Config::new().set("a", 5).set("b", 10))?;
//! assert!(d.is_pending("z"));
//! assert_eq!(d.get("z")?, Value::Int(95));
//! # Ok(())
//! # }
//! ```
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
    clippy::use_self,
    clippy::missing_errors_doc
)]

mod config;
mod error;
mod frozen;
mod function;
mod lazy;
mod ldict;
mod range;
mod resolve;
mod sampler;
mod signature;
mod value;

pub use config::{Config, Let, SEED_KEY};
pub use error::{FunctionError, LazyError};
pub use frozen::{Change, Compose, FrozenDict, Patch, CODE, FUNCTION, HISTORY};
pub use function::{Args, Body, Function};
pub use lazy::{LazyVal, Slot};
pub use ldict::Ldict;
pub use range::{Number, RangeItem, RangeLiteral, MAX_TERMS};
pub use resolve::{resolve, FieldSource, Resolution};
pub use sampler::{Prng, Sampler};
pub use signature::{Describe, Descriptor, InputMeta, Introspected, Metadata, Param, ParamSpec};
pub use value::Value;
