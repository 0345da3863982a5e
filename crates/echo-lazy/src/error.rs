// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for lazy containers.
//!
//! Every failure is local to the operation that raised it: containers are
//! immutable, so a failed `merge`/`apply`/read leaves its source untouched.

use echo_ident::LedgerError;
use thiserror::Error;

/// Error raised by a user-supplied function body during realization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FunctionError(pub String);

impl FunctionError {
    /// Builds an error from any displayable message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Errors produced by container composition, resolution and reads.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LazyError {
    /// A field was addressed with a non-string key.
    #[error("[WRONG_KEY_TYPE] key must be a string, not {found}")]
    WrongKeyType {
        /// Kind of the offending key.
        found: &'static str,
    },

    /// Read or deletion of an absent field.
    #[error("[KEY_ERROR] no field '{0}'")]
    KeyError(String),

    /// Attempted in-place mutation of a sealed container handle.
    #[error("[READ_ONLY] cannot change sealed container (field '{key}')")]
    ReadOnly {
        /// Field the mutation targeted.
        key: String,
    },

    /// A range-valued parameter needed sampling but no sampler was bound.
    #[error("[UNDEFINED_SEED] no sampler bound before sampling parameter '{param}'")]
    UndefinedSeed {
        /// Parameter that required sampling.
        param: String,
    },

    /// Missing or null input field, or null parameter value.
    #[error("[DEPENDENCE] {reason}; available: {available:?}")]
    Dependence {
        /// What went wrong.
        reason: String,
        /// Names that were available at resolution time.
        available: Vec<String>,
    },

    /// A range literal is neither an arithmetic nor a geometric progression.
    #[error("[INCONSISTENT_RANGE] {0}")]
    InconsistentRange(String),

    /// Ledger edit failed (upstream invariant violation).
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A declared function lacks a required metadata key.
    #[error("[MISSING_METADATA] function '{function}' has no '{key}' metadata")]
    MissingMetadata {
        /// Function name.
        function: String,
        /// Missing key.
        key: &'static str,
    },

    /// A function signature text could not be parsed.
    #[error("[SIGNATURE] {0}")]
    Signature(String),

    /// A function body failed, or returned something other than its declared
    /// outputs.
    #[error("[FUNCTION] '{function}': {source}")]
    Function {
        /// Function name.
        function: String,
        /// Underlying failure.
        source: FunctionError,
    },

    /// Override or metadata JSON could not be decoded.
    #[error("[CONFIG] {0}")]
    Config(String),
}

impl LazyError {
    pub(crate) fn dependence<I, S>(reason: impl Into<String>, available: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Dependence {
            reason: reason.into(),
            available: available.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<serde_json::Error> for LazyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
