// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Mutable handle over a persistent container chain.

use crate::config::Config;
use crate::error::LazyError;
use crate::frozen::{FrozenDict, Patch};
use crate::function::Function;
use crate::sampler::Sampler;
use crate::value::Value;

/// Cursor over a chain of [`FrozenDict`]s.
///
/// Each mutation composes the held container and replaces it, so snapshots
/// taken earlier stay valid. Once sealed, every mutation fails with
/// [`LazyError::ReadOnly`].
#[derive(Clone, Debug, Default)]
pub struct Ldict {
    current: FrozenDict,
    sealed: bool,
}

impl Ldict {
    /// Empty handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets field `key`.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Result<(), LazyError> {
        self.update(key, |d| d.merge(&Patch::new().set(key, value)))
    }

    /// Removes field `key`.
    pub fn remove(&mut self, key: &str) -> Result<(), LazyError> {
        self.update(key, |d| d.merge(&Patch::new().delete(key)))
    }

    /// Applies `function` with its declared defaults.
    pub fn apply(&mut self, function: &Function) -> Result<(), LazyError> {
        self.update(function.name(), |d| d.apply(function))
    }

    /// Applies `function` with explicit overrides.
    pub fn apply_with(&mut self, function: &Function, config: &Config) -> Result<(), LazyError> {
        self.update(function.name(), |d| d.apply_with(function, config))
    }

    /// Replaces the sampling origin.
    pub fn rebind(&mut self, sampler: impl Into<Sampler>) -> Result<(), LazyError> {
        self.update("<sampler>", |d| Ok(d.rebind(sampler)))
    }

    /// Reads field `key`.
    pub fn get(&self, key: &str) -> Result<Value, LazyError> {
        self.current.get(key)
    }

    /// The container currently held.
    pub fn snapshot(&self) -> FrozenDict {
        self.current.clone()
    }

    /// Forbids further mutation.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Returns `true` once sealed.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn update<F>(&mut self, target: &str, op: F) -> Result<(), LazyError>
    where
        F: FnOnce(&FrozenDict) -> Result<FrozenDict, LazyError>,
    {
        if self.sealed {
            return Err(LazyError::ReadOnly {
                key: target.to_owned(),
            });
        }
        self.current = op(&self.current)?;
        Ok(())
    }
}

impl From<FrozenDict> for Ldict {
    fn from(current: FrozenDict) -> Self {
        Self {
            current,
            sealed: false,
        }
    }
}
