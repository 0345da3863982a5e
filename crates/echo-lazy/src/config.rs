// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parameter override surface.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::LazyError;
use crate::function::Function;
use crate::sampler::Sampler;
use crate::signature::Param;

/// Key carrying the sampler seed in JSON overrides.
pub const SEED_KEY: &str = "rnd";

/// Explicit parameter values and an optional sampling origin, consumed by
/// dependency resolution in place of declared defaults.
#[derive(Clone, Debug, Default)]
pub struct Config {
    params: BTreeMap<String, Param>,
    sampler: Option<Sampler>,
}

impl Config {
    /// Empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides parameter `name`. A [`Param::Range`] is sampled like a
    /// range default would be.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Param>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Samples with a fresh generator seeded from `seed`.
    pub fn seed(self, seed: u64) -> Self {
        self.with_sampler(Sampler::Seed(seed))
    }

    /// Samples from `sampler` instead of the container's.
    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Override for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.get(name)
    }

    /// Sampling origin carried by these overrides.
    pub fn sampler(&self) -> Option<&Sampler> {
        self.sampler.as_ref()
    }

    /// Returns `true` when nothing is overridden.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.sampler.is_none()
    }

    /// Pairs these overrides with `function` for application.
    pub fn bind(self, function: Function) -> Let {
        Let {
            function,
            config: self,
        }
    }

    /// Decodes overrides from a JSON object. Arrays are range literals
    /// (`[1, 2, 4, "...", 16]`); the `rnd` key, when present, is an integer
    /// seed.
    ///
    /// # Errors
    ///
    /// [`LazyError::Config`] for malformed JSON, a non-object document or a
    /// non-integer seed.
    pub fn from_json(json: &str) -> Result<Self, LazyError> {
        let doc: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Object(entries) = doc else {
            return Err(LazyError::Config("overrides must be a JSON object".into()));
        };
        let mut config = Self::new();
        for (name, value) in entries {
            if name == SEED_KEY {
                let seed = value.as_u64().ok_or_else(|| {
                    LazyError::Config(format!("'{SEED_KEY}' must be a non-negative integer"))
                })?;
                config = config.seed(seed);
            } else {
                config.params.insert(name, Param::from_json(value)?);
            }
        }
        Ok(config)
    }

    /// Reads [`Config::from_json`] overrides from a file.
    ///
    /// # Errors
    ///
    /// [`LazyError::Config`] when the file cannot be read or decoded.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LazyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LazyError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }
}

/// A function paired with explicit overrides (the parameterized wrapper).
#[derive(Clone, Debug)]
pub struct Let {
    /// Function to apply.
    pub function: Function,
    /// Overrides used while resolving it.
    pub config: Config,
}
