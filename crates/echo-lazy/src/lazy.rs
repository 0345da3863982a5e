// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deferred field values.
//!
//! All outputs of one function application share a single [`Group`]: the
//! first realization of any sibling runs the body once and caches every
//! output. Realization is serialized per group, so concurrent readers never
//! run a body twice.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::{FunctionError, LazyError};
use crate::frozen::FrozenDict;
use crate::function::{Args, Function};
use crate::value::Value;

/// Stored state of a field.
#[derive(Clone, Debug)]
pub enum Slot {
    /// Concrete value.
    Ready(Value),
    /// Deferred computation.
    Pending(LazyVal),
    /// Container held as a field; realizes to a map of its fields.
    Nested(Box<FrozenDict>),
}

impl Slot {
    /// Concrete value, realizing when pending.
    ///
    /// # Errors
    ///
    /// Any failure of the deferred computation or its dependencies.
    pub fn realize(&self) -> Result<Value, LazyError> {
        match self {
            Self::Ready(v) => Ok(v.clone()),
            Self::Pending(lazy) => lazy.realize(),
            Self::Nested(inner) => inner.to_map().map(Value::Map),
        }
    }

    /// Returns `true` while the value, or any field of a nested container,
    /// has not been computed.
    pub fn is_pending(&self) -> bool {
        match self {
            Self::Ready(_) => false,
            Self::Pending(lazy) => !lazy.is_realized(),
            Self::Nested(inner) => inner.keys().any(|k| inner.is_pending(k)),
        }
    }
}

/// How a group's body result maps onto its fields.
#[derive(Clone, Debug)]
pub(crate) enum Outputs {
    /// The body result is the value of this field.
    Single(String),
    /// The body returns a map holding every listed output. With exactly one
    /// listed output the body may also return that output's value directly.
    Many(Vec<String>),
}

type Realized = Arc<BTreeMap<String, Value>>;

/// One function application: the body, its resolved dependencies, and the
/// cached result shared by every output.
pub(crate) struct Group {
    function: Function,
    deps: BTreeMap<String, Slot>,
    outputs: Outputs,
    cache: Mutex<Option<Realized>>,
}

impl Group {
    pub(crate) fn new(
        function: Function,
        deps: BTreeMap<String, Slot>,
        outputs: Outputs,
    ) -> Arc<Self> {
        Arc::new(Self {
            function,
            deps,
            outputs,
            cache: Mutex::new(None),
        })
    }

    fn is_realized(&self) -> bool {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn realize(&self) -> Result<Realized, LazyError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(done) = cache.as_ref() {
            return Ok(Arc::clone(done));
        }

        let mut args = BTreeMap::new();
        for (name, slot) in &self.deps {
            let value = slot.realize()?;
            if value.is_null() {
                return Err(LazyError::dependence(
                    format!("dependency '{name}' of '{}' realized to null", self.function.name()),
                    self.deps.keys().cloned(),
                ));
            }
            args.insert(name.clone(), value);
        }

        debug!(function = self.function.name(), "realizing");
        let out = self.function.call(&Args::new(args))?;
        let values = match &self.outputs {
            Outputs::Single(field) => BTreeMap::from([(field.clone(), out)]),
            Outputs::Many(names) => self.split(out, names)?,
        };
        let values = Arc::new(values);
        *cache = Some(Arc::clone(&values));
        Ok(values)
    }

    fn split(&self, out: Value, names: &[String]) -> Result<BTreeMap<String, Value>, LazyError> {
        if let [only] = names {
            if !matches!(&out, Value::Map(map) if map.contains_key(only)) {
                return Ok(BTreeMap::from([(only.clone(), out)]));
            }
        }
        let fail = |msg: String| LazyError::Function {
            function: self.function.name().to_owned(),
            source: FunctionError::new(msg),
        };
        let mut map = match out {
            Value::Map(map) => map,
            other => return Err(fail(format!("expected a map of outputs, got {}", other.kind()))),
        };
        let mut values = BTreeMap::new();
        for name in names {
            let value = map
                .remove(name)
                .ok_or_else(|| fail(format!("result has no output '{name}'")))?;
            values.insert(name.clone(), value);
        }
        Ok(values)
    }
}

/// A field whose value is computed on first read.
#[derive(Clone)]
pub struct LazyVal {
    field: String,
    group: Arc<Group>,
}

impl LazyVal {
    pub(crate) fn new(field: impl Into<String>, group: Arc<Group>) -> Self {
        Self {
            field: field.into(),
            group,
        }
    }

    /// Output this value stands for.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Function that computes it.
    pub fn function(&self) -> &Function {
        &self.group.function
    }

    /// Names the computation depends on (inputs and parameters).
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.group.deps.keys().map(String::as_str)
    }

    /// Returns `true` once the shared computation has run.
    pub fn is_realized(&self) -> bool {
        self.group.is_realized()
    }

    /// Returns `true` when both values come from the same application.
    pub fn shares_group_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.group, &other.group)
    }

    /// Computes (once per application) and returns the value.
    ///
    /// # Errors
    ///
    /// Dependency failures, body failures, or a multi-output result missing
    /// a declared output.
    pub fn realize(&self) -> Result<Value, LazyError> {
        let values = self.group.realize()?;
        values.get(&self.field).cloned().ok_or_else(|| LazyError::Function {
            function: self.group.function.name().to_owned(),
            source: FunctionError::new(format!("result has no output '{}'", self.field)),
        })
    }
}

impl fmt::Display for LazyVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("→(")?;
        for (i, dep) in self.dependencies().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(dep)?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for LazyVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyVal")
            .field("field", &self.field)
            .field("function", &self.group.function.name())
            .field("realized", &self.is_realized())
            .finish()
    }
}
