// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Immutable lazy containers and their composition operators.
//!
//! A [`FrozenDict`] maps field names to concrete values or deferred
//! computations. Every operator returns a new container; the source is never
//! touched, so containers form a persistent chain. The container identity is
//! the fold of its history ledger, which records one identity per field.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use echo_ident::{Hosh, Ledger, Rewrite};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::config::{Config, Let};
use crate::error::LazyError;
use crate::function::Function;
use crate::lazy::{Group, LazyVal, Outputs, Slot};
use crate::resolve::{resolve, FieldSource, Resolution};
use crate::sampler::Sampler;
use crate::signature::Descriptor;
use crate::value::Value;

/// Reserved output carrying the function's source text.
pub const CODE: &str = "_code";
/// Reserved output carrying the serialized function reference.
pub const FUNCTION: &str = "_function";
/// Reserved output carrying the list of applied steps.
pub const HISTORY: &str = "_history";

/// One change in a [`Patch`].
#[derive(Clone, Debug)]
pub enum Change {
    /// Remove the field; it must exist.
    Delete,
    /// Set the field to a concrete value.
    Set(Value),
    /// Set the field to the single output of a function.
    Compute(Function),
    /// Hold a whole container as the field.
    Nest(FrozenDict),
}

/// Ordered field changes for [`FrozenDict::merge`].
#[derive(Clone, Debug, Default)]
pub struct Patch {
    changes: Vec<(String, Change)>,
}

impl Patch {
    /// Empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`; a null value deletes the field instead.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let change = match value.into() {
            Value::Null => Change::Delete,
            v => Change::Set(v),
        };
        self.changes.push((key.into(), change));
        self
    }

    /// Deletes `key`.
    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.changes.push((key.into(), Change::Delete));
        self
    }

    /// Sets `key` to the lazily computed result of `function`.
    pub fn compute(mut self, key: impl Into<String>, function: Function) -> Self {
        self.changes.push((key.into(), Change::Compute(function)));
        self
    }

    /// Sets `key` to the container `inner`, read back as a map of its fields.
    pub fn nest(mut self, key: impl Into<String>, inner: FrozenDict) -> Self {
        self.changes.push((key.into(), Change::Nest(inner)));
        self
    }

    /// Changes in application order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Change)> {
        self.changes.iter().map(|(k, c)| (k.as_str(), c))
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns `true` for a patch with no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Patch
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), |patch, (k, v)| patch.set(k, v))
    }
}

/// A composition request, one variant per operand category.
#[derive(Clone, Debug)]
pub enum Compose {
    /// Set or delete fields.
    Merge(Patch),
    /// Apply a function with its declared defaults.
    Apply(Function),
    /// Apply a function with explicit overrides.
    Let(Let),
    /// Replace the sampling origin.
    Rebind(Sampler),
    /// Take over every field of another container.
    Absorb(FrozenDict),
}

impl From<Patch> for Compose {
    fn from(patch: Patch) -> Self {
        Self::Merge(patch)
    }
}

impl From<Function> for Compose {
    fn from(function: Function) -> Self {
        Self::Apply(function)
    }
}

impl From<Let> for Compose {
    fn from(wrapped: Let) -> Self {
        Self::Let(wrapped)
    }
}

impl From<Sampler> for Compose {
    fn from(sampler: Sampler) -> Self {
        Self::Rebind(sampler)
    }
}

impl From<FrozenDict> for Compose {
    fn from(other: FrozenDict) -> Self {
        Self::Absorb(other)
    }
}

#[derive(Clone, Debug)]
struct Field {
    slot: Slot,
    id: Hosh,
}

/// Serialized function references, shared along one container chain and
/// keyed by function identity.
#[derive(Clone, Default)]
struct References(Arc<Mutex<FxHashMap<Hosh, Arc<Vec<u8>>>>>);

impl References {
    fn get_or_insert(&self, function: &Function) -> Arc<Vec<u8>> {
        let mut cache = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            cache
                .entry(function.id())
                .or_insert_with(|| Arc::new(function.reference())),
        )
    }
}

/// Immutable mapping from field names to concrete or deferred values.
#[derive(Clone, Default)]
pub struct FrozenDict {
    fields: BTreeMap<String, Field>,
    order: Vec<String>,
    ledger: Ledger,
    sampler: Option<Sampler>,
    references: References,
}

impl FrozenDict {
    /// Empty container with no sampler bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty container sampling from `sampler`.
    pub fn with_sampler(sampler: impl Into<Sampler>) -> Self {
        Self {
            sampler: Some(sampler.into()),
            ..Self::default()
        }
    }

    /// Dispatches a composition request to the matching operator.
    ///
    /// # Errors
    ///
    /// Whatever the selected operator reports.
    pub fn compose(&self, request: impl Into<Compose>) -> Result<Self, LazyError> {
        match request.into() {
            Compose::Merge(patch) => self.merge(&patch),
            Compose::Apply(function) => self.apply(&function),
            Compose::Let(Let { function, config }) => self.apply_with(&function, &config),
            Compose::Rebind(sampler) => Ok(self.rebind(sampler)),
            Compose::Absorb(other) => self.absorb(&other),
        }
    }

    /// Applies `patch` change by change. Computed fields resolve against the
    /// fields as they stand after the preceding changes.
    ///
    /// # Errors
    ///
    /// - [`LazyError::KeyError`] when deleting an absent field.
    /// - Resolution errors of computed fields.
    pub fn merge(&self, patch: &Patch) -> Result<Self, LazyError> {
        let mut next = self.clone();
        for (key, change) in patch.iter() {
            match change {
                Change::Delete => {
                    next.remove_field(key)?;
                }
                Change::Set(value) => {
                    let id = value_id(key, value);
                    next.insert_field(key, Slot::Ready(value.clone()), id)?;
                }
                Change::Compute(function) => {
                    let desc = function.descriptor()?;
                    let res = resolve(&desc, &next, &Config::default(), next.sampler.as_ref())?;
                    let step = provenance(function, &res, &next);
                    let id = Hosh::unordered_from("computed", &keyed(key, &step));
                    let outputs = Outputs::Single(key.to_owned());
                    let group = Group::new(function.clone(), res.deps, outputs);
                    next.insert_field(key, Slot::Pending(LazyVal::new(key, group)), id)?;
                }
                Change::Nest(inner) => {
                    let id = Hosh::unordered_from("nested", &keyed(key, &inner.id().to_bytes()));
                    next.insert_field(key, Slot::Nested(Box::new(inner.clone())), id)?;
                }
            }
        }
        debug!(changes = patch.len(), fields = next.len(), id = %next.id(), "merged");
        Ok(next)
    }

    /// Applies `function` with its declared defaults.
    ///
    /// # Errors
    ///
    /// See [`FrozenDict::apply_with`].
    pub fn apply(&self, function: &Function) -> Result<Self, LazyError> {
        self.apply_with(function, &Config::default())
    }

    /// Applies `function`: resolves its dependencies, adds one pending field
    /// per declared output (all sharing one computation) and fills the
    /// reserved outputs it declares. The overrides' sampler, when set, takes
    /// precedence over the container's.
    ///
    /// # Errors
    ///
    /// - [`LazyError::MissingMetadata`] for incomplete declarations, or a
    ///   `_code` output without source.
    /// - Resolution errors ([`LazyError::UndefinedSeed`],
    ///   [`LazyError::Dependence`], [`LazyError::InconsistentRange`]).
    pub fn apply_with(&self, function: &Function, config: &Config) -> Result<Self, LazyError> {
        let desc = function.descriptor()?;
        let sampler = config.sampler().or(self.sampler.as_ref());
        let res = resolve(&desc, self, config, sampler)?;
        let step = provenance(function, &res, self);

        let (reserved, explicit): (Vec<&String>, Vec<&String>) =
            desc.outputs.iter().partition(|o| is_reserved(o));

        let mut next = self.clone();
        if !explicit.is_empty() {
            let names: Vec<String> = explicit.iter().map(|o| (*o).clone()).collect();
            let group = Group::new(function.clone(), res.deps, Outputs::Many(names));
            for out in &explicit {
                let lazy = LazyVal::new(out.as_str(), Arc::clone(&group));
                next.insert_field(out, Slot::Pending(lazy), output_id(&step, out))?;
            }
        }
        for out in reserved {
            let value = self.reserved_output(out, function, &desc)?;
            next.insert_field(out, Slot::Ready(value), output_id(&step, out))?;
        }
        debug!(
            function = function.name(),
            outputs = ?desc.outputs,
            id = %next.id(),
            "applied"
        );
        Ok(next)
    }

    /// Same fields, new sampling origin. Values already pending keep the
    /// parameters they were resolved with.
    pub fn rebind(&self, sampler: impl Into<Sampler>) -> Self {
        let sampler = sampler.into();
        debug!(sampler = ?sampler, "rebound");
        Self {
            sampler: Some(sampler),
            ..self.clone()
        }
    }

    /// Takes over every field of `other` in its encounter order, slots and
    /// identities included; shared keys follow the overwrite rule. `other`'s
    /// sampler replaces this one when it has one.
    ///
    /// # Errors
    ///
    /// Ledger failures while replacing shared keys.
    pub fn absorb(&self, other: &Self) -> Result<Self, LazyError> {
        let mut next = self.clone();
        for key in &other.order {
            if let Some(field) = other.fields.get(key) {
                next.insert_field(key, field.slot.clone(), field.id)?;
            }
        }
        if other.sampler.is_some() {
            next.sampler.clone_from(&other.sampler);
        }
        debug!(absorbed = other.len(), fields = next.len(), id = %next.id(), "absorbed");
        Ok(next)
    }

    /// Reads field `key`, realizing it when pending.
    ///
    /// # Errors
    ///
    /// [`LazyError::KeyError`] for an absent field; realization errors.
    pub fn get(&self, key: &str) -> Result<Value, LazyError> {
        self.fields
            .get(key)
            .ok_or_else(|| LazyError::KeyError(key.to_owned()))?
            .slot
            .realize()
    }

    /// Reads a field addressed by an arbitrary value.
    ///
    /// # Errors
    ///
    /// [`LazyError::WrongKeyType`] for non-string keys, then as
    /// [`FrozenDict::get`].
    pub fn get_key(&self, key: &Value) -> Result<Value, LazyError> {
        match key {
            Value::Str(name) => self.get(name),
            other => Err(LazyError::WrongKeyType { found: other.kind() }),
        }
    }

    /// Realizes every field.
    ///
    /// # Errors
    ///
    /// The first realization failure, in encounter order.
    pub fn evaluate(&self) -> Result<(), LazyError> {
        for key in &self.order {
            self.get(key)?;
        }
        Ok(())
    }

    /// Every field, realized.
    ///
    /// # Errors
    ///
    /// The first realization failure, in encounter order.
    pub fn to_map(&self) -> Result<BTreeMap<String, Value>, LazyError> {
        self.order
            .iter()
            .map(|k| Ok((k.clone(), self.get(k)?)))
            .collect()
    }

    /// Field names in encounter order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Returns `true` if field `key` exists.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` for a container without fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns `true` while field `key` exists and has not been computed.
    pub fn is_pending(&self, key: &str) -> bool {
        self.fields.get(key).is_some_and(|f| f.slot.is_pending())
    }

    /// Container held by field `key`, when that field is nested.
    pub fn nested(&self, key: &str) -> Option<&FrozenDict> {
        match self.slot(key) {
            Some(Slot::Nested(inner)) => Some(inner),
            _ => None,
        }
    }

    /// Stored slot of field `key`, without realizing it.
    pub fn slot(&self, key: &str) -> Option<&Slot> {
        self.fields.get(key).map(|f| &f.slot)
    }

    /// Recorded identity of field `key`.
    pub fn field_id(&self, key: &str) -> Option<Hosh> {
        self.fields.get(key).map(|f| f.id)
    }

    /// Container identity: the fold of the history ledger.
    pub fn id(&self) -> Hosh {
        self.ledger.total()
    }

    /// History ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Bound sampling origin.
    pub fn sampler(&self) -> Option<&Sampler> {
        self.sampler.as_ref()
    }

    fn insert_field(&mut self, key: &str, slot: Slot, id: Hosh) -> Result<(), LazyError> {
        if self.fields.contains_key(key) {
            self.remove_field(key)?;
        }
        self.fields.insert(key.to_owned(), Field { slot, id });
        self.order.push(key.to_owned());
        self.ledger.extend(id);
        trace!(key, id = %id, "field recorded");
        Ok(())
    }

    fn remove_field(&mut self, key: &str) -> Result<(), LazyError> {
        let field = self
            .fields
            .remove(key)
            .ok_or_else(|| LazyError::KeyError(key.to_owned()))?;
        self.order.retain(|k| k != key);
        let remaining = self.order.iter().filter_map(|k| self.fields.get(k).map(|f| f.id));
        let path: Rewrite = self.ledger.rewrite(field.id, remaining)?;
        trace!(key, id = %field.id, path = ?path, "field removed");
        Ok(())
    }

    fn reserved_output(
        &self,
        name: &str,
        function: &Function,
        desc: &Descriptor,
    ) -> Result<Value, LazyError> {
        match name {
            CODE => desc
                .code
                .clone()
                .map(Value::Str)
                .ok_or_else(|| LazyError::MissingMetadata {
                    function: function.name().to_owned(),
                    key: "code",
                }),
            FUNCTION => Ok(Value::Bytes(self.references.get_or_insert(function).to_vec())),
            _ => Ok(self.next_history(desc)),
        }
    }

    fn next_history(&self, desc: &Descriptor) -> Value {
        let mut steps = match self.fields.get(HISTORY).map(|f| &f.slot) {
            Some(Slot::Ready(Value::List(steps))) => steps.clone(),
            _ => Vec::new(),
        };
        let id = desc.step_id.unwrap_or_else(|| {
            steps
                .last()
                .and_then(Value::as_map)
                .and_then(|step| step.get("id"))
                .and_then(Value::as_int)
                .map_or(0, |last| last + 1)
        });
        let mut step = desc.step.clone();
        step.insert("id".to_owned(), Value::Int(id));
        steps.push(Value::Map(step));
        Value::List(steps)
    }
}

impl FieldSource for FrozenDict {
    fn slot(&self, name: &str) -> Option<&Slot> {
        Self::slot(self, name)
    }

    fn field_names(&self) -> Vec<String> {
        self.order.clone()
    }
}

impl fmt::Display for FrozenDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, key) in self.order.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key:?}: ")?;
            match self.fields.get(key).map(|field| &field.slot) {
                Some(Slot::Ready(v)) => write!(f, "{v}")?,
                Some(Slot::Pending(lazy)) => match lazy.is_realized().then(|| lazy.realize()) {
                    Some(Ok(v)) => write!(f, "{v}")?,
                    _ => write!(f, "{lazy}")?,
                },
                Some(Slot::Nested(inner)) => write!(f, "{inner}")?,
                None => {}
            }
        }
        f.write_str("}")
    }
}

impl fmt::Debug for FrozenDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrozenDict")
            .field("id", &self.id())
            .field("fields", &format_args!("{self}"))
            .field("sampler", &self.sampler)
            .finish()
    }
}

fn is_reserved(name: &str) -> bool {
    matches!(name, CODE | FUNCTION | HISTORY)
}

fn keyed(key: &str, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + key.len() + bytes.len());
    out.extend_from_slice(&(key.len() as u64).to_le_bytes());
    out.extend_from_slice(key.as_bytes());
    out.extend_from_slice(bytes);
    out
}

fn value_id(key: &str, value: &Value) -> Hosh {
    Hosh::unordered_from("field", &keyed(key, &value.to_canonical_bytes()))
}

fn output_id(step: &[u8], name: &str) -> Hosh {
    Hosh::ordered_from("output", &keyed(name, step))
}

/// Bytes naming one application: function identity, input field identities
/// and parameter values.
fn provenance(function: &Function, res: &Resolution, fields: &FrozenDict) -> Vec<u8> {
    let mut bytes = function.id().to_bytes().to_vec();
    for name in &res.inputs {
        let id = fields.field_id(name).unwrap_or(Hosh::IDENTITY);
        bytes.extend(keyed(name, &id.to_bytes()));
    }
    bytes.extend(Value::Map(res.params.clone()).to_canonical_bytes());
    bytes
}
