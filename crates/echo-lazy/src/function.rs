// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Registered functions: a descriptor capability plus a body.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use echo_ident::Hosh;

use crate::error::{FunctionError, LazyError};
use crate::signature::{Describe, Descriptor, Introspected, Metadata};
use crate::value::Value;

/// Function body. Multi-output functions return a [`Value::Map`] keyed by
/// output name. A function with one output may return its value directly,
/// or a map holding that output.
pub type Body = Arc<dyn Fn(&Args) -> Result<Value, FunctionError> + Send + Sync>;

/// Realized arguments handed to a function body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args {
    values: BTreeMap<String, Value>,
}

impl Args {
    /// Wraps realized argument values.
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    /// Argument by name.
    pub fn get(&self, name: &str) -> Result<&Value, FunctionError> {
        self.values
            .get(name)
            .ok_or_else(|| FunctionError::new(format!("no argument '{name}'")))
    }

    /// Integer argument.
    pub fn int(&self, name: &str) -> Result<i64, FunctionError> {
        let v = self.get(name)?;
        v.as_int()
            .ok_or_else(|| FunctionError::new(format!("'{name}' is {}, not int", v.kind())))
    }

    /// Numeric argument; integers widen.
    pub fn float(&self, name: &str) -> Result<f64, FunctionError> {
        let v = self.get(name)?;
        v.as_float()
            .ok_or_else(|| FunctionError::new(format!("'{name}' is {}, not a number", v.kind())))
    }

    /// String argument.
    pub fn str(&self, name: &str) -> Result<&str, FunctionError> {
        let v = self.get(name)?;
        v.as_str()
            .ok_or_else(|| FunctionError::new(format!("'{name}' is {}, not str", v.kind())))
    }

    /// All arguments, by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A function that can be attached to a container.
///
/// Cloning is cheap; clones share the descriptor capability and body. The
/// function identity is fixed at registration from the definition's
/// fingerprint, so no state is ever attached to a shared function value.
#[derive(Clone)]
pub struct Function {
    describe: Arc<dyn Describe>,
    body: Body,
    id: Hosh,
}

impl Function {
    /// Registers `body` under an arbitrary descriptor capability.
    pub fn new<D, F>(describe: D, body: F) -> Self
    where
        D: Describe + 'static,
        F: Fn(&Args) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        let id = Hosh::ordered_from("function", &describe.fingerprint());
        Self {
            describe: Arc::new(describe),
            body: Arc::new(body),
            id,
        }
    }

    /// Registers `body` with a descriptor parsed from `signature`.
    ///
    /// # Errors
    ///
    /// [`LazyError::Signature`] when the signature cannot be parsed.
    pub fn introspect<F>(signature: &str, body: F) -> Result<Self, LazyError>
    where
        F: Fn(&Args) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        Ok(Self::new(Introspected::parse(signature)?, body))
    }

    /// Registers `body` with explicitly declared metadata.
    pub fn declared<F>(metadata: Metadata, body: F) -> Self
    where
        F: Fn(&Args) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        Self::new(metadata, body)
    }

    /// Function name.
    pub fn name(&self) -> &str {
        self.describe.name()
    }

    /// Ordered identity of the definition.
    pub fn id(&self) -> Hosh {
        self.id
    }

    /// Resolves the descriptor through the registered capability.
    ///
    /// # Errors
    ///
    /// [`LazyError::MissingMetadata`] for incomplete declarations.
    pub fn descriptor(&self) -> Result<Descriptor, LazyError> {
        self.describe.describe()
    }

    /// Serialized self-reference: canonical CBOR of the name, identity and
    /// definition fingerprint.
    pub fn reference(&self) -> Vec<u8> {
        Value::map([
            ("name", Value::from(self.name())),
            ("id", Value::from(self.id.id())),
            ("definition", Value::Bytes(self.describe.fingerprint())),
        ])
        .to_canonical_bytes()
    }

    pub(crate) fn call(&self, args: &Args) -> Result<Value, LazyError> {
        (self.body)(args).map_err(|source| LazyError::Function {
            function: self.name().to_owned(),
            source,
        })
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
