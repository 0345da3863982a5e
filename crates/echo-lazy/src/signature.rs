// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Function descriptors: what a function reads, samples and produces.
//!
//! A descriptor is obtained through the [`Describe`] capability, which has
//! two implementations chosen once when a function is registered:
//!
//! - [`Introspected`]: the inputs, parameters and outputs are read off a
//!   signature text such as `fn f(x, y, a=[1, 2, 3, ..., 9]) -> z`.
//!   Positional names are input fields, names with a default are
//!   parameters, and a list default is a range to sample from.
//! - [`Metadata`]: explicitly declared metadata (static and dynamic inputs,
//!   outputs, parameters, code, step id). Missing `input`/`output` keys are
//!   reported when the function is resolved, not when it is registered.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::LazyError;
use crate::range::{parse_item, RangeItem, RangeLiteral};
use crate::value::Value;

/// A parameter value: a concrete value or a range to sample from.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    /// Concrete value (a null value fails resolution).
    Value(Value),
    /// Range literal; one element is drawn per resolution.
    Range(RangeLiteral),
}

impl Param {
    /// Converts JSON into a parameter: arrays are range literals (with
    /// `"..."` as the continuation marker), everything else a value.
    pub fn from_json(json: serde_json::Value) -> Result<Self, LazyError> {
        match json {
            serde_json::Value::Array(items) => {
                let items = items
                    .into_iter()
                    .map(|item| match item {
                        serde_json::Value::Number(n) => parse_item(&n.to_string()),
                        serde_json::Value::String(s) => parse_item(s.trim()),
                        other => Err(LazyError::Config(format!(
                            "range items must be numbers or \"...\", not {other}"
                        ))),
                    })
                    .collect::<Result<Vec<RangeItem>, _>>()?;
                Ok(Self::Range(RangeLiteral::new(items)))
            }
            other => Value::from_json(other).map(Self::Value),
        }
    }

    /// Value used when fingerprinting a descriptor.
    fn fingerprint(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Range(r) => Value::Str(r.to_string()),
        }
    }
}

impl From<Value> for Param {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<i64> for Param {
    fn from(i: i64) -> Self {
        Self::Value(Value::Int(i))
    }
}

impl From<i32> for Param {
    fn from(i: i32) -> Self {
        Self::Value(Value::from(i))
    }
}

impl From<f64> for Param {
    fn from(x: f64) -> Self {
        Self::Value(Value::Float(x))
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Self::Value(Value::from(s))
    }
}

impl From<RangeLiteral> for Param {
    fn from(r: RangeLiteral) -> Self {
        Self::Range(r)
    }
}

/// A declared parameter with its default.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Default used when no override is configured.
    pub default: Param,
}

/// Everything resolution needs to know about a function.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Descriptor {
    /// Function name.
    pub name: String,
    /// Input fields read from the container.
    pub inputs: Vec<String>,
    /// Parameters whose configured value names an additional input field.
    pub dynamic_inputs: Vec<String>,
    /// Parameters, in declaration order (this is also the draw order).
    pub params: Vec<ParamSpec>,
    /// Output fields, reserved metadata outputs included.
    pub outputs: Vec<String>,
    /// Source/body text, if any.
    pub code: Option<String>,
    /// Explicit history step id.
    pub step_id: Option<i64>,
    /// Extra step metadata recorded in `_history`.
    pub step: BTreeMap<String, Value>,
}

/// Capability that produces a function's [`Descriptor`].
pub trait Describe: Send + Sync {
    /// Function name.
    fn name(&self) -> &str;

    /// Stable bytes identifying the function definition.
    fn fingerprint(&self) -> Vec<u8>;

    /// Builds the descriptor.
    ///
    /// # Errors
    ///
    /// [`LazyError::MissingMetadata`] when required declarations are absent.
    fn describe(&self) -> Result<Descriptor, LazyError>;
}

/// Descriptor derived by parsing a signature text.
#[derive(Clone, Debug, PartialEq)]
pub struct Introspected {
    source: String,
    descriptor: Descriptor,
}

impl Introspected {
    /// Parses `source`. Only the header is inspected; the full text becomes
    /// the function's code.
    ///
    /// Accepted header shape: `fn name(x, y: T, a = 5, b = [1, 2, 4, ..., 16]) -> (z, w)`.
    pub fn parse(source: &str) -> Result<Self, LazyError> {
        let text = source.trim_start();
        let text = text
            .strip_prefix("fn")
            .filter(|rest| rest.starts_with(char::is_whitespace))
            .unwrap_or(text)
            .trim_start();
        let open = text
            .find('(')
            .ok_or_else(|| sig_err(source, "missing '('"))?;
        let name = text[..open].trim();
        if !name.is_empty() && !is_ident(name) {
            return Err(sig_err(source, "invalid function name"));
        }
        let close = matching_paren(text, open).ok_or_else(|| sig_err(source, "unbalanced '('"))?;

        let mut inputs = Vec::new();
        let mut params = Vec::new();
        for raw in split_top_level(&text[open + 1..close]) {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let (lhs, default) = match raw.split_once('=') {
                Some((lhs, rhs)) => (lhs, Some(rhs.trim())),
                None => (raw, None),
            };
            let name = lhs.split(':').next().unwrap_or(lhs).trim();
            if !is_ident(name) {
                return Err(sig_err(source, &format!("invalid parameter '{name}'")));
            }
            match default {
                None => inputs.push(name.to_owned()),
                Some(text) => params.push(ParamSpec {
                    name: name.to_owned(),
                    default: parse_default(text).map_err(|why| sig_err(source, &why))?,
                }),
            }
        }

        let outputs = parse_outputs(text[close + 1..].trim_start())
            .map_err(|why| sig_err(source, &why))?;

        Ok(Self {
            source: source.to_owned(),
            descriptor: Descriptor {
                name: if name.is_empty() { "λ".to_owned() } else { name.to_owned() },
                inputs,
                dynamic_inputs: Vec::new(),
                params,
                outputs,
                code: Some(source.to_owned()),
                step_id: None,
                step: BTreeMap::new(),
            },
        })
    }

    /// The parsed source text.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Describe for Introspected {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn fingerprint(&self) -> Vec<u8> {
        Value::map([("source", self.source.as_str())]).to_canonical_bytes()
    }

    fn describe(&self) -> Result<Descriptor, LazyError> {
        Ok(self.descriptor.clone())
    }
}

/// Declared inputs of a [`Metadata`] function.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputMeta {
    /// Fixed input field names.
    pub fixed: Vec<String>,
    /// Parameters whose value names an input field.
    pub dynamic: Vec<String>,
}

/// Explicitly declared function metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    /// Function name.
    pub name: String,
    /// Declared inputs (required).
    pub input: Option<InputMeta>,
    /// Declared outputs (required).
    pub output: Option<Vec<String>>,
    /// Parameters with defaults.
    pub parameters: Vec<ParamSpec>,
    /// Source/body text, required only when `_code` is requested.
    pub code: Option<String>,
    /// Explicit history step id.
    pub id: Option<i64>,
    /// Any other keys; recorded as step metadata in `_history`.
    pub extra: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct RawInput {
    #[serde(rename = "static", default)]
    fixed: Vec<String>,
    #[serde(default)]
    dynamic: Vec<String>,
}

#[derive(Deserialize)]
struct RawMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<RawInput>,
    #[serde(default)]
    output: Option<Vec<String>>,
    #[serde(default)]
    parameters: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    id: Option<i64>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl Metadata {
    /// Decodes metadata from JSON, e.g.
    ///
    /// ```json
    /// {"input": {"static": ["x"], "dynamic": ["col"]}, "output": ["z"],
    ///  "parameters": {"a": [1, 2, 3, "...", 9]}}
    /// ```
    ///
    /// Parameters are ordered by name.
    pub fn from_json(json: &str) -> Result<Self, LazyError> {
        let raw: RawMetadata = serde_json::from_str(json)?;
        let parameters = raw
            .parameters
            .into_iter()
            .map(|(name, v)| {
                Ok(ParamSpec {
                    name,
                    default: Param::from_json(v)?,
                })
            })
            .collect::<Result<Vec<_>, LazyError>>()?;
        let extra = raw
            .extra
            .into_iter()
            .map(|(k, v)| Ok((k, Value::from_json(v)?)))
            .collect::<Result<BTreeMap<_, _>, LazyError>>()?;
        Ok(Self {
            name: raw.name.unwrap_or_else(|| "declared".to_owned()),
            input: raw.input.map(|i| InputMeta {
                fixed: i.fixed,
                dynamic: i.dynamic,
            }),
            output: raw.output,
            parameters,
            code: raw.code,
            id: raw.id,
            extra,
        })
    }

    fn missing(&self, key: &'static str) -> LazyError {
        LazyError::MissingMetadata {
            function: self.name.clone(),
            key,
        }
    }
}

impl Describe for Metadata {
    fn name(&self) -> &str {
        &self.name
    }

    fn fingerprint(&self) -> Vec<u8> {
        let strings =
            |v: &[String]| Value::List(v.iter().map(|s| Value::from(s.as_str())).collect());
        let mut map = BTreeMap::new();
        map.insert("name".to_owned(), Value::from(self.name.as_str()));
        if let Some(input) = &self.input {
            map.insert("input.static".to_owned(), strings(input.fixed.as_slice()));
            map.insert("input.dynamic".to_owned(), strings(input.dynamic.as_slice()));
        }
        if let Some(output) = &self.output {
            map.insert("output".to_owned(), strings(output.as_slice()));
        }
        let params = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.default.fingerprint()))
            .collect::<BTreeMap<_, _>>();
        map.insert("parameters".to_owned(), Value::Map(params));
        if let Some(code) = &self.code {
            map.insert("code".to_owned(), Value::from(code.as_str()));
        }
        map.insert("extra".to_owned(), Value::Map(self.extra.clone()));
        Value::Map(map).to_canonical_bytes()
    }

    fn describe(&self) -> Result<Descriptor, LazyError> {
        let input = self.input.as_ref().ok_or_else(|| self.missing("input"))?;
        let output = self.output.as_ref().ok_or_else(|| self.missing("output"))?;
        Ok(Descriptor {
            name: self.name.clone(),
            inputs: input.fixed.clone(),
            dynamic_inputs: input.dynamic.clone(),
            params: self.parameters.clone(),
            outputs: output.clone(),
            code: self.code.clone(),
            step_id: self.id,
            step: self.extra.clone(),
        })
    }
}

fn sig_err(source: &str, why: &str) -> LazyError {
    LazyError::Signature(format!("{why} in `{}`", source.lines().next().unwrap_or(source)))
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices().skip_while(|(i, _)| *i < open) {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return (c == ')').then_some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on commas outside brackets and quotes.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_default(text: &str) -> Result<Param, String> {
    if text.starts_with('[') {
        return text.parse::<RangeLiteral>().map(Param::Range).map_err(|e| e.to_string());
    }
    let value = match text {
        "None" | "null" => Value::Null,
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        _ => {
            let quoted = ['"', '\''].iter().find_map(|q| {
                text.strip_prefix(*q).and_then(|t| t.strip_suffix(*q))
            });
            if let Some(s) = quoted {
                Value::from(s)
            } else if let Ok(i) = text.parse::<i64>() {
                Value::Int(i)
            } else if let Ok(x) = text.parse::<f64>() {
                Value::Float(x)
            } else {
                return Err(format!("unsupported default '{text}'"));
            }
        }
    };
    Ok(Param::Value(value))
}

fn parse_outputs(rest: &str) -> Result<Vec<String>, String> {
    let Some(rest) = rest.strip_prefix("->") else {
        return Ok(Vec::new());
    };
    let rest = rest.trim_start();
    let names: Vec<&str> = if let Some(inner) = rest.strip_prefix('(') {
        let end = inner.find(')').ok_or("unbalanced output list")?;
        inner[..end].split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
    } else {
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        vec![&rest[..end]]
    };
    names
        .into_iter()
        .map(|n| {
            if is_ident(n) {
                Ok(n.to_owned())
            } else {
                Err(format!("invalid output '{n}'"))
            }
        })
        .collect()
}
