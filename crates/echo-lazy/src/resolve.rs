// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dependency resolution: declared inputs and parameters to concrete
//! arguments.
//!
//! For every parameter, an override wins over the declared default; a range
//! (override or default) is expanded and one element drawn from the sampler;
//! a null value is an error. Every input field is read from the container
//! and may still be pending; it is realized only when the function runs.

use std::collections::BTreeMap;

use tracing::trace;

use crate::config::Config;
use crate::error::LazyError;
use crate::lazy::Slot;
use crate::sampler::{Prng, Sampler};
use crate::signature::{Descriptor, Param};
use crate::value::Value;

/// Read access to a container's fields during resolution.
pub trait FieldSource {
    /// Stored slot for `name`.
    fn slot(&self, name: &str) -> Option<&Slot>;

    /// Field names, in encounter order (used in error reports).
    fn field_names(&self) -> Vec<String>;
}

/// Outcome of resolving one function application.
#[derive(Clone, Debug)]
pub struct Resolution {
    /// Everything the function will be called with.
    pub deps: BTreeMap<String, Slot>,
    /// Input field names, static then dynamic.
    pub inputs: Vec<String>,
    /// Concrete parameter values (sampled where needed).
    pub params: BTreeMap<String, Value>,
}

/// Resolves `desc` against `fields`.
///
/// `sampler` is only consulted when some parameter is a range.
///
/// # Errors
///
/// - [`LazyError::UndefinedSeed`] when a range needs sampling and `sampler`
///   is `None`.
/// - [`LazyError::Dependence`] for null parameters, unconfigured dynamic
///   inputs and missing or null input fields.
/// - [`LazyError::InconsistentRange`] for malformed ranges.
pub fn resolve<F>(
    desc: &Descriptor,
    fields: &F,
    config: &Config,
    sampler: Option<&Sampler>,
) -> Result<Resolution, LazyError>
where
    F: FieldSource + ?Sized,
{
    let params = match sampler {
        Some(sampler) => sampler.with_rng(|rng| pick_params(desc, config, Some(rng)))?,
        None => pick_params(desc, config, None)?,
    };

    let mut inputs = desc.inputs.clone();
    for par in &desc.dynamic_inputs {
        match config.get(par) {
            Some(Param::Value(Value::Str(field))) => inputs.push(field.clone()),
            _ => {
                return Err(LazyError::dependence(
                    format!("dynamic input parameter '{par}' names no field"),
                    params.keys().cloned(),
                ))
            }
        }
    }

    let mut deps: BTreeMap<String, Slot> = params
        .iter()
        .map(|(k, v)| (k.clone(), Slot::Ready(v.clone())))
        .collect();
    for name in &inputs {
        match fields.slot(name) {
            None => {
                return Err(LazyError::dependence(
                    format!("missing field '{name}'"),
                    fields.field_names(),
                ))
            }
            Some(Slot::Ready(Value::Null)) => {
                return Err(LazyError::dependence(
                    format!("null value for field '{name}'"),
                    fields.field_names(),
                ))
            }
            Some(slot) => {
                deps.insert(name.clone(), slot.clone());
            }
        }
    }
    trace!(
        function = %desc.name,
        inputs = ?inputs,
        params = ?params.keys().collect::<Vec<_>>(),
        "resolved"
    );
    Ok(Resolution {
        deps,
        inputs,
        params,
    })
}

fn pick_params(
    desc: &Descriptor,
    config: &Config,
    mut rng: Option<&mut Prng>,
) -> Result<BTreeMap<String, Value>, LazyError> {
    let mut params = BTreeMap::new();
    for spec in &desc.params {
        let chosen = config.get(&spec.name).unwrap_or(&spec.default);
        let value = match chosen {
            Param::Value(Value::Null) => {
                return Err(LazyError::dependence(
                    format!("null value for parameter '{}'", spec.name),
                    params.keys().cloned().collect::<Vec<String>>(),
                ))
            }
            Param::Value(v) => v.clone(),
            Param::Range(range) => {
                let Some(rng) = rng.as_deref_mut() else {
                    return Err(LazyError::UndefinedSeed {
                        param: spec.name.clone(),
                    });
                };
                let domain = range.expand()?;
                let picked = rng.choose(&domain).ok_or_else(|| {
                    LazyError::InconsistentRange(format!("empty sample domain {range}"))
                })?;
                Value::from(*picked)
            }
        };
        params.insert(spec.name.clone(), value);
    }
    Ok(params)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::signature::{Describe, Introspected};

    struct Fields(BTreeMap<String, Slot>);

    impl FieldSource for Fields {
        fn slot(&self, name: &str) -> Option<&Slot> {
            self.0.get(name)
        }

        fn field_names(&self) -> Vec<String> {
            self.0.keys().cloned().collect()
        }
    }

    fn fields(pairs: &[(&str, Value)]) -> Fields {
        Fields(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), Slot::Ready(v.clone())))
                .collect(),
        )
    }

    fn desc(sig: &str) -> Descriptor {
        Introspected::parse(sig).unwrap().describe().unwrap()
    }

    #[test]
    fn overrides_win_over_defaults() {
        let d = desc("fn f(x, a=[1, 2, 3, ..., 9], b=2) -> z");
        let cfg = Config::new().set("a", 5).set("b", 10);
        let res = resolve(&d, &fields(&[("x", Value::Int(1))]), &cfg, None).unwrap();
        assert_eq!(res.params["a"], Value::Int(5));
        assert_eq!(res.params["b"], Value::Int(10));
        assert_eq!(res.inputs, vec!["x"]);
        assert_eq!(res.deps.len(), 3);
    }

    #[test]
    fn range_without_sampler_is_undefined_seed() {
        let d = desc("fn f(a=[1, 2, 3, ..., 9]) -> z");
        let err = resolve(&d, &fields(&[]), &Config::new(), None).unwrap_err();
        assert_eq!(err, LazyError::UndefinedSeed { param: "a".into() });
    }

    #[test]
    fn sampled_values_come_from_the_domain() {
        let d = desc("fn f(a=[-100, -99, -98, ..., 100], b=[1, 2, 4, ..., 16]) -> z");
        let sampler = Sampler::Seed(0);
        let res = resolve(&d, &fields(&[]), &Config::new(), Some(&sampler)).unwrap();
        let a = res.params["a"].as_int().unwrap();
        let b = res.params["b"].as_int().unwrap();
        assert!((-100..=100).contains(&a));
        assert!([1, 2, 4, 8, 16].contains(&b));
        let again = resolve(&d, &fields(&[]), &Config::new(), Some(&sampler)).unwrap();
        assert_eq!(again.params, res.params);
    }

    #[test]
    fn missing_or_null_inputs_fail() {
        let d = desc("fn f(x, y) -> z");
        let err = resolve(&d, &fields(&[("x", Value::Int(1))]), &Config::new(), None).unwrap_err();
        assert!(matches!(err, LazyError::Dependence { ref available, .. } if available == &["x"]));
        let err = resolve(
            &d,
            &fields(&[("x", Value::Int(1)), ("y", Value::Null)]),
            &Config::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, LazyError::Dependence { .. }));
    }

    #[test]
    fn null_parameter_fails() {
        let d = desc("fn f(a=None) -> z");
        assert!(matches!(
            resolve(&d, &fields(&[]), &Config::new(), None),
            Err(LazyError::Dependence { .. })
        ));
    }

    #[test]
    fn dynamic_inputs_follow_configured_names() {
        let mut d = desc("fn f(x) -> z");
        d.dynamic_inputs.push("col".into());
        let src = fields(&[("x", Value::Int(1)), ("w", Value::Int(2))]);
        let res = resolve(&d, &src, &Config::new().set("col", "w"), None).unwrap();
        assert_eq!(res.inputs, vec!["x", "w"]);
        assert!(resolve(&d, &src, &Config::new(), None).is_err());
    }
}
