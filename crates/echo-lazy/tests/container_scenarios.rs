// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end behaviour of frozen containers: laziness, composition and
//! failure reporting.

#![allow(missing_docs, clippy::unwrap_used, clippy::panic)]
mod common;

use common::{linear, sum_diff, xy, Calls};
use echo_ident::Ledger;
use echo_lazy::{
    Compose, Config, FrozenDict, Function, LazyError, Ldict, Metadata, Patch, Prng, Sampler,
    Slot, Value, HISTORY,
};

#[test]
fn linear_combination_realizes_once() {
    let calls = Calls::default();
    let d = xy()
        .apply_with(&linear(&calls), &Config::new().set("a", 5).set("b", 10))
        .unwrap();
    assert!(d.is_pending("z"));
    assert_eq!(calls.get(), 0);

    assert_eq!(d.get("z").unwrap(), Value::Int(95));
    assert_eq!(d.get("z").unwrap(), Value::Int(95));
    assert_eq!(calls.get(), 1);
    assert!(!d.is_pending("z"));
}

#[test]
fn sibling_outputs_realize_together() {
    let calls = Calls::default();
    let d = xy().apply(&sum_diff(&calls)).unwrap();
    assert!(d.is_pending("s") && d.is_pending("d"));

    assert_eq!(d.get("d").unwrap(), Value::Int(-2));
    assert!(!d.is_pending("s"));
    assert_eq!(d.get("s").unwrap(), Value::Int(12));
    assert_eq!(calls.get(), 1);

    let (Some(Slot::Pending(s)), Some(Slot::Pending(dd))) = (d.slot("s"), d.slot("d")) else {
        panic!("outputs are deferred");
    };
    assert!(s.shares_group_with(dd));
}

#[test]
fn chained_steps_realize_dependencies_on_demand() {
    let calls = Calls::default();
    let square = Function::introspect("fn square(s) -> q", |args| {
        let s = args.int("s")?;
        Ok(Value::map([("q", s * s)]))
    })
    .unwrap();
    let d = xy().apply(&sum_diff(&calls)).unwrap().apply(&square).unwrap();
    assert_eq!(calls.get(), 0);
    assert_eq!(d.get("q").unwrap(), Value::Int(144));
    assert_eq!(calls.get(), 1);
    assert_eq!(d.to_map().unwrap().len(), 5);
}

#[test]
fn deleting_an_absent_field_is_a_key_error() {
    let d = xy();
    let err = d.merge(&[("w", Value::Null)].into_iter().collect()).unwrap_err();
    assert_eq!(err, LazyError::KeyError("w".into()));
    assert_eq!(d.keys().collect::<Vec<_>>(), vec!["x", "y"]);
}

#[test]
fn reads_check_key_type_and_presence() {
    let d = xy();
    assert_eq!(
        d.get_key(&Value::Int(3)),
        Err(LazyError::WrongKeyType { found: "int" })
    );
    assert_eq!(d.get_key(&Value::from("x")).unwrap(), Value::Int(5));
    assert_eq!(d.get("nope"), Err(LazyError::KeyError("nope".into())));
}

#[test]
fn sampling_without_a_sampler_fails() {
    let err = xy().apply(&linear(&Calls::default())).unwrap_err();
    assert_eq!(err, LazyError::UndefinedSeed { param: "a".into() });
}

#[test]
fn missing_inputs_report_available_fields() {
    let d = FrozenDict::new().merge(&Patch::new().set("x", 5)).unwrap();
    let err = d
        .apply_with(&linear(&Calls::default()), &Config::new().set("a", 1).set("b", 1))
        .unwrap_err();
    match err {
        LazyError::Dependence { available, .. } => assert_eq!(available, vec!["x"]),
        other => panic!("expected a dependence error, got {other}"),
    }
}

#[test]
fn failed_realization_leaves_field_pending() {
    let failing = Function::introspect("fn fail(x) -> z", |_| {
        Err(echo_lazy::FunctionError::new("boom"))
    })
    .unwrap();
    let d = xy().apply(&failing).unwrap();
    assert!(matches!(d.get("z"), Err(LazyError::Function { .. })));
    assert!(d.is_pending("z"));
}

#[test]
fn rebinding_keeps_pending_parameters() {
    let calls = Calls::default();
    let d = xy().rebind(Sampler::Seed(1)).apply(&linear(&calls)).unwrap();
    let rebound = d.rebind(Sampler::Seed(2));
    assert!(rebound.is_pending("z"));
    assert_eq!(rebound.get("z").unwrap(), d.get("z").unwrap());
    assert_eq!(calls.get(), 1);
    assert_eq!(rebound.id(), d.id());
    assert!(matches!(rebound.sampler(), Some(Sampler::Seed(2))));
}

#[test]
fn rebound_seed_advances_across_chained_steps() {
    let f = Function::introspect("fn f(x, a=[0, 1, 2, ..., 100000]) -> p", |args| {
        Ok(Value::Int(args.int("a")?))
    })
    .unwrap();
    let g = Function::introspect("fn g(x, b=[0, 1, 2, ..., 100000]) -> q", |args| {
        Ok(Value::Int(args.int("b")?))
    })
    .unwrap();
    let d = FrozenDict::new()
        .merge(&Patch::new().set("x", 1))
        .unwrap()
        .rebind(7_u64)
        .apply(&f)
        .unwrap()
        .apply(&g)
        .unwrap();

    let mut rng = Prng::from_seed_u64(7);
    let first = i64::try_from(rng.choose_index(100_001).unwrap()).unwrap();
    let second = i64::try_from(rng.choose_index(100_001).unwrap()).unwrap();
    assert_ne!(first, second);
    assert_eq!(d.get("p").unwrap(), Value::Int(first));
    assert_eq!(d.get("q").unwrap(), Value::Int(second));
}

#[test]
fn deleting_an_early_field_rebuilds_the_ledger() {
    let calls = Calls::default();
    let d = xy()
        .apply(&sum_diff(&calls))
        .unwrap()
        .merge(&Patch::new().set("w", 1))
        .unwrap()
        .merge(&Patch::new().delete("x"))
        .unwrap();
    assert_eq!(d.keys().collect::<Vec<_>>(), vec!["y", "s", "d", "w"]);
    let expected = Ledger::rebuild(d.keys().map(|k| d.field_id(k).unwrap()));
    assert_eq!(d.ledger(), &expected);
    assert_eq!(d.id(), expected.total());

    assert!(d.is_pending("s"));
    assert_eq!(d.get("s").unwrap(), Value::Int(12));
    assert_eq!(d.get("d").unwrap(), Value::Int(-2));
    assert_eq!(calls.get(), 1);
}

#[test]
fn identity_ignores_insertion_order_of_values() {
    let calls = Calls::default();
    let a = FrozenDict::new()
        .merge(&Patch::new().set("x", 5).set("y", 7))
        .unwrap();
    let b = FrozenDict::new()
        .merge(&Patch::new().set("y", 7).set("x", 5))
        .unwrap();
    assert_eq!(a.id(), b.id());
    assert!(a.id().is_unordered());

    let a = a.apply(&sum_diff(&calls)).unwrap();
    let b = b.apply(&sum_diff(&calls)).unwrap();
    assert_eq!(a.id(), b.id());
    assert!(!a.id().is_unordered());
    assert_ne!(a.id(), xy().id());
}

#[test]
fn different_parameters_give_different_identities() {
    let f = linear(&Calls::default());
    let one = xy().apply_with(&f, &Config::new().set("a", 1).set("b", 1)).unwrap();
    let two = xy().apply_with(&f, &Config::new().set("a", 2).set("b", 1)).unwrap();
    assert_ne!(one.field_id("z"), two.field_id("z"));
}

#[test]
fn composition_requests_dispatch_by_operand() {
    let calls = Calls::default();
    let d = FrozenDict::new()
        .compose(Patch::new().set("x", 5).set("y", 7))
        .unwrap()
        .compose(Sampler::Seed(9))
        .unwrap()
        .compose(Config::new().set("a", 1).set("b", 2).bind(linear(&calls)))
        .unwrap()
        .compose(Compose::Apply(sum_diff(&calls)))
        .unwrap();
    assert_eq!(d.get("z").unwrap(), Value::Int(19));
    assert_eq!(d.get("s").unwrap(), Value::Int(12));
    assert!(matches!(d.sampler(), Some(Sampler::Seed(9))));
}

#[test]
fn merged_functions_compute_single_fields() {
    let double =
        Function::introspect("fn double(x) -> w", |args| Ok(Value::Int(args.int("x")? * 2)))
            .unwrap();
    let d = xy()
        .merge(&Patch::new().compute("w", double).set("x", 100))
        .unwrap();
    assert!(d.is_pending("w"));
    assert_eq!(d.get("w").unwrap(), Value::Int(10));
    assert_eq!(d.get("x").unwrap(), Value::Int(100));
}

#[test]
fn declared_functions_read_dynamic_inputs() {
    let meta = Metadata::from_json(
        r#"{"name": "scale", "input": {"static": ["x"], "dynamic": ["col"]},
            "output": ["z", "_history"], "parameters": {"k": 3}, "id": 41,
            "author": "ops"}"#,
    )
    .unwrap();
    let scale = Function::declared(meta, |args| {
        let total = args.int("k")? * (args.int("x")? + args.int("y")?);
        Ok(Value::map([("z", total)]))
    });
    let d = xy()
        .apply_with(&scale, &Config::new().set("col", "y"))
        .unwrap();
    assert_eq!(d.get("z").unwrap(), Value::Int(36));
    let Value::List(steps) = d.get(HISTORY).unwrap() else {
        panic!("history is a list");
    };
    assert_eq!(
        steps,
        vec![Value::map([("id", Value::Int(41)), ("author", Value::from("ops"))])]
    );

    let err = xy().apply(&scale).unwrap_err();
    assert!(matches!(err, LazyError::Dependence { .. }));
}

#[test]
fn missing_code_is_reported() {
    let meta = Metadata::from_json(
        r#"{"name": "opaque", "input": {"static": ["x"]}, "output": ["_code"]}"#,
    )
    .unwrap();
    let f = Function::declared(meta, |_| Ok(Value::Null));
    assert_eq!(
        xy().apply(&f).unwrap_err(),
        LazyError::MissingMetadata {
            function: "opaque".into(),
            key: "code"
        }
    );
}

#[test]
fn ldict_tracks_the_chain() {
    let calls = Calls::default();
    let mut d = Ldict::from(xy());
    d.apply(&sum_diff(&calls)).unwrap();
    d.insert("x", 1).unwrap();
    let frozen = d.snapshot();
    d.seal();
    assert!(matches!(d.remove("x"), Err(LazyError::ReadOnly { .. })));
    assert_eq!(frozen.get("s").unwrap(), Value::Int(12));
    assert_eq!(frozen.get("x").unwrap(), Value::Int(1));
}
