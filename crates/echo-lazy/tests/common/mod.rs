// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use echo_lazy::{FrozenDict, Function, Patch, Value};

/// Counts body executions across clones of a fixture function.
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// `{x: 5, y: 7}` with no sampler bound.
pub fn xy() -> FrozenDict {
    FrozenDict::new()
        .merge(&Patch::new().set("x", 5).set("y", 7))
        .unwrap_or_default()
}

/// `z = a*x + b*y` with range-valued parameter defaults.
pub fn linear(calls: &Calls) -> Function {
    let calls = calls.clone();
    let signature = "fn linear(x, y, a=[-100, -99, -98, ..., 100], b=[1, 2, 4, ..., 16]) -> z";
    Function::introspect(signature, move |args| {
        calls.bump();
        let z = args.int("a")? * args.int("x")? + args.int("b")? * args.int("y")?;
        Ok(Value::Int(z))
    })
    .unwrap_or_else(|e| unreachable!("fixture signature parses: {e}"))
}

/// `(s, d) = (x + y, x - y)`, a two-output step.
pub fn sum_diff(calls: &Calls) -> Function {
    let calls = calls.clone();
    Function::introspect("fn sum_diff(x, y) -> (s, d)", move |args| {
        calls.bump();
        let (x, y) = (args.int("x")?, args.int("y")?);
        Ok(Value::map([("s", x + y), ("d", x - y)]))
    })
    .unwrap_or_else(|e| unreachable!("fixture signature parses: {e}"))
}
