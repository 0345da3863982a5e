// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Compact range literals and their expansion into progressions.
//!
//! A literal is either an explicit list of sample points (`[1, 2, 3]`) or a
//! progression written as its first terms, a continuation marker and the
//! bound: `[1, 2, 4, ..., 16]`. Progressions are detected from the leading
//! terms: equal differences make an arithmetic progression, equal ratios a
//! geometric one. Integer-only literals expand to integers.

use std::fmt;
use std::str::FromStr;

use crate::error::LazyError;
use crate::value::Value;

/// Relative tolerance for comparing float differences/ratios.
const REL_TOL: f64 = 1e-9;

/// Upper bound on the number of terms a progression may expand to.
pub const MAX_TERMS: usize = 1 << 20;

/// A numeric sample point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    /// Integer point.
    Int(i64),
    /// Float point.
    Float(f64),
}

impl Number {
    /// Float view of this point.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(x) => x,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Value::Int(i),
            Number::Float(x) => Value::Float(x),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
        }
    }
}

/// One element of a range literal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RangeItem {
    /// A sample point.
    Num(Number),
    /// The continuation marker (`...`).
    Continue,
}

/// A compact range specification, as written in a parameter default.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeLiteral {
    items: Vec<RangeItem>,
}

impl RangeLiteral {
    /// Literal from raw items (marker placement is validated on expansion).
    pub fn new(items: Vec<RangeItem>) -> Self {
        Self { items }
    }

    /// Explicit sample set, no continuation.
    pub fn explicit<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Number>,
    {
        Self::new(points.into_iter().map(RangeItem::Num).collect())
    }

    /// Progression literal `[head.., ..., last]`.
    pub fn progression<I>(head: I, last: Number) -> Self
    where
        I: IntoIterator<Item = Number>,
    {
        let mut items: Vec<RangeItem> = head.into_iter().map(RangeItem::Num).collect();
        items.push(RangeItem::Continue);
        items.push(RangeItem::Num(last));
        Self::new(items)
    }

    /// Raw items.
    pub fn items(&self) -> &[RangeItem] {
        &self.items
    }

    /// Returns `true` when the literal carries a continuation marker.
    pub fn is_progression(&self) -> bool {
        self.items.contains(&RangeItem::Continue)
    }

    /// Expands the literal into its finite sample domain.
    ///
    /// # Errors
    ///
    /// [`LazyError::InconsistentRange`] when the marker is misplaced, fewer
    /// than three leading points are given, the leading points are neither
    /// arithmetic nor geometric, or the progression is degenerate.
    pub fn expand(&self) -> Result<Vec<Number>, LazyError> {
        let marker = self.items.iter().position(|i| *i == RangeItem::Continue);
        let Some(marker) = marker else {
            return Ok(self.numbers(&self.items));
        };
        if marker < 3 || marker + 2 != self.items.len() {
            return Err(self.inconsistent(
                "marker must follow at least three points and precede the last one",
            ));
        }
        let head = self.numbers(&self.items[..marker]);
        let last = match self.items[marker + 1] {
            RangeItem::Num(n) => n,
            RangeItem::Continue => return Err(self.inconsistent("repeated marker")),
        };

        let ints: Option<Vec<i64>> = head
            .iter()
            .map(|n| match n {
                Number::Int(i) => Some(*i),
                Number::Float(_) => None,
            })
            .collect();
        if let (Some(ints), Number::Int(bound)) = (ints, last) {
            if let Some(terms) = self.int_arithmetic(&ints, bound)? {
                return Ok(terms);
            }
            if let Some(terms) = self.int_geometric(&ints, bound)? {
                return Ok(terms);
            }
        }

        let floats: Vec<f64> = head.iter().map(|n| n.as_f64()).collect();
        if let Some(terms) = self.float_arithmetic(&floats, last.as_f64())? {
            return Ok(terms);
        }
        if let Some(terms) = self.float_geometric(&floats, last.as_f64())? {
            return Ok(terms);
        }
        Err(self.inconsistent(
            "cannot identify whether this is a geometric or arithmetic progression",
        ))
    }

    fn numbers(&self, items: &[RangeItem]) -> Vec<Number> {
        items
            .iter()
            .filter_map(|i| match i {
                RangeItem::Num(n) => Some(*n),
                RangeItem::Continue => None,
            })
            .collect()
    }

    fn inconsistent(&self, why: &str) -> LazyError {
        LazyError::InconsistentRange(format!("{why}: {self}"))
    }

    fn int_arithmetic(&self, head: &[i64], last: i64) -> Result<Option<Vec<Number>>, LazyError> {
        let Some(diff) = head[1].checked_sub(head[0]) else {
            return Ok(None);
        };
        let consistent = head.windows(2).all(|w| w[1].checked_sub(w[0]) == Some(diff));
        if !consistent {
            return Ok(None);
        }
        if diff == 0 {
            return Err(self.inconsistent("zero common difference"));
        }
        let mut terms = Vec::new();
        let mut term = Some(head[0]);
        while let Some(t) = term {
            if (diff > 0 && t > last) || (diff < 0 && t < last) {
                break;
            }
            self.push_bounded(&mut terms, Number::Int(t))?;
            term = t.checked_add(diff);
        }
        Ok(Some(terms))
    }

    fn int_geometric(&self, head: &[i64], last: i64) -> Result<Option<Vec<Number>>, LazyError> {
        if let Some(ratio) = common_factor(head, |w| exact_ratio(w[0], w[1])) {
            let mut terms = Vec::new();
            let mut term = Some(head[0]);
            while let Some(t) = term {
                if (head[0] > 0 && t > last) || (head[0] < 0 && t < last) {
                    break;
                }
                self.push_bounded(&mut terms, Number::Int(t))?;
                term = t.checked_mul(ratio);
            }
            return Ok(Some(terms));
        }
        let Some(divisor) = common_factor(head, |w| exact_ratio(w[1], w[0])) else {
            return Ok(None);
        };
        let mut terms = Vec::new();
        let mut t = head[0];
        loop {
            if (head[0] > 0 && t < last) || (head[0] < 0 && t > last) {
                return Ok(Some(terms));
            }
            self.push_bounded(&mut terms, Number::Int(t))?;
            match exact_ratio(divisor, t) {
                Some(next) => t = next,
                None => {
                    // The next term is fractional; stay integral only if it is past the bound.
                    let past = last.checked_mul(divisor).is_none_or(|edge| {
                        if head[0] > 0 {
                            t < edge
                        } else {
                            t > edge
                        }
                    });
                    return Ok(past.then_some(terms));
                }
            }
        }
    }

    #[allow(clippy::float_cmp)]
    fn float_arithmetic(&self, head: &[f64], last: f64) -> Result<Option<Vec<Number>>, LazyError> {
        let diff = head[1] - head[0];
        if !head.windows(2).all(|w| approx_eq(w[1] - w[0], diff)) {
            return Ok(None);
        }
        if diff == 0.0 || !diff.is_finite() {
            return Err(self.inconsistent("zero common difference"));
        }
        let steps = ((last - head[0]) / diff + REL_TOL).floor();
        self.collect_terms(steps, |k| head[0] + k * diff).map(Some)
    }

    #[allow(clippy::float_cmp)]
    fn float_geometric(&self, head: &[f64], last: f64) -> Result<Option<Vec<Number>>, LazyError> {
        if head.iter().any(|x| *x == 0.0) {
            return Ok(None);
        }
        let ratio = head[1] / head[0];
        if !head.windows(2).all(|w| approx_eq(w[1] / w[0], ratio)) {
            return Ok(None);
        }
        if ratio <= 0.0 || approx_eq(ratio, 1.0) || !ratio.is_finite() {
            return Err(self.inconsistent("degenerate common ratio"));
        }
        let span = last / head[0];
        if span <= 0.0 {
            return Ok(Some(Vec::new()));
        }
        let steps = (span.ln() / ratio.ln() + REL_TOL).floor();
        self.collect_terms(steps, |k| head[0] * ratio.powf(k)).map(Some)
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn collect_terms(
        &self,
        steps: f64,
        term: impl Fn(f64) -> f64,
    ) -> Result<Vec<Number>, LazyError> {
        if steps < 0.0 {
            return Ok(Vec::new());
        }
        if steps >= MAX_TERMS as f64 {
            return Err(self.inconsistent("progression too long"));
        }
        let count = steps as usize + 1;
        Ok((0..count).map(|k| Number::Float(term(k as f64))).collect())
    }

    fn push_bounded(&self, terms: &mut Vec<Number>, n: Number) -> Result<(), LazyError> {
        if terms.len() >= MAX_TERMS {
            return Err(self.inconsistent("progression too long"));
        }
        terms.push(n);
        Ok(())
    }
}

/// `b / a` when the division is exact.
fn exact_ratio(a: i64, b: i64) -> Option<i64> {
    match b.checked_rem(a) {
        Some(0) => b.checked_div(a),
        _ => None,
    }
}

/// Factor shared by every adjacent pair of `head`, when it is greater than one.
fn common_factor(head: &[i64], factor: impl Fn(&[i64]) -> Option<i64>) -> Option<i64> {
    let first = factor(&head[..2])?;
    (first > 1 && head.windows(2).all(|w| factor(w) == Some(first))).then_some(first)
}

#[allow(clippy::float_cmp)]
fn approx_eq(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() <= REL_TOL * a.abs().max(b.abs())
}

impl fmt::Display for RangeLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match item {
                RangeItem::Num(n) => write!(f, "{n}")?,
                RangeItem::Continue => f.write_str("...")?,
            }
        }
        f.write_str("]")
    }
}

impl FromStr for RangeLiteral {
    type Err = LazyError;

    /// Parses `[p0, p1, p2, ..., last]` (brackets optional, `…` accepted).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.trim();
        let body = body
            .strip_prefix('[')
            .and_then(|b| b.strip_suffix(']'))
            .unwrap_or(body);
        let items = body
            .split(',')
            .map(str::trim)
            .map(parse_item)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(items))
    }
}

pub(crate) fn parse_item(tok: &str) -> Result<RangeItem, LazyError> {
    if tok == "..." || tok == "…" {
        return Ok(RangeItem::Continue);
    }
    if let Ok(i) = tok.parse::<i64>() {
        return Ok(RangeItem::Num(Number::Int(i)));
    }
    tok.parse::<f64>()
        .map(|x| RangeItem::Num(Number::Float(x)))
        .map_err(|_| LazyError::InconsistentRange(format!("cannot parse range point '{tok}'")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn ints(v: &[Number]) -> Vec<i64> {
        v.iter()
            .map(|n| match n {
                Number::Int(i) => *i,
                Number::Float(x) => panic!("unexpected float {x}"),
            })
            .collect()
    }

    fn expand(s: &str) -> Result<Vec<Number>, LazyError> {
        s.parse::<RangeLiteral>()?.expand()
    }

    #[test]
    fn arithmetic_integers_expand_inclusive() {
        let terms = expand("[-100, -99, -98, ..., 100]").unwrap();
        assert_eq!(ints(&terms), (-100..=100).collect::<Vec<_>>());
    }

    #[test]
    fn geometric_integers_stop_at_bound() {
        assert_eq!(ints(&expand("[1,2,4,...,16]").unwrap()), vec![1, 2, 4, 8, 16]);
        assert_eq!(ints(&expand("[1,2,4,...,20]").unwrap()), vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn shrinking_integer_ratio_stays_integral() {
        assert_eq!(ints(&expand("[16, 8, 4, ..., 1]").unwrap()), vec![16, 8, 4, 2, 1]);
        assert_eq!(ints(&expand("[16, 8, 4, ..., 3]").unwrap()), vec![16, 8, 4]);
        assert_eq!(ints(&expand("[24, 12, 6, ..., 2]").unwrap()), vec![24, 12, 6, 3]);
        assert_eq!(
            ints(&expand("[-81, -27, -9, ..., -1]").unwrap()),
            vec![-81, -27, -9, -3, -1]
        );
    }

    #[test]
    fn fractional_shrinking_terms_fall_back_to_floats() {
        let terms = expand("[24, 12, 6, ..., 1]").unwrap();
        assert!(terms.iter().all(|n| matches!(n, Number::Float(_))));
        let values: Vec<f64> = terms.iter().map(|n| n.as_f64()).collect();
        assert_eq!(values.len(), 5);
        assert!((values[4] - 1.5).abs() < 1e-9);
    }

    #[test]
    fn explicit_literal_is_unchanged() {
        assert_eq!(ints(&expand("[1,2,3]").unwrap()), vec![1, 2, 3]);
    }

    #[test]
    fn neither_progression_fails() {
        assert!(matches!(expand("[1,2,5,...,20]"), Err(LazyError::InconsistentRange(_))));
    }

    #[test]
    fn float_geometric_decades() {
        let terms = expand("[0.0001, 0.001, 0.01, ..., 100000000]").unwrap();
        assert_eq!(terms.len(), 13);
        let last = terms.last().unwrap().as_f64();
        assert!((last - 1e8).abs() / 1e8 < 1e-9);
    }

    #[test]
    fn decreasing_arithmetic() {
        assert_eq!(ints(&expand("[10, 8, 6, ..., 1]").unwrap()), vec![10, 8, 6, 4, 2]);
    }

    #[test]
    fn non_integer_ratio_falls_back_to_floats() {
        let terms = expand("[4, 6, 9, ..., 31]").unwrap();
        let values: Vec<f64> = terms.iter().map(|n| n.as_f64()).collect();
        assert_eq!(values.len(), 6);
        assert!((values[5] - 30.375).abs() < 1e-9);
    }

    #[test]
    fn misplaced_marker_fails() {
        assert!(expand("[1, 2, ..., 9]").is_err());
        assert!(expand("[1, 2, 3, ..., 9, 10]").is_err());
        assert!(expand("[5, 5, 5, ..., 9]").is_err());
        assert!(expand("[1, x, 3]").is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let head = [Number::Int(1), Number::Int(2), Number::Int(3)];
        let lit = RangeLiteral::progression(head, Number::Int(9));
        assert_eq!(lit.to_string(), "[1, 2, 3, ..., 9]");
        assert_eq!(lit.to_string().parse::<RangeLiteral>().unwrap(), lit);
    }
}
