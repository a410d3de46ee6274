//! First-match overload resolution.
//!
//! Several adapters may share one exposed name. A call walks them in
//! declaration order and runs the first whose arity and fixed-position
//! predicates all accept the arguments. Later candidates are never
//! considered once one matches, even if they would fit more precisely.

use std::rc::Rc;

use schemebind_runtime::{Arity, FunctionSpec, Runtime, Value};

use crate::adapter::{Adapter, HostFn};
use crate::config::FunctionOpts;
use crate::error::{self, BindError, BindResult};

/// Candidates collected in declaration order, before they get a name.
///
/// ```
/// # use schemebind::{Overload, Scheme};
/// let scheme = Scheme::new();
/// let area = Overload::new()
///     .with(|w: i64, h: i64| w * h)
///     .with(|side: f64| side * side);
/// scheme.define_overload("area", "area of a rectangle or square", area);
/// assert_eq!(scheme.call_as::<i64>("area", (2, 3)).unwrap(), 6);
/// assert_eq!(scheme.call_as::<f64>("area", (1.5,)).unwrap(), 2.25);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Overload {
    candidates: Vec<Adapter>,
}

impl Overload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a candidate.
    pub fn with<M, F: HostFn<M>>(mut self, f: F) -> Self {
        self.candidates.push(Adapter::new("", f));
        self
    }

    pub fn push(&mut self, adapter: Adapter) {
        self.candidates.push(adapter);
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[Adapter] {
        &self.candidates
    }
}

impl From<Adapter> for Overload {
    fn from(adapter: Adapter) -> Self {
        Self {
            candidates: vec![adapter],
        }
    }
}

/// A named, ordered candidate list.
#[derive(Debug, Clone)]
pub struct OverloadSet {
    name: Rc<str>,
    candidates: Vec<Adapter>,
}

impl OverloadSet {
    pub fn new(name: &str, overload: Overload) -> Self {
        Self {
            name: name.into(),
            candidates: overload
                .candidates
                .into_iter()
                .map(|adapter| adapter.renamed(name))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn candidates(&self) -> &[Adapter] {
        &self.candidates
    }

    /// Arity spanning every candidate.
    pub fn arity(&self) -> Arity {
        let min = self
            .candidates
            .iter()
            .map(|c| c.arity().required)
            .min()
            .unwrap_or(0);
        if self.candidates.iter().any(Adapter::is_variadic) {
            return Arity::variadic(min);
        }
        let max = self
            .candidates
            .iter()
            .map(|c| c.arity().required)
            .max()
            .unwrap_or(0);
        Arity::range(min, max)
    }

    /// Index of the first candidate accepting `args`.
    pub fn resolve(&self, rt: &Runtime, args: &[Value]) -> Option<usize> {
        self.candidates.iter().position(|candidate| {
            candidate.accepts_count(args.len(), true) && candidate.first_mismatch(rt, args).is_none()
        })
    }

    /// Rendered signatures of every candidate, in declaration order.
    pub fn signatures(&self, rt: &Runtime) -> Vec<String> {
        self.candidates
            .iter()
            .map(|c| c.signature().render(rt))
            .collect()
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call(&self, rt: &Runtime, args: Value) -> BindResult<Value> {
        let values = rt.list_to_vec(args);
        let Some(index) = self.resolve(rt, &values) else {
            tracing::trace!(name = &*self.name, count = values.len(), "no overload matched");
            return Err(BindError::NoOverloadMatch {
                args,
                actual_types: values.iter().map(|v| error::describe(rt, *v)).collect(),
                candidates: self.signatures(rt),
                caller: self.name.to_string(),
            });
        };

        let candidate = &self.candidates[index];
        let fixed = candidate.signature().params.len();
        let tail = if candidate.is_variadic() {
            rt.list_tail(args, fixed).unwrap_or_else(|| rt.nil())
        } else {
            rt.nil()
        };
        candidate.invoke(rt, &values[..fixed], tail)
    }

    /// Wraps the set in a runtime procedure.
    ///
    /// A single candidate publishes its signature; a set of several does not
    /// have one.
    pub fn into_procedure(self, rt: &Runtime, doc: &str, opts: FunctionOpts) -> Value {
        let signature = match self.candidates.as_slice() {
            [only] => Some(only.signature().to_value(rt)),
            _ => None,
        };
        let arity = self.arity();
        tracing::debug!(name = &*self.name, candidates = self.candidates.len(), %arity, "binding overload set");

        let set = Rc::new(self);
        let spec = FunctionSpec::new(&set.name, arity)
            .doc(doc)
            .flags(opts.to_flags())
            .signature(signature);
        let body = set.clone();
        rt.make_function(
            spec,
            Rc::new(move |rt, args| body.call(rt, args).map_err(|err| err.into_signal(rt))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::error::NO_OVERLOAD_MATCH;
    use crate::varargs::VarArgs;

    fn two_ints_or_string() -> OverloadSet {
        let overload = Overload::new()
            .with(|a: i64, b: i64| format!("ints {a} {b}"))
            .with(|s: String| format!("string {s}"));
        OverloadSet::new("f", overload)
    }

    #[test]
    fn first_matching_candidate_wins() {
        let rt = Runtime::new();
        let set = two_ints_or_string();

        let by_string = set.call(&rt, rt.list(&[rt.make_string("x")])).unwrap();
        assert_eq!(rt.string(by_string).as_deref(), Some("string x"));

        let by_ints = set
            .call(&rt, rt.list(&[rt.make_integer(1), rt.make_integer(2)]))
            .unwrap();
        assert_eq!(rt.string(by_ints).as_deref(), Some("ints 1 2"));
    }

    #[test]
    fn declaration_order_beats_precision() {
        let rt = Runtime::new();
        let set = OverloadSet::new(
            "g",
            Overload::new().with(|_: f64| "real").with(|_: i64| "integer"),
        );
        let result = set.call(&rt, rt.list(&[rt.make_integer(3)])).unwrap();
        assert_eq!(rt.string(result).as_deref(), Some("real"));
    }

    #[test]
    fn no_match_reports_types_and_candidates() {
        let rt = Runtime::new();
        let set = two_ints_or_string();
        let err = set.call(&rt, rt.list(&[rt.make_real(1.5)])).unwrap_err();
        match err {
            BindError::NoOverloadMatch {
                actual_types,
                candidates,
                caller,
                ..
            } => {
                assert_eq!(actual_types, vec!["real".to_string()]);
                assert_eq!(
                    candidates,
                    vec![
                        "(integer integer) -> string".to_string(),
                        "(string) -> string".to_string()
                    ]
                );
                assert_eq!(caller, "f");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn extra_arguments_match_nothing() {
        let rt = Runtime::new();
        let set = OverloadSet::new(
            "f",
            Overload::new().with(|a: i64| a).with(|a: i64, b: i64| a + b),
        );
        let args = rt.list(&[rt.make_integer(1), rt.make_integer(2), rt.make_integer(3)]);
        assert!(matches!(
            set.call(&rt, args),
            Err(BindError::NoOverloadMatch { .. })
        ));
        assert_eq!(set.arity(), Arity::range(1, 2));
    }

    #[test]
    fn variadic_candidate_accepts_any_tail() {
        let rt = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let set = OverloadSet::new(
            "h",
            Overload::new()
                .with(|_: String| -1_i64)
                .with(move |first: i64, rest: VarArgs<i64>| {
                    counter.set(counter.get() + 1);
                    first + rest.len() as i64
                }),
        );

        let args = rt.list(&[rt.make_integer(10), rt.make_string("a"), rt.t()]);
        let result = set.call(&rt, args).unwrap();
        assert_eq!(rt.integer(result), Some(12));
        assert_eq!(calls.get(), 1);
        assert_eq!(set.arity(), Arity::variadic(1));
    }

    #[test]
    fn procedure_signals_no_overload_match() {
        let rt = Runtime::new();
        let proc = two_ints_or_string().into_procedure(&rt, "", FunctionOpts::empty());
        let err = rt.call(proc, &[rt.make_real(0.5)]).unwrap_err();
        assert_eq!(err.kind, NO_OVERLOAD_MATCH);
        assert!(err.message.contains("(string) -> string"));
        assert_eq!(rt.procedure_signature(proc), None);
    }
}
