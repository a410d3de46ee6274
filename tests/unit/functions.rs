use std::cell::{Cell, RefCell};
use std::rc::Rc;

use schemebind::prelude::*;
use schemebind::runtime::signal;
use schemebind::runtime::{Arity, FunctionFlags, Runtime};

fn info_of(scheme: &Scheme, err: &BindError) -> Vec<Value> {
    match err {
        BindError::Signal(signal) => scheme.runtime().list_to_vec(signal.info),
        other => panic!("expected a condition, got {other:?}"),
    }
}

// =============================================================================
// Argument checking
// =============================================================================

#[test]
fn wrong_type_reports_first_position_and_expected_name() {
    let scheme = Scheme::new();
    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();
    scheme.define_function("f", "", move |_: i64, _: String| flag.set(true));

    let err = scheme.call("f", ("oops", 1)).unwrap_err();
    assert!(matches!(err, BindError::Signal(ref s) if s.kind == signal::WRONG_TYPE_ARG));

    let info = info_of(&scheme, &err);
    let rt = scheme.runtime();
    assert_eq!(rt.string(info[0]).as_deref(), Some("f"));
    assert_eq!(rt.integer(info[1]), Some(1));
    assert_eq!(rt.string(info[2]).as_deref(), Some("oops"));
    assert_eq!(rt.string(info[3]).as_deref(), Some("integer"));
    assert!(!ran.get(), "callable ran despite a rejected argument");
}

#[test]
fn later_positions_are_checked_before_any_conversion() {
    let scheme = Scheme::new();
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    scheme.define_function("g", "", move |_: u8, _: bool, _: char| counter.set(counter.get() + 1));

    let err = scheme.call("g", (1, true, "not a char")).unwrap_err();
    let info = info_of(&scheme, &err);
    assert_eq!(scheme.runtime().integer(info[1]), Some(3));
    assert_eq!(scheme.runtime().string(info[3]).as_deref(), Some("character"));

    scheme.call("g", (1, false, 'c')).unwrap();
    assert_eq!(calls.get(), 1);
}

#[test]
fn extra_arguments_are_an_arity_error() {
    let scheme = Scheme::new();
    scheme.define_function("one", "", |a: i64| a);
    let err = scheme.call("one", (1, 2)).unwrap_err();
    assert!(matches!(err, BindError::Signal(ref s) if s.kind == signal::WRONG_NUMBER_OF_ARGS));

    let err = scheme.call("one", ()).unwrap_err();
    assert!(matches!(err, BindError::Signal(ref s) if s.kind == signal::WRONG_NUMBER_OF_ARGS));
}

#[test]
fn lenient_arity_ignores_extras_when_configured() {
    let scheme = Scheme::with_config(BindConfig::new().strict_arity(false));
    scheme.define_function("one", "", |a: i64| a + 1);
    let n: i64 = scheme.call_as("one", (1, "ignored", 'x')).unwrap();
    assert_eq!(n, 2);
}

#[test]
fn narrowing_failure_is_out_of_range() {
    let scheme = Scheme::new();
    scheme.define_function("byte", "", |b: u8| b);
    let err = scheme.call("byte", (256,)).unwrap_err();
    assert!(matches!(err, BindError::Signal(ref s) if s.kind == signal::OUT_OF_RANGE));
    let info = info_of(&scheme, &err);
    assert_eq!(scheme.runtime().integer(info[1]), Some(1));
}

// =============================================================================
// Variadic tails
// =============================================================================

#[test]
fn unused_tail_elements_are_never_checked() {
    let scheme = Scheme::new();
    scheme.define_function("head", "", |first: i64, _rest: VarArgs<i64>| first);
    let n: i64 = scheme.call_as("head", (7, "bad", 2.5, 'c')).unwrap();
    assert_eq!(n, 7);
}

#[test]
fn accessed_tail_elements_are_checked() {
    let scheme = Scheme::new();
    scheme.define_function("second", "", |rest: VarArgs<i64>| -> BindResult<i64> { rest.get(1) });

    let n: i64 = scheme.call_as("second", (1, 2, "bad")).unwrap();
    assert_eq!(n, 2);

    let err = scheme.call("second", (1, "bad")).unwrap_err();
    assert!(matches!(err, BindError::Signal(ref s) if s.kind == signal::WRONG_TYPE_ARG));
    let info = info_of(&scheme, &err);
    assert_eq!(scheme.runtime().string(info[0]).as_deref(), Some("second"));
    assert_eq!(scheme.runtime().integer(info[1]), Some(2));
}

#[test]
fn tail_supports_sequential_consumption() {
    let scheme = Scheme::new();
    scheme.define_function(
        "join",
        "(join sep str ...)",
        |sep: String, mut rest: VarArgs<String>| -> BindResult<String> {
            let mut parts = Vec::with_capacity(rest.len());
            while !rest.at_end() {
                parts.push(rest.advance()?);
            }
            Ok(parts.join(&sep))
        },
    );
    let joined: String = scheme.call_as("join", ("-", "a", "b", "c")).unwrap();
    assert_eq!(joined, "a-b-c");
    let empty: String = scheme.call_as("join", ("-",)).unwrap();
    assert_eq!(empty, "");
}

#[test]
fn iterating_a_tail_skips_past_ill_typed_elements() {
    let scheme = Scheme::new();
    scheme.define_function("count-ints", "", |rest: VarArgs<i64>| {
        rest.iter().filter_map(Result::ok).count()
    });
    scheme.define_function("checked-count", "", |rest: VarArgs<i64>| {
        rest.iter().collect::<BindResult<Vec<_>>>().map(|v| v.len())
    });

    let n: i64 = scheme.call_as("count-ints", (1, "x", 2, 'c', 3)).unwrap();
    assert_eq!(n, 3);
    let n: i64 = scheme.call_as("count-ints", (1, "x")).unwrap();
    assert_eq!(n, 1);

    let err = scheme.call("checked-count", (1, "x", 2)).unwrap_err();
    let info = info_of(&scheme, &err);
    assert_eq!(scheme.runtime().integer(info[1]), Some(2));
}

#[test]
fn variadic_procedures_announce_a_rest_arity() {
    let scheme = Scheme::new();
    let f = scheme.define_function("sum", "", |rest: VarArgs<f64>| -> BindResult<f64> {
        rest.iter().sum()
    });
    assert_eq!(f.arity(scheme.runtime()), Some(Arity::variadic(0)));
    let total: f64 = scheme.call_as("sum", (1, 2.5, 3)).unwrap();
    assert_eq!(total, 6.5);
}

// =============================================================================
// Metadata
// =============================================================================

#[test]
fn signatures_and_documentation_are_recorded() {
    let scheme = Scheme::new();
    let f = scheme.define_function("len", "(len s) counts characters", |s: String| s.chars().count());
    let rt = scheme.runtime();

    let sig = f.signature(rt).unwrap();
    assert_eq!(scheme.to_string(sig), "(integer? string?)");
    assert_eq!(f.documentation(rt).as_deref(), Some("(len s) counts characters"));
    assert_eq!(f.name(rt).as_deref(), Some("len"));
    assert_eq!(f.arity(rt), Some(Arity::fixed(1)));
}

#[test]
fn variadic_signature_ends_with_the_tail_predicate() {
    let scheme = Scheme::new();
    let sig = scheme.make_signature(&|_: String, _: VarArgs<f64>| ());
    assert_eq!(scheme.to_string(sig), "(#t string? real?)");
}

#[test]
fn options_become_procedure_flags() {
    let scheme = Scheme::new();
    let f = scheme.define_function_with("cb", "", FunctionOpts::UNSAFE_BODY, || {});
    let flags = scheme.runtime().procedure_flags(f.value()).unwrap();
    assert!(flags.contains(FunctionFlags::UNSAFE_BODY | FunctionFlags::TYPED));
    assert!(!flags.contains(FunctionFlags::UNSAFE_ARGLIST));
}

#[test]
fn anonymous_functions_are_not_bound() {
    let scheme = Scheme::new();
    let f = scheme.make_function("double", "", |x: i64| x * 2);
    assert!(!scheme.runtime().is_defined("double"));
    let n = scheme.call_fn(f, (21,)).unwrap();
    assert_eq!(scheme.to::<i64>(n).unwrap(), 42);
}

// =============================================================================
// Call-in and re-entrancy
// =============================================================================

#[test]
fn host_functions_can_call_back_into_the_runtime() {
    let scheme = Scheme::new();
    scheme.define_function("add", "", |a: i64, b: i64| a + b);
    scheme.define_function(
        "fold",
        "(fold f init x ...)",
        |rt: &Runtime, f: Function, init: Value, rest: Value| -> BindResult<Value> {
            let items = rt.list_to_vec(rest);
            items.into_iter().try_fold(init, |acc, item| f.call(rt, [acc, item]))
        },
    );

    let add = scheme.get::<Function>("add").unwrap();
    let list = scheme.list((1, 2, 3, 4)).unwrap();
    let total: i64 = scheme.call_as("fold", (add, 0, list)).unwrap();
    assert_eq!(total, 10);
}

#[test]
fn conditions_from_nested_calls_propagate() {
    let scheme = Scheme::new();
    scheme.define_function("strict", "", |a: i64| a);
    scheme.define_function("outer", "", |rt: &Runtime, f: Function| -> BindResult<Value> {
        f.call(rt, ("not a number",))
    });
    let strict = scheme.get::<Function>("strict").unwrap();
    let err = scheme.call("outer", (strict,)).unwrap_err();
    let info = info_of(&scheme, &err);
    assert_eq!(scheme.runtime().string(info[0]).as_deref(), Some("strict"));
}

#[test]
fn raw_procedures_and_properties() {
    let scheme = Scheme::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    scheme.define_raw("record", "", Arity::variadic(0), move |rt, args| {
        for v in args.iter(rt) {
            sink.borrow_mut().push(rt.object_to_string(v));
        }
        Ok(rt.unspecified())
    });
    scheme.call("record", (1, "a", 'b')).unwrap();
    assert_eq!(*log.borrow(), vec!["1", "\"a\"", "#\\b"]);

    let volume = Rc::new(Cell::new(3_i64));
    let (r, w) = (volume.clone(), volume.clone());
    let getter = scheme.define_property("volume", "", move || r.get(), move |v: i64| w.set(v));
    let setter = getter.setter(scheme.runtime()).unwrap();
    let err = scheme.call_fn(setter, ("loud",)).unwrap_err();
    assert!(matches!(err, BindError::Signal(ref s) if s.kind == signal::WRONG_TYPE_ARG));
    scheme.call_fn(setter, (9,)).unwrap();
    assert_eq!(scheme.call_as::<i64>("volume", ()).unwrap(), 9);
}

#[test]
fn variables_bridge_both_ways() {
    let scheme = Scheme::new();
    scheme.define("greeting", "hello", "a greeting").unwrap();
    let var = scheme.var("greeting").unwrap();
    assert_eq!(var.get::<String>().unwrap(), "hello");
    var.set("bye").unwrap();
    assert_eq!(scheme.get::<String>("greeting").unwrap(), "bye");
    assert!(matches!(
        scheme.get::<i64>("greeting"),
        Err(BindError::WrongType { ref caller, .. }) if caller == "greeting"
    ));
}

// =============================================================================
// Star functions and macros
// =============================================================================

#[test]
fn star_functions_take_keywords_and_defaults() {
    let scheme = Scheme::new();
    scheme
        .define_star_function(
            "greet",
            r#"name (greeting "hello") (times 1)"#,
            "(greet name :greeting g :times n)",
            |name: String, greeting: String, times: i64| {
                vec![format!("{greeting}, {name}"); times as usize].join(" ")
            },
        )
        .unwrap();

    let s: String = scheme.call_as("greet", ("ann",)).unwrap();
    assert_eq!(s, "hello, ann");

    let times = scheme.sym(":times");
    let s: String = scheme.call_as("greet", (times, 2, "bo")).unwrap();
    assert_eq!(s, "hello, bo hello, bo");

    let greeting = scheme.sym(":greeting");
    let s: String = scheme.call_as("greet", ("cy", greeting, "hi")).unwrap();
    assert_eq!(s, "hi, cy");

    let err = scheme.call("greet", ("dee", times, "twice")).unwrap_err();
    let info = info_of(&scheme, &err);
    assert_eq!(scheme.runtime().string(info[0]).as_deref(), Some("greet"));
    assert_eq!(scheme.runtime().integer(info[1]), Some(3));
}

#[test]
fn star_parameters_without_defaults_are_false() {
    let scheme = Scheme::new();
    let f = scheme
        .make_star_function("flag", "a b", "", |a: i64, _: Value| a)
        .unwrap();
    assert!(!scheme.runtime().is_defined("flag"));
    assert_eq!(f.arity(scheme.runtime()), Some(Arity::variadic(0)));

    let rt = scheme.runtime();
    let f = scheme.make_star_function("second", "a b", "", |_: i64, b: Value| b).unwrap();
    let b = scheme.call_fn(f, (1,)).unwrap();
    assert_eq!(b, rt.f());
}

#[test]
fn star_functions_with_rest() {
    let scheme = Scheme::new();
    scheme
        .define_star_function("total", "(scale 1) :rest xs", "", |scale: i64, xs: VarArgs<i64>| {
            xs.iter().sum::<BindResult<i64>>().map(|sum| sum * scale)
        })
        .unwrap();
    assert_eq!(scheme.call_as::<i64>("total", (2, 1, 2, 3)).unwrap(), 12);
    let scale = scheme.sym(":scale");
    assert_eq!(scheme.call_as::<i64>("total", (scale, 10, 4)).unwrap(), 40);
}

#[test]
fn star_parameter_lists_must_fit_the_function() {
    let scheme = Scheme::new();
    let err = scheme
        .define_star_function("f", "a b", "", |a: i64| a)
        .unwrap_err();
    assert!(matches!(err, BindError::Custom { ref kind, .. } if kind == signal::SYNTAX_ERROR));
    assert!(!scheme.runtime().is_defined("f"));

    let err = scheme.define_star_function("g", "a :rest r", "", |a: i64| a).unwrap_err();
    assert!(matches!(err, BindError::Custom { .. }));
    let err = scheme.define_star_function("h", "(a", "", |a: i64| a).unwrap_err();
    assert!(matches!(err, BindError::Custom { .. }));
}

#[test]
fn macros_receive_unevaluated_operands() {
    let scheme = Scheme::new();
    let m = scheme.define_macro("unless", "(unless test body)", |rt: &Runtime, test: Value, body: Value| {
        rt.list(&[rt.make_symbol("if"), test, rt.unspecified(), body])
    });
    let flags = scheme.runtime().procedure_flags(m.value()).unwrap();
    assert!(flags.contains(FunctionFlags::MACRO | FunctionFlags::TYPED));
    assert_eq!(m.arity(scheme.runtime()), Some(Arity::fixed(2)));

    let rt = scheme.runtime();
    let form = rt.list(&[rt.make_symbol("unless"), rt.make_symbol("done?"), rt.make_symbol("retry")]);
    let expanded = scheme.macroexpand(form).unwrap();
    assert_eq!(scheme.to_string(expanded), "(if done? #<unspecified> retry)");

    let short = rt.list(&[rt.make_symbol("unless"), rt.make_symbol("done?")]);
    let err = scheme.macroexpand(short).unwrap_err();
    assert!(matches!(err, BindError::Signal(ref s) if s.kind == signal::WRONG_NUMBER_OF_ARGS));

    let plain = scheme.list((1, 2)).unwrap();
    assert_eq!(scheme.macroexpand(plain.value()).unwrap(), plain.value());
}
