use std::cell::RefCell;
use std::rc::Rc;

use schemebind::error::NO_OVERLOAD_MATCH;
use schemebind::prelude::*;
use schemebind::runtime::signal;

fn traced() -> (Rc<RefCell<Vec<&'static str>>>, Overload) {
    let trace = Rc::new(RefCell::new(Vec::new()));
    let (a, b) = (trace.clone(), trace.clone());
    let overload = Overload::new()
        .with(move |_: i64, _: i64| a.borrow_mut().push("int,int"))
        .with(move |_: String| b.borrow_mut().push("string"));
    (trace, overload)
}

#[test]
fn string_argument_selects_the_second_candidate() {
    let scheme = Scheme::new();
    let (trace, overload) = traced();
    scheme.define_overload("f", "", overload);

    scheme.call("f", ("text",)).unwrap();
    assert_eq!(*trace.borrow(), vec!["string"]);

    scheme.call("f", (1, 2)).unwrap();
    assert_eq!(*trace.borrow(), vec!["string", "int,int"]);
}

#[test]
fn first_match_not_best_match() {
    let scheme = Scheme::new();
    scheme.define_overload(
        "kind",
        "",
        Overload::new()
            .with(|_: Value| "anything")
            .with(|_: i64| "integer"),
    );
    let picked: String = scheme.call_as("kind", (5,)).unwrap();
    assert_eq!(picked, "anything");
}

#[test]
fn three_arguments_never_truncate() {
    let scheme = Scheme::new();
    let calls = Rc::new(RefCell::new(0));
    let (one, two) = (calls.clone(), calls.clone());
    scheme.define_overload(
        "f",
        "",
        Overload::new()
            .with(move |a: i64| {
                *one.borrow_mut() += 1;
                a
            })
            .with(move |a: i64, b: i64| {
                *two.borrow_mut() += 1;
                a + b
            }),
    );

    let err = scheme.call("f", (1, 2, 3)).unwrap_err();
    assert!(matches!(
        err,
        BindError::Signal(ref s)
            if s.kind == signal::WRONG_NUMBER_OF_ARGS || s.kind == NO_OVERLOAD_MATCH
    ));
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn no_match_lists_actual_types_and_candidates() {
    let scheme = Scheme::new();
    let (_, overload) = traced();
    scheme.define_overload("f", "", overload);

    let err = scheme.call("f", (1.5,)).unwrap_err();
    let BindError::Signal(signal) = err else {
        panic!("expected a condition");
    };
    assert_eq!(signal.kind, NO_OVERLOAD_MATCH);

    let rt = scheme.runtime();
    let info = rt.list_to_vec(signal.info);
    assert_eq!(scheme.to_string(info[1]), "(real)");
    let candidates: Vec<String> = info[2..]
        .iter()
        .map(|v| scheme.to::<String>(*v).unwrap())
        .collect();
    assert_eq!(candidates, ["(integer integer) -> unspecified", "(string) -> unspecified"]);
}

#[test]
fn variadic_candidates_match_on_fixed_prefix() {
    let scheme = Scheme::new();
    scheme.define_overload(
        "describe",
        "",
        Overload::new()
            .with(|_: String| "one string".to_string())
            .with(|label: String, rest: VarArgs<Value>| format!("{label} + {}", rest.len())),
    );

    let one: String = scheme.call_as("describe", ("x",)).unwrap();
    assert_eq!(one, "one string");
    let many: String = scheme.call_as("describe", ("x", 1, 'c', 2.0)).unwrap();
    assert_eq!(many, "x + 3");
}

#[test]
fn conversion_errors_in_the_winner_still_surface() {
    let scheme = Scheme::new();
    scheme.define_overload(
        "small",
        "",
        Overload::new().with(|n: u8| n).with(|s: String| s.len() as u8),
    );
    let err = scheme.call("small", (1000,)).unwrap_err();
    assert!(matches!(err, BindError::Signal(ref s) if s.kind == signal::OUT_OF_RANGE));
}

#[test]
fn overload_sets_announce_their_arity_span() {
    let scheme = Scheme::new();
    let f = scheme.define_overload(
        "span",
        "",
        Overload::new().with(|| 0).with(|a: i64, b: i64, c: i64| a + b + c),
    );
    let arity = f.arity(scheme.runtime()).unwrap();
    assert_eq!((arity.required, arity.max()), (0, Some(3)));

    let n: i64 = scheme.call_as("span", (1, 2, 3)).unwrap();
    assert_eq!(n, 6);
    let err = scheme.call("span", (1,)).unwrap_err();
    assert!(matches!(err, BindError::Signal(ref s) if s.kind == NO_OVERLOAD_MATCH));
}

#[test]
fn no_match_names_registered_types() {
    #[derive(Clone)]
    struct Gadget;
    impl UserType for Gadget {}

    let scheme = Scheme::new();
    scheme.make_usertype::<Gadget>("gadget").build().unwrap();
    let (_, overload) = traced();
    scheme.define_overload("f", "", overload);

    let gadget = scheme.from(Gadget).unwrap();
    let err = scheme.call("f", (gadget, 1)).unwrap_err();
    let BindError::Signal(signal) = err else {
        panic!("expected a condition");
    };
    let info = scheme.runtime().list_to_vec(signal.info);
    assert_eq!(scheme.to_string(info[1]), "(gadget integer)");
    assert!(signal.message.contains("gadget"));
}
