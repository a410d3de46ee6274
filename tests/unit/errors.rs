use schemebind::error::{MISSING_TYPE_REGISTRATION, NO_OVERLOAD_MATCH};
use schemebind::prelude::*;
use schemebind::runtime::signal;

#[derive(Clone)]
struct Ghost;
impl UserType for Ghost {}

fn lenient() -> Scheme {
    Scheme::with_config(BindConfig::new().fatal_missing_registration(false))
}

fn kind_of(err: &BindError) -> &str {
    match err {
        BindError::Signal(signal) => &signal.kind,
        other => other.kind(),
    }
}

#[test]
fn every_shape_maps_to_a_symbolic_kind() {
    let scheme = Scheme::new();
    scheme.define_function("f", "", |a: i64, _: String| a);
    scheme.define_function("byte", "", |b: u8| b);
    scheme.define_overload("g", "", Overload::new().with(|a: i64| a).with(|s: String| s));

    let wrong_type = scheme.call("f", ("x", "y")).unwrap_err();
    let out_of_range = scheme.call("byte", (-1,)).unwrap_err();
    let wrong_args = scheme.call("f", (1,)).unwrap_err();
    let no_match = scheme.call("g", ('c',)).unwrap_err();

    assert_eq!(kind_of(&wrong_type), signal::WRONG_TYPE_ARG);
    assert_eq!(kind_of(&out_of_range), signal::OUT_OF_RANGE);
    assert_eq!(kind_of(&wrong_args), signal::WRONG_NUMBER_OF_ARGS);
    assert_eq!(kind_of(&no_match), NO_OVERLOAD_MATCH);
}

#[test]
fn messages_name_the_caller() {
    let scheme = Scheme::new();
    scheme.define_function("area", "", |w: f64, h: f64| w * h);
    let err = scheme.call("area", (2, "tall")).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("area"), "{message}");
    assert!(message.contains("argument 2"), "{message}");
    assert!(message.contains("real"), "{message}");
}

#[test]
fn wrong_number_of_args_carries_the_argument_list() {
    let scheme = Scheme::new();
    scheme.define_function("pair", "", |a: i64, b: i64| a * b);
    let BindError::Signal(signal) = scheme.call("pair", (1, 2, 3)).unwrap_err() else {
        panic!("expected a condition");
    };
    let rt = scheme.runtime();
    let info = rt.list_to_vec(signal.info);
    assert_eq!(rt.string(info[0]).as_deref(), Some("pair"));
    assert_eq!(scheme.to_string(info[1]), "(1 2 3)");
}

#[test]
fn host_conditions_keep_their_kind_and_info() {
    let scheme = Scheme::new();
    let detail = scheme.from(42).unwrap();
    let failure = scheme.error("io-error", "disk unavailable", &[detail]);
    scheme.define_raw("fail", "", schemebind::runtime::Arity::fixed(0), move |_, _| {
        Err(failure.clone())
    });

    let BindError::Signal(signal) = scheme.call("fail", ()).unwrap_err() else {
        panic!("expected a condition");
    };
    assert_eq!(signal.kind, "io-error");
    assert_eq!(signal.message, "disk unavailable");
    let info = scheme.runtime().list_to_vec(signal.info);
    assert_eq!(scheme.to::<i64>(info[0]).unwrap(), 42);
}

#[test]
fn missing_registration_is_a_condition_not_a_crash() {
    let scheme = lenient();
    scheme.define_function("spawn", "", || Ghost);
    scheme.define_function("inspect", "", |_: Ghost| true);

    let err = scheme.call("spawn", ()).unwrap_err();
    assert_eq!(kind_of(&err), MISSING_TYPE_REGISTRATION);

    let err = scheme.call("inspect", (1,)).unwrap_err();
    assert_eq!(kind_of(&err), signal::WRONG_TYPE_ARG);
}

#[test]
#[should_panic(expected = "used before it was registered")]
fn missing_registration_can_be_fatal() {
    let scheme = Scheme::with_config(BindConfig::new().fatal_missing_registration(true));
    let _ = scheme.from(Ghost);
}

#[test]
fn runtime_conditions_pass_through_unchanged() {
    let scheme = Scheme::new();
    let err = scheme.call("/", (1, 0)).unwrap_err();
    assert_eq!(kind_of(&err), signal::DIVISION_BY_ZERO);
}

#[test]
fn integer_division_overflow_widens_to_real() {
    let scheme = Scheme::new();
    let q: f64 = scheme.call_as("/", (i64::MIN, -1_i64)).unwrap();
    assert_eq!(q, 9.223372036854775808e18);
    let q: i64 = scheme.call_as("/", (i64::MIN, 2_i64)).unwrap();
    assert_eq!(q, i64::MIN / 2);
    let q: f64 = scheme.call_as("/", (7, 2)).unwrap();
    assert_eq!(q, 3.5);
}
