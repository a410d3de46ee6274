use schemebind::prelude::*;
use schemebind::{Kind, TypeDesc};

#[derive(Clone, Debug, PartialEq)]
struct Label(String);
impl UserType for Label {}

#[derive(Clone, Debug, PartialEq)]
struct Unregistered;
impl UserType for Unregistered {}

fn scheme() -> Scheme {
    Scheme::with_config(BindConfig::new().fatal_missing_registration(false))
}

fn round_trip<T>(scheme: &Scheme, value: T)
where
    T: FromValue + IntoValue + PartialEq + std::fmt::Debug + Clone,
{
    let v = scheme.from(value.clone()).unwrap();
    assert!(scheme.is::<T>(v), "is<T>(from<T>(x)) failed for {value:?}");
    assert_eq!(scheme.to::<T>(v).unwrap(), value);
}

// =============================================================================
// Primitives
// =============================================================================

#[test]
fn primitives_round_trip() {
    let scheme = scheme();
    round_trip(&scheme, true);
    round_trip(&scheme, false);
    round_trip(&scheme, -17_i64);
    round_trip(&scheme, i64::MAX);
    round_trip(&scheme, 255_u8);
    round_trip(&scheme, -3_i32);
    round_trip(&scheme, 2.5_f64);
    round_trip(&scheme, 0.25_f32);
    round_trip(&scheme, 'λ');
    round_trip(&scheme, String::from("héllo"));
}

#[test]
fn vectors_round_trip() {
    let scheme = scheme();
    round_trip(&scheme, vec![1_i64, 2, 3]);
    round_trip(&scheme, vec![1.5_f64, -0.5]);
    round_trip(&scheme, vec![0_u8, 127, 255]);
    round_trip(&scheme, Vec::<i32>::new());

    let v = scheme.from(vec![4_i32, 5]).unwrap();
    assert_eq!(scheme.type_of(v), Kind::IntVector);
}

#[test]
fn unit_maps_to_unspecified() {
    let scheme = scheme();
    let v = scheme.from(()).unwrap();
    assert_eq!(v, scheme.unspecified());
}

#[test]
fn integers_are_reals_but_not_the_reverse() {
    let scheme = scheme();
    let n = scheme.from(3_i64).unwrap();
    assert!(scheme.is::<f64>(n));
    assert_eq!(scheme.to::<f64>(n).unwrap(), 3.0);

    let x = scheme.from(3.0_f64).unwrap();
    assert!(!scheme.is::<i64>(x));
    assert!(matches!(
        scheme.to::<i64>(x),
        Err(BindError::WrongType { ref expected, .. }) if expected == "integer"
    ));
}

#[test]
fn narrowing_reports_out_of_range() {
    let scheme = scheme();
    let big = scheme.from(300_i64).unwrap();
    assert!(scheme.is::<u8>(big));
    assert!(matches!(scheme.to::<u8>(big), Err(BindError::OutOfRange { .. })));

    let negative = scheme.from(-1_i64).unwrap();
    assert!(matches!(scheme.to::<usize>(negative), Err(BindError::OutOfRange { .. })));

    let huge = scheme.from(1e300_f64).unwrap();
    assert!(matches!(scheme.to::<f32>(huge), Err(BindError::OutOfRange { .. })));
}

#[test]
fn to_opt_never_errors() {
    let scheme = scheme();
    let s = scheme.from("x").unwrap();
    assert_eq!(scheme.to_opt::<i64>(s), None);
    assert_eq!(scheme.to_opt::<char>(s), None);
    assert_eq!(scheme.to_opt::<String>(s).as_deref(), Some("x"));
}

#[test]
fn predicates_are_total() {
    let scheme = scheme();
    let rt = scheme.runtime();
    let samples = [
        rt.nil(),
        rt.t(),
        rt.make_integer(1),
        rt.make_real(1.5),
        rt.make_character('a'),
        rt.make_string("s"),
        rt.make_symbol("sym"),
        rt.list(&[rt.make_integer(1)]),
        rt.make_vector(vec![rt.nil()]),
        rt.make_byte_vector(vec![1]),
        rt.unspecified(),
    ];
    for v in samples {
        let _ = scheme.is::<i64>(v);
        let _ = scheme.is::<String>(v);
        let _ = scheme.is::<Vec<f64>>(v);
        assert!(!scheme.is::<Label>(v));
    }
}

// =============================================================================
// Handles
// =============================================================================

#[test]
fn lists_and_values() {
    let scheme = scheme();
    let list = scheme.list((1, "two", 3.0)).unwrap();
    let rt = scheme.runtime();
    assert_eq!(list.len(rt), 3);
    assert_eq!(list.get_as::<String>(rt, 1).unwrap(), "two");
    assert_eq!(scheme.to_string(list.value()), "(1 \"two\" 3.0)");

    let values = scheme.values((1, 2)).unwrap();
    assert_eq!(values.to_vec(rt).len(), 2);
    assert_eq!(scheme.type_of(values.value()), Kind::Values);
}

#[test]
fn environments() {
    let scheme = scheme();
    let env = scheme.make_let();
    let rt = scheme.runtime();
    env.define(rt, "x", 1, "").unwrap();
    env.define_const(rt, "y", 2, "").unwrap();
    assert_eq!(env.get::<i64>(rt, "x").unwrap(), 1);
    assert!(env.set(rt, "y", 3).is_err());
    assert_eq!(env.get_opt::<i64>(rt, "missing"), None);
    assert_eq!(scheme.get_opt::<i64>("x"), None);
    assert_eq!(env.to_list(rt).len(rt), 2);
}

// =============================================================================
// Opaque types
// =============================================================================

#[test]
fn opaque_round_trip() {
    let scheme = scheme();
    scheme.make_usertype::<Label>("label").equality().build().unwrap();

    round_trip(&scheme, Label("a".into()));

    let v = scheme.from(Label("b".into())).unwrap();
    assert_eq!(scheme.type_of(v), Kind::CObject);
    assert!(!scheme.is::<String>(v));
    assert_eq!(scheme.to_string(v), "#<label>");
}

#[test]
fn obj_borrows_in_place() {
    let scheme = scheme();
    scheme.make_usertype::<Label>("label").build().unwrap();
    let v = scheme.from(Label("before".into())).unwrap();

    let handle: Obj<Label> = scheme.to(v).unwrap();
    handle.borrow_mut().0 = "after".into();

    let copy: Label = scheme.to(v).unwrap();
    assert_eq!(copy, Label("after".into()));
    assert_eq!(handle.value(), v);
}

#[test]
fn opaque_values_carry_the_type_environment() {
    let scheme = scheme();
    scheme.make_usertype::<Label>("label").build().unwrap();
    let v = scheme.from(Label("x".into())).unwrap();
    let env = scheme.type_env::<Label>().unwrap();
    assert_eq!(scheme.runtime().c_object_let(v), Some(env.value()));
    assert_eq!(scheme.type_name::<Label>().unwrap(), "label");
    assert_eq!(
        TypeDesc::opaque::<Label>().name(scheme.runtime()),
        "label"
    );
}

#[test]
fn unregistered_types_are_recoverable() {
    let scheme = scheme();
    assert!(matches!(
        scheme.from(Unregistered),
        Err(BindError::MissingTypeRegistration { .. })
    ));
    assert!(matches!(
        scheme.type_tag::<Unregistered>(),
        Err(BindError::MissingTypeRegistration { .. })
    ));
    let n = scheme.from(1).unwrap();
    assert!(!scheme.is::<Unregistered>(n));
}

#[test]
fn registrations_are_per_instance() {
    let first = scheme();
    let second = scheme();
    first.make_usertype::<Label>("label").build().unwrap();

    let v = first.from(Label("x".into())).unwrap();
    assert!(first.is::<Label>(v));
    assert!(matches!(
        second.from(Label("y".into())),
        Err(BindError::MissingTypeRegistration { .. })
    ));
}

#[test]
fn re_registration_replaces_the_tag() {
    let scheme = scheme();
    let old_tag = scheme.make_usertype::<Label>("label").build().unwrap();
    let old = scheme.from(Label("old".into())).unwrap();

    let new_tag = scheme.make_usertype::<Label>("label").build().unwrap();
    assert_ne!(old_tag, new_tag);
    assert_eq!(scheme.type_tag::<Label>().unwrap(), new_tag);
    assert!(!scheme.is::<Label>(old));

    let fresh = scheme.from(Label("new".into())).unwrap();
    assert!(scheme.is::<Label>(fresh));
}

#[test]
fn value_keys_follow_equal() {
    use std::collections::HashMap;

    let scheme = scheme();
    let mut seen = HashMap::new();
    for text in ["a", "b", "a"] {
        let v = scheme.from(text).unwrap();
        *seen.entry(scheme.key(v)).or_insert(0) += 1;
    }
    assert_eq!(seen.len(), 2);
}
