use std::cell::Cell;
use std::rc::Rc;

use schemebind::prelude::*;
use schemebind::runtime::signal;

// =============================================================================
// Fixtures
// =============================================================================

/// Counts how often the runtime destroys it.
struct Tracked {
    drops: Rc<Cell<usize>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

impl UserType for Tracked {}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Money {
    cents: i64,
}

impl UserType for Money {}

#[derive(Clone, Debug, Default, PartialEq)]
struct Grid {
    cells: Vec<i64>,
}

impl UserType for Grid {}

struct Holder {
    held: Value,
}

impl UserType for Holder {}

fn register_money(scheme: &Scheme) {
    scheme
        .make_usertype::<Money>("money")
        .doc("an amount of money")
        .constructor(Overload::new().with(|cents: i64| Money { cents }))
        .operator_overload(
            MethodOp::Add,
            Overload::new()
                .with(|a: Money, b: Money| Money { cents: a.cents + b.cents })
                .with(|a: Money, b: i64| Money { cents: a.cents + b })
                .with(|a: i64, b: Money| Money { cents: a + b.cents }),
        )
        .method("money-cents", |m: Money| m.cents)
        .display(|m| format!("#<money {}.{:02}>", m.cents / 100, m.cents % 100))
        .equality()
        .build()
        .unwrap();
}

fn track(scheme: &Scheme) -> (Value, Rc<Cell<usize>>) {
    let drops = Rc::new(Cell::new(0));
    let value = scheme
        .from(Tracked {
            drops: drops.clone(),
        })
        .unwrap();
    (value, drops)
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn free_hook_waits_for_every_root() {
    let scheme = Scheme::new();
    scheme.make_usertype::<Tracked>("tracked").build().unwrap();
    let (value, drops) = track(&scheme);

    let id = scheme.protect(value);
    scheme.collect();
    scheme.collect();
    assert_eq!(drops.get(), 0);
    assert!(scheme.runtime().is_live(value));

    scheme.unprotect(id);
    scheme.collect();
    assert_eq!(drops.get(), 1);
    scheme.collect();
    assert_eq!(drops.get(), 1);
}

#[test]
fn runtime_bindings_are_roots_too() {
    let scheme = Scheme::new();
    scheme.make_usertype::<Tracked>("tracked").build().unwrap();
    let (value, drops) = track(&scheme);

    scheme.define("kept", value, "").unwrap();
    scheme.collect();
    assert_eq!(drops.get(), 0);

    scheme.set("kept", false).unwrap();
    scheme.collect();
    assert_eq!(drops.get(), 1);
}

#[test]
fn scoped_roots_release_on_every_path() {
    let scheme = Scheme::new();
    scheme.make_usertype::<Tracked>("tracked").build().unwrap();
    let (value, drops) = track(&scheme);

    let attempt = || -> BindResult<()> {
        let _root = scheme.root(value);
        scheme.collect();
        scheme.to::<i64>(value)?;
        Ok(())
    };
    assert!(attempt().is_err());
    assert_eq!(drops.get(), 0);

    scheme.collect();
    assert_eq!(drops.get(), 1);
}

#[test]
fn mark_hook_keeps_held_values_alive() {
    let scheme = Scheme::new();
    scheme
        .make_usertype::<Holder>("holder")
        .mark(|holder, marker| marker.mark(holder.held))
        .build()
        .unwrap();

    let held = scheme.from("payload").unwrap();
    let holder = scheme.from(Holder { held }).unwrap();
    let root = scheme.root(holder);

    scheme.collect();
    assert!(scheme.runtime().is_live(held));
    assert_eq!(scheme.to::<String>(held).unwrap(), "payload");

    drop(root);
    scheme.collect();
    assert!(!scheme.runtime().is_live(holder));
    assert!(!scheme.runtime().is_live(held));
}

#[test]
fn host_handles_outlive_the_runtime_object() {
    let scheme = Scheme::new();
    scheme.make_usertype::<Tracked>("tracked").build().unwrap();
    let (value, drops) = track(&scheme);

    let handle: Obj<Tracked> = scheme.to(value).unwrap();
    scheme.collect();
    assert!(!scheme.runtime().is_live(value));
    assert_eq!(drops.get(), 0);

    drop(handle);
    assert_eq!(drops.get(), 1);
}

// =============================================================================
// Constructors, predicates, methods
// =============================================================================

#[test]
fn constructor_and_predicate() {
    let scheme = Scheme::new();
    register_money(&scheme);

    let m = scheme.call("make-money", (250,)).unwrap();
    assert_eq!(scheme.to::<Money>(m).unwrap(), Money { cents: 250 });
    assert!(scheme.call_as::<bool>("money?", (m,)).unwrap());
    assert!(!scheme.call_as::<bool>("money?", (250,)).unwrap());
    assert_eq!(scheme.to_string(m), "#<money 2.50>");
}

#[test]
fn default_constructor() {
    let scheme = Scheme::new();
    scheme.make_usertype::<Grid>("grid").default_constructor().build().unwrap();
    let g: Grid = scheme.call_as("make-grid", ()).unwrap();
    assert_eq!(g, Grid::default());
}

#[test]
fn methods_are_found_through_the_instance() {
    let scheme = Scheme::new();
    register_money(&scheme);
    let m = scheme.from(Money { cents: 7 }).unwrap();

    let cents = scheme.find_method(m, "money-cents").unwrap();
    let n = scheme.call_fn(cents, (m,)).unwrap();
    assert_eq!(scheme.to::<i64>(n).unwrap(), 7);

    assert!(scheme.find_method(m, "car").is_none());
    assert!(scheme.find_method(scheme.from(1).unwrap(), "money-cents").is_none());

    scheme
        .add_method::<Money, _, _>("money-double", |m: Obj<Money>| m.borrow_mut().cents *= 2)
        .unwrap();
    let double = scheme.find_method(m, "money-double").unwrap();
    scheme.call_fn(double, (m,)).unwrap();
    assert_eq!(scheme.to::<Money>(m).unwrap().cents, 14);
}

#[test]
fn custom_environments_are_shared() {
    let scheme = Scheme::new();
    let env = scheme.make_let();
    env.define(scheme.runtime(), "shared-limit", 99, "").unwrap();
    scheme
        .make_usertype::<Grid>("grid")
        .with_env(env.value())
        .build()
        .unwrap();

    let g = scheme.from(Grid::default()).unwrap();
    assert_eq!(scheme.type_env::<Grid>().unwrap(), env);
    assert_eq!(
        scheme.runtime().find_method(g, "shared-limit"),
        env.get_raw(scheme.runtime(), "shared-limit")
    );
}

// =============================================================================
// Hooks
// =============================================================================

#[test]
fn equality_hook() {
    let scheme = Scheme::new();
    register_money(&scheme);
    scheme.make_usertype::<Grid>("grid").build().unwrap();

    let a = scheme.from(Money { cents: 5 }).unwrap();
    let b = scheme.from(Money { cents: 5 }).unwrap();
    let c = scheme.from(Money { cents: 6 }).unwrap();
    let g = scheme.from(Grid::default()).unwrap();

    let equal = |x: Value, y: Value| scheme.call_as::<bool>("equal?", (x, y)).unwrap();
    assert!(equal(a, a));
    assert!(equal(a, b));
    assert!(!equal(a, c));
    assert!(!equal(a, g));
    assert!(!equal(a, scheme.from(5).unwrap()));
}

#[test]
fn length_and_indexed_access() {
    let scheme = Scheme::new();
    scheme
        .make_usertype::<Grid>("grid")
        .length(|g| g.cells.len())
        .indexer(
            |g: &Grid, i: usize| {
                g.cells
                    .get(i)
                    .copied()
                    .ok_or_else(|| BindError::custom(signal::OUT_OF_RANGE, format!("no cell {i}")))
            },
            |g: &mut Grid, i: usize, v: i64| {
                let cell = g
                    .cells
                    .get_mut(i)
                    .ok_or_else(|| BindError::custom(signal::OUT_OF_RANGE, format!("no cell {i}")))?;
                *cell = v;
                Ok(())
            },
        )
        .build()
        .unwrap();

    let g = scheme.from(Grid { cells: vec![1, 2, 3] }).unwrap();
    let rt = scheme.runtime();

    assert_eq!(scheme.call_as::<i64>("length", (g,)).unwrap(), 3);

    let second = rt.call(g, &[rt.make_integer(1)]).unwrap();
    assert_eq!(rt.integer(second), Some(2));

    scheme.call("object-set!", (g, 1, 20)).unwrap();
    assert_eq!(scheme.to::<Grid>(g).unwrap().cells, vec![1, 20, 3]);

    let err = rt.call(g, &[rt.make_string("x")]).unwrap_err();
    assert_eq!(err.kind, signal::WRONG_TYPE_ARG);
    let info = rt.list_to_vec(err.info);
    assert_eq!(rt.string(info[0]).as_deref(), Some("grid ref"));
    assert_eq!(rt.integer(info[1]), Some(1));

    let err = scheme.call("object-set!", (g, 0, "x")).unwrap_err();
    let BindError::Signal(signal) = err else {
        panic!("expected a condition");
    };
    let info = rt.list_to_vec(signal.info);
    assert_eq!(rt.string(info[0]).as_deref(), Some("grid set"));
    assert_eq!(rt.integer(info[1]), Some(2));

    let err = rt.call(g, &[rt.make_integer(10)]).unwrap_err();
    assert_eq!(err.kind, signal::OUT_OF_RANGE);
}

// =============================================================================
// Operator dispatch
// =============================================================================

#[test]
fn operators_dispatch_on_either_operand() {
    let scheme = Scheme::new();
    register_money(&scheme);
    let m = scheme.from(Money { cents: 100 }).unwrap();

    let both: Money = scheme.call_as("+", (m, m)).unwrap();
    assert_eq!(both.cents, 200);
    let right: Money = scheme.call_as("+", (5, m)).unwrap();
    assert_eq!(right.cents, 105);
    let folded: Money = scheme.call_as("+", (m, 1, 2, m)).unwrap();
    assert_eq!(folded.cents, 203);

    let plain: i64 = scheme.call_as("+", (1, 2, 3)).unwrap();
    assert_eq!(plain, 6);
    let real: f64 = scheme.call_as("+", (1, 0.5)).unwrap();
    assert_eq!(real, 1.5);
}

#[test]
fn operator_patch_is_idempotent() {
    let scheme = Scheme::new();
    let builtin = scheme.runtime().name_to_value("+");

    register_money(&scheme);
    let dispatcher = scheme.runtime().name_to_value("+");
    assert_ne!(dispatcher, builtin);

    scheme
        .add_method_op::<Money, _, _>(MethodOp::Add, |a: Money, b: Money| Money {
            cents: a.cents + b.cents + 1,
        })
        .unwrap();
    scheme
        .make_usertype::<Grid>("grid")
        .operator(MethodOp::Add, |a: Grid, b: Grid| Grid {
            cells: [a.cells, b.cells].concat(),
        })
        .build()
        .unwrap();
    assert_eq!(scheme.runtime().name_to_value("+"), dispatcher);

    let m = scheme.from(Money { cents: 1 }).unwrap();
    let replaced: Money = scheme.call_as("+", (m, m)).unwrap();
    assert_eq!(replaced.cents, 3);

    let g = scheme.from(Grid { cells: vec![1] }).unwrap();
    let joined: Grid = scheme.call_as("+", (g, g)).unwrap();
    assert_eq!(joined.cells, vec![1, 1]);

    let plain: i64 = scheme.call_as("+", (20, 22)).unwrap();
    assert_eq!(plain, 42);
}

#[test]
fn operands_without_methods_fall_back_to_the_builtin() {
    let scheme = Scheme::new();
    register_money(&scheme);
    scheme.make_usertype::<Grid>("grid").build().unwrap();
    let g = scheme.from(Grid::default()).unwrap();

    let err = scheme.call("+", (g, 1)).unwrap_err();
    assert!(matches!(err, BindError::Signal(ref s) if s.kind == signal::WRONG_TYPE_ARG));
}

// =============================================================================
// Type ops
// =============================================================================

fn register_grid_ops(scheme: &Scheme) {
    scheme
        .make_usertype::<Grid>("grid")
        .op(TypeOp::copy())
        .op(TypeOp::reverse(|g: &Grid| Grid {
            cells: g.cells.iter().rev().copied().collect(),
        }))
        .op(TypeOp::to_list(|g: &Grid| g.cells.clone()))
        .build()
        .unwrap();
}

#[test]
fn copy_and_reverse_box_new_instances() {
    let scheme = Scheme::new();
    register_grid_ops(&scheme);
    let g = scheme.from(Grid { cells: vec![1, 2, 3] }).unwrap();

    let copy = scheme.call("copy", (g,)).unwrap();
    assert_ne!(copy, g);
    let copy: Obj<Grid> = scheme.to(copy).unwrap();
    copy.borrow_mut().cells.push(4);
    assert_eq!(scheme.to::<Grid>(g).unwrap().cells, vec![1, 2, 3]);

    let reversed: Grid = scheme.call_as("reverse", (g,)).unwrap();
    assert_eq!(reversed.cells, vec![3, 2, 1]);

    let list = scheme.call("object->list", (g,)).unwrap();
    assert_eq!(scheme.to_string(list), "(1 2 3)");
}

#[test]
fn ops_added_after_build_take_effect() {
    let scheme = Scheme::new();
    register_money(&scheme);
    let m = scheme.from(Money { cents: 5 }).unwrap();

    let err = scheme.call("fill!", (m, 1)).unwrap_err();
    assert!(matches!(err, BindError::Signal(ref s) if s.kind == signal::WRONG_TYPE_ARG));

    scheme
        .add_op::<Money>(TypeOp::fill(|m: &mut Money, cents: i64| {
            m.cents = cents;
            Ok(())
        }))
        .unwrap();
    scheme.call("fill!", (m, 42)).unwrap();
    assert_eq!(scheme.to::<Money>(m).unwrap().cents, 42);

    let err = scheme.call("fill!", (m, "lots")).unwrap_err();
    let BindError::Signal(signal) = err else {
        panic!("expected a condition");
    };
    let info = scheme.runtime().list_to_vec(signal.info);
    assert_eq!(scheme.runtime().string(info[0]).as_deref(), Some("money fill"));
    assert_eq!(scheme.runtime().integer(info[1]), Some(2));

    scheme.add_op::<Money>(TypeOp::length(|_| 1)).unwrap();
    scheme.add_op::<Money>(TypeOp::length(|m: &Money| m.cents as usize)).unwrap();
    assert_eq!(scheme.call_as::<i64>("length", (m,)).unwrap(), 42);
}

#[test]
fn equivalence_falls_back_to_equality() {
    let scheme = Scheme::new();
    register_money(&scheme);
    let a = scheme.from(Money { cents: 100 }).unwrap();
    let b = scheme.from(Money { cents: 101 }).unwrap();
    let c = scheme.from(Money { cents: 100 }).unwrap();

    let equivalent = |x: Value, y: Value| scheme.call_as::<bool>("equivalent?", (x, y)).unwrap();
    assert!(equivalent(a, c));
    assert!(!equivalent(a, b));

    scheme
        .add_op::<Money>(TypeOp::equivalent(|x: &Money, y: &Money| (x.cents - y.cents).abs() <= 1))
        .unwrap();
    assert!(equivalent(a, b));
    assert!(!scheme.call_as::<bool>("equal?", (a, b)).unwrap());
}

#[test]
fn ops_need_a_registered_type() {
    let scheme = Scheme::with_config(BindConfig::new().fatal_missing_registration(false));
    let err = scheme.add_op::<Grid>(TypeOp::copy()).unwrap_err();
    assert!(matches!(err, BindError::MissingTypeRegistration { .. }));
}

// =============================================================================
// Re-registration
// =============================================================================

#[test]
fn failed_build_leaves_the_registry_untouched() {
    let scheme = Scheme::with_config(BindConfig::new().fatal_missing_registration(false));
    let env = scheme.make_let();
    env.define_const(scheme.runtime(), "grid-size", 0, "").unwrap();
    let roots = scheme.runtime().protected_count();

    let err = scheme
        .make_usertype::<Grid>("grid")
        .with_env(env.value())
        .method("grid-size", |g: Grid| g.cells.len())
        .build()
        .unwrap_err();
    assert!(matches!(err, BindError::Signal(ref s) if s.kind == "immutable-error"));
    assert!(scheme.type_tag::<Grid>().is_err());
    assert_eq!(scheme.runtime().protected_count(), roots);

    let first = scheme.make_usertype::<Grid>("grid").build().unwrap();
    let err = scheme
        .make_usertype::<Grid>("grid")
        .with_env(env.value())
        .method("grid-size", |g: Grid| g.cells.len())
        .build();
    assert!(err.is_err());
    assert_eq!(scheme.type_tag::<Grid>().unwrap(), first);
}

#[test]
fn re_registration_releases_the_old_environment() {
    let scheme = Scheme::new();
    scheme.make_usertype::<Grid>("grid").build().unwrap();
    let old_env = scheme.type_env::<Grid>().unwrap();
    let roots = scheme.runtime().protected_count();

    let tag = scheme.make_usertype::<Grid>("grid").build().unwrap();
    assert_eq!(scheme.type_tag::<Grid>().unwrap(), tag);
    assert_ne!(scheme.type_env::<Grid>().unwrap(), old_env);
    assert_eq!(scheme.runtime().protected_count(), roots);

    scheme.collect();
    assert!(!scheme.runtime().is_live(old_env.value()));
}
