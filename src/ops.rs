//! Arithmetic operator dispatch for opaque types.
//!
//! A user type can implement `+ - * /` by installing a method under the
//! operator's name in its capability environment. The first time any type
//! does so for an operator, the runtime's builtin is replaced by a
//! dispatcher that:
//!
//! 1. runs the builtin directly when no argument is a c-object;
//! 2. otherwise folds the arguments left to right, calling the method of
//!    whichever operand of each pair provides one, and the builtin for pairs
//!    where neither does.
//!
//! The dispatcher is installed at most once per operator and runtime
//! instance; later registrations only add methods to their own environment.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use schemebind_runtime::{Arity, FunctionSpec, ProtectId, Runtime, Signal, Value};

use crate::error::BindResult;
use crate::registry::BindState;

/// Operators open to method dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MethodOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl MethodOp {
    pub const ALL: [MethodOp; 4] = [MethodOp::Add, MethodOp::Sub, MethodOp::Mul, MethodOp::Div];

    /// The operator's name in the runtime.
    pub fn symbol(self) -> &'static str {
        match self {
            MethodOp::Add => "+",
            MethodOp::Sub => "-",
            MethodOp::Mul => "*",
            MethodOp::Div => "/",
        }
    }
}

impl fmt::Display for MethodOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Operators already replaced by a dispatcher in one runtime instance,
/// with the protection slot keeping each saved builtin alive.
#[derive(Default)]
pub(crate) struct OperatorTable {
    patched: FxHashMap<MethodOp, ProtectId>,
}

impl OperatorTable {
    pub(crate) fn is_patched(&self, op: MethodOp) -> bool {
        self.patched.contains_key(&op)
    }
}

impl fmt::Debug for OperatorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.patched.keys()).finish()
    }
}

/// Defines `method` under `op`'s name in a type's environment and makes
/// sure the operator dispatches to it.
pub(crate) fn install_method(rt: &Runtime, env: Value, op: MethodOp, method: Value) -> BindResult<()> {
    let sym = rt.make_symbol(op.symbol());
    rt.define(env, sym, method)?;
    ensure_dispatcher(rt, op);
    Ok(())
}

/// Replaces the builtin for `op` with a dispatcher unless that already
/// happened. Returns whether a dispatcher was installed by this call.
pub(crate) fn ensure_dispatcher(rt: &Runtime, op: MethodOp) -> bool {
    let state = BindState::of(rt);
    if state.ops.borrow().is_patched(op) {
        return false;
    }

    let builtin = rt.name_to_value(op.symbol());
    let root = rt.protect(builtin);
    let spec = FunctionSpec::new(op.symbol(), Arity::variadic(0))
        .doc("arithmetic with method dispatch for opaque types");
    let dispatcher = rt.make_function(
        spec,
        Rc::new(move |rt, args| dispatch(rt, op, builtin, args)),
    );
    rt.define_variable(op.symbol(), dispatcher);

    state.ops.borrow_mut().patched.insert(op, root);
    tracing::debug!(op = op.symbol(), "operator dispatch installed");
    true
}

fn method_of(rt: &Runtime, value: Value, op: MethodOp) -> Option<Value> {
    if rt.is_c_object(value) {
        rt.find_method(value, op.symbol())
    } else {
        None
    }
}

#[cfg_attr(feature = "profiling", profiling::function)]
fn dispatch(rt: &Runtime, op: MethodOp, builtin: Value, args: Value) -> Result<Value, Signal> {
    let values = rt.list_to_vec(args);
    if !values.iter().any(|v| rt.is_c_object(*v)) {
        return rt.apply(builtin, args);
    }

    match values.as_slice() {
        [single] => match method_of(rt, *single, op) {
            Some(method) => rt.call(method, &[*single]),
            None => rt.apply(builtin, args),
        },
        [first, rest @ ..] => rest.iter().try_fold(*first, |acc, next| {
            let method = method_of(rt, acc, op).or_else(|| method_of(rt, *next, op));
            tracing::trace!(op = op.symbol(), method = method.is_some(), "operator dispatch");
            rt.call(method.unwrap_or(builtin), &[acc, *next])
        }),
        [] => rt.apply(builtin, args),
    }
}
