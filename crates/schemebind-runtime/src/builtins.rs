//! Builtin procedures installed into every runtime.

use std::rc::Rc;

use crate::call::FunctionSpec;
use crate::object::{Arity, NativeBody};
use crate::runtime::Runtime;
use crate::signal::{DIVISION_BY_ZERO, Signal};
use crate::value::{Kind, Value};

#[derive(Clone, Copy, Debug)]
enum Num {
    Int(i64),
    Real(f64),
}

impl Num {
    fn to_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Real(x) => x,
        }
    }

    fn into_value(self, rt: &Runtime) -> Value {
        match self {
            Num::Int(n) => rt.make_integer(n),
            Num::Real(x) => rt.make_real(x),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
}

impl Arith {
    fn name(self) -> &'static str {
        match self {
            Arith::Add => "+",
            Arith::Sub => "-",
            Arith::Mul => "*",
            Arith::Div => "/",
        }
    }

    fn identity(self) -> Num {
        match self {
            Arith::Add | Arith::Sub => Num::Int(0),
            Arith::Mul | Arith::Div => Num::Int(1),
        }
    }

    fn combine(self, rt: &Runtime, a: Num, b: Num, args: Value) -> Result<Num, Signal> {
        Ok(match (a, b) {
            (Num::Int(x), Num::Int(y)) => match self {
                Arith::Add => x.checked_add(y).map_or(Num::Real(x as f64 + y as f64), Num::Int),
                Arith::Sub => x.checked_sub(y).map_or(Num::Real(x as f64 - y as f64), Num::Int),
                Arith::Mul => x.checked_mul(y).map_or(Num::Real(x as f64 * y as f64), Num::Int),
                Arith::Div => {
                    if y == 0 {
                        return Err(rt.error_with_message(
                            DIVISION_BY_ZERO,
                            "/: division by zero".into(),
                            args,
                        ));
                    }
                    match (x.checked_rem(y), x.checked_div(y)) {
                        (Some(0), Some(q)) => Num::Int(q),
                        _ => Num::Real(x as f64 / y as f64),
                    }
                }
            },
            (a, b) => {
                let (x, y) = (a.to_f64(), b.to_f64());
                Num::Real(match self {
                    Arith::Add => x + y,
                    Arith::Sub => x - y,
                    Arith::Mul => x * y,
                    Arith::Div => x / y,
                })
            }
        })
    }
}

fn number(rt: &Runtime, op: Arith, position: usize, value: Value) -> Result<Num, Signal> {
    let num = match rt.type_of(value) {
        Kind::Integer => rt.integer(value).map(Num::Int),
        Kind::Real => rt.real(value).map(Num::Real),
        _ => None,
    };
    num.ok_or_else(|| rt.wrong_type_arg_error(op.name(), position, value, "a number"))
}

/// Left fold; one argument means negation or reciprocal for `-` and `/`.
fn arithmetic(rt: &Runtime, op: Arith, args: Value) -> Result<Value, Signal> {
    let items = rt.list_to_vec(args);
    let mut acc = match items.first() {
        None => return Ok(op.identity().into_value(rt)),
        Some(first) => number(rt, op, 1, *first)?,
    };
    if items.len() == 1 && matches!(op, Arith::Sub | Arith::Div) {
        acc = op.combine(rt, op.identity(), acc, args)?;
    }
    for (i, item) in items.iter().enumerate().skip(1) {
        let next = number(rt, op, i + 1, *item)?;
        acc = op.combine(rt, acc, next, args)?;
    }
    Ok(acc.into_value(rt))
}

fn length(rt: &Runtime, args: Value) -> Result<Value, Signal> {
    let Some(value) = rt.car(args) else {
        return Err(rt.wrong_number_of_args_error("length", args));
    };
    let len = match rt.type_of(value) {
        Kind::Nil | Kind::Pair => rt.list_length(value),
        Kind::String => rt.string(value).map(|s| s.chars().count()),
        Kind::Vector | Kind::IntVector | Kind::FloatVector | Kind::ByteVector => {
            rt.vector_length(value)
        }
        Kind::CObject => {
            let hook = rt
                .c_object_type(value)
                .and_then(|tag| rt.c_type_hooks(tag).length);
            if let Some(hook) = hook {
                return hook(rt, value);
            }
            None
        }
        _ => None,
    };
    match len {
        Some(len) => Ok(rt.make_integer(i64::try_from(len).unwrap_or(i64::MAX))),
        None => Err(rt.wrong_type_arg_error("length", 1, value, "a sequence")),
    }
}

fn define(rt: &Runtime, name: &str, arity: Arity, doc: &str, body: NativeBody) {
    let spec = FunctionSpec::new(name, arity).doc(doc);
    let proc = rt.make_function(spec, body);
    rt.define_variable(name, proc);
}

fn unary(op: fn(&Runtime, Value) -> Result<Value, Signal>) -> NativeBody {
    Rc::new(move |rt, args| {
        let value = rt.car(args).unwrap_or_else(|| rt.nil());
        op(rt, value)
    })
}

fn kind_predicate(rt: &Runtime, kind: Kind) {
    let Some(name) = kind.predicate() else {
        return;
    };
    let doc = format!("({name} obj) returns #t if obj is a {}", kind.name());
    let body: NativeBody = Rc::new(move |rt, args| {
        let value = rt.car(args).unwrap_or_else(|| rt.nil());
        let matches = match kind {
            Kind::Real => rt.is_real(value),
            kind => rt.type_of(value) == kind,
        };
        Ok(rt.make_boolean(matches))
    });
    define(rt, name, Arity::fixed(1), &doc, body);
}

pub(crate) fn install(rt: &Runtime) {
    for op in [Arith::Add, Arith::Sub, Arith::Mul, Arith::Div] {
        let arity = match op {
            Arith::Add | Arith::Mul => Arity::variadic(0),
            Arith::Sub | Arith::Div => Arity::variadic(1),
        };
        define(
            rt,
            op.name(),
            arity,
            "numeric fold over the arguments",
            Rc::new(move |rt, args| arithmetic(rt, op, args)),
        );
    }

    define(rt, "length", Arity::fixed(1), "(length obj) returns obj's length", Rc::new(length));
    define(
        rt,
        "equal?",
        Arity::fixed(2),
        "(equal? a b) compares structurally",
        Rc::new(|rt, args| {
            let items = rt.list_to_vec(args);
            Ok(rt.make_boolean(rt.is_equal(items[0], items[1])?))
        }),
    );
    define(
        rt,
        "equivalent?",
        Arity::fixed(2),
        "(equivalent? a b) compares structurally, numbers by approximate value",
        Rc::new(|rt, args| {
            let items = rt.list_to_vec(args);
            Ok(rt.make_boolean(rt.is_equivalent(items[0], items[1])?))
        }),
    );
    define(rt, "copy", Arity::fixed(1), "(copy obj) returns a shallow copy of obj", unary(Runtime::copy));
    define(
        rt,
        "reverse",
        Arity::fixed(1),
        "(reverse seq) returns seq's elements in reverse order",
        unary(Runtime::reverse),
    );
    define(
        rt,
        "object->list",
        Arity::fixed(1),
        "(object->list obj) returns obj's elements as a list",
        unary(Runtime::to_list),
    );
    define(
        rt,
        "fill!",
        Arity::fixed(2),
        "(fill! seq value) stores value in every element of seq",
        Rc::new(|rt, args| {
            let items = rt.list_to_vec(args);
            rt.fill(items[0], items[1])
        }),
    );
    define(
        rt,
        "macroexpand",
        Arity::fixed(1),
        "(macroexpand form) expands a macro call once",
        unary(Runtime::macroexpand),
    );
    define(rt, "list", Arity::variadic(0), "(list ...) returns its arguments", Rc::new(|_, args| Ok(args)));
    define(
        rt,
        "object->string",
        Arity::fixed(1),
        "(object->string obj) renders obj",
        Rc::new(|rt, args| {
            let value = rt.car(args).unwrap_or_else(|| rt.nil());
            Ok(rt.make_string(&rt.object_to_string(value)))
        }),
    );
    define(
        rt,
        "object-set!",
        Arity::variadic(2),
        "(object-set! obj index ... value) assigns through obj's set hook",
        Rc::new(|rt, args| {
            let object = rt.car(args).unwrap_or_else(|| rt.nil());
            let rest = rt.cdr(args).unwrap_or_else(|| rt.nil());
            rt.c_object_set(object, rest)
        }),
    );
    define(
        rt,
        "gc",
        Arity::fixed(0),
        "(gc) runs the collector",
        Rc::new(|rt, _| {
            rt.collect();
            Ok(rt.unspecified())
        }),
    );

    for kind in [
        Kind::Nil,
        Kind::Boolean,
        Kind::Integer,
        Kind::Real,
        Kind::Character,
        Kind::String,
        Kind::Symbol,
        Kind::Pair,
        Kind::Vector,
        Kind::IntVector,
        Kind::FloatVector,
        Kind::ByteVector,
        Kind::Let,
        Kind::Procedure,
        Kind::CObject,
    ] {
        kind_predicate(rt, kind);
    }
}
