//! Heap cell payloads.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ctype::TypeTag;
use crate::runtime::Runtime;
use crate::signal::Signal;
use crate::value::{Kind, Value};

/// Body of a native procedure: receives the runtime and the argument list.
pub type NativeBody = Rc<dyn Fn(&Runtime, Value) -> Result<Value, Signal>>;

/// Payload stored in one heap cell.
pub(crate) enum Object {
    Nil,
    Unspecified,
    Undefined,
    Eof,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Character(char),
    String(Rc<str>),
    Symbol(Rc<str>),
    Pair(Value, Value),
    Vector(Vec<Value>),
    IntVector(Vec<i64>),
    FloatVector(Vec<f64>),
    ByteVector(Vec<u8>),
    Let(LetData),
    Procedure(Procedure),
    CObject(CObject),
    Values(Vec<Value>),
}

impl Object {
    pub(crate) fn kind(&self) -> Kind {
        match self {
            Object::Nil => Kind::Nil,
            Object::Unspecified => Kind::Unspecified,
            Object::Undefined => Kind::Undefined,
            Object::Eof => Kind::Eof,
            Object::Boolean(_) => Kind::Boolean,
            Object::Integer(_) => Kind::Integer,
            Object::Real(_) => Kind::Real,
            Object::Character(_) => Kind::Character,
            Object::String(_) => Kind::String,
            Object::Symbol(_) => Kind::Symbol,
            Object::Pair(..) => Kind::Pair,
            Object::Vector(_) => Kind::Vector,
            Object::IntVector(_) => Kind::IntVector,
            Object::FloatVector(_) => Kind::FloatVector,
            Object::ByteVector(_) => Kind::ByteVector,
            Object::Let(_) => Kind::Let,
            Object::Procedure(_) => Kind::Procedure,
            Object::CObject(_) => Kind::CObject,
            Object::Values(_) => Kind::Values,
        }
    }

    /// Pushes every value this cell references onto `out`.
    pub(crate) fn children(&self, out: &mut Vec<Value>) {
        match self {
            Object::Pair(car, cdr) => {
                out.push(*car);
                out.push(*cdr);
            }
            Object::Vector(items) | Object::Values(items) => out.extend_from_slice(items),
            Object::Let(env) => {
                out.extend(env.order.iter().copied());
                out.extend(env.vars.values().copied());
                out.extend(env.outer);
            }
            Object::Procedure(proc) => {
                out.extend(proc.signature);
                out.extend(proc.setter);
            }
            Object::CObject(obj) => out.push(obj.env),
            _ => {}
        }
    }
}

// ============================================================================
// Environments
// ============================================================================

/// An environment: symbol bindings plus an optional outer environment.
#[derive(Default)]
pub(crate) struct LetData {
    pub vars: FxHashMap<Value, Value>,
    /// Symbols in definition order, for `let_to_list`.
    pub order: Vec<Value>,
    pub immutable: FxHashSet<Value>,
    pub outer: Option<Value>,
    /// Open environments take part in method lookup.
    pub open: bool,
}

impl LetData {
    pub(crate) fn with_outer(outer: Option<Value>) -> Self {
        Self {
            outer,
            ..Self::default()
        }
    }

    pub(crate) fn insert(&mut self, sym: Value, value: Value) {
        if self.vars.insert(sym, value).is_none() {
            self.order.push(sym);
        }
    }
}

// ============================================================================
// Procedures
// ============================================================================

/// Declared arity of a procedure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Arity {
    pub required: usize,
    pub optional: usize,
    pub rest: bool,
}

impl Arity {
    pub const fn fixed(n: usize) -> Self {
        Self {
            required: n,
            optional: 0,
            rest: false,
        }
    }

    pub const fn variadic(required: usize) -> Self {
        Self {
            required,
            optional: 0,
            rest: true,
        }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        Self {
            required: min,
            optional: max.saturating_sub(min),
            rest: false,
        }
    }

    pub fn max(&self) -> Option<usize> {
        if self.rest {
            None
        } else {
            Some(self.required + self.optional)
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.required && self.max().is_none_or(|max| count <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max() {
            None => write!(f, "at least {}", self.required),
            Some(max) if max == self.required => write!(f, "{max}"),
            Some(max) => write!(f, "{}..={max}", self.required),
        }
    }
}

bitflags! {
    /// Evaluator hints attached to a native procedure.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FunctionFlags: u8 {
        /// The body may call back into the evaluator.
        const UNSAFE_BODY = 1 << 0;
        /// The body may retain its argument list.
        const UNSAFE_ARGLIST = 1 << 1;
        /// The procedure was produced by a typed binding.
        const TYPED = 1 << 2;
        /// The body receives its arguments unevaluated and returns a new form.
        const MACRO = 1 << 3;
    }
}

#[derive(Clone)]
pub(crate) struct Procedure {
    pub name: Rc<str>,
    pub doc: Rc<str>,
    pub arity: Arity,
    pub flags: FunctionFlags,
    pub signature: Option<Value>,
    pub setter: Option<Value>,
    pub body: NativeBody,
}

// ============================================================================
// Opaque objects
// ============================================================================

pub(crate) struct CObject {
    pub tag: TypeTag,
    /// Taken out when the object is swept, so the free hook can own it.
    pub value: Option<Box<dyn Any>>,
    pub env: Value,
}
