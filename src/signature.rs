//! Declared types of bound functions.
//!
//! A [`Signature`] is captured once when a host function is bound. The
//! adapter uses it for arity, the overload resolver for diagnostics, and the
//! runtime receives it as a `(ret-pred arg-pred ...)` list for
//! introspection.

use std::any::{TypeId, type_name};
use std::fmt::Write;

use schemebind_runtime::{Arity, Kind, Runtime, Value};

use crate::registry::BindState;

/// Description of one declared parameter or return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDesc {
    /// Accepts every value.
    Any,
    /// No value (a function returning `()`).
    Unspecified,
    /// Multiple values.
    Values,
    Kind(Kind),
    Opaque {
        type_id: TypeId,
        rust_name: &'static str,
    },
}

impl TypeDesc {
    pub fn opaque<T: 'static>() -> Self {
        TypeDesc::Opaque {
            type_id: TypeId::of::<T>(),
            rust_name: type_name::<T>(),
        }
    }

    /// Descriptive name: the kind name, or an opaque type's registered name.
    pub fn name(&self, rt: &Runtime) -> String {
        match self {
            TypeDesc::Any => "any".into(),
            TypeDesc::Unspecified => "unspecified".into(),
            TypeDesc::Values => "values".into(),
            TypeDesc::Kind(kind) => kind.name().into(),
            TypeDesc::Opaque { type_id, rust_name } => BindState::of(rt)
                .types
                .borrow()
                .get_by_id(*type_id)
                .map(|entry| entry.name.clone())
                .unwrap_or_else(|| (*rust_name).into()),
        }
    }

    /// The predicate symbol used in runtime signatures; `#t` accepts anything.
    pub fn predicate(&self, rt: &Runtime) -> Value {
        match self {
            TypeDesc::Any | TypeDesc::Unspecified => rt.t(),
            TypeDesc::Values => rt.make_symbol("values"),
            TypeDesc::Kind(kind) => match kind.predicate() {
                Some(name) => rt.make_symbol(name),
                None => rt.t(),
            },
            TypeDesc::Opaque { .. } => rt.make_symbol(&format!("{}?", self.name(rt))),
        }
    }
}

/// Declared parameter, tail and return types of a bound function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<TypeDesc>,
    /// Element type of a variadic tail.
    pub rest: Option<TypeDesc>,
    pub ret: TypeDesc,
}

impl Signature {
    pub fn fixed(params: Vec<TypeDesc>, ret: TypeDesc) -> Self {
        Self {
            params,
            rest: None,
            ret,
        }
    }

    pub fn variadic(params: Vec<TypeDesc>, rest: TypeDesc, ret: TypeDesc) -> Self {
        Self {
            params,
            rest: Some(rest),
            ret,
        }
    }

    pub fn arity(&self) -> Arity {
        match self.rest {
            Some(_) => Arity::variadic(self.params.len()),
            None => Arity::fixed(self.params.len()),
        }
    }

    pub fn is_variadic(&self) -> bool {
        self.rest.is_some()
    }

    /// `(ret-pred arg-pred ... [tail-pred])`.
    pub fn to_value(&self, rt: &Runtime) -> Value {
        let mut items = Vec::with_capacity(self.params.len() + 2);
        items.push(self.ret.predicate(rt));
        items.extend(self.params.iter().map(|p| p.predicate(rt)));
        if let Some(rest) = &self.rest {
            items.push(rest.predicate(rt));
        }
        rt.list(&items)
    }

    /// `(integer string ...) -> boolean`
    pub fn render(&self, rt: &Runtime) -> String {
        let mut out = String::from("(");
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&param.name(rt));
        }
        if let Some(rest) = &self.rest {
            if !self.params.is_empty() {
                out.push(' ');
            }
            let _ = write!(out, "{} ...", rest.name(rt));
        }
        let _ = write!(out, ") -> {}", self.ret.name(rt));
        out
    }
}
