//! Bindings between Rust host code and an embedded Scheme runtime.
//!
//! Host values, functions and opaque types are declared once, under string
//! names, and then cross the boundary in both directions:
//!
//! - [`FromValue`]/[`IntoValue`] convert primitives, vectors, handles and
//!   registered [`UserType`]s
//! - [`Adapter`] wraps a typed Rust callable into a runtime procedure that
//!   checks and converts its arguments before the callable runs
//! - [`Overload`] groups several callables under one name, resolved
//!   first-match in declaration order
//! - [`UserTypeBuilder`] registers an opaque type with collector hooks,
//!   operator methods and per-type behaviour ([`TypeOp`]) such as
//!   equality, copying, length and indexing
//! - star functions take named, defaulted parameters ([`StarParams`]) and
//!   macros receive their operands unevaluated
//! - [`BindError`] carries marshalling failures until the outermost native
//!   entry point turns them into runtime conditions
//!
//! All binding state lives in the runtime instance it describes.
//!
//! # Example
//!
//! ```
//! use schemebind::prelude::*;
//!
//! # fn main() -> BindResult<()> {
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct Vec2 { x: f64, y: f64 }
//! impl UserType for Vec2 {}
//!
//! let scheme = Scheme::new();
//! scheme
//!     .make_usertype::<Vec2>("vec2")
//!     .constructor(Overload::new().with(|x: f64, y: f64| Vec2 { x, y }))
//!     .operator(MethodOp::Add, |a: Vec2, b: Vec2| Vec2 { x: a.x + b.x, y: a.y + b.y })
//!     .equality()
//!     .build()?;
//!
//! let a = scheme.call("make-vec2", (1.0, 2.0))?;
//! let sum: Vec2 = scheme.call_as("+", (a, a))?;
//! assert_eq!(sum, Vec2 { x: 2.0, y: 4.0 });
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod convert;
pub mod error;
pub mod handles;
pub mod ops;
pub mod overload;
pub mod registry;
pub mod scheme;
pub mod signature;
pub mod star;
pub mod type_ops;
pub mod user_data;
pub mod usertype;
pub mod value_key;
pub mod varargs;

pub use adapter::{Adapter, HostFn};
pub use config::{BindConfig, FunctionOpts};
pub use convert::{FromValue, IntoValue};
pub use error::{BindError, BindResult};
pub use handles::{Function, IntoArgs, Let, List, Values, Variable};
pub use ops::MethodOp;
pub use overload::{Overload, OverloadSet};
pub use registry::{BindState, TypeEntry, TypeRegistry, get_tag};
pub use scheme::Scheme;
pub use signature::{Signature, TypeDesc};
pub use star::StarParams;
pub use type_ops::{Op, TypeOp};
pub use user_data::{Obj, UserType};
pub use usertype::UserTypeBuilder;
pub use value_key::ValueKey;
pub use varargs::VarArgs;

pub use schemebind_runtime as runtime;
pub use schemebind_runtime::{Kind, Runtime, Signal, TypeTag, Value};

/// The types most embedding code needs.
pub mod prelude {
    pub use crate::{
        BindConfig, BindError, BindResult, FromValue, Function, FunctionOpts, IntoValue, Let,
        List, MethodOp, Obj, Op, Overload, Scheme, TypeOp, UserType, Value, VarArgs,
    };
}
