//! Embedded runtime substrate for the binding layer.
//!
//! A small single-threaded interpreter core: a generational heap of tagged
//! cells collected by mark-and-sweep, interned symbols, environments, native
//! procedures and opaque host objects ("c-objects") whose behaviour is
//! described by a per-type hook table. There is no reader or evaluator;
//! procedures are invoked through [`Runtime::apply`].
//!
//! # Example
//!
//! ```
//! use schemebind_runtime::Runtime;
//!
//! let rt = Runtime::new();
//! let sum = rt
//!     .call_by_name("+", &[rt.make_integer(1), rt.make_integer(2)])
//!     .unwrap();
//! assert_eq!(rt.integer(sum), Some(3));
//! ```

mod builtins;
mod call;
pub mod ctype;
mod env;
mod equality;
pub mod gc;
mod heap;
mod object;
mod printer;
mod runtime;
mod sequence;
pub mod signal;
mod value;

pub use call::FunctionSpec;
pub use ctype::{Hook, TypeTag};
pub use gc::{GcStats, Marker, ProtectId, Rooted};
pub use object::{Arity, FunctionFlags, NativeBody};
pub use runtime::Runtime;
pub use signal::Signal;
pub use value::{Kind, Value};
