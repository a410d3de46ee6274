//! Runtime conditions.

use thiserror::Error;

use crate::value::Value;

/// A signalled condition travelling up to the nearest handler.
///
/// `kind` is the condition's symbolic kind (`wrong-type-arg`,
/// `out-of-range`, ...). `info` is a runtime list of contextual values whose
/// layout depends on the kind. `message` is rendered when the condition is
/// raised so it can be displayed without a runtime at hand.
///
/// `info` is an ordinary runtime value: a host that keeps a signal across a
/// collection must protect it.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct Signal {
    pub kind: String,
    pub message: String,
    pub info: Value,
}

impl Signal {
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// Condition kind for a value of the wrong kind.
pub const WRONG_TYPE_ARG: &str = "wrong-type-arg";
/// Condition kind for a value of the right kind but outside the accepted range.
pub const OUT_OF_RANGE: &str = "out-of-range";
/// Condition kind for a call with an unacceptable argument count.
pub const WRONG_NUMBER_OF_ARGS: &str = "wrong-number-of-args";
pub const DIVISION_BY_ZERO: &str = "division-by-zero";
pub const UNBOUND_VARIABLE: &str = "unbound-variable";
pub const IMMUTABLE_ERROR: &str = "immutable-error";
pub const SYNTAX_ERROR: &str = "syntax-error";
