//! Marshalling errors and their translation into runtime conditions.
//!
//! Binding code reports failures as [`BindError`] values and propagates them
//! with `?`. Only the native entry point that the runtime calls
//! (see [`crate::adapter`]) turns an error into a [`Signal`], so host frames
//! beneath it unwind normally.

use schemebind_runtime::{Runtime, Signal, Value, signal};
use thiserror::Error;

/// Result type for binding operations.
pub type BindResult<T> = Result<T, BindError>;

/// Condition kind raised when no overload accepts an argument list.
pub const NO_OVERLOAD_MATCH: &str = "no-overload-match";
/// Condition kind raised for an opaque type that was never registered.
pub const MISSING_TYPE_REGISTRATION: &str = "missing-type-registration";

/// Errors raised while marshalling values across the boundary.
///
/// Positions are 1-based; position 0 means the failing value was not a
/// positional argument (a direct `to` call, for instance).
#[derive(Debug, Clone, Error)]
pub enum BindError {
    /// A value of the wrong kind
    #[error("{caller}: argument {position} is {actual}, but should be {expected}")]
    WrongType {
        arg: Value,
        actual: String,
        position: usize,
        expected: String,
        caller: String,
    },

    /// A value of the right kind outside the accepted range
    #[error("{caller}: argument {position} is out of range (expected {expected})")]
    OutOfRange {
        arg: Value,
        position: usize,
        expected: String,
        caller: String,
    },

    /// An argument count no candidate accepts
    #[error("{caller}: wrong number of args ({count})")]
    WrongArgsNumber {
        args: Value,
        count: usize,
        caller: String,
    },

    /// No overload accepted the argument list
    #[error(
        "{caller}: arglist ({}) doesn't match any signature; valid signatures: {}",
        .actual_types.join(" "),
        .candidates.join(", ")
    )]
    NoOverloadMatch {
        args: Value,
        actual_types: Vec<String>,
        candidates: Vec<String>,
        caller: String,
    },

    /// An opaque type used before `make_usertype` registered it
    #[error("type {type_name} was never registered with this runtime")]
    MissingTypeRegistration { type_name: &'static str },

    /// A host-defined condition
    #[error("{kind}: {message}")]
    Custom {
        kind: String,
        message: String,
        info: Vec<Value>,
    },

    /// A condition raised by the runtime during a call back into it
    #[error(transparent)]
    Signal(#[from] Signal),
}

impl BindError {
    /// A `WrongType` error for `arg`, without position or caller yet.
    pub fn wrong_type(rt: &Runtime, arg: Value, expected: impl Into<String>) -> Self {
        BindError::WrongType {
            arg,
            actual: describe(rt, arg),
            position: 0,
            expected: expected.into(),
            caller: String::new(),
        }
    }

    /// An `OutOfRange` error for `arg`, without position or caller yet.
    pub fn out_of_range(arg: Value, expected: impl Into<String>) -> Self {
        BindError::OutOfRange {
            arg,
            position: 0,
            expected: expected.into(),
            caller: String::new(),
        }
    }

    /// A host-defined condition of `kind`.
    pub fn custom(kind: impl Into<String>, message: impl Into<String>) -> Self {
        BindError::Custom {
            kind: kind.into(),
            message: message.into(),
            info: Vec::new(),
        }
    }

    /// Sets the argument position if it is still unknown.
    pub fn at(mut self, at: usize) -> Self {
        if let BindError::WrongType { position, .. } | BindError::OutOfRange { position, .. } =
            &mut self
            && *position == 0
        {
            *position = at;
        }
        self
    }

    /// Sets the caller name if it is still unknown.
    pub fn with_caller(mut self, name: &str) -> Self {
        match &mut self {
            BindError::WrongType { caller, .. }
            | BindError::OutOfRange { caller, .. }
            | BindError::WrongArgsNumber { caller, .. }
            | BindError::NoOverloadMatch { caller, .. }
                if caller.is_empty() =>
            {
                *caller = name.to_string();
            }
            _ => {}
        }
        self
    }

    /// The symbolic condition kind this error is signalled as.
    pub fn kind(&self) -> &str {
        match self {
            BindError::WrongType { .. } => signal::WRONG_TYPE_ARG,
            BindError::OutOfRange { .. } => signal::OUT_OF_RANGE,
            BindError::WrongArgsNumber { .. } => signal::WRONG_NUMBER_OF_ARGS,
            BindError::NoOverloadMatch { .. } => NO_OVERLOAD_MATCH,
            BindError::MissingTypeRegistration { .. } => MISSING_TYPE_REGISTRATION,
            BindError::Custom { kind, .. } => kind,
            BindError::Signal(signal) => &signal.kind,
        }
    }

    /// Translates the error into the runtime's condition.
    ///
    /// `info` layouts:
    /// - `WrongType`/`OutOfRange`: `(caller position arg expected)`
    /// - `WrongArgsNumber`: `(caller args)`
    /// - `NoOverloadMatch`: `(message (type ...) signature ...)`
    /// - `MissingTypeRegistration`: `(type-name)`
    /// - `Custom`: the host-supplied values
    pub fn into_signal(self, rt: &Runtime) -> Signal {
        let message = self.to_string();
        match self {
            BindError::WrongType {
                arg,
                position,
                expected,
                caller,
                ..
            } => rt.wrong_type_arg_error(&caller, position, arg, &expected),
            BindError::OutOfRange {
                arg,
                position,
                expected,
                caller,
            } => rt.out_of_range_error(&caller, position, arg, &expected),
            BindError::WrongArgsNumber { args, caller, .. } => {
                rt.wrong_number_of_args_error(&caller, args)
            }
            BindError::NoOverloadMatch {
                actual_types,
                candidates,
                ..
            } => {
                let types: Vec<Value> = actual_types.iter().map(|t| rt.make_symbol(t)).collect();
                let mut info = vec![rt.make_string(&message), rt.list(&types)];
                info.extend(candidates.iter().map(|sig| rt.make_string(sig)));
                let info = rt.list(&info);
                rt.error_with_message(NO_OVERLOAD_MATCH, message, info)
            }
            BindError::MissingTypeRegistration { type_name } => {
                let info = rt.list(&[rt.make_string(type_name)]);
                rt.error_with_message(MISSING_TYPE_REGISTRATION, message, info)
            }
            BindError::Custom { kind, message, info } => {
                let info = rt.list(&info);
                rt.error_with_message(&kind, message, info)
            }
            BindError::Signal(signal) => signal,
        }
    }
}

/// "an integer", "a string", or the registered name of an opaque type.
pub(crate) fn describe(rt: &Runtime, value: Value) -> String {
    match rt.c_object_type(value).and_then(|tag| rt.c_type_name(tag)) {
        Some(name) => name.to_string(),
        None => rt.type_of(value).name().to_string(),
    }
}
