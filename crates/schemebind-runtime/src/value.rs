//! Runtime value handles and the closed set of value kinds.

use std::fmt;

/// Handle to a cell in the runtime heap.
///
/// Values are plain copyable handles. The collector owns the cell they point
/// to; a handle whose cell was swept goes stale and every accessor treats it
/// as a dead value. The generation counter makes stale handles detectable
/// after the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Value {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Raw heap index, useful only for diagnostics.
    pub fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({}#{})", self.index, self.generation)
    }
}

/// The kind of a runtime value.
///
/// This is the closed set of primitive kinds. Opaque host objects all share
/// [`Kind::CObject`] and are told apart by their type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Nil,
    Unspecified,
    Undefined,
    Eof,
    Boolean,
    Integer,
    Real,
    Character,
    String,
    Symbol,
    Pair,
    Vector,
    IntVector,
    FloatVector,
    ByteVector,
    Let,
    Procedure,
    CObject,
    Values,
    /// A handle whose cell has been collected.
    Free,
}

impl Kind {
    /// Descriptive name used in diagnostics and error conditions.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Nil => "null",
            Kind::Unspecified => "unspecified",
            Kind::Undefined => "undefined",
            Kind::Eof => "eof",
            Kind::Boolean => "boolean",
            Kind::Integer => "integer",
            Kind::Real => "real",
            Kind::Character => "character",
            Kind::String => "string",
            Kind::Symbol => "symbol",
            Kind::Pair => "list",
            Kind::Vector => "vector",
            Kind::IntVector => "int-vector",
            Kind::FloatVector => "float-vector",
            Kind::ByteVector => "byte-vector",
            Kind::Let => "let",
            Kind::Procedure => "procedure",
            Kind::CObject => "c-object",
            Kind::Values => "values",
            Kind::Free => "free-cell",
        }
    }

    /// Name of the builtin predicate that recognises this kind, if any.
    pub fn predicate(self) -> Option<&'static str> {
        Some(match self {
            Kind::Nil => "null?",
            Kind::Boolean => "boolean?",
            Kind::Integer => "integer?",
            Kind::Real => "real?",
            Kind::Character => "char?",
            Kind::String => "string?",
            Kind::Symbol => "symbol?",
            Kind::Pair => "pair?",
            Kind::Vector => "vector?",
            Kind::IntVector => "int-vector?",
            Kind::FloatVector => "float-vector?",
            Kind::ByteVector => "byte-vector?",
            Kind::Let => "let?",
            Kind::Procedure => "procedure?",
            Kind::CObject => "c-object?",
            Kind::Unspecified | Kind::Undefined | Kind::Eof | Kind::Values | Kind::Free => {
                return None;
            }
        })
    }

    pub fn is_number(self) -> bool {
        matches!(self, Kind::Integer | Kind::Real)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
