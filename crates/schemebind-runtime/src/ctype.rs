//! Opaque object types and their hook tables.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::gc::Marker;
use crate::runtime::Runtime;
use crate::signal::Signal;
use crate::value::Value;

/// Identifier of an opaque object type, unique within one runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(pub(crate) u32);

impl TypeTag {
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c-type#{}", self.0)
    }
}

pub type MarkHook = Rc<dyn Fn(&dyn Any, &mut Marker)>;
pub type FreeHook = Rc<dyn Fn(Box<dyn Any>)>;
pub type EqualHook = Rc<dyn Fn(&Runtime, Value, Value) -> Result<bool, Signal>>;
pub type LengthHook = Rc<dyn Fn(&Runtime, Value) -> Result<Value, Signal>>;
/// Receives the object and the argument list of the access.
pub type RefHook = Rc<dyn Fn(&Runtime, Value, Value) -> Result<Value, Signal>>;
pub type SetHook = Rc<dyn Fn(&Runtime, Value, Value) -> Result<Value, Signal>>;
pub type ToStringHook = Rc<dyn Fn(&Runtime, Value) -> Result<String, Signal>>;
/// Produces a new object from the given one: `copy`, `reverse`, `object->list`.
pub type TransformHook = Rc<dyn Fn(&Runtime, Value) -> Result<Value, Signal>>;
/// Receives the object and the fill value.
pub type FillHook = Rc<dyn Fn(&Runtime, Value, Value) -> Result<Value, Signal>>;

/// One entry of a c-type's hook table.
#[derive(Clone)]
pub enum Hook {
    GcMark(MarkHook),
    GcFree(FreeHook),
    Equal(EqualHook),
    Equivalent(EqualHook),
    Copy(TransformHook),
    Fill(FillHook),
    Reverse(TransformHook),
    Length(LengthHook),
    Ref(RefHook),
    Set(SetHook),
    ToString(ToStringHook),
    ToList(TransformHook),
}

impl Hook {
    pub fn name(&self) -> &'static str {
        match self {
            Hook::GcMark(_) => "gc-mark",
            Hook::GcFree(_) => "gc-free",
            Hook::Equal(_) => "equal",
            Hook::Equivalent(_) => "equivalent",
            Hook::Copy(_) => "copy",
            Hook::Fill(_) => "fill",
            Hook::Reverse(_) => "reverse",
            Hook::Length(_) => "length",
            Hook::Ref(_) => "ref",
            Hook::Set(_) => "set",
            Hook::ToString(_) => "to-string",
            Hook::ToList(_) => "to-list",
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub gc_mark: Option<MarkHook>,
    pub gc_free: Option<FreeHook>,
    pub equal: Option<EqualHook>,
    pub equivalent: Option<EqualHook>,
    pub copy: Option<TransformHook>,
    pub fill: Option<FillHook>,
    pub reverse: Option<TransformHook>,
    pub length: Option<LengthHook>,
    pub reference: Option<RefHook>,
    pub set: Option<SetHook>,
    pub to_string: Option<ToStringHook>,
    pub to_list: Option<TransformHook>,
}

impl Hooks {
    pub(crate) fn install(&mut self, hook: Hook) {
        match hook {
            Hook::GcMark(f) => self.gc_mark = Some(f),
            Hook::GcFree(f) => self.gc_free = Some(f),
            Hook::Equal(f) => self.equal = Some(f),
            Hook::Equivalent(f) => self.equivalent = Some(f),
            Hook::Copy(f) => self.copy = Some(f),
            Hook::Fill(f) => self.fill = Some(f),
            Hook::Reverse(f) => self.reverse = Some(f),
            Hook::Length(f) => self.length = Some(f),
            Hook::Ref(f) => self.reference = Some(f),
            Hook::Set(f) => self.set = Some(f),
            Hook::ToString(f) => self.to_string = Some(f),
            Hook::ToList(f) => self.to_list = Some(f),
        }
    }
}

pub(crate) struct CType {
    pub name: Rc<str>,
    pub hooks: Hooks,
}

/// Table of registered c-types, indexed by tag.
#[derive(Default)]
pub(crate) struct CTypeTable {
    types: Vec<CType>,
}

impl CTypeTable {
    pub(crate) fn register(&mut self, name: &str) -> TypeTag {
        let tag = TypeTag(self.types.len() as u32);
        self.types.push(CType {
            name: name.into(),
            hooks: Hooks::default(),
        });
        tag
    }

    pub(crate) fn get(&self, tag: TypeTag) -> Option<&CType> {
        self.types.get(tag.0 as usize)
    }

    pub(crate) fn get_mut(&mut self, tag: TypeTag) -> Option<&mut CType> {
        self.types.get_mut(tag.0 as usize)
    }

    pub(crate) fn hooks(&self, tag: TypeTag) -> Hooks {
        self.get(tag).map(|ty| ty.hooks.clone()).unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.types.len()
    }
}

impl fmt::Debug for CTypeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.types.iter().map(|ty| &*ty.name))
            .finish()
    }
}
