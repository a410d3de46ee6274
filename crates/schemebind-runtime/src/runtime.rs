//! The runtime instance: heap, symbol table, c-types and value primitives.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::builtins;
use crate::ctype::{CTypeTable, Hook, TypeTag};
use crate::gc::{GcStats, ProtectTable};
use crate::heap::Heap;
use crate::object::{CObject, LetData, Object};
use crate::signal::{Signal, WRONG_TYPE_ARG};
use crate::value::{Kind, Value};

#[derive(Clone, Copy)]
pub(crate) struct Constants {
    nil: Value,
    t: Value,
    f: Value,
    unspecified: Value,
    undefined: Value,
    eof: Value,
}

impl Constants {
    pub(crate) fn all(&self) -> [Value; 6] {
        [
            self.nil,
            self.t,
            self.f,
            self.unspecified,
            self.undefined,
            self.eof,
        ]
    }
}

/// One embedded interpreter session.
///
/// All operations take `&self`: native procedures receive the runtime by
/// shared reference and may call back into it. Internal borrows are never
/// held across a call into host code.
///
/// The runtime is single-threaded (`!Send`, `!Sync`).
pub struct Runtime {
    pub(crate) heap: RefCell<Heap>,
    pub(crate) symbols: RefCell<FxHashMap<Rc<str>, Value>>,
    pub(crate) ctypes: RefCell<CTypeTable>,
    pub(crate) protected: RefCell<ProtectTable>,
    pub(crate) frames: RefCell<Vec<Value>>,
    pub(crate) docs: RefCell<FxHashMap<Value, Rc<str>>>,
    pub(crate) gc_stats: Cell<GcStats>,
    pub(crate) constants: Constants,
    pub(crate) rootlet: Value,
    app_data: RefCell<FxHashMap<TypeId, Rc<dyn Any>>>,
}

impl Runtime {
    /// Creates a runtime with the builtin procedures defined.
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let constants = Constants {
            nil: heap.alloc(Object::Nil),
            t: heap.alloc(Object::Boolean(true)),
            f: heap.alloc(Object::Boolean(false)),
            unspecified: heap.alloc(Object::Unspecified),
            undefined: heap.alloc(Object::Undefined),
            eof: heap.alloc(Object::Eof),
        };
        let rootlet = heap.alloc(Object::Let(LetData::default()));

        let rt = Self {
            heap: RefCell::new(heap),
            symbols: RefCell::default(),
            ctypes: RefCell::default(),
            protected: RefCell::default(),
            frames: RefCell::default(),
            docs: RefCell::default(),
            gc_stats: Cell::default(),
            constants,
            rootlet,
            app_data: RefCell::default(),
        };
        builtins::install(&rt);
        rt
    }

    // ========================================================================
    // Constants
    // ========================================================================

    pub fn nil(&self) -> Value {
        self.constants.nil
    }

    pub fn t(&self) -> Value {
        self.constants.t
    }

    pub fn f(&self) -> Value {
        self.constants.f
    }

    pub fn unspecified(&self) -> Value {
        self.constants.unspecified
    }

    pub fn undefined(&self) -> Value {
        self.constants.undefined
    }

    pub fn eof(&self) -> Value {
        self.constants.eof
    }

    /// The process-wide root environment of this instance.
    pub fn rootlet(&self) -> Value {
        self.rootlet
    }

    // ========================================================================
    // Heap access
    // ========================================================================

    pub(crate) fn alloc(&self, object: Object) -> Value {
        self.heap.borrow_mut().alloc(object)
    }

    /// Runs `f` on the cell behind `value`. `f` must not call back into the
    /// runtime.
    pub(crate) fn with_object<R>(&self, value: Value, f: impl FnOnce(&Object) -> R) -> Option<R> {
        self.heap.borrow().get(value).map(f)
    }

    pub(crate) fn with_object_mut<R>(
        &self,
        value: Value,
        f: impl FnOnce(&mut Object) -> R,
    ) -> Option<R> {
        self.heap.borrow_mut().get_mut(value).map(f)
    }

    pub fn type_of(&self, value: Value) -> Kind {
        self.with_object(value, Object::kind).unwrap_or(Kind::Free)
    }

    // ========================================================================
    // Construction
    // ========================================================================

    pub fn make_boolean(&self, b: bool) -> Value {
        if b { self.t() } else { self.f() }
    }

    pub fn make_integer(&self, n: i64) -> Value {
        self.alloc(Object::Integer(n))
    }

    pub fn make_real(&self, x: f64) -> Value {
        self.alloc(Object::Real(x))
    }

    pub fn make_character(&self, c: char) -> Value {
        self.alloc(Object::Character(c))
    }

    pub fn make_string(&self, s: &str) -> Value {
        self.alloc(Object::String(s.into()))
    }

    /// Interns `name`, returning the same symbol for equal names.
    pub fn make_symbol(&self, name: &str) -> Value {
        if let Some(sym) = self.symbols.borrow().get(name) {
            return *sym;
        }
        let name: Rc<str> = name.into();
        let sym = self.alloc(Object::Symbol(name.clone()));
        self.symbols.borrow_mut().insert(name, sym);
        sym
    }

    pub fn cons(&self, car: Value, cdr: Value) -> Value {
        self.alloc(Object::Pair(car, cdr))
    }

    /// Builds a proper list from `items`.
    pub fn list(&self, items: &[Value]) -> Value {
        items
            .iter()
            .rev()
            .fold(self.nil(), |tail, item| self.cons(*item, tail))
    }

    pub fn make_vector(&self, items: Vec<Value>) -> Value {
        self.alloc(Object::Vector(items))
    }

    pub fn make_int_vector(&self, items: Vec<i64>) -> Value {
        self.alloc(Object::IntVector(items))
    }

    pub fn make_float_vector(&self, items: Vec<f64>) -> Value {
        self.alloc(Object::FloatVector(items))
    }

    pub fn make_byte_vector(&self, items: Vec<u8>) -> Value {
        self.alloc(Object::ByteVector(items))
    }

    /// Multiple return values.
    pub fn make_values(&self, items: Vec<Value>) -> Value {
        self.alloc(Object::Values(items))
    }

    /// Boxes `payload` as an instance of the c-type `tag`.
    ///
    /// The new object's environment is nil until
    /// [`Runtime::c_object_set_let`] attaches one.
    pub fn make_c_object(&self, tag: TypeTag, payload: Box<dyn Any>) -> Value {
        self.alloc(Object::CObject(CObject {
            tag,
            value: Some(payload),
            env: self.nil(),
        }))
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    pub fn is_null(&self, value: Value) -> bool {
        value == self.nil()
    }

    pub fn is_boolean(&self, value: Value) -> bool {
        self.type_of(value) == Kind::Boolean
    }

    pub fn is_integer(&self, value: Value) -> bool {
        self.type_of(value) == Kind::Integer
    }

    /// True for reals and integers.
    pub fn is_real(&self, value: Value) -> bool {
        self.type_of(value).is_number()
    }

    pub fn is_character(&self, value: Value) -> bool {
        self.type_of(value) == Kind::Character
    }

    pub fn is_string(&self, value: Value) -> bool {
        self.type_of(value) == Kind::String
    }

    pub fn is_symbol(&self, value: Value) -> bool {
        self.type_of(value) == Kind::Symbol
    }

    pub fn is_pair(&self, value: Value) -> bool {
        self.type_of(value) == Kind::Pair
    }

    /// True for nil and for pairs.
    pub fn is_list(&self, value: Value) -> bool {
        matches!(self.type_of(value), Kind::Nil | Kind::Pair)
    }

    pub fn is_vector(&self, value: Value) -> bool {
        self.type_of(value) == Kind::Vector
    }

    pub fn is_int_vector(&self, value: Value) -> bool {
        self.type_of(value) == Kind::IntVector
    }

    pub fn is_float_vector(&self, value: Value) -> bool {
        self.type_of(value) == Kind::FloatVector
    }

    pub fn is_byte_vector(&self, value: Value) -> bool {
        self.type_of(value) == Kind::ByteVector
    }

    pub fn is_procedure(&self, value: Value) -> bool {
        self.type_of(value) == Kind::Procedure
    }

    pub fn is_let(&self, value: Value) -> bool {
        self.type_of(value) == Kind::Let
    }

    pub fn is_c_object(&self, value: Value) -> bool {
        self.type_of(value) == Kind::CObject
    }

    pub fn is_values(&self, value: Value) -> bool {
        self.type_of(value) == Kind::Values
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Truthiness: everything except `#f` is true.
    pub fn boolean(&self, value: Value) -> bool {
        value != self.f()
    }

    pub fn integer(&self, value: Value) -> Option<i64> {
        self.with_object(value, |obj| match obj {
            Object::Integer(n) => Some(*n),
            _ => None,
        })
        .flatten()
    }

    /// Numeric value of a real or an integer.
    pub fn real(&self, value: Value) -> Option<f64> {
        self.with_object(value, |obj| match obj {
            Object::Real(x) => Some(*x),
            Object::Integer(n) => Some(*n as f64),
            _ => None,
        })
        .flatten()
    }

    pub fn character(&self, value: Value) -> Option<char> {
        self.with_object(value, |obj| match obj {
            Object::Character(c) => Some(*c),
            _ => None,
        })
        .flatten()
    }

    pub fn string(&self, value: Value) -> Option<Rc<str>> {
        self.with_object(value, |obj| match obj {
            Object::String(s) => Some(s.clone()),
            _ => None,
        })
        .flatten()
    }

    pub fn symbol_name(&self, value: Value) -> Option<Rc<str>> {
        self.with_object(value, |obj| match obj {
            Object::Symbol(s) => Some(s.clone()),
            _ => None,
        })
        .flatten()
    }

    pub fn car(&self, value: Value) -> Option<Value> {
        self.with_object(value, |obj| match obj {
            Object::Pair(car, _) => Some(*car),
            _ => None,
        })
        .flatten()
    }

    pub fn cdr(&self, value: Value) -> Option<Value> {
        self.with_object(value, |obj| match obj {
            Object::Pair(_, cdr) => Some(*cdr),
            _ => None,
        })
        .flatten()
    }

    pub fn set_car(&self, pair: Value, car: Value) -> bool {
        self.with_object_mut(pair, |obj| match obj {
            Object::Pair(slot, _) => {
                *slot = car;
                true
            }
            _ => false,
        })
        .unwrap_or(false)
    }

    pub fn set_cdr(&self, pair: Value, cdr: Value) -> bool {
        self.with_object_mut(pair, |obj| match obj {
            Object::Pair(_, slot) => {
                *slot = cdr;
                true
            }
            _ => false,
        })
        .unwrap_or(false)
    }

    /// Length of a proper list, `None` for anything else.
    pub fn list_length(&self, list: Value) -> Option<usize> {
        let heap = self.heap.borrow();
        let mut len = 0;
        let mut cursor = list;
        loop {
            match heap.get(cursor)? {
                Object::Nil => return Some(len),
                Object::Pair(_, cdr) => {
                    len += 1;
                    cursor = *cdr;
                }
                _ => return None,
            }
        }
    }

    /// Elements of the pairs in `list`; an improper tail is dropped.
    pub fn list_to_vec(&self, list: Value) -> Vec<Value> {
        let heap = self.heap.borrow();
        let mut out = Vec::new();
        let mut cursor = list;
        while let Some(Object::Pair(car, cdr)) = heap.get(cursor) {
            out.push(*car);
            cursor = *cdr;
        }
        out
    }

    /// The `index`th pair's car, walking at most `index` links.
    pub fn list_ref(&self, list: Value, index: usize) -> Option<Value> {
        let heap = self.heap.borrow();
        let mut cursor = list;
        for _ in 0..index {
            match heap.get(cursor)? {
                Object::Pair(_, cdr) => cursor = *cdr,
                _ => return None,
            }
        }
        match heap.get(cursor)? {
            Object::Pair(car, _) => Some(*car),
            _ => None,
        }
    }

    /// The list after skipping `count` pairs.
    pub fn list_tail(&self, list: Value, count: usize) -> Option<Value> {
        let heap = self.heap.borrow();
        let mut cursor = list;
        for _ in 0..count {
            match heap.get(cursor)? {
                Object::Pair(_, cdr) => cursor = *cdr,
                _ => return None,
            }
        }
        Some(cursor)
    }

    pub fn vector_elements(&self, value: Value) -> Option<Vec<Value>> {
        self.with_object(value, |obj| match obj {
            Object::Vector(items) => Some(items.clone()),
            _ => None,
        })
        .flatten()
    }

    pub fn int_vector_elements(&self, value: Value) -> Option<Vec<i64>> {
        self.with_object(value, |obj| match obj {
            Object::IntVector(items) => Some(items.clone()),
            _ => None,
        })
        .flatten()
    }

    pub fn float_vector_elements(&self, value: Value) -> Option<Vec<f64>> {
        self.with_object(value, |obj| match obj {
            Object::FloatVector(items) => Some(items.clone()),
            _ => None,
        })
        .flatten()
    }

    pub fn byte_vector_elements(&self, value: Value) -> Option<Vec<u8>> {
        self.with_object(value, |obj| match obj {
            Object::ByteVector(items) => Some(items.clone()),
            _ => None,
        })
        .flatten()
    }

    pub fn values_elements(&self, value: Value) -> Option<Vec<Value>> {
        self.with_object(value, |obj| match obj {
            Object::Values(items) => Some(items.clone()),
            _ => None,
        })
        .flatten()
    }

    /// Length of any vector kind.
    pub fn vector_length(&self, value: Value) -> Option<usize> {
        self.with_object(value, |obj| match obj {
            Object::Vector(items) => Some(items.len()),
            Object::IntVector(items) => Some(items.len()),
            Object::FloatVector(items) => Some(items.len()),
            Object::ByteVector(items) => Some(items.len()),
            _ => None,
        })
        .flatten()
    }

    pub fn vector_ref(&self, vector: Value, index: usize) -> Option<Value> {
        self.with_object(vector, |obj| match obj {
            Object::Vector(items) => items.get(index).copied(),
            _ => None,
        })
        .flatten()
    }

    pub fn vector_set(&self, vector: Value, index: usize, item: Value) -> bool {
        self.with_object_mut(vector, |obj| match obj {
            Object::Vector(items) => match items.get_mut(index) {
                Some(slot) => {
                    *slot = item;
                    true
                }
                None => false,
            },
            _ => false,
        })
        .unwrap_or(false)
    }

    // ========================================================================
    // C-types and c-objects
    // ========================================================================

    /// Issues a fresh tag for a new opaque object type.
    pub fn make_c_type(&self, name: &str) -> TypeTag {
        let tag = self.ctypes.borrow_mut().register(name);
        tracing::debug!(name, tag = tag.id(), "registered c-type");
        tag
    }

    /// Installs one hook of a c-type's table, replacing any previous one.
    pub fn set_c_type_hook(&self, tag: TypeTag, hook: Hook) -> Result<(), Signal> {
        {
            let mut ctypes = self.ctypes.borrow_mut();
            if let Some(ty) = ctypes.get_mut(tag) {
                tracing::trace!(name = &*ty.name, hook = hook.name(), "installed c-type hook");
                ty.hooks.install(hook);
                return Ok(());
            }
        }
        let info = self.list(&[
            self.make_string("set-c-type-hook"),
            self.make_integer(tag.0.into()),
        ]);
        Err(self.error_with_message(WRONG_TYPE_ARG, format!("unknown c-type tag {tag}"), info))
    }

    pub fn c_type_name(&self, tag: TypeTag) -> Option<Rc<str>> {
        self.ctypes.borrow().get(tag).map(|ty| ty.name.clone())
    }

    pub fn c_type_count(&self) -> usize {
        self.ctypes.borrow().len()
    }

    pub(crate) fn c_type_hooks(&self, tag: TypeTag) -> crate::ctype::Hooks {
        self.ctypes.borrow().hooks(tag)
    }

    pub fn c_object_type(&self, value: Value) -> Option<TypeTag> {
        self.with_object(value, |obj| match obj {
            Object::CObject(c) => Some(c.tag),
            _ => None,
        })
        .flatten()
    }

    /// Runs `f` on the payload of a c-object.
    ///
    /// `f` runs while the heap is borrowed and must not call back into the
    /// runtime; clone what you need out of the payload instead.
    pub fn with_c_object<R>(&self, value: Value, f: impl FnOnce(&dyn Any) -> R) -> Option<R> {
        self.with_object(value, |obj| match obj {
            Object::CObject(c) => c.value.as_deref().map(f),
            _ => None,
        })
        .flatten()
    }

    pub fn c_object_let(&self, value: Value) -> Option<Value> {
        self.with_object(value, |obj| match obj {
            Object::CObject(c) => Some(c.env),
            _ => None,
        })
        .flatten()
    }

    pub fn c_object_set_let(&self, value: Value, env: Value) -> bool {
        self.with_object_mut(value, |obj| match obj {
            Object::CObject(c) => {
                c.env = env;
                true
            }
            _ => false,
        })
        .unwrap_or(false)
    }

    // ========================================================================
    // Application data
    // ========================================================================

    /// Attaches per-instance host state, replacing any previous value of the
    /// same type.
    pub fn set_app_data<T: 'static>(&self, data: T) -> Rc<T> {
        let data = Rc::new(data);
        self.app_data
            .borrow_mut()
            .insert(TypeId::of::<T>(), data.clone());
        data
    }

    pub fn app_data<T: 'static>(&self) -> Option<Rc<T>> {
        let data = self.app_data.borrow().get(&TypeId::of::<T>())?.clone();
        data.downcast::<T>().ok()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("heap", &*self.heap.borrow())
            .field("symbols", &self.symbols.borrow().len())
            .field("c_types", &*self.ctypes.borrow())
            .field("protected", &self.protected.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_interned() {
        let rt = Runtime::new();
        assert_eq!(rt.make_symbol("foo"), rt.make_symbol("foo"));
        assert_ne!(rt.make_symbol("foo"), rt.make_symbol("bar"));
        assert_eq!(rt.symbol_name(rt.make_symbol("foo")).as_deref(), Some("foo"));
    }

    #[test]
    fn integers_are_reals() {
        let rt = Runtime::new();
        let n = rt.make_integer(3);
        assert!(rt.is_real(n));
        assert_eq!(rt.real(n), Some(3.0));
        assert_eq!(rt.integer(rt.make_real(3.0)), None);
    }

    #[test]
    fn list_helpers() {
        let rt = Runtime::new();
        let items = [rt.make_integer(1), rt.make_integer(2), rt.make_integer(3)];
        let list = rt.list(&items);

        assert_eq!(rt.list_length(list), Some(3));
        assert_eq!(rt.list_to_vec(list), items.to_vec());
        assert_eq!(rt.list_ref(list, 2), Some(items[2]));
        assert_eq!(rt.list_ref(list, 3), None);
        assert_eq!(rt.list_length(rt.nil()), Some(0));

        let dotted = rt.cons(items[0], items[1]);
        assert_eq!(rt.list_length(dotted), None);
    }

    #[test]
    fn vectors_copy_elements() {
        let rt = Runtime::new();
        let v = rt.make_int_vector(vec![1, 2, 3]);
        assert_eq!(rt.int_vector_elements(v), Some(vec![1, 2, 3]));
        assert_eq!(rt.vector_length(v), Some(3));
        assert_eq!(rt.type_of(v), Kind::IntVector);
        assert!(rt.float_vector_elements(v).is_none());
    }

    #[test]
    fn c_objects_carry_payload_and_tag() {
        let rt = Runtime::new();
        let tag = rt.make_c_type("point");
        let obj = rt.make_c_object(tag, Box::new((1i32, 2i32)));

        assert_eq!(rt.c_object_type(obj), Some(tag));
        assert_eq!(rt.c_type_name(tag).as_deref(), Some("point"));
        let payload = rt.with_c_object(obj, |any| any.downcast_ref::<(i32, i32)>().copied());
        assert_eq!(payload, Some(Some((1, 2))));
    }

    #[test]
    fn app_data_is_per_type() {
        let rt = Runtime::new();
        assert!(rt.app_data::<u32>().is_none());
        rt.set_app_data(5u32);
        assert_eq!(rt.app_data::<u32>().as_deref(), Some(&5));
        assert!(rt.app_data::<i64>().is_none());
    }

    #[test]
    fn unknown_tag_hook_is_an_error() {
        let rt = Runtime::new();
        let other = Runtime::new();
        let tag = other.make_c_type("elsewhere");
        let err = rt
            .set_c_type_hook(tag, Hook::GcFree(Rc::new(|_payload: Box<dyn Any>| {})))
            .unwrap_err();
        assert!(err.is(WRONG_TYPE_ARG));
    }
}
