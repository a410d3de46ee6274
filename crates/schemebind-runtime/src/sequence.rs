//! Generic sequence operations: `copy`, `reverse`, `fill!` and `object->list`.
//!
//! Lists, strings and the vector kinds are handled directly. C-objects are
//! routed through their type's hook of the same name and are rejected with
//! a wrong-type condition when the hook is missing.

use std::rc::Rc;

use crate::ctype::{Hooks, TransformHook};
use crate::object::Object;
use crate::runtime::Runtime;
use crate::signal::Signal;
use crate::value::{Kind, Value};

impl Runtime {
    /// Shallow copy. Immutable atoms are returned as they are.
    pub fn copy(&self, value: Value) -> Result<Value, Signal> {
        let copied = match self.type_of(value) {
            Kind::Pair => {
                let items = self.proper_list("copy", value)?;
                self.list(&items)
            }
            Kind::String => {
                let text = self.string(value).unwrap_or_default();
                self.make_string(&text)
            }
            Kind::Vector => self.make_vector(self.vector_elements(value).unwrap_or_default()),
            Kind::IntVector => {
                self.make_int_vector(self.int_vector_elements(value).unwrap_or_default())
            }
            Kind::FloatVector => {
                self.make_float_vector(self.float_vector_elements(value).unwrap_or_default())
            }
            Kind::ByteVector => {
                self.make_byte_vector(self.byte_vector_elements(value).unwrap_or_default())
            }
            Kind::CObject => return self.transform_c_object("copy", value, |h| h.copy),
            _ => value,
        };
        Ok(copied)
    }

    /// New sequence with the elements of `value` in reverse order.
    pub fn reverse(&self, value: Value) -> Result<Value, Signal> {
        let reversed = match self.type_of(value) {
            Kind::Nil => value,
            Kind::Pair => {
                let mut items = self.proper_list("reverse", value)?;
                items.reverse();
                self.list(&items)
            }
            Kind::String => {
                let text: String = self.string(value).unwrap_or_default().chars().rev().collect();
                self.make_string(&text)
            }
            Kind::Vector => {
                let mut items = self.vector_elements(value).unwrap_or_default();
                items.reverse();
                self.make_vector(items)
            }
            Kind::IntVector => {
                let mut items = self.int_vector_elements(value).unwrap_or_default();
                items.reverse();
                self.make_int_vector(items)
            }
            Kind::FloatVector => {
                let mut items = self.float_vector_elements(value).unwrap_or_default();
                items.reverse();
                self.make_float_vector(items)
            }
            Kind::ByteVector => {
                let mut items = self.byte_vector_elements(value).unwrap_or_default();
                items.reverse();
                self.make_byte_vector(items)
            }
            Kind::CObject => return self.transform_c_object("reverse", value, |h| h.reverse),
            _ => return Err(self.wrong_type_arg_error("reverse", 1, value, "a sequence")),
        };
        Ok(reversed)
    }

    /// Stores `item` in every slot of `value` and returns `item`.
    ///
    /// Homogeneous vectors and strings only accept items of their element
    /// type; a byte vector also rejects integers outside `0..=255`.
    pub fn fill(&self, value: Value, item: Value) -> Result<Value, Signal> {
        match self.type_of(value) {
            Kind::Nil => {}
            Kind::Pair => {
                for pair in self.proper_spine("fill!", value)? {
                    self.set_car(pair, item);
                }
            }
            Kind::String => {
                let Some(c) = self.character(item) else {
                    return Err(self.wrong_type_arg_error("fill!", 2, item, "a character"));
                };
                let len = self.string(value).map_or(0, |s| s.chars().count());
                let filled: Rc<str> = std::iter::repeat_n(c, len).collect::<String>().into();
                self.with_object_mut(value, |obj| *obj = Object::String(filled));
            }
            Kind::Vector => {
                self.with_object_mut(value, |obj| {
                    if let Object::Vector(items) = obj {
                        items.fill(item);
                    }
                });
            }
            Kind::IntVector => {
                let Some(n) = self.integer(item) else {
                    return Err(self.wrong_type_arg_error("fill!", 2, item, "an integer"));
                };
                self.with_object_mut(value, |obj| {
                    if let Object::IntVector(items) = obj {
                        items.fill(n);
                    }
                });
            }
            Kind::FloatVector => {
                let Some(x) = self.real(item) else {
                    return Err(self.wrong_type_arg_error("fill!", 2, item, "a real"));
                };
                self.with_object_mut(value, |obj| {
                    if let Object::FloatVector(items) = obj {
                        items.fill(x);
                    }
                });
            }
            Kind::ByteVector => {
                let Some(n) = self.integer(item) else {
                    return Err(self.wrong_type_arg_error("fill!", 2, item, "a byte"));
                };
                let Ok(byte) = u8::try_from(n) else {
                    return Err(self.out_of_range_error("fill!", 2, item, "between 0 and 255"));
                };
                self.with_object_mut(value, |obj| {
                    if let Object::ByteVector(items) = obj {
                        items.fill(byte);
                    }
                });
            }
            Kind::CObject => {
                let hook = self.c_object_type(value).and_then(|tag| self.c_type_hooks(tag).fill);
                return match hook {
                    Some(hook) => hook(self, value, item),
                    None => Err(self.wrong_type_arg_error("fill!", 1, value, "a fillable object")),
                };
            }
            _ => return Err(self.wrong_type_arg_error("fill!", 1, value, "a sequence")),
        }
        Ok(item)
    }

    /// `object->list`: the elements of a sequence, or the bindings of a let.
    pub fn to_list(&self, value: Value) -> Result<Value, Signal> {
        let list = match self.type_of(value) {
            Kind::Nil | Kind::Pair => value,
            Kind::String => {
                let chars: Vec<Value> = self
                    .string(value)
                    .unwrap_or_default()
                    .chars()
                    .map(|c| self.make_character(c))
                    .collect();
                self.list(&chars)
            }
            Kind::Vector => self.list(&self.vector_elements(value).unwrap_or_default()),
            Kind::IntVector => {
                let items: Vec<Value> = self
                    .int_vector_elements(value)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|n| self.make_integer(n))
                    .collect();
                self.list(&items)
            }
            Kind::FloatVector => {
                let items: Vec<Value> = self
                    .float_vector_elements(value)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|x| self.make_real(x))
                    .collect();
                self.list(&items)
            }
            Kind::ByteVector => {
                let items: Vec<Value> = self
                    .byte_vector_elements(value)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|b| self.make_integer(i64::from(b)))
                    .collect();
                self.list(&items)
            }
            Kind::Let => self.let_to_list(value),
            Kind::CObject => {
                return self.transform_c_object("object->list", value, |h| h.to_list);
            }
            _ => return Err(self.wrong_type_arg_error("object->list", 1, value, "a sequence")),
        };
        Ok(list)
    }

    fn transform_c_object(
        &self,
        caller: &str,
        value: Value,
        pick: impl FnOnce(Hooks) -> Option<TransformHook>,
    ) -> Result<Value, Signal> {
        let hook = self.c_object_type(value).and_then(|tag| pick(self.c_type_hooks(tag)));
        match hook {
            Some(hook) => hook(self, value),
            None => Err(self.wrong_type_arg_error(caller, 1, value, "a sequence")),
        }
    }

    fn proper_list(&self, caller: &str, list: Value) -> Result<Vec<Value>, Signal> {
        if self.list_length(list).is_none() {
            return Err(self.wrong_type_arg_error(caller, 1, list, "a proper list"));
        }
        Ok(self.list_to_vec(list))
    }

    /// The pairs making up a proper list.
    fn proper_spine(&self, caller: &str, list: Value) -> Result<Vec<Value>, Signal> {
        let Some(len) = self.list_length(list) else {
            return Err(self.wrong_type_arg_error(caller, 1, list, "a proper list"));
        };
        let mut spine = Vec::with_capacity(len);
        let mut cursor = list;
        while self.is_pair(cursor) {
            spine.push(cursor);
            cursor = self.cdr(cursor).unwrap_or_else(|| self.nil());
        }
        Ok(spine)
    }
}
