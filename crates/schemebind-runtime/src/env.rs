//! Environments, definitions and documentation.

use std::rc::Rc;

use crate::object::{LetData, Object};
use crate::runtime::Runtime;
use crate::signal::{IMMUTABLE_ERROR, Signal, UNBOUND_VARIABLE};
use crate::value::Value;

enum Slot {
    Found(Value),
    Immutable,
    Missing,
}

impl Runtime {
    /// A fresh empty environment with no outer environment.
    pub fn inlet(&self) -> Value {
        self.alloc(Object::Let(LetData::default()))
    }

    /// A fresh empty environment nested inside `outer`.
    pub fn sublet(&self, outer: Value) -> Value {
        self.alloc(Object::Let(LetData::with_outer(Some(outer))))
    }

    /// Marks `env` as open so method lookup consults it. Returns `env`.
    pub fn openlet(&self, env: Value) -> Value {
        self.with_object_mut(env, |obj| {
            if let Object::Let(data) = obj {
                data.open = true;
            }
        });
        env
    }

    pub fn is_openlet(&self, env: Value) -> bool {
        self.with_object(env, |obj| matches!(obj, Object::Let(data) if data.open))
            .unwrap_or(false)
    }

    pub fn outlet(&self, env: Value) -> Option<Value> {
        self.with_object(env, |obj| match obj {
            Object::Let(data) => data.outer,
            _ => None,
        })
        .flatten()
    }

    /// Binds `sym` in `env` itself, shadowing outer bindings.
    pub fn define(&self, env: Value, sym: Value, value: Value) -> Result<(), Signal> {
        let outcome = self.with_object_mut(env, |obj| match obj {
            Object::Let(data) if data.immutable.contains(&sym) => Slot::Immutable,
            Object::Let(data) => {
                data.insert(sym, value);
                Slot::Found(value)
            }
            _ => Slot::Missing,
        });
        match outcome {
            Some(Slot::Found(_)) => Ok(()),
            Some(Slot::Immutable) => Err(self.immutable_error("define", sym)),
            _ => Err(self.wrong_type_arg_error("define", 1, env, "a let")),
        }
    }

    /// Looks `sym` up through `env` and its outer chain. Returns the
    /// undefined constant when no binding exists.
    pub fn let_ref(&self, env: Value, sym: Value) -> Value {
        let heap = self.heap.borrow();
        let mut cursor = Some(env);
        while let Some(current) = cursor {
            match heap.get(current) {
                Some(Object::Let(data)) => {
                    if let Some(value) = data.vars.get(&sym) {
                        return *value;
                    }
                    cursor = data.outer;
                }
                _ => break,
            }
        }
        self.undefined()
    }

    /// Assigns an existing binding found through `env`'s chain.
    pub fn let_set(&self, env: Value, sym: Value, value: Value) -> Result<Value, Signal> {
        let outcome = {
            let mut heap = self.heap.borrow_mut();
            let mut cursor = Some(env);
            let mut outcome = Slot::Missing;
            while let Some(current) = cursor {
                match heap.get_mut(current) {
                    Some(Object::Let(data)) => {
                        if data.vars.contains_key(&sym) {
                            outcome = if data.immutable.contains(&sym) {
                                Slot::Immutable
                            } else {
                                data.vars.insert(sym, value);
                                Slot::Found(value)
                            };
                            break;
                        }
                        cursor = data.outer;
                    }
                    _ => break,
                }
            }
            outcome
        };
        match outcome {
            Slot::Found(value) => Ok(value),
            Slot::Immutable => Err(self.immutable_error("set!", sym)),
            Slot::Missing => {
                let name = self.symbol_name(sym).unwrap_or_else(|| "?".into());
                let info = self.list(&[sym]);
                Err(self.error_with_message(UNBOUND_VARIABLE, format!("unbound variable {name}"), info))
            }
        }
    }

    /// Forbids further assignment to `sym` in `env`.
    pub fn set_immutable(&self, env: Value, sym: Value) -> bool {
        self.with_object_mut(env, |obj| match obj {
            Object::Let(data) if data.vars.contains_key(&sym) => data.immutable.insert(sym),
            _ => false,
        })
        .unwrap_or(false)
    }

    /// `env`'s own bindings as a list of `(symbol . value)` pairs, in
    /// definition order.
    pub fn let_to_list(&self, env: Value) -> Value {
        let bindings = self
            .with_object(env, |obj| match obj {
                Object::Let(data) => data
                    .order
                    .iter()
                    .filter_map(|sym| data.vars.get(sym).map(|value| (*sym, *value)))
                    .collect(),
                _ => Vec::new(),
            })
            .unwrap_or_default();
        let pairs: Vec<Value> = bindings
            .into_iter()
            .map(|(sym, value)| self.cons(sym, value))
            .collect();
        self.list(&pairs)
    }

    // ========================================================================
    // Root environment
    // ========================================================================

    /// Defines `name` in the root environment and returns its symbol.
    pub fn define_variable(&self, name: &str, value: Value) -> Value {
        let sym = self.make_symbol(name);
        self.with_object_mut(self.rootlet, |obj| {
            if let Object::Let(data) = obj {
                data.immutable.remove(&sym);
                data.insert(sym, value);
            }
        });
        sym
    }

    pub fn define_variable_with_documentation(&self, name: &str, value: Value, doc: &str) -> Value {
        let sym = self.define_variable(name, value);
        self.set_documentation(sym, doc);
        sym
    }

    /// Like [`Runtime::define_variable_with_documentation`], but later
    /// assignments fail.
    pub fn define_constant_with_documentation(&self, name: &str, value: Value, doc: &str) -> Value {
        let sym = self.define_variable_with_documentation(name, value, doc);
        self.set_immutable(self.rootlet, sym);
        sym
    }

    pub fn is_defined(&self, name: &str) -> bool {
        let sym = self.make_symbol(name);
        self.let_ref(self.rootlet, sym) != self.undefined()
    }

    /// The root binding of `name`, or the undefined constant.
    pub fn name_to_value(&self, name: &str) -> Value {
        self.let_ref(self.rootlet, self.make_symbol(name))
    }

    pub fn symbol_value(&self, sym: Value) -> Value {
        self.let_ref(self.rootlet, sym)
    }

    pub fn symbol_set_value(&self, sym: Value, value: Value) -> Result<Value, Signal> {
        self.let_set(self.rootlet, sym, value)
    }

    // ========================================================================
    // Documentation
    // ========================================================================

    /// Documentation of a procedure, or the string attached to a symbol.
    pub fn documentation(&self, value: Value) -> Option<Rc<str>> {
        let proc_doc = self
            .with_object(value, |obj| match obj {
                Object::Procedure(proc) if !proc.doc.is_empty() => Some(proc.doc.clone()),
                _ => None,
            })
            .flatten();
        proc_doc.or_else(|| self.docs.borrow().get(&value).cloned())
    }

    pub fn set_documentation(&self, value: Value, doc: &str) {
        if doc.is_empty() {
            return;
        }
        self.docs.borrow_mut().insert(value, doc.into());
    }

    // ========================================================================
    // Methods
    // ========================================================================

    /// Looks `name` up in the open environment of a c-object (or an open
    /// let), without falling through to the root environment.
    pub fn find_method(&self, object: Value, name: &str) -> Option<Value> {
        let env = match self.c_object_let(object) {
            Some(env) => env,
            None if self.is_let(object) => object,
            None => return None,
        };
        if !self.is_openlet(env) {
            return None;
        }
        let sym = self.make_symbol(name);
        let heap = self.heap.borrow();
        let mut cursor = Some(env);
        while let Some(current) = cursor {
            if current == self.rootlet {
                break;
            }
            match heap.get(current) {
                Some(Object::Let(data)) => {
                    if let Some(value) = data.vars.get(&sym) {
                        return Some(*value);
                    }
                    cursor = data.outer;
                }
                _ => break,
            }
        }
        None
    }

    fn immutable_error(&self, caller: &str, sym: Value) -> Signal {
        let name = self.symbol_name(sym).unwrap_or_else(|| "?".into());
        let info = self.list(&[self.make_string(caller), sym]);
        Signal {
            kind: IMMUTABLE_ERROR.into(),
            message: format!("{caller}: can't alter immutable binding {name}"),
            info,
        }
    }
}
