//! Native procedures, `apply`, and condition constructors.

use std::rc::Rc;

use crate::object::{Arity, FunctionFlags, NativeBody, Object, Procedure};
use crate::runtime::Runtime;
use crate::signal::{
    OUT_OF_RANGE, SYNTAX_ERROR, Signal, UNBOUND_VARIABLE, WRONG_NUMBER_OF_ARGS, WRONG_TYPE_ARG,
};
use crate::value::{Kind, Value};

/// Everything needed to build a native procedure.
pub struct FunctionSpec<'a> {
    pub name: &'a str,
    pub doc: &'a str,
    pub arity: Arity,
    pub flags: FunctionFlags,
    /// Signature list `(ret-pred arg-pred ...)`, if known.
    pub signature: Option<Value>,
}

impl<'a> FunctionSpec<'a> {
    pub fn new(name: &'a str, arity: Arity) -> Self {
        Self {
            name,
            doc: "",
            arity,
            flags: FunctionFlags::empty(),
            signature: None,
        }
    }

    pub fn doc(mut self, doc: &'a str) -> Self {
        self.doc = doc;
        self
    }

    pub fn flags(mut self, flags: FunctionFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn signature(mut self, signature: Option<Value>) -> Self {
        self.signature = signature;
        self
    }
}

impl Runtime {
    /// Creates an anonymous native procedure.
    pub fn make_function(&self, spec: FunctionSpec<'_>, body: NativeBody) -> Value {
        self.alloc(Object::Procedure(Procedure {
            name: spec.name.into(),
            doc: spec.doc.into(),
            arity: spec.arity,
            flags: spec.flags,
            signature: spec.signature,
            setter: None,
            body,
        }))
    }

    /// Creates a native procedure and binds it in the root environment.
    pub fn define_function(&self, spec: FunctionSpec<'_>, body: NativeBody) -> Value {
        let name = spec.name;
        let proc = self.make_function(spec, body);
        self.define_variable(name, proc);
        tracing::debug!(name, "defined native procedure");
        proc
    }

    pub fn procedure_name(&self, proc: Value) -> Option<Rc<str>> {
        self.with_procedure(proc, |p| p.name.clone())
    }

    pub fn procedure_arity(&self, proc: Value) -> Option<Arity> {
        self.with_procedure(proc, |p| p.arity)
    }

    pub fn procedure_flags(&self, proc: Value) -> Option<FunctionFlags> {
        self.with_procedure(proc, |p| p.flags)
    }

    pub fn procedure_signature(&self, proc: Value) -> Option<Value> {
        self.with_procedure(proc, |p| p.signature).flatten()
    }

    /// Attaches a setter procedure, turning `proc` into a settable accessor.
    pub fn set_setter(&self, proc: Value, setter: Value) -> bool {
        self.with_object_mut(proc, |obj| match obj {
            Object::Procedure(p) => {
                p.setter = Some(setter);
                true
            }
            _ => false,
        })
        .unwrap_or(false)
    }

    pub fn setter(&self, proc: Value) -> Option<Value> {
        self.with_procedure(proc, |p| p.setter).flatten()
    }

    fn with_procedure<R>(&self, proc: Value, f: impl FnOnce(&Procedure) -> R) -> Option<R> {
        self.with_object(proc, |obj| match obj {
            Object::Procedure(p) => Some(f(p)),
            _ => None,
        })
        .flatten()
    }

    // ========================================================================
    // Call-in
    // ========================================================================

    /// Applies `f` to the argument list `args`.
    ///
    /// Procedures have their arity checked before their body runs. Applying
    /// a c-object calls its type's `Ref` hook. The procedure and its
    /// arguments stay rooted until the call returns.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn apply(&self, f: Value, args: Value) -> Result<Value, Signal> {
        let _frame = self.push_frame(&[f, args]);

        match self.type_of(f) {
            Kind::Procedure => {
                let Some(proc) = self.with_procedure(f, Procedure::clone) else {
                    return Err(self.apply_error(f));
                };
                let count = self.list_length(args);
                if !count.is_some_and(|count| proc.arity.accepts(count)) {
                    return Err(self.wrong_number_of_args_error(&proc.name, args));
                }
                tracing::trace!(name = &*proc.name, "apply");
                (proc.body)(self, args)
            }
            Kind::CObject => {
                let hook = self
                    .c_object_type(f)
                    .and_then(|tag| self.c_type_hooks(tag).reference);
                match hook {
                    Some(hook) => hook(self, f, args),
                    None => Err(self.apply_error(f)),
                }
            }
            _ => Err(self.apply_error(f)),
        }
    }

    /// Indexed assignment on a c-object through its type's `Set` hook.
    /// `args` holds the index arguments followed by the new value.
    pub fn c_object_set(&self, object: Value, args: Value) -> Result<Value, Signal> {
        let _frame = self.push_frame(&[object, args]);
        let hook = self
            .c_object_type(object)
            .and_then(|tag| self.c_type_hooks(tag).set);
        match hook {
            Some(hook) => hook(self, object, args),
            None => Err(self.wrong_type_arg_error(
                "object-set!",
                1,
                object,
                "a c-object with a set hook",
            )),
        }
    }

    pub fn call(&self, f: Value, args: &[Value]) -> Result<Value, Signal> {
        let args = self.list(args);
        self.apply(f, args)
    }

    /// Calls the procedure bound to `name` in the root environment.
    pub fn call_by_name(&self, name: &str, args: &[Value]) -> Result<Value, Signal> {
        let f = self.name_to_value(name);
        if f == self.undefined() {
            let sym = self.make_symbol(name);
            let info = self.list(&[sym]);
            return Err(self.error_with_message(
                UNBOUND_VARIABLE,
                format!("unbound variable {name}"),
                info,
            ));
        }
        self.call(f, args)
    }

    pub fn is_macro(&self, value: Value) -> bool {
        self.procedure_flags(value)
            .is_some_and(|flags| flags.contains(FunctionFlags::MACRO))
    }

    /// Expands `form` once when its head symbol names a macro: the macro's
    /// body is applied to the unevaluated rest of the form. Any other form
    /// comes back unchanged.
    pub fn macroexpand(&self, form: Value) -> Result<Value, Signal> {
        let Some(head) = self.car(form) else {
            return Ok(form);
        };
        if !self.is_symbol(head) {
            return Ok(form);
        }
        let f = self.symbol_value(head);
        if !self.is_macro(f) {
            return Ok(form);
        }
        let args = self.cdr(form).unwrap_or_else(|| self.nil());
        self.apply(f, args)
    }

    // ========================================================================
    // Conditions
    // ========================================================================

    /// A condition of `kind` whose message is the rendered `info` list.
    pub fn error(&self, kind: &str, info: Value) -> Signal {
        let message = self.object_to_string(info);
        self.error_with_message(kind, message, info)
    }

    pub fn error_with_message(&self, kind: &str, message: String, info: Value) -> Signal {
        Signal {
            kind: kind.into(),
            message,
            info,
        }
    }

    /// `info` is `(caller position arg description)`.
    pub fn wrong_type_arg_error(
        &self,
        caller: &str,
        position: usize,
        arg: Value,
        description: &str,
    ) -> Signal {
        let shown = self.object_to_string(arg);
        let actual = self.describe_kind(arg);
        let message = if position == 0 {
            format!("{caller}: argument {shown} is {actual}, but should be {description}")
        } else {
            format!(
                "{caller}: argument {position}, {shown}, is {actual}, but should be {description}"
            )
        };
        let info = self.condition_info(caller, position, arg, description);
        self.error_with_message(WRONG_TYPE_ARG, message, info)
    }

    /// `info` is `(caller position arg description)`.
    pub fn out_of_range_error(
        &self,
        caller: &str,
        position: usize,
        arg: Value,
        description: &str,
    ) -> Signal {
        let shown = self.object_to_string(arg);
        let message =
            format!("{caller}: argument {position}, {shown}, is out of range (expected {description})");
        let info = self.condition_info(caller, position, arg, description);
        self.error_with_message(OUT_OF_RANGE, message, info)
    }

    /// `info` is `(caller args)`.
    pub fn wrong_number_of_args_error(&self, caller: &str, args: Value) -> Signal {
        let shown = self.object_to_string(args);
        let info = self.list(&[self.make_string(caller), args]);
        self.error_with_message(
            WRONG_NUMBER_OF_ARGS,
            format!("{caller}: wrong number of args: {shown}"),
            info,
        )
    }

    fn condition_info(&self, caller: &str, position: usize, arg: Value, description: &str) -> Value {
        self.list(&[
            self.make_string(caller),
            self.make_integer(i64::try_from(position).unwrap_or(i64::MAX)),
            arg,
            self.make_string(description),
        ])
    }

    fn apply_error(&self, f: Value) -> Signal {
        let shown = self.object_to_string(f);
        let info = self.list(&[f]);
        self.error_with_message(SYNTAX_ERROR, format!("attempt to apply {shown}"), info)
    }

    /// "an integer", "a c-object", ...
    pub(crate) fn describe_kind(&self, value: Value) -> String {
        let name = match self.c_object_type(value).and_then(|tag| self.c_type_name(tag)) {
            Some(name) => name.to_string(),
            None => self.type_of(value).name().to_string(),
        };
        let article = match name.chars().next() {
            Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
            _ => "a",
        };
        format!("{article} {name}")
    }
}
