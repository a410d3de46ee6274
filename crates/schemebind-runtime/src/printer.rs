//! Diagnostic rendering of runtime values.

use std::fmt::Write;

use crate::object::Object;
use crate::runtime::Runtime;
use crate::value::Value;

const MAX_DEPTH: usize = 32;

impl Runtime {
    /// Renders `value` the way `write` would, for messages and debugging.
    ///
    /// C-objects use their type's `ToString` hook when present.
    pub fn object_to_string(&self, value: Value) -> String {
        let mut out = String::new();
        self.write_value(&mut out, value, 0);
        out
    }

    fn write_value(&self, out: &mut String, value: Value, depth: usize) {
        if depth > MAX_DEPTH {
            out.push_str("...");
            return;
        }

        enum Next {
            Done,
            Items(&'static str, Vec<Value>),
            List(Value),
            CObject,
        }

        let next = {
            let heap = self.heap.borrow();
            match heap.get(value) {
                None => {
                    out.push_str("#<free-cell>");
                    Next::Done
                }
                Some(object) => match object {
                    Object::Nil => {
                        out.push_str("()");
                        Next::Done
                    }
                    Object::Unspecified => {
                        out.push_str("#<unspecified>");
                        Next::Done
                    }
                    Object::Undefined => {
                        out.push_str("#<undefined>");
                        Next::Done
                    }
                    Object::Eof => {
                        out.push_str("#<eof>");
                        Next::Done
                    }
                    Object::Boolean(b) => {
                        out.push_str(if *b { "#t" } else { "#f" });
                        Next::Done
                    }
                    Object::Integer(n) => {
                        let _ = write!(out, "{n}");
                        Next::Done
                    }
                    Object::Real(x) => {
                        write_real(out, *x);
                        Next::Done
                    }
                    Object::Character(c) => {
                        match c {
                            ' ' => out.push_str("#\\space"),
                            '\n' => out.push_str("#\\newline"),
                            c => {
                                let _ = write!(out, "#\\{c}");
                            }
                        }
                        Next::Done
                    }
                    Object::String(s) => {
                        let _ = write!(out, "{s:?}");
                        Next::Done
                    }
                    Object::Symbol(s) => {
                        out.push_str(s);
                        Next::Done
                    }
                    Object::Pair(..) => Next::List(value),
                    Object::Vector(items) => Next::Items("#(", items.clone()),
                    Object::Values(items) => Next::Items("(values ", items.clone()),
                    Object::IntVector(items) => {
                        out.push_str("#i(");
                        join(out, items.iter().map(|n| n.to_string()));
                        out.push(')');
                        Next::Done
                    }
                    Object::FloatVector(items) => {
                        out.push_str("#r(");
                        join(
                            out,
                            items.iter().map(|x| {
                                let mut s = String::new();
                                write_real(&mut s, *x);
                                s
                            }),
                        );
                        out.push(')');
                        Next::Done
                    }
                    Object::ByteVector(items) => {
                        out.push_str("#u(");
                        join(out, items.iter().map(|n| n.to_string()));
                        out.push(')');
                        Next::Done
                    }
                    Object::Let(data) => {
                        let _ = write!(out, "#<let with {} bindings>", data.vars.len());
                        Next::Done
                    }
                    Object::Procedure(proc) => {
                        let _ = write!(out, "#<{}>", proc.name);
                        Next::Done
                    }
                    Object::CObject(_) => Next::CObject,
                },
            }
        };

        match next {
            Next::Done => {}
            Next::Items(open, items) => {
                out.push_str(open);
                for (i, item) in items.into_iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.write_value(out, item, depth + 1);
                }
                out.push(')');
            }
            Next::List(list) => self.write_list(out, list, depth),
            Next::CObject => self.write_c_object(out, value),
        }
    }

    fn write_list(&self, out: &mut String, list: Value, depth: usize) {
        out.push('(');
        let mut cursor = list;
        let mut first = true;
        while let (Some(car), Some(cdr)) = (self.car(cursor), self.cdr(cursor)) {
            if !first {
                out.push(' ');
            }
            first = false;
            self.write_value(out, car, depth + 1);
            cursor = cdr;
        }
        if !self.is_null(cursor) {
            out.push_str(" . ");
            self.write_value(out, cursor, depth + 1);
        }
        out.push(')');
    }

    fn write_c_object(&self, out: &mut String, value: Value) {
        let Some(tag) = self.c_object_type(value) else {
            return;
        };
        if let Some(hook) = self.c_type_hooks(tag).to_string
            && let Ok(text) = hook(self, value)
        {
            out.push_str(&text);
            return;
        }
        let name = self.c_type_name(tag).unwrap_or_else(|| "c-object".into());
        let _ = write!(out, "#<{name}>");
    }
}

fn write_real(out: &mut String, x: f64) {
    if x.is_finite() && x.fract() == 0.0 {
        let _ = write!(out, "{x:.1}");
    } else if x.is_nan() {
        out.push_str("+nan.0");
    } else if x.is_infinite() {
        out.push_str(if x > 0.0 { "+inf.0" } else { "-inf.0" });
    } else {
        let _ = write!(out, "{x}");
    }
}

fn join(out: &mut String, items: impl Iterator<Item = String>) {
    for (i, item) in items.enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&item);
    }
}
