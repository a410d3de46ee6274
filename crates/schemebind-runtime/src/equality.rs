//! Structural equality and hashing (`equal?` semantics).

use std::hash::{Hash, Hasher};

use ordered_float::OrderedFloat;
use xxhash_rust::xxh64::{Xxh64, xxh64};

use crate::object::Object;
use crate::runtime::Runtime;
use crate::signal::Signal;
use crate::value::Value;

/// Seeds per kind, so equal payloads of different kinds hash apart.
const HASH_SEED: u64 = 0x7363_6865_6d65_6264;

/// Nesting below this depth does not contribute to a container's hash.
const HASH_DEPTH: usize = 3;

/// Elements of a list or vector hashed per level.
const HASH_WIDTH: usize = 32;

/// Relative tolerance of `equivalent?` on reals.
const EQUIVALENT_EPSILON: f64 = 1e-15;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Match {
    Equal,
    Equivalent,
}

fn as_f64(object: &Object) -> f64 {
    match object {
        Object::Integer(n) => *n as f64,
        Object::Real(x) => *x,
        _ => f64::NAN,
    }
}

fn numbers_equivalent(x: f64, y: f64) -> bool {
    if x.is_nan() || y.is_nan() {
        return x.is_nan() && y.is_nan();
    }
    if x == y {
        return true;
    }
    let scale = x.abs().max(y.abs()).max(1.0);
    (x - y).abs() <= EQUIVALENT_EPSILON * scale
}

enum Shallow {
    Equal(bool),
    Pair(Value, Value, Value, Value),
    Vector(Vec<(Value, Value)>),
    CObject,
}

impl Runtime {
    /// `equal?`: identity, then structure. C-objects compare through their
    /// type's `Equal` hook, or by identity when it has none.
    pub fn is_equal(&self, a: Value, b: Value) -> Result<bool, Signal> {
        self.compare(a, b, Match::Equal)
    }

    /// `equivalent?`: like [`Runtime::is_equal`], but numbers compare by
    /// value within a relative tolerance (NaNs match each other) and
    /// c-objects use their `Equivalent` hook, falling back to `Equal`.
    pub fn is_equivalent(&self, a: Value, b: Value) -> Result<bool, Signal> {
        self.compare(a, b, Match::Equivalent)
    }

    fn compare(&self, a: Value, b: Value, mode: Match) -> Result<bool, Signal> {
        if a == b {
            return Ok(true);
        }
        let shallow = {
            let heap = self.heap.borrow();
            let (Some(x), Some(y)) = (heap.get(a), heap.get(b)) else {
                return Ok(false);
            };
            match (x, y) {
                (Object::Integer(_) | Object::Real(_), Object::Integer(_) | Object::Real(_))
                    if mode == Match::Equivalent =>
                {
                    Shallow::Equal(numbers_equivalent(as_f64(x), as_f64(y)))
                }
                (Object::FloatVector(p), Object::FloatVector(q)) if mode == Match::Equivalent => {
                    Shallow::Equal(
                        p.len() == q.len()
                            && p.iter().zip(q).all(|(m, n)| numbers_equivalent(*m, *n)),
                    )
                }
                (Object::Boolean(p), Object::Boolean(q)) => Shallow::Equal(p == q),
                (Object::Integer(p), Object::Integer(q)) => Shallow::Equal(p == q),
                (Object::Real(p), Object::Real(q)) => Shallow::Equal(p == q),
                (Object::Character(p), Object::Character(q)) => Shallow::Equal(p == q),
                (Object::String(p), Object::String(q)) => Shallow::Equal(p == q),
                (Object::IntVector(p), Object::IntVector(q)) => Shallow::Equal(p == q),
                (Object::FloatVector(p), Object::FloatVector(q)) => Shallow::Equal(p == q),
                (Object::ByteVector(p), Object::ByteVector(q)) => Shallow::Equal(p == q),
                (Object::Pair(pa, pd), Object::Pair(qa, qd)) => Shallow::Pair(*pa, *qa, *pd, *qd),
                (Object::Vector(p), Object::Vector(q)) | (Object::Values(p), Object::Values(q)) => {
                    if p.len() != q.len() {
                        Shallow::Equal(false)
                    } else {
                        Shallow::Vector(p.iter().copied().zip(q.iter().copied()).collect())
                    }
                }
                (Object::CObject(_), _) => Shallow::CObject,
                (Object::Nil, Object::Nil)
                | (Object::Unspecified, Object::Unspecified)
                | (Object::Undefined, Object::Undefined)
                | (Object::Eof, Object::Eof) => Shallow::Equal(true),
                _ => Shallow::Equal(false),
            }
        };

        match shallow {
            Shallow::Equal(eq) => Ok(eq),
            Shallow::Pair(pa, qa, pd, qd) => {
                Ok(self.compare(pa, qa, mode)? && self.compare(pd, qd, mode)?)
            }
            Shallow::Vector(pairs) => {
                for (p, q) in pairs {
                    if !self.compare(p, q, mode)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Shallow::CObject => {
                let hook = self.c_object_type(a).and_then(|tag| {
                    let hooks = self.c_type_hooks(tag);
                    match mode {
                        Match::Equal => hooks.equal,
                        Match::Equivalent => hooks.equivalent.or(hooks.equal),
                    }
                });
                match hook {
                    Some(hook) => hook(self, a, b),
                    None => Ok(false),
                }
            }
        }
    }

    /// Hash consistent with [`Runtime::is_equal`] for everything except
    /// c-objects with an `Equal` hook, which hash by type.
    pub fn hash_code(&self, value: Value) -> u64 {
        self.hash_at_depth(value, HASH_DEPTH)
    }

    fn hash_at_depth(&self, value: Value, depth: usize) -> u64 {
        let kind = self.type_of(value);
        let seed = HASH_SEED ^ kind as u64;
        let children = {
            let heap = self.heap.borrow();
            let Some(object) = heap.get(value) else {
                return seed;
            };
            match object {
                Object::Boolean(b) => return xxh64(&[u8::from(*b)], seed),
                Object::Integer(n) => return xxh64(&n.to_le_bytes(), seed),
                Object::Real(x) => {
                    let mut hasher = Xxh64::new(seed);
                    OrderedFloat(*x).hash(&mut hasher);
                    return hasher.finish();
                }
                Object::Character(c) => return xxh64(&u32::from(*c).to_le_bytes(), seed),
                Object::String(s) | Object::Symbol(s) => return xxh64(s.as_bytes(), seed),
                Object::ByteVector(bytes) => return xxh64(bytes, seed),
                Object::IntVector(items) => {
                    let mut hasher = Xxh64::new(seed);
                    items.hash(&mut hasher);
                    return hasher.finish();
                }
                Object::FloatVector(items) => {
                    let mut hasher = Xxh64::new(seed);
                    hasher.write_usize(items.len());
                    for x in items {
                        OrderedFloat(*x).hash(&mut hasher);
                    }
                    return hasher.finish();
                }
                Object::CObject(obj) => return xxh64(&obj.tag.id().to_le_bytes(), seed),
                Object::Procedure(proc) => return xxh64(proc.name.as_bytes(), seed),
                Object::Pair(..) => {
                    let mut cars = Vec::new();
                    let mut cursor = value;
                    while let Some(Object::Pair(car, cdr)) = heap.get(cursor) {
                        cars.push(*car);
                        cursor = *cdr;
                        if cars.len() == HASH_WIDTH {
                            break;
                        }
                    }
                    cars
                }
                Object::Vector(items) | Object::Values(items) => {
                    items.iter().take(HASH_WIDTH).copied().collect()
                }
                _ => return seed,
            }
        };

        let mut hasher = Xxh64::new(seed);
        if depth > 0 {
            for child in children {
                hasher.write_u64(self.hash_at_depth(child, depth - 1));
            }
        }
        hasher.finish()
    }
}
