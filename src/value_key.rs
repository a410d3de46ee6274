//! Runtime values as keys of host hash maps.

use std::hash::{Hash, Hasher};

use schemebind_runtime::{Runtime, Value};

/// A value compared with `equal?` and hashed consistently with it.
///
/// The hash is computed once, when the key is created. Mutating a keyed
/// list or vector afterwards leaves the map inconsistent, as with any
/// mutable key.
#[derive(Clone, Copy)]
pub struct ValueKey<'rt> {
    rt: &'rt Runtime,
    value: Value,
    hash: u64,
}

impl<'rt> ValueKey<'rt> {
    pub fn new(rt: &'rt Runtime, value: Value) -> Self {
        Self {
            rt,
            value,
            hash: rt.hash_code(value),
        }
    }

    pub fn value(&self) -> Value {
        self.value
    }
}

impl PartialEq for ValueKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            || (self.hash == other.hash && self.rt.is_equal(self.value, other.value).unwrap_or(false))
    }
}

impl Eq for ValueKey<'_> {}

impl Hash for ValueKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl std::fmt::Debug for ValueKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ValueKey")
            .field(&self.rt.object_to_string(self.value))
            .finish()
    }
}
