//! Root protection and the mark-and-sweep collector.
//!
//! Collection only happens when [`Runtime::collect`] is called (directly or
//! through the `gc` builtin). Roots are:
//!
//! - the constants and interned symbols
//! - the root environment
//! - every protected value
//! - the procedure and argument list of every `apply` still on the stack
//!
//! Opaque objects are traced through their environment and their type's
//! `GcMark` hook. Swept opaque payloads are handed to the `GcFree` hook only
//! after the heap borrow has been released, so a free hook (or a `Drop`
//! impl it triggers) may safely call back into the runtime.

use crate::object::Object;
use crate::runtime::Runtime;
use crate::value::Value;

/// Worklist handed to `GcMark` hooks.
#[derive(Debug, Default)]
pub struct Marker {
    worklist: Vec<Value>,
}

impl Marker {
    /// Marks `value` (and, transitively, what it references) as reachable.
    pub fn mark(&mut self, value: Value) {
        self.worklist.push(value);
    }
}

/// Counters describing the collector's activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    pub collections: usize,
    /// Cells reclaimed by the most recent collection.
    pub freed: usize,
    pub live: usize,
    pub total_allocations: usize,
}

/// Slot returned by [`Runtime::protect`], released with [`Runtime::unprotect`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProtectId(usize);

#[derive(Debug, Default)]
pub(crate) struct ProtectTable {
    slots: Vec<Option<Value>>,
    free: Vec<usize>,
}

impl ProtectTable {
    fn insert(&mut self, value: Value) -> ProtectId {
        if let Some(slot) = self.free.pop() {
            self.slots[slot] = Some(value);
            ProtectId(slot)
        } else {
            self.slots.push(Some(value));
            ProtectId(self.slots.len() - 1)
        }
    }

    fn remove(&mut self, id: ProtectId) -> Option<Value> {
        let value = self.slots.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        Some(value)
    }

    fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.slots.iter().flatten().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/// Scoped root: the value stays protected until the guard is dropped,
/// including when the scope is left through an error.
pub struct Rooted<'rt> {
    rt: &'rt Runtime,
    id: ProtectId,
    value: Value,
}

impl Rooted<'_> {
    pub fn value(&self) -> Value {
        self.value
    }
}

impl Drop for Rooted<'_> {
    fn drop(&mut self) {
        self.rt.unprotect(self.id);
    }
}

/// Keeps an `apply` frame rooted for the duration of the call.
pub(crate) struct FrameGuard<'rt> {
    rt: &'rt Runtime,
    depth: usize,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.rt.frames.borrow_mut().truncate(self.depth);
    }
}

impl Runtime {
    /// Roots `value` until the returned id is passed to [`Runtime::unprotect`].
    pub fn protect(&self, value: Value) -> ProtectId {
        self.protected.borrow_mut().insert(value)
    }

    /// Releases a root. Returns `false` if the id was already released.
    pub fn unprotect(&self, id: ProtectId) -> bool {
        self.protected.borrow_mut().remove(id).is_some()
    }

    /// Roots `value` for the lifetime of the returned guard.
    pub fn root(&self, value: Value) -> Rooted<'_> {
        Rooted {
            rt: self,
            id: self.protect(value),
            value,
        }
    }

    pub fn protected_count(&self) -> usize {
        self.protected.borrow().len()
    }

    pub(crate) fn push_frame(&self, values: &[Value]) -> FrameGuard<'_> {
        let mut frames = self.frames.borrow_mut();
        let depth = frames.len();
        frames.extend_from_slice(values);
        FrameGuard { rt: self, depth }
    }

    /// Whether `value` still refers to a live cell.
    pub fn is_live(&self, value: Value) -> bool {
        self.heap.borrow().is_live(value)
    }

    pub fn gc_stats(&self) -> GcStats {
        let heap = self.heap.borrow();
        GcStats {
            live: heap.live_count(),
            total_allocations: heap.total_allocations(),
            ..self.gc_stats.get()
        }
    }

    /// Runs a full mark-and-sweep collection.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn collect(&self) -> GcStats {
        let mut marker = Marker::default();
        marker.worklist.extend(self.constants.all());
        marker.worklist.push(self.rootlet);
        marker
            .worklist
            .extend(self.symbols.borrow().values().copied());
        marker.worklist.extend(self.protected.borrow().values());
        marker.worklist.extend(self.frames.borrow().iter().copied());

        let swept = {
            let ctypes = self.ctypes.borrow();
            let mut heap = self.heap.borrow_mut();
            let mut children = Vec::new();

            while let Some(value) = marker.worklist.pop() {
                if !heap.mark(value) {
                    continue;
                }
                let Some(object) = heap.get(value) else {
                    continue;
                };
                object.children(&mut children);
                marker.worklist.append(&mut children);

                if let Object::CObject(obj) = object
                    && let Some(payload) = obj.value.as_deref()
                    && let Some(hook) = ctypes.get(obj.tag).and_then(|ty| ty.hooks.gc_mark.as_ref())
                {
                    hook(payload, &mut marker);
                }
            }
            heap.sweep()
        };

        let freed = swept.len();
        {
            let mut docs = self.docs.borrow_mut();
            for (value, _) in &swept {
                docs.remove(value);
            }
        }

        for (_, object) in swept {
            if let Object::CObject(mut obj) = object
                && let Some(payload) = obj.value.take()
            {
                let free = self.ctypes.borrow().hooks(obj.tag).gc_free;
                match free {
                    Some(hook) => hook(payload),
                    None => {
                        tracing::warn!(tag = %obj.tag, "collected c-object has no free hook");
                        drop(payload);
                    }
                }
            }
        }

        let mut stats = self.gc_stats.get();
        stats.collections += 1;
        stats.freed = freed;
        self.gc_stats.set(stats);
        tracing::trace!(freed, collections = stats.collections, "collection finished");
        self.gc_stats()
    }
}
