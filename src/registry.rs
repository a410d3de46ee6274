//! Per-instance registry of opaque host types.
//!
//! Every runtime carries one [`BindState`] in its application-data slot.
//! Registries are therefore owned by the instance they describe: dropping a
//! runtime drops its registrations, and two runtimes never see each other's
//! tags.
//!
//! ```text
//! Runtime
//!  └─ app data: Rc<BindState>
//!      ├─ config:  BindConfig
//!      ├─ types:   TypeRegistry   (TypeId -> {tag, name, env, env root})
//!      └─ ops:     OperatorTable  (operator -> protected builtin)
//! ```

use std::any::{TypeId, type_name};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use schemebind_runtime::{ProtectId, Runtime, TypeTag, Value};

use crate::config::BindConfig;
use crate::error::{BindError, BindResult};
use crate::ops::OperatorTable;

/// Registration record for one opaque type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    pub tag: TypeTag,
    pub name: String,
    /// Capability environment shared by every instance of the type.
    pub env: Value,
    /// Protection slot rooting `env`, released when the type is registered
    /// again.
    pub env_root: Option<ProtectId>,
}

/// Maps host types to runtime type tags.
#[derive(Default)]
pub struct TypeRegistry {
    by_type: FxHashMap<TypeId, TypeEntry>,
    by_tag: FxHashMap<TypeTag, TypeId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `T`'s registration, returning the entry it replaced.
    ///
    /// Registering a type twice overwrites the first mapping; objects created
    /// under the old tag stop satisfying `is::<T>`.
    pub fn register<T: 'static>(&mut self, entry: TypeEntry) -> Option<TypeEntry> {
        let type_id = TypeId::of::<T>();
        self.by_tag.insert(entry.tag, type_id);
        let previous = self.by_type.insert(type_id, entry);
        if let Some(previous) = &previous {
            tracing::warn!(
                rust_type = type_name::<T>(),
                name = %previous.name,
                "opaque type registered twice; the new tag replaces the old one"
            );
            self.by_tag.remove(&previous.tag);
        }
        previous
    }

    /// Drops `T`'s registration.
    pub fn remove<T: 'static>(&mut self) -> Option<TypeEntry> {
        let entry = self.by_type.remove(&TypeId::of::<T>())?;
        self.by_tag.remove(&entry.tag);
        Some(entry)
    }

    pub fn get<T: 'static>(&self) -> Option<&TypeEntry> {
        self.by_type.get(&TypeId::of::<T>())
    }

    pub fn get_by_id(&self, type_id: TypeId) -> Option<&TypeEntry> {
        self.by_type.get(&type_id)
    }

    /// The host type registered under `tag`.
    pub fn type_for_tag(&self, tag: TypeTag) -> Option<TypeId> {
        self.by_tag.get(&tag).copied()
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_type.clear();
        self.by_tag.clear();
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.by_type.len())
            .finish()
    }
}

// ============================================================================
// Instance state
// ============================================================================

/// Binding state attached to one runtime instance.
#[derive(Debug)]
pub struct BindState {
    pub config: BindConfig,
    pub types: RefCell<TypeRegistry>,
    pub(crate) ops: RefCell<OperatorTable>,
}

impl BindState {
    pub fn new(config: BindConfig) -> Self {
        Self {
            config,
            types: RefCell::default(),
            ops: RefCell::default(),
        }
    }

    /// Attaches fresh state with `config` to `rt`, replacing any previous one.
    pub fn install(rt: &Runtime, config: BindConfig) -> Rc<BindState> {
        rt.set_app_data(BindState::new(config))
    }

    /// The state of `rt`, created with the default configuration on first use.
    pub fn of(rt: &Runtime) -> Rc<BindState> {
        match rt.app_data::<BindState>() {
            Some(state) => state,
            None => Self::install(rt, BindConfig::default()),
        }
    }

    /// Entry for `T`, or `MissingTypeRegistration`.
    ///
    /// With `fatal_missing_registration` set, a missing entry is a panic.
    pub fn entry<T: 'static>(&self) -> BindResult<TypeEntry> {
        match self.types.borrow().get::<T>() {
            Some(entry) => Ok(entry.clone()),
            None => Err(self.missing::<T>()),
        }
    }

    /// Like [`BindState::entry`], returning only the tag.
    pub fn tag<T: 'static>(&self) -> BindResult<TypeTag> {
        match self.types.borrow().get::<T>() {
            Some(entry) => Ok(entry.tag),
            None => Err(self.missing::<T>()),
        }
    }

    fn missing<T: 'static>(&self) -> BindError {
        if self.config.fatal_missing_registration {
            panic!(
                "type {} used before it was registered with this runtime",
                type_name::<T>()
            );
        }
        BindError::MissingTypeRegistration {
            type_name: type_name::<T>(),
        }
    }
}

/// Tag lookup for `T` in `rt`.
pub fn get_tag<T: 'static>(rt: &Runtime) -> BindResult<TypeTag> {
    BindState::of(rt).tag::<T>()
}
