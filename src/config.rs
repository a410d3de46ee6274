//! Binding configuration.

use bitflags::bitflags;
use schemebind_runtime::FunctionFlags;

bitflags! {
    /// Evaluator hints recorded on bound procedures.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FunctionOpts: u8 {
        /// The function may call back into the runtime.
        const UNSAFE_BODY = 1 << 0;
        /// The function may keep a reference to its argument list.
        const UNSAFE_ARGLIST = 1 << 1;
    }
}

impl FunctionOpts {
    pub(crate) fn to_flags(self) -> FunctionFlags {
        let mut flags = FunctionFlags::TYPED;
        flags.set(FunctionFlags::UNSAFE_BODY, self.contains(FunctionOpts::UNSAFE_BODY));
        flags.set(
            FunctionFlags::UNSAFE_ARGLIST,
            self.contains(FunctionOpts::UNSAFE_ARGLIST),
        );
        flags
    }
}

/// Per-instance binding behaviour.
#[derive(Debug, Clone)]
pub struct BindConfig {
    /// Panic instead of returning `MissingTypeRegistration` when an opaque
    /// type is used before registration.
    pub fatal_missing_registration: bool,
    /// Reject extra positional arguments to fixed-arity functions. When
    /// off, extras are ignored.
    pub strict_arity: bool,
    /// Options applied to every function bound without explicit options.
    pub default_opts: FunctionOpts,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            fatal_missing_registration: cfg!(feature = "debug-checks"),
            strict_arity: true,
            default_opts: FunctionOpts::empty(),
        }
    }
}

impl BindConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fatal_missing_registration(mut self, fatal: bool) -> Self {
        self.fatal_missing_registration = fatal;
        self
    }

    pub fn strict_arity(mut self, strict: bool) -> Self {
        self.strict_arity = strict;
        self
    }

    pub fn default_opts(mut self, opts: FunctionOpts) -> Self {
        self.default_opts = opts;
        self
    }
}
