//! Shared state for a resolution run.

use super::error::{ResolveError, ResolveErrorKind};
use crate::ast::{Module, TagDefault};
use crate::model::{Model, TypeId};
use crate::table::ModuleTable;
use crate::value::Value;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// Instantiation depth guard; chains of parameterized definitions deeper
/// than this are treated as cyclic.
const MAX_INSTANTIATION_DEPTH: usize = 64;

/// What a formal parameter is bound to at an instantiation site.
#[derive(Clone, Debug)]
pub enum Binding {
    /// A type actual, already resolved in the caller's environment.
    Type(TypeId),
    /// A value actual, folded in the caller's environment.
    Value(Value),
}

/// The lexical environment a type expression is resolved in: the defining
/// module's tagging rules plus any parameter bindings in scope.
///
/// Substitution through bindings is hygienic by construction: actuals are
/// resolved in the caller's environment before they are bound, so a body
/// can never capture them.
#[derive(Clone, Debug)]
pub struct Env {
    /// Defining module name.
    pub module: String,
    /// The module's tag default.
    pub tag_default: TagDefault,
    /// The module declared `EXTENSIBILITY IMPLIED`.
    pub extensibility_implied: bool,
    /// Formal parameter bindings.
    pub bindings: BTreeMap<String, Binding>,
}

impl Env {
    /// The environment of a module body.
    #[must_use]
    pub fn of_module(module: &Module) -> Self {
        Self {
            module: module.name.name.clone(),
            tag_default: module.tag_default,
            extensibility_implied: module.extensibility_implied,
            bindings: BTreeMap::new(),
        }
    }

    /// The same environment with parameter bindings installed.
    #[must_use]
    pub fn with_bindings(module: &Module, bindings: BTreeMap<String, Binding>) -> Self {
        Self {
            bindings,
            ..Self::of_module(module)
        }
    }
}

/// Memoization key: module, definition name, actual-parameter signature
/// (empty for plain definitions — value parameters participate through the
/// rendered signature).
pub type DefKey = (String, String, String);

/// An assignment currently being resolved.
#[derive(Clone, Copy, Debug)]
pub struct Frame {
    /// Pre-allocated arena slot, patched when the body completes.
    pub placeholder: TypeId,
    /// Escape depth when the frame was entered; a back-reference is legal
    /// only if the current depth is greater.
    pub entry_escapes: usize,
}

/// Mutable state threaded through resolution.
pub struct ResolverContext<'t> {
    /// The parsed modules.
    pub table: &'t ModuleTable,
    /// The model under construction.
    pub model: Model,
    /// Finished definitions.
    pub resolved: BTreeMap<DefKey, TypeId>,
    /// Definitions currently on the resolution stack.
    pub in_progress: BTreeMap<DefKey, Frame>,
    /// Number of OPTIONAL / DEFAULT / SEQUENCE OF / SET OF edges on the
    /// current path.
    pub escapes: usize,
    /// Instantiation nesting depth.
    pub depth: usize,
    /// `(module, definition)` currently being resolved, for errors.
    pub current: (String, String),
}

impl<'t> ResolverContext<'t> {
    /// Create a context over a module table.
    #[must_use]
    pub fn new(table: &'t ModuleTable) -> Self {
        Self {
            table,
            model: Model::new(),
            resolved: BTreeMap::new(),
            in_progress: BTreeMap::new(),
            escapes: 0,
            depth: 0,
            current: (String::new(), String::new()),
        }
    }

    /// Build an error at the current definition.
    #[must_use]
    pub fn err(&self, kind: ResolveErrorKind) -> ResolveError {
        ResolveError::new(kind, &self.current.0, &self.current.1)
    }

    /// Guard one level of parameterized instantiation.
    pub fn enter_instantiation(&mut self) -> Result<(), ResolveError> {
        self.depth += 1;
        if self.depth > MAX_INSTANTIATION_DEPTH {
            return Err(self.err(ResolveErrorKind::CyclicInstantiation));
        }
        Ok(())
    }

    /// Leave one instantiation level.
    pub fn leave_instantiation(&mut self) {
        self.depth -= 1;
    }

    /// Run `f` with one more escape edge on the path.
    pub fn with_escape<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ResolveError>,
    ) -> Result<T, ResolveError> {
        self.escapes += 1;
        let result = f(self);
        self.escapes -= 1;
        result
    }

    /// Render an actual-parameter signature for memoization.
    #[must_use]
    pub fn signature(bindings: &BTreeMap<String, Binding>) -> String {
        let mut parts: Vec<String> = Vec::new();
        for (name, binding) in bindings {
            match binding {
                Binding::Type(id) => {
                    parts.push(alloc::format!("{name}={id}"));
                }
                Binding::Value(v) => {
                    parts.push(alloc::format!("{name}=v{v:?}"));
                }
            }
        }
        parts.join(",")
    }
}
