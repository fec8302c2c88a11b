//! Resolved type model.
//!
//! The Model is the finalized representation of a compilation. It sits at
//! the end of the pipeline:
//!
//! ```text
//! Source → Lexer → Parser → AST → ModuleTable → Resolver → [Model]
//! ```
//!
//! # Features
//!
//! - Arena-based type storage with stable index IDs; recursive types hold
//!   indices, never direct ownership
//! - Global string interner for member names, labels and type names
//! - Merged constraints and precomputed encoding hints on every node
//! - Lookup by plain or `Module.Type` qualified name
//!
//! The model is immutable once resolution finishes; codecs only read it, so
//! one model may drive any number of concurrent encode/decode calls.

mod constraint;
mod hints;
mod ids;
mod interner;
mod tag;
mod types;

pub use constraint::{ComponentEntry, Constraint, ConstraintElem, Containment};
pub use hints::{bits_for_count, Alphabet, EncodingHints};
pub use ids::{StrId, TypeId};
pub use interner::StringInterner;
pub use tag::{universal, Tag, TagClass, TagMode};
pub use types::{Composite, Member, StringKind, TimeKind, TypeKind, TypeNode};

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

/// The resolved type model.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Model {
    /// Interned strings.
    strings: StringInterner,
    /// Type arena; `TypeId` is a 1-based index into this vector.
    nodes: Vec<TypeNode>,
    /// Module names in registration order.
    modules: Vec<StrId>,
    /// Plain type name → node. The first definition of a name wins; shadowed
    /// definitions stay reachable through their qualified name.
    by_name: BTreeMap<StrId, TypeId>,
    /// `(module, name)` → node.
    by_qualified: BTreeMap<(StrId, StrId), TypeId>,
}

impl Model {
    /// Create a new empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string.
    pub(crate) fn intern(&mut self, s: &str) -> StrId {
        self.strings.intern(s)
    }

    /// Get an interned string.
    #[must_use]
    pub fn str(&self, id: StrId) -> &str {
        self.strings.get(id)
    }

    /// Allocate an arena node and return its id.
    pub(crate) fn alloc(&mut self, node: TypeNode) -> TypeId {
        self.nodes.push(node);
        TypeId::from_index(self.nodes.len() - 1).expect("type arena full")
    }

    /// Replace a previously allocated node (placeholder patching during
    /// recursive resolution).
    pub(crate) fn replace(&mut self, id: TypeId, node: TypeNode) {
        self.nodes[id.index()] = node;
    }

    /// Get a node by id.
    #[must_use]
    pub fn node(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id.index()]
    }

    /// Number of arena nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Register a module name.
    pub(crate) fn add_module(&mut self, name: StrId) {
        if !self.modules.contains(&name) {
            self.modules.push(name);
        }
    }

    /// Registered module names.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|&id| self.strings.get(id))
    }

    /// Register a top-level type under its module and plain name.
    pub(crate) fn register(&mut self, module: StrId, name: StrId, id: TypeId) {
        self.by_qualified.insert((module, name), id);
        self.by_name.entry(name).or_insert(id);
    }

    /// Look up a top-level type by `Name` or `Module.Name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        if let Some((module, plain)) = name.split_once('.') {
            let module = self.strings.lookup(module)?;
            let plain = self.strings.lookup(plain)?;
            return self.by_qualified.get(&(module, plain)).copied();
        }
        let plain = self.strings.lookup(name)?;
        self.by_name.get(&plain).copied()
    }

    /// Iterate registered top-level type names (unqualified).
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(|&id| self.strings.get(id))
    }

    /// Iterate registered top-level types.
    pub fn types(&self) -> impl Iterator<Item = (&str, TypeId)> {
        self.by_name
            .iter()
            .map(|(&name, &id)| (self.strings.get(name), id))
    }

    /// Follow `Tagged` wrappers down to the underlying node.
    #[must_use]
    pub fn untagged(&self, mut id: TypeId) -> TypeId {
        loop {
            match &self.node(id).kind {
                TypeKind::Tagged { inner, .. } => id = *inner,
                _ => return id,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_lookup() {
        let mut model = Model::new();
        let module = model.intern("Test-Module");
        let name = model.intern("T");
        let id = model.alloc(TypeNode::new(TypeKind::Boolean));
        model.add_module(module);
        model.register(module, name, id);

        assert_eq!(model.lookup("T"), Some(id));
        assert_eq!(model.lookup("Test-Module.T"), Some(id));
        assert_eq!(model.lookup("Missing"), None);
        assert_eq!(model.modules().count(), 1);
    }

    #[test]
    fn test_untagged_chain() {
        let mut model = Model::new();
        let inner = model.alloc(TypeNode::new(TypeKind::Boolean));
        let tagged = model.alloc(TypeNode::new(TypeKind::Tagged {
            tag: Tag::context(0),
            mode: TagMode::Implicit,
            inner,
        }));
        assert_eq!(model.untagged(tagged), inner);
    }
}
