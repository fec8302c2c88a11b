//! Module-level AST types.

use super::{Definition, Ident};
use crate::lexer::Span;
use alloc::vec::Vec;

/// Module tagging environment from the `DEFINITIONS` clause.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TagDefault {
    /// `EXPLICIT TAGS` (also the X.680 default when no clause is given).
    #[default]
    Explicit,
    /// `IMPLICIT TAGS`.
    Implicit,
    /// `AUTOMATIC TAGS`.
    Automatic,
}

/// The `EXPORTS` clause of a module.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Exports {
    /// `EXPORTS ALL;` or no clause: every definition is exported.
    #[default]
    All,
    /// `EXPORTS a, B;`
    Symbols(Vec<Ident>),
}

/// One `symbols FROM Module` group of an `IMPORTS` clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportClause {
    /// The imported symbols.
    pub symbols: Vec<Ident>,
    /// The module the symbols come from.
    pub from_module: Ident,
    /// Location of the clause.
    pub span: Span,
}

/// A parsed ASN.1 module.
#[derive(Clone, Debug)]
pub struct Module {
    /// Module name.
    pub name: Ident,
    /// Tagging environment.
    pub tag_default: TagDefault,
    /// `EXTENSIBILITY IMPLIED` was present.
    pub extensibility_implied: bool,
    /// Exported symbols.
    pub exports: Exports,
    /// Import clauses.
    pub imports: Vec<ImportClause>,
    /// Type and value assignments in source order.
    pub body: Vec<Definition>,
    /// Location of the whole module.
    pub span: Span,
}

impl Module {
    /// Create a new empty module.
    #[must_use]
    pub fn new(name: Ident, span: Span) -> Self {
        Self {
            name,
            tag_default: TagDefault::default(),
            extensibility_implied: false,
            exports: Exports::default(),
            imports: Vec::new(),
            body: Vec::new(),
            span,
        }
    }
}
