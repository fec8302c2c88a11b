//! Resolution errors.

use alloc::string::String;
use thiserror::Error;

/// What went wrong while resolving.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolveErrorKind {
    /// A type or value reference did not resolve in any known module.
    #[error("unknown reference `{0}`")]
    UnknownReference(String),
    /// An imported symbol is missing from its source module.
    #[error("unresolved import `{symbol}` from `{from_module}`")]
    UnresolvedImport {
        /// The imported symbol.
        symbol: String,
        /// The module it was imported from.
        from_module: String,
    },
    /// Parameter instantiation never reached a fixed point.
    #[error("cyclic parameterized instantiation")]
    CyclicInstantiation,
    /// Two members or alternatives share an outer tag.
    #[error("duplicate tag {0}")]
    DuplicateTag(String),
    /// Two members of one constructed type share a name.
    #[error("duplicate member `{0}`")]
    DuplicateMember(String),
    /// Two modules share a name.
    #[error("duplicate module `{0}`")]
    DuplicateModule(String),
    /// A value does not fit the type that governs it.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// A constraint is empty, inverted or malformed.
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),
    /// A constraint extension without a root part.
    #[error("constraint extension without a root")]
    ExtensionWithoutRoot,
    /// A type reaches itself without an OPTIONAL or SEQUENCE OF/SET OF
    /// escape on the cycle.
    #[error("recursive type without an optional or repeated escape")]
    RecursionWithoutEscape,
    /// Wrong number or kind of actual parameters.
    #[error("parameter mismatch: {0}")]
    ParameterArity(String),
}

/// A resolution failure, identifying the offending module and definition.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{module}.{name}: {kind}")]
pub struct ResolveError {
    /// The failure.
    pub kind: ResolveErrorKind,
    /// Module being resolved.
    pub module: String,
    /// Definition being resolved.
    pub name: String,
}

impl ResolveError {
    /// Create an error for a definition.
    #[must_use]
    pub fn new(kind: ResolveErrorKind, module: &str, name: &str) -> Self {
        Self {
            kind,
            module: module.into(),
            name: name.into(),
        }
    }
}
