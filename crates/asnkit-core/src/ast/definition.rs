//! Top-level assignment AST types.

use super::{AstType, AstValue, Ident};
use crate::lexer::Span;
use alloc::boxed::Box;
use alloc::vec::Vec;

/// A top-level definition in a module body.
#[derive(Clone, Debug)]
pub enum Definition {
    /// `Name ::= Type` (possibly parameterized).
    Type(TypeAssignment),
    /// `name Type ::= value`.
    Value(ValueAssignment),
}

impl Definition {
    /// The defined name.
    #[must_use]
    pub fn name(&self) -> &Ident {
        match self {
            Self::Type(t) => &t.name,
            Self::Value(v) => &v.name,
        }
    }
}

/// A formal parameter of a parameterized assignment.
///
/// `A { T, INTEGER: n } ::= ...` has one type parameter `T` (no governor)
/// and one value parameter `n` governed by `INTEGER`.
#[derive(Clone, Debug)]
pub struct ParamDecl {
    /// Governor type for value parameters; `None` for type parameters.
    pub governor: Option<Box<AstType>>,
    /// Parameter name.
    pub name: Ident,
}

impl ParamDecl {
    /// Check if this is a type parameter.
    #[must_use]
    pub fn is_type_param(&self) -> bool {
        self.governor.is_none()
    }
}

/// `Name ::= Type`, with an optional formal parameter list.
#[derive(Clone, Debug)]
pub struct TypeAssignment {
    /// Defined type name.
    pub name: Ident,
    /// Formal parameters; empty for a plain assignment.
    pub params: Vec<ParamDecl>,
    /// The assigned type, unresolved.
    pub ty: AstType,
    /// Location of the assignment.
    pub span: Span,
}

/// `name Type ::= value`.
#[derive(Clone, Debug)]
pub struct ValueAssignment {
    /// Defined value name.
    pub name: Ident,
    /// The governing type, unresolved.
    pub ty: AstType,
    /// The assigned value, unresolved.
    pub value: AstValue,
    /// Location of the assignment.
    pub span: Span,
}
