//! Common AST building blocks.

use crate::lexer::Span;
use alloc::string::String;
use core::fmt;

/// An identifier with its source span.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    /// The identifier text.
    pub name: String,
    /// Location in source text.
    pub span: Span,
}

impl Ident {
    /// Create a new identifier.
    #[must_use]
    pub const fn new(name: String, span: Span) -> Self {
        Self { name, span }
    }

    /// Check if this is an uppercase-initial identifier (type reference).
    #[must_use]
    pub fn is_uppercase(&self) -> bool {
        self.name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase())
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
