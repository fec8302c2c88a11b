//! Value notation AST.
//!
//! Braced values (`{ ... }`) are kept shape-agnostic: the same notation is an
//! OBJECT IDENTIFIER, a SEQUENCE value or a value list depending on the
//! governing type, which is only known at resolve time.

use super::Ident;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use num_bigint::BigInt;

/// Special REAL values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecialReal {
    /// `PLUS-INFINITY`
    PlusInfinity,
    /// `MINUS-INFINITY`
    MinusInfinity,
    /// `NOT-A-NUMBER`
    NotANumber,
}

/// An unresolved value as written in the source.
#[derive(Clone, Debug)]
pub enum AstValue {
    /// `TRUE` / `FALSE`.
    Boolean(bool),
    /// Integer literal, sign applied.
    Integer(BigInt),
    /// Real literal.
    Real(f64),
    /// `PLUS-INFINITY`, `MINUS-INFINITY`, `NOT-A-NUMBER`.
    SpecialReal(SpecialReal),
    /// `NULL`.
    Null,
    /// Quoted character string, quote escapes applied.
    Text(String),
    /// `'…'B` contents, whitespace stripped.
    BString(String),
    /// `'…'H` contents, whitespace stripped.
    HString(String),
    /// Value reference or enumeration identifier.
    Reference(Ident),
    /// `{ ... }` — OID components, named values, or a value list.
    Braced(Vec<BracedItem>),
    /// `selector : value` CHOICE notation.
    Choice {
        /// Alternative name.
        selector: Ident,
        /// Alternative payload.
        value: Box<AstValue>,
    },
}

/// One item of a braced value.
#[derive(Clone, Debug)]
pub enum BracedItem {
    /// A bare number (`2`).
    Number(BigInt),
    /// A bare name (`iso`, or a value reference).
    Name(Ident),
    /// `name(number)` OID component form.
    NameAndNumber(Ident, BigInt),
    /// `name value` named component (SEQUENCE/SET value notation).
    Named(Ident, AstValue),
    /// Any other value (value list element).
    Value(AstValue),
}
