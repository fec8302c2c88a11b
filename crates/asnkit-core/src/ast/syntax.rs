//! Type notation AST.

use super::{AstValue, ConstraintSpec, Ident};
use crate::model::{StringKind, TagClass, TagMode, TimeKind};
use alloc::boxed::Box;
use alloc::vec::Vec;

/// A named number of an INTEGER or a named bit of a BIT STRING.
#[derive(Clone, Debug)]
pub struct NamedNumber {
    /// The name.
    pub name: Ident,
    /// Number or integer value reference.
    pub value: AstValue,
}

/// One item of an ENUMERATED list.
#[derive(Clone, Debug)]
pub struct EnumItem {
    /// Enumeration identifier.
    pub name: Ident,
    /// Explicit number, if written.
    pub value: Option<AstValue>,
}

/// A named component of a SEQUENCE, SET or CHOICE.
#[derive(Clone, Debug)]
pub struct Component {
    /// Component name.
    pub name: Ident,
    /// Component type, unresolved.
    pub ty: AstType,
    /// `OPTIONAL` was present.
    pub optional: bool,
    /// `DEFAULT value`, if present.
    pub default: Option<AstValue>,
}

/// An ordered element of a component list, including markers.
#[derive(Clone, Debug)]
pub enum Element {
    /// A named component.
    Component(Component),
    /// `...` extension marker.
    ExtensionMarker,
    /// `[[ ... ]]` extension addition group.
    ExtensionGroup(Vec<Component>),
    /// `COMPONENTS OF Type`.
    ComponentsOf(AstType),
}

/// An actual parameter of a parameterized reference.
#[derive(Clone, Debug)]
pub enum Actual {
    /// A type actual (`A { INTEGER }`).
    Type(AstType),
    /// A value actual (`A { 42 }`).
    Value(AstValue),
}

/// An unresolved type as written in the source.
#[derive(Clone, Debug)]
pub enum AstType {
    /// `BOOLEAN`
    Boolean,
    /// `REAL`
    Real,
    /// `NULL`
    Null,
    /// `ANY` / `ANY DEFINED BY identifier`
    Any,
    /// `EXTERNAL`
    External,
    /// `EMBEDDED PDV`
    EmbeddedPdv,
    /// `ObjectDescriptor`
    ObjectDescriptor,
    /// `OBJECT IDENTIFIER`
    ObjectIdentifier,
    /// `RELATIVE-OID`
    RelativeOid,
    /// `OCTET STRING`
    OctetString,
    /// `INTEGER`, with optional named numbers.
    Integer {
        /// `{ a(1), b(2) }` named numbers.
        named: Vec<NamedNumber>,
    },
    /// `BIT STRING`, with optional named bits.
    BitString {
        /// `{ a(0), b(1) }` named bits.
        named: Vec<NamedNumber>,
    },
    /// `ENUMERATED { ... }`.
    Enumerated {
        /// Root enumeration items.
        root: Vec<EnumItem>,
        /// An extension marker was present.
        extensible: bool,
        /// Items after the extension marker.
        ext: Vec<EnumItem>,
    },
    /// A restricted character string type.
    CharacterString(StringKind),
    /// A time type.
    Time(TimeKind),
    /// `SEQUENCE { ... }`
    Sequence {
        /// Ordered elements, including extension markers and groups.
        elements: Vec<Element>,
    },
    /// `SET { ... }`
    Set {
        /// Ordered elements, including extension markers and groups.
        elements: Vec<Element>,
    },
    /// `CHOICE { ... }`
    Choice {
        /// Ordered alternatives, including extension markers and groups.
        elements: Vec<Element>,
    },
    /// `SEQUENCE OF Type`
    SequenceOf(Box<AstType>),
    /// `SET OF Type`
    SetOf(Box<AstType>),
    /// A type reference, optionally module-qualified and/or parameterized.
    Reference {
        /// `Module.Type` external reference module.
        module: Option<Ident>,
        /// Referenced type name.
        name: Ident,
        /// Actual parameters (`A { INTEGER, 5 }`); empty for plain references.
        actuals: Vec<Actual>,
    },
    /// `[class number] EXPLICIT|IMPLICIT Type`
    Tagged {
        /// Tag class; `None` means CONTEXT.
        class: Option<TagClass>,
        /// Tag number; a reference when parameterized.
        number: Box<AstValue>,
        /// Written tagging mode; `None` defers to the module default.
        mode: Option<TagMode>,
        /// The tagged type.
        inner: Box<AstType>,
    },
    /// `Type (constraint)`
    Constrained {
        /// The constrained type.
        inner: Box<AstType>,
        /// The parenthesized constraint.
        constraint: ConstraintSpec,
    },
}
