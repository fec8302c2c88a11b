//! The finalized type representation shared by every codec.

use super::constraint::Constraint;
use super::hints::EncodingHints;
use super::ids::{StrId, TypeId};
use super::tag::{universal, Tag, TagMode};
use crate::value::Value;
use alloc::vec::Vec;

/// Restricted character string kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StringKind {
    /// UTF8String
    Utf8,
    /// NumericString
    Numeric,
    /// PrintableString
    Printable,
    /// TeletexString (T61String)
    Teletex,
    /// IA5String
    Ia5,
    /// GraphicString
    Graphic,
    /// VisibleString (ISO646String)
    Visible,
    /// GeneralString
    General,
    /// UniversalString
    Universal,
    /// BMPString
    Bmp,
    /// ObjectDescriptor (a GraphicString with its own tag)
    ObjectDescriptor,
}

impl StringKind {
    /// The UNIVERSAL tag number.
    #[must_use]
    pub const fn universal_tag(self) -> u32 {
        match self {
            Self::Utf8 => universal::UTF8_STRING,
            Self::Numeric => universal::NUMERIC_STRING,
            Self::Printable => universal::PRINTABLE_STRING,
            Self::Teletex => universal::TELETEX_STRING,
            Self::Ia5 => universal::IA5_STRING,
            Self::Graphic => universal::GRAPHIC_STRING,
            Self::Visible => universal::VISIBLE_STRING,
            Self::General => universal::GENERAL_STRING,
            Self::Universal => universal::UNIVERSAL_STRING,
            Self::Bmp => universal::BMP_STRING,
            Self::ObjectDescriptor => universal::OBJECT_DESCRIPTOR,
        }
    }

    /// The notation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF8String",
            Self::Numeric => "NumericString",
            Self::Printable => "PrintableString",
            Self::Teletex => "TeletexString",
            Self::Ia5 => "IA5String",
            Self::Graphic => "GraphicString",
            Self::Visible => "VisibleString",
            Self::General => "GeneralString",
            Self::Universal => "UniversalString",
            Self::Bmp => "BMPString",
            Self::ObjectDescriptor => "ObjectDescriptor",
        }
    }
}

/// Time type kinds. Values are carried as text; the codecs encode them as
/// the corresponding character string contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeKind {
    /// UTCTime
    UtcTime,
    /// GeneralizedTime
    GeneralizedTime,
    /// DATE
    Date,
    /// TIME-OF-DAY
    TimeOfDay,
    /// DATE-TIME
    DateTime,
}

impl TimeKind {
    /// The UNIVERSAL tag number.
    #[must_use]
    pub const fn universal_tag(self) -> u32 {
        match self {
            Self::UtcTime => universal::UTC_TIME,
            Self::GeneralizedTime => universal::GENERALIZED_TIME,
            Self::Date => universal::DATE,
            Self::TimeOfDay => universal::TIME_OF_DAY,
            Self::DateTime => universal::DATE_TIME,
        }
    }

    /// The notation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UtcTime => "UTCTime",
            Self::GeneralizedTime => "GeneralizedTime",
            Self::Date => "DATE",
            Self::TimeOfDay => "TIME-OF-DAY",
            Self::DateTime => "DATE-TIME",
        }
    }
}

/// A member of a SEQUENCE or SET, or an alternative of a CHOICE.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Member {
    /// Member name, unique within the parent.
    pub name: StrId,
    /// Member type.
    pub ty: TypeId,
    /// `OPTIONAL` member.
    pub optional: bool,
    /// Folded `DEFAULT` value.
    pub default: Option<Value>,
    /// Extension addition group: 0 is the extension root, k >= 1 the k-th
    /// addition (a `[[ ... ]]` group shares one index).
    pub ext_group: u32,
}

impl Member {
    /// Check if this member belongs to the extension root.
    #[must_use]
    pub const fn in_root(&self) -> bool {
        self.ext_group == 0
    }

    /// Check if the member may be absent from an encoding.
    #[must_use]
    pub const fn is_omittable(&self) -> bool {
        self.optional || self.default.is_some()
    }
}

/// The member list of a constructed type.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Composite {
    /// Members in declaration order, root first, then additions.
    pub members: Vec<Member>,
    /// An extension marker was present.
    pub extensible: bool,
}

impl Composite {
    /// Iterate the extension-root members.
    pub fn root_members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| m.in_root())
    }

    /// Iterate the extension addition members.
    pub fn ext_members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| !m.in_root())
    }

    /// Number of extension addition groups.
    #[must_use]
    pub fn ext_group_count(&self) -> u32 {
        self.members.iter().map(|m| m.ext_group).max().unwrap_or(0)
    }

    /// Members of one extension addition group.
    pub fn ext_group(&self, group: u32) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(move |m| m.ext_group == group)
    }
}

/// The finalized type variants.
///
/// References and parameterized types never appear here: the resolver
/// reduces them to arena edges (`TypeId`) and concrete nodes.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeKind {
    /// BOOLEAN
    Boolean,
    /// INTEGER with optional named numbers.
    Integer {
        /// `(name, value)` named numbers.
        named: Vec<(StrId, i64)>,
    },
    /// REAL
    Real,
    /// NULL
    Null,
    /// ENUMERATED
    Enumerated {
        /// Root items in declaration order.
        root: Vec<(StrId, i64)>,
        /// Extension items.
        ext: Vec<(StrId, i64)>,
        /// An extension marker was present.
        extensible: bool,
    },
    /// BIT STRING with optional named bits.
    BitString {
        /// `(name, bit position)` named bits.
        named: Vec<(StrId, u32)>,
    },
    /// OCTET STRING
    OctetString,
    /// OBJECT IDENTIFIER
    ObjectIdentifier,
    /// RELATIVE-OID
    RelativeOid,
    /// A restricted character string.
    CharacterString(StringKind),
    /// A time type.
    Time(TimeKind),
    /// ANY: an opaque, self-delimiting payload.
    Any,
    /// SEQUENCE
    Sequence(Composite),
    /// SET
    Set(Composite),
    /// CHOICE
    Choice(Composite),
    /// SEQUENCE OF
    SequenceOf {
        /// Element type.
        element: TypeId,
    },
    /// SET OF
    SetOf {
        /// Element type.
        element: TypeId,
    },
    /// A tagged type.
    Tagged {
        /// The tag.
        tag: Tag,
        /// EXPLICIT wraps, IMPLICIT replaces.
        mode: TagMode,
        /// The tagged type.
        inner: TypeId,
    },
}

impl TypeKind {
    /// The intrinsic UNIVERSAL tag, if the variant has one.
    ///
    /// CHOICE, ANY and `Tagged` have none: a CHOICE takes the tag of its
    /// chosen alternative and `Tagged` carries its own.
    #[must_use]
    pub fn universal_tag(&self) -> Option<Tag> {
        let number = match self {
            Self::Boolean => universal::BOOLEAN,
            Self::Integer { .. } => universal::INTEGER,
            Self::Real => universal::REAL,
            Self::Null => universal::NULL,
            Self::Enumerated { .. } => universal::ENUMERATED,
            Self::BitString { .. } => universal::BIT_STRING,
            Self::OctetString => universal::OCTET_STRING,
            Self::ObjectIdentifier => universal::OBJECT_IDENTIFIER,
            Self::RelativeOid => universal::RELATIVE_OID,
            Self::CharacterString(kind) => kind.universal_tag(),
            Self::Time(kind) => kind.universal_tag(),
            Self::Sequence(_) | Self::SequenceOf { .. } => universal::SEQUENCE,
            Self::Set(_) | Self::SetOf { .. } => universal::SET,
            Self::Choice(_) | Self::Any | Self::Tagged { .. } => return None,
        };
        Some(Tag::universal(number))
    }

    /// A short notation name for error paths.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Integer { .. } => "INTEGER",
            Self::Real => "REAL",
            Self::Null => "NULL",
            Self::Enumerated { .. } => "ENUMERATED",
            Self::BitString { .. } => "BIT STRING",
            Self::OctetString => "OCTET STRING",
            Self::ObjectIdentifier => "OBJECT IDENTIFIER",
            Self::RelativeOid => "RELATIVE-OID",
            Self::CharacterString(kind) => kind.as_str(),
            Self::Time(kind) => kind.as_str(),
            Self::Any => "ANY",
            Self::Sequence(_) => "SEQUENCE",
            Self::Set(_) => "SET",
            Self::Choice(_) => "CHOICE",
            Self::SequenceOf { .. } => "SEQUENCE OF",
            Self::SetOf { .. } => "SET OF",
            Self::Tagged { .. } => "tagged",
        }
    }
}

/// One node of the type arena.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeNode {
    /// The assignment name, for top-level types.
    pub name: Option<StrId>,
    /// The defining module, for top-level types.
    pub module: Option<StrId>,
    /// The type variant.
    pub kind: TypeKind,
    /// Merged constraint, if any.
    pub constraint: Option<Constraint>,
    /// Derived encoding hints.
    pub hints: EncodingHints,
}

impl TypeNode {
    /// Create an anonymous node with no constraint.
    #[must_use]
    pub fn new(kind: TypeKind) -> Self {
        Self {
            name: None,
            module: None,
            kind,
            constraint: None,
            hints: EncodingHints::default(),
        }
    }
}
