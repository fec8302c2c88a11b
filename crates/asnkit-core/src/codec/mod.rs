//! Wire codec engines.
//!
//! Every codec consumes the frozen [`Model`](crate::model::Model) plus a
//! [`Value`](crate::value::Value) and produces or consumes octets. Codec
//! state (byte cursor, bit cursor, error path) is per-call; nothing is
//! shared or retained.
//!
//! Errors carry a *path* from the root type to the failing node, e.g.
//! `PersonnelRecord.children[2].name`.

pub mod ber;
pub mod gser;
pub mod jer;
pub mod oer;
pub mod per;
mod prim;
pub mod xer;

use crate::model::{Containment, TypeNode};
use crate::value::Value;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use num_bigint::BigInt;
use thiserror::Error;

/// One step of an error path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// A named type (the root, or a named subtype).
    Type(String),
    /// A SEQUENCE/SET member or CHOICE alternative.
    Member(String),
    /// An index into a SEQUENCE OF/SET OF.
    Index(usize),
}

/// The path from the root type to the failing node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorPath {
    /// Path segments, outermost first.
    pub segments: Vec<PathSegment>,
}

impl fmt::Display for ErrorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Type(name) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{name}")?;
                }
                PathSegment::Member(name) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{name}")?;
                }
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

/// What went wrong while encoding.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EncodeErrorKind {
    /// The value violates the type's (closed) constraint.
    #[error("value {value} violates constraint")]
    ConstraintViolation {
        /// Rendering of the offending value.
        value: String,
    },
    /// The value's shape does not fit the type.
    #[error("expected {expected}, found {found}")]
    ShapeMismatch {
        /// What the type required.
        expected: &'static str,
        /// What the value provided.
        found: &'static str,
    },
    /// A mandatory member is missing from the value.
    #[error("missing member `{0}`")]
    MissingMember(String),
    /// The value names a member the type does not have.
    #[error("unknown member `{0}`")]
    UnknownMember(String),
    /// The CHOICE selector names no alternative.
    #[error("unknown alternative `{0}`")]
    UnknownAlternative(String),
    /// A value the codec cannot represent.
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),
    /// The selected codec cannot encode at all (GSER decode direction and
    /// friends report the mirror image).
    #[error("codec does not support encoding")]
    UnsupportedCodec,
    /// `encode` was called with a type name the schema does not define.
    #[error("unknown type `{0}`")]
    UnknownType(String),
}

/// An encoding failure with its path.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{path}: {kind}")]
pub struct EncodeError {
    /// The failure.
    pub kind: EncodeErrorKind,
    /// Path from the root type.
    pub path: ErrorPath,
}

/// What went wrong while decoding.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DecodeErrorKind {
    /// The identifier octets do not match the expected tag.
    #[error("unexpected tag {found}, expected {expected}")]
    UnexpectedTag {
        /// Acceptable tags.
        expected: String,
        /// The tag found on the wire.
        found: String,
    },
    /// Indefinite length in DER input.
    #[error("indefinite length is forbidden in DER")]
    IndefiniteInDer,
    /// A length used more octets than needed, where the canonical form is
    /// required.
    #[error("non-minimal length encoding")]
    NonMinimalLength,
    /// The input ended before the encoding did.
    #[error("input exhausted")]
    OutOfBuffer,
    /// Character string contents are not valid UTF-8.
    #[error("invalid UTF-8 in string contents")]
    BadUtf8,
    /// Input remained after a complete top-level decode.
    #[error("trailing data after encoding")]
    TrailingData,
    /// Malformed contents.
    #[error("bad value: {0}")]
    BadValue(String),
    /// The decoded value violates the type's (closed) constraint.
    #[error("decoded value {value} violates constraint")]
    ConstraintViolation {
        /// Rendering of the offending value.
        value: String,
    },
    /// A CHOICE index or tag names no alternative.
    #[error("no alternative matches {0}")]
    UnknownChoice(String),
    /// A mandatory member is absent.
    #[error("missing member `{0}`")]
    MissingMember(String),
    /// The selected codec cannot decode at all.
    #[error("codec does not support decoding")]
    UnsupportedCodec,
    /// `decode` was called with a type name the schema does not define.
    #[error("unknown type `{0}`")]
    UnknownType(String),
}

/// A decoding failure with input offset and path.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{path} at offset {offset}: {kind}")]
pub struct DecodeError {
    /// The failure.
    pub kind: DecodeErrorKind,
    /// Byte offset into the input (bit offset / 8 for the bit codecs).
    pub offset: usize,
    /// Path from the root type.
    pub path: ErrorPath,
}

/// Check a scalar integer against the node's constraint; `Outside` is an
/// error, `Extension` tells extensible codecs to take the extension branch.
pub(crate) fn int_containment(node: &TypeNode, v: &BigInt) -> Option<Containment> {
    node.constraint.as_ref().map(|c| c.check_int(v))
}

/// Check a size (length in elements, octets, bits or characters).
pub(crate) fn size_containment(node: &TypeNode, n: u64) -> Option<Containment> {
    node.constraint.as_ref().map(|c| c.check_size(n))
}

/// Check string contents against a permitted alphabet.
pub(crate) fn alphabet_containment(node: &TypeNode, s: &str) -> Option<Containment> {
    node.constraint.as_ref().map(|c| c.check_alphabet(s))
}

/// Shape-check helper: the expected scalar wasn't there.
pub(crate) fn shape_error(expected: &'static str, value: &Value, path: &[PathSegment]) -> EncodeError {
    EncodeError {
        kind: EncodeErrorKind::ShapeMismatch {
            expected,
            found: value.kind_name(),
        },
        path: ErrorPath {
            segments: path.to_vec(),
        },
    }
}

/// Map an ENUMERATED value (name or number) to `(number, in_extension)`.
pub(crate) fn enum_number(
    model: &crate::model::Model,
    root: &[(crate::model::StrId, i64)],
    ext: &[(crate::model::StrId, i64)],
    value: &Value,
) -> Option<(i64, bool)> {
    match value {
        Value::Text(name) => {
            if let Some((_, v)) = root.iter().find(|(n, _)| model.str(*n) == name.as_str()) {
                return Some((*v, false));
            }
            ext.iter()
                .find(|(n, _)| model.str(*n) == name.as_str())
                .map(|(_, v)| (*v, true))
        }
        Value::Integer(number) => {
            use num_traits::ToPrimitive;
            let number = number.to_i64()?;
            if root.iter().any(|(_, v)| *v == number) {
                return Some((number, false));
            }
            if ext.iter().any(|(_, v)| *v == number) {
                return Some((number, true));
            }
            None
        }
        _ => None,
    }
}

/// Map an ENUMERATED number back to `(name, in_extension)`.
pub(crate) fn enum_name_of<'m>(
    model: &'m crate::model::Model,
    root: &[(crate::model::StrId, i64)],
    ext: &[(crate::model::StrId, i64)],
    number: i64,
) -> Option<(&'m str, bool)> {
    if let Some((n, _)) = root.iter().find(|(_, v)| *v == number) {
        return Some((model.str(*n), false));
    }
    ext.iter()
        .find(|(_, v)| *v == number)
        .map(|(n, _)| (model.str(*n), true))
}

/// Character string checks shared by the codecs: alphabet constraint and
/// per-kind character set.
pub(crate) fn text_checks(
    node: &TypeNode,
    kind: crate::model::StringKind,
    s: &str,
) -> Result<(), EncodeErrorKind> {
    if !prim::text_ok(kind, s) {
        return Err(EncodeErrorKind::UnsupportedValue(alloc::format!(
            "character outside the {} set",
            kind.as_str()
        )));
    }
    if alphabet_containment(node, s) == Some(Containment::Outside) {
        return Err(EncodeErrorKind::ConstraintViolation {
            value: alloc::format!("{s:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display() {
        let path = ErrorPath {
            segments: alloc::vec![
                PathSegment::Type("Record".into()),
                PathSegment::Member("children".into()),
                PathSegment::Index(2),
                PathSegment::Member("name".into()),
            ],
        };
        assert_eq!(alloc::format!("{path}"), "Record.children[2].name");
    }

    #[test]
    fn test_empty_path_display() {
        assert_eq!(alloc::format!("{}", ErrorPath::default()), "<root>");
    }
}
