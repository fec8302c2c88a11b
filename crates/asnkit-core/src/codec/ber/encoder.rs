//! BER/DER/CER encoder.
//!
//! Builds contents bottom-up: every node yields a `(tag, constructed,
//! contents)` triple, and tagging composes by replacing (IMPLICIT) or
//! wrapping (EXPLICIT) the triple. Assembly into identifier + length +
//! contents happens once per TLV.

use super::{length_octets, split_tlv, tag_octets, BerMode};
use crate::codec::prim;
use crate::codec::{
    enum_number, int_containment, shape_error, size_containment, text_checks, EncodeError,
    EncodeErrorKind, ErrorPath, PathSegment,
};
use crate::model::{
    Composite, Containment, Model, Tag, TagMode, TypeId, TypeKind, universal,
};
use crate::value::Value;
use alloc::string::ToString;
use alloc::vec::Vec;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Strings longer than this are segmented in CER.
const CER_SEGMENT: usize = 1000;

/// Encode `value` of type `id` into a complete TLV.
pub fn encode(
    model: &Model,
    mode: BerMode,
    id: TypeId,
    value: &Value,
) -> Result<Vec<u8>, EncodeError> {
    let mut path = Vec::new();
    if let Some(name) = model.node(id).name {
        path.push(PathSegment::Type(model.str(name).to_string()));
    }
    let mut encoder = Encoder { model, mode, path };
    let encoded = encoder.node(id, value)?;
    Ok(encoder.assemble(&encoded))
}

/// A value encoding before framing.
struct Encoded {
    tag: Tag,
    constructed: bool,
    contents: Vec<u8>,
}

struct Encoder<'m> {
    model: &'m Model,
    mode: BerMode,
    path: Vec<PathSegment>,
}

impl<'m> Encoder<'m> {
    fn err(&self, kind: EncodeErrorKind) -> EncodeError {
        EncodeError {
            kind,
            path: ErrorPath {
                segments: self.path.clone(),
            },
        }
    }

    fn constraint_violation(&self, value: &Value) -> EncodeError {
        self.err(EncodeErrorKind::ConstraintViolation {
            value: alloc::format!("{value:?}"),
        })
    }

    /// Frame a triple. CER uses the indefinite form for constructed values.
    fn assemble(&self, e: &Encoded) -> Vec<u8> {
        let mut out = tag_octets(e.tag, e.constructed);
        if self.mode == BerMode::Cer && e.constructed {
            out.push(0x80);
            out.extend_from_slice(&e.contents);
            out.push(0x00);
            out.push(0x00);
        } else {
            out.extend_from_slice(&length_octets(e.contents.len()));
            out.extend_from_slice(&e.contents);
        }
        out
    }

    fn check_size(&self, id: TypeId, n: u64, value: &Value) -> Result<(), EncodeError> {
        if size_containment(self.model.node(id), n) == Some(Containment::Outside) {
            return Err(self.constraint_violation(value));
        }
        Ok(())
    }

    /// Encode one node into a triple.
    #[allow(clippy::too_many_lines)]
    fn node(&mut self, id: TypeId, value: &Value) -> Result<Encoded, EncodeError> {
        let model = self.model;
        let node = model.node(id);
        let own_tag = node
            .kind
            .universal_tag()
            .unwrap_or(Tag::universal(0));

        match &node.kind {
            TypeKind::Tagged { tag, mode, inner } => match mode {
                TagMode::Implicit => {
                    let mut e = self.node(*inner, value)?;
                    e.tag = *tag;
                    Ok(e)
                }
                TagMode::Explicit => {
                    let inner_e = self.node(*inner, value)?;
                    let contents = self.assemble(&inner_e);
                    Ok(Encoded {
                        tag: *tag,
                        constructed: true,
                        contents,
                    })
                }
            },
            TypeKind::Boolean => {
                let Value::Boolean(b) = value else {
                    return Err(shape_error("BOOLEAN", value, &self.path));
                };
                Ok(Encoded {
                    tag: own_tag,
                    constructed: false,
                    contents: alloc::vec![if *b { 0xff } else { 0x00 }],
                })
            }
            TypeKind::Integer { .. } => {
                let Value::Integer(v) = value else {
                    return Err(shape_error("INTEGER", value, &self.path));
                };
                if int_containment(node, v) == Some(Containment::Outside) {
                    return Err(self.constraint_violation(value));
                }
                Ok(Encoded {
                    tag: own_tag,
                    constructed: false,
                    contents: prim::int_to_bytes(v),
                })
            }
            TypeKind::Enumerated { root, ext, .. } => {
                let (number, _) = enum_number(model, root, ext, value)
                    .ok_or_else(|| shape_error("ENUMERATED", value, &self.path))?;
                Ok(Encoded {
                    tag: own_tag,
                    constructed: false,
                    contents: prim::int_to_bytes(&BigInt::from(number)),
                })
            }
            TypeKind::Real => {
                let v = match value {
                    Value::Real(v) => *v,
                    Value::Integer(v) => v.to_f64().unwrap_or(f64::NAN),
                    _ => return Err(shape_error("REAL", value, &self.path)),
                };
                Ok(Encoded {
                    tag: own_tag,
                    constructed: false,
                    contents: prim::real_to_bytes(v),
                })
            }
            TypeKind::Null => {
                let Value::Null = value else {
                    return Err(shape_error("NULL", value, &self.path));
                };
                Ok(Encoded {
                    tag: own_tag,
                    constructed: false,
                    contents: Vec::new(),
                })
            }
            TypeKind::BitString { named } => {
                let Value::BitString(bs) = value else {
                    return Err(shape_error("BIT STRING", value, &self.path));
                };
                self.check_size(id, bs.bit_len as u64, value)?;
                let mut bs = bs.clone();
                bs.normalize();
                if self.mode.is_canonical() && !named.is_empty() {
                    // Named bit lists drop trailing zero bits in DER/CER.
                    while bs.bit_len > 0 && !bs.get(bs.bit_len - 1) {
                        bs.bit_len -= 1;
                    }
                    bs.normalize();
                }
                let mut contents = alloc::vec![bs.unused_bits()];
                contents.extend_from_slice(&bs.data);
                if self.mode == BerMode::Cer && contents.len() > CER_SEGMENT {
                    return Ok(self.segmented_bits(own_tag, &bs));
                }
                Ok(Encoded {
                    tag: own_tag,
                    constructed: false,
                    contents,
                })
            }
            TypeKind::OctetString => {
                let Value::Bytes(bytes) = value else {
                    return Err(shape_error("OCTET STRING", value, &self.path));
                };
                self.check_size(id, bytes.len() as u64, value)?;
                if self.mode == BerMode::Cer && bytes.len() > CER_SEGMENT {
                    return Ok(self.segmented_octets(own_tag, bytes));
                }
                Ok(Encoded {
                    tag: own_tag,
                    constructed: false,
                    contents: bytes.clone(),
                })
            }
            TypeKind::CharacterString(kind) => {
                let Value::Text(s) = value else {
                    return Err(shape_error("character string", value, &self.path));
                };
                text_checks(node, *kind, s)
                    .map_err(|kind| self.err(kind))?;
                self.check_size(id, s.chars().count() as u64, value)?;
                let contents = prim::text_to_bytes(*kind, s);
                if self.mode == BerMode::Cer && contents.len() > CER_SEGMENT {
                    return Ok(self.segmented_octets(own_tag, &contents));
                }
                Ok(Encoded {
                    tag: own_tag,
                    constructed: false,
                    contents,
                })
            }
            TypeKind::Time(_) => {
                let Value::Text(s) = value else {
                    return Err(shape_error("time string", value, &self.path));
                };
                Ok(Encoded {
                    tag: own_tag,
                    constructed: false,
                    contents: s.as_bytes().to_vec(),
                })
            }
            TypeKind::ObjectIdentifier | TypeKind::RelativeOid => {
                let Value::ObjectIdentifier(components) = value else {
                    return Err(shape_error("OBJECT IDENTIFIER", value, &self.path));
                };
                let relative = matches!(node.kind, TypeKind::RelativeOid);
                let contents = prim::oid_to_bytes(components, relative)
                    .map_err(|msg| self.err(EncodeErrorKind::UnsupportedValue(msg)))?;
                Ok(Encoded {
                    tag: own_tag,
                    constructed: false,
                    contents,
                })
            }
            TypeKind::Any => {
                let Value::Bytes(bytes) = value else {
                    return Err(shape_error("opaque bytes", value, &self.path));
                };
                let Some((tag, constructed, contents, used)) = split_tlv(bytes) else {
                    return Err(self.err(EncodeErrorKind::UnsupportedValue(
                        "open type value must be one complete encoding".into(),
                    )));
                };
                if used != bytes.len() {
                    return Err(self.err(EncodeErrorKind::UnsupportedValue(
                        "open type value must be one complete encoding".into(),
                    )));
                }
                Ok(Encoded {
                    tag,
                    constructed,
                    contents: contents.to_vec(),
                })
            }
            TypeKind::Sequence(c) => {
                let contents = self.members(c, value, false)?;
                Ok(Encoded {
                    tag: own_tag,
                    constructed: true,
                    contents,
                })
            }
            TypeKind::Set(c) => {
                let contents = self.members(c, value, self.mode.is_canonical())?;
                Ok(Encoded {
                    tag: own_tag,
                    constructed: true,
                    contents,
                })
            }
            TypeKind::Choice(c) => {
                let Value::Choice(selector, inner) = value else {
                    return Err(shape_error("CHOICE", value, &self.path));
                };
                let member = c
                    .members
                    .iter()
                    .find(|m| model.str(m.name) == selector.as_str())
                    .ok_or_else(|| {
                        self.err(EncodeErrorKind::UnknownAlternative(selector.clone()))
                    })?;
                self.path.push(PathSegment::Member(selector.clone()));
                let encoded = self.node(member.ty, inner);
                self.path.pop();
                encoded
            }
            TypeKind::SequenceOf { element } | TypeKind::SetOf { element } => {
                let Value::List(items) = value else {
                    return Err(shape_error("list", value, &self.path));
                };
                self.check_size(id, items.len() as u64, value)?;
                let sort = matches!(node.kind, TypeKind::SetOf { .. })
                    && self.mode.is_canonical();
                let mut encodings = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    self.path.push(PathSegment::Index(idx));
                    let e = self.node(*element, item)?;
                    encodings.push(self.assemble(&e));
                    self.path.pop();
                }
                if sort {
                    // X.690 11.6: SET OF elements ordered as octet strings.
                    encodings.sort();
                }
                let contents = encodings.concat();
                Ok(Encoded {
                    tag: own_tag,
                    constructed: true,
                    contents,
                })
            }
        }
    }

    /// Encode SEQUENCE/SET members; `sort` applies the DER SET tag order.
    fn members(
        &mut self,
        composite: &Composite,
        value: &Value,
        sort: bool,
    ) -> Result<Vec<u8>, EncodeError> {
        let model = self.model;
        let Value::Sequence(given) = value else {
            return Err(shape_error("SEQUENCE value", value, &self.path));
        };
        for (name, _) in given {
            if !composite
                .members
                .iter()
                .any(|m| model.str(m.name) == name.as_str())
            {
                return Err(self.err(EncodeErrorKind::UnknownMember(name.clone())));
            }
        }

        let mut parts: Vec<(Tag, Vec<u8>)> = Vec::new();
        for member in &composite.members {
            let name = model.str(member.name);
            let given_value = given.iter().find(|(n, _)| n == name).map(|(_, v)| v);
            match given_value {
                Some(v) => {
                    // A member equal to its default is omitted (required in
                    // DER, permitted in BER).
                    if member.default.as_ref() == Some(v) {
                        continue;
                    }
                    self.path.push(PathSegment::Member(name.to_string()));
                    let encoded = self.node(member.ty, v)?;
                    let framed = self.assemble(&encoded);
                    parts.push((encoded.tag, framed));
                    self.path.pop();
                }
                None => {
                    if !member.is_omittable() {
                        return Err(
                            self.err(EncodeErrorKind::MissingMember(name.to_string()))
                        );
                    }
                }
            }
        }
        if sort {
            parts.sort_by_key(|(tag, _)| *tag);
        }
        Ok(parts.into_iter().flat_map(|(_, bytes)| bytes).collect())
    }

    /// CER segmentation: a constructed string of primitive 1000-octet
    /// OCTET STRING segments.
    fn segmented_octets(&self, tag: Tag, data: &[u8]) -> Encoded {
        let mut contents = Vec::new();
        for chunk in data.chunks(CER_SEGMENT) {
            contents.extend_from_slice(&tag_octets(Tag::universal(universal::OCTET_STRING), false));
            contents.extend_from_slice(&length_octets(chunk.len()));
            contents.extend_from_slice(chunk);
        }
        Encoded {
            tag,
            constructed: true,
            contents,
        }
    }

    /// CER segmentation for BIT STRING: every segment but the last has zero
    /// unused bits.
    fn segmented_bits(&self, tag: Tag, bs: &crate::value::BitString) -> Encoded {
        let mut contents = Vec::new();
        let full_chunks = bs.data.chunks(CER_SEGMENT - 1).collect::<Vec<_>>();
        for (i, chunk) in full_chunks.iter().enumerate() {
            let last = i == full_chunks.len() - 1;
            let unused = if last { bs.unused_bits() } else { 0 };
            contents.extend_from_slice(&tag_octets(Tag::universal(universal::BIT_STRING), false));
            contents.extend_from_slice(&length_octets(chunk.len() + 1));
            contents.push(unused);
            contents.extend_from_slice(chunk);
        }
        Encoded {
            tag,
            constructed: true,
            contents,
        }
    }
}
