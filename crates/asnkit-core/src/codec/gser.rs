//! GSER encoder: the developer-oriented textual form (RFC 3641 flavor).
//!
//! Encode-only, mirroring the original toolkit: decoding GSER is not
//! supported and reports `UnsupportedCodec`.

use super::{
    enum_name_of, enum_number, shape_error, EncodeError, EncodeErrorKind, ErrorPath, PathSegment,
};
use crate::model::{Model, TypeId, TypeKind};
use crate::value::Value;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use num_traits::ToPrimitive;

/// Render `value` of type `id` as GSER text.
pub fn encode(model: &Model, id: TypeId, value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut path = Vec::new();
    if let Some(name) = model.node(id).name {
        path.push(PathSegment::Type(model.str(name).to_string()));
    }
    let mut encoder = Encoder {
        model,
        path,
        out: String::new(),
    };
    encoder.node(id, value)?;
    Ok(encoder.out.into_bytes())
}

struct Encoder<'m> {
    model: &'m Model,
    path: Vec<PathSegment>,
    out: String,
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

    #[allow(clippy::too_many_lines)]
    fn node(&mut self, id: TypeId, value: &Value) -> Result<(), EncodeError> {
        let model = self.model;
        let node = model.node(id);
        match &node.kind {
            TypeKind::Tagged { inner, .. } => self.node(*inner, value),
            TypeKind::Boolean => {
                let Value::Boolean(b) = value else {
                    return Err(shape_error("BOOLEAN", value, &self.path));
                };
                self.out.push_str(if *b { "TRUE" } else { "FALSE" });
                Ok(())
            }
            TypeKind::Null => {
                self.out.push_str("NULL");
                Ok(())
            }
            TypeKind::Integer { .. } => {
                let Value::Integer(v) = value else {
                    return Err(shape_error("INTEGER", value, &self.path));
                };
                self.out.push_str(&v.to_string());
                Ok(())
            }
            TypeKind::Enumerated { root, ext, .. } => {
                let Some((number, _)) = enum_number(model, root, ext, value) else {
                    return Err(shape_error("ENUMERATED", value, &self.path));
                };
                let (name, _) =
                    enum_name_of(model, root, ext, number).expect("number maps to a name");
                self.out.push_str(name);
                Ok(())
            }
            TypeKind::Real => {
                let v = match value {
                    Value::Real(v) => *v,
                    Value::Integer(v) => v.to_f64().unwrap_or(f64::NAN),
                    _ => return Err(shape_error("REAL", value, &self.path)),
                };
                if v == f64::INFINITY {
                    self.out.push_str("PLUS-INFINITY");
                } else if v == f64::NEG_INFINITY {
                    self.out.push_str("MINUS-INFINITY");
                } else if v.is_nan() {
                    self.out.push_str("NOT-A-NUMBER");
                } else {
                    self.out.push_str(&alloc::format!("{v}"));
                }
                Ok(())
            }
            TypeKind::BitString { .. } => {
                let Value::BitString(bs) = value else {
                    return Err(shape_error("BIT STRING", value, &self.path));
                };
                self.out.push('\'');
                for i in 0..bs.bit_len {
                    self.out.push(if bs.get(i) { '1' } else { '0' });
                }
                self.out.push_str("'B");
                Ok(())
            }
            TypeKind::OctetString | TypeKind::Any => {
                let Value::Bytes(bytes) = value else {
                    return Err(shape_error("bytes", value, &self.path));
                };
                self.out.push('\'');
                for b in bytes {
                    self.out.push_str(&alloc::format!("{b:02X}"));
                }
                self.out.push_str("'H");
                Ok(())
            }
            TypeKind::CharacterString(_) | TypeKind::Time(_) => {
                let Value::Text(s) = value else {
                    return Err(shape_error("text", value, &self.path));
                };
                self.out.push('"');
                self.out.push_str(&s.replace('"', "\"\""));
                self.out.push('"');
                Ok(())
            }
            TypeKind::ObjectIdentifier | TypeKind::RelativeOid => {
                let Value::ObjectIdentifier(components) = value else {
                    return Err(shape_error("OBJECT IDENTIFIER", value, &self.path));
                };
                let text: Vec<String> = components.iter().map(u64::to_string).collect();
                self.out.push_str(&text.join("."));
                Ok(())
            }
            TypeKind::Sequence(c) | TypeKind::Set(c) => {
                let Value::Sequence(given) = value else {
                    return Err(shape_error("SEQUENCE value", value, &self.path));
                };
                self.out.push_str("{ ");
                let mut first = true;
                for member in &c.members {
                    let name = model.str(member.name).to_string();
                    let Some(v) = given.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
                    else {
                        if !member.is_omittable() {
                            return Err(self.err(EncodeErrorKind::MissingMember(name)));
                        }
                        continue;
                    };
                    if !first {
                        self.out.push_str(", ");
                    }
                    first = false;
                    self.out.push_str(&name);
                    self.out.push(' ');
                    self.path.push(PathSegment::Member(name));
                    self.node(member.ty, v)?;
                    self.path.pop();
                }
                self.out.push_str(if first { "}" } else { " }" });
                Ok(())
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
                self.out.push_str(selector);
                self.out.push_str(" : ");
                self.path.push(PathSegment::Member(selector.clone()));
                let result = self.node(member.ty, inner);
                self.path.pop();
                result
            }
            TypeKind::SequenceOf { element } | TypeKind::SetOf { element } => {
                let Value::List(items) = value else {
                    return Err(shape_error("list", value, &self.path));
                };
                self.out.push_str("{ ");
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        self.out.push_str(", ");
                    }
                    self.path.push(PathSegment::Index(idx));
                    self.node(*element, item)?;
                    self.path.pop();
                }
                self.out.push_str(if items.is_empty() { "}" } else { " }" });
                Ok(())
            }
        }
    }
}
