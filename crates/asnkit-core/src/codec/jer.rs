//! JER codec: JSON encoding of the value model (X.697 flavor).
//!
//! Scalars map to their JSON natural forms; BIT STRING carries its bit
//! count alongside upper-case hex; OCTET STRING and open types are hex
//! strings; CHOICE is a single-key object; REAL specials are the strings
//! `"INF"`, `"-INF"` and `"NaN"`.

use super::{
    enum_name_of, enum_number, int_containment, shape_error, size_containment, DecodeError,
    DecodeErrorKind, EncodeError, EncodeErrorKind, ErrorPath, PathSegment,
};
use crate::model::{Containment, Model, TypeId, TypeKind};
use crate::value::{BitString, Value};
use alloc::borrow::ToOwned;
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde_json::{json, Map, Number};

/// Encode `value` of type `id` as JSON text.
pub fn encode(
    model: &Model,
    id: TypeId,
    value: &Value,
    numeric_enums: bool,
) -> Result<Vec<u8>, EncodeError> {
    let mut path = Vec::new();
    if let Some(name) = model.node(id).name {
        path.push(PathSegment::Type(model.str(name).to_string()));
    }
    let mut encoder = Encoder {
        model,
        numeric_enums,
        path,
    };
    let json = encoder.node(id, value)?;
    serde_json::to_vec(&json).map_err(|e| EncodeError {
        kind: EncodeErrorKind::UnsupportedValue(e.to_string()),
        path: ErrorPath::default(),
    })
}

/// Decode JSON text into a value of type `id`.
pub fn decode(
    model: &Model,
    id: TypeId,
    data: &[u8],
    numeric_enums: bool,
) -> Result<Value, DecodeError> {
    let mut path = Vec::new();
    if let Some(name) = model.node(id).name {
        path.push(PathSegment::Type(model.str(name).to_string()));
    }
    let json: serde_json::Value = serde_json::from_slice(data).map_err(|e| DecodeError {
        kind: DecodeErrorKind::BadValue(e.to_string()),
        offset: 0,
        path: ErrorPath::default(),
    })?;
    let mut decoder = Decoder {
        model,
        numeric_enums,
        path,
    };
    decoder.node(id, &json)
}

fn hex_upper(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(char::from_digit((b >> 4).into(), 16).expect("nibble").to_ascii_uppercase());
        out.push(char::from_digit((b & 0xf).into(), 16).expect("nibble").to_ascii_uppercase());
    }
    out
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let mut chars = s.chars();
    while let (Some(hi), Some(lo)) = (chars.next(), chars.next()) {
        let hi = hi.to_digit(16)?;
        let lo = lo.to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
    }
    Some(out)
}

struct Encoder<'m> {
    model: &'m Model,
    numeric_enums: bool,
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

    fn int_json(v: &BigInt) -> serde_json::Value {
        if let Some(n) = v.to_i64() {
            return serde_json::Value::Number(Number::from(n));
        }
        if let Some(n) = v.to_u64() {
            return serde_json::Value::Number(Number::from(n));
        }
        serde_json::Value::String(v.to_string())
    }

    #[allow(clippy::too_many_lines)]
    fn node(&mut self, id: TypeId, value: &Value) -> Result<serde_json::Value, EncodeError> {
        let model = self.model;
        let node = model.node(id);
        match &node.kind {
            TypeKind::Tagged { inner, .. } => self.node(*inner, value),
            TypeKind::Boolean => match value {
                Value::Boolean(b) => Ok(json!(b)),
                _ => Err(shape_error("BOOLEAN", value, &self.path)),
            },
            TypeKind::Null => match value {
                Value::Null => Ok(serde_json::Value::Null),
                _ => Err(shape_error("NULL", value, &self.path)),
            },
            TypeKind::Integer { .. } => {
                let Value::Integer(v) = value else {
                    return Err(shape_error("INTEGER", value, &self.path));
                };
                if int_containment(node, v) == Some(Containment::Outside) {
                    return Err(self.constraint_violation(value));
                }
                Ok(Self::int_json(v))
            }
            TypeKind::Enumerated { root, ext, .. } => {
                let Some((number, _)) = enum_number(model, root, ext, value) else {
                    return Err(shape_error("ENUMERATED", value, &self.path));
                };
                if self.numeric_enums {
                    Ok(json!(number))
                } else {
                    let (name, _) =
                        enum_name_of(model, root, ext, number).expect("number maps to a name");
                    Ok(json!(name))
                }
            }
            TypeKind::Real => {
                let v = match value {
                    Value::Real(v) => *v,
                    Value::Integer(v) => v.to_f64().unwrap_or(f64::NAN),
                    _ => return Err(shape_error("REAL", value, &self.path)),
                };
                if v.is_infinite() {
                    return Ok(json!(if v > 0.0 { "INF" } else { "-INF" }));
                }
                if v.is_nan() {
                    return Ok(json!("NaN"));
                }
                Ok(json!(v))
            }
            TypeKind::BitString { .. } => {
                let Value::BitString(bs) = value else {
                    return Err(shape_error("BIT STRING", value, &self.path));
                };
                if size_containment(node, bs.bit_len as u64) == Some(Containment::Outside) {
                    return Err(self.constraint_violation(value));
                }
                let mut bs = bs.clone();
                bs.normalize();
                Ok(json!({ "value": hex_upper(&bs.data), "length": bs.bit_len }))
            }
            TypeKind::OctetString | TypeKind::Any => {
                let Value::Bytes(bytes) = value else {
                    return Err(shape_error("bytes", value, &self.path));
                };
                if size_containment(node, bytes.len() as u64) == Some(Containment::Outside) {
                    return Err(self.constraint_violation(value));
                }
                Ok(json!(hex_upper(bytes)))
            }
            TypeKind::CharacterString(_) | TypeKind::Time(_) => {
                let Value::Text(s) = value else {
                    return Err(shape_error("text", value, &self.path));
                };
                if size_containment(node, s.chars().count() as u64)
                    == Some(Containment::Outside)
                {
                    return Err(self.constraint_violation(value));
                }
                Ok(json!(s))
            }
            TypeKind::ObjectIdentifier | TypeKind::RelativeOid => {
                let Value::ObjectIdentifier(components) = value else {
                    return Err(shape_error("OBJECT IDENTIFIER", value, &self.path));
                };
                let text: Vec<String> = components.iter().map(u64::to_string).collect();
                Ok(json!(text.join(".")))
            }
            TypeKind::Sequence(c) | TypeKind::Set(c) => {
                let Value::Sequence(given) = value else {
                    return Err(shape_error("SEQUENCE value", value, &self.path));
                };
                for (name, _) in given {
                    if !c.members.iter().any(|m| model.str(m.name) == name.as_str()) {
                        return Err(self.err(EncodeErrorKind::UnknownMember(name.clone())));
                    }
                }
                let mut map = Map::new();
                for member in &c.members {
                    let name = model.str(member.name);
                    match given.iter().find(|(n, _)| n == name).map(|(_, v)| v) {
                        Some(v) => {
                            if member.default.as_ref() == Some(v) {
                                continue;
                            }
                            self.path.push(PathSegment::Member(name.to_owned()));
                            let json = self.node(member.ty, v)?;
                            self.path.pop();
                            map.insert(name.to_owned(), json);
                        }
                        None => {
                            if !member.is_omittable() {
                                return Err(self.err(EncodeErrorKind::MissingMember(
                                    name.to_owned(),
                                )));
                            }
                        }
                    }
                }
                Ok(serde_json::Value::Object(map))
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
                let json = self.node(member.ty, inner)?;
                self.path.pop();
                let mut map = Map::new();
                map.insert(selector.clone(), json);
                Ok(serde_json::Value::Object(map))
            }
            TypeKind::SequenceOf { element } | TypeKind::SetOf { element } => {
                let Value::List(items) = value else {
                    return Err(shape_error("list", value, &self.path));
                };
                if size_containment(node, items.len() as u64) == Some(Containment::Outside) {
                    return Err(self.constraint_violation(value));
                }
                let mut out = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    self.path.push(PathSegment::Index(idx));
                    out.push(self.node(*element, item)?);
                    self.path.pop();
                }
                Ok(serde_json::Value::Array(out))
            }
        }
    }
}

struct Decoder<'m> {
    model: &'m Model,
    numeric_enums: bool,
    path: Vec<PathSegment>,
}

impl<'m> Decoder<'m> {
    fn err(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            kind,
            offset: 0,
            path: ErrorPath {
                segments: self.path.clone(),
            },
        }
    }

    fn bad(&self, msg: &str) -> DecodeError {
        self.err(DecodeErrorKind::BadValue(msg.into()))
    }

    fn int_of(&self, json: &serde_json::Value) -> Result<BigInt, DecodeError> {
        match json {
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    return Ok(BigInt::from(v));
                }
                if let Some(v) = n.as_u64() {
                    return Ok(BigInt::from(v));
                }
                Err(self.bad("expected an integer"))
            }
            serde_json::Value::String(s) => {
                s.parse::<BigInt>().map_err(|_| self.bad("expected an integer"))
            }
            _ => Err(self.bad("expected an integer")),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn node(&mut self, id: TypeId, json: &serde_json::Value) -> Result<Value, DecodeError> {
        let model = self.model;
        let node = model.node(id);
        match &node.kind {
            TypeKind::Tagged { inner, .. } => self.node(*inner, json),
            TypeKind::Boolean => match json {
                serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
                _ => Err(self.bad("expected a boolean")),
            },
            TypeKind::Null => match json {
                serde_json::Value::Null => Ok(Value::Null),
                _ => Err(self.bad("expected null")),
            },
            TypeKind::Integer { .. } => {
                let v = self.int_of(json)?;
                if node.constraint.as_ref().map(|c| c.check_int(&v))
                    == Some(Containment::Outside)
                {
                    return Err(self.err(DecodeErrorKind::ConstraintViolation {
                        value: alloc::format!("{v}"),
                    }));
                }
                Ok(Value::Integer(v))
            }
            TypeKind::Enumerated { root, ext, .. } => {
                let number = match json {
                    serde_json::Value::String(name) => {
                        let item = root
                            .iter()
                            .chain(ext.iter())
                            .find(|(n, _)| model.str(*n) == name.as_str());
                        match item {
                            Some((_, v)) => *v,
                            None => return Err(self.bad("unknown enumeration name")),
                        }
                    }
                    _ => self
                        .int_of(json)?
                        .to_i64()
                        .ok_or_else(|| self.bad("enumeration number out of range"))?,
                };
                let Some((name, _)) = enum_name_of(model, root, ext, number) else {
                    return Err(self.bad("unknown enumeration number"));
                };
                if self.numeric_enums {
                    Ok(Value::Integer(BigInt::from(number)))
                } else {
                    Ok(Value::Text(name.to_owned()))
                }
            }
            TypeKind::Real => match json {
                serde_json::Value::Number(n) => Ok(Value::Real(
                    n.as_f64().ok_or_else(|| self.bad("expected a real"))?,
                )),
                serde_json::Value::String(s) => match s.as_str() {
                    "INF" => Ok(Value::Real(f64::INFINITY)),
                    "-INF" => Ok(Value::Real(f64::NEG_INFINITY)),
                    "NaN" => Ok(Value::Real(f64::NAN)),
                    _ => Err(self.bad("expected a real")),
                },
                _ => Err(self.bad("expected a real")),
            },
            TypeKind::BitString { .. } => {
                let serde_json::Value::Object(map) = json else {
                    return Err(self.bad("expected a bit string object"));
                };
                let hex = map
                    .get("value")
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| self.bad("bit string needs a hex value"))?;
                let length = map
                    .get("length")
                    .and_then(serde_json::Value::as_u64)
                    .ok_or_else(|| self.bad("bit string needs a length"))?;
                let data = hex_decode(hex).ok_or_else(|| self.bad("bad hex"))?;
                if (length as usize).div_ceil(8) != data.len() {
                    return Err(self.bad("bit string length does not match value"));
                }
                Ok(Value::BitString(BitString::new(data, length as usize)))
            }
            TypeKind::OctetString | TypeKind::Any => {
                let serde_json::Value::String(hex) = json else {
                    return Err(self.bad("expected a hex string"));
                };
                let bytes = hex_decode(hex).ok_or_else(|| self.bad("bad hex"))?;
                Ok(Value::Bytes(bytes))
            }
            TypeKind::CharacterString(_) | TypeKind::Time(_) => match json {
                serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
                _ => Err(self.bad("expected a string")),
            },
            TypeKind::ObjectIdentifier | TypeKind::RelativeOid => {
                let serde_json::Value::String(s) = json else {
                    return Err(self.bad("expected a dotted OID string"));
                };
                let components: Result<Vec<u64>, _> =
                    s.split('.').map(str::parse::<u64>).collect();
                let components = components.map_err(|_| self.bad("bad OID component"))?;
                Ok(Value::ObjectIdentifier(components))
            }
            TypeKind::Sequence(c) | TypeKind::Set(c) => {
                let serde_json::Value::Object(map) = json else {
                    return Err(self.bad("expected an object"));
                };
                for key in map.keys() {
                    if !c.members.iter().any(|m| model.str(m.name) == key.as_str()) {
                        return Err(self.bad(&alloc::format!("unknown member `{key}`")));
                    }
                }
                let mut out = Vec::new();
                for member in &c.members {
                    let name = model.str(member.name);
                    match map.get(name) {
                        Some(v) => {
                            self.path.push(PathSegment::Member(name.to_owned()));
                            let value = self.node(member.ty, v)?;
                            self.path.pop();
                            out.push((name.to_owned(), value));
                        }
                        None => {
                            if let Some(default) = &member.default {
                                out.push((name.to_owned(), default.clone()));
                            } else if !member.optional && member.in_root() {
                                return Err(self.err(DecodeErrorKind::MissingMember(
                                    name.to_owned(),
                                )));
                            }
                        }
                    }
                }
                Ok(Value::Sequence(out))
            }
            TypeKind::Choice(c) => {
                let serde_json::Value::Object(map) = json else {
                    return Err(self.bad("expected a single-key object"));
                };
                let mut entries = map.iter();
                let (Some((selector, inner)), None) = (entries.next(), entries.next()) else {
                    return Err(self.bad("expected a single-key object"));
                };
                let member = c
                    .members
                    .iter()
                    .find(|m| model.str(m.name) == selector.as_str())
                    .ok_or_else(|| {
                        self.err(DecodeErrorKind::UnknownChoice(selector.clone()))
                    })?;
                self.path.push(PathSegment::Member(selector.clone()));
                let value = self.node(member.ty, inner)?;
                self.path.pop();
                Ok(Value::Choice(selector.clone(), Box::new(value)))
            }
            TypeKind::SequenceOf { element } | TypeKind::SetOf { element } => {
                let serde_json::Value::Array(items) = json else {
                    return Err(self.bad("expected an array"));
                };
                let mut out = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    self.path.push(PathSegment::Index(idx));
                    out.push(self.node(*element, item)?);
                    self.path.pop();
                }
                Ok(Value::List(out))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        assert_eq!(hex_upper(&[0xde, 0xad, 0x01]), "DEAD01");
        assert_eq!(hex_decode("DEAD01").unwrap(), [0xde, 0xad, 0x01]);
        assert!(hex_decode("abc").is_none());
        assert!(hex_decode("zz").is_none());
    }
}
