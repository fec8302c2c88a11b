//! XER codec: XML encoding of the value model (X.693 basic flavor).
//!
//! The root element is named after the type; members and alternatives
//! become nested elements, list items are wrapped in `<item>`, booleans
//! are the empty elements `<true/>`/`<false/>`, ENUMERATED items are empty
//! elements named after the item. Decoding runs over a minimal internal
//! tag reader; this repo's business is parsers.

use super::{
    enum_name_of, enum_number, shape_error, DecodeError, DecodeErrorKind, EncodeError,
    EncodeErrorKind, ErrorPath, PathSegment,
};
use crate::model::{Model, TypeId, TypeKind};
use crate::value::{BitString, Value};
use alloc::borrow::ToOwned;
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Encode `value` of type `id` as XER text.
pub fn encode(
    model: &Model,
    id: TypeId,
    value: &Value,
    numeric_enums: bool,
) -> Result<Vec<u8>, EncodeError> {
    let root = model
        .node(id)
        .name
        .map_or_else(|| String::from("value"), |n| model.str(n).to_owned());
    let mut encoder = Encoder {
        model,
        numeric_enums,
        path: alloc::vec![PathSegment::Type(root.clone())],
        out: String::new(),
    };
    encoder.element(&root, id, value)?;
    Ok(encoder.out.into_bytes())
}

/// Decode XER text into a value of type `id`.
pub fn decode(
    model: &Model,
    id: TypeId,
    data: &[u8],
    numeric_enums: bool,
) -> Result<Value, DecodeError> {
    let text = core::str::from_utf8(data).map_err(|_| DecodeError {
        kind: DecodeErrorKind::BadUtf8,
        offset: 0,
        path: ErrorPath::default(),
    })?;
    let node = parse_element(text).map_err(|msg| DecodeError {
        kind: DecodeErrorKind::BadValue(msg.into()),
        offset: 0,
        path: ErrorPath::default(),
    })?;
    let mut decoder = Decoder {
        model,
        numeric_enums,
        path: alloc::vec![PathSegment::Type(node.name.clone())],
    };
    decoder.node(id, &node)
}

fn escape(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn hex_upper(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&alloc::format!("{b:02X}"));
    }
    out
}

struct Encoder<'m> {
    model: &'m Model,
    numeric_enums: bool,
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

    fn open(&mut self, name: &str) {
        self.out.push('<');
        self.out.push_str(name);
        self.out.push('>');
    }

    fn close(&mut self, name: &str) {
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    fn empty(&mut self, name: &str) {
        self.out.push('<');
        self.out.push_str(name);
        self.out.push_str("/>");
    }

    /// `<name>contents</name>` with type-directed contents.
    #[allow(clippy::too_many_lines)]
    fn element(&mut self, name: &str, id: TypeId, value: &Value) -> Result<(), EncodeError> {
        let model = self.model;
        let node = model.node(id);
        match &node.kind {
            TypeKind::Tagged { inner, .. } => self.element(name, *inner, value),
            TypeKind::Boolean => {
                let Value::Boolean(b) = value else {
                    return Err(shape_error("BOOLEAN", value, &self.path));
                };
                self.open(name);
                self.empty(if *b { "true" } else { "false" });
                self.close(name);
                Ok(())
            }
            TypeKind::Null => {
                self.open(name);
                self.close(name);
                Ok(())
            }
            TypeKind::Integer { .. } => {
                let Value::Integer(v) = value else {
                    return Err(shape_error("INTEGER", value, &self.path));
                };
                self.open(name);
                self.out.push_str(&v.to_string());
                self.close(name);
                Ok(())
            }
            TypeKind::Enumerated { root, ext, .. } => {
                let Some((number, _)) = enum_number(model, root, ext, value) else {
                    return Err(shape_error("ENUMERATED", value, &self.path));
                };
                let (item, _) =
                    enum_name_of(model, root, ext, number).expect("number maps to a name");
                self.open(name);
                self.empty(item);
                self.close(name);
                Ok(())
            }
            TypeKind::Real => {
                let v = match value {
                    Value::Real(v) => *v,
                    Value::Integer(v) => v.to_f64().unwrap_or(f64::NAN),
                    _ => return Err(shape_error("REAL", value, &self.path)),
                };
                self.open(name);
                if v.is_nan() {
                    self.empty("NOT-A-NUMBER");
                } else if v == f64::INFINITY {
                    self.empty("PLUS-INFINITY");
                } else if v == f64::NEG_INFINITY {
                    self.empty("MINUS-INFINITY");
                } else {
                    self.out.push_str(&alloc::format!("{v}"));
                }
                self.close(name);
                Ok(())
            }
            TypeKind::BitString { .. } => {
                let Value::BitString(bs) = value else {
                    return Err(shape_error("BIT STRING", value, &self.path));
                };
                self.open(name);
                for i in 0..bs.bit_len {
                    self.out.push(if bs.get(i) { '1' } else { '0' });
                }
                self.close(name);
                Ok(())
            }
            TypeKind::OctetString | TypeKind::Any => {
                let Value::Bytes(bytes) = value else {
                    return Err(shape_error("bytes", value, &self.path));
                };
                self.open(name);
                self.out.push_str(&hex_upper(bytes));
                self.close(name);
                Ok(())
            }
            TypeKind::CharacterString(_) | TypeKind::Time(_) => {
                let Value::Text(s) = value else {
                    return Err(shape_error("text", value, &self.path));
                };
                self.open(name);
                escape(s, &mut self.out);
                self.close(name);
                Ok(())
            }
            TypeKind::ObjectIdentifier | TypeKind::RelativeOid => {
                let Value::ObjectIdentifier(components) = value else {
                    return Err(shape_error("OBJECT IDENTIFIER", value, &self.path));
                };
                let text: Vec<String> = components.iter().map(u64::to_string).collect();
                self.open(name);
                self.out.push_str(&text.join("."));
                self.close(name);
                Ok(())
            }
            TypeKind::Sequence(c) | TypeKind::Set(c) => {
                let Value::Sequence(given) = value else {
                    return Err(shape_error("SEQUENCE value", value, &self.path));
                };
                self.open(name);
                for member in &c.members {
                    let member_name = model.str(member.name).to_owned();
                    match given.iter().find(|(n, _)| *n == member_name).map(|(_, v)| v) {
                        Some(v) => {
                            if member.default.as_ref() == Some(v) {
                                continue;
                            }
                            self.path.push(PathSegment::Member(member_name.clone()));
                            self.element(&member_name, member.ty, v)?;
                            self.path.pop();
                        }
                        None => {
                            if !member.is_omittable() {
                                return Err(self.err(EncodeErrorKind::MissingMember(
                                    member_name,
                                )));
                            }
                        }
                    }
                }
                self.close(name);
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
                self.open(name);
                self.path.push(PathSegment::Member(selector.clone()));
                self.element(selector, member.ty, inner)?;
                self.path.pop();
                self.close(name);
                Ok(())
            }
            TypeKind::SequenceOf { element } | TypeKind::SetOf { element } => {
                let Value::List(items) = value else {
                    return Err(shape_error("list", value, &self.path));
                };
                self.open(name);
                for (idx, item) in items.iter().enumerate() {
                    self.path.push(PathSegment::Index(idx));
                    self.element("item", *element, item)?;
                    self.path.pop();
                }
                self.close(name);
                Ok(())
            }
        }
    }
}

/// A parsed XML element: child elements or character data.
struct XmlNode {
    name: String,
    children: Vec<XmlNode>,
    text: String,
}

/// Parse one element; rejects anything outside the XER subset (no
/// attributes, no processing instructions beyond an optional prolog).
fn parse_element(text: &str) -> Result<XmlNode, &'static str> {
    let mut parser = XmlParser {
        bytes: text.as_bytes(),
        pos: 0,
    };
    parser.skip_prolog();
    let node = parser.element()?;
    parser.skip_ws();
    if parser.pos != parser.bytes.len() {
        return Err("trailing XML content");
    }
    Ok(node)
}

struct XmlParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> XmlParser<'a> {
    fn skip_ws(&mut self) {
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    fn skip_prolog(&mut self) {
        self.skip_ws();
        if self.bytes[self.pos..].starts_with(b"<?") {
            while self.pos < self.bytes.len() && !self.bytes[self.pos..].starts_with(b"?>") {
                self.pos += 1;
            }
            self.pos = (self.pos + 2).min(self.bytes.len());
        }
    }

    fn name(&mut self) -> Result<String, &'static str> {
        let start = self.pos;
        while self.bytes.get(self.pos).is_some_and(|&b| {
            b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.'
        }) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err("expected an element name");
        }
        core::str::from_utf8(&self.bytes[start..self.pos])
            .map(String::from)
            .map_err(|_| "bad element name")
    }

    fn element(&mut self) -> Result<XmlNode, &'static str> {
        self.skip_ws();
        if self.bytes.get(self.pos) != Some(&b'<') {
            return Err("expected an element");
        }
        self.pos += 1;
        let name = self.name()?;
        self.skip_ws();
        if self.bytes[self.pos..].starts_with(b"/>") {
            self.pos += 2;
            return Ok(XmlNode {
                name,
                children: Vec::new(),
                text: String::new(),
            });
        }
        if self.bytes.get(self.pos) != Some(&b'>') {
            return Err("expected `>`");
        }
        self.pos += 1;

        let mut children = Vec::new();
        let mut text = String::new();
        loop {
            let chunk_start = self.pos;
            while self.pos < self.bytes.len() && self.bytes[self.pos] != b'<' {
                self.pos += 1;
            }
            if self.pos >= self.bytes.len() {
                return Err("unterminated element");
            }
            let chunk = core::str::from_utf8(&self.bytes[chunk_start..self.pos])
                .map_err(|_| "bad character data")?;
            text.push_str(&unescape(chunk));
            if self.bytes[self.pos..].starts_with(b"</") {
                self.pos += 2;
                let closing = self.name()?;
                if closing != name {
                    return Err("mismatched closing tag");
                }
                self.skip_ws();
                if self.bytes.get(self.pos) != Some(&b'>') {
                    return Err("expected `>`");
                }
                self.pos += 1;
                return Ok(XmlNode {
                    name,
                    children,
                    text,
                });
            }
            children.push(self.element()?);
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

    #[allow(clippy::too_many_lines)]
    fn node(&mut self, id: TypeId, xml: &XmlNode) -> Result<Value, DecodeError> {
        let model = self.model;
        let node = model.node(id);
        let text = xml.text.trim();
        match &node.kind {
            TypeKind::Tagged { inner, .. } => self.node(*inner, xml),
            TypeKind::Boolean => match xml.children.first().map(|c| c.name.as_str()) {
                Some("true") => Ok(Value::Boolean(true)),
                Some("false") => Ok(Value::Boolean(false)),
                _ => match text {
                    "true" => Ok(Value::Boolean(true)),
                    "false" => Ok(Value::Boolean(false)),
                    _ => Err(self.bad("expected <true/> or <false/>")),
                },
            },
            TypeKind::Null => Ok(Value::Null),
            TypeKind::Integer { .. } => text
                .parse::<BigInt>()
                .map(Value::Integer)
                .map_err(|_| self.bad("expected an integer")),
            TypeKind::Enumerated { root, ext, .. } => {
                let name = xml
                    .children
                    .first()
                    .map_or(text, |c| c.name.as_str());
                let item = root
                    .iter()
                    .chain(ext.iter())
                    .find(|(n, _)| model.str(*n) == name);
                let Some((n, v)) = item else {
                    return Err(self.bad("unknown enumeration item"));
                };
                if self.numeric_enums {
                    Ok(Value::Integer(BigInt::from(*v)))
                } else {
                    Ok(Value::Text(model.str(*n).to_owned()))
                }
            }
            TypeKind::Real => {
                if let Some(child) = xml.children.first() {
                    return match child.name.as_str() {
                        "PLUS-INFINITY" => Ok(Value::Real(f64::INFINITY)),
                        "MINUS-INFINITY" => Ok(Value::Real(f64::NEG_INFINITY)),
                        "NOT-A-NUMBER" => Ok(Value::Real(f64::NAN)),
                        _ => Err(self.bad("unexpected REAL element")),
                    };
                }
                text.parse::<f64>()
                    .map(Value::Real)
                    .map_err(|_| self.bad("expected a real"))
            }
            TypeKind::BitString { .. } => {
                let mut bs = BitString::from_bits(text);
                bs.normalize();
                Ok(Value::BitString(bs))
            }
            TypeKind::OctetString | TypeKind::Any => {
                if text.len() % 2 != 0 {
                    return Err(self.bad("odd hex length"));
                }
                let mut bytes = Vec::with_capacity(text.len() / 2);
                let mut chars = text.chars();
                while let (Some(hi), Some(lo)) = (chars.next(), chars.next()) {
                    let hi = hi.to_digit(16).ok_or_else(|| self.bad("bad hex"))?;
                    let lo = lo.to_digit(16).ok_or_else(|| self.bad("bad hex"))?;
                    bytes.push(((hi << 4) | lo) as u8);
                }
                Ok(Value::Bytes(bytes))
            }
            TypeKind::CharacterString(_) | TypeKind::Time(_) => {
                Ok(Value::Text(xml.text.clone()))
            }
            TypeKind::ObjectIdentifier | TypeKind::RelativeOid => {
                let components: Result<Vec<u64>, _> =
                    text.split('.').map(str::parse::<u64>).collect();
                components
                    .map(Value::ObjectIdentifier)
                    .map_err(|_| self.bad("bad OID component"))
            }
            TypeKind::Sequence(c) | TypeKind::Set(c) => {
                for child in &xml.children {
                    if !c
                        .members
                        .iter()
                        .any(|m| model.str(m.name) == child.name.as_str())
                    {
                        return Err(
                            self.bad(&alloc::format!("unknown member `{}`", child.name))
                        );
                    }
                }
                let mut out = Vec::new();
                for member in &c.members {
                    let name = model.str(member.name).to_owned();
                    match xml.children.iter().find(|child| child.name == name) {
                        Some(child) => {
                            self.path.push(PathSegment::Member(name.clone()));
                            let value = self.node(member.ty, child)?;
                            self.path.pop();
                            out.push((name, value));
                        }
                        None => {
                            if let Some(default) = &member.default {
                                out.push((name, default.clone()));
                            } else if !member.optional && member.in_root() {
                                return Err(
                                    self.err(DecodeErrorKind::MissingMember(name))
                                );
                            }
                        }
                    }
                }
                Ok(Value::Sequence(out))
            }
            TypeKind::Choice(c) => {
                let Some(child) = xml.children.first() else {
                    return Err(self.bad("expected an alternative element"));
                };
                let member = c
                    .members
                    .iter()
                    .find(|m| model.str(m.name) == child.name.as_str())
                    .ok_or_else(|| {
                        self.err(DecodeErrorKind::UnknownChoice(child.name.clone()))
                    })?;
                let name = child.name.clone();
                self.path.push(PathSegment::Member(name.clone()));
                let value = self.node(member.ty, child)?;
                self.path.pop();
                Ok(Value::Choice(name, Box::new(value)))
            }
            TypeKind::SequenceOf { element } | TypeKind::SetOf { element } => {
                let mut out = Vec::with_capacity(xml.children.len());
                for (idx, child) in xml.children.iter().enumerate() {
                    self.path.push(PathSegment::Index(idx));
                    out.push(self.node(*element, child)?);
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
    fn test_parse_nested_elements() {
        let node = parse_element("<T><a>5</a><b><true/></b></T>").unwrap();
        assert_eq!(node.name, "T");
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[0].text, "5");
        assert_eq!(node.children[1].children[0].name, "true");
    }

    #[test]
    fn test_parse_rejects_mismatched_tags() {
        assert!(parse_element("<a>5</b>").is_err());
        assert!(parse_element("<a>5").is_err());
    }

    #[test]
    fn test_escape_round_trip() {
        let mut s = String::new();
        escape("a<b&c", &mut s);
        assert_eq!(s, "a&lt;b&amp;c");
        assert_eq!(unescape(&s), "a<b&c");
    }
}
