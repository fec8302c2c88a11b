//! OER codec (ITU-T X.696).
//!
//! Byte-oriented like BER but tagless like PER: integers with known bounds
//! use fixed 1/2/4/8-octet widths, SEQUENCE carries a presence preamble,
//! CHOICE is selected by a compact tag, extensions are length-prefixed and
//! skippable.

use crate::codec::prim;
use crate::codec::{
    enum_name_of, enum_number, shape_error, DecodeError, DecodeErrorKind, EncodeError,
    EncodeErrorKind, ErrorPath, PathSegment,
};
use crate::model::{
    Composite, Containment, Member, Model, StringKind, Tag, TagClass, TypeId, TypeKind,
};
use crate::value::{BitString, Value};
use alloc::borrow::ToOwned;
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Fixed integer widths OER can use, in octets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IntWidth {
    Unsigned(usize),
    Signed(usize),
    /// Length-prefixed variable width.
    Variable,
}

/// Pick the integer width for the node's bounds (§10).
fn int_width(node: &crate::model::TypeNode) -> IntWidth {
    if node.hints.int_extensible {
        return IntWidth::Variable;
    }
    let (Some(lo), Some(hi)) = (node.hints.int_lo, node.hints.int_hi) else {
        // Semi-constrained non-negative integers still get a variable
        // width; only fully bounded ranges pick a fixed one.
        return IntWidth::Variable;
    };
    if lo >= 0 {
        for (octets, max) in [
            (1usize, 0xffi128),
            (2, 0xffff),
            (4, 0xffff_ffff),
            (8, 0xffff_ffff_ffff_ffff),
        ] {
            if hi <= max {
                return IntWidth::Unsigned(octets);
            }
        }
        return IntWidth::Variable;
    }
    for (octets, min, max) in [
        (1usize, i128::from(i8::MIN), i128::from(i8::MAX)),
        (2, i128::from(i16::MIN), i128::from(i16::MAX)),
        (4, i128::from(i32::MIN), i128::from(i32::MAX)),
        (8, i128::from(i64::MIN), i128::from(i64::MAX)),
    ] {
        if lo >= min && hi <= max {
            return IntWidth::Signed(octets);
        }
    }
    IntWidth::Variable
}

/// The tag identifying a CHOICE alternative (and the SET member order).
fn alt_tag(model: &Model, member: &Member) -> Tag {
    crate::codec::per::sort_tag(model, member.ty)
}

/// Encode `value` of type `id` to OER octets.
pub fn encode(model: &Model, id: TypeId, value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut path = Vec::new();
    if let Some(name) = model.node(id).name {
        path.push(PathSegment::Type(model.str(name).to_string()));
    }
    let mut encoder = Encoder {
        model,
        path,
        out: Vec::new(),
    };
    encoder.node(id, value)?;
    Ok(encoder.out)
}

/// Decode a value of type `id`; returns the value and octets consumed.
pub fn decode(
    model: &Model,
    id: TypeId,
    data: &[u8],
    numeric_enums: bool,
) -> Result<(Value, usize), DecodeError> {
    let mut path = Vec::new();
    if let Some(name) = model.node(id).name {
        path.push(PathSegment::Type(model.str(name).to_string()));
    }
    let mut decoder = Decoder {
        model,
        data,
        pos: 0,
        numeric_enums,
        path,
    };
    let value = decoder.node(id)?;
    Ok((value, decoder.pos))
}

struct Encoder<'m> {
    model: &'m Model,
    path: Vec<PathSegment>,
    out: Vec<u8>,
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

    /// BER-style definite length determinant.
    fn write_length(&mut self, len: usize) {
        if len < 128 {
            self.out.push(len as u8);
            return;
        }
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        self.out.push(0x80 | (bytes.len() - skip) as u8);
        self.out.extend_from_slice(&bytes[skip..]);
    }

    /// The compact tag of a CHOICE alternative (§20: 2 class bits, 6-bit
    /// number with a base-128 escape).
    fn write_tag(&mut self, tag: Tag) {
        let class = tag.class.bits();
        if tag.number < 63 {
            self.out.push(class | tag.number as u8);
            return;
        }
        self.out.push(class | 0x3f);
        let mut chunks = [0u8; 5];
        let mut n = 0;
        let mut v = tag.number;
        loop {
            chunks[n] = (v & 0x7f) as u8;
            v >>= 7;
            n += 1;
            if v == 0 {
                break;
            }
        }
        for i in (0..n).rev() {
            let byte = chunks[i];
            self.out.push(if i == 0 { byte } else { byte | 0x80 });
        }
    }

    /// Encode a nested value as length-prefixed open-type contents.
    fn open(&mut self, id: TypeId, value: &Value) -> Result<(), EncodeError> {
        let mut sub = Encoder {
            model: self.model,
            path: self.path.clone(),
            out: Vec::new(),
        };
        sub.node(id, value)?;
        let bytes = sub.out;
        self.write_length(bytes.len());
        self.out.extend_from_slice(&bytes);
        Ok(())
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
                self.out.push(if *b { 0xff } else { 0x00 });
                Ok(())
            }
            TypeKind::Null => {
                let Value::Null = value else {
                    return Err(shape_error("NULL", value, &self.path));
                };
                Ok(())
            }
            TypeKind::Integer { .. } => {
                let Value::Integer(v) = value else {
                    return Err(shape_error("INTEGER", value, &self.path));
                };
                match node.constraint.as_ref().map(|c| c.check_int(v)) {
                    Some(Containment::Outside) if !node.hints.int_extensible => {
                        return Err(self.constraint_violation(value));
                    }
                    _ => {}
                }
                match int_width(node) {
                    IntWidth::Unsigned(octets) => {
                        let v = v.to_u128().ok_or_else(|| self.constraint_violation(value))?;
                        let bytes = v.to_be_bytes();
                        self.out.extend_from_slice(&bytes[16 - octets..]);
                    }
                    IntWidth::Signed(octets) => {
                        let v = v.to_i128().ok_or_else(|| self.constraint_violation(value))?;
                        let bytes = v.to_be_bytes();
                        self.out.extend_from_slice(&bytes[16 - octets..]);
                    }
                    IntWidth::Variable => {
                        let bytes = prim::int_to_bytes(v);
                        self.write_length(bytes.len());
                        self.out.extend_from_slice(&bytes);
                    }
                }
                Ok(())
            }
            TypeKind::Enumerated { root, ext, .. } => {
                let Some((number, _)) = enum_number(model, root, ext, value) else {
                    return Err(shape_error("ENUMERATED", value, &self.path));
                };
                if (0..=127).contains(&number) {
                    self.out.push(number as u8);
                } else {
                    let bytes = prim::int_to_bytes(&BigInt::from(number));
                    self.out.push(0x80 | bytes.len() as u8);
                    self.out.extend_from_slice(&bytes);
                }
                Ok(())
            }
            TypeKind::Real => {
                let v = match value {
                    Value::Real(v) => *v,
                    Value::Integer(v) => v.to_f64().unwrap_or(f64::NAN),
                    _ => return Err(shape_error("REAL", value, &self.path)),
                };
                let contents = prim::real_to_bytes(v);
                self.write_length(contents.len());
                self.out.extend_from_slice(&contents);
                Ok(())
            }
            TypeKind::ObjectIdentifier | TypeKind::RelativeOid => {
                let Value::ObjectIdentifier(components) = value else {
                    return Err(shape_error("OBJECT IDENTIFIER", value, &self.path));
                };
                let relative = matches!(node.kind, TypeKind::RelativeOid);
                let contents = prim::oid_to_bytes(components, relative)
                    .map_err(|msg| self.err(EncodeErrorKind::UnsupportedValue(msg)))?;
                self.write_length(contents.len());
                self.out.extend_from_slice(&contents);
                Ok(())
            }
            TypeKind::Any => {
                let Value::Bytes(bytes) = value else {
                    return Err(shape_error("opaque bytes", value, &self.path));
                };
                self.write_length(bytes.len());
                self.out.extend_from_slice(bytes);
                Ok(())
            }
            TypeKind::BitString { .. } => {
                let Value::BitString(bs) = value else {
                    return Err(shape_error("BIT STRING", value, &self.path));
                };
                if crate::codec::size_containment(node, bs.bit_len as u64)
                    == Some(Containment::Outside)
                {
                    return Err(self.constraint_violation(value));
                }
                let mut bs = bs.clone();
                bs.normalize();
                match node.hints.fixed_size() {
                    Some(n) => {
                        if bs.bit_len as u64 != n {
                            return Err(self.constraint_violation(value));
                        }
                        self.out.extend_from_slice(&bs.data);
                    }
                    None => {
                        self.write_length(1 + bs.data.len());
                        self.out.push(bs.unused_bits());
                        self.out.extend_from_slice(&bs.data);
                    }
                }
                Ok(())
            }
            TypeKind::OctetString => {
                let Value::Bytes(bytes) = value else {
                    return Err(shape_error("OCTET STRING", value, &self.path));
                };
                if crate::codec::size_containment(node, bytes.len() as u64)
                    == Some(Containment::Outside)
                {
                    return Err(self.constraint_violation(value));
                }
                match node.hints.fixed_size() {
                    Some(n) => {
                        if bytes.len() as u64 != n {
                            return Err(self.constraint_violation(value));
                        }
                        self.out.extend_from_slice(bytes);
                    }
                    None => {
                        self.write_length(bytes.len());
                        self.out.extend_from_slice(bytes);
                    }
                }
                Ok(())
            }
            TypeKind::CharacterString(kind) => {
                let Value::Text(s) = value else {
                    return Err(shape_error("character string", value, &self.path));
                };
                crate::codec::text_checks(node, *kind, s).map_err(|kind| self.err(kind))?;
                if crate::codec::size_containment(node, s.chars().count() as u64)
                    == Some(Containment::Outside)
                {
                    return Err(self.constraint_violation(value));
                }
                let bytes = prim::text_to_bytes(*kind, s);
                // Fixed-size known-multiplier strings omit the length.
                let fixed = node
                    .hints
                    .fixed_size()
                    .filter(|_| matches!(
                        kind,
                        StringKind::Numeric
                            | StringKind::Printable
                            | StringKind::Ia5
                            | StringKind::Visible
                            | StringKind::Bmp
                            | StringKind::Universal
                    ));
                match fixed {
                    Some(n) => {
                        if bytes.len() != n as usize * prim::octets_per_char(*kind) {
                            return Err(self.constraint_violation(value));
                        }
                        self.out.extend_from_slice(&bytes);
                    }
                    None => {
                        self.write_length(bytes.len());
                        self.out.extend_from_slice(&bytes);
                    }
                }
                Ok(())
            }
            TypeKind::Time(_) => {
                let Value::Text(s) = value else {
                    return Err(shape_error("time string", value, &self.path));
                };
                self.write_length(s.len());
                self.out.extend_from_slice(s.as_bytes());
                Ok(())
            }
            TypeKind::Sequence(c) => self.composite(c, value, false),
            TypeKind::Set(c) => self.composite(c, value, true),
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
                self.write_tag(alt_tag(model, member));
                self.path.push(PathSegment::Member(selector.clone()));
                let result = if member.in_root() {
                    self.node(member.ty, inner)
                } else {
                    self.open(member.ty, inner)
                };
                self.path.pop();
                result
            }
            TypeKind::SequenceOf { element } | TypeKind::SetOf { element } => {
                let Value::List(items) = value else {
                    return Err(shape_error("list", value, &self.path));
                };
                if crate::codec::size_containment(node, items.len() as u64)
                    == Some(Containment::Outside)
                {
                    return Err(self.constraint_violation(value));
                }
                let element = *element;
                // Quantity: length-prefixed unsigned count (§17).
                let count = BigInt::from(items.len());
                let bytes = count.to_biguint().expect("count is non-negative").to_bytes_be();
                self.out.push(bytes.len() as u8);
                self.out.extend_from_slice(&bytes);
                for (idx, item) in items.iter().enumerate() {
                    self.path.push(PathSegment::Index(idx));
                    self.node(element, item)?;
                    self.path.pop();
                }
                Ok(())
            }
        }
    }

    /// SEQUENCE/SET: presence preamble, root members, extension bitmap and
    /// open-type additions.
    fn composite(
        &mut self,
        composite: &Composite,
        value: &Value,
        is_set: bool,
    ) -> Result<(), EncodeError> {
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
        let effective = |member: &Member| -> Option<&Value> {
            let name = model.str(member.name);
            let v = given.iter().find(|(n, _)| n == name).map(|(_, v)| v)?;
            if member.default.as_ref() == Some(v) {
                return None;
            }
            Some(v)
        };

        let mut root: Vec<&Member> = composite.root_members().collect();
        if is_set {
            root.sort_by_key(|m| alt_tag(model, m));
        }

        let ext_present =
            composite.extensible && composite.ext_members().any(|m| effective(m).is_some());

        // Preamble: extension bit, then one bit per omittable root member,
        // zero-padded to octets.
        let mut bits: Vec<bool> = Vec::new();
        if composite.extensible {
            bits.push(ext_present);
        }
        for member in root.iter().filter(|m| m.is_omittable()) {
            bits.push(effective(member).is_some());
        }
        let mut preamble = alloc::vec![0u8; bits.len().div_ceil(8)];
        for (i, bit) in bits.iter().enumerate() {
            if *bit {
                preamble[i / 8] |= 1 << (7 - (i % 8));
            }
        }
        self.out.extend_from_slice(&preamble);

        for member in &root {
            match effective(member) {
                Some(v) => {
                    let name = model.str(member.name).to_string();
                    self.path.push(PathSegment::Member(name));
                    self.node(member.ty, v)?;
                    self.path.pop();
                }
                None => {
                    if !member.is_omittable() {
                        return Err(self.err(EncodeErrorKind::MissingMember(
                            model.str(member.name).to_string(),
                        )));
                    }
                }
            }
        }

        if ext_present {
            let count = composite.ext_group_count() as usize;
            let mut bitmap = alloc::vec![0u8; count.div_ceil(8)];
            let mut present = alloc::vec![false; count];
            for (i, p) in present.iter_mut().enumerate() {
                *p = composite
                    .ext_group(i as u32 + 1)
                    .any(|m| effective(m).is_some());
                if *p {
                    bitmap[i / 8] |= 1 << (7 - (i % 8));
                }
            }
            // Extension bitmap: length, unused-bit count, bitmap octets.
            let unused = (bitmap.len() * 8 - count) as u8;
            self.write_length(1 + bitmap.len());
            self.out.push(unused);
            self.out.extend_from_slice(&bitmap);

            for (i, p) in present.iter().enumerate() {
                if !*p {
                    continue;
                }
                let group = i as u32 + 1;
                let members: Vec<&Member> = composite.ext_group(group).collect();
                let [member] = members[..] else {
                    // Version groups ride in one open type as a nested
                    // sequence of their members.
                    let mut sub = Encoder {
                        model,
                        path: self.path.clone(),
                        out: Vec::new(),
                    };
                    let sub_composite = Composite {
                        members: members.iter().map(|&m| {
                            let mut m = m.clone();
                            m.ext_group = 0;
                            m
                        }).collect(),
                        extensible: false,
                    };
                    let sub_value = Value::Sequence(
                        given
                            .iter()
                            .filter(|(n, _)| {
                                members.iter().any(|m| model.str(m.name) == n.as_str())
                            })
                            .cloned()
                            .collect(),
                    );
                    sub.composite(&sub_composite, &sub_value, false)?;
                    let bytes = sub.out;
                    self.write_length(bytes.len());
                    self.out.extend_from_slice(&bytes);
                    continue;
                };
                let v = effective(member).ok_or_else(|| {
                    self.err(EncodeErrorKind::MissingMember(
                        model.str(member.name).to_string(),
                    ))
                })?;
                let name = model.str(member.name).to_string();
                self.path.push(PathSegment::Member(name));
                self.open(member.ty, v)?;
                self.path.pop();
            }
        }
        Ok(())
    }
}

struct Decoder<'m, 'b> {
    model: &'m Model,
    data: &'b [u8],
    pos: usize,
    numeric_enums: bool,
    path: Vec<PathSegment>,
}

impl<'m, 'b> Decoder<'m, 'b> {
    fn err(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            kind,
            offset: self.pos,
            path: ErrorPath {
                segments: self.path.clone(),
            },
        }
    }

    fn bad(&self, msg: &str) -> DecodeError {
        self.err(DecodeErrorKind::BadValue(msg.into()))
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| self.err(DecodeErrorKind::OutOfBuffer))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'b [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| self.err(DecodeErrorKind::OutOfBuffer))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_length(&mut self) -> Result<usize, DecodeError> {
        let first = self.byte()?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let n = (first & 0x7f) as usize;
        if n == 0 || n > core::mem::size_of::<usize>() {
            return Err(self.err(DecodeErrorKind::OutOfBuffer));
        }
        let mut v = 0usize;
        for &b in self.take(n)? {
            v = (v << 8) | b as usize;
        }
        if self.pos + v > self.data.len() {
            return Err(self.err(DecodeErrorKind::OutOfBuffer));
        }
        Ok(v)
    }

    fn read_tag(&mut self) -> Result<Tag, DecodeError> {
        let first = self.byte()?;
        let class = TagClass::from_bits(first);
        let number = if first & 0x3f == 0x3f {
            let mut v: u32 = 0;
            loop {
                let b = self.byte()?;
                v = v
                    .checked_shl(7)
                    .ok_or_else(|| self.bad("tag number overflow"))?
                    | u32::from(b & 0x7f);
                if b & 0x80 == 0 {
                    break v;
                }
            }
        } else {
            u32::from(first & 0x3f)
        };
        Ok(Tag::new(class, number))
    }

    /// Decode an open-type payload.
    fn open_value(&mut self, id: TypeId) -> Result<Value, DecodeError> {
        let len = self.read_length()?;
        let bytes = self.take(len)?;
        let mut sub = Decoder {
            model: self.model,
            data: bytes,
            pos: 0,
            numeric_enums: self.numeric_enums,
            path: self.path.clone(),
        };
        sub.node(id)
    }

    #[allow(clippy::too_many_lines)]
    fn node(&mut self, id: TypeId) -> Result<Value, DecodeError> {
        let model = self.model;
        let node = model.node(id);
        match &node.kind {
            TypeKind::Tagged { inner, .. } => self.node(*inner),
            TypeKind::Boolean => {
                let b = self.byte()?;
                Ok(Value::Boolean(b != 0))
            }
            TypeKind::Null => Ok(Value::Null),
            TypeKind::Integer { .. } => {
                let v = match int_width(node) {
                    IntWidth::Unsigned(octets) => {
                        let bytes = self.take(octets)?;
                        BigInt::from_bytes_be(num_bigint::Sign::Plus, bytes)
                    }
                    IntWidth::Signed(octets) => {
                        let bytes = self.take(octets)?;
                        prim::int_from_bytes(bytes)
                    }
                    IntWidth::Variable => {
                        let len = self.read_length()?;
                        if len == 0 {
                            return Err(self.bad("empty INTEGER body"));
                        }
                        let bytes = self.take(len)?;
                        prim::int_from_bytes(bytes)
                    }
                };
                if node.constraint.as_ref().map(|c| c.check_int(&v))
                    == Some(Containment::Outside)
                    && !node.hints.int_extensible
                {
                    return Err(self.err(DecodeErrorKind::ConstraintViolation {
                        value: alloc::format!("{v}"),
                    }));
                }
                Ok(Value::Integer(v))
            }
            TypeKind::Enumerated { root, ext, .. } => {
                let first = self.byte()?;
                let number = if first < 0x80 {
                    i64::from(first)
                } else {
                    let len = (first & 0x7f) as usize;
                    let bytes = self.take(len)?;
                    prim::int_from_bytes(bytes)
                        .to_i64()
                        .ok_or_else(|| self.bad("ENUMERATED number out of range"))?
                };
                let Some((name, _)) = enum_name_of(model, root, ext, number) else {
                    return Err(self.bad("unknown ENUMERATED number"));
                };
                if self.numeric_enums {
                    Ok(Value::Integer(BigInt::from(number)))
                } else {
                    Ok(Value::Text(name.to_owned()))
                }
            }
            TypeKind::Real => {
                let len = self.read_length()?;
                let bytes = self.take(len)?;
                let v = prim::real_from_bytes(bytes).map_err(|msg| self.bad(&msg))?;
                Ok(Value::Real(v))
            }
            TypeKind::ObjectIdentifier | TypeKind::RelativeOid => {
                let len = self.read_length()?;
                let bytes = self.take(len)?;
                let relative = matches!(node.kind, TypeKind::RelativeOid);
                let components =
                    prim::oid_from_bytes(bytes, relative).map_err(|msg| self.bad(&msg))?;
                Ok(Value::ObjectIdentifier(components))
            }
            TypeKind::Any => {
                let len = self.read_length()?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            TypeKind::BitString { .. } => match node.hints.fixed_size() {
                Some(n) => {
                    let data = self.take((n as usize).div_ceil(8))?;
                    Ok(Value::BitString(BitString::new(data.to_vec(), n as usize)))
                }
                None => {
                    let len = self.read_length()?;
                    if len == 0 {
                        return Err(self.bad("missing BIT STRING unused-bits octet"));
                    }
                    let bytes = self.take(len)?;
                    let (&unused, data) = bytes.split_first().expect("len checked");
                    if unused > 7 || (data.is_empty() && unused != 0) {
                        return Err(self.bad("invalid unused-bits count"));
                    }
                    let bit_len = data.len() * 8 - unused as usize;
                    Ok(Value::BitString(BitString::new(data.to_vec(), bit_len)))
                }
            },
            TypeKind::OctetString => match node.hints.fixed_size() {
                Some(n) => Ok(Value::Bytes(self.take(n as usize)?.to_vec())),
                None => {
                    let len = self.read_length()?;
                    Ok(Value::Bytes(self.take(len)?.to_vec()))
                }
            },
            TypeKind::CharacterString(kind) => {
                let kind = *kind;
                let fixed = node.hints.fixed_size().filter(|_| {
                    matches!(
                        kind,
                        StringKind::Numeric
                            | StringKind::Printable
                            | StringKind::Ia5
                            | StringKind::Visible
                            | StringKind::Bmp
                            | StringKind::Universal
                    )
                });
                let bytes = match fixed {
                    Some(n) => self.take(n as usize * prim::octets_per_char(kind))?,
                    None => {
                        let len = self.read_length()?;
                        self.take(len)?
                    }
                };
                let text = prim::text_from_bytes(kind, bytes)
                    .map_err(|()| self.err(DecodeErrorKind::BadUtf8))?;
                Ok(Value::Text(text))
            }
            TypeKind::Time(_) => {
                let len = self.read_length()?;
                let bytes = self.take(len)?;
                let text =
                    core::str::from_utf8(bytes).map_err(|_| self.err(DecodeErrorKind::BadUtf8))?;
                Ok(Value::Text(text.to_owned()))
            }
            TypeKind::Sequence(c) => self.composite(c, false),
            TypeKind::Set(c) => self.composite(c, true),
            TypeKind::Choice(c) => {
                let tag = self.read_tag()?;
                let member = c
                    .members
                    .iter()
                    .find(|m| alt_tag(model, m) == tag)
                    .ok_or_else(|| {
                        self.err(DecodeErrorKind::UnknownChoice(alloc::format!("{tag}")))
                    })?;
                let name = model.str(member.name).to_owned();
                self.path.push(PathSegment::Member(name.clone()));
                let value = if member.in_root() {
                    self.node(member.ty)?
                } else {
                    self.open_value(member.ty)?
                };
                self.path.pop();
                Ok(Value::Choice(name, Box::new(value)))
            }
            TypeKind::SequenceOf { element } | TypeKind::SetOf { element } => {
                let element = *element;
                let count_len = self.byte()? as usize;
                if count_len == 0 || count_len > 8 {
                    return Err(self.bad("bad quantity field"));
                }
                let mut count = 0usize;
                for &b in self.take(count_len)? {
                    count = count
                        .checked_mul(256)
                        .and_then(|c| c.checked_add(b as usize))
                        .ok_or_else(|| self.err(DecodeErrorKind::OutOfBuffer))?;
                }
                // A count cannot exceed one element per remaining octet for
                // any non-empty element encoding; reject absurd counts
                // before reserving memory.
                if count > self.data.len() - self.pos + 1 {
                    return Err(self.err(DecodeErrorKind::OutOfBuffer));
                }
                let mut items = Vec::new();
                for idx in 0..count {
                    self.path.push(PathSegment::Index(idx));
                    let item = self.node(element)?;
                    self.path.pop();
                    items.push(item);
                }
                Ok(Value::List(items))
            }
        }
    }

    fn composite(&mut self, composite: &Composite, is_set: bool) -> Result<Value, DecodeError> {
        let model = self.model;
        let mut root: Vec<&Member> = composite.root_members().collect();
        if is_set {
            root.sort_by_key(|m| alt_tag(model, m));
        }

        let mut bit_count = root.iter().filter(|m| m.is_omittable()).count();
        if composite.extensible {
            bit_count += 1;
        }
        let preamble = self.take(bit_count.div_ceil(8))?.to_vec();
        let bit = |i: usize| preamble[i / 8] & (1 << (7 - (i % 8))) != 0;

        let mut next_bit = 0;
        let ext_present = if composite.extensible {
            let b = bit(0);
            next_bit = 1;
            b
        } else {
            false
        };

        let mut decoded: Vec<(String, Value)> = Vec::new();
        for member in &root {
            let name = model.str(member.name).to_owned();
            let present = if member.is_omittable() {
                let b = bit(next_bit);
                next_bit += 1;
                b
            } else {
                true
            };
            if present {
                self.path.push(PathSegment::Member(name.clone()));
                let value = self.node(member.ty)?;
                self.path.pop();
                decoded.push((name, value));
            } else if let Some(default) = &member.default {
                decoded.push((name, default.clone()));
            }
        }

        if ext_present {
            let len = self.read_length()?;
            if len == 0 {
                return Err(self.bad("empty extension bitmap"));
            }
            let bytes = self.take(len)?.to_vec();
            let (&unused, bitmap) = bytes.split_first().expect("len checked");
            if unused > 7 {
                return Err(self.bad("invalid unused-bits count"));
            }
            let count = bitmap.len() * 8 - unused as usize;
            let known = composite.ext_group_count() as usize;
            for i in 0..count {
                let present = bitmap[i / 8] & (1 << (7 - (i % 8))) != 0;
                if !present {
                    continue;
                }
                if i >= known {
                    let len = self.read_length()?;
                    self.take(len)?;
                    continue;
                }
                let group = i as u32 + 1;
                let members: Vec<&Member> = composite.ext_group(group).collect();
                if let [member] = members[..] {
                    let name = model.str(member.name).to_owned();
                    self.path.push(PathSegment::Member(name.clone()));
                    let value = self.open_value(member.ty)?;
                    self.path.pop();
                    decoded.push((name, value));
                } else {
                    let sub_composite = Composite {
                        members: members.iter().map(|&m| {
                            let mut m = m.clone();
                            m.ext_group = 0;
                            m
                        }).collect(),
                        extensible: false,
                    };
                    let len = self.read_length()?;
                    let bytes = self.take(len)?;
                    let mut sub = Decoder {
                        model,
                        data: bytes,
                        pos: 0,
                        numeric_enums: self.numeric_enums,
                        path: self.path.clone(),
                    };
                    let Value::Sequence(values) = sub.composite(&sub_composite, false)? else {
                        return Err(self.bad("bad extension group contents"));
                    };
                    decoded.extend(values);
                }
            }
        }

        let mut out = Vec::with_capacity(decoded.len());
        for member in &composite.members {
            let name = model.str(member.name);
            if let Some(pos) = decoded.iter().position(|(n, _)| n == name) {
                out.push(decoded.remove(pos));
            }
        }
        Ok(Value::Sequence(out))
    }
}
