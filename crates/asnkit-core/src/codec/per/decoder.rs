//! PER/UPER decoder: a bit-cursor machine driven by model traversal.

use super::buffer::{BitError, PerReader, FRAGMENT};
use super::{char_spec, enum_indices, SizeBounds};
use crate::codec::prim;
use crate::codec::{DecodeError, DecodeErrorKind, ErrorPath, PathSegment};
use crate::model::{
    Composite, Containment, Member, Model, TypeId, TypeKind,
};
use crate::value::{BitString, Value};
use alloc::borrow::ToOwned;
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use num_bigint::BigInt;

/// Decode a value of type `id`; returns the value and octets consumed
/// (rounding the final partial octet up).
pub fn decode(
    model: &Model,
    aligned: bool,
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
        aligned,
        r: PerReader::new(data, aligned),
        path,
        numeric_enums,
    };
    let value = decoder.node(id)?;
    // An empty encoding still occupies one (zero) octet on the wire.
    let mut consumed = decoder.r.octets_consumed();
    if consumed == 0 && !data.is_empty() {
        consumed = 1;
    }
    Ok((value, consumed))
}

struct Decoder<'m, 'b> {
    model: &'m Model,
    aligned: bool,
    r: PerReader<'b>,
    path: Vec<PathSegment>,
    numeric_enums: bool,
}

impl<'m, 'b> Decoder<'m, 'b> {
    fn err(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            kind,
            offset: self.r.octets_consumed(),
            path: ErrorPath {
                segments: self.path.clone(),
            },
        }
    }

    fn bits(&self, e: BitError) -> DecodeError {
        match e {
            BitError::Underflow => self.err(DecodeErrorKind::OutOfBuffer),
            BitError::Bad(msg) => self.err(DecodeErrorKind::BadValue(msg.into())),
        }
    }

    fn bad(&self, msg: &str) -> DecodeError {
        self.err(DecodeErrorKind::BadValue(msg.into()))
    }

    /// Read the length class for a sized type, mirroring the encoder's
    /// `size_class` (extension bit included).
    fn size_class(&mut self, id: TypeId) -> Result<SizeForm, DecodeError> {
        let node = self.model.node(id);
        let sizes = SizeBounds::of(node);
        if sizes.extensible {
            let outside = self.r.read_bit().map_err(|e| self.bits(e))?;
            if outside {
                return Ok(SizeForm::General);
            }
        }
        if let Some(n) = sizes.fixed() {
            return Ok(SizeForm::Fixed(n));
        }
        if let Some((lo, hi)) = sizes.constrained() {
            return Ok(SizeForm::Constrained(lo, hi));
        }
        Ok(SizeForm::General)
    }

    /// Decode an open-type payload with a nested decoder.
    fn open_value(&mut self, id: TypeId) -> Result<Value, DecodeError> {
        let bytes = self.r.read_fragmented_bytes().map_err(|e| self.bits(e))?;
        let mut sub = Decoder {
            model: self.model,
            aligned: self.aligned,
            r: PerReader::new(&bytes, self.aligned),
            path: self.path.clone(),
            numeric_enums: self.numeric_enums,
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
                let b = self.r.read_bit().map_err(|e| self.bits(e))?;
                Ok(Value::Boolean(b))
            }
            TypeKind::Null => Ok(Value::Null),
            TypeKind::Integer { .. } => {
                let hints = &node.hints;
                if hints.int_extensible {
                    let outside = self.r.read_bit().map_err(|e| self.bits(e))?;
                    if outside {
                        let v = self.r.read_unconstrained().map_err(|e| self.bits(e))?;
                        return Ok(Value::Integer(v));
                    }
                }
                let v = match (hints.int_lo, hints.int_hi) {
                    (Some(lo), Some(hi)) => {
                        let v = self.r.read_constrained(lo, hi).map_err(|e| self.bits(e))?;
                        BigInt::from(v)
                    }
                    (Some(lo), None) => {
                        self.r.read_semi_constrained(lo).map_err(|e| self.bits(e))?
                    }
                    _ => self.r.read_unconstrained().map_err(|e| self.bits(e))?,
                };
                if node.constraint.as_ref().map(|c| c.check_int(&v))
                    == Some(Containment::Outside)
                {
                    return Err(self.err(DecodeErrorKind::ConstraintViolation {
                        value: alloc::format!("{v}"),
                    }));
                }
                Ok(Value::Integer(v))
            }
            TypeKind::Enumerated {
                root,
                ext,
                extensible,
            } => {
                if *extensible {
                    let in_ext = self.r.read_bit().map_err(|e| self.bits(e))?;
                    if in_ext {
                        let pos = self.r.read_normally_small().map_err(|e| self.bits(e))?;
                        let Some((name, number)) = ext.get(pos as usize) else {
                            return Err(self.bad("unknown enumeration extension"));
                        };
                        return Ok(self.enum_value(model.str(*name), *number));
                    }
                }
                let index = if root.len() > 1 {
                    self.r
                        .read_constrained(0, root.len() as i128 - 1)
                        .map_err(|e| self.bits(e))? as usize
                } else {
                    0
                };
                let indices = enum_indices(root);
                let Some((_, number)) = indices.get(index) else {
                    return Err(self.bad("enumeration index out of range"));
                };
                let (name, _) = crate::codec::enum_name_of(model, root, ext, *number)
                    .expect("index maps to an item");
                Ok(self.enum_value(name, *number))
            }
            TypeKind::Real => {
                let len = self.r.read_length().map_err(|e| self.bits(e))?;
                self.r.align();
                let bytes = self.r.read_bytes(len).map_err(|e| self.bits(e))?;
                let v = prim::real_from_bytes(&bytes).map_err(|msg| self.bad(&msg))?;
                Ok(Value::Real(v))
            }
            TypeKind::ObjectIdentifier | TypeKind::RelativeOid => {
                let len = self.r.read_length().map_err(|e| self.bits(e))?;
                self.r.align();
                let bytes = self.r.read_bytes(len).map_err(|e| self.bits(e))?;
                let relative = matches!(node.kind, TypeKind::RelativeOid);
                let components =
                    prim::oid_from_bytes(&bytes, relative).map_err(|msg| self.bad(&msg))?;
                Ok(Value::ObjectIdentifier(components))
            }
            TypeKind::Any => {
                let bytes = self.r.read_fragmented_bytes().map_err(|e| self.bits(e))?;
                Ok(Value::Bytes(bytes))
            }
            TypeKind::BitString { .. } => {
                let bit_len = match self.size_class(id)? {
                    SizeForm::Fixed(n) => {
                        if n > 16 {
                            self.r.align();
                        }
                        n as usize
                    }
                    SizeForm::Constrained(lo, hi) => {
                        let n = self
                            .r
                            .read_constrained(lo as i128, hi as i128)
                            .map_err(|e| self.bits(e))? as usize;
                        if hi > 16 {
                            self.r.align();
                        }
                        n
                    }
                    SizeForm::General => {
                        let n = self.r.read_length().map_err(|e| self.bits(e))?;
                        self.r.align();
                        n
                    }
                };
                let data = self.r.read_bit_field(bit_len).map_err(|e| self.bits(e))?;
                Ok(Value::BitString(BitString::new(data, bit_len)))
            }
            TypeKind::OctetString => {
                let bytes = match self.size_class(id)? {
                    SizeForm::Fixed(n) => {
                        if n > 2 {
                            self.r.align();
                        }
                        self.r.read_bytes(n as usize).map_err(|e| self.bits(e))?
                    }
                    SizeForm::Constrained(lo, hi) => {
                        let n = self
                            .r
                            .read_constrained(lo as i128, hi as i128)
                            .map_err(|e| self.bits(e))? as usize;
                        if hi > 2 {
                            self.r.align();
                        }
                        self.r.read_bytes(n).map_err(|e| self.bits(e))?
                    }
                    SizeForm::General => {
                        self.r.read_fragmented_bytes().map_err(|e| self.bits(e))?
                    }
                };
                Ok(Value::Bytes(bytes))
            }
            TypeKind::CharacterString(kind) => {
                let kind = *kind;
                let spec = char_spec(kind, node.hints.alphabet.as_ref(), self.aligned);
                let Some(spec) = spec else {
                    let bytes = self.r.read_fragmented_bytes().map_err(|e| self.bits(e))?;
                    let text = prim::text_from_bytes(kind, &bytes)
                        .map_err(|()| self.err(DecodeErrorKind::BadUtf8))?;
                    return Ok(Value::Text(text));
                };
                let count = match self.size_class(id)? {
                    SizeForm::Fixed(n) => {
                        if self.aligned && n * u64::from(spec.bits) > 16 {
                            self.r.align();
                        }
                        n as usize
                    }
                    SizeForm::Constrained(lo, hi) => {
                        let n = self
                            .r
                            .read_constrained(lo as i128, hi as i128)
                            .map_err(|e| self.bits(e))? as usize;
                        if self.aligned && hi * u64::from(spec.bits) > 16 {
                            self.r.align();
                        }
                        n
                    }
                    SizeForm::General => {
                        let n = self.r.read_length().map_err(|e| self.bits(e))?;
                        self.r.align();
                        n
                    }
                };
                let mut text = String::with_capacity(count);
                for _ in 0..count {
                    let v = self.r.read_bits(spec.bits).map_err(|e| self.bits(e))?;
                    let c = spec
                        .char_of(v)
                        .ok_or_else(|| self.bad("character value outside the alphabet"))?;
                    text.push(c);
                }
                Ok(Value::Text(text))
            }
            TypeKind::Time(_) => {
                let bytes = self.r.read_fragmented_bytes().map_err(|e| self.bits(e))?;
                let text =
                    core::str::from_utf8(&bytes).map_err(|_| self.err(DecodeErrorKind::BadUtf8))?;
                Ok(Value::Text(text.to_owned()))
            }
            TypeKind::Sequence(c) => self.composite(c, false),
            TypeKind::Set(c) => self.composite(c, true),
            TypeKind::Choice(c) => self.choice(c),
            TypeKind::SequenceOf { element } | TypeKind::SetOf { element } => {
                let element = *element;
                match self.size_class(id)? {
                    SizeForm::Fixed(n) => self.elements(element, n as usize),
                    SizeForm::Constrained(lo, hi) => {
                        let n = self
                            .r
                            .read_constrained(lo as i128, hi as i128)
                            .map_err(|e| self.bits(e))? as usize;
                        self.elements(element, n)
                    }
                    SizeForm::General => self.fragmented_elements(element),
                }
            }
        }
    }

    fn enum_value(&self, name: &str, number: i64) -> Value {
        if self.numeric_enums {
            Value::Integer(BigInt::from(number))
        } else {
            Value::Text(name.to_owned())
        }
    }

    fn elements(&mut self, element: TypeId, count: usize) -> Result<Value, DecodeError> {
        let mut items = Vec::new();
        for idx in 0..count {
            self.path.push(PathSegment::Index(idx));
            let item = self.node(element)?;
            self.path.pop();
            items.push(item);
        }
        Ok(Value::List(items))
    }

    /// SEQUENCE OF with 16K-block count fragmentation.
    fn fragmented_elements(&mut self, element: TypeId) -> Result<Value, DecodeError> {
        let mut items = Vec::new();
        loop {
            self.r.align();
            let first = self.r.read_bits(8).map_err(|e| self.bits(e))? as u8;
            let count = if first & 0x80 == 0 {
                first as usize
            } else if first & 0x40 == 0 {
                let second = self.r.read_bits(8).map_err(|e| self.bits(e))? as u8;
                (((first & 0x3f) as usize) << 8) | second as usize
            } else {
                let blocks = (first & 0x3f) as usize;
                if blocks == 0 || blocks > 4 {
                    return Err(self.bad("bad fragment multiplier"));
                }
                for _ in 0..blocks * FRAGMENT {
                    self.path.push(PathSegment::Index(items.len()));
                    let item = self.node(element)?;
                    self.path.pop();
                    items.push(item);
                }
                continue;
            };
            for _ in 0..count {
                self.path.push(PathSegment::Index(items.len()));
                let item = self.node(element)?;
                self.path.pop();
                items.push(item);
            }
            return Ok(Value::List(items));
        }
    }

    fn composite(&mut self, composite: &Composite, is_set: bool) -> Result<Value, DecodeError> {
        let model = self.model;
        let ext_present = if composite.extensible {
            self.r.read_bit().map_err(|e| self.bits(e))?
        } else {
            false
        };

        let mut root: Vec<&Member> = composite.root_members().collect();
        if is_set {
            root.sort_by_key(|m| super::sort_tag(model, m.ty));
        }

        let mut present = Vec::new();
        for _ in root.iter().filter(|m| m.is_omittable()) {
            present.push(self.r.read_bit().map_err(|e| self.bits(e))?);
        }

        let mut decoded: Vec<(String, Value)> = Vec::new();
        let mut present_iter = present.into_iter();
        for member in &root {
            let name = model.str(member.name).to_owned();
            let is_present = if member.is_omittable() {
                present_iter.next().unwrap_or(false)
            } else {
                true
            };
            if is_present {
                self.path.push(PathSegment::Member(name.clone()));
                let value = self.node(member.ty)?;
                self.path.pop();
                decoded.push((name, value));
            } else if let Some(default) = &member.default {
                decoded.push((name, default.clone()));
            }
        }

        if ext_present {
            let count =
                self.r.read_normally_small().map_err(|e| self.bits(e))? as usize + 1;
            let mut group_present = Vec::with_capacity(count);
            for _ in 0..count {
                group_present.push(self.r.read_bit().map_err(|e| self.bits(e))?);
            }
            let known = composite.ext_group_count() as usize;
            for (i, present) in group_present.into_iter().enumerate() {
                if !present {
                    continue;
                }
                let group = i as u32 + 1;
                if i >= known {
                    // A newer addition than the schema knows: skippable.
                    let _ = self.r.read_fragmented_bytes().map_err(|e| self.bits(e))?;
                    continue;
                }
                let values = self.open_group(composite, group)?;
                decoded.extend(values);
            }
        }

        // Emit members in declaration order regardless of decode order.
        let mut out = Vec::with_capacity(decoded.len());
        for member in &composite.members {
            let name = model.str(member.name);
            if let Some(pos) = decoded.iter().position(|(n, _)| n == name) {
                out.push(decoded.remove(pos));
            }
        }
        Ok(Value::Sequence(out))
    }

    /// Decode one extension addition (group) from open-type contents.
    fn open_group(
        &mut self,
        composite: &Composite,
        group: u32,
    ) -> Result<Vec<(String, Value)>, DecodeError> {
        let model = self.model;
        let bytes = self.r.read_fragmented_bytes().map_err(|e| self.bits(e))?;
        let mut sub = Decoder {
            model,
            aligned: self.aligned,
            r: PerReader::new(&bytes, self.aligned),
            path: self.path.clone(),
            numeric_enums: self.numeric_enums,
        };
        let members: Vec<&Member> = composite.ext_group(group).collect();
        let mut out = Vec::new();
        if let [member] = members[..] {
            let name = model.str(member.name).to_owned();
            sub.path.push(PathSegment::Member(name.clone()));
            let value = sub.node(member.ty)?;
            out.push((name, value));
            return Ok(out);
        }
        let mut present = Vec::new();
        for _ in members.iter().filter(|m| m.is_omittable()) {
            present.push(sub.r.read_bit().map_err(|e| sub.bits(e))?);
        }
        let mut present_iter = present.into_iter();
        for member in &members {
            let name = model.str(member.name).to_owned();
            let is_present = if member.is_omittable() {
                present_iter.next().unwrap_or(false)
            } else {
                true
            };
            if is_present {
                sub.path.push(PathSegment::Member(name.clone()));
                let value = sub.node(member.ty)?;
                sub.path.pop();
                out.push((name, value));
            } else if let Some(default) = &member.default {
                out.push((name, default.clone()));
            }
        }
        Ok(out)
    }

    fn choice(&mut self, composite: &Composite) -> Result<Value, DecodeError> {
        let model = self.model;
        if composite.extensible {
            let in_ext = self.r.read_bit().map_err(|e| self.bits(e))?;
            if in_ext {
                let pos = self.r.read_normally_small().map_err(|e| self.bits(e))? as usize;
                let member = composite.ext_members().nth(pos).ok_or_else(|| {
                    self.err(DecodeErrorKind::UnknownChoice(alloc::format!(
                        "extension alternative {pos}"
                    )))
                })?;
                let name = model.str(member.name).to_owned();
                self.path.push(PathSegment::Member(name.clone()));
                let value = self.open_value(member.ty)?;
                self.path.pop();
                return Ok(Value::Choice(name, Box::new(value)));
            }
        }
        // Alternative indices follow declaration order.
        let root: Vec<&Member> = composite.members.iter().filter(|m| m.in_root()).collect();
        let index = if root.len() > 1 {
            self.r
                .read_constrained(0, root.len() as i128 - 1)
                .map_err(|e| self.bits(e))? as usize
        } else {
            0
        };
        let member = *root.get(index).ok_or_else(|| {
            self.err(DecodeErrorKind::UnknownChoice(alloc::format!(
                "alternative index {index}"
            )))
        })?;
        let name = model.str(member.name).to_owned();
        self.path.push(PathSegment::Member(name.clone()));
        let value = self.node(member.ty)?;
        self.path.pop();
        Ok(Value::Choice(name, Box::new(value)))
    }
}

/// How a length is conveyed (mirror of the encoder's form).
enum SizeForm {
    Fixed(u64),
    Constrained(u64, u64),
    General,
}
