//! BER/DER/CER decoder.
//!
//! A TLV recursive descent over the model: read identifier, read length,
//! decode contents, with indefinite-length regions terminated by
//! end-of-contents. All length fields are validated against the remaining
//! input before any allocation.

use super::{BerMode};
use crate::codec::prim;
use crate::codec::{
    enum_name_of, DecodeError, DecodeErrorKind, ErrorPath, PathSegment,
};
use crate::model::{
    Composite, Containment, Model, Tag, TagMode, TypeId, TypeKind,
};
use crate::value::{BitString, Value};
use alloc::borrow::ToOwned;
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use num_bigint::BigInt;

/// Decode one complete TLV of type `id` from the front of `data`.
///
/// Returns the value and the number of octets consumed; the caller decides
/// whether trailing data is an error.
pub fn decode(
    model: &Model,
    mode: BerMode,
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
        mode,
        data,
        pos: 0,
        numeric_enums,
        path,
    };
    let value = decoder.node(id)?;
    Ok((value, decoder.pos))
}

/// A decoded length field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Length {
    Definite(usize),
    Indefinite,
}

/// A decoded identifier + length pair.
#[derive(Clone, Copy, Debug)]
struct Header {
    tag: Tag,
    constructed: bool,
    length: Length,
}

/// A contents region: definite regions end at a byte offset, indefinite
/// regions end at an end-of-contents marker.
#[derive(Clone, Copy, Debug)]
enum Region {
    To(usize),
    Eoc,
}

struct Decoder<'m, 'b> {
    model: &'m Model,
    mode: BerMode,
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

    /// Read identifier and length octets.
    fn read_header(&mut self) -> Result<Header, DecodeError> {
        let first = self.byte()?;
        let class = crate::model::TagClass::from_bits(first);
        let constructed = first & 0x20 != 0;
        let number = if first & 0x1f == 0x1f {
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
            u32::from(first & 0x1f)
        };
        let tag = Tag::new(class, number);

        let len_byte = self.byte()?;
        let length = if len_byte == 0x80 {
            if self.mode == BerMode::Der {
                return Err(self.err(DecodeErrorKind::IndefiniteInDer));
            }
            if !constructed {
                return Err(self.bad("indefinite length on a primitive"));
            }
            Length::Indefinite
        } else if len_byte < 0x80 {
            Length::Definite(len_byte as usize)
        } else {
            let n = (len_byte & 0x7f) as usize;
            if n > core::mem::size_of::<usize>() {
                return Err(self.err(DecodeErrorKind::OutOfBuffer));
            }
            let bytes = self.take(n)?;
            if self.mode.is_canonical() && bytes.first() == Some(&0) {
                return Err(self.err(DecodeErrorKind::NonMinimalLength));
            }
            let mut v = 0usize;
            for &b in bytes {
                v = (v << 8) | b as usize;
            }
            if self.mode.is_canonical() && v < 128 {
                return Err(self.err(DecodeErrorKind::NonMinimalLength));
            }
            Length::Definite(v)
        };

        // Absurd lengths fail before any allocation.
        if let Length::Definite(len) = length {
            if self.pos + len > self.data.len() {
                return Err(self.err(DecodeErrorKind::OutOfBuffer));
            }
        }
        Ok(Header {
            tag,
            constructed,
            length,
        })
    }

    /// Open the contents region of a header.
    fn region(&self, header: Header) -> Region {
        match header.length {
            Length::Definite(len) => Region::To(self.pos + len),
            Length::Indefinite => Region::Eoc,
        }
    }

    /// Check for (and consume) the end of a region.
    fn at_end(&mut self, region: Region) -> Result<bool, DecodeError> {
        match region {
            Region::To(end) => Ok(self.pos >= end),
            Region::Eoc => {
                if self.data.get(self.pos) == Some(&0)
                    && self.data.get(self.pos + 1) == Some(&0)
                {
                    self.pos += 2;
                    return Ok(true);
                }
                if self.pos >= self.data.len() {
                    return Err(self.err(DecodeErrorKind::OutOfBuffer));
                }
                Ok(false)
            }
        }
    }

    /// Close a definite region, rejecting unread contents.
    fn close(&mut self, region: Region) -> Result<(), DecodeError> {
        match region {
            Region::To(end) => {
                if self.pos != end {
                    return Err(self.err(DecodeErrorKind::TrailingData));
                }
                Ok(())
            }
            Region::Eoc => {
                if self.at_end(region)? {
                    Ok(())
                } else {
                    Err(self.err(DecodeErrorKind::TrailingData))
                }
            }
        }
    }

    /// Skip one complete TLV (for unknown extensions).
    fn skip_tlv(&mut self) -> Result<(), DecodeError> {
        let header = self.read_header()?;
        match header.length {
            Length::Definite(len) => {
                self.take(len)?;
                Ok(())
            }
            Length::Indefinite => {
                let region = self.region(header);
                while !self.at_end(region)? {
                    self.skip_tlv()?;
                }
                Ok(())
            }
        }
    }

    /// Does a value of type `id` start with `tag` on the wire?
    fn matches(&self, id: TypeId, tag: Tag) -> bool {
        let node = self.model.node(id);
        match &node.kind {
            TypeKind::Tagged { tag: own, .. } => *own == tag,
            TypeKind::Choice(c) => c.members.iter().any(|m| self.matches(m.ty, tag)),
            TypeKind::Any => true,
            kind => kind.universal_tag() == Some(tag),
        }
    }

    /// Decode one complete TLV of type `id`.
    fn node(&mut self, id: TypeId) -> Result<Value, DecodeError> {
        let model = self.model;
        let node = model.node(id);
        match &node.kind {
            TypeKind::Choice(c) => {
                let saved = self.pos;
                let header = self.read_header()?;
                self.pos = saved;
                let member = c
                    .members
                    .iter()
                    .find(|m| self.matches(m.ty, header.tag))
                    .ok_or_else(|| {
                        self.err(DecodeErrorKind::UnknownChoice(alloc::format!(
                            "{}",
                            header.tag
                        )))
                    })?;
                let name = model.str(member.name).to_owned();
                self.path.push(PathSegment::Member(name.clone()));
                let value = self.node(member.ty)?;
                self.path.pop();
                Ok(Value::Choice(name, Box::new(value)))
            }
            TypeKind::Any => {
                let start = self.pos;
                self.skip_tlv()?;
                Ok(Value::Bytes(self.data[start..self.pos].to_vec()))
            }
            TypeKind::Tagged { tag, mode, inner } => {
                let header = self.read_header()?;
                if header.tag != *tag {
                    return Err(self.err(DecodeErrorKind::UnexpectedTag {
                        expected: alloc::format!("{tag}"),
                        found: alloc::format!("{}", header.tag),
                    }));
                }
                match mode {
                    TagMode::Explicit => {
                        let region = self.region(header);
                        let value = self.node(*inner)?;
                        self.close(region)?;
                        Ok(value)
                    }
                    TagMode::Implicit => self.with_header(*inner, header),
                }
            }
            kind => {
                let expected = kind.universal_tag().unwrap_or(Tag::universal(0));
                let header = self.read_header()?;
                if header.tag != expected {
                    return Err(self.err(DecodeErrorKind::UnexpectedTag {
                        expected: alloc::format!("{expected}"),
                        found: alloc::format!("{}", header.tag),
                    }));
                }
                self.with_header(id, header)
            }
        }
    }

    /// Decode contents for type `id`, the header already consumed (implicit
    /// tagging re-targets the header at the inner type).
    #[allow(clippy::too_many_lines)]
    fn with_header(&mut self, id: TypeId, header: Header) -> Result<Value, DecodeError> {
        let model = self.model;
        let node = model.node(id);
        match &node.kind {
            TypeKind::Tagged { mode, inner, .. } => match mode {
                TagMode::Implicit => self.with_header(*inner, header),
                TagMode::Explicit => {
                    let region = self.region(header);
                    let value = self.node(*inner)?;
                    self.close(region)?;
                    Ok(value)
                }
            },
            TypeKind::Choice(c) => {
                // An implicitly retagged CHOICE does not occur (the resolver
                // forces EXPLICIT), but a CHOICE alternative reached through
                // its own tag dispatches here.
                let member = c
                    .members
                    .iter()
                    .find(|m| self.matches(m.ty, header.tag))
                    .ok_or_else(|| {
                        self.err(DecodeErrorKind::UnknownChoice(alloc::format!(
                            "{}",
                            header.tag
                        )))
                    })?;
                let name = model.str(member.name).to_owned();
                let value = self.with_header(member.ty, header)?;
                Ok(Value::Choice(name, Box::new(value)))
            }
            TypeKind::Any => Err(self.bad("open type cannot be implicitly tagged")),
            TypeKind::Boolean => {
                let contents = self.primitive_contents(header)?;
                let [b] = contents[..] else {
                    return Err(self.bad("BOOLEAN contents must be one octet"));
                };
                if self.mode.is_canonical() && b != 0x00 && b != 0xff {
                    return Err(self.bad("non-canonical BOOLEAN"));
                }
                Ok(Value::Boolean(b != 0))
            }
            TypeKind::Integer { .. } => {
                let contents = self.primitive_contents(header)?;
                if contents.is_empty() {
                    return Err(self.bad("empty INTEGER contents"));
                }
                if self.mode.is_canonical() && prim::int_is_redundant(&contents) {
                    return Err(self.bad("non-minimal INTEGER contents"));
                }
                let v = prim::int_from_bytes(&contents);
                if let Some(Containment::Outside) =
                    node.constraint.as_ref().map(|c| c.check_int(&v))
                {
                    return Err(self.err(DecodeErrorKind::ConstraintViolation {
                        value: alloc::format!("{v}"),
                    }));
                }
                Ok(Value::Integer(v))
            }
            TypeKind::Enumerated { root, ext, .. } => {
                let contents = self.primitive_contents(header)?;
                let number = prim::int_from_bytes(&contents);
                use num_traits::ToPrimitive;
                let number = number
                    .to_i64()
                    .ok_or_else(|| self.bad("ENUMERATED number out of range"))?;
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
                let contents = self.primitive_contents(header)?;
                let v = prim::real_from_bytes(&contents)
                    .map_err(|msg| self.bad(&msg))?;
                Ok(Value::Real(v))
            }
            TypeKind::Null => {
                let contents = self.primitive_contents(header)?;
                if !contents.is_empty() {
                    return Err(self.bad("NULL contents must be empty"));
                }
                Ok(Value::Null)
            }
            TypeKind::OctetString => {
                let contents = self.string_contents(header)?;
                self.check_decoded_size(id, contents.len() as u64)?;
                Ok(Value::Bytes(contents))
            }
            TypeKind::BitString { .. } => {
                let bs = self.bit_string_contents(header)?;
                self.check_decoded_size(id, bs.bit_len as u64)?;
                Ok(Value::BitString(bs))
            }
            TypeKind::CharacterString(kind) => {
                let contents = self.string_contents(header)?;
                let text = prim::text_from_bytes(*kind, &contents)
                    .map_err(|()| self.err(DecodeErrorKind::BadUtf8))?;
                self.check_decoded_size(id, text.chars().count() as u64)?;
                Ok(Value::Text(text))
            }
            TypeKind::Time(_) => {
                let contents = self.primitive_contents(header)?;
                let text = core::str::from_utf8(&contents)
                    .map_err(|_| self.err(DecodeErrorKind::BadUtf8))?;
                Ok(Value::Text(text.to_owned()))
            }
            TypeKind::ObjectIdentifier | TypeKind::RelativeOid => {
                let contents = self.primitive_contents(header)?;
                let relative = matches!(node.kind, TypeKind::RelativeOid);
                let components = prim::oid_from_bytes(&contents, relative)
                    .map_err(|msg| self.bad(&msg))?;
                Ok(Value::ObjectIdentifier(components))
            }
            TypeKind::Sequence(c) => {
                if !header.constructed {
                    return Err(self.bad("SEQUENCE must be constructed"));
                }
                let region = self.region(header);
                let value = self.sequence_members(c, region)?;
                Ok(value)
            }
            TypeKind::Set(c) => {
                if !header.constructed {
                    return Err(self.bad("SET must be constructed"));
                }
                let region = self.region(header);
                let value = self.set_members(c, region)?;
                Ok(value)
            }
            TypeKind::SequenceOf { element } | TypeKind::SetOf { element } => {
                if !header.constructed {
                    return Err(self.bad("SEQUENCE OF must be constructed"));
                }
                let element = *element;
                let region = self.region(header);
                let mut items = Vec::new();
                while !self.at_end(region)? {
                    self.path.push(PathSegment::Index(items.len()));
                    let item = self.node(element)?;
                    self.path.pop();
                    items.push(item);
                }
                self.check_decoded_size(id, items.len() as u64)?;
                Ok(Value::List(items))
            }
        }
    }

    fn check_decoded_size(&self, id: TypeId, n: u64) -> Result<(), DecodeError> {
        let node = self.model.node(id);
        if let Some(Containment::Outside) =
            node.constraint.as_ref().map(|c| c.check_size(n))
        {
            return Err(self.err(DecodeErrorKind::ConstraintViolation {
                value: alloc::format!("size {n}"),
            }));
        }
        Ok(())
    }

    /// Contents of a primitive TLV.
    fn primitive_contents(&mut self, header: Header) -> Result<Vec<u8>, DecodeError> {
        if header.constructed {
            return Err(self.bad("expected a primitive encoding"));
        }
        let Length::Definite(len) = header.length else {
            return Err(self.bad("indefinite length on a primitive"));
        };
        Ok(self.take(len)?.to_vec())
    }

    /// Contents of an OCTET STRING or character string, reassembling
    /// BER/CER constructed segments.
    fn string_contents(&mut self, header: Header) -> Result<Vec<u8>, DecodeError> {
        if !header.constructed {
            let Length::Definite(len) = header.length else {
                return Err(self.bad("indefinite length on a primitive"));
            };
            return Ok(self.take(len)?.to_vec());
        }
        if self.mode == BerMode::Der {
            return Err(self.bad("constructed string in DER"));
        }
        let region = self.region(header);
        let mut out = Vec::new();
        while !self.at_end(region)? {
            let segment = self.read_header()?;
            out.extend_from_slice(&self.string_contents(segment)?);
        }
        Ok(out)
    }

    /// BIT STRING contents (unused-bits octet handling), reassembling
    /// constructed segments.
    fn bit_string_contents(&mut self, header: Header) -> Result<BitString, DecodeError> {
        if !header.constructed {
            let contents = self.primitive_contents(header)?;
            let Some((&unused, data)) = contents.split_first() else {
                return Err(self.bad("missing BIT STRING unused-bits octet"));
            };
            if unused > 7 || (data.is_empty() && unused != 0) {
                return Err(self.bad("invalid unused-bits count"));
            }
            let bit_len = data.len() * 8 - unused as usize;
            let bs = BitString::new(data.to_vec(), bit_len);
            if self.mode.is_canonical() {
                let mut normalized = bs.clone();
                normalized.normalize();
                if normalized.data != bs.data {
                    return Err(self.bad("unused BIT STRING bits must be zero"));
                }
            }
            return Ok(bs);
        }
        if self.mode == BerMode::Der {
            return Err(self.bad("constructed string in DER"));
        }
        let region = self.region(header);
        let mut data: Vec<u8> = Vec::new();
        let mut bit_len = 0usize;
        while !self.at_end(region)? {
            let segment_header = self.read_header()?;
            let segment = self.bit_string_contents(segment_header)?;
            if bit_len % 8 != 0 {
                return Err(self.bad("only the last BIT STRING segment may be partial"));
            }
            data.extend_from_slice(&segment.data);
            bit_len += segment.bit_len;
        }
        Ok(BitString::new(data, bit_len))
    }

    /// Decode SEQUENCE members in order, restoring absent defaults.
    fn sequence_members(
        &mut self,
        composite: &Composite,
        region: Region,
    ) -> Result<Value, DecodeError> {
        let model = self.model;
        let mut out: Vec<(String, Value)> = Vec::new();
        let mut ended = self.at_end(region)?;
        for member in &composite.members {
            let name = model.str(member.name).to_owned();
            let mut present = false;
            if !ended {
                let saved = self.pos;
                let header = self.read_header()?;
                self.pos = saved;
                present = self.matches(member.ty, header.tag);
            }
            if present {
                self.path.push(PathSegment::Member(name.clone()));
                let value = self.node(member.ty)?;
                self.path.pop();
                out.push((name, value));
                ended = self.at_end(region)?;
            } else if let Some(default) = &member.default {
                out.push((name, default.clone()));
            } else if !member.optional && member.in_root() {
                return Err(self.err(DecodeErrorKind::MissingMember(name)));
            }
        }
        // Unknown trailing members are tolerated past an extension marker.
        while !ended {
            if !composite.extensible {
                return Err(self.err(DecodeErrorKind::TrailingData));
            }
            self.skip_tlv()?;
            ended = self.at_end(region)?;
        }
        Ok(Value::Sequence(out))
    }

    /// Decode SET members in any order.
    fn set_members(
        &mut self,
        composite: &Composite,
        region: Region,
    ) -> Result<Value, DecodeError> {
        let model = self.model;
        let mut decoded: Vec<Option<Value>> = alloc::vec![None; composite.members.len()];
        while !self.at_end(region)? {
            let saved = self.pos;
            let header = self.read_header()?;
            self.pos = saved;
            let slot = composite
                .members
                .iter()
                .position(|m| self.matches(m.ty, header.tag));
            match slot {
                Some(idx) => {
                    if decoded[idx].is_some() {
                        return Err(self.bad("duplicate SET member"));
                    }
                    let name = model.str(composite.members[idx].name).to_owned();
                    self.path.push(PathSegment::Member(name));
                    let value = self.node(composite.members[idx].ty)?;
                    self.path.pop();
                    decoded[idx] = Some(value);
                }
                None => {
                    if !composite.extensible {
                        return Err(self.err(DecodeErrorKind::UnexpectedTag {
                            expected: "a SET member".into(),
                            found: alloc::format!("{}", header.tag),
                        }));
                    }
                    self.skip_tlv()?;
                }
            }
        }
        let mut out = Vec::new();
        for (member, value) in composite.members.iter().zip(decoded) {
            let name = model.str(member.name).to_owned();
            match value {
                Some(value) => out.push((name, value)),
                None => {
                    if let Some(default) = &member.default {
                        out.push((name, default.clone()));
                    } else if !member.optional && member.in_root() {
                        return Err(self.err(DecodeErrorKind::MissingMember(name)));
                    }
                }
            }
        }
        Ok(Value::Sequence(out))
    }
}
