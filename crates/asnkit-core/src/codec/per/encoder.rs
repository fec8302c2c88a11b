//! PER/UPER encoder: model-driven traversal over a bit-stream writer.

use super::buffer::{PerWriter, FRAGMENT};
use super::{char_spec, enum_indices, SizeBounds};
use crate::codec::prim;
use crate::codec::{
    enum_number, shape_error, text_checks, EncodeError, EncodeErrorKind, ErrorPath, PathSegment,
};
use crate::model::{
    Composite, Containment, Member, Model, TypeId, TypeKind,
};
use crate::value::{BitString, Value};
use alloc::string::ToString;
use alloc::vec::Vec;
use num_traits::ToPrimitive;

/// Encode `value` of type `id`; `aligned` selects PER vs UPER.
pub fn encode(
    model: &Model,
    aligned: bool,
    id: TypeId,
    value: &Value,
) -> Result<Vec<u8>, EncodeError> {
    let mut path = Vec::new();
    if let Some(name) = model.node(id).name {
        path.push(PathSegment::Type(model.str(name).to_string()));
    }
    let mut encoder = Encoder {
        model,
        aligned,
        path,
        w: PerWriter::new(aligned),
    };
    encoder.node(id, value)?;
    Ok(encoder.w.into_bytes())
}

struct Encoder<'m> {
    model: &'m Model,
    aligned: bool,
    path: Vec<PathSegment>,
    w: PerWriter,
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

    /// Encode a complete sub-value into its own octet-aligned buffer (open
    /// type contents).
    fn open_encoding(&self, id: TypeId, value: &Value) -> Result<Vec<u8>, EncodeError> {
        let mut sub = Encoder {
            model: self.model,
            aligned: self.aligned,
            path: self.path.clone(),
            w: PerWriter::new(self.aligned),
        };
        sub.node(id, value)?;
        Ok(sub.w.into_bytes())
    }

    /// The size-class decision shared by strings and lists: handles the
    /// extension bit and reports how the length is conveyed.
    fn size_class(
        &mut self,
        node_id: TypeId,
        len: u64,
        value: &Value,
    ) -> Result<SizeForm, EncodeError> {
        let node = self.model.node(node_id);
        let sizes = SizeBounds::of(node);
        match node.constraint.as_ref().map(|c| c.check_size(len)) {
            Some(Containment::Outside) if !sizes.extensible => {
                return Err(self.constraint_violation(value));
            }
            _ => {}
        }
        if sizes.extensible {
            let in_root = sizes.contains(len);
            self.w.write_bit(!in_root);
            if !in_root {
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
                self.w.write_bit(*b);
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
                let containment = node.constraint.as_ref().map(|c| c.check_int(v));
                let hints = &node.hints;
                if hints.int_extensible {
                    let in_root = containment != Some(Containment::Outside)
                        && containment != Some(Containment::Extension);
                    self.w.write_bit(!in_root);
                    if !in_root {
                        self.w.write_unconstrained(v);
                        return Ok(());
                    }
                } else if containment == Some(Containment::Outside) {
                    return Err(self.constraint_violation(value));
                }
                match (hints.int_lo, hints.int_hi) {
                    (Some(lo), Some(hi)) => {
                        let v = v.to_i128().ok_or_else(|| self.constraint_violation(value))?;
                        self.w.write_constrained(v, lo, hi);
                    }
                    (Some(lo), None) => self.w.write_semi_constrained(v, lo),
                    _ => self.w.write_unconstrained(v),
                }
                Ok(())
            }
            TypeKind::Enumerated {
                root,
                ext,
                extensible,
            } => {
                let Some((number, in_ext)) = enum_number(model, root, ext, value) else {
                    return Err(shape_error("ENUMERATED", value, &self.path));
                };
                if *extensible {
                    self.w.write_bit(in_ext);
                    if in_ext {
                        let pos = ext
                            .iter()
                            .position(|(_, v)| *v == number)
                            .expect("extension item exists");
                        self.w.write_normally_small(pos as u64);
                        return Ok(());
                    }
                } else if in_ext {
                    return Err(self.constraint_violation(value));
                }
                let indices = enum_indices(root);
                let index = indices
                    .iter()
                    .find(|(_, v)| *v == number)
                    .map(|(i, _)| *i)
                    .expect("root item exists");
                if root.len() > 1 {
                    self.w
                        .write_constrained(index as i128, 0, root.len() as i128 - 1);
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
                self.w.write_length(contents.len());
                self.w.align();
                self.w.write_bytes(&contents);
                Ok(())
            }
            TypeKind::ObjectIdentifier | TypeKind::RelativeOid => {
                let Value::ObjectIdentifier(components) = value else {
                    return Err(shape_error("OBJECT IDENTIFIER", value, &self.path));
                };
                let relative = matches!(node.kind, TypeKind::RelativeOid);
                let contents = prim::oid_to_bytes(components, relative)
                    .map_err(|msg| self.err(EncodeErrorKind::UnsupportedValue(msg)))?;
                self.w.write_length(contents.len());
                self.w.align();
                self.w.write_bytes(&contents);
                Ok(())
            }
            TypeKind::Any => {
                let Value::Bytes(bytes) = value else {
                    return Err(shape_error("opaque bytes", value, &self.path));
                };
                self.w.write_fragmented_bytes(bytes);
                Ok(())
            }
            TypeKind::BitString { .. } => {
                let Value::BitString(bs) = value else {
                    return Err(shape_error("BIT STRING", value, &self.path));
                };
                let mut bs = bs.clone();
                bs.normalize();
                self.bit_string(id, &bs, value)
            }
            TypeKind::OctetString => {
                let Value::Bytes(bytes) = value else {
                    return Err(shape_error("OCTET STRING", value, &self.path));
                };
                let bytes = bytes.clone();
                match self.size_class(id, bytes.len() as u64, value)? {
                    SizeForm::Fixed(n) => {
                        if n > 2 {
                            self.w.align();
                        }
                        self.w.write_bytes(&bytes);
                    }
                    SizeForm::Constrained(lo, hi) => {
                        self.w
                            .write_constrained(bytes.len() as i128, lo as i128, hi as i128);
                        if hi > 2 {
                            self.w.align();
                        }
                        self.w.write_bytes(&bytes);
                    }
                    SizeForm::General => self.w.write_fragmented_bytes(&bytes),
                }
                Ok(())
            }
            TypeKind::CharacterString(kind) => {
                let Value::Text(s) = value else {
                    return Err(shape_error("character string", value, &self.path));
                };
                let s = s.clone();
                text_checks(node, *kind, &s).map_err(|kind| self.err(kind))?;
                let spec = char_spec(*kind, node.hints.alphabet.as_ref(), self.aligned);
                let Some(spec) = spec else {
                    // Octet-based kinds carry an octet count determinant.
                    let bytes = prim::text_to_bytes(*kind, &s);
                    let node_check = self
                        .model
                        .node(id)
                        .constraint
                        .as_ref()
                        .map(|c| c.check_size(s.chars().count() as u64));
                    if node_check == Some(Containment::Outside) {
                        return Err(self.constraint_violation(value));
                    }
                    self.w.write_fragmented_bytes(&bytes);
                    return Ok(());
                };
                let count = s.chars().count() as u64;
                let values: Vec<u128> = s
                    .chars()
                    .map(|c| {
                        spec.value_of(c).ok_or_else(|| {
                            self.err(EncodeErrorKind::UnsupportedValue(alloc::format!(
                                "character {c:?} outside the permitted alphabet"
                            )))
                        })
                    })
                    .collect::<Result<_, _>>()?;
                match self.size_class(id, count, value)? {
                    SizeForm::Fixed(n) => {
                        if self.aligned && n * u64::from(spec.bits) > 16 {
                            self.w.align();
                        }
                        for v in values {
                            self.w.write_bits(v, spec.bits);
                        }
                    }
                    SizeForm::Constrained(lo, hi) => {
                        self.w.write_constrained(count as i128, lo as i128, hi as i128);
                        if self.aligned && hi * u64::from(spec.bits) > 16 {
                            self.w.align();
                        }
                        for v in values {
                            self.w.write_bits(v, spec.bits);
                        }
                    }
                    SizeForm::General => {
                        if (count as usize) >= FRAGMENT {
                            return Err(self.err(EncodeErrorKind::UnsupportedValue(
                                "string too long for a single length determinant".into(),
                            )));
                        }
                        self.w.write_length(count as usize);
                        self.w.align();
                        for v in values {
                            self.w.write_bits(v, spec.bits);
                        }
                    }
                }
                Ok(())
            }
            TypeKind::Time(_) => {
                let Value::Text(s) = value else {
                    return Err(shape_error("time string", value, &self.path));
                };
                self.w.write_fragmented_bytes(s.as_bytes());
                Ok(())
            }
            TypeKind::Sequence(c) => self.composite(c, value, false),
            TypeKind::Set(c) => self.composite(c, value, true),
            TypeKind::Choice(c) => self.choice(c, value),
            TypeKind::SequenceOf { element } | TypeKind::SetOf { element } => {
                let Value::List(items) = value else {
                    return Err(shape_error("list", value, &self.path));
                };
                let element = *element;
                let items = items.clone();
                match self.size_class(id, items.len() as u64, value)? {
                    SizeForm::Fixed(n) => {
                        if items.len() as u64 != n {
                            return Err(self.constraint_violation(value));
                        }
                        self.elements(element, &items)?;
                    }
                    SizeForm::Constrained(lo, hi) => {
                        self.w
                            .write_constrained(items.len() as i128, lo as i128, hi as i128);
                        self.elements(element, &items)?;
                    }
                    SizeForm::General => {
                        if items.len() < FRAGMENT {
                            self.w.write_length(items.len());
                            self.elements(element, &items)?;
                        } else {
                            self.fragmented_elements(element, &items)?;
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn bit_string(
        &mut self,
        id: TypeId,
        bs: &BitString,
        value: &Value,
    ) -> Result<(), EncodeError> {
        let len = bs.bit_len as u64;
        match self.size_class(id, len, value)? {
            SizeForm::Fixed(n) => {
                if len != n {
                    return Err(self.constraint_violation(value));
                }
                if n > 16 {
                    self.w.align();
                }
                self.w.write_bit_field(&bs.data, bs.bit_len);
            }
            SizeForm::Constrained(lo, hi) => {
                self.w.write_constrained(len as i128, lo as i128, hi as i128);
                if hi > 16 {
                    self.w.align();
                }
                self.w.write_bit_field(&bs.data, bs.bit_len);
            }
            SizeForm::General => {
                if bs.bit_len >= FRAGMENT {
                    return Err(self.err(EncodeErrorKind::UnsupportedValue(
                        "bit string too long for a single length determinant".into(),
                    )));
                }
                self.w.write_length(bs.bit_len);
                self.w.align();
                self.w.write_bit_field(&bs.data, bs.bit_len);
            }
        }
        Ok(())
    }

    fn elements(&mut self, element: TypeId, items: &[Value]) -> Result<(), EncodeError> {
        for (idx, item) in items.iter().enumerate() {
            self.path.push(PathSegment::Index(idx));
            self.node(element, item)?;
            self.path.pop();
        }
        Ok(())
    }

    /// SEQUENCE OF with 16K-block count fragmentation.
    fn fragmented_elements(
        &mut self,
        element: TypeId,
        items: &[Value],
    ) -> Result<(), EncodeError> {
        let mut rest = items;
        let mut base = 0usize;
        loop {
            if rest.len() < FRAGMENT {
                self.w.write_length(rest.len());
                for (idx, item) in rest.iter().enumerate() {
                    self.path.push(PathSegment::Index(base + idx));
                    self.node(element, item)?;
                    self.path.pop();
                }
                return Ok(());
            }
            let blocks = (rest.len() / FRAGMENT).min(4);
            self.w.align();
            self.w.write_bits(0xc0 | blocks as u128, 8);
            let chunk = blocks * FRAGMENT;
            for (idx, item) in rest[..chunk].iter().enumerate() {
                self.path.push(PathSegment::Index(base + idx));
                self.node(element, item)?;
                self.path.pop();
            }
            base += chunk;
            rest = &rest[chunk..];
            if rest.is_empty() {
                self.w.write_length(0);
                return Ok(());
            }
        }
    }

    /// The value a member effectively contributes: `None` when absent or
    /// equal to its DEFAULT.
    fn effective<'v>(&self, member: &Member, given: &'v [(alloc::string::String, Value)]) -> Option<&'v Value> {
        let name = self.model.str(member.name);
        let value = given.iter().find(|(n, _)| n == name).map(|(_, v)| v)?;
        if member.default.as_ref() == Some(value) {
            return None;
        }
        Some(value)
    }

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

        let root: Vec<&Member> = composite.root_members().collect();
        let root = {
            let mut root = root;
            if is_set {
                root.sort_by_key(|m| super::sort_tag(model, m.ty));
            }
            root
        };

        if composite.extensible {
            let ext_present = composite
                .ext_members()
                .any(|m| self.effective(m, given).is_some());
            self.w.write_bit(ext_present);
        }

        for member in root.iter().filter(|m| m.is_omittable()) {
            self.w.write_bit(self.effective(member, given).is_some());
        }

        for member in &root {
            match self.effective(member, given) {
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

        let ext_present = composite.extensible
            && composite
                .ext_members()
                .any(|m| self.effective(m, given).is_some());
        if ext_present {
            let count = composite.ext_group_count();
            self.w.write_normally_small(u64::from(count) - 1);
            let mut present = Vec::with_capacity(count as usize);
            for group in 1..=count {
                let p = composite
                    .ext_group(group)
                    .any(|m| self.effective(m, given).is_some());
                present.push(p);
                self.w.write_bit(p);
            }
            for group in 1..=count {
                if !present[group as usize - 1] {
                    continue;
                }
                let bytes = self.open_group(composite, group, given)?;
                self.w.write_fragmented_bytes(&bytes);
            }
        }
        Ok(())
    }

    /// Encode one extension addition (group) as open-type contents.
    fn open_group(
        &mut self,
        composite: &Composite,
        group: u32,
        given: &[(alloc::string::String, Value)],
    ) -> Result<Vec<u8>, EncodeError> {
        let model = self.model;
        let members: Vec<&Member> = composite.ext_group(group).collect();
        if let [member] = members[..] {
            let value = self.effective(member, given).ok_or_else(|| {
                self.err(EncodeErrorKind::MissingMember(
                    model.str(member.name).to_string(),
                ))
            })?;
            return self.open_encoding(member.ty, value);
        }
        // A version group encodes like a small SEQUENCE: presence bitmap
        // for its omittable members, then the member encodings.
        let mut sub = Encoder {
            model,
            aligned: self.aligned,
            path: self.path.clone(),
            w: PerWriter::new(self.aligned),
        };
        for member in members.iter().filter(|m| m.is_omittable()) {
            sub.w.write_bit(self.effective(member, given).is_some());
        }
        for member in &members {
            match self.effective(member, given) {
                Some(v) => {
                    sub.path
                        .push(PathSegment::Member(model.str(member.name).to_string()));
                    sub.node(member.ty, v)?;
                    sub.path.pop();
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
        Ok(sub.w.into_bytes())
    }

    fn choice(&mut self, composite: &Composite, value: &Value) -> Result<(), EncodeError> {
        let model = self.model;
        let Value::Choice(selector, inner) = value else {
            return Err(shape_error("CHOICE", value, &self.path));
        };
        let member = composite
            .members
            .iter()
            .find(|m| model.str(m.name) == selector.as_str())
            .ok_or_else(|| self.err(EncodeErrorKind::UnknownAlternative(selector.clone())))?;

        if member.in_root() {
            // Alternative indices follow declaration order.
            let root: Vec<&Member> = composite.members.iter().filter(|m| m.in_root()).collect();
            let index = root
                .iter()
                .position(|m| m.name == member.name)
                .expect("alternative indexed");
            if composite.extensible {
                self.w.write_bit(false);
            }
            if root.len() > 1 {
                self.w
                    .write_constrained(index as i128, 0, root.len() as i128 - 1);
            }
            self.path.push(PathSegment::Member(selector.clone()));
            let result = self.node(member.ty, inner);
            self.path.pop();
            result
        } else {
            self.w.write_bit(true);
            let pos = composite
                .ext_members()
                .position(|m| m.name == member.name)
                .expect("extension alternative indexed");
            self.w.write_normally_small(pos as u64);
            self.path.push(PathSegment::Member(selector.clone()));
            let bytes = self.open_encoding(member.ty, inner)?;
            self.path.pop();
            self.w.write_fragmented_bytes(&bytes);
            Ok(())
        }
    }
}

/// How a length is conveyed.
enum SizeForm {
    /// Fixed size, no length field.
    Fixed(u64),
    /// Constrained whole number over `[lo, hi]`.
    Constrained(u64, u64),
    /// General (possibly fragmented) determinant.
    General,
}
