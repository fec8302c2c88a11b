//! The language-neutral value representation shared by every codec.
//!
//! Encoders consume a [`Value`] shaped after the schema type: a list of
//! `(name, value)` pairs for SEQUENCE/SET, a `(selector, value)` pair for
//! CHOICE, an ordered list for SEQUENCE OF/SET OF, scalars for primitives.
//! Decoders produce the same shape. The marshaller never retains references
//! across a call.

use crate::model::{Model, TypeId, TypeKind};
use alloc::borrow::ToOwned;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use num_bigint::BigInt;

/// A bit string payload: bit 0 is the most significant bit of the first
/// octet; trailing bits of the last octet beyond `bit_len` are padding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitString {
    /// Packed bits, MSB-first.
    pub data: Vec<u8>,
    /// Number of significant bits.
    pub bit_len: usize,
}

impl BitString {
    /// Create a bit string from packed data and a bit count.
    #[must_use]
    pub fn new(data: Vec<u8>, bit_len: usize) -> Self {
        Self { data, bit_len }
    }

    /// Create an empty bit string.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get bit `index` (0 = MSB of the first octet).
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        if index >= self.bit_len {
            return false;
        }
        let byte = self.data[index / 8];
        (byte >> (7 - (index % 8))) & 1 == 1
    }

    /// Number of unused bits in the final octet.
    #[must_use]
    pub fn unused_bits(&self) -> u8 {
        let rem = self.bit_len % 8;
        if rem == 0 { 0 } else { (8 - rem) as u8 }
    }

    /// Build from a string of `0`/`1` characters.
    #[must_use]
    pub fn from_bits(bits: &str) -> Self {
        let mut data = Vec::with_capacity(bits.len().div_ceil(8));
        let mut bit_len = 0;
        for c in bits.chars() {
            if c != '0' && c != '1' {
                continue;
            }
            if bit_len % 8 == 0 {
                data.push(0);
            }
            if c == '1' {
                let last = data.len() - 1;
                data[last] |= 1 << (7 - (bit_len % 8));
            }
            bit_len += 1;
        }
        Self { data, bit_len }
    }

    /// Mask padding bits in the final octet to zero.
    pub fn normalize(&mut self) {
        let rem = self.bit_len % 8;
        if rem != 0 {
            if let Some(last) = self.data.last_mut() {
                *last &= 0xffu8 << (8 - rem);
            }
        }
        let needed = self.bit_len.div_ceil(8);
        self.data.truncate(needed);
    }
}

/// A runtime ASN.1 value.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// NULL.
    Null,
    /// BOOLEAN.
    Boolean(bool),
    /// INTEGER or numeric ENUMERATED.
    Integer(BigInt),
    /// REAL, including the special values `±∞` and NaN.
    Real(f64),
    /// A character string, a time value, or a named ENUMERATED item.
    Text(String),
    /// OCTET STRING or an opaque (ANY / open type) payload.
    Bytes(Vec<u8>),
    /// BIT STRING.
    BitString(BitString),
    /// OBJECT IDENTIFIER or RELATIVE-OID components.
    ObjectIdentifier(Vec<u64>),
    /// SEQUENCE/SET: `(member name, value)` pairs. Omitted OPTIONAL members
    /// are simply absent.
    Sequence(Vec<(String, Value)>),
    /// SEQUENCE OF / SET OF elements.
    List(Vec<Value>),
    /// CHOICE: selector name and payload.
    Choice(String, Box<Value>),
}

impl Value {
    /// Convenience constructor for integer values.
    #[must_use]
    pub fn int(v: i64) -> Self {
        Self::Integer(BigInt::from(v))
    }

    /// A short name for the value shape, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean(_) => "BOOLEAN",
            Self::Integer(_) => "INTEGER",
            Self::Real(_) => "REAL",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::BitString(_) => "BIT STRING",
            Self::ObjectIdentifier(_) => "OBJECT IDENTIFIER",
            Self::Sequence(_) => "SEQUENCE",
            Self::List(_) => "list",
            Self::Choice(..) => "CHOICE",
        }
    }

    /// Look up a member of a `Sequence` value by name.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Sequence(members) => members
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Fill in missing DEFAULT members of `value` against type `id`.
///
/// Produces the value a decoder would return for the encoding of `value`:
/// absent DEFAULT members become their default, recursively. Used by
/// round-trip tests and exposed as `Schema::refresh`.
#[must_use]
pub fn refresh(model: &Model, id: TypeId, value: &Value) -> Value {
    let node = model.node(id);
    match (&node.kind, value) {
        (TypeKind::Tagged { inner, .. }, _) => refresh(model, *inner, value),
        (TypeKind::Sequence(c) | TypeKind::Set(c), Value::Sequence(members)) => {
            let mut out = Vec::new();
            for m in &c.members {
                let name = model.str(m.name);
                if let Some(v) = members.iter().find(|(n, _)| n == name).map(|(_, v)| v) {
                    out.push((name.to_owned(), refresh(model, m.ty, v)));
                } else if let Some(default) = &m.default {
                    out.push((name.to_owned(), default.clone()));
                }
            }
            Value::Sequence(out)
        }
        (TypeKind::SequenceOf { element } | TypeKind::SetOf { element }, Value::List(items)) => {
            Value::List(items.iter().map(|v| refresh(model, *element, v)).collect())
        }
        (TypeKind::Choice(c), Value::Choice(selector, inner)) => {
            let alt = c
                .members
                .iter()
                .find(|m| model.str(m.name) == selector.as_str());
            match alt {
                Some(m) => Value::Choice(
                    selector.clone(),
                    Box::new(refresh(model, m.ty, inner)),
                ),
                None => value.clone(),
            }
        }
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitstring_from_bits() {
        let bs = BitString::from_bits("10110");
        assert_eq!(bs.bit_len, 5);
        assert_eq!(bs.data, [0xb0]);
        assert!(bs.get(0));
        assert!(!bs.get(1));
        assert!(bs.get(2));
        assert_eq!(bs.unused_bits(), 3);
    }

    #[test]
    fn test_bitstring_normalize() {
        let mut bs = BitString::new(alloc::vec![0xff, 0xff], 12);
        bs.normalize();
        assert_eq!(bs.data, [0xff, 0xf0]);
    }

    #[test]
    fn test_member_lookup() {
        let v = Value::Sequence(alloc::vec![("a".into(), Value::int(5))]);
        assert_eq!(v.member("a"), Some(&Value::int(5)));
        assert_eq!(v.member("b"), None);
    }
}
