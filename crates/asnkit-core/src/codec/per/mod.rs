//! PER / UPER codec (ITU-T X.691).
//!
//! Tagless and bit-packed: ordering and presence are implied by the model.
//! The aligned variant pads to octet boundaries at the points §11
//! prescribes; the unaligned variant (UPER) never pads. Both share the
//! engines here, with alignment as a run-time mode.

mod buffer;
mod decoder;
mod encoder;

pub use decoder::decode;
pub use encoder::encode;

use crate::model::{bits_for_count, Alphabet, Model, StringKind, Tag, TypeKind, TypeNode};
use alloc::vec::Vec;

/// The canonical NumericString alphabet (§27.5.2, table values 0..10).
const NUMERIC_ALPHABET: &[char] = &[' ', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

/// Size bounds extracted from the hints, shaped for the PER length forms.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SizeBounds {
    pub lo: u64,
    pub hi: Option<u64>,
    pub extensible: bool,
}

impl SizeBounds {
    pub(crate) fn of(node: &TypeNode) -> Self {
        Self {
            lo: node.hints.size_lo.unwrap_or(0),
            hi: node.hints.size_hi,
            extensible: node.hints.size_extensible,
        }
    }

    /// A fixed size below the fragmentation threshold.
    pub(crate) fn fixed(&self) -> Option<u64> {
        match (self.extensible, self.hi) {
            (false, Some(hi)) if hi == self.lo && hi < 65536 => Some(hi),
            _ => None,
        }
    }

    /// A constrained length encodable as a whole number.
    pub(crate) fn constrained(&self) -> Option<(u64, u64)> {
        match self.hi {
            Some(hi) if hi <= 65535 => Some((self.lo, hi)),
            _ => None,
        }
    }

    pub(crate) fn contains(&self, n: u64) -> bool {
        n >= self.lo && self.hi.map_or(true, |hi| n <= hi)
    }
}

/// How characters of a known-multiplier string go on the wire.
pub(crate) struct CharSpec {
    /// Bits per character (already widened to a power of two when aligned).
    pub bits: u32,
    /// Character table; `None` encodes the character code directly.
    pub table: Option<Vec<char>>,
}

impl CharSpec {
    pub(crate) fn value_of(&self, c: char) -> Option<u128> {
        match &self.table {
            Some(table) => table
                .iter()
                .position(|&t| t == c)
                .map(|i| i as u128),
            None => Some(u128::from(c as u32)),
        }
    }

    pub(crate) fn char_of(&self, v: u128) -> Option<char> {
        match &self.table {
            Some(table) => table.get(usize::try_from(v).ok()?).copied(),
            None => char::from_u32(u32::try_from(v).ok()?),
        }
    }
}

/// Compute the per-character encoding of a known-multiplier string kind, or
/// `None` for the octet-based kinds (UTF8String and the unrestricted
/// kinds).
pub(crate) fn char_spec(
    kind: StringKind,
    alphabet: Option<&Alphabet>,
    aligned: bool,
) -> Option<CharSpec> {
    // (canonical bit count, largest canonical value, canonical table)
    let (canon_bits, canon_ub, canon_table): (u32, u32, Option<&[char]>) = match kind {
        StringKind::Numeric => (4, 10, Some(NUMERIC_ALPHABET)),
        StringKind::Printable => (7, 122, None),
        StringKind::Ia5 => (7, 127, None),
        StringKind::Visible => (7, 126, None),
        StringKind::Bmp => (16, 0xffff, None),
        StringKind::Universal => (32, 0x0010_ffff, None),
        _ => return None,
    };

    let widen = |b: u32| -> u32 {
        if aligned && b > 0 {
            b.next_power_of_two()
        } else {
            b
        }
    };

    let Some(alphabet) = alphabet else {
        return Some(CharSpec {
            bits: widen(canon_bits),
            table: canon_table.map(<[char]>::to_vec),
        });
    };

    let n = alphabet.chars.len() as u128;
    let bits = widen(bits_for_count(n));
    // §27.5.2: encode character values directly when the width already
    // covers them; otherwise encode indices into the permitted alphabet.
    let direct_covers = match canon_table {
        Some(_) => false,
        None => bits >= 128 || (1u128 << bits) > u128::from(canon_ub),
    };
    if direct_covers {
        Some(CharSpec { bits, table: None })
    } else {
        Some(CharSpec {
            bits,
            table: Some(alphabet.chars.clone()),
        })
    }
}

/// The tag used to order SET members and CHOICE alternatives canonically.
pub(crate) fn sort_tag(model: &Model, id: crate::model::TypeId) -> Tag {
    let node = model.node(id);
    match &node.kind {
        TypeKind::Tagged { tag, .. } => *tag,
        TypeKind::Choice(c) => c
            .members
            .iter()
            .map(|m| sort_tag(model, m.ty))
            .min()
            .unwrap_or(Tag::universal(u32::MAX)),
        kind => kind.universal_tag().unwrap_or(Tag::universal(u32::MAX)),
    }
}

/// ENUMERATED root items with their PER indices (value-sorted).
pub(crate) fn enum_indices(root: &[(crate::model::StrId, i64)]) -> Vec<(usize, i64)> {
    let mut values: Vec<i64> = root.iter().map(|(_, v)| *v).collect();
    values.sort_unstable();
    values.into_iter().enumerate().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_spec_canonical_ia5() {
        let spec = char_spec(StringKind::Ia5, None, false).unwrap();
        assert_eq!(spec.bits, 7);
        assert!(spec.table.is_none());
        let aligned = char_spec(StringKind::Ia5, None, true).unwrap();
        assert_eq!(aligned.bits, 8);
    }

    #[test]
    fn test_char_spec_numeric_table() {
        let spec = char_spec(StringKind::Numeric, None, false).unwrap();
        assert_eq!(spec.bits, 4);
        assert_eq!(spec.value_of('0'), Some(1));
        assert_eq!(spec.value_of(' '), Some(0));
        assert_eq!(spec.char_of(10), Some('9'));
    }

    #[test]
    fn test_char_spec_restricted_alphabet() {
        let alphabet = Alphabet {
            chars: alloc::vec!['a', 'b', 'c', 'd'],
        };
        let spec = char_spec(StringKind::Ia5, Some(&alphabet), false).unwrap();
        assert_eq!(spec.bits, 2);
        assert_eq!(spec.value_of('c'), Some(2));
        assert_eq!(spec.char_of(3), Some('d'));
    }

    #[test]
    fn test_utf8_has_no_char_spec() {
        assert!(char_spec(StringKind::Utf8, None, false).is_none());
    }

    #[test]
    fn test_enum_indices_sorted_by_value() {
        // Items declared out of numeric order index by value order.
        let indices = enum_indices(&[]);
        assert!(indices.is_empty());
    }
}
