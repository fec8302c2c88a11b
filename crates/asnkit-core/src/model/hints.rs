//! Derived encoding hints.
//!
//! Hints are computed once at resolve time from the merged constraint and
//! cached on the node, so the codecs never re-walk constraint trees to pick
//! integer widths, length forms or per-character bit counts.

use super::constraint::{Constraint, ConstraintElem};
use crate::value::Value;
use alloc::vec::Vec;

/// Cap on expanded permitted-alphabet tables. Larger alphabets gain nothing
/// over the canonical per-type encoding.
const MAX_ALPHABET: usize = 4096;

/// A resolved permitted alphabet, sorted by character code.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Alphabet {
    /// The permitted characters, ascending.
    pub chars: Vec<char>,
}

impl Alphabet {
    /// Index of a character in the alphabet.
    #[must_use]
    pub fn index_of(&self, c: char) -> Option<usize> {
        self.chars.binary_search(&c).ok()
    }

    /// Bits per character for the unaligned index encoding.
    #[must_use]
    pub fn bits(&self) -> u32 {
        bits_for_count(self.chars.len() as u128)
    }

    /// The largest character code in the alphabet.
    #[must_use]
    pub fn max_code(&self) -> u32 {
        self.chars.last().map_or(0, |&c| c as u32)
    }
}

/// Minimal bits to distinguish `count` values.
#[must_use]
pub fn bits_for_count(count: u128) -> u32 {
    if count <= 1 {
        0
    } else {
        128 - (count - 1).leading_zeros()
    }
}

/// Precomputed encoding facts for one type node.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncodingHints {
    /// Effective integer lower bound; `None` when unbounded below.
    pub int_lo: Option<i128>,
    /// Effective integer upper bound; `None` when unbounded above.
    pub int_hi: Option<i128>,
    /// The integer constraint carries an extension marker.
    pub int_extensible: bool,
    /// Effective size lower bound.
    pub size_lo: Option<u64>,
    /// Effective size upper bound.
    pub size_hi: Option<u64>,
    /// The size constraint carries an extension marker.
    pub size_extensible: bool,
    /// Resolved permitted alphabet, if usable.
    pub alphabet: Option<Alphabet>,
}

impl EncodingHints {
    /// Derive hints from a merged constraint.
    #[must_use]
    pub fn derive(constraint: Option<&Constraint>) -> Self {
        let mut hints = Self::default();
        let Some(constraint) = constraint else {
            return hints;
        };

        if let Some((lo, hi)) = int_bounds(&constraint.root) {
            hints.int_lo = lo;
            hints.int_hi = hi;
            hints.int_extensible = constraint.extensible;
        }

        for elem in constraint.root_elems() {
            collect_size_and_alphabet(elem, constraint.extensible, &mut hints);
        }
        hints
    }

    /// The type has a closed integer range.
    #[must_use]
    pub fn int_range(&self) -> Option<(i128, i128)> {
        match (self.int_lo, self.int_hi) {
            (Some(lo), Some(hi)) => Some((lo, hi)),
            _ => None,
        }
    }

    /// The type has a fixed size.
    #[must_use]
    pub fn fixed_size(&self) -> Option<u64> {
        match (self.size_lo, self.size_hi, self.size_extensible) {
            (Some(lo), Some(hi), false) if lo == hi => Some(lo),
            _ => None,
        }
    }
}

fn collect_size_and_alphabet(elem: &ConstraintElem, outer_ext: bool, hints: &mut EncodingHints) {
    match elem {
        ConstraintElem::Size(inner) => {
            if let Some((lo, hi)) = int_bounds(&inner.root) {
                hints.size_lo = lo.map(|v| v.max(0) as u64);
                hints.size_hi = hi.map(|v| v.max(0) as u64);
                hints.size_extensible = inner.extensible || outer_ext;
            }
        }
        ConstraintElem::Alphabet(inner) => {
            let mut chars = Vec::new();
            if collect_chars(&inner.root, &mut chars) && collect_chars(&inner.ext, &mut chars) {
                chars.sort_unstable();
                chars.dedup();
                if !chars.is_empty() {
                    hints.alphabet = Some(Alphabet { chars });
                }
            }
        }
        ConstraintElem::Union(parts) | ConstraintElem::Intersection(parts) => {
            for part in parts {
                collect_size_and_alphabet(part, outer_ext, hints);
            }
        }
        _ => {}
    }
}

/// Collect permitted characters; returns `false` if the set is too large or
/// not representable.
fn collect_chars(elems: &[ConstraintElem], out: &mut Vec<char>) -> bool {
    for elem in elems {
        match elem {
            ConstraintElem::Value(Value::Text(s)) => out.extend(s.chars()),
            ConstraintElem::Range {
                lo: Some(lo),
                hi: Some(hi),
            } => {
                if *lo < 0 || *hi < *lo || (*hi - *lo) as usize > MAX_ALPHABET {
                    return false;
                }
                for code in *lo..=*hi {
                    match char::from_u32(code as u32) {
                        Some(c) => out.push(c),
                        None => return false,
                    }
                }
            }
            _ => return false,
        }
        if out.len() > MAX_ALPHABET {
            return false;
        }
    }
    true
}

/// The union bounds of an element set: `Some((lo, hi))` if any element
/// constrains integer values, with `None` endpoints for open ends.
#[allow(clippy::type_complexity)]
fn int_bounds(elems: &[ConstraintElem]) -> Option<(Option<i128>, Option<i128>)> {
    let mut found = false;
    let mut lo: Option<i128> = None;
    let mut hi: Option<i128> = None;
    let mut lo_open = false;
    let mut hi_open = false;

    for elem in elems {
        let Some((elo, ehi)) = elem_bounds(elem) else {
            continue;
        };
        if !found {
            found = true;
            lo = elo;
            hi = ehi;
            lo_open = elo.is_none();
            hi_open = ehi.is_none();
            continue;
        }
        match (lo, elo) {
            (Some(a), Some(b)) => lo = Some(a.min(b)),
            _ => lo_open = true,
        }
        match (hi, ehi) {
            (Some(a), Some(b)) => hi = Some(a.max(b)),
            _ => hi_open = true,
        }
    }

    if !found {
        return None;
    }
    Some((
        if lo_open { None } else { lo },
        if hi_open { None } else { hi },
    ))
}

/// Bounds contributed by a single element, if it constrains integers.
fn elem_bounds(elem: &ConstraintElem) -> Option<(Option<i128>, Option<i128>)> {
    match elem {
        ConstraintElem::Value(Value::Integer(v)) => {
            let v = super::constraint::endpoint_of(v)?;
            Some((Some(v), Some(v)))
        }
        ConstraintElem::Range { lo, hi } => Some((*lo, *hi)),
        ConstraintElem::Union(parts) => {
            if let Some((lo, hi)) = int_bounds(parts) {
                Some((lo, hi))
            } else {
                None
            }
        }
        ConstraintElem::Intersection(parts) => {
            let mut lo: Option<i128> = None;
            let mut hi: Option<i128> = None;
            let mut found = false;
            for part in parts {
                if let Some((plo, phi)) = elem_bounds(part) {
                    found = true;
                    lo = match (lo, plo) {
                        (Some(a), Some(b)) => Some(a.max(b)),
                        (a, b) => a.or(b),
                    };
                    hi = match (hi, phi) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    };
                }
            }
            if found { Some((lo, hi)) } else { None }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use alloc::vec;

    #[test]
    fn test_bits_for_count() {
        assert_eq!(bits_for_count(1), 0);
        assert_eq!(bits_for_count(2), 1);
        assert_eq!(bits_for_count(3), 2);
        assert_eq!(bits_for_count(256), 8);
        assert_eq!(bits_for_count(257), 9);
    }

    #[test]
    fn test_int_range_hint() {
        let c = Constraint::closed(vec![ConstraintElem::Range {
            lo: Some(0),
            hi: Some(100),
        }]);
        let hints = EncodingHints::derive(Some(&c));
        assert_eq!(hints.int_range(), Some((0, 100)));
        assert!(!hints.int_extensible);
    }

    #[test]
    fn test_size_hint_fixed() {
        let size = Constraint::closed(vec![ConstraintElem::Range {
            lo: Some(4),
            hi: Some(4),
        }]);
        let c = Constraint::closed(vec![ConstraintElem::Size(Box::new(size))]);
        let hints = EncodingHints::derive(Some(&c));
        assert_eq!(hints.fixed_size(), Some(4));
    }

    #[test]
    fn test_alphabet_hint() {
        let from = Constraint::closed(vec![ConstraintElem::Value(Value::Text("abcd".into()))]);
        let c = Constraint::closed(vec![ConstraintElem::Alphabet(Box::new(from))]);
        let hints = EncodingHints::derive(Some(&c));
        let alphabet = hints.alphabet.unwrap();
        assert_eq!(alphabet.chars, ['a', 'b', 'c', 'd']);
        assert_eq!(alphabet.bits(), 2);
        assert_eq!(alphabet.index_of('c'), Some(2));
    }

    #[test]
    fn test_union_widens_bounds() {
        let c = Constraint::closed(vec![
            ConstraintElem::Range {
                lo: Some(0),
                hi: Some(10),
            },
            ConstraintElem::Value(Value::int(42)),
        ]);
        let hints = EncodingHints::derive(Some(&c));
        assert_eq!(hints.int_range(), Some((0, 42)));
    }
}
