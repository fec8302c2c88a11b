//! Resolved constraints.
//!
//! The resolver folds constraint notation into this reduced form: all value
//! references are replaced by concrete values, ranges are normalized to
//! `lo <= hi`, and the extension marker splits the tree into a root part and
//! an extension part. Codecs consult constraints through the containment
//! checks; the bounds used for PER/OER width selection live in
//! [`super::hints::EncodingHints`].

use super::ids::{StrId, TypeId};
use crate::ast::Presence;
use crate::value::Value;
use alloc::boxed::Box;
use alloc::vec::Vec;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Where a value falls relative to a constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Containment {
    /// Satisfies the root part.
    Root,
    /// Satisfies only the extension part of an extensible constraint.
    Extension,
    /// Satisfies neither part.
    Outside,
}

/// A `WITH COMPONENTS` entry.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentEntry {
    /// Constrained component name.
    pub name: StrId,
    /// Presence requirement.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub presence: Presence,
    /// Nested value constraint.
    pub constraint: Option<Constraint>,
}

/// One element of a constraint element set (a union term).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstraintElem {
    /// A single permitted value.
    Value(Value),
    /// A normalized value range; `None` endpoints are MIN/MAX. For
    /// permitted-alphabet constraints the endpoints are character codes.
    Range {
        /// Lower endpoint (inclusive).
        lo: Option<i128>,
        /// Upper endpoint (inclusive).
        hi: Option<i128>,
    },
    /// `SIZE (...)`.
    Size(Box<Constraint>),
    /// `FROM (...)` permitted alphabet.
    Alphabet(Box<Constraint>),
    /// `CONTAINING Type`.
    Containing(TypeId),
    /// `WITH COMPONENTS { ... }`; `true` when partial (`..., `).
    WithComponents(bool, Vec<ComponentEntry>),
    /// `WITH COMPONENT (...)`, recorded for the element type.
    InnerType(Box<Constraint>),
    /// Union of elements (nested; a top-level union is the set itself).
    Union(Vec<ConstraintElem>),
    /// Intersection of elements.
    Intersection(Vec<ConstraintElem>),
    /// `ALL EXCEPT elem` / complement.
    Complement(Box<ConstraintElem>),
}

/// A resolved constraint with its extension split.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constraint {
    /// Root element set (a union).
    pub root: Vec<ConstraintElem>,
    /// An extension marker was present.
    pub extensible: bool,
    /// Extension element set.
    pub ext: Vec<ConstraintElem>,
}

/// How an element set relates to a probe: whether any element applied, and
/// whether one matched.
struct SetMatch {
    applicable: bool,
    matched: bool,
}

impl Constraint {
    /// Create a closed constraint from root elements.
    #[must_use]
    pub fn closed(root: Vec<ConstraintElem>) -> Self {
        Self {
            root,
            extensible: false,
            ext: Vec::new(),
        }
    }

    /// Check an INTEGER (or ENUMERATED number) against the constraint.
    #[must_use]
    pub fn check_int(&self, v: &BigInt) -> Containment {
        self.check_with(&mut |elem| elem_matches_int(elem, v))
    }

    /// Check a collection size or string length against SIZE elements.
    #[must_use]
    pub fn check_size(&self, n: u64) -> Containment {
        let probe = BigInt::from(n);
        self.check_with(&mut |elem| match elem {
            ConstraintElem::Size(inner) => Some(matches!(
                inner.check_int(&probe),
                Containment::Root | Containment::Extension
            )),
            _ => None,
        })
    }

    /// Check every character of a string against FROM elements.
    #[must_use]
    pub fn check_alphabet(&self, s: &str) -> Containment {
        self.check_with(&mut |elem| match elem {
            ConstraintElem::Alphabet(inner) => {
                Some(s.chars().all(|c| {
                    matches!(
                        inner.check_int(&BigInt::from(c as u32)),
                        Containment::Root | Containment::Extension
                    )
                }))
            }
            _ => None,
        })
    }

    /// Generic containment: `probe` returns `Some(matched)` for applicable
    /// elements and `None` for elements that do not constrain this aspect.
    /// An element set with no applicable element does not restrict the value.
    fn check_with(&self, probe: &mut dyn FnMut(&ConstraintElem) -> Option<bool>) -> Containment {
        let root = match_set(&self.root, probe);
        if !root.applicable || root.matched {
            return Containment::Root;
        }
        if self.extensible {
            let ext = match_set(&self.ext, probe);
            if ext.matched {
                return Containment::Extension;
            }
            // An extensible constraint admits any value of the parent type
            // into the extension range.
            return Containment::Extension;
        }
        Containment::Outside
    }

    /// Iterate root elements, descending through intersections.
    pub(crate) fn root_elems(&self) -> impl Iterator<Item = &ConstraintElem> {
        self.root.iter()
    }
}

fn match_set(elems: &[ConstraintElem], probe: &mut dyn FnMut(&ConstraintElem) -> Option<bool>) -> SetMatch {
    let mut applicable = false;
    let mut matched = false;
    for elem in elems {
        match elem_match(elem, probe) {
            Some(m) => {
                applicable = true;
                matched |= m;
            }
            None => {}
        }
    }
    SetMatch { applicable, matched }
}

fn elem_match(
    elem: &ConstraintElem,
    probe: &mut dyn FnMut(&ConstraintElem) -> Option<bool>,
) -> Option<bool> {
    match elem {
        ConstraintElem::Union(parts) => {
            let mut applicable = false;
            let mut any = false;
            for part in parts {
                if let Some(m) = elem_match(part, probe) {
                    applicable = true;
                    any |= m;
                }
            }
            if applicable { Some(any) } else { None }
        }
        ConstraintElem::Intersection(parts) => {
            let mut applicable = false;
            let mut all = true;
            for part in parts {
                if let Some(m) = elem_match(part, probe) {
                    applicable = true;
                    all &= m;
                }
            }
            if applicable { Some(all) } else { None }
        }
        ConstraintElem::Complement(inner) => elem_match(inner, probe).map(|m| !m),
        _ => probe(elem),
    }
}

fn elem_matches_int(elem: &ConstraintElem, v: &BigInt) -> Option<bool> {
    match elem {
        ConstraintElem::Value(Value::Integer(n)) => Some(n == v),
        ConstraintElem::Range { lo, hi } => {
            let above = lo.map_or(true, |lo| v >= &BigInt::from(lo));
            let below = hi.map_or(true, |hi| v <= &BigInt::from(hi));
            Some(above && below)
        }
        _ => None,
    }
}

/// Fold a value to an `i128` range endpoint if possible.
#[must_use]
pub fn endpoint_of(v: &BigInt) -> Option<i128> {
    v.to_i128()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn range(lo: i128, hi: i128) -> ConstraintElem {
        ConstraintElem::Range {
            lo: Some(lo),
            hi: Some(hi),
        }
    }

    #[test]
    fn test_closed_range() {
        let c = Constraint::closed(vec![range(0, 100)]);
        assert_eq!(c.check_int(&BigInt::from(0)), Containment::Root);
        assert_eq!(c.check_int(&BigInt::from(100)), Containment::Root);
        assert_eq!(c.check_int(&BigInt::from(127)), Containment::Outside);
        assert_eq!(c.check_int(&BigInt::from(-1)), Containment::Outside);
    }

    #[test]
    fn test_extensible_range() {
        let c = Constraint {
            root: vec![range(0, 7)],
            extensible: true,
            ext: vec![],
        };
        assert_eq!(c.check_int(&BigInt::from(3)), Containment::Root);
        assert_eq!(c.check_int(&BigInt::from(200)), Containment::Extension);
    }

    #[test]
    fn test_union_of_values() {
        let c = Constraint::closed(vec![
            ConstraintElem::Value(Value::int(1)),
            ConstraintElem::Value(Value::int(5)),
        ]);
        assert_eq!(c.check_int(&BigInt::from(5)), Containment::Root);
        assert_eq!(c.check_int(&BigInt::from(2)), Containment::Outside);
    }

    #[test]
    fn test_intersection_and_complement() {
        // (0..10) ^ (ALL EXCEPT 5)
        let c = Constraint::closed(vec![ConstraintElem::Intersection(vec![
            range(0, 10),
            ConstraintElem::Complement(Box::new(ConstraintElem::Value(Value::int(5)))),
        ])]);
        assert_eq!(c.check_int(&BigInt::from(4)), Containment::Root);
        assert_eq!(c.check_int(&BigInt::from(5)), Containment::Outside);
        assert_eq!(c.check_int(&BigInt::from(11)), Containment::Outside);
    }

    #[test]
    fn test_size_check() {
        let size = Constraint::closed(vec![range(1, 4)]);
        let c = Constraint::closed(vec![ConstraintElem::Size(Box::new(size))]);
        assert_eq!(c.check_size(2), Containment::Root);
        assert_eq!(c.check_size(5), Containment::Outside);
        // SIZE does not restrict integer values.
        assert_eq!(c.check_int(&BigInt::from(99)), Containment::Root);
    }

    #[test]
    fn test_alphabet_check() {
        let from = Constraint::closed(vec![ConstraintElem::Range {
            lo: Some('a' as i128),
            hi: Some('z' as i128),
        }]);
        let c = Constraint::closed(vec![ConstraintElem::Alphabet(Box::new(from))]);
        assert_eq!(c.check_alphabet("abc"), Containment::Root);
        assert_eq!(c.check_alphabet("aBc"), Containment::Outside);
    }
}
