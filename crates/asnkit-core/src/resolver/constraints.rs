//! Constraint resolution and merging.
//!
//! Folds constraint notation into [`model::Constraint`] trees: value
//! references become concrete values, ranges normalize to `lo <= hi`, the
//! X.680 §47 operators keep their precedence (intersection binds tighter
//! than union; `EXCEPT` becomes intersection with a complement), and the
//! extension marker splits root from extension.

use super::context::{Env, ResolverContext};
use super::error::{ResolveError, ResolveErrorKind};
use super::types::resolve_type;
use super::values::{resolve_integer, resolve_value};
use crate::ast::{AstConstraint, AstValue, ConstraintSpec, RangeEndpoint};
use crate::model::{
    ComponentEntry, Constraint, ConstraintElem, TypeId, TypeKind,
};
use crate::value::Value;
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use num_traits::ToPrimitive;

/// How values inside the constraint are interpreted.
#[derive(Clone, Copy)]
enum ValueMode {
    /// Against the constrained type.
    Target(Option<TypeId>),
    /// SIZE inner spec: plain integers.
    Int,
    /// FROM inner spec: characters and character ranges.
    Chars,
}

/// Resolve a parenthesized constraint against the type it applies to.
pub(crate) fn resolve_spec(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    spec: &ConstraintSpec,
    target: Option<TypeId>,
) -> Result<Constraint, ResolveError> {
    resolve_spec_mode(ctx, env, spec, ValueMode::Target(target))
}

fn resolve_spec_mode(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    spec: &ConstraintSpec,
    mode: ValueMode,
) -> Result<Constraint, ResolveError> {
    let Some(root) = &spec.root else {
        return Err(ctx.err(ResolveErrorKind::ExtensionWithoutRoot));
    };
    let root = convert_set(ctx, env, root, mode)?;
    let ext = match &spec.ext {
        Some(ext) => convert_set(ctx, env, ext, mode)?,
        None => Vec::new(),
    };
    Ok(Constraint {
        root,
        extensible: spec.extensible,
        ext,
    })
}

/// Convert an element set, flattening a top-level union into the set vector.
fn convert_set(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    c: &AstConstraint,
    mode: ValueMode,
) -> Result<Vec<ConstraintElem>, ResolveError> {
    if let AstConstraint::Union(terms) = c {
        let mut out = Vec::with_capacity(terms.len());
        for term in terms {
            if let Some(elem) = convert(ctx, env, term, mode)? {
                out.push(elem);
            }
        }
        return Ok(out);
    }
    Ok(match convert(ctx, env, c, mode)? {
        Some(elem) => vec![elem],
        None => Vec::new(),
    })
}

/// Convert one constraint node. `None` for notation the codecs carry no
/// semantics for (PATTERN).
fn convert(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    c: &AstConstraint,
    mode: ValueMode,
) -> Result<Option<ConstraintElem>, ResolveError> {
    match c {
        AstConstraint::Union(terms) => {
            let mut out = Vec::with_capacity(terms.len());
            for term in terms {
                if let Some(elem) = convert(ctx, env, term, mode)? {
                    out.push(elem);
                }
            }
            Ok(Some(ConstraintElem::Union(out)))
        }
        AstConstraint::Intersection(terms) => {
            let mut out = Vec::with_capacity(terms.len());
            for term in terms {
                if let Some(elem) = convert(ctx, env, term, mode)? {
                    out.push(elem);
                }
            }
            Ok(Some(ConstraintElem::Intersection(out)))
        }
        AstConstraint::Except { base, excluded } => {
            let base = convert(ctx, env, base, mode)?;
            let excluded = convert(ctx, env, excluded, mode)?;
            match (base, excluded) {
                (Some(base), Some(excluded)) => Ok(Some(ConstraintElem::Intersection(vec![
                    base,
                    ConstraintElem::Complement(Box::new(excluded)),
                ]))),
                (base, _) => Ok(base),
            }
        }
        AstConstraint::AllExcept(excluded) => {
            match convert(ctx, env, excluded, mode)? {
                Some(excluded) => Ok(Some(ConstraintElem::Complement(Box::new(excluded)))),
                None => Ok(None),
            }
        }
        AstConstraint::Value(v) => {
            let value = constraint_value(ctx, env, v, mode)?;
            Ok(Some(ConstraintElem::Value(value)))
        }
        AstConstraint::Range {
            lo,
            lo_excl,
            hi,
            hi_excl,
        } => {
            let lo = endpoint(ctx, env, lo, mode)?.map(|v| if *lo_excl { v + 1 } else { v });
            let hi = endpoint(ctx, env, hi, mode)?.map(|v| if *hi_excl { v - 1 } else { v });
            if let (Some(lo), Some(hi)) = (lo, hi) {
                if lo > hi {
                    return Err(ctx.err(ResolveErrorKind::InvalidConstraint(
                        alloc::format!("empty range {lo}..{hi}"),
                    )));
                }
            }
            Ok(Some(ConstraintElem::Range { lo, hi }))
        }
        AstConstraint::Size(spec) => {
            let inner = resolve_spec_mode(ctx, env, spec, ValueMode::Int)?;
            Ok(Some(ConstraintElem::Size(Box::new(inner))))
        }
        AstConstraint::From(spec) => {
            let inner = resolve_spec_mode(ctx, env, spec, ValueMode::Chars)?;
            Ok(Some(ConstraintElem::Alphabet(Box::new(inner))))
        }
        AstConstraint::Containing(ty) => {
            let id = resolve_type(ctx, env, ty)?;
            Ok(Some(ConstraintElem::Containing(id)))
        }
        AstConstraint::Includes(ty) => {
            // A contained subtype imports the referenced type's constraint.
            let id = resolve_type(ctx, env, ty)?;
            match &ctx.model.node(id).constraint {
                Some(c) if !c.root.is_empty() => {
                    Ok(Some(ConstraintElem::Union(c.root.clone())))
                }
                _ => Ok(None),
            }
        }
        AstConstraint::WithComponents {
            partial,
            components,
        } => {
            let ValueMode::Target(Some(target)) = mode else {
                return Err(ctx.err(ResolveErrorKind::InvalidConstraint(
                    "WITH COMPONENTS needs a constructed type".into(),
                )));
            };
            let underlying = ctx.model.untagged(target);
            let members = match &ctx.model.node(underlying).kind {
                TypeKind::Sequence(c) | TypeKind::Set(c) | TypeKind::Choice(c) => {
                    c.members.clone()
                }
                _ => {
                    return Err(ctx.err(ResolveErrorKind::InvalidConstraint(
                        "WITH COMPONENTS needs a constructed type".into(),
                    )))
                }
            };
            let mut entries = Vec::with_capacity(components.len());
            for cc in components {
                let member = members
                    .iter()
                    .find(|m| ctx.model.str(m.name) == cc.name.name)
                    .ok_or_else(|| {
                        ctx.err(ResolveErrorKind::InvalidConstraint(alloc::format!(
                            "`{}` is not a component",
                            cc.name.name
                        )))
                    })?;
                let member_ty = member.ty;
                let constraint = match &cc.constraint {
                    Some(spec) => Some(resolve_spec(ctx, env, spec, Some(member_ty))?),
                    None => None,
                };
                let name = ctx.model.intern(&cc.name.name);
                entries.push(ComponentEntry {
                    name,
                    presence: cc.presence,
                    constraint,
                });
            }
            Ok(Some(ConstraintElem::WithComponents(*partial, entries)))
        }
        AstConstraint::WithComponent(spec) => {
            let element = match mode {
                ValueMode::Target(Some(target)) => {
                    let underlying = ctx.model.untagged(target);
                    match ctx.model.node(underlying).kind {
                        TypeKind::SequenceOf { element } | TypeKind::SetOf { element } => {
                            Some(element)
                        }
                        _ => None,
                    }
                }
                _ => None,
            };
            let inner = resolve_spec(ctx, env, spec, element)?;
            Ok(Some(ConstraintElem::InnerType(Box::new(inner))))
        }
        AstConstraint::Pattern(_) => Ok(None),
    }
}

/// Resolve a single-value constraint element.
fn constraint_value(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    v: &AstValue,
    mode: ValueMode,
) -> Result<Value, ResolveError> {
    match mode {
        ValueMode::Target(Some(target)) => resolve_value(ctx, env, v, target),
        ValueMode::Target(None) | ValueMode::Int => match v {
            AstValue::Integer(n) => Ok(Value::Integer(n.clone())),
            AstValue::Reference(_) => Ok(Value::Integer(resolve_integer(ctx, env, v)?)),
            AstValue::Text(s) => Ok(Value::Text(s.clone())),
            AstValue::Real(r) => Ok(Value::Real(*r)),
            AstValue::Boolean(b) => Ok(Value::Boolean(*b)),
            _ => Err(ctx.err(ResolveErrorKind::InvalidConstraint(
                "unsupported value in constraint".into(),
            ))),
        },
        ValueMode::Chars => match v {
            AstValue::Text(s) => Ok(Value::Text(s.clone())),
            _ => Err(ctx.err(ResolveErrorKind::InvalidConstraint(
                "permitted alphabet expects character strings".into(),
            ))),
        },
    }
}

/// Resolve a range endpoint to an integer (or character code).
fn endpoint(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    e: &RangeEndpoint,
    mode: ValueMode,
) -> Result<Option<i128>, ResolveError> {
    match e {
        RangeEndpoint::Min | RangeEndpoint::Max => Ok(None),
        RangeEndpoint::Value(v) => match (mode, v) {
            (ValueMode::Chars, AstValue::Text(s)) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Some(i128::from(c as u32))),
                    _ => Err(ctx.err(ResolveErrorKind::InvalidConstraint(
                        "character range endpoints are single characters".into(),
                    ))),
                }
            }
            _ => {
                let n = resolve_integer(ctx, env, v)?;
                let n = n.to_i128().ok_or_else(|| {
                    ctx.err(ResolveErrorKind::InvalidConstraint(
                        "range endpoint out of range".into(),
                    ))
                })?;
                Ok(Some(n))
            }
        },
    }
}

/// Serial constraint application: the effective constraint is the
/// intersection of the referent's constraint and the new one; the newest
/// constraint's extension split governs the result.
#[must_use]
pub(crate) fn merge_constraints(old: Option<&Constraint>, new: Constraint) -> Constraint {
    let Some(old) = old else {
        return new;
    };
    if old.root.is_empty() {
        return new;
    }
    if new.root.is_empty() {
        return old.clone();
    }
    let group = |elems: &[ConstraintElem]| -> ConstraintElem {
        if elems.len() == 1 {
            elems[0].clone()
        } else {
            ConstraintElem::Union(elems.to_vec())
        }
    };
    Constraint {
        root: vec![ConstraintElem::Intersection(vec![
            group(&old.root),
            group(&new.root),
        ])],
        extensible: new.extensible,
        ext: new.ext,
    }
}
