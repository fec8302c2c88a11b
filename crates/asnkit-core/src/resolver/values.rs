//! Value resolution: AST value notation folded against a governing type.
//!
//! Used for DEFAULT values, value assignments referenced from constraints
//! and defaults, tag numbers, and OBJECT IDENTIFIER component chains.

use super::context::{Binding, Env, ResolverContext};
use super::error::{ResolveError, ResolveErrorKind};
use crate::ast::{AstValue, BracedItem, Definition, Module, SpecialReal, ValueAssignment};
use crate::model::{StrId, TypeId, TypeKind};
use crate::value::{BitString, Value};
use alloc::borrow::ToOwned;
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Resolve a value expression to an integer, without a governing type.
///
/// Accepts literals, value parameters and (chains of) integer value
/// references. Used for tag numbers, named numbers and constraint
/// endpoints.
pub(crate) fn resolve_integer(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    v: &AstValue,
) -> Result<BigInt, ResolveError> {
    match v {
        AstValue::Integer(n) => Ok(n.clone()),
        AstValue::Reference(ident) => {
            if let Some(binding) = env.bindings.get(&ident.name) {
                return match binding {
                    Binding::Value(Value::Integer(n)) => Ok(n.clone()),
                    _ => Err(ctx.err(ResolveErrorKind::TypeMismatch(alloc::format!(
                        "`{}` is not an integer value",
                        ident.name
                    )))),
                };
            }
            let (owner, assignment) = lookup_value(ctx, env, &ident.name)?;
            let owner_env = Env::of_module(owner);
            let value = assignment.value.clone();
            ctx.enter_instantiation()?;
            let result = resolve_integer(ctx, &owner_env, &value);
            ctx.leave_instantiation();
            result
        }
        _ => Err(ctx.err(ResolveErrorKind::TypeMismatch(
            "expected an integer value".into(),
        ))),
    }
}

/// Find a value assignment visible from the environment's module.
fn lookup_value<'t>(
    ctx: &ResolverContext<'t>,
    env: &Env,
    name: &str,
) -> Result<(&'t Module, &'t ValueAssignment), ResolveError> {
    let found = match name.split_once('.') {
        Some((module, plain)) => ctx.table.get(module).and_then(|owner| {
            owner
                .body
                .iter()
                .find(|d| d.name().name == plain)
                .map(|d| (owner, d))
        }),
        None => ctx.table.lookup(&env.module, name),
    };
    match found {
        Some((owner, Definition::Value(assignment))) => Ok((owner, assignment)),
        Some((_, Definition::Type(_))) => Err(ctx.err(ResolveErrorKind::TypeMismatch(
            alloc::format!("`{name}` is a type, not a value"),
        ))),
        None => Err(ctx.err(ResolveErrorKind::UnknownReference(name.to_string()))),
    }
}

/// Resolve a value expression against a governing type.
pub(crate) fn resolve_value(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    v: &AstValue,
    target: TypeId,
) -> Result<Value, ResolveError> {
    let underlying = ctx.model.untagged(target);
    let kind = ctx.model.node(underlying).kind.clone();

    if let AstValue::Reference(ident) = v {
        // Parameter bindings shadow everything.
        if let Some(Binding::Value(value)) = env.bindings.get(&ident.name) {
            return Ok(value.clone());
        }
        // Named numbers and enumeration identifiers bind tighter than value
        // references.
        match &kind {
            TypeKind::Integer { named } => {
                if let Some(value) = find_named(ctx, named, &ident.name) {
                    return Ok(Value::Integer(BigInt::from(value)));
                }
            }
            TypeKind::Enumerated { root, ext, .. } => {
                let known = root
                    .iter()
                    .chain(ext.iter())
                    .any(|(name, _)| ctx.model.str(*name) == ident.name);
                if known {
                    return Ok(Value::Text(ident.name.clone()));
                }
                return Err(ctx.err(ResolveErrorKind::TypeMismatch(alloc::format!(
                    "`{}` is not an enumeration item",
                    ident.name
                ))));
            }
            _ => {}
        }
        let (owner, assignment) = lookup_value(ctx, env, &ident.name)?;
        let owner_env = Env::of_module(owner);
        let value = assignment.value.clone();
        ctx.enter_instantiation()?;
        let result = resolve_value(ctx, &owner_env, &value, target);
        ctx.leave_instantiation();
        return result;
    }

    match (&kind, v) {
        (TypeKind::Boolean, AstValue::Boolean(b)) => Ok(Value::Boolean(*b)),
        (TypeKind::Integer { .. }, AstValue::Integer(n)) => Ok(Value::Integer(n.clone())),
        (TypeKind::Real, AstValue::Real(r)) => Ok(Value::Real(*r)),
        (TypeKind::Real, AstValue::Integer(n)) => {
            Ok(Value::Real(n.to_f64().unwrap_or(0.0)))
        }
        (TypeKind::Real, AstValue::SpecialReal(s)) => Ok(Value::Real(match s {
            SpecialReal::PlusInfinity => f64::INFINITY,
            SpecialReal::MinusInfinity => f64::NEG_INFINITY,
            SpecialReal::NotANumber => f64::NAN,
        })),
        (TypeKind::Null, AstValue::Null) => Ok(Value::Null),
        (TypeKind::Enumerated { root, ext, .. }, AstValue::Integer(n)) => {
            let number = n.to_i64();
            let item = root
                .iter()
                .chain(ext.iter())
                .find(|(_, v)| Some(*v) == number);
            match item {
                Some((name, _)) => Ok(Value::Text(ctx.model.str(*name).to_owned())),
                None => Err(ctx.err(ResolveErrorKind::TypeMismatch(alloc::format!(
                    "{n} is not an enumeration number"
                )))),
            }
        }
        (TypeKind::BitString { .. }, AstValue::BString(bits)) => {
            Ok(Value::BitString(BitString::from_bits(bits)))
        }
        (TypeKind::BitString { .. }, AstValue::HString(hex)) => {
            let data = hex_to_bytes(ctx, hex)?;
            let bit_len = hex.len() * 4;
            Ok(Value::BitString(BitString::new(data, bit_len)))
        }
        (TypeKind::BitString { named }, AstValue::Braced(items)) => {
            let mut max_bit = None;
            let mut bits = Vec::new();
            for item in items {
                let BracedItem::Name(ident) = item else {
                    return Err(ctx.err(ResolveErrorKind::TypeMismatch(
                        "expected named bits".into(),
                    )));
                };
                let bit = find_named_bit(ctx, named, &ident.name).ok_or_else(|| {
                    ctx.err(ResolveErrorKind::TypeMismatch(alloc::format!(
                        "`{}` is not a named bit",
                        ident.name
                    )))
                })?;
                bits.push(bit);
                max_bit = Some(max_bit.map_or(bit, |m: u32| m.max(bit)));
            }
            let bit_len = max_bit.map_or(0, |m| m as usize + 1);
            let mut out = BitString::new(alloc::vec![0; bit_len.div_ceil(8)], bit_len);
            for bit in bits {
                let idx = bit as usize;
                out.data[idx / 8] |= 1 << (7 - (idx % 8));
            }
            Ok(Value::BitString(out))
        }
        (TypeKind::OctetString | TypeKind::Any, AstValue::HString(hex)) => {
            Ok(Value::Bytes(hex_to_bytes(ctx, hex)?))
        }
        (TypeKind::OctetString | TypeKind::Any, AstValue::BString(bits)) => {
            Ok(Value::Bytes(BitString::from_bits(bits).data))
        }
        (TypeKind::CharacterString(_) | TypeKind::Time(_), AstValue::Text(s)) => {
            Ok(Value::Text(s.clone()))
        }
        (TypeKind::ObjectIdentifier, AstValue::Braced(items)) => {
            let components = resolve_oid_components(ctx, env, items, true)?;
            Ok(Value::ObjectIdentifier(components))
        }
        (TypeKind::RelativeOid, AstValue::Braced(items)) => {
            let components = resolve_oid_components(ctx, env, items, false)?;
            Ok(Value::ObjectIdentifier(components))
        }
        (TypeKind::Sequence(c) | TypeKind::Set(c), AstValue::Braced(items)) => {
            let mut out: Vec<(String, Value)> = Vec::new();
            for item in items {
                let BracedItem::Named(name, value) = item else {
                    return Err(ctx.err(ResolveErrorKind::TypeMismatch(
                        "expected named component values".into(),
                    )));
                };
                let member = c
                    .members
                    .iter()
                    .find(|m| ctx.model.str(m.name) == name.name)
                    .cloned()
                    .ok_or_else(|| {
                        ctx.err(ResolveErrorKind::TypeMismatch(alloc::format!(
                            "`{}` is not a component",
                            name.name
                        )))
                    })?;
                let value = resolve_value(ctx, env, value, member.ty)?;
                out.push((name.name.clone(), value));
            }
            for member in &c.members {
                let name = ctx.model.str(member.name);
                if !member.is_omittable() && !out.iter().any(|(n, _)| n == name) {
                    return Err(ctx.err(ResolveErrorKind::TypeMismatch(alloc::format!(
                        "missing component `{name}`"
                    ))));
                }
            }
            Ok(Value::Sequence(out))
        }
        (
            TypeKind::SequenceOf { element } | TypeKind::SetOf { element },
            AstValue::Braced(items),
        ) => {
            let element = *element;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let value = match item {
                    BracedItem::Value(v) => resolve_value(ctx, env, v, element)?,
                    BracedItem::Number(n) => {
                        resolve_value(ctx, env, &AstValue::Integer(n.clone()), element)?
                    }
                    BracedItem::Name(ident) => resolve_value(
                        ctx,
                        env,
                        &AstValue::Reference(ident.clone()),
                        element,
                    )?,
                    _ => {
                        return Err(ctx.err(ResolveErrorKind::TypeMismatch(
                            "expected list elements".into(),
                        )))
                    }
                };
                out.push(value);
            }
            Ok(Value::List(out))
        }
        (TypeKind::Choice(c), AstValue::Choice { selector, value }) => {
            let member = c
                .members
                .iter()
                .find(|m| ctx.model.str(m.name) == selector.name)
                .cloned()
                .ok_or_else(|| {
                    ctx.err(ResolveErrorKind::TypeMismatch(alloc::format!(
                        "`{}` is not an alternative",
                        selector.name
                    )))
                })?;
            let value = resolve_value(ctx, env, value, member.ty)?;
            Ok(Value::Choice(selector.name.clone(), Box::new(value)))
        }
        (kind, v) => Err(ctx.err(ResolveErrorKind::TypeMismatch(alloc::format!(
            "cannot use this value notation for {}: {v:?}",
            kind.name()
        )))),
    }
}

fn find_named(ctx: &ResolverContext<'_>, named: &[(StrId, i64)], name: &str) -> Option<i64> {
    named
        .iter()
        .find(|(n, _)| ctx.model.str(*n) == name)
        .map(|(_, v)| *v)
}

fn find_named_bit(ctx: &ResolverContext<'_>, named: &[(StrId, u32)], name: &str) -> Option<u32> {
    named
        .iter()
        .find(|(n, _)| ctx.model.str(*n) == name)
        .map(|(_, v)| *v)
}

/// Decode a hex string literal's digits.
fn hex_to_bytes(ctx: &ResolverContext<'_>, hex: &str) -> Result<Vec<u8>, ResolveError> {
    let mut out = Vec::with_capacity(hex.len().div_ceil(2));
    let mut pending: Option<u8> = None;
    for c in hex.chars() {
        let digit = c.to_digit(16).ok_or_else(|| {
            ctx.err(ResolveErrorKind::TypeMismatch(alloc::format!(
                "invalid hex digit `{c}`"
            )))
        })? as u8;
        match pending.take() {
            Some(high) => out.push((high << 4) | digit),
            None => pending = Some(digit),
        }
    }
    // An odd digit count pads the final nibble, per the hstring-as-octets
    // rule.
    if let Some(high) = pending {
        out.push(high << 4);
    }
    Ok(out)
}

/// Well-known first-arc names usable without an import.
fn builtin_oid_root(name: &str) -> Option<u64> {
    match name {
        "itu-t" | "ccitt" => Some(0),
        "iso" => Some(1),
        "joint-iso-itu-t" | "joint-iso-ccitt" => Some(2),
        _ => None,
    }
}

/// Resolve OID component notation, splicing referenced OID values.
fn resolve_oid_components(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    items: &[BracedItem],
    allow_names: bool,
) -> Result<Vec<u64>, ResolveError> {
    let mut out = Vec::new();
    for item in items {
        match item {
            BracedItem::Number(n) => out.push(component_number(ctx, n)?),
            BracedItem::NameAndNumber(_, n) => out.push(component_number(ctx, n)?),
            BracedItem::Name(ident) if allow_names => {
                splice_oid_name(ctx, env, &ident.name, out.is_empty(), &mut out)?;
            }
            BracedItem::Named(ident, AstValue::Integer(n)) if allow_names => {
                splice_oid_name(ctx, env, &ident.name, out.is_empty(), &mut out)?;
                out.push(component_number(ctx, n)?);
            }
            _ => {
                return Err(ctx.err(ResolveErrorKind::TypeMismatch(
                    "invalid OBJECT IDENTIFIER component".into(),
                )))
            }
        }
    }
    Ok(out)
}

fn component_number(ctx: &ResolverContext<'_>, n: &BigInt) -> Result<u64, ResolveError> {
    n.to_u64().ok_or_else(|| {
        ctx.err(ResolveErrorKind::TypeMismatch(
            "OBJECT IDENTIFIER component out of range".into(),
        ))
    })
}

/// Resolve one OID component name: a referenced OID value splices its
/// components; otherwise the well-known first arcs apply.
fn splice_oid_name(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    name: &str,
    first: bool,
    out: &mut Vec<u64>,
) -> Result<(), ResolveError> {
    if let Ok((owner, assignment)) = lookup_value(ctx, env, name) {
        let owner_env = Env::of_module(owner);
        if let AstValue::Braced(items) = assignment.value.clone() {
            ctx.enter_instantiation()?;
            let components = resolve_oid_components(ctx, &owner_env, &items, true);
            ctx.leave_instantiation();
            out.extend(components?);
            return Ok(());
        }
    }
    if first {
        if let Some(root) = builtin_oid_root(name) {
            out.push(root);
            return Ok(());
        }
    }
    Err(ctx.err(ResolveErrorKind::UnknownReference(name.to_string())))
}
