//! Type resolution: AST type notation into arena nodes.
//!
//! Resolution is demand-driven. Each top-level assignment reserves a
//! placeholder arena slot before its body resolves, so recursive references
//! can hold the index early; the slot is patched when the body completes.
//! Parameterized definitions are templates: an instantiation resolves the
//! actuals in the caller's environment, binds them, and memoizes the result
//! under the actual-parameter signature.

use super::builtins;
use super::constraints::{merge_constraints, resolve_spec};
use super::context::{Binding, Env, Frame, ResolverContext};
use super::error::{ResolveError, ResolveErrorKind};
use super::values::{resolve_integer, resolve_value};
use crate::ast::{
    Actual, AstType, Component, Definition, Element, EnumItem, Module, NamedNumber, TagDefault,
    TypeAssignment,
};
use crate::model::{
    Composite, EncodingHints, Member, StrId, StringKind, Tag, TagClass, TagMode, TypeId, TypeKind,
    TypeNode,
};
use alloc::borrow::ToOwned;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use num_traits::ToPrimitive;

/// Resolve one top-level type assignment (or template instantiation) and
/// return its arena node.
pub(crate) fn resolve_assignment(
    ctx: &mut ResolverContext<'_>,
    owner: &Module,
    def: &TypeAssignment,
    bindings: BTreeMap<String, Binding>,
) -> Result<TypeId, ResolveError> {
    let sig = ResolverContext::signature(&bindings);
    let key = (owner.name.name.clone(), def.name.name.clone(), sig);

    if let Some(&id) = ctx.resolved.get(&key) {
        return Ok(id);
    }
    if let Some(frame) = ctx.in_progress.get(&key) {
        if ctx.escapes > frame.entry_escapes {
            return Ok(frame.placeholder);
        }
        return Err(ResolveError::new(
            ResolveErrorKind::RecursionWithoutEscape,
            &owner.name.name,
            &def.name.name,
        ));
    }
    if !def.params.is_empty() && bindings.is_empty() {
        return Err(ctx.err(ResolveErrorKind::ParameterArity(alloc::format!(
            "`{}` takes {} parameters",
            def.name.name,
            def.params.len()
        ))));
    }

    let placeholder = ctx.model.alloc(TypeNode::new(TypeKind::Null));
    ctx.in_progress.insert(
        key.clone(),
        Frame {
            placeholder,
            entry_escapes: ctx.escapes,
        },
    );
    let saved = core::mem::replace(
        &mut ctx.current,
        (owner.name.name.clone(), def.name.name.clone()),
    );

    let env = Env::with_bindings(owner, bindings);
    let result = resolve_type(ctx, &env, &def.ty);

    ctx.current = saved;
    ctx.in_progress.remove(&key);

    let body = result?;
    let mut node = ctx.model.node(body).clone();
    node.name = Some(ctx.model.intern(&def.name.name));
    node.module = Some(ctx.model.intern(&owner.name.name));
    ctx.model.replace(placeholder, node);
    ctx.resolved.insert(key, placeholder);
    Ok(placeholder)
}

/// Resolve a type expression to an arena node.
pub(crate) fn resolve_type(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    ty: &AstType,
) -> Result<TypeId, ResolveError> {
    match ty {
        AstType::Boolean => Ok(ctx.model.alloc(TypeNode::new(TypeKind::Boolean))),
        AstType::Real => Ok(ctx.model.alloc(TypeNode::new(TypeKind::Real))),
        AstType::Null => Ok(ctx.model.alloc(TypeNode::new(TypeKind::Null))),
        AstType::Any => Ok(ctx.model.alloc(TypeNode::new(TypeKind::Any))),
        AstType::External => Ok(builtins::external_type(ctx)),
        AstType::EmbeddedPdv => Ok(builtins::embedded_pdv_type(ctx)),
        AstType::ObjectDescriptor => Ok(ctx.model.alloc(TypeNode::new(
            TypeKind::CharacterString(StringKind::ObjectDescriptor),
        ))),
        AstType::ObjectIdentifier => {
            Ok(ctx.model.alloc(TypeNode::new(TypeKind::ObjectIdentifier)))
        }
        AstType::RelativeOid => Ok(ctx.model.alloc(TypeNode::new(TypeKind::RelativeOid))),
        AstType::OctetString => Ok(ctx.model.alloc(TypeNode::new(TypeKind::OctetString))),
        AstType::CharacterString(kind) => Ok(ctx
            .model
            .alloc(TypeNode::new(TypeKind::CharacterString(*kind)))),
        AstType::Time(kind) => Ok(ctx.model.alloc(TypeNode::new(TypeKind::Time(*kind)))),
        AstType::Integer { named } => {
            let named = resolve_named_numbers(ctx, env, named)?;
            Ok(ctx.model.alloc(TypeNode::new(TypeKind::Integer { named })))
        }
        AstType::BitString { named } => {
            let named = resolve_named_numbers(ctx, env, named)?;
            let named = named
                .into_iter()
                .map(|(name, v)| {
                    u32::try_from(v).map(|v| (name, v)).map_err(|_| {
                        ctx.err(ResolveErrorKind::TypeMismatch(
                            "named bit position out of range".into(),
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ctx
                .model
                .alloc(TypeNode::new(TypeKind::BitString { named })))
        }
        AstType::Enumerated {
            root,
            extensible,
            ext,
        } => resolve_enumerated(ctx, env, root, *extensible, ext),
        AstType::Sequence { elements } => {
            let composite = resolve_composite(ctx, env, elements)?;
            Ok(ctx
                .model
                .alloc(TypeNode::new(TypeKind::Sequence(composite))))
        }
        AstType::Set { elements } => {
            let composite = resolve_composite(ctx, env, elements)?;
            Ok(ctx.model.alloc(TypeNode::new(TypeKind::Set(composite))))
        }
        AstType::Choice { elements } => {
            let composite = resolve_composite(ctx, env, elements)?;
            Ok(ctx.model.alloc(TypeNode::new(TypeKind::Choice(composite))))
        }
        AstType::SequenceOf(element) => {
            let element = ctx.with_escape(|ctx| resolve_type(ctx, env, element))?;
            Ok(ctx
                .model
                .alloc(TypeNode::new(TypeKind::SequenceOf { element })))
        }
        AstType::SetOf(element) => {
            let element = ctx.with_escape(|ctx| resolve_type(ctx, env, element))?;
            Ok(ctx.model.alloc(TypeNode::new(TypeKind::SetOf { element })))
        }
        AstType::Tagged {
            class,
            number,
            mode,
            inner,
        } => {
            let number = resolve_integer(ctx, env, number)?;
            let number = number.to_u32().ok_or_else(|| {
                ctx.err(ResolveErrorKind::TypeMismatch("invalid tag number".into()))
            })?;
            let inner = resolve_type(ctx, env, inner)?;
            let mut mode = mode.unwrap_or(match env.tag_default {
                TagDefault::Explicit => TagMode::Explicit,
                TagDefault::Implicit | TagDefault::Automatic => TagMode::Implicit,
            });
            // An IMPLICIT tag cannot sit on an untagged CHOICE or an open
            // type; X.680 forces EXPLICIT there.
            if mode == TagMode::Implicit && is_untagged_choice_or_any(ctx, inner) {
                mode = TagMode::Explicit;
            }
            let tag = Tag::new(class.unwrap_or(TagClass::Context), number);
            Ok(ctx
                .model
                .alloc(TypeNode::new(TypeKind::Tagged { tag, mode, inner })))
        }
        AstType::Constrained { inner, constraint } => {
            let inner_id = resolve_type(ctx, env, inner)?;
            if is_placeholder(ctx, inner_id) {
                // A constraint on an in-progress recursive reference cannot
                // be merged yet; the reference keeps its own constraints.
                return Ok(inner_id);
            }
            let resolved = resolve_spec(ctx, env, constraint, Some(inner_id))?;
            let mut node = ctx.model.node(inner_id).clone();
            let merged = merge_constraints(node.constraint.as_ref(), resolved);
            node.constraint = Some(merged);
            node.hints = EncodingHints::derive(node.constraint.as_ref());
            Ok(ctx.model.alloc(node))
        }
        AstType::Reference {
            module,
            name,
            actuals,
        } => resolve_reference(ctx, env, module.as_ref().map(|m| m.name.as_str()), name.name.as_str(), actuals),
    }
}

fn is_placeholder(ctx: &ResolverContext<'_>, id: TypeId) -> bool {
    ctx.in_progress.values().any(|f| f.placeholder == id)
}

fn is_untagged_choice_or_any(ctx: &ResolverContext<'_>, id: TypeId) -> bool {
    matches!(
        ctx.model.node(id).kind,
        TypeKind::Choice(_) | TypeKind::Any
    )
}

/// Resolve `{ name(value), ... }` named number lists.
fn resolve_named_numbers(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    named: &[NamedNumber],
) -> Result<Vec<(StrId, i64)>, ResolveError> {
    let mut out = Vec::with_capacity(named.len());
    for item in named {
        let value = resolve_integer(ctx, env, &item.value)?;
        let value = value.to_i64().ok_or_else(|| {
            ctx.err(ResolveErrorKind::TypeMismatch(alloc::format!(
                "named number `{}` out of range",
                item.name.name
            )))
        })?;
        let name = ctx.model.intern(&item.name.name);
        out.push((name, value));
    }
    Ok(out)
}

/// Resolve an ENUMERATED: assign numbers to unnumbered items.
fn resolve_enumerated(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    root: &[EnumItem],
    extensible: bool,
    ext: &[EnumItem],
) -> Result<TypeId, ResolveError> {
    let mut used = BTreeSet::new();
    let mut assign = |ctx: &mut ResolverContext<'_>,
                      items: &[EnumItem],
                      in_ext: bool|
     -> Result<Vec<(StrId, i64)>, ResolveError> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let value = match &item.value {
                Some(v) => {
                    let v = resolve_integer(ctx, env, v)?;
                    v.to_i64().ok_or_else(|| {
                        ctx.err(ResolveErrorKind::TypeMismatch(
                            "enumeration number out of range".into(),
                        ))
                    })?
                }
                None if in_ext => used.iter().next_back().map_or(0, |&v: &i64| v + 1),
                None => {
                    // Smallest unused non-negative number.
                    let mut candidate = 0i64;
                    while used.contains(&candidate) {
                        candidate += 1;
                    }
                    candidate
                }
            };
            if !used.insert(value) {
                return Err(ctx.err(ResolveErrorKind::TypeMismatch(alloc::format!(
                    "duplicate enumeration number {value}"
                ))));
            }
            let name = ctx.model.intern(&item.name.name);
            out.push((name, value));
        }
        Ok(out)
    };

    let root = assign(ctx, root, false)?;
    let ext = assign(ctx, ext, true)?;
    let extensible = extensible || env.extensibility_implied;
    Ok(ctx.model.alloc(TypeNode::new(TypeKind::Enumerated {
        root,
        ext,
        extensible,
    })))
}

/// Whether a component list carries any hand-written tag, which disables
/// automatic tagging for the whole type.
fn has_explicit_tags(elements: &[Element]) -> bool {
    fn component_tagged(c: &Component) -> bool {
        matches!(c.ty, AstType::Tagged { .. })
    }
    elements.iter().any(|e| match e {
        Element::Component(c) => component_tagged(c),
        Element::ExtensionGroup(group) => group.iter().any(component_tagged),
        _ => false,
    })
}

/// Resolve the component list of a SEQUENCE, SET or CHOICE.
fn resolve_composite(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    elements: &[Element],
) -> Result<Composite, ResolveError> {
    let automatic = env.tag_default == TagDefault::Automatic && !has_explicit_tags(elements);

    let mut members: Vec<Member> = Vec::new();
    let mut seen = BTreeSet::new();
    let mut marker_count = 0u32;
    let mut next_group = 0u32;
    let mut ordinal = 0u32;

    for element in elements {
        match element {
            Element::ExtensionMarker => marker_count += 1,
            Element::ComponentsOf(ty) => {
                let id = resolve_type(ctx, env, ty)?;
                let underlying = ctx.model.untagged(id);
                let spliced: Vec<Member> = match &ctx.model.node(underlying).kind {
                    TypeKind::Sequence(c) | TypeKind::Set(c) => {
                        c.root_members().cloned().collect()
                    }
                    _ => {
                        return Err(ctx.err(ResolveErrorKind::TypeMismatch(
                            "COMPONENTS OF requires a SEQUENCE or SET".into(),
                        )))
                    }
                };
                for member in spliced {
                    let name = ctx.model.str(member.name).to_owned();
                    if !seen.insert(name.clone()) {
                        return Err(ctx.err(ResolveErrorKind::DuplicateMember(name)));
                    }
                    members.push(member);
                }
            }
            Element::Component(c) => {
                let group = if marker_count == 1 {
                    next_group += 1;
                    next_group
                } else {
                    0
                };
                let member =
                    resolve_member(ctx, env, c, automatic.then_some(ordinal), group)?;
                ordinal += 1;
                let name = ctx.model.str(member.name).to_owned();
                if !seen.insert(name.clone()) {
                    return Err(ctx.err(ResolveErrorKind::DuplicateMember(name)));
                }
                members.push(member);
            }
            Element::ExtensionGroup(group_components) => {
                if marker_count != 1 {
                    return Err(ctx.err(ResolveErrorKind::TypeMismatch(
                        "extension group outside the extension area".into(),
                    )));
                }
                next_group += 1;
                for c in group_components {
                    let member = resolve_member(
                        ctx,
                        env,
                        c,
                        automatic.then_some(ordinal),
                        next_group,
                    )?;
                    ordinal += 1;
                    let name = ctx.model.str(member.name).to_owned();
                    if !seen.insert(name.clone()) {
                        return Err(ctx.err(ResolveErrorKind::DuplicateMember(name)));
                    }
                    members.push(member);
                }
            }
        }
    }

    Ok(Composite {
        members,
        extensible: marker_count > 0 || env.extensibility_implied,
    })
}

/// Resolve one component into a member, applying automatic tagging when
/// `auto_ordinal` is given.
fn resolve_member(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    c: &Component,
    auto_ordinal: Option<u32>,
    ext_group: u32,
) -> Result<Member, ResolveError> {
    let omittable = c.optional || c.default.is_some();
    let ty = if omittable {
        ctx.with_escape(|ctx| resolve_type(ctx, env, &c.ty))?
    } else {
        resolve_type(ctx, env, &c.ty)?
    };

    let ty = match auto_ordinal {
        Some(ordinal) => {
            let mode = if is_untagged_choice_or_any(ctx, ty) {
                TagMode::Explicit
            } else {
                TagMode::Implicit
            };
            ctx.model.alloc(TypeNode::new(TypeKind::Tagged {
                tag: Tag::context(ordinal),
                mode,
                inner: ty,
            }))
        }
        None => ty,
    };

    let default = match &c.default {
        Some(v) => Some(resolve_value(ctx, env, v, ty)?),
        None => None,
    };

    Ok(Member {
        name: ctx.model.intern(&c.name.name),
        ty,
        optional: c.optional,
        default,
        ext_group,
    })
}

/// Resolve a type reference, instantiating templates as needed.
fn resolve_reference(
    ctx: &mut ResolverContext<'_>,
    env: &Env,
    module: Option<&str>,
    name: &str,
    actuals: &[Actual],
) -> Result<TypeId, ResolveError> {
    // Formal parameter in scope?
    if module.is_none() {
        if let Some(binding) = env.bindings.get(name) {
            return match binding {
                Binding::Type(id) => {
                    if actuals.is_empty() {
                        Ok(*id)
                    } else {
                        Err(ctx.err(ResolveErrorKind::ParameterArity(alloc::format!(
                            "parameter `{name}` is not parameterized"
                        ))))
                    }
                }
                Binding::Value(_) => Err(ctx.err(ResolveErrorKind::TypeMismatch(
                    alloc::format!("`{name}` is a value parameter, not a type"),
                ))),
            };
        }
    }

    let found = match module {
        Some(m) => ctx
            .table
            .get(m)
            .and_then(|owner| {
                owner
                    .body
                    .iter()
                    .find(|d| d.name().name == name)
                    .map(|d| (owner, d))
            }),
        None => ctx.table.lookup(&env.module, name),
    };

    let Some((owner, def)) = found else {
        // Distinguish a dangling import from a plain unknown name.
        if let Some(importing) = ctx.table.get(&env.module) {
            for clause in &importing.imports {
                if clause.symbols.iter().any(|s| s.name == name) {
                    return Err(ctx.err(ResolveErrorKind::UnresolvedImport {
                        symbol: name.to_string(),
                        from_module: clause.from_module.name.clone(),
                    }));
                }
            }
        }
        return Err(ctx.err(ResolveErrorKind::UnknownReference(name.to_string())));
    };

    let Definition::Type(def) = def else {
        return Err(ctx.err(ResolveErrorKind::TypeMismatch(alloc::format!(
            "`{name}` is a value, not a type"
        ))));
    };

    if def.params.is_empty() {
        if !actuals.is_empty() {
            return Err(ctx.err(ResolveErrorKind::ParameterArity(alloc::format!(
                "`{name}` is not parameterized"
            ))));
        }
        return resolve_assignment(ctx, owner, def, BTreeMap::new());
    }

    if def.params.len() != actuals.len() {
        return Err(ctx.err(ResolveErrorKind::ParameterArity(alloc::format!(
            "`{name}` takes {} parameters, {} given",
            def.params.len(),
            actuals.len()
        ))));
    }

    ctx.enter_instantiation()?;
    let mut bindings = BTreeMap::new();
    for (param, actual) in def.params.iter().zip(actuals) {
        let binding = match (param.is_type_param(), actual) {
            (true, Actual::Type(t)) => Binding::Type(resolve_type(ctx, env, t)?),
            (false, Actual::Value(v)) => {
                let governor = param
                    .governor
                    .as_deref()
                    .expect("value parameter has a governor");
                let owner_env = Env::of_module(owner);
                let governor = resolve_type(ctx, &owner_env, governor)?;
                Binding::Value(resolve_value(ctx, env, v, governor)?)
            }
            (true, Actual::Value(_)) => {
                ctx.leave_instantiation();
                return Err(ctx.err(ResolveErrorKind::ParameterArity(alloc::format!(
                    "parameter `{}` expects a type",
                    param.name.name
                ))));
            }
            (false, Actual::Type(_)) => {
                ctx.leave_instantiation();
                return Err(ctx.err(ResolveErrorKind::ParameterArity(alloc::format!(
                    "parameter `{}` expects a value",
                    param.name.name
                ))));
            }
        };
        bindings.insert(param.name.name.clone(), binding);
    }

    let result = resolve_assignment(ctx, owner, def, bindings);
    ctx.leave_instantiation();
    result
}
