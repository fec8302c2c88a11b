//! Structural invariant verification over the finished model.
//!
//! Runs after every definition resolved: outer tags of SEQUENCE/SET members
//! and CHOICE alternatives must be unique, with untagged CHOICE members
//! contributing their whole alternative tag set.

use super::error::{ResolveError, ResolveErrorKind};
use crate::model::{Composite, Model, Tag, TypeId, TypeKind};
use alloc::collections::BTreeSet;
use alloc::string::ToString;
use alloc::vec::Vec;

/// Verify tag uniqueness for every registered type.
pub(crate) fn check_model(model: &Model) -> Result<(), ResolveError> {
    let mut visited = BTreeSet::new();
    for (name, id) in model.types() {
        check_node(model, id, name, &mut visited)?;
    }
    Ok(())
}

fn check_node(
    model: &Model,
    id: TypeId,
    context: &str,
    visited: &mut BTreeSet<TypeId>,
) -> Result<(), ResolveError> {
    if !visited.insert(id) {
        return Ok(());
    }
    match &model.node(id).kind {
        TypeKind::Sequence(c) => {
            check_sequence(model, c, context)?;
            for member in &c.members {
                check_node(model, member.ty, context, visited)?;
            }
        }
        TypeKind::Set(c) | TypeKind::Choice(c) => {
            check_distinct(model, c, context)?;
            for member in &c.members {
                check_node(model, member.ty, context, visited)?;
            }
        }
        TypeKind::SequenceOf { element } | TypeKind::SetOf { element } => {
            check_node(model, *element, context, visited)?;
        }
        TypeKind::Tagged { inner, .. } => {
            check_node(model, *inner, context, visited)?;
        }
        _ => {}
    }
    Ok(())
}

/// SET members and CHOICE alternatives: every outer tag distinct.
fn check_distinct(
    model: &Model,
    composite: &Composite,
    context: &str,
) -> Result<(), ResolveError> {
    let mut seen: BTreeSet<Tag> = BTreeSet::new();
    for member in &composite.members {
        let mut front = Vec::new();
        let mut guard = BTreeSet::new();
        front_tags(model, member.ty, &mut front, &mut guard);
        for tag in front {
            if !seen.insert(tag) {
                return Err(error_at(model, context, tag));
            }
        }
    }
    Ok(())
}

/// SEQUENCE members: hand-written tags must be unique across the whole
/// type, and a tag may not repeat within a run of omittable members and the
/// member that closes the run (the decoder could not attribute it).
fn check_sequence(
    model: &Model,
    composite: &Composite,
    context: &str,
) -> Result<(), ResolveError> {
    let mut explicit: BTreeSet<Tag> = BTreeSet::new();
    let mut window: BTreeSet<Tag> = BTreeSet::new();
    for member in &composite.members {
        let mut front = Vec::new();
        let mut guard = BTreeSet::new();
        front_tags(model, member.ty, &mut front, &mut guard);
        for &tag in &front {
            if tag.class != crate::model::TagClass::Universal && !explicit.insert(tag) {
                return Err(error_at(model, context, tag));
            }
            if window.contains(&tag) {
                return Err(error_at(model, context, tag));
            }
        }
        if member.is_omittable() {
            window.extend(front);
        } else {
            window.clear();
        }
    }
    Ok(())
}

fn error_at(model: &Model, context: &str, tag: Tag) -> ResolveError {
    let (module, name) = match model.lookup(context) {
        Some(id) => {
            let node = model.node(id);
            (
                node.module.map(|m| model.str(m).to_string()),
                node.name.map(|n| model.str(n).to_string()),
            )
        }
        None => (None, None),
    };
    ResolveError::new(
        ResolveErrorKind::DuplicateTag(alloc::format!("{tag}")),
        module.as_deref().unwrap_or(""),
        name.as_deref().unwrap_or(context),
    )
}

/// The set of tags a decoder may see first for a value of this type.
///
/// Untagged CHOICE members contribute every alternative, recursively; ANY
/// contributes nothing checkable.
fn front_tags(model: &Model, id: TypeId, out: &mut Vec<Tag>, guard: &mut BTreeSet<TypeId>) {
    if !guard.insert(id) {
        return;
    }
    let node = model.node(id);
    match &node.kind {
        TypeKind::Tagged { tag, .. } => out.push(*tag),
        TypeKind::Choice(c) => {
            for member in &c.members {
                front_tags(model, member.ty, out, guard);
            }
        }
        TypeKind::Any => {}
        kind => {
            if let Some(tag) = kind.universal_tag() {
                out.push(tag);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Member, TagMode, TypeNode};

    fn composite_of(model: &mut Model, tys: &[TypeId]) -> Composite {
        let members = tys
            .iter()
            .enumerate()
            .map(|(i, &ty)| Member {
                name: model.intern(&alloc::format!("m{i}")),
                ty,
                optional: false,
                default: None,
                ext_group: 0,
            })
            .collect();
        Composite {
            members,
            extensible: false,
        }
    }

    #[test]
    fn test_duplicate_universal_tags_rejected() {
        let mut model = Model::new();
        let a = model.alloc(TypeNode::new(TypeKind::Boolean));
        let b = model.alloc(TypeNode::new(TypeKind::Boolean));
        let composite = composite_of(&mut model, &[a, b]);
        assert!(check_distinct(&model, &composite, "T").is_err());
    }

    #[test]
    fn test_distinct_context_tags_accepted() {
        let mut model = Model::new();
        let inner_a = model.alloc(TypeNode::new(TypeKind::Boolean));
        let inner_b = model.alloc(TypeNode::new(TypeKind::Boolean));
        let a = model.alloc(TypeNode::new(TypeKind::Tagged {
            tag: Tag::context(0),
            mode: TagMode::Implicit,
            inner: inner_a,
        }));
        let b = model.alloc(TypeNode::new(TypeKind::Tagged {
            tag: Tag::context(1),
            mode: TagMode::Implicit,
            inner: inner_b,
        }));
        let composite = composite_of(&mut model, &[a, b]);
        assert!(check_distinct(&model, &composite, "T").is_ok());
    }

    #[test]
    fn test_untagged_choice_contributes_alternatives() {
        let mut model = Model::new();
        let int = model.alloc(TypeNode::new(TypeKind::Integer {
            named: alloc::vec::Vec::new(),
        }));
        let boolean = model.alloc(TypeNode::new(TypeKind::Boolean));
        let choice_members = composite_of(&mut model, &[int, boolean]);
        let choice = model.alloc(TypeNode::new(TypeKind::Choice(choice_members)));
        let outer_int = model.alloc(TypeNode::new(TypeKind::Integer {
            named: alloc::vec::Vec::new(),
        }));
        // INTEGER collides with the choice's INTEGER alternative.
        let composite = composite_of(&mut model, &[choice, outer_int]);
        assert!(check_distinct(&model, &composite, "T").is_err());
    }
}
