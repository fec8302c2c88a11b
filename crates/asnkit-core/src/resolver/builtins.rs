//! Built-in associated types.
//!
//! `EXTERNAL` and `EMBEDDED PDV` encode as their X.680 associated
//! SEQUENCE types; the resolver synthesizes those structures once per
//! occurrence, tagged with the outer universal tag.

use super::context::ResolverContext;
use crate::model::{
    universal, Composite, Member, StringKind, Tag, TagMode, TypeId, TypeKind, TypeNode,
};
use alloc::vec;
use alloc::vec::Vec;

fn member(ctx: &mut ResolverContext<'_>, name: &str, ty: TypeId, optional: bool) -> Member {
    Member {
        name: ctx.model.intern(name),
        ty,
        optional,
        default: None,
        ext_group: 0,
    }
}

fn alloc(ctx: &mut ResolverContext<'_>, kind: TypeKind) -> TypeId {
    ctx.model.alloc(TypeNode::new(kind))
}

fn tagged(ctx: &mut ResolverContext<'_>, number: u32, mode: TagMode, inner: TypeId) -> TypeId {
    alloc(
        ctx,
        TypeKind::Tagged {
            tag: Tag::context(number),
            mode,
            inner,
        },
    )
}

fn sequence(ctx: &mut ResolverContext<'_>, members: Vec<Member>) -> TypeId {
    alloc(
        ctx,
        TypeKind::Sequence(Composite {
            members,
            extensible: false,
        }),
    )
}

/// The associated type of `EXTERNAL`, wrapped in `[UNIVERSAL 8]`.
pub(crate) fn external_type(ctx: &mut ResolverContext<'_>) -> TypeId {
    let oid = alloc(ctx, TypeKind::ObjectIdentifier);
    let int = alloc(ctx, TypeKind::Integer { named: Vec::new() });
    let descriptor = alloc(
        ctx,
        TypeKind::CharacterString(StringKind::ObjectDescriptor),
    );

    let any = alloc(ctx, TypeKind::Any);
    let single = tagged(ctx, 0, TagMode::Explicit, any);
    let octets = alloc(ctx, TypeKind::OctetString);
    let octet_aligned = tagged(ctx, 1, TagMode::Implicit, octets);
    let bits = alloc(ctx, TypeKind::BitString { named: Vec::new() });
    let arbitrary = tagged(ctx, 2, TagMode::Implicit, bits);

    let encoding_members = vec![
        member(ctx, "single-ASN1-type", single, false),
        member(ctx, "octet-aligned", octet_aligned, false),
        member(ctx, "arbitrary", arbitrary, false),
    ];
    let encoding = alloc(
        ctx,
        TypeKind::Choice(Composite {
            members: encoding_members,
            extensible: false,
        }),
    );

    let members = vec![
        member(ctx, "direct-reference", oid, true),
        member(ctx, "indirect-reference", int, true),
        member(ctx, "data-value-descriptor", descriptor, true),
        member(ctx, "encoding", encoding, false),
    ];
    let body = sequence(ctx, members);
    alloc(
        ctx,
        TypeKind::Tagged {
            tag: Tag::universal(universal::EXTERNAL),
            mode: TagMode::Implicit,
            inner: body,
        },
    )
}

/// The associated type of `EMBEDDED PDV`, wrapped in `[UNIVERSAL 11]`.
///
/// Tags follow the AUTOMATIC TAGS assignment of the X.680 definition.
pub(crate) fn embedded_pdv_type(ctx: &mut ResolverContext<'_>) -> TypeId {
    let abstract_oid = alloc(ctx, TypeKind::ObjectIdentifier);
    let abstract_tagged = tagged(ctx, 0, TagMode::Implicit, abstract_oid);
    let transfer_oid = alloc(ctx, TypeKind::ObjectIdentifier);
    let transfer_tagged = tagged(ctx, 1, TagMode::Implicit, transfer_oid);
    let syntaxes_members = vec![
        member(ctx, "abstract", abstract_tagged, false),
        member(ctx, "transfer", transfer_tagged, false),
    ];
    let syntaxes_seq = sequence(ctx, syntaxes_members);
    let syntaxes = tagged(ctx, 0, TagMode::Implicit, syntaxes_seq);

    let syntax_oid = alloc(ctx, TypeKind::ObjectIdentifier);
    let syntax = tagged(ctx, 1, TagMode::Implicit, syntax_oid);

    let pci = alloc(ctx, TypeKind::Integer { named: Vec::new() });
    let presentation_context_id = tagged(ctx, 2, TagMode::Implicit, pci);

    let neg_pci = alloc(ctx, TypeKind::Integer { named: Vec::new() });
    let neg_pci_tagged = tagged(ctx, 0, TagMode::Implicit, neg_pci);
    let neg_ts = alloc(ctx, TypeKind::ObjectIdentifier);
    let neg_ts_tagged = tagged(ctx, 1, TagMode::Implicit, neg_ts);
    let negotiation_members = vec![
        member(ctx, "presentation-context-id", neg_pci_tagged, false),
        member(ctx, "transfer-syntax", neg_ts_tagged, false),
    ];
    let negotiation_seq = sequence(ctx, negotiation_members);
    let context_negotiation = tagged(ctx, 3, TagMode::Implicit, negotiation_seq);

    let ts_oid = alloc(ctx, TypeKind::ObjectIdentifier);
    let transfer_syntax = tagged(ctx, 4, TagMode::Implicit, ts_oid);

    let null = alloc(ctx, TypeKind::Null);
    let fixed = tagged(ctx, 5, TagMode::Implicit, null);

    let identification_members = vec![
        member(ctx, "syntaxes", syntaxes, false),
        member(ctx, "syntax", syntax, false),
        member(ctx, "presentation-context-id", presentation_context_id, false),
        member(ctx, "context-negotiation", context_negotiation, false),
        member(ctx, "transfer-syntax", transfer_syntax, false),
        member(ctx, "fixed", fixed, false),
    ];
    let identification_choice = alloc(
        ctx,
        TypeKind::Choice(Composite {
            members: identification_members,
            extensible: false,
        }),
    );
    let identification = tagged(ctx, 0, TagMode::Explicit, identification_choice);

    let descriptor = alloc(
        ctx,
        TypeKind::CharacterString(StringKind::ObjectDescriptor),
    );
    let data_value_descriptor = tagged(ctx, 1, TagMode::Implicit, descriptor);

    let octets = alloc(ctx, TypeKind::OctetString);
    let data_value = tagged(ctx, 2, TagMode::Implicit, octets);

    let members = vec![
        member(ctx, "identification", identification, false),
        member(ctx, "data-value-descriptor", data_value_descriptor, true),
        member(ctx, "data-value", data_value, false),
    ];
    let body = sequence(ctx, members);
    alloc(
        ctx,
        TypeKind::Tagged {
            tag: Tag::universal(universal::EMBEDDED_PDV),
            mode: TagMode::Implicit,
            inner: body,
        },
    )
}
