//! Resolution of parsed modules into the finalized type model.
//!
//! The resolver transforms the module table into a [`Model`]:
//!
//! ```text
//! ModuleTable → Resolver → Model
//! ```
//!
//! It performs, in order:
//!
//! 1. **Import binding** — every imported symbol must exist in its source
//!    module.
//! 2. **Tag assignment** — `AUTOMATIC TAGS` ordinals, module tag defaults,
//!    and the forced-EXPLICIT rule for untagged CHOICE/open types.
//! 3. **Parameter instantiation** — hygienic substitution through resolved
//!    bindings, memoized per actual-parameter signature.
//! 4. **Reference resolution** — demand-driven with placeholder arena slots
//!    for recursion.
//! 5. **Constraint attachment and merging** — X.680 §47 semantics, root and
//!    extension parts split.
//! 6. **Default value folding** — `DEFAULT v` type-checked against the
//!    member type.
//! 7. **Invariant verification** — tag uniqueness and structural checks.
//!
//! `resolve` stops at the first error; `lint` keeps going and collects one
//! error per failing definition.

mod builtins;
mod checks;
mod constraints;
mod context;
mod error;
mod types;
mod values;

pub use context::{Binding, Env};
pub use error::{ResolveError, ResolveErrorKind};

use crate::ast::Definition;
use crate::model::Model;
use crate::table::ModuleTable;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use context::ResolverContext;
use types::{resolve_assignment, resolve_type};
use values::resolve_value;

/// ASN.1 resolver.
///
/// Stateless; invoke it repeatedly to produce fresh models.
#[derive(Clone, Copy, Debug, Default)]
pub struct Resolver;

impl Resolver {
    /// Create a new resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolve a module table into a model, stopping at the first error.
    pub fn resolve(&self, table: &ModuleTable) -> Result<Model, ResolveError> {
        let mut ctx = ResolverContext::new(table);
        let mut errors = Vec::new();
        collect_errors(&mut ctx, table, &mut errors, true);
        if let Some(err) = errors.into_iter().next() {
            return Err(err);
        }
        checks::check_model(&ctx.model)?;
        Ok(ctx.model)
    }

    /// Resolve in lint mode: keep going past failing definitions and return
    /// every error collected.
    #[must_use]
    pub fn lint(&self, table: &ModuleTable) -> Vec<ResolveError> {
        let mut ctx = ResolverContext::new(table);
        let mut errors = Vec::new();
        collect_errors(&mut ctx, table, &mut errors, false);
        if errors.is_empty() {
            if let Err(err) = checks::check_model(&ctx.model) {
                errors.push(err);
            }
        }
        errors
    }
}

/// Driver shared by `resolve` and `lint`: walk every module and collect
/// errors; with `fail_fast` the walk stops at the first one.
fn collect_errors(
    ctx: &mut ResolverContext<'_>,
    table: &ModuleTable,
    out: &mut Vec<ResolveError>,
    fail_fast: bool,
) {
    for (name, _) in table.duplicates() {
        out.push(ResolveError::new(
            ResolveErrorKind::DuplicateModule(name.clone()),
            name,
            "",
        ));
        if fail_fast {
            return;
        }
    }

    // Phase 1: import binding.
    for module in table.iter() {
        for clause in &module.imports {
            for symbol in &clause.symbols {
                if table
                    .lookup(&clause.from_module.name, &symbol.name)
                    .is_none()
                {
                    out.push(ResolveError::new(
                        ResolveErrorKind::UnresolvedImport {
                            symbol: symbol.name.clone(),
                            from_module: clause.from_module.name.clone(),
                        },
                        &module.name.name,
                        &symbol.name,
                    ));
                    if fail_fast {
                        return;
                    }
                }
            }
        }
    }

    // Phases 2-6: demand-driven definition resolution.
    for module in table.iter() {
        let module_str = ctx.model.intern(&module.name.name);
        ctx.model.add_module(module_str);
        for def in &module.body {
            match def {
                Definition::Type(assignment) if assignment.params.is_empty() => {
                    match resolve_assignment(ctx, module, assignment, BTreeMap::new()) {
                        Ok(id) => {
                            let name = ctx.model.intern(&assignment.name.name);
                            ctx.model.register(module_str, name, id);
                        }
                        Err(err) => {
                            out.push(err);
                            if fail_fast {
                                return;
                            }
                        }
                    }
                }
                // Templates are instantiated at reference sites and never
                // appear in the model themselves.
                Definition::Type(_) => {}
                Definition::Value(assignment) => {
                    // Folding every value assignment surfaces bad governing
                    // types and bad values even when nothing references them.
                    let env = Env::of_module(module);
                    let result = resolve_type(ctx, &env, &assignment.ty).and_then(|target| {
                        resolve_value(ctx, &env, &assignment.value, target)
                    });
                    if let Err(err) = result {
                        out.push(err);
                        if fail_fast {
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Containment, TagClass, TagMode, TypeKind};
    use crate::parser::Parser;
    use num_bigint::BigInt;

    fn resolve_source(source: &str) -> Model {
        try_resolve(source).expect("resolution succeeds")
    }

    fn try_resolve(source: &str) -> Result<Model, ResolveError> {
        let result = Parser::new(source.as_bytes()).parse();
        assert!(
            result.first_error().is_none(),
            "parse errors: {:?}",
            result.diagnostics
        );
        let table = ModuleTable::build(result.modules);
        Resolver::new().resolve(&table)
    }

    #[test]
    fn test_simple_types_registered() {
        let model = resolve_source(
            "M DEFINITIONS ::= BEGIN \
             A ::= BOOLEAN \
             B ::= OCTET STRING \
             END",
        );
        assert!(model.lookup("A").is_some());
        assert!(model.lookup("M.B").is_some());
        let a = model.lookup("A").unwrap();
        assert!(matches!(model.node(a).kind, TypeKind::Boolean));
    }

    #[test]
    fn test_reference_chain() {
        let model = resolve_source(
            "M DEFINITIONS ::= BEGIN \
             A ::= B \
             B ::= INTEGER \
             END",
        );
        let a = model.lookup("A").unwrap();
        assert!(matches!(model.node(a).kind, TypeKind::Integer { .. }));
    }

    #[test]
    fn test_unknown_reference() {
        let err = try_resolve("M DEFINITIONS ::= BEGIN A ::= Missing END").unwrap_err();
        assert!(matches!(err.kind, ResolveErrorKind::UnknownReference(_)));
    }

    #[test]
    fn test_unresolved_import() {
        let err = try_resolve(
            "M DEFINITIONS ::= BEGIN \
             IMPORTS Nope FROM Other; \
             END \
             Other DEFINITIONS ::= BEGIN END",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ResolveErrorKind::UnresolvedImport { .. }));
    }

    #[test]
    fn test_cross_module_resolution() {
        let model = resolve_source(
            "A DEFINITIONS ::= BEGIN \
             IMPORTS U FROM B; \
             T ::= SEQUENCE { u U } \
             END \
             B DEFINITIONS ::= BEGIN U ::= BOOLEAN END",
        );
        let t = model.lookup("A.T").unwrap();
        let TypeKind::Sequence(c) = &model.node(t).kind else {
            panic!("expected SEQUENCE");
        };
        assert!(matches!(
            model.node(c.members[0].ty).kind,
            TypeKind::Boolean
        ));
    }

    #[test]
    fn test_automatic_tags() {
        let model = resolve_source(
            "M DEFINITIONS AUTOMATIC TAGS ::= BEGIN \
             T ::= SEQUENCE { a INTEGER, b BOOLEAN } \
             END",
        );
        let t = model.lookup("T").unwrap();
        let TypeKind::Sequence(c) = &model.node(t).kind else {
            panic!("expected SEQUENCE");
        };
        let TypeKind::Tagged { tag, mode, .. } = model.node(c.members[1].ty).kind else {
            panic!("expected automatic tag");
        };
        assert_eq!(tag.class, TagClass::Context);
        assert_eq!(tag.number, 1);
        assert_eq!(mode, TagMode::Implicit);
    }

    #[test]
    fn test_automatic_tags_disabled_by_explicit_tag() {
        let model = resolve_source(
            "M DEFINITIONS AUTOMATIC TAGS ::= BEGIN \
             T ::= SEQUENCE { a [5] IMPLICIT INTEGER, b BOOLEAN } \
             END",
        );
        let t = model.lookup("T").unwrap();
        let TypeKind::Sequence(c) = &model.node(t).kind else {
            panic!("expected SEQUENCE");
        };
        // `b` keeps its universal tag: no automatic assignment happened.
        assert!(matches!(model.node(c.members[1].ty).kind, TypeKind::Boolean));
    }

    #[test]
    fn test_automatic_tag_on_choice_is_explicit() {
        let model = resolve_source(
            "M DEFINITIONS AUTOMATIC TAGS ::= BEGIN \
             T ::= SEQUENCE { c CHOICE { x INTEGER, y BOOLEAN } } \
             END",
        );
        let t = model.lookup("T").unwrap();
        let TypeKind::Sequence(c) = &model.node(t).kind else {
            panic!("expected SEQUENCE");
        };
        let TypeKind::Tagged { mode, .. } = model.node(c.members[0].ty).kind else {
            panic!("expected tagged member");
        };
        assert_eq!(mode, TagMode::Explicit);
    }

    #[test]
    fn test_parameterized_instantiation() {
        let model = resolve_source(
            "M DEFINITIONS ::= BEGIN \
             Holder { T } ::= SEQUENCE { held T } \
             H ::= Holder { INTEGER } \
             Plain ::= SEQUENCE { held INTEGER } \
             END",
        );
        let h = model.lookup("H").unwrap();
        let TypeKind::Sequence(c) = &model.node(h).kind else {
            panic!("expected SEQUENCE");
        };
        assert!(matches!(
            model.node(c.members[0].ty).kind,
            TypeKind::Integer { .. }
        ));
        // Templates themselves are not registered.
        assert!(model.lookup("Holder").is_none());
    }

    #[test]
    fn test_value_parameter_in_size() {
        let model = resolve_source(
            "M DEFINITIONS ::= BEGIN \
             Block { INTEGER: n } ::= OCTET STRING (SIZE (n)) \
             B4 ::= Block { 4 } \
             END",
        );
        let b4 = model.lookup("B4").unwrap();
        assert_eq!(model.node(b4).hints.fixed_size(), Some(4));
    }

    #[test]
    fn test_recursion_through_optional() {
        let model = resolve_source(
            "M DEFINITIONS ::= BEGIN \
             Node ::= SEQUENCE { next Node OPTIONAL } \
             END",
        );
        let node = model.lookup("Node").unwrap();
        let TypeKind::Sequence(c) = &model.node(node).kind else {
            panic!("expected SEQUENCE");
        };
        assert_eq!(c.members[0].ty, node);
    }

    #[test]
    fn test_recursion_through_sequence_of() {
        let model = resolve_source(
            "M DEFINITIONS ::= BEGIN \
             Tree ::= SEQUENCE { children SEQUENCE OF Tree } \
             END",
        );
        let tree = model.lookup("Tree").unwrap();
        let TypeKind::Sequence(c) = &model.node(tree).kind else {
            panic!("expected SEQUENCE");
        };
        let TypeKind::SequenceOf { element } = model.node(c.members[0].ty).kind else {
            panic!("expected SEQUENCE OF");
        };
        assert_eq!(element, tree);
    }

    #[test]
    fn test_recursion_without_escape_rejected() {
        let err = try_resolve(
            "M DEFINITIONS ::= BEGIN \
             A ::= SEQUENCE { a A } \
             END",
        )
        .unwrap_err();
        assert!(matches!(
            err.kind,
            ResolveErrorKind::RecursionWithoutEscape
        ));
    }

    #[test]
    fn test_duplicate_explicit_tags_rejected() {
        let err = try_resolve(
            "M DEFINITIONS ::= BEGIN \
             T ::= SEQUENCE { a [0] IMPLICIT INTEGER, b [0] IMPLICIT BOOLEAN } \
             END",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ResolveErrorKind::DuplicateTag(_)));
    }

    #[test]
    fn test_choice_duplicate_universal_tags_rejected() {
        let err = try_resolve(
            "M DEFINITIONS ::= BEGIN \
             C ::= CHOICE { a INTEGER, b INTEGER } \
             END",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ResolveErrorKind::DuplicateTag(_)));
    }

    #[test]
    fn test_constraint_merging_on_reference() {
        let model = resolve_source(
            "M DEFINITIONS ::= BEGIN \
             Base ::= INTEGER (0..100) \
             Narrow ::= Base (10..20) \
             END",
        );
        let narrow = model.lookup("Narrow").unwrap();
        let constraint = model.node(narrow).constraint.as_ref().unwrap();
        assert_eq!(constraint.check_int(&BigInt::from(15)), Containment::Root);
        assert_eq!(
            constraint.check_int(&BigInt::from(50)),
            Containment::Outside
        );
        assert_eq!(constraint.check_int(&BigInt::from(5)), Containment::Outside);
    }

    #[test]
    fn test_default_value_folding() {
        let model = resolve_source(
            "M DEFINITIONS ::= BEGIN \
             T ::= SEQUENCE { a INTEGER DEFAULT 7, b BOOLEAN DEFAULT TRUE } \
             END",
        );
        let t = model.lookup("T").unwrap();
        let TypeKind::Sequence(c) = &model.node(t).kind else {
            panic!("expected SEQUENCE");
        };
        assert_eq!(
            c.members[0].default,
            Some(crate::value::Value::int(7))
        );
        assert_eq!(
            c.members[1].default,
            Some(crate::value::Value::Boolean(true))
        );
    }

    #[test]
    fn test_default_value_type_mismatch() {
        let err = try_resolve(
            "M DEFINITIONS ::= BEGIN \
             T ::= SEQUENCE { a INTEGER DEFAULT TRUE } \
             END",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ResolveErrorKind::TypeMismatch(_)));
    }

    #[test]
    fn test_duplicate_module() {
        let err = try_resolve(
            "M DEFINITIONS ::= BEGIN END  M DEFINITIONS ::= BEGIN END",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ResolveErrorKind::DuplicateModule(_)));
    }

    #[test]
    fn test_extension_groups_assigned() {
        let model = resolve_source(
            "M DEFINITIONS ::= BEGIN \
             T ::= SEQUENCE { a INTEGER, ..., b BOOLEAN, [[ c INTEGER, d INTEGER ]] } \
             END",
        );
        let t = model.lookup("T").unwrap();
        let TypeKind::Sequence(c) = &model.node(t).kind else {
            panic!("expected SEQUENCE");
        };
        assert!(c.extensible);
        let groups: alloc::vec::Vec<u32> = c.members.iter().map(|m| m.ext_group).collect();
        assert_eq!(groups, [0, 1, 2, 2]);
    }

    #[test]
    fn test_enumerated_numbering() {
        let model = resolve_source(
            "M DEFINITIONS ::= BEGIN \
             E ::= ENUMERATED { a, b(5), c } \
             END",
        );
        let e = model.lookup("E").unwrap();
        let TypeKind::Enumerated { root, .. } = &model.node(e).kind else {
            panic!("expected ENUMERATED");
        };
        let numbers: alloc::vec::Vec<i64> = root.iter().map(|(_, v)| *v).collect();
        assert_eq!(numbers, [0, 5, 1]);
    }

    #[test]
    fn test_oid_value_splicing() {
        let model = resolve_source(
            "M DEFINITIONS ::= BEGIN \
             internet OBJECT IDENTIFIER ::= { iso 3 6 1 } \
             mgmt OBJECT IDENTIFIER ::= { internet 2 } \
             T ::= SEQUENCE { id OBJECT IDENTIFIER DEFAULT { internet 2 1 } } \
             END",
        );
        let t = model.lookup("T").unwrap();
        let TypeKind::Sequence(c) = &model.node(t).kind else {
            panic!("expected SEQUENCE");
        };
        assert_eq!(
            c.members[0].default,
            Some(crate::value::Value::ObjectIdentifier(alloc::vec![
                1, 3, 6, 1, 2, 1
            ]))
        );
    }

    #[test]
    fn test_lint_collects_multiple_errors() {
        let result = Parser::new(
            b"M DEFINITIONS ::= BEGIN \
              A ::= MissingOne \
              B ::= MissingTwo \
              END",
        )
        .parse();
        let table = ModuleTable::build(result.modules);
        let errors = Resolver::new().lint(&table);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_components_of_splices_root() {
        let model = resolve_source(
            "M DEFINITIONS ::= BEGIN \
             Base ::= SEQUENCE { a INTEGER, b BOOLEAN } \
             T ::= SEQUENCE { COMPONENTS OF Base, c OCTET STRING } \
             END",
        );
        let t = model.lookup("T").unwrap();
        let TypeKind::Sequence(c) = &model.node(t).kind else {
            panic!("expected SEQUENCE");
        };
        let names: alloc::vec::Vec<&str> =
            c.members.iter().map(|m| model.str(m.name)).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }
}
