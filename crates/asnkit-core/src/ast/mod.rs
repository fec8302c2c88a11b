//! Abstract Syntax Tree types for parsed ASN.1 modules.
//!
//! The AST captures syntactic structure as-written, preserving source
//! locations for diagnostics. References, parameterized types, tagging
//! defaults and constraints are kept unreduced; semantic analysis happens in
//! later phases (module table lowering and the resolver).

mod common;
mod constraint;
mod definition;
mod module;
mod syntax;
mod value;

pub use common::Ident;
pub use constraint::{
    AstConstraint, ComponentConstraint, ConstraintSpec, Presence, RangeEndpoint,
};
pub use definition::{Definition, ParamDecl, TypeAssignment, ValueAssignment};
pub use module::{Exports, ImportClause, Module, TagDefault};
pub use syntax::{Actual, AstType, Component, Element, EnumItem, NamedNumber};
pub use value::{AstValue, BracedItem, SpecialReal};
