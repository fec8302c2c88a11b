//! asnkit-core: ASN.1 schema compiler and wire codecs
//!
//! This crate compiles ASN.1 module definitions (ITU-T X.680) into an
//! immutable type model and drives bit-exact encoders and decoders for
//! BER/DER/CER (X.690), PER/UPER (X.691), OER (X.696), plus the JER, XER
//! and GSER adapters. It is `no_std` compatible and IO-free.
//!
//! # Pipeline
//!
//! ```text
//! Source → Lexer → Tokens → Parser → AST → ModuleTable → Resolver → Model
//!          ^^^^^            ^^^^^^         ^^^^^^^^^^^    ^^^^^^^^
//!          lexer            parser         table          resolver
//! ```
//!
//! - **Lexer** (`lexer`): tokenizes X.680 source text
//! - **Parser** (`parser`): builds the AST from tokens
//! - **Table** (`table`): module-name keyed view with import lookup
//! - **Resolver** (`resolver`): imports, tags, parameters, references,
//!   constraints, defaults; produces the frozen `model`
//! - **Codecs** (`codec`): model-driven encode/decode per wire format
//!
//! # Usage
//!
//! ```ignore
//! use asnkit_core::{compile, Codec, Options, Source, Value};
//!
//! let schema = compile(
//!     &[Source::new("demo.asn", "M DEFINITIONS ::= BEGIN T ::= BOOLEAN END")],
//!     Options { codec: Codec::Der, ..Options::default() },
//! )?;
//! let bytes = schema.encode("T", &Value::Boolean(true))?;
//! assert_eq!(bytes, [0x01, 0x01, 0xff]);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod ast;
pub mod codec;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod schema;
pub mod table;
pub mod value;

pub use codec::{DecodeError, DecodeErrorKind, EncodeError, EncodeErrorKind};
pub use schema::{compile, lint, Codec, CompileError, Options, Schema, Source, SyntaxError};
pub use value::{BitString, Value};
