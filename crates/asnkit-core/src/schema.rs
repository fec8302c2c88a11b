//! The compile entry point and the compiled schema.
//!
//! `compile` drives the full pipeline over a list of labeled source blobs
//! and binds the resulting model to one codec. The schema is immutable and
//! shareable; every encode/decode call carries its own state.

use crate::codec::ber::BerMode;
use crate::codec::{
    ber, gser, jer, oer, per, xer, DecodeError, DecodeErrorKind, EncodeError, EncodeErrorKind,
    ErrorPath,
};
use crate::lexer::{line_col, Severity};
use crate::model::{Model, TypeId};
use crate::parser::Parser;
use crate::resolver::{ResolveError, Resolver};
use crate::table::ModuleTable;
use crate::value::{refresh, Value};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use thiserror::Error;

/// The wire format a schema is bound to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Codec {
    /// Basic Encoding Rules (X.690).
    #[default]
    Ber,
    /// Distinguished Encoding Rules (X.690).
    Der,
    /// Canonical Encoding Rules (X.690).
    Cer,
    /// Octet Encoding Rules (X.696).
    Oer,
    /// Aligned Packed Encoding Rules (X.691).
    Per,
    /// Unaligned Packed Encoding Rules (X.691).
    Uper,
    /// JSON Encoding Rules.
    Jer,
    /// XML Encoding Rules (X.693 basic).
    Xer,
    /// Generic String Encoding Rules (RFC 3641), encode-only.
    Gser,
}

impl Codec {
    /// Parse a codec name as used on the command line.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ber" => Some(Self::Ber),
            "der" => Some(Self::Der),
            "cer" => Some(Self::Cer),
            "oer" => Some(Self::Oer),
            "per" => Some(Self::Per),
            "uper" => Some(Self::Uper),
            "jer" => Some(Self::Jer),
            "xer" => Some(Self::Xer),
            "gser" => Some(Self::Gser),
            _ => None,
        }
    }

    /// The lower-case codec name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ber => "ber",
            Self::Der => "der",
            Self::Cer => "cer",
            Self::Oer => "oer",
            Self::Per => "per",
            Self::Uper => "uper",
            Self::Jer => "jer",
            Self::Xer => "xer",
            Self::Gser => "gser",
        }
    }
}

/// Compilation options.
#[derive(Clone, Copy, Debug, Default)]
pub struct Options {
    /// The codec the schema is bound to.
    pub codec: Codec,
    /// Marshal ENUMERATED values as numbers instead of names.
    pub numeric_enums: bool,
}

/// One labeled ASN.1 source blob.
#[derive(Clone, Copy, Debug)]
pub struct Source<'a> {
    /// Diagnostic label (usually the file name).
    pub label: &'a str,
    /// The ASN.1 text.
    pub text: &'a str,
}

impl<'a> Source<'a> {
    /// Create a labeled source.
    #[must_use]
    pub const fn new(label: &'a str, text: &'a str) -> Self {
        Self { label, text }
    }
}

/// A parse failure with its location.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{label}:{line}:{column}: {message}")]
pub struct SyntaxError {
    /// Source label.
    pub label: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
    /// What was expected and what was found.
    pub message: String,
}

/// Why a compilation failed.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CompileError {
    /// The source did not parse.
    #[error(transparent)]
    Syntax(SyntaxError),
    /// The parsed modules did not resolve.
    #[error(transparent)]
    Resolve(ResolveError),
}

/// Compile ASN.1 sources into a schema bound to one codec.
pub fn compile(sources: &[Source<'_>], options: Options) -> Result<Schema, CompileError> {
    let mut modules = Vec::new();
    for source in sources {
        let result = Parser::new(source.text.as_bytes()).parse();
        if let Some(diag) = result.first_error() {
            let (line, column) = line_col(source.text.as_bytes(), diag.span.start);
            return Err(CompileError::Syntax(SyntaxError {
                label: source.label.to_string(),
                line,
                column,
                message: diag.message.clone(),
            }));
        }
        modules.extend(result.modules);
    }
    let table = ModuleTable::build(modules);
    let model = Resolver::new()
        .resolve(&table)
        .map_err(CompileError::Resolve)?;
    Ok(Schema {
        model,
        codec: options.codec,
        numeric_enums: options.numeric_enums,
    })
}

/// Check sources and report every problem found, as rendered messages.
///
/// Parser and table diagnostics come first, then resolver lint errors.
#[must_use]
pub fn lint(sources: &[Source<'_>]) -> Vec<String> {
    let mut messages = Vec::new();
    let mut modules = Vec::new();
    for source in sources {
        let result = Parser::new(source.text.as_bytes()).parse();
        for diag in &result.diagnostics {
            let (line, column) = line_col(source.text.as_bytes(), diag.span.start);
            let severity = match diag.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            messages.push(alloc::format!(
                "{}:{line}:{column}: {severity}: {}",
                source.label,
                diag.message
            ));
        }
        modules.extend(result.modules);
    }
    let table = ModuleTable::build(modules);
    for diag in table.diagnostics() {
        messages.push(alloc::format!("warning: {}", diag.message));
    }
    for err in Resolver::new().lint(&table) {
        messages.push(alloc::format!("error: {err}"));
    }
    messages
}

/// A compiled schema bound to a single codec.
///
/// Immutable after compilation; safe to share across threads and calls.
#[derive(Clone, Debug)]
pub struct Schema {
    model: Model,
    codec: Codec,
    numeric_enums: bool,
}

impl Schema {
    /// The underlying type model.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The bound codec.
    #[must_use]
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Registered top-level type names.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.model.type_names()
    }

    fn type_id_for_encode(&self, type_name: &str) -> Result<TypeId, EncodeError> {
        self.model.lookup(type_name).ok_or_else(|| EncodeError {
            kind: EncodeErrorKind::UnknownType(type_name.into()),
            path: ErrorPath::default(),
        })
    }

    fn type_id_for_decode(&self, type_name: &str) -> Result<TypeId, DecodeError> {
        self.model.lookup(type_name).ok_or_else(|| DecodeError {
            kind: DecodeErrorKind::UnknownType(type_name.into()),
            offset: 0,
            path: ErrorPath::default(),
        })
    }

    /// Encode a value of the named type.
    pub fn encode(&self, type_name: &str, value: &Value) -> Result<Vec<u8>, EncodeError> {
        let id = self.type_id_for_encode(type_name)?;
        match self.codec {
            Codec::Ber => ber::encode(&self.model, BerMode::Ber, id, value),
            Codec::Der => ber::encode(&self.model, BerMode::Der, id, value),
            Codec::Cer => ber::encode(&self.model, BerMode::Cer, id, value),
            Codec::Oer => oer::encode(&self.model, id, value),
            Codec::Per => per::encode(&self.model, true, id, value),
            Codec::Uper => per::encode(&self.model, false, id, value),
            Codec::Jer => jer::encode(&self.model, id, value, self.numeric_enums),
            Codec::Xer => xer::encode(&self.model, id, value, self.numeric_enums),
            Codec::Gser => gser::encode(&self.model, id, value),
        }
    }

    /// Decode one complete encoding of the named type; trailing bytes are
    /// an error.
    pub fn decode(&self, type_name: &str, data: &[u8]) -> Result<Value, DecodeError> {
        let (value, consumed) = self.decode_with_length(type_name, data)?;
        if consumed != data.len() {
            return Err(DecodeError {
                kind: DecodeErrorKind::TrailingData,
                offset: consumed,
                path: ErrorPath::default(),
            });
        }
        Ok(value)
    }

    /// Decode one complete encoding and also return the bytes consumed.
    pub fn decode_with_length(
        &self,
        type_name: &str,
        data: &[u8],
    ) -> Result<(Value, usize), DecodeError> {
        let id = self.type_id_for_decode(type_name)?;
        match self.codec {
            Codec::Ber => ber::decode(&self.model, BerMode::Ber, id, data, self.numeric_enums),
            Codec::Der => ber::decode(&self.model, BerMode::Der, id, data, self.numeric_enums),
            Codec::Cer => ber::decode(&self.model, BerMode::Cer, id, data, self.numeric_enums),
            Codec::Oer => oer::decode(&self.model, id, data, self.numeric_enums),
            Codec::Per => per::decode(&self.model, true, id, data, self.numeric_enums),
            Codec::Uper => per::decode(&self.model, false, id, data, self.numeric_enums),
            Codec::Jer => {
                let value = jer::decode(&self.model, id, data, self.numeric_enums)?;
                Ok((value, data.len()))
            }
            Codec::Xer => {
                let value = xer::decode(&self.model, id, data, self.numeric_enums)?;
                Ok((value, data.len()))
            }
            Codec::Gser => Err(DecodeError {
                kind: DecodeErrorKind::UnsupportedCodec,
                offset: 0,
                path: ErrorPath::default(),
            }),
        }
    }

    /// Fill in missing DEFAULT members, recursively. Round-trip tests use
    /// this as the fixed point of `decode(encode(v))`.
    pub fn refresh(&self, type_name: &str, value: &Value) -> Result<Value, EncodeError> {
        let id = self.type_id_for_encode(type_name)?;
        Ok(refresh(&self.model, id, value))
    }
}
