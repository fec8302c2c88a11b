//! ASN.1 parser module.
//!
//! Parses X.680 module notation into an AST. The parser is lenient,
//! collecting diagnostics and attempting to recover at definition
//! boundaries; `compile()` fails on the first error-severity diagnostic.

use crate::ast::{
    Actual, AstConstraint, AstType, AstValue, BracedItem, Component, ComponentConstraint,
    ConstraintSpec, Definition, Element, EnumItem, Exports, Ident, ImportClause, Module,
    NamedNumber, ParamDecl, Presence, RangeEndpoint, SpecialReal, TagDefault, TypeAssignment,
    ValueAssignment,
};
use crate::lexer::{Diagnostic, Lexer, Severity, Span, Token, TokenKind};
use crate::model::{StringKind, TagClass, TagMode, TimeKind};
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use num_bigint::BigInt;

/// Result of parsing a source blob.
#[derive(Clone, Debug)]
pub struct ParseResult {
    /// The parsed modules, in source order.
    pub modules: Vec<Module>,
    /// Lexer and parser diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    /// The first error-severity diagnostic, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.diagnostics
            .iter()
            .find(|d| d.severity == Severity::Error)
    }
}

/// ASN.1 parser.
pub struct Parser<'src> {
    /// Source text (for extracting token content).
    source: &'src [u8],
    /// Tokens from the lexer.
    tokens: Vec<Token>,
    /// Current position in the token stream.
    pos: usize,
    /// Collected diagnostics (lexer + parser).
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Parser<'src> {
    /// Create a new parser for the given source bytes.
    #[must_use]
    pub fn new(source: &'src [u8]) -> Self {
        let lexer = Lexer::new(source);
        let (tokens, lexer_diagnostics) = lexer.tokenize();
        Self {
            source,
            tokens,
            pos: 0,
            diagnostics: lexer_diagnostics,
        }
    }

    /// Parse every module in the source.
    #[must_use]
    pub fn parse(mut self) -> ParseResult {
        let mut modules = Vec::new();
        while !self.is_eof() {
            if !self.check(TokenKind::TypeReference) {
                let diag = self.error("expected module name");
                self.diagnostics.push(diag);
                self.advance();
                continue;
            }
            match self.parse_module() {
                Ok(module) => modules.push(module),
                Err(diag) => {
                    self.diagnostics.push(diag);
                    self.recover_to_module();
                }
            }
        }
        ParseResult {
            modules,
            diagnostics: self.diagnostics,
        }
    }

    // === Token access methods ===

    /// Get the EOF token for this source.
    fn eof_token(&self) -> Token {
        Token {
            kind: TokenKind::Eof,
            span: Span::point(self.source.len() as u32),
        }
    }

    /// Check if we're at EOF.
    fn is_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    /// Peek at the current token.
    fn peek(&self) -> Token {
        self.tokens
            .get(self.pos)
            .copied()
            .unwrap_or_else(|| self.eof_token())
    }

    /// Peek at the token n positions ahead.
    fn peek_nth(&self, n: usize) -> Token {
        self.tokens
            .get(self.pos + n)
            .copied()
            .unwrap_or_else(|| self.eof_token())
    }

    /// Advance and return the current token.
    fn advance(&mut self) -> Token {
        let token = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token is of the given kind.
    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    /// Consume a token of the given kind if present.
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume a token of the given kind, or return an error.
    fn expect(&mut self, kind: TokenKind) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(&alloc::format!(
                "expected {:?}, found {:?}",
                kind,
                self.peek().kind
            )))
        }
    }

    /// Get the span of the current token.
    fn current_span(&self) -> Span {
        self.peek().span
    }

    /// Extract text for a span.
    fn text(&self, span: Span) -> &str {
        let bytes = &self.source[span.start as usize..span.end as usize];
        core::str::from_utf8(bytes).unwrap_or("")
    }

    /// Create an error diagnostic at the current position.
    fn error(&self, message: &str) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            span: self.current_span(),
            message: message.into(),
        }
    }

    /// Create a warning diagnostic at a span.
    fn warn_at(&mut self, span: Span, message: &str) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            span,
            message: message.into(),
        });
    }

    /// Make an `Ident` from a consumed token.
    fn ident(&self, token: Token) -> Ident {
        Ident::new(self.text(token.span).into(), token.span)
    }

    /// Expect a type reference or identifier token.
    fn expect_word(&mut self) -> Result<Ident, Diagnostic> {
        if self.check(TokenKind::TypeReference) || self.check(TokenKind::Identifier) {
            let token = self.advance();
            Ok(self.ident(token))
        } else {
            Err(self.error("expected identifier"))
        }
    }

    /// Parse a `BigInt` from a number token's text.
    fn bigint(&mut self, token: Token) -> BigInt {
        match self.text(token.span).parse::<BigInt>() {
            Ok(v) => v,
            Err(_) => {
                let diag = Diagnostic {
                    severity: Severity::Error,
                    span: token.span,
                    message: "invalid number".into(),
                };
                self.diagnostics.push(diag);
                BigInt::from(0)
            }
        }
    }

    // === Recovery ===

    /// Skip forward to something that can start a module.
    fn recover_to_module(&mut self) {
        while !self.is_eof() {
            if self.check(TokenKind::TypeReference)
                && self.peek_nth(1).kind == TokenKind::KwDefinitions
            {
                return;
            }
            self.advance();
        }
    }

    /// Skip forward to the next definition boundary inside a module body.
    fn recover_to_definition(&mut self) {
        // Always make progress.
        if !self.is_eof() && !self.check(TokenKind::KwEnd) {
            self.advance();
        }
        while !self.is_eof() && !self.check(TokenKind::KwEnd) {
            let kind = self.peek().kind;
            if kind == TokenKind::TypeReference || kind == TokenKind::Identifier {
                let next = self.peek_nth(1).kind;
                if next == TokenKind::ColonColonEqual
                    || next == TokenKind::LBrace
                    || next.starts_type()
                {
                    return;
                }
            }
            self.advance();
        }
    }

    /// Skip a balanced brace group, current token being `{`.
    fn skip_braced(&mut self) -> Result<(), Diagnostic> {
        self.expect(TokenKind::LBrace)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.advance().kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                TokenKind::Eof => return Err(self.error("unterminated brace group")),
                _ => {}
            }
        }
        Ok(())
    }

    // === Module structure ===

    /// Parse one module: header, imports/exports, body, `END`.
    fn parse_module(&mut self) -> Result<Module, Diagnostic> {
        let start = self.current_span().start;
        let name_token = self.expect(TokenKind::TypeReference)?;
        let name = self.ident(name_token);

        // Definitive identifier after the module name is recorded nowhere;
        // nothing in the pipeline consumes it.
        if self.check(TokenKind::LBrace) {
            self.skip_braced()?;
        }

        self.expect(TokenKind::KwDefinitions)?;

        let mut module = Module::new(name, Span::new(start, 0));

        module.tag_default = if self.eat(TokenKind::KwExplicit) {
            self.expect(TokenKind::KwTags)?;
            TagDefault::Explicit
        } else if self.eat(TokenKind::KwImplicit) {
            self.expect(TokenKind::KwTags)?;
            TagDefault::Implicit
        } else if self.eat(TokenKind::KwAutomatic) {
            self.expect(TokenKind::KwTags)?;
            TagDefault::Automatic
        } else {
            TagDefault::Explicit
        };

        if self.eat(TokenKind::KwExtensibility) {
            self.expect(TokenKind::KwImplied)?;
            module.extensibility_implied = true;
        }

        self.expect(TokenKind::ColonColonEqual)?;
        self.expect(TokenKind::KwBegin)?;

        if self.check(TokenKind::KwExports) {
            module.exports = self.parse_exports()?;
        }
        if self.check(TokenKind::KwImports) {
            module.imports = self.parse_imports()?;
        }

        while !self.check(TokenKind::KwEnd) && !self.is_eof() {
            match self.parse_definition() {
                Ok(Some(def)) => module.body.push(def),
                Ok(None) => {}
                Err(diag) => {
                    self.diagnostics.push(diag);
                    self.recover_to_definition();
                }
            }
        }
        self.expect(TokenKind::KwEnd)?;

        module.span = Span::new(start, self.current_span().start);
        Ok(module)
    }

    /// Parse an `EXPORTS` clause.
    fn parse_exports(&mut self) -> Result<Exports, Diagnostic> {
        self.expect(TokenKind::KwExports)?;
        if self.eat(TokenKind::KwAll) {
            self.expect(TokenKind::Semicolon)?;
            return Ok(Exports::All);
        }
        let mut symbols = Vec::new();
        while !self.check(TokenKind::Semicolon) {
            symbols.push(self.expect_word()?);
            // Parameterized symbol: `T{}`.
            if self.check(TokenKind::LBrace) {
                self.skip_braced()?;
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(Exports::Symbols(symbols))
    }

    /// Parse an `IMPORTS` clause.
    fn parse_imports(&mut self) -> Result<Vec<ImportClause>, Diagnostic> {
        self.expect(TokenKind::KwImports)?;
        let mut clauses = Vec::new();
        let mut symbols: Vec<Ident> = Vec::new();
        let mut group_start = self.current_span().start;

        while !self.check(TokenKind::Semicolon) && !self.is_eof() {
            symbols.push(self.expect_word()?);
            if self.check(TokenKind::LBrace) {
                self.skip_braced()?;
            }
            if self.eat(TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::KwFrom)?;
            let module_token = self.expect(TokenKind::TypeReference)?;
            let from_module = self.ident(module_token);
            // Optional module identifier after the name.
            if self.check(TokenKind::LBrace) {
                self.skip_braced()?;
            }
            let span = Span::new(group_start, self.current_span().start);
            clauses.push(ImportClause {
                symbols: core::mem::take(&mut symbols),
                from_module,
                span,
            });
            group_start = self.current_span().start;
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(clauses)
    }

    /// Parse one top-level assignment, or `None` for tolerated leftovers.
    fn parse_definition(&mut self) -> Result<Option<Definition>, Diagnostic> {
        let start = self.current_span().start;
        if self.check(TokenKind::TypeReference) {
            if self.peek_nth(1).kind == TokenKind::KwMacro {
                return Err(self.error("macro notation is not supported"));
            }
            let name_token = self.advance();
            let name = self.ident(name_token);

            let params = if self.check(TokenKind::LBrace) {
                self.parse_formal_params()?
            } else {
                Vec::new()
            };

            self.expect(TokenKind::ColonColonEqual)?;
            let ty = self.parse_type()?;
            let span = Span::new(start, self.current_span().start);
            return Ok(Some(Definition::Type(TypeAssignment {
                name,
                params,
                ty,
                span,
            })));
        }
        if self.check(TokenKind::Identifier) {
            let name_token = self.advance();
            let name = self.ident(name_token);
            let ty = self.parse_type()?;
            self.expect(TokenKind::ColonColonEqual)?;
            let value = self.parse_value()?;
            let span = Span::new(start, self.current_span().start);
            return Ok(Some(Definition::Value(ValueAssignment {
                name,
                ty,
                value,
                span,
            })));
        }
        Err(self.error("expected a type or value assignment"))
    }

    /// Parse a formal parameter list: `{ T, INTEGER: n }`.
    fn parse_formal_params(&mut self) -> Result<Vec<ParamDecl>, Diagnostic> {
        self.expect(TokenKind::LBrace)?;
        let mut params = Vec::new();
        loop {
            if self.check(TokenKind::TypeReference)
                && matches!(
                    self.peek_nth(1).kind,
                    TokenKind::Comma | TokenKind::RBrace
                )
            {
                let token = self.advance();
                params.push(ParamDecl {
                    governor: None,
                    name: self.ident(token),
                });
            } else {
                let governor = self.parse_type()?;
                self.expect(TokenKind::Colon)?;
                let name = self.expect_word()?;
                params.push(ParamDecl {
                    governor: Some(Box::new(governor)),
                    name,
                });
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(params)
    }

    // === Type notation ===

    /// Parse a type, including tag prefixes and constraint suffixes.
    pub(crate) fn parse_type(&mut self) -> Result<AstType, Diagnostic> {
        if self.check(TokenKind::LBracket) {
            return self.parse_tagged_type();
        }
        let mut ty = self.parse_core_type()?;
        while self.check(TokenKind::LParen) {
            let constraint = self.parse_constraint_spec()?;
            ty = AstType::Constrained {
                inner: Box::new(ty),
                constraint,
            };
        }
        Ok(ty)
    }

    /// Parse `[class number] EXPLICIT|IMPLICIT Type`.
    fn parse_tagged_type(&mut self) -> Result<AstType, Diagnostic> {
        self.expect(TokenKind::LBracket)?;
        let class = if self.eat(TokenKind::KwUniversal) {
            Some(TagClass::Universal)
        } else if self.eat(TokenKind::KwApplication) {
            Some(TagClass::Application)
        } else if self.eat(TokenKind::KwPrivate) {
            Some(TagClass::Private)
        } else {
            None
        };
        let number = match self.peek().kind {
            TokenKind::Number => {
                let token = self.advance();
                AstValue::Integer(self.bigint(token))
            }
            TokenKind::Identifier => {
                let token = self.advance();
                AstValue::Reference(self.ident(token))
            }
            _ => return Err(self.error("expected tag number")),
        };
        self.expect(TokenKind::RBracket)?;

        let mode = if self.eat(TokenKind::KwExplicit) {
            Some(TagMode::Explicit)
        } else if self.eat(TokenKind::KwImplicit) {
            Some(TagMode::Implicit)
        } else {
            None
        };

        let inner = self.parse_type()?;
        Ok(AstType::Tagged {
            class,
            number: Box::new(number),
            mode,
            inner: Box::new(inner),
        })
    }

    /// Parse a type without tag prefix or constraint suffix.
    #[allow(clippy::too_many_lines)]
    fn parse_core_type(&mut self) -> Result<AstType, Diagnostic> {
        match self.peek().kind {
            TokenKind::KwBoolean => {
                self.advance();
                Ok(AstType::Boolean)
            }
            TokenKind::KwInteger => {
                self.advance();
                let named = if self.check(TokenKind::LBrace) {
                    self.parse_named_numbers()?
                } else {
                    Vec::new()
                };
                Ok(AstType::Integer { named })
            }
            TokenKind::KwReal => {
                self.advance();
                Ok(AstType::Real)
            }
            TokenKind::KwNull => {
                self.advance();
                Ok(AstType::Null)
            }
            TokenKind::KwEnumerated => {
                self.advance();
                self.parse_enumerated()
            }
            TokenKind::KwObject => {
                self.advance();
                self.expect(TokenKind::KwIdentifier)?;
                Ok(AstType::ObjectIdentifier)
            }
            TokenKind::KwRelativeOid => {
                self.advance();
                Ok(AstType::RelativeOid)
            }
            TokenKind::KwOctet => {
                self.advance();
                self.expect(TokenKind::KwString)?;
                Ok(AstType::OctetString)
            }
            TokenKind::KwBit => {
                self.advance();
                self.expect(TokenKind::KwString)?;
                let named = if self.check(TokenKind::LBrace) {
                    self.parse_named_numbers()?
                } else {
                    Vec::new()
                };
                Ok(AstType::BitString { named })
            }
            TokenKind::KwEmbedded => {
                self.advance();
                self.expect(TokenKind::KwPdv)?;
                Ok(AstType::EmbeddedPdv)
            }
            TokenKind::KwExternal => {
                self.advance();
                Ok(AstType::External)
            }
            TokenKind::KwAny => {
                self.advance();
                if self.eat(TokenKind::KwDefined) {
                    self.expect(TokenKind::KwBy)?;
                    self.expect(TokenKind::Identifier)?;
                }
                Ok(AstType::Any)
            }
            TokenKind::KwObjectDescriptor => {
                self.advance();
                Ok(AstType::ObjectDescriptor)
            }
            TokenKind::KwUtf8String => self.string_type(StringKind::Utf8),
            TokenKind::KwIa5String => self.string_type(StringKind::Ia5),
            TokenKind::KwPrintableString => self.string_type(StringKind::Printable),
            TokenKind::KwNumericString => self.string_type(StringKind::Numeric),
            TokenKind::KwVisibleString => self.string_type(StringKind::Visible),
            TokenKind::KwGeneralString => self.string_type(StringKind::General),
            TokenKind::KwUniversalString => self.string_type(StringKind::Universal),
            TokenKind::KwBmpString => self.string_type(StringKind::Bmp),
            TokenKind::KwTeletexString => self.string_type(StringKind::Teletex),
            TokenKind::KwGraphicString => self.string_type(StringKind::Graphic),
            TokenKind::KwUtcTime => self.time_type(TimeKind::UtcTime),
            TokenKind::KwGeneralizedTime => self.time_type(TimeKind::GeneralizedTime),
            TokenKind::KwDate => self.time_type(TimeKind::Date),
            TokenKind::KwTimeOfDay => self.time_type(TimeKind::TimeOfDay),
            TokenKind::KwDateTime => self.time_type(TimeKind::DateTime),
            TokenKind::KwSequence => {
                self.advance();
                self.parse_sequence_or_set(true)
            }
            TokenKind::KwSet => {
                self.advance();
                self.parse_sequence_or_set(false)
            }
            TokenKind::KwChoice => {
                self.advance();
                let elements = self.parse_component_list()?;
                Ok(AstType::Choice { elements })
            }
            TokenKind::TypeReference => self.parse_reference(),
            _ => Err(self.error("expected a type")),
        }
    }

    fn string_type(&mut self, kind: StringKind) -> Result<AstType, Diagnostic> {
        self.advance();
        Ok(AstType::CharacterString(kind))
    }

    fn time_type(&mut self, kind: TimeKind) -> Result<AstType, Diagnostic> {
        self.advance();
        Ok(AstType::Time(kind))
    }

    /// Parse what follows `SEQUENCE` or `SET`: a component list, or
    /// `[SIZE-constraint] OF Type`.
    fn parse_sequence_or_set(&mut self, sequence: bool) -> Result<AstType, Diagnostic> {
        if self.check(TokenKind::LBrace) {
            let elements = self.parse_component_list()?;
            return Ok(if sequence {
                AstType::Sequence { elements }
            } else {
                AstType::Set { elements }
            });
        }

        // `SEQUENCE SIZE(...) OF T` or `SEQUENCE (SIZE(...)) OF T`.
        let constraint = if self.check(TokenKind::KwSize) {
            self.advance();
            let size = self.parse_constraint_spec()?;
            Some(ConstraintSpec {
                root: Some(AstConstraint::Size(Box::new(size))),
                extensible: false,
                ext: None,
            })
        } else if self.check(TokenKind::LParen) {
            Some(self.parse_constraint_spec()?)
        } else {
            None
        };

        self.expect(TokenKind::KwOf)?;

        // `SEQUENCE OF name Type` names the element; the name has no
        // semantic weight here.
        if self.check(TokenKind::Identifier) && self.peek_nth(1).kind.starts_type() {
            self.advance();
        }

        let element = Box::new(self.parse_type()?);
        let base = if sequence {
            AstType::SequenceOf(element)
        } else {
            AstType::SetOf(element)
        };
        Ok(match constraint {
            Some(constraint) => AstType::Constrained {
                inner: Box::new(base),
                constraint,
            },
            None => base,
        })
    }

    /// Parse a type reference, optionally qualified and/or parameterized.
    fn parse_reference(&mut self) -> Result<AstType, Diagnostic> {
        let first_token = self.expect(TokenKind::TypeReference)?;
        let first = self.ident(first_token);

        let (module, name) = if self.check(TokenKind::Dot)
            && self.peek_nth(1).kind == TokenKind::TypeReference
        {
            self.advance();
            let name_token = self.advance();
            (Some(first), self.ident(name_token))
        } else {
            (None, first)
        };

        let actuals = if self.check(TokenKind::LBrace) {
            self.parse_actual_params()?
        } else {
            Vec::new()
        };

        Ok(AstType::Reference {
            module,
            name,
            actuals,
        })
    }

    /// Parse an actual parameter list: `{ INTEGER, 42, T }`.
    fn parse_actual_params(&mut self) -> Result<Vec<Actual>, Diagnostic> {
        self.expect(TokenKind::LBrace)?;
        let mut actuals = Vec::new();
        loop {
            if self.peek().kind.starts_type() {
                actuals.push(Actual::Type(self.parse_type()?));
            } else {
                actuals.push(Actual::Value(self.parse_value()?));
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(actuals)
    }

    /// Parse `{ name(value), ... }` named numbers or named bits.
    fn parse_named_numbers(&mut self) -> Result<Vec<NamedNumber>, Diagnostic> {
        self.expect(TokenKind::LBrace)?;
        let mut named = Vec::new();
        loop {
            let name = self.expect_word()?;
            self.expect(TokenKind::LParen)?;
            let value = self.parse_value()?;
            self.expect(TokenKind::RParen)?;
            named.push(NamedNumber { name, value });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(named)
    }

    /// Parse `ENUMERATED { a, b(5), ..., c }`.
    fn parse_enumerated(&mut self) -> Result<AstType, Diagnostic> {
        self.expect(TokenKind::LBrace)?;
        let mut root = Vec::new();
        let mut ext = Vec::new();
        let mut extensible = false;
        loop {
            if self.check(TokenKind::Ellipsis) {
                let span = self.advance().span;
                if extensible {
                    self.warn_at(span, "second extension marker in ENUMERATED");
                }
                extensible = true;
                self.skip_exception_spec()?;
            } else {
                let name = self.expect_word()?;
                let value = if self.eat(TokenKind::LParen) {
                    let v = self.parse_value()?;
                    self.expect(TokenKind::RParen)?;
                    Some(v)
                } else {
                    None
                };
                let item = EnumItem { name, value };
                if extensible {
                    ext.push(item);
                } else {
                    root.push(item);
                }
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(AstType::Enumerated {
            root,
            extensible,
            ext,
        })
    }

    /// Skip an exception spec after an extension marker: `! value`.
    fn skip_exception_spec(&mut self) -> Result<(), Diagnostic> {
        if self.eat(TokenKind::Exclamation) {
            // `! Type : value` or `! value`; either way the exception
            // identification has no effect on encoding.
            if self.peek().kind.starts_type() && self.peek_nth(1).kind == TokenKind::Colon {
                self.parse_type()?;
                self.expect(TokenKind::Colon)?;
            }
            self.parse_value()?;
        }
        Ok(())
    }

    /// Parse a `{ ... }` component list for SEQUENCE, SET or CHOICE.
    fn parse_component_list(&mut self) -> Result<Vec<Element>, Diagnostic> {
        self.expect(TokenKind::LBrace)?;
        let mut elements = Vec::new();
        if self.eat(TokenKind::RBrace) {
            return Ok(elements);
        }
        loop {
            if self.check(TokenKind::Ellipsis) {
                self.advance();
                self.skip_exception_spec()?;
                elements.push(Element::ExtensionMarker);
            } else if self.check(TokenKind::LVersionBrackets) {
                self.advance();
                // Optional version number prefix: `[[ 2: ... ]]`.
                if self.check(TokenKind::Number) && self.peek_nth(1).kind == TokenKind::Colon {
                    self.advance();
                    self.advance();
                }
                let mut group = Vec::new();
                loop {
                    group.push(self.parse_component()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RVersionBrackets)?;
                elements.push(Element::ExtensionGroup(group));
            } else if self.check(TokenKind::KwComponents) {
                self.advance();
                self.expect(TokenKind::KwOf)?;
                elements.push(Element::ComponentsOf(self.parse_type()?));
            } else {
                elements.push(Element::Component(self.parse_component()?));
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(elements)
    }

    /// Parse one named component with optional `OPTIONAL`/`DEFAULT`.
    fn parse_component(&mut self) -> Result<Component, Diagnostic> {
        let name_token = self.expect(TokenKind::Identifier)?;
        let name = self.ident(name_token);
        let ty = self.parse_type()?;
        let mut optional = false;
        let mut default = None;
        if self.eat(TokenKind::KwOptional) {
            optional = true;
        } else if self.eat(TokenKind::KwDefault) {
            default = Some(self.parse_value()?);
        }
        Ok(Component {
            name,
            ty,
            optional,
            default,
        })
    }

    // === Value notation ===

    /// Parse a value.
    pub(crate) fn parse_value(&mut self) -> Result<AstValue, Diagnostic> {
        match self.peek().kind {
            TokenKind::KwTrue => {
                self.advance();
                Ok(AstValue::Boolean(true))
            }
            TokenKind::KwFalse => {
                self.advance();
                Ok(AstValue::Boolean(false))
            }
            TokenKind::KwNull => {
                self.advance();
                Ok(AstValue::Null)
            }
            TokenKind::Number | TokenKind::NegativeNumber => {
                let token = self.advance();
                Ok(AstValue::Integer(self.bigint(token)))
            }
            TokenKind::RealNumber => {
                let token = self.advance();
                let text = self.text(token.span).to_string();
                match text.parse::<f64>() {
                    Ok(v) => Ok(AstValue::Real(v)),
                    Err(_) => Err(self.error("invalid real number")),
                }
            }
            TokenKind::KwPlusInfinity => {
                self.advance();
                Ok(AstValue::SpecialReal(SpecialReal::PlusInfinity))
            }
            TokenKind::KwMinusInfinity => {
                self.advance();
                Ok(AstValue::SpecialReal(SpecialReal::MinusInfinity))
            }
            TokenKind::KwNotANumber => {
                self.advance();
                Ok(AstValue::SpecialReal(SpecialReal::NotANumber))
            }
            TokenKind::CString => {
                let token = self.advance();
                Ok(AstValue::Text(self.cstring_contents(token.span)))
            }
            TokenKind::BString => {
                let token = self.advance();
                Ok(AstValue::BString(self.quoted_contents(token.span)))
            }
            TokenKind::HString => {
                let token = self.advance();
                Ok(AstValue::HString(self.quoted_contents(token.span)))
            }
            TokenKind::Identifier => {
                let token = self.advance();
                let name = self.ident(token);
                if self.eat(TokenKind::Colon) {
                    let value = self.parse_value()?;
                    Ok(AstValue::Choice {
                        selector: name,
                        value: Box::new(value),
                    })
                } else {
                    Ok(AstValue::Reference(name))
                }
            }
            TokenKind::TypeReference => {
                // `Module.value` external value reference.
                let module_token = self.advance();
                if self.eat(TokenKind::Dot) {
                    let value_token = self.expect(TokenKind::Identifier)?;
                    let mut name = self.text(module_token.span).to_string();
                    name.push('.');
                    name.push_str(self.text(value_token.span));
                    let span = Span::new(module_token.span.start, value_token.span.end);
                    Ok(AstValue::Reference(Ident::new(name, span)))
                } else {
                    Err(self.error("expected a value"))
                }
            }
            TokenKind::LBrace => self.parse_braced_value(),
            _ => Err(self.error("expected a value")),
        }
    }

    /// Contents of a `"..."` literal with `""` unescaped.
    fn cstring_contents(&self, span: Span) -> String {
        let raw = self.text(span);
        let inner = &raw[1..raw.len() - 1];
        inner.replace("\"\"", "\"")
    }

    /// Contents of a `'...'B`/`'...'H` literal, whitespace stripped.
    fn quoted_contents(&self, span: Span) -> String {
        let raw = self.text(span);
        let inner = &raw[1..raw.len() - 2];
        inner.chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// Parse `{ ... }` value notation, shape-agnostic.
    fn parse_braced_value(&mut self) -> Result<AstValue, Diagnostic> {
        self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();
        loop {
            if self.check(TokenKind::RBrace) {
                break;
            }
            items.push(self.parse_braced_item()?);
            // OID component lists have no separators; named value lists use
            // commas. Accept both.
            self.eat(TokenKind::Comma);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(AstValue::Braced(items))
    }

    fn parse_braced_item(&mut self) -> Result<BracedItem, Diagnostic> {
        match self.peek().kind {
            TokenKind::Number => {
                let token = self.advance();
                Ok(BracedItem::Number(self.bigint(token)))
            }
            TokenKind::Identifier => {
                let token = self.advance();
                let name = self.ident(token);
                if self.check(TokenKind::LParen)
                    && self.peek_nth(1).kind == TokenKind::Number
                    && self.peek_nth(2).kind == TokenKind::RParen
                {
                    self.advance();
                    let number_token = self.advance();
                    self.advance();
                    Ok(BracedItem::NameAndNumber(name, self.bigint(number_token)))
                } else if self.check(TokenKind::Comma) || self.check(TokenKind::RBrace) {
                    Ok(BracedItem::Name(name))
                } else if self.check(TokenKind::Colon) {
                    self.advance();
                    let value = self.parse_value()?;
                    Ok(BracedItem::Value(AstValue::Choice {
                        selector: name,
                        value: Box::new(value),
                    }))
                } else {
                    let value = self.parse_value()?;
                    Ok(BracedItem::Named(name, value))
                }
            }
            _ => Ok(BracedItem::Value(self.parse_value()?)),
        }
    }

    // === Constraint notation ===

    /// Parse a parenthesized constraint.
    fn parse_constraint_spec(&mut self) -> Result<ConstraintSpec, Diagnostic> {
        self.expect(TokenKind::LParen)?;
        let mut spec = ConstraintSpec::default();

        if self.check(TokenKind::Ellipsis) {
            self.advance();
            self.skip_exception_spec()?;
            spec.extensible = true;
        } else {
            spec.root = Some(self.parse_element_set()?);
            if self.eat(TokenKind::Comma) {
                self.expect(TokenKind::Ellipsis)?;
                self.skip_exception_spec()?;
                spec.extensible = true;
            }
        }
        if spec.extensible && self.eat(TokenKind::Comma) {
            spec.ext = Some(self.parse_element_set()?);
        }
        self.expect(TokenKind::RParen)?;
        Ok(spec)
    }

    /// Parse an element set: unions of intersections.
    fn parse_element_set(&mut self) -> Result<AstConstraint, Diagnostic> {
        if self.check(TokenKind::KwAll) {
            self.advance();
            self.expect(TokenKind::KwExcept)?;
            let excluded = self.parse_constraint_elements()?;
            return Ok(AstConstraint::AllExcept(Box::new(excluded)));
        }

        let mut terms = Vec::new();
        terms.push(self.parse_intersections()?);
        while self.eat(TokenKind::Pipe) || self.eat(TokenKind::KwUnion) {
            terms.push(self.parse_intersections()?);
        }
        Ok(if terms.len() == 1 {
            terms.pop().expect("one term")
        } else {
            AstConstraint::Union(terms)
        })
    }

    /// Parse intersections: elements joined by `^` / `INTERSECTION`.
    fn parse_intersections(&mut self) -> Result<AstConstraint, Diagnostic> {
        let mut terms = Vec::new();
        terms.push(self.parse_intersection_term()?);
        while self.eat(TokenKind::Caret) || self.eat(TokenKind::KwIntersection) {
            terms.push(self.parse_intersection_term()?);
        }
        Ok(if terms.len() == 1 {
            terms.pop().expect("one term")
        } else {
            AstConstraint::Intersection(terms)
        })
    }

    /// Parse one intersection term with an optional `EXCEPT` clause.
    fn parse_intersection_term(&mut self) -> Result<AstConstraint, Diagnostic> {
        let base = self.parse_constraint_elements()?;
        if self.eat(TokenKind::KwExcept) {
            let excluded = self.parse_constraint_elements()?;
            return Ok(AstConstraint::Except {
                base: Box::new(base),
                excluded: Box::new(excluded),
            });
        }
        Ok(base)
    }

    /// Parse a single subtype element or a parenthesized element set.
    fn parse_constraint_elements(&mut self) -> Result<AstConstraint, Diagnostic> {
        match self.peek().kind {
            TokenKind::LParen => {
                self.advance();
                let set = self.parse_element_set()?;
                self.expect(TokenKind::RParen)?;
                Ok(set)
            }
            TokenKind::KwSize => {
                self.advance();
                let spec = self.parse_constraint_spec()?;
                Ok(AstConstraint::Size(Box::new(spec)))
            }
            TokenKind::KwFrom => {
                self.advance();
                let spec = self.parse_constraint_spec()?;
                Ok(AstConstraint::From(Box::new(spec)))
            }
            TokenKind::KwPattern => {
                self.advance();
                let value = self.parse_value()?;
                Ok(AstConstraint::Pattern(value))
            }
            TokenKind::KwContaining => {
                self.advance();
                let ty = self.parse_type()?;
                if self.eat(TokenKind::KwEncoded) {
                    self.expect(TokenKind::KwBy)?;
                    self.parse_value()?;
                }
                Ok(AstConstraint::Containing(Box::new(ty)))
            }
            TokenKind::KwIncludes => {
                self.advance();
                let ty = self.parse_type()?;
                Ok(AstConstraint::Includes(Box::new(ty)))
            }
            TokenKind::KwWith => {
                self.advance();
                if self.eat(TokenKind::KwComponent) {
                    let spec = self.parse_constraint_spec()?;
                    Ok(AstConstraint::WithComponent(Box::new(spec)))
                } else {
                    self.expect(TokenKind::KwComponents)?;
                    self.parse_with_components()
                }
            }
            TokenKind::TypeReference => {
                let ty = self.parse_type()?;
                Ok(AstConstraint::Includes(Box::new(ty)))
            }
            _ => self.parse_value_or_range(),
        }
    }

    /// Parse a single value or a `lo..hi` range.
    fn parse_value_or_range(&mut self) -> Result<AstConstraint, Diagnostic> {
        let lo = if self.eat(TokenKind::KwMin) {
            RangeEndpoint::Min
        } else {
            RangeEndpoint::Value(self.parse_value()?)
        };
        let lo_excl = self.eat(TokenKind::Less);

        if !self.check(TokenKind::DotDot) {
            if lo_excl {
                return Err(self.error("expected `..` after exclusive endpoint"));
            }
            return match lo {
                RangeEndpoint::Value(v) => Ok(AstConstraint::Value(v)),
                _ => Err(self.error("MIN is only valid in a range")),
            };
        }
        self.advance();

        let hi_excl = self.eat(TokenKind::Less);
        let hi = if self.eat(TokenKind::KwMax) {
            RangeEndpoint::Max
        } else {
            RangeEndpoint::Value(self.parse_value()?)
        };
        Ok(AstConstraint::Range {
            lo,
            lo_excl,
            hi,
            hi_excl,
        })
    }

    /// Parse `WITH COMPONENTS { [...,] name (spec) PRESENT, ... }`.
    fn parse_with_components(&mut self) -> Result<AstConstraint, Diagnostic> {
        self.expect(TokenKind::LBrace)?;
        let mut partial = false;
        if self.check(TokenKind::Ellipsis) {
            self.advance();
            partial = true;
            self.eat(TokenKind::Comma);
        }
        let mut components = Vec::new();
        loop {
            if self.check(TokenKind::RBrace) {
                break;
            }
            let name = self.expect_word()?;
            let constraint = if self.check(TokenKind::LParen) {
                Some(self.parse_constraint_spec()?)
            } else {
                None
            };
            let presence = if self.eat(TokenKind::KwPresent) {
                Presence::Present
            } else if self.eat(TokenKind::KwAbsent) {
                Presence::Absent
            } else if self.eat(TokenKind::KwOptional) {
                Presence::Optional
            } else {
                Presence::Unspecified
            };
            components.push(ComponentConstraint {
                name,
                constraint,
                presence,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(AstConstraint::WithComponents {
            partial,
            components,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Module {
        let result = Parser::new(source.as_bytes()).parse();
        let errors: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        assert_eq!(result.modules.len(), 1);
        result.modules.into_iter().next().unwrap()
    }

    #[test]
    fn test_empty_module() {
        let module = parse_ok("Empty DEFINITIONS ::= BEGIN END");
        assert_eq!(module.name.name, "Empty");
        assert_eq!(module.tag_default, TagDefault::Explicit);
        assert!(module.body.is_empty());
    }

    #[test]
    fn test_tag_default_and_extensibility() {
        let module =
            parse_ok("M DEFINITIONS AUTOMATIC TAGS EXTENSIBILITY IMPLIED ::= BEGIN END");
        assert_eq!(module.tag_default, TagDefault::Automatic);
        assert!(module.extensibility_implied);
    }

    #[test]
    fn test_imports() {
        let module = parse_ok(
            "M DEFINITIONS ::= BEGIN \
             IMPORTS A, b FROM Mod1 C FROM Mod2; \
             END",
        );
        assert_eq!(module.imports.len(), 2);
        assert_eq!(module.imports[0].symbols.len(), 2);
        assert_eq!(module.imports[0].from_module.name, "Mod1");
        assert_eq!(module.imports[1].symbols[0].name, "C");
    }

    #[test]
    fn test_sequence_with_optional_and_default() {
        let module = parse_ok(
            "M DEFINITIONS ::= BEGIN \
             T ::= SEQUENCE { a INTEGER, b BOOLEAN OPTIONAL, c INTEGER DEFAULT 7 } \
             END",
        );
        let Definition::Type(def) = &module.body[0] else {
            panic!("expected type assignment");
        };
        let AstType::Sequence { elements } = &def.ty else {
            panic!("expected SEQUENCE");
        };
        assert_eq!(elements.len(), 3);
        let Element::Component(b) = &elements[1] else {
            panic!("expected component");
        };
        assert!(b.optional);
        let Element::Component(c) = &elements[2] else {
            panic!("expected component");
        };
        assert!(matches!(c.default, Some(AstValue::Integer(_))));
    }

    #[test]
    fn test_extension_marker_and_group() {
        let module = parse_ok(
            "M DEFINITIONS ::= BEGIN \
             T ::= SEQUENCE { a INTEGER, ..., [[ b BOOLEAN, c INTEGER ]], d INTEGER } \
             END",
        );
        let Definition::Type(def) = &module.body[0] else {
            panic!("expected type assignment");
        };
        let AstType::Sequence { elements } = &def.ty else {
            panic!("expected SEQUENCE");
        };
        assert!(matches!(elements[1], Element::ExtensionMarker));
        assert!(matches!(&elements[2], Element::ExtensionGroup(g) if g.len() == 2));
    }

    #[test]
    fn test_constrained_integer() {
        let module = parse_ok(
            "M DEFINITIONS ::= BEGIN \
             T ::= INTEGER (0..100, ...) \
             END",
        );
        let Definition::Type(def) = &module.body[0] else {
            panic!("expected type assignment");
        };
        let AstType::Constrained { constraint, .. } = &def.ty else {
            panic!("expected constrained type");
        };
        assert!(constraint.extensible);
        assert!(matches!(
            constraint.root,
            Some(AstConstraint::Range { .. })
        ));
    }

    #[test]
    fn test_size_and_from_constraints() {
        let module = parse_ok(
            "M DEFINITIONS ::= BEGIN \
             S ::= IA5String (SIZE (1..4) ^ FROM (\"ab\")) \
             L ::= SEQUENCE SIZE (1..10) OF INTEGER \
             END",
        );
        assert_eq!(module.body.len(), 2);
        let Definition::Type(l) = &module.body[1] else {
            panic!("expected type assignment");
        };
        assert!(matches!(l.ty, AstType::Constrained { .. }));
    }

    #[test]
    fn test_tagged_types() {
        let module = parse_ok(
            "M DEFINITIONS ::= BEGIN \
             T ::= SEQUENCE { a [0] IMPLICIT INTEGER, b [APPLICATION 3] EXPLICIT BOOLEAN } \
             END",
        );
        let Definition::Type(def) = &module.body[0] else {
            panic!("expected type assignment");
        };
        let AstType::Sequence { elements } = &def.ty else {
            panic!("expected SEQUENCE");
        };
        let Element::Component(a) = &elements[0] else {
            panic!("expected component");
        };
        let AstType::Tagged { class, mode, .. } = &a.ty else {
            panic!("expected tagged type");
        };
        assert_eq!(*class, None);
        assert_eq!(*mode, Some(TagMode::Implicit));
        let Element::Component(b) = &elements[1] else {
            panic!("expected component");
        };
        assert!(matches!(
            &b.ty,
            AstType::Tagged {
                class: Some(TagClass::Application),
                ..
            }
        ));
    }

    #[test]
    fn test_parameterized_assignment_and_reference() {
        let module = parse_ok(
            "M DEFINITIONS ::= BEGIN \
             Holder { T } ::= SEQUENCE { held T } \
             H ::= Holder { INTEGER } \
             END",
        );
        let Definition::Type(holder) = &module.body[0] else {
            panic!("expected type assignment");
        };
        assert_eq!(holder.params.len(), 1);
        assert!(holder.params[0].is_type_param());
        let Definition::Type(h) = &module.body[1] else {
            panic!("expected type assignment");
        };
        let AstType::Reference { actuals, .. } = &h.ty else {
            panic!("expected reference");
        };
        assert_eq!(actuals.len(), 1);
        assert!(matches!(actuals[0], Actual::Type(_)));
    }

    #[test]
    fn test_value_assignments() {
        let module = parse_ok(
            "M DEFINITIONS ::= BEGIN \
             lower INTEGER ::= -10 \
             oid OBJECT IDENTIFIER ::= { iso member-body(2) 840 } \
             flag BOOLEAN ::= TRUE \
             END",
        );
        assert_eq!(module.body.len(), 3);
        let Definition::Value(oid) = &module.body[1] else {
            panic!("expected value assignment");
        };
        let AstValue::Braced(items) = &oid.value else {
            panic!("expected braced value");
        };
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], BracedItem::Name(_)));
        assert!(matches!(items[1], BracedItem::NameAndNumber(..)));
        assert!(matches!(items[2], BracedItem::Number(_)));
    }

    #[test]
    fn test_choice_and_enumerated() {
        let module = parse_ok(
            "M DEFINITIONS ::= BEGIN \
             C ::= CHOICE { a INTEGER, b BOOLEAN } \
             E ::= ENUMERATED { red(0), green(1), ..., blue(2) } \
             END",
        );
        let Definition::Type(e) = &module.body[1] else {
            panic!("expected type assignment");
        };
        let AstType::Enumerated {
            root,
            extensible,
            ext,
        } = &e.ty
        else {
            panic!("expected ENUMERATED");
        };
        assert_eq!(root.len(), 2);
        assert!(extensible);
        assert_eq!(ext.len(), 1);
    }

    #[test]
    fn test_with_components() {
        parse_ok(
            "M DEFINITIONS ::= BEGIN \
             T ::= SEQUENCE { a INTEGER, b BOOLEAN OPTIONAL } \
             U ::= T (WITH COMPONENTS { ..., b PRESENT }) \
             END",
        );
    }

    #[test]
    fn test_macro_rejected() {
        let result = Parser::new(
            b"M DEFINITIONS ::= BEGIN OPERATION MACRO ::= BEGIN END END",
        )
        .parse();
        assert!(result.first_error().is_some());
    }

    #[test]
    fn test_multiple_modules() {
        let result = Parser::new(
            b"A DEFINITIONS ::= BEGIN END  B DEFINITIONS ::= BEGIN END",
        )
        .parse();
        assert!(result.first_error().is_none());
        assert_eq!(result.modules.len(), 2);
    }
}
