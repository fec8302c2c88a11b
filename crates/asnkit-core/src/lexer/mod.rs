//! ASN.1 lexer module.
//!
//! Tokenizes ISO/IEC 8824-1 (X.680) module source text into a token stream.

// Allow truncation casts - source size is limited to u32::MAX bytes
#![allow(clippy::cast_possible_truncation)]

mod keyword;
mod token;

pub use keyword::lookup_keyword;
pub use token::{Span, Token, TokenKind};

use alloc::string::String;
use alloc::vec::Vec;

/// Byte offset into source text.
pub type ByteOffset = u32;

/// Diagnostic severity level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Blocks progress; the input may be malformed.
    Error,
    /// Informational; parsing continues.
    Warning,
}

/// A diagnostic message from the lexer or parser.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Severity level.
    pub severity: Severity,
    /// Location in source text.
    pub span: Span,
    /// Human-readable message.
    pub message: String,
}

/// Compute the 1-based line and column of a byte offset.
///
/// Columns count bytes, which matches how ASN.1 sources are written
/// (structural tokens are ASCII).
#[must_use]
pub fn line_col(source: &[u8], offset: ByteOffset) -> (u32, u32) {
    let offset = (offset as usize).min(source.len());
    let mut line = 1u32;
    let mut col = 1u32;
    for &b in &source[..offset] {
        if b == b'\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// ASN.1 lexer.
///
/// Tokenizes source text into a stream of tokens. The lexer is lenient and
/// collects diagnostics rather than failing early; `compile()` turns the
/// first error diagnostic into a `SyntaxError`.
pub struct Lexer<'src> {
    /// Source text being tokenized.
    source: &'src [u8],
    /// Current byte position.
    pos: usize,
    /// Collected diagnostics.
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source bytes.
    ///
    /// The lexer operates on raw bytes. All ASN.1 structural tokens are
    /// ASCII, so non-UTF-8 bytes only affect quoted strings and comments.
    #[must_use]
    pub fn new(source: &'src [u8]) -> Self {
        Self {
            source,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Tokenize the entire source and return all tokens.
    #[must_use]
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    /// Check if we're at the end of input.
    fn is_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Peek at the current byte without advancing.
    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    /// Peek at the byte at offset from current position.
    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    /// Advance by one byte and return it.
    fn advance(&mut self) -> Option<u8> {
        let b = self.source.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    /// Add an error diagnostic.
    fn error(&mut self, span: Span, message: String) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            span,
            message,
        });
    }

    /// Make a span from start to current position.
    fn span_from(&self, start: usize) -> Span {
        Span {
            start: start as ByteOffset,
            end: self.pos as ByteOffset,
        }
    }

    /// Make a token from start position to current position.
    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    /// Skip whitespace and comments.
    ///
    /// Line comments run from `--` to end of line or a closing `--`;
    /// block comments `/* ... */` nest.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c) => {
                    self.advance();
                }
                Some(b'-') if self.peek_at(1) == Some(b'-') => {
                    self.pos += 2;
                    self.skip_line_comment();
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    self.skip_block_comment(start);
                }
                _ => break,
            }
        }
    }

    /// Skip a line comment body. The comment ends at a newline or at a
    /// second `--` pair.
    fn skip_line_comment(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'\n' {
                break;
            }
            if b == b'-' && self.peek_at(1) == Some(b'-') {
                self.pos += 2;
                return;
            }
            self.advance();
        }
    }

    /// Skip a (nesting) block comment body. `start` points at the opening
    /// `/*` for diagnostics.
    fn skip_block_comment(&mut self, start: usize) {
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                None => {
                    let span = self.span_from(start);
                    self.error(span, "unterminated block comment".into());
                    return;
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.pos += 2;
                    depth += 1;
                }
                Some(b'*') if self.peek_at(1) == Some(b'/') => {
                    self.pos += 2;
                    depth -= 1;
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();
        let start = self.pos;

        let Some(b) = self.peek() else {
            return self.token(TokenKind::Eof, start);
        };

        match b {
            b'A'..=b'Z' | b'a'..=b'z' => self.lex_word(start),
            b'0'..=b'9' => self.lex_number(start, false),
            b'-' => {
                self.advance();
                if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.lex_number(start, true)
                } else {
                    self.token(TokenKind::Minus, start)
                }
            }
            b'\'' => self.lex_bhstring(start),
            b'"' => self.lex_cstring(start),
            b'{' => self.single(TokenKind::LBrace, start),
            b'}' => self.single(TokenKind::RBrace, start),
            b'(' => self.single(TokenKind::LParen, start),
            b')' => self.single(TokenKind::RParen, start),
            b'[' => {
                self.advance();
                if self.peek() == Some(b'[') {
                    self.advance();
                    self.token(TokenKind::LVersionBrackets, start)
                } else {
                    self.token(TokenKind::LBracket, start)
                }
            }
            b']' => {
                self.advance();
                if self.peek() == Some(b']') {
                    self.advance();
                    self.token(TokenKind::RVersionBrackets, start)
                } else {
                    self.token(TokenKind::RBracket, start)
                }
            }
            b',' => self.single(TokenKind::Comma, start),
            b';' => self.single(TokenKind::Semicolon, start),
            b'|' => self.single(TokenKind::Pipe, start),
            b'^' => self.single(TokenKind::Caret, start),
            b'<' => self.single(TokenKind::Less, start),
            b'>' => self.single(TokenKind::Greater, start),
            b'!' => self.single(TokenKind::Exclamation, start),
            b'@' => self.single(TokenKind::At, start),
            b'.' => {
                self.advance();
                if self.peek() == Some(b'.') {
                    self.advance();
                    if self.peek() == Some(b'.') {
                        self.advance();
                        self.token(TokenKind::Ellipsis, start)
                    } else {
                        self.token(TokenKind::DotDot, start)
                    }
                } else {
                    self.token(TokenKind::Dot, start)
                }
            }
            b':' => {
                self.advance();
                if self.peek() == Some(b':') && self.peek_at(1) == Some(b'=') {
                    self.pos += 2;
                    self.token(TokenKind::ColonColonEqual, start)
                } else {
                    self.token(TokenKind::Colon, start)
                }
            }
            _ => {
                self.advance();
                let span = self.span_from(start);
                self.error(span, alloc::format!("unexpected character 0x{b:02x}"));
                self.token(TokenKind::Error, start)
            }
        }
    }

    /// Consume one byte and produce a token.
    fn single(&mut self, kind: TokenKind, start: usize) -> Token {
        self.advance();
        self.token(kind, start)
    }

    /// Lex an identifier or keyword.
    ///
    /// Words are letters, digits and single interior hyphens; a hyphen
    /// followed by another hyphen starts a comment instead and is never part
    /// of the word.
    fn lex_word(&mut self, start: usize) -> Token {
        let upper = self.peek().is_some_and(|b| b.is_ascii_uppercase());
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() {
                self.advance();
            } else if b == b'-' && self.peek_at(1).is_some_and(|c| c.is_ascii_alphanumeric()) {
                self.advance();
            } else {
                break;
            }
        }
        let text = core::str::from_utf8(&self.source[start..self.pos]).unwrap_or("");
        if let Some(kind) = lookup_keyword(text) {
            return self.token(kind, start);
        }
        if upper {
            self.token(TokenKind::TypeReference, start)
        } else {
            self.token(TokenKind::Identifier, start)
        }
    }

    /// Lex a number or real number. `negative` indicates a consumed sign.
    ///
    /// A `.` followed by a second `.` is a range operator and terminates the
    /// number.
    fn lex_number(&mut self, start: usize, _negative: bool) -> Token {
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.advance();
        }

        let mut real = false;
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
            real = true;
            self.advance();
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mut ahead = 1;
            if matches!(self.peek_at(1), Some(b'+' | b'-')) {
                ahead = 2;
            }
            if self.peek_at(ahead).is_some_and(|b| b.is_ascii_digit()) {
                real = true;
                for _ in 0..=ahead {
                    self.advance();
                }
                while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let kind = if real {
            TokenKind::RealNumber
        } else if self.source[start] == b'-' {
            TokenKind::NegativeNumber
        } else {
            TokenKind::Number
        };
        self.token(kind, start)
    }

    /// Lex a binary or hex string: `'...'B` or `'...'H`.
    ///
    /// Whitespace inside the quotes is permitted and ignored by the parser.
    fn lex_bhstring(&mut self, start: usize) -> Token {
        self.advance(); // opening quote
        loop {
            match self.advance() {
                None => {
                    let span = self.span_from(start);
                    self.error(span, "unterminated bit/hex string literal".into());
                    return self.token(TokenKind::Error, start);
                }
                Some(b'\'') => break,
                Some(_) => {}
            }
        }
        match self.peek() {
            Some(b'B' | b'b') => {
                self.advance();
                self.token(TokenKind::BString, start)
            }
            Some(b'H' | b'h') => {
                self.advance();
                self.token(TokenKind::HString, start)
            }
            _ => {
                let span = self.span_from(start);
                self.error(span, "expected B or H after quoted string".into());
                self.token(TokenKind::Error, start)
            }
        }
    }

    /// Lex a character string literal. A doubled quote is an escaped quote;
    /// the literal may span lines.
    fn lex_cstring(&mut self, start: usize) -> Token {
        self.advance(); // opening quote
        loop {
            match self.advance() {
                None => {
                    let span = self.span_from(start);
                    self.error(span, "unterminated character string literal".into());
                    return self.token(TokenKind::Error, start);
                }
                Some(b'"') => {
                    if self.peek() == Some(b'"') {
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(_) => {}
            }
        }
        self.token(TokenKind::CString, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn kinds(source: &[u8]) -> Vec<TokenKind> {
        let (tokens, diagnostics) = Lexer::new(source).tokenize();
        assert!(
            diagnostics.iter().all(|d| d.severity != Severity::Error),
            "unexpected lexer errors: {diagnostics:?}"
        );
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_module_header() {
        let k = kinds(b"M DEFINITIONS AUTOMATIC TAGS ::= BEGIN END");
        assert_eq!(
            k,
            [
                TokenKind::TypeReference,
                TokenKind::KwDefinitions,
                TokenKind::KwAutomatic,
                TokenKind::KwTags,
                TokenKind::ColonColonEqual,
                TokenKind::KwBegin,
                TokenKind::KwEnd,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_range_vs_real() {
        assert_eq!(
            kinds(b"(1..5)"),
            [
                TokenKind::LParen,
                TokenKind::Number,
                TokenKind::DotDot,
                TokenKind::Number,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds(b"1.5 -2.5e10 3e-1"),
            [
                TokenKind::RealNumber,
                TokenKind::RealNumber,
                TokenKind::RealNumber,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_hyphenated_words_and_comments() {
        let k = kinds(b"my-value -- trailing comment\nOther-Type");
        assert_eq!(
            k,
            [
                TokenKind::Identifier,
                TokenKind::TypeReference,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comment_closed_by_double_hyphen() {
        let k = kinds(b"a -- comment -- b");
        assert_eq!(
            k,
            [TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn test_nested_block_comment() {
        let k = kinds(b"/* outer /* inner */ still outer */ INTEGER");
        assert_eq!(k, [TokenKind::KwInteger, TokenKind::Eof]);
    }

    #[test]
    fn test_bit_and_hex_strings() {
        assert_eq!(
            kinds(b"'0101'B 'DEAD'H"),
            [TokenKind::BString, TokenKind::HString, TokenKind::Eof]
        );
    }

    #[test]
    fn test_cstring_with_escaped_quote() {
        let (tokens, _) = Lexer::new(br#""say ""hi""""#).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::CString);
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn test_ellipsis_and_version_brackets() {
        assert_eq!(
            kinds(b"..., [[ ]]"),
            [
                TokenKind::Ellipsis,
                TokenKind::Comma,
                TokenKind::LVersionBrackets,
                TokenKind::RVersionBrackets,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_negative_number() {
        assert_eq!(
            kinds(b"(-5..5)"),
            [
                TokenKind::LParen,
                TokenKind::NegativeNumber,
                TokenKind::DotDot,
                TokenKind::Number,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_line_col() {
        let src = b"AB\nCDE\nF";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 4), (2, 2));
        assert_eq!(line_col(src, 7), (3, 1));
    }
}
