//! Token types and spans.

use super::ByteOffset;

/// A byte range in one source blob.
///
/// Spans flow from the lexer through every diagnostic; `compile()` maps a
/// span's start to the line/column of its `SyntaxError`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: ByteOffset,
    /// End byte offset (exclusive).
    pub end: ByteOffset,
}

impl Span {
    /// Span over `start..end`.
    #[must_use]
    pub const fn new(start: ByteOffset, end: ByteOffset) -> Self {
        Self { start, end }
    }

    /// Zero-width span, for end-of-input markers and synthesized nodes.
    #[must_use]
    pub const fn point(at: ByteOffset) -> Self {
        Self { start: at, end: at }
    }
}

/// One lexed token. The text is not carried; consumers slice the source by
/// the span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// Location in source text.
    pub span: Span,
}

/// Token kinds.
///
/// Lexical items of ISO/IEC 8824-1 (X.680) module notation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenKind {
    // === Special ===
    /// Lexical error.
    Error = 0,
    /// End of input.
    Eof,

    // === Identifiers ===
    /// Uppercase-initial word (type references, module references).
    TypeReference,
    /// Lowercase-initial word (value references, identifiers).
    Identifier,

    // === Literals ===
    /// Unsigned decimal number.
    Number,
    /// Negative decimal number.
    NegativeNumber,
    /// Real number literal (`1.5`, `15e-1`).
    RealNumber,
    /// Binary string literal (`'0101'B`).
    BString,
    /// Hex string literal (`'AF01'H`).
    HString,
    /// Quoted character string literal.
    CString,

    // === Punctuation ===
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `[[` (version brackets, opening)
    LVersionBrackets,
    /// `]]` (version brackets, closing)
    RVersionBrackets,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `..`
    DotDot,
    /// `...` (extension marker)
    Ellipsis,
    /// `;`
    Semicolon,
    /// `:`
    Colon,
    /// `::=`
    ColonColonEqual,
    /// `|` (union)
    Pipe,
    /// `^` (intersection)
    Caret,
    /// `<` (open range endpoint)
    Less,
    /// `>`
    Greater,
    /// `!` (exception spec)
    Exclamation,
    /// `-` (not part of an identifier, number or comment)
    Minus,
    /// `@`
    At,

    // === Structural keywords ===
    /// `DEFINITIONS`
    KwDefinitions,
    /// `BEGIN`
    KwBegin,
    /// `END`
    KwEnd,
    /// `IMPORTS`
    KwImports,
    /// `EXPORTS`
    KwExports,
    /// `FROM`
    KwFrom,
    /// `EXPLICIT`
    KwExplicit,
    /// `IMPLICIT`
    KwImplicit,
    /// `AUTOMATIC`
    KwAutomatic,
    /// `TAGS`
    KwTags,
    /// `EXTENSIBILITY`
    KwExtensibility,
    /// `IMPLIED`
    KwImplied,
    /// `ALL`
    KwAll,
    /// `MACRO` (deprecated notation; rejected)
    KwMacro,

    // === Type keywords ===
    /// `BOOLEAN`
    KwBoolean,
    /// `INTEGER`
    KwInteger,
    /// `REAL`
    KwReal,
    /// `NULL`
    KwNull,
    /// `ENUMERATED`
    KwEnumerated,
    /// `SEQUENCE`
    KwSequence,
    /// `SET`
    KwSet,
    /// `CHOICE`
    KwChoice,
    /// `OF`
    KwOf,
    /// `OBJECT`
    KwObject,
    /// `IDENTIFIER`
    KwIdentifier,
    /// `RELATIVE-OID`
    KwRelativeOid,
    /// `OCTET`
    KwOctet,
    /// `BIT`
    KwBit,
    /// `STRING`
    KwString,
    /// `EMBEDDED`
    KwEmbedded,
    /// `PDV`
    KwPdv,
    /// `EXTERNAL`
    KwExternal,
    /// `ANY`
    KwAny,
    /// `DEFINED`
    KwDefined,
    /// `BY`
    KwBy,
    /// `ObjectDescriptor`
    KwObjectDescriptor,

    // === Restricted character string keywords ===
    /// `UTF8String`
    KwUtf8String,
    /// `IA5String`
    KwIa5String,
    /// `PrintableString`
    KwPrintableString,
    /// `NumericString`
    KwNumericString,
    /// `VisibleString`
    KwVisibleString,
    /// `GeneralString`
    KwGeneralString,
    /// `UniversalString`
    KwUniversalString,
    /// `BMPString`
    KwBmpString,
    /// `TeletexString`
    KwTeletexString,
    /// `GraphicString`
    KwGraphicString,

    // === Time type keywords ===
    /// `UTCTime`
    KwUtcTime,
    /// `GeneralizedTime`
    KwGeneralizedTime,
    /// `DATE`
    KwDate,
    /// `TIME-OF-DAY`
    KwTimeOfDay,
    /// `DATE-TIME`
    KwDateTime,

    // === Component keywords ===
    /// `OPTIONAL`
    KwOptional,
    /// `DEFAULT`
    KwDefault,
    /// `COMPONENTS`
    KwComponents,
    /// `COMPONENT`
    KwComponent,
    /// `WITH`
    KwWith,
    /// `PRESENT`
    KwPresent,
    /// `ABSENT`
    KwAbsent,

    // === Tag class keywords ===
    /// `UNIVERSAL`
    KwUniversal,
    /// `APPLICATION`
    KwApplication,
    /// `PRIVATE`
    KwPrivate,

    // === Constraint keywords ===
    /// `SIZE`
    KwSize,
    /// `CONTAINING`
    KwContaining,
    /// `ENCODED`
    KwEncoded,
    /// `MIN`
    KwMin,
    /// `MAX`
    KwMax,
    /// `INCLUDES`
    KwIncludes,
    /// `EXCEPT`
    KwExcept,
    /// `UNION`
    KwUnion,
    /// `INTERSECTION`
    KwIntersection,
    /// `PATTERN`
    KwPattern,

    // === Value keywords ===
    /// `TRUE`
    KwTrue,
    /// `FALSE`
    KwFalse,
    /// `PLUS-INFINITY`
    KwPlusInfinity,
    /// `MINUS-INFINITY`
    KwMinusInfinity,
    /// `NOT-A-NUMBER`
    KwNotANumber,
}

impl TokenKind {
    /// Check if this token can start a type notation.
    #[must_use]
    pub const fn starts_type(self) -> bool {
        matches!(
            self,
            Self::TypeReference
                | Self::KwBoolean
                | Self::KwInteger
                | Self::KwReal
                | Self::KwNull
                | Self::KwEnumerated
                | Self::KwSequence
                | Self::KwSet
                | Self::KwChoice
                | Self::KwObject
                | Self::KwRelativeOid
                | Self::KwOctet
                | Self::KwBit
                | Self::KwEmbedded
                | Self::KwExternal
                | Self::KwAny
                | Self::KwObjectDescriptor
                | Self::KwUtf8String
                | Self::KwIa5String
                | Self::KwPrintableString
                | Self::KwNumericString
                | Self::KwVisibleString
                | Self::KwGeneralString
                | Self::KwUniversalString
                | Self::KwBmpString
                | Self::KwTeletexString
                | Self::KwGraphicString
                | Self::KwUtcTime
                | Self::KwGeneralizedTime
                | Self::KwDate
                | Self::KwTimeOfDay
                | Self::KwDateTime
                | Self::LBracket
        )
    }

    /// Check if this token is a restricted character string keyword.
    #[must_use]
    pub const fn is_character_string(self) -> bool {
        matches!(
            self,
            Self::KwUtf8String
                | Self::KwIa5String
                | Self::KwPrintableString
                | Self::KwNumericString
                | Self::KwVisibleString
                | Self::KwGeneralString
                | Self::KwUniversalString
                | Self::KwBmpString
                | Self::KwTeletexString
                | Self::KwGraphicString
        )
    }
}
