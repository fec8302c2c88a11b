//! Keyword lookup table.
//!
//! Uses a sorted static array with binary search for `no_std` compatibility.

use super::TokenKind;

/// Keyword entry mapping text to token kind.
struct KeywordEntry {
    text: &'static str,
    kind: TokenKind,
}

macro_rules! kw {
    ($text:literal, $kind:ident) => {
        KeywordEntry {
            text: $text,
            kind: TokenKind::$kind,
        }
    };
}

/// Sorted keyword table for binary search.
///
/// IMPORTANT: This table MUST be sorted by ASCII byte order (uppercase
/// letters sort before lowercase). The test `test_keywords_sorted` verifies
/// this at test time.
static KEYWORDS: &[KeywordEntry] = &[
    kw!("ABSENT", KwAbsent),
    kw!("ALL", KwAll),
    kw!("ANY", KwAny),
    kw!("APPLICATION", KwApplication),
    kw!("AUTOMATIC", KwAutomatic),
    kw!("BEGIN", KwBegin),
    kw!("BIT", KwBit),
    kw!("BMPString", KwBmpString),
    kw!("BOOLEAN", KwBoolean),
    kw!("BY", KwBy),
    kw!("CHOICE", KwChoice),
    kw!("COMPONENT", KwComponent),
    kw!("COMPONENTS", KwComponents),
    kw!("CONTAINING", KwContaining),
    kw!("DATE", KwDate),
    kw!("DATE-TIME", KwDateTime),
    kw!("DEFAULT", KwDefault),
    kw!("DEFINED", KwDefined),
    kw!("DEFINITIONS", KwDefinitions),
    kw!("EMBEDDED", KwEmbedded),
    kw!("ENCODED", KwEncoded),
    kw!("END", KwEnd),
    kw!("ENUMERATED", KwEnumerated),
    kw!("EXCEPT", KwExcept),
    kw!("EXPLICIT", KwExplicit),
    kw!("EXPORTS", KwExports),
    kw!("EXTENSIBILITY", KwExtensibility),
    kw!("EXTERNAL", KwExternal),
    kw!("FALSE", KwFalse),
    kw!("FROM", KwFrom),
    kw!("GeneralString", KwGeneralString),
    kw!("GeneralizedTime", KwGeneralizedTime),
    kw!("GraphicString", KwGraphicString),
    kw!("IA5String", KwIa5String),
    kw!("IDENTIFIER", KwIdentifier),
    kw!("IMPLICIT", KwImplicit),
    kw!("IMPLIED", KwImplied),
    kw!("IMPORTS", KwImports),
    kw!("INCLUDES", KwIncludes),
    kw!("INTEGER", KwInteger),
    kw!("INTERSECTION", KwIntersection),
    kw!("MACRO", KwMacro),
    kw!("MAX", KwMax),
    kw!("MIN", KwMin),
    kw!("MINUS-INFINITY", KwMinusInfinity),
    kw!("NOT-A-NUMBER", KwNotANumber),
    kw!("NULL", KwNull),
    kw!("NumericString", KwNumericString),
    kw!("OBJECT", KwObject),
    kw!("OCTET", KwOctet),
    kw!("OF", KwOf),
    kw!("OPTIONAL", KwOptional),
    kw!("ObjectDescriptor", KwObjectDescriptor),
    kw!("PATTERN", KwPattern),
    kw!("PDV", KwPdv),
    kw!("PLUS-INFINITY", KwPlusInfinity),
    kw!("PRESENT", KwPresent),
    kw!("PRIVATE", KwPrivate),
    kw!("PrintableString", KwPrintableString),
    kw!("REAL", KwReal),
    kw!("RELATIVE-OID", KwRelativeOid),
    kw!("SEQUENCE", KwSequence),
    kw!("SET", KwSet),
    kw!("SIZE", KwSize),
    kw!("STRING", KwString),
    kw!("TAGS", KwTags),
    kw!("TIME-OF-DAY", KwTimeOfDay),
    kw!("TRUE", KwTrue),
    kw!("TeletexString", KwTeletexString),
    kw!("UNION", KwUnion),
    kw!("UNIVERSAL", KwUniversal),
    kw!("UTCTime", KwUtcTime),
    kw!("UTF8String", KwUtf8String),
    kw!("UniversalString", KwUniversalString),
    kw!("VisibleString", KwVisibleString),
    kw!("WITH", KwWith),
];

/// Look up a keyword by its text.
///
/// Returns `None` if the text is not a reserved word.
#[must_use]
pub fn lookup_keyword(text: &str) -> Option<TokenKind> {
    KEYWORDS
        .binary_search_by(|entry| entry.text.cmp(text))
        .ok()
        .map(|idx| KEYWORDS[idx].kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_sorted() {
        for pair in KEYWORDS.windows(2) {
            assert!(
                pair[0].text < pair[1].text,
                "keyword table out of order: {} >= {}",
                pair[0].text,
                pair[1].text
            );
        }
    }

    #[test]
    fn test_lookup_hits() {
        assert_eq!(lookup_keyword("SEQUENCE"), Some(TokenKind::KwSequence));
        assert_eq!(lookup_keyword("UTF8String"), Some(TokenKind::KwUtf8String));
        assert_eq!(
            lookup_keyword("MINUS-INFINITY"),
            Some(TokenKind::KwMinusInfinity)
        );
        assert_eq!(lookup_keyword("TIME-OF-DAY"), Some(TokenKind::KwTimeOfDay));
    }

    #[test]
    fn test_lookup_misses() {
        assert_eq!(lookup_keyword("Sequence"), None);
        assert_eq!(lookup_keyword("MyType"), None);
        assert_eq!(lookup_keyword("size"), None);
    }
}
