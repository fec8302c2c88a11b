//! Cross-codec properties: round trips, DER canonicality, parameterization
//! reduction, and the textual adapters.

use asnkit_core::{compile, Codec, Options, Schema, Source, Value};

const WIRE_CODECS: &[Codec] = &[
    Codec::Ber,
    Codec::Der,
    Codec::Cer,
    Codec::Oer,
    Codec::Per,
    Codec::Uper,
    Codec::Jer,
    Codec::Xer,
];

fn schema_with(codec: Codec, asn: &str, numeric_enums: bool) -> Schema {
    compile(
        &[Source::new("test.asn", asn)],
        Options {
            codec,
            numeric_enums,
        },
    )
    .expect("compiles")
}

fn seq(members: &[(&str, Value)]) -> Value {
    Value::Sequence(
        members
            .iter()
            .map(|(n, v)| ((*n).to_string(), v.clone()))
            .collect(),
    )
}

fn assert_round_trip(codec: Codec, asn: &str, ty: &str, v: &Value) {
    let s = schema_with(codec, asn, false);
    let bytes = s
        .encode(ty, v)
        .unwrap_or_else(|e| panic!("{codec:?} encode failed: {e}"));
    let decoded = s
        .decode(ty, &bytes)
        .unwrap_or_else(|e| panic!("{codec:?} decode of {bytes:02x?} failed: {e}"));
    let refreshed = s.refresh(ty, v).expect("refresh");
    assert_eq!(decoded, refreshed, "{codec:?} round trip over {bytes:02x?}");
}

#[test]
fn round_trip_under_every_codec() {
    let asn = "Demo DEFINITIONS ::= BEGIN \
               Record ::= SEQUENCE { \
                   flag BOOLEAN, \
                   count INTEGER (0..1000), \
                   label IA5String, \
                   payload OCTET STRING, \
                   mode ENUMERATED { idle(0), busy(1) }, \
                   extra [0] INTEGER OPTIONAL, \
                   scale INTEGER DEFAULT 10, \
                   items SEQUENCE OF INTEGER (0..7) } \
               END";
    let value = seq(&[
        ("flag", Value::Boolean(true)),
        ("count", Value::int(700)),
        ("label", Value::Text("demo".into())),
        ("payload", Value::Bytes(vec![0xde, 0xad])),
        ("mode", Value::Text("busy".into())),
        ("scale", Value::int(11)),
        (
            "items",
            Value::List(vec![Value::int(1), Value::int(2), Value::int(7)]),
        ),
    ]);
    for &codec in WIRE_CODECS {
        assert_round_trip(codec, asn, "Record", &value);
    }
    // With `extra` present and `scale` defaulted.
    let value = seq(&[
        ("flag", Value::Boolean(false)),
        ("count", Value::int(0)),
        ("label", Value::Text("x".into())),
        ("payload", Value::Bytes(vec![])),
        ("mode", Value::Text("idle".into())),
        ("extra", Value::int(-42)),
        ("items", Value::List(vec![])),
    ]);
    for &codec in WIRE_CODECS {
        assert_round_trip(codec, asn, "Record", &value);
    }
}

#[test]
fn parameterization_reduces_to_hand_expansion() {
    // Spec scenario: A { INTEGER } is wire-identical to the hand-written
    // equivalent.
    let asn = "M DEFINITIONS ::= BEGIN \
               A { B } ::= SEQUENCE { a B } \
               A-Integer ::= A { INTEGER } \
               Plain ::= SEQUENCE { a INTEGER } \
               END";
    let v = seq(&[("a", Value::int(1))]);
    for &codec in &[Codec::Ber, Codec::Uper, Codec::Oer] {
        let s = schema_with(codec, asn, false);
        let instantiated = s.encode("A-Integer", &v).unwrap();
        let plain = s.encode("Plain", &v).unwrap();
        assert_eq!(instantiated, plain, "{codec:?}");
    }
}

#[test]
fn der_is_byte_stable() {
    let asn = "M DEFINITIONS ::= BEGIN \
               T ::= SET { b [1] IMPLICIT INTEGER, a [0] IMPLICIT BOOLEAN } \
               END";
    let s = schema_with(Codec::Der, asn, false);
    let v = seq(&[("b", Value::int(7)), ("a", Value::Boolean(true))]);
    let first = s.encode("T", &v).unwrap();
    let second = s.encode("T", &v).unwrap();
    assert_eq!(first, second);
    // Re-encoding a decoded value reproduces the input octets.
    let decoded = s.decode("T", &first).unwrap();
    assert_eq!(s.encode("T", &decoded).unwrap(), first);
}

#[test]
fn recursive_type_re_encodes_byte_for_byte() {
    let asn = "M DEFINITIONS ::= BEGIN \
               Tree ::= SEQUENCE { children SEQUENCE OF Tree OPTIONAL } \
               END";
    let leaf = seq(&[]);
    let tree = seq(&[(
        "children",
        Value::List(vec![
            seq(&[("children", Value::List(vec![leaf.clone()]))]),
            leaf.clone(),
        ]),
    )]);
    for &codec in &[Codec::Der, Codec::Uper, Codec::Oer] {
        let s = schema_with(codec, asn, false);
        let bytes = s.encode("Tree", &tree).unwrap();
        let decoded = s.decode("Tree", &bytes).unwrap();
        assert_eq!(s.encode("Tree", &decoded).unwrap(), bytes, "{codec:?}");
    }
}

#[test]
fn cross_module_types_round_trip() {
    let sources = [
        Source::new(
            "a.asn",
            "A DEFINITIONS ::= BEGIN \
             IMPORTS Inner FROM B; \
             Outer ::= SEQUENCE { inner Inner } \
             END",
        ),
        Source::new(
            "b.asn",
            "B DEFINITIONS ::= BEGIN \
             Inner ::= SEQUENCE { n INTEGER } \
             END",
        ),
    ];
    let s = compile(
        &sources,
        Options {
            codec: Codec::Der,
            numeric_enums: false,
        },
    )
    .expect("compiles");
    let v = seq(&[("inner", seq(&[("n", Value::int(3))]))]);
    let bytes = s.encode("Outer", &v).unwrap();
    assert_eq!(s.decode("A.Outer", &bytes).unwrap(), v);
}

#[test]
fn jer_layout() {
    let asn = "M DEFINITIONS ::= BEGIN \
               T ::= SEQUENCE { a INTEGER, b IA5String, c CHOICE { x BOOLEAN, y INTEGER } } \
               END";
    let s = schema_with(Codec::Jer, asn, false);
    let v = seq(&[
        ("a", Value::int(5)),
        ("b", Value::Text("hey".into())),
        ("c", Value::Choice("x".into(), Box::new(Value::Boolean(true)))),
    ]);
    let bytes = s.encode("T", &v).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["a"], 5);
    assert_eq!(json["b"], "hey");
    assert_eq!(json["c"]["x"], true);
    assert_eq!(s.decode("T", &bytes).unwrap(), v);
}

#[test]
fn jer_bit_string_object() {
    let s = schema_with(
        Codec::Jer,
        "M DEFINITIONS ::= BEGIN T ::= BIT STRING END",
        false,
    );
    let v = Value::BitString(asnkit_core::BitString::from_bits("10100000101"));
    let bytes = s.encode("T", &v).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["length"], 11);
    assert_eq!(s.decode("T", &bytes).unwrap(), v);
}

#[test]
fn xer_layout() {
    let asn = "M DEFINITIONS ::= BEGIN \
               T ::= SEQUENCE { a INTEGER, flag BOOLEAN } \
               END";
    let s = schema_with(Codec::Xer, asn, false);
    let v = seq(&[("a", Value::int(5)), ("flag", Value::Boolean(true))]);
    let bytes = s.encode("T", &v).unwrap();
    let text = core::str::from_utf8(&bytes).unwrap();
    assert_eq!(text, "<T><a>5</a><flag><true/></flag></T>");
    assert_eq!(s.decode("T", &bytes).unwrap(), v);
}

#[test]
fn gser_is_encode_only() {
    let asn = "M DEFINITIONS ::= BEGIN \
               T ::= SEQUENCE { a INTEGER, b IA5String, c BIT STRING } \
               END";
    let s = schema_with(Codec::Gser, asn, false);
    let v = seq(&[
        ("a", Value::int(5)),
        ("b", Value::Text("hey".into())),
        ("c", Value::BitString(asnkit_core::BitString::from_bits("101"))),
    ]);
    let bytes = s.encode("T", &v).unwrap();
    assert_eq!(
        core::str::from_utf8(&bytes).unwrap(),
        "{ a 5, b \"hey\", c '101'B }"
    );
    let err = s.decode("T", &bytes).unwrap_err();
    assert_eq!(err.kind, asnkit_core::DecodeErrorKind::UnsupportedCodec);
}

#[test]
fn numeric_enums_option() {
    let asn = "M DEFINITIONS ::= BEGIN E ::= ENUMERATED { red(0), green(1) } END";
    let s = schema_with(Codec::Ber, asn, true);
    let bytes = s.encode("E", &Value::Text("green".into())).unwrap();
    assert_eq!(s.decode("E", &bytes).unwrap(), Value::int(1));
    // Numeric input works in both modes.
    assert_eq!(s.encode("E", &Value::int(1)).unwrap(), bytes);
}

#[test]
fn refresh_fills_defaults() {
    let asn = "M DEFINITIONS ::= BEGIN \
               T ::= SEQUENCE { a INTEGER DEFAULT 7, b SEQUENCE { c BOOLEAN DEFAULT TRUE } } \
               END";
    let s = schema_with(Codec::Ber, asn, false);
    let sparse = seq(&[("b", seq(&[]))]);
    let full = s.refresh("T", &sparse).unwrap();
    assert_eq!(
        full,
        seq(&[
            ("a", Value::int(7)),
            ("b", seq(&[("c", Value::Boolean(true))])),
        ])
    );
}

#[test]
fn automatic_tags_round_trip() {
    let asn = "M DEFINITIONS AUTOMATIC TAGS ::= BEGIN \
               T ::= SEQUENCE { \
                   a INTEGER OPTIONAL, \
                   b BOOLEAN OPTIONAL, \
                   c CHOICE { x INTEGER, y BOOLEAN } } \
               END";
    let v = seq(&[
        ("b", Value::Boolean(false)),
        ("c", Value::Choice("y".into(), Box::new(Value::Boolean(true)))),
    ]);
    for &codec in &[Codec::Ber, Codec::Der, Codec::Uper, Codec::Oer] {
        assert_round_trip(codec, asn, "T", &v);
    }
}

#[test]
fn value_references_in_constraints() {
    let asn = "M DEFINITIONS ::= BEGIN \
               max-count INTEGER ::= 10 \
               T ::= INTEGER (1..max-count) \
               END";
    let s = schema_with(Codec::Uper, asn, false);
    // Range 1..10 fits in 4 bits.
    assert_eq!(s.encode("T", &Value::int(3)).unwrap(), [0x20]);
    assert!(s.encode("T", &Value::int(11)).is_err());
}

#[test]
fn lint_reports_problems_without_failing() {
    let messages = asnkit_core::lint(&[Source::new(
        "bad.asn",
        "M DEFINITIONS ::= BEGIN A ::= Missing B ::= AlsoMissing END",
    )]);
    assert!(messages.iter().any(|m| m.contains("Missing")));
    assert!(messages.iter().any(|m| m.contains("AlsoMissing")));
}

#[test]
fn syntax_error_carries_position() {
    let err = compile(
        &[Source::new("broken.asn", "M DEFINITIONS ::= BEGIN\nT ::= SEQUENC { }\nEND")],
        Options::default(),
    )
    .unwrap_err();
    let asnkit_core::CompileError::Syntax(syntax) = err else {
        panic!("expected a syntax error");
    };
    assert_eq!(syntax.label, "broken.asn");
    assert_eq!(syntax.line, 2);
}
