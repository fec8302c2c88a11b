//! BER/DER/CER wire-format tests against X.690 octet vectors.

use asnkit_core::{compile, Codec, DecodeErrorKind, Options, Schema, Source, Value};
use num_bigint::BigInt;

fn schema(codec: Codec, asn: &str) -> Schema {
    compile(
        &[Source::new("test.asn", asn)],
        Options {
            codec,
            numeric_enums: false,
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

#[test]
fn boolean_vectors() {
    let s = schema(Codec::Ber, "M DEFINITIONS ::= BEGIN T ::= BOOLEAN END");
    assert_eq!(s.encode("T", &Value::Boolean(true)).unwrap(), [0x01, 0x01, 0xff]);
    assert_eq!(s.encode("T", &Value::Boolean(false)).unwrap(), [0x01, 0x01, 0x00]);
    assert_eq!(s.decode("T", &[0x01, 0x01, 0xff]).unwrap(), Value::Boolean(true));
    // BER accepts any non-zero contents octet as TRUE.
    assert_eq!(s.decode("T", &[0x01, 0x01, 0x01]).unwrap(), Value::Boolean(true));

    let der = schema(Codec::Der, "M DEFINITIONS ::= BEGIN T ::= BOOLEAN END");
    assert_eq!(der.encode("T", &Value::Boolean(true)).unwrap(), [0x01, 0x01, 0xff]);
    assert!(der.decode("T", &[0x01, 0x01, 0x01]).is_err());
}

#[test]
fn integer_sign_vectors() {
    let s = schema(Codec::Ber, "M DEFINITIONS ::= BEGIN T ::= INTEGER END");
    assert_eq!(s.encode("T", &Value::int(127)).unwrap(), [0x02, 0x01, 0x7f]);
    assert_eq!(s.encode("T", &Value::int(128)).unwrap(), [0x02, 0x02, 0x00, 0x80]);
    assert_eq!(s.encode("T", &Value::int(-128)).unwrap(), [0x02, 0x01, 0x80]);
    assert_eq!(s.encode("T", &Value::int(0)).unwrap(), [0x02, 0x01, 0x00]);
    assert_eq!(s.decode("T", &[0x02, 0x02, 0x00, 0x80]).unwrap(), Value::int(128));
}

#[test]
fn large_integer_round_trip() {
    let s = schema(Codec::Der, "M DEFINITIONS ::= BEGIN T ::= INTEGER END");
    let big: BigInt = "123456789012345678901234567890".parse().unwrap();
    let bytes = s.encode("T", &Value::Integer(big.clone())).unwrap();
    assert_eq!(s.decode("T", &bytes).unwrap(), Value::Integer(big));
}

#[test]
fn sequence_with_optional() {
    let s = schema(
        Codec::Ber,
        "M DEFINITIONS ::= BEGIN T ::= SEQUENCE { a INTEGER, b BOOLEAN OPTIONAL } END",
    );
    assert_eq!(
        s.encode("T", &seq(&[("a", Value::int(5))])).unwrap(),
        [0x30, 0x03, 0x02, 0x01, 0x05]
    );
    assert_eq!(
        s.encode("T", &seq(&[("a", Value::int(5)), ("b", Value::Boolean(true))]))
            .unwrap(),
        [0x30, 0x06, 0x02, 0x01, 0x05, 0x01, 0x01, 0xff]
    );
    assert_eq!(
        s.decode("T", &[0x30, 0x03, 0x02, 0x01, 0x05]).unwrap(),
        seq(&[("a", Value::int(5))])
    );
}

#[test]
fn implicit_and_explicit_tags() {
    let s = schema(
        Codec::Ber,
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a [0] IMPLICIT INTEGER, b [1] EXPLICIT BOOLEAN } \
         END",
    );
    let v = seq(&[("a", Value::int(5)), ("b", Value::Boolean(true))]);
    let bytes = s.encode("T", &v).unwrap();
    assert_eq!(
        bytes,
        [0x30, 0x08, 0x80, 0x01, 0x05, 0xa1, 0x03, 0x01, 0x01, 0xff]
    );
    assert_eq!(s.decode("T", &bytes).unwrap(), v);
}

#[test]
fn high_tag_number_form() {
    let s = schema(
        Codec::Ber,
        "M DEFINITIONS ::= BEGIN T ::= [APPLICATION 31] IMPLICIT INTEGER END",
    );
    let bytes = s.encode("T", &Value::int(5)).unwrap();
    assert_eq!(bytes, [0x5f, 0x1f, 0x01, 0x05]);
    assert_eq!(s.decode("T", &bytes).unwrap(), Value::int(5));
}

#[test]
fn der_sorts_set_members_by_tag() {
    let asn = "M DEFINITIONS ::= BEGIN \
               T ::= SET { b [1] IMPLICIT INTEGER, a [0] IMPLICIT INTEGER } \
               END";
    let v = seq(&[("b", Value::int(2)), ("a", Value::int(1))]);

    let der = schema(Codec::Der, asn);
    assert_eq!(
        der.encode("T", &v).unwrap(),
        [0x31, 0x06, 0x80, 0x01, 0x01, 0x81, 0x01, 0x02]
    );

    let ber = schema(Codec::Ber, asn);
    assert_eq!(
        ber.encode("T", &v).unwrap(),
        [0x31, 0x06, 0x81, 0x01, 0x02, 0x80, 0x01, 0x01]
    );
    // Either order decodes.
    let decoded = ber
        .decode("T", &[0x31, 0x06, 0x80, 0x01, 0x01, 0x81, 0x01, 0x02])
        .unwrap();
    assert_eq!(decoded, seq(&[("b", Value::int(2)), ("a", Value::int(1))]));
}

#[test]
fn der_sorts_set_of_elements() {
    let asn = "M DEFINITIONS ::= BEGIN T ::= SET OF INTEGER END";
    let v = Value::List(vec![Value::int(300), Value::int(2)]);
    let der = schema(Codec::Der, asn);
    // 02 01 02 sorts before 02 02 01 2C.
    assert_eq!(
        der.encode("T", &v).unwrap(),
        [0x31, 0x07, 0x02, 0x01, 0x02, 0x02, 0x02, 0x01, 0x2c]
    );
}

#[test]
fn object_identifier_vector() {
    let s = schema(Codec::Der, "M DEFINITIONS ::= BEGIN T ::= OBJECT IDENTIFIER END");
    let v = Value::ObjectIdentifier(vec![1, 2, 840, 113549]);
    let bytes = s.encode("T", &v).unwrap();
    assert_eq!(bytes, [0x06, 0x06, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d]);
    assert_eq!(s.decode("T", &bytes).unwrap(), v);
}

#[test]
fn bit_string_unused_bits() {
    let s = schema(Codec::Ber, "M DEFINITIONS ::= BEGIN T ::= BIT STRING END");
    let v = Value::BitString(asnkit_core::BitString::from_bits("101"));
    let bytes = s.encode("T", &v).unwrap();
    assert_eq!(bytes, [0x03, 0x02, 0x05, 0xa0]);
    assert_eq!(s.decode("T", &bytes).unwrap(), v);
}

#[test]
fn enumerated_by_name() {
    let s = schema(
        Codec::Ber,
        "M DEFINITIONS ::= BEGIN E ::= ENUMERATED { red(0), green(1) } END",
    );
    let bytes = s.encode("E", &Value::Text("green".into())).unwrap();
    assert_eq!(bytes, [0x0a, 0x01, 0x01]);
    assert_eq!(s.decode("E", &bytes).unwrap(), Value::Text("green".into()));
}

#[test]
fn utf8_string_contents() {
    let s = schema(Codec::Ber, "M DEFINITIONS ::= BEGIN T ::= UTF8String END");
    let bytes = s.encode("T", &Value::Text("hi".into())).unwrap();
    assert_eq!(bytes, [0x0c, 0x02, 0x68, 0x69]);
}

#[test]
fn defaults_omitted_and_restored() {
    let s = schema(
        Codec::Der,
        "M DEFINITIONS ::= BEGIN T ::= SEQUENCE { a INTEGER DEFAULT 7 } END",
    );
    assert_eq!(s.encode("T", &seq(&[])).unwrap(), [0x30, 0x00]);
    assert_eq!(s.encode("T", &seq(&[("a", Value::int(7))])).unwrap(), [0x30, 0x00]);
    // Decode restores the default.
    assert_eq!(
        s.decode("T", &[0x30, 0x00]).unwrap(),
        seq(&[("a", Value::int(7))])
    );
    // A non-default value is carried.
    let bytes = s.encode("T", &seq(&[("a", Value::int(8))])).unwrap();
    assert_eq!(bytes, [0x30, 0x03, 0x02, 0x01, 0x08]);
}

#[test]
fn indefinite_length_accepted_in_ber_only() {
    let asn = "M DEFINITIONS ::= BEGIN T ::= SEQUENCE { a INTEGER } END";
    let encoded = [0x30, 0x80, 0x02, 0x01, 0x05, 0x00, 0x00];

    let ber = schema(Codec::Ber, asn);
    assert_eq!(ber.decode("T", &encoded).unwrap(), seq(&[("a", Value::int(5))]));

    let der = schema(Codec::Der, asn);
    let err = der.decode("T", &encoded).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::IndefiniteInDer);
}

#[test]
fn cer_uses_indefinite_for_constructed() {
    let cer = schema(
        Codec::Cer,
        "M DEFINITIONS ::= BEGIN T ::= SEQUENCE { a INTEGER } END",
    );
    let bytes = cer.encode("T", &seq(&[("a", Value::int(5))])).unwrap();
    assert_eq!(bytes, [0x30, 0x80, 0x02, 0x01, 0x05, 0x00, 0x00]);
    assert_eq!(cer.decode("T", &bytes).unwrap(), seq(&[("a", Value::int(5))]));
}

#[test]
fn constraint_violation_on_decode() {
    // Spec scenario: 02 01 7F against INTEGER (0..100).
    let s = schema(Codec::Ber, "M DEFINITIONS ::= BEGIN T ::= INTEGER (0..100) END");
    let err = s.decode("T", &[0x02, 0x01, 0x7f]).unwrap_err();
    assert!(matches!(err.kind, DecodeErrorKind::ConstraintViolation { .. }));
    // In range decodes fine.
    assert_eq!(s.decode("T", &[0x02, 0x01, 0x64]).unwrap(), Value::int(100));
}

#[test]
fn constraint_violation_on_encode() {
    let s = schema(Codec::Ber, "M DEFINITIONS ::= BEGIN T ::= INTEGER (0..100) END");
    assert!(s.encode("T", &Value::int(127)).is_err());
}

#[test]
fn trailing_data_rejected() {
    let s = schema(Codec::Ber, "M DEFINITIONS ::= BEGIN T ::= BOOLEAN END");
    let err = s.decode("T", &[0x01, 0x01, 0xff, 0xff]).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::TrailingData);
    // decode_with_length reports the consumed prefix instead.
    let (value, consumed) = s.decode_with_length("T", &[0x01, 0x01, 0xff, 0xff]).unwrap();
    assert_eq!(value, Value::Boolean(true));
    assert_eq!(consumed, 3);
}

#[test]
fn truncated_length_is_out_of_buffer() {
    let s = schema(Codec::Ber, "M DEFINITIONS ::= BEGIN T ::= OCTET STRING END");
    // Claims 0x7f contents octets with only two present.
    let err = s.decode("T", &[0x04, 0x7f, 0x00, 0x00]).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::OutOfBuffer);
}

#[test]
fn unknown_extension_members_skipped() {
    let extensible = "M DEFINITIONS ::= BEGIN T ::= SEQUENCE { a INTEGER, ... } END";
    let s = schema(Codec::Ber, extensible);
    // A trailing unknown [0] member is ignored.
    let bytes = [0x30, 0x06, 0x02, 0x01, 0x05, 0x80, 0x01, 0xaa];
    assert_eq!(s.decode("T", &bytes).unwrap(), seq(&[("a", Value::int(5))]));

    let closed = "M DEFINITIONS ::= BEGIN T ::= SEQUENCE { a INTEGER } END";
    let s = schema(Codec::Ber, closed);
    assert!(s.decode("T", &bytes).is_err());
}

#[test]
fn choice_decodes_by_tag() {
    let s = schema(
        Codec::Ber,
        "M DEFINITIONS ::= BEGIN C ::= CHOICE { a INTEGER, b BOOLEAN } END",
    );
    let v = Value::Choice("b".into(), Box::new(Value::Boolean(true)));
    let bytes = s.encode("C", &v).unwrap();
    assert_eq!(bytes, [0x01, 0x01, 0xff]);
    assert_eq!(s.decode("C", &bytes).unwrap(), v);
}

#[test]
fn real_vectors() {
    let s = schema(Codec::Der, "M DEFINITIONS ::= BEGIN T ::= REAL END");
    assert_eq!(s.encode("T", &Value::Real(0.0)).unwrap(), [0x09, 0x00]);
    assert_eq!(
        s.encode("T", &Value::Real(1.0)).unwrap(),
        [0x09, 0x03, 0x80, 0x00, 0x01]
    );
    assert_eq!(s.encode("T", &Value::Real(f64::INFINITY)).unwrap(), [0x09, 0x01, 0x40]);
    for v in [1.0f64, -0.5, 3.25, 1e9] {
        let bytes = s.encode("T", &Value::Real(v)).unwrap();
        assert_eq!(s.decode("T", &bytes).unwrap(), Value::Real(v));
    }
}
