//! OER wire-format tests against X.696 octet layouts.

use asnkit_core::{compile, Codec, Options, Schema, Source, Value};

fn schema(asn: &str) -> Schema {
    compile(
        &[Source::new("test.asn", asn)],
        Options {
            codec: Codec::Oer,
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
fn boolean_one_octet() {
    let s = schema("M DEFINITIONS ::= BEGIN T ::= BOOLEAN END");
    assert_eq!(s.encode("T", &Value::Boolean(true)).unwrap(), [0xff]);
    assert_eq!(s.encode("T", &Value::Boolean(false)).unwrap(), [0x00]);
    assert_eq!(s.decode("T", &[0x01]).unwrap(), Value::Boolean(true));
}

#[test]
fn unconstrained_integer_length_prefixed() {
    let s = schema("M DEFINITIONS ::= BEGIN T ::= INTEGER END");
    assert_eq!(s.encode("T", &Value::int(5)).unwrap(), [0x01, 0x05]);
    assert_eq!(s.encode("T", &Value::int(-1)).unwrap(), [0x01, 0xff]);
    assert_eq!(s.encode("T", &Value::int(256)).unwrap(), [0x02, 0x01, 0x00]);
    assert_eq!(s.decode("T", &[0x02, 0x01, 0x00]).unwrap(), Value::int(256));
}

#[test]
fn fixed_width_unsigned_integers() {
    let one = schema("M DEFINITIONS ::= BEGIN T ::= INTEGER (0..255) END");
    assert_eq!(one.encode("T", &Value::int(5)).unwrap(), [0x05]);
    assert_eq!(one.decode("T", &[0x05]).unwrap(), Value::int(5));

    let two = schema("M DEFINITIONS ::= BEGIN T ::= INTEGER (0..65535) END");
    assert_eq!(two.encode("T", &Value::int(256)).unwrap(), [0x01, 0x00]);

    let four = schema("M DEFINITIONS ::= BEGIN T ::= INTEGER (0..4294967295) END");
    assert_eq!(
        four.encode("T", &Value::int(1)).unwrap(),
        [0x00, 0x00, 0x00, 0x01]
    );
    assert_eq!(
        four.decode("T", &[0x00, 0x00, 0x00, 0x01]).unwrap(),
        Value::int(1)
    );
}

#[test]
fn fixed_width_signed_integers() {
    let s = schema("M DEFINITIONS ::= BEGIN T ::= INTEGER (-128..127) END");
    assert_eq!(s.encode("T", &Value::int(-1)).unwrap(), [0xff]);
    assert_eq!(s.decode("T", &[0xff]).unwrap(), Value::int(-1));

    let wide = schema("M DEFINITIONS ::= BEGIN T ::= INTEGER (-32768..32767) END");
    assert_eq!(wide.encode("T", &Value::int(-2)).unwrap(), [0xff, 0xfe]);
}

#[test]
fn sequence_preamble_bits() {
    let s = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER (0..255), b BOOLEAN OPTIONAL } \
         END",
    );
    assert_eq!(
        s.encode("T", &seq(&[("a", Value::int(5)), ("b", Value::Boolean(true))]))
            .unwrap(),
        [0x80, 0x05, 0xff]
    );
    assert_eq!(s.encode("T", &seq(&[("a", Value::int(5))])).unwrap(), [0x00, 0x05]);
    assert_eq!(
        s.decode("T", &[0x00, 0x05]).unwrap(),
        seq(&[("a", Value::int(5))])
    );
}

#[test]
fn sequence_without_preamble() {
    let s = schema("M DEFINITIONS ::= BEGIN T ::= SEQUENCE { a INTEGER (0..255) } END");
    // No optional members and no extensibility: no preamble octet at all.
    assert_eq!(s.encode("T", &seq(&[("a", Value::int(9))])).unwrap(), [0x09]);
}

#[test]
fn choice_selected_by_tag() {
    let s = schema("M DEFINITIONS ::= BEGIN C ::= CHOICE { a INTEGER, b BOOLEAN } END");
    let v = Value::Choice("b".into(), Box::new(Value::Boolean(true)));
    // BOOLEAN is UNIVERSAL 1: tag octet 0x01, then the value.
    assert_eq!(s.encode("C", &v).unwrap(), [0x01, 0xff]);
    assert_eq!(s.decode("C", &[0x01, 0xff]).unwrap(), v);

    let tagged = schema(
        "M DEFINITIONS ::= BEGIN C ::= CHOICE { a [0] IMPLICIT INTEGER, b [1] IMPLICIT BOOLEAN } END",
    );
    let v = Value::Choice("a".into(), Box::new(Value::int(3)));
    // Context class bits 10, number 0: 0x80.
    assert_eq!(tagged.encode("C", &v).unwrap(), [0x80, 0x01, 0x03]);
    assert_eq!(tagged.decode("C", &[0x80, 0x01, 0x03]).unwrap(), v);
}

#[test]
fn sequence_of_quantity() {
    let s = schema("M DEFINITIONS ::= BEGIN L ::= SEQUENCE OF INTEGER END");
    let v = Value::List(vec![Value::int(1), Value::int(2)]);
    assert_eq!(
        s.encode("L", &v).unwrap(),
        [0x01, 0x02, 0x01, 0x01, 0x01, 0x02]
    );
    assert_eq!(
        s.decode("L", &[0x01, 0x02, 0x01, 0x01, 0x01, 0x02]).unwrap(),
        v
    );
}

#[test]
fn enumerated_short_form() {
    let s = schema("M DEFINITIONS ::= BEGIN E ::= ENUMERATED { red(0), green(1) } END");
    assert_eq!(s.encode("E", &Value::Text("green".into())).unwrap(), [0x01]);
    assert_eq!(s.decode("E", &[0x01]).unwrap(), Value::Text("green".into()));
}

#[test]
fn octet_and_bit_strings() {
    let s = schema("M DEFINITIONS ::= BEGIN T ::= OCTET STRING END");
    assert_eq!(
        s.encode("T", &Value::Bytes(vec![0xab, 0xcd])).unwrap(),
        [0x02, 0xab, 0xcd]
    );

    let fixed = schema("M DEFINITIONS ::= BEGIN T ::= OCTET STRING (SIZE (2)) END");
    assert_eq!(
        fixed.encode("T", &Value::Bytes(vec![0xab, 0xcd])).unwrap(),
        [0xab, 0xcd]
    );
    assert_eq!(
        fixed.decode("T", &[0xab, 0xcd]).unwrap(),
        Value::Bytes(vec![0xab, 0xcd])
    );

    let bits = schema("M DEFINITIONS ::= BEGIN T ::= BIT STRING END");
    let v = Value::BitString(asnkit_core::BitString::from_bits("101"));
    assert_eq!(bits.encode("T", &v).unwrap(), [0x02, 0x05, 0xa0]);
    assert_eq!(bits.decode("T", &[0x02, 0x05, 0xa0]).unwrap(), v);
}

#[test]
fn extensible_sequence_skippable_addition() {
    let s = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER (0..255), ..., b BOOLEAN } \
         END",
    );
    let root_only = seq(&[("a", Value::int(5))]);
    // Extension bit clear in the preamble.
    assert_eq!(s.encode("T", &root_only).unwrap(), [0x00, 0x05]);
    assert_eq!(s.decode("T", &[0x00, 0x05]).unwrap(), root_only);

    let with_ext = seq(&[("a", Value::int(5)), ("b", Value::Boolean(true))]);
    let bytes = s.encode("T", &with_ext).unwrap();
    // Preamble: extension bit set; then a; then bitmap 02 07 80 and the
    // one-octet open type.
    assert_eq!(bytes, [0x80, 0x05, 0x02, 0x07, 0x80, 0x01, 0xff]);
    assert_eq!(s.decode("T", &bytes).unwrap(), with_ext);
}

#[test]
fn constraint_violation_detected() {
    let s = schema("M DEFINITIONS ::= BEGIN T ::= INTEGER (0..100) END");
    assert!(s.encode("T", &Value::int(127)).is_err());
    assert!(s.decode("T", &[0x7f]).is_err());
}

#[test]
fn truncated_input_is_out_of_buffer() {
    let s = schema("M DEFINITIONS ::= BEGIN T ::= OCTET STRING END");
    let err = s.decode("T", &[0x7f, 0x00]).unwrap_err();
    assert_eq!(err.kind, asnkit_core::DecodeErrorKind::OutOfBuffer);
}
