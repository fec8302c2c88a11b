//! UPER and aligned-PER wire-format tests against X.691 bit layouts.

use asnkit_core::{compile, Codec, Options, Schema, Source, Value};

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

fn round_trip(s: &Schema, ty: &str, v: &Value) {
    let bytes = s.encode(ty, v).expect("encodes");
    let decoded = s.decode(ty, &bytes).expect("decodes");
    let refreshed = s.refresh(ty, v).expect("refreshes");
    assert_eq!(decoded, refreshed, "round trip of {v:?} over {bytes:02x?}");
}

#[test]
fn boolean_single_bit() {
    let s = schema(Codec::Uper, "M DEFINITIONS ::= BEGIN T ::= BOOLEAN END");
    assert_eq!(s.encode("T", &Value::Boolean(true)).unwrap(), [0x80]);
    assert_eq!(s.encode("T", &Value::Boolean(false)).unwrap(), [0x00]);
    assert_eq!(s.decode("T", &[0x80]).unwrap(), Value::Boolean(true));
}

#[test]
fn sequence_with_optional_vector() {
    // Optional bit 0, then `a` as an unconstrained integer: length 1,
    // body 05: bits 0 00000001 00000101 -> 00 82 80.
    let s = schema(
        Codec::Uper,
        "M DEFINITIONS ::= BEGIN T ::= SEQUENCE { a INTEGER, b BOOLEAN OPTIONAL } END",
    );
    let v = seq(&[("a", Value::int(5))]);
    assert_eq!(s.encode("T", &v).unwrap(), [0x00, 0x82, 0x80]);
    assert_eq!(s.decode("T", &[0x00, 0x82, 0x80]).unwrap(), v);

    let both = seq(&[("a", Value::int(5)), ("b", Value::Boolean(true))]);
    assert_eq!(s.encode("T", &both).unwrap(), [0x80, 0x82, 0xc0]);
    round_trip(&s, "T", &both);
}

#[test]
fn choice_index_by_declaration_order() {
    // (b, true): alternative index bit 1, then the boolean bit -> C0.
    let s = schema(
        Codec::Uper,
        "M DEFINITIONS ::= BEGIN C ::= CHOICE { a INTEGER, b BOOLEAN } END",
    );
    let v = Value::Choice("b".into(), Box::new(Value::Boolean(true)));
    assert_eq!(s.encode("C", &v).unwrap(), [0xc0]);
    assert_eq!(s.decode("C", &[0xc0]).unwrap(), v);

    let a = Value::Choice("a".into(), Box::new(Value::int(1)));
    round_trip(&s, "C", &a);
}

#[test]
fn constrained_integer_widths() {
    let s = schema(Codec::Uper, "M DEFINITIONS ::= BEGIN T ::= INTEGER (0..7) END");
    // 5 in 3 bits: 101 -> A0.
    assert_eq!(s.encode("T", &Value::int(5)).unwrap(), [0xa0]);
    assert_eq!(s.decode("T", &[0xa0]).unwrap(), Value::int(5));
    // Out of range is a constraint violation.
    assert!(s.encode("T", &Value::int(8)).is_err());

    // A single-value range needs no bits at all.
    let unit = schema(Codec::Uper, "M DEFINITIONS ::= BEGIN T ::= INTEGER (3) END");
    assert_eq!(unit.encode("T", &Value::int(3)).unwrap(), [0x00]);
    assert_eq!(unit.decode("T", &[0x00]).unwrap(), Value::int(3));
}

#[test]
fn extensible_integer_constraint() {
    let s = schema(
        Codec::Uper,
        "M DEFINITIONS ::= BEGIN T ::= INTEGER (0..7, ...) END",
    );
    // In root: extension bit 0 then 3 bits: 0 101 -> 50.
    assert_eq!(s.encode("T", &Value::int(5)).unwrap(), [0x50]);
    assert_eq!(s.decode("T", &[0x50]).unwrap(), Value::int(5));
    // Outside the root the value still encodes, with the extension bit set.
    let bytes = s.encode("T", &Value::int(200)).unwrap();
    assert_eq!(bytes[0] & 0x80, 0x80);
    assert_eq!(s.decode("T", &bytes).unwrap(), Value::int(200));
}

#[test]
fn semi_constrained_integer() {
    let s = schema(Codec::Uper, "M DEFINITIONS ::= BEGIN T ::= INTEGER (0..MAX) END");
    for v in [0i64, 1, 255, 256, 100_000] {
        round_trip(&s, "T", &Value::int(v));
    }
}

#[test]
fn ia5_string_seven_bit_chars() {
    let s = schema(Codec::Uper, "M DEFINITIONS ::= BEGIN T ::= IA5String END");
    // Length 2, then 'h' and 'i' in 7 bits each.
    assert_eq!(
        s.encode("T", &Value::Text("hi".into())).unwrap(),
        [0x02, 0xd1, 0xa4]
    );
    assert_eq!(s.decode("T", &[0x02, 0xd1, 0xa4]).unwrap(), Value::Text("hi".into()));
}

#[test]
fn permitted_alphabet_single_bit_chars() {
    let s = schema(
        Codec::Uper,
        "M DEFINITIONS ::= BEGIN T ::= IA5String (SIZE (2) ^ FROM (\"ab\")) END",
    );
    // Fixed size 2, one bit per character: a=0, b=1 -> 01 000000.
    assert_eq!(s.encode("T", &Value::Text("ab".into())).unwrap(), [0x40]);
    assert_eq!(s.decode("T", &[0x40]).unwrap(), Value::Text("ab".into()));
    // A character outside the alphabet is rejected.
    assert!(s.encode("T", &Value::Text("ax".into())).is_err());
}

#[test]
fn numeric_string_half_octet_chars() {
    let s = schema(Codec::Uper, "M DEFINITIONS ::= BEGIN T ::= NumericString END");
    round_trip(&s, "T", &Value::Text("123 456".into()));
}

#[test]
fn constrained_sequence_of() {
    let s = schema(
        Codec::Uper,
        "M DEFINITIONS ::= BEGIN L ::= SEQUENCE (SIZE (1..4)) OF INTEGER (0..7) END",
    );
    // Count 2 as offset 1 in 2 bits, then 001 and 010: 01 001 010 -> 4A.
    let v = Value::List(vec![Value::int(1), Value::int(2)]);
    assert_eq!(s.encode("L", &v).unwrap(), [0x4a]);
    assert_eq!(s.decode("L", &[0x4a]).unwrap(), v);
    // Size constraint enforced.
    assert!(s.encode("L", &Value::List(vec![])).is_err());
}

#[test]
fn fixed_size_octet_string_inline() {
    let s = schema(
        Codec::Uper,
        "M DEFINITIONS ::= BEGIN T ::= OCTET STRING (SIZE (2)) END",
    );
    assert_eq!(
        s.encode("T", &Value::Bytes(vec![0xab, 0xcd])).unwrap(),
        [0xab, 0xcd]
    );
    assert_eq!(
        s.decode("T", &[0xab, 0xcd]).unwrap(),
        Value::Bytes(vec![0xab, 0xcd])
    );
}

#[test]
fn bit_string_forms() {
    let unconstrained = schema(Codec::Uper, "M DEFINITIONS ::= BEGIN T ::= BIT STRING END");
    let v = Value::BitString(asnkit_core::BitString::from_bits("10110"));
    round_trip(&unconstrained, "T", &v);

    let fixed = schema(
        Codec::Uper,
        "M DEFINITIONS ::= BEGIN T ::= BIT STRING (SIZE (5)) END",
    );
    // Five bits inline, no length: 10110 -> B0.
    assert_eq!(
        fixed.encode("T", &v).unwrap(),
        [0xb0]
    );
    assert_eq!(fixed.decode("T", &[0xb0]).unwrap(), v);
}

#[test]
fn extensible_sequence_additions() {
    let s = schema(
        Codec::Uper,
        "M DEFINITIONS ::= BEGIN T ::= SEQUENCE { a INTEGER (0..7), ..., b BOOLEAN } END",
    );
    // Without the addition: extension bit 0, then a=101.
    let root_only = seq(&[("a", Value::int(5))]);
    assert_eq!(s.encode("T", &root_only).unwrap(), [0x50]);
    assert_eq!(s.decode("T", &[0x50]).unwrap(), root_only);

    // With the addition present the extension machinery engages.
    let with_ext = seq(&[("a", Value::int(5)), ("b", Value::Boolean(true))]);
    round_trip(&s, "T", &with_ext);
    let bytes = s.encode("T", &with_ext).unwrap();
    assert_eq!(bytes[0] & 0x80, 0x80);
}

#[test]
fn extension_addition_group() {
    let s = schema(
        Codec::Uper,
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER (0..7), ..., [[ b BOOLEAN, c INTEGER (0..3) ]] } \
         END",
    );
    let v = seq(&[
        ("a", Value::int(1)),
        ("b", Value::Boolean(false)),
        ("c", Value::int(2)),
    ]);
    round_trip(&s, "T", &v);
}

#[test]
fn extensible_choice_alternative() {
    let s = schema(
        Codec::Uper,
        "M DEFINITIONS ::= BEGIN C ::= CHOICE { a INTEGER (0..7), ..., b BOOLEAN } END",
    );
    round_trip(&s, "C", &Value::Choice("a".into(), Box::new(Value::int(3))));
    round_trip(&s, "C", &Value::Choice("b".into(), Box::new(Value::Boolean(true))));
}

#[test]
fn enumerated_index_encoding() {
    let s = schema(
        Codec::Uper,
        "M DEFINITIONS ::= BEGIN E ::= ENUMERATED { red(0), green(1), blue(2) } END",
    );
    // Three items: 2 bits; green is index 1 -> 01 000000.
    assert_eq!(s.encode("E", &Value::Text("green".into())).unwrap(), [0x40]);
    assert_eq!(s.decode("E", &[0x40]).unwrap(), Value::Text("green".into()));
}

#[test]
fn aligned_per_pads_length_and_contents() {
    let aligned = schema(
        Codec::Per,
        "M DEFINITIONS ::= BEGIN T ::= SEQUENCE { a BOOLEAN, s OCTET STRING } END",
    );
    let v = seq(&[("a", Value::Boolean(true)), ("s", Value::Bytes(vec![0xff, 0x01]))]);
    // The boolean occupies one bit, then the length determinant aligns to
    // the next octet: 80 02 FF 01.
    assert_eq!(aligned.encode("T", &v).unwrap(), [0x80, 0x02, 0xff, 0x01]);
    assert_eq!(
        aligned.decode("T", &[0x80, 0x02, 0xff, 0x01]).unwrap(),
        v
    );

    // UPER packs the same value without padding.
    let uper = schema(
        Codec::Uper,
        "M DEFINITIONS ::= BEGIN T ::= SEQUENCE { a BOOLEAN, s OCTET STRING } END",
    );
    let packed = uper.encode("T", &v).unwrap();
    assert_eq!(packed, [0x81, 0x7f, 0x80, 0x80]);
    assert_eq!(uper.decode("T", &packed).unwrap(), v);
}

#[test]
fn aligned_per_two_octet_range() {
    let s = schema(Codec::Per, "M DEFINITIONS ::= BEGIN T ::= INTEGER (0..1000) END");
    // Range 1001 > 256: two aligned octets.
    assert_eq!(s.encode("T", &Value::int(7)).unwrap(), [0x00, 0x07]);
    assert_eq!(s.decode("T", &[0x00, 0x07]).unwrap(), Value::int(7));
}

#[test]
fn recursive_type_deep_nesting() {
    let s = schema(
        Codec::Uper,
        "M DEFINITIONS ::= BEGIN Node ::= SEQUENCE { next Node OPTIONAL } END",
    );
    let mut v = seq(&[]);
    for _ in 0..10 {
        v = seq(&[("next", v)]);
    }
    round_trip(&s, "Node", &v);
}

#[test]
fn default_members_omitted_in_per() {
    let s = schema(
        Codec::Uper,
        "M DEFINITIONS ::= BEGIN T ::= SEQUENCE { a INTEGER (0..7) DEFAULT 3 } END",
    );
    // Equal to the default: presence bit 0, nothing else.
    assert_eq!(s.encode("T", &seq(&[("a", Value::int(3))])).unwrap(), [0x00]);
    // Decode restores the default.
    assert_eq!(s.decode("T", &[0x00]).unwrap(), seq(&[("a", Value::int(3))]));
    // Non-default: presence bit 1 then 3 bits: 1 101 -> D0.
    assert_eq!(s.encode("T", &seq(&[("a", Value::int(5))])).unwrap(), [0xd0]);
}
