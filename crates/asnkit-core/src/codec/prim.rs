//! Primitive contents shared by the byte-oriented codecs.
//!
//! BER, OER and PER all reuse the X.690 contents octets for INTEGER, REAL,
//! OBJECT IDENTIFIER and the character strings; only the framing around
//! them differs.

use crate::model::StringKind;
use alloc::string::String;
use alloc::vec::Vec;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Minimal two's-complement big-endian contents of an INTEGER.
#[must_use]
pub(crate) fn int_to_bytes(v: &BigInt) -> Vec<u8> {
    v.to_signed_bytes_be()
}

/// Parse INTEGER contents octets.
#[must_use]
pub(crate) fn int_from_bytes(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        return BigInt::from(0);
    }
    BigInt::from_signed_bytes_be(bytes)
}

/// INTEGER contents longer than needed (redundant sign octet).
#[must_use]
pub(crate) fn int_is_redundant(bytes: &[u8]) -> bool {
    match bytes {
        [0x00, second, ..] => second & 0x80 == 0,
        [0xff, second, ..] => second & 0x80 != 0,
        _ => false,
    }
}

/// Append a base-128 subidentifier.
fn push_base128(out: &mut Vec<u8>, mut v: u64) {
    let mut chunk = [0u8; 10];
    let mut n = 0;
    loop {
        chunk[n] = (v & 0x7f) as u8;
        v >>= 7;
        n += 1;
        if v == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let byte = chunk[i];
        out.push(if i == 0 { byte } else { byte | 0x80 });
    }
}

/// Read a base-128 subidentifier; `None` on truncation or overflow.
fn read_base128(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    let mut v: u64 = 0;
    for _ in 0..10 {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        v = v.checked_shl(7)? | u64::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Some(v);
        }
    }
    None
}

/// OBJECT IDENTIFIER contents. The first two arcs combine into one
/// subidentifier; RELATIVE-OID skips the combination.
pub(crate) fn oid_to_bytes(components: &[u64], relative: bool) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    if relative {
        for &c in components {
            push_base128(&mut out, c);
        }
        return Ok(out);
    }
    if components.len() < 2 {
        return Err("OBJECT IDENTIFIER needs at least two components".into());
    }
    let (a0, a1) = (components[0], components[1]);
    if a0 > 2 || (a0 < 2 && a1 >= 40) {
        return Err("invalid leading OBJECT IDENTIFIER arcs".into());
    }
    push_base128(&mut out, a0 * 40 + a1);
    for &c in &components[2..] {
        push_base128(&mut out, c);
    }
    Ok(out)
}

/// Parse OBJECT IDENTIFIER / RELATIVE-OID contents.
pub(crate) fn oid_from_bytes(bytes: &[u8], relative: bool) -> Result<Vec<u64>, String> {
    let mut components = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let v = read_base128(bytes, &mut pos)
            .ok_or_else(|| String::from("truncated OBJECT IDENTIFIER subidentifier"))?;
        if components.is_empty() && !relative {
            let (a0, a1) = if v < 40 {
                (0, v)
            } else if v < 80 {
                (1, v - 40)
            } else {
                (2, v - 80)
            };
            components.push(a0);
            components.push(a1);
        } else {
            components.push(v);
        }
    }
    if !relative && components.is_empty() {
        return Err("empty OBJECT IDENTIFIER".into());
    }
    Ok(components)
}

/// X.690 §8.5 REAL contents, base-2 canonical (mantissa odd), which is also
/// the DER form.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn real_to_bytes(v: f64) -> Vec<u8> {
    if v == 0.0 {
        if v.is_sign_negative() {
            return alloc::vec![0x43];
        }
        return Vec::new();
    }
    if v.is_infinite() {
        return alloc::vec![if v > 0.0 { 0x40 } else { 0x41 }];
    }
    if v.is_nan() {
        return alloc::vec![0x42];
    }

    let bits = v.to_bits();
    let sign = bits >> 63;
    let biased = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mut mantissa, mut exponent) = if biased == 0 {
        (fraction, -1074i64)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };
    while mantissa & 1 == 0 {
        mantissa >>= 1;
        exponent += 1;
    }

    let exp_bytes = int_to_bytes(&BigInt::from(exponent));
    let mut mant_bytes = mantissa.to_be_bytes().to_vec();
    while mant_bytes.len() > 1 && mant_bytes[0] == 0 {
        mant_bytes.remove(0);
    }

    let mut out = Vec::with_capacity(2 + exp_bytes.len() + mant_bytes.len());
    let header = 0x80 | ((sign as u8) << 6);
    match exp_bytes.len() {
        1 => out.push(header),
        2 => out.push(header | 0x01),
        3 => out.push(header | 0x02),
        n => {
            out.push(header | 0x03);
            out.push(n as u8);
        }
    }
    out.extend_from_slice(&exp_bytes);
    out.extend_from_slice(&mant_bytes);
    out
}

/// Parse REAL contents octets.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn real_from_bytes(bytes: &[u8]) -> Result<f64, String> {
    let Some(&first) = bytes.first() else {
        return Ok(0.0);
    };
    if first & 0x80 != 0 {
        // Binary encoding.
        let sign = if first & 0x40 != 0 { -1.0 } else { 1.0 };
        let base: f64 = match (first >> 4) & 0x03 {
            0 => 2.0,
            1 => 8.0,
            2 => 16.0,
            _ => return Err("reserved REAL base".into()),
        };
        let scale = (first >> 2) & 0x03;
        let (exp_len, mut pos) = match first & 0x03 {
            3 => {
                let len = *bytes.get(1).ok_or("truncated REAL exponent")? as usize;
                (len, 2)
            }
            n => (n as usize + 1, 1),
        };
        let exp_end = pos + exp_len;
        let exp_bytes = bytes.get(pos..exp_end).ok_or("truncated REAL exponent")?;
        let exponent = int_from_bytes(exp_bytes)
            .to_i32()
            .ok_or_else(|| String::from("REAL exponent overflow"))?;
        pos = exp_end;
        let mant_bytes = &bytes[pos..];
        if mant_bytes.is_empty() {
            return Err("missing REAL mantissa".into());
        }
        let mut mantissa = 0f64;
        for &b in mant_bytes {
            mantissa = mantissa * 256.0 + f64::from(b);
        }
        let value = sign * mantissa * 2f64.powi(i32::from(scale)) * base.powi(exponent);
        return Ok(value);
    }
    if first & 0x40 != 0 {
        return match first {
            0x40 => Ok(f64::INFINITY),
            0x41 => Ok(f64::NEG_INFINITY),
            0x42 => Ok(f64::NAN),
            0x43 => Ok(-0.0),
            _ => Err("reserved REAL special value".into()),
        };
    }
    // ISO 6093 decimal form.
    let text = core::str::from_utf8(&bytes[1..]).map_err(|_| String::from("bad decimal REAL"))?;
    let text = text.trim().replace(',', ".");
    text.parse::<f64>().map_err(|_| String::from("bad decimal REAL"))
}

/// Character set check for the restricted string kinds.
#[must_use]
pub(crate) fn text_ok(kind: StringKind, s: &str) -> bool {
    match kind {
        StringKind::Numeric => s.chars().all(|c| c.is_ascii_digit() || c == ' '),
        StringKind::Printable => s.chars().all(|c| {
            c.is_ascii_alphanumeric() || " '()+,-./:=?".contains(c)
        }),
        StringKind::Ia5 => s.chars().all(|c| (c as u32) < 128),
        StringKind::Visible => s.chars().all(|c| {
            let v = c as u32;
            (0x20..=0x7e).contains(&v)
        }),
        StringKind::Bmp => s.chars().all(|c| (c as u32) <= 0xffff),
        // Teletex and Graphic have no workable canonical alphabet; they are
        // carried as unrestricted text (see DESIGN.md).
        StringKind::Teletex
        | StringKind::Graphic
        | StringKind::General
        | StringKind::ObjectDescriptor
        | StringKind::Utf8
        | StringKind::Universal => true,
    }
}

/// Character string contents octets.
#[must_use]
pub(crate) fn text_to_bytes(kind: StringKind, s: &str) -> Vec<u8> {
    match kind {
        StringKind::Bmp => {
            let mut out = Vec::with_capacity(s.len() * 2);
            for unit in s.encode_utf16() {
                out.extend_from_slice(&unit.to_be_bytes());
            }
            out
        }
        StringKind::Universal => {
            let mut out = Vec::with_capacity(s.len() * 4);
            for c in s.chars() {
                out.extend_from_slice(&(c as u32).to_be_bytes());
            }
            out
        }
        _ => s.as_bytes().to_vec(),
    }
}

/// Parse character string contents octets.
pub(crate) fn text_from_bytes(kind: StringKind, bytes: &[u8]) -> Result<String, ()> {
    match kind {
        StringKind::Bmp => {
            if bytes.len() % 2 != 0 {
                return Err(());
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16(&units).map_err(|_| ())
        }
        StringKind::Universal => {
            if bytes.len() % 4 != 0 {
                return Err(());
            }
            bytes
                .chunks_exact(4)
                .map(|c| {
                    let v = u32::from_be_bytes([c[0], c[1], c[2], c[3]]);
                    char::from_u32(v).ok_or(())
                })
                .collect()
        }
        _ => core::str::from_utf8(bytes)
            .map(String::from)
            .map_err(|_| ()),
    }
}

/// Number of octets per character on the wire, when fixed.
#[must_use]
pub(crate) fn octets_per_char(kind: StringKind) -> usize {
    match kind {
        StringKind::Bmp => 2,
        StringKind::Universal => 4,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_round_trip() {
        for v in [0i64, 1, 127, 128, -1, -128, -129, 65535] {
            let big = BigInt::from(v);
            let bytes = int_to_bytes(&big);
            assert_eq!(int_from_bytes(&bytes), big);
        }
        // X.690 minimal forms.
        assert_eq!(int_to_bytes(&BigInt::from(127)), [0x7f]);
        assert_eq!(int_to_bytes(&BigInt::from(128)), [0x00, 0x80]);
        assert_eq!(int_to_bytes(&BigInt::from(-128)), [0x80]);
    }

    #[test]
    fn test_int_redundant() {
        assert!(int_is_redundant(&[0x00, 0x7f]));
        assert!(int_is_redundant(&[0xff, 0x80]));
        assert!(!int_is_redundant(&[0x00, 0x80]));
        assert!(!int_is_redundant(&[0x7f]));
    }

    #[test]
    fn test_oid_round_trip() {
        let arcs = [1u64, 2, 840, 113549, 1, 1, 11];
        let bytes = oid_to_bytes(&arcs, false).unwrap();
        assert_eq!(bytes[0], 42); // 1*40 + 2
        assert_eq!(oid_from_bytes(&bytes, false).unwrap(), arcs);
    }

    #[test]
    fn test_relative_oid() {
        let arcs = [8571u64, 3, 2];
        let bytes = oid_to_bytes(&arcs, true).unwrap();
        assert_eq!(oid_from_bytes(&bytes, true).unwrap(), arcs);
    }

    #[test]
    fn test_oid_rejects_bad_arcs() {
        assert!(oid_to_bytes(&[1], false).is_err());
        assert!(oid_to_bytes(&[3, 1], false).is_err());
        assert!(oid_to_bytes(&[0, 40], false).is_err());
    }

    #[test]
    fn test_real_canonical() {
        // 1.0 = +1 * 2^0
        assert_eq!(real_to_bytes(1.0), [0x80, 0x00, 0x01]);
        // -0.5 = -1 * 2^-1
        assert_eq!(real_to_bytes(-0.5), [0xc0, 0xff, 0x01]);
        assert_eq!(real_to_bytes(0.0), Vec::<u8>::new());
        assert_eq!(real_to_bytes(f64::INFINITY), [0x40]);
        assert_eq!(real_to_bytes(f64::NEG_INFINITY), [0x41]);
        assert_eq!(real_to_bytes(-0.0), [0x43]);
    }

    #[test]
    fn test_real_round_trip() {
        for v in [1.0f64, -1.0, 0.5, 3.25, 1e10, -2.5e-3, 0.1] {
            let bytes = real_to_bytes(v);
            let back = real_from_bytes(&bytes).unwrap();
            assert_eq!(back, v, "round trip of {v}");
        }
        assert!(real_from_bytes(&[0x42]).unwrap().is_nan());
        assert_eq!(real_from_bytes(&[]).unwrap(), 0.0);
    }

    #[test]
    fn test_text_checks() {
        assert!(text_ok(StringKind::Numeric, "123 45"));
        assert!(!text_ok(StringKind::Numeric, "12a"));
        assert!(text_ok(StringKind::Printable, "Test (1+2)?"));
        assert!(!text_ok(StringKind::Printable, "no@sign"));
        assert!(text_ok(StringKind::Ia5, "ascii only"));
        assert!(!text_ok(StringKind::Ia5, "über"));
    }

    #[test]
    fn test_bmp_contents() {
        let bytes = text_to_bytes(StringKind::Bmp, "Aä");
        assert_eq!(bytes, [0x00, 0x41, 0x00, 0xe4]);
        assert_eq!(text_from_bytes(StringKind::Bmp, &bytes).unwrap(), "Aä");
    }
}
