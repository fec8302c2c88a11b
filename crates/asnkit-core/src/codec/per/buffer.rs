//! PER bit-stream primitives (X.691).
//!
//! A writer over a growing `BitVec` and a reader over a `BitSlice`, both
//! parameterized by alignment: aligned PER pads to octet boundaries where
//! §11 says so, unaligned PER never pads. The length determinant, the
//! constrained/semi-constrained/unconstrained whole numbers and the
//! normally-small number live here; the model-driven engines sit on top.

use crate::codec::prim;
use bitvec::prelude::*;
use alloc::vec::Vec;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Maximum single length-determinant value; longer payloads fragment into
/// 16K blocks.
pub(crate) const FRAGMENT: usize = 16384;

/// Errors produced by the raw bit layer; the engines wrap them with paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum BitError {
    /// Read past the end of input.
    Underflow,
    /// A length or value field is malformed.
    Bad(&'static str),
}

/// Bit-stream writer.
pub(crate) struct PerWriter {
    buffer: BitVec<u8, Msb0>,
    aligned: bool,
}

impl PerWriter {
    pub(crate) fn new(aligned: bool) -> Self {
        Self {
            buffer: BitVec::new(),
            aligned,
        }
    }

    /// Current length in bits.
    pub(crate) fn bit_len(&self) -> usize {
        self.buffer.len()
    }

    /// Finish: pad to an octet boundary. An empty encoding becomes one zero
    /// octet per X.691 §10.1.
    pub(crate) fn into_bytes(mut self) -> Vec<u8> {
        if self.buffer.is_empty() {
            return alloc::vec![0];
        }
        while self.buffer.len() % 8 != 0 {
            self.buffer.push(false);
        }
        self.buffer.into_vec()
    }

    /// Pad to an octet boundary (aligned variant only).
    pub(crate) fn align(&mut self) {
        if !self.aligned {
            return;
        }
        while self.buffer.len() % 8 != 0 {
            self.buffer.push(false);
        }
    }

    pub(crate) fn write_bit(&mut self, bit: bool) {
        self.buffer.push(bit);
    }

    /// Write the low `count` bits of `value`, most significant first.
    pub(crate) fn write_bits(&mut self, value: u128, count: u32) {
        for i in (0..count).rev() {
            self.buffer.push((value >> i) & 1 == 1);
        }
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_bits(u128::from(b), 8);
        }
    }

    /// Append raw bits from a packed buffer.
    pub(crate) fn write_bit_field(&mut self, data: &[u8], bit_len: usize) {
        let bits = BitSlice::<u8, Msb0>::from_slice(data);
        for i in 0..bit_len {
            self.buffer.push(bits[i]);
        }
    }

    /// Constrained whole number in `[lo, hi]` (§11.5 / §13).
    pub(crate) fn write_constrained(&mut self, value: i128, lo: i128, hi: i128) {
        debug_assert!(lo <= value && value <= hi);
        let range = (hi - lo) as u128 + 1;
        let offset = (value - lo) as u128;
        if range == 1 {
            return;
        }
        if !self.aligned {
            self.write_bits(offset, crate::model::bits_for_count(range));
            return;
        }
        if range <= 255 {
            self.write_bits(offset, crate::model::bits_for_count(range));
        } else if range == 256 {
            self.align();
            self.write_bits(offset, 8);
        } else if range <= 65536 {
            self.align();
            self.write_bits(offset, 16);
        } else {
            // Indefinite-length case: octet count, then the offset octets.
            let max_octets = octets_for(range - 1);
            let needed = octets_for(offset).max(1);
            self.write_constrained(needed as i128, 1, max_octets as i128);
            self.align();
            self.write_bits(offset, needed as u32 * 8);
        }
    }

    /// Semi-constrained whole number: length-prefixed offset octets (§11.7).
    pub(crate) fn write_semi_constrained(&mut self, value: &BigInt, lo: i128) {
        let offset = value - BigInt::from(lo);
        let bytes = offset.to_biguint().map_or_else(|| alloc::vec![0], |v| {
            let b = v.to_bytes_be();
            if b.is_empty() { alloc::vec![0] } else { b }
        });
        self.write_length(bytes.len());
        self.align();
        self.write_bytes(&bytes);
    }

    /// Unconstrained whole number: length-prefixed two's complement (§11.8).
    pub(crate) fn write_unconstrained(&mut self, value: &BigInt) {
        let bytes = prim::int_to_bytes(value);
        self.write_length(bytes.len());
        self.align();
        self.write_bytes(&bytes);
    }

    /// Normally small non-negative whole number (§11.6).
    pub(crate) fn write_normally_small(&mut self, value: u64) {
        if value <= 63 {
            self.write_bit(false);
            self.write_bits(u128::from(value), 6);
        } else {
            self.write_bit(true);
            self.write_semi_constrained(&BigInt::from(value), 0);
        }
    }

    /// General length determinant for values below the fragmentation bound
    /// (§11.9). Callers fragment larger payloads.
    pub(crate) fn write_length(&mut self, len: usize) {
        debug_assert!(len < FRAGMENT);
        self.align();
        if len <= 127 {
            self.write_bits(len as u128, 8);
        } else {
            self.write_bits(0x8000 | len as u128, 16);
        }
    }

    /// Write a byte payload with fragmentation above 16K (§11.9.3.8).
    pub(crate) fn write_fragmented_bytes(&mut self, data: &[u8]) {
        let mut rest = data;
        loop {
            if rest.len() < FRAGMENT {
                self.write_length(rest.len());
                self.write_bytes(rest);
                return;
            }
            let blocks = (rest.len() / FRAGMENT).min(4);
            self.align();
            self.write_bits(0xc0 | blocks as u128, 8);
            let chunk = blocks * FRAGMENT;
            self.write_bytes(&rest[..chunk]);
            rest = &rest[chunk..];
            // A multiple of 16K ends with an explicit zero-length block.
            if rest.is_empty() {
                self.write_length(0);
                return;
            }
        }
    }
}

/// Octets needed to hold an unsigned value.
fn octets_for(v: u128) -> usize {
    let bits = 128 - v.leading_zeros() as usize;
    core::cmp::max(1, bits.div_ceil(8))
}

/// Bit-stream reader.
pub(crate) struct PerReader<'b> {
    data: &'b BitSlice<u8, Msb0>,
    pos: usize,
    aligned: bool,
}

impl<'b> PerReader<'b> {
    pub(crate) fn new(data: &'b [u8], aligned: bool) -> Self {
        Self {
            data: BitSlice::from_slice(data),
            pos: 0,
            aligned,
        }
    }

    /// Current position in bits.
    pub(crate) fn bit_pos(&self) -> usize {
        self.pos
    }

    /// Octets consumed, rounding a partial octet up.
    pub(crate) fn octets_consumed(&self) -> usize {
        self.pos.div_ceil(8)
    }

    pub(crate) fn align(&mut self) {
        if !self.aligned {
            return;
        }
        let rem = self.pos % 8;
        if rem != 0 {
            self.pos += 8 - rem;
        }
    }

    pub(crate) fn read_bit(&mut self) -> Result<bool, BitError> {
        if self.pos >= self.data.len() {
            return Err(BitError::Underflow);
        }
        let bit = self.data[self.pos];
        self.pos += 1;
        Ok(bit)
    }

    pub(crate) fn read_bits(&mut self, count: u32) -> Result<u128, BitError> {
        if self.pos + count as usize > self.data.len() {
            return Err(BitError::Underflow);
        }
        let mut v: u128 = 0;
        for _ in 0..count {
            v = (v << 1) | u128::from(self.data[self.pos]);
            self.pos += 1;
        }
        Ok(v)
    }

    pub(crate) fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, BitError> {
        if self.pos + count * 8 > self.data.len() {
            return Err(BitError::Underflow);
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read_bits(8)? as u8);
        }
        Ok(out)
    }

    /// Read a packed bit field of `bit_len` bits.
    pub(crate) fn read_bit_field(&mut self, bit_len: usize) -> Result<Vec<u8>, BitError> {
        if self.pos + bit_len > self.data.len() {
            return Err(BitError::Underflow);
        }
        let mut out = alloc::vec![0u8; bit_len.div_ceil(8)];
        for i in 0..bit_len {
            if self.data[self.pos + i] {
                out[i / 8] |= 1 << (7 - (i % 8));
            }
        }
        self.pos += bit_len;
        Ok(out)
    }

    pub(crate) fn read_constrained(&mut self, lo: i128, hi: i128) -> Result<i128, BitError> {
        let range = (hi - lo) as u128 + 1;
        if range == 1 {
            return Ok(lo);
        }
        if !self.aligned {
            let offset = self.read_bits(crate::model::bits_for_count(range))?;
            return checked_add(lo, offset);
        }
        let offset = if range <= 255 {
            self.read_bits(crate::model::bits_for_count(range))?
        } else if range == 256 {
            self.align();
            self.read_bits(8)?
        } else if range <= 65536 {
            self.align();
            self.read_bits(16)?
        } else {
            let max_octets = octets_for(range - 1);
            let needed = self.read_constrained(1, max_octets as i128)?;
            self.align();
            self.read_bits(needed as u32 * 8)?
        };
        checked_add(lo, offset)
    }

    pub(crate) fn read_semi_constrained(&mut self, lo: i128) -> Result<BigInt, BitError> {
        let len = self.read_length()?;
        self.align();
        let bytes = self.read_bytes(len)?;
        let offset = BigInt::from_bytes_be(num_bigint::Sign::Plus, &bytes);
        Ok(offset + BigInt::from(lo))
    }

    pub(crate) fn read_unconstrained(&mut self) -> Result<BigInt, BitError> {
        let len = self.read_length()?;
        if len == 0 {
            return Err(BitError::Bad("empty integer body"));
        }
        self.align();
        let bytes = self.read_bytes(len)?;
        Ok(prim::int_from_bytes(&bytes))
    }

    pub(crate) fn read_normally_small(&mut self) -> Result<u64, BitError> {
        if self.read_bit()? {
            let v = self.read_semi_constrained(0)?;
            v.to_u64().ok_or(BitError::Bad("normally-small overflow"))
        } else {
            Ok(self.read_bits(6)? as u64)
        }
    }

    /// General length determinant; fragment headers are rejected here and
    /// handled by `read_fragmented_bytes`.
    pub(crate) fn read_length(&mut self) -> Result<usize, BitError> {
        self.align();
        let first = self.read_bits(8)? as u8;
        if first & 0x80 == 0 {
            return Ok(first as usize);
        }
        if first & 0x40 == 0 {
            let second = self.read_bits(8)? as u8;
            return Ok((((first & 0x3f) as usize) << 8) | second as usize);
        }
        Err(BitError::Bad("unexpected fragmented length"))
    }

    /// Read a possibly fragmented byte payload.
    pub(crate) fn read_fragmented_bytes(&mut self) -> Result<Vec<u8>, BitError> {
        let mut out = Vec::new();
        loop {
            self.align();
            let first = self.read_bits(8)? as u8;
            if first & 0x80 == 0 {
                out.extend_from_slice(&self.read_bytes(first as usize)?);
                return Ok(out);
            }
            if first & 0x40 == 0 {
                let second = self.read_bits(8)? as u8;
                let len = (((first & 0x3f) as usize) << 8) | second as usize;
                out.extend_from_slice(&self.read_bytes(len)?);
                return Ok(out);
            }
            let blocks = (first & 0x3f) as usize;
            if blocks == 0 || blocks > 4 {
                return Err(BitError::Bad("bad fragment multiplier"));
            }
            out.extend_from_slice(&self.read_bytes(blocks * FRAGMENT)?);
            // Blocks of exactly 16K keep going until a final short block.
        }
    }
}

fn checked_add(lo: i128, offset: u128) -> Result<i128, BitError> {
    let offset = i128::try_from(offset).map_err(|_| BitError::Bad("offset overflow"))?;
    lo.checked_add(offset).ok_or(BitError::Bad("offset overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constrained_bit_widths() {
        let mut w = PerWriter::new(false);
        w.write_constrained(2, 0, 2);
        // Range 3 needs 2 bits.
        assert_eq!(w.bit_len(), 2);
        assert_eq!(w.into_bytes(), [0x80]);
    }

    #[test]
    fn test_constrained_round_trip_unaligned() {
        for (value, lo, hi) in [(0i128, 0, 0), (5, 0, 7), (-3, -10, 10), (255, 0, 255)] {
            let mut w = PerWriter::new(false);
            w.write_constrained(value, lo, hi);
            let bytes = w.into_bytes();
            let mut r = PerReader::new(&bytes, false);
            assert_eq!(r.read_constrained(lo, hi).unwrap(), value);
        }
    }

    #[test]
    fn test_constrained_round_trip_aligned() {
        for (value, lo, hi) in [
            (5i128, 0, 7),
            (200, 0, 255),
            (256, 0, 256),
            (40000, 0, 65535),
            (100_000, 0, 1_000_000),
        ] {
            let mut w = PerWriter::new(true);
            w.write_constrained(value, lo, hi);
            let bytes = w.into_bytes();
            let mut r = PerReader::new(&bytes, true);
            assert_eq!(r.read_constrained(lo, hi).unwrap(), value);
        }
    }

    #[test]
    fn test_length_determinant() {
        for len in [0usize, 1, 127, 128, 500, 16383] {
            let mut w = PerWriter::new(false);
            w.write_length(len);
            let bytes = w.into_bytes();
            let mut r = PerReader::new(&bytes, false);
            assert_eq!(r.read_length().unwrap(), len);
        }
    }

    #[test]
    fn test_fragmented_bytes() {
        let data = alloc::vec![0xabu8; 20000];
        let mut w = PerWriter::new(false);
        w.write_fragmented_bytes(&data);
        let bytes = w.into_bytes();
        let mut r = PerReader::new(&bytes, false);
        assert_eq!(r.read_fragmented_bytes().unwrap(), data);
    }

    #[test]
    fn test_unconstrained_round_trip() {
        for v in [0i64, 1, -1, 127, 128, -128, 100_000, -100_000] {
            let mut w = PerWriter::new(false);
            w.write_unconstrained(&BigInt::from(v));
            let bytes = w.into_bytes();
            let mut r = PerReader::new(&bytes, false);
            assert_eq!(r.read_unconstrained().unwrap(), BigInt::from(v));
        }
    }

    #[test]
    fn test_normally_small() {
        for v in [0u64, 1, 63, 64, 1000] {
            let mut w = PerWriter::new(false);
            w.write_normally_small(v);
            let bytes = w.into_bytes();
            let mut r = PerReader::new(&bytes, false);
            assert_eq!(r.read_normally_small().unwrap(), v);
        }
    }

    #[test]
    fn test_underflow_detected() {
        let mut r = PerReader::new(&[0x80], false);
        assert!(r.read_bits(16).is_err());
    }

    #[test]
    fn test_empty_encoding_is_one_octet() {
        let w = PerWriter::new(false);
        assert_eq!(w.into_bytes(), [0x00]);
    }
}
