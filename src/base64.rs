//! Constant-time Base64 codec with the "dot-slash" alphabet `. / 0-9 A-Z a-z`.
//!
//! The ordering differs from RFC 4648: `.` and `/` sort below the digits,
//! which is what lets PHC strings built from these bytes compare the same
//! way lexicographically as they would in raw form. bscrypt never emits
//! `=` padding, so unlike the reference implementation this module doesn't
//! carry the padded code paths at all.
//!
//! Decoding does not branch on whether an individual character is valid;
//! invalid characters are folded into an error accumulator with the same
//! bitwise operators used to decode valid ones, so the time taken doesn't
//! depend on which characters (if any) are bad.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// A source character fell outside `. / 0-9 A-Z a-z`, or the input length
/// wasn't a multiple of 4 (mod the trailing 2/3-character group).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DecodeError;

#[inline(always)]
fn ct_range_mask(x: i32, lo: i32, hi: i32) -> i32 {
    -((x.wrapping_sub(lo) as u32 <= (hi - lo) as u32) as i32)
}

#[inline(always)]
fn decode_char(ch: u8) -> i32 {
    let ch = ch as i32;
    let mut acc = -1i32;
    acc += ct_range_mask(ch, b'.' as i32, b'9' as i32) & (1 + (ch - b'.' as i32));
    acc += ct_range_mask(ch, b'A' as i32, b'Z' as i32) & (1 + 12 + (ch - b'A' as i32));
    acc += ct_range_mask(ch, b'a' as i32, b'z' as i32) & (1 + 12 + 26 + (ch - b'a' as i32));
    acc
}

#[inline(always)]
fn encode_char(src: i32) -> u8 {
    let digit_mask = ct_range_mask(src, 0, 11);
    let upper_mask = ct_range_mask(src, 12, 37);
    let lower_mask = ct_range_mask(src, 38, 63);
    let digit = b'.' as i32 + src;
    let upper = b'A' as i32 + (src - 12);
    let lower = b'a' as i32 + (src - 38);
    ((digit & digit_mask) | (upper & upper_mask) | (lower & lower_mask)) as u8
}

#[inline(always)]
fn decode3(dest: &mut [u8], src: &[u8; 4]) -> i32 {
    let c0 = decode_char(src[0]);
    let c1 = decode_char(src[1]);
    let c2 = decode_char(src[2]);
    let c3 = decode_char(src[3]);

    dest[0] = ((c0 << 2) | (c1 >> 4)) as u8;
    dest[1] = ((c1 << 4) | (c2 >> 2)) as u8;
    dest[2] = ((c2 << 6) | c3) as u8;
    c0 | c1 | c2 | c3
}

#[inline(always)]
fn encode3(dest: &mut [u8; 4], src: &[u8; 3]) {
    let b0 = src[0] as i32;
    let b1 = src[1] as i32;
    let b2 = src[2] as i32;

    dest[0] = encode_char(b0 >> 2);
    dest[1] = encode_char(((b0 << 4) | (b1 >> 4)) & 63);
    dest[2] = encode_char(((b1 << 2) | (b2 >> 6)) & 63);
    dest[3] = encode_char(b2 & 63);
}

/// Number of characters an unpadded encoding of `src_len` bytes produces.
pub const fn encoded_len(src_len: usize) -> usize {
    let whole = src_len / 3;
    let rem = src_len % 3;
    whole * 4 + if rem == 0 { 0 } else { rem + 1 }
}

/// Decoded length of an unpadded source of `src_len` characters, or `None`
/// if `src_len` can't be a valid unpadded encoding (a length of `4k + 1`).
pub const fn decoded_len(src_len: usize) -> Option<usize> {
    if src_len % 4 == 1 {
        return None;
    }
    Some(3 * (src_len / 4) + (src_len % 4).saturating_sub(1))
}

/// Encode `src` into the dot-slash alphabet, without `=` padding.
///
/// `dest` must be at least [`encoded_len(src.len())`](encoded_len) bytes.
/// Returns the number of characters written.
pub fn encode(dest: &mut [u8], src: &[u8]) -> usize {
    let mut chunks = src.chunks_exact(3);
    let mut written = 0;
    for chunk in &mut chunks {
        let block: [u8; 3] = chunk.try_into().unwrap();
        let out: &mut [u8; 4] = (&mut dest[written..written + 4]).try_into().unwrap();
        encode3(out, &block);
        written += 4;
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let b0 = tail[0] as i32;
        let b1 = if tail.len() > 1 { tail[1] as i32 } else { 0 };

        dest[written] = encode_char(b0 >> 2);
        dest[written + 1] = encode_char(((b0 << 4) | (b1 >> 4)) & 63);
        if tail.len() > 1 {
            dest[written + 2] = encode_char((b1 << 2) & 63);
        }
        written += tail.len() + 1;
    }
    written
}

/// Encode `src` into a freshly allocated string-like byte vector.
pub fn encode_to_vec(src: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; encoded_len(src.len())];
    let written = encode(&mut out, src);
    out.truncate(written);
    out
}

/// Decode an unpadded dot-slash Base64 string.
///
/// `dest` must be at least [`decoded_len(src.len())`](decoded_len) bytes.
/// Returns the number of bytes written, or [`DecodeError`] if `src`
/// contains a character outside the alphabet, has an invalid length, or
/// leaves nonzero bits in the unused low bits of a tail character (a
/// non-canonical encoding `encode` would never produce). All characters are
/// visited regardless of where the first invalid one (if any) occurs.
pub fn decode(dest: &mut [u8], src: &[u8]) -> Result<usize, DecodeError> {
    if src.len() % 4 == 1 {
        return Err(DecodeError);
    }
    if src.is_empty() {
        return Ok(0);
    }

    let mut err = 0i32;
    let mut written = 0;
    let mut rest = src;

    while rest.len() > 4 {
        let block: [u8; 4] = rest[..4].try_into().unwrap();
        err |= decode3(&mut dest[written..written + 3], &block);
        written += 3;
        rest = &rest[4..];
    }

    // `rest.len()` is now 2, 3 or 4.
    let c0 = decode_char(rest[0]);
    let c1 = decode_char(rest[1]);
    err |= c0 | c1;
    dest[written] = ((c0 << 2) | (c1 >> 4)) as u8;

    if rest.len() >= 3 {
        let c2 = decode_char(rest[2]);
        err |= c2;
        dest[written + 1] = ((c1 << 4) | (c2 >> 2)) as u8;

        if rest.len() == 4 {
            let c3 = decode_char(rest[3]);
            err |= c3;
            dest[written + 2] = ((c2 << 6) | c3) as u8;
            written += 3;
        } else {
            // 3-char tail: c2's low 2 bits aren't part of the 2 decoded
            // bytes and must be zero.
            err |= c2 & 0x3;
            written += 2;
        }
    } else {
        // 2-char tail: c1's low 4 bits aren't part of the 1 decoded byte
        // and must be zero.
        err |= c1 & 0xf;
        written += 1;
    }

    if err >= 0 {
        Ok(written)
    } else {
        Err(DecodeError)
    }
}

/// Decode into a freshly allocated `Vec<u8>`.
pub fn decode_to_vec(src: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let len = decoded_len(src.len()).ok_or(DecodeError)?;
    let mut out = vec![0u8; len];
    let written = decode(&mut out, src)?;
    debug_assert_eq!(written, len);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_all_lengths() {
        let data: [u8; 16] = *b"0123456789abcdef";
        for len in 0..=data.len() {
            let src = &data[..len];
            let mut enc = vec![0u8; encoded_len(len)];
            let n = encode(&mut enc, src);
            assert_eq!(n, enc.len());

            let dec_len = decoded_len(enc.len()).unwrap();
            let mut dec = vec![0u8; dec_len];
            let n = decode(&mut dec, &enc).unwrap();
            assert_eq!(&dec[..n], src);
        }
    }

    #[test]
    fn alphabet_is_dot_slash_ordered() {
        let mut enc = [0u8; 4];
        encode3(&mut enc, &[0x00, 0x00, 0x00]);
        assert_eq!(&enc, b"....");

        let mut enc = [0u8; 4];
        encode3(&mut enc, &[0xff, 0xff, 0xff]);
        assert_eq!(&enc, b"zzzz");
    }

    #[test]
    fn rejects_invalid_characters() {
        let mut dest = [0u8; 3];
        assert!(decode(&mut dest, b"AB#D").is_err());
    }

    #[test]
    fn rejects_bad_length() {
        let mut dest = [0u8; 4];
        assert!(decode(&mut dest, b"A").is_err());
    }

    #[test]
    fn known_vector() {
        let mut enc = [0u8; 8];
        let n = encode(&mut enc, b"abcdef");
        assert_eq!(&enc[..n], b"MK7XN4Ja");
    }

    #[test]
    fn rejects_nonzero_pad_bits_in_two_char_tail() {
        // 'A' (value 12 = 0b001100) leaves nonzero low 4 bits unused by the
        // single decoded byte.
        let mut dest = [0u8; 1];
        assert!(decode(&mut dest, b".A").is_err());

        // '.' (value 0) has no unused bits set, so this tail is canonical.
        let mut dest = [0u8; 1];
        assert!(decode(&mut dest, b"..").is_ok());
    }

    #[test]
    fn rejects_nonzero_pad_bits_in_three_char_tail() {
        // '/' (value 1) leaves a nonzero low bit unused by the two decoded bytes.
        let mut dest = [0u8; 2];
        assert!(decode(&mut dest, b"../").is_err());

        let mut dest = [0u8; 2];
        assert!(decode(&mut dest, b"...").is_ok());
    }
}
