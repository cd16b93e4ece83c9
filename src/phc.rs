//! PHC-string encoding: `$bscrypt$m=<m>,t=<t>,p=<p>$<salt><hash>`, both
//! fields base64'd with the dot-slash alphabet and never padded.
//!
//! This is the layer most callers touch: [`hash`]/[`hash_with_salt`] derive
//! and encode a hash, [`verify`] re-derives one from a candidate password
//! and compares, [`needs_rehash`] checks whether a stored hash's cost
//! parameters still match a policy.

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use zeroize::Zeroize;

use crate::base64;
use crate::error::{Error, Result};
use crate::kdf::{self, Params};
use crate::params::{DEFAULT_HASH_SIZE, ENCRYPTED_HASH_MAX_SIZE, HASH_MAX_SIZE};
use crate::pepper::{self, Pepper};

const PREFIX: &[u8] = b"$bscrypt$m=";
const SALT_SIZE: usize = 16;

/// Parse a leading unsigned decimal integer from `s`, stopping at `ending`.
///
/// A leading `0` is only accepted if it's the entire field (`0` immediately
/// followed by `ending`) — `"0123"` is rejected even though it parses as a
/// number, to keep the encoding canonical. Returns `(value, digits_consumed)`.
fn read_uint32(s: &[u8], ending: u8) -> Option<(u32, usize)> {
    if s.is_empty() {
        return None;
    }
    if s[0] == b'0' {
        return if s.get(1) == Some(&ending) { Some((0, 1)) } else { None };
    }

    let mut value: u32 = 0;
    let mut i = 0;
    while i < s.len() && s[i].is_ascii_digit() {
        let digit = (s[i] - b'0') as u32;
        value = value.checked_mul(10)?.checked_add(digit)?;
        i += 1;
        if i > 10 {
            return None;
        }
    }
    if i == 0 || s.get(i) != Some(&ending) {
        return None;
    }
    Some((value, i))
}

/// Write `value` in decimal, returning the number of bytes written.
fn write_uint32(dest: &mut [u8; 10], value: u32) -> usize {
    if value == 0 {
        dest[0] = b'0';
        return 1;
    }
    let mut tmp = [0u8; 10];
    let mut n = 0;
    let mut v = value;
    while v > 0 {
        tmp[n] = b'0' + (v % 10) as u8;
        v /= 10;
        n += 1;
    }
    for i in 0..n {
        dest[i] = tmp[n - 1 - i];
    }
    n
}

fn push_uint32(out: &mut Vec<u8>, value: u32) {
    let mut buf = [0u8; 10];
    let n = write_uint32(&mut buf, value);
    out.extend_from_slice(&buf[..n]);
}

/// Parse the `$bscrypt$m=...,t=...,p=...$` prefix, returning the parsed
/// parameters and the byte offset of the first salt character.
fn decode_prefix(phc: &[u8]) -> Option<(Params, usize)> {
    let rest = phc.strip_prefix(PREFIX)?;
    let (m, n) = read_uint32(rest, b',')?;
    let rest = &rest[n + 1..];

    let rest = rest.strip_prefix(b"t=")?;
    let (t, n) = read_uint32(rest, b',')?;
    let rest = &rest[n + 1..];

    let rest = rest.strip_prefix(b"p=")?;
    let (p, n) = read_uint32(rest, b'$')?;

    let offset = phc.len() - rest.len() + n + 1;
    Some((Params { memory_kib: m, iterations: t, parallelism: p }, offset))
}

fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Derive and encode a PHC string using the given salt directly.
///
/// Most callers want [`hash`], which generates the salt itself; this entry
/// point exists for callers supplying their own entropy source.
pub fn hash_with_salt(
    password: &[u8],
    salt: &[u8; SALT_SIZE],
    params: Params,
    max_threads: usize,
    pepper: Option<&dyn Pepper>,
) -> Result<Vec<u8>> {
    let mut raw = [0u8; ENCRYPTED_HASH_MAX_SIZE];
    kdf::kdf(&mut raw[..DEFAULT_HASH_SIZE], password, salt, params, max_threads)?;

    let mut hash_len = DEFAULT_HASH_SIZE;
    if let Some(p) = pepper {
        hash_len = pepper::apply(p, &mut raw, hash_len)?;
    }

    let params = params.clamped();
    let mut out = Vec::with_capacity(HASH_MAX_SIZE);
    out.extend_from_slice(PREFIX);
    push_uint32(&mut out, params.memory_kib);
    out.extend_from_slice(b",t=");
    push_uint32(&mut out, params.iterations);
    out.extend_from_slice(b",p=");
    push_uint32(&mut out, params.parallelism);
    out.push(b'$');

    let mut salt_b64 = [0u8; 22];
    base64::encode(&mut salt_b64, salt);
    out.extend_from_slice(&salt_b64);

    let mut hash_b64 = vec![0u8; base64::encoded_len(hash_len)];
    let n = base64::encode(&mut hash_b64, &raw[..hash_len]);
    out.extend_from_slice(&hash_b64[..n]);

    raw.zeroize();
    Ok(out)
}

/// Derive and encode a PHC string, generating a fresh salt from `rng`.
pub fn hash<R: rand_core::RngCore + rand_core::CryptoRng>(
    password: &[u8],
    params: Params,
    max_threads: usize,
    pepper: Option<&dyn Pepper>,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_SIZE];
    rng.fill_bytes(&mut salt);
    let result = hash_with_salt(password, &salt, params, max_threads, pepper);
    salt.zeroize();
    result
}

/// Verify `password` against a PHC string, in constant time over the
/// re-derived hash.
///
/// Returns `Ok(())` on a match, [`Error::Mismatch`] on a clean mismatch, and
/// [`Error::ParseFailure`] if `phc` isn't a well-formed bscrypt string.
pub fn verify(phc: &[u8], password: &[u8], max_threads: usize, pepper: Option<&dyn Pepper>) -> Result<()> {
    let (params, offset) = decode_prefix(phc).ok_or(Error::ParseFailure)?;
    let salt_b64 = phc.get(offset..offset + 22).ok_or(Error::ParseFailure)?;

    let mut salt = [0u8; SALT_SIZE];
    base64::decode(&mut salt, salt_b64).map_err(|_| Error::ParseFailure)?;

    let candidate = hash_with_salt(password, &salt, params, max_threads, pepper);
    salt.zeroize();
    let candidate = candidate?;

    // Compare the whole encoded string at once (params and salt included,
    // not just the hash tail) so the check never branches on the secret
    // hash bytes specifically, and so it's correct regardless of how long
    // a pepper callback's output happens to be.
    if candidate.len() == phc.len() && ct_eq(&candidate, phc) {
        Ok(())
    } else {
        Err(Error::Mismatch)
    }
}

/// Whether a stored hash's cost parameters differ from `desired` (or the
/// string can't be parsed at all, in which case rehashing is the only way
/// to bring it up to date).
pub fn needs_rehash(phc: &[u8], desired: Params) -> bool {
    match decode_prefix(phc) {
        None => true,
        Some((params, _)) => params != desired.clamped(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Params {
        Params { memory_kib: crate::params::MEMORY_KIB_MIN, iterations: crate::params::ITERATIONS_MIN, parallelism: 1 }
    }

    #[test]
    fn read_uint32_rejects_leading_zero() {
        assert_eq!(read_uint32(b"0,", b','), Some((0, 1)));
        assert_eq!(read_uint32(b"0123,", b','), None);
        assert_eq!(read_uint32(b"123,", b','), Some((123, 3)));
        assert_eq!(read_uint32(b"123", b','), None);
    }

    #[test]
    fn read_uint32_rejects_overflow() {
        assert_eq!(read_uint32(b"4294967295,", b','), Some((u32::MAX, 10)));
        assert_eq!(read_uint32(b"4294967296,", b','), None);
        assert_eq!(read_uint32(b"99999999999,", b','), None);
    }

    #[test]
    fn hash_round_trips_through_verify() {
        let salt = [7u8; SALT_SIZE];
        let phc = hash_with_salt(b"hunter2", &salt, params(), 1, None).unwrap();
        assert!(phc.starts_with(PREFIX));
        assert!(verify(&phc, b"hunter2", 1, None).is_ok());
        assert_eq!(verify(&phc, b"wrong password", 1, None), Err(Error::Mismatch));
    }

    #[test]
    fn verify_rejects_malformed_strings() {
        assert_eq!(verify(b"not a bscrypt hash", b"x", 1, None), Err(Error::ParseFailure));
    }

    #[test]
    fn needs_rehash_flags_parameter_drift() {
        let salt = [1u8; SALT_SIZE];
        let phc = hash_with_salt(b"hunter2", &salt, params(), 1, None).unwrap();
        assert!(!needs_rehash(&phc, params()));

        let mut stronger = params();
        stronger.iterations += 1;
        assert!(needs_rehash(&phc, stronger));
        assert!(needs_rehash(b"garbage", params()));
    }

    #[test]
    fn encoded_params_survive_the_round_trip() {
        let salt = [3u8; SALT_SIZE];
        let mut p = params();
        p.memory_kib = 64;
        p.iterations = 5;
        p.parallelism = 2;
        let phc = hash_with_salt(b"hunter2", &salt, p, 1, None).unwrap();
        let (decoded, _) = decode_prefix(&phc).unwrap();
        assert_eq!(decoded, p);
    }
}
