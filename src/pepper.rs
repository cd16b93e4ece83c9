//! The optional "pepper" step: a deterministic, caller-supplied transform
//! applied to the raw KDF output before it's encoded into the PHC string.
//!
//! This mirrors an HSM-backed or server-side-secret encryption step bolted
//! onto the hash so that a leaked PHC string alone isn't enough to brute
//! force the password offline. bscrypt treats it purely as an interface:
//! it has no opinion on what the pepper actually does, only that it's
//! deterministic (the same hash bytes always produce the same output, or
//! verification would never succeed) and bounded in size.

use crate::error::{Error, Result};
use crate::params::ENCRYPTED_HASH_MAX_SIZE;

/// A deterministic post-processing step run on the raw KDF output.
///
/// Implementations must be pure functions of `hash`: [`crate::phc::verify`]
/// calls this again on a freshly derived hash and compares byte for byte.
pub trait Pepper {
    /// Transform `hash[..hash_len]` in place and return the new length.
    ///
    /// The returned length must not exceed [`ENCRYPTED_HASH_MAX_SIZE`].
    fn apply(&self, hash: &mut [u8; ENCRYPTED_HASH_MAX_SIZE], hash_len: usize) -> usize;
}

/// Run `pepper` over `hash[..hash_len]`, enforcing the size bound.
pub(crate) fn apply(pepper: &dyn Pepper, hash: &mut [u8; ENCRYPTED_HASH_MAX_SIZE], hash_len: usize) -> Result<usize> {
    let new_len = pepper.apply(hash, hash_len);
    if new_len > ENCRYPTED_HASH_MAX_SIZE {
        return Err(Error::PepperOverflow);
    }
    Ok(new_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct XorPepper(u8);

    impl Pepper for XorPepper {
        fn apply(&self, hash: &mut [u8; ENCRYPTED_HASH_MAX_SIZE], hash_len: usize) -> usize {
            for b in &mut hash[..hash_len] {
                *b ^= self.0;
            }
            hash_len
        }
    }

    struct OverflowingPepper;

    impl Pepper for OverflowingPepper {
        fn apply(&self, _hash: &mut [u8; ENCRYPTED_HASH_MAX_SIZE], _hash_len: usize) -> usize {
            ENCRYPTED_HASH_MAX_SIZE + 1
        }
    }

    #[test]
    fn deterministic_pepper_round_trips() {
        let pepper = XorPepper(0x5a);
        let mut buf = [0u8; ENCRYPTED_HASH_MAX_SIZE];
        buf[..24].copy_from_slice(&[7u8; 24]);
        let len = apply(&pepper, &mut buf, 24).unwrap();
        assert_eq!(len, 24);
        assert_eq!(buf[0], 7 ^ 0x5a);
    }

    #[test]
    fn oversized_output_is_rejected() {
        let mut buf = [0u8; ENCRYPTED_HASH_MAX_SIZE];
        assert_eq!(apply(&OverflowingPepper, &mut buf, 24), Err(Error::PepperOverflow));
    }
}
