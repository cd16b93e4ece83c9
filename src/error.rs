//! Error type returned by the KDF engine and the PHC encode/decode/verify layer.

use core::fmt;

/// Everything that can go wrong deriving, encoding or verifying a bscrypt hash.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// `memoryKiB * 1024` overflowed the platform's address space.
    ParameterOverflow,

    /// The scratchpad allocation failed (or would have exceeded the caller's limit).
    AllocationFailure,

    /// The configured entropy source could not produce a salt.
    EntropyFailure,

    /// A pepper/encrypt-hash callback produced more bytes than the output buffer holds.
    PepperOverflow,

    /// The PHC string was malformed: bad prefix, non-canonical integer, truncated field, ...
    ParseFailure,

    /// Verification ran to completion but the hashes did not match.
    Mismatch,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::ParameterOverflow => "memory cost overflows the platform's address space",
            Error::AllocationFailure => "scratchpad allocation failed",
            Error::EntropyFailure => "entropy source failed to fill the salt",
            Error::PepperOverflow => "pepper callback output exceeds the encrypted hash buffer",
            Error::ParseFailure => "malformed bscrypt PHC string",
            Error::Mismatch => "password does not match hash",
        })
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
