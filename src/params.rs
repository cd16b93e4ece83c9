//! Cost-parameter bounds and PHC string size limits.

/// Minimum memory cost, in KiB.
pub const MEMORY_KIB_MIN: u32 = 16;

/// Maximum memory cost, in KiB. 64 GiB.
pub const MEMORY_KIB_MAX: u32 = 67_108_864;

/// Minimum iteration count.
pub const ITERATIONS_MIN: u32 = 2;

/// Minimum parallelism (lane count).
pub const PARALLELISM_MIN: u32 = 1;

/// Largest encoded PHC string this crate will ever produce or accept.
///
/// `$bscrypt$m=67108864,t=4294967295,p=4294967295$salt..................hash............................`
pub const HASH_MAX_SIZE: usize = 112;

/// Upper bound a pepper callback's output must respect.
pub const ENCRYPTED_HASH_MAX_SIZE: usize = 32;

/// Size, in bytes, of one BLAKE2b/notBlake2b block.
pub const BLOCK_SIZE: usize = 128;

/// Number of 64-bit words per block.
pub const BLOCK_WORDS: usize = BLOCK_SIZE / 8;

/// Default salt length used by [`crate::phc::hash`] when the caller doesn't supply one.
pub const DEFAULT_SALT_SIZE: usize = 16;

/// Raw hash length produced by [`crate::phc::hash`] before any pepper callback runs.
pub const DEFAULT_HASH_SIZE: usize = 24;
