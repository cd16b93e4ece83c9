//! # bscrypt
//!
//! A memory-hard password hashing and key derivation function.
//!
//! bscrypt mixes a large scratchpad (the S-box) derived from the password
//! and salt through a wide, GPU/ASIC-hostile inner core, optionally across
//! several independent lanes, then expands the combined result into an
//! output of any length. Cost scales along three independent axes:
//!
//! - `m` — memory, in KiB (16 KiB .. 64 GiB)
//! - `t` — iterations over the scratchpad (>= 2)
//! - `p` — parallel lanes (>= 1)
//!
//! ## Example
//!
//! ```rust
//! use bscrypt::{Params, phc};
//! use rand_core::OsRng;
//!
//! let params = Params { memory_kib: 1024, iterations: 3, parallelism: 1 };
//! let hash = phc::hash(b"hunter2", params, 1, None, &mut OsRng).unwrap();
//!
//! assert!(phc::verify(&hash, b"hunter2", 1, None).is_ok());
//! assert!(phc::verify(&hash, b"wrong password", 1, None).is_err());
//! ```
//!
//! ## `no_std` support
//!
//! With `default-features = false`, this crate builds under `no_std` plus
//! `alloc`. The lane worker pool (which needs `std::thread`) then falls
//! back to running every lane on the calling thread; the result is
//! identical either way, just slower.
//!
//! ```toml
//! [dependencies]
//! bscrypt = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod base64;
pub mod blake2b;
mod error;
pub mod kdf;
mod notblake2b;
pub mod params;
pub mod pepper;
pub mod phc;

pub use error::{Error, Result};
pub use kdf::{kdf, Params};
pub use pepper::Pepper;

#[cfg(test)]
mod tests;
