//! BLAKE2b (RFC 7693), unkeyed, with a streaming byte-oriented API.
//!
//! This is the hash the KDF engine uses both to derive the initial seed
//! from `(password, salt, params)` and to expand the mixed work buffer into
//! the final output. No key support is needed anywhere in bscrypt, so it
//! isn't implemented here.

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use zeroize::Zeroize;

/// Block size in bytes.
pub const BLOCK_SIZE: usize = 128;

/// Largest digest this implementation produces.
pub const MAX_OUT_SIZE: usize = 64;

const IV: [u64; 8] = [
    0x6a09e667f3bcc908,
    0xbb67ae8584caa73b,
    0x3c6ef372fe94f82b,
    0xa54ff53a5f1d36f1,
    0x510e527fade682d1,
    0x9b05688c2b3e6c1f,
    0x1f83d9abfb41bd6b,
    0x5be0cd19137e2179,
];

const SIGMA: [[usize; 16]; 12] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
    [11, 8, 12, 0, 5, 2, 15, 13, 10, 14, 3, 6, 7, 1, 9, 4],
    [7, 9, 3, 1, 13, 12, 11, 14, 2, 6, 5, 10, 4, 0, 15, 8],
    [9, 0, 5, 7, 2, 4, 10, 15, 14, 1, 11, 12, 6, 8, 3, 13],
    [2, 12, 6, 10, 0, 11, 8, 3, 4, 13, 7, 5, 15, 14, 1, 9],
    [12, 5, 1, 15, 14, 13, 4, 10, 0, 7, 6, 3, 9, 2, 8, 11],
    [13, 11, 7, 14, 12, 1, 3, 9, 5, 0, 15, 4, 8, 6, 2, 10],
    [6, 15, 14, 9, 11, 3, 0, 8, 12, 2, 13, 7, 1, 4, 10, 5],
    [10, 2, 8, 4, 7, 6, 1, 5, 15, 11, 9, 14, 3, 12, 13, 0],
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
];

#[inline(always)]
fn mix(v: &mut [u64; 16], a: usize, b: usize, c: usize, d: usize, m0: u64, m1: u64) {
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(m0);
    v[d] = (v[d] ^ v[a]).rotate_right(32);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(24);
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(m1);
    v[d] = (v[d] ^ v[a]).rotate_right(16);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(63);
}

fn compress(state: &mut [u64; 8], msg: &[u64; 16], bytes_lo: u64, bytes_hi: u64, last: u64) {
    let mut v = [0u64; 16];
    v[..8].copy_from_slice(state);
    v[8..].copy_from_slice(&IV);
    v[12] ^= bytes_lo;
    v[13] ^= bytes_hi;
    v[14] ^= last;

    for sigma in &SIGMA {
        mix(&mut v, 0, 4, 8, 12, msg[sigma[0]], msg[sigma[1]]);
        mix(&mut v, 1, 5, 9, 13, msg[sigma[2]], msg[sigma[3]]);
        mix(&mut v, 2, 6, 10, 14, msg[sigma[4]], msg[sigma[5]]);
        mix(&mut v, 3, 7, 11, 15, msg[sigma[6]], msg[sigma[7]]);

        mix(&mut v, 0, 5, 10, 15, msg[sigma[8]], msg[sigma[9]]);
        mix(&mut v, 1, 6, 11, 12, msg[sigma[10]], msg[sigma[11]]);
        mix(&mut v, 2, 7, 8, 13, msg[sigma[12]], msg[sigma[13]]);
        mix(&mut v, 3, 4, 9, 14, msg[sigma[14]], msg[sigma[15]]);
    }

    for i in 0..8 {
        state[i] ^= v[i] ^ v[i + 8];
    }
}

fn words_from_block(block: &[u8; BLOCK_SIZE]) -> [u64; 16] {
    let mut words = [0u64; 16];
    for (w, chunk) in words.iter_mut().zip(block.chunks_exact(8)) {
        *w = u64::from_le_bytes(chunk.try_into().unwrap());
    }
    words
}

/// A running BLAKE2b computation.
pub struct Blake2b {
    state: [u64; 8],
    block: [u8; BLOCK_SIZE],
    buf_len: usize,
    bytes_lo: u64,
    bytes_hi: u64,
    out_size: usize,
}

impl Blake2b {
    /// Start a new unkeyed hash producing `out_size` bytes (1..=64).
    pub fn new(out_size: usize) -> Self {
        debug_assert!(out_size >= 1 && out_size <= MAX_OUT_SIZE);
        let mut state = IV;
        state[0] ^= 0x01010000 ^ out_size as u64;
        Self {
            state,
            block: [0u8; BLOCK_SIZE],
            buf_len: 0,
            bytes_lo: 0,
            bytes_hi: 0,
            out_size,
        }
    }

    fn absorb_block(&mut self, last: u64) {
        let words = words_from_block(&self.block);
        compress(&mut self.state, &words, self.bytes_lo, self.bytes_hi, last);
    }

    /// Feed more input into the hash.
    pub fn update(&mut self, mut msg: &[u8]) {
        if msg.is_empty() {
            return;
        }

        let mut block_left = BLOCK_SIZE - self.buf_len;
        if self.buf_len == 0 && (self.bytes_lo != 0 || self.bytes_hi != 0) {
            block_left = 0;
        }

        while msg.len() > block_left {
            self.block[self.buf_len..self.buf_len + block_left].copy_from_slice(&msg[..block_left]);
            self.bytes_lo = self.bytes_lo.wrapping_add(block_left as u64);
            if self.bytes_lo < block_left as u64 {
                self.bytes_hi += 1;
            }
            self.absorb_block(0);

            msg = &msg[block_left..];
            self.buf_len = 0;
            block_left = BLOCK_SIZE;
        }

        if !msg.is_empty() {
            self.block[self.buf_len..self.buf_len + msg.len()].copy_from_slice(msg);
            self.bytes_lo = self.bytes_lo.wrapping_add(msg.len() as u64);
            if self.bytes_lo < msg.len() as u64 {
                self.bytes_hi += 1;
            }
            self.buf_len += msg.len();
        }
    }

    /// Consume the hasher and write the digest to `out` (`out.len()` must equal the
    /// `out_size` passed to [`Blake2b::new`]).
    pub fn finish(mut self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.out_size);
        // update() only clears buf_len on a full-block absorb, not the buffer
        // itself, so the tail can hold stale bytes from whatever was absorbed
        // before it. Zero it so the final block is padded the way RFC 7693
        // requires, not with leftover message bytes.
        for b in &mut self.block[self.buf_len..] {
            *b = 0;
        }
        self.absorb_block(0xffffffffffffffff);

        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.state[i / 8] as u8;
            self.state[i / 8] >>= 8;
        }
    }
}

impl Drop for Blake2b {
    fn drop(&mut self) {
        self.state.zeroize();
        self.block.zeroize();
    }
}

/// One-shot BLAKE2b: hash `msg` into a digest of `out.len()` bytes (1..=64).
pub fn hash(out: &mut [u8], msg: &[u8]) {
    let mut h = Blake2b::new(out.len());
    h.update(msg);
    h.finish(out);
}

/// One-shot BLAKE2b into a freshly allocated vector.
pub fn hash_to_vec(out_size: usize, msg: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; out_size];
    hash(&mut out, msg);
    out
}
