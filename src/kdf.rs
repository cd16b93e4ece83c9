//! The memory-hard mixing engine: S-box fill, the 32x4 inner core, lane
//! combination, and output expansion.
//!
//! None of this module deals with passwords, salts as strings, or the PHC
//! encoding — it only knows about byte/word buffers and cost parameters.
//! [`crate::phc`] is the layer that turns this into `hash`/`verify`.

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use zeroize::Zeroize;

use crate::blake2b;
use crate::error::{Error, Result};
use crate::notblake2b;
use crate::params::{ITERATIONS_MIN, MEMORY_KIB_MAX, MEMORY_KIB_MIN, PARALLELISM_MIN};

/// Cost parameters: memory (`m`, KiB), iterations (`t`), parallelism (`p`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Params {
    /// Clamp every field into its valid range. Parameters are never rejected,
    /// only pulled back in range, so a hash can always be produced.
    pub fn clamped(self) -> Self {
        Self {
            memory_kib: self.memory_kib.clamp(MEMORY_KIB_MIN, MEMORY_KIB_MAX),
            iterations: self.iterations.max(ITERATIONS_MIN),
            parallelism: self.parallelism.max(PARALLELISM_MIN),
        }
    }
}

/// Number of 64-bit words in one lane's scratchpad, derived from `memory_kib`.
fn word_count(memory_kib: u32) -> Result<usize> {
    (memory_kib as usize)
        .checked_mul(1024 / 8)
        .ok_or(Error::ParameterOverflow)
}

/// Largest index reachable by a 32-bit (`word >> 32`) address component.
const MAX_32BIT_INDEX: usize = 1 << 32;

/// Split `count` words into the two overlapping halves (`s0`, `s1`) addressed
/// by the inner mixing core, returning `(sbox_offset, mask)`.
///
/// `s0` is `sbox[0..][& mask]`, `s1` is `sbox[sbox_offset..][& mask]`. Both
/// halves are views into the same underlying buffer; at sizes below the
/// full 64 GiB ceiling they deliberately overlap. The address into each half
/// comes from 32 bits of a mixing word, so `mask` (and therefore `sbox_size`)
/// can never exceed `2^32` without wasting unreachable S-box memory — when
/// `count` itself would require it, the S-box is split into two disjoint
/// halves of `count / 2` instead of one oversized power-of-two region.
fn sbox_layout(count: usize) -> (usize, usize) {
    let sbox_size = 1usize << (usize::BITS - 1 - (count as u64).leading_zeros() as u32);
    if sbox_size > MAX_32BIT_INDEX {
        let half = count / 2;
        (half, half - 1)
    } else {
        (count - sbox_size, sbox_size - 1)
    }
}

/// Hash an arbitrary byte message into `out.len()` 64-bit little-endian words.
fn hash_into(out: &mut [u64], msg: &[u8]) {
    let mut digest = vec![0u8; out.len() * 8];
    blake2b::hash(&mut digest, msg);
    for (w, chunk) in out.iter_mut().zip(digest.chunks_exact(8)) {
        *w = u64::from_le_bytes(chunk.try_into().unwrap());
    }
    digest.zeroize();
}

/// Hash a whole-word message (no partial trailing word) into `out.len()` words.
fn hash_words_into(out: &mut [u64], words: &[u64]) {
    let mut bytes = vec![0u8; words.len() * 8];
    for (chunk, w) in bytes.chunks_exact_mut(8).zip(words) {
        chunk.copy_from_slice(&w.to_le_bytes());
    }
    hash_into(out, &bytes);
    bytes.zeroize();
}

/// Fill `sbox` (length `count`) with pseudo-random material derived from
/// `seed` and `thread_id`: the first 16 words come from two chained BLAKE2b
/// calls — the first over the 68-byte message `seed ‖ thread_id` (64 seed
/// bytes plus the 4-byte little-endian lane index, *not* a whole extra
/// word), the second over the resulting 8 words — everything after is
/// expanded by repeatedly copying the previous 16-word block forward and
/// running it through [`notblake2b::permute`].
fn fill(sbox: &mut [u64], seed: &[u64; 8], thread_id: u32) {
    let count = sbox.len();

    let mut seed_msg = [0u8; 8 * 8 + 4];
    for (chunk, w) in seed_msg[..64].chunks_exact_mut(8).zip(seed) {
        chunk.copy_from_slice(&w.to_le_bytes());
    }
    seed_msg[64..].copy_from_slice(&thread_id.to_le_bytes());

    let mut head = [0u64; 8];
    hash_into(&mut head, &seed_msg);
    sbox[..8].copy_from_slice(&head);
    hash_words_into(&mut head, &sbox[..8]);
    sbox[8..16].copy_from_slice(&head);
    seed_msg.zeroize();

    let mut offset = 0;
    while offset < count - 16 {
        let (left, right) = sbox.split_at_mut(offset + 16);
        let block: &mut [u64; 16] = (&mut right[..16]).try_into().unwrap();
        block.copy_from_slice(&left[offset..offset + 16]);
        notblake2b::permute(block);
        offset += 16;
    }
}

/// Fold the (now mixed) `sbox` (length `count`) down into an 8-word work
/// value, seeded with `iv` from the inner core's final lane state.
fn finish(sbox: &mut [u64], iv: u64) -> [u64; 8] {
    let count = sbox.len();
    for i in 0..16 {
        sbox[i] = sbox[i].wrapping_add(iv) ^ sbox[i + 16];
    }

    let mut i = 32;
    while i < count {
        for k in 0..16 {
            sbox[k] = sbox[k].wrapping_add(sbox[i + k]) ^ sbox[i + 16 + k];
        }
        i += 32;
    }

    let mut work = [0u64; 8];
    hash_words_into(&mut work, &sbox[..16]);
    work
}

/// Run the full single-lane computation: fill the S-box, run `iterations`
/// passes of the 32x4 inner core, fold the result into an 8-word work value.
///
/// `sbox` must be exactly `count` words long.
fn lane(seed: &[u64; 8], sbox: &mut [u64], sbox_offset: usize, mask: usize, iterations: u32, thread_id: u32) -> [u64; 8] {
    let count = sbox.len();
    fill(sbox, seed, thread_id);

    let mut combined = [0u64; 16];
    combined[..8].copy_from_slice(&sbox[count - 8..count]);
    combined[8..].copy_from_slice(&sbox[..8]);

    let mut state = [0u64; 8];
    hash_words_into(&mut state, &combined);
    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = state;

    for _ in 0..iterations {
        let mut j = 0usize;
        while j < count {
            a ^= sbox[j];
            b ^= sbox[j + 1];
            c ^= sbox[j + 2];
            d ^= sbox[j + 3];
            e ^= sbox[j + 4];
            f ^= sbox[j + 5];
            g ^= sbox[j + 6];
            h ^= sbox[j + 7];

            macro_rules! s0 {
                ($w:expr) => {
                    sbox[(($w >> 32) as usize) & mask]
                };
            }
            macro_rules! s1 {
                ($w:expr) => {
                    sbox[sbox_offset + (($w as usize) & mask)]
                };
            }

            a = a.wrapping_add(s0!(e));
            a ^= s1!(e);
            b = b.wrapping_add(s0!(f));
            b ^= s1!(f);
            c = c.wrapping_add(s0!(g));
            c ^= s1!(g);
            d = d.wrapping_add(s0!(h));
            d ^= s1!(h);
            e = e.wrapping_add(s0!(a));
            e ^= s1!(a);
            f = f.wrapping_add(s0!(b));
            f ^= s1!(b);
            g = g.wrapping_add(s0!(c));
            g ^= s1!(c);
            h = h.wrapping_add(s0!(d));
            h ^= s1!(d);

            a = a.wrapping_add(s0!(f));
            a ^= s1!(f);
            b = b.wrapping_add(s0!(g));
            b ^= s1!(g);
            c = c.wrapping_add(s0!(h));
            c ^= s1!(h);
            d = d.wrapping_add(s0!(e));
            d ^= s1!(e);
            f = f.wrapping_add(s0!(a));
            f ^= s1!(a);
            g = g.wrapping_add(s0!(b));
            g ^= s1!(b);
            h = h.wrapping_add(s0!(c));
            h ^= s1!(c);
            e = e.wrapping_add(s0!(d));
            e ^= s1!(d);

            a = a.wrapping_add(s0!(g));
            a ^= s1!(g);
            b = b.wrapping_add(s0!(h));
            b ^= s1!(h);
            c = c.wrapping_add(s0!(e));
            c ^= s1!(e);
            d = d.wrapping_add(s0!(f));
            d ^= s1!(f);
            g = g.wrapping_add(s0!(a));
            g ^= s1!(a);
            h = h.wrapping_add(s0!(b));
            h ^= s1!(b);
            e = e.wrapping_add(s0!(c));
            e ^= s1!(c);
            f = f.wrapping_add(s0!(d));
            f ^= s1!(d);

            a = a.wrapping_add(s0!(h));
            a ^= s1!(h);
            b = b.wrapping_add(s0!(e));
            b ^= s1!(e);
            c = c.wrapping_add(s0!(f));
            c ^= s1!(f);
            d = d.wrapping_add(s0!(g));
            d ^= s1!(g);
            h = h.wrapping_add(s0!(a));
            h ^= s1!(a);
            e = e.wrapping_add(s0!(b));
            e ^= s1!(b);
            f = f.wrapping_add(s0!(c));
            f ^= s1!(c);
            g = g.wrapping_add(s0!(d));
            g ^= s1!(d);

            sbox[j] = sbox[j].wrapping_add(f);
            sbox[j + 1] = sbox[j + 1].wrapping_add(g);
            sbox[j + 2] = sbox[j + 2].wrapping_add(h);
            sbox[j + 3] = sbox[j + 3].wrapping_add(e);
            sbox[j + 4] = sbox[j + 4].wrapping_add(b);
            sbox[j + 5] = sbox[j + 5].wrapping_add(c);
            sbox[j + 6] = sbox[j + 6].wrapping_add(d);
            sbox[j + 7] = sbox[j + 7].wrapping_add(a);

            a = a.rotate_right(15);
            b = b.rotate_right(35);
            c = c.rotate_right(17);
            d = d.rotate_right(41);

            j += 8;
            a = a.wrapping_add(sbox[j]);
            b = b.wrapping_add(sbox[j + 1]);
            c = c.wrapping_add(sbox[j + 2]);
            d = d.wrapping_add(sbox[j + 3]);
            e = e.wrapping_add(sbox[j + 4]);
            f = f.wrapping_add(sbox[j + 5]);
            g = g.wrapping_add(sbox[j + 6]);
            h = h.wrapping_add(sbox[j + 7]);

            a ^= s0!(e);
            a = a.wrapping_add(s1!(e));
            b ^= s0!(f);
            b = b.wrapping_add(s1!(f));
            c ^= s0!(g);
            c = c.wrapping_add(s1!(g));
            d ^= s0!(h);
            d = d.wrapping_add(s1!(h));
            e ^= s0!(a);
            e = e.wrapping_add(s1!(a));
            f ^= s0!(b);
            f = f.wrapping_add(s1!(b));
            g ^= s0!(c);
            g = g.wrapping_add(s1!(c));
            h ^= s0!(d);
            h = h.wrapping_add(s1!(d));

            a ^= s0!(f);
            a = a.wrapping_add(s1!(f));
            b ^= s0!(g);
            b = b.wrapping_add(s1!(g));
            c ^= s0!(h);
            c = c.wrapping_add(s1!(h));
            d ^= s0!(e);
            d = d.wrapping_add(s1!(e));
            f ^= s0!(a);
            f = f.wrapping_add(s1!(a));
            g ^= s0!(b);
            g = g.wrapping_add(s1!(b));
            h ^= s0!(c);
            h = h.wrapping_add(s1!(c));
            e ^= s0!(d);
            e = e.wrapping_add(s1!(d));

            a ^= s0!(g);
            a = a.wrapping_add(s1!(g));
            b ^= s0!(h);
            b = b.wrapping_add(s1!(h));
            c ^= s0!(e);
            c = c.wrapping_add(s1!(e));
            d ^= s0!(f);
            d = d.wrapping_add(s1!(f));
            g ^= s0!(a);
            g = g.wrapping_add(s1!(a));
            h ^= s0!(b);
            h = h.wrapping_add(s1!(b));
            e ^= s0!(c);
            e = e.wrapping_add(s1!(c));
            f ^= s0!(d);
            f = f.wrapping_add(s1!(d));

            a ^= s0!(h);
            a = a.wrapping_add(s1!(h));
            b ^= s0!(e);
            b = b.wrapping_add(s1!(e));
            c ^= s0!(f);
            c = c.wrapping_add(s1!(f));
            d ^= s0!(g);
            d = d.wrapping_add(s1!(g));
            h ^= s0!(a);
            h = h.wrapping_add(s1!(a));
            e ^= s0!(b);
            e = e.wrapping_add(s1!(b));
            f ^= s0!(c);
            f = f.wrapping_add(s1!(c));
            g ^= s0!(d);
            g = g.wrapping_add(s1!(d));

            sbox[j] ^= f;
            sbox[j + 1] ^= g;
            sbox[j + 2] ^= h;
            sbox[j + 3] ^= e;
            sbox[j + 4] ^= b;
            sbox[j + 5] ^= c;
            sbox[j + 6] ^= d;
            sbox[j + 7] ^= a;

            e = e.rotate_right(21);
            f = f.rotate_right(45);
            g = g.rotate_right(27);
            h = h.rotate_right(47);

            j += 8;
        }
    }

    let iv = ((((((h ^ g).wrapping_add(f)) ^ e).wrapping_add(d)) ^ c).wrapping_add(b)) ^ a;
    finish(&mut sbox[..count], iv)
}

/// Derive `seed = BLAKE2b(BLAKE2b(salt) || password)`, 8 words (64 bytes).
fn derive_seed(password: &[u8], salt: &[u8]) -> [u64; 8] {
    let mut salt_hash = [0u8; 64];
    blake2b::hash(&mut salt_hash, salt);

    let mut h = blake2b::Blake2b::new(64);
    h.update(&salt_hash);
    h.update(password);
    let mut seed_bytes = [0u8; 64];
    h.finish(&mut seed_bytes);

    let mut seed = [0u64; 8];
    for (w, chunk) in seed.iter_mut().zip(seed_bytes.chunks_exact(8)) {
        *w = u64::from_le_bytes(chunk.try_into().unwrap());
    }
    seed_bytes.zeroize();
    seed
}

/// Expand `work || seed` (16 words) into `output`, incrementing a counter
/// word XORed into `work[0]` for every 64 bytes beyond the first.
fn expand_output(output: &mut [u8], work: [u64; 8], seed: [u64; 8]) {
    let mut work_seed = [0u64; 16];
    work_seed[..8].copy_from_slice(&work);
    work_seed[8..].copy_from_slice(&seed);

    let mut counter = 1u64;
    let mut chunks = output.chunks_mut(64);
    let mut first = true;
    for chunk in &mut chunks {
        if !first {
            work_seed[0] ^= counter;
            counter += 1;
        }
        first = false;

        let mut bytes = vec![0u8; work_seed.len() * 8];
        for (b, w) in bytes.chunks_exact_mut(8).zip(work_seed) {
            b.copy_from_slice(&w.to_le_bytes());
        }
        let mut digest = [0u8; 64];
        blake2b::hash(&mut digest[..chunk.len().min(64)], &bytes);
        chunk.copy_from_slice(&digest[..chunk.len()]);
        bytes.zeroize();
    }
    work_seed.zeroize();
}

/// Run the memory-hard KDF, writing `output.len()` derived bytes.
///
/// `max_threads` caps how many OS threads cooperate on the `parallelism`
/// lanes; lanes are claimed from a shared counter guarded by one mutex, the
/// same mutex that guards the XOR-accumulated work buffer, so the result is
/// identical no matter how many threads actually ran.
pub fn kdf(output: &mut [u8], password: &[u8], salt: &[u8], params: Params, max_threads: usize) -> Result<()> {
    let params = params.clamped();
    let count = word_count(params.memory_kib)?;
    let (sbox_offset, mask) = sbox_layout(count);

    let seed = derive_seed(password, salt);

    let max_threads = max_threads.clamp(1, params.parallelism as usize);
    let work = if max_threads <= 1 {
        run_sequential(&seed, &params, sbox_offset, count, mask)
    } else {
        #[cfg(feature = "std")]
        {
            run_parallel(&seed, &params, sbox_offset, count, mask, max_threads)
        }
        #[cfg(not(feature = "std"))]
        {
            run_sequential(&seed, &params, sbox_offset, count, mask)
        }
    };

    expand_output(output, work, seed);
    Ok(())
}

fn run_sequential(seed: &[u64; 8], params: &Params, sbox_offset: usize, count: usize, mask: usize) -> [u64; 8] {
    let mut sbox = vec![0u64; count];
    let mut work = [0u64; 8];
    for lane_id in 0..params.parallelism {
        let lane_out = lane(seed, &mut sbox, sbox_offset, mask, params.iterations, lane_id);
        for i in 0..8 {
            work[i] ^= lane_out[i];
        }
    }
    sbox.zeroize();
    work
}

#[cfg(feature = "std")]
fn run_parallel(seed: &[u64; 8], params: &Params, sbox_offset: usize, count: usize, mask: usize, max_threads: usize) -> [u64; 8] {
    use std::sync::{Arc, Mutex};
    use std::thread;

    struct Shared {
        next_lane: u32,
        work: [u64; 8],
    }

    let shared = Arc::new(Mutex::new(Shared { next_lane: 0, work: [0u64; 8] }));
    let parallelism = params.parallelism;
    let iterations = params.iterations;

    let mut handles = Vec::with_capacity(max_threads);
    let mut spawned = 0usize;
    for _ in 0..max_threads {
        let shared = Arc::clone(&shared);
        let seed = *seed;
        match thread::Builder::new().spawn(move || {
            let mut sbox = vec![0u64; count];
            loop {
                let lane_id = {
                    let mut guard = shared.lock().unwrap();
                    if guard.next_lane >= parallelism {
                        break;
                    }
                    let id = guard.next_lane;
                    guard.next_lane += 1;
                    id
                };

                let lane_out = lane(&seed, &mut sbox, sbox_offset, mask, iterations, lane_id);

                let mut guard = shared.lock().unwrap();
                for i in 0..8 {
                    guard.work[i] ^= lane_out[i];
                }
            }
            sbox.zeroize();
        }) {
            Ok(handle) => {
                handles.push(handle);
                spawned += 1;
            }
            Err(_) => break,
        }
    }

    if spawned == 0 {
        return run_sequential(seed, params, sbox_offset, count, mask);
    }

    for handle in handles {
        let _ = handle.join();
    }

    // Every spawned thread above has joined, so this is the last strong
    // reference to `shared`.
    Arc::try_unwrap(shared).unwrap().into_inner().unwrap().work
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamping_never_rejects() {
        let p = Params { memory_kib: 0, iterations: 0, parallelism: 0 }.clamped();
        assert_eq!(p.memory_kib, MEMORY_KIB_MIN);
        assert_eq!(p.iterations, ITERATIONS_MIN);
        assert_eq!(p.parallelism, PARALLELISM_MIN);

        let p = Params { memory_kib: u32::MAX, iterations: u32::MAX, parallelism: u32::MAX }.clamped();
        assert_eq!(p.memory_kib, MEMORY_KIB_MAX);
    }

    #[test]
    fn sbox_layout_keeps_mask_within_32_bits() {
        for memory_kib in [MEMORY_KIB_MIN, 64, 4096, MEMORY_KIB_MAX] {
            let count = word_count(memory_kib).unwrap();
            let (offset, mask) = sbox_layout(count);
            assert!(mask < MAX_32BIT_INDEX);
            assert!(offset + mask < count + mask.max(count));
        }
    }

    #[test]
    fn kdf_is_deterministic() {
        let params = Params { memory_kib: MEMORY_KIB_MIN, iterations: ITERATIONS_MIN, parallelism: 1 };
        let mut out1 = [0u8; 32];
        let mut out2 = [0u8; 32];
        kdf(&mut out1, b"password", b"saltsaltsaltsalt", params, 1).unwrap();
        kdf(&mut out2, b"password", b"saltsaltsaltsalt", params, 1).unwrap();
        assert_eq!(out1, out2);
    }

    #[test]
    fn kdf_output_depends_on_password_and_salt() {
        let params = Params { memory_kib: MEMORY_KIB_MIN, iterations: ITERATIONS_MIN, parallelism: 1 };
        let mut out1 = [0u8; 32];
        let mut out2 = [0u8; 32];
        kdf(&mut out1, b"password1", b"saltsaltsaltsalt", params, 1).unwrap();
        kdf(&mut out2, b"password2", b"saltsaltsaltsalt", params, 1).unwrap();
        assert_ne!(out1, out2);
    }

    #[test]
    fn kdf_is_independent_of_thread_count() {
        let params = Params { memory_kib: MEMORY_KIB_MIN, iterations: ITERATIONS_MIN, parallelism: 4 };
        let mut sequential = [0u8; 32];
        let mut threaded = [0u8; 32];
        kdf(&mut sequential, b"password", b"saltsaltsaltsalt", params, 1).unwrap();
        kdf(&mut threaded, b"password", b"saltsaltsaltsalt", params, 4).unwrap();
        assert_eq!(sequential, threaded);
    }

    #[test]
    fn output_longer_than_one_block_is_supported() {
        let params = Params { memory_kib: MEMORY_KIB_MIN, iterations: ITERATIONS_MIN, parallelism: 1 };
        let mut out = [0u8; 130];
        kdf(&mut out, b"password", b"saltsaltsaltsalt", params, 1).unwrap();
        assert!(out.iter().any(|&b| b != 0));
    }
}
