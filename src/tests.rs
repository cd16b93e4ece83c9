//! Integration tests spanning the whole pipeline.

use crate::kdf::{kdf, Params};
use crate::phc;

fn min_params() -> Params {
    Params { memory_kib: crate::params::MEMORY_KIB_MIN, iterations: crate::params::ITERATIONS_MIN, parallelism: 1 }
}

#[test]
fn kdf_output_is_avalanching() {
    let params = min_params();
    let mut a = [0u8; 32];
    let mut b = [0u8; 32];
    kdf(&mut a, b"correct horse battery staple", b"0123456789abcdef", params, 1).unwrap();
    kdf(&mut b, b"correct horse battery staple!", b"0123456789abcdef", params, 1).unwrap();

    let diff_bits: u32 = a.iter().zip(&b).map(|(x, y)| (x ^ y).count_ones()).sum();
    assert!((60..=196).contains(&diff_bits), "{diff_bits} bits differ, expected close to half of 256");
}

#[test]
fn lane_xor_combination_is_commutative_in_parallelism() {
    // Two lanes (parallelism=2) must XOR-combine to the same work value
    // regardless of how many worker threads computed them.
    let mut params = min_params();
    params.parallelism = 2;

    let mut one_thread = [0u8; 32];
    let mut two_threads = [0u8; 32];
    kdf(&mut one_thread, b"password", b"0123456789abcdef", params, 1).unwrap();
    kdf(&mut two_threads, b"password", b"0123456789abcdef", params, 2).unwrap();

    assert_eq!(one_thread, two_threads);
}

#[test]
fn end_to_end_hash_and_verify() {
    let salt = [9u8; 16];
    let phc_string = phc::hash_with_salt(b"correct password", &salt, min_params(), 1, None).unwrap();

    assert!(phc::verify(&phc_string, b"correct password", 1, None).is_ok());
    assert!(phc::verify(&phc_string, b"incorrect password", 1, None).is_err());
}

#[test]
fn stronger_params_trigger_rehash() {
    let salt = [2u8; 16];
    let weak = min_params();
    let phc_string = phc::hash_with_salt(b"pw", &salt, weak, 1, None).unwrap();

    assert!(!phc::needs_rehash(&phc_string, weak));

    let mut strong = weak;
    strong.memory_kib *= 2;
    assert!(phc::needs_rehash(&phc_string, strong));
}
