//! bscrypt command-line tool.
//!
//! # Commands
//!
//! - `hash` - Hash a password, printing the PHC string
//! - `verify` - Check a password against a PHC string
//! - `benchmark` - Time a hash at given cost parameters

use std::io::Read;
use std::time::Instant;

use clap::{Parser, Subcommand};
use rand_core::OsRng;

use bscrypt::kdf::Params;
use bscrypt::phc;

#[derive(Parser)]
#[command(name = "bscrypt")]
#[command(version = "0.1.0")]
#[command(about = "Memory-hard password hashing and key derivation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a password read from stdin, printing a PHC string
    Hash {
        /// Memory cost, in KiB
        #[arg(short = 'm', long, default_value = "65536")]
        memory_kib: u32,

        /// Iteration count
        #[arg(short = 't', long, default_value = "3")]
        iterations: u32,

        /// Parallelism (lane count)
        #[arg(short = 'p', long, default_value = "1")]
        parallelism: u32,

        /// Number of worker threads to use (default: parallelism)
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Verify a password (read from stdin) against a PHC string
    Verify {
        /// The PHC string to verify against
        hash: String,

        /// Number of worker threads to use
        #[arg(long, default_value = "1")]
        threads: usize,
    },

    /// Time one hash at the given cost parameters
    Benchmark {
        #[arg(short = 'm', long, default_value = "65536")]
        memory_kib: u32,

        #[arg(short = 't', long, default_value = "3")]
        iterations: u32,

        #[arg(short = 'p', long, default_value = "1")]
        parallelism: u32,

        #[arg(long)]
        threads: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Hash { memory_kib, iterations, parallelism, threads } => {
            cmd_hash(memory_kib, iterations, parallelism, threads)
        }
        Commands::Verify { hash, threads } => cmd_verify(&hash, threads),
        Commands::Benchmark { memory_kib, iterations, parallelism, threads } => {
            cmd_benchmark(memory_kib, iterations, parallelism, threads)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn read_password() -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    std::io::stdin().read_to_end(&mut buf)?;
    while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(buf)
}

fn cmd_hash(memory_kib: u32, iterations: u32, parallelism: u32, threads: Option<usize>) -> anyhow::Result<()> {
    let password = read_password()?;
    let params = Params { memory_kib, iterations, parallelism };
    let max_threads = threads.unwrap_or(parallelism as usize);

    let phc_string = phc::hash(&password, params, max_threads, None, &mut OsRng)?;
    println!("{}", String::from_utf8_lossy(&phc_string));
    Ok(())
}

fn cmd_verify(hash: &str, threads: usize) -> anyhow::Result<()> {
    let password = read_password()?;
    match phc::verify(hash.as_bytes(), &password, threads, None) {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(bscrypt::Error::Mismatch) => {
            println!("FAIL");
            std::process::exit(1);
        }
        Err(e) => anyhow::bail!(e),
    }
}

fn cmd_benchmark(memory_kib: u32, iterations: u32, parallelism: u32, threads: Option<usize>) -> anyhow::Result<()> {
    let params = Params { memory_kib, iterations, parallelism };
    let max_threads = threads.unwrap_or(parallelism as usize);

    println!("Running benchmark: m={memory_kib} KiB, t={iterations}, p={parallelism}, threads={max_threads}");

    let mut output = [0u8; 32];
    let start = Instant::now();
    bscrypt::kdf(&mut output, b"benchmark password", b"0123456789abcdef", params, max_threads)?;
    let elapsed = start.elapsed();

    println!("\nResults:");
    println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());
    println!("  Memory used:  {} MiB", (memory_kib as u64 * parallelism as u64) / 1024);

    Ok(())
}
