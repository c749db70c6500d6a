use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result, bail};
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

use yao_max::input;
use yao_max::protocol::{run_evaluator, run_garbler};
use yao_max::synthesizer::{self, MAX_SET_SIZE, VALUE_BITS};
use yao_max::transport::Duplex;

/// Two-party maximum via Yao's garbled circuits
#[derive(Parser, Debug)]
#[command(name = "yao-max")]
#[command(about = "Jointly compute the maximum of two private sets of 4-bit numbers")]
#[command(version)]
struct Args {
    /// The size of the set of numbers for each party
    #[arg(short = 's', long = "set-size", default_value_t = 5)]
    set_size: usize,

    /// The file containing Alice's input numbers
    #[arg(short, long, default_value = "Alice.txt")]
    alice: PathBuf,

    /// The file containing Bob's input numbers
    #[arg(short, long, default_value = "Bob.txt")]
    bob: PathBuf,
}

/// Render a value the way the report prints bits: spaced, MSB first.
fn spaced_bits(value: u8) -> String {
    (0..VALUE_BITS)
        .map(|i| {
            if (value >> (VALUE_BITS - 1 - i)) & 1 == 1 {
                "1"
            } else {
                "0"
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() -> Result<()> {
    let args = Args::parse();

    if !(1..=MAX_SET_SIZE).contains(&args.set_size) {
        bail!("set size should be between 1 and {MAX_SET_SIZE}");
    }

    let alice_bits = input::normalize_bits(input::read_bits(&args.alice)?, args.set_size)
        .with_context(|| format!("error in {}", args.alice.display()))?;
    let bob_bits = input::normalize_bits(input::read_bits(&args.bob)?, args.set_size)
        .with_context(|| format!("error in {}", args.bob.display()))?;

    let circuit = synthesizer::load_or_synthesize(Path::new("circuits"), args.set_size)?;

    // Plaintext reference over the padded inputs, computed outside the
    // protocol for the final report.
    let mut full_set = input::parse_values(&alice_bits);
    full_set.extend(input::parse_values(&bob_bits));
    let expected = full_set
        .iter()
        .copied()
        .max()
        .context("empty input set")?;

    let (alice_end, bob_end) = Duplex::pair();
    let evaluator_bits = bob_bits.clone();
    let evaluator = thread::spawn(move || {
        let mut rng = ChaCha12Rng::from_os_rng();
        run_evaluator(&bob_end, &evaluator_bits, &mut rng)
    });

    let mut rng = ChaCha12Rng::from_os_rng();
    let outputs = run_garbler(&alice_end, &circuit, &alice_bits, &mut rng)?;
    evaluator
        .join()
        .map_err(|_| anyhow::anyhow!("evaluator thread panicked"))??;

    let actual = outputs.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8);

    println!("Full set: {full_set:?}");
    println!("Expected output: {} ({expected})", spaced_bits(expected));
    println!("Actual output: {} ({actual})", spaced_bits(actual));
    println!("Correct: {}", expected == actual);

    Ok(())
}
