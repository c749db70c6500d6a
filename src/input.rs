use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::synthesizer::VALUE_BITS;

/// Read a party's input bits from a text file.
///
/// Only ASCII `0` and `1` are significant; whitespace, separators and any
/// other characters are ignored. A missing file is a configuration error.
pub fn read_bits(path: &Path) -> Result<Vec<bool>> {
    if !path.exists() {
        return Err(Error::Config(format!("{} not found", path.display())));
    }
    let text = fs::read_to_string(path)?;
    Ok(text
        .chars()
        .filter_map(|c| match c {
            '0' => Some(false),
            '1' => Some(true),
            _ => None,
        })
        .collect())
}

/// Fit raw input bits to exactly `set_size` values.
///
/// The raw bit count must be a multiple of [`VALUE_BITS`] before any
/// adjustment. The tail is then zero-padded or truncated to
/// `set_size * VALUE_BITS` bits. Padding inserts zero values into the
/// party's set; the padded vector is the authoritative input.
pub fn normalize_bits(mut bits: Vec<bool>, set_size: usize) -> Result<Vec<bool>> {
    if bits.len() % VALUE_BITS != 0 {
        return Err(Error::Config(format!(
            "input holds {} bits, not a multiple of {VALUE_BITS}",
            bits.len()
        )));
    }
    bits.resize(set_size * VALUE_BITS, false);
    Ok(bits)
}

/// Split a normalized bit vector into its values, MSB first.
pub fn parse_values(bits: &[bool]) -> Vec<u8> {
    bits.chunks(VALUE_BITS)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8))
        .collect()
}
