//! Two-party secure computation of the maximum of jointly held 4-bit
//! integers, using Yao's garbled circuits with point-and-permute and a
//! Diffie-Hellman 1-out-of-2 oblivious transfer.

/// Circuit model, JSON circuit-file format, and plain evaluation
pub mod circuit;
/// Typed protocol errors
pub mod error;
/// Garbled-circuit evaluation
pub mod evaluator;
/// Label generation and garbled-table construction
pub mod garbler;
/// Party input files: bit parsing, padding, truncation
pub mod input;
/// Wire labels and the authenticated gate cipher
pub mod label;
/// 1-out-of-2 oblivious transfer over the Ristretto group
pub mod ot;
/// Garbler and evaluator protocol drivers
pub mod protocol;
/// MAX circuit synthesis and the on-disk circuit cache
pub mod synthesizer;
/// Protocol messages and the in-memory duplex transport
pub mod transport;
