use std::fs;
use std::path::{Path, PathBuf};

use crate::circuit::{Circuit, CircuitFile, Gate, GateKind, WireId};
use crate::error::{Error, Result};

/// Bit width of the compared values. The comparator block is written for
/// this width; the rest of the crate only depends on it through this
/// constant.
pub const VALUE_BITS: usize = 4;

/// Largest supported per-party set size.
pub const MAX_SET_SIZE: usize = 1 << VALUE_BITS;

/// Incremental builder for the MAX circuit.
///
/// A single counter issues every wire id above the first `2 * VALUE_BITS`
/// party inputs, so gate outputs and late-bound input wires share one
/// monotonic id space.
#[derive(Debug)]
struct MaxSynthesizer {
    next_id: WireId,
    alice: Vec<WireId>,
    bob: Vec<WireId>,
    outputs: Vec<WireId>,
    gates: Vec<Gate>,
}

impl MaxSynthesizer {
    fn new() -> Self {
        MaxSynthesizer {
            next_id: (2 * VALUE_BITS) as WireId,
            alice: Vec::new(),
            bob: Vec::new(),
            outputs: Vec::new(),
            gates: Vec::new(),
        }
    }

    fn next_wire(&mut self) -> WireId {
        self.next_id += 1;
        self.next_id
    }

    fn emit(&mut self, kind: GateKind, inputs: Vec<WireId>, output: bool) -> WireId {
        let id = self.next_wire();
        self.gates.push(Gate { id, kind, inputs });
        if output {
            self.outputs.push(id);
        }
        id
    }

    fn and(&mut self, a: WireId, b: WireId) -> WireId {
        self.emit(GateKind::And, vec![a, b], false)
    }

    fn or(&mut self, a: WireId, b: WireId) -> WireId {
        self.emit(GateKind::Or, vec![a, b], false)
    }

    fn or_out(&mut self, a: WireId, b: WireId) -> WireId {
        self.emit(GateKind::Or, vec![a, b], true)
    }

    fn nxor(&mut self, a: WireId, b: WireId) -> WireId {
        self.emit(GateKind::Nxor, vec![a, b], false)
    }

    fn not(&mut self, a: WireId) -> WireId {
        self.emit(GateKind::Not, vec![a], false)
    }

    /// Emit one 4-bit comparator block computing `max(A, B)`.
    ///
    /// Wires are ordered MSB first. The block selects `A` iff `A ≥ B`;
    /// the MSB shortcut `m3 = a3 ∨ b3` is correct because if the MSBs
    /// differ the value with the set bit wins, and if they match either
    /// one serves.
    fn comparator_block(&mut self, a: [WireId; 4], b: [WireId; 4]) -> [WireId; 4] {
        let [a3, a2, a1, a0] = a;
        let [b3, b2, b1, b0] = b;

        // Per-bit equality indicators.
        let x3 = self.nxor(a3, b3);
        let x2 = self.nxor(a2, b2);
        let x1 = self.nxor(a1, b1);
        let x0 = self.nxor(a0, b0);

        let nb0 = self.not(b0);
        let nb1 = self.not(b1);
        let nb2 = self.not(b2);
        let nb3 = self.not(b3);

        // z: A = B.
        let z = {
            let hi = self.and(x3, x2);
            let lo = self.and(x1, x0);
            self.and(hi, lo)
        };

        // x: A > B, decided at the most significant differing bit.
        let x = {
            let t1 = self.and(a3, nb3);
            let t2 = self.and(x3, a2);
            let t3 = self.and(t2, nb2);
            let t4 = self.or(t1, t3);
            let t5 = self.and(x3, x2);
            let t6 = self.and(a1, nb1);
            let t7 = self.and(t5, t6);
            let t8 = self.or(t4, t7);
            let t9 = self.and(x3, x2);
            let t10 = self.and(t9, x1);
            let t11 = self.and(t10, a0);
            let t12 = self.and(t11, nb0);
            self.or(t8, t12)
        };

        // Select A iff A ≥ B.
        let x = self.or(x, z);
        let nx = self.not(x);

        let m3 = self.or_out(a3, b3);
        let m2 = {
            let keep_a = self.and(x, a2);
            let keep_b = self.and(nx, b2);
            self.or_out(keep_a, keep_b)
        };
        let m1 = {
            let keep_a = self.and(x, a1);
            let keep_b = self.and(nx, b1);
            self.or_out(keep_a, keep_b)
        };
        let m0 = {
            let keep_a = self.and(x, a0);
            let keep_b = self.and(nx, b0);
            self.or_out(keep_a, keep_b)
        };

        [m3, m2, m1, m0]
    }
}

/// Synthesize the circuit computing the maximum of `2 * set_size` values of
/// [`VALUE_BITS`] bits each.
///
/// The first value belongs to Alice (wires 1..=4) and the second to Bob
/// (wires 5..=8). Each chained comparator block folds one fresh value into
/// the running maximum; fresh input wires are drawn from the shared
/// counter and assigned to Alice until half the remaining values are
/// bound, then to Bob, so each party ends up holding exactly `set_size`
/// values. The last block's outputs are the circuit outputs.
pub fn synthesize(set_size: usize) -> Circuit {
    let mut s = MaxSynthesizer::new();
    let n = set_size * 2;

    let mut alice_owns = true;
    let mut a: [WireId; 4] = [1, 2, 3, 4];
    s.alice.extend(a);
    let mut b: [WireId; 4] = [5, 6, 7, 8];
    s.bob.extend(b);

    for i in 0..n - 2 {
        a = s.comparator_block(a, b);
        b = [s.next_wire(), s.next_wire(), s.next_wire(), s.next_wire()];
        if alice_owns {
            s.alice.extend(b);
        } else {
            s.bob.extend(b);
        }
        // Ownership of fresh values switches to Bob halfway through.
        if n - 2 == 2 * (i + 1) {
            alice_owns = !alice_owns;
        }
    }

    s.comparator_block(a, b);

    let out = s.outputs[s.outputs.len() - 4..].to_vec();
    Circuit {
        id: format!("{VALUE_BITS}-bits MAX with {n} elements"),
        alice: s.alice,
        bob: s.bob,
        out,
        gates: s.gates,
    }
}

/// Stable cache location for the `(VALUE_BITS, set_size)` circuit.
pub fn cache_path(dir: &Path, set_size: usize) -> PathBuf {
    dir.join(format!("max_{VALUE_BITS}bits_{set_size}items.json"))
}

/// Load the cached circuit for `set_size`, synthesizing and caching it on a
/// miss.
///
/// Synthesis is deterministic, so regenerating the file yields a
/// structurally identical circuit; a cached file is validated before use.
pub fn load_or_synthesize(dir: &Path, set_size: usize) -> Result<Circuit> {
    if !(1..=MAX_SET_SIZE).contains(&set_size) {
        return Err(Error::Config(format!(
            "set size {set_size} out of range 1..={MAX_SET_SIZE}"
        )));
    }

    let path = cache_path(dir, set_size);
    if path.exists() {
        let data = fs::read_to_string(&path)?;
        let file: CircuitFile = serde_json::from_str(&data)?;
        let circuit = file
            .circuits
            .into_iter()
            .next()
            .ok_or_else(|| Error::Config(format!("{} holds no circuits", path.display())))?;
        circuit.validate(VALUE_BITS)?;
        return Ok(circuit);
    }

    let circuit = synthesize(set_size);
    fs::create_dir_all(dir)?;
    let file = CircuitFile {
        name: "max".to_string(),
        circuits: vec![circuit.clone()],
    };
    fs::write(&path, serde_json::to_string(&file)?)?;
    Ok(circuit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha12Rng;
    use std::collections::HashMap;

    /// Gates emitted per comparator block.
    const BLOCK_GATES: usize = 36;

    fn circuit_inputs(
        circuit: &Circuit,
        alice_vals: &[u8],
        bob_vals: &[u8],
    ) -> HashMap<WireId, bool> {
        let mut inputs = HashMap::new();
        for (wires, vals) in [(&circuit.alice, alice_vals), (&circuit.bob, bob_vals)] {
            for (j, &v) in vals.iter().enumerate() {
                for bit in 0..VALUE_BITS {
                    let wire = wires[j * VALUE_BITS + bit];
                    inputs.insert(wire, (v >> (VALUE_BITS - 1 - bit)) & 1 == 1);
                }
            }
        }
        inputs
    }

    fn assert_computes_max(set_size: usize, alice_vals: &[u8], bob_vals: &[u8]) {
        let circuit = synthesize(set_size);
        let inputs = circuit_inputs(&circuit, alice_vals, bob_vals);
        let out = circuit.evaluate(&inputs).unwrap();
        let got = out.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8);
        let expected = alice_vals.iter().chain(bob_vals).copied().max().unwrap();
        assert_eq!(
            got, expected,
            "max({alice_vals:?} ∪ {bob_vals:?}) miscomputed for k={set_size}"
        );
    }

    #[test]
    fn test_wire_numbering_single_block() {
        let circuit = synthesize(1);
        assert_eq!(circuit.alice, vec![1, 2, 3, 4]);
        assert_eq!(circuit.bob, vec![5, 6, 7, 8]);
        assert_eq!(circuit.gates[0].id, 9);
        assert_eq!(circuit.gates.len(), BLOCK_GATES);
        assert_eq!(circuit.out.len(), VALUE_BITS);
    }

    #[test]
    fn test_gate_count_grows_per_block() {
        for set_size in 1..=MAX_SET_SIZE {
            let circuit = synthesize(set_size);
            let blocks = 2 * set_size - 1;
            assert_eq!(circuit.gates.len(), blocks * BLOCK_GATES);
        }
    }

    #[test]
    fn test_well_formed_for_all_set_sizes() {
        for set_size in 1..=MAX_SET_SIZE {
            let circuit = synthesize(set_size);
            circuit.validate(VALUE_BITS).unwrap();
        }
    }

    #[test]
    fn test_parties_hold_equal_shares() {
        for set_size in 1..=MAX_SET_SIZE {
            let circuit = synthesize(set_size);
            assert_eq!(circuit.alice.len(), set_size * VALUE_BITS);
            assert_eq!(circuit.bob.len(), set_size * VALUE_BITS);
        }
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        for set_size in [1, 2, 5] {
            assert_eq!(synthesize(set_size), synthesize(set_size));
        }
    }

    #[test]
    fn test_single_comparison_exhaustive() {
        for a in 0..16u8 {
            for b in 0..16u8 {
                assert_computes_max(1, &[a], &[b]);
            }
        }
    }

    #[test]
    fn test_chained_comparisons_random() {
        let mut rng = ChaCha12Rng::from_seed([7; 32]);
        for set_size in 2..=5 {
            for _ in 0..20 {
                let draw = |rng: &mut ChaCha12Rng| {
                    (0..set_size).map(|_| (rng.next_u32() & 0xf) as u8).collect::<Vec<_>>()
                };
                let alice_vals = draw(&mut rng);
                let bob_vals = draw(&mut rng);
                assert_computes_max(set_size, &alice_vals, &bob_vals);
            }
        }
    }

    #[test]
    fn test_tied_inputs() {
        assert_computes_max(2, &[10, 0], &[10, 0]);
        assert_computes_max(1, &[0], &[0]);
        assert_computes_max(1, &[15], &[15]);
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let first = load_or_synthesize(dir.path(), 3).unwrap();
        assert!(cache_path(dir.path(), 3).exists());

        // Second call hits the cache and must parse to the same circuit.
        let second = load_or_synthesize(dir.path(), 3).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, synthesize(3));
    }

    #[test]
    fn test_cache_rejects_bad_set_size() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_or_synthesize(dir.path(), 0).is_err());
        assert!(load_or_synthesize(dir.path(), MAX_SET_SIZE + 1).is_err());
    }
}
