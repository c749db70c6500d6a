use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::circuit::{Circuit, WireId};
use crate::error::{Error, Result};
use crate::garbler::GarbledTable;
use crate::label::{self, WireLabel};

/// The evaluator's view of a wire: the active label and the public point
/// bit that locates the next garbled row. The point bit equals the wire's
/// logical value XOR its hidden permutation bit, so it reveals nothing on
/// its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWire {
    /// Label standing for the wire's (unknown) logical value.
    pub label: WireLabel,
    /// Select bit carried alongside the label.
    pub point: bool,
}

/// Evaluate a garbled circuit.
///
/// `inputs` must hold an [`ActiveWire`] for every party input wire. Gates
/// are walked in declaration order; each one decrypts exactly the row
/// addressed by its input point bits. A missing table or row is a
/// [`Error::Protocol`]; a tag mismatch is a [`Error::Crypto`] naming the
/// gate, and no other row is ever tried.
///
/// Returns the full wire valuation, from which
/// [`decode_outputs`] extracts cleartext output bits.
pub fn evaluate(
    circuit: &Circuit,
    tables: &HashMap<WireId, GarbledTable>,
    inputs: &HashMap<WireId, ActiveWire>,
) -> Result<HashMap<WireId, ActiveWire>> {
    let mut values: HashMap<WireId, ActiveWire> = HashMap::new();
    for &wire in circuit.alice.iter().chain(circuit.bob.iter()) {
        let active = *inputs
            .get(&wire)
            .ok_or_else(|| Error::Protocol(format!("no label received for input wire {wire}")))?;
        values.insert(wire, active);
    }

    for gate in &circuit.gates {
        let table = tables
            .get(&gate.id)
            .ok_or_else(|| Error::Protocol(format!("no garbled table for gate {}", gate.id)))?;

        let mut labels = Vec::with_capacity(gate.inputs.len());
        let mut index = 0usize;
        for &wire in &gate.inputs {
            let active = values.get(&wire).ok_or_else(|| {
                Error::Protocol(format!("gate {} reads unevaluated wire {wire}", gate.id))
            })?;
            labels.push(active.label);
            index = (index << 1) | active.point as usize;
        }

        let row = table.row(index).ok_or_else(|| {
            Error::Protocol(format!("gate {} has no row at index {index}", gate.id))
        })?;
        let key = label::gate_key(&labels, gate.id);
        let payload = label::open(&key, row).ok_or_else(|| Error::bad_tag(gate.id))?;
        let (out_label, out_point) =
            label::decode_payload(&payload).ok_or_else(|| Error::bad_tag(gate.id))?;

        values.insert(
            gate.id,
            ActiveWire {
                label: out_label,
                point: out_point,
            },
        );
    }

    Ok(values)
}

/// Decode the cleartext output bits from an evaluated wire valuation.
///
/// Each output bit is the recovered point bit XOR the output wire's
/// permutation bit revealed by the garbler. Bits come back in `out` order,
/// MSB first.
pub fn decode_outputs(
    circuit: &Circuit,
    values: &HashMap<WireId, ActiveWire>,
    pbits_out: &HashMap<WireId, bool>,
) -> Result<Vec<bool>> {
    circuit
        .out
        .iter()
        .map(|&w| {
            let active = values
                .get(&w)
                .ok_or_else(|| Error::Protocol(format!("output wire {w} was never evaluated")))?;
            let pbit = pbits_out.get(&w).ok_or_else(|| {
                Error::Protocol(format!("no permutation bit received for output wire {w}"))
            })?;
            Ok(active.point ^ pbit)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::garbler::{Garbling, garble};
    use crate::synthesizer::{VALUE_BITS, synthesize};
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn active_inputs(
        circuit: &Circuit,
        garbling: &Garbling,
        alice_bits: &[bool],
        bob_bits: &[bool],
    ) -> HashMap<WireId, ActiveWire> {
        let mut inputs = HashMap::new();
        for (&wire, &bit) in circuit.alice.iter().zip(alice_bits.iter()) {
            inputs.insert(wire, garbling.active_input(wire, bit).unwrap());
        }
        for (&wire, &bit) in circuit.bob.iter().zip(bob_bits.iter()) {
            inputs.insert(wire, garbling.active_input(wire, bit).unwrap());
        }
        inputs
    }

    fn value_bits(v: u8) -> Vec<bool> {
        (0..VALUE_BITS)
            .map(|i| (v >> (VALUE_BITS - 1 - i)) & 1 == 1)
            .collect()
    }

    fn bits_value(bits: &[bool]) -> u8 {
        bits.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8)
    }

    #[test]
    fn test_garbled_matches_plain_exhaustive() {
        let circuit = synthesize(1);
        let mut rng = ChaCha12Rng::from_seed([3; 32]);
        let garbling = garble(&circuit, &mut rng);
        let pbits_out = garbling.pbits_out(&circuit).unwrap();

        for a in 0..16u8 {
            for b in 0..16u8 {
                let inputs =
                    active_inputs(&circuit, &garbling, &value_bits(a), &value_bits(b));
                let values = evaluate(&circuit, &garbling.tables, &inputs).unwrap();
                let out = decode_outputs(&circuit, &values, &pbits_out).unwrap();
                assert_eq!(bits_value(&out), a.max(b), "max({a}, {b})");
            }
        }
    }

    #[test]
    fn test_recovered_labels_are_the_active_ones() {
        let circuit = synthesize(1);
        let mut rng = ChaCha12Rng::from_seed([4; 32]);
        let garbling = garble(&circuit, &mut rng);

        let inputs = active_inputs(&circuit, &garbling, &value_bits(9), &value_bits(6));
        let values = evaluate(&circuit, &garbling.tables, &inputs).unwrap();

        // Every evaluated wire must carry one of the two labels assigned
        // to it, with the matching point bit.
        for (&wire, active) in &values {
            let (label0, label1) = garbling.keys[&wire];
            let pbit = garbling.pbits[&wire];
            if active.label == label0 {
                assert_eq!(active.point, pbit);
            } else {
                assert_eq!(active.label, label1);
                assert_eq!(active.point, !pbit);
            }
        }
    }

    #[test]
    fn test_missing_input_label_is_protocol_error() {
        let circuit = synthesize(1);
        let mut rng = ChaCha12Rng::from_seed([5; 32]);
        let garbling = garble(&circuit, &mut rng);
        let err = evaluate(&circuit, &garbling.tables, &HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_missing_table_is_protocol_error() {
        let circuit = synthesize(1);
        let mut rng = ChaCha12Rng::from_seed([6; 32]);
        let garbling = garble(&circuit, &mut rng);
        let inputs = active_inputs(&circuit, &garbling, &value_bits(1), &value_bits(2));

        let mut tables = garbling.tables.clone();
        tables.remove(&circuit.gates[0].id);
        let err = evaluate(&circuit, &tables, &inputs).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_wrong_label_fails_authentication() {
        let circuit = synthesize(1);
        let mut rng = ChaCha12Rng::from_seed([8; 32]);
        let garbling = garble(&circuit, &mut rng);
        let mut inputs = active_inputs(&circuit, &garbling, &value_bits(5), &value_bits(3));

        // Swap one input's label for the opposite one without fixing the
        // point bit; the addressed row no longer matches the key.
        let wire = circuit.alice[0];
        let tampered = ActiveWire {
            label: garbling.active_input(wire, true).unwrap().label,
            point: inputs[&wire].point,
        };
        inputs.insert(wire, tampered);

        let err = evaluate(&circuit, &garbling.tables, &inputs).unwrap_err();
        assert!(matches!(err, Error::Crypto(_)), "got {err:?}");
    }

    #[test]
    fn test_decode_requires_output_pbits() {
        let circuit = synthesize(1);
        let mut rng = ChaCha12Rng::from_seed([9; 32]);
        let garbling = garble(&circuit, &mut rng);
        let inputs = active_inputs(&circuit, &garbling, &value_bits(1), &value_bits(0));
        let values = evaluate(&circuit, &garbling.tables, &inputs).unwrap();
        let err = decode_outputs(&circuit, &values, &HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
