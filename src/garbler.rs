use std::collections::HashMap;

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::circuit::{Circuit, Gate, GateKind, WireId};
use crate::error::{Error, Result};
use crate::evaluator::ActiveWire;
use crate::label::{self, WireLabel};

/// Garbled truth table of one gate: sealed rows stored at the index formed
/// by the input point bits, so the evaluator picks its row directly
/// instead of trial-decrypting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarbledTable {
    rows: Vec<Vec<u8>>,
}

impl GarbledTable {
    /// The sealed row at `index`, if present.
    pub fn row(&self, index: usize) -> Option<&[u8]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// Number of rows (2 for NOT gates, 4 otherwise).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Everything the garbler produces for one protocol run.
///
/// Labels and permutation bits are fresh per run and must not outlive it;
/// [`Zeroize`] wipes them on abort paths.
#[derive(Debug)]
pub struct Garbling {
    /// Sealed truth tables, keyed by gate id.
    pub tables: HashMap<WireId, GarbledTable>,
    /// Per-wire label pair `(L0, L1)`.
    pub keys: HashMap<WireId, (WireLabel, WireLabel)>,
    /// Per-wire permutation bit.
    pub pbits: HashMap<WireId, bool>,
}

impl Garbling {
    /// Permutation bits of the output wires, the only ones revealed to the
    /// evaluator.
    pub fn pbits_out(&self, circuit: &Circuit) -> Result<HashMap<WireId, bool>> {
        circuit
            .out
            .iter()
            .map(|&w| {
                self.pbits.get(&w).map(|&p| (w, p)).ok_or_else(|| {
                    Error::Protocol(format!("no permutation bit for output wire {w}"))
                })
            })
            .collect()
    }

    /// The active `(label, point bit)` pair for an input wire carrying
    /// `bit`. This is what the garbler sends for her own wires and what an
    /// OT instance transfers for the evaluator's.
    pub fn active_input(&self, wire: WireId, bit: bool) -> Option<ActiveWire> {
        let &(label0, label1) = self.keys.get(&wire)?;
        let pbit = *self.pbits.get(&wire)?;
        Some(ActiveWire {
            label: if bit { label1 } else { label0 },
            point: pbit ^ bit,
        })
    }
}

impl Zeroize for Garbling {
    fn zeroize(&mut self) {
        for (label0, label1) in self.keys.values_mut() {
            label0.zeroize();
            label1.zeroize();
        }
        for table in self.tables.values_mut() {
            for row in &mut table.rows {
                row.zeroize();
            }
        }
        for pbit in self.pbits.values_mut() {
            *pbit = false;
        }
    }
}

/// Garble a circuit: draw fresh labels and permutation bits for every wire
/// and seal each gate's permuted truth table.
///
/// The circuit must have passed [`Circuit::validate`]; every wire a gate
/// reads is then guaranteed a label pair.
pub fn garble<R: RngCore + CryptoRng>(circuit: &Circuit, rng: &mut R) -> Garbling {
    let mut keys = HashMap::new();
    let mut pbits = HashMap::new();
    for wire in circuit.wires() {
        keys.insert(wire, (WireLabel::random(rng), WireLabel::random(rng)));
        pbits.insert(wire, (rng.next_u32() & 1) == 1);
    }

    let mut tables = HashMap::new();
    for gate in &circuit.gates {
        tables.insert(gate.id, garble_gate(gate, &keys, &pbits));
    }

    Garbling { tables, keys, pbits }
}

fn select(labels: &(WireLabel, WireLabel), bit: bool) -> WireLabel {
    if bit { labels.1 } else { labels.0 }
}

/// Seal one gate's truth table, permuted by the input permutation bits.
///
/// Row `(p_a ⊕ a, p_b ⊕ b)` holds the output label for logical inputs
/// `(a, b)` together with its point bit `p_out ⊕ f(a, b)`.
fn garble_gate(
    gate: &Gate,
    keys: &HashMap<WireId, (WireLabel, WireLabel)>,
    pbits: &HashMap<WireId, bool>,
) -> GarbledTable {
    let out_keys = &keys[&gate.id];
    let p_out = pbits[&gate.id];

    match gate.kind {
        GateKind::Not => {
            let in_keys = &keys[&gate.inputs[0]];
            let p_in = pbits[&gate.inputs[0]];
            let mut rows = vec![Vec::new(); 2];
            for a in [false, true] {
                let c = gate.kind.apply(&[a]);
                let key = label::gate_key(&[select(in_keys, a)], gate.id);
                let payload = label::encode_payload(&select(out_keys, c), p_out ^ c);
                rows[(p_in ^ a) as usize] = label::seal(&key, &payload);
            }
            GarbledTable { rows }
        }
        _ => {
            let keys_a = &keys[&gate.inputs[0]];
            let keys_b = &keys[&gate.inputs[1]];
            let p_a = pbits[&gate.inputs[0]];
            let p_b = pbits[&gate.inputs[1]];
            let mut rows = vec![Vec::new(); 4];
            for a in [false, true] {
                for b in [false, true] {
                    let c = gate.kind.apply(&[a, b]);
                    let key = label::gate_key(&[select(keys_a, a), select(keys_b, b)], gate.id);
                    let payload = label::encode_payload(&select(out_keys, c), p_out ^ c);
                    let index = (((p_a ^ a) as usize) << 1) | (p_b ^ b) as usize;
                    rows[index] = label::seal(&key, &payload);
                }
            }
            GarbledTable { rows }
        }
    }
}
