use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Wire identifier inside a circuit.
pub type WireId = u32;

/// Logical function computed by a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateKind {
    /// Conjunction of two wires.
    And,
    /// Disjunction of two wires.
    Or,
    /// Logical equivalence (`a ⊕ b ⊕ 1`), serialized as `NXOR`.
    Nxor,
    /// Negation of a single wire.
    Not,
}

impl GateKind {
    /// Number of input wires this gate kind consumes.
    pub fn arity(&self) -> usize {
        match self {
            GateKind::Not => 1,
            _ => 2,
        }
    }

    /// Apply the gate's logical function to cleartext input bits.
    ///
    /// # Panics
    /// Panics if `inputs` does not match [`GateKind::arity`]; the circuit
    /// validator rejects such gates before evaluation.
    pub fn apply(&self, inputs: &[bool]) -> bool {
        match self {
            GateKind::And => inputs[0] & inputs[1],
            GateKind::Or => inputs[0] | inputs[1],
            GateKind::Nxor => !(inputs[0] ^ inputs[1]),
            GateKind::Not => !inputs[0],
        }
    }
}

/// A single gate: output wire id, kind, and input wire list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    /// Output wire id, doubling as the gate id.
    pub id: WireId,
    /// Logical function of the gate.
    #[serde(rename = "type")]
    pub kind: GateKind,
    /// Input wires, length 1 for NOT and 2 otherwise.
    #[serde(rename = "in")]
    pub inputs: Vec<WireId>,
}

/// A combinational circuit with two input parties.
///
/// Gates are stored in topological order of creation: a gate may only read
/// input wires or outputs of earlier gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circuit {
    /// Human-readable circuit id, e.g. `"4-bits MAX with 10 elements"`.
    pub id: String,
    /// Alice's input wires, in input-bit order.
    pub alice: Vec<WireId>,
    /// Bob's input wires, in input-bit order.
    pub bob: Vec<WireId>,
    /// Output wires, MSB first.
    pub out: Vec<WireId>,
    /// Gate list in topological order.
    pub gates: Vec<Gate>,
}

/// On-disk circuit file: a named collection of circuits.
///
/// This crate only ever stores one circuit per file, but the enclosing
/// structure is kept for format compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitFile {
    /// Name of the computed function.
    pub name: String,
    /// The circuits in this file.
    pub circuits: Vec<Circuit>,
}

impl Circuit {
    /// Check the structural invariants of the circuit.
    ///
    /// Verifies that the party input sets are disjoint and non-empty
    /// multiples of `bits`, that every gate reads only input wires or
    /// earlier gate outputs, that gate ids are unique and distinct from
    /// input wires, that arities match gate kinds, and that every output
    /// wire is produced by some gate.
    pub fn validate(&self, bits: usize) -> Result<()> {
        let alice: HashSet<WireId> = self.alice.iter().copied().collect();
        let bob: HashSet<WireId> = self.bob.iter().copied().collect();
        if alice.len() != self.alice.len() || bob.len() != self.bob.len() {
            return Err(Error::Protocol("duplicate input wire".into()));
        }
        if !alice.is_disjoint(&bob) {
            return Err(Error::Protocol(
                "alice and bob input wires overlap".into(),
            ));
        }
        for (party, wires) in [("alice", &self.alice), ("bob", &self.bob)] {
            if wires.is_empty() || wires.len() % bits != 0 {
                return Err(Error::Protocol(format!(
                    "{party} holds {} input wires, not a non-zero multiple of {bits}",
                    wires.len()
                )));
            }
        }

        let mut defined: HashSet<WireId> = alice.union(&bob).copied().collect();
        for gate in &self.gates {
            if gate.inputs.len() != gate.kind.arity() {
                return Err(Error::Protocol(format!(
                    "gate {} has {} inputs, expected {}",
                    gate.id,
                    gate.inputs.len(),
                    gate.kind.arity()
                )));
            }
            for &input in &gate.inputs {
                if !defined.contains(&input) {
                    return Err(Error::Protocol(format!(
                        "gate {} reads undefined wire {input}",
                        gate.id
                    )));
                }
            }
            if !defined.insert(gate.id) {
                return Err(Error::Protocol(format!(
                    "wire {} defined more than once",
                    gate.id
                )));
            }
        }

        let gate_ids: HashSet<WireId> = self.gates.iter().map(|g| g.id).collect();
        for &out in &self.out {
            if !gate_ids.contains(&out) {
                return Err(Error::Protocol(format!(
                    "output wire {out} is not produced by any gate"
                )));
            }
        }
        Ok(())
    }

    /// Evaluate the circuit on cleartext bits.
    ///
    /// `inputs` must assign a bit to every wire in `alice` and `bob`.
    /// Returns the output bits in `out` order. This is the ground truth
    /// used to check garbled evaluation in tests.
    pub fn evaluate(&self, inputs: &HashMap<WireId, bool>) -> Result<Vec<bool>> {
        let mut values: HashMap<WireId, bool> = HashMap::new();
        for &wire in self.alice.iter().chain(self.bob.iter()) {
            let bit = *inputs.get(&wire).ok_or_else(|| {
                Error::Protocol(format!("no input bit for wire {wire}"))
            })?;
            values.insert(wire, bit);
        }
        for gate in &self.gates {
            let mut bits = [false; 2];
            for (slot, &wire) in bits.iter_mut().zip(gate.inputs.iter()) {
                *slot = *values.get(&wire).ok_or_else(|| {
                    Error::Protocol(format!(
                        "gate {} reads uncomputed wire {wire}",
                        gate.id
                    ))
                })?;
            }
            let out = gate.kind.apply(&bits[..gate.inputs.len()]);
            values.insert(gate.id, out);
        }
        self.out
            .iter()
            .map(|w| {
                values.get(w).copied().ok_or_else(|| {
                    Error::Protocol(format!("output wire {w} was never computed"))
                })
            })
            .collect()
    }

    /// All wires of the circuit: party inputs first, then gate outputs in
    /// declaration order.
    pub fn wires(&self) -> impl Iterator<Item = WireId> + '_ {
        self.alice
            .iter()
            .chain(self.bob.iter())
            .copied()
            .chain(self.gates.iter().map(|g| g.id))
    }
}
