use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};

use crate::circuit::{Circuit, WireId};
use crate::error::{Error, Result};
use crate::evaluator::ActiveWire;
use crate::garbler::GarbledTable;

/// A protocol message.
///
/// The transcript order is fixed: `Setup`, `Ack`, `GarblerInputs`, `Ack`,
/// then one `OtChallenge`/`OtResponse`/`OtTransfer` triple per evaluator
/// input wire in declared order, and finally `Outputs`. Receiving any
/// variant out of order is a protocol violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    /// Circuit topology, sealed truth tables, and output permutation bits.
    Setup {
        /// The circuit to evaluate.
        circuit: Circuit,
        /// Sealed truth tables keyed by gate id.
        tables: HashMap<WireId, GarbledTable>,
        /// Permutation bits of the output wires.
        pbits_out: HashMap<WireId, bool>,
    },
    /// Rendezvous acknowledgement for the setup messages.
    Ack,
    /// The garbler's own input wires with their active labels.
    GarblerInputs(Vec<(WireId, ActiveWire)>),
    /// Sender half of one OT round: the compressed element `g^a`.
    OtChallenge {
        /// Compressed Ristretto point.
        point: [u8; 32],
    },
    /// Receiver half of one OT round: the compressed blinded element.
    OtResponse {
        /// Compressed Ristretto point.
        point: [u8; 32],
    },
    /// The two sealed label payloads closing one OT round.
    OtTransfer {
        /// Ciphertext openable iff the choice bit was 0.
        c0: Vec<u8>,
        /// Ciphertext openable iff the choice bit was 1.
        c1: Vec<u8>,
    },
    /// Cleartext output bits, in output-wire order (MSB first).
    Outputs(Vec<bool>),
}

/// One endpoint of a bidirectional, ordered, reliable message transport.
///
/// Messages are bincode frames over a pair of unbounded channels; any
/// reliable ordered byte stream could stand in for the in-memory pair.
/// A disconnected peer surfaces as [`Error::Channel`], an undecodable
/// frame as [`Error::Protocol`].
#[derive(Debug)]
pub struct Duplex {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl Duplex {
    /// Create a connected pair of endpoints.
    pub fn pair() -> (Duplex, Duplex) {
        let (left_tx, left_rx) = unbounded();
        let (right_tx, right_rx) = unbounded();
        (
            Duplex {
                tx: left_tx,
                rx: right_rx,
            },
            Duplex {
                tx: right_tx,
                rx: left_rx,
            },
        )
    }

    /// Send one message to the peer.
    pub fn send(&self, message: &Message) -> Result<()> {
        let frame = bincode::serde::encode_to_vec(message, bincode::config::standard())
            .map_err(|e| Error::Protocol(format!("failed to encode message: {e}")))?;
        self.tx
            .send(frame)
            .map_err(|_| Error::Channel("transport closed mid-protocol".to_string()))
    }

    /// Block until the peer's next message arrives.
    pub fn recv(&self) -> Result<Message> {
        let frame = self
            .rx
            .recv()
            .map_err(|_| Error::Channel("transport closed mid-protocol".to_string()))?;
        let (message, _) =
            bincode::serde::decode_from_slice(&frame, bincode::config::standard())
                .map_err(|e| Error::Protocol(format!("undecodable frame: {e}")))?;
        Ok(message)
    }
}
