use std::collections::HashMap;

use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::circuit::{Circuit, WireId};
use crate::error::{Error, Result};
use crate::evaluator::{self, ActiveWire};
use crate::garbler::{self, Garbling};
use crate::label;
use crate::ot::{OtReceiver, OtSender};
use crate::synthesizer::VALUE_BITS;
use crate::transport::{Duplex, Message};

fn message_name(message: &Message) -> &'static str {
    match message {
        Message::Setup { .. } => "Setup",
        Message::Ack => "Ack",
        Message::GarblerInputs(_) => "GarblerInputs",
        Message::OtChallenge { .. } => "OtChallenge",
        Message::OtResponse { .. } => "OtResponse",
        Message::OtTransfer { .. } => "OtTransfer",
        Message::Outputs(_) => "Outputs",
    }
}

fn unexpected(wanted: &str, got: &Message) -> Error {
    Error::Protocol(format!(
        "expected {wanted}, received {}",
        message_name(got)
    ))
}

fn expect_ack(channel: &Duplex) -> Result<()> {
    match channel.recv()? {
        Message::Ack => Ok(()),
        other => Err(unexpected("Ack", &other)),
    }
}

/// Run the garbler (Alice) side of the protocol to completion.
///
/// `bits` are Alice's input bits in the order of the circuit's `alice`
/// wires. Returns the cleartext output bits revealed by the evaluator.
///
/// On any failure after garbling, the label material is wiped before the
/// error propagates; no partial result is ever produced.
pub fn run_garbler<R: RngCore + CryptoRng>(
    channel: &Duplex,
    circuit: &Circuit,
    bits: &[bool],
    rng: &mut R,
) -> Result<Vec<bool>> {
    circuit.validate(VALUE_BITS)?;
    if bits.len() != circuit.alice.len() {
        return Err(Error::Config(format!(
            "garbler holds {} input bits for {} wires",
            bits.len(),
            circuit.alice.len()
        )));
    }

    let mut garbling = garbler::garble(circuit, rng);
    let result = drive_garbler(channel, circuit, &garbling, bits, rng);
    if result.is_err() {
        garbling.zeroize();
    }
    result
}

fn drive_garbler<R: RngCore + CryptoRng>(
    channel: &Duplex,
    circuit: &Circuit,
    garbling: &Garbling,
    bits: &[bool],
    rng: &mut R,
) -> Result<Vec<bool>> {
    // Send the garbled circuit and wait for the evaluator to take it.
    channel.send(&Message::Setup {
        circuit: circuit.clone(),
        tables: garbling.tables.clone(),
        pbits_out: garbling.pbits_out(circuit)?,
    })?;
    expect_ack(channel)?;

    // Alice's own wires need no OT: she just sends the active labels.
    let own_inputs = circuit
        .alice
        .iter()
        .zip(bits.iter())
        .map(|(&wire, &bit)| {
            garbling
                .active_input(wire, bit)
                .map(|active| (wire, active))
                .ok_or_else(|| Error::Protocol(format!("no labels for input wire {wire}")))
        })
        .collect::<Result<Vec<_>>>()?;
    channel.send(&Message::GarblerInputs(own_inputs))?;
    expect_ack(channel)?;

    // One fresh OT per evaluator wire, in declared order.
    for &wire in &circuit.bob {
        let sender = OtSender::new(rng);
        channel.send(&Message::OtChallenge {
            point: sender.public_bytes(),
        })?;
        let response = match channel.recv()? {
            Message::OtResponse { point } => point,
            other => return Err(unexpected("OtResponse", &other)),
        };

        let low = garbling
            .active_input(wire, false)
            .ok_or_else(|| Error::Protocol(format!("no labels for input wire {wire}")))?;
        let high = garbling
            .active_input(wire, true)
            .ok_or_else(|| Error::Protocol(format!("no labels for input wire {wire}")))?;
        let m0 = label::encode_payload(&low.label, low.point);
        let m1 = label::encode_payload(&high.label, high.point);
        let (c0, c1) = sender.transfer(&response, &m0, &m1)?;
        channel.send(&Message::OtTransfer { c0, c1 })?;
    }

    // The evaluator reveals the cleartext outputs.
    match channel.recv()? {
        Message::Outputs(outputs) => {
            if outputs.len() != circuit.out.len() {
                return Err(Error::Protocol(format!(
                    "received {} output bits, expected {}",
                    outputs.len(),
                    circuit.out.len()
                )));
            }
            Ok(outputs)
        }
        other => Err(unexpected("Outputs", &other)),
    }
}

/// Run the evaluator (Bob) side of the protocol to completion.
///
/// `bits` are Bob's input bits in the order of the received circuit's
/// `bob` wires. Returns the cleartext output bits, which are also sent
/// back to the garbler.
pub fn run_evaluator<R: RngCore + CryptoRng>(
    channel: &Duplex,
    bits: &[bool],
    rng: &mut R,
) -> Result<Vec<bool>> {
    let (circuit, tables, pbits_out) = match channel.recv()? {
        Message::Setup {
            circuit,
            tables,
            pbits_out,
        } => (circuit, tables, pbits_out),
        other => return Err(unexpected("Setup", &other)),
    };
    circuit.validate(VALUE_BITS)?;
    if bits.len() != circuit.bob.len() {
        return Err(Error::Config(format!(
            "evaluator holds {} input bits for {} wires",
            bits.len(),
            circuit.bob.len()
        )));
    }
    channel.send(&Message::Ack)?;

    let mut inputs: HashMap<WireId, ActiveWire> = match channel.recv()? {
        Message::GarblerInputs(own) => own.into_iter().collect(),
        other => return Err(unexpected("GarblerInputs", &other)),
    };
    channel.send(&Message::Ack)?;

    // Obtain the label for each own input bit without revealing it.
    for (&wire, &bit) in circuit.bob.iter().zip(bits.iter()) {
        let challenge = match channel.recv()? {
            Message::OtChallenge { point } => point,
            other => return Err(unexpected("OtChallenge", &other)),
        };
        let receiver = OtReceiver::new(bit, &challenge, rng)?;
        channel.send(&Message::OtResponse {
            point: receiver.public_bytes(),
        })?;
        let (c0, c1) = match channel.recv()? {
            Message::OtTransfer { c0, c1 } => (c0, c1),
            other => return Err(unexpected("OtTransfer", &other)),
        };
        let payload = receiver.receive(&c0, &c1)?;
        let (wire_label, point) = label::decode_payload(&payload)
            .ok_or_else(|| Error::Protocol(format!("malformed OT payload for wire {wire}")))?;
        inputs.insert(
            wire,
            ActiveWire {
                label: wire_label,
                point,
            },
        );
    }

    let values = evaluator::evaluate(&circuit, &tables, &inputs)?;
    let outputs = evaluator::decode_outputs(&circuit, &values, &pbits_out)?;
    channel.send(&Message::Outputs(outputs.clone()))?;
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesizer::synthesize;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;
    use std::thread;

    fn value_bits(values: &[u8]) -> Vec<bool> {
        values
            .iter()
            .flat_map(|&v| (0..VALUE_BITS).map(move |i| (v >> (VALUE_BITS - 1 - i)) & 1 == 1))
            .collect()
    }

    fn bits_value(bits: &[bool]) -> u8 {
        bits.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8)
    }

    fn run_protocol(set_size: usize, alice_vals: &[u8], bob_vals: &[u8]) -> (Vec<bool>, Vec<bool>) {
        let circuit = synthesize(set_size);
        let (alice_end, bob_end) = Duplex::pair();

        let bob_bits = value_bits(bob_vals);
        let evaluator = thread::spawn(move || {
            let mut rng = ChaCha12Rng::from_seed([101; 32]);
            run_evaluator(&bob_end, &bob_bits, &mut rng)
        });

        let mut rng = ChaCha12Rng::from_seed([102; 32]);
        let garbler_view = run_garbler(&alice_end, &circuit, &value_bits(alice_vals), &mut rng).unwrap();
        let evaluator_view = evaluator.join().unwrap().unwrap();
        (garbler_view, evaluator_view)
    }

    #[test]
    fn test_both_parties_learn_the_maximum() {
        let (garbler_view, evaluator_view) = run_protocol(2, &[3, 9], &[7, 2]);
        assert_eq!(garbler_view, evaluator_view);
        assert_eq!(bits_value(&garbler_view), 9);
    }

    #[test]
    fn test_garbler_rejects_wrong_input_length() {
        let circuit = synthesize(1);
        let (alice_end, _bob_end) = Duplex::pair();
        let mut rng = ChaCha12Rng::from_seed([1; 32]);
        let err = run_garbler(&alice_end, &circuit, &[true], &mut rng).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_evaluator_rejects_wrong_input_length() {
        let circuit = synthesize(1);
        let (alice_end, bob_end) = Duplex::pair();

        let evaluator = thread::spawn(move || {
            let mut rng = ChaCha12Rng::from_seed([2; 32]);
            run_evaluator(&bob_end, &[true], &mut rng)
        });

        let mut rng = ChaCha12Rng::from_seed([3; 32]);
        let garbler = run_garbler(&alice_end, &circuit, &value_bits(&[5]), &mut rng);
        let eval_err = evaluator.join().unwrap().unwrap_err();
        assert!(matches!(eval_err, Error::Config(_)));
        // The evaluator hung up before the handshake completed.
        assert!(matches!(garbler.unwrap_err(), Error::Channel(_)));
    }

    #[test]
    fn test_peer_disconnect_aborts_garbler() {
        let circuit = synthesize(1);
        let (alice_end, bob_end) = Duplex::pair();
        drop(bob_end);
        let mut rng = ChaCha12Rng::from_seed([4; 32]);
        let err = run_garbler(&alice_end, &circuit, &value_bits(&[5]), &mut rng).unwrap_err();
        assert!(matches!(err, Error::Channel(_)));
    }

    #[test]
    fn test_out_of_order_message_is_protocol_error() {
        let (alice_end, bob_end) = Duplex::pair();
        alice_end.send(&Message::Ack).unwrap();
        let mut rng = ChaCha12Rng::from_seed([5; 32]);
        let err = run_evaluator(&bob_end, &[], &mut rng).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_repeated_runs_agree_on_tie() {
        for _ in 0..3 {
            let (garbler_view, _) = run_protocol(1, &[12], &[12]);
            assert_eq!(bits_value(&garbler_view), 12);
        }
    }
}
