use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Wire label length in bytes (128 bits).
pub const LABEL_LEN: usize = 16;

/// Length of the plaintext carried per garbled row: one label plus the
/// point bit.
pub const PAYLOAD_LEN: usize = LABEL_LEN + 1;

/// Length of the authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Length of a sealed garbled row.
pub const SEALED_LEN: usize = PAYLOAD_LEN + TAG_LEN;

/// 128-bit wire label.
///
/// Each wire carries two labels, one per logical value; their randomness
/// is what hides the cleartext during garbled evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLabel([u8; LABEL_LEN]);

impl WireLabel {
    /// Create a wire label from raw bytes.
    pub fn new(bytes: [u8; LABEL_LEN]) -> Self {
        WireLabel(bytes)
    }

    /// Draw a uniformly random label from a cryptographic RNG.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; LABEL_LEN];
        rng.fill_bytes(&mut bytes);
        WireLabel(bytes)
    }

    /// Raw bytes of this label.
    pub fn as_bytes(&self) -> &[u8; LABEL_LEN] {
        &self.0
    }
}

impl Zeroize for WireLabel {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Encode a `(label, point bit)` pair into the fixed-length row plaintext.
pub fn encode_payload(label: &WireLabel, point: bool) -> [u8; PAYLOAD_LEN] {
    let mut payload = [0u8; PAYLOAD_LEN];
    payload[..LABEL_LEN].copy_from_slice(label.as_bytes());
    payload[LABEL_LEN] = point as u8;
    payload
}

/// Decode a row plaintext back into a `(label, point bit)` pair.
///
/// Returns `None` on a length or point-byte violation; under the
/// authenticated cipher either indicates a malformed sender.
pub fn decode_payload(payload: &[u8]) -> Option<(WireLabel, bool)> {
    if payload.len() != PAYLOAD_LEN {
        return None;
    }
    let mut bytes = [0u8; LABEL_LEN];
    bytes.copy_from_slice(&payload[..LABEL_LEN]);
    let point = match payload[LABEL_LEN] {
        0 => false,
        1 => true,
        _ => return None,
    };
    Some((WireLabel(bytes), point))
}

/// Key material for a garbled gate: the input labels followed by the gate
/// id, so each gate keys its rows distinctly.
pub fn gate_key(labels: &[WireLabel], gate_id: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(labels.len() * LABEL_LEN + 4);
    for label in labels {
        key.extend_from_slice(label.as_bytes());
    }
    key.extend_from_slice(&gate_id.to_le_bytes());
    key
}

/// SHA-256 keystream over `key`, domain-separated from the tag derivation.
fn keystream(key: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut counter = 0u32;
    while out.len() < len {
        let mut hasher = Sha256::new();
        hasher.update(key);
        hasher.update(counter.to_le_bytes());
        hasher.update([0u8]);
        out.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    out.truncate(len);
    out
}

/// Encrypt-then-MAC tag over a ciphertext.
fn tag(key: &[u8], ciphertext: &[u8]) -> [u8; TAG_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.update(ciphertext);
    hasher.update([1u8]);
    let digest = hasher.finalize();
    let mut out = [0u8; TAG_LEN];
    out.copy_from_slice(&digest[..TAG_LEN]);
    out
}

/// Constant-time byte-string equality.
fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Authenticated encryption of `plaintext` under `key`.
///
/// The scheme is a SHA-256 keystream XORed onto the plaintext with a
/// SHA-256 encrypt-then-MAC tag appended; decryption with any other key
/// fails the tag check with overwhelming probability.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let pad = keystream(key, plaintext.len());
    let mut out: Vec<u8> = plaintext.iter().zip(pad.iter()).map(|(p, k)| p ^ k).collect();
    let t = tag(key, &out);
    out.extend_from_slice(&t);
    out
}

/// Authenticated decryption; `None` on any tag or length mismatch.
///
/// The tag comparison is constant-time.
pub fn open(key: &[u8], sealed: &[u8]) -> Option<Vec<u8>> {
    if sealed.len() < TAG_LEN {
        return None;
    }
    let (ciphertext, received_tag) = sealed.split_at(sealed.len() - TAG_LEN);
    if !ct_eq(&tag(key, ciphertext), received_tag) {
        return None;
    }
    let pad = keystream(key, ciphertext.len());
    Some(ciphertext.iter().zip(pad.iter()).map(|(c, k)| c ^ k).collect())
}
