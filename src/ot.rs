use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::label;

/// Draw a uniform scalar by wide reduction of 64 random bytes.
fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut wide = [0u8; 64];
    rng.fill_bytes(&mut wide);
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Random oracle mapping a group element to a symmetric key.
fn derive_key(point: &RistrettoPoint) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(point.compress().as_bytes());
    hasher.finalize().into()
}

fn decompress(bytes: &[u8; 32]) -> Result<RistrettoPoint> {
    CompressedRistretto(*bytes)
        .decompress()
        .ok_or_else(|| Error::Protocol("malformed group element in OT message".to_string()))
}

/// Sender side of one 1-out-of-2 oblivious transfer.
///
/// The construction is Diffie-Hellman based over the Ristretto group: the
/// sender publishes `A = g^a`; the receiver answers `g^b` (choice 0) or
/// `A · g^b` (choice 1); the sender derives `k0 = H(B^a)` and
/// `k1 = H((B / A)^a)` and encrypts one message under each. Exactly one of
/// the two keys equals the receiver's `H(A^b)`, and the sender cannot tell
/// which.
///
/// Each instance holds a fresh secret and serves a single transfer.
#[derive(Debug)]
pub struct OtSender {
    secret: Scalar,
    public: RistrettoPoint,
}

impl OtSender {
    /// Start a transfer with a fresh Diffie-Hellman secret.
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = random_scalar(rng);
        OtSender {
            secret,
            public: RistrettoPoint::mul_base(&secret),
        }
    }

    /// The sender's public element `A = g^a`, compressed for the wire.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.compress().to_bytes()
    }

    /// Encrypt the two messages against the receiver's public element.
    ///
    /// Returns the pair of ciphertexts `(c0, c1)`; the receiver can open
    /// only the one matching its choice bit.
    pub fn transfer(
        &self,
        receiver_point: &[u8; 32],
        m0: &[u8],
        m1: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        let receiver = decompress(receiver_point)?;
        let k0 = derive_key(&(receiver * self.secret));
        let k1 = derive_key(&((receiver - self.public) * self.secret));
        Ok((label::seal(&k0, m0), label::seal(&k1, m1)))
    }
}

/// Receiver side of one 1-out-of-2 oblivious transfer.
#[derive(Debug)]
pub struct OtReceiver {
    choice: bool,
    secret: Scalar,
    sender_public: RistrettoPoint,
    public: RistrettoPoint,
}

impl OtReceiver {
    /// Answer a sender's public element with a fresh blinding secret.
    ///
    /// For choice 0 the response is `g^b`; for choice 1 it is `A · g^b`.
    /// Either way it is a uniformly random group element to the sender.
    pub fn new<R: RngCore + CryptoRng>(
        choice: bool,
        sender_point: &[u8; 32],
        rng: &mut R,
    ) -> Result<Self> {
        let sender_public = decompress(sender_point)?;
        let secret = random_scalar(rng);
        let blind = RistrettoPoint::mul_base(&secret);
        let public = if choice { sender_public + blind } else { blind };
        Ok(OtReceiver {
            choice,
            secret,
            sender_public,
            public,
        })
    }

    /// The receiver's public element, compressed for the wire.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.compress().to_bytes()
    }

    /// Open the ciphertext selected by the choice bit.
    ///
    /// The other ciphertext is indistinguishable from random under the
    /// receiver's single key; a tag failure on the chosen one indicates a
    /// corrupted transfer.
    pub fn receive(&self, c0: &[u8], c1: &[u8]) -> Result<Vec<u8>> {
        let key = derive_key(&(self.sender_public * self.secret));
        let chosen = if self.choice { c1 } else { c0 };
        label::open(&key, chosen)
            .ok_or_else(|| Error::Crypto("oblivious transfer ciphertext failed to open".to_string()))
    }
}
