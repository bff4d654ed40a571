//! The seam between the protocol core and the external escrow/transaction
//! service.
//!
//! The core never builds or broadcasts transactions. It receives an opaque
//! transaction shape from the escrow service, derives the per-lock-time digest
//! each candidate redeem signs over, and hands back a [`SignedRedeem`] for the
//! service to finalize.

use crate::serde::SerializeKey;
use crate::Error;
use k256::ecdsa::{Signature, VerifyingKey};
use serde::*;

const SIGHASH_TAG: &[u8] = b"tumbler.redeem-sighash.v1";

/// The lock-time field distinguishing one candidate redeem transaction from
/// its siblings. Real entries use consecutive values starting at zero.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct LockTime(u32);

impl LockTime {
    /// Wrap a raw lock-time value.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// The raw lock-time value.
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// A 32-byte digest a signer commits to: either a real redeem transaction's
/// signature hash or a decoy derived from a salt. The two must be
/// indistinguishable to the server.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct SigHash([u8; 32]);

impl SigHash {
    /// Wrap a raw digest.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// The opaque transaction shape produced by the escrow service's
/// `build_template` for a given destination and fee rate. All N candidate
/// redeems share this shape and differ only by lock-time.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CashoutTemplate {
    payload: Vec<u8>,
}

impl CashoutTemplate {
    /// Wrap the escrow service's transaction shape.
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    /// The underlying shape bytes, for handing back to the escrow service.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The digest the escrow signers commit to for this template at the given
    /// lock-time.
    pub fn signature_hash(&self, lock_time: LockTime) -> SigHash {
        use sha3::{Digest, Sha3_256};
        let mut hasher = Sha3_256::new();
        hasher.update(SIGHASH_TAG);
        hasher.update(&lock_time.0.to_le_bytes());
        hasher.update(&self.payload);
        SigHash(hasher.finalize().into())
    }
}

/// The escrow a session redeems from, reduced to what the core needs: the set
/// of keys whose signatures can spend it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escrow {
    #[serde(with = "SerializeKey")]
    signers: Vec<VerifyingKey>,
}

impl Escrow {
    /// Build an escrow description from its expected signer set, as extracted
    /// from the escrow script by the surrounding system.
    pub fn new(signers: Vec<VerifyingKey>) -> Result<Self, Error> {
        if signers.is_empty() {
            return Err(Error::MalformedInput("escrow needs at least one signer"));
        }
        Ok(Self { signers })
    }

    /// The keys a recovered signature may verify under.
    pub fn signers(&self) -> &[VerifyingKey] {
        &self.signers
    }
}

/// The promise protocol's final output: one candidate redeem, now carrying a
/// valid counterparty signature, ready for the escrow service's
/// `apply_signature`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedRedeem {
    template: CashoutTemplate,
    lock_time: LockTime,
    #[serde(with = "SerializeKey")]
    signer: VerifyingKey,
    #[serde(with = "SerializeKey")]
    signature: Signature,
}

impl SignedRedeem {
    pub(crate) fn new(
        template: CashoutTemplate,
        lock_time: LockTime,
        signer: VerifyingKey,
        signature: Signature,
    ) -> Self {
        Self {
            template,
            lock_time,
            signer,
            signature,
        }
    }

    /// The shared transaction shape.
    pub fn template(&self) -> &CashoutTemplate {
        &self.template
    }

    /// The lock-time of the candidate the recovered signature authorizes.
    pub fn lock_time(&self) -> LockTime {
        self.lock_time
    }

    /// The escrow key that produced the signature.
    pub fn signer(&self) -> &VerifyingKey {
        &self.signer
    }

    /// The recovered ECDSA signature over this candidate's digest.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lock_time_distinguishes_hashes() {
        let template = CashoutTemplate::new(b"escrowed cashout shape".to_vec());
        let h0 = template.signature_hash(LockTime::new(0));
        let h1 = template.signature_hash(LockTime::new(1));
        assert_ne!(h0, h1);
        assert_eq!(h0, template.signature_hash(LockTime::new(0)));
    }

    #[test]
    fn escrow_requires_signers() {
        assert!(matches!(
            Escrow::new(Vec::new()),
            Err(Error::MalformedInput(_))
        ));
    }
}
