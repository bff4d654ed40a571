//! Hiding commitments used by the cut-and-choose exchanges.
//!
//! Two constructions live here:
//! - [`XorKey`], a reversible XOR mask keyed either by a puzzle solution (so that
//!   solving the puzzle opens the mask) or by fresh random bytes (so that the
//!   mask can be opened later by revealing the key). The mask stream is SHAKE256
//!   of the key, so the masked value alone is computationally hiding.
//! - [`IndexCommitment`], a salted SHA3-256 commitment to a set of indexes,
//!   binding the committer to exactly which entries were decoys before the
//!   counterparty produces anything that depends on that choice.

use crate::rsa::{PuzzleSolution, RsaPublicKey};
use crate::Rng;
use serde::*;

const MASK_TAG: &[u8] = b"tumbler.mask.v1";
const INDEX_TAG: &[u8] = b"tumbler.index-set.v1";
const KEY_HASH_TAG: &[u8] = b"tumbler.key-hash.v1";

const RANDOM_KEY_LEN: usize = 32;

fn sha3(chunks: &[&[u8]]) -> [u8; 32] {
    use sha3::{Digest, Sha3_256};
    let mut hasher = Sha3_256::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finalize().into()
}

fn shake_stream(tag: &[u8], key: &[u8], len: usize) -> Vec<u8> {
    use sha3::digest::{ExtendableOutput, Update, XofReader};
    let mut hasher = sha3::Shake256::default();
    hasher.update(tag);
    hasher.update(key);
    let mut reader = hasher.finalize_xof();
    let mut out = vec![0u8; len];
    reader.read(&mut out);
    out
}

/// A symmetric masking key. Applying it twice is the identity.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct XorKey(Vec<u8>);

/// A signature combined with a mask; reveals nothing until the key is known.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct MaskedSignature(Vec<u8>);

/// A binding hash of an [`XorKey`], published before the key itself.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyHash([u8; 32]);

impl XorKey {
    /// Derive the key from a puzzle solution, canonically encoded under the
    /// given public key. Whoever solves the puzzle can rebuild this key.
    pub fn from_solution(solution: &PuzzleSolution, pk: &RsaPublicKey) -> Self {
        Self(solution.to_bytes_padded(pk.modulus_len()))
    }

    /// A fresh random key, for masks opened by revealing the key directly.
    pub fn random(rng: &mut impl Rng) -> Self {
        let mut bytes = vec![0u8; RANDOM_KEY_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// XOR `data` against this key's SHAKE256 stream. Self-inverse.
    pub fn apply(&self, data: &[u8]) -> Vec<u8> {
        let stream = shake_stream(MASK_TAG, &self.0, data.len());
        data.iter().zip(stream).map(|(byte, pad)| byte ^ pad).collect()
    }

    /// Mask a signature's byte encoding.
    pub fn mask_signature(&self, signature: &[u8]) -> MaskedSignature {
        MaskedSignature(self.apply(signature))
    }

    /// Open a masked signature back into its byte encoding. The caller is
    /// responsible for checking the result actually verifies; a wrong key
    /// yields garbage bytes, not an error.
    pub fn unmask_signature(&self, masked: &MaskedSignature) -> Vec<u8> {
        self.apply(&masked.0)
    }

    /// A binding hash of this key.
    pub fn hash(&self) -> KeyHash {
        KeyHash(sha3(&[KEY_HASH_TAG, &self.0]))
    }
}

impl KeyHash {
    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// A salted commitment to a set of fake-entry indexes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexCommitment([u8; 32]);

/// The salt opening an [`IndexCommitment`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexSalt([u8; 32]);

fn index_digest(salt: &IndexSalt, indexes: &[usize]) -> [u8; 32] {
    use sha3::{Digest, Sha3_256};
    let mut hasher = Sha3_256::new();
    hasher.update(INDEX_TAG);
    hasher.update(&salt.0);
    for index in indexes {
        hasher.update(&(*index as u32).to_le_bytes());
    }
    hasher.finalize().into()
}

/// Commit to a set of indexes under a fresh random salt.
pub fn commit_indexes(rng: &mut impl Rng, indexes: &[usize]) -> (IndexCommitment, IndexSalt) {
    let mut salt = [0u8; 32];
    rng.fill_bytes(&mut salt);
    let salt = IndexSalt(salt);
    (IndexCommitment(index_digest(&salt, indexes)), salt)
}

impl IndexCommitment {
    /// Check that `indexes` opened with `salt` is exactly the committed set.
    pub fn verify(&self, salt: &IndexSalt, indexes: &[usize]) -> bool {
        index_digest(salt, indexes) == self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::{keypair, rng};

    #[test]
    fn mask_is_self_inverse() {
        let mut rng = rng();
        let key = XorKey::random(&mut rng);
        let signature = [0x5au8; 64];

        let masked = key.mask_signature(&signature);
        assert_ne!(masked.0.as_slice(), &signature[..]);
        assert_eq!(key.unmask_signature(&masked), signature.to_vec());
    }

    #[test]
    fn solution_keys_are_canonical() {
        let mut rng = rng();
        let pk = keypair().public_key().clone();

        let solution = pk.random_solution(&mut rng);
        let a = XorKey::from_solution(&solution, &pk);
        let b = XorKey::from_solution(&solution, &pk);
        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn wrong_key_does_not_open_the_mask() {
        let mut rng = rng();
        let key = XorKey::random(&mut rng);
        let other = XorKey::random(&mut rng);
        let signature = [0x5au8; 64];

        let masked = key.mask_signature(&signature);
        assert_ne!(other.unmask_signature(&masked), signature.to_vec());
        assert_ne!(other.hash(), key.hash());
    }

    #[test]
    fn index_commitment_round_trip() {
        let mut rng = rng();
        let indexes = [1usize, 3, 4];

        let (commitment, salt) = commit_indexes(&mut rng, &indexes);
        assert!(commitment.verify(&salt, &indexes));
    }

    #[test]
    fn index_commitment_rejects_any_change() {
        let mut rng = rng();
        let indexes = [1usize, 3, 4];
        let (commitment, salt) = commit_indexes(&mut rng, &indexes);

        // Flipped element, reordered set, truncated set, wrong salt.
        assert!(!commitment.verify(&salt, &[1, 2, 4]));
        assert!(!commitment.verify(&salt, &[3, 1, 4]));
        assert!(!commitment.verify(&salt, &[1, 3]));
        let (_, other_salt) = commit_indexes(&mut rng, &indexes);
        assert!(!commitment.verify(&other_salt, &indexes));
    }
}
