//! Shared protocol parameters.
//!
//! Both parties agree on these out-of-band before any session starts, and they
//! stay immutable for the lifetime of every session built from them. The decoy
//! derivation functions live here so that client and server compute bit-identical
//! decoys from a revealed salt.

use crate::transaction::SigHash;
use crate::{Error, Rng};
use serde::*;
use tumbler_crypto::{PuzzleSolution, RsaPublicKey};

const FAKE_HASH_TAG: &[u8] = b"tumbler.fake-hash.v1";
const FAKE_SOLUTION_TAG: &[u8] = b"tumbler.fake-solution.v1";

/// A random 32-byte salt distinguishing one decoy entry from another.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Salt([u8; 32]);

impl Salt {
    /// Draw a fresh salt.
    pub fn random(rng: &mut impl Rng) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

/// Immutable parameters shared by both roles of a promise or solver session:
/// the server's RSA public key and the cut-and-choose counts.
///
/// A dishonest server is caught with probability `fake_count / total`, so the
/// counts are a deployment decision, not constants of this crate.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    server_key: RsaPublicKey,
    real_count: usize,
    fake_count: usize,
}

impl Parameters {
    /// Build a parameter set. At least one real entry is required; zero decoys
    /// is permitted (a degenerate exchange with no cheat detection).
    pub fn new(
        server_key: RsaPublicKey,
        real_count: usize,
        fake_count: usize,
    ) -> Result<Self, Error> {
        if real_count == 0 {
            return Err(Error::MalformedInput("real entry count must be nonzero"));
        }
        Ok(Self {
            server_key,
            real_count,
            fake_count,
        })
    }

    /// The server's RSA public key.
    pub fn server_key(&self) -> &RsaPublicKey {
        &self.server_key
    }

    /// Number of real entries per exchange.
    pub fn real_count(&self) -> usize {
        self.real_count
    }

    /// Number of decoy entries per exchange.
    pub fn fake_count(&self) -> usize {
        self.fake_count
    }

    /// Total entries per exchange.
    pub fn total_count(&self) -> usize {
        self.real_count + self.fake_count
    }

    /// The hash a promise decoy entry presents in place of a transaction digest.
    /// Deterministic in the salt, so a revealed salt lets the server recompute it.
    pub fn fake_hash(&self, salt: &Salt) -> SigHash {
        use sha3::{Digest, Sha3_256};
        let mut hasher = Sha3_256::new();
        hasher.update(FAKE_HASH_TAG);
        hasher.update(&salt.0);
        SigHash::new(hasher.finalize().into())
    }

    /// The pre-known plaintext behind a solver decoy puzzle, derived from its
    /// salt and reduced into the puzzle domain.
    pub fn fake_solution(&self, salt: &Salt) -> PuzzleSolution {
        use sha3::digest::{ExtendableOutput, Update, XofReader};
        let mut hasher = sha3::Shake256::default();
        hasher.update(FAKE_SOLUTION_TAG);
        hasher.update(&salt.0);
        let mut reader = hasher.finalize_xof();
        // Sixteen extra bytes keep the reduction bias negligible.
        let mut bytes = vec![0u8; self.server_key.modulus_len() + 16];
        reader.read(&mut bytes);
        self.server_key.solution_from_bytes(&bytes)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{rng, server_keypair};

    #[test]
    fn zero_real_entries_is_malformed() {
        let pk = server_keypair().public_key().clone();
        assert_eq!(
            Parameters::new(pk, 0, 2),
            Err(Error::MalformedInput("real entry count must be nonzero"))
        );
    }

    #[test]
    fn degenerate_counts_are_accepted() {
        let pk = server_keypair().public_key().clone();
        let parameters = Parameters::new(pk, 1, 0).unwrap();
        assert_eq!(parameters.total_count(), 1);
    }

    #[test]
    fn decoy_derivations_are_deterministic_and_salted() {
        let mut rng = rng();
        let pk = server_keypair().public_key().clone();
        let parameters = Parameters::new(pk, 2, 2).unwrap();

        let salt = Salt::random(&mut rng);
        let other = Salt::random(&mut rng);

        assert_eq!(parameters.fake_hash(&salt), parameters.fake_hash(&salt));
        assert_ne!(parameters.fake_hash(&salt), parameters.fake_hash(&other));
        assert_eq!(
            parameters.fake_solution(&salt),
            parameters.fake_solution(&salt)
        );
        assert_ne!(
            parameters.fake_solution(&salt),
            parameters.fake_solution(&other)
        );
    }

    #[test]
    fn fake_solutions_live_in_the_puzzle_domain() {
        let mut rng = rng();
        let keypair = server_keypair();
        let pk = keypair.public_key();
        let parameters = Parameters::new(pk.clone(), 1, 1).unwrap();

        let solution = parameters.fake_solution(&Salt::random(&mut rng));
        // Encrypting must succeed, i.e. the derived value is reduced.
        let puzzle = pk.encrypt(&solution).unwrap();
        assert!(pk.verify_solution(&puzzle, &solution));
    }
}
