//! Shared fixtures for unit tests.

use crate::{Escrow, Parameters};
use k256::ecdsa::SigningKey;
use num_bigint::BigUint;
use rand::SeedableRng;
use tumbler_crypto::RsaKeyPair;

pub fn rng() -> impl crate::Rng {
    let seed: [u8; 32] = *b"NEVER USE THIS FOR ANYTHING REAL";
    rand::rngs::StdRng::from_seed(seed)
}

/// Mersenne prime 2^p - 1.
fn mersenne(p: u32) -> BigUint {
    (BigUint::from(1u32) << p) - 1u32
}

/// Small fixed RSA key standing in for the external key service.
pub fn server_keypair() -> RsaKeyPair {
    RsaKeyPair::from_primes(mersenne(107), mersenne(127), BigUint::from(65537u32))
        .expect("test primes admit e = 65537")
}

pub fn parameters(real_count: usize, fake_count: usize) -> Parameters {
    Parameters::new(
        server_keypair().public_key().clone(),
        real_count,
        fake_count,
    )
    .expect("valid test parameters")
}

/// The escrow signing key held by the test server. Deterministic so client
/// fixtures can name the matching escrow.
pub fn signing_key() -> SigningKey {
    SigningKey::random(&mut rng())
}

/// A single-signer escrow matching [`signing_key`].
pub fn escrow() -> Escrow {
    Escrow::new(vec![*signing_key().verifying_key()]).expect("nonempty signer set")
}
