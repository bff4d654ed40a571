use num_bigint::BigUint;
use rand::SeedableRng;
use tumbler_crypto::RsaKeyPair;
use tumbler_protocol::Parameters;

// Seeded rng for replicable tests.
pub fn seeded_rng() -> (impl rand::CryptoRng + rand::RngCore) {
    const TEST_RNG_SEED: [u8; 32] = *b"NEVER USE THIS FOR ANYTHING REAL";
    rand::rngs::StdRng::from_seed(TEST_RNG_SEED)
}

fn mersenne(p: u32) -> BigUint {
    (BigUint::from(1u32) << p) - 1u32
}

// Small fixed RSA key standing in for the external key service.
pub fn keypair() -> RsaKeyPair {
    RsaKeyPair::from_primes(mersenne(107), mersenne(127), BigUint::from(65537u32))
        .expect("test primes admit e = 65537")
}

pub fn parameters(real_count: usize, fake_count: usize) -> Parameters {
    Parameters::new(keypair().public_key().clone(), real_count, fake_count)
        .expect("valid test parameters")
}
