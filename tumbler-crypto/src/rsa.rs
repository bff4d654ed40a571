//! The blind RSA puzzle primitive.
//!
//! A *puzzle* is a raw RSA ciphertext `s^e mod n`; its *solution* is the plaintext
//! `s`. Because raw RSA is multiplicatively homomorphic, a puzzle can be blinded
//! with `r^e` so the holder of the private key solves it without recognizing the
//! underlying value, and two solutions can be linked through a public quotient
//! without solving both.
//!
//! All values are reduced modulo `n`; oversized inputs are rejected rather than
//! wrapped, since a wrapped value would silently verify against the wrong puzzle.

use crate::{Error, Rng};
use num_bigint::{BigUint, RandBigInt};
use num_traits::One;
use serde::*;

/// The public half of the tumbler's RSA key. Known to both parties.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RsaPublicKey {
    n: BigUint,
    e: BigUint,
}

/// An RSA keypair. Held only by the server; the `solve` operation is the
/// capability the whole exchange is priced around.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RsaKeyPair {
    d: BigUint,
    pk: RsaPublicKey,
}

/// An unsolved puzzle: an RSA ciphertext over the server key.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PuzzleValue(BigUint);

/// The plaintext behind a [`PuzzleValue`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PuzzleSolution(BigUint);

/// The random factor used to blind one puzzle. Must be fresh per puzzle; reuse
/// across puzzles links them and breaks unlinkability.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlindFactor(BigUint);

/// The ratio between two puzzle solutions, published as part of a commitment
/// proof. Knowing one solution and the quotient yields the next solution.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Quotient(BigUint);

impl RsaPublicKey {
    /// Construct a public key from its modulus and exponent.
    pub fn new(n: BigUint, e: BigUint) -> Self {
        Self { n, e }
    }

    /// The RSA modulus.
    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    /// Length of the canonical big-endian encoding of values under this modulus.
    pub fn modulus_len(&self) -> usize {
        ((self.n.bits() + 7) / 8) as usize
    }

    /// Check that a solution is reduced modulo `n`.
    pub fn check_range(&self, solution: &PuzzleSolution) -> Result<(), Error> {
        if solution.0 < self.n {
            Ok(())
        } else {
            Err(Error::InvalidSolution)
        }
    }

    /// Encrypt a solution into its puzzle: `s^e mod n`.
    pub fn encrypt(&self, solution: &PuzzleSolution) -> Result<PuzzleValue, Error> {
        self.check_range(solution)?;
        Ok(PuzzleValue(solution.0.modpow(&self.e, &self.n)))
    }

    /// Check that `solution` is the plaintext behind `puzzle`.
    pub fn verify_solution(&self, puzzle: &PuzzleValue, solution: &PuzzleSolution) -> bool {
        match self.encrypt(solution) {
            Ok(expected) => expected == *puzzle,
            Err(_) => false,
        }
    }

    /// Draw a solution uniformly at random from the puzzle domain.
    pub fn random_solution(&self, rng: &mut impl Rng) -> PuzzleSolution {
        PuzzleSolution(rng.gen_biguint_below(&self.n))
    }

    /// Reduce arbitrary bytes into the puzzle domain. Used to derive decoy
    /// solutions deterministically from a salt.
    pub fn solution_from_bytes(&self, bytes: &[u8]) -> PuzzleSolution {
        PuzzleSolution(BigUint::from_bytes_be(bytes) % &self.n)
    }

    /// Blind a puzzle with a fresh random factor: `z * r^e mod n`.
    ///
    /// The returned [`BlindFactor`] is the only way back from the solution of the
    /// blinded puzzle to the solution of the original one.
    pub fn blind(&self, rng: &mut impl Rng, puzzle: &PuzzleValue) -> (PuzzleValue, BlindFactor) {
        let r = loop {
            let candidate = rng.gen_biguint_below(&self.n);
            if candidate > BigUint::one() && candidate.modinv(&self.n).is_some() {
                break candidate;
            }
        };
        let blinded = (&puzzle.0 * r.modpow(&self.e, &self.n)) % &self.n;
        (PuzzleValue(blinded), BlindFactor(r))
    }

    /// Recover the solution of the original puzzle from the solution of its
    /// blinded counterpart: `s * r^-1 mod n`.
    pub fn unblind_solution(
        &self,
        solution: &PuzzleSolution,
        blind_factor: &BlindFactor,
    ) -> Result<PuzzleSolution, Error> {
        self.check_range(solution)?;
        let r_inv = blind_factor
            .0
            .modinv(&self.n)
            .ok_or(Error::NotInvertible)?;
        Ok(PuzzleSolution((&solution.0 * r_inv) % &self.n))
    }

    /// Strip the blinding from a puzzle itself: `z_blinded * (r^e)^-1 mod n`.
    ///
    /// The solver server uses this to audit disclosed blind factors: every
    /// unblinded real puzzle must collapse to the same underlying value.
    pub fn unblind_puzzle(
        &self,
        blinded: &PuzzleValue,
        blind_factor: &BlindFactor,
    ) -> Result<PuzzleValue, Error> {
        let re_inv = blind_factor
            .0
            .modpow(&self.e, &self.n)
            .modinv(&self.n)
            .ok_or(Error::NotInvertible)?;
        Ok(PuzzleValue((&blinded.0 * re_inv) % &self.n))
    }

    /// The homomorphic product of two ciphertexts: decrypting the result yields
    /// the product of the plaintexts mod `n`.
    pub fn multiply(&self, a: &PuzzleValue, b: &PuzzleValue) -> PuzzleValue {
        PuzzleValue((&a.0 * &b.0) % &self.n)
    }

    /// The puzzle that follows `previous` in a quotient chain:
    /// `previous * encrypt(quotient) mod n`.
    pub fn next_puzzle(
        &self,
        previous: &PuzzleValue,
        quotient: &Quotient,
    ) -> Result<PuzzleValue, Error> {
        let encrypted = self.encrypt(&PuzzleSolution(quotient.0.clone()))?;
        Ok(self.multiply(previous, &encrypted))
    }
}

impl RsaKeyPair {
    /// Build a keypair from two primes and a public exponent.
    ///
    /// Primality of `p` and `q` is the responsibility of the external key
    /// service; this only checks that `e` is invertible modulo the totient.
    pub fn from_primes(p: BigUint, q: BigUint, e: BigUint) -> Result<Self, Error> {
        let n = &p * &q;
        let totient = (&p - BigUint::one()) * (&q - BigUint::one());
        let d = e.modinv(&totient).ok_or(Error::InvalidKey)?;
        Ok(Self {
            d,
            pk: RsaPublicKey::new(n, e),
        })
    }

    /// The public half of this keypair.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.pk
    }

    /// Solve a puzzle: `c^d mod n`. Rejects ciphertexts outside the modulus.
    ///
    /// Pure with respect to `self`, so distinct sessions may solve concurrently
    /// against the same key material.
    pub fn solve(&self, puzzle: &PuzzleValue) -> Result<PuzzleSolution, Error> {
        if puzzle.0 >= self.pk.n {
            return Err(Error::InvalidSolution);
        }
        Ok(PuzzleSolution(puzzle.0.modpow(&self.d, &self.pk.n)))
    }
}

impl PuzzleSolution {
    /// Canonical big-endian encoding, left-padded to `len` bytes.
    pub fn to_bytes_padded(&self, len: usize) -> Vec<u8> {
        let raw = self.0.to_bytes_be();
        let mut out = vec![0u8; len.saturating_sub(raw.len())];
        out.extend_from_slice(&raw);
        out
    }

    /// Decode a solution from big-endian bytes.
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }
}

impl Quotient {
    /// The quotient linking two solutions: `next * previous^-1 mod n`.
    pub fn between(
        pk: &RsaPublicKey,
        previous: &PuzzleSolution,
        next: &PuzzleSolution,
    ) -> Result<Self, Error> {
        let prev_inv = previous.0.modinv(&pk.n).ok_or(Error::NotInvertible)?;
        Ok(Self((&next.0 * prev_inv) % &pk.n))
    }

    /// Derive the next solution in a chain from the previous one.
    pub fn apply(&self, pk: &RsaPublicKey, previous: &PuzzleSolution) -> PuzzleSolution {
        PuzzleSolution((&previous.0 * &self.0) % &pk.n)
    }

    /// Shift the quotient by one unit mod `n`. Only useful to tests exercising
    /// tampered proofs.
    #[doc(hidden)]
    pub fn tampered(&self, pk: &RsaPublicKey) -> Self {
        Self((&self.0 + BigUint::one()) % &pk.n)
    }
}
