//! Cryptographic primitives for the tumbler's cut-and-choose blind-puzzle protocols:
//! - A blind RSA "puzzle" cryptosystem whose ciphertext space is closed under
//!   multiplication mod N, giving the homomorphic quotient-chaining property the
//!   promise protocol relies on.
//! - A reversible XOR-style masking scheme that hides a signature behind a puzzle
//!   solution, so learning the solution reveals exactly one signature.
//! - Salted hash commitments to fake-index sets, opened during the reveal phase.
//!
//! The puzzle construction follows the TumbleBit paper ["TumbleBit: An Untrusted
//! Bitcoin-Compatible Anonymous Payment Hub"](https://eprint.iacr.org/2016/575.pdf).

#![warn(missing_docs)]
#![warn(missing_copy_implementations, missing_debug_implementations)]
#![warn(unused_qualifications, unused_results)]
#![warn(future_incompatible)]
#![warn(unused)]
#![forbid(rustdoc::broken_intra_doc_links)]

pub mod commitment;
pub mod rsa;

pub use crate::commitment::{IndexCommitment, IndexSalt, KeyHash, MaskedSignature, XorKey};
pub use crate::rsa::{BlindFactor, PuzzleSolution, PuzzleValue, Quotient, RsaKeyPair, RsaPublicKey};

use thiserror::*;

/// Error types that may arise from puzzle and masking operations.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum Error {
    /// Caused by passing a solution or ciphertext that is not reduced modulo the RSA
    /// modulus. Oversized values are always malformed, never wrapped.
    #[error("value is not within the RSA modulus")]
    InvalidSolution,
    /// Caused by constructing a keypair from primes incompatible with the public exponent.
    #[error("public exponent is not invertible for the given primes")]
    InvalidKey,
    /// Caused by a value that shares a factor with the modulus and so has no inverse.
    /// With honestly generated keys this indicates a corrupted or adversarial input.
    #[error("value has no inverse modulo the RSA modulus")]
    NotInvertible,
}

/// A trait synonym for a cryptographically secure random number generator. This trait is
/// blanket-implemented for all valid types and will never need to be implemented by-hand.
pub trait Rng: rand::CryptoRng + rand::RngCore {}
impl<T: rand::CryptoRng + rand::RngCore> Rng for T {}
