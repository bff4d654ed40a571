/*!
This crate implements the two cut-and-choose blind-puzzle sub-protocols at the
heart of the tumbler's unlinkable payment hand-off, on top of the primitives in
`tumbler-crypto`.

# Promise protocol

A client obtains a blinded RSA puzzle whose solution opens an ECDSA signature
on exactly one of N near-identical redeem transactions, without the server
learning which. The client hides its N real transaction hashes among M decoys,
commits to the decoy positions, and audits the server's response: every decoy
commitment must open honestly, and the real commitments must be linked by a
homomorphic quotient chain so that one solved puzzle retroactively yields a
signature for any one of the N candidates. See [`promise`].

# Solver protocol

A fair exchange of an RSA puzzle solution for payment. The client hides N
blindings of its one real puzzle among M decoys it already knows the plaintext
of. The server solves all of them but releases solutions only as masked
commitments; decoy keys are released after the client proves which entries were
decoys, and real keys only after the client discloses the blind factors that
tie every real entry to a single underlying puzzle. A server that mis-solves
even one entry is caught with probability M/(N+M). See [`solver`].

# Sessions

Each role drives a session value through a strictly forward-only state
sequence; every transition consumes one inbound message and produces one
outbound response, never blocks, and fails hard (the session must be discarded
and rebuilt with fresh randomness — partial retries would leak cut-and-choose
secrets). Sessions are serializable so they can be persisted between
round-trips; one session per logical channel, single-writer by ownership.
*/

#![warn(missing_docs)]
#![warn(missing_copy_implementations, missing_debug_implementations)]
#![warn(unused_qualifications, unused_results)]
#![warn(future_incompatible)]
#![warn(unused)]
#![forbid(rustdoc::broken_intra_doc_links)]

pub mod promise;
pub mod solver;

mod entries;
mod parameters;
mod serde;
#[cfg(test)]
pub(crate) mod test_support;
mod transaction;

pub use crate::parameters::{Parameters, Salt};
pub use crate::serde::SerializeKey;
pub use crate::transaction::{CashoutTemplate, Escrow, LockTime, SigHash, SignedRedeem};

use thiserror::*;

/// A trait synonym for a cryptographically secure random number generator. This trait is
/// blanket-implemented for all valid types and will never need to be implemented by-hand.
pub trait Rng: rand::CryptoRng + rand::RngCore {}
impl<T: rand::CryptoRng + rand::RngCore> Rng for T {}

/// Error types surfaced by protocol sessions.
///
/// Every error is terminal for its session: the orchestration layer decides
/// whether to blame the counterparty, recover escrowed funds through the
/// refund path, or start over with fresh randomness.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum Error {
    /// An operation was invoked out of sequence. Always a caller bug.
    #[error("invalid session state: expected {expected}, actual {actual}")]
    InvalidState {
        /// The state the operation requires.
        expected: &'static str,
        /// The state the session is actually in.
        actual: &'static str,
    },
    /// A message or configuration value was structurally unusable.
    #[error("malformed input: {0}")]
    MalformedInput(&'static str),
    /// A message carried the wrong number of elements for the agreed parameters.
    #[error("expected {expected} elements, got {got}")]
    LengthMismatch {
        /// The count implied by the shared parameters.
        expected: usize,
        /// The count actually received.
        got: usize,
    },
    /// A cut-and-choose audit failed: a commitment, reveal, or decoy solution
    /// did not check out. Treated as a detected cheating attempt.
    #[error("invalid proof: {0}")]
    InvalidProof(&'static str),
    /// An unmasked signature failed to verify under any expected signer.
    #[error("unmasked signature is not valid for any expected signer")]
    InvalidSignature,
    /// A quotient did not link two adjacent real puzzles.
    #[error("quotient does not link adjacent real puzzles")]
    InvalidQuotient,
    /// A puzzle solution did not correspond to any retained real entry. The
    /// escrowed funds must be recovered via the pre-agreed refund path.
    #[error("solution does not open any retained entry")]
    WrongSolution,
    /// A failure in the underlying puzzle arithmetic.
    #[error(transparent)]
    Crypto(#[from] tumbler_crypto::Error),
}
