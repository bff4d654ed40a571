/*!
The promise protocol: a cut-and-choose exchange binding a blinded RSA puzzle to
a signature on one of N near-identical redeem transactions.

## Flow

The client hides N real signature hashes (one per candidate lock-time) among M
salt-derived decoys and sends the shuffled batch together with a salted
commitment to the decoy positions ([`SignaturesRequest`]). The server signs
every hash, hides each signature behind a fresh puzzle solution, and answers
with one [`ServerCommitment`] per entry. The client then opens its decoy
commitment ([`ClientRevelation`]); the server checks the reveal against the
commitment and the recomputed decoy hashes before answering with a
[`ServerCommitmentsProof`]: the plaintext solution of every decoy plus the
quotient chain linking the real puzzles.

If every decoy opens to a valid signature and the quotient chain holds, the
client knows (with probability M/(N+M) per cheated entry) that the real
commitments are honest too. It discards the decoys, blinds the first real
puzzle, and hands the blinded value to the solver protocol. Once the solution
comes back, the quotient chain turns that single solution into the signature
for whichever candidate lock-time the client ultimately needs.
*/

use crate::transaction::SigHash;
use crate::Salt;
use serde::*;
use tumbler_crypto::{
    IndexCommitment, IndexSalt, MaskedSignature, PuzzleSolution, PuzzleValue, Quotient,
};

pub mod client;
pub mod server;

pub use client::PromiseClientSession;
pub use server::PromiseServerSession;

/// The client's opening message: the shuffled entry hashes and a hiding
/// commitment to which of them are decoys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignaturesRequest {
    /// One digest per entry, real and decoy interleaved.
    pub hashes: Vec<SigHash>,
    /// Salted commitment to the decoy index set.
    pub fake_index_commitment: IndexCommitment,
}

/// The server's promise for one entry: a puzzle hiding a fresh secret, and the
/// entry's signature masked under that secret. Solving the puzzle opens the
/// signature; the pair alone reveals nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCommitment {
    /// Encryption of the per-entry secret under the server's RSA key.
    pub puzzle: PuzzleValue,
    /// The ECDSA signature over the entry's hash, masked by the secret.
    pub masked_signature: MaskedSignature,
}

/// The client's opening of its decoy commitment: which indexes were decoys and
/// the salts that let the server recompute their hashes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRevelation {
    /// Decoy positions, in ascending index order.
    pub fake_indexes: Vec<usize>,
    /// Opens the [`SignaturesRequest::fake_index_commitment`].
    pub index_salt: IndexSalt,
    /// Per-decoy salts, in the same order as `fake_indexes`.
    pub fake_salts: Vec<Salt>,
}

/// The server's audit answer: every decoy's plaintext solution, plus the
/// quotient linking each adjacent pair of real puzzles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCommitmentsProof {
    /// One solution per decoy, in revelation order.
    pub fake_solutions: Vec<PuzzleSolution>,
    /// `real_count - 1` quotients over the real entries in ascending index order.
    pub quotients: Vec<Quotient>,
}

/// The promise client's forward-only state sequence.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum PromiseClientState {
    /// No escrow configured yet.
    WaitingEscrow,
    /// Ready to build a signature request.
    WaitingSignatureRequest,
    /// Request sent; expecting one commitment per entry.
    WaitingCommitments,
    /// Decoys revealed; expecting the commitment proof.
    WaitingCommitmentsProof,
    /// Proof verified; the session answers only result queries.
    Completed,
}

impl PromiseClientState {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            PromiseClientState::WaitingEscrow => "WaitingEscrow",
            PromiseClientState::WaitingSignatureRequest => "WaitingSignatureRequest",
            PromiseClientState::WaitingCommitments => "WaitingCommitments",
            PromiseClientState::WaitingCommitmentsProof => "WaitingCommitmentsProof",
            PromiseClientState::Completed => "Completed",
        }
    }
}

/// The promise server's forward-only state sequence.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum PromiseServerState {
    /// No escrow signing key configured yet.
    WaitingEscrow,
    /// Expecting the client's signature request.
    WaitingHashes,
    /// Commitments sent; expecting the decoy revelation.
    WaitingRevelation,
    /// Proof emitted; nothing further to do.
    Completed,
}

impl PromiseServerState {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            PromiseServerState::WaitingEscrow => "WaitingEscrow",
            PromiseServerState::WaitingHashes => "WaitingHashes",
            PromiseServerState::WaitingRevelation => "WaitingRevelation",
            PromiseServerState::Completed => "Completed",
        }
    }
}
