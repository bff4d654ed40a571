/*!
The solver protocol: a fair exchange of an RSA puzzle solution, audited by
cut-and-choose.

## Flow

The client holds one puzzle (typically the blinded output of a promise
exchange) and hides N fresh blindings of it among M decoy puzzles whose
solutions it already knows, since each decoy is the encryption of a
salt-derived value. The server solves the whole batch but releases nothing in
the clear: each entry gets a [`SolutionCommitment`], the solution encrypted
under a fresh XOR key together with that key's binding hash.

The client then reveals which entries were decoys ([`ClientRevelation`]). The
server checks that every claimed decoy really encrypts its salt-derived value
and releases the decoy keys; the client verifies each one opens the expected
solution. Only then does the client disclose its real blind factors, proving
all real entries hide the same single puzzle; the server checks they collapse
to one value and releases the real keys, one of which opens a solution the
client can unblind.

A server that mis-solves any entry is caught at the decoy-key step with
probability M/(N+M) per cheated entry, before it has learned anything that
would let it link the real puzzle to a promise exchange.
*/

use crate::Salt;
use serde::*;
use tumbler_crypto::KeyHash;

pub mod client;
pub mod server;

pub use client::SolverClientSession;
pub use server::SolverServerSession;

/// A puzzle solution encrypted under a server-held XOR key. Opens only once
/// the server releases the key.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct EncryptedSolution(pub(crate) Vec<u8>);

/// The server's commitment to one solved entry: the encrypted solution and a
/// binding hash of the key that opens it. Publishing the hash first prevents
/// the server from choosing keys after seeing the revelation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionCommitment {
    /// Binding hash of the entry's XOR key.
    pub key_hash: KeyHash,
    /// The entry's solution, encrypted under that key.
    pub encrypted_solution: EncryptedSolution,
}

/// The client's disclosure of which entries were decoys, with the salts that
/// let the server rederive their solutions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRevelation {
    /// Decoy positions, in ascending index order.
    pub fake_indexes: Vec<usize>,
    /// Per-decoy salts, in the same order as `fake_indexes`.
    pub fake_salts: Vec<Salt>,
}

/// The solver client's forward-only state sequence.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum SolverClientState {
    /// No puzzle accepted yet.
    WaitingPuzzle,
    /// Puzzle accepted; ready to generate the shuffled batch.
    WaitingGeneration,
    /// Batch sent; expecting one commitment per entry.
    WaitingCommitments,
    /// Decoys revealed; expecting the decoy keys.
    WaitingFakeCommitmentsProof,
    /// Blind factors disclosed; expecting the real keys.
    WaitingPuzzleSolutions,
    /// Solution recovered; the session answers only result queries.
    Completed,
}

impl SolverClientState {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            SolverClientState::WaitingPuzzle => "WaitingPuzzle",
            SolverClientState::WaitingGeneration => "WaitingGeneration",
            SolverClientState::WaitingCommitments => "WaitingCommitments",
            SolverClientState::WaitingFakeCommitmentsProof => "WaitingFakeCommitmentsProof",
            SolverClientState::WaitingPuzzleSolutions => "WaitingPuzzleSolutions",
            SolverClientState::Completed => "Completed",
        }
    }
}

/// The solver server's forward-only state sequence.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum SolverServerState {
    /// Expecting the client's puzzle batch.
    WaitingPuzzles,
    /// Commitments sent; expecting the decoy revelation.
    WaitingRevelation,
    /// Decoy keys released; expecting the real blind factors.
    WaitingBlindFactors,
    /// Real keys released; nothing further to do.
    Completed,
}

impl SolverServerState {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            SolverServerState::WaitingPuzzles => "WaitingPuzzles",
            SolverServerState::WaitingRevelation => "WaitingRevelation",
            SolverServerState::WaitingBlindFactors => "WaitingBlindFactors",
            SolverServerState::Completed => "Completed",
        }
    }
}
