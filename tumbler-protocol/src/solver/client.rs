//! The client role of the solver protocol: hides one puzzle among decoys,
//! audits the server's decoy keys, and recovers the unblinded solution.

use crate::entries::{EntryKind, EntrySet};
use crate::solver::{ClientRevelation, EncryptedSolution, SolutionCommitment, SolverClientState};
use crate::{Error, Parameters, Rng};
use serde::*;
use tumbler_crypto::{BlindFactor, PuzzleSolution, PuzzleValue, XorKey};

/// A real entry: one fresh blinding of the client's puzzle, and the factor
/// that undoes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RealPuzzle {
    blinded: PuzzleValue,
    blind_factor: BlindFactor,
}

/// The client's session state for one solver exchange.
///
/// Drive it forward with [`accept_puzzle`](SolverClientSession::accept_puzzle),
/// [`generate_puzzles`](SolverClientSession::generate_puzzles),
/// [`reveal`](SolverClientSession::reveal),
/// [`check_fake_solutions`](SolverClientSession::check_fake_solutions), and
/// [`check_solutions`](SolverClientSession::check_solutions). Any error is
/// terminal for the session.
#[derive(Debug, Serialize, Deserialize)]
pub struct SolverClientSession {
    parameters: Parameters,
    state: SolverClientState,
    puzzle: Option<PuzzleValue>,
    entries: EntrySet<RealPuzzle, SolutionCommitment>,
    solution: Option<PuzzleSolution>,
}

impl SolverClientSession {
    /// Start a session over the agreed parameters.
    pub fn new(parameters: Parameters) -> Self {
        Self {
            parameters,
            state: SolverClientState::WaitingPuzzle,
            puzzle: None,
            entries: EntrySet::empty(),
            solution: None,
        }
    }

    /// The session's current position in the exchange.
    pub fn state(&self) -> SolverClientState {
        self.state
    }

    /// Accept the puzzle to be solved, typically the blinded output of a
    /// promise exchange.
    pub fn accept_puzzle(&mut self, puzzle: PuzzleValue) -> Result<(), Error> {
        self.assert_state(SolverClientState::WaitingPuzzle)?;
        self.puzzle = Some(puzzle);
        self.state = SolverClientState::WaitingGeneration;
        Ok(())
    }

    /// Build the shuffled batch: N fresh blindings of the accepted puzzle
    /// hidden among M decoys whose solutions are derived from fresh salts.
    pub fn generate_puzzles(&mut self, rng: &mut impl Rng) -> Result<Vec<PuzzleValue>, Error> {
        self.assert_state(SolverClientState::WaitingGeneration)?;

        let pk = self.parameters.server_key();
        let puzzle = self.puzzle.as_ref().ok_or(Error::InvalidState {
            expected: SolverClientState::WaitingGeneration.name(),
            actual: self.state.name(),
        })?;

        let reals = (0..self.parameters.real_count())
            .map(|_| {
                let (blinded, blind_factor) = pk.blind(rng, puzzle);
                RealPuzzle {
                    blinded,
                    blind_factor,
                }
            })
            .collect();
        self.entries = EntrySet::generate(rng, reals, self.parameters.fake_count());

        let mut batch = Vec::with_capacity(self.entries.len());
        for entry in self.entries.iter() {
            batch.push(match entry.kind() {
                EntryKind::Real(real) => real.blinded.clone(),
                EntryKind::Fake { salt } => pk.encrypt(&self.parameters.fake_solution(salt))?,
            });
        }

        self.state = SolverClientState::WaitingCommitments;
        Ok(batch)
    }

    /// Accept the server's solution commitments and disclose the decoys.
    pub fn reveal(
        &mut self,
        commitments: &[SolutionCommitment],
    ) -> Result<ClientRevelation, Error> {
        self.assert_state(SolverClientState::WaitingCommitments)?;
        self.entries.attach_commitments(commitments)?;
        self.state = SolverClientState::WaitingFakeCommitmentsProof;
        Ok(ClientRevelation {
            fake_indexes: self.entries.fake_indexes(),
            fake_salts: self.entries.fake_salts(),
        })
    }

    /// Audit the decoy keys: each must match its committed hash and open the
    /// exact salt-derived solution. On success the decoys are discarded and
    /// the real blind factors are returned for disclosure to the server.
    pub fn check_fake_solutions(&mut self, keys: &[XorKey]) -> Result<Vec<BlindFactor>, Error> {
        self.assert_state(SolverClientState::WaitingFakeCommitmentsProof)?;
        if keys.len() != self.parameters.fake_count() {
            return Err(Error::LengthMismatch {
                expected: self.parameters.fake_count(),
                got: keys.len(),
            });
        }

        for ((entry, salt), key) in self.entries.fakes().zip(keys) {
            let commitment = entry.commitment()?;
            if key.hash() != commitment.key_hash {
                return Err(Error::InvalidProof("key does not match its committed hash"));
            }
            let solution = open_solution(key, &commitment.encrypted_solution);
            if solution != self.parameters.fake_solution(salt) {
                return Err(Error::InvalidProof("decoy entry was solved incorrectly"));
            }
        }

        self.entries.retain_reals();
        let blind_factors = self
            .entries
            .reals()
            .map(|(_, real)| real.blind_factor.clone())
            .collect();
        self.state = SolverClientState::WaitingPuzzleSolutions;
        Ok(blind_factors)
    }

    /// Open the real keys and recover the solution of the accepted puzzle.
    ///
    /// Each key must match its committed hash; the first entry whose opened
    /// solution solves its blinded puzzle is unblinded and checked against the
    /// original. A batch that opens no entry means the audited decoys were the
    /// only honest ones, which the cut-and-choose made a losing bet.
    pub fn check_solutions(&mut self, keys: &[XorKey]) -> Result<PuzzleSolution, Error> {
        self.assert_state(SolverClientState::WaitingPuzzleSolutions)?;
        if keys.len() != self.parameters.real_count() {
            return Err(Error::LengthMismatch {
                expected: self.parameters.real_count(),
                got: keys.len(),
            });
        }

        let pk = self.parameters.server_key();
        let puzzle = self.puzzle.as_ref().ok_or(Error::InvalidState {
            expected: SolverClientState::WaitingGeneration.name(),
            actual: self.state.name(),
        })?;

        for ((entry, real), key) in self.entries.reals().zip(keys) {
            let commitment = entry.commitment()?;
            if key.hash() != commitment.key_hash {
                return Err(Error::InvalidProof("key does not match its committed hash"));
            }
            let solution = open_solution(key, &commitment.encrypted_solution);
            if !pk.verify_solution(&real.blinded, &solution) {
                continue;
            }
            let unblinded = pk.unblind_solution(&solution, &real.blind_factor)?;
            if pk.verify_solution(puzzle, &unblinded) {
                self.solution = Some(unblinded.clone());
                self.state = SolverClientState::Completed;
                return Ok(unblinded);
            }
        }
        Err(Error::WrongSolution)
    }

    /// The recovered solution, once the session has completed.
    pub fn solution(&self) -> Result<&PuzzleSolution, Error> {
        self.assert_state(SolverClientState::Completed)?;
        self.solution.as_ref().ok_or(Error::InvalidState {
            expected: SolverClientState::Completed.name(),
            actual: self.state.name(),
        })
    }

    fn assert_state(&self, expected: SolverClientState) -> Result<(), Error> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                expected: expected.name(),
                actual: self.state.name(),
            })
        }
    }
}

fn open_solution(key: &XorKey, encrypted: &EncryptedSolution) -> PuzzleSolution {
    PuzzleSolution::from_bytes_be(&key.apply(&encrypted.0))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{parameters, rng, server_keypair};

    #[test]
    fn operations_enforce_the_state_order() {
        let mut rng = rng();
        let mut client = SolverClientSession::new(parameters(2, 2));

        assert!(matches!(
            client.generate_puzzles(&mut rng),
            Err(Error::InvalidState {
                expected: "WaitingGeneration",
                actual: "WaitingPuzzle",
            })
        ));
        assert!(matches!(client.solution(), Err(Error::InvalidState { .. })));

        let pk = server_keypair().public_key().clone();
        let puzzle = pk.encrypt(&pk.random_solution(&mut rng)).unwrap();
        client.accept_puzzle(puzzle.clone()).unwrap();
        assert!(matches!(
            client.accept_puzzle(puzzle),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn batch_hides_the_puzzle_among_decoys() {
        let mut rng = rng();
        let mut client = SolverClientSession::new(parameters(3, 2));

        let pk = server_keypair().public_key().clone();
        let puzzle = pk.encrypt(&pk.random_solution(&mut rng)).unwrap();
        client.accept_puzzle(puzzle.clone()).unwrap();

        let batch = client.generate_puzzles(&mut rng).unwrap();
        assert_eq!(batch.len(), 5);

        // No batch entry may equal the original puzzle or any other entry;
        // repeats would link the batch back to the promise exchange.
        for (i, a) in batch.iter().enumerate() {
            assert_ne!(*a, puzzle);
            for b in &batch[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn reveal_demands_a_full_commitment_batch() {
        let mut rng = rng();
        let mut client = SolverClientSession::new(parameters(1, 1));

        let pk = server_keypair().public_key().clone();
        let puzzle = pk.encrypt(&pk.random_solution(&mut rng)).unwrap();
        client.accept_puzzle(puzzle).unwrap();
        let _ = client.generate_puzzles(&mut rng).unwrap();

        assert!(matches!(
            client.reveal(&[]),
            Err(Error::LengthMismatch {
                expected: 2,
                got: 0
            })
        ));
    }
}
