//! The server role of the solver protocol: solves the whole batch up front,
//! releases decoy keys against a verified revelation, and real keys only once
//! the blind factors prove all real entries hide a single puzzle.

use crate::solver::{ClientRevelation, EncryptedSolution, SolutionCommitment, SolverServerState};
use crate::{Error, Parameters, Rng};
use serde::*;
use tumbler_crypto::{BlindFactor, PuzzleSolution, PuzzleValue, RsaKeyPair, XorKey};

/// The server's session state for one solver exchange.
///
/// Solving is the priced capability; the session's whole job is to withhold
/// the solutions until the client has proven its batch honest.
#[derive(Debug, Serialize, Deserialize)]
pub struct SolverServerSession {
    parameters: Parameters,
    state: SolverServerState,
    keypair: RsaKeyPair,
    puzzles: Vec<PuzzleValue>,
    solutions: Vec<PuzzleSolution>,
    keys: Vec<XorKey>,
    is_fake: Vec<bool>,
}

impl SolverServerSession {
    /// Start a session over the agreed parameters, holding the private key
    /// behind the parameters' public key.
    pub fn new(parameters: Parameters, keypair: RsaKeyPair) -> Result<Self, Error> {
        if keypair.public_key() != parameters.server_key() {
            return Err(Error::MalformedInput(
                "RSA keypair does not match the agreed parameters",
            ));
        }
        Ok(Self {
            parameters,
            state: SolverServerState::WaitingPuzzles,
            keypair,
            puzzles: Vec::new(),
            solutions: Vec::new(),
            keys: Vec::new(),
            is_fake: Vec::new(),
        })
    }

    /// The session's current position in the exchange.
    pub fn state(&self) -> SolverServerState {
        self.state
    }

    /// Solve every submitted puzzle and commit to each solution under a fresh
    /// key. The response order matches the request order.
    pub fn solve_puzzles(
        &mut self,
        rng: &mut impl Rng,
        puzzles: &[PuzzleValue],
    ) -> Result<Vec<SolutionCommitment>, Error> {
        self.assert_state(SolverServerState::WaitingPuzzles)?;
        if puzzles.len() != self.parameters.total_count() {
            return Err(Error::LengthMismatch {
                expected: self.parameters.total_count(),
                got: puzzles.len(),
            });
        }

        let modulus_len = self.parameters.server_key().modulus_len();
        let mut solutions = Vec::with_capacity(puzzles.len());
        let mut keys = Vec::with_capacity(puzzles.len());
        let mut commitments = Vec::with_capacity(puzzles.len());
        for puzzle in puzzles {
            let solution = self.keypair.solve(puzzle)?;
            let key = XorKey::random(rng);
            let encrypted_solution =
                EncryptedSolution(key.apply(&solution.to_bytes_padded(modulus_len)));
            commitments.push(SolutionCommitment {
                key_hash: key.hash(),
                encrypted_solution,
            });
            solutions.push(solution);
            keys.push(key);
        }

        self.puzzles = puzzles.to_vec();
        self.solutions = solutions;
        self.keys = keys;
        self.state = SolverServerState::WaitingRevelation;
        Ok(commitments)
    }

    /// Check the client's decoy revelation and release the decoy keys.
    ///
    /// Each claimed decoy must be exactly the encryption of its salt-derived
    /// solution; anything else would let the client smuggle a real puzzle into
    /// the audited set and get it solved for free.
    pub fn check_revelation(&mut self, revelation: &ClientRevelation) -> Result<Vec<XorKey>, Error> {
        self.assert_state(SolverServerState::WaitingRevelation)?;
        if revelation.fake_indexes.len() != self.parameters.fake_count() {
            return Err(Error::LengthMismatch {
                expected: self.parameters.fake_count(),
                got: revelation.fake_indexes.len(),
            });
        }
        if revelation.fake_salts.len() != revelation.fake_indexes.len() {
            return Err(Error::LengthMismatch {
                expected: revelation.fake_indexes.len(),
                got: revelation.fake_salts.len(),
            });
        }

        let mut is_fake = vec![false; self.puzzles.len()];
        for &index in &revelation.fake_indexes {
            if index >= self.puzzles.len() {
                return Err(Error::MalformedInput("decoy index out of range"));
            }
            if is_fake[index] {
                return Err(Error::MalformedInput("repeated decoy index"));
            }
            is_fake[index] = true;
        }

        let pk = self.parameters.server_key();
        for (&index, salt) in revelation.fake_indexes.iter().zip(&revelation.fake_salts) {
            let expected = pk.encrypt(&self.parameters.fake_solution(salt))?;
            if expected != self.puzzles[index] {
                return Err(Error::InvalidProof(
                    "revealed decoy does not match its puzzle",
                ));
            }
        }

        let fake_keys = revelation
            .fake_indexes
            .iter()
            .map(|&index| self.keys[index].clone())
            .collect();
        self.is_fake = is_fake;
        self.state = SolverServerState::WaitingBlindFactors;
        Ok(fake_keys)
    }

    /// Check the disclosed blind factors and release the real keys.
    ///
    /// Every real entry, unblinded with its factor, must collapse to one and
    /// the same puzzle; distinct underlying puzzles would mean the client paid
    /// once for several solutions.
    pub fn check_blind_factors(
        &mut self,
        blind_factors: &[BlindFactor],
    ) -> Result<Vec<XorKey>, Error> {
        self.assert_state(SolverServerState::WaitingBlindFactors)?;
        if blind_factors.len() != self.parameters.real_count() {
            return Err(Error::LengthMismatch {
                expected: self.parameters.real_count(),
                got: blind_factors.len(),
            });
        }

        let pk = self.parameters.server_key();
        let real_indexes: Vec<usize> = self
            .is_fake
            .iter()
            .enumerate()
            .filter(|(_, fake)| !**fake)
            .map(|(index, _)| index)
            .collect();
        if real_indexes.len() != blind_factors.len() {
            return Err(Error::LengthMismatch {
                expected: real_indexes.len(),
                got: blind_factors.len(),
            });
        }

        let mut underlying: Option<PuzzleValue> = None;
        for (&index, blind_factor) in real_indexes.iter().zip(blind_factors) {
            let unblinded = pk.unblind_puzzle(&self.puzzles[index], blind_factor)?;
            match &underlying {
                None => underlying = Some(unblinded),
                Some(first) => {
                    if unblinded != *first {
                        return Err(Error::InvalidProof(
                            "blind factors do not collapse to a single puzzle",
                        ));
                    }
                }
            }
        }

        let real_keys = real_indexes
            .iter()
            .map(|&index| self.keys[index].clone())
            .collect();
        self.state = SolverServerState::Completed;
        Ok(real_keys)
    }

    fn assert_state(&self, expected: SolverServerState) -> Result<(), Error> {
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
