//! The client role of the promise protocol: requests signatures on hidden
//! candidates, audits the server's commitments, and turns a solved puzzle into
//! a spendable [`SignedRedeem`].

use crate::entries::{EntryKind, EntrySet};
use crate::promise::{
    ClientRevelation, PromiseClientState, ServerCommitment, ServerCommitmentsProof,
    SignaturesRequest,
};
use crate::transaction::{CashoutTemplate, Escrow, LockTime, SigHash, SignedRedeem};
use crate::{Error, Parameters, Rng};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use serde::*;
use tumbler_crypto::commitment::commit_indexes;
use tumbler_crypto::{BlindFactor, IndexSalt, PuzzleSolution, PuzzleValue, Quotient, XorKey};

/// The client's session state for one promise exchange.
///
/// Drive it forward with [`configure_escrow`](PromiseClientSession::configure_escrow),
/// [`create_signature_request`](PromiseClientSession::create_signature_request),
/// [`reveal`](PromiseClientSession::reveal), and
/// [`check_commitment_proof`](PromiseClientSession::check_commitment_proof);
/// the completed session then answers
/// [`signed_redeem`](PromiseClientSession::signed_redeem) queries. Any error is
/// terminal for the session.
#[derive(Debug, Serialize, Deserialize)]
pub struct PromiseClientSession {
    parameters: Parameters,
    state: PromiseClientState,
    escrow: Option<Escrow>,
    template: Option<CashoutTemplate>,
    entries: EntrySet<LockTime, ServerCommitment>,
    index_salt: Option<IndexSalt>,
    quotients: Vec<Quotient>,
    blind_factor: Option<BlindFactor>,
}

impl PromiseClientSession {
    /// Start a session over the agreed parameters.
    pub fn new(parameters: Parameters) -> Self {
        Self {
            parameters,
            state: PromiseClientState::WaitingEscrow,
            escrow: None,
            template: None,
            entries: EntrySet::empty(),
            index_salt: None,
            quotients: Vec::new(),
            blind_factor: None,
        }
    }

    /// The session's current position in the exchange.
    pub fn state(&self) -> PromiseClientState {
        self.state
    }

    /// Bind the session to the escrow it will redeem from.
    pub fn configure_escrow(&mut self, escrow: Escrow) -> Result<(), Error> {
        self.assert_state(PromiseClientState::WaitingEscrow)?;
        self.escrow = Some(escrow);
        self.state = PromiseClientState::WaitingSignatureRequest;
        Ok(())
    }

    /// Build the opening message: the real candidates (one per lock-time,
    /// counting up from zero) shuffled among fresh decoys, plus a commitment
    /// to the decoy positions.
    pub fn create_signature_request(
        &mut self,
        rng: &mut impl Rng,
        template: CashoutTemplate,
    ) -> Result<SignaturesRequest, Error> {
        self.assert_state(PromiseClientState::WaitingSignatureRequest)?;

        let lock_times = (0..self.parameters.real_count())
            .map(|i| LockTime::new(i as u32))
            .collect();
        self.entries = EntrySet::generate(rng, lock_times, self.parameters.fake_count());

        let hashes = self
            .entries
            .iter()
            .map(|entry| match entry.kind() {
                EntryKind::Real(lock_time) => template.signature_hash(*lock_time),
                EntryKind::Fake { salt } => self.parameters.fake_hash(salt),
            })
            .collect();

        let (fake_index_commitment, index_salt) = commit_indexes(rng, &self.entries.fake_indexes());
        self.index_salt = Some(index_salt);
        self.template = Some(template);
        self.state = PromiseClientState::WaitingCommitments;
        Ok(SignaturesRequest {
            hashes,
            fake_index_commitment,
        })
    }

    /// Accept the server's commitments and open the decoy positions.
    pub fn reveal(&mut self, commitments: &[ServerCommitment]) -> Result<ClientRevelation, Error> {
        self.assert_state(PromiseClientState::WaitingCommitments)?;
        self.entries.attach_commitments(commitments)?;
        let index_salt = *self.index_salt()?;
        self.state = PromiseClientState::WaitingCommitmentsProof;
        Ok(ClientRevelation {
            fake_indexes: self.entries.fake_indexes(),
            index_salt,
            fake_salts: self.entries.fake_salts(),
        })
    }

    /// Audit the server's proof. Every decoy solution must open its puzzle and
    /// unmask a valid signature over the decoy's hash, and the quotient chain
    /// must link each adjacent pair of real puzzles.
    ///
    /// On success the decoys are discarded and the first real puzzle is
    /// returned freshly blinded, ready to feed into a solver session.
    pub fn check_commitment_proof(
        &mut self,
        rng: &mut impl Rng,
        proof: &ServerCommitmentsProof,
    ) -> Result<PuzzleValue, Error> {
        self.assert_state(PromiseClientState::WaitingCommitmentsProof)?;

        if proof.fake_solutions.len() != self.parameters.fake_count() {
            return Err(Error::LengthMismatch {
                expected: self.parameters.fake_count(),
                got: proof.fake_solutions.len(),
            });
        }
        if proof.quotients.len() != self.parameters.real_count() - 1 {
            return Err(Error::LengthMismatch {
                expected: self.parameters.real_count() - 1,
                got: proof.quotients.len(),
            });
        }

        let pk = self.parameters.server_key();
        let escrow = self.escrow()?;

        for ((entry, salt), solution) in self.entries.fakes().zip(&proof.fake_solutions) {
            pk.check_range(solution)?;
            let commitment = entry.commitment()?;
            if !pk.verify_solution(&commitment.puzzle, solution) {
                return Err(Error::InvalidProof("decoy solution does not open its puzzle"));
            }
            let hash = self.parameters.fake_hash(salt);
            let _ = recover_signature(&self.parameters, escrow, commitment, solution, &hash)?;
        }

        let mut reals = self.entries.reals();
        let first = match reals.next() {
            Some((entry, _)) => entry.commitment()?.puzzle.clone(),
            None => return Err(Error::MalformedInput("entry set has no real entries")),
        };
        let mut previous = first.clone();
        for ((entry, _), quotient) in reals.zip(&proof.quotients) {
            let expected = pk.next_puzzle(&previous, quotient)?;
            let actual = entry.commitment()?.puzzle.clone();
            if actual != expected {
                return Err(Error::InvalidQuotient);
            }
            previous = actual;
        }

        self.quotients = proof.quotients.clone();
        self.entries.retain_reals();

        let (blinded, blind_factor) = self.parameters.server_key().blind(rng, &first);
        self.blind_factor = Some(blind_factor);
        self.state = PromiseClientState::Completed;
        Ok(blinded)
    }

    /// Turn a solution of the blinded puzzle into a signed redeem transaction.
    ///
    /// Unblinds the solution, walks the quotient chain to derive each
    /// candidate's secret, and returns the first candidate whose signature
    /// unmasks and verifies under an escrow signer. A solution that opens no
    /// candidate means the server was paid for nothing; the caller falls back
    /// to the refund path.
    ///
    /// Read-only, so it may be retried with another solution.
    pub fn signed_redeem(&self, solution: &PuzzleSolution) -> Result<SignedRedeem, Error> {
        self.assert_state(PromiseClientState::Completed)?;

        let pk = self.parameters.server_key();
        let escrow = self.escrow()?;
        let template = self.template()?;
        let blind_factor = self.blind_factor()?;

        let mut current = pk.unblind_solution(solution, blind_factor)?;
        for (step, (entry, lock_time)) in self.entries.reals().enumerate() {
            if step > 0 {
                match self.quotients.get(step - 1) {
                    Some(quotient) => current = quotient.apply(pk, &current),
                    None => break,
                }
            }
            let commitment = entry.commitment()?;
            if !pk.verify_solution(&commitment.puzzle, &current) {
                continue;
            }
            let hash = template.signature_hash(*lock_time);
            if let Ok((signer, signature)) =
                recover_signature(&self.parameters, escrow, commitment, &current, &hash)
            {
                return Ok(SignedRedeem::new(
                    template.clone(),
                    *lock_time,
                    signer,
                    signature,
                ));
            }
        }
        Err(Error::WrongSolution)
    }

    fn assert_state(&self, expected: PromiseClientState) -> Result<(), Error> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                expected: expected.name(),
                actual: self.state.name(),
            })
        }
    }

    fn escrow(&self) -> Result<&Escrow, Error> {
        self.escrow.as_ref().ok_or(Error::InvalidState {
            expected: PromiseClientState::WaitingSignatureRequest.name(),
            actual: self.state.name(),
        })
    }

    fn template(&self) -> Result<&CashoutTemplate, Error> {
        self.template.as_ref().ok_or(Error::InvalidState {
            expected: PromiseClientState::WaitingCommitments.name(),
            actual: self.state.name(),
        })
    }

    fn index_salt(&self) -> Result<&IndexSalt, Error> {
        self.index_salt.as_ref().ok_or(Error::InvalidState {
            expected: PromiseClientState::WaitingCommitments.name(),
            actual: self.state.name(),
        })
    }

    fn blind_factor(&self) -> Result<&BlindFactor, Error> {
        self.blind_factor.as_ref().ok_or(Error::InvalidState {
            expected: PromiseClientState::Completed.name(),
            actual: self.state.name(),
        })
    }
}

/// Unmask a committed signature with the given solution and check it verifies
/// over `hash` under one of the escrow's signers.
fn recover_signature(
    parameters: &Parameters,
    escrow: &Escrow,
    commitment: &ServerCommitment,
    solution: &PuzzleSolution,
    hash: &SigHash,
) -> Result<(VerifyingKey, Signature), Error> {
    let key = XorKey::from_solution(solution, parameters.server_key());
    let bytes = key.unmask_signature(&commitment.masked_signature);
    let signature = Signature::from_slice(&bytes).map_err(|_| Error::InvalidSignature)?;
    for signer in escrow.signers() {
        if signer.verify_prehash(hash.as_bytes(), &signature).is_ok() {
            return Ok((*signer, signature));
        }
    }
    Err(Error::InvalidSignature)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{escrow, parameters, rng};

    #[test]
    fn operations_enforce_the_state_order() {
        let mut rng = rng();
        let mut client = PromiseClientSession::new(parameters(2, 2));
        let template = CashoutTemplate::new(b"shape".to_vec());

        assert!(matches!(
            client.create_signature_request(&mut rng, template.clone()),
            Err(Error::InvalidState {
                expected: "WaitingSignatureRequest",
                actual: "WaitingEscrow",
            })
        ));

        client.configure_escrow(escrow()).unwrap();
        assert!(matches!(
            client.configure_escrow(escrow()),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(
            client.reveal(&[]),
            Err(Error::InvalidState { .. })
        ));

        let _ = client
            .create_signature_request(&mut rng, template)
            .unwrap();
        assert_eq!(client.state(), PromiseClientState::WaitingCommitments);
        assert!(matches!(
            client.check_commitment_proof(
                &mut rng,
                &ServerCommitmentsProof {
                    fake_solutions: Vec::new(),
                    quotients: Vec::new(),
                }
            ),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn request_carries_one_hash_per_entry() {
        let mut rng = rng();
        let mut client = PromiseClientSession::new(parameters(3, 2));
        client.configure_escrow(escrow()).unwrap();

        let request = client
            .create_signature_request(&mut rng, CashoutTemplate::new(b"shape".to_vec()))
            .unwrap();
        assert_eq!(request.hashes.len(), 5);

        // All five digests must be pairwise distinct or the server could link
        // decoys to candidates.
        for (i, a) in request.hashes.iter().enumerate() {
            for b in &request.hashes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn reveal_demands_a_full_commitment_batch() {
        let mut rng = rng();
        let mut client = PromiseClientSession::new(parameters(2, 1));
        client.configure_escrow(escrow()).unwrap();
        let _ = client
            .create_signature_request(&mut rng, CashoutTemplate::new(b"shape".to_vec()))
            .unwrap();

        assert!(matches!(
            client.reveal(&[]),
            Err(Error::LengthMismatch {
                expected: 3,
                got: 0
            })
        ));
    }
}
