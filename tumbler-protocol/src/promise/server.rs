//! The server role of the promise protocol: signs every submitted hash sight
//! unseen, hides each signature behind a fresh puzzle, and proves honesty over
//! the revealed decoys.

use crate::promise::{
    ClientRevelation, PromiseServerState, ServerCommitment, ServerCommitmentsProof,
    SignaturesRequest,
};
use crate::serde::SerializeKey;
use crate::transaction::SigHash;
use crate::{Error, Parameters, Rng};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use serde::*;
use tumbler_crypto::{IndexCommitment, PuzzleSolution, Quotient, XorKey};

/// The server's session state for one promise exchange.
///
/// The server never learns which entries are real; it signs all of them and
/// relies on the cut-and-choose reveal to prove it did so honestly.
#[derive(Debug, Serialize, Deserialize)]
pub struct PromiseServerSession {
    parameters: Parameters,
    state: PromiseServerState,
    #[serde(with = "SerializeKey")]
    signing_key: Option<SigningKey>,
    hashes: Vec<SigHash>,
    secrets: Vec<PuzzleSolution>,
    fake_index_commitment: Option<IndexCommitment>,
}

impl PromiseServerSession {
    /// Start a session over the agreed parameters.
    pub fn new(parameters: Parameters) -> Self {
        Self {
            parameters,
            state: PromiseServerState::WaitingEscrow,
            signing_key: None,
            hashes: Vec::new(),
            secrets: Vec::new(),
            fake_index_commitment: None,
        }
    }

    /// The session's current position in the exchange.
    pub fn state(&self) -> PromiseServerState {
        self.state
    }

    /// Bind the session to the escrow key this server signs redeems with.
    pub fn configure_escrow(&mut self, signing_key: SigningKey) -> Result<(), Error> {
        self.assert_state(PromiseServerState::WaitingEscrow)?;
        self.signing_key = Some(signing_key);
        self.state = PromiseServerState::WaitingHashes;
        Ok(())
    }

    /// Sign every submitted hash and commit to each signature behind a fresh
    /// puzzle. The response order matches the request order.
    pub fn sign_hashes(
        &mut self,
        rng: &mut impl Rng,
        request: &SignaturesRequest,
    ) -> Result<Vec<ServerCommitment>, Error> {
        self.assert_state(PromiseServerState::WaitingHashes)?;
        if request.hashes.len() != self.parameters.total_count() {
            return Err(Error::LengthMismatch {
                expected: self.parameters.total_count(),
                got: request.hashes.len(),
            });
        }

        let signing_key = self.signing_key()?;
        let pk = self.parameters.server_key();

        let mut secrets = Vec::with_capacity(request.hashes.len());
        let mut commitments = Vec::with_capacity(request.hashes.len());
        for hash in &request.hashes {
            let secret = pk.random_solution(rng);
            let puzzle = pk.encrypt(&secret)?;
            let signature: Signature = signing_key
                .sign_prehash(hash.as_bytes())
                .map_err(|_| Error::MalformedInput("digest is not signable"))?;
            let key = XorKey::from_solution(&secret, pk);
            let masked_signature = key.mask_signature(signature.to_bytes().as_slice());
            secrets.push(secret);
            commitments.push(ServerCommitment {
                puzzle,
                masked_signature,
            });
        }

        self.hashes = request.hashes.clone();
        self.secrets = secrets;
        self.fake_index_commitment = Some(request.fake_index_commitment);
        self.state = PromiseServerState::WaitingRevelation;
        Ok(commitments)
    }

    /// Check the client's decoy revelation against the index commitment and the
    /// originally submitted hashes, then open the decoy secrets and publish the
    /// quotient chain over the remaining real entries.
    ///
    /// The revelation must be checked before anything is opened; an invalid
    /// reveal would otherwise extract real secrets for free.
    pub fn check_revelation(
        &mut self,
        revelation: &ClientRevelation,
    ) -> Result<ServerCommitmentsProof, Error> {
        self.assert_state(PromiseServerState::WaitingRevelation)?;
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

        let mut is_fake = vec![false; self.hashes.len()];
        for &index in &revelation.fake_indexes {
            if index >= self.hashes.len() {
                return Err(Error::MalformedInput("decoy index out of range"));
            }
            if is_fake[index] {
                return Err(Error::MalformedInput("repeated decoy index"));
            }
            is_fake[index] = true;
        }

        if !self
            .fake_index_commitment()?
            .verify(&revelation.index_salt, &revelation.fake_indexes)
        {
            return Err(Error::InvalidProof(
                "revelation does not open the index commitment",
            ));
        }

        for (&index, salt) in revelation.fake_indexes.iter().zip(&revelation.fake_salts) {
            if self.parameters.fake_hash(salt) != self.hashes[index] {
                return Err(Error::InvalidProof(
                    "revealed decoy does not match the committed hash",
                ));
            }
        }

        let fake_solutions = revelation
            .fake_indexes
            .iter()
            .map(|&index| self.secrets[index].clone())
            .collect();

        let pk = self.parameters.server_key();
        let real_secrets: Vec<&PuzzleSolution> = is_fake
            .iter()
            .enumerate()
            .filter(|(_, fake)| !**fake)
            .map(|(index, _)| &self.secrets[index])
            .collect();
        let mut quotients = Vec::with_capacity(real_secrets.len().saturating_sub(1));
        for pair in real_secrets.windows(2) {
            quotients.push(Quotient::between(pk, pair[0], pair[1])?);
        }

        self.state = PromiseServerState::Completed;
        Ok(ServerCommitmentsProof {
            fake_solutions,
            quotients,
        })
    }

    fn assert_state(&self, expected: PromiseServerState) -> Result<(), Error> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                expected: expected.name(),
                actual: self.state.name(),
            })
        }
    }

    fn signing_key(&self) -> Result<&SigningKey, Error> {
        self.signing_key.as_ref().ok_or(Error::InvalidState {
            expected: PromiseServerState::WaitingHashes.name(),
            actual: self.state.name(),
        })
    }

    fn fake_index_commitment(&self) -> Result<&IndexCommitment, Error> {
        self.fake_index_commitment
            .as_ref()
            .ok_or(Error::InvalidState {
                expected: PromiseServerState::WaitingRevelation.name(),
                actual: self.state.name(),
            })
    }
}
