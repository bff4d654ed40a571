//! The cut-and-choose entry set shared by both protocols: N real entries hidden
//! among M decoys by a uniformly random permutation.
//!
//! The shuffle draws from the caller's [`Rng`], whose `CryptoRng` bound makes a
//! non-secure permutation unrepresentable; a biased shuffle would leak which
//! positions hold real entries.

use crate::parameters::Salt;
use crate::{Error, Rng};
use rand::seq::SliceRandom;
use serde::*;

/// One position in a shuffled entry set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Entry<R, C> {
    index: usize,
    kind: EntryKind<R>,
    commitment: Option<C>,
}

/// What an entry actually is. Only the generating client knows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum EntryKind<R> {
    /// A genuine entry carrying protocol-specific payload.
    Real(R),
    /// A decoy, fully determined by its salt.
    Fake { salt: Salt },
}

/// A client's shuffled view of one cut-and-choose exchange, generic over the
/// real-entry payload `R` and the server commitment type `C`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EntrySet<R, C> {
    entries: Vec<Entry<R, C>>,
}

impl<R, C> Entry<R, C> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> &EntryKind<R> {
        &self.kind
    }

    /// The server commitment attached to this entry, once received.
    pub fn commitment(&self) -> Result<&C, Error> {
        self.commitment
            .as_ref()
            .ok_or(Error::MalformedInput("no commitment attached to entry"))
    }
}

impl<R, C> EntrySet<R, C> {
    /// A set with no entries, the state of a session before generation.
    pub fn empty() -> Self {
        EntrySet {
            entries: Vec::new(),
        }
    }

    /// Interleave the given real payloads with `fake_count` fresh-salt decoys
    /// under a uniformly random permutation, then index the result `0..N+M`.
    pub fn generate(rng: &mut impl Rng, reals: Vec<R>, fake_count: usize) -> Self {
        let mut kinds: Vec<EntryKind<R>> = reals.into_iter().map(EntryKind::Real).collect();
        kinds.extend((0..fake_count).map(|_| EntryKind::Fake {
            salt: Salt::random(rng),
        }));
        kinds.shuffle(rng);
        EntrySet {
            entries: kinds
                .into_iter()
                .enumerate()
                .map(|(index, kind)| Entry {
                    index,
                    kind,
                    commitment: None,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry<R, C>> {
        self.entries.iter()
    }

    /// Decoy entries in ascending shuffled-index order.
    pub fn fakes(&self) -> impl Iterator<Item = (&Entry<R, C>, &Salt)> {
        self.entries.iter().filter_map(|entry| match &entry.kind {
            EntryKind::Fake { salt } => Some((entry, salt)),
            EntryKind::Real(_) => None,
        })
    }

    /// Real entries in ascending shuffled-index order.
    pub fn reals(&self) -> impl Iterator<Item = (&Entry<R, C>, &R)> {
        self.entries.iter().filter_map(|entry| match &entry.kind {
            EntryKind::Real(real) => Some((entry, real)),
            EntryKind::Fake { .. } => None,
        })
    }

    pub fn fake_indexes(&self) -> Vec<usize> {
        self.fakes().map(|(entry, _)| entry.index).collect()
    }

    pub fn fake_salts(&self) -> Vec<Salt> {
        self.fakes().map(|(_, salt)| *salt).collect()
    }

    /// Attach the server's per-index commitments. The caller has already
    /// checked the overall message length; this only demands exact agreement.
    pub fn attach_commitments(&mut self, commitments: &[C]) -> Result<(), Error>
    where
        C: Clone,
    {
        if commitments.len() != self.entries.len() {
            return Err(Error::LengthMismatch {
                expected: self.entries.len(),
                got: commitments.len(),
            });
        }
        for (entry, commitment) in self.entries.iter_mut().zip(commitments) {
            entry.commitment = Some(commitment.clone());
        }
        Ok(())
    }

    /// Drop the decoys once they have served their audit purpose.
    pub fn retain_reals(&mut self) {
        self.entries
            .retain(|entry| matches!(entry.kind, EntryKind::Real(_)));
    }
}
