//! Excitation classes and connection records.
//!
//! Two connections land in the same class when their recoupling matrices are
//! identical. For a single generator `E_pq` that is the case whenever the
//! elementary transition on `(p, q)`, the open-shell counts on both sides and the
//! positions of `p` and `q` among the open shells agree; doubly occupied and empty
//! orbitals in between only contribute the fermionic phase.

use std::{
    collections::{btree_map::Entry, BTreeMap},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::{configuration::Configuration, error::GugaError};

/// Elementary transition of `E_pq` (electron moves from `q` to `p`), named after
/// the right-hand occupations of `q` and `p`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum ExcitationType {
    /// `q` doubly occupied, `p` singly occupied
    DS = 0,
    /// `q` doubly occupied, `p` empty
    DV = 1,
    /// `q` and `p` singly occupied
    SS = 2,
    /// `q` singly occupied, `p` empty
    SV = 3,
}

impl ExcitationType {
    /// Picks the transition from the right configuration's occupations of `p` and `q`.
    pub fn from_occupations(p: usize, q: usize, right: &Configuration) -> Result<Self, GugaError> {
        match (right[p], right[q]) {
            (1, 2) => Ok(ExcitationType::DS),
            (0, 2) => Ok(ExcitationType::DV),
            (1, 1) => Ok(ExcitationType::SS),
            (0, 1) => Ok(ExcitationType::SV),
            (p_occupation, q_occupation) => Err(GugaError::UnknownTransition {
                p,
                q,
                p_occupation,
                q_occupation,
            }),
        }
    }
}

impl TryFrom<u8> for ExcitationType {
    type Error = GugaError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ExcitationType::DS),
            1 => Ok(ExcitationType::DV),
            2 => Ok(ExcitationType::SS),
            3 => Ok(ExcitationType::SV),
            _ => Err(GugaError::InvalidExcitationClass(format!(
                "transition code {value}"
            ))),
        }
    }
}

impl From<ExcitationType> for u8 {
    fn from(value: ExcitationType) -> Self {
        value as u8
    }
}

/// Class of a single generator `<L|E_pq|R>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OneElectronKey {
    pub excitation: ExcitationType,
    pub nue_left: usize,
    pub nue_right: usize,
    pub p_rel: usize,
    pub q_rel: usize,
}

impl OneElectronKey {
    /// Classifies `E_pq` acting between `right` and `left`.
    pub fn classify(
        p: usize,
        q: usize,
        left: &Configuration,
        right: &Configuration,
    ) -> Result<Self, GugaError> {
        let excitation = ExcitationType::from_occupations(p, q, right)?;

        // for DV both orbitals are open on the left only
        let reference = match excitation {
            ExcitationType::DV => left,
            _ => right,
        };

        Ok(Self {
            excitation,
            nue_left: left.n_open_shells(),
            nue_right: right.n_open_shells(),
            p_rel: reference.open_shells_before(p),
            q_rel: reference.open_shells_before(q),
        })
    }
}

impl fmt::Display for OneElectronKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}, {})",
            self.excitation as u8, self.nue_left, self.nue_right, self.p_rel, self.q_rel
        )
    }
}

/// Class of a product `<L|E_pq E_rs|R>`, split at the bridge configuration
/// `B = E_rs R`: `left` classifies `<L|E_pq|B>`, `right` classifies `<B|E_rs|R>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TwoElectronKey {
    pub left: OneElectronKey,
    pub right: OneElectronKey,
}

impl TwoElectronKey {
    pub fn nue_bridge(&self) -> usize {
        self.right.nue_left
    }
}

impl fmt::Display for TwoElectronKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}, {}, {}, {}, {}, {})",
            self.left.excitation as u8,
            self.right.excitation as u8,
            self.left.nue_left,
            self.right.nue_left,
            self.right.nue_right,
            self.left.p_rel,
            self.left.q_rel,
            self.right.p_rel,
            self.right.q_rel
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OneElectronConnection {
    /// rank of the left configuration
    pub left: usize,
    /// rank of the right configuration
    pub right: usize,
    /// packed `(p, q)`, see [`pack_pq`]
    pub pq: usize,
    /// `true` for a fermionic sign of -1
    pub phase: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TwoElectronConnection {
    pub left: usize,
    pub right: usize,
    /// packed `(p, q, r, s)`, see [`pack_pqrs`]
    pub pqrs: usize,
    pub phase: bool,
    /// the integral enters with weight 1 instead of 1/2
    pub doubled: bool,
}

/// `E_pq E_qp` acting on a configuration and coming back to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiagonalConnection {
    pub right: usize,
    pub pqqp: usize,
}

/// Per-class values of the three connection families.
#[derive(Clone, Debug, PartialEq)]
pub struct ByClass<T> {
    pub one_electron: BTreeMap<OneElectronKey, T>,
    pub two_electron: BTreeMap<TwoElectronKey, T>,
    /// keyed by the class of the outgoing step `E_qp`
    pub diagonal: BTreeMap<OneElectronKey, T>,
}

impl<T> Default for ByClass<T> {
    fn default() -> Self {
        Self {
            one_electron: BTreeMap::new(),
            two_electron: BTreeMap::new(),
            diagonal: BTreeMap::new(),
        }
    }
}

impl<T> ByClass<T> {
    pub fn is_empty(&self) -> bool {
        self.one_electron.is_empty() && self.two_electron.is_empty() && self.diagonal.is_empty()
    }

    pub fn n_classes(&self) -> usize {
        self.one_electron.len() + self.two_electron.len() + self.diagonal.len()
    }

    /// Folds `other` into `self`, combining values of classes present in both with
    /// `combine`.
    pub fn merge_with(&mut self, other: ByClass<T>, mut combine: impl FnMut(&mut T, T)) {
        fn merge_map<K: Ord, T>(
            target: &mut BTreeMap<K, T>,
            source: BTreeMap<K, T>,
            combine: &mut impl FnMut(&mut T, T),
        ) {
            for (key, value) in source {
                match target.entry(key) {
                    Entry::Vacant(entry) => {
                        entry.insert(value);
                    }
                    Entry::Occupied(mut entry) => combine(entry.get_mut(), value),
                }
            }
        }

        merge_map(&mut self.one_electron, other.one_electron, &mut combine);
        merge_map(&mut self.two_electron, other.two_electron, &mut combine);
        merge_map(&mut self.diagonal, other.diagonal, &mut combine);
    }
}

pub fn pack_pq(p: usize, q: usize, n_orbitals: usize) -> usize {
    p * n_orbitals + q
}

pub fn unpack_pq(pq: usize, n_orbitals: usize) -> (usize, usize) {
    (pq / n_orbitals, pq % n_orbitals)
}

pub fn pack_pqrs(p: usize, q: usize, r: usize, s: usize, n_orbitals: usize) -> usize {
    ((p * n_orbitals + q) * n_orbitals + r) * n_orbitals + s
}

pub fn unpack_pqrs(pqrs: usize, n_orbitals: usize) -> (usize, usize, usize, usize) {
    let s = pqrs % n_orbitals;
    let r = (pqrs / n_orbitals) % n_orbitals;
    let q = (pqrs / n_orbitals.pow(2)) % n_orbitals;
    let p = pqrs / n_orbitals.pow(3);
    (p, q, r, s)
}

/// Fermionic phase of `<L|E_pq E_rs|R>` through `bridge = E_rs R`.
pub fn two_electron_phase(
    (p, q, r, s): (usize, usize, usize, usize),
    bridge: &Configuration,
    right: &Configuration,
) -> bool {
    bridge.phase_between(p, q) ^ right.phase_between(r, s)
}
