use std::{fmt, ops::Index, str::FromStr};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::GugaError;

/// A spatial occupation pattern, one entry per orbital: 0 (virtual), 1 (singly
/// occupied) or 2 (doubly occupied). Says nothing about how the open shells are
/// spin coupled.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Configuration(SmallVec<[u8; 32]>);

impl Configuration {
    pub fn from_occupations(occupations: &[u8]) -> Result<Self, GugaError> {
        if occupations.iter().any(|&occupation| occupation > 2) {
            return Err(GugaError::InvalidOccupation(format!("{occupations:?}")));
        }
        Ok(Self(SmallVec::from_slice(occupations)))
    }

    /// Number of orbitals
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn occupations(&self) -> &[u8] {
        &self.0
    }

    pub fn n_electrons(&self) -> usize {
        self.0.iter().map(|&occupation| occupation as usize).sum()
    }

    /// Number of singly occupied orbitals (`nue`)
    pub fn n_open_shells(&self) -> usize {
        self.0.iter().filter(|&&occupation| occupation == 1).count()
    }

    /// Number of singly occupied orbitals with an index below `orbital`.
    pub fn open_shells_before(&self, orbital: usize) -> usize {
        self.0[..orbital]
            .iter()
            .filter(|&&occupation| occupation == 1)
            .count()
    }

    /// Parity of the doubly occupied orbitals strictly between `a` and `b`.
    /// `true` means an odd count, i.e. a fermionic sign of -1.
    pub fn phase_between(&self, a: usize, b: usize) -> bool {
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        if high <= low + 1 {
            return false;
        }

        self.0[low + 1..high]
            .iter()
            .filter(|&&occupation| occupation == 2)
            .count()
            % 2
            == 1
    }

    /// Moves one electron from `from` to `to`. Returns `None` if that would leave
    /// the 0..=2 range on either orbital.
    pub fn excited(&self, to: usize, from: usize) -> Option<Self> {
        if self.0[from] == 0 || (to != from && self.0[to] == 2) {
            return None;
        }
        let mut excited = self.clone();
        excited.0[from] -= 1;
        excited.0[to] += 1;
        Some(excited)
    }

    pub(crate) fn set(&mut self, orbital: usize, occupation: u8) {
        self.0[orbital] = occupation;
    }
}

impl Index<usize> for Configuration {
    type Output = u8;

    fn index(&self, orbital: usize) -> &Self::Output {
        &self.0[orbital]
    }
}

impl FromStr for Configuration {
    type Err = GugaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .map(|c| match c {
                '0' => Ok(0),
                '1' => Ok(1),
                '2' => Ok(2),
                _ => Err(GugaError::InvalidOccupation(s.to_string())),
            })
            .collect::<Result<SmallVec<_>, _>>()
            .map(Self)
    }
}

impl TryFrom<String> for Configuration {
    type Error = GugaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Configuration> for String {
    fn from(value: Configuration) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for occupation in &self.0 {
            write!(f, "{occupation}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration({self})")
    }
}

/// Elementary steps an excitation template is built from. Every step has a guard
/// that has to be checked before it is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Create,
    Annihilate,
    DoubleCreate,
    DoubleAnnihilate,
    /// An orbital that is first created into and then annihilated from, e.g. the
    /// shared `q` in `E_pq E_qr`. Leaves the occupation untouched.
    CreateAnnihilate,
    /// An orbital that is first annihilated from and then created into, e.g. the
    /// shared `p` in `E_pq E_rp`. Leaves the occupation untouched.
    AnnihilateCreate,
}

impl Operator {
    /// Whether applying this step to an orbital with the given occupation would
    /// leave the 0..=2 range.
    pub fn is_blocked(self, occupation: u8) -> bool {
        match self {
            Operator::Create | Operator::CreateAnnihilate => occupation == 2,
            Operator::Annihilate | Operator::AnnihilateCreate => occupation == 0,
            Operator::DoubleCreate => occupation != 0,
            Operator::DoubleAnnihilate => occupation != 2,
        }
    }

    /// Applies the step. The guard must have been checked beforehand.
    pub fn apply(self, configuration: &mut Configuration, orbital: usize) {
        let occupation = configuration[orbital];
        debug_assert!(!self.is_blocked(occupation));

        let updated = match self {
            Operator::Create => occupation + 1,
            Operator::Annihilate => occupation - 1,
            Operator::DoubleCreate => occupation + 2,
            Operator::DoubleAnnihilate => occupation - 2,
            Operator::CreateAnnihilate | Operator::AnnihilateCreate => occupation,
        };
        configuration.set(orbital, updated);
    }

    pub fn inverse(self) -> Self {
        match self {
            Operator::Create => Operator::Annihilate,
            Operator::Annihilate => Operator::Create,
            Operator::DoubleCreate => Operator::DoubleAnnihilate,
            Operator::DoubleAnnihilate => Operator::DoubleCreate,
            Operator::CreateAnnihilate => Operator::AnnihilateCreate,
            Operator::AnnihilateCreate => Operator::CreateAnnihilate,
        }
    }
}
