//! Spin-function pairs per excitation class and the history needed to extend
//! coupling coefficients when the CSF space grows.

use std::collections::BTreeSet;

use crate::{
    connections::Connections, error::GugaError, excitation::ByClass,
    wave_function::WaveFunction,
};

/// Left and right spin-function indices a class needs coefficients for. The
/// coefficients of a class are evaluated on `left × right`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SfPair {
    pub left: BTreeSet<usize>,
    pub right: BTreeSet<usize>,
}

impl SfPair {
    pub fn new(
        left: impl IntoIterator<Item = usize>,
        right: impl IntoIterator<Item = usize>,
    ) -> Self {
        Self {
            left: left.into_iter().collect(),
            right: right.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() || self.right.is_empty()
    }

    pub fn n_pairs(&self) -> usize {
        self.left.len() * self.right.len()
    }

    pub fn union(&mut self, other: SfPair) {
        self.left.extend(other.left);
        self.right.extend(other.right);
    }

    fn extend(&mut self, left: &[usize], right: &[usize]) {
        self.left.extend(left.iter().copied());
        self.right.extend(right.iter().copied());
    }
}

pub type SfPairs = ByClass<SfPair>;

impl SfPairs {
    /// Projects connection records onto the spin functions their configurations
    /// carry. The diagonal family uses the right configuration on both sides.
    pub fn from_connections(
        connections: &Connections,
        left: &WaveFunction,
        right: &WaveFunction,
    ) -> Result<Self, GugaError> {
        let mut pairs = SfPairs::default();

        for (key, records) in &connections.one_electron {
            let pair = pairs.one_electron.entry(*key).or_default();
            for record in records {
                pair.extend(left.csfs(record.left)?, right.csfs(record.right)?);
            }
        }

        for (key, records) in &connections.two_electron {
            let pair = pairs.two_electron.entry(*key).or_default();
            for record in records {
                pair.extend(left.csfs(record.left)?, right.csfs(record.right)?);
            }
        }

        for (key, records) in &connections.diagonal {
            let pair = pairs.diagonal.entry(*key).or_default();
            for record in records {
                let csfs = right.csfs(record.right)?;
                pair.extend(csfs, csfs);
            }
        }

        Ok(pairs)
    }

    /// Folds `other` in, uniting the sets of classes present in both.
    pub fn merge(&mut self, other: SfPairs) {
        self.merge_with(other, SfPair::union);
    }

    pub fn n_pairs(&self) -> usize {
        self.one_electron
            .values()
            .chain(self.two_electron.values())
            .chain(self.diagonal.values())
            .map(SfPair::n_pairs)
            .sum()
    }
}

/// Blocks of spin-function pairs that still need coefficients.
pub type SfBlocks = ByClass<Vec<SfPair>>;

/// Every spin function seen so far per class. Created once per CI run and
/// handed to each coefficient extension.
#[derive(Clone, Debug, Default)]
pub struct SfPairHistory {
    seen: SfPairs,
}

impl SfPairHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> &SfPairs {
        &self.seen
    }

    /// Splits `trial` into the blocks not covered by the history: `new × new`,
    /// plus `new × old` and `old × new` for classes seen before. `old × old` is
    /// never repeated.
    pub fn delta(&self, trial: &SfPairs) -> SfBlocks {
        SfBlocks {
            one_electron: trial
                .one_electron
                .iter()
                .map(|(key, pair)| (*key, split(self.seen.one_electron.get(key), pair)))
                .filter(|(_, blocks)| !blocks.is_empty())
                .collect(),
            two_electron: trial
                .two_electron
                .iter()
                .map(|(key, pair)| (*key, split(self.seen.two_electron.get(key), pair)))
                .filter(|(_, blocks)| !blocks.is_empty())
                .collect(),
            diagonal: trial
                .diagonal
                .iter()
                .map(|(key, pair)| (*key, split(self.seen.diagonal.get(key), pair)))
                .filter(|(_, blocks)| !blocks.is_empty())
                .collect(),
        }
    }

    /// Unites `trial` into the history.
    pub fn record(&mut self, trial: SfPairs) {
        self.seen.merge(trial);
    }
}

fn split(seen: Option<&SfPair>, trial: &SfPair) -> Vec<SfPair> {
    let Some(seen) = seen else {
        return if trial.is_empty() {
            vec![]
        } else {
            vec![trial.clone()]
        };
    };

    let new_left = trial
        .left
        .difference(&seen.left)
        .copied()
        .collect::<BTreeSet<_>>();
    let new_right = trial
        .right
        .difference(&seen.right)
        .copied()
        .collect::<BTreeSet<_>>();

    [
        SfPair {
            left: new_left.clone(),
            right: new_right.clone(),
        },
        SfPair {
            left: new_left,
            right: seen.right.clone(),
        },
        SfPair {
            left: seen.left.clone(),
            right: new_right,
        },
    ]
    .into_iter()
    .filter(|block| !block.is_empty())
    .collect()
}
