use std::collections::BTreeMap;

use crate::{
    configuration::Configuration,
    error::GugaError,
    index::ConfigurationIndex,
    spin::{SpinFunctionSource, SpinFunctions},
};

/// An ordered list of configurations sharing one electron count, each carrying the
/// indices of the spin functions (CSFs) it contributes to the CI space.
#[derive(Clone, Debug)]
pub struct WaveFunction {
    spin_functions: SpinFunctions,
    n_orbitals: usize,
    n_electrons: Option<usize>,
    configurations: Vec<Configuration>,
    csfs: Vec<Vec<usize>>,
    index: ConfigurationIndex,
}

impl WaveFunction {
    pub fn new(two_s: usize, n_orbitals: usize) -> Self {
        Self {
            spin_functions: SpinFunctions::new(two_s),
            n_orbitals,
            n_electrons: None,
            configurations: Vec::new(),
            csfs: Vec::new(),
            index: ConfigurationIndex::new(),
        }
    }

    pub fn two_s(&self) -> usize {
        self.spin_functions.two_s()
    }

    pub fn spin_functions(&self) -> &SpinFunctions {
        &self.spin_functions
    }

    pub fn n_orbitals(&self) -> usize {
        self.n_orbitals
    }

    /// Number of configurations
    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// Appends a configuration with the given spin functions (all of them if
    /// `None`) and returns its rank.
    pub fn push(
        &mut self,
        configuration: Configuration,
        spin_functions: Option<Vec<usize>>,
    ) -> Result<usize, GugaError> {
        if configuration.len() != self.n_orbitals {
            return Err(GugaError::OrbitalCountMismatch {
                expected: self.n_orbitals,
                found: configuration.len(),
            });
        }

        let n_electrons = configuration.n_electrons();
        match self.n_electrons {
            Some(expected) if expected != n_electrons => {
                return Err(GugaError::ElectronCountMismatch {
                    expected,
                    found: n_electrons,
                })
            }
            _ => {}
        }

        let n_open = configuration.n_open_shells();
        let available = self.spin_functions.count(n_open);
        let mut csfs = spin_functions.unwrap_or_else(|| (0..available).collect());
        csfs.sort_unstable();
        csfs.dedup();
        if let Some(&index) = csfs.iter().find(|&&index| index >= available) {
            return Err(GugaError::InvalidSpinFunction {
                n_open,
                index,
                available,
            });
        }

        let rank = self.configurations.len();
        if self.index.insert(&configuration, rank).is_some() {
            return Err(GugaError::DuplicateConfiguration(configuration.to_string()));
        }

        log::trace!("configuration {rank}: {configuration} with spin functions {csfs:?}");
        self.n_electrons = Some(n_electrons);
        self.configurations.push(configuration);
        self.csfs.push(csfs);
        Ok(rank)
    }

    /// Adds spin functions to an existing configuration, returning the ones that
    /// weren't present before.
    pub fn add_spin_functions(
        &mut self,
        rank: usize,
        spin_functions: &[usize],
    ) -> Result<Vec<usize>, GugaError> {
        let configuration = self.configuration(rank)?;
        let n_open = configuration.n_open_shells();
        let available = self.spin_functions.count(n_open);

        if let Some(&index) = spin_functions.iter().find(|&&index| index >= available) {
            return Err(GugaError::InvalidSpinFunction {
                n_open,
                index,
                available,
            });
        }

        let csfs = &mut self.csfs[rank];
        let mut added = Vec::new();
        for &index in spin_functions {
            if let Err(position) = csfs.binary_search(&index) {
                csfs.insert(position, index);
                added.push(index);
            }
        }
        Ok(added)
    }

    pub fn configuration(&self, rank: usize) -> Result<&Configuration, GugaError> {
        self.configurations
            .get(rank)
            .ok_or(GugaError::UnknownConfiguration {
                rank,
                n_configurations: self.configurations.len(),
            })
    }

    /// Spin-function indices of the configuration at `rank`, sorted ascending.
    pub fn csfs(&self, rank: usize) -> Result<&[usize], GugaError> {
        self.csfs
            .get(rank)
            .map(Vec::as_slice)
            .ok_or(GugaError::UnknownConfiguration {
                rank,
                n_configurations: self.configurations.len(),
            })
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    pub fn all_csfs(&self) -> &[Vec<usize>] {
        &self.csfs
    }

    pub fn find(&self, configuration: &Configuration) -> Option<usize> {
        self.index.find(configuration)
    }

    pub fn index(&self) -> &ConfigurationIndex {
        &self.index
    }

    /// Position of the first CSF of every configuration in the CI vector.
    pub fn csf_offsets(&self) -> Vec<usize> {
        self.csfs
            .iter()
            .scan(0, |offset, csfs| {
                let start = *offset;
                *offset += csfs.len();
                Some(start)
            })
            .collect()
    }

    pub fn n_csfs(&self) -> usize {
        self.csfs.iter().map(Vec::len).sum()
    }

    /// Ranks grouped by open-shell count.
    pub fn by_open_shells(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut buckets = BTreeMap::<usize, Vec<usize>>::new();
        for (rank, configuration) in self.configurations.iter().enumerate() {
            buckets
                .entry(configuration.n_open_shells())
                .or_default()
                .push(rank);
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::WaveFunction;
    use crate::error::GugaError;

    #[test]
    fn push_assigns_ranks_and_offsets() {
        let mut wave_function = WaveFunction::new(0, 4);
        assert_eq!(wave_function.push("2200".parse().unwrap(), None), Ok(0));
        assert_eq!(wave_function.push("2110".parse().unwrap(), None), Ok(1));
        assert_eq!(wave_function.push("1111".parse().unwrap(), Some(vec![1])), Ok(2));
        assert_eq!(
            wave_function.push("1111".parse().unwrap(), None),
            Err(GugaError::DuplicateConfiguration("1111".to_string()))
        );

        assert_eq!(wave_function.csfs(1).unwrap(), &[0]);
        assert_eq!(wave_function.csfs(2).unwrap(), &[1]);
        assert_eq!(wave_function.csf_offsets(), vec![0, 1, 2]);
        assert_eq!(wave_function.n_csfs(), 3);
        assert_eq!(wave_function.find(&"2110".parse().unwrap()), Some(1));
        assert_eq!(wave_function.by_open_shells()[&4], vec![2]);
    }

    #[test]
    fn push_validates() {
        let mut wave_function = WaveFunction::new(0, 3);
        assert!(matches!(
            wave_function.push("2000".parse().unwrap(), None),
            Err(GugaError::OrbitalCountMismatch { .. })
        ));
        wave_function.push("200".parse().unwrap(), None).unwrap();
        assert!(matches!(
            wave_function.push("210".parse().unwrap(), None),
            Err(GugaError::ElectronCountMismatch { .. })
        ));
        assert!(matches!(
            wave_function.push("110".parse().unwrap(), Some(vec![1])),
            Err(GugaError::InvalidSpinFunction { .. })
        ));
    }

    #[test]
    fn grow_spin_functions() {
        let mut wave_function = WaveFunction::new(0, 4);
        wave_function.push("1111".parse().unwrap(), Some(vec![1])).unwrap();
        assert_eq!(wave_function.add_spin_functions(0, &[0, 1]), Ok(vec![0]));
        assert_eq!(wave_function.csfs(0).unwrap(), &[0, 1]);
        assert!(wave_function.add_spin_functions(0, &[2]).is_err());
        assert!(wave_function.add_spin_functions(3, &[0]).is_err());
    }
}
