pub mod config;
pub mod configuration;
pub mod connections;
pub mod coupling;
pub mod error;
pub mod excitation;
pub mod history;
pub mod index;
pub mod parallel;
pub mod spin;
pub mod wave_function;

pub mod testing {
    use std::{error::Error, fs::File, path::Path};

    use itertools::Itertools;
    use serde::{Deserialize, Serialize};

    use crate::{
        config::ConfigWaveFunction, configuration::Configuration, error::GugaError,
        wave_function::WaveFunction,
    };

    #[derive(Serialize, Deserialize)]
    pub struct TestInstance {
        pub name: String,
        wave_function: ConfigWaveFunction,
    }

    impl TestInstance {
        pub fn new(name: String, wave_function: &WaveFunction) -> Self {
            Self {
                name,
                wave_function: wave_function.into(),
            }
        }

        pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn Error>> {
            Ok(serde_json::to_writer(
                File::options()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(path)?,
                self,
            )?)
        }

        pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
            Ok(serde_json::from_reader(File::open(path)?)?)
        }

        pub fn wave_function(&self) -> Result<WaveFunction, GugaError> {
            self.wave_function.clone().try_into()
        }
    }

    /// Every configuration of `n_electrons` in `n_orbitals` with all of its spin
    /// functions, in lexicographic order of the occupations.
    pub fn complete_active_space(
        n_orbitals: usize,
        n_electrons: usize,
        two_s: usize,
    ) -> Result<WaveFunction, GugaError> {
        let mut wave_function = WaveFunction::new(two_s, n_orbitals);

        let occupations = itertools::repeat_n(0..=2u8, n_orbitals)
            .multi_cartesian_product()
            .filter(|occupations| {
                occupations.iter().map(|&o| o as usize).sum::<usize>() == n_electrons
            });
        for occupations in occupations {
            wave_function.push(Configuration::from_occupations(&occupations)?, None)?;
        }

        log::debug!(
            "CAS({n_electrons}, {n_orbitals}): {} configurations, {} CSFs",
            wave_function.len(),
            wave_function.n_csfs()
        );
        Ok(wave_function)
    }

}
