use serde::{Deserialize, Serialize};

use crate::{configuration::Configuration, error::GugaError, spin, wave_function::WaveFunction};

/// A wave function as stored in an input file: the total spin and a list of
/// configurations, optionally restricted to some of their spin functions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigWaveFunction {
    pub spin: f64,
    pub configurations: Vec<ConfigConfiguration>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigConfiguration {
    pub occupation: Configuration,
    /// All spin functions of the configuration if left out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spin_functions: Option<Vec<usize>>,
}

impl TryFrom<ConfigWaveFunction> for WaveFunction {
    type Error = GugaError;

    fn try_from(value: ConfigWaveFunction) -> Result<Self, Self::Error> {
        let ConfigWaveFunction {
            spin,
            configurations,
        } = value;

        let two_s = spin::doubled_spin(spin)?;
        let n_orbitals = configurations
            .first()
            .map(|configuration| configuration.occupation.len())
            .unwrap_or(0);

        let mut wave_function = WaveFunction::new(two_s, n_orbitals);
        for ConfigConfiguration {
            occupation,
            spin_functions,
        } in configurations
        {
            wave_function.push(occupation, spin_functions)?;
        }

        Ok(wave_function)
    }
}

impl From<&WaveFunction> for ConfigWaveFunction {
    fn from(value: &WaveFunction) -> Self {
        let configurations = value
            .configurations()
            .iter()
            .zip(value.all_csfs())
            .map(|(configuration, csfs)| ConfigConfiguration {
                occupation: configuration.clone(),
                spin_functions: Some(csfs.to_vec()),
            })
            .collect();

        Self {
            spin: value.two_s() as f64 / 2.0,
            configurations,
        }
    }
}
