mod settings;
mod wave_function;

pub use settings::GugaConfig;
pub use wave_function::{ConfigConfiguration, ConfigWaveFunction};
