use guga_core::{
    config::{ConfigConfiguration, ConfigWaveFunction, GugaConfig},
    connections::{self, Connections},
    coupling::{self, CouplingCoefficients},
    history::{SfPairHistory, SfPairs},
    spin::SpinFunctionSource,
    wave_function::WaveFunction,
};
use std::{
    fs::File,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: GugaCommand,
}

#[derive(Args, Debug)]
struct EngineOptions {
    /// A JSON file with engine settings, overridden by the flags below
    #[arg(long)]
    config: Option<PathBuf>,
    /// Connections through configurations with fewer open shells than this are dropped
    #[arg(long)]
    min_nue: Option<usize>,
    /// Number of worker threads, defaults to the number of cores
    #[arg(long)]
    threads: Option<usize>,
}

impl EngineOptions {
    fn load(&self) -> anyhow::Result<GugaConfig> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_reader(
                File::open(path).with_context(|| format!("opening {}", path.display()))?,
            )
            .with_context(|| format!("parsing {}", path.display()))?,
            None => GugaConfig::default(),
        };

        if let Some(min_nue) = self.min_nue {
            config.min_nue = min_nue;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum GugaCommand {
    /// Find every configuration pair connected by one- and two-electron excitations
    Connections {
        /// The wave function to connect with itself
        #[arg(long, short)]
        wave_function: PathBuf,
        #[command(flatten)]
        options: EngineOptions,
    },
    /// Build connections and all coupling coefficients
    Coefficients {
        #[arg(long, short)]
        wave_function: PathBuf,
        #[command(flatten)]
        options: EngineOptions,
    },
    /// Build everything for a wave function, then grow it and update incrementally
    Grow {
        #[arg(long, short)]
        wave_function: PathBuf,
        /// Configurations (or spin functions of existing ones) to add
        #[arg(long, short)]
        extension: PathBuf,
        #[command(flatten)]
        options: EngineOptions,
    },
}

fn load_config_wave_function(path: &Path) -> anyhow::Result<ConfigWaveFunction> {
    serde_json::from_reader(File::open(path).with_context(|| format!("opening {}", path.display()))?)
        .with_context(|| format!("parsing {}", path.display()))
}

fn load_wave_function(path: &Path) -> anyhow::Result<WaveFunction> {
    let wave_function = WaveFunction::try_from(load_config_wave_function(path)?)
        .with_context(|| format!("invalid wave function in {}", path.display()))?;

    println!(
        "{}: {} configurations, {} CSFs over {} orbitals, 2S = {}",
        path.display(),
        wave_function.len(),
        wave_function.n_csfs(),
        wave_function.n_orbitals(),
        wave_function.two_s()
    );
    Ok(wave_function)
}

fn print_connections(connections: &Connections) {
    println!(
        "one-electron: {} classes, {} records",
        connections.one_electron.len(),
        connections.one_electron.values().map(Vec::len).sum::<usize>()
    );
    println!(
        "two-electron: {} classes, {} records",
        connections.two_electron.len(),
        connections.two_electron.values().map(Vec::len).sum::<usize>()
    );
    println!(
        "diagonal:     {} classes, {} records",
        connections.diagonal.len(),
        connections.diagonal.values().map(Vec::len).sum::<usize>()
    );
}

fn print_coefficients(coefficients: &CouplingCoefficients) {
    println!(
        "coupling coefficients: {} one-electron, {} two-electron, {} diagonal",
        coefficients.one_electron.values().map(|table| table.len()).sum::<usize>(),
        coefficients.two_electron.values().map(|table| table.len()).sum::<usize>(),
        coefficients.diagonal.values().map(|table| table.len()).sum::<usize>()
    );
}

/// Appends the configurations of `extension`, or adds their spin functions where
/// the configuration already exists. Returns the ranks of appended configurations.
fn grow(
    wave_function: &mut WaveFunction,
    extension: ConfigWaveFunction,
) -> anyhow::Result<Vec<usize>> {
    if extension.spin * 2.0 != wave_function.two_s() as f64 {
        bail!(
            "extension has spin {}, the wave function {}",
            extension.spin,
            wave_function.two_s() as f64 / 2.0
        );
    }

    let mut new_ranks = Vec::new();
    for ConfigConfiguration {
        occupation,
        spin_functions,
    } in extension.configurations
    {
        match wave_function.find(&occupation) {
            Some(rank) => {
                let n_open = occupation.n_open_shells();
                let spin_functions = spin_functions.unwrap_or_else(|| {
                    (0..wave_function.spin_functions().count(n_open)).collect()
                });
                let added = wave_function.add_spin_functions(rank, &spin_functions)?;
                log::debug!("{occupation}: added spin functions {added:?}");
            }
            None => new_ranks.push(wave_function.push(occupation, spin_functions)?),
        }
    }
    Ok(new_ranks)
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        GugaCommand::Connections {
            wave_function,
            options,
        } => {
            let config = options.load()?;
            let wave_function = load_wave_function(&wave_function)?;

            let start = Instant::now();
            let connections =
                connections::construct_all_connections(&wave_function, &wave_function, &config)?;
            println!("connections found in {:0.2?}", start.elapsed());
            print_connections(&connections);
        }

        GugaCommand::Coefficients {
            wave_function,
            options,
        } => {
            let config = options.load()?;
            let wave_function = load_wave_function(&wave_function)?;

            let start = Instant::now();
            let connections =
                connections::construct_all_connections(&wave_function, &wave_function, &config)?;
            print_connections(&connections);

            let pairs = SfPairs::from_connections(&connections, &wave_function, &wave_function)?;
            let coefficients = coupling::construct_all_coefficients(
                &pairs,
                wave_function.spin_functions(),
                &config,
            )?;
            println!("coefficients built in {:0.2?}", start.elapsed());
            print_coefficients(&coefficients);
        }

        GugaCommand::Grow {
            wave_function,
            extension,
            options,
        } => {
            let config = options.load()?;
            let mut wave_function = load_wave_function(&wave_function)?;
            let extension = load_config_wave_function(&extension)?;
            let spin_functions = *wave_function.spin_functions();

            let start = Instant::now();
            let mut history = SfPairHistory::new();
            let mut coefficients = CouplingCoefficients::default();
            let mut connections =
                connections::construct_all_connections(&wave_function, &wave_function, &config)?;
            let trial = SfPairs::from_connections(&connections, &wave_function, &wave_function)?;
            let initial = coupling::extend_coefficients(
                trial,
                &mut history,
                &mut coefficients,
                &spin_functions,
                &config,
            )?;
            println!(
                "initial build: {initial} coefficients in {:0.2?}",
                start.elapsed()
            );

            let new_ranks = grow(&mut wave_function, extension)?;
            println!(
                "grown to {} configurations ({} new), {} CSFs",
                wave_function.len(),
                new_ranks.len(),
                wave_function.n_csfs()
            );

            let start = Instant::now();
            connections.merge(connections::construct_connections(
                &wave_function,
                &wave_function,
                &new_ranks,
                &config,
            )?);
            let trial = SfPairs::from_connections(&connections, &wave_function, &wave_function)?;
            let added = coupling::extend_coefficients(
                trial,
                &mut history,
                &mut coefficients,
                &spin_functions,
                &config,
            )?;
            println!(
                "incremental update: {added} new coefficients in {:0.2?}",
                start.elapsed()
            );
            print_connections(&connections);
            print_coefficients(&coefficients);
        }
    }

    Ok(())
}
