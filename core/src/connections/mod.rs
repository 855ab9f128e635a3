mod enumerator;
mod templates;

use std::{collections::BTreeMap, time::Instant};

use crate::{
    config::GugaConfig,
    error::GugaError,
    excitation::{
        DiagonalConnection, OneElectronConnection, OneElectronKey, TwoElectronConnection,
        TwoElectronKey,
    },
    parallel::{partition, WorkerLayout},
    wave_function::WaveFunction,
};

use enumerator::Enumerator;

/// Connection records grouped by excitation class.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Connections {
    pub one_electron: BTreeMap<OneElectronKey, Vec<OneElectronConnection>>,
    pub two_electron: BTreeMap<TwoElectronKey, Vec<TwoElectronConnection>>,
    /// `E_pq E_qp`, keyed by the class of `E_qp`
    pub diagonal: BTreeMap<OneElectronKey, Vec<DiagonalConnection>>,
}

impl Connections {
    /// Appends every record of `other` to the list of its class.
    pub fn merge(&mut self, other: Connections) {
        merge_class_map(&mut self.one_electron, other.one_electron);
        merge_class_map(&mut self.two_electron, other.two_electron);
        merge_class_map(&mut self.diagonal, other.diagonal);
    }

    pub fn is_empty(&self) -> bool {
        self.one_electron.is_empty() && self.two_electron.is_empty() && self.diagonal.is_empty()
    }

    pub fn n_classes(&self) -> usize {
        self.one_electron.len() + self.two_electron.len() + self.diagonal.len()
    }

    pub fn n_records(&self) -> usize {
        self.one_electron.values().map(Vec::len).sum::<usize>()
            + self.two_electron.values().map(Vec::len).sum::<usize>()
            + self.diagonal.values().map(Vec::len).sum::<usize>()
    }

    /// Sorts the records of every class. Nothing downstream depends on the order,
    /// but it makes results of different worker layouts comparable.
    pub fn sort(&mut self) {
        self.one_electron.values_mut().for_each(|list| list.sort_unstable());
        self.two_electron.values_mut().for_each(|list| list.sort_unstable());
        self.diagonal.values_mut().for_each(|list| list.sort_unstable());
    }
}

fn merge_class_map<K: Ord, V>(target: &mut BTreeMap<K, Vec<V>>, source: BTreeMap<K, Vec<V>>) {
    for (key, mut records) in source {
        target.entry(key).or_default().append(&mut records);
    }
}

/// Discovers all connections `<left|...|right>` for the given right
/// configurations (ranks into `right`). Only pairs with a left rank not above the
/// right rank are kept.
pub fn construct_connections(
    left: &WaveFunction,
    right: &WaveFunction,
    right_ranks: &[usize],
    config: &GugaConfig,
) -> Result<Connections, GugaError> {
    if left.n_orbitals() != right.n_orbitals() {
        return Err(GugaError::OrbitalCountMismatch {
            expected: right.n_orbitals(),
            found: left.n_orbitals(),
        });
    }

    let start = Instant::now();
    let layout = WorkerLayout::from_config(config)?;
    let worker_count = layout.worker_count();

    let partial = layout.fan_out(|worker| {
        let mut local = Connections::default();
        let mut n_processed = 0;

        for (i, &rank) in right_ranks.iter().enumerate() {
            if !partition(i, worker, worker_count) {
                continue;
            }
            let configuration = right.configuration(rank)?;
            Enumerator::new(left.index(), configuration, rank, config.min_nue).run(&mut local)?;
            n_processed += 1;
        }

        log::debug!(
            "worker {worker}: {n_processed} right configurations, {} records",
            local.n_records()
        );
        Ok(local)
    })?;

    let mut connections = Connections::default();
    for local in partial {
        connections.merge(local);
    }

    log::info!(
        "connections for {} right configurations: {} one-electron, {} two-electron and {} diagonal classes ({} records) in {:0.2?}",
        right_ranks.len(),
        connections.one_electron.len(),
        connections.two_electron.len(),
        connections.diagonal.len(),
        connections.n_records(),
        start.elapsed()
    );
    Ok(connections)
}

/// [`construct_connections`] over every configuration of `right`.
pub fn construct_all_connections(
    left: &WaveFunction,
    right: &WaveFunction,
    config: &GugaConfig,
) -> Result<Connections, GugaError> {
    let right_ranks = (0..right.len()).collect::<Vec<_>>();
    construct_connections(left, right, &right_ranks, config)
}
