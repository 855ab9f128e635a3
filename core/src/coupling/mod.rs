#[cfg(test)]
mod determinants;
mod elementary;
mod prototype;

use std::{collections::BTreeMap, time::Instant};

use nalgebra::DMatrix;

use crate::{
    config::GugaConfig,
    error::GugaError,
    excitation::{ByClass, OneElectronKey, TwoElectronKey},
    history::{SfBlocks, SfPair, SfPairHistory, SfPairs},
    parallel::{partition, WorkerLayout},
    spin::{SpinFunction, SpinFunctionSource},
};

use prototype::Prototype;

/// Bridge spin functions whose elementary couplings to every requested left (or
/// right) spin function stay below this are skipped.
const REACHABLE_THRESHOLD: f64 = 1e-12;

/// (left spin function, right spin function) -> coefficient
pub type CoefficientTable = BTreeMap<(usize, usize), f64>;

pub type CouplingCoefficients = ByClass<CoefficientTable>;

impl CouplingCoefficients {
    /// Folds `other` in. Entries computed twice carry the same value.
    pub fn merge(&mut self, other: CouplingCoefficients) {
        self.merge_with(other, |table, other| table.extend(other));
    }

    pub fn n_coefficients(&self) -> usize {
        self.one_electron
            .values()
            .chain(self.two_electron.values())
            .chain(self.diagonal.values())
            .map(BTreeMap::len)
            .sum()
    }
}

/// Evaluates coupling coefficients of single classes. Spin functions are looked
/// up through `spin_functions` by open-shell count and index.
pub struct CouplingEngine<'a, S: SpinFunctionSource> {
    spin_functions: &'a S,
}

impl<'a, S: SpinFunctionSource> CouplingEngine<'a, S> {
    pub fn new(spin_functions: &'a S) -> Self {
        Self { spin_functions }
    }

    fn resolve(
        &self,
        n_open: usize,
        indices: impl IntoIterator<Item = usize>,
    ) -> Result<Vec<SpinFunction>, GugaError> {
        indices
            .into_iter()
            .map(|index| self.spin_functions.resolve(n_open, index))
            .collect()
    }

    /// `<L_i|E_pq|R_j>` on the prototype of `key`.
    fn elementary(
        &self,
        key: &OneElectronKey,
        left: impl IntoIterator<Item = usize>,
        right: impl IntoIterator<Item = usize>,
    ) -> Result<DMatrix<f64>, GugaError> {
        let prototype = Prototype::one_electron(key)?;
        let left = self.resolve(key.nue_left, left)?;
        let right = self.resolve(key.nue_right, right)?;
        Ok(elementary::excitation_matrix(&prototype, &left, &right))
    }

    pub fn one_electron(
        &self,
        key: &OneElectronKey,
        pair: &SfPair,
    ) -> Result<CoefficientTable, GugaError> {
        let matrix = self.elementary(
            key,
            pair.left.iter().copied(),
            pair.right.iter().copied(),
        )?;
        Ok(table(pair, &matrix))
    }

    /// `sum_b <L_i|E_pq|B_b><B_b|E_rs|R_j>` over the bridge spin functions
    /// reachable from both sides.
    pub fn two_electron(
        &self,
        key: &TwoElectronKey,
        pair: &SfPair,
    ) -> Result<CoefficientTable, GugaError> {
        if key.left.nue_right != key.right.nue_left {
            return Err(GugaError::InvalidExcitationClass(key.to_string()));
        }

        let n_bridge = self.spin_functions.count(key.nue_bridge());
        let left = self.elementary(&key.left, pair.left.iter().copied(), 0..n_bridge)?;
        let right = self.elementary(&key.right, 0..n_bridge, pair.right.iter().copied())?;

        let reachable = (0..n_bridge)
            .filter(|&b| {
                left.column(b).amax() > REACHABLE_THRESHOLD
                    && right.row(b).amax() > REACHABLE_THRESHOLD
            })
            .collect::<Vec<_>>();
        log::trace!(
            "class {key}: {} of {n_bridge} bridge spin functions reachable",
            reachable.len()
        );

        let product = left.select_columns(&reachable) * right.select_rows(&reachable);
        Ok(table(pair, &product))
    }

    /// `sum_b <R_i|E_pq|B_b><B_b|E_qp|R_j>` over every bridge spin function. Both
    /// sides of `pair` index spin functions of the right configuration.
    pub fn diagonal(
        &self,
        key: &OneElectronKey,
        pair: &SfPair,
    ) -> Result<CoefficientTable, GugaError> {
        let n_bridge = self.spin_functions.count(key.nue_left);
        let left = self.elementary(key, 0..n_bridge, pair.left.iter().copied())?;
        let right = self.elementary(key, 0..n_bridge, pair.right.iter().copied())?;
        Ok(table(pair, &left.tr_mul(&right)))
    }
}

fn table(pair: &SfPair, matrix: &DMatrix<f64>) -> CoefficientTable {
    itertools::iproduct!(pair.left.iter().enumerate(), pair.right.iter().enumerate())
        .map(|((i, &left), (j, &right))| ((left, right), matrix[(i, j)]))
        .collect()
}

enum Task<'a> {
    OneElectron(&'a OneElectronKey, &'a SfPair),
    TwoElectron(&'a TwoElectronKey, &'a SfPair),
    Diagonal(&'a OneElectronKey, &'a SfPair),
}

/// Computes coefficients for every block, spread over the workers of `config`.
pub fn construct_coefficients<S: SpinFunctionSource>(
    blocks: &SfBlocks,
    spin_functions: &S,
    config: &GugaConfig,
) -> Result<CouplingCoefficients, GugaError> {
    let start = Instant::now();

    let mut tasks = Vec::new();
    for (key, pairs) in &blocks.one_electron {
        tasks.extend(pairs.iter().map(|pair| Task::OneElectron(key, pair)));
    }
    for (key, pairs) in &blocks.two_electron {
        tasks.extend(pairs.iter().map(|pair| Task::TwoElectron(key, pair)));
    }
    for (key, pairs) in &blocks.diagonal {
        tasks.extend(pairs.iter().map(|pair| Task::Diagonal(key, pair)));
    }

    let layout = WorkerLayout::from_config(config)?;
    let worker_count = layout.worker_count();
    let engine = CouplingEngine::new(spin_functions);

    let partial = layout.fan_out(|worker| {
        let mut local = CouplingCoefficients::default();
        for (i, task) in tasks.iter().enumerate() {
            if !partition(i, worker, worker_count) {
                continue;
            }

            match *task {
                Task::OneElectron(key, pair) => local
                    .one_electron
                    .entry(*key)
                    .or_default()
                    .extend(engine.one_electron(key, pair)?),
                Task::TwoElectron(key, pair) => local
                    .two_electron
                    .entry(*key)
                    .or_default()
                    .extend(engine.two_electron(key, pair)?),
                Task::Diagonal(key, pair) => local
                    .diagonal
                    .entry(*key)
                    .or_default()
                    .extend(engine.diagonal(key, pair)?),
            }
        }
        Ok(local)
    })?;

    let mut coefficients = CouplingCoefficients::default();
    for local in partial {
        coefficients.merge(local);
    }

    log::info!(
        "{} coupling coefficients in {} classes from {} blocks in {:0.2?}",
        coefficients.n_coefficients(),
        coefficients.n_classes(),
        tasks.len(),
        start.elapsed()
    );
    Ok(coefficients)
}

/// Coefficients of every class in `pairs` on `left × right`, ignoring any history.
pub fn construct_all_coefficients<S: SpinFunctionSource>(
    pairs: &SfPairs,
    spin_functions: &S,
    config: &GugaConfig,
) -> Result<CouplingCoefficients, GugaError> {
    let blocks = SfPairHistory::new().delta(pairs);
    construct_coefficients(&blocks, spin_functions, config)
}

/// Brings `coefficients` up to date with `trial`, evaluating only the blocks the
/// history hasn't covered yet. Returns the number of newly computed
/// coefficients. Nothing is touched if an error occurs.
pub fn extend_coefficients<S: SpinFunctionSource>(
    trial: SfPairs,
    history: &mut SfPairHistory,
    coefficients: &mut CouplingCoefficients,
    spin_functions: &S,
    config: &GugaConfig,
) -> Result<usize, GugaError> {
    let blocks = history.delta(&trial);
    log::debug!(
        "{} of {} classes need new coefficients, {} seen before",
        blocks.n_classes(),
        trial.n_classes(),
        history.seen().n_classes()
    );

    let added = construct_coefficients(&blocks, spin_functions, config)?;
    let n_added = added.n_coefficients();

    coefficients.merge(added);
    history.record(trial);
    Ok(n_added)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

    use super::{
        construct_all_coefficients, construct_coefficients,
        determinants::{excite, expand, overlap, Expansion},
        extend_coefficients, CouplingCoefficients, CouplingEngine,
    };
    use crate::{
        config::GugaConfig,
        configuration::Configuration,
        connections::{construct_all_connections, construct_connections, Connections},
        error::GugaError,
        excitation::{self, ExcitationType, OneElectronKey, TwoElectronKey},
        history::{SfBlocks, SfPair, SfPairHistory, SfPairs},
        spin::{SpinFunctionSource, SpinFunctions},
        testing,
        wave_function::WaveFunction,
    };

    fn config(threads: usize) -> GugaConfig {
        GugaConfig {
            threads: Some(threads),
            ..Default::default()
        }
    }

    fn random_space(
        seed: u64,
        n_orbitals: usize,
        n_electrons: usize,
        two_s: usize,
        keep: usize,
    ) -> WaveFunction {
        let mut rng = StdRng::seed_from_u64(seed);
        let cas = testing::complete_active_space(n_orbitals, n_electrons, two_s).unwrap();
        let mut configurations = cas.configurations().to_vec();
        configurations.shuffle(&mut rng);

        let mut wave_function = WaveFunction::new(two_s, n_orbitals);
        for configuration in configurations.into_iter().take(keep) {
            wave_function.push(configuration, None).unwrap();
        }
        wave_function
    }

    fn build(wave_function: &WaveFunction, threads: usize) -> (Connections, CouplingCoefficients) {
        let connections =
            construct_all_connections(wave_function, wave_function, &config(threads)).unwrap();
        let pairs = SfPairs::from_connections(&connections, wave_function, wave_function).unwrap();
        let coefficients =
            construct_all_coefficients(&pairs, wave_function.spin_functions(), &config(threads))
                .unwrap();
        (connections, coefficients)
    }

    fn sign(phase: bool) -> f64 {
        if phase {
            -1.0
        } else {
            1.0
        }
    }

    /// Determinant expansions of every CSF of a configuration, by spin function.
    fn csfs(wave_function: &WaveFunction, rank: usize) -> Vec<(usize, Expansion)> {
        let configuration = wave_function.configuration(rank).unwrap();
        wave_function
            .csfs(rank)
            .unwrap()
            .iter()
            .map(|&index| {
                let spin_function = wave_function
                    .spin_functions()
                    .resolve(configuration.n_open_shells(), index)
                    .unwrap();
                (index, expand(configuration, &spin_function))
            })
            .collect()
    }

    #[test]
    fn one_electron_matches_determinants() {
        for (n_electrons, two_s) in [(4, 0), (4, 2), (5, 1), (5, 3)] {
            let wave_function = random_space(23, 5, n_electrons, two_s, 30);
            let n = wave_function.n_orbitals();
            let (connections, coefficients) = build(&wave_function, 2);
            assert!(!connections.one_electron.is_empty());

            for (key, records) in &connections.one_electron {
                // absent if no configuration of the class carries spin functions
                let table = coefficients.one_electron.get(key);
                for record in records {
                    let (p, q) = excitation::unpack_pq(record.pq, n);
                    for (i, bra) in csfs(&wave_function, record.left) {
                        for (j, ket) in csfs(&wave_function, record.right) {
                            let full = overlap(&bra, &excite(&ket, p, q));
                            assert_relative_eq!(
                                full,
                                sign(record.phase) * table.unwrap()[&(i, j)],
                                epsilon = 1e-10
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn two_electron_matches_determinants() {
        for (n_electrons, two_s) in [(4, 0), (5, 1), (4, 2)] {
            let wave_function = random_space(29, 5, n_electrons, two_s, 25);
            let n = wave_function.n_orbitals();
            let (connections, coefficients) = build(&wave_function, 3);
            assert!(!connections.two_electron.is_empty());

            for (key, records) in &connections.two_electron {
                let table = coefficients.two_electron.get(key);
                for record in records {
                    let (p, q, r, s) = excitation::unpack_pqrs(record.pqrs, n);
                    for (i, bra) in csfs(&wave_function, record.left) {
                        for (j, ket) in csfs(&wave_function, record.right) {
                            let full = overlap(&bra, &excite(&excite(&ket, r, s), p, q));
                            assert_relative_eq!(
                                full,
                                sign(record.phase) * table.unwrap()[&(i, j)],
                                epsilon = 1e-10
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn diagonal_matches_determinants() {
        let wave_function = random_space(31, 5, 4, 0, 20);
        let n = wave_function.n_orbitals();
        let (connections, coefficients) = build(&wave_function, 1);

        for (key, records) in &connections.diagonal {
            let table = &coefficients.diagonal[key];
            for record in records {
                let (p, q, _, _) = excitation::unpack_pqrs(record.pqqp, n);
                let expansions = csfs(&wave_function, record.right);
                for (i, bra) in &expansions {
                    for (j, ket) in &expansions {
                        let full = overlap(bra, &excite(&excite(ket, q, p), p, q));
                        assert_relative_eq!(full, table[&(*i, *j)], epsilon = 1e-10);
                    }
                }
            }
        }
    }

    #[test]
    fn many_open_shells_match_determinants() {
        let mut wave_function = WaveFunction::new(1, 11);
        for occupation in ["11111111111", "21111111110", "11111111120", "11111211110"] {
            wave_function
                .push(occupation.parse().unwrap(), Some(vec![0, 1, 2]))
                .unwrap();
        }
        let n = wave_function.n_orbitals();
        let (connections, coefficients) = build(&wave_function, 2);
        let expansions = (0..wave_function.len())
            .map(|rank| csfs(&wave_function, rank))
            .collect::<Vec<_>>();

        for (key, records) in &connections.one_electron {
            let table = &coefficients.one_electron[key];
            for record in records {
                let (p, q) = excitation::unpack_pq(record.pq, n);
                for (i, bra) in &expansions[record.left] {
                    for (j, ket) in &expansions[record.right] {
                        let full = overlap(bra, &excite(ket, p, q));
                        assert_relative_eq!(
                            full,
                            sign(record.phase) * table[&(*i, *j)],
                            epsilon = 1e-10
                        );
                    }
                }
            }
        }

        for (key, records) in &connections.two_electron {
            let table = &coefficients.two_electron[key];
            for record in records.iter().step_by(7) {
                let (p, q, r, s) = excitation::unpack_pqrs(record.pqrs, n);
                for (i, bra) in &expansions[record.left] {
                    for (j, ket) in &expansions[record.right] {
                        let full = overlap(bra, &excite(&excite(ket, r, s), p, q));
                        assert_relative_eq!(
                            full,
                            sign(record.phase) * table[&(*i, *j)],
                            epsilon = 1e-10
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn both_bridges_agree() {
        let right: Configuration = "121110".parse().unwrap();
        let (p, q, r, s) = (5, 0, 3, 1);
        let spin_functions = SpinFunctions::new(0);
        let engine = CouplingEngine::new(&spin_functions);
        let pair = SfPair::new(0..2, 0..2);

        // through E_rs R, then through E_pq R
        let bridges = [
            ((p, q, r, s), right.excited(r, s).unwrap()),
            ((r, s, p, q), right.excited(p, q).unwrap()),
        ];
        let left = bridges[0].1.excited(p, q).unwrap();
        assert_eq!(bridges[1].1.excited(r, s).as_ref(), Some(&left));

        let values = bridges
            .iter()
            .map(|&((p, q, r, s), ref bridge)| {
                let key = TwoElectronKey {
                    left: OneElectronKey::classify(p, q, &left, bridge).unwrap(),
                    right: OneElectronKey::classify(r, s, bridge, &right).unwrap(),
                };
                let phase = excitation::two_electron_phase((p, q, r, s), bridge, &right);
                let table = engine.two_electron(&key, &pair).unwrap();
                (sign(phase), table)
            })
            .collect::<Vec<_>>();

        for i in 0..2 {
            let bra = expand(&left, &spin_functions.spin_function(4, i).unwrap());
            for j in 0..2 {
                let ket = expand(&right, &spin_functions.spin_function(4, j).unwrap());
                let full = overlap(&bra, &excite(&excite(&ket, r, s), p, q));
                for (sign, table) in &values {
                    assert_relative_eq!(sign * table[&(i, j)], full, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn independent_of_thread_count() {
        let wave_function = random_space(37, 6, 6, 0, 40);
        let (_, reference) = build(&wave_function, 1);
        let (_, threaded) = build(&wave_function, 4);
        assert_eq!(reference, threaded);
    }

    fn assert_same_coefficients(a: &CouplingCoefficients, b: &CouplingCoefficients) {
        assert_eq!(a.n_coefficients(), b.n_coefficients());
        let pairs = a
            .one_electron
            .iter()
            .map(|(key, table)| (table, &b.one_electron[key]))
            .chain(
                a.two_electron
                    .iter()
                    .map(|(key, table)| (table, &b.two_electron[key])),
            )
            .chain(a.diagonal.iter().map(|(key, table)| (table, &b.diagonal[key])));

        for (table, other) in pairs {
            assert_eq!(table.len(), other.len());
            for (sf_pair, value) in table {
                assert_relative_eq!(*value, other[sf_pair], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn incremental_growth_matches_scratch() {
        let mut rng = StdRng::seed_from_u64(41);
        let mut configurations = testing::complete_active_space(5, 4, 0)
            .unwrap()
            .configurations()
            .to_vec();
        configurations.shuffle(&mut rng);
        let (base, extension) = configurations.split_at(15);

        let mut wave_function = WaveFunction::new(0, 5);
        for configuration in base {
            wave_function
                .push(configuration.clone(), Some(vec![0]))
                .unwrap();
        }

        let config = config(2);
        let spin_functions = *wave_function.spin_functions();
        let mut history = SfPairHistory::new();
        let mut coefficients = CouplingCoefficients::default();

        let mut connections =
            construct_all_connections(&wave_function, &wave_function, &config).unwrap();
        let trial = SfPairs::from_connections(&connections, &wave_function, &wave_function).unwrap();
        extend_coefficients(trial, &mut history, &mut coefficients, &spin_functions, &config)
            .unwrap();

        // more spin functions on the same configurations
        for rank in 0..wave_function.len() {
            let n_open = wave_function.configuration(rank).unwrap().n_open_shells();
            let all = (0..spin_functions.count(n_open)).collect::<Vec<_>>();
            wave_function.add_spin_functions(rank, &all).unwrap();
        }
        let trial = SfPairs::from_connections(&connections, &wave_function, &wave_function).unwrap();
        let added =
            extend_coefficients(trial, &mut history, &mut coefficients, &spin_functions, &config)
                .unwrap();
        assert!(added > 0);

        // more configurations, only the new ones are enumerated
        let new_ranks = extension[..10]
            .iter()
            .map(|configuration| wave_function.push(configuration.clone(), None).unwrap())
            .collect::<Vec<_>>();
        connections.merge(
            construct_connections(&wave_function, &wave_function, &new_ranks, &config).unwrap(),
        );
        let trial = SfPairs::from_connections(&connections, &wave_function, &wave_function).unwrap();
        extend_coefficients(trial.clone(), &mut history, &mut coefficients, &spin_functions, &config)
            .unwrap();

        // nothing left to do
        let added =
            extend_coefficients(trial, &mut history, &mut coefficients, &spin_functions, &config)
                .unwrap();
        assert_eq!(added, 0);

        let (_, scratch) = build(&wave_function, 1);
        assert_same_coefficients(&coefficients, &scratch);
    }

    #[test]
    fn process_outside_layout_aborts() {
        let wave_function = random_space(43, 4, 4, 0, 10);
        let (connections, _) = build(&wave_function, 1);
        let pairs = SfPairs::from_connections(&connections, &wave_function, &wave_function).unwrap();
        let config = GugaConfig {
            process_rank: 2,
            process_count: 2,
            ..Default::default()
        };

        assert_eq!(
            construct_all_coefficients(&pairs, wave_function.spin_functions(), &config),
            Err(GugaError::InvalidWorkerLayout {
                process_rank: 2,
                process_count: 2
            })
        );
    }

    #[test]
    fn invalid_class_aborts_with_its_key() {
        let spin_functions = SpinFunctions::new(1);
        let engine = CouplingEngine::new(&spin_functions);
        let key = OneElectronKey {
            excitation: ExcitationType::SS,
            nue_left: 3,
            nue_right: 3,
            p_rel: 0,
            q_rel: 1,
        };
        let expected = GugaError::InvalidExcitationClass("(2, 3, 3, 0, 1)".to_string());
        assert_eq!(
            engine.one_electron(&key, &SfPair::new([0], [0])),
            Err(expected.clone())
        );

        let mut blocks = SfBlocks::default();
        blocks
            .one_electron
            .insert(key, vec![SfPair::new([0], [0, 1])]);
        assert_eq!(
            construct_coefficients(&blocks, &spin_functions, &config(2)),
            Err(expected.clone())
        );

        let mut history = SfPairHistory::new();
        let mut coefficients = CouplingCoefficients::default();
        let mut trial = SfPairs::default();
        trial.one_electron.insert(key, SfPair::new([0], [0]));
        assert_eq!(
            extend_coefficients(
                trial,
                &mut history,
                &mut coefficients,
                &spin_functions,
                &config(1)
            ),
            Err(expected)
        );
        assert!(history.seen().is_empty());
        assert!(coefficients.is_empty());
    }
}
