use crate::{
    configuration::Configuration,
    error::GugaError,
    excitation::{
        self, DiagonalConnection, OneElectronConnection, OneElectronKey, TwoElectronConnection,
        TwoElectronKey,
    },
    index::{ConfigurationIndex, NodeId},
};

use super::{
    templates::{Generator, Template, TEMPLATES},
    Connections,
};

/// Finds every left configuration reachable from one right configuration.
pub(crate) struct Enumerator<'a> {
    index: &'a ConfigurationIndex,
    right: &'a Configuration,
    right_rank: usize,
    min_nue: usize,
}

impl<'a> Enumerator<'a> {
    pub fn new(
        index: &'a ConfigurationIndex,
        right: &'a Configuration,
        right_rank: usize,
        min_nue: usize,
    ) -> Self {
        Self {
            index,
            right,
            right_rank,
            min_nue,
        }
    }

    pub fn run(&self, sink: &mut Connections) -> Result<(), GugaError> {
        self.diagonal(sink)?;
        for template in TEMPLATES {
            self.walk(template, sink)?;
        }
        Ok(())
    }

    fn n_orbitals(&self) -> usize {
        self.right.len()
    }

    /// `E_pq E_qp`: out to a bridge and straight back, so no left lookup is needed.
    fn diagonal(&self, sink: &mut Connections) -> Result<(), GugaError> {
        let n = self.n_orbitals();
        for p in 0..n {
            if self.right[p] == 0 {
                continue;
            }
            for q in (0..n).filter(|&q| q != p) {
                let Some(bridge) = self.right.excited(q, p) else {
                    continue;
                };
                if bridge.n_open_shells() < self.min_nue {
                    continue;
                }

                let key = OneElectronKey::classify(q, p, &bridge, self.right)?;
                sink.diagonal.entry(key).or_default().push(DiagonalConnection {
                    right: self.right_rank,
                    pqqp: excitation::pack_pqrs(p, q, q, p, n),
                });
            }
        }
        Ok(())
    }

    fn walk(&self, template: &Template, sink: &mut Connections) -> Result<(), GugaError> {
        let operator = template.operators[0];
        let mut orbitals = [0; 4];

        for orbital in 0..self.n_orbitals() {
            if operator.is_blocked(self.right[orbital]) {
                continue;
            }

            let mut configuration = self.right.clone();
            operator.apply(&mut configuration, orbital);

            let Some(node) = self.index.search_from_root(orbital + 1, &configuration) else {
                continue;
            };

            orbitals[0] = orbital;
            self.descend(template, 1, &configuration, node, &mut orbitals, sink)?;
        }
        Ok(())
    }

    /// Places operator `level` on every orbital after the previous one. `node`
    /// matches `configuration` up to and including the previous orbital.
    fn descend(
        &self,
        template: &Template,
        level: usize,
        configuration: &Configuration,
        mut node: NodeId,
        orbitals: &mut [usize; 4],
        sink: &mut Connections,
    ) -> Result<(), GugaError> {
        let operator = template.operators[level];
        let is_last = level + 1 == template.operators.len();
        let start = orbitals[level - 1] + 1;

        for orbital in start..self.n_orbitals() {
            if orbital > start {
                match self.index.increment_node(orbital - 1, configuration, node) {
                    Some(next) => node = next,
                    None => break,
                }
            }

            if operator.is_blocked(configuration[orbital]) {
                continue;
            }

            let mut next = configuration.clone();
            operator.apply(&mut next, orbital);
            orbitals[level] = orbital;

            if is_last {
                let Some(left_rank) = self.index.find_position(orbital, &next, node) else {
                    continue;
                };
                if left_rank > self.right_rank {
                    continue;
                }
                self.emit(template, &orbitals[..=level], &next, left_rank, sink)?;
            } else {
                let Some(child) = self.index.increment_node(orbital, &next, node) else {
                    continue;
                };
                self.descend(template, level + 1, &next, child, orbitals, sink)?;
            }
        }
        Ok(())
    }

    fn emit(
        &self,
        template: &Template,
        orbitals: &[usize],
        left: &Configuration,
        left_rank: usize,
        sink: &mut Connections,
    ) -> Result<(), GugaError> {
        if left.n_open_shells() < self.min_nue {
            return Ok(());
        }
        let n = self.n_orbitals();

        if template.generator == Generator::Epq {
            let (p, q) = template.one_electron_indices(orbitals);
            let key = OneElectronKey::classify(p, q, left, self.right)?;
            let record = OneElectronConnection {
                left: left_rank,
                right: self.right_rank,
                pq: excitation::pack_pq(p, q, n),
                phase: self.right.phase_between(p, q),
            };

            log::trace!("E_{p}{q}: {left} <- {} in class {key}", self.right);
            sink.one_electron.entry(key).or_default().push(record);
            return Ok(());
        }

        for (p, q, r, s) in template.two_electron_indices(orbitals) {
            let Some(bridge) = self.right.excited(r, s) else {
                continue;
            };
            if bridge.n_open_shells() < self.min_nue {
                continue;
            }

            let key = TwoElectronKey {
                left: OneElectronKey::classify(p, q, left, &bridge)?,
                right: OneElectronKey::classify(r, s, &bridge, self.right)?,
            };
            let record = TwoElectronConnection {
                left: left_rank,
                right: self.right_rank,
                pqrs: excitation::pack_pqrs(p, q, r, s, n),
                phase: excitation::two_electron_phase((p, q, r, s), &bridge, self.right),
                doubled: template.generator.doubled(),
            };

            log::trace!(
                "E_{p}{q} E_{r}{s}: {left} <- {bridge} <- {} in class {key}",
                self.right
            );
            sink.two_electron.entry(key).or_default().push(record);
        }
        Ok(())
    }
}
