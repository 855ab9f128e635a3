use smallvec::{smallvec, SmallVec};

use crate::configuration::Operator::{
    self, Annihilate, AnnihilateCreate, Create, CreateAnnihilate, DoubleAnnihilate, DoubleCreate,
};

/// The generator (product) an operator string realizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Generator {
    Epq,
    EpqEqr,
    EpqErp,
    EpqEpq,
    EpqEpr,
    EpqErq,
    EpqErs,
}

impl Generator {
    /// Whether the integral of connections of this generator enters with weight 1
    /// rather than 1/2.
    pub fn doubled(self) -> bool {
        matches!(
            self,
            Generator::EpqEpr | Generator::EpqErq | Generator::EpqErs
        )
    }
}

/// An operator string applied to strictly increasing orbital indices of a right
/// configuration.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Template {
    pub generator: Generator,
    pub operators: &'static [Operator],
}

macro_rules! templates {
    ($($generator:ident: [$($operator:ident),+]),* $(,)?) => {
        &[$(Template {
            generator: Generator::$generator,
            operators: &[$($operator),+],
        }),*]
    };
}

/// Every template walked for a right configuration. `E_pq E_qp` is handled
/// separately since it never leaves the right configuration.
pub(crate) const TEMPLATES: &[Template] = templates![
    Epq: [Annihilate, Create],
    Epq: [Create, Annihilate],

    EpqEqr: [CreateAnnihilate, Annihilate, Create],
    EpqEqr: [CreateAnnihilate, Create, Annihilate],
    EpqEqr: [Annihilate, CreateAnnihilate, Create],
    EpqEqr: [Create, CreateAnnihilate, Annihilate],
    EpqEqr: [Annihilate, Create, CreateAnnihilate],
    EpqEqr: [Create, Annihilate, CreateAnnihilate],

    EpqErp: [AnnihilateCreate, Annihilate, Create],
    EpqErp: [AnnihilateCreate, Create, Annihilate],
    EpqErp: [Annihilate, AnnihilateCreate, Create],
    EpqErp: [Create, AnnihilateCreate, Annihilate],
    EpqErp: [Annihilate, Create, AnnihilateCreate],
    EpqErp: [Create, Annihilate, AnnihilateCreate],

    EpqEpq: [DoubleAnnihilate, DoubleCreate],
    EpqEpq: [DoubleCreate, DoubleAnnihilate],

    EpqEpr: [DoubleCreate, Annihilate, Annihilate],
    EpqEpr: [Annihilate, DoubleCreate, Annihilate],
    EpqEpr: [Annihilate, Annihilate, DoubleCreate],

    EpqErq: [Create, Create, DoubleAnnihilate],
    EpqErq: [Create, DoubleAnnihilate, Create],
    EpqErq: [DoubleAnnihilate, Create, Create],

    EpqErs: [Create, Annihilate, Create, Annihilate],
    EpqErs: [Create, Create, Annihilate, Annihilate],
    EpqErs: [Create, Annihilate, Annihilate, Create],
    EpqErs: [Annihilate, Create, Create, Annihilate],
    EpqErs: [Annihilate, Annihilate, Create, Create],
    EpqErs: [Annihilate, Create, Annihilate, Create],
];

/// Orbitals of a matched template, sorted by role and kept in increasing order
/// within each role.
struct Roles {
    created: SmallVec<[usize; 2]>,
    annihilated: SmallVec<[usize; 2]>,
    shared: Option<usize>,
}

impl Template {
    fn roles(&self, orbitals: &[usize]) -> Roles {
        let mut roles = Roles {
            created: SmallVec::new(),
            annihilated: SmallVec::new(),
            shared: None,
        };
        for (&operator, &orbital) in self.operators.iter().zip(orbitals) {
            match operator {
                Create | DoubleCreate => roles.created.push(orbital),
                Annihilate | DoubleAnnihilate => roles.annihilated.push(orbital),
                CreateAnnihilate | AnnihilateCreate => roles.shared = Some(orbital),
            }
        }
        roles
    }

    /// `(p, q)` of a one-electron template.
    pub fn one_electron_indices(&self, orbitals: &[usize]) -> (usize, usize) {
        let roles = self.roles(orbitals);
        (roles.created[0], roles.annihilated[0])
    }

    /// Canonical `(p, q, r, s)` of `E_pq E_rs` for every way the matched orbitals
    /// can be reached. Only `E_pq E_rs` with four distinct orbitals has two: through
    /// `E_rs` and through `E_rq`.
    pub fn two_electron_indices(
        &self,
        orbitals: &[usize],
    ) -> SmallVec<[(usize, usize, usize, usize); 2]> {
        let Roles {
            created: c,
            annihilated: a,
            shared,
        } = self.roles(orbitals);
        let shared = shared.unwrap_or_default();

        match self.generator {
            Generator::Epq => smallvec![],
            Generator::EpqEqr => smallvec![(c[0], shared, shared, a[0])],
            Generator::EpqErp => smallvec![(shared, a[0], c[0], shared)],
            Generator::EpqEpq => smallvec![(c[0], a[0], c[0], a[0])],
            Generator::EpqEpr => smallvec![(c[0], a[0], c[0], a[1])],
            Generator::EpqErq => smallvec![(c[0], a[0], c[1], a[0])],
            Generator::EpqErs => smallvec![(c[0], a[0], c[1], a[1]), (c[0], a[1], c[1], a[0])],
        }
    }
}
