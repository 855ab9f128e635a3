//! Matrix elements of `E_pq` between CSFs from a simultaneous walk over their
//! Shavitt graphs.
//!
//! Every orbital between `p` and `q` contributes a segment value that depends on
//! the step pair of the two paths, the spin difference `ΔB` entering the orbital
//! and the doubled spin `b` the right path reaches. Outside that range the paths
//! have to coincide. Segment values are the ones of the Gelfand-Tsetlin basis,
//! a genealogical CSF differs from it by the sign of its (down, up) coupling
//! pairs. Closed shells between `p` and `q` never show up here, their sign is
//! the phase carried by connection records.

use nalgebra::DMatrix;
use smallvec::SmallVec;

use crate::{
    configuration::Configuration,
    spin::{Coupling, SpinFunction},
};

use super::prototype::Prototype;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Empty,
    Up,
    Down,
    Double,
}

/// Path of one CSF through the Shavitt graph.
#[derive(Clone, Debug)]
struct Walk {
    steps: SmallVec<[Step; 32]>,
    /// doubled spin after each orbital
    b: SmallVec<[i32; 32]>,
    /// odd number of (down, up) coupling pairs
    odd: bool,
}

impl Walk {
    /// `None` if `spin_function` doesn't couple the open shells of `configuration`.
    fn new(configuration: &Configuration, spin_function: &SpinFunction) -> Option<Self> {
        if configuration.n_open_shells() != spin_function.len() {
            return None;
        }

        let mut couplings = spin_function.couplings().iter();
        let mut steps = SmallVec::with_capacity(configuration.len());
        let mut b = SmallVec::with_capacity(configuration.len());
        let mut spin = 0;
        for &occupation in configuration.occupations() {
            let step = match occupation {
                0 => Step::Empty,
                2 => Step::Double,
                _ => match couplings.next()? {
                    Coupling::Up => {
                        spin += 1;
                        Step::Up
                    }
                    Coupling::Down => {
                        spin -= 1;
                        Step::Down
                    }
                },
            };
            steps.push(step);
            b.push(spin);
        }

        let mut ups_after = 0;
        let mut pairs = 0;
        for coupling in spin_function.couplings().iter().rev() {
            match coupling {
                Coupling::Up => ups_after += 1,
                Coupling::Down => pairs += ups_after,
            }
        }

        Some(Self {
            steps,
            b,
            odd: pairs % 2 == 1,
        })
    }
}

fn a(b: i32, x: i32, y: i32) -> f64 {
    (f64::from(b + x) / f64::from(b + y)).sqrt()
}

fn c(b: i32, x: i32) -> f64 {
    f64::from((b + x - 1) * (b + x + 1)).sqrt() / f64::from(b + x)
}

/// `<left|E_low,high|right>` for `low < high` in the Gelfand-Tsetlin basis. Only
/// open shells may sit strictly between `low` and `high`.
fn raising(left: &Walk, right: &Walk, low: usize, high: usize) -> f64 {
    use Step::*;

    let n = right.steps.len();
    if (0..low)
        .chain(high + 1..n)
        .any(|k| left.steps[k] != right.steps[k])
        || left.b[high] != right.b[high]
    {
        return 0.0;
    }

    let mut value = 1.0;
    for k in low..=high {
        let b = right.b[k];
        let pair = (left.steps[k], right.steps[k]);
        let segment = if k == low {
            match pair {
                (Up | Down, Empty) => 1.0,
                (Double, Up) => a(b, 1, 0),
                (Double, Down) => a(b, 1, 2),
                _ => 0.0,
            }
        } else if k == high {
            match pair {
                (Empty, Up | Down) => 1.0,
                (Up, Double) => a(b, 0, 1),
                (Down, Double) => a(b, 2, 1),
                _ => 0.0,
            }
        } else {
            match (left.b[k - 1] - right.b[k - 1], pair) {
                (-1, (Up, Up)) => c(b, 0),
                (-1, (Down, Down)) => -1.0,
                (-1, (Up, Down)) => -1.0 / f64::from(b + 2),
                (1, (Up, Up)) => -1.0,
                (1, (Down, Down)) => c(b, 2),
                (1, (Down, Up)) => 1.0 / f64::from(b),
                _ => 0.0,
            }
        };

        if segment == 0.0 {
            return 0.0;
        }
        value *= segment;
    }
    value
}

/// `<L_i|E_pq|R_j>` on a prototype, rows following `left`, columns `right`.
pub(crate) fn excitation_matrix(
    prototype: &Prototype,
    left: &[SpinFunction],
    right: &[SpinFunction],
) -> DMatrix<f64> {
    let bras = left
        .iter()
        .map(|spin_function| Walk::new(&prototype.left, spin_function))
        .collect::<Vec<_>>();
    let kets = right
        .iter()
        .map(|spin_function| Walk::new(&prototype.right, spin_function))
        .collect::<Vec<_>>();
    let (p, q) = (prototype.p, prototype.q);

    let matrix = DMatrix::from_fn(bras.len(), kets.len(), |i, j| {
        let (Some(bra), Some(ket)) = (&bras[i], &kets[j]) else {
            return 0.0;
        };
        // E_pq with p > q is the transpose of E_qp
        let value = if p < q {
            raising(bra, ket, p, q)
        } else {
            raising(ket, bra, q, p)
        };
        if bra.odd != ket.odd {
            -value
        } else {
            value
        }
    });

    log::trace!(
        "E_{}{} between {} and {}: {matrix}",
        prototype.p,
        prototype.q,
        prototype.left,
        prototype.right
    );
    matrix
}
