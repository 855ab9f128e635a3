//! Determinant expansions of CSFs, used to check coupling coefficients by
//! brute force.
//!
//! A CSF is the genealogical coupling of its open shells in orbital order with
//! `M = S`. Determinants store the alpha string before the beta string, closed
//! shells occupy both. Going from the orbital-interleaved product to that order
//! contributes the sign of the (beta, alpha) pairs among the open shells.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::{
    configuration::Configuration,
    spin::{Coupling, SpinFunction},
};

/// Occupied spin orbitals as `(alpha, beta)` bit masks.
pub type Determinant = (u64, u64);

pub type Expansion = BTreeMap<Determinant, f64>;

/// Determinant expansion of the CSF given by `configuration` and `spin_function`.
pub fn expand(configuration: &Configuration, spin_function: &SpinFunction) -> Expansion {
    let mut closed = 0u64;
    let mut open = SmallVec::<[usize; 16]>::new();
    for (orbital, &occupation) in configuration.occupations().iter().enumerate() {
        match occupation {
            2 => closed |= 1 << orbital,
            1 => open.push(orbital),
            _ => {}
        }
    }

    let mut expansion = Expansion::new();
    if open.len() != spin_function.len() {
        return expansion;
    }

    let mut alpha = SmallVec::<[bool; 16]>::new();
    let mut terms = Vec::new();
    couple(spin_function.couplings(), 0, 0, 1.0, &mut alpha, &mut terms);

    for (alpha, coefficient) in terms {
        let mut determinant = (closed, closed);
        let mut swaps = 0;
        let mut betas_before = 0;
        for (&orbital, &is_alpha) in open.iter().zip(&alpha) {
            if is_alpha {
                determinant.0 |= 1 << orbital;
                swaps += betas_before;
            } else {
                determinant.1 |= 1 << orbital;
                betas_before += 1;
            }
        }

        let sign = if swaps % 2 == 0 { 1.0 } else { -1.0 };
        *expansion.entry(determinant).or_default() += sign * coefficient;
    }
    expansion
}

/// Walks every alpha/beta assignment of the remaining open shells, multiplying
/// the Clebsch-Gordan coefficient of each step. `b` and `m` are the doubled
/// running spin and projection.
fn couple(
    couplings: &[Coupling],
    b: i32,
    m: i32,
    coefficient: f64,
    alpha: &mut SmallVec<[bool; 16]>,
    terms: &mut Vec<(SmallVec<[bool; 16]>, f64)>,
) {
    let Some((&coupling, rest)) = couplings.split_first() else {
        if m == b {
            terms.push((alpha.clone(), coefficient));
        }
        return;
    };

    for is_alpha in [true, false] {
        let m_next = if is_alpha { m + 1 } else { m - 1 };
        let denominator = f64::from(2 * (b + 1));
        let (b_next, factor) = match (coupling, is_alpha) {
            (Coupling::Up, true) => (b + 1, (f64::from(b + m_next + 1) / denominator).sqrt()),
            (Coupling::Up, false) => (b + 1, (f64::from(b - m_next + 1) / denominator).sqrt()),
            (Coupling::Down, true) => (b - 1, -(f64::from(b - m_next + 1) / denominator).sqrt()),
            (Coupling::Down, false) => (b - 1, (f64::from(b + m_next + 1) / denominator).sqrt()),
        };
        if b_next < 0 || m_next.abs() > b_next || factor == 0.0 {
            continue;
        }

        alpha.push(is_alpha);
        couple(rest, b_next, m_next, coefficient * factor, alpha, terms);
        alpha.pop();
    }
}

/// Moves one electron of a spin string from `q` to `p`, returning the new string
/// and whether the move picked up a fermionic sign.
fn move_electron(string: u64, p: usize, q: usize) -> Option<(u64, bool)> {
    if string & (1 << q) == 0 {
        return None;
    }
    let removed = string & !(1 << q);
    if removed & (1 << p) != 0 {
        return None;
    }

    let below = |string: u64, orbital: usize| (string & ((1 << orbital) - 1)).count_ones();
    let odd = (below(string, q) + below(removed, p)) % 2 == 1;
    Some((removed | (1 << p), odd))
}

/// `E_pq = sum over spins of a+_p a_q` applied to an expansion.
pub fn excite(expansion: &Expansion, p: usize, q: usize) -> Expansion {
    let mut excited = Expansion::new();
    for (&(alpha, beta), &coefficient) in expansion {
        if let Some((alpha, odd)) = move_electron(alpha, p, q) {
            let sign = if odd { -1.0 } else { 1.0 };
            *excited.entry((alpha, beta)).or_default() += sign * coefficient;
        }
        if let Some((beta, odd)) = move_electron(beta, p, q) {
            let sign = if odd { -1.0 } else { 1.0 };
            *excited.entry((alpha, beta)).or_default() += sign * coefficient;
        }
    }
    excited
}

pub fn overlap(bra: &Expansion, ket: &Expansion) -> f64 {
    bra.iter()
        .filter_map(|(determinant, &coefficient)| {
            ket.get(determinant).map(|&other| coefficient * other)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::{excite, expand, overlap};
    use crate::{
        configuration::Configuration,
        spin::{SpinFunction, SpinFunctions},
    };

    fn cfg(s: &str) -> Configuration {
        s.parse().unwrap()
    }

    fn sf(s: &str) -> SpinFunction {
        s.parse().unwrap()
    }

    #[test]
    fn csfs_are_orthonormal() {
        for (configuration, two_s) in [("1111", 0), ("211101", 2), ("11111", 1), ("12111", 2)] {
            let configuration = cfg(configuration);
            let spin_functions = SpinFunctions::new(two_s);
            let expansions = spin_functions
                .iter(configuration.n_open_shells())
                .map(|spin_function| expand(&configuration, &spin_function))
                .collect::<Vec<_>>();
            assert!(!expansions.is_empty());

            for (i, a) in expansions.iter().enumerate() {
                for (j, b) in expansions.iter().enumerate() {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert_relative_eq!(overlap(a, b), expected, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn closed_shell_to_open_singlet() {
        let singlet = expand(&cfg("11"), &sf("+-"));
        let closed = expand(&cfg("20"), &sf(""));
        assert_relative_eq!(overlap(&singlet, &excite(&closed, 1, 0)), 2f64.sqrt());

        // E_10 E_01 on the closed shell counts its two electrons
        let back = excite(&excite(&closed, 1, 0), 0, 1);
        assert_relative_eq!(overlap(&closed, &back), 2.0);
    }

    #[test]
    fn number_operator_is_diagonal() {
        let configuration = cfg("2112");
        let spin_functions = SpinFunctions::new(0);
        for spin_function in spin_functions.iter(2) {
            let csf = expand(&configuration, &spin_function);
            for (orbital, &occupation) in configuration.occupations().iter().enumerate() {
                assert_relative_eq!(
                    overlap(&csf, &excite(&csf, orbital, orbital)),
                    occupation as f64,
                    epsilon = 1e-12
                );
            }
        }
    }
}
