use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::GugaError;

/// How one open shell couples to the spin accumulated by the open shells before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Coupling {
    /// `+`, raises the running spin by 1/2
    Up,
    /// `-`, lowers the running spin by 1/2
    Down,
}

/// A genealogical spin function: one [`Coupling`] per open shell, in orbital order.
/// The running (doubled) spin never drops below zero.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SpinFunction(SmallVec<[Coupling; 16]>);

impl SpinFunction {
    pub fn couplings(&self) -> &[Coupling] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Doubled total spin, i.e. the running spin after the last open shell.
    /// `None` if the running spin goes negative somewhere.
    pub fn two_s(&self) -> Option<usize> {
        self.0.iter().try_fold(0usize, |b, coupling| match coupling {
            Coupling::Up => Some(b + 1),
            Coupling::Down => b.checked_sub(1),
        })
    }
}

impl FromStr for SpinFunction {
    type Err = GugaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let couplings = s
            .chars()
            .map(|c| match c {
                '+' => Ok(Coupling::Up),
                '-' => Ok(Coupling::Down),
                _ => Err(GugaError::InvalidSpinFunctionString(s.to_string())),
            })
            .collect::<Result<SmallVec<_>, _>>()?;
        Ok(Self(couplings))
    }
}

impl fmt::Display for SpinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for coupling in &self.0 {
            let c = match coupling {
                Coupling::Up => '+',
                Coupling::Down => '-',
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for SpinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpinFunction({self})")
    }
}

/// Read-only lookup of spin functions by open-shell count and index. Everything
/// that needs to turn a CSF index into a spin coupling gets one of these passed in.
pub trait SpinFunctionSource: Sync {
    /// Number of spin functions for `n_open` open shells
    fn count(&self, n_open: usize) -> usize;

    fn spin_function(&self, n_open: usize, index: usize) -> Option<SpinFunction>;

    fn resolve(&self, n_open: usize, index: usize) -> Result<SpinFunction, GugaError> {
        self.spin_function(n_open, index)
            .ok_or_else(|| GugaError::InvalidSpinFunction {
                n_open,
                index,
                available: self.count(n_open),
            })
    }
}

/// All spin functions of a fixed total spin, ranked lexicographically with `+`
/// before `-`. Ranks are computed from path counts, nothing is tabulated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpinFunctions {
    two_s: usize,
}

impl SpinFunctions {
    pub fn new(two_s: usize) -> Self {
        Self { two_s }
    }

    pub fn from_spin(spin: f64) -> Result<Self, GugaError> {
        doubled_spin(spin).map(Self::new)
    }

    pub fn two_s(&self) -> usize {
        self.two_s
    }

    /// Rank of a spin function within its table, `None` if it has the wrong total
    /// spin or isn't a valid coupling.
    pub fn index_of(&self, spin_function: &SpinFunction) -> Option<usize> {
        if spin_function.two_s() != Some(self.two_s) {
            return None;
        }

        let n = spin_function.len();
        let mut b = 0;
        let mut index = 0;
        for (k, coupling) in spin_function.couplings().iter().enumerate() {
            match coupling {
                Coupling::Up => b += 1,
                Coupling::Down => {
                    index += completions(n - k - 1, b + 1, self.two_s);
                    b -= 1;
                }
            }
        }
        Some(index)
    }

    pub fn iter(&self, n_open: usize) -> impl Iterator<Item = SpinFunction> + '_ {
        (0..self.count(n_open)).filter_map(move |index| self.spin_function(n_open, index))
    }
}

impl SpinFunctionSource for SpinFunctions {
    fn count(&self, n_open: usize) -> usize {
        num_spin_functions(n_open, self.two_s)
    }

    fn spin_function(&self, n_open: usize, index: usize) -> Option<SpinFunction> {
        if index >= self.count(n_open) {
            return None;
        }

        let mut remaining = index;
        let mut b = 0;
        let mut couplings = SmallVec::with_capacity(n_open);
        for k in 0..n_open {
            let with_up = completions(n_open - k - 1, b + 1, self.two_s);
            if remaining < with_up {
                couplings.push(Coupling::Up);
                b += 1;
            } else {
                remaining -= with_up;
                couplings.push(Coupling::Down);
                b -= 1;
            }
        }
        Some(SpinFunction(couplings))
    }
}

/// Number of spin functions with doubled spin `two_s` for `n_open` open shells.
pub fn num_spin_functions(n_open: usize, two_s: usize) -> usize {
    completions(n_open, 0, two_s)
}

/// Converts a spin quantum number to twice its value.
pub fn doubled_spin(spin: f64) -> Result<usize, GugaError> {
    let doubled = 2.0 * spin;
    if !doubled.is_finite() || doubled < 0.0 || (doubled - doubled.round()).abs() > 1e-8 {
        return Err(GugaError::InvalidSpin(spin));
    }
    Ok(doubled.round() as usize)
}

/// Number of coupling paths of `steps` steps that lead from running spin `from`
/// to `to` without going negative (reflection principle).
fn completions(steps: usize, from: usize, to: usize) -> usize {
    let unrestricted = |from: isize, to: isize| -> usize {
        let distance = (to - from).unsigned_abs();
        let steps_i = steps as isize;
        if distance > steps || (steps_i + to - from) % 2 != 0 {
            return 0;
        }
        binomial(steps, ((steps_i + to - from) / 2) as usize)
    };

    let (from, to) = (from as isize, to as isize);
    unrestricted(from, to) - unrestricted(from, -to - 2)
}

fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut value: u128 = 1;
    for i in 0..k {
        value = value * (n - i) as u128 / (i + 1) as u128;
    }
    value as usize
}
