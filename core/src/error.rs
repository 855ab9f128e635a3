use thiserror::Error;

/// Everything that can go fatally wrong while building connections or coupling
/// coefficients. Lookups that simply miss (a configuration that isn't part of the
/// wave function, a truncated intermediate) are not errors and never show up here.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GugaError {
    #[error("orbitals p={p} (occupation {p_occupation}) and q={q} (occupation {q_occupation}) don't form a known elementary transition")]
    UnknownTransition {
        p: usize,
        q: usize,
        p_occupation: u8,
        q_occupation: u8,
    },
    #[error("excitation class {0} can't be realized by a prototype")]
    InvalidExcitationClass(String),
    #[error("configuration rank {rank} is out of range ({n_configurations} configurations)")]
    UnknownConfiguration {
        rank: usize,
        n_configurations: usize,
    },
    #[error("spin function {index} doesn't exist for {n_open} open shells ({available} available)")]
    InvalidSpinFunction {
        n_open: usize,
        index: usize,
        available: usize,
    },
    #[error("invalid occupation string: {0}")]
    InvalidOccupation(String),
    #[error("invalid spin function string: {0}, expected only '+' and '-'")]
    InvalidSpinFunctionString(String),
    #[error("expected {expected} orbitals, found {found}")]
    OrbitalCountMismatch { expected: usize, found: usize },
    #[error("expected {expected} electrons, found {found}")]
    ElectronCountMismatch { expected: usize, found: usize },
    #[error("configuration {0} is already part of the wave function")]
    DuplicateConfiguration(String),
    #[error("process rank {process_rank} is not among the {process_count} cooperating processes")]
    InvalidWorkerLayout {
        process_rank: usize,
        process_count: usize,
    },
    #[error("spin quantum number must be a non-negative multiple of 1/2, got {0}")]
    InvalidSpin(f64),
}
