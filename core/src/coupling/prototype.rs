use crate::{
    configuration::Configuration,
    error::GugaError,
    excitation::{ExcitationType, OneElectronKey},
};

/// Smallest pair of configurations realizing a one-electron class: only the open
/// shells and the two orbitals the electron moves between survive. Their spin
/// functions are the ones of the real configurations, so the recoupling matrix of
/// the prototype is the one of every connection in the class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Prototype {
    pub left: Configuration,
    pub right: Configuration,
    pub p: usize,
    pub q: usize,
}

impl Prototype {
    pub fn one_electron(key: &OneElectronKey) -> Result<Self, GugaError> {
        let invalid = || GugaError::InvalidExcitationClass(key.to_string());
        let OneElectronKey {
            excitation,
            nue_left,
            nue_right,
            p_rel,
            q_rel,
        } = *key;

        let consistent = match excitation {
            ExcitationType::DS => nue_left == nue_right && p_rel < nue_right && q_rel <= nue_right,
            ExcitationType::DV => {
                nue_left == nue_right + 2 && p_rel < nue_left && q_rel < nue_left && p_rel != q_rel
            }
            ExcitationType::SS => {
                nue_right >= 2
                    && nue_left == nue_right - 2
                    && p_rel < nue_right
                    && q_rel < nue_right
                    && p_rel != q_rel
            }
            ExcitationType::SV => nue_left == nue_right && p_rel <= nue_right && q_rel < nue_right,
        };
        if !consistent {
            return Err(invalid());
        }

        let n = match excitation {
            ExcitationType::DS | ExcitationType::SV => nue_right + 1,
            ExcitationType::DV => nue_left,
            ExcitationType::SS => nue_right,
        };
        let mut left = vec![1; n];
        let mut right = vec![1; n];

        let (p, q) = match excitation {
            ExcitationType::DS => {
                // q is closed on the right, so it is not among the relative positions
                let p = if p_rel >= q_rel { p_rel + 1 } else { p_rel };
                left[p] = 2;
                right[q_rel] = 2;
                (p, q_rel)
            }
            ExcitationType::DV => {
                right[p_rel] = 0;
                right[q_rel] = 2;
                (p_rel, q_rel)
            }
            ExcitationType::SS => {
                left[p_rel] = 2;
                left[q_rel] = 0;
                (p_rel, q_rel)
            }
            ExcitationType::SV => {
                let (p, q) = if p_rel > q_rel {
                    (p_rel, q_rel)
                } else {
                    (p_rel, q_rel + 1)
                };
                left[q] = 0;
                right[p] = 0;
                (p, q)
            }
        };

        Ok(Self {
            left: Configuration::from_occupations(&left)?,
            right: Configuration::from_occupations(&right)?,
            p,
            q,
        })
    }
}
