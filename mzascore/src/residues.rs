//! Amino acid residue masses and the small neutral molecules that make up fragment ion termini
use std::fmt::Display;
use std::str::FromStr;

use num_traits::Float;

use crate::params::ParameterError;

#[doc(inline)]
pub use chemical_elements::PROTON;

pub(crate) fn isclose<T: Float>(a: T, b: T, delta: T) -> bool {
    (a - b).abs() < delta
}

/// Which mass of a residue or modification is in effect for a scoring run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MassType {
    #[default]
    Monoisotopic,
    Average,
}

impl FromStr for MassType {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monoisotopic" | "mono" => Ok(Self::Monoisotopic),
            "average" | "avg" => Ok(Self::Average),
            _ => Err(ParameterError::UnknownMassType(s.to_string())),
        }
    }
}

impl Display for MassType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MassType::Monoisotopic => f.write_str("monoisotopic"),
            MassType::Average => f.write_str("average"),
        }
    }
}

/// A monoisotopic and average mass for the same chemical entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassPair {
    pub monoisotopic: f64,
    pub average: f64,
}

impl MassPair {
    pub const fn new(monoisotopic: f64, average: f64) -> Self {
        Self {
            monoisotopic,
            average,
        }
    }

    #[inline]
    pub fn get(&self, mass_type: MassType) -> f64 {
        match mass_type {
            MassType::Monoisotopic => self.monoisotopic,
            MassType::Average => self.average,
        }
    }
}

pub const WATER: MassPair = MassPair::new(18.0105646837, 18.01528);
pub const AMMONIA: MassPair = MassPair::new(17.0265491015, 17.03052);
pub const HYDROGEN: MassPair = MassPair::new(1.00782503207, 1.00794);

/// The residue (amino acid minus water) masses of the standard and the two
/// non-standard genetically encoded amino acids, keyed by one letter code.
pub fn residue_masses(residue: char) -> Option<MassPair> {
    let pair = match residue {
        'G' => MassPair::new(57.02146372, 57.05132),
        'A' => MassPair::new(71.03711379, 71.0779),
        'S' => MassPair::new(87.03202841, 87.0773),
        'P' => MassPair::new(97.05276385, 97.11518),
        'V' => MassPair::new(99.06841391, 99.13106),
        'T' => MassPair::new(101.04767847, 101.10388),
        'C' => MassPair::new(103.00918478, 103.1429),
        'L' | 'I' => MassPair::new(113.08406398, 113.15764),
        'N' => MassPair::new(114.04292744, 114.10264),
        'D' => MassPair::new(115.02694303, 115.0874),
        'Q' => MassPair::new(128.05857751, 128.12922),
        'K' => MassPair::new(128.09496302, 128.17228),
        'E' => MassPair::new(129.04259309, 129.11398),
        'M' => MassPair::new(131.04048491, 131.19606),
        'H' => MassPair::new(137.05891186, 137.13928),
        'F' => MassPair::new(147.06841391, 147.17386),
        'U' => MassPair::new(150.95363559, 150.0379),
        'R' => MassPair::new(156.10111103, 156.18568),
        'Y' => MassPair::new(163.06332853, 163.17326),
        'W' => MassPair::new(186.07931295, 186.2099),
        'O' => MassPair::new(237.14772677, 237.29816),
        _ => return None,
    };
    Some(pair)
}

/// The residue mass of `residue` under `mass_type`, if it is a known amino acid
#[inline]
pub fn residue_mass(residue: char, mass_type: MassType) -> Option<f64> {
    residue_masses(residue).map(|m| m.get(mass_type))
}

#[inline]
pub fn is_residue(residue: char) -> bool {
    residue_masses(residue).is_some()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mass_type_parse() {
        assert_eq!("Monoisotopic".parse::<MassType>().unwrap(), MassType::Monoisotopic);
        assert_eq!("avg".parse::<MassType>().unwrap(), MassType::Average);
        assert!(matches!(
            "heaviest".parse::<MassType>(),
            Err(ParameterError::UnknownMassType(_))
        ));
    }

    #[test]
    fn test_residue_lookup() {
        assert!(isclose(
            residue_mass('S', MassType::Monoisotopic).unwrap(),
            87.03203,
            1e-4
        ));
        assert_eq!(residue_mass('I', MassType::Average), residue_mass('L', MassType::Average));
        assert!(residue_mass('B', MassType::Monoisotopic).is_none());
        assert!(!is_residue('s'));
    }
}
