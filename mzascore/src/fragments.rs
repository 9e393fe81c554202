//! Theoretical fragment ion ladders for one modification placement
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::modification::ModificationSet;
use crate::params::ParameterError;
use crate::peptide::Peptide;
use crate::placement::ModificationPlacement;
use crate::residues::{residue_mass, MassType, AMMONIA, HYDROGEN, PROTON, WATER};

/// The backbone fragment ion series that can be generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IonSeriesKind {
    B,
    C,
    Y,
    /// The z• (z+1) radical ion
    Z,
}

impl IonSeriesKind {
    pub fn is_n_terminal(&self) -> bool {
        matches!(self, Self::B | Self::C)
    }

    /// The neutral mass added to the summed residue masses of a fragment of this series
    pub fn offset(&self, mass_type: MassType) -> f64 {
        match self {
            IonSeriesKind::B => 0.0,
            IonSeriesKind::C => AMMONIA.get(mass_type),
            IonSeriesKind::Y => WATER.get(mass_type),
            IonSeriesKind::Z => {
                WATER.get(mass_type) - AMMONIA.get(mass_type) + HYDROGEN.get(mass_type)
            }
        }
    }
}

impl FromStr for IonSeriesKind {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "b" => Ok(Self::B),
            "c" => Ok(Self::C),
            "y" => Ok(Self::Y),
            "z" | "z." | "z•" => Ok(Self::Z),
            _ => Err(ParameterError::UnknownIonSeries(s.to_string())),
        }
    }
}

impl Display for IonSeriesKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            IonSeriesKind::B => "b",
            IonSeriesKind::C => "c",
            IonSeriesKind::Y => "y",
            IonSeriesKind::Z => "z",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TheoreticalIon {
    pub series: IonSeriesKind,
    /// The number of residues in the fragment
    pub ordinal: usize,
    pub charge: i32,
    pub mz: f64,
}

#[inline]
pub fn ion_mz(neutral_mass: f64, charge: i32) -> f64 {
    (neutral_mass + charge as f64 * PROTON) / charge as f64
}

/// The fragment charge states considered for a precursor of `precursor_charge`: from 1 up to
/// one less than the precursor charge, limited to `max_fragment_charge`, always including 1.
pub fn fragment_charges(precursor_charge: i32, max_fragment_charge: i32) -> RangeInclusive<i32> {
    1..=(precursor_charge - 1).min(max_fragment_charge).max(1)
}

/// Computes the fragment ion ladder of a peptide for any placement of its dynamic
/// modifications.
///
/// Residue masses with static and terminal modifications applied are computed once, so
/// each placement only adds its dynamic modification masses.
#[derive(Debug, Clone)]
pub struct TheoreticalIonGenerator {
    base_masses: Vec<f64>,
    dynamic_masses: Vec<f64>,
    ion_series: Vec<IonSeriesKind>,
    charges: RangeInclusive<i32>,
    mass_type: MassType,
}

impl TheoreticalIonGenerator {
    pub fn new(
        peptide: &Peptide,
        modifications: &ModificationSet,
        mass_type: MassType,
        ion_series: &[IonSeriesKind],
        charges: RangeInclusive<i32>,
    ) -> Self {
        let mut base_masses: Vec<f64> = peptide
            .residues()
            .iter()
            .map(|r| {
                residue_mass(*r, mass_type).unwrap_or_default()
                    + modifications.static_mass_for(*r, mass_type)
            })
            .collect();
        if let Some(first) = base_masses.first_mut() {
            *first += modifications.n_terminal_mass(mass_type);
        }
        if let Some(last) = base_masses.last_mut() {
            *last += modifications.c_terminal_mass(mass_type);
        }
        let dynamic_masses = modifications
            .dynamic_modifications()
            .iter()
            .map(|m| m.mass(mass_type))
            .collect();
        Self {
            base_masses,
            dynamic_masses,
            ion_series: ion_series.to_vec(),
            charges,
            mass_type,
        }
    }

    pub fn ion_series(&self) -> &[IonSeriesKind] {
        &self.ion_series
    }

    pub fn charges(&self) -> RangeInclusive<i32> {
        self.charges.clone()
    }

    /// The mass of each residue with every modification `placement` puts on it
    pub fn residue_masses(&self, placement: &ModificationPlacement) -> Vec<f64> {
        let mut masses = self.base_masses.clone();
        for (slot, positions) in placement.sites().iter().enumerate() {
            let delta = self.dynamic_masses.get(slot).copied().unwrap_or_default();
            for p in positions.iter() {
                if let Some(m) = masses.get_mut(*p) {
                    *m += delta;
                }
            }
        }
        masses
    }

    /// The neutral peptide mass under `placement`
    pub fn peptide_mass(&self, placement: &ModificationPlacement) -> f64 {
        self.residue_masses(placement).iter().sum::<f64>() + WATER.get(self.mass_type)
    }

    /// Every fragment ion of every configured series and charge, series by series in
    /// ascending ordinal order
    pub fn generate(&self, placement: &ModificationPlacement) -> Vec<TheoreticalIon> {
        let masses = self.residue_masses(placement);
        let n = masses.len();
        if n < 2 {
            return Vec::new();
        }
        let mut prefix_masses = Vec::with_capacity(n - 1);
        let mut acc = 0.0;
        for m in masses[..n - 1].iter() {
            acc += m;
            prefix_masses.push(acc);
        }
        let mut suffix_masses = Vec::with_capacity(n - 1);
        let mut acc = 0.0;
        for m in masses[1..].iter().rev() {
            acc += m;
            suffix_masses.push(acc);
        }

        let n_charges = self.charges.clone().count();
        let mut ions = Vec::with_capacity(self.ion_series.len() * (n - 1) * n_charges);
        for series in self.ion_series.iter().copied() {
            let ladder = if series.is_n_terminal() {
                &prefix_masses
            } else {
                &suffix_masses
            };
            let offset = series.offset(self.mass_type);
            for (i, mass) in ladder.iter().enumerate() {
                let neutral = mass + offset;
                for charge in self.charges.clone() {
                    ions.push(TheoreticalIon {
                        series,
                        ordinal: i + 1,
                        charge,
                        mz: ion_mz(neutral, charge),
                    })
                }
            }
        }
        ions
    }

    /// The m/z values of [`TheoreticalIonGenerator::generate`], whose length is the number
    /// of possible ions
    pub fn generate_mz(&self, placement: &ModificationPlacement) -> Vec<f64> {
        self.generate(placement).into_iter().map(|i| i.mz).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::modification::Modification;
    use crate::residues::isclose;

    fn modifications() -> ModificationSet {
        ModificationSet::new(vec![
            Modification::new_static('!', 57.021464, 57.0513, "C"),
            Modification::new_dynamic('*', 79.966331, 79.9799, "STY", 1),
        ])
        .unwrap()
    }

    #[test]
    fn test_charges() {
        assert_eq!(fragment_charges(1, 3), 1..=1);
        assert_eq!(fragment_charges(2, 3), 1..=1);
        assert_eq!(fragment_charges(3, 3), 1..=2);
        assert_eq!(fragment_charges(5, 3), 1..=3);
        assert_eq!(fragment_charges(0, 3), 1..=1);
    }

    #[test]
    fn test_by_ladder() {
        let mods = modifications();
        let peptide = Peptide::parse("SAK", &mods).unwrap();
        let gen = TheoreticalIonGenerator::new(
            &peptide,
            &mods,
            MassType::Monoisotopic,
            &[IonSeriesKind::B, IonSeriesKind::Y],
            1..=1,
        );
        let ions = gen.generate(&ModificationPlacement::new(vec![vec![]]));
        assert_eq!(ions.len(), 4);
        // b1 of S
        assert!(isclose(ions[0].mz, 88.03930, 1e-4), "{}", ions[0].mz);
        // y1 of K
        assert_eq!(ions[2].series, IonSeriesKind::Y);
        assert!(isclose(ions[2].mz, 147.11280, 1e-4), "{}", ions[2].mz);

        let modified = gen.generate(&ModificationPlacement::new(vec![vec![0]]));
        assert!(isclose(modified[0].mz - ions[0].mz, 79.966331, 1e-9));
        // y ions do not contain the N-terminal serine
        assert_eq!(modified[2].mz, ions[2].mz);
        assert!(isclose(
            gen.peptide_mass(&ModificationPlacement::new(vec![vec![0]]))
                - gen.peptide_mass(&ModificationPlacement::new(vec![vec![]])),
            79.966331,
            1e-9
        ));
    }

    #[test]
    fn test_static_and_charges() {
        let mods = modifications();
        let peptide = Peptide::parse("CGK", &mods).unwrap();
        let gen = TheoreticalIonGenerator::new(
            &peptide,
            &mods,
            MassType::Monoisotopic,
            &[IonSeriesKind::B, IonSeriesKind::C, IonSeriesKind::Y, IonSeriesKind::Z],
            1..=2,
        );
        let ions = gen.generate(&ModificationPlacement::new(vec![vec![]]));
        assert_eq!(ions.len(), 4 * 2 * 2);
        let b1 = ions[0];
        assert!(isclose(b1.mz, 103.00918478 + 57.021464 + PROTON, 1e-6));
        let b1_2 = ions[1];
        assert_eq!(b1_2.charge, 2);
        assert!(isclose(b1_2.mz * 2.0 - PROTON, b1.mz, 1e-9));
        let c1 = ions[4];
        assert_eq!(c1.series, IonSeriesKind::C);
        assert!(isclose(c1.mz - b1.mz, AMMONIA.monoisotopic, 1e-9));
        let y1 = ions[8];
        let z1 = ions[12];
        assert_eq!(z1.series, IonSeriesKind::Z);
        assert!(isclose(y1.mz - z1.mz, 16.018724, 1e-5));
    }

    #[test]
    fn test_parse_series() {
        assert_eq!("Y".parse::<IonSeriesKind>().unwrap(), IonSeriesKind::Y);
        assert_eq!("z.".parse::<IonSeriesKind>().unwrap(), IonSeriesKind::Z);
        assert!("x".parse::<IonSeriesKind>().is_err());
    }
}
