//! The centroided MS/MS spectrum a peptide is localized against
use chemical_elements::neutral_mass;
use mzpeaks::{prelude::*, CentroidPeak, MZPeakSetType};

use crate::residues::{isclose, PROTON};

/// A centroided fragment spectrum for one scan.
///
/// `peaks` is kept sorted by m/z by [`MZPeakSetType`] and is never reordered. Intensity
/// orderings are derived separately by [`crate::matcher::DepthRanks`].
#[derive(Debug, Clone)]
pub struct Spectrum {
    pub scan_number: u32,
    pub precursor_mz: f64,
    pub precursor_charge: i32,
    pub peaks: MZPeakSetType<CentroidPeak>,
}

impl Spectrum {
    pub fn new(
        scan_number: u32,
        precursor_mz: f64,
        precursor_charge: i32,
        peaks: MZPeakSetType<CentroidPeak>,
    ) -> Self {
        Self {
            scan_number,
            precursor_mz,
            precursor_charge,
            peaks,
        }
    }

    /// Build a spectrum from `(m/z, intensity)` pairs in any order
    pub fn from_pairs<I: IntoIterator<Item = (f64, f32)>>(
        scan_number: u32,
        precursor_mz: f64,
        precursor_charge: i32,
        pairs: I,
    ) -> Self {
        let peaks: Vec<CentroidPeak> = pairs
            .into_iter()
            .map(|(mz, intensity)| CentroidPeak::new(mz, intensity, 0))
            .collect();
        Self::new(
            scan_number,
            precursor_mz,
            precursor_charge,
            MZPeakSetType::new(peaks),
        )
    }

    /// The neutral mass of the precursor ion
    pub fn precursor_mass(&self) -> f64 {
        neutral_mass(self.precursor_mz, self.precursor_charge, PROTON)
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.len() == 0
    }

    pub fn as_slice(&self) -> &[CentroidPeak] {
        self.peaks.as_slice()
    }

    /// Replace the peak list, keeping the precursor information
    pub fn with_peaks(&self, peaks: Vec<CentroidPeak>) -> Self {
        Self::new(
            self.scan_number,
            self.precursor_mz,
            self.precursor_charge,
            MZPeakSetType::new(peaks),
        )
    }

    pub fn base_peak(&self) -> Option<&CentroidPeak> {
        self.peaks
            .iter()
            .max_by(|a, b| a.intensity().total_cmp(&b.intensity()))
    }
}

impl PartialEq for Spectrum {
    fn eq(&self, other: &Self) -> bool {
        self.scan_number == other.scan_number
            && self.precursor_charge == other.precursor_charge
            && isclose(self.precursor_mz, other.precursor_mz, 1e-6)
            && self.peaks.len() == other.peaks.len()
            && self
                .peaks
                .iter()
                .zip(other.peaks.iter())
                .all(|(a, b)| isclose(a.mz(), b.mz(), 1e-6) && a.intensity() == b.intensity())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sorted_and_mass() {
        let spectrum = Spectrum::from_pairs(
            10,
            501.0,
            2,
            vec![(300.0, 5.0), (150.0, 20.0), (220.5, 1.0)],
        );
        let mzs: Vec<f64> = spectrum.peaks.iter().map(|p| p.mz()).collect();
        assert_eq!(mzs, vec![150.0, 220.5, 300.0]);
        assert!(isclose(spectrum.precursor_mass(), 2.0 * 501.0 - 2.0 * PROTON, 1e-9));
        assert_eq!(spectrum.base_peak().map(|p| p.mz()), Some(150.0));
        assert_eq!(spectrum, spectrum.clone());
    }
}
