//! Validated parameters for a scoring run
use std::fmt::Display;
use std::str::FromStr;

use mzpeaks::Tolerance;
use thiserror::Error;

use crate::fragments::IonSeriesKind;
use crate::matcher::{DepthMode, DEFAULT_DEPTHS};
use crate::modification::{Modification, ModificationSet};
use crate::preprocess::NoiseFilter;
use crate::residues::MassType;

/// Problems with scoring parameters. These are fatal: no PSM is scored with invalid
/// parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("The {0} mass tolerance must be a finite, non-negative number, found {1}")]
    InvalidTolerance(Fragmentation, f64),
    #[error("Unknown mass tolerance unit {0:?}, expected \"Da\" or \"ppm\"")]
    UnknownToleranceUnit(String),
    #[error("Unknown mass type {0:?}, expected \"monoisotopic\" or \"average\"")]
    UnknownMassType(String),
    #[error("Unknown fragmentation method {0:?}, expected CID, HCD or ETD")]
    UnknownFragmentation(String),
    #[error("Unknown ion series {0:?}, expected b, c, y or z")]
    UnknownIonSeries(String),
    #[error("No ion series were configured for {0}")]
    EmptyIonSeries(Fragmentation),
    #[error("The depth cutoffs must be a non-empty, strictly increasing list of positive counts, found {0:?}")]
    InvalidDepths(Vec<usize>),
    #[error("The m/z window must be a finite positive number, found {0}")]
    InvalidWindow(f64),
    #[error("The maximum fragment charge must be at least 1, found {0}")]
    InvalidFragmentCharge(i32),
    #[error("Invalid noise filter: {0}")]
    InvalidNoiseFilter(String),
    #[error("Invalid modification {symbol:?}: {reason}")]
    InvalidModification { symbol: char, reason: String },
    #[error("The dynamic modification symbol {0:?} is used more than once")]
    DuplicateModification(char),
}

/// The fragmentation method of a scan, which selects the tolerance and ion series used
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Fragmentation {
    #[default]
    CID,
    HCD,
    ETD,
}

impl FromStr for Fragmentation {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CID" => Ok(Self::CID),
            "HCD" => Ok(Self::HCD),
            "ETD" => Ok(Self::ETD),
            _ => Err(ParameterError::UnknownFragmentation(s.to_string())),
        }
    }
}

impl Display for Fragmentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Parse a tolerance unit name and value into a [`Tolerance`]
pub fn parse_tolerance(value: f64, unit: &str) -> Result<Tolerance, ParameterError> {
    match unit.trim().to_lowercase().as_str() {
        "da" | "dalton" | "th" => Ok(Tolerance::Da(value)),
        "ppm" => Ok(Tolerance::PPM(value)),
        _ => Err(ParameterError::UnknownToleranceUnit(unit.to_string())),
    }
}

/// The unit and value of a [`Tolerance`]
pub fn tolerance_parts(tolerance: Tolerance) -> (&'static str, f64) {
    match tolerance {
        Tolerance::PPM(v) => ("ppm", v),
        Tolerance::Da(v) => ("Da", v),
    }
}

/// The matching settings for one fragmentation method
#[derive(Debug, Clone)]
pub struct FragmentationParams {
    pub tolerance: Tolerance,
    pub ion_series: Vec<IonSeriesKind>,
}

impl FragmentationParams {
    pub fn new(tolerance: Tolerance, ion_series: Vec<IonSeriesKind>) -> Self {
        Self {
            tolerance,
            ion_series,
        }
    }

    fn validate(&self, fragmentation: Fragmentation) -> Result<(), ParameterError> {
        let (_, value) = tolerance_parts(self.tolerance);
        if !value.is_finite() || value < 0.0 {
            return Err(ParameterError::InvalidTolerance(fragmentation, value));
        }
        if self.ion_series.is_empty() {
            return Err(ParameterError::EmptyIonSeries(fragmentation));
        }
        Ok(())
    }
}

impl PartialEq for FragmentationParams {
    fn eq(&self, other: &Self) -> bool {
        tolerance_parts(self.tolerance) == tolerance_parts(other.tolerance)
            && self.ion_series == other.ion_series
    }
}

/// Everything that controls how PSMs are scored.
///
/// Build one with [`Default`] and adjust its fields, then call
/// [`ScoringParameters::validate`] (which [`crate::LocalizationEngine::new`] does too).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringParameters {
    pub mass_type: MassType,
    pub modifications: ModificationSet,
    pub cid: FragmentationParams,
    pub hcd: FragmentationParams,
    pub etd: FragmentationParams,
    /// Used for PSMs that do not state a fragmentation method
    pub default_fragmentation: Fragmentation,
    pub depths: Vec<usize>,
    pub depth_mode: DepthMode,
    /// The m/z width that converts a depth cutoff into a per-ion match probability
    pub mz_window: f64,
    pub max_fragment_charge: i32,
    pub noise_filter: Option<NoiseFilter>,
}

impl Default for ScoringParameters {
    fn default() -> Self {
        let modifications = ModificationSet::new(vec![
            Modification::new_static('!', 57.021464, 57.0513, "C"),
            Modification::new_dynamic('*', 79.966331, 79.9799, "STY", 1),
        ])
        .unwrap_or_default();
        Self {
            mass_type: MassType::Monoisotopic,
            modifications,
            cid: FragmentationParams::new(
                Tolerance::Da(0.5),
                vec![IonSeriesKind::B, IonSeriesKind::Y],
            ),
            hcd: FragmentationParams::new(
                Tolerance::Da(0.05),
                vec![IonSeriesKind::B, IonSeriesKind::Y],
            ),
            etd: FragmentationParams::new(
                Tolerance::Da(0.5),
                vec![IonSeriesKind::C, IonSeriesKind::Z],
            ),
            default_fragmentation: Fragmentation::CID,
            depths: DEFAULT_DEPTHS.to_vec(),
            depth_mode: DepthMode::Global,
            mz_window: 100.0,
            max_fragment_charge: 3,
            noise_filter: None,
        }
    }
}

impl ScoringParameters {
    pub fn fragmentation(&self, fragmentation: Fragmentation) -> &FragmentationParams {
        match fragmentation {
            Fragmentation::CID => &self.cid,
            Fragmentation::HCD => &self.hcd,
            Fragmentation::ETD => &self.etd,
        }
    }

    pub fn fragmentation_mut(&mut self, fragmentation: Fragmentation) -> &mut FragmentationParams {
        match fragmentation {
            Fragmentation::CID => &mut self.cid,
            Fragmentation::HCD => &mut self.hcd,
            Fragmentation::ETD => &mut self.etd,
        }
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        self.cid.validate(Fragmentation::CID)?;
        self.hcd.validate(Fragmentation::HCD)?;
        self.etd.validate(Fragmentation::ETD)?;

        let increasing = self.depths.windows(2).all(|w| w[0] < w[1]);
        if self.depths.is_empty() || self.depths[0] == 0 || !increasing {
            return Err(ParameterError::InvalidDepths(self.depths.clone()));
        }
        if !self.mz_window.is_finite() || self.mz_window <= 0.0 {
            return Err(ParameterError::InvalidWindow(self.mz_window));
        }
        if let DepthMode::PerWindow { width } = self.depth_mode {
            if !width.is_finite() || width <= 0.0 {
                return Err(ParameterError::InvalidWindow(width));
            }
        }
        if self.max_fragment_charge < 1 {
            return Err(ParameterError::InvalidFragmentCharge(
                self.max_fragment_charge,
            ));
        }
        if let Some(filter) = self.noise_filter.as_ref() {
            if filter
                .median_ratio
                .is_some_and(|r| !r.is_finite() || r < 0.0)
            {
                return Err(ParameterError::InvalidNoiseFilter(
                    "median_ratio must be a finite, non-negative number".into(),
                ));
            }
            if filter.max_peaks == Some(0) {
                return Err(ParameterError::InvalidNoiseFilter(
                    "max_peaks must be at least 1".into(),
                ));
            }
            if filter
                .precursor_window
                .is_some_and(|w| !w.is_finite() || w < 0.0)
            {
                return Err(ParameterError::InvalidNoiseFilter(
                    "precursor_window must be a finite, non-negative number".into(),
                ));
            }
        }
        self.modifications.validate()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = ScoringParameters::default();
        params.validate().unwrap();
        assert_eq!(params.modifications.dynamic_count(), 1);
        assert_eq!(params.fragmentation(Fragmentation::ETD).ion_series[1], IonSeriesKind::Z);
    }

    #[test]
    fn test_invalid_parameters() {
        let mut params = ScoringParameters::default();
        params.hcd.tolerance = Tolerance::PPM(-10.0);
        assert_eq!(
            params.validate(),
            Err(ParameterError::InvalidTolerance(Fragmentation::HCD, -10.0))
        );

        let mut params = ScoringParameters::default();
        params.depths = vec![1, 3, 3, 5];
        assert!(matches!(params.validate(), Err(ParameterError::InvalidDepths(_))));
        params.depths = vec![];
        assert!(matches!(params.validate(), Err(ParameterError::InvalidDepths(_))));
        params.depths = vec![0, 1];
        assert!(matches!(params.validate(), Err(ParameterError::InvalidDepths(_))));

        let mut params = ScoringParameters::default();
        params.mz_window = 0.0;
        assert_eq!(params.validate(), Err(ParameterError::InvalidWindow(0.0)));

        let mut params = ScoringParameters::default();
        params.etd.ion_series.clear();
        assert_eq!(
            params.validate(),
            Err(ParameterError::EmptyIonSeries(Fragmentation::ETD))
        );

        let mut params = ScoringParameters::default();
        params.noise_filter = Some(NoiseFilter {
            max_peaks: Some(0),
            ..Default::default()
        });
        assert!(matches!(
            params.validate(),
            Err(ParameterError::InvalidNoiseFilter(_))
        ));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("hcd".parse::<Fragmentation>().unwrap(), Fragmentation::HCD);
        assert!("PQD".parse::<Fragmentation>().is_err());
        assert_eq!(
            tolerance_parts(parse_tolerance(20.0, "ppm").unwrap()),
            ("ppm", 20.0)
        );
        assert_eq!(tolerance_parts(parse_tolerance(0.5, "Da").unwrap()), ("Da", 0.5));
        assert!(matches!(
            parse_tolerance(0.5, "mmu"),
            Err(ParameterError::UnknownToleranceUnit(_))
        ));
    }
}
