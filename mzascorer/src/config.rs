use serde::{Deserialize, Serialize};

use mzascore::fragments::IonSeriesKind;
use mzascore::matcher::DepthMode;
use mzascore::params::{parse_tolerance, tolerance_parts, FragmentationParams};
use mzascore::preprocess::NoiseFilter;
use mzascore::{
    Fragmentation, MassType, Modification, ModificationKind, ModificationSet, ParameterError,
    ScoringParameters,
};

/// The matching settings for one fragmentation method as written in a parameter file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentationConfig {
    pub tolerance: f64,
    #[serde(default = "FragmentationConfig::default_unit")]
    pub unit: String,
    pub ion_series: Vec<String>,
}

impl FragmentationConfig {
    fn default_unit() -> String {
        "Da".to_string()
    }
}

impl From<&FragmentationParams> for FragmentationConfig {
    fn from(value: &FragmentationParams) -> Self {
        let (unit, tolerance) = tolerance_parts(value.tolerance);
        Self {
            tolerance,
            unit: unit.to_string(),
            ion_series: value.ion_series.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TryFrom<&FragmentationConfig> for FragmentationParams {
    type Error = ParameterError;

    fn try_from(value: &FragmentationConfig) -> Result<Self, Self::Error> {
        let tolerance = parse_tolerance(value.tolerance, &value.unit)?;
        let ion_series = value
            .ion_series
            .iter()
            .map(|s| s.parse::<IonSeriesKind>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FragmentationParams::new(tolerance, ion_series))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModificationKindConfig {
    Static,
    #[default]
    Dynamic,
    Terminal,
}

/// A modification as written in a parameter file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationConfig {
    #[serde(default)]
    pub kind: ModificationKindConfig,
    pub symbol: char,
    pub monoisotopic_mass: f64,
    /// Defaults to the monoisotopic mass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_mass: Option<f64>,
    /// The residues the modification may occupy, any residue when empty
    #[serde(default)]
    pub residues: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_site: Option<u8>,
    #[serde(default)]
    pub n_term: bool,
    #[serde(default)]
    pub c_term: bool,
}

impl From<&Modification> for ModificationConfig {
    fn from(value: &Modification) -> Self {
        let (kind, max_per_site, n_term, c_term) = match value.kind {
            ModificationKind::Static => (ModificationKindConfig::Static, None, false, false),
            ModificationKind::Dynamic { max_per_site } => {
                (ModificationKindConfig::Dynamic, Some(max_per_site), false, false)
            }
            ModificationKind::Terminal { n_term, c_term } => {
                (ModificationKindConfig::Terminal, None, n_term, c_term)
            }
        };
        Self {
            kind,
            symbol: value.symbol,
            monoisotopic_mass: value.monoisotopic_mass,
            average_mass: Some(value.average_mass),
            residues: value.sites.iter().collect(),
            max_per_site,
            n_term,
            c_term,
        }
    }
}

impl From<&ModificationConfig> for Modification {
    fn from(value: &ModificationConfig) -> Self {
        let average_mass = value.average_mass.unwrap_or(value.monoisotopic_mass);
        let kind = match value.kind {
            ModificationKindConfig::Static => ModificationKind::Static,
            ModificationKindConfig::Dynamic => ModificationKind::Dynamic {
                max_per_site: value.max_per_site.unwrap_or(1),
            },
            ModificationKindConfig::Terminal => ModificationKind::Terminal {
                n_term: value.n_term,
                c_term: value.c_term,
            },
        };
        Modification::new(
            value.symbol,
            value.monoisotopic_mass,
            average_mass,
            value.residues.trim().to_uppercase().chars().collect(),
            kind,
        )
    }
}

/// The scoring parameter file.
///
/// Every field has a default, so a file only needs to state what it changes:
///
/// ```toml
/// mass_type = "monoisotopic"
/// depths = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]
///
/// [hcd]
/// tolerance = 20.0
/// unit = "ppm"
/// ion_series = ["b", "y"]
///
/// [[modifications]]
/// kind = "dynamic"
/// symbol = "*"
/// monoisotopic_mass = 79.966331
/// residues = "STY"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub mass_type: String,
    pub default_fragmentation: String,
    pub cid: FragmentationConfig,
    pub hcd: FragmentationConfig,
    pub etd: FragmentationConfig,
    pub depths: Vec<usize>,
    /// Rank peaks within consecutive m/z windows of this width instead of globally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_window: Option<f64>,
    pub mz_window: f64,
    pub max_fragment_charge: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_filter: Option<NoiseFilter>,
    pub modifications: Vec<ModificationConfig>,
}

impl From<&ScoringParameters> for ScoringConfig {
    fn from(value: &ScoringParameters) -> Self {
        let depth_window = match value.depth_mode {
            DepthMode::Global => None,
            DepthMode::PerWindow { width } => Some(width),
        };
        Self {
            mass_type: value.mass_type.to_string(),
            default_fragmentation: value.default_fragmentation.to_string(),
            cid: (&value.cid).into(),
            hcd: (&value.hcd).into(),
            etd: (&value.etd).into(),
            depths: value.depths.clone(),
            depth_window,
            mz_window: value.mz_window,
            max_fragment_charge: value.max_fragment_charge,
            noise_filter: value.noise_filter,
            modifications: value.modifications.iter().map(|m| m.into()).collect(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        (&ScoringParameters::default()).into()
    }
}

impl TryFrom<&ScoringConfig> for ScoringParameters {
    type Error = ParameterError;

    fn try_from(value: &ScoringConfig) -> Result<Self, Self::Error> {
        let modifications =
            ModificationSet::new(value.modifications.iter().map(Modification::from).collect())?;
        let depth_mode = match value.depth_window {
            Some(width) => DepthMode::PerWindow { width },
            None => DepthMode::Global,
        };
        let params = ScoringParameters {
            mass_type: value.mass_type.parse::<MassType>()?,
            modifications,
            cid: (&value.cid).try_into()?,
            hcd: (&value.hcd).try_into()?,
            etd: (&value.etd).try_into()?,
            default_fragmentation: value.default_fragmentation.parse::<Fragmentation>()?,
            depths: value.depths.clone(),
            depth_mode,
            mz_window: value.mz_window,
            max_fragment_charge: value.max_fragment_charge,
            noise_filter: value.noise_filter,
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_convert() {
        let config = ScoringConfig::default();
        let params = ScoringParameters::try_from(&config).unwrap();
        assert_eq!(params, ScoringParameters::default());
    }

    #[test]
    fn test_partial_file() {
        let text = r##"
depths = [1, 2, 4, 8]
depth_window = 100.0

[hcd]
tolerance = 20.0
unit = "ppm"
ion_series = ["b", "y"]

[[modifications]]
kind = "static"
symbol = "!"
monoisotopic_mass = 57.021464
residues = "C"

[[modifications]]
symbol = "*"
monoisotopic_mass = 79.966331
average_mass = 79.9799
residues = "sty"

[[modifications]]
symbol = "#"
monoisotopic_mass = 15.994915
residues = "M"
"##;
        let config: ScoringConfig = toml::from_str(text).unwrap();
        let params = ScoringParameters::try_from(&config).unwrap();
        assert_eq!(params.depths, vec![1, 2, 4, 8]);
        assert_eq!(params.depth_mode, DepthMode::PerWindow { width: 100.0 });
        assert_eq!(tolerance_parts(params.hcd.tolerance), ("ppm", 20.0));
        assert_eq!(params.modifications.dynamic_count(), 2);
        assert_eq!(params.cid, ScoringParameters::default().cid);
    }

    #[test]
    fn test_invalid_file() {
        let config = ScoringConfig {
            mass_type: "heavy".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            ScoringParameters::try_from(&config),
            Err(ParameterError::UnknownMassType(_))
        ));

        let mut config = ScoringConfig::default();
        config.cid.ion_series = vec!["q".to_string()];
        assert!(matches!(
            ScoringParameters::try_from(&config),
            Err(ParameterError::UnknownIonSeries(_))
        ));
    }

    #[test]
    fn test_write_round_trip() {
        let text = toml::to_string_pretty(&ScoringConfig::default()).unwrap();
        let config: ScoringConfig = toml::from_str(&text).unwrap();
        assert_eq!(config, ScoringConfig::default());
    }
}
