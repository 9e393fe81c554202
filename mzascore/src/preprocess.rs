//! Optional spectrum normalization applied before peak matching
use mzpeaks::{prelude::*, CentroidPeak};
use tracing::trace;

use crate::spectrum::Spectrum;

/// Settings for [`filter_noise`]. Every step is skipped when its setting is `None`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NoiseFilter {
    /// Drop peaks whose intensity is below this multiple of the median peak intensity
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub median_ratio: Option<f32>,
    /// Keep only this many of the most intense peaks
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub max_peaks: Option<usize>,
    /// Drop peaks within this many Da of the precursor m/z
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub precursor_window: Option<f64>,
}

impl NoiseFilter {
    pub fn is_noop(&self) -> bool {
        self.median_ratio.is_none() && self.max_peaks.is_none() && self.precursor_window.is_none()
    }
}

/// The median intensity of `peaks`, averaging the middle pair for even counts
pub fn median_intensity(peaks: &[CentroidPeak]) -> Option<f32> {
    if peaks.is_empty() {
        return None;
    }
    let mut intensities: Vec<f32> = peaks.iter().map(|p| p.intensity()).collect();
    intensities.sort_by(|a, b| a.total_cmp(b));
    let mid = intensities.len() / 2;
    if intensities.len() % 2 == 0 {
        Some((intensities[mid - 1] + intensities[mid]) / 2.0)
    } else {
        Some(intensities[mid])
    }
}

/// Build a new spectrum with the peaks that survive `filter`. The input is not modified.
pub fn filter_noise(spectrum: &Spectrum, filter: &NoiseFilter) -> Spectrum {
    let mut peaks: Vec<CentroidPeak> = spectrum.as_slice().to_vec();
    let before = peaks.len();

    if let Some(window) = filter.precursor_window {
        let precursor_mz = spectrum.precursor_mz;
        peaks.retain(|p| (p.mz() - precursor_mz).abs() > window);
    }

    if let Some(ratio) = filter.median_ratio {
        if let Some(median) = median_intensity(&peaks) {
            let threshold = median * ratio;
            peaks.retain(|p| p.intensity() >= threshold);
        }
    }

    if let Some(max_peaks) = filter.max_peaks {
        if peaks.len() > max_peaks {
            peaks.sort_by(|a, b| {
                b.intensity()
                    .total_cmp(&a.intensity())
                    .then_with(|| a.mz().total_cmp(&b.mz()))
            });
            peaks.truncate(max_peaks);
        }
    }

    trace!(
        "Noise filtering scan {} kept {} of {before} peaks",
        spectrum.scan_number,
        peaks.len()
    );
    spectrum.with_peaks(peaks)
}
