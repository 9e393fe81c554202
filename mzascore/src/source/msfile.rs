use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use mzdata::prelude::*;
use mzdata::MZReader;
use mzpeaks::prelude::*;
use tracing::{debug, warn};

use crate::spectrum::Spectrum;

use super::{SpectrumLoader, SpectrumSourceError};

/// Extract the scan number from a native ID like `controllerType=0 controllerNumber=1 scan=1201`
pub(crate) fn scan_number_from_id(id: &str) -> Option<u32> {
    id.split_whitespace()
        .find_map(|token| token.strip_prefix("scan="))
        .and_then(|value| value.parse().ok())
}

/// A spectrum source over any file format [`MZReader`] can open, such as mzML or MGF.
///
/// Only MSn spectra are indexed. A spectrum's scan number comes from the `scan=` token of its
/// native ID, or its position in the file counting from 1 when there is none.
pub struct MzDataSpectrumSource {
    reader: Mutex<MZReader<fs::File>>,
    index: HashMap<u32, usize>,
}

impl std::fmt::Debug for MzDataSpectrumSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MzDataSpectrumSource")
            .field("index", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl MzDataSpectrumSource {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, SpectrumSourceError> {
        let mut reader = MZReader::open_path(path.as_ref())?;
        let mut index = HashMap::new();
        let n = reader.len();
        for i in 0..n {
            let Some(spectrum) = reader.get_spectrum_by_index(i) else {
                continue;
            };
            if spectrum.ms_level() < 2 {
                continue;
            }
            let scan_number = scan_number_from_id(spectrum.id()).unwrap_or(i as u32 + 1);
            index.entry(scan_number).or_insert(i);
        }
        debug!(
            "Indexed {} MSn spectra of {n} from {}",
            index.len(),
            path.as_ref().display()
        );
        Ok(Self {
            reader: Mutex::new(reader),
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl SpectrumLoader for MzDataSpectrumSource {
    fn load(&self, scan_number: u32) -> Option<Spectrum> {
        let i = *self.index.get(&scan_number)?;
        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        let mut spectrum = reader.get_spectrum_by_index(i)?;
        drop(reader);

        let (precursor_mz, precursor_charge) = spectrum
            .precursor()
            .and_then(|prec| prec.ion())
            .map(|ion| (ion.mz, ion.charge.unwrap_or(0)))
            .unwrap_or((0.0, 0));

        let pairs: Vec<(f64, f32)> = match spectrum.try_build_centroids() {
            Ok(peaks) => peaks.iter().map(|p| (p.mz(), p.intensity())).collect(),
            Err(e) => {
                warn!("Failed to read centroids for scan {scan_number}: {e}");
                return None;
            }
        };
        Some(Spectrum::from_pairs(
            scan_number,
            precursor_mz,
            precursor_charge,
            pairs,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_scan_number_from_id() {
        assert_eq!(
            scan_number_from_id("controllerType=0 controllerNumber=1 scan=1201"),
            Some(1201)
        );
        assert_eq!(scan_number_from_id("index=4"), None);
        assert_eq!(scan_number_from_id("scan=abc"), None);
    }
}
