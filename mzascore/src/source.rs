//! Where spectra come from
use std::collections::HashMap;
use std::io;

use thiserror::Error;

use crate::spectrum::Spectrum;

mod dta;
mod msfile;

pub use dta::DtaTextSource;
pub use msfile::MzDataSpectrumSource;

/// Supplies the spectrum for a scan number, or `None` when the scan does not exist.
///
/// Implementations are shared between worker threads by [`crate::SpectrumCache`], which
/// calls [`SpectrumLoader::load`] at most once per scan number.
pub trait SpectrumLoader: Send + Sync {
    fn load(&self, scan_number: u32) -> Option<Spectrum>;
}

impl<L: SpectrumLoader + ?Sized> SpectrumLoader for Box<L> {
    fn load(&self, scan_number: u32) -> Option<Spectrum> {
        (**self).load(scan_number)
    }
}

#[derive(Debug, Error)]
pub enum SpectrumSourceError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Malformed spectrum header on line {line}: {text:?}")]
    MalformedHeader { line: usize, text: String },
    #[error("Malformed peak on line {line}: {text:?}")]
    MalformedPeak { line: usize, text: String },
}

/// Spectra prepared ahead of time, keyed by scan number
#[derive(Debug, Default, Clone)]
pub struct InMemorySpectrumSource {
    spectra: HashMap<u32, Spectrum>,
}

impl InMemorySpectrumSource {
    /// Index `spectra` by scan number. The first spectrum for a scan wins.
    pub fn new(spectra: Vec<Spectrum>) -> Self {
        let mut this = Self::default();
        for spectrum in spectra {
            this.add(spectrum);
        }
        this
    }

    /// Add a spectrum unless its scan number is already present, returning whether it was added
    pub fn add(&mut self, spectrum: Spectrum) -> bool {
        match self.spectra.entry(spectrum.scan_number) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(spectrum);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }
}

impl FromIterator<Spectrum> for InMemorySpectrumSource {
    fn from_iter<T: IntoIterator<Item = Spectrum>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl SpectrumLoader for InMemorySpectrumSource {
    fn load(&self, scan_number: u32) -> Option<Spectrum> {
        self.spectra.get(&scan_number).cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_in_memory_first_wins() {
        let mut source: InMemorySpectrumSource = vec![
            Spectrum::from_pairs(3, 400.0, 2, vec![(100.0, 1.0)]),
            Spectrum::from_pairs(3, 410.0, 3, vec![(100.0, 1.0)]),
        ]
        .into_iter()
        .collect();
        assert_eq!(source.len(), 1);
        assert_eq!(source.load(3).map(|s| s.precursor_charge), Some(2));
        assert!(source.load(4).is_none());
        assert!(source.add(Spectrum::from_pairs(4, 1.0, 1, vec![])));
        let boxed: Box<dyn SpectrumLoader> = Box::new(source);
        assert!(boxed.load(4).is_some());
    }
}
