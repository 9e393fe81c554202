//! The peptide-spectrum matches to localize
use crate::params::Fragmentation;

/// One peptide identification for one scan, as read from a search engine's results.
///
/// `peptide` is the annotated notation accepted by [`crate::peptide::Peptide::parse`].
/// The positions of the modifications it writes only contribute their counts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeptideSpectrumMatch {
    pub id: String,
    pub scan_number: u32,
    /// The precursor charge, or 0 to take it from the spectrum
    pub charge: i32,
    pub peptide: String,
    pub fragmentation: Option<Fragmentation>,
}

impl PeptideSpectrumMatch {
    pub fn new(id: impl Into<String>, scan_number: u32, charge: i32, peptide: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scan_number,
            charge,
            peptide: peptide.into(),
            fragmentation: None,
        }
    }

    pub fn with_fragmentation(mut self, fragmentation: Fragmentation) -> Self {
        self.fragmentation = Some(fragmentation);
        self
    }
}
