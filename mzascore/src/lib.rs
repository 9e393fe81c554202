//! Score the localization of post-translational modifications on peptides identified
//! from tandem mass spectra using the AScore cumulative binomial model.
//!
//! The usual entry point is [`LocalizationEngine`], which composes the placement
//! enumeration, fragment ion generation, peak matching and scoring steps for one
//! [`PeptideSpectrumMatch`] at a time. Spectra are supplied either directly or through a
//! [`SpectrumCache`] which loads each scan at most once.
pub mod api;
pub mod cache;
pub mod fragments;
pub mod localizer;
pub mod matcher;
pub mod modification;
pub mod params;
pub mod peptide;
pub mod placement;
pub mod preprocess;
pub mod psm;
pub mod residues;
pub mod scorer;
pub mod source;
pub mod spectrum;

pub use api::LocalizationEngine;
pub use cache::SpectrumCache;
pub use localizer::{LocalizationError, LocalizationResult, LocalizationStatus, ScoredPlacement};
pub use modification::{Modification, ModificationKind, ModificationSet};
pub use params::{Fragmentation, ParameterError, ScoringParameters};
pub use psm::PeptideSpectrumMatch;
pub use residues::MassType;
pub use source::SpectrumLoader;
pub use spectrum::Spectrum;
