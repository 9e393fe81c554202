//! * High level APIs for localizing modifications on peptide-spectrum matches
use tracing::{debug, instrument, trace};

use crate::cache::SpectrumCache;
use crate::fragments::{fragment_charges, TheoreticalIonGenerator};
use crate::localizer::{
    LocalizationError, LocalizationResult, ScoredPlacement, SiteLocalizer,
};
use crate::matcher::PeakMatcher;
use crate::params::{ParameterError, ScoringParameters};
use crate::peptide::Peptide;
use crate::placement::PlacementGenerator;
use crate::preprocess::filter_noise;
use crate::psm::PeptideSpectrumMatch;
use crate::residues::isclose;
use crate::scorer::{BinomialScorer, PlacementScorer, ScoreType};
use crate::source::SpectrumLoader;
use crate::spectrum::Spectrum;

/// Two theoretical ions closer than this are the same ion
const ION_IDENTITY_TOLERANCE: f64 = 1e-6;

/// The ions of `ions` with no counterpart in the sorted list `others`
fn exclusive_ions(ions: &[f64], others: &[f64]) -> Vec<f64> {
    ions.iter()
        .copied()
        .filter(|mz| {
            let i = others.partition_point(|o| *o < mz - ION_IDENTITY_TOLERANCE);
            !others
                .get(i)
                .is_some_and(|o| isclose(*o, *mz, ION_IDENTITY_TOLERANCE))
        })
        .collect()
}

fn sorted(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

/// A single-shot localization of one PSM against its spectrum.
///
/// # Errors
/// Returns [`ParameterError`] when `params` are invalid. Problems with the PSM itself are
/// reported in [`LocalizationResult::error`].
///
/// # See also
/// [`LocalizationEngine::localize`], which avoids re-validating the parameters for every PSM.
pub fn localize(
    psm: &PeptideSpectrumMatch,
    spectrum: &Spectrum,
    params: ScoringParameters,
) -> Result<LocalizationResult, ParameterError> {
    let engine = LocalizationEngine::new(params)?;
    Ok(engine.localize(psm, spectrum))
}

/// Composes placement enumeration, fragment ion generation, peak matching, scoring and
/// ranking for one PSM at a time.
///
/// An engine holds no per-PSM state, so one instance can be shared by reference between
/// threads and scoring the same PSM twice gives identical results.
#[derive(Debug, Clone)]
pub struct LocalizationEngine<S: PlacementScorer = BinomialScorer> {
    params: ScoringParameters,
    scorer: S,
    localizer: SiteLocalizer,
}

impl LocalizationEngine<BinomialScorer> {
    /// Validate `params` and build an engine with the binomial scorer
    pub fn new(params: ScoringParameters) -> Result<Self, ParameterError> {
        let scorer = BinomialScorer::new(params.mz_window);
        Self::with_scorer(params, scorer)
    }
}

impl<S: PlacementScorer> LocalizationEngine<S> {
    pub fn with_scorer(params: ScoringParameters, scorer: S) -> Result<Self, ParameterError> {
        params.validate()?;
        Ok(Self {
            params,
            scorer,
            localizer: SiteLocalizer::default(),
        })
    }

    pub fn parameters(&self) -> &ScoringParameters {
        &self.params
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    /// Fetch the PSM's spectrum from `cache` and localize it. A missing spectrum produces
    /// an unscored result.
    pub fn localize_cached<L: SpectrumLoader>(
        &self,
        psm: &PeptideSpectrumMatch,
        cache: &SpectrumCache<L>,
    ) -> LocalizationResult {
        match cache.get(psm.scan_number) {
            Ok(spectrum) => self.localize(psm, &spectrum),
            Err(e) => {
                debug!("Skipping {}: {e}", psm.id);
                LocalizationResult::unscored(psm, e)
            }
        }
    }

    /// Score every placement of the PSM's dynamic modifications against `spectrum`
    #[instrument(level = "debug", skip_all, fields(psm_id = %psm.id, scan = psm.scan_number))]
    pub fn localize(&self, psm: &PeptideSpectrumMatch, spectrum: &Spectrum) -> LocalizationResult {
        let modifications = &self.params.modifications;
        let peptide = match Peptide::parse(&psm.peptide, modifications) {
            Ok(peptide) => peptide,
            Err(e) => {
                debug!("Failed to parse {:?}: {e}", psm.peptide);
                return LocalizationResult::unscored(
                    psm,
                    LocalizationError::InvalidPeptide(e.to_string()),
                );
            }
        };

        let generator = match PlacementGenerator::from_peptide(&peptide, modifications) {
            Ok(generator) => generator,
            Err(e) => return LocalizationResult::unlocalizable(psm, e),
        };
        let placements = generator.generate();
        if placements.is_empty() {
            return LocalizationResult::unlocalizable(psm, LocalizationError::NoValidPlacement);
        }

        let filtered;
        let spectrum = match self.params.noise_filter.as_ref() {
            Some(filter) if !filter.is_noop() => {
                filtered = filter_noise(spectrum, filter);
                &filtered
            }
            _ => spectrum,
        };

        let fragmentation = psm
            .fragmentation
            .unwrap_or(self.params.default_fragmentation);
        let frag_params = self.params.fragmentation(fragmentation);
        let charge = if psm.charge > 0 {
            psm.charge
        } else {
            spectrum.precursor_charge
        };

        let ions = TheoreticalIonGenerator::new(
            &peptide,
            modifications,
            self.params.mass_type,
            &frag_params.ion_series,
            fragment_charges(charge, self.params.max_fragment_charge),
        );
        let matcher = PeakMatcher::new(
            spectrum,
            frag_params.tolerance,
            self.params.depth_mode,
            &self.params.depths,
        );

        let scored: Vec<ScoredPlacement> = placements
            .into_iter()
            .map(|placement| {
                let mzs = ions.generate_mz(&placement);
                let matches = matcher.match_depths(&mzs);
                let best = self
                    .scorer
                    .best_depth(&matches, matcher.depths(), mzs.len());
                trace!(
                    "{} scored {:.3} at depth {} ({}/{})",
                    peptide.render(&placement, modifications),
                    best.score,
                    best.depth,
                    best.matched_ions,
                    best.possible_ions
                );
                ScoredPlacement {
                    placement,
                    best_depth: best.depth,
                    matched_ions: best.matched_ions,
                    possible_ions: best.possible_ions,
                    score: best.score,
                }
            })
            .collect();

        let ranked = self.localizer.rank(scored);
        let (a_score, status) = self.localizer.a_score(&ranked);
        let site_scores = self.localizer.site_scores(&ranked, modifications);
        let site_determining_score = match ranked.as_slice() {
            [first, second, ..] => {
                self.site_determining_score(&ions, &matcher, first, second)
            }
            _ => None,
        };
        let best_sequence = ranked
            .first()
            .map(|p| peptide.render(&p.placement, modifications));
        let second_sequence = ranked
            .get(1)
            .map(|p| peptide.render(&p.placement, modifications));

        debug!(
            "{} placements, AScore {a_score:.3} ({status})",
            ranked.len()
        );

        LocalizationResult {
            psm_id: psm.id.clone(),
            scan_number: psm.scan_number,
            charge,
            peptide: psm.peptide.clone(),
            ranked,
            a_score,
            status,
            best_sequence,
            second_sequence,
            site_scores,
            site_determining_score,
            error: None,
        }
    }

    /// Score the ions that tell the top two placements apart, returning the largest
    /// difference in their scores across depths
    fn site_determining_score(
        &self,
        ions: &TheoreticalIonGenerator,
        matcher: &PeakMatcher<'_>,
        first: &ScoredPlacement,
        second: &ScoredPlacement,
    ) -> Option<ScoreType> {
        let first_ions = ions.generate_mz(&first.placement);
        let second_ions = ions.generate_mz(&second.placement);
        let first_only = exclusive_ions(&first_ions, &sorted(second_ions.clone()));
        let second_only = exclusive_ions(&second_ions, &sorted(first_ions));
        if first_only.is_empty() && second_only.is_empty() {
            return None;
        }
        let first_matches = matcher.match_depths(&first_only);
        let second_matches = matcher.match_depths(&second_only);
        matcher
            .depths()
            .iter()
            .zip(first_matches.iter().zip(second_matches.iter()))
            .map(|(depth, (k1, k2))| {
                self.scorer.score_depth(*k1, first_only.len(), *depth)
                    - self.scorer.score_depth(*k2, second_only.len(), *depth)
            })
            .max_by(|a, b| a.total_cmp(b))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::localizer::LocalizationStatus;
    use crate::source::InMemorySpectrumSource;

    #[test]
    fn test_exclusive_ions() {
        let a = [100.0, 200.0, 300.0000001, 400.0];
        let b = sorted(vec![400.0, 100.0, 300.0, 250.0]);
        assert_eq!(exclusive_ions(&a, &b), vec![200.0]);
        assert_eq!(exclusive_ions(&a, &[]), a.to_vec());
    }

    #[test]
    fn test_invalid_parameters_are_fatal() {
        let mut params = ScoringParameters::default();
        params.depths = vec![];
        assert!(LocalizationEngine::new(params).is_err());
    }

    #[test]
    fn test_error_results() {
        let engine = LocalizationEngine::new(ScoringParameters::default()).unwrap();
        let spectrum = Spectrum::from_pairs(1, 500.0, 2, vec![(200.0, 10.0)]);

        let psm = PeptideSpectrumMatch::new("a", 1, 2, "PEPJIDE");
        let result = engine.localize(&psm, &spectrum);
        assert_eq!(result.status, LocalizationStatus::Unscored);
        assert!(matches!(result.error, Some(LocalizationError::InvalidPeptide(_))));

        let psm = PeptideSpectrumMatch::new("b", 1, 2, "PES**K");
        let result = engine.localize(&psm, &spectrum);
        assert_eq!(result.status, LocalizationStatus::Unlocalizable);
        assert_eq!(
            result.error,
            Some(LocalizationError::NoCandidateSites {
                symbol: '*',
                required: 2,
                available: 1
            })
        );
        assert!(result.ranked.is_empty());
    }

    #[test]
    fn test_every_site_modified() {
        let engine = LocalizationEngine::new(ScoringParameters::default()).unwrap();
        let spectrum = Spectrum::from_pairs(1, 500.0, 2, vec![(200.0, 10.0), (350.0, 20.0)]);
        let psm = PeptideSpectrumMatch::new("c", 1, 2, "K.PEPT*IDES*S*K.L");
        let result = engine.localize(&psm, &spectrum);
        assert_eq!(result.status, LocalizationStatus::Unambiguous);
        assert_eq!(result.ranked.len(), 1);
        assert_eq!(result.a_score, result.ranked[0].score);
        assert_eq!(result.best_sequence.as_deref(), Some("K.PEPT*IDES*S*K.L"));
        assert!(result.site_determining_score.is_none());
        assert!(result.site_scores.iter().all(|s| s.unambiguous));
    }

    #[test]
    fn test_missing_spectrum() {
        let engine = LocalizationEngine::new(ScoringParameters::default()).unwrap();
        let cache = SpectrumCache::new(InMemorySpectrumSource::default());
        let psm = PeptideSpectrumMatch::new("d", 42, 2, "PES*K");
        let result = engine.localize_cached(&psm, &cache);
        assert_eq!(result.status, LocalizationStatus::Unscored);
        assert_eq!(result.error, Some(LocalizationError::SpectrumNotFound(42)));
    }
}
