use rayon::prelude::*;

use mzascore::fragments::{fragment_charges, TheoreticalIonGenerator};
use mzascore::peptide::Peptide;
use mzascore::placement::ModificationPlacement;
use mzascore::residues::PROTON;
use mzascore::source::InMemorySpectrumSource;
use mzascore::{
    LocalizationEngine, LocalizationStatus, PeptideSpectrumMatch, ScoringParameters, Spectrum,
    SpectrumCache,
};

const SEQUENCE: &str = "ASLDSPGESFK";

/// A doubly charged spectrum of `ASLDSPGESFK` phosphorylated on the serine at position 4,
/// with the singly charged b and y ions as the 20 most intense peaks over 40 weaker
/// noise peaks
fn phospho_spectrum(scan_number: u32, params: &ScoringParameters) -> Spectrum {
    let peptide = Peptide::new(SEQUENCE, vec![1]);
    let generator = TheoreticalIonGenerator::new(
        &peptide,
        &params.modifications,
        params.mass_type,
        &params.cid.ion_series,
        fragment_charges(2, params.max_fragment_charge),
    );
    let true_placement = ModificationPlacement::new(vec![vec![4]]);
    let mut pairs: Vec<(f64, f32)> = generator
        .generate_mz(&true_placement)
        .into_iter()
        .enumerate()
        .map(|(i, mz)| (mz, 1000.0 + 10.0 * i as f32))
        .collect();
    assert_eq!(pairs.len(), 20);
    for k in 0..40 {
        let mz = 150.0 + (k as f64 * 37.77) % 1100.0;
        let intensity = 50.0 + ((k * 7) % 40) as f32;
        pairs.push((mz, intensity));
    }
    let precursor_mz = (generator.peptide_mass(&true_placement) + 2.0 * PROTON) / 2.0;
    Spectrum::from_pairs(scan_number, precursor_mz, 2, pairs)
}

fn psms() -> Vec<PeptideSpectrumMatch> {
    (1..=12)
        .map(|i| {
            // The written site is deliberately not the supported one
            let peptide = if i % 2 == 0 {
                "K.AS*LDSPGESFK.L"
            } else {
                "K.ASLDSPGES*FK.L"
            };
            PeptideSpectrumMatch::new(format!("psm-{i}"), i, 2, peptide)
        })
        .collect()
}

#[test_log::test]
fn test_localize_phosphosite() {
    let params = ScoringParameters::default();
    let spectrum = phospho_spectrum(1, &params);
    let engine = LocalizationEngine::new(params).unwrap();
    let psm = PeptideSpectrumMatch::new("psm-1", 1, 2, "K.AS*LDSPGESFK.L");

    let result = engine.localize(&psm, &spectrum);
    assert_eq!(result.status, LocalizationStatus::Localized);
    assert_eq!(result.ranked.len(), 3);
    assert_eq!(result.ranked[0].placement.sites_for(0), &[4]);
    assert_eq!(result.best_sequence.as_deref(), Some("K.ASLDS*PGESFK.L"));
    assert!(result.a_score > 10.0, "{}", result.a_score);

    let best = &result.ranked[0];
    assert_eq!(best.possible_ions, 20);
    assert_eq!(best.matched_ions, 20);
    assert_eq!(best.best_depth, 20);
    assert!(result.ranked[1].score < best.score);

    assert_eq!(result.site_scores.len(), 1);
    assert_eq!(result.site_scores[0].position, 4);
    assert!((result.site_scores[0].score - result.a_score).abs() < 1e-9);
    assert!(result.site_determining_score.is_some_and(|s| s > 0.0));
    assert!(result.error.is_none());
}

#[test_log::test]
fn test_localize_is_repeatable() {
    let params = ScoringParameters::default();
    let spectrum = phospho_spectrum(1, &params);
    let engine = LocalizationEngine::new(params).unwrap();
    let psm = PeptideSpectrumMatch::new("psm-1", 1, 2, "ASLDSPGES*FK");
    let first = engine.localize(&psm, &spectrum);
    let second = engine.localize(&psm, &spectrum);
    assert_eq!(first, second);
    assert_eq!(first.a_score.to_bits(), second.a_score.to_bits());
}

#[test_log::test]
fn test_parallel_matches_sequential() {
    let params = ScoringParameters::default();
    let source: InMemorySpectrumSource = (1..=12).map(|i| phospho_spectrum(i, &params)).collect();
    let cache = SpectrumCache::new(source);
    let engine = LocalizationEngine::new(params).unwrap();
    let psms = psms();

    let sequential: Vec<_> = psms
        .iter()
        .map(|psm| engine.localize_cached(psm, &cache))
        .collect();
    let parallel: Vec<_> = psms
        .par_iter()
        .map(|psm| engine.localize_cached(psm, &cache))
        .collect();

    assert_eq!(sequential, parallel);
    assert_eq!(cache.load_count(), 12);
    for result in sequential.iter() {
        assert_eq!(result.best_sequence.as_deref(), Some("K.ASLDS*PGESFK.L"));
    }
}

#[test_log::test]
fn test_per_window_depths() {
    let mut params = ScoringParameters::default();
    params.depth_mode = mzascore::matcher::DepthMode::PerWindow { width: 100.0 };
    let spectrum = phospho_spectrum(1, &params);
    let engine = LocalizationEngine::new(params).unwrap();
    let psm = PeptideSpectrumMatch::new("psm-1", 1, 2, "ASLDSPGES*FK");
    let result = engine.localize(&psm, &spectrum);
    assert!(result.is_scored());
    assert_eq!(result.ranked.len(), 3);
}
