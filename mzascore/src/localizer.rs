//! Rank scored placements and derive the AScore
use std::fmt::Display;

use thiserror::Error;

use crate::modification::ModificationSet;
use crate::placement::ModificationPlacement;
use crate::psm::PeptideSpectrumMatch;
use crate::residues::isclose;
use crate::scorer::ScoreType;

/// Problems scoring a single PSM. These never stop a run, they are attached to the
/// PSM's [`LocalizationResult`].
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LocalizationError {
    #[error("No spectrum was found for scan {0}")]
    SpectrumNotFound(u32),
    #[error("Modification {symbol:?} requires {required} site(s) but the peptide has {available} candidate(s)")]
    NoCandidateSites {
        symbol: char,
        required: usize,
        available: usize,
    },
    #[error("No placement satisfies the site constraints of every dynamic modification")]
    NoValidPlacement,
    #[error("Invalid peptide: {0}")]
    InvalidPeptide(String),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LocalizationStatus {
    /// The best placement scored strictly higher than the runner up
    Localized,
    /// Two or more placements share the best score
    Ambiguous,
    /// Only one placement was possible
    Unambiguous,
    /// The modifications could not be placed on the peptide at all
    Unlocalizable,
    /// The PSM could not be scored
    #[default]
    Unscored,
}

impl Display for LocalizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LocalizationStatus::Localized => "localized",
            LocalizationStatus::Ambiguous => "ambiguous",
            LocalizationStatus::Unambiguous => "unambiguous",
            LocalizationStatus::Unlocalizable => "unlocalizable",
            LocalizationStatus::Unscored => "unscored",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoredPlacement {
    pub placement: ModificationPlacement,
    pub best_depth: usize,
    pub matched_ions: usize,
    pub possible_ions: usize,
    pub score: ScoreType,
}

/// The localization confidence of one modified position of the best placement
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SiteScore {
    pub symbol: char,
    /// The 0-based residue position
    pub position: usize,
    /// The score gap to the best placement that does not use this position
    pub score: ScoreType,
    /// No competing placement leaves this position unmodified
    pub unambiguous: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalizationResult {
    pub psm_id: String,
    pub scan_number: u32,
    pub charge: i32,
    pub peptide: String,
    /// Every placement in descending score order
    pub ranked: Vec<ScoredPlacement>,
    pub a_score: ScoreType,
    pub status: LocalizationStatus,
    pub best_sequence: Option<String>,
    pub second_sequence: Option<String>,
    pub site_scores: Vec<SiteScore>,
    /// The largest score difference between the top two placements' site determining ions
    pub site_determining_score: Option<ScoreType>,
    pub error: Option<LocalizationError>,
}

impl LocalizationResult {
    fn empty(psm: &PeptideSpectrumMatch, status: LocalizationStatus, error: LocalizationError) -> Self {
        Self {
            psm_id: psm.id.clone(),
            scan_number: psm.scan_number,
            charge: psm.charge,
            peptide: psm.peptide.clone(),
            ranked: Vec::new(),
            a_score: 0.0,
            status,
            best_sequence: None,
            second_sequence: None,
            site_scores: Vec::new(),
            site_determining_score: None,
            error: Some(error),
        }
    }

    /// A result for a PSM that could not be scored
    pub fn unscored(psm: &PeptideSpectrumMatch, error: LocalizationError) -> Self {
        Self::empty(psm, LocalizationStatus::Unscored, error)
    }

    /// A result for a PSM whose modifications cannot be placed
    pub fn unlocalizable(psm: &PeptideSpectrumMatch, error: LocalizationError) -> Self {
        Self::empty(psm, LocalizationStatus::Unlocalizable, error)
    }

    pub fn best(&self) -> Option<&ScoredPlacement> {
        self.ranked.first()
    }

    pub fn runner_up(&self) -> Option<&ScoredPlacement> {
        self.ranked.get(1)
    }

    /// The score of the best placement, or 0 when nothing was scored
    pub fn peptide_score(&self) -> ScoreType {
        self.best().map(|p| p.score).unwrap_or_default()
    }

    pub fn is_scored(&self) -> bool {
        !self.ranked.is_empty()
    }
}

/// Ranks scored placements and compares the best against its competitors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteLocalizer {
    /// Scores closer than this are treated as tied
    pub tie_tolerance: ScoreType,
}

impl Default for SiteLocalizer {
    fn default() -> Self {
        Self {
            tie_tolerance: 1e-9,
        }
    }
}

impl SiteLocalizer {
    pub fn new(tie_tolerance: ScoreType) -> Self {
        Self { tie_tolerance }
    }

    /// Sort descending by score, breaking ties by ascending placement position order
    pub fn rank(&self, mut scored: Vec<ScoredPlacement>) -> Vec<ScoredPlacement> {
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.placement.cmp(&b.placement))
        });
        scored
    }

    /// The AScore and status of an already ranked list.
    ///
    /// A single placement reports its own score as the AScore with
    /// [`LocalizationStatus::Unambiguous`]. A tie for first place is
    /// [`LocalizationStatus::Ambiguous`] with an AScore of 0.
    pub fn a_score(&self, ranked: &[ScoredPlacement]) -> (ScoreType, LocalizationStatus) {
        match ranked {
            [] => (0.0, LocalizationStatus::Unlocalizable),
            [only] => (only.score, LocalizationStatus::Unambiguous),
            [first, second, ..] => {
                if isclose(first.score, second.score, self.tie_tolerance) {
                    (0.0, LocalizationStatus::Ambiguous)
                } else {
                    (first.score - second.score, LocalizationStatus::Localized)
                }
            }
        }
    }

    /// Score each modified position of the best placement against the best placement that
    /// does not put the same modification there
    pub fn site_scores(
        &self,
        ranked: &[ScoredPlacement],
        modifications: &ModificationSet,
    ) -> Vec<SiteScore> {
        let Some(best) = ranked.first() else {
            return Vec::new();
        };
        let mut scores = Vec::new();
        for (slot, positions) in best.placement.sites().iter().enumerate() {
            let symbol = modifications
                .get_dynamic(slot)
                .map(|m| m.symbol)
                .unwrap_or('?');
            let mut last = None;
            for position in positions.iter().copied() {
                if last == Some(position) {
                    continue;
                }
                last = Some(position);
                let competitor = ranked[1..]
                    .iter()
                    .find(|other| !other.placement.occupies(slot, position));
                let site = match competitor {
                    Some(other) => SiteScore {
                        symbol,
                        position,
                        score: best.score - other.score,
                        unambiguous: false,
                    },
                    None => SiteScore {
                        symbol,
                        position,
                        score: best.score,
                        unambiguous: true,
                    },
                };
                scores.push(site);
            }
        }
        scores
    }
}
