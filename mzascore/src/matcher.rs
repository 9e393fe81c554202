//! Match theoretical fragment ions against the most intense peaks of a spectrum
use mzpeaks::{prelude::*, CentroidPeak, Tolerance};

use crate::spectrum::Spectrum;

/// The default intensity depth cutoffs, the number of most intense peaks considered
pub const DEFAULT_DEPTHS: [usize; 13] = [1, 2, 3, 4, 6, 8, 10, 15, 20, 25, 30, 40, 50];

/// How the "top `d` peaks" of a spectrum are selected
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DepthMode {
    /// The `d` most intense peaks of the whole spectrum
    #[default]
    Global,
    /// The `d` most intense peaks within each consecutive m/z window of `width`
    PerWindow { width: f64 },
}

/// The absolute m/z error permitted around `peak_mz`
#[inline]
pub fn tolerance_width(peak_mz: f64, tolerance: Tolerance) -> f64 {
    match tolerance {
        Tolerance::PPM(ppm) => peak_mz * ppm / 1e6,
        Tolerance::Da(da) => da,
    }
}

/// Whether `ion_mz` lies within `tolerance` of an observed peak at `peak_mz`, inclusive of
/// the boundary
#[inline]
pub fn within_tolerance(ion_mz: f64, peak_mz: f64, tolerance: Tolerance) -> bool {
    (ion_mz - peak_mz).abs() <= tolerance_width(peak_mz, tolerance)
}

/// The intensity rank of every peak of a spectrum, indexed like the m/z sorted peak list.
///
/// Rank 0 is the most intense peak. Equal intensities are ranked by ascending m/z.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthRanks {
    ranks: Vec<u32>,
    max_rank: usize,
}

impl DepthRanks {
    fn rank_group(peaks: &[CentroidPeak], indices: &mut [usize], ranks: &mut [u32]) {
        indices.sort_by(|i, j| {
            peaks[*j]
                .intensity()
                .total_cmp(&peaks[*i].intensity())
                .then_with(|| peaks[*i].mz().total_cmp(&peaks[*j].mz()))
        });
        for (rank, i) in indices.iter().enumerate() {
            ranks[*i] = rank as u32;
        }
    }

    pub fn new(peaks: &[CentroidPeak], mode: DepthMode) -> Self {
        let mut ranks = vec![0u32; peaks.len()];
        let mut max_rank = 0;
        match mode {
            DepthMode::Global => {
                let mut indices: Vec<usize> = (0..peaks.len()).collect();
                Self::rank_group(peaks, &mut indices, &mut ranks);
                max_rank = peaks.len();
            }
            DepthMode::PerWindow { width } => {
                let mut start = 0;
                while start < peaks.len() {
                    let window = (peaks[start].mz() / width).floor();
                    let mut end = start + 1;
                    while end < peaks.len() && (peaks[end].mz() / width).floor() == window {
                        end += 1;
                    }
                    let mut indices: Vec<usize> = (start..end).collect();
                    Self::rank_group(peaks, &mut indices, &mut ranks);
                    max_rank = max_rank.max(end - start);
                    start = end;
                }
            }
        }
        Self { ranks, max_rank }
    }

    pub fn rank(&self, index: usize) -> u32 {
        self.ranks[index]
    }

    /// The largest depth that selects additional peaks
    pub fn max_depth(&self) -> usize {
        self.max_rank
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

/// Cap `depths` at `max_depth` and drop the duplicates that capping creates
pub fn effective_depths(depths: &[usize], max_depth: usize) -> Vec<usize> {
    let mut out: Vec<usize> = Vec::with_capacity(depths.len());
    for d in depths.iter().map(|d| (*d).min(max_depth)) {
        if d > 0 && out.last().map_or(true, |last| *last < d) {
            out.push(d);
        }
    }
    out
}

/// Counts theoretical ions supported by the most intense peaks of one spectrum at each
/// of several depth cutoffs.
///
/// Each ion's best rank among the peaks within tolerance is found once, so the counts for
/// every depth come from a single pass over the ions.
#[derive(Debug, Clone)]
pub struct PeakMatcher<'a> {
    spectrum: &'a Spectrum,
    ranks: DepthRanks,
    tolerance: Tolerance,
    depths: Vec<usize>,
}

impl<'a> PeakMatcher<'a> {
    pub fn new(
        spectrum: &'a Spectrum,
        tolerance: Tolerance,
        mode: DepthMode,
        depths: &[usize],
    ) -> Self {
        let ranks = DepthRanks::new(spectrum.as_slice(), mode);
        let depths = effective_depths(depths, ranks.max_depth());
        Self {
            spectrum,
            ranks,
            tolerance,
            depths,
        }
    }

    /// The depth cutoffs actually evaluated for this spectrum
    pub fn depths(&self) -> &[usize] {
        &self.depths
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// The smallest intensity rank among the peaks within tolerance of `mz`
    pub fn best_rank(&self, mz: f64) -> Option<u32> {
        let peaks = self.spectrum.as_slice();
        // The widest tolerance any candidate peak can have, padded for rounding
        let reach = match self.tolerance {
            Tolerance::PPM(ppm) => mz * ppm / 1e6 * 1.01 + 1e-9,
            Tolerance::Da(da) => da + 1e-9,
        };
        let lo = mz - reach;
        let hi = mz + reach;
        let start = peaks.partition_point(|p| p.mz() < lo);
        peaks[start..]
            .iter()
            .enumerate()
            .take_while(|(_, p)| p.mz() <= hi)
            .filter(|(_, p)| within_tolerance(mz, p.mz(), self.tolerance))
            .map(|(i, _)| self.ranks.rank(start + i))
            .min()
    }

    /// The number of `ions` matched within the `depth` most intense peaks
    pub fn count_matches(&self, ions: &[f64], depth: usize) -> usize {
        ions.iter()
            .filter(|mz| {
                self.best_rank(**mz)
                    .is_some_and(|rank| (rank as usize) < depth)
            })
            .count()
    }

    /// The number of matched `ions` at each of [`PeakMatcher::depths`]
    pub fn match_depths(&self, ions: &[f64]) -> Vec<usize> {
        let best: Vec<u32> = ions.iter().filter_map(|mz| self.best_rank(*mz)).collect();
        self.depths
            .iter()
            .map(|d| best.iter().filter(|r| (**r as usize) < *d).count())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn spectrum() -> Spectrum {
        Spectrum::from_pairs(
            1,
            800.0,
            2,
            vec![
                (200.0, 50.0),
                (300.0, 400.0),
                (1000.0, 100.0),
                (1100.0, 100.0),
                (1250.0, 10.0),
            ],
        )
    }

    #[test]
    fn test_ranks() {
        let s = spectrum();
        let ranks = DepthRanks::new(s.as_slice(), DepthMode::Global);
        let r: Vec<u32> = (0..ranks.len()).map(|i| ranks.rank(i)).collect();
        assert_eq!(r, vec![3, 0, 1, 2, 4]);

        let ranks = DepthRanks::new(s.as_slice(), DepthMode::PerWindow { width: 1000.0 });
        let r: Vec<u32> = (0..ranks.len()).map(|i| ranks.rank(i)).collect();
        assert_eq!(r, vec![1, 0, 0, 1, 2]);
        assert_eq!(ranks.max_depth(), 3);
    }

    #[test]
    fn test_boundary_inclusive_da() {
        let s = spectrum();
        let matcher = PeakMatcher::new(&s, Tolerance::Da(0.5), DepthMode::Global, &[5]);
        assert!(matcher.best_rank(1000.5).is_some());
        assert!(matcher.best_rank(999.5).is_some());
        assert!(matcher.best_rank(1000.5000001).is_none());
        assert!(matcher.best_rank(999.4999999).is_none());
    }

    #[test]
    fn test_boundary_inclusive_ppm() {
        let s = spectrum();
        // 250 ppm of 1000.0 is exactly 0.25
        let matcher = PeakMatcher::new(&s, Tolerance::PPM(250.0), DepthMode::Global, &[5]);
        assert!(matcher.best_rank(1000.25).is_some());
        assert!(matcher.best_rank(999.75).is_some());
        assert!(matcher.best_rank(1000.2500001).is_none());
        assert!(matcher.best_rank(999.7499999).is_none());
    }

    #[test]
    fn test_depths() {
        let s = spectrum();
        let matcher = PeakMatcher::new(
            &s,
            Tolerance::Da(0.1),
            DepthMode::Global,
            &[1, 2, 3, 4, 6, 8, 10],
        );
        assert_eq!(matcher.depths(), &[1, 2, 3, 4, 5]);
        let ions = [300.05, 1000.0, 1250.0, 700.0];
        assert_eq!(matcher.match_depths(&ions), vec![1, 2, 2, 2, 3]);
        assert_eq!(matcher.count_matches(&ions, 2), 2);
        // The same peak can support several ions
        assert_eq!(matcher.count_matches(&[300.0, 300.05], 1), 2);
    }

    #[test]
    fn test_effective_depths() {
        assert_eq!(effective_depths(&DEFAULT_DEPTHS, 7), vec![1, 2, 3, 4, 6, 7]);
        assert_eq!(effective_depths(&DEFAULT_DEPTHS, 0), Vec::<usize>::new());
    }
}
