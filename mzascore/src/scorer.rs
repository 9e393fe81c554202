//! Convert ion match counts into localization scores
use tracing::trace;

pub type ScoreType = f64;

/// The score assigned when the tail probability underflows, `-10 * log10` of the smallest
/// normal `f64`
pub const MAX_SCORE: ScoreType = 3076.526555685888;

#[inline]
fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// The natural logarithm of `P[X >= k]` for `X ~ Binomial(n, p)` with `0 < p < 1` and
/// `1 <= k <= n`.
///
/// Terms are accumulated in log space from `i = n` down to `i = k`, with the binomial
/// coefficient carried by the recurrence `C(n, i - 1) = C(n, i) * i / (n - i + 1)`. Because
/// the tail for `k` extends the exact same sequence of operations as the tail for `k + 1`,
/// the result is non-increasing in `k` even after rounding.
pub fn ln_binomial_tail(p: f64, n: usize, k: usize) -> f64 {
    let ln_p = p.ln();
    let ln_q = (-p).ln_1p();
    let mut ln_choose = 0.0;
    let mut acc = f64::NEG_INFINITY;
    let mut i = n;
    loop {
        let term = ln_choose + i as f64 * ln_p + (n - i) as f64 * ln_q;
        acc = log_add_exp(acc, term);
        if i <= k {
            break;
        }
        ln_choose += (i as f64 / (n - i + 1) as f64).ln();
        i -= 1;
    }
    acc
}

/// `-10 * log10(P[X >= k])` for `X ~ Binomial(n, p)`, clamped to `[0, MAX_SCORE]`.
///
/// # Edge cases
/// - `k == 0`, `n == 0` or `p >= 1`: the tail probability is 1, so the score is 0
/// - `k > n` or `p <= 0` with `k > 0`: the tail probability is 0, so the score is [`MAX_SCORE`]
pub fn binomial_tail_score(p: f64, n: usize, k: usize) -> ScoreType {
    if k == 0 || n == 0 || p >= 1.0 || p.is_nan() {
        return 0.0;
    }
    if k > n || p <= 0.0 {
        return MAX_SCORE;
    }
    let ln_tail = ln_binomial_tail(p, n, k);
    let score = -10.0 * ln_tail * std::f64::consts::LOG10_E;
    if !score.is_finite() {
        MAX_SCORE
    } else {
        score.clamp(0.0, MAX_SCORE)
    }
}

/// The best score of a placement across the depth cutoffs
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DepthScore {
    pub depth: usize,
    pub matched_ions: usize,
    pub possible_ions: usize,
    pub score: ScoreType,
}

/// A strategy for scoring how many theoretical ions were matched at one intensity depth
pub trait PlacementScorer {
    fn score_depth(&self, matched: usize, possible: usize, depth: usize) -> ScoreType;

    /// Score every depth and keep the maximum, preferring the smallest depth on ties
    fn best_depth(&self, matches: &[usize], depths: &[usize], possible: usize) -> DepthScore {
        let mut best = DepthScore {
            depth: 0,
            matched_ions: 0,
            possible_ions: possible,
            score: 0.0,
        };
        let mut first = true;
        for (matched, depth) in matches.iter().copied().zip(depths.iter().copied()) {
            let score = self.score_depth(matched, possible, depth);
            trace!("depth {depth}: {matched}/{possible} -> {score}");
            if first || score > best.score {
                best = DepthScore {
                    depth,
                    matched_ions: matched,
                    possible_ions: possible,
                    score,
                };
                first = false;
            }
        }
        best
    }
}

/// The AScore cumulative binomial model.
///
/// The chance that an arbitrary theoretical ion is matched by one of the `d` most intense
/// peaks is taken to be `p = d / mz_window`, so with the default 100 m/z window a depth of
/// 9 peaks gives `p = 0.09`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinomialScorer {
    pub mz_window: f64,
}

impl BinomialScorer {
    pub fn new(mz_window: f64) -> Self {
        Self { mz_window }
    }

    #[inline]
    pub fn probability(&self, depth: usize) -> f64 {
        (depth as f64 / self.mz_window).min(1.0)
    }
}

impl Default for BinomialScorer {
    fn default() -> Self {
        Self { mz_window: 100.0 }
    }
}

impl PlacementScorer for BinomialScorer {
    #[inline]
    fn score_depth(&self, matched: usize, possible: usize, depth: usize) -> ScoreType {
        binomial_tail_score(self.probability(depth), possible, matched)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::residues::isclose;

    #[test]
    fn test_calibration_triple() {
        let score = binomial_tail_score(0.09, 12, 6);
        assert!(isclose(score, 35.17099, 1e-5), "{score}");
        let scorer = BinomialScorer::default();
        assert_eq!(scorer.score_depth(6, 12, 9), score);
    }

    #[test]
    fn test_small_cases() {
        // P[X >= 1] = 1 - (1 - p)^n
        let p: f64 = 0.2;
        let expected = -10.0 * (1.0 - (1.0 - p).powi(5)).log10();
        assert!(isclose(binomial_tail_score(p, 5, 1), expected, 1e-9));
        // P[X >= n] = p^n
        let expected = -10.0 * p.powi(5).log10();
        assert!(isclose(binomial_tail_score(p, 5, 5), expected, 1e-9));
    }

    #[test]
    fn test_monotone_in_k() {
        for n in [1usize, 2, 5, 12, 40, 200, 1000] {
            for p in [1e-4, 0.01, 0.09, 0.25, 0.5, 0.9, 0.9999] {
                let mut last = -1.0;
                for k in 0..=n {
                    let s = binomial_tail_score(p, n, k);
                    assert!(s >= last, "n={n} p={p} k={k}: {s} < {last}");
                    assert!(s.is_finite());
                    last = s;
                }
            }
        }
    }

    #[test]
    fn test_clamping() {
        assert_eq!(binomial_tail_score(0.5, 0, 0), 0.0);
        assert_eq!(binomial_tail_score(0.5, 10, 0), 0.0);
        assert_eq!(binomial_tail_score(1.0, 10, 10), 0.0);
        assert_eq!(binomial_tail_score(0.0, 10, 1), MAX_SCORE);
        assert_eq!(binomial_tail_score(0.5, 10, 11), MAX_SCORE);
        // p^n underflows to zero without log space accumulation
        let s = binomial_tail_score(1e-4, 2000, 2000);
        assert_eq!(s, MAX_SCORE);
        let s = binomial_tail_score(1e-2, 100, 100);
        assert!(isclose(s, 2000.0, 1e-6), "{s}");
    }

    #[test]
    fn test_best_depth_prefers_smallest() {
        struct Constant;
        impl PlacementScorer for Constant {
            fn score_depth(&self, _matched: usize, _possible: usize, _depth: usize) -> ScoreType {
                5.0
            }
        }
        let best = Constant.best_depth(&[1, 2, 3], &[1, 2, 3], 10);
        assert_eq!(best.depth, 1);

        let scorer = BinomialScorer::default();
        let best = scorer.best_depth(&[4, 6, 6], &[1, 2, 3], 10);
        assert_eq!(best.depth, 2);
        assert_eq!(best.matched_ions, 6);

        let empty = scorer.best_depth(&[], &[], 10);
        assert_eq!(empty.score, 0.0);
        assert_eq!(empty.depth, 0);
    }
}
