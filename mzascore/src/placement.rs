//! Enumerate the ways a peptide's dynamic modifications can be distributed over its candidate sites
use itertools::Itertools;
use tracing::trace;

use crate::localizer::LocalizationError;
use crate::modification::ModificationSet;
use crate::peptide::Peptide;

/// One concrete assignment of every dynamic modification instance to a residue position.
///
/// `sites[slot]` holds the sorted 0-based positions occupied by the dynamic modification in
/// that slot, repeated when a residue carries more than one instance. The derived ordering
/// is lexicographic over positions and is used to break score ties.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModificationPlacement {
    sites: Vec<Vec<usize>>,
}

impl ModificationPlacement {
    pub fn new(mut sites: Vec<Vec<usize>>) -> Self {
        sites.iter_mut().for_each(|s| s.sort_unstable());
        Self { sites }
    }

    pub fn sites(&self) -> &[Vec<usize>] {
        &self.sites
    }

    pub fn sites_for(&self, slot: usize) -> &[usize] {
        self.sites.get(slot).map(|s| s.as_slice()).unwrap_or_default()
    }

    pub fn occupies(&self, slot: usize, position: usize) -> bool {
        self.sites_for(slot).contains(&position)
    }

    /// The slots of every modification instance placed on `position`
    pub fn modifications_at(&self, position: usize) -> impl Iterator<Item = usize> + '_ {
        self.sites.iter().enumerate().flat_map(move |(slot, positions)| {
            positions
                .iter()
                .filter(move |p| **p == position)
                .map(move |_| slot)
        })
    }

    /// The number of modification instances placed
    pub fn len(&self) -> usize {
        self.sites.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The constraints for placing one dynamic modification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementRequest {
    pub candidates: Vec<usize>,
    pub count: usize,
    pub max_per_site: usize,
}

impl PlacementRequest {
    pub fn new(candidates: Vec<usize>, count: usize, max_per_site: usize) -> Self {
        Self {
            candidates,
            count,
            max_per_site: max_per_site.max(1),
        }
    }

    /// Every distinct choice of positions for this modification alone
    pub fn choices(&self) -> Vec<Vec<usize>> {
        if self.count == 0 {
            return vec![Vec::new()];
        }
        if self.max_per_site == 1 {
            self.candidates
                .iter()
                .copied()
                .combinations(self.count)
                .collect()
        } else {
            self.candidates
                .iter()
                .copied()
                .combinations_with_replacement(self.count)
                .filter(|choice| {
                    choice
                        .iter()
                        .dedup_with_count()
                        .all(|(n, _)| n <= self.max_per_site)
                })
                .collect()
        }
    }

    /// The number of choices without materializing them
    pub fn choice_count(&self) -> u128 {
        bounded_compositions(self.candidates.len(), self.count, self.max_per_site)
    }
}

/// The number of ways to place `count` indistinguishable items in `slots` bins holding at
/// most `capacity` each. With `capacity == 1` this is the binomial coefficient.
fn bounded_compositions(slots: usize, count: usize, capacity: usize) -> u128 {
    let mut ways = vec![0u128; count + 1];
    ways[0] = 1;
    for _ in 0..slots {
        let mut next = vec![0u128; count + 1];
        for (filled, w) in ways.iter().enumerate() {
            if *w == 0 {
                continue;
            }
            for extra in 0..=capacity.min(count - filled) {
                next[filled + extra] = next[filled + extra].saturating_add(*w);
            }
        }
        ways = next;
    }
    ways[count]
}

/// Generates every distinct [`ModificationPlacement`] for a set of [`PlacementRequest`]s,
/// one per dynamic modification slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementGenerator {
    requests: Vec<PlacementRequest>,
}

impl PlacementGenerator {
    pub fn new(requests: Vec<PlacementRequest>) -> Self {
        Self { requests }
    }

    /// Build the requests for `peptide`, failing when a dynamic modification needs more
    /// sites than the peptide can offer.
    pub fn from_peptide(
        peptide: &Peptide,
        modifications: &ModificationSet,
    ) -> Result<Self, LocalizationError> {
        let mut requests = Vec::with_capacity(modifications.dynamic_count());
        for (slot, modification) in modifications.dynamic_modifications().iter().enumerate() {
            let count = peptide.dynamic_count(slot);
            let candidates = peptide.candidate_sites(modification);
            let max_per_site = modification.max_per_site();
            if count > candidates.len() * max_per_site {
                return Err(LocalizationError::NoCandidateSites {
                    symbol: modification.symbol,
                    required: count,
                    available: candidates.len(),
                });
            }
            requests.push(PlacementRequest::new(candidates, count, max_per_site));
        }
        Ok(Self::new(requests))
    }

    pub fn requests(&self) -> &[PlacementRequest] {
        &self.requests
    }

    /// The number of placements before positions shared between different
    /// modifications are excluded, the product of the per-modification choice counts
    pub fn unfiltered_count(&self) -> u128 {
        self.requests
            .iter()
            .map(|r| r.choice_count())
            .fold(1u128, |acc, n| acc.saturating_mul(n))
    }

    /// Produce every placement in ascending order, excluding those that put two different
    /// modifications on the same residue.
    pub fn generate(&self) -> Vec<ModificationPlacement> {
        let mut partial: Vec<Vec<Vec<usize>>> = vec![Vec::new()];
        for request in self.requests.iter() {
            let choices = request.choices();
            let mut next = Vec::with_capacity(partial.len() * choices.len());
            for prefix in partial.iter() {
                for choice in choices.iter() {
                    let collides = choice
                        .iter()
                        .any(|p| prefix.iter().any(|taken| taken.contains(p)));
                    if collides {
                        continue;
                    }
                    let mut extended = prefix.clone();
                    extended.push(choice.clone());
                    next.push(extended);
                }
            }
            partial = next;
        }
        trace!(
            "Generated {} placements from {} unfiltered combinations",
            partial.len(),
            self.unfiltered_count()
        );
        partial.into_iter().map(ModificationPlacement::new).collect()
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;
    use crate::modification::Modification;

    #[test]
    fn test_single_modification_counts() {
        let gen = PlacementGenerator::new(vec![PlacementRequest::new(vec![1, 4, 7, 9], 2, 1)]);
        let placements = gen.generate();
        assert_eq!(gen.unfiltered_count(), 6);
        assert_eq!(placements.len(), 6);
        let unique: HashSet<_> = placements.iter().collect();
        assert_eq!(unique.len(), placements.len());
        assert_eq!(placements[0].sites_for(0), &[1, 4]);
    }

    #[test]
    fn test_cross_product_with_exclusivity() {
        // Positions 3 and 5 are shared between both modifications
        let gen = PlacementGenerator::new(vec![
            PlacementRequest::new(vec![1, 3, 5], 1, 1),
            PlacementRequest::new(vec![3, 5, 8], 2, 1),
        ]);
        assert_eq!(gen.unfiltered_count(), 3 * 3);
        let placements = gen.generate();
        // 9 combinations minus those where the first modification lands on the second's sites
        // {3}x{3,5},{3,8} and {5}x{3,5},{5,8}
        assert_eq!(placements.len(), 9 - 4);
        for p in placements.iter() {
            for pos in p.sites_for(0) {
                assert!(!p.sites_for(1).contains(pos));
            }
        }
        let unique: HashSet<_> = placements.iter().collect();
        assert_eq!(unique.len(), placements.len());
    }

    #[test]
    fn test_product_formula() {
        let requests = vec![
            PlacementRequest::new((0..6).collect(), 3, 1),
            PlacementRequest::new(vec![10, 11, 12, 13], 1, 1),
            PlacementRequest::new(vec![20, 21], 2, 1),
        ];
        let gen = PlacementGenerator::new(requests);
        assert_eq!(gen.unfiltered_count(), 20 * 4);
        assert_eq!(gen.generate().len(), 80);
    }

    #[test]
    fn test_degenerate_single_placement() {
        let gen = PlacementGenerator::new(vec![PlacementRequest::new(vec![2, 5], 2, 1)]);
        let placements = gen.generate();
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].sites_for(0), &[2, 5]);
    }

    #[test]
    fn test_zero_count_and_no_modifications() {
        let gen = PlacementGenerator::new(vec![PlacementRequest::new(vec![2, 5], 0, 1)]);
        let placements = gen.generate();
        assert_eq!(placements.len(), 1);
        assert!(placements[0].is_empty());

        let gen = PlacementGenerator::new(vec![]);
        assert_eq!(gen.generate().len(), 1);
    }

    #[test]
    fn test_max_per_site() {
        let request = PlacementRequest::new(vec![1, 2, 3], 2, 2);
        // {1,1} {1,2} {1,3} {2,2} {2,3} {3,3}
        assert_eq!(request.choice_count(), 6);
        assert_eq!(request.choices().len(), 6);

        let request = PlacementRequest::new(vec![1, 2], 3, 2);
        // {1,1,2} {1,2,2}
        assert_eq!(request.choice_count(), 2);
        assert_eq!(request.choices().len(), 2);
    }

    #[test]
    fn test_from_peptide() {
        let mods =
            ModificationSet::new(vec![Modification::new_dynamic('*', 79.966, 79.98, "ST", 1)])
                .unwrap();
        let peptide = Peptide::parse("PEPS*TIDE", &mods).unwrap();
        let gen = PlacementGenerator::from_peptide(&peptide, &mods).unwrap();
        assert_eq!(gen.requests()[0].candidates, vec![3, 4]);
        assert_eq!(gen.generate().len(), 2);

        let peptide = Peptide::parse("PES*T*IDES*", &mods).unwrap();
        let gen = PlacementGenerator::from_peptide(&peptide, &mods).unwrap();
        assert_eq!(gen.generate().len(), 1);

        let peptide = Peptide::new("PEPTIDE", vec![2]);
        let err = PlacementGenerator::from_peptide(&peptide, &mods).unwrap_err();
        assert_eq!(
            err,
            LocalizationError::NoCandidateSites {
                symbol: '*',
                required: 2,
                available: 1
            }
        );
    }
}
