use std::iter::Sum;
use std::ops::{Add, AddAssign};

use mzascore::{LocalizationResult, LocalizationStatus};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub psms: usize,
    pub localized: usize,
    pub ambiguous: usize,
    pub unambiguous: usize,
    pub unlocalizable: usize,
    pub unscored: usize,
    pub placements: usize,
}

impl From<&LocalizationResult> for ProgressRecord {
    fn from(result: &LocalizationResult) -> Self {
        let mut prog = ProgressRecord {
            psms: 1,
            placements: result.ranked.len(),
            ..Default::default()
        };
        match result.status {
            LocalizationStatus::Localized => prog.localized += 1,
            LocalizationStatus::Ambiguous => prog.ambiguous += 1,
            LocalizationStatus::Unambiguous => prog.unambiguous += 1,
            LocalizationStatus::Unlocalizable => prog.unlocalizable += 1,
            LocalizationStatus::Unscored => prog.unscored += 1,
        }
        prog
    }
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.psms += rhs.psms;
        self.localized += rhs.localized;
        self.ambiguous += rhs.ambiguous;
        self.unambiguous += rhs.unambiguous;
        self.unlocalizable += rhs.unlocalizable;
        self.unscored += rhs.unscored;
        self.placements += rhs.placements;
    }
}

impl Sum for ProgressRecord {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(ProgressRecord::default(), |acc, x| acc + x)
    }
}
