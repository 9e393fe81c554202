//! Modification definitions and the set of modifications in effect for a scoring run
use std::fmt::Display;

use crate::params::ParameterError;
use crate::residues::{is_residue, isclose, MassType};

/// The behavior-specific part of a [`Modification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModificationKind {
    /// Always present on every matching residue
    Static,
    /// Present a known number of times at ambiguous positions among the matching residues
    Dynamic {
        /// The number of instances of this modification one residue may carry
        max_per_site: u8,
    },
    /// Present on the peptide terminus regardless of which residue sits there
    Terminal { n_term: bool, c_term: bool },
}

impl Display for ModificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModificationKind::Static => f.write_str("static"),
            ModificationKind::Dynamic { .. } => f.write_str("dynamic"),
            ModificationKind::Terminal { .. } => f.write_str("terminal"),
        }
    }
}

/// A mass shift that may be applied to residues of a peptide.
///
/// Two modifications compare equal when their symbols, sites and kinds are identical
/// and their masses agree to within 1e-6 Da.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Modification {
    /// The character written after a residue to denote this modification
    pub symbol: char,
    pub monoisotopic_mass: f64,
    pub average_mass: f64,
    /// The residues this modification may be attached to. An empty list matches any residue.
    /// Terminal modifications ignore this list.
    pub sites: Vec<char>,
    pub kind: ModificationKind,
}

impl PartialEq for Modification {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
            && isclose(self.monoisotopic_mass, other.monoisotopic_mass, 1e-6)
            && isclose(self.average_mass, other.average_mass, 1e-6)
            && self.sites == other.sites
            && self.kind == other.kind
    }
}

impl Modification {
    pub fn new(
        symbol: char,
        monoisotopic_mass: f64,
        average_mass: f64,
        sites: Vec<char>,
        kind: ModificationKind,
    ) -> Self {
        Self {
            symbol,
            monoisotopic_mass,
            average_mass,
            sites,
            kind,
        }
    }

    pub fn new_static(symbol: char, monoisotopic_mass: f64, average_mass: f64, sites: &str) -> Self {
        Self::new(
            symbol,
            monoisotopic_mass,
            average_mass,
            sites.chars().collect(),
            ModificationKind::Static,
        )
    }

    pub fn new_dynamic(
        symbol: char,
        monoisotopic_mass: f64,
        average_mass: f64,
        sites: &str,
        max_per_site: u8,
    ) -> Self {
        Self::new(
            symbol,
            monoisotopic_mass,
            average_mass,
            sites.chars().collect(),
            ModificationKind::Dynamic { max_per_site },
        )
    }

    pub fn new_terminal(
        symbol: char,
        monoisotopic_mass: f64,
        average_mass: f64,
        n_term: bool,
        c_term: bool,
    ) -> Self {
        Self::new(
            symbol,
            monoisotopic_mass,
            average_mass,
            Vec::new(),
            ModificationKind::Terminal { n_term, c_term },
        )
    }

    #[inline]
    pub fn mass(&self, mass_type: MassType) -> f64 {
        match mass_type {
            MassType::Monoisotopic => self.monoisotopic_mass,
            MassType::Average => self.average_mass,
        }
    }

    #[inline]
    pub fn matches_residue(&self, residue: char) -> bool {
        self.sites.is_empty() || self.sites.contains(&residue)
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, ModificationKind::Dynamic { .. })
    }

    pub fn is_static(&self) -> bool {
        matches!(self.kind, ModificationKind::Static)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ModificationKind::Terminal { .. })
    }

    pub fn applies_to_n_term(&self) -> bool {
        matches!(self.kind, ModificationKind::Terminal { n_term: true, .. })
    }

    pub fn applies_to_c_term(&self) -> bool {
        matches!(self.kind, ModificationKind::Terminal { c_term: true, .. })
    }

    /// The number of instances one residue may carry, 1 for anything but a
    /// dynamic modification
    pub fn max_per_site(&self) -> usize {
        match self.kind {
            ModificationKind::Dynamic { max_per_site } => max_per_site as usize,
            _ => 1,
        }
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        if !self.monoisotopic_mass.is_finite() || !self.average_mass.is_finite() {
            return Err(ParameterError::InvalidModification {
                symbol: self.symbol,
                reason: "masses must be finite".into(),
            });
        }
        if let Some(residue) = self.sites.iter().find(|r| !is_residue(**r)) {
            return Err(ParameterError::InvalidModification {
                symbol: self.symbol,
                reason: format!("{residue:?} is not a known residue"),
            });
        }
        if self.symbol.is_ascii_alphanumeric() || self.symbol.is_whitespace() {
            return Err(ParameterError::InvalidModification {
                symbol: self.symbol,
                reason: "symbols cannot be letters, digits or whitespace".into(),
            });
        }
        match self.kind {
            ModificationKind::Dynamic { max_per_site: 0 } => {
                Err(ParameterError::InvalidModification {
                    symbol: self.symbol,
                    reason: "max_per_site must be at least 1".into(),
                })
            }
            ModificationKind::Terminal {
                n_term: false,
                c_term: false,
            } => Err(ParameterError::InvalidModification {
                symbol: self.symbol,
                reason: "a terminal modification must apply to at least one terminus".into(),
            }),
            _ => Ok(()),
        }
    }
}

/// The validated collection of modifications in effect for a scoring run.
///
/// Dynamic modifications are addressed by their *slot*, their index among the dynamic
/// modifications in declaration order. Placements and peptide counts use the same slots.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModificationSet {
    static_modifications: Vec<Modification>,
    terminal_modifications: Vec<Modification>,
    dynamic_modifications: Vec<Modification>,
}

impl ModificationSet {
    pub fn new(modifications: Vec<Modification>) -> Result<Self, ParameterError> {
        let mut this = Self::default();
        for modification in modifications {
            modification.validate()?;
            if modification.is_dynamic()
                && this
                    .dynamic_modifications
                    .iter()
                    .any(|m| m.symbol == modification.symbol)
            {
                return Err(ParameterError::DuplicateModification(modification.symbol));
            }
            match modification.kind {
                ModificationKind::Static => this.static_modifications.push(modification),
                ModificationKind::Dynamic { .. } => this.dynamic_modifications.push(modification),
                ModificationKind::Terminal { .. } => this.terminal_modifications.push(modification),
            }
        }
        Ok(this)
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        self.iter().try_for_each(|m| m.validate())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Modification> {
        self.static_modifications
            .iter()
            .chain(self.terminal_modifications.iter())
            .chain(self.dynamic_modifications.iter())
    }

    pub fn dynamic_modifications(&self) -> &[Modification] {
        &self.dynamic_modifications
    }

    pub fn static_modifications(&self) -> &[Modification] {
        &self.static_modifications
    }

    pub fn terminal_modifications(&self) -> &[Modification] {
        &self.terminal_modifications
    }

    pub fn dynamic_count(&self) -> usize {
        self.dynamic_modifications.len()
    }

    pub fn get_dynamic(&self, slot: usize) -> Option<&Modification> {
        self.dynamic_modifications.get(slot)
    }

    /// The total static modification mass bound to `residue`
    pub fn static_mass_for(&self, residue: char, mass_type: MassType) -> f64 {
        self.static_modifications
            .iter()
            .filter(|m| m.matches_residue(residue))
            .map(|m| m.mass(mass_type))
            .sum()
    }

    pub fn n_terminal_mass(&self, mass_type: MassType) -> f64 {
        self.terminal_modifications
            .iter()
            .filter(|m| m.applies_to_n_term())
            .map(|m| m.mass(mass_type))
            .sum()
    }

    pub fn c_terminal_mass(&self, mass_type: MassType) -> f64 {
        self.terminal_modifications
            .iter()
            .filter(|m| m.applies_to_c_term())
            .map(|m| m.mass(mass_type))
            .sum()
    }

    pub fn find_dynamic_by_symbol(&self, symbol: char) -> Option<usize> {
        self.dynamic_modifications
            .iter()
            .position(|m| m.symbol == symbol)
    }

    /// Find the dynamic modification slot whose monoisotopic or average mass is
    /// within `tolerance` Da of `mass`
    pub fn find_dynamic_by_mass(&self, mass: f64, tolerance: f64) -> Option<usize> {
        self.dynamic_modifications.iter().position(|m| {
            isclose(m.monoisotopic_mass, mass, tolerance) || isclose(m.average_mass, mass, tolerance)
        })
    }

    /// Find a non-dynamic modification that could explain a mass annotation
    pub fn find_fixed_by_mass(&self, mass: f64, tolerance: f64) -> Option<&Modification> {
        self.static_modifications
            .iter()
            .chain(self.terminal_modifications.iter())
            .find(|m| {
                isclose(m.monoisotopic_mass, mass, tolerance)
                    || isclose(m.average_mass, mass, tolerance)
            })
    }

    pub fn find_fixed_by_symbol(&self, symbol: char) -> Option<&Modification> {
        self.static_modifications
            .iter()
            .chain(self.terminal_modifications.iter())
            .find(|m| m.symbol == symbol)
    }
}
