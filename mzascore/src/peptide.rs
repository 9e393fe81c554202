//! Parsing annotated peptide sequences and rendering localized ones
use thiserror::Error;

use crate::modification::{Modification, ModificationSet};
use crate::placement::ModificationPlacement;
use crate::residues::is_residue;

/// The largest difference in Da between a mass annotation and a modification mass
/// for the two to be considered the same
pub const MASS_ANNOTATION_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PeptideParseError {
    #[error("The peptide sequence is empty")]
    Empty,
    #[error("Unknown residue {0:?} at position {1}")]
    UnknownResidue(char, usize),
    #[error("Modification annotation {0:?} at position {1} is not attached to a residue")]
    DanglingModification(String, usize),
    #[error("Modification annotation {0:?} does not match any modification")]
    UnknownModification(String),
    #[error("Modification {symbol:?} cannot be attached to residue {residue}")]
    ResidueMismatch { symbol: String, residue: char },
    #[error("Malformed mass annotation {0:?}")]
    MalformedMass(String),
}

/// A peptide sequence with the number of instances of each dynamic modification it carries.
///
/// The positions written in the annotated sequence are deliberately not retained since they
/// are what is being localized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peptide {
    residues: Vec<char>,
    dynamic_counts: Vec<usize>,
    prefix: Option<char>,
    suffix: Option<char>,
}

fn is_flank(c: char) -> bool {
    c == '-' || c.is_ascii_uppercase()
}

fn strip_flanks(notation: &str) -> (Option<char>, &str, Option<char>) {
    let chars: Vec<char> = notation.chars().collect();
    let n = chars.len();
    if n >= 4 && chars[1] == '.' && chars[n - 2] == '.' && is_flank(chars[0]) && is_flank(chars[n - 1])
    {
        let inner_start = chars[0].len_utf8() + 1;
        let inner_end = notation.len() - chars[n - 1].len_utf8() - 1;
        (
            Some(chars[0]),
            &notation[inner_start..inner_end],
            Some(chars[n - 1]),
        )
    } else {
        (None, notation, None)
    }
}

impl Peptide {
    /// Create a peptide directly from its residues and the per-slot dynamic modification counts
    pub fn new(residues: &str, dynamic_counts: Vec<usize>) -> Self {
        Self {
            residues: residues.chars().collect(),
            dynamic_counts,
            prefix: None,
            suffix: None,
        }
    }

    /// Parse an annotated sequence like `K.S*EQPT#K.L` or `S+79.966EQK`.
    ///
    /// Flanking residues are optional. Modifications are written after the residue they
    /// modify, either as a symbol or as a signed mass. Mass annotations before the first
    /// residue must match an N-terminal modification.
    pub fn parse(notation: &str, modifications: &ModificationSet) -> Result<Self, PeptideParseError> {
        let (prefix, body, suffix) = strip_flanks(notation.trim());
        let mut residues: Vec<char> = Vec::with_capacity(body.len());
        let mut dynamic_counts = vec![0usize; modifications.dynamic_count()];

        let chars: Vec<char> = body.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c.is_ascii_uppercase() {
                if !is_residue(c) {
                    return Err(PeptideParseError::UnknownResidue(c, residues.len()));
                }
                residues.push(c);
                i += 1;
            } else if c == '+' || c == '-' {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let token: String = chars[start..i].iter().collect();
                let mass: f64 = token
                    .parse()
                    .map_err(|_| PeptideParseError::MalformedMass(token.clone()))?;
                Self::resolve_mass(
                    &token,
                    mass,
                    residues.last().copied(),
                    modifications,
                    &mut dynamic_counts,
                )?;
            } else {
                let token = c.to_string();
                match residues.last().copied() {
                    Some(residue) => {
                        if let Some(slot) = modifications.find_dynamic_by_symbol(c) {
                            Self::check_residue(&token, residue, &modifications.dynamic_modifications()[slot])?;
                            dynamic_counts[slot] += 1;
                        } else if modifications.find_fixed_by_symbol(c).is_none() {
                            return Err(PeptideParseError::UnknownModification(token));
                        }
                    }
                    None => {
                        if !modifications
                            .find_fixed_by_symbol(c)
                            .is_some_and(|m| m.applies_to_n_term())
                        {
                            return Err(PeptideParseError::DanglingModification(token, 0));
                        }
                    }
                }
                i += 1;
            }
        }
        if residues.is_empty() {
            return Err(PeptideParseError::Empty);
        }
        Ok(Self {
            residues,
            dynamic_counts,
            prefix,
            suffix,
        })
    }

    fn check_residue(
        token: &str,
        residue: char,
        modification: &Modification,
    ) -> Result<(), PeptideParseError> {
        if modification.matches_residue(residue) {
            Ok(())
        } else {
            Err(PeptideParseError::ResidueMismatch {
                symbol: token.to_string(),
                residue,
            })
        }
    }

    fn resolve_mass(
        token: &str,
        mass: f64,
        residue: Option<char>,
        modifications: &ModificationSet,
        dynamic_counts: &mut [usize],
    ) -> Result<(), PeptideParseError> {
        let Some(residue) = residue else {
            return match modifications.find_fixed_by_mass(mass, MASS_ANNOTATION_TOLERANCE) {
                Some(m) if m.applies_to_n_term() => Ok(()),
                _ => Err(PeptideParseError::DanglingModification(token.to_string(), 0)),
            };
        };
        if let Some(slot) = modifications.find_dynamic_by_mass(mass, MASS_ANNOTATION_TOLERANCE) {
            Self::check_residue(token, residue, &modifications.dynamic_modifications()[slot])?;
            dynamic_counts[slot] += 1;
            return Ok(());
        }
        match modifications.find_fixed_by_mass(mass, MASS_ANNOTATION_TOLERANCE) {
            Some(m) if m.is_terminal() || m.matches_residue(residue) => Ok(()),
            Some(m) => Err(PeptideParseError::ResidueMismatch {
                symbol: m.symbol.to_string(),
                residue,
            }),
            None => Err(PeptideParseError::UnknownModification(token.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    pub fn residues(&self) -> &[char] {
        &self.residues
    }

    /// The unmodified residue sequence
    pub fn sequence(&self) -> String {
        self.residues.iter().collect()
    }

    pub fn dynamic_counts(&self) -> &[usize] {
        &self.dynamic_counts
    }

    pub fn dynamic_count(&self, slot: usize) -> usize {
        self.dynamic_counts.get(slot).copied().unwrap_or_default()
    }

    pub fn prefix(&self) -> Option<char> {
        self.prefix
    }

    pub fn suffix(&self) -> Option<char> {
        self.suffix
    }

    /// The positions eligible to carry `modification`
    pub fn candidate_sites(&self, modification: &Modification) -> Vec<usize> {
        self.residues
            .iter()
            .enumerate()
            .filter(|(_, r)| modification.matches_residue(**r))
            .map(|(i, _)| i)
            .collect()
    }

    /// Write the sequence with each dynamic modification symbol after the residue
    /// `placement` assigns it to, restoring any flanking residues.
    pub fn render(&self, placement: &ModificationPlacement, modifications: &ModificationSet) -> String {
        let mut buffer = String::with_capacity(self.residues.len() * 2 + 4);
        if let Some(prefix) = self.prefix {
            buffer.push(prefix);
            buffer.push('.');
        }
        for (i, residue) in self.residues.iter().enumerate() {
            buffer.push(*residue);
            for slot in placement.modifications_at(i) {
                if let Some(m) = modifications.get_dynamic(slot) {
                    buffer.push(m.symbol);
                }
            }
        }
        if let Some(suffix) = self.suffix {
            buffer.push('.');
            buffer.push(suffix);
        }
        buffer
    }
}
