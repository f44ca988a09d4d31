//! A generic label for the discrete variables tracked throughout the library

use std::fmt::{self, Display};

/// A label for each distinct variable of a factor-table problem. Labels are
/// dense non-negative indices: variable `v` indexes row `v` of the primal
/// graph and entry `v` of the domain-size vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Copy, PartialOrd, Ord)]
pub struct VarLabel(u64);

impl VarLabel {
    #[inline]
    pub fn new(v: u64) -> VarLabel {
        VarLabel(v)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn new_usize(v: usize) -> VarLabel {
        VarLabel::new(v as u64)
    }

    /// ```
    /// use rsbe::repr::VarLabel;
    /// assert_eq!(VarLabel::new(3).value_usize(), 3);
    /// ```
    pub fn value_usize(&self) -> usize {
        self.0 as usize
    }
}

impl Display for VarLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Index into a variable's domain; always in `0..dom_size(v)`.
pub type DomIndex = usize;
