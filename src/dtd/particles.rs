//! Occurrence bounds for content-model particles
//!
//! A DTD only knows four occurrence indicators (none, `?`, `*`, `+`), but
//! combining them through nested groups produces arbitrary bounds, so the
//! model keeps a general (min, max) pair.

use serde::Serialize;

/// Occurrence bounds for a particle
/// None for max means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occurs {
    /// Minimum number of occurrences
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// No indicator (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// `?` (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// `*` (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// `+` (1, unbounded)
    pub fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Occurrence for a DTD indicator character
    pub fn from_indicator(indicator: Option<char>) -> Option<Self> {
        match indicator {
            None => Some(Self::once()),
            Some('?') => Some(Self::optional()),
            Some('*') => Some(Self::zero_or_more()),
            Some('+') => Some(Self::one_or_more()),
            Some(_) => None,
        }
    }

    /// The DTD indicator closest to these bounds
    pub fn indicator(&self) -> &'static str {
        match (self.is_required(), self.is_repeatable()) {
            (true, false) => "",
            (false, false) => "?",
            (false, true) => "*",
            (true, true) => "+",
        }
    }

    /// At least one occurrence is required (min >= 1)
    pub fn is_required(&self) -> bool {
        self.min >= 1
    }

    /// More than one occurrence is allowed
    pub fn is_repeatable(&self) -> bool {
        self.max != Some(1) && self.max != Some(0)
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// Combines occurrences along and across content-model paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccursCalculator {
    /// Calculated minimum occurrences
    pub min_occurs: u32,
    /// Calculated maximum occurrences (None = unbounded)
    pub max_occurs: Option<u32>,
}

impl OccursCalculator {
    /// Create a new calculator initialized to (0, 0)
    pub fn new() -> Self {
        Self {
            min_occurs: 0,
            max_occurs: Some(0),
        }
    }

    /// Start from existing bounds
    pub fn from_occurs(occurs: Occurs) -> Self {
        Self {
            min_occurs: occurs.min,
            max_occurs: occurs.max,
        }
    }

    /// Get as Occurs
    pub fn occurs(&self) -> Occurs {
        Occurs::new(self.min_occurs, self.max_occurs)
    }

    /// Add another appearance of the same particle
    pub fn add(&mut self, other: Occurs) {
        self.min_occurs = self.min_occurs.saturating_add(other.min);
        match (self.max_occurs, other.max) {
            (Some(a), Some(b)) => self.max_occurs = Some(a.saturating_add(b)),
            _ => self.max_occurs = None,
        }
    }

    /// Multiply by an enclosing particle's occurs
    pub fn multiply(&mut self, other: Occurs) {
        self.min_occurs = self.min_occurs.saturating_mul(other.min);
        match (self.max_occurs, other.max) {
            (None, Some(0)) | (Some(0), _) => self.max_occurs = Some(0),
            (Some(_), None) => self.max_occurs = None,
            (None, _) => {}
            (Some(a), Some(b)) => self.max_occurs = Some(a.saturating_mul(b)),
        }
    }

    /// Drop the lower bound, as membership in a choice does
    pub fn make_optional(&mut self) {
        self.min_occurs = 0;
    }

    /// Take the max of this and another (for choice branches)
    pub fn max_with(&mut self, other: Occurs) {
        self.min_occurs = self.min_occurs.min(other.min);
        match (self.max_occurs, other.max) {
            (None, _) | (_, None) => self.max_occurs = None,
            (Some(a), Some(b)) => self.max_occurs = Some(a.max(b)),
        }
    }
}

impl Default for OccursCalculator {
    fn default() -> Self {
        Self::new()
    }
}
