use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use ordered_float::OrderedFloat;

use crate::error::{ModelError, Result};

/// Volume or chapter identifier.
///
/// `LooseLeaf` means "no number was detected" and is never equal to a
/// numeric zero. `Special` marks chapters that sit outside the numbered run
/// (omake, one-shots, extras).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Numbering {
    #[default]
    LooseLeaf,
    Special,
    Number(OrderedFloat<f64>),
    Range {
        start: OrderedFloat<f64>,
        end: OrderedFloat<f64>,
    },
}

impl Numbering {
    pub fn number(value: f64) -> Self {
        Numbering::Number(OrderedFloat(value))
    }

    /// Build a range, collapsing `n-n` into a single number.
    pub fn range(start: f64, end: f64) -> Result<Self> {
        if start > end {
            return Err(ModelError::InvalidRange { start, end });
        }
        if start == end {
            return Ok(Numbering::number(start));
        }
        Ok(Numbering::Range {
            start: OrderedFloat(start),
            end: OrderedFloat(end),
        })
    }

    pub fn is_loose_leaf(&self) -> bool {
        matches!(self, Numbering::LooseLeaf)
    }

    pub fn is_special(&self) -> bool {
        matches!(self, Numbering::Special)
    }

    fn sort_key(&self) -> (u8, OrderedFloat<f64>, OrderedFloat<f64>, u8) {
        match self {
            Numbering::Number(n) => (0, *n, *n, 0),
            Numbering::Range { start, end } => (0, *start, *end, 1),
            Numbering::LooseLeaf => (1, OrderedFloat(0.0), OrderedFloat(0.0), 0),
            Numbering::Special => (2, OrderedFloat(0.0), OrderedFloat(0.0), 0),
        }
    }
}

// Numbered entries first in numeric order, then loose leaf, then specials.
impl Ord for Numbering {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Numbering {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Numbering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Numbering::LooseLeaf => f.write_str("loose-leaf"),
            Numbering::Special => f.write_str("special"),
            Numbering::Number(n) => write!(f, "{}", n.0),
            Numbering::Range { start, end } => write!(f, "{}-{}", start.0, end.0),
        }
    }
}

impl FromStr for Numbering {
    type Err = ModelError;

    /// Accepts `12`, `001.5`, `1-3` and the sentinel spellings produced by
    /// `Display`.
    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" => return Err(ModelError::InvalidNumbering(raw.to_string())),
            "loose-leaf" => return Ok(Numbering::LooseLeaf),
            "special" => return Ok(Numbering::Special),
            _ => {}
        }

        let parse = |part: &str| -> Result<f64> {
            part.trim()
                .replace(',', ".")
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite() && *value >= 0.0)
                .ok_or_else(|| ModelError::InvalidNumbering(raw.to_string()))
        };

        match trimmed.split_once('-') {
            Some((start, end)) if !start.trim().is_empty() => {
                Numbering::range(parse(start)?, parse(end)?)
            }
            _ => Ok(Numbering::number(parse(trimmed)?)),
        }
    }
}
