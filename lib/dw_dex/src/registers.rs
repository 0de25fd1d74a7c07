//! Register operands of Dalvik instructions.
//!
//! Registers are addressed on 4, 8 or 16 bits depending on the instruction format; they are all
//! widened to a [register](Reg) wrapper over a 16 bits slot number so that analyses never have to
//! care about the encoding. Argument groups of invoke-kind instructions are either explicit
//! [lists](RegList) or consecutive [ranges](RegRange).

use crate::errors::{DexError, DexResult};
use serde::Serialize;
use std::fmt;

/// A register slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Reg(u16);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u8> for Reg {
    fn from(r: u8) -> Self {
        Self(u16::from(r))
    }
}

impl From<u16> for Reg {
    fn from(r: u16) -> Self {
        Self(r)
    }
}

impl From<Reg> for u16 {
    fn from(r: Reg) -> Self {
        r.0
    }
}

impl Reg {
    /// Returns the wrapped register slot number.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns the slot number as an index usable on register files.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the following register, i.e. the high half of a wide pair starting at `self`.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// An explicit list of at most five registers (`35c`-like formats).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct RegList(Vec<Reg>);

impl fmt::Display for RegList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, reg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{reg}")?;
        }
        write!(f, "}}")
    }
}

impl<T> From<Vec<T>> for RegList
where
    Reg: From<T>,
{
    fn from(args: Vec<T>) -> Self {
        Self(args.into_iter().map(Reg::from).collect())
    }
}

impl RegList {
    /// Builds a list, checking the 5 registers limit of the encoding.
    pub fn new(regs: Vec<Reg>) -> DexResult<Self> {
        if regs.len() > 5 {
            return Err(DexError::Structure(format!(
                "register list holds {} registers (max. 5)",
                regs.len()
            )));
        }
        Ok(Self(regs))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first register of the list, the receiver for instance invocations.
    #[must_use]
    pub fn first(&self) -> Option<Reg> {
        self.0.first().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Reg> + '_ {
        self.0.iter().copied()
    }
}

/// A range of consecutive registers (`3rc`-like formats).
///
/// The range is stored as a start register and a count so that empty ranges can be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegRange {
    start: Reg,
    count: u16,
}

impl fmt::Display for RegRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.last() {
            Some(last) => write!(f, "{{{} .. {}}}", self.start, last),
            None => write!(f, "{{}}"),
        }
    }
}

impl RegRange {
    #[must_use]
    pub fn new(start: impl Into<Reg>, count: u16) -> Self {
        Self {
            start: start.into(),
            count,
        }
    }

    /// Returns the first register of the range (even for empty ranges).
    #[inline]
    #[must_use]
    pub const fn start(&self) -> Reg {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn count(&self) -> u16 {
        self.count
    }

    /// Returns the last register of the range, if any.
    #[must_use]
    pub fn last(&self) -> Option<Reg> {
        if self.count == 0 {
            None
        } else {
            Some(Reg(self.start.0 + self.count - 1))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Reg> {
        let start = self.start.0;
        (start..start + self.count).map(Reg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reglist_limit() {
        assert!(RegList::new(vec![Reg::from(0u8); 5]).is_ok());
        assert!(RegList::new(vec![Reg::from(0u8); 6]).is_err());
    }

    #[test]
    fn test_range_iter() {
        let range = RegRange::new(3u16, 3);
        let regs: Vec<u16> = range.iter().map(Reg::value).collect();
        assert_eq!(regs, vec![3, 4, 5]);
        assert_eq!(range.last(), Some(Reg::from(5u16)));
        assert_eq!(format!("{range}"), "{v3 .. v5}");
    }

    #[test]
    fn test_empty_range() {
        let range = RegRange::new(7u16, 0);
        assert_eq!(range.iter().count(), 0);
        assert_eq!(range.last(), None);
        assert_eq!(range.start().value(), 7);
    }

    #[test]
    fn test_reglist_display() {
        let list = RegList::from(vec![1u8, 2u8]);
        assert_eq!(format!("{list}"), "{v1, v2}");
        assert_eq!(list.first(), Some(Reg::from(1u8)));
    }
}
