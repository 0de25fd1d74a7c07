//! Code address representation, in 16-bit code units from the start of a method body.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Addr(pub usize);

impl Addr {
    #[inline]
    #[must_use]
    pub const fn entry() -> Self {
        Self(0)
    }

    /// Applies a signed branch offset; returns `None` when the target would be negative.
    #[must_use]
    pub fn offset(self, offset: i32) -> Option<Self> {
        if offset.is_negative() {
            self.0
                .checked_sub(offset.unsigned_abs() as usize)
                .map(Self)
        } else {
            Some(Self(self.0 + offset.unsigned_abs() as usize))
        }
    }

    #[inline]
    #[must_use]
    pub const fn advance(self, units: usize) -> Self {
        Self(self.0 + units)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        assert_eq!(Addr(10).offset(-4), Some(Addr(6)));
        assert_eq!(Addr(10).offset(5), Some(Addr(15)));
        assert_eq!(Addr(2).offset(-3), None);
        assert_eq!(format!("{}", Addr(26)), "0x1a");
    }
}
