//! Register types lattice.
//!
//! Each register of a method holds, at each instruction, a [`RegisterType`]: a category from the
//! lattice below, plus a class prototype for reference categories. Integer literals are tracked
//! finely (`Null`, `One`, `PosByte`...) so that a later use can still give them a precise type.
//! Joins follow a fixed table, except for references that join to their common superclass.

use crate::classpath::errors::{ClassPathError, ClassPathResult};
use crate::classpath::{ClassPath, TypeProto};
use dw_dex::types::Type;
use std::fmt;
use std::sync::Arc;

/// Register type categories, in lattice table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Category {
    Unknown,
    Uninit,
    Null,
    One,
    Boolean,
    Byte,
    PosByte,
    Short,
    PosShort,
    Char,
    Integer,
    Float,
    LongLo,
    LongHi,
    DoubleLo,
    DoubleHi,
    UninitRef,
    UninitThis,
    Reference,
    Conflicted,
}

const CATEGORIES: usize = 20;

impl Category {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Uninit => "Uninit",
            Self::Null => "Null",
            Self::One => "One",
            Self::Boolean => "Boolean",
            Self::Byte => "Byte",
            Self::PosByte => "PosByte",
            Self::Short => "Short",
            Self::PosShort => "PosShort",
            Self::Char => "Char",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::LongLo => "LongLo",
            Self::LongHi => "LongHi",
            Self::DoubleLo => "DoubleLo",
            Self::DoubleHi => "DoubleHi",
            Self::UninitRef => "UninitRef",
            Self::UninitThis => "UninitThis",
            Self::Reference => "Reference",
            Self::Conflicted => "Conflicted",
        }
    }

    /// Join of two categories.
    #[inline]
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        MERGE[self as usize][other as usize]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

macro_rules! row {
    ( $( $c:ident ),* ) => { [ $( Category::$c ),* ] };
}

#[rustfmt::skip]
const MERGE: [[Category; CATEGORIES]; CATEGORIES] = [
    //   Unknown     Uninit      Null        One         Boolean     Byte        PosByte     Short       PosShort    Char        Integer     Float       LongLo      LongHi      DoubleLo    DoubleHi    UninitRef   UninitThis  Reference   Conflicted
    row![Unknown,    Uninit,     Null,       One,        Boolean,    Byte,       PosByte,    Short,      PosShort,   Char,       Integer,    Float,      LongLo,     LongHi,     DoubleLo,   DoubleHi,   UninitRef,  UninitThis, Reference,  Conflicted],
    row![Uninit,     Uninit,     Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted],
    row![Null,       Conflicted, Null,       Boolean,    Boolean,    Byte,       PosByte,    Short,      PosShort,   Char,       Integer,    Float,      Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Reference,  Conflicted],
    row![One,        Conflicted, Boolean,    One,        Boolean,    Byte,       PosByte,    Short,      PosShort,   Char,       Integer,    Float,      Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted],
    row![Boolean,    Conflicted, Boolean,    Boolean,    Boolean,    Byte,       PosByte,    Short,      PosShort,   Char,       Integer,    Float,      Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted],
    row![Byte,       Conflicted, Byte,       Byte,       Byte,       Byte,       Byte,       Short,      Short,      Integer,    Integer,    Float,      Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted],
    row![PosByte,    Conflicted, PosByte,    PosByte,    PosByte,    Byte,       PosByte,    Short,      PosShort,   Char,       Integer,    Float,      Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted],
    row![Short,      Conflicted, Short,      Short,      Short,      Short,      Short,      Short,      Short,      Integer,    Integer,    Float,      Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted],
    row![PosShort,   Conflicted, PosShort,   PosShort,   PosShort,   Short,      PosShort,   Short,      PosShort,   Char,       Integer,    Float,      Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted],
    row![Char,       Conflicted, Char,       Char,       Char,       Integer,    Char,       Integer,    Char,       Char,       Integer,    Float,      Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted],
    row![Integer,    Conflicted, Integer,    Integer,    Integer,    Integer,    Integer,    Integer,    Integer,    Integer,    Integer,    Integer,    Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted],
    row![Float,      Conflicted, Float,      Float,      Float,      Float,      Float,      Float,      Float,      Float,      Integer,    Float,      Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted],
    row![LongLo,     Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, LongLo,     Conflicted, LongLo,     Conflicted, Conflicted, Conflicted, Conflicted, Conflicted],
    row![LongHi,     Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, LongHi,     Conflicted, LongHi,     Conflicted, Conflicted, Conflicted, Conflicted],
    row![DoubleLo,   Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, LongLo,     Conflicted, DoubleLo,   Conflicted, Conflicted, Conflicted, Conflicted, Conflicted],
    row![DoubleHi,   Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, LongHi,     Conflicted, DoubleHi,   Conflicted, Conflicted, Conflicted, Conflicted],
    row![UninitRef,  Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted],
    row![UninitThis, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, UninitThis, Conflicted, Conflicted],
    row![Reference,  Conflicted, Reference,  Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Reference,  Conflicted],
    row![Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted, Conflicted],
];

/// The abstract value of a register.
///
/// Uninitialized references are identified by the instruction that created them: two
/// `new-instance` of the same class at different places never compare equal.
#[derive(Debug, Clone)]
pub enum RegisterType {
    Unknown,
    Uninit,
    Null,
    One,
    Boolean,
    Byte,
    PosByte,
    Short,
    PosShort,
    Char,
    Integer,
    Float,
    LongLo,
    LongHi,
    DoubleLo,
    DoubleHi,
    /// Result of the `new-instance` at the given instruction index, before its constructor call.
    UninitRef { proto: Arc<TypeProto>, site: usize },
    /// The receiver of a constructor, before the superclass constructor call.
    UninitThis(Arc<TypeProto>),
    Reference(Arc<TypeProto>),
    Conflicted,
}

impl PartialEq for RegisterType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::UninitRef { proto: p1, site: s1 },
                Self::UninitRef { proto: p2, site: s2 },
            ) => s1 == s2 && p1 == p2,
            (Self::UninitThis(p1), Self::UninitThis(p2))
            | (Self::Reference(p1), Self::Reference(p2)) => p1 == p2,
            _ => self.category() == other.category() && self.proto().is_none(),
        }
    }
}

impl Eq for RegisterType {}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.proto() {
            Some(proto) => write!(f, "({},{})", self.category(), proto.descriptor()),
            None => write!(f, "({})", self.category()),
        }
    }
}

impl RegisterType {
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::Unknown => Category::Unknown,
            Self::Uninit => Category::Uninit,
            Self::Null => Category::Null,
            Self::One => Category::One,
            Self::Boolean => Category::Boolean,
            Self::Byte => Category::Byte,
            Self::PosByte => Category::PosByte,
            Self::Short => Category::Short,
            Self::PosShort => Category::PosShort,
            Self::Char => Category::Char,
            Self::Integer => Category::Integer,
            Self::Float => Category::Float,
            Self::LongLo => Category::LongLo,
            Self::LongHi => Category::LongHi,
            Self::DoubleLo => Category::DoubleLo,
            Self::DoubleHi => Category::DoubleHi,
            Self::UninitRef { .. } => Category::UninitRef,
            Self::UninitThis(_) => Category::UninitThis,
            Self::Reference(_) => Category::Reference,
            Self::Conflicted => Category::Conflicted,
        }
    }

    /// Returns the class prototype of reference categories.
    #[must_use]
    pub const fn proto(&self) -> Option<&Arc<TypeProto>> {
        match self {
            Self::UninitRef { proto, .. } | Self::UninitThis(proto) | Self::Reference(proto) => {
                Some(proto)
            }
            _ => None,
        }
    }

    /// Builds the register type of a category that carries no class prototype.
    fn from_category(category: Category) -> Option<Self> {
        let t = match category {
            Category::Unknown => Self::Unknown,
            Category::Uninit => Self::Uninit,
            Category::Null => Self::Null,
            Category::One => Self::One,
            Category::Boolean => Self::Boolean,
            Category::Byte => Self::Byte,
            Category::PosByte => Self::PosByte,
            Category::Short => Self::Short,
            Category::PosShort => Self::PosShort,
            Category::Char => Self::Char,
            Category::Integer => Self::Integer,
            Category::Float => Self::Float,
            Category::LongLo => Self::LongLo,
            Category::LongHi => Self::LongHi,
            Category::DoubleLo => Self::DoubleLo,
            Category::DoubleHi => Self::DoubleHi,
            Category::Conflicted => Self::Conflicted,
            Category::UninitRef | Category::UninitThis | Category::Reference => return None,
        };
        Some(t)
    }

    /// Returns the narrowest category holding a 32-bit literal.
    #[must_use]
    pub const fn for_literal(value: i32) -> Self {
        match value {
            i32::MIN..=-32769 => Self::Integer,
            -32768..=-129 => Self::Short,
            -128..=-1 => Self::Byte,
            0 => Self::Null,
            1 => Self::One,
            2..=127 => Self::PosByte,
            128..=32767 => Self::PosShort,
            32768..=65535 => Self::Char,
            _ => Self::Integer,
        }
    }

    /// Returns the register type of a value of a given dex type. For wide types, this is the
    /// type of the first register of the pair.
    pub fn for_type(type_: &Type, classpath: &ClassPath) -> ClassPathResult<Self> {
        Ok(match type_ {
            Type::Boolean => Self::Boolean,
            Type::Byte => Self::Byte,
            Type::Short => Self::Short,
            Type::Char => Self::Char,
            Type::Int => Self::Integer,
            Type::Float => Self::Float,
            Type::Long => Self::LongLo,
            Type::Double => Self::DoubleLo,
            Type::Class(_) | Type::Array(_, _) => Self::Reference(classpath.class_of(type_)?),
            Type::Void => return Err(ClassPathError::InvalidType(type_.to_string())),
        })
    }

    /// Same as [`RegisterType::for_type`] from a type descriptor.
    pub fn for_descriptor(descriptor: &str, classpath: &ClassPath) -> ClassPathResult<Self> {
        let type_ = Type::try_from(descriptor)
            .map_err(|_| ClassPathError::InvalidType(descriptor.to_string()))?;
        Self::for_type(&type_, classpath)
    }

    /// Returns the type of the second register of a wide pair starting with `self`.
    #[must_use]
    pub const fn wide_high(&self) -> Option<Self> {
        match self {
            Self::LongLo => Some(Self::LongHi),
            Self::DoubleLo => Some(Self::DoubleHi),
            _ => None,
        }
    }

    /// Values that may stand for an object reference in a field access or a call receiver.
    #[must_use]
    pub const fn is_object_like(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::UninitRef { .. } | Self::UninitThis(_) | Self::Reference(_)
        )
    }

    /// Computes the join of two register types.
    ///
    /// Fails only when a reference is joined with a primitive class prototype, which cannot
    /// happen with well-formed register types.
    pub fn merge(&self, other: &Self, classpath: &ClassPath) -> ClassPathResult<Self> {
        if self == other {
            return Ok(self.clone());
        }

        let category = self.category().merge(other.category());
        match category {
            Category::Reference => {
                let proto = match (self.proto(), other.proto()) {
                    (Some(a), Some(b)) => a.common_superclass(b, classpath)?,
                    (Some(p), None) | (None, Some(p)) => p.clone(),
                    (None, None) => classpath.unknown_class(),
                };
                if self.category() == Category::Reference && self.proto() == Some(&proto) {
                    Ok(self.clone())
                } else if other.category() == Category::Reference && other.proto() == Some(&proto)
                {
                    Ok(other.clone())
                } else {
                    Ok(Self::Reference(proto))
                }
            }
            Category::UninitRef | Category::UninitThis => {
                if let Self::Unknown = self {
                    Ok(other.clone())
                } else {
                    Ok(self.clone())
                }
            }
            _ => Ok(Self::from_category(category).unwrap_or(Self::Conflicted)),
        }
    }
}
