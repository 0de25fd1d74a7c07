//! Class fields: symbolic references and definitions.

use crate::types::Type;
use bitflags::bitflags;
use serde::Serialize;
use std::fmt;

/// A symbolic field reference, as carried by field access instructions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldRef {
    pub definer: Type,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: Type,
}

impl FieldRef {
    #[must_use]
    pub fn new(definer: Type, name: &str, type_: Type) -> Self {
        Self {
            definer,
            name: name.to_string(),
            type_,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}->{}:{}", self.definer, self.name, self.type_)
    }
}

bitflags! {
    #[derive(Serialize)]
    #[serde(transparent)]
    pub struct FieldFlags: u32 {
        const ACC_PUBLIC                = 0x00001;
        const ACC_PRIVATE               = 0x00002;
        const ACC_PROTECTED             = 0x00004;
        const ACC_STATIC                = 0x00008;
        const ACC_FINAL                 = 0x00010;
        const ACC_VOLATILE              = 0x00040;
        const ACC_TRANSIENT             = 0x00080;
        const ACC_SYNTHETIC             = 0x01000;
        const ACC_ENUM                  = 0x04000;
    }
}

impl fmt::Display for FieldFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const NAMES: [(FieldFlags, &str); 9] = [
            (FieldFlags::ACC_PUBLIC, "public"),
            (FieldFlags::ACC_PRIVATE, "private"),
            (FieldFlags::ACC_PROTECTED, "protected"),
            (FieldFlags::ACC_STATIC, "static"),
            (FieldFlags::ACC_FINAL, "final"),
            (FieldFlags::ACC_VOLATILE, "volatile"),
            (FieldFlags::ACC_TRANSIENT, "transient"),
            (FieldFlags::ACC_SYNTHETIC, "synthetic"),
            (FieldFlags::ACC_ENUM, "enum"),
        ];
        for (flag, name) in NAMES {
            if self.contains(flag) {
                write!(f, "{name} ")?;
            }
        }
        Ok(())
    }
}

/// A field declared by a class definition.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: Type,
    pub flags: FieldFlags,
}

impl FieldDef {
    #[must_use]
    pub fn new(name: &str, type_: Type, flags: FieldFlags) -> Self {
        Self {
            name: name.to_string(),
            type_,
            flags,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.flags.contains(FieldFlags::ACC_STATIC)
    }

    /// Builds the symbolic reference to this field, as defined by `definer`.
    #[must_use]
    pub fn to_ref(&self, definer: &Type) -> FieldRef {
        FieldRef {
            definer: definer.clone(),
            name: self.name.clone(),
            type_: self.type_.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_display() {
        let field = FieldDef::new("count", Type::Int, FieldFlags::ACC_PRIVATE);
        let fref = field.to_ref(&Type::class("foo/Bar"));
        assert_eq!(fref.to_string(), "Lfoo/Bar;->count:I");
        assert_eq!(
            format!("{}", FieldFlags::ACC_PUBLIC | FieldFlags::ACC_STATIC),
            "public static "
        );
        assert!(!field.is_static());
    }
}
