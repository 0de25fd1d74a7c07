//! Class methods: symbolic references and definitions.

use crate::code::CodeItem;
use crate::errors::{DexError, DexResult};
use crate::types::{parse_parameters, Type};
use bitflags::bitflags;
use serde::Serialize;
use std::fmt;

/// A symbolic method reference, as carried by invoke-kind instructions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MethodRef {
    pub definer: Type,
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
}

impl MethodRef {
    #[must_use]
    pub fn new(definer: Type, name: &str, params: Vec<Type>, return_type: Type) -> Self {
        Self {
            definer,
            name: name.to_string(),
            params,
            return_type,
        }
    }

    /// Parses a `Lcls;->name(params)ret` string.
    pub fn parse(s: &str) -> DexResult<Self> {
        let bad = || DexError::Conversion {
            from: format!("&str ({s:?})"),
            to: "MethodRef".to_string(),
        };
        let (definer, rest) = s.split_once("->").ok_or_else(bad)?;
        let (name, rest) = rest.split_once('(').ok_or_else(bad)?;
        let (params, ret) = rest.split_once(')').ok_or_else(bad)?;
        if name.is_empty() {
            return Err(bad());
        }
        Ok(Self {
            definer: Type::try_from(definer)?,
            name: name.to_string(),
            params: parse_parameters(params)?,
            return_type: Type::try_from(ret)?,
        })
    }

    /// Returns the prototype part of the reference, e.g. `(IJ)V`.
    #[must_use]
    pub fn descriptor(&self) -> String {
        let params: String = self.params.iter().map(ToString::to_string).collect();
        format!("({params}){}", self.return_type)
    }

    /// Checks name, parameters and return type equality, ignoring the definer.
    #[must_use]
    pub fn same_signature(&self, other: &Self) -> bool {
        self.name == other.name
            && self.return_type == other.return_type
            && self.params == other.params
    }

    /// Number of register slots taken by the arguments, receiver excluded.
    #[must_use]
    pub fn params_register_count(&self) -> usize {
        self.params.iter().map(Type::register_count).sum()
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}->{}{}", self.definer, self.name, self.descriptor())
    }
}

bitflags! {
    #[derive(Serialize)]
    #[serde(transparent)]
    pub struct MethodFlags: u32 {
        const ACC_PUBLIC                = 0x00001;
        const ACC_PRIVATE               = 0x00002;
        const ACC_PROTECTED             = 0x00004;
        const ACC_STATIC                = 0x00008;
        const ACC_FINAL                 = 0x00010;
        const ACC_SYNCHRONIZED          = 0x00020;
        const ACC_BRIDGE                = 0x00040;
        const ACC_VARARGS               = 0x00080;
        const ACC_NATIVE                = 0x00100;
        const ACC_ABSTRACT              = 0x00400;
        const ACC_STRICT                = 0x00800;
        const ACC_SYNTHETIC             = 0x01000;
        const ACC_CONSTRUCTOR           = 0x10000;
        const ACC_DECLARED_SYNCHRONIZED = 0x20000;
    }
}

impl MethodFlags {
    /// Package-private methods carry none of the visibility flags.
    #[must_use]
    pub const fn is_package_private(self) -> bool {
        !self.intersects(Self::from_bits_truncate(
            Self::ACC_PUBLIC.bits() | Self::ACC_PRIVATE.bits() | Self::ACC_PROTECTED.bits(),
        ))
    }
}

impl fmt::Display for MethodFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (Self::ACC_PUBLIC, "public"),
            (Self::ACC_PRIVATE, "private"),
            (Self::ACC_PROTECTED, "protected"),
            (Self::ACC_STATIC, "static"),
            (Self::ACC_FINAL, "final"),
            (Self::ACC_SYNCHRONIZED, "synchronized"),
            (Self::ACC_BRIDGE, "bridge"),
            (Self::ACC_VARARGS, "varargs"),
            (Self::ACC_NATIVE, "native"),
            (Self::ACC_ABSTRACT, "abstract"),
            (Self::ACC_STRICT, "strict"),
            (Self::ACC_SYNTHETIC, "synthetic"),
            (Self::ACC_CONSTRUCTOR, "constructor"),
            (Self::ACC_DECLARED_SYNCHRONIZED, "declared_synchronized"),
        ];
        for (flag, name) in names {
            if self.contains(flag) {
                write!(f, "{name} ")?;
            }
        }
        Ok(())
    }
}

/// A method declared by a class definition, with its bytecode if any.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
    pub flags: MethodFlags,
    pub code: Option<CodeItem>,
}

impl MethodDef {
    #[must_use]
    pub fn new(name: &str, params: Vec<Type>, return_type: Type, flags: MethodFlags) -> Self {
        Self {
            name: name.to_string(),
            params,
            return_type,
            flags,
            code: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: CodeItem) -> Self {
        self.code = Some(code);
        self
    }

    #[inline]
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::ACC_STATIC)
    }

    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    /// Direct methods (static, private and constructors) never take a vtable slot.
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.flags
            .intersects(MethodFlags::ACC_STATIC | MethodFlags::ACC_PRIVATE | MethodFlags::ACC_CONSTRUCTOR)
            || self.name.starts_with('<')
    }

    #[must_use]
    pub fn to_ref(&self, definer: &Type) -> MethodRef {
        MethodRef {
            definer: definer.clone(),
            name: self.name.clone(),
            params: self.params.clone(),
            return_type: self.return_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_ref() {
        let m = MethodRef::parse("Ljava/lang/String;->charAt(I)C").unwrap();
        assert_eq!(m.definer, Type::class("java/lang/String"));
        assert_eq!(m.name, "charAt");
        assert_eq!(m.params, vec![Type::Int]);
        assert_eq!(m.return_type, Type::Char);
        assert_eq!(m.to_string(), "Ljava/lang/String;->charAt(I)C");
    }

    #[test]
    fn test_parse_errors() {
        assert!(MethodRef::parse("Ljava/lang/String;charAt(I)C").is_err());
        assert!(MethodRef::parse("Ljava/lang/String;->(I)C").is_err());
        assert!(MethodRef::parse("Ljava/lang/String;->charAt(I").is_err());
    }

    #[test]
    fn test_package_private() {
        assert!(MethodFlags::ACC_FINAL.is_package_private());
        assert!(!MethodFlags::ACC_PROTECTED.is_package_private());
        assert_eq!(format!("{}", MethodFlags::ACC_PUBLIC), "public ");
    }

    #[test]
    fn test_direct() {
        let ctor = MethodDef::new("<init>", vec![], Type::Void, MethodFlags::ACC_PUBLIC);
        let virt = MethodDef::new("run", vec![], Type::Void, MethodFlags::ACC_PUBLIC);
        assert!(ctor.is_direct());
        assert!(!virt.is_direct());
        assert_eq!(
            MethodRef::new(Type::class("a"), "f", vec![Type::Long, Type::Int], Type::Void)
                .params_register_count(),
            3
        );
    }
}
