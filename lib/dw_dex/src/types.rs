//! Dalvik type descriptors.

use crate::errors::{DexError, DexResult};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// Dalvik concrete type descriptor type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Type {
    /// `void` type, only valid for return types.
    Void,
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    /// Array of the given element type; the element is never itself an array.
    Array(usize, Box<Self>),
    /// Fully-qualified class name, in internal form (`java/lang/Object`).
    Class(String),
}

impl Type {
    /// Shorthand for building a class type from its internal name.
    #[must_use]
    pub fn class(name: &str) -> Self {
        Self::Class(name.to_string())
    }

    /// Builds the array type of `dims` dimensions over `self`, flattening nested arrays.
    #[must_use]
    pub fn array_of(self, dims: usize) -> Self {
        match self {
            Self::Array(n, elem) => Self::Array(n + dims, elem),
            t if dims == 0 => t,
            t => Self::Array(dims, Box::new(t)),
        }
    }

    /// Returns `true` for `long` and `double`, which take a register pair.
    #[must_use]
    pub const fn is_wide(&self) -> bool {
        matches!(self, Self::Long | Self::Double)
    }

    /// Returns `true` for classes and arrays.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Class(_) | Self::Array(_, _))
    }

    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        !self.is_reference() && !matches!(self, Self::Void)
    }

    /// Number of register slots used by a value of this type.
    #[must_use]
    pub const fn register_count(&self) -> usize {
        match self {
            Self::Void => 0,
            Self::Long | Self::Double => 2,
            _ => 1,
        }
    }

    /// Returns a java-like representation of the type, e.g. `java.lang.String[]`.
    #[must_use]
    pub fn to_java_string(&self) -> String {
        match self {
            Self::Void => "void".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Byte => "byte".to_string(),
            Self::Short => "short".to_string(),
            Self::Char => "char".to_string(),
            Self::Int => "int".to_string(),
            Self::Long => "long".to_string(),
            Self::Float => "float".to_string(),
            Self::Double => "double".to_string(),
            Self::Array(n, sub) => format!("{}{}", sub.to_java_string(), "[]".repeat(*n)),
            Self::Class(name) => name.replace('/', "."),
        }
    }

    pub fn as_class_name(&self) -> DexResult<&str> {
        if let Self::Class(name) = self {
            Ok(name)
        } else {
            Err(DexError::InvalidType(self.to_string()))
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Void => write!(f, "V"),
            Self::Boolean => write!(f, "Z"),
            Self::Byte => write!(f, "B"),
            Self::Short => write!(f, "S"),
            Self::Char => write!(f, "C"),
            Self::Int => write!(f, "I"),
            Self::Long => write!(f, "J"),
            Self::Float => write!(f, "F"),
            Self::Double => write!(f, "D"),
            Self::Array(n, inner) => write!(f, "{}{inner}", "[".repeat(*n)),
            Self::Class(classname) => write!(f, "L{classname};"),
        }
    }
}

impl TryFrom<&str> for Type {
    type Error = DexError;

    fn try_from(s: &str) -> DexResult<Self> {
        let conversion_error = || DexError::Conversion {
            from: format!("&str ({s:?})"),
            to: "Type".to_string(),
        };

        let elem = s.trim_start_matches('[');
        let dims = s.len() - elem.len();
        if dims > 255 || (dims > 0 && elem == "V") {
            return Err(conversion_error());
        }

        let t = match elem {
            "V" => Self::Void,
            "Z" => Self::Boolean,
            "B" => Self::Byte,
            "S" => Self::Short,
            "C" => Self::Char,
            "I" => Self::Int,
            "J" => Self::Long,
            "F" => Self::Float,
            "D" => Self::Double,
            class => match class.strip_prefix('L').and_then(|c| c.strip_suffix(';')) {
                Some(name) if !name.is_empty() => Self::Class(name.to_string()),
                _ => return Err(conversion_error()),
            },
        };
        Ok(t.array_of(dims))
    }
}

/// Splits a method parameters descriptor (the part between parentheses) into types.
pub fn parse_parameters(descriptor: &str) -> DexResult<Vec<Type>> {
    let mut params = Vec::new();
    let mut rest = descriptor;
    while !rest.is_empty() {
        let elem = rest.trim_start_matches('[');
        let dims = rest.len() - elem.len();
        let len = if elem.starts_with('L') {
            match elem.find(';') {
                Some(end) => dims + end + 1,
                None => {
                    return Err(DexError::Conversion {
                        from: format!("&str ({descriptor:?})"),
                        to: "parameters".to_string(),
                    })
                }
            }
        } else {
            dims + 1
        };
        if len > rest.len() {
            return Err(DexError::Conversion {
                from: format!("&str ({descriptor:?})"),
                to: "parameters".to_string(),
            });
        }
        params.push(Type::try_from(&rest[..len])?);
        rest = &rest[len..];
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors() {
        assert_eq!(Type::try_from("I").unwrap(), Type::Int);
        assert_eq!(
            Type::try_from("[[Ljava/lang/String;").unwrap(),
            Type::Array(2, Box::new(Type::class("java/lang/String")))
        );
        assert!(Type::try_from("").is_err());
        assert!(Type::try_from("L;").is_err());
        assert!(Type::try_from("[V").is_err());
        assert!(Type::try_from("Ljava/lang/Object").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for desc in ["Z", "[J", "Lfoo/Bar;", "[[[Lfoo;"] {
            assert_eq!(Type::try_from(desc).unwrap().to_string(), desc);
        }
    }

    #[test]
    fn test_parameters() {
        let params = parse_parameters("IJ[Ljava/lang/String;Z").unwrap();
        assert_eq!(params.len(), 4);
        assert!(params[1].is_wide());
        assert!(params[2].is_reference());
        assert!(parse_parameters("Lfoo").is_err());
        assert!(parse_parameters("").unwrap().is_empty());
    }

    #[test]
    fn test_array_of() {
        let t = Type::Array(1, Box::new(Type::Int)).array_of(2);
        assert_eq!(t.to_string(), "[[[I");
        assert_eq!(t.to_java_string(), "int[][][]");
    }
}
