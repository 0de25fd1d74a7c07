//! Resolution of `execute-inline` indexes.
//!
//! Odex files replace calls to a few hot framework methods by `execute-inline` instructions
//! carrying an index into a VM builtin table. The table depends on the VM version that optimized
//! the code, or can be given explicitly as a text file (one `Lcls;->name(params)ret` per line).

use crate::classpath::ClassPath;
use crate::errors::{AnalysisError, AnalysisResult};
use dw_dex::methods::{MethodFlags, MethodRef};
use dw_dex::types::{parse_parameters, Type};
use log::debug;
use regex::Regex;
use std::fmt;

/// A method an inline index stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineMethod {
    pub method: MethodRef,
    pub flags: MethodFlags,
}

impl InlineMethod {
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::ACC_STATIC)
    }

    #[must_use]
    pub const fn is_private(&self) -> bool {
        self.flags.contains(MethodFlags::ACC_PRIVATE)
    }
}

impl fmt::Display for InlineMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.flags, self.method)
    }
}

const STATIC: MethodFlags = MethodFlags::ACC_STATIC;
const VIRTUAL: MethodFlags = MethodFlags::ACC_PUBLIC;
const DIRECT: MethodFlags = MethodFlags::ACC_PRIVATE;

type Entry = (MethodFlags, &'static str, &'static str, &'static str, &'static str);

const COMMON: [Entry; 4] = [
    (STATIC, "Lorg/apache/harmony/dalvik/NativeTestTarget;", "emptyInlineMethod", "", "V"),
    (VIRTUAL, "Ljava/lang/String;", "charAt", "I", "C"),
    (VIRTUAL, "Ljava/lang/String;", "compareTo", "Ljava/lang/String;", "I"),
    (VIRTUAL, "Ljava/lang/String;", "equals", "Ljava/lang/Object;", "Z"),
];

const MATH: [Entry; 10] = [
    (VIRTUAL, "Ljava/lang/String;", "length", "", "I"),
    (STATIC, "Ljava/lang/Math;", "abs", "I", "I"),
    (STATIC, "Ljava/lang/Math;", "abs", "J", "J"),
    (STATIC, "Ljava/lang/Math;", "abs", "F", "F"),
    (STATIC, "Ljava/lang/Math;", "abs", "D", "D"),
    (STATIC, "Ljava/lang/Math;", "min", "II", "I"),
    (STATIC, "Ljava/lang/Math;", "max", "II", "I"),
    (STATIC, "Ljava/lang/Math;", "sqrt", "D", "D"),
    (STATIC, "Ljava/lang/Math;", "cos", "D", "D"),
    (STATIC, "Ljava/lang/Math;", "sin", "D", "D"),
];

const BITS: [Entry; 13] = [
    (STATIC, "Ljava/lang/Float;", "floatToIntBits", "F", "I"),
    (STATIC, "Ljava/lang/Float;", "floatToRawIntBits", "F", "I"),
    (STATIC, "Ljava/lang/Float;", "intBitsToFloat", "I", "F"),
    (STATIC, "Ljava/lang/Double;", "doubleToLongBits", "D", "J"),
    (STATIC, "Ljava/lang/Double;", "doubleToRawLongBits", "D", "J"),
    (STATIC, "Ljava/lang/Double;", "longBitsToDouble", "J", "D"),
    (STATIC, "Ljava/lang/StrictMath;", "abs", "I", "I"),
    (STATIC, "Ljava/lang/StrictMath;", "abs", "J", "J"),
    (STATIC, "Ljava/lang/StrictMath;", "abs", "F", "F"),
    (STATIC, "Ljava/lang/StrictMath;", "abs", "D", "D"),
    (STATIC, "Ljava/lang/StrictMath;", "min", "II", "I"),
    (STATIC, "Ljava/lang/StrictMath;", "max", "II", "I"),
    (STATIC, "Ljava/lang/StrictMath;", "sqrt", "D", "D"),
];

fn entry((flags, class, name, params, ret): Entry) -> AnalysisResult<InlineMethod> {
    Ok(InlineMethod {
        method: MethodRef::new(
            Type::try_from(class)?,
            name,
            parse_parameters(params)?,
            Type::try_from(ret)?,
        ),
        flags,
    })
}

fn entries(table: &[Entry]) -> AnalysisResult<Vec<Option<InlineMethod>>> {
    table.iter().map(|e| entry(*e).map(Some)).collect()
}

#[derive(Debug)]
enum Table {
    V35,
    /// Entries 4 and 5 changed meaning between VM releases, callers are told apart by the
    /// number of registers they pass.
    V36 {
        index_of_i: InlineMethod,
        index_of_ii: InlineMethod,
        fast_index_of: InlineMethod,
        is_empty: InlineMethod,
    },
    Custom,
}

#[derive(Debug)]
pub struct InlineMethodResolver {
    table: Table,
    methods: Vec<Option<InlineMethod>>,
}

const INLINE_METHOD: &str = r"^(L[^;]+;)->([^(]+)\(([^)]*)\)(.+)$";

impl InlineMethodResolver {
    /// Returns the builtin inline table of an odex version (35 or 36).
    pub fn for_vm_version(version: u32) -> AnalysisResult<Self> {
        match version {
            35 => {
                let mut methods = entries(&COMMON)?;
                methods.extend(entries(&MATH)?);
                Ok(Self {
                    table: Table::V35,
                    methods,
                })
            }
            36 => {
                let mut methods = entries(&COMMON)?;
                methods.extend([None, None]);
                methods.extend(entries(&MATH)?);
                methods.extend(entries(&BITS)?);
                let string = "Ljava/lang/String;";
                Ok(Self {
                    table: Table::V36 {
                        index_of_i: entry((VIRTUAL, string, "indexOf", "I", "I"))?,
                        index_of_ii: entry((VIRTUAL, string, "indexOf", "II", "I"))?,
                        fast_index_of: entry((DIRECT, string, "fastIndexOf", "II", "I"))?,
                        is_empty: entry((VIRTUAL, string, "isEmpty", "", "Z"))?,
                    },
                    methods,
                })
            }
            _ => Err(AnalysisError::UnsupportedVmVersion(version)),
        }
    }

    /// Builds a resolver from a custom inline table.
    ///
    /// Each non-empty line names a method that must be defined on the class path, which gives
    /// its access flags.
    pub fn from_table(classpath: &ClassPath, table: &str) -> AnalysisResult<Self> {
        let pattern = Regex::new(INLINE_METHOD)?;
        let methods = table
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| resolve_line(classpath, &pattern, line).map(Some))
            .collect::<AnalysisResult<Vec<_>>>()?;
        debug!("loaded custom inline table of {} methods", methods.len());
        Ok(Self {
            table: Table::Custom,
            methods,
        })
    }

    /// Returns the method of an `execute-inline` index, given the number of registers passed
    /// by the instruction.
    pub fn resolve(&self, index: usize, register_count: usize) -> AnalysisResult<&InlineMethod> {
        if index >= self.methods.len() {
            return Err(AnalysisError::InlineIndex(index));
        }
        if let Table::V36 {
            index_of_i,
            index_of_ii,
            fast_index_of,
            is_empty,
        } = &self.table
        {
            match (index, register_count) {
                (4, 2) => return Ok(index_of_i),
                (4, 3) => return Ok(fast_index_of),
                (5, 3) => return Ok(index_of_ii),
                (5, 1) => return Ok(is_empty),
                (4 | 5, _) => return Err(AnalysisError::InlineAmbiguous),
                _ => (),
            }
        }
        self.methods[index]
            .as_ref()
            .ok_or(AnalysisError::InlineIndex(index))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Iterates over table entries; ambiguous entries are `None`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<&InlineMethod>)> {
        self.methods
            .iter()
            .enumerate()
            .map(|(index, method)| (index, method.as_ref()))
    }
}

fn resolve_line(classpath: &ClassPath, pattern: &Regex, line: &str) -> AnalysisResult<InlineMethod> {
    let captures = pattern
        .captures(line)
        .ok_or_else(|| AnalysisError::InvalidInlineDescriptor(line.to_string()))?;
    let class = &captures[1];
    let method = MethodRef::new(
        Type::try_from(class)?,
        &captures[2],
        parse_parameters(&captures[3])?,
        Type::try_from(&captures[4])?,
    );

    let unresolved = || AnalysisError::UnresolvedInline(line.to_string());
    let def = classpath.class_def(class).map_err(|_| unresolved())?;
    let flags = def
        .methods
        .iter()
        .find(|m| {
            m.name == method.name && m.params == method.params && m.return_type == method.return_type
        })
        .map(|m| m.flags)
        .ok_or_else(unresolved)?;
    Ok(InlineMethod { method, flags })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classpath::ClassPathConfig;
    use dw_dex::classes::{ClassDef, ClassFlags};
    use dw_dex::methods::MethodDef;

    #[test]
    fn test_version_35() {
        let resolver = InlineMethodResolver::for_vm_version(35).unwrap();
        assert_eq!(resolver.len(), 14);
        let abs = resolver.resolve(6, 2).unwrap();
        assert_eq!(abs.method.to_string(), "Ljava/lang/Math;->abs(J)J");
        assert!(abs.is_static());
        let length = resolver.resolve(4, 1).unwrap();
        assert_eq!(length.method.to_string(), "Ljava/lang/String;->length()I");
        assert!(!length.is_static() && !length.is_private());
        assert!(matches!(resolver.resolve(14, 0), Err(AnalysisError::InlineIndex(14))));
    }

    #[test]
    fn test_version_36_disambiguation() {
        let resolver = InlineMethodResolver::for_vm_version(36).unwrap();
        assert_eq!(resolver.len(), 29);
        assert_eq!(resolver.resolve(4, 2).unwrap().method.name, "indexOf");
        let fast = resolver.resolve(4, 3).unwrap();
        assert_eq!(fast.method.name, "fastIndexOf");
        assert!(fast.is_private());
        assert_eq!(resolver.resolve(5, 3).unwrap().method.params.len(), 2);
        assert_eq!(resolver.resolve(5, 1).unwrap().method.name, "isEmpty");
        assert!(matches!(resolver.resolve(5, 2), Err(AnalysisError::InlineAmbiguous)));
        assert_eq!(
            resolver.resolve(28, 2).unwrap().method.to_string(),
            "Ljava/lang/StrictMath;->sqrt(D)D"
        );
        assert!(matches!(
            InlineMethodResolver::for_vm_version(37),
            Err(AnalysisError::UnsupportedVmVersion(37))
        ));
    }

    #[test]
    fn test_custom_table() {
        let cp = ClassPath::new(
            vec![ClassDef::new(Type::class("a/Util"), ClassFlags::ACC_PUBLIC)
                .with_method(MethodDef::new(
                    "twice",
                    vec![Type::Int],
                    Type::Int,
                    MethodFlags::ACC_PUBLIC | MethodFlags::ACC_STATIC,
                ))],
            ClassPathConfig::default(),
        );
        let resolver = InlineMethodResolver::from_table(
            &cp,
            "La/Util;->twice(I)I\n\nLjava/lang/Object;->hashCode()I\n",
        )
        .unwrap();
        assert_eq!(resolver.len(), 2);
        assert!(resolver.resolve(0, 1).unwrap().is_static());
        assert!(!resolver.resolve(1, 1).unwrap().is_static());

        assert!(matches!(
            InlineMethodResolver::from_table(&cp, "La/Util;->missing()V"),
            Err(AnalysisError::UnresolvedInline(_))
        ));
        assert!(matches!(
            InlineMethodResolver::from_table(&cp, "not a method"),
            Err(AnalysisError::InvalidInlineDescriptor(_))
        ));
    }
}
