//! Class definitions.

use crate::fields::FieldDef;
use crate::methods::MethodDef;
use crate::types::Type;
use bitflags::bitflags;
use serde::Serialize;
use std::fmt;

bitflags! {
    /// Dalvik class flags
    #[derive(Serialize)]
    #[serde(transparent)]
    pub struct ClassFlags: u32 {
        const ACC_PUBLIC                = 0x00001;
        const ACC_PRIVATE               = 0x00002;
        const ACC_PROTECTED             = 0x00004;
        const ACC_STATIC                = 0x00008;
        const ACC_FINAL                 = 0x00010;
        const ACC_INTERFACE             = 0x00200;
        const ACC_ABSTRACT              = 0x00400;
        const ACC_SYNTHETIC             = 0x01000;
        const ACC_ANNOTATION            = 0x02000;
        const ACC_ENUM                  = 0x04000;
    }
}

impl fmt::Display for ClassFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (Self::ACC_PUBLIC, "public"),
            (Self::ACC_PRIVATE, "private"),
            (Self::ACC_PROTECTED, "protected"),
            (Self::ACC_STATIC, "static"),
            (Self::ACC_FINAL, "final"),
            (Self::ACC_INTERFACE, "interface"),
            (Self::ACC_ABSTRACT, "abstract"),
            (Self::ACC_SYNTHETIC, "synthetic"),
            (Self::ACC_ANNOTATION, "annotation"),
            (Self::ACC_ENUM, "enum"),
        ];
        for (flag, name) in names {
            if self.contains(flag) {
                write!(f, "{name} ")?;
            }
        }
        Ok(())
    }
}

/// An in-memory class definition, as produced by a dex reader or built by hand.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub type_: Type,
    pub flags: ClassFlags,
    pub superclass: Option<Type>,
    pub interfaces: Vec<Type>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    #[must_use]
    pub fn new(type_: Type, flags: ClassFlags) -> Self {
        Self {
            type_,
            flags,
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_superclass(mut self, superclass: Type) -> Self {
        self.superclass = Some(superclass);
        self
    }

    #[must_use]
    pub fn with_interface(mut self, interface: Type) -> Self {
        self.interfaces.push(interface);
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Returns the type descriptor of the class (`Lfoo/Bar;`).
    #[must_use]
    pub fn descriptor(&self) -> String {
        self.type_.to_string()
    }

    #[inline]
    #[must_use]
    pub const fn is_interface(&self) -> bool {
        self.flags.contains(ClassFlags::ACC_INTERFACE)
    }

    #[inline]
    #[must_use]
    pub const fn is_public(&self) -> bool {
        self.flags.contains(ClassFlags::ACC_PUBLIC)
    }

    /// Returns the package part of the class name (`foo/bar` for `Lfoo/bar/Baz;`).
    #[must_use]
    pub fn package(&self) -> String {
        package_of(&self.descriptor())
    }

    pub fn instance_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.is_static())
    }

    pub fn virtual_methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.iter().filter(|m| !m.is_direct())
    }

    pub fn direct_methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.iter().filter(|m| m.is_direct())
    }
}

/// Extracts the package of a class descriptor, the empty string for the default package.
#[must_use]
pub fn package_of(descriptor: &str) -> String {
    match descriptor.rfind('/') {
        Some(last_slash) if last_slash > 0 => descriptor[1..last_slash].to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldFlags;
    use crate::methods::MethodFlags;

    #[test]
    fn test_packages() {
        assert_eq!(package_of("Ljava/lang/Object;"), "java/lang");
        assert_eq!(package_of("LNoPackage;"), "");
        let class = ClassDef::new(Type::class("a/b/C"), ClassFlags::ACC_PUBLIC);
        assert_eq!(class.package(), "a/b");
        assert!(class.is_public());
        assert!(!class.is_interface());
    }

    #[test]
    fn test_members_partition() {
        let class = ClassDef::new(Type::class("C"), ClassFlags::empty())
            .with_field(FieldDef::new("s", Type::Int, FieldFlags::ACC_STATIC))
            .with_field(FieldDef::new("i", Type::Int, FieldFlags::empty()))
            .with_method(MethodDef::new("<init>", vec![], Type::Void, MethodFlags::ACC_CONSTRUCTOR))
            .with_method(MethodDef::new("run", vec![], Type::Void, MethodFlags::ACC_PUBLIC));
        assert_eq!(class.instance_fields().count(), 1);
        assert_eq!(class.virtual_methods().count(), 1);
        assert_eq!(class.direct_methods().count(), 1);
    }
}
