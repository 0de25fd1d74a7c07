//! Class hierarchy view used by the register typing and by deodexing.
//!
//! A [`ClassPath`] owns every known class definition and lazily builds one [`TypeProto`] per
//! type descriptor, memoized for the whole session. Protos give access to the superclass chain,
//! implemented interfaces, vtable and instance field offsets of a type, as the Dalvik VM computes
//! them. Missing classes do not make the resolution fail outright: properties computed from
//! incomplete hierarchies are flagged as not fully resolved, and common superclass computations
//! degrade to the unknown class.

mod array;
mod class;
mod layout;
mod memo;
mod vtable;

pub mod errors;

pub use crate::classpath::array::ArrayProto;
pub use crate::classpath::class::{ClassProto, Interfaces};
pub use crate::classpath::layout::FieldLayout;
pub use crate::classpath::vtable::{Vtable, VtableEntry};

use crate::classpath::errors::{ClassPathError, ClassPathResult};
use dw_dex::classes::{ClassDef, ClassFlags};
use dw_dex::fields::FieldRef;
use dw_dex::methods::{MethodDef, MethodFlags};
use dw_dex::types::Type;
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

pub const OBJECT: &str = "Ljava/lang/Object;";
pub const UNKNOWN_CLASS: &str = "Ujava/lang/Object;";
const PRIMITIVES: [&str; 9] = ["Z", "B", "S", "C", "I", "J", "F", "D", "L"];

/// Class path settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPathConfig {
    /// Android API level of the analyzed code.
    pub api_level: u32,
    /// Package-private methods can only be overridden from their own package
    /// (vtable construction honors this from API 17).
    pub check_package_private_access: bool,
}

impl ClassPathConfig {
    #[must_use]
    pub const fn for_api(api_level: u32) -> Self {
        Self {
            api_level,
            check_package_private_access: api_level >= 17,
        }
    }
}

impl Default for ClassPathConfig {
    fn default() -> Self {
        Self::for_api(15)
    }
}

/// The type prototype of a descriptor.
#[derive(Debug)]
pub enum TypeProto {
    /// Primitive types (and the `L` placeholder), which have no hierarchy.
    Primitive(String),
    /// The root of hierarchies that could not be resolved (`Ujava/lang/Object;`).
    Unknown,
    Array(ArrayProto),
    Class(ClassProto),
}

impl PartialEq for TypeProto {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor() == other.descriptor()
    }
}

impl Eq for TypeProto {}

impl fmt::Display for TypeProto {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.descriptor())
    }
}

impl TypeProto {
    #[must_use]
    pub fn descriptor(&self) -> &str {
        match self {
            Self::Primitive(descriptor) => descriptor,
            Self::Unknown => UNKNOWN_CLASS,
            Self::Array(array) => array.descriptor(),
            Self::Class(class) => class.descriptor(),
        }
    }

    pub fn is_interface(&self) -> ClassPathResult<bool> {
        match self {
            Self::Class(class) => class.is_interface(),
            _ => Ok(false),
        }
    }

    /// Returns the superclass descriptor; fails for classes without definition.
    pub fn superclass(&self) -> ClassPathResult<Option<String>> {
        match self {
            Self::Class(class) => class.superclass(),
            Self::Array(_) => Ok(Some(OBJECT.to_string())),
            Self::Primitive(_) | Self::Unknown => Ok(None),
        }
    }

    /// Checks whether this type implements `iface`.
    ///
    /// For classes whose interfaces are not fully resolved, this either returns `true` or fails
    /// with an unresolved error, never `false`.
    pub fn implements_interface(&self, iface: &str, classpath: &ClassPath) -> ClassPathResult<bool> {
        match self {
            Self::Class(class) => class.implements_interface(iface, classpath),
            Self::Array(array) => Ok(array.implements_interface(iface)),
            Self::Primitive(_) | Self::Unknown => Ok(false),
        }
    }

    /// Returns the superclasses of this type, nearest first, ending with `Ljava/lang/Object;` or
    /// with the unknown class when some ancestor is not defined.
    pub fn superclass_chain(&self, classpath: &ClassPath) -> ClassPathResult<Vec<Arc<Self>>> {
        let mut chain: Vec<Arc<Self>> = Vec::new();
        let mut current = match self.superclass() {
            Ok(next) => next.map(|s| classpath.class(&s)).transpose()?,
            Err(err) if err.is_unresolved() => Some(classpath.unknown_class()),
            Err(err) => return Err(err),
        };
        while let Some(proto) = current {
            if proto.descriptor() == self.descriptor()
                || chain.iter().any(|p| p.descriptor() == proto.descriptor())
            {
                return Err(ClassPathError::Cycle(format!(
                    "superclass chain of {}",
                    self.descriptor()
                )));
            }
            current = match proto.superclass() {
                Ok(next) => next.map(|s| classpath.class(&s)).transpose()?,
                Err(err) if err.is_unresolved() => Some(classpath.unknown_class()),
                Err(err) => return Err(err),
            };
            chain.push(proto);
        }
        Ok(chain)
    }

    /// Computes the join of two reference types in the class hierarchy.
    pub fn common_superclass(
        self: &Arc<Self>,
        other: &Arc<Self>,
        classpath: &ClassPath,
    ) -> ClassPathResult<Arc<Self>> {
        match self.as_ref() {
            Self::Primitive(descriptor) => {
                Err(ClassPathError::NoCommonSuperclass(descriptor.clone()))
            }
            Self::Unknown => {
                if other.descriptor() == OBJECT {
                    Ok(other.clone())
                } else if let Self::Array(_) = other.as_ref() {
                    classpath.class(OBJECT)
                } else {
                    Ok(self.clone())
                }
            }
            Self::Array(array) => array.common_superclass(self, other, classpath),
            Self::Class(class) => match other.as_ref() {
                Self::Class(other_class) => class.common_superclass(self, other, other_class, classpath),
                _ => other.common_superclass(self, classpath),
            },
        }
    }

    /// Returns the instance field stored at `offset` bytes into objects of this type.
    pub fn field_by_offset(
        &self,
        offset: usize,
        classpath: &ClassPath,
    ) -> ClassPathResult<Option<FieldRef>> {
        match self {
            Self::Class(class) => Ok(class.instance_fields(classpath)?.field_at(offset).cloned()),
            Self::Array(array) => Ok(array.field_by_offset(offset)),
            Self::Unknown => classpath.class(OBJECT)?.field_by_offset(offset, classpath),
            Self::Primitive(_) => Ok(None),
        }
    }

    /// Returns the method in the given vtable slot of this type.
    pub fn method_by_vtable_index(
        &self,
        index: usize,
        classpath: &ClassPath,
    ) -> ClassPathResult<Option<VtableEntry>> {
        match self {
            Self::Class(class) => Ok(class.vtable(classpath)?.get(index).cloned()),
            Self::Array(_) | Self::Unknown => classpath
                .class(OBJECT)?
                .method_by_vtable_index(index, classpath),
            Self::Primitive(_) => Ok(None),
        }
    }

    #[must_use]
    pub const fn as_class(&self) -> Option<&ClassProto> {
        match self {
            Self::Class(class) => Some(class),
            _ => None,
        }
    }
}

/// The set of known classes and the cache of their prototypes.
///
/// A class path is shared (by reference) between every analysis of a session, possibly from
/// several threads.
#[derive(Debug)]
pub struct ClassPath {
    config: ClassPathConfig,
    defs: HashMap<String, Arc<ClassDef>>,
    loaded: RwLock<HashMap<String, Arc<TypeProto>>>,
    unknown: Arc<TypeProto>,
}

impl ClassPath {
    /// Builds a class path from class definitions, searched in order: the first definition of
    /// a type wins. Fallback definitions of a few core classes are appended.
    pub fn new<I>(classes: I, config: ClassPathConfig) -> Self
    where
        I: IntoIterator<Item = ClassDef>,
    {
        let mut defs = HashMap::new();
        for def in classes.into_iter().chain(basic_classes()) {
            let descriptor = def.descriptor();
            if defs.contains_key(&descriptor) {
                debug!("ignoring duplicate definition of {descriptor}");
                continue;
            }
            defs.insert(descriptor, Arc::new(def));
        }

        let unknown = Arc::new(TypeProto::Unknown);
        let mut loaded = HashMap::new();
        loaded.insert(UNKNOWN_CLASS.to_string(), unknown.clone());
        for primitive in PRIMITIVES {
            loaded.insert(
                primitive.to_string(),
                Arc::new(TypeProto::Primitive(primitive.to_string())),
            );
        }

        Self {
            config,
            defs,
            loaded: RwLock::new(loaded),
            unknown,
        }
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ClassPathConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub const fn check_package_private_access(&self) -> bool {
        self.config.check_package_private_access
    }

    #[must_use]
    pub fn unknown_class(&self) -> Arc<TypeProto> {
        self.unknown.clone()
    }

    /// Returns the definition of a class.
    pub fn class_def(&self, descriptor: &str) -> ClassPathResult<Arc<ClassDef>> {
        self.defs
            .get(descriptor)
            .cloned()
            .ok_or_else(|| ClassPathError::UnresolvedClass(descriptor.to_string()))
    }

    pub fn iter_class_defs(&self) -> impl Iterator<Item = &Arc<ClassDef>> {
        self.defs.values()
    }

    /// Returns the prototype of a type descriptor, building it on first request.
    pub fn class(&self, descriptor: &str) -> ClassPathResult<Arc<TypeProto>> {
        if let Some(proto) = self
            .loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(descriptor)
        {
            return Ok(proto.clone());
        }

        let proto = Arc::new(if descriptor.starts_with('[') {
            TypeProto::Array(ArrayProto::new(descriptor)?)
        } else if descriptor.starts_with('L') && descriptor.ends_with(';') && descriptor.len() > 2 {
            TypeProto::Class(ClassProto::new(descriptor, self.defs.get(descriptor).cloned()))
        } else {
            return Err(ClassPathError::InvalidType(descriptor.to_string()));
        });

        let mut loaded = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
        Ok(loaded
            .entry(descriptor.to_string())
            .or_insert(proto)
            .clone())
    }

    /// Same as [`ClassPath::class`] for a dex model type.
    pub fn class_of(&self, type_: &Type) -> ClassPathResult<Arc<TypeProto>> {
        self.class(&type_.to_string())
    }
}

fn object_method(name: &str, params: Vec<Type>, return_type: Type, flags: MethodFlags) -> MethodDef {
    MethodDef::new(name, params, return_type, flags)
}

/// Fallback definitions of the classes every analysis relies on.
fn basic_classes() -> Vec<ClassDef> {
    let object = Type::class("java/lang/Object");
    let serializable = Type::class("java/io/Serializable");
    let public_native = MethodFlags::ACC_PUBLIC | MethodFlags::ACC_NATIVE;
    let public_final_native = public_native | MethodFlags::ACC_FINAL;

    vec![
        ClassDef::new(object.clone(), ClassFlags::ACC_PUBLIC)
            .with_method(object_method(
                "<init>",
                vec![],
                Type::Void,
                MethodFlags::ACC_PUBLIC | MethodFlags::ACC_CONSTRUCTOR,
            ))
            .with_method(object_method(
                "clone",
                vec![],
                object.clone(),
                MethodFlags::ACC_PROTECTED | MethodFlags::ACC_NATIVE,
            ))
            .with_method(object_method(
                "equals",
                vec![object.clone()],
                Type::Boolean,
                MethodFlags::ACC_PUBLIC,
            ))
            .with_method(object_method("finalize", vec![], Type::Void, MethodFlags::ACC_PROTECTED))
            .with_method(object_method(
                "getClass",
                vec![],
                Type::class("java/lang/Class"),
                public_final_native,
            ))
            .with_method(object_method("hashCode", vec![], Type::Int, public_native))
            .with_method(object_method("notify", vec![], Type::Void, public_final_native))
            .with_method(object_method("notifyAll", vec![], Type::Void, public_final_native))
            .with_method(object_method(
                "toString",
                vec![],
                Type::class("java/lang/String"),
                MethodFlags::ACC_PUBLIC,
            ))
            .with_method(object_method("wait", vec![], Type::Void, public_final_native))
            .with_method(object_method("wait", vec![Type::Long], Type::Void, public_final_native))
            .with_method(object_method(
                "wait",
                vec![Type::Long, Type::Int],
                Type::Void,
                public_final_native,
            )),
        ClassDef::new(
            Type::class("java/lang/Class"),
            ClassFlags::ACC_PUBLIC | ClassFlags::ACC_FINAL,
        )
        .with_superclass(object.clone())
        .with_interface(serializable.clone()),
        ClassDef::new(
            Type::class("java/lang/String"),
            ClassFlags::ACC_PUBLIC | ClassFlags::ACC_FINAL,
        )
        .with_superclass(object.clone())
        .with_interface(serializable.clone()),
        ClassDef::new(Type::class("java/lang/Throwable"), ClassFlags::ACC_PUBLIC)
            .with_superclass(object)
            .with_interface(serializable.clone()),
        ClassDef::new(
            Type::class("java/lang/Cloneable"),
            ClassFlags::ACC_PUBLIC | ClassFlags::ACC_INTERFACE | ClassFlags::ACC_ABSTRACT,
        ),
        ClassDef::new(
            serializable,
            ClassFlags::ACC_PUBLIC | ClassFlags::ACC_INTERFACE | ClassFlags::ACC_ABSTRACT,
        ),
    ]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a class path from `(class, superclass, interfaces, is_interface)` tuples.
    pub(crate) fn hierarchy(classes: &[(&str, Option<&str>, &[&str], bool)]) -> ClassPath {
        let defs = classes.iter().map(|(name, superclass, interfaces, is_interface)| {
            let flags = if *is_interface {
                ClassFlags::ACC_PUBLIC | ClassFlags::ACC_INTERFACE | ClassFlags::ACC_ABSTRACT
            } else {
                ClassFlags::ACC_PUBLIC
            };
            let mut def = ClassDef::new(Type::try_from(*name).unwrap(), flags);
            if let Some(superclass) = superclass {
                def = def.with_superclass(Type::try_from(*superclass).unwrap());
            }
            for iface in *interfaces {
                def = def.with_interface(Type::try_from(*iface).unwrap());
            }
            def
        });
        ClassPath::new(defs.collect::<Vec<_>>(), ClassPathConfig::default())
    }

    #[test]
    fn test_preloaded_types() {
        let cp = ClassPath::new(vec![], ClassPathConfig::default());
        assert!(matches!(cp.class("I").unwrap().as_ref(), TypeProto::Primitive(_)));
        assert!(matches!(cp.class(UNKNOWN_CLASS).unwrap().as_ref(), TypeProto::Unknown));
        assert!(matches!(cp.class("[I").unwrap().as_ref(), TypeProto::Array(_)));
        assert!(cp.class_def(OBJECT).is_ok());
        assert!(cp.class_def("Ljava/io/Serializable;").is_ok());
        assert!(matches!(
            cp.class_def("Lfoo/Bar;"),
            Err(ClassPathError::UnresolvedClass(_))
        ));
        assert!(matches!(cp.class("V"), Err(ClassPathError::InvalidType(_))));
        assert!(matches!(cp.class("["), Err(ClassPathError::InvalidType(_))));
    }

    #[test]
    fn test_protos_are_memoized() {
        let cp = ClassPath::new(vec![], ClassPathConfig::default());
        let a = cp.class("Lfoo/Bar;").unwrap();
        let b = cp.class("Lfoo/Bar;").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_first_definition_wins() {
        let first = ClassDef::new(Type::class("A"), ClassFlags::ACC_PUBLIC);
        let second = ClassDef::new(Type::class("A"), ClassFlags::ACC_INTERFACE);
        let cp = ClassPath::new(vec![first, second], ClassPathConfig::default());
        assert!(!cp.class("LA;").unwrap().is_interface().unwrap());
    }

    #[test]
    fn test_superclass_chain() {
        let cp = hierarchy(&[
            ("LA;", Some(OBJECT), &[], false),
            ("LB;", Some("LA;"), &[], false),
            ("LC;", Some("LMissing;"), &[], false),
        ]);
        let chain: Vec<String> = cp
            .class("LB;")
            .unwrap()
            .superclass_chain(&cp)
            .unwrap()
            .iter()
            .map(|p| p.descriptor().to_string())
            .collect();
        assert_eq!(chain, vec!["LA;", OBJECT]);

        let chain: Vec<String> = cp
            .class("LC;")
            .unwrap()
            .superclass_chain(&cp)
            .unwrap()
            .iter()
            .map(|p| p.descriptor().to_string())
            .collect();
        assert_eq!(chain, vec!["LMissing;", UNKNOWN_CLASS]);
    }

    #[test]
    fn test_cyclic_superclasses() {
        let cp = hierarchy(&[("LA;", Some("LB;"), &[], false), ("LB;", Some("LA;"), &[], false)]);
        let a = cp.class("LA;").unwrap();
        assert!(matches!(a.superclass_chain(&cp), Err(ClassPathError::Cycle(_))));
        let b = cp.class("LB;").unwrap();
        let x = cp.class("LX;").unwrap();
        assert_eq!(a.common_superclass(&b, &cp).unwrap().descriptor(), UNKNOWN_CLASS);
        assert_eq!(a.common_superclass(&x, &cp).unwrap().descriptor(), UNKNOWN_CLASS);
    }

    #[test]
    fn test_shared_between_threads() {
        let cp = Arc::new(hierarchy(&[
            ("LA;", Some(OBJECT), &[], false),
            ("LB;", Some("LA;"), &[], false),
            ("LC;", Some("LA;"), &[], false),
        ]));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cp = cp.clone();
                std::thread::spawn(move || {
                    let b = cp.class("LB;").unwrap();
                    let c = cp.class("LC;").unwrap();
                    b.common_superclass(&c, &cp).unwrap().descriptor().to_string()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "LA;");
        }
    }

    #[test]
    fn test_primitive_has_no_common_superclass() {
        let cp = ClassPath::new(vec![], ClassPathConfig::default());
        let int = cp.class("I").unwrap();
        let object = cp.class(OBJECT).unwrap();
        assert!(matches!(
            int.common_superclass(&object, &cp),
            Err(ClassPathError::NoCommonSuperclass(_))
        ));
    }
}
