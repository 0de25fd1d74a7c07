use crate::classpath::errors::{ClassPathError, ClassPathResult};
use crate::classpath::layout::{self, FieldLayout};
use crate::classpath::memo::Memo;
use crate::classpath::vtable::{self, Vtable};
use crate::classpath::{ClassPath, TypeProto, OBJECT};
use dw_dex::classes::ClassDef;
use log::warn;
use std::sync::Arc;

/// Every interface implemented by a class, directly or through its superclasses and
/// superinterfaces, in discovery order.
///
/// Interfaces that come from the superclass, and the class itself if it is an interface, are
/// recorded without definition: they are not *direct* interfaces.
#[derive(Debug)]
pub struct Interfaces {
    entries: Vec<(String, Option<Arc<ClassDef>>)>,
    fully_resolved: bool,
}

impl Interfaces {
    #[must_use]
    pub fn contains(&self, iface: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == iface)
    }

    #[inline]
    #[must_use]
    pub const fn is_fully_resolved(&self) -> bool {
        self.fully_resolved
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    fn insert(&mut self, iface: &str, def: Option<Arc<ClassDef>>) {
        if !self.contains(iface) {
            self.entries.push((iface.to_string(), def));
        }
    }
}

/// The prototype of a class or interface type.
#[derive(Debug)]
pub struct ClassProto {
    descriptor: String,
    def: Option<Arc<ClassDef>>,
    interfaces: Memo<Interfaces>,
    vtable: Memo<Vtable>,
    fields: Memo<FieldLayout>,
}

impl ClassProto {
    pub(crate) fn new(descriptor: &str, def: Option<Arc<ClassDef>>) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            def,
            interfaces: Memo::new(),
            vtable: Memo::new(),
            fields: Memo::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Returns the definition of the class, failing if the class is not on the class path.
    pub fn class_def(&self) -> ClassPathResult<&Arc<ClassDef>> {
        self.def
            .as_ref()
            .ok_or_else(|| ClassPathError::UnresolvedClass(self.descriptor.clone()))
    }

    pub fn is_interface(&self) -> ClassPathResult<bool> {
        Ok(self.class_def()?.is_interface())
    }

    pub fn superclass(&self) -> ClassPathResult<Option<String>> {
        Ok(self
            .class_def()?
            .superclass
            .as_ref()
            .map(ToString::to_string))
    }

    pub fn interfaces(&self, classpath: &ClassPath) -> ClassPathResult<Arc<Interfaces>> {
        self.interfaces.get_or_try_init(&self.descriptor, || {
            self.compute_interfaces(classpath)
        })
    }

    fn compute_interfaces(&self, classpath: &ClassPath) -> ClassPathResult<Interfaces> {
        let mut interfaces = Interfaces {
            entries: Vec::new(),
            fully_resolved: true,
        };

        match self.class_def() {
            Ok(def) => {
                for iface in &def.interfaces {
                    let name = iface.to_string();
                    if interfaces.contains(&name) {
                        continue;
                    }
                    match classpath.class_def(&name) {
                        Ok(iface_def) => interfaces.insert(&name, Some(iface_def)),
                        Err(_) => {
                            interfaces.insert(&name, None);
                            interfaces.fully_resolved = false;
                        }
                    }

                    let proto = classpath.class(&name)?;
                    let Some(iface_proto) = proto.as_class() else {
                        interfaces.fully_resolved = false;
                        break;
                    };
                    match iface_proto.interfaces(classpath) {
                        Ok(inherited) => {
                            for (sub, sub_def) in &inherited.entries {
                                interfaces.insert(sub, sub_def.clone());
                            }
                            if !inherited.fully_resolved {
                                interfaces.fully_resolved = false;
                            }
                        }
                        Err(err) if err.is_unresolved() => {
                            if let ClassPathError::Cycle(_) = err {
                                warn!("cyclic interface hierarchy through {name}");
                            }
                            interfaces.fully_resolved = false;
                            // later declared interfaces are not collected
                            break;
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
            Err(_) => interfaces.fully_resolved = false,
        }

        if self.is_interface()? {
            interfaces.insert(&self.descriptor, None);
        }

        match self.superclass() {
            Ok(Some(superclass)) => {
                let proto = classpath.class(&superclass)?;
                if let Some(super_proto) = proto.as_class() {
                    match super_proto.interfaces(classpath) {
                        Ok(inherited) => {
                            for sub in inherited.iter() {
                                interfaces.insert(sub, None);
                            }
                            if !inherited.fully_resolved {
                                interfaces.fully_resolved = false;
                            }
                        }
                        Err(err) if err.is_unresolved() => interfaces.fully_resolved = false,
                        Err(err) => return Err(err),
                    }
                }
            }
            Ok(None) => (),
            Err(_) => interfaces.fully_resolved = false,
        }

        Ok(interfaces)
    }

    /// Returns the definitions of the interfaces declared by this class or inherited from its
    /// superinterfaces (not those of its superclasses).
    pub fn direct_interfaces(&self, classpath: &ClassPath) -> ClassPathResult<Vec<Arc<ClassDef>>> {
        let interfaces = self.interfaces(classpath)?;
        if !interfaces.fully_resolved {
            return Err(ClassPathError::InterfacesNotResolved(self.descriptor.clone()));
        }
        Ok(interfaces
            .entries
            .iter()
            .filter_map(|(_, def)| def.clone())
            .collect())
    }

    pub fn implements_interface(&self, iface: &str, classpath: &ClassPath) -> ClassPathResult<bool> {
        let interfaces = self.interfaces(classpath)?;
        if interfaces.contains(iface) {
            Ok(true)
        } else if !interfaces.fully_resolved {
            Err(ClassPathError::InterfacesNotResolved(self.descriptor.clone()))
        } else {
            Ok(false)
        }
    }

    /// Checks whether `self` is an interface implemented by `other`.
    ///
    /// A class without definition is assumed to be an interface; in that case a failure to
    /// resolve the interfaces of `other` answers `false`.
    fn check_interface(&self, other: &Self, classpath: &ClassPath) -> ClassPathResult<bool> {
        let (resolved, is_interface) = match self.is_interface() {
            Ok(is_interface) => (true, is_interface),
            Err(err) if err.is_unresolved() => (false, true),
            Err(err) => return Err(err),
        };
        if is_interface {
            match other.implements_interface(&self.descriptor, classpath) {
                Ok(true) => return Ok(true),
                Ok(false) => (),
                Err(err) if err.is_unresolved() && !resolved => (),
                Err(err) => return Err(err),
            }
        }
        Ok(false)
    }

    pub(crate) fn common_superclass(
        &self,
        this: &Arc<TypeProto>,
        other: &Arc<TypeProto>,
        other_class: &Self,
        classpath: &ClassPath,
    ) -> ClassPathResult<Arc<TypeProto>> {
        if self.descriptor == other_class.descriptor || self.descriptor == OBJECT {
            return Ok(this.clone());
        }
        if other_class.descriptor == OBJECT {
            return Ok(other.clone());
        }

        let mut unresolved = false;
        match self.check_interface(other_class, classpath) {
            Ok(true) => return Ok(this.clone()),
            Ok(false) => (),
            Err(err) if err.is_unresolved() => unresolved = true,
            Err(err) => return Err(err),
        }
        match other_class.check_interface(self, classpath) {
            Ok(true) => return Ok(other.clone()),
            Ok(false) => (),
            Err(err) if err.is_unresolved() => unresolved = true,
            Err(err) => return Err(err),
        }
        if unresolved {
            return Ok(classpath.unknown_class());
        }

        let chain_of = |proto: &Arc<TypeProto>| -> ClassPathResult<Option<Vec<Arc<TypeProto>>>> {
            match proto.superclass_chain(classpath) {
                Ok(ancestors) => {
                    let mut chain = vec![proto.clone()];
                    chain.extend(ancestors);
                    chain.reverse();
                    Ok(Some(chain))
                }
                Err(ClassPathError::Cycle(what)) => {
                    warn!("cannot compute common superclass: cyclic {what}");
                    Ok(None)
                }
                Err(err) => Err(err),
            }
        };
        let (Some(this_chain), Some(other_chain)) = (chain_of(this)?, chain_of(other)?) else {
            return Ok(classpath.unknown_class());
        };

        let common = this_chain
            .iter()
            .zip(other_chain.iter())
            .take_while(|(a, b)| a.descriptor() == b.descriptor())
            .last()
            .map(|(a, _)| a.clone());
        Ok(common.unwrap_or_else(|| classpath.unknown_class()))
    }

    /// Returns the instance fields of objects of this class, indexed by their offset.
    pub fn instance_fields(&self, classpath: &ClassPath) -> ClassPathResult<Arc<FieldLayout>> {
        self.fields.get_or_try_init(&self.descriptor, || {
            layout::compute(self, classpath)
        })
    }

    /// Returns the virtual method table of this class.
    pub fn vtable(&self, classpath: &ClassPath) -> ClassPathResult<Arc<Vtable>> {
        self.vtable.get_or_try_init(&self.descriptor, || {
            vtable::compute(self, classpath)
        })
    }
}
