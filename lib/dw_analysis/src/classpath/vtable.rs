use crate::classpath::class::ClassProto;
use crate::classpath::errors::{ClassPathError, ClassPathResult};
use crate::classpath::{ClassPath, OBJECT};
use dw_dex::classes::package_of;
use dw_dex::methods::{MethodFlags, MethodRef};
use dw_dex::types::Type;
use log::warn;

/// A vtable slot: the method implementation selected for a virtual method signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtableEntry {
    pub method: MethodRef,
    pub flags: MethodFlags,
}

/// Virtual method table of a class, with slot indices as used by `invoke-*-quick`.
#[derive(Debug, Clone, Default)]
pub struct Vtable {
    entries: Vec<VtableEntry>,
    fully_resolved: bool,
}

impl Vtable {
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&VtableEntry> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VtableEntry> {
        self.entries.iter()
    }

    /// A vtable is not fully resolved when some superclass is missing: its own methods could
    /// not be placed after an unknown number of inherited slots.
    #[inline]
    #[must_use]
    pub const fn is_fully_resolved(&self) -> bool {
        self.fully_resolved
    }
}

fn object_vtable(classpath: &ClassPath) -> ClassPathResult<Vec<VtableEntry>> {
    let object = classpath.class(OBJECT)?;
    match object.as_class() {
        Some(proto) => Ok(proto.vtable(classpath)?.entries.clone()),
        None => Err(ClassPathError::InvalidType(OBJECT.to_string())),
    }
}

pub(crate) fn compute(proto: &ClassProto, classpath: &ClassPath) -> ClassPathResult<Vtable> {
    let superclass = match proto.superclass() {
        Ok(superclass) => superclass,
        Err(err) if err.is_unresolved() => {
            return Ok(Vtable {
                entries: object_vtable(classpath)?,
                fully_resolved: false,
            });
        }
        Err(err) => return Err(err),
    };

    let mut entries = Vec::new();
    if let Some(superclass) = superclass {
        let super_proto = classpath.class(&superclass)?;
        let Some(super_proto) = super_proto.as_class() else {
            return Err(ClassPathError::InvalidType(superclass));
        };
        match super_proto.vtable(classpath) {
            Ok(inherited) => {
                entries.extend(inherited.entries.iter().cloned());
                if !inherited.fully_resolved {
                    return Ok(Vtable {
                        entries,
                        fully_resolved: false,
                    });
                }
            }
            Err(err @ ClassPathError::Cycle(_)) => {
                warn!("{err}");
                return Ok(Vtable {
                    entries,
                    fully_resolved: false,
                });
            }
            Err(err) => return Err(err),
        }
    }

    if !proto.is_interface()? {
        let def = proto.class_def()?;
        let check_access = classpath.check_package_private_access();
        let package = package_of(proto.descriptor());

        let methods = def.virtual_methods().map(|method| VtableEntry {
            method: method.to_ref(&def.type_),
            flags: method.flags,
        });
        add_methods(&mut entries, methods, true, check_access, &package);

        // interface methods are assumed to be implemented by this class
        for iface in proto.direct_interfaces(classpath)? {
            let methods = iface.virtual_methods().map(|method| VtableEntry {
                method: method.to_ref(&def.type_),
                flags: method.flags,
            });
            add_methods(&mut entries, methods, false, check_access, &package);
        }
    }

    Ok(Vtable {
        entries,
        fully_resolved: true,
    })
}

fn signature_key(method: &MethodRef) -> (String, String, Vec<String>) {
    (
        method.name.clone(),
        method.return_type.to_string(),
        method.params.iter().map(Type::to_string).collect(),
    )
}

/// Appends methods to a vtable, in signature order, unless they override an accessible slot.
/// Overriding methods replace the slot content when `replace` is set.
fn add_methods<I>(
    vtable: &mut Vec<VtableEntry>,
    methods: I,
    replace: bool,
    check_access: bool,
    package: &str,
) where
    I: Iterator<Item = VtableEntry>,
{
    let mut methods: Vec<VtableEntry> = methods.collect();
    methods.sort_by_cached_key(|entry| signature_key(&entry.method));

    'methods: for entry in methods {
        for slot in vtable.iter_mut() {
            if !slot.method.same_signature(&entry.method) {
                continue;
            }
            let accessible = !slot.flags.is_package_private()
                || package_of(&slot.method.definer.to_string()) == package;
            if !check_access || accessible {
                if replace {
                    *slot = entry;
                }
                continue 'methods;
            }
        }
        vtable.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use crate::classpath::{ClassPath, ClassPathConfig, OBJECT};
    use dw_dex::classes::{ClassDef, ClassFlags};
    use dw_dex::methods::{MethodDef, MethodFlags};
    use dw_dex::types::Type;

    fn method(name: &str, flags: MethodFlags) -> MethodDef {
        MethodDef::new(name, vec![], Type::Void, flags)
    }

    fn slots(cp: &ClassPath, desc: &str) -> Vec<String> {
        let proto = cp.class(desc).unwrap();
        proto
            .as_class()
            .unwrap()
            .vtable(cp)
            .unwrap()
            .iter()
            .map(|entry| format!("{}->{}", entry.method.definer, entry.method.name))
            .collect()
    }

    #[test]
    fn test_object_vtable() {
        let cp = ClassPath::new(vec![], ClassPathConfig::default());
        let names: Vec<String> = slots(&cp, OBJECT)
            .into_iter()
            .map(|s| s.trim_start_matches("Ljava/lang/Object;->").to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "clone", "equals", "finalize", "getClass", "hashCode", "notify", "notifyAll",
                "toString", "wait", "wait", "wait"
            ]
        );
    }

    #[test]
    fn test_overrides_and_new_slots() {
        let cp = ClassPath::new(
            vec![
                ClassDef::new(Type::class("a/A"), ClassFlags::ACC_PUBLIC)
                    .with_superclass(Type::class("java/lang/Object"))
                    .with_method(method("run", MethodFlags::ACC_PUBLIC))
                    .with_method(method("<init>", MethodFlags::ACC_CONSTRUCTOR))
                    .with_method(method("helper", MethodFlags::ACC_PRIVATE)),
                ClassDef::new(Type::class("a/B"), ClassFlags::ACC_PUBLIC)
                    .with_superclass(Type::class("a/A"))
                    .with_method(method("stop", MethodFlags::ACC_PUBLIC))
                    .with_method(method("run", MethodFlags::ACC_PUBLIC)),
            ],
            ClassPathConfig::default(),
        );
        let b = slots(&cp, "La/B;");
        assert_eq!(b.len(), 13);
        assert_eq!(b[11], "La/B;->run");
        assert_eq!(b[12], "La/B;->stop");
        assert_eq!(slots(&cp, "La/A;")[11], "La/A;->run");

        let b = cp.class("La/B;").unwrap();
        let entry = b.method_by_vtable_index(12, &cp).unwrap().unwrap();
        assert_eq!(entry.method.name, "stop");
        assert!(b.method_by_vtable_index(13, &cp).unwrap().is_none());
        let array = cp.class("[I").unwrap();
        let entry = array.method_by_vtable_index(1, &cp).unwrap().unwrap();
        assert_eq!(entry.method.name, "equals");
    }

    #[test]
    fn test_interface_methods_take_slots() {
        let cp = ClassPath::new(
            vec![
                ClassDef::new(
                    Type::class("I"),
                    ClassFlags::ACC_INTERFACE | ClassFlags::ACC_ABSTRACT,
                )
                .with_superclass(Type::class("java/lang/Object"))
                .with_method(method("act", MethodFlags::ACC_PUBLIC | MethodFlags::ACC_ABSTRACT)),
                ClassDef::new(Type::class("A"), ClassFlags::ACC_ABSTRACT)
                    .with_superclass(Type::class("java/lang/Object"))
                    .with_interface(Type::class("I")),
            ],
            ClassPathConfig::default(),
        );
        assert_eq!(slots(&cp, "LA;")[11], "LA;->act");
        // interfaces have no own slots
        assert_eq!(slots(&cp, "LI;").len(), 11);
    }

    #[test]
    fn test_package_private_override() {
        let classes = vec![
            ClassDef::new(Type::class("a/A"), ClassFlags::ACC_PUBLIC)
                .with_superclass(Type::class("java/lang/Object"))
                .with_method(method("run", MethodFlags::empty())),
            ClassDef::new(Type::class("b/B"), ClassFlags::ACC_PUBLIC)
                .with_superclass(Type::class("a/A"))
                .with_method(method("run", MethodFlags::ACC_PUBLIC)),
        ];

        let cp = ClassPath::new(classes.clone(), ClassPathConfig::for_api(15));
        assert_eq!(slots(&cp, "Lb/B;").len(), 12);

        let cp = ClassPath::new(classes, ClassPathConfig::for_api(17));
        let b = slots(&cp, "Lb/B;");
        assert_eq!(b.len(), 13);
        assert_eq!(b[11], "La/A;->run");
        assert_eq!(b[12], "Lb/B;->run");
    }

    #[test]
    fn test_missing_superclass() {
        let cp = ClassPath::new(
            vec![ClassDef::new(Type::class("A"), ClassFlags::ACC_PUBLIC)
                .with_superclass(Type::class("Missing"))
                .with_method(method("run", MethodFlags::ACC_PUBLIC))],
            ClassPathConfig::default(),
        );
        let a = cp.class("LA;").unwrap();
        let vtable = a.as_class().unwrap().vtable(&cp).unwrap();
        assert!(!vtable.is_fully_resolved());
        assert_eq!(vtable.len(), 11);
    }
}
