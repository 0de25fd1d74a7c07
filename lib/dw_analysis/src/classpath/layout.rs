use crate::classpath::class::ClassProto;
use crate::classpath::errors::ClassPathResult;
use crate::classpath::ClassPath;
use dw_dex::fields::FieldRef;
use dw_dex::types::Type;

/// Instance fields of a class indexed by their byte offset in objects, superclass fields
/// included, in increasing offset order.
#[derive(Debug, Default)]
pub struct FieldLayout {
    fields: Vec<(usize, FieldRef)>,
}

impl FieldLayout {
    #[must_use]
    pub fn field_at(&self, offset: usize) -> Option<&FieldRef> {
        self.fields
            .binary_search_by_key(&offset, |(o, _)| *o)
            .ok()
            .map(|index| &self.fields[index].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &FieldRef)> {
        self.fields.iter().map(|(offset, field)| (*offset, field))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Offset at which a subclass starts laying out its own fields.
    #[must_use]
    pub fn next_offset(&self) -> usize {
        self.fields.last().map_or(FIRST_OFFSET, |(offset, field)| {
            offset + if field.type_.is_wide() { 8 } else { 4 }
        })
    }
}

/// Objects start with an 8-bytes header.
const FIRST_OFFSET: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Reference,
    Wide,
    Other,
}

fn kind_of(type_: &Type) -> Kind {
    if type_.is_reference() {
        Kind::Reference
    } else if type_.is_wide() {
        Kind::Wide
    } else {
        Kind::Other
    }
}

/// Lays out instance fields the way the Dalvik VM does: references first, then 64-bit values
/// aligned on 8 bytes, then the remaining 32-bit values. A 32-bit field may be moved up to fill
/// the alignment gap before the first wide field.
pub(crate) fn compute(proto: &ClassProto, classpath: &ClassPath) -> ClassPathResult<FieldLayout> {
    let def = proto.class_def()?;

    let mut fields: Vec<FieldRef> = def
        .instance_fields()
        .map(|field| field.to_ref(&def.type_))
        .collect();
    fields.sort_by_cached_key(|field| (field.name.clone(), field.type_.to_string()));
    let mut kinds: Vec<Kind> = fields.iter().map(|field| kind_of(&field.type_)).collect();

    let count = fields.len();
    let mut front = 0;
    let mut back = count;

    // references
    while front < back {
        if kinds[front] == Kind::Reference {
            front += 1;
            continue;
        }
        back -= 1;
        while back > front && kinds[back] != Kind::Reference {
            back -= 1;
        }
        if back == front {
            break;
        }
        fields.swap(front, back);
        kinds.swap(front, back);
        front += 1;
    }

    let super_layout = match proto.superclass()? {
        Some(superclass) => match classpath.class(&superclass)?.as_class() {
            Some(super_proto) => Some(super_proto.instance_fields(classpath)?),
            None => None,
        },
        None => None,
    };
    let start_offset = super_layout
        .as_ref()
        .map_or(FIRST_OFFSET, |layout| layout.next_offset());

    // a 32-bit field fills the gap before the first wide one, if any
    let misaligned = usize::from(start_offset % 8 != 0);
    if front < count && front % 2 != misaligned {
        if kinds[front] == Kind::Wide {
            back = count - 1;
            while back > front && kinds[back] != Kind::Other {
                back -= 1;
            }
            if back > front {
                fields.swap(front, back);
                kinds.swap(front, back);
                front += 1;
            }
        } else {
            front += 1;
        }
    }

    // wide fields, then the remaining ones
    back = count;
    while front < back {
        if kinds[front] == Kind::Wide {
            front += 1;
            continue;
        }
        back -= 1;
        while back > front && kinds[back] != Kind::Wide {
            back -= 1;
        }
        if back == front {
            break;
        }
        fields.swap(front, back);
        kinds.swap(front, back);
        front += 1;
    }

    let mut layout = FieldLayout {
        fields: super_layout
            .map(|layout| layout.fields.clone())
            .unwrap_or_default(),
    };
    let mut offset = layout.next_offset();
    let mut got_wide = false;
    for (field, kind) in fields.into_iter().zip(kinds) {
        if kind == Kind::Wide && !got_wide {
            if offset % 8 != 0 {
                offset += 4;
            }
            got_wide = true;
        }
        let size = if kind == Kind::Wide { 8 } else { 4 };
        layout.fields.push((offset, field));
        offset += size;
    }
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use crate::classpath::{ClassPath, ClassPathConfig, OBJECT};
    use dw_dex::classes::{ClassDef, ClassFlags};
    use dw_dex::fields::{FieldDef, FieldFlags};
    use dw_dex::types::Type;

    fn class(name: &str, superclass: &str, fields: &[(&str, Type)]) -> ClassDef {
        fields.iter().fold(
            ClassDef::new(Type::class(name), ClassFlags::ACC_PUBLIC)
                .with_superclass(Type::try_from(superclass).unwrap()),
            |def, (name, type_)| def.with_field(FieldDef::new(name, type_.clone(), FieldFlags::empty())),
        )
    }

    fn offsets(cp: &ClassPath, desc: &str) -> Vec<(usize, String)> {
        let proto = cp.class(desc).unwrap();
        proto
            .as_class()
            .unwrap()
            .instance_fields(cp)
            .unwrap()
            .iter()
            .map(|(offset, field)| (offset, field.name.clone()))
            .collect()
    }

    #[test]
    fn test_references_then_wide_then_others() {
        let cp = ClassPath::new(
            vec![class(
                "A",
                OBJECT,
                &[
                    ("a", Type::Int),
                    ("b", Type::Long),
                    ("c", Type::class("java/lang/String")),
                    ("d", Type::Boolean),
                ],
            )
            .with_field(FieldDef::new("s", Type::Int, FieldFlags::ACC_STATIC))],
            ClassPathConfig::default(),
        );
        // c is moved to the front, then the last 32-bit field fills the gap before b
        assert_eq!(
            offsets(&cp, "LA;"),
            vec![
                (8, "c".to_string()),
                (12, "d".to_string()),
                (16, "b".to_string()),
                (24, "a".to_string())
            ]
        );
    }

    #[test]
    fn test_wide_alignment_without_filler() {
        let cp = ClassPath::new(
            vec![class("A", OBJECT, &[("x", Type::class("java/lang/Object")), ("y", Type::Double)])],
            ClassPathConfig::default(),
        );
        assert_eq!(
            offsets(&cp, "LA;"),
            vec![(8, "x".to_string()), (16, "y".to_string())]
        );
    }

    #[test]
    fn test_subclass_continues_after_superclass() {
        let cp = ClassPath::new(
            vec![
                class("A", OBJECT, &[("x", Type::Int)]),
                class("B", "LA;", &[("y", Type::Long), ("z", Type::Int)]),
            ],
            ClassPathConfig::default(),
        );
        assert_eq!(
            offsets(&cp, "LB;"),
            vec![
                (8, "x".to_string()),
                (12, "z".to_string()),
                (16, "y".to_string())
            ]
        );
        let b = cp.class("LB;").unwrap();
        assert_eq!(b.field_by_offset(12, &cp).unwrap().unwrap().name, "z");
        assert!(b.field_by_offset(20, &cp).unwrap().is_none());
    }

    #[test]
    fn test_undefined_class_has_no_layout() {
        let cp = ClassPath::new(vec![class("B", "LMissing;", &[])], ClassPathConfig::default());
        let b = cp.class("LB;").unwrap();
        assert!(b.field_by_offset(8, &cp).is_err());
        let object = cp.class(OBJECT).unwrap();
        assert!(object.field_by_offset(8, &cp).unwrap().is_none());
    }
}
