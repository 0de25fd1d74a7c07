use crate::classpath::errors::{ClassPathError, ClassPathResult};
use crate::classpath::{ClassPath, TypeProto, OBJECT};
use dw_dex::fields::FieldRef;
use dw_dex::types::Type;
use std::sync::Arc;

/// The prototype of an array type.
#[derive(Debug)]
pub struct ArrayProto {
    descriptor: String,
    dimensions: usize,
}

fn array_type(element: &str, dimensions: usize) -> String {
    format!("{}{element}", "[".repeat(dimensions))
}

impl ArrayProto {
    pub(crate) fn new(descriptor: &str) -> ClassPathResult<Self> {
        let dimensions = descriptor.bytes().take_while(|b| *b == b'[').count();
        if dimensions == 0 || dimensions == descriptor.len() {
            return Err(ClassPathError::InvalidType(descriptor.to_string()));
        }
        Ok(Self {
            descriptor: descriptor.to_string(),
            dimensions,
        })
    }

    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    #[inline]
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Base element type, e.g. `Ljava/lang/String;` for `[[Ljava/lang/String;`.
    #[must_use]
    pub fn element_type(&self) -> &str {
        &self.descriptor[self.dimensions..]
    }

    /// Element type with one less dimension, e.g. `[Ljava/lang/String;` for
    /// `[[Ljava/lang/String;`.
    #[must_use]
    pub fn immediate_element_type(&self) -> &str {
        &self.descriptor[1..]
    }

    fn has_primitive_elements(&self) -> bool {
        self.element_type().len() == 1
    }

    /// Arrays only implement `Cloneable` and `Serializable`.
    #[must_use]
    pub fn implements_interface(&self, iface: &str) -> bool {
        iface == "Ljava/lang/Cloneable;" || iface == "Ljava/io/Serializable;"
    }

    /// Only the `length` pseudo-field is known, at offset 8.
    #[must_use]
    pub fn field_by_offset(&self, offset: usize) -> Option<FieldRef> {
        if offset == 8 {
            Type::try_from(self.descriptor.as_str())
                .ok()
                .map(|array| FieldRef::new(array, "length", Type::Int))
        } else {
            None
        }
    }

    pub(crate) fn common_superclass(
        &self,
        this: &Arc<TypeProto>,
        other: &Arc<TypeProto>,
        classpath: &ClassPath,
    ) -> ClassPathResult<Arc<TypeProto>> {
        match other.as_ref() {
            TypeProto::Array(other_array) => {
                if self.has_primitive_elements() || other_array.has_primitive_elements() {
                    if self.descriptor == other_array.descriptor {
                        return Ok(this.clone());
                    }
                    return classpath.class(OBJECT);
                }
                if self.dimensions == other_array.dimensions {
                    let this_element = classpath.class(self.element_type())?;
                    let other_element = classpath.class(other_array.element_type())?;
                    let merged = this_element.common_superclass(&other_element, classpath)?;
                    if Arc::ptr_eq(&merged, &this_element) {
                        return Ok(this.clone());
                    }
                    if Arc::ptr_eq(&merged, &other_element) {
                        return Ok(other.clone());
                    }
                    return classpath.class(&array_type(merged.descriptor(), self.dimensions));
                }
                let dimensions = self.dimensions.min(other_array.dimensions);
                classpath.class(&array_type(OBJECT, dimensions))
            }
            TypeProto::Class(class) => {
                if let Ok(true) = class.is_interface() {
                    if self.implements_interface(class.descriptor()) {
                        return Ok(other.clone());
                    }
                }
                classpath.class(OBJECT)
            }
            _ => other.common_superclass(this, classpath),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::classpath::errors::ClassPathError;
    use crate::classpath::tests::hierarchy;
    use crate::classpath::{TypeProto, OBJECT, UNKNOWN_CLASS};

    fn join(cp: &crate::classpath::ClassPath, a: &str, b: &str) -> String {
        let a = cp.class(a).unwrap();
        let b = cp.class(b).unwrap();
        a.common_superclass(&b, cp).unwrap().descriptor().to_string()
    }

    #[test]
    fn test_element_types() {
        let cp = hierarchy(&[]);
        let proto = cp.class("[[Ljava/lang/String;").unwrap();
        let TypeProto::Array(array) = proto.as_ref() else {
            panic!("not an array");
        };
        assert_eq!(array.dimensions(), 2);
        assert_eq!(array.element_type(), "Ljava/lang/String;");
        assert_eq!(array.immediate_element_type(), "[Ljava/lang/String;");
        assert!(matches!(cp.class("[[").unwrap_err(), ClassPathError::InvalidType(_)));
    }

    #[test]
    fn test_array_common_superclass() {
        let cp = hierarchy(&[
            ("LA;", Some(OBJECT), &[], false),
            ("LB;", Some("LA;"), &[], false),
            ("LC;", Some("LA;"), &[], false),
        ]);
        assert_eq!(join(&cp, "[I", "[I"), "[I");
        assert_eq!(join(&cp, "[I", "[B"), OBJECT);
        assert_eq!(join(&cp, "[I", "[LA;"), OBJECT);
        assert_eq!(join(&cp, "[LB;", "[LA;"), "[LA;");
        assert_eq!(join(&cp, "[LB;", "[LC;"), "[LA;");
        assert_eq!(join(&cp, "[[LB;", "[LC;"), "[Ljava/lang/Object;");
        assert_eq!(join(&cp, "[LB;", "LA;"), OBJECT);
        assert_eq!(join(&cp, "LA;", "[LB;"), OBJECT);
        assert_eq!(join(&cp, "[LB;", "Ljava/io/Serializable;"), "Ljava/io/Serializable;");
        assert_eq!(join(&cp, "Ljava/lang/Cloneable;", "[I"), "Ljava/lang/Cloneable;");
        assert_eq!(join(&cp, "[LB;", UNKNOWN_CLASS), OBJECT);
        assert_eq!(join(&cp, "[LB;", "[LMissing;"), "[Ujava/lang/Object;");
    }

    #[test]
    fn test_length_field() {
        let cp = hierarchy(&[]);
        let array = cp.class("[J").unwrap();
        let field = array.field_by_offset(8, &cp).unwrap().unwrap();
        assert_eq!(field.to_string(), "[J->length:I");
        assert!(array.field_by_offset(12, &cp).unwrap().is_none());
    }
}
