use std::fmt;
use std::sync::Arc;

use crate::annotation::{AnnotationDef, AnnotationValue};

/// Primitive and `String` annotation field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
}

impl BasicKind {
    pub const ALL: [BasicKind; 9] = [
        BasicKind::Boolean,
        BasicKind::Byte,
        BasicKind::Char,
        BasicKind::Short,
        BasicKind::Int,
        BasicKind::Long,
        BasicKind::Float,
        BasicKind::Double,
        BasicKind::String,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            BasicKind::Boolean => "boolean",
            BasicKind::Byte => "byte",
            BasicKind::Char => "char",
            BasicKind::Short => "short",
            BasicKind::Int => "int",
            BasicKind::Long => "long",
            BasicKind::Float => "float",
            BasicKind::Double => "double",
            BasicKind::String => "String",
        }
    }

    /// Accepts the primitive keywords plus `String` / `java.lang.String`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        if keyword == "java.lang.String" {
            return Some(BasicKind::String);
        }
        BasicKind::ALL.into_iter().find(|kind| kind.keyword() == keyword)
    }

    pub fn accepts(self, value: &AnnotationValue) -> bool {
        matches!(
            (self, value),
            (BasicKind::Boolean, AnnotationValue::Boolean(_))
                | (BasicKind::Byte, AnnotationValue::Byte(_))
                | (BasicKind::Char, AnnotationValue::Char(_))
                | (BasicKind::Short, AnnotationValue::Short(_))
                | (BasicKind::Int, AnnotationValue::Int(_))
                | (BasicKind::Long, AnnotationValue::Long(_))
                | (BasicKind::Float, AnnotationValue::Float(_))
                | (BasicKind::Double, AnnotationValue::Double(_))
                | (BasicKind::String, AnnotationValue::String(_))
        )
    }
}

/// The declared type of an annotation field.
///
/// `Array(None)` is an array whose element type is unknown. Values of that
/// type are always empty: the element type of an empty array literal cannot
/// be recovered from bytecode, so the hole is carried until a definition with
/// a known element type is unified with it.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationFieldType {
    Basic(BasicKind),
    ClassToken,
    Enum(String),
    Annotation(Arc<AnnotationDef>),
    Array(Option<Box<AnnotationFieldType>>),
}

impl AnnotationFieldType {
    pub fn array_of(element: AnnotationFieldType) -> Self {
        debug_assert!(
            !matches!(element, AnnotationFieldType::Array(_)),
            "annotation fields cannot be nested arrays"
        );
        AnnotationFieldType::Array(Some(Box::new(element)))
    }

    pub fn unknown_array() -> Self {
        AnnotationFieldType::Array(None)
    }

    pub fn is_unknown_array(&self) -> bool {
        matches!(self, AnnotationFieldType::Array(None))
    }

    /// Definition of the subannotation this field (or its elements) holds.
    pub fn annotation_def(&self) -> Option<&Arc<AnnotationDef>> {
        match self {
            AnnotationFieldType::Annotation(def) => Some(def),
            AnnotationFieldType::Array(Some(element)) => element.annotation_def(),
            _ => None,
        }
    }

    /// Whether `value` has the shape this type prescribes.
    pub fn accepts(&self, value: &AnnotationValue) -> bool {
        match (self, value) {
            (AnnotationFieldType::Basic(kind), value) => kind.accepts(value),
            (AnnotationFieldType::ClassToken, AnnotationValue::Class(_)) => true,
            (AnnotationFieldType::Enum(_), AnnotationValue::Enum(_)) => true,
            (AnnotationFieldType::Annotation(def), AnnotationValue::Annotation(ann)) => {
                ann.def.name == def.name
            }
            (AnnotationFieldType::Array(None), AnnotationValue::Array(values)) => values.is_empty(),
            (AnnotationFieldType::Array(Some(element)), AnnotationValue::Array(values)) => {
                values.iter().all(|v| element.accepts(v))
            }
            _ => false,
        }
    }

    /// Combine the information of two field types.
    ///
    /// Returns `None` when they disagree on anything other than an unknown
    /// array element type.
    pub fn unify(&self, other: &AnnotationFieldType) -> Option<AnnotationFieldType> {
        match (self, other) {
            (AnnotationFieldType::Array(None), AnnotationFieldType::Array(_)) => Some(other.clone()),
            (AnnotationFieldType::Array(_), AnnotationFieldType::Array(None)) => Some(self.clone()),
            (AnnotationFieldType::Array(Some(a)), AnnotationFieldType::Array(Some(b))) => {
                Some(AnnotationFieldType::Array(Some(Box::new(a.unify(b)?))))
            }
            (AnnotationFieldType::Annotation(a), AnnotationFieldType::Annotation(b)) => {
                if Arc::ptr_eq(a, b) {
                    return Some(self.clone());
                }
                a.unify(b).map(|def| AnnotationFieldType::Annotation(Arc::new(def)))
            }
            (a, b) if a == b => Some(a.clone()),
            _ => None,
        }
    }
}

impl From<BasicKind> for AnnotationFieldType {
    fn from(kind: BasicKind) -> Self {
        AnnotationFieldType::Basic(kind)
    }
}

impl fmt::Display for AnnotationFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationFieldType::Basic(kind) => f.write_str(kind.keyword()),
            AnnotationFieldType::ClassToken => f.write_str("Class"),
            AnnotationFieldType::Enum(name) => write!(f, "enum {name}"),
            AnnotationFieldType::Annotation(def) => write!(f, "annotation-field {}", def.name),
            AnnotationFieldType::Array(Some(element)) => write!(f, "{element}[]"),
            AnnotationFieldType::Array(None) => f.write_str("unknown[]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int() -> AnnotationFieldType {
        AnnotationFieldType::Basic(BasicKind::Int)
    }

    #[test]
    fn unknown_array_unifies_with_known_array() {
        let unknown = AnnotationFieldType::unknown_array();
        let ints = AnnotationFieldType::array_of(int());
        assert_eq!(unknown.unify(&ints), Some(ints.clone()));
        assert_eq!(ints.unify(&unknown), Some(ints.clone()));
        assert_eq!(unknown.unify(&unknown), Some(unknown.clone()));
    }

    #[test]
    fn unify_with_self_is_identity() {
        for kind in BasicKind::ALL {
            let ty = AnnotationFieldType::Basic(kind);
            assert_eq!(ty.unify(&ty), Some(ty.clone()));
        }
        let enum_ty = AnnotationFieldType::Enum("p.Color".into());
        assert_eq!(enum_ty.unify(&enum_ty), Some(enum_ty.clone()));
    }

    #[test]
    fn incompatible_types_do_not_unify() {
        let string = AnnotationFieldType::Basic(BasicKind::String);
        assert_eq!(int().unify(&string), None);
        assert_eq!(int().unify(&AnnotationFieldType::array_of(int())), None);
        assert_eq!(
            AnnotationFieldType::unknown_array().unify(&int()),
            None,
            "unknown arrays only unify with arrays"
        );
    }

    #[test]
    fn unknown_array_accepts_only_empty_values() {
        let unknown = AnnotationFieldType::unknown_array();
        assert!(unknown.accepts(&AnnotationValue::Array(Vec::new())));
        assert!(!unknown.accepts(&AnnotationValue::Array(vec![AnnotationValue::Int(1)])));
    }

    #[test]
    fn renders_index_file_keywords() {
        assert_eq!(AnnotationFieldType::array_of(int()).to_string(), "int[]");
        assert_eq!(AnnotationFieldType::unknown_array().to_string(), "unknown[]");
        assert_eq!(AnnotationFieldType::ClassToken.to_string(), "Class");
        assert_eq!(
            AnnotationFieldType::Enum("java.lang.annotation.ElementType".into()).to_string(),
            "enum java.lang.annotation.ElementType"
        );
        assert_eq!(BasicKind::from_keyword("java.lang.String"), Some(BasicKind::String));
        assert_eq!(BasicKind::from_keyword("Integer"), None);
    }
}
