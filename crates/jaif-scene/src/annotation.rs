use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::field_type::AnnotationFieldType;

/// How long an annotation survives. Only definitions carrying a retention
/// policy may be attached directly to an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetentionPolicy {
    Class,
    Runtime,
    Source,
}

impl RetentionPolicy {
    /// The index-file keyword for this policy.
    pub fn keyword(self) -> &'static str {
        match self {
            RetentionPolicy::Class => "invisible",
            RetentionPolicy::Runtime => "visible",
            RetentionPolicy::Source => "source",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "invisible" => Some(RetentionPolicy::Class),
            "visible" => Some(RetentionPolicy::Runtime),
            "source" => Some(RetentionPolicy::Source),
            _ => None,
        }
    }
}

/// An annotation type: its name and declared fields.
#[derive(Debug, Clone)]
pub struct AnnotationDef {
    /// Fully-qualified (binary) name, e.g. `java.lang.Deprecated`.
    pub name: String,
    pub field_types: IndexMap<String, AnnotationFieldType>,
    pub meta_annotations: AnnotationSet,
    pub retention: Option<RetentionPolicy>,
}

impl AnnotationDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_types: IndexMap::new(),
            meta_annotations: AnnotationSet::new(),
            retention: None,
        }
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, ty: AnnotationFieldType) -> Self {
        self.field_types.insert(name.into(), ty);
        self
    }

    /// Whether this definition may be attached directly to an element.
    pub fn is_top_level(&self) -> bool {
        self.retention.is_some()
    }

    /// The package part of [`Self::name`]; empty for the unnamed package.
    pub fn package(&self) -> &str {
        split_qualified(&self.name).0
    }

    pub fn basename(&self) -> &str {
        split_qualified(&self.name).1
    }

    /// Merge two definitions of the same annotation type.
    ///
    /// Names, meta-annotations and field names must agree; field types are
    /// unified pairwise. Retention may be missing on one side but must not
    /// differ when present on both.
    pub fn unify(&self, other: &AnnotationDef) -> Option<AnnotationDef> {
        if self.name != other.name || self.meta_annotations != other.meta_annotations {
            return None;
        }
        if self.field_types.len() != other.field_types.len() {
            return None;
        }

        let retention = match (self.retention, other.retention) {
            (Some(a), Some(b)) if a != b => return None,
            (a, b) => a.or(b),
        };

        let mut field_types = IndexMap::with_capacity(self.field_types.len());
        for (name, ty) in &self.field_types {
            let other_ty = other.field_types.get(name)?;
            field_types.insert(name.clone(), ty.unify(other_ty)?);
        }

        Some(AnnotationDef {
            name: self.name.clone(),
            field_types,
            meta_annotations: self.meta_annotations.clone(),
            retention,
        })
    }
}

impl PartialEq for AnnotationDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.field_types == other.field_types
            && self.meta_annotations == other.meta_annotations
    }
}

/// Split `a.b.C` into (`a.b`, `C`).
pub fn split_qualified(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) => (&name[..dot], &name[dot + 1..]),
        None => ("", name),
    }
}

/// A single annotation field value. The variant is dictated by the field's
/// [`AnnotationFieldType`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Boolean(bool),
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// A class literal, stored without the `.class` suffix (`java.lang.String[]`).
    Class(String),
    /// An enum constant name.
    Enum(String),
    Annotation(Annotation),
    Array(Vec<AnnotationValue>),
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationValue::Boolean(v) => write!(f, "{v}"),
            AnnotationValue::Byte(v) => write!(f, "{v}"),
            AnnotationValue::Char(c) => {
                f.write_str("'")?;
                write_escaped(f, *c, '\'')?;
                f.write_str("'")
            }
            AnnotationValue::Short(v) => write!(f, "{v}"),
            AnnotationValue::Int(v) => write!(f, "{v}"),
            AnnotationValue::Long(v) => write!(f, "{v}"),
            AnnotationValue::Float(v) => write!(f, "{v}"),
            AnnotationValue::Double(v) => write!(f, "{v}"),
            AnnotationValue::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    write_escaped(f, c, '"')?;
                }
                f.write_str("\"")
            }
            AnnotationValue::Class(name) => write!(f, "{name}.class"),
            AnnotationValue::Enum(name) => f.write_str(name),
            AnnotationValue::Annotation(ann) => write!(f, "{ann}"),
            AnnotationValue::Array(values) => {
                f.write_str("{")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, c: char, quote: char) -> fmt::Result {
    match c {
        '\\' => f.write_str("\\\\"),
        '\n' => f.write_str("\\n"),
        '\t' => f.write_str("\\t"),
        '\r' => f.write_str("\\r"),
        '\u{8}' => f.write_str("\\b"),
        '\u{c}' => f.write_str("\\f"),
        c if c == quote => write!(f, "\\{c}"),
        c if c.is_control() => {
            let mut buf = [0u16; 2];
            for unit in c.encode_utf16(&mut buf) {
                write!(f, "\\u{unit:04x}")?;
            }
            Ok(())
        }
        c => write!(f, "{c}"),
    }
}

/// An annotation instance: a definition plus the values of the fields that
/// were given explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub def: Arc<AnnotationDef>,
    pub field_values: IndexMap<String, AnnotationValue>,
}

impl Annotation {
    pub fn new(def: Arc<AnnotationDef>) -> Self {
        Self {
            def,
            field_values: IndexMap::new(),
        }
    }

    pub fn with_value(mut self, field: impl Into<String>, value: AnnotationValue) -> Self {
        self.field_values.insert(field.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn get(&self, field: &str) -> Option<&AnnotationValue> {
        self.field_values.get(field)
    }
}

/// Renders `@name(field=value, ...)`, the same text the index-file writer
/// emits and the form source-insertion tools splice into Java code.
impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.def.name)?;
        if self.field_values.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (idx, (name, value)) in self.field_values.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str(")")
    }
}

/// The annotations attached directly to one element.
///
/// Insertion order is kept for output; equality ignores it.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet(Vec<Annotation>);

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `annotation` unless an equal one is already present.
    pub fn insert(&mut self, annotation: Annotation) -> bool {
        if self.0.contains(&annotation) {
            return false;
        }
        self.0.push(annotation);
        true
    }

    /// Finds the annotation whose definition is named `type_name`.
    pub fn lookup(&self, type_name: &str) -> Option<&Annotation> {
        self.0.iter().find(|a| a.def.name == type_name)
    }

    pub fn remove(&mut self, type_name: &str) -> Option<Annotation> {
        let idx = self.0.iter().position(|a| a.def.name == type_name)?;
        Some(self.0.remove(idx))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for AnnotationSet {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().all(|a| other.0.contains(a))
    }
}

impl<'a> IntoIterator for &'a AnnotationSet {
    type Item = &'a Annotation;
    type IntoIter = std::slice::Iter<'a, Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Annotation> for AnnotationSet {
    fn from_iter<I: IntoIterator<Item = Annotation>>(iter: I) -> Self {
        let mut set = AnnotationSet::new();
        for annotation in iter {
            set.insert(annotation);
        }
        set
    }
}
