//! In-memory model of annotations on Java program elements.
//!
//! An [`AScene`] is a tree of annotatable elements (classes, methods, fields,
//! parameters, locals, type-use positions) that is grown on demand through
//! [`VivifyMap::vivify`], trimmed with [`AScene::prune`], and compared
//! structurally. [`DefCollector`] recovers the annotation definitions a scene
//! uses, in an order suitable for emitting them.

#![forbid(unsafe_code)]

mod annotation;
mod def_collector;
mod element;
mod field_type;
mod location;
mod scene;
mod vivify;

pub use crate::annotation::{
    split_qualified, Annotation, AnnotationDef, AnnotationSet, AnnotationValue, RetentionPolicy,
};
pub use crate::def_collector::{DefCollector, DefVisitor, DefinitionConflict};
pub use crate::element::{
    ABlock, AClass, ADeclaration, AElement, AExpression, AField, AMethod, ATypeElement,
    ATypeElementWithType, Element, ElementKind, ElementRef,
};
pub use crate::field_type::{AnnotationFieldType, BasicKind};
pub use crate::location::{
    AstPath, AstPathEntry, BoundLocation, InnerTypeLocation, LocalLocation, RelativeLocation,
    TypeIndexLocation,
};
pub use crate::scene::AScene;
pub use crate::vivify::VivifyMap;
