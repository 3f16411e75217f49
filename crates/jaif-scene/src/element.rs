//! The annotatable elements of a scene.
//!
//! Every element owns its subelements outright; the only shared data are the
//! immutable [`AnnotationDef`](crate::AnnotationDef)s referenced by annotations.
//! Subelements are created through [`VivifyMap::vivify`] and discarded by
//! [`Element::prune`] once they carry no annotations.

use crate::annotation::{Annotation, AnnotationSet};
use crate::location::{
    AstPath, BoundLocation, InnerTypeLocation, LocalLocation, RelativeLocation, TypeIndexLocation,
};
use crate::vivify::VivifyMap;

/// Discriminant of the concrete element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Element,
    Type,
    TypeWithType,
    Expression,
    Block,
    Field,
    Method,
    Class,
}

/// Operations shared by all element kinds.
pub trait Element {
    fn kind(&self) -> ElementKind;

    /// Annotations attached directly to this element, if the kind can carry any.
    fn tl_annotations_here(&self) -> Option<&AnnotationSet>;

    /// Removes annotation-free subelements, depth-first. Returns whether this
    /// element is empty afterwards.
    fn prune(&mut self) -> bool;

    fn as_element_ref(&self) -> ElementRef<'_>;

    fn lookup(&self, type_name: &str) -> Option<&Annotation> {
        self.tl_annotations_here()?.lookup(type_name)
    }
}

/// A borrowed element of any kind.
///
/// Equality compares the kinds first: elements of different kinds are never
/// equal, even when both are empty.
#[derive(Debug, Clone, Copy)]
pub enum ElementRef<'a> {
    Element(&'a AElement),
    Type(&'a ATypeElement),
    TypeWithType(&'a ATypeElementWithType),
    Expression(&'a AExpression),
    Block(&'a ABlock),
    Field(&'a AField),
    Method(&'a AMethod),
    Class(&'a AClass),
}

impl ElementRef<'_> {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementRef::Element(_) => ElementKind::Element,
            ElementRef::Type(_) => ElementKind::Type,
            ElementRef::TypeWithType(_) => ElementKind::TypeWithType,
            ElementRef::Expression(_) => ElementKind::Expression,
            ElementRef::Block(_) => ElementKind::Block,
            ElementRef::Field(_) => ElementKind::Field,
            ElementRef::Method(_) => ElementKind::Method,
            ElementRef::Class(_) => ElementKind::Class,
        }
    }
}

impl PartialEq for ElementRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ElementRef::Element(a), ElementRef::Element(b)) => a == b,
            (ElementRef::Type(a), ElementRef::Type(b)) => a == b,
            (ElementRef::TypeWithType(a), ElementRef::TypeWithType(b)) => a == b,
            (ElementRef::Expression(a), ElementRef::Expression(b)) => a == b,
            (ElementRef::Block(a), ElementRef::Block(b)) => a == b,
            (ElementRef::Field(a), ElementRef::Field(b)) => a == b,
            (ElementRef::Method(a), ElementRef::Method(b)) => a == b,
            (ElementRef::Class(a), ElementRef::Class(b)) => a == b,
            _ => false,
        }
    }
}

/// An element that only carries annotations (packages).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AElement {
    pub tl_annotations_here: AnnotationSet,
}

impl Element for AElement {
    fn kind(&self) -> ElementKind {
        ElementKind::Element
    }

    fn tl_annotations_here(&self) -> Option<&AnnotationSet> {
        Some(&self.tl_annotations_here)
    }

    fn prune(&mut self) -> bool {
        self.tl_annotations_here.is_empty()
    }

    fn as_element_ref(&self) -> ElementRef<'_> {
        ElementRef::Element(self)
    }
}

/// A type use, with annotations on its nested array components and type
/// arguments keyed by [`InnerTypeLocation`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ATypeElement {
    pub tl_annotations_here: AnnotationSet,
    pub inner_types: VivifyMap<InnerTypeLocation, ATypeElement>,
}

impl Element for ATypeElement {
    fn kind(&self) -> ElementKind {
        ElementKind::Type
    }

    fn tl_annotations_here(&self) -> Option<&AnnotationSet> {
        Some(&self.tl_annotations_here)
    }

    fn prune(&mut self) -> bool {
        let inner_empty = self.inner_types.prune();
        inner_empty && self.tl_annotations_here.is_empty()
    }

    fn as_element_ref(&self) -> ElementRef<'_> {
        ElementRef::Type(self)
    }
}

/// A type use that also records the un-annotated type it denotes, for casts
/// synthesized into source code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ATypeElementWithType {
    pub element: ATypeElement,
    /// Java source spelling of the type, e.g. `java.util.List<String>[]`.
    pub base_type: Option<String>,
}

impl Element for ATypeElementWithType {
    fn kind(&self) -> ElementKind {
        ElementKind::TypeWithType
    }

    fn tl_annotations_here(&self) -> Option<&AnnotationSet> {
        Some(&self.element.tl_annotations_here)
    }

    fn prune(&mut self) -> bool {
        self.element.prune()
    }

    fn as_element_ref(&self) -> ElementRef<'_> {
        ElementRef::TypeWithType(self)
    }
}

/// Insertion requests anchored to source-tree paths, shared by classes,
/// methods and fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ADeclaration {
    pub insert_annotations: VivifyMap<AstPath, ATypeElement>,
    pub insert_typecasts: VivifyMap<AstPath, ATypeElementWithType>,
}

impl ADeclaration {
    pub fn prune(&mut self) -> bool {
        let annotations_empty = self.insert_annotations.prune();
        let typecasts_empty = self.insert_typecasts.prune();
        annotations_empty && typecasts_empty
    }
}

/// Types appearing inside a piece of code: cast targets, `instanceof`
/// operands and created objects/arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AExpression {
    /// Annotations on the code fragment itself. The index format has no place
    /// for them, so the writer leaves them out.
    pub tl_annotations_here: AnnotationSet,
    pub typecasts: VivifyMap<RelativeLocation, ATypeElement>,
    pub instanceofs: VivifyMap<RelativeLocation, ATypeElement>,
    pub news: VivifyMap<RelativeLocation, ATypeElement>,
}

impl Element for AExpression {
    fn kind(&self) -> ElementKind {
        ElementKind::Expression
    }

    fn tl_annotations_here(&self) -> Option<&AnnotationSet> {
        Some(&self.tl_annotations_here)
    }

    fn prune(&mut self) -> bool {
        let typecasts_empty = self.typecasts.prune();
        let instanceofs_empty = self.instanceofs.prune();
        let news_empty = self.news.prune();
        typecasts_empty && instanceofs_empty && news_empty && self.tl_annotations_here.is_empty()
    }

    fn as_element_ref(&self) -> ElementRef<'_> {
        ElementRef::Expression(self)
    }
}

/// A block of code: a method body or an initializer block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ABlock {
    /// Not written to index files, like [`AExpression::tl_annotations_here`].
    pub tl_annotations_here: AnnotationSet,
    pub locals: VivifyMap<LocalLocation, AField>,
    pub expression: AExpression,
}

impl Element for ABlock {
    fn kind(&self) -> ElementKind {
        ElementKind::Block
    }

    fn tl_annotations_here(&self) -> Option<&AnnotationSet> {
        Some(&self.tl_annotations_here)
    }

    fn prune(&mut self) -> bool {
        let locals_empty = self.locals.prune();
        let expression_empty = self.expression.prune();
        locals_empty && expression_empty && self.tl_annotations_here.is_empty()
    }

    fn as_element_ref(&self) -> ElementRef<'_> {
        ElementRef::Block(self)
    }
}

/// A variable declaration: a field, parameter, receiver or local variable.
///
/// The annotations here apply to the declared type; nested positions of that
/// type live in `inner_types`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AField {
    pub tl_annotations_here: AnnotationSet,
    pub inner_types: VivifyMap<InnerTypeLocation, ATypeElement>,
    pub decl: ADeclaration,
    /// The initializer expression; only fields have one.
    pub init: Option<AExpression>,
}

impl AField {
    pub fn vivify_init(&mut self) -> &mut AExpression {
        self.init.get_or_insert_with(AExpression::default)
    }
}

impl Element for AField {
    fn kind(&self) -> ElementKind {
        ElementKind::Field
    }

    fn tl_annotations_here(&self) -> Option<&AnnotationSet> {
        Some(&self.tl_annotations_here)
    }

    fn prune(&mut self) -> bool {
        let inner_empty = self.inner_types.prune();
        let decl_empty = self.decl.prune();
        let init_empty = self.init.as_mut().map_or(true, |init| init.prune());
        if init_empty {
            self.init = None;
        }
        inner_empty && decl_empty && init_empty && self.tl_annotations_here.is_empty()
    }

    fn as_element_ref(&self) -> ElementRef<'_> {
        ElementRef::Field(self)
    }
}

/// A method or constructor, keyed in its class by name plus descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AMethod {
    pub tl_annotations_here: AnnotationSet,
    pub decl: ADeclaration,
    pub bounds: VivifyMap<BoundLocation, ATypeElement>,
    pub return_type: ATypeElement,
    /// The implicit `this` parameter.
    pub receiver: AField,
    pub parameters: VivifyMap<u32, AField>,
    pub throws: VivifyMap<u32, ATypeElement>,
    pub body: ABlock,
}

impl Element for AMethod {
    fn kind(&self) -> ElementKind {
        ElementKind::Method
    }

    fn tl_annotations_here(&self) -> Option<&AnnotationSet> {
        Some(&self.tl_annotations_here)
    }

    fn prune(&mut self) -> bool {
        let results = [
            self.decl.prune(),
            self.bounds.prune(),
            self.return_type.prune(),
            self.receiver.prune(),
            self.parameters.prune(),
            self.throws.prune(),
            self.body.prune(),
        ];
        results.iter().all(|empty| *empty) && self.tl_annotations_here.is_empty()
    }

    fn as_element_ref(&self) -> ElementRef<'_> {
        ElementRef::Method(self)
    }
}

/// A class, interface, enum or annotation type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AClass {
    pub tl_annotations_here: AnnotationSet,
    pub decl: ADeclaration,
    pub bounds: VivifyMap<BoundLocation, ATypeElement>,
    pub extends_implements: VivifyMap<TypeIndexLocation, ATypeElement>,
    pub methods: VivifyMap<String, AMethod>,
    pub fields: VivifyMap<String, AField>,
    pub static_inits: VivifyMap<u32, ABlock>,
    pub instance_inits: VivifyMap<u32, ABlock>,
}

impl AClass {
    /// The initializer expression of field `name`, created on demand along
    /// with the field itself.
    pub fn vivify_field_init(&mut self, name: &str) -> &mut AExpression {
        self.fields.vivify(name).vivify_init()
    }

    /// Initializer expressions of all fields that have one.
    pub fn field_inits(&self) -> impl Iterator<Item = (&String, &AExpression)> {
        self.fields
            .iter()
            .filter_map(|(name, field)| field.init.as_ref().map(|init| (name, init)))
    }
}

impl Element for AClass {
    fn kind(&self) -> ElementKind {
        ElementKind::Class
    }

    fn tl_annotations_here(&self) -> Option<&AnnotationSet> {
        Some(&self.tl_annotations_here)
    }

    fn prune(&mut self) -> bool {
        let results = [
            self.decl.prune(),
            self.bounds.prune(),
            self.extends_implements.prune(),
            self.methods.prune(),
            self.fields.prune(),
            self.static_inits.prune(),
            self.instance_inits.prune(),
        ];
        results.iter().all(|empty| *empty) && self.tl_annotations_here.is_empty()
    }

    fn as_element_ref(&self) -> ElementRef<'_> {
        ElementRef::Class(self)
    }
}
