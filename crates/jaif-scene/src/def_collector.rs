//! Gathers every annotation definition a scene uses and orders them so that
//! a definition always comes after the definitions its fields refer to.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::annotation::{Annotation, AnnotationDef, AnnotationSet, AnnotationValue};
use crate::element::{
    ABlock, AClass, ADeclaration, AExpression, AField, AMethod, ATypeElement,
};
use crate::field_type::AnnotationFieldType;
use crate::scene::AScene;

/// Two definitions with the same name could not be unified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("conflicting definitions of annotation type {name}")]
pub struct DefinitionConflict {
    pub name: String,
}

/// Callback invoked once per collected definition.
pub trait DefVisitor {
    fn visit_annotation_def(&mut self, def: &Arc<AnnotationDef>);
}

impl<F> DefVisitor for F
where
    F: FnMut(&Arc<AnnotationDef>),
{
    fn visit_annotation_def(&mut self, def: &Arc<AnnotationDef>) {
        self(def)
    }
}

/// The deduplicated, dependency-ordered definitions used by a scene.
#[derive(Debug, Clone)]
pub struct DefCollector {
    defs: Vec<Arc<AnnotationDef>>,
}

impl DefCollector {
    /// Walks `scene` and merges all definitions found on its annotations,
    /// meta-annotations and subannotation field types.
    pub fn new(scene: &AScene) -> Result<Self, DefinitionConflict> {
        let mut gatherer = Gatherer::default();
        gatherer.scene(scene)?;
        Ok(Self {
            defs: gatherer.into_ordered(),
        })
    }

    /// Calls `visitor` once per definition, dependencies first.
    pub fn visit<V: DefVisitor + ?Sized>(&self, visitor: &mut V) {
        for def in &self.defs {
            visitor.visit_annotation_def(def);
        }
    }

    pub fn defs(&self) -> &[Arc<AnnotationDef>] {
        &self.defs
    }

    pub fn get(&self, name: &str) -> Option<&Arc<AnnotationDef>> {
        self.defs.iter().find(|def| def.name == name)
    }
}

#[derive(Default)]
struct Gatherer {
    merged: IndexMap<String, AnnotationDef>,
    in_progress: HashSet<String>,
}

type CollectResult<T = ()> = std::result::Result<T, DefinitionConflict>;

impl Gatherer {
    fn scene(&mut self, scene: &AScene) -> CollectResult {
        for package in scene.packages.values() {
            self.annotations(&package.tl_annotations_here)?;
        }
        for class in scene.classes.values() {
            self.class(class)?;
        }
        Ok(())
    }

    fn class(&mut self, class: &AClass) -> CollectResult {
        self.annotations(&class.tl_annotations_here)?;
        for bound in class.bounds.values() {
            self.type_element(bound)?;
        }
        for supertype in class.extends_implements.values() {
            self.type_element(supertype)?;
        }
        for field in class.fields.values() {
            self.field(field)?;
        }
        for block in class.static_inits.values() {
            self.block(block)?;
        }
        for block in class.instance_inits.values() {
            self.block(block)?;
        }
        for method in class.methods.values() {
            self.method(method)?;
        }
        self.declaration(&class.decl)
    }

    fn method(&mut self, method: &AMethod) -> CollectResult {
        self.annotations(&method.tl_annotations_here)?;
        for bound in method.bounds.values() {
            self.type_element(bound)?;
        }
        self.type_element(&method.return_type)?;
        self.field(&method.receiver)?;
        for param in method.parameters.values() {
            self.field(param)?;
        }
        for thrown in method.throws.values() {
            self.type_element(thrown)?;
        }
        self.block(&method.body)?;
        self.declaration(&method.decl)
    }

    fn field(&mut self, field: &AField) -> CollectResult {
        self.annotations(&field.tl_annotations_here)?;
        for inner in field.inner_types.values() {
            self.type_element(inner)?;
        }
        if let Some(init) = &field.init {
            self.expression(init)?;
        }
        self.declaration(&field.decl)
    }

    fn block(&mut self, block: &ABlock) -> CollectResult {
        for local in block.locals.values() {
            self.field(local)?;
        }
        self.expression(&block.expression)
    }

    fn expression(&mut self, expr: &AExpression) -> CollectResult {
        let maps = [&expr.typecasts, &expr.instanceofs, &expr.news];
        for map in maps {
            for ty in map.values() {
                self.type_element(ty)?;
            }
        }
        Ok(())
    }

    fn declaration(&mut self, decl: &ADeclaration) -> CollectResult {
        for ty in decl.insert_annotations.values() {
            self.type_element(ty)?;
        }
        for ty in decl.insert_typecasts.values() {
            self.type_element(&ty.element)?;
        }
        Ok(())
    }

    fn type_element(&mut self, ty: &ATypeElement) -> CollectResult {
        self.annotations(&ty.tl_annotations_here)?;
        for inner in ty.inner_types.values() {
            self.type_element(inner)?;
        }
        Ok(())
    }

    fn annotations(&mut self, set: &AnnotationSet) -> CollectResult {
        for annotation in set {
            self.annotation(annotation)?;
        }
        Ok(())
    }

    fn annotation(&mut self, annotation: &Annotation) -> CollectResult {
        self.def(&annotation.def)?;
        for value in annotation.field_values.values() {
            self.value(value)?;
        }
        Ok(())
    }

    fn value(&mut self, value: &AnnotationValue) -> CollectResult {
        match value {
            AnnotationValue::Annotation(sub) => self.annotation(sub),
            AnnotationValue::Array(values) => {
                for value in values {
                    self.value(value)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn def(&mut self, def: &AnnotationDef) -> CollectResult {
        if let Some(existing) = self.merged.get(&def.name) {
            if existing == def && (def.retention.is_none() || existing.retention == def.retention)
            {
                return Ok(());
            }
        }
        if !self.in_progress.insert(def.name.clone()) {
            return Ok(());
        }

        for ty in def.field_types.values() {
            if let Some(sub) = ty.annotation_def() {
                self.def(sub)?;
            }
        }
        for meta in &def.meta_annotations {
            self.annotation(meta)?;
        }

        self.in_progress.remove(&def.name);
        match self.merged.get_mut(&def.name) {
            Some(existing) => {
                let unified = existing.unify(def).ok_or_else(|| DefinitionConflict {
                    name: def.name.clone(),
                })?;
                if unified != *existing {
                    tracing::debug!(
                        target = "jaif.scene",
                        name = %def.name,
                        "unified differently-shaped definitions of one annotation type"
                    );
                }
                *existing = unified;
            }
            None => {
                tracing::trace!(target = "jaif.scene", name = %def.name, "collected annotation definition");
                self.merged.insert(def.name.clone(), def.clone());
            }
        }
        Ok(())
    }

    /// Post-order walk over the subannotation and meta-annotation edges.
    fn into_ordered(self) -> Vec<Arc<AnnotationDef>> {
        let mut done = IndexMap::with_capacity(self.merged.len());
        let mut visiting = HashSet::new();
        for name in self.merged.keys() {
            self.finalize(name, &mut done, &mut visiting);
        }
        done.into_values().collect()
    }

    fn finalize(
        &self,
        name: &str,
        done: &mut IndexMap<String, Arc<AnnotationDef>>,
        visiting: &mut HashSet<String>,
    ) {
        if done.contains_key(name) || !visiting.insert(name.to_string()) {
            return;
        }
        let Some(def) = self.merged.get(name) else {
            return;
        };

        let field_deps = def
            .field_types
            .values()
            .filter_map(|ty| ty.annotation_def().map(|sub| sub.name.as_str()));
        let meta_deps = def.meta_annotations.iter().map(|meta| meta.name());
        for dep in field_deps.chain(meta_deps) {
            self.finalize(dep, done, visiting);
        }

        let mut resolved = def.clone();
        for ty in resolved.field_types.values_mut() {
            relink(ty, done);
        }
        done.insert(name.to_string(), Arc::new(resolved));
    }
}

/// Point subannotation field types at the unified definition.
fn relink(ty: &mut AnnotationFieldType, done: &IndexMap<String, Arc<AnnotationDef>>) {
    match ty {
        AnnotationFieldType::Annotation(def) => {
            if let Some(unified) = done.get(&def.name) {
                *def = unified.clone();
            }
        }
        AnnotationFieldType::Array(Some(element)) => relink(element, done),
        _ => {}
    }
}
