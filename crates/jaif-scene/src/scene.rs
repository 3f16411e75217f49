use std::collections::{BTreeMap, BTreeSet};

use crate::element::{AClass, AElement};
use crate::vivify::VivifyMap;

/// The root of the element tree: every annotated package and class.
#[derive(Debug, Clone, Default)]
pub struct AScene {
    pub packages: VivifyMap<String, AElement>,
    /// Classes keyed by fully-qualified binary name (`p.Outer$Inner`).
    pub classes: VivifyMap<String, AClass>,
    /// Annotation type name to the packages it must be imported from when
    /// annotated source is regenerated. Not part of structural equality.
    pub imports: BTreeMap<String, BTreeSet<String>>,
}

impl AScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every annotation-free package and class subtree. Returns whether
    /// the scene is empty afterwards.
    pub fn prune(&mut self) -> bool {
        let packages_empty = self.packages.prune();
        let classes_empty = self.classes.prune();
        packages_empty && classes_empty
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.classes.is_empty()
    }
}

impl PartialEq for AScene {
    fn eq(&self, other: &Self) -> bool {
        self.packages == other.packages && self.classes == other.classes
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::annotation::{Annotation, AnnotationDef, RetentionPolicy};
    use crate::element::Element;
    use pretty_assertions::assert_eq;

    #[test]
    fn clone_is_a_deep_snapshot() {
        let def = Arc::new(AnnotationDef::new("p.A").with_retention(RetentionPolicy::Class));
        let mut scene = AScene::new();
        scene
            .classes
            .vivify("p.Foo")
            .fields
            .vivify("x")
            .tl_annotations_here
            .insert(Annotation::new(def.clone()));

        let snapshot = scene.clone();
        scene
            .classes
            .vivify("p.Foo")
            .methods
            .vivify("m()V")
            .tl_annotations_here
            .insert(Annotation::new(def));

        assert!(snapshot != scene);
        assert!(snapshot.classes["p.Foo"].methods.is_empty());
        assert!(snapshot.classes["p.Foo"].fields["x"].lookup("p.A").is_some());
    }

    #[test]
    fn vivified_skeletons_compare_equal_only_after_pruning() {
        let mut skeleton = AScene::new();
        skeleton.classes.vivify("p.Foo").methods.vivify("m()V");
        skeleton.packages.vivify("p");
        let mut empty = AScene::new();

        assert!(skeleton != empty);
        assert!(skeleton.prune());
        assert!(empty.prune());
        assert_eq!(skeleton, empty);
    }

    #[test]
    fn imports_do_not_affect_equality() {
        let mut scene = AScene::new();
        scene
            .imports
            .entry("ReadOnly".to_string())
            .or_default()
            .insert("checkers".to_string());
        assert_eq!(scene, AScene::new());
    }
}
