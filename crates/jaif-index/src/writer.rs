//! Pretty-printer producing index files.
//!
//! The output always parses back with [`crate::parse_str`]. Each section
//! opens with a keyword so the parser can find its owner again. That fixes
//! the emission order: a variable's insertion requests must not run into
//! sections belonging to its enclosing method or class.

use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::{self, BufWriter, Write as _};
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use jaif_scene::{
    split_qualified, ABlock, AClass, ADeclaration, AExpression, AField, AMethod, AScene,
    ATypeElement, Annotation, AnnotationDef, BoundLocation, DefCollector,
    DefinitionConflict, InnerTypeLocation, VivifyMap,
};
use serde::{Deserialize, Serialize};

use crate::error::WriteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndentStyle {
    Spaces,
    Tabs,
}

/// Layout of the emitted text. Indentation is cosmetic; the parser ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Columns per nesting level when indenting with spaces.
    pub indent_width: usize,
    pub indent_style: IndentStyle,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            indent_width: 4,
            indent_style: IndentStyle::Spaces,
        }
    }
}

/// Renders `scene` as index-file text.
///
/// Definitions come first, dependencies before their users, followed by the
/// annotated packages and classes. Annotation-free subtrees are skipped;
/// `scene` itself is not pruned.
pub fn render(scene: &AScene, options: &WriteOptions) -> Result<String, DefinitionConflict> {
    let collector = DefCollector::new(scene)?;

    let mut pruned = scene.clone();
    pruned.prune();

    let mut writer = IndexWriter {
        out: String::new(),
        options,
    };
    collector.visit(&mut |def: &Arc<AnnotationDef>| writer.definition(def));
    writer.scene(&pruned);

    tracing::debug!(
        target = "jaif.index",
        definitions = collector.defs().len(),
        classes = pruned.classes.len(),
        "rendered scene"
    );
    Ok(writer.out)
}

/// Writes `scene` to `out` with the default layout.
pub fn write<W: io::Write + ?Sized>(scene: &AScene, out: &mut W) -> Result<(), WriteError> {
    write_with_options(scene, out, &WriteOptions::default())
}

/// Writes `scene` to `out`. On a definition conflict nothing reaches `out`.
pub fn write_with_options<W: io::Write + ?Sized>(
    scene: &AScene,
    out: &mut W,
    options: &WriteOptions,
) -> Result<(), WriteError> {
    let text = render(scene, options)?;
    out.write_all(text.as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Writes `scene` to the file at `path`, replacing its contents.
///
/// The file is only created once the scene has rendered successfully.
pub fn write_file(
    scene: &AScene,
    path: impl AsRef<Path>,
    options: &WriteOptions,
) -> Result<(), WriteError> {
    let path = path.as_ref();
    let text = render(scene, options)?;
    let io_error = |source| WriteError::Io {
        path: Some(path.to_path_buf()),
        source,
    };

    let file = File::create(path).map_err(io_error)?;
    let mut out = BufWriter::new(file);
    out.write_all(text.as_bytes()).map_err(io_error)?;
    out.flush().map_err(io_error)?;

    tracing::debug!(target = "jaif.index", path = %path.display(), bytes = text.len(), "wrote index file");
    Ok(())
}

struct IndexWriter<'a> {
    out: String,
    options: &'a WriteOptions,
}

impl IndexWriter<'_> {
    fn indent(&mut self, depth: usize) {
        match self.options.indent_style {
            IndentStyle::Spaces => {
                let width = depth.saturating_mul(self.options.indent_width);
                self.out.extend(std::iter::repeat(' ').take(width));
            }
            IndentStyle::Tabs => self.out.extend(std::iter::repeat('\t').take(depth)),
        }
    }

    /// Writes `header:` followed by `annotations`, without ending the line.
    fn open<'b>(
        &mut self,
        depth: usize,
        header: impl fmt::Display,
        annotations: impl IntoIterator<Item = &'b Annotation>,
    ) {
        self.indent(depth);
        // Writing into a `String` cannot fail.
        let _ = write!(self.out, "{header}:");
        for annotation in annotations {
            let _ = write!(self.out, " {annotation}");
        }
    }

    fn section<'b>(
        &mut self,
        depth: usize,
        header: impl fmt::Display,
        annotations: impl IntoIterator<Item = &'b Annotation>,
    ) {
        self.open(depth, header, annotations);
        self.out.push('\n');
    }

    fn definition(&mut self, def: &AnnotationDef) {
        self.section(0, PackageHeader(def.package()), std::iter::empty());
        let keyword = match def.retention {
            Some(retention) => format!("annotation {} @{}", retention.keyword(), def.basename()),
            None => format!("annotation @{}", def.basename()),
        };
        self.section(0, keyword, &def.meta_annotations);
        for (name, ty) in &def.field_types {
            self.indent(1);
            let _ = writeln!(self.out, "{ty} {name}");
        }
        self.out.push('\n');
    }

    fn scene(&mut self, scene: &AScene) {
        let mut packages: IndexMap<&str, Vec<(&str, &AClass)>> = IndexMap::new();
        for name in scene.packages.keys() {
            packages.entry(name.as_str()).or_default();
        }
        for (name, class) in &scene.classes {
            let (package, basename) = split_qualified(name);
            packages.entry(package).or_default().push((basename, class));
        }

        for (package, classes) in packages {
            let annotations = scene
                .packages
                .get(package)
                .into_iter()
                .flat_map(|element| &element.tl_annotations_here);
            self.section(0, PackageHeader(package), annotations);
            for (name, class) in classes {
                self.class(name, class);
            }
            self.out.push('\n');
        }
    }

    fn class(&mut self, name: &str, class: &AClass) {
        self.section(0, format_args!("class {name}"), &class.tl_annotations_here);
        self.declaration(1, &class.decl);
        self.bounds(1, &class.bounds);
        for (location, supertype) in &class.extends_implements {
            if location.is_extends() {
                self.type_element(1, "extends", supertype);
            } else if let Some(index) = location.interface_index() {
                self.type_element(1, format_args!("implements {index}"), supertype);
            } else {
                tracing::warn!(
                    target = "jaif.index",
                    class = name,
                    index = location.0,
                    "skipping supertype slot with a negative index"
                );
            }
        }
        for (name, field) in &class.fields {
            self.variable(1, format_args!("field {name}"), field);
            if let Some(init) = &field.init {
                self.expression(2, init);
            }
        }
        for (index, block) in &class.static_inits {
            self.section(1, format_args!("staticinit *{index}"), std::iter::empty());
            self.block(2, block);
        }
        for (index, block) in &class.instance_inits {
            self.section(1, format_args!("instanceinit *{index}"), std::iter::empty());
            self.block(2, block);
        }
        for (key, method) in &class.methods {
            self.method(1, key, method);
        }
    }

    fn method(&mut self, depth: usize, key: &str, method: &AMethod) {
        self.section(depth, format_args!("method {key}"), &method.tl_annotations_here);
        let depth = depth + 1;
        self.declaration(depth, &method.decl);
        self.bounds(depth, &method.bounds);
        if !is_bare_type(&method.return_type) {
            self.type_element(depth, "return", &method.return_type);
        }
        if !is_bare_variable(&method.receiver) {
            self.variable(depth, "receiver", &method.receiver);
        }
        for (index, parameter) in &method.parameters {
            self.variable(depth, format_args!("parameter #{index}"), parameter);
        }
        for (index, thrown) in &method.throws {
            self.type_element(depth, format_args!("throws {index}"), thrown);
        }
        self.block(depth, &method.body);
    }

    fn block(&mut self, depth: usize, block: &ABlock) {
        for (location, local) in &block.locals {
            self.variable(depth, format_args!("local {location}"), local);
        }
        self.expression(depth, &block.expression);
    }

    fn expression(&mut self, depth: usize, expr: &AExpression) {
        for (location, ty) in &expr.typecasts {
            self.type_element(depth, format_args!("typecast {location}"), ty);
        }
        for (location, ty) in &expr.instanceofs {
            self.type_element(depth, format_args!("instanceof {location}"), ty);
        }
        for (location, ty) in &expr.news {
            self.type_element(depth, format_args!("new {location}"), ty);
        }
    }

    fn bounds(&mut self, depth: usize, bounds: &VivifyMap<BoundLocation, ATypeElement>) {
        for (location, bound) in bounds {
            self.type_element(depth, format_args!("bound {location}"), bound);
        }
    }

    fn variable(&mut self, depth: usize, header: impl fmt::Display, variable: &AField) {
        self.section(depth, header, &variable.tl_annotations_here);
        self.inner_types(depth + 1, &variable.inner_types);
        self.declaration(depth + 1, &variable.decl);
    }

    fn type_element(&mut self, depth: usize, header: impl fmt::Display, ty: &ATypeElement) {
        self.section(depth, header, &ty.tl_annotations_here);
        self.inner_types(depth + 1, &ty.inner_types);
    }

    /// Inner types are listed flat under their outermost type; the location
    /// already spells out the full path.
    fn inner_types(&mut self, depth: usize, inner: &VivifyMap<InnerTypeLocation, ATypeElement>) {
        for (location, ty) in inner {
            self.section(
                depth,
                format_args!("inner-type {location}"),
                &ty.tl_annotations_here,
            );
        }
    }

    fn declaration(&mut self, depth: usize, decl: &ADeclaration) {
        for (path, ty) in &decl.insert_annotations {
            self.type_element(depth, format_args!("insert-annotation {path}"), ty);
        }
        for (path, cast) in &decl.insert_typecasts {
            self.open(
                depth,
                format_args!("insert-typecast {path}"),
                &cast.element.tl_annotations_here,
            );
            if let Some(base_type) = &cast.base_type {
                self.out.push(' ');
                self.out.push_str(base_type);
            }
            self.out.push('\n');
            self.inner_types(depth + 1, &cast.element.inner_types);
        }
    }
}

/// `package name`, or bare `package` for the unnamed package.
struct PackageHeader<'a>(&'a str);

impl fmt::Display for PackageHeader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("package")
        } else {
            write!(f, "package {}", self.0)
        }
    }
}

fn is_bare_type(ty: &ATypeElement) -> bool {
    ty.tl_annotations_here.is_empty() && ty.inner_types.is_empty()
}

fn is_bare_variable(variable: &AField) -> bool {
    variable.tl_annotations_here.is_empty()
        && variable.inner_types.is_empty()
        && variable.decl.insert_annotations.is_empty()
        && variable.decl.insert_typecasts.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;
    use jaif_scene::{
        AnnotationFieldType, AnnotationValue, BasicKind, Element, RelativeLocation,
        RetentionPolicy, TypeIndexLocation,
    };
    use pretty_assertions::assert_eq;

    fn def(name: &str) -> Arc<AnnotationDef> {
        Arc::new(AnnotationDef::new(name).with_retention(RetentionPolicy::Runtime))
    }

    #[test]
    fn renders_definitions_then_classes() {
        let value_def = Arc::new(
            AnnotationDef::new("p.A")
                .with_retention(RetentionPolicy::Runtime)
                .with_field("value", AnnotationFieldType::Basic(BasicKind::Int)),
        );
        let mut scene = AScene::new();
        scene
            .classes
            .vivify("p.Foo")
            .fields
            .vivify("x")
            .tl_annotations_here
            .insert(Annotation::new(value_def).with_value("value", AnnotationValue::Int(5)));

        let text = render(&scene, &WriteOptions::default()).unwrap();
        assert_eq!(
            text,
            "package p:\n\
             annotation visible @A:\n\
             \x20   int value\n\
             \n\
             package p:\n\
             class Foo:\n\
             \x20   field x: @p.A(value=5)\n\
             \n"
        );
    }

    #[test]
    fn inner_types_nest_under_their_field() {
        let mut scene = AScene::new();
        scene
            .classes
            .vivify("C")
            .fields
            .vivify("f")
            .inner_types
            .vivify(InnerTypeLocation::new(vec![0, 1]))
            .tl_annotations_here
            .insert(Annotation::new(def("Nullable")));

        let text = render(&scene, &WriteOptions::default()).unwrap();
        assert!(
            text.contains("class C:\n    field f:\n        inner-type 0,1: @Nullable\n"),
            "{text}"
        );
    }

    #[test]
    fn skips_annotation_free_sections() {
        let mut scene = AScene::new();
        let class = scene.classes.vivify("p.C");
        class.methods.vivify("m()V").parameters.vivify(0u32);
        class.fields.vivify("empty");
        class
            .methods
            .vivify("n()V")
            .body
            .expression
            .news
            .vivify(RelativeLocation::offset(3))
            .tl_annotations_here
            .insert(Annotation::new(def("p.A")));

        let text = render(&scene, &WriteOptions::default()).unwrap();
        assert!(!text.contains("m()V"), "{text}");
        assert!(!text.contains("field empty"), "{text}");
        assert!(!text.contains("return"), "{text}");
        assert!(text.contains("    method n()V:\n        new #3: @p.A\n"), "{text}");
        // The caller's scene keeps its skeleton entries.
        assert_eq!(scene.classes["p.C"].methods.len(), 2);
    }

    #[test]
    fn supertype_slots_keep_their_keyword() {
        let mut scene = AScene::new();
        let class = scene.classes.vivify("p.C");
        let slots = [
            TypeIndexLocation::EXTENDS,
            TypeIndexLocation(i32::MAX),
            TypeIndexLocation(-5),
        ];
        for slot in slots {
            class
                .extends_implements
                .vivify(slot)
                .tl_annotations_here
                .insert(Annotation::new(def("p.A")));
        }

        let text = render(&scene, &WriteOptions::default()).unwrap();
        assert!(text.contains("    extends: @p.A\n"), "{text}");
        assert!(text.contains("    implements 2147483647: @p.A\n"), "{text}");
        assert_eq!(text.matches("extends").count(), 1, "{text}");
        assert!(!text.contains("-5"), "{text}");

        let reparsed = parse_str(&text).unwrap();
        assert_eq!(reparsed.classes["p.C"].extends_implements.len(), 2);
    }

    #[test]
    fn annotations_on_code_fragments_are_not_written() {
        let mut scene = AScene::new();
        let block = scene.classes.vivify("p.C").static_inits.vivify(0u32);
        block.tl_annotations_here.insert(Annotation::new(def("p.A")));
        block
            .expression
            .tl_annotations_here
            .insert(Annotation::new(def("p.A")));

        let text = render(&scene, &WriteOptions::default()).unwrap();
        assert!(text.contains("    staticinit *0:\n"), "{text}");
        assert!(!text.contains("staticinit *0: @"), "{text}");
        parse_str(&text).unwrap();
    }

    #[test]
    fn tabs_indent_one_per_level() {
        let mut scene = AScene::new();
        scene
            .classes
            .vivify("C")
            .fields
            .vivify("f")
            .tl_annotations_here
            .insert(Annotation::new(def("A")));
        let options = WriteOptions {
            indent_width: 8,
            indent_style: IndentStyle::Tabs,
        };
        let text = render(&scene, &options).unwrap();
        assert!(text.contains("\tfield f: @A\n"), "{text}");
    }

    #[test]
    fn output_parses_back_to_an_equal_scene() {
        let text = "package p: annotation visible @A: int value\n\
            annotation invisible @B:\n\
            package p: @B\n\
            class Foo: @B\n\
            \x20   bound 0&0: @B\n\
            \x20   field x: @A(value=5)\n\
            \x20       inner-type 0,1: @B\n\
            \x20   method m(I)V: @B\n\
            \x20       parameter #0: @A(value=-1)\n\
            \x20       local 1 #0+5: @B\n\
            \x20       instanceof #9: @B\n";
        let mut scene = parse_str(text).unwrap();
        let written = render(&scene, &WriteOptions::default()).unwrap();
        let mut reparsed = parse_str(&written).unwrap();

        scene.prune();
        reparsed.prune();
        assert_eq!(reparsed, scene);
        assert!(reparsed.packages["p"].lookup("p.B").is_some());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: WriteOptions = serde_json::from_str(r#"{"indent_style":"tabs"}"#).unwrap();
        assert_eq!(
            options,
            WriteOptions {
                indent_width: 4,
                indent_style: IndentStyle::Tabs,
            }
        );
    }
}
