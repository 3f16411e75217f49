use std::sync::Arc;

use jaif_index::{parse_str, render, IndentStyle, WriteOptions};
use jaif_scene::{
    AScene, Annotation, AnnotationDef, AnnotationFieldType, AnnotationSet, AnnotationValue,
    AstPath, AstPathEntry, BasicKind, InnerTypeLocation, LocalLocation, RelativeLocation,
    RetentionPolicy, TypeIndexLocation,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Position {
    Package,
    Class,
    Supertype(i32),
    FieldInner(u8, Vec<u32>),
    FieldInit(u8, u32),
    Return(u8),
    Receiver(u8),
    Parameter(u8, u32),
    Throws(u8, u32),
    Local(u8, u32, u32),
    Instanceof(u8, u32),
    StaticInit(u32, u32),
    InsertAnnotation(u8),
}

fn position() -> impl Strategy<Value = Position> {
    prop_oneof![
        Just(Position::Package),
        Just(Position::Class),
        (-1i32..2).prop_map(Position::Supertype),
        (0u8..2, proptest::collection::vec(0u32..3, 0..3))
            .prop_map(|(field, steps)| Position::FieldInner(field, steps)),
        (0u8..2, 0u32..3).prop_map(|(field, index)| Position::FieldInit(field, index)),
        (0u8..2).prop_map(Position::Return),
        (0u8..2).prop_map(Position::Receiver),
        (0u8..2, 0u32..3).prop_map(|(method, index)| Position::Parameter(method, index)),
        (0u8..2, 0u32..2).prop_map(|(method, index)| Position::Throws(method, index)),
        (0u8..2, 0u32..3, 0u32..20)
            .prop_map(|(method, index, start)| Position::Local(method, index, start)),
        (0u8..2, 0u32..40).prop_map(|(method, offset)| Position::Instanceof(method, offset)),
        (0u32..2, 0u32..40).prop_map(|(block, offset)| Position::StaticInit(block, offset)),
        (0u8..2).prop_map(Position::InsertAnnotation),
    ]
}

fn method_key(method: u8) -> String {
    format!("m{method}(ILjava/lang/String;)[I")
}

fn annotation_set<'a>(
    scene: &'a mut AScene,
    package: &str,
    class: u8,
    position: &Position,
) -> &'a mut AnnotationSet {
    if let Position::Package = position {
        return &mut scene.packages.vivify(package).tl_annotations_here;
    }
    let class = scene.classes.vivify(format!("{package}.C{class}"));
    match position {
        Position::Package | Position::Class => &mut class.tl_annotations_here,
        Position::Supertype(index) => {
            &mut class
                .extends_implements
                .vivify(TypeIndexLocation(*index))
                .tl_annotations_here
        }
        Position::FieldInner(field, steps) => {
            let field = class.fields.vivify(format!("f{field}"));
            if steps.is_empty() {
                &mut field.tl_annotations_here
            } else {
                &mut field
                    .inner_types
                    .vivify(InnerTypeLocation::new(steps.clone()))
                    .tl_annotations_here
            }
        }
        Position::FieldInit(field, index) => {
            &mut class
                .vivify_field_init(&format!("f{field}"))
                .news
                .vivify(RelativeLocation::index(*index))
                .tl_annotations_here
        }
        Position::Return(method) => {
            &mut class
                .methods
                .vivify(method_key(*method))
                .return_type
                .tl_annotations_here
        }
        Position::Receiver(method) => {
            &mut class
                .methods
                .vivify(method_key(*method))
                .receiver
                .tl_annotations_here
        }
        Position::Parameter(method, index) => {
            &mut class
                .methods
                .vivify(method_key(*method))
                .parameters
                .vivify(*index)
                .tl_annotations_here
        }
        Position::Throws(method, index) => {
            &mut class
                .methods
                .vivify(method_key(*method))
                .throws
                .vivify(*index)
                .tl_annotations_here
        }
        Position::Local(method, index, start) => {
            &mut class
                .methods
                .vivify(method_key(*method))
                .body
                .locals
                .vivify(LocalLocation::new(*index, *start, 8))
                .tl_annotations_here
        }
        Position::Instanceof(method, offset) => {
            &mut class
                .methods
                .vivify(method_key(*method))
                .body
                .expression
                .instanceofs
                .vivify(RelativeLocation::offset(*offset))
                .tl_annotations_here
        }
        Position::StaticInit(block, offset) => {
            &mut class
                .static_inits
                .vivify(*block)
                .expression
                .typecasts
                .vivify(RelativeLocation::offset(*offset))
                .tl_annotations_here
        }
        Position::InsertAnnotation(field) => {
            let path = AstPath::new(vec![
                AstPathEntry::new("Variable", "initializer"),
                AstPathEntry::new("NewArray", "initializer").with_argument(u32::from(*field)),
            ]);
            &mut class
                .decl
                .insert_annotations
                .vivify(path)
                .tl_annotations_here
        }
    }
}

/// Annotation payloads: a marker, or an `int`/`String`/array value.
#[derive(Debug, Clone)]
enum Payload {
    Marker,
    Int(i32),
    Text(String),
    Longs(Vec<i64>),
}

fn payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        Just(Payload::Marker),
        any::<i32>().prop_map(Payload::Int),
        "[ -~\\n\\t]{0,12}".prop_map(Payload::Text),
        proptest::collection::vec(any::<i64>(), 0..4).prop_map(Payload::Longs),
    ]
}

struct Defs {
    marker: Arc<AnnotationDef>,
    int: Arc<AnnotationDef>,
    text: Arc<AnnotationDef>,
    longs: Arc<AnnotationDef>,
}

impl Defs {
    fn new() -> Self {
        Self {
            marker: Arc::new(AnnotationDef::new("a.Marker").with_retention(RetentionPolicy::Class)),
            int: Arc::new(
                AnnotationDef::new("a.IntValue")
                    .with_retention(RetentionPolicy::Runtime)
                    .with_field("value", AnnotationFieldType::Basic(BasicKind::Int)),
            ),
            text: Arc::new(
                AnnotationDef::new("b.Text")
                    .with_retention(RetentionPolicy::Source)
                    .with_field("value", AnnotationFieldType::Basic(BasicKind::String)),
            ),
            longs: Arc::new(
                AnnotationDef::new("b.Longs")
                    .with_retention(RetentionPolicy::Runtime)
                    .with_field(
                        "values",
                        AnnotationFieldType::array_of(AnnotationFieldType::Basic(BasicKind::Long)),
                    ),
            ),
        }
    }

    fn annotation(&self, payload: &Payload) -> Annotation {
        match payload {
            Payload::Marker => Annotation::new(self.marker.clone()),
            Payload::Int(value) => Annotation::new(self.int.clone())
                .with_value("value", AnnotationValue::Int(*value)),
            Payload::Text(text) => Annotation::new(self.text.clone())
                .with_value("value", AnnotationValue::String(text.clone())),
            Payload::Longs(values) => Annotation::new(self.longs.clone()).with_value(
                "values",
                AnnotationValue::Array(values.iter().copied().map(AnnotationValue::Long).collect()),
            ),
        }
    }
}

fn scene() -> impl Strategy<Value = AScene> {
    let entry = (
        prop_oneof![Just("p"), Just("p.q"), Just("")],
        0u8..2,
        position(),
        payload(),
    );
    proptest::collection::vec(entry, 0..16).prop_map(|entries| {
        let defs = Defs::new();
        let mut scene = AScene::new();
        for (package, class, position, payload) in entries {
            // Classes in the unnamed package carry no package prefix.
            if package.is_empty() && !matches!(position, Position::Package) {
                continue;
            }
            let annotation = defs.annotation(&payload);
            let set = annotation_set(&mut scene, package, class, &position);
            if set.lookup(annotation.name()).is_none() {
                set.insert(annotation);
            }
        }
        scene
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn written_scenes_parse_back_equal(mut scene in scene(), tabs in any::<bool>()) {
        let options = WriteOptions {
            indent_width: 2,
            indent_style: if tabs { IndentStyle::Tabs } else { IndentStyle::Spaces },
        };
        let text = render(&scene, &options).unwrap();
        let mut reparsed = match parse_str(&text) {
            Ok(reparsed) => reparsed,
            Err(err) => return Err(TestCaseError::fail(format!("{err}\n{text}"))),
        };

        scene.prune();
        reparsed.prune();
        assert_eq!(reparsed, scene);
    }
}
