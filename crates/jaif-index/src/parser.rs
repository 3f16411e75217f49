//! Recursive-descent parser for index files.
//!
//! Sections are recognized by their leading keyword; indentation carries no
//! meaning. Definitions are only visible to the file that declares them.

use std::collections::HashMap;
use std::sync::Arc;

use jaif_scene::{
    ABlock, AClass, ADeclaration, AExpression, AField, AMethod, AScene, ATypeElement,
    ATypeElementWithType, Annotation, AnnotationDef, AnnotationFieldType, AnnotationSet,
    AnnotationValue, AstPath, AstPathEntry, BasicKind, BoundLocation, InnerTypeLocation,
    LocalLocation, RelativeLocation, RetentionPolicy, TypeIndexLocation, VivifyMap,
};

use crate::error::ParseError;
use crate::lexer::{tokenize, Token, TokenKind};

type Result<T> = std::result::Result<T, ParseError>;

/// Every keyword that opens a section. A bare word in one of these positions
/// ends whatever construct precedes it.
const SECTION_KEYWORDS: &[&str] = &[
    "package",
    "annotation",
    "class",
    "bound",
    "extends",
    "implements",
    "field",
    "method",
    "staticinit",
    "instanceinit",
    "return",
    "receiver",
    "parameter",
    "throws",
    "local",
    "typecast",
    "instanceof",
    "new",
    "inner-type",
    "insert-annotation",
    "insert-typecast",
];

/// Parses `text` and merges its contents into `scene`.
///
/// On error the scene may already hold part of the file's contents.
pub fn parse_into(text: &str, scene: &mut AScene) -> Result<()> {
    let mut parser = Parser::new(tokenize(text)?);
    parser.parse_file(scene)
}

/// Parses `text` into a fresh scene.
pub fn parse_str(text: &str) -> Result<AScene> {
    let mut scene = AScene::new();
    parse_into(text, &mut scene)?;
    Ok(scene)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    defs: HashMap<String, Arc<AnnotationDef>>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            defs: HashMap::new(),
        }
    }

    // ---- token helpers -------------------------------------------------

    fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.peek().line, message)
    }

    fn at_eof(&self) -> bool {
        self.peek().is_eof()
    }

    fn check_char(&self, c: char) -> bool {
        self.peek().is_symbol(c)
    }

    fn match_char(&mut self, c: char) -> bool {
        if self.check_char(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, c: char) -> Result<()> {
        if self.match_char(c) {
            Ok(())
        } else {
            Err(self.error(format!("Expected `{c}'")))
        }
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        self.peek().word() == Some(keyword)
    }

    fn match_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.match_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("Expected `{keyword}'")))
        }
    }

    fn at_section_keyword(&self) -> bool {
        self.peek()
            .word()
            .is_some_and(|word| SECTION_KEYWORDS.contains(&word))
    }

    fn expect_word(&mut self, what: &str) -> Result<String> {
        match self.peek().word() {
            Some(word) => {
                let word = word.to_string();
                self.bump();
                Ok(word)
            }
            None => Err(self.error(format!("Expected {what}"))),
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        let is_identifier = self
            .peek()
            .word()
            .and_then(|word| word.chars().next())
            .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$');
        if !is_identifier {
            return Err(self.error("Expected an identifier"));
        }
        self.expect_word("an identifier")
    }

    fn expect_qualified_name(&mut self) -> Result<String> {
        let mut name = self.expect_identifier()?;
        while self.check_char('.') {
            self.bump();
            name.push('.');
            name.push_str(&self.expect_identifier()?);
        }
        Ok(name)
    }

    fn expect_u32(&mut self) -> Result<u32> {
        let parsed = self.peek().word().and_then(|word| word.parse::<u32>().ok());
        match parsed {
            Some(value) => {
                self.bump();
                Ok(value)
            }
            None => Err(self.error("Expected a non-negative integer")),
        }
    }

    // ---- file structure ------------------------------------------------

    fn parse_file(&mut self, scene: &mut AScene) -> Result<()> {
        while !self.at_eof() {
            self.parse_package(scene)?;
        }
        Ok(())
    }

    fn parse_package(&mut self, scene: &mut AScene) -> Result<()> {
        self.expect_keyword("package")?;
        let package = if self.check_char(':') {
            String::new()
        } else {
            self.expect_qualified_name()?
        };
        self.expect_char(':')?;
        if self.check_char('@') {
            let element = scene.packages.vivify(package.as_str());
            self.parse_annotations(&mut element.tl_annotations_here, &package)?;
        }

        loop {
            if self.check_keyword("annotation") {
                self.parse_annotation_def(&package)?;
            } else if self.check_keyword("class") {
                self.parse_class(&package, scene)?;
            } else if self.at_eof() || self.check_keyword("package") {
                return Ok(());
            } else {
                return Err(self.error("Expected `package', `annotation' or `class'"));
            }
        }
    }

    fn parse_annotation_def(&mut self, package: &str) -> Result<()> {
        let line = self.peek().line;
        self.expect_keyword("annotation")?;
        let retention = match self.peek().word().and_then(RetentionPolicy::from_keyword) {
            Some(retention) => {
                self.bump();
                Some(retention)
            }
            None => None,
        };
        self.expect_char('@')?;
        let name = qualify(package, &self.expect_identifier()?);
        self.expect_char(':')?;
        if self.defs.contains_key(&name) {
            return Err(ParseError::new(
                line,
                format!("Duplicate definition of annotation type {name}"),
            ));
        }

        let mut def = AnnotationDef::new(name.clone());
        def.retention = retention;
        self.parse_annotations(&mut def.meta_annotations, package)?;

        while !self.at_eof() && !self.at_section_keyword() {
            let ty = self.parse_field_type(package)?;
            let field = self.expect_identifier()?;
            if def.field_types.contains_key(&field) {
                return Err(self.error(format!(
                    "Duplicate field {field} in definition of {name}"
                )));
            }
            def.field_types.insert(field, ty);
        }

        self.defs.insert(name, Arc::new(def));
        Ok(())
    }

    fn parse_field_type(&mut self, package: &str) -> Result<AnnotationFieldType> {
        if self.match_keyword("unknown") {
            self.expect_char('[')?;
            self.expect_char(']')?;
            return Ok(AnnotationFieldType::unknown_array());
        }

        let scalar = if self.match_keyword("enum") {
            AnnotationFieldType::Enum(self.expect_qualified_name()?)
        } else if self.match_keyword("annotation-field") {
            self.match_char('@');
            let name = self.expect_qualified_name()?;
            match self.resolve_def(&name, package) {
                Some(def) => AnnotationFieldType::Annotation(def),
                None => {
                    return Err(self.error(format!(
                        "No definition for annotation type {name} used as a field type"
                    )))
                }
            }
        } else {
            let name = self.expect_qualified_name()?;
            match name.as_str() {
                "Class" | "java.lang.Class" => AnnotationFieldType::ClassToken,
                other => match BasicKind::from_keyword(other) {
                    Some(kind) => AnnotationFieldType::Basic(kind),
                    None => {
                        return Err(self.error(format!(
                            "Expected an annotation field type, found {other}"
                        )))
                    }
                },
            }
        };

        if self.match_char('[') {
            self.expect_char(']')?;
            return Ok(AnnotationFieldType::array_of(scalar));
        }
        Ok(scalar)
    }

    fn resolve_def(&self, name: &str, package: &str) -> Option<Arc<AnnotationDef>> {
        self.defs
            .get(name)
            .or_else(|| self.defs.get(&qualify(package, name)))
            .cloned()
    }

    // ---- annotations ---------------------------------------------------

    /// Parses a run of top-level annotations into `set`, rejecting a second
    /// annotation of a type already present.
    fn parse_annotations(&mut self, set: &mut AnnotationSet, package: &str) -> Result<()> {
        while self.check_char('@') {
            let line = self.peek().line;
            let annotation = self.parse_annotation(package, true)?;
            if set.lookup(annotation.name()).is_some() {
                return Err(ParseError::new(
                    line,
                    format!("Duplicate annotation of type {}", annotation.name()),
                ));
            }
            set.insert(annotation);
        }
        Ok(())
    }

    fn parse_annotation(&mut self, package: &str, top_level: bool) -> Result<Annotation> {
        let line = self.peek().line;
        self.expect_char('@')?;
        let name = self.expect_qualified_name()?;
        let def = self.resolve_def(&name, package).ok_or_else(|| {
            ParseError::new(line, format!("No definition for annotation type {name}"))
        })?;
        if top_level && !def.is_top_level() {
            return Err(ParseError::new(
                line,
                format!(
                    "No top-level definition for annotation type {name}; did you forget the retention policy?"
                ),
            ));
        }

        let mut annotation = Annotation::new(def.clone());
        if self.match_char('(') {
            if !self.check_char(')') {
                loop {
                    let field = self.expect_identifier()?;
                    self.expect_char('=')?;
                    let Some(ty) = def.field_types.get(&field) else {
                        return Err(self.error(format!(
                            "Unknown field {field} in annotation type {}",
                            def.name
                        )));
                    };
                    if annotation.field_values.contains_key(&field) {
                        return Err(self.error(format!("Duplicate value for field {field}")));
                    }
                    let value = self.parse_value(ty, package)?;
                    annotation.field_values.insert(field, value);
                    if !self.match_char(',') {
                        break;
                    }
                }
            }
            self.expect_char(')')?;
        }
        Ok(annotation)
    }

    fn parse_value(&mut self, ty: &AnnotationFieldType, package: &str) -> Result<AnnotationValue> {
        match ty {
            AnnotationFieldType::Basic(kind) => self.parse_basic_value(*kind),
            AnnotationFieldType::ClassToken => Ok(AnnotationValue::Class(self.parse_class_token()?)),
            AnnotationFieldType::Enum(_) => Ok(AnnotationValue::Enum(self.expect_identifier()?)),
            AnnotationFieldType::Annotation(def) => {
                if !self.check_char('@') {
                    return Err(self.error("Expected `@'"));
                }
                let line = self.peek().line;
                let sub = self.parse_annotation(package, false)?;
                if sub.def.name != def.name {
                    return Err(ParseError::new(
                        line,
                        format!(
                            "Expected annotation of type {}, found {}",
                            def.name,
                            sub.name()
                        ),
                    ));
                }
                Ok(AnnotationValue::Annotation(sub))
            }
            AnnotationFieldType::Array(None) => {
                self.expect_char('{')?;
                if !self.match_char('}') {
                    return Err(self.error(
                        "Expected `}': an array of unknown element type must be empty",
                    ));
                }
                Ok(AnnotationValue::Array(Vec::new()))
            }
            AnnotationFieldType::Array(Some(element)) => {
                let mut values = Vec::new();
                if self.match_char('{') {
                    if !self.match_char('}') {
                        loop {
                            values.push(self.parse_value(element, package)?);
                            if !self.match_char(',') {
                                break;
                            }
                        }
                        self.expect_char('}')?;
                    }
                } else {
                    values.push(self.parse_value(element, package)?);
                }
                Ok(AnnotationValue::Array(values))
            }
        }
    }

    fn parse_basic_value(&mut self, kind: BasicKind) -> Result<AnnotationValue> {
        match kind {
            BasicKind::Boolean => {
                if self.match_keyword("true") {
                    Ok(AnnotationValue::Boolean(true))
                } else if self.match_keyword("false") {
                    Ok(AnnotationValue::Boolean(false))
                } else {
                    Err(self.error("Expected `true' or `false'"))
                }
            }
            BasicKind::Char => match self.peek().kind {
                TokenKind::Char(c) => {
                    self.bump();
                    Ok(AnnotationValue::Char(c))
                }
                _ => Err(self.error("Expected a character literal")),
            },
            BasicKind::String => match &self.peek().kind {
                TokenKind::Str(s) => {
                    let s = s.clone();
                    self.bump();
                    Ok(AnnotationValue::String(s))
                }
                _ => Err(self.error("Expected a string literal")),
            },
            BasicKind::Byte => {
                let value = self.parse_integer(kind, i64::from(i8::MIN), i64::from(i8::MAX))?;
                Ok(AnnotationValue::Byte(value as i8))
            }
            BasicKind::Short => {
                let value = self.parse_integer(kind, i64::from(i16::MIN), i64::from(i16::MAX))?;
                Ok(AnnotationValue::Short(value as i16))
            }
            BasicKind::Int => {
                let value = self.parse_integer(kind, i64::from(i32::MIN), i64::from(i32::MAX))?;
                Ok(AnnotationValue::Int(value as i32))
            }
            BasicKind::Long => Ok(AnnotationValue::Long(
                self.parse_integer(kind, i64::MIN, i64::MAX)?,
            )),
            BasicKind::Float => {
                let text = self.floating_point_text()?;
                let value = text
                    .parse::<f32>()
                    .map_err(|_| self.error(format!("Expected a float literal, found {text}")))?;
                Ok(AnnotationValue::Float(value))
            }
            BasicKind::Double => {
                let text = self.floating_point_text()?;
                let value = text
                    .parse::<f64>()
                    .map_err(|_| self.error(format!("Expected a double literal, found {text}")))?;
                Ok(AnnotationValue::Double(value))
            }
        }
    }

    fn parse_integer(&mut self, kind: BasicKind, min: i64, max: i64) -> Result<i64> {
        let parsed = self.peek().word().and_then(parse_java_integer);
        match parsed {
            Some(value) if (min..=max).contains(&value) => {
                self.bump();
                Ok(value)
            }
            _ => Err(self.error(format!("Expected a {} literal", kind.keyword()))),
        }
    }

    /// Reassembles a floating-point literal that the tokenizer split at `.`.
    ///
    /// Exponents with an explicit `+` sign are not supported: `+` is not a
    /// word character, so `1.5e+3` never reaches this point as one literal.
    fn floating_point_text(&mut self) -> Result<String> {
        let mut text = String::new();
        if let Some(word) = self.peek().word() {
            text.push_str(word);
            self.bump();
        }
        if self.check_char('.') && self.peek_nth(1).word().is_some() {
            self.bump();
            text.push('.');
            text.push_str(&self.expect_word("digits")?);
        } else if self.match_char('.') {
            text.push('.');
        }
        if text.is_empty() {
            return Err(self.error("Expected a floating-point literal"));
        }
        let trimmed = text
            .strip_suffix(['f', 'F', 'd', 'D'])
            .filter(|rest| rest.ends_with(|c: char| c.is_ascii_digit() || c == '.'))
            .unwrap_or(&text);
        Ok(trimmed.to_string())
    }

    /// `Name(.Name)*([])*.class`, also accepting primitives and `void`.
    /// Returns the name without the `.class` suffix.
    fn parse_class_token(&mut self) -> Result<String> {
        let mut name = self.expect_identifier()?;
        while self.check_char('.') && self.peek_nth(1).word() != Some("class") {
            self.bump();
            name.push('.');
            name.push_str(&self.expect_identifier()?);
        }
        while self.match_char('[') {
            self.expect_char(']')?;
            name.push_str("[]");
        }
        self.expect_char('.')?;
        self.expect_keyword("class")?;
        Ok(name)
    }

    // ---- classes -------------------------------------------------------

    fn parse_class(&mut self, package: &str, scene: &mut AScene) -> Result<()> {
        self.expect_keyword("class")?;
        let name = qualify(package, &self.expect_identifier()?);
        self.expect_char(':')?;
        let class = scene.classes.vivify(name);
        self.parse_annotations(&mut class.tl_annotations_here, package)?;
        self.parse_class_body(class, package)
    }

    fn parse_class_body(&mut self, class: &mut AClass, package: &str) -> Result<()> {
        loop {
            if self.check_keyword("bound") {
                self.parse_bound(&mut class.bounds, package)?;
            } else if self.match_keyword("extends") {
                self.expect_char(':')?;
                let supertype = class.extends_implements.vivify(TypeIndexLocation::EXTENDS);
                self.parse_type_element(supertype, package)?;
            } else if self.match_keyword("implements") {
                let location = self
                    .peek()
                    .word()
                    .and_then(|word| word.parse::<u32>().ok())
                    .and_then(TypeIndexLocation::implements)
                    .ok_or_else(|| self.error("Expected an interface index"))?;
                self.bump();
                self.expect_char(':')?;
                let supertype = class.extends_implements.vivify(location);
                self.parse_type_element(supertype, package)?;
            } else if self.match_keyword("field") {
                let name = self.expect_identifier()?;
                self.expect_char(':')?;
                self.parse_field(class.fields.vivify(name), package)?;
            } else if self.match_keyword("staticinit") {
                let index = self.parse_block_ordinal()?;
                self.parse_block(class.static_inits.vivify(index), package)?;
            } else if self.match_keyword("instanceinit") {
                let index = self.parse_block_ordinal()?;
                self.parse_block(class.instance_inits.vivify(index), package)?;
            } else if self.match_keyword("method") {
                let key = self.parse_method_key()?;
                self.parse_method(class.methods.vivify(key), package)?;
            } else if !self.parse_insertion(&mut class.decl, package)? {
                return Ok(());
            }
        }
    }

    fn parse_block_ordinal(&mut self) -> Result<u32> {
        self.expect_char('*')?;
        let index = self.expect_u32()?;
        self.expect_char(':')?;
        Ok(index)
    }

    fn parse_bound(
        &mut self,
        bounds: &mut VivifyMap<BoundLocation, ATypeElement>,
        package: &str,
    ) -> Result<()> {
        self.expect_keyword("bound")?;
        let param = self.expect_u32()?;
        self.expect_char('&')?;
        let bound = self.expect_u32()?;
        self.expect_char(':')?;
        self.parse_type_element(bounds.vivify(BoundLocation::new(param, bound)), package)
    }

    fn parse_field(&mut self, field: &mut AField, package: &str) -> Result<()> {
        self.parse_variable(field, package)?;
        while self.at_expression_section() {
            self.parse_expression_section(field.vivify_init(), package)?;
        }
        Ok(())
    }

    /// Annotations, inner types and insertion requests of a variable.
    fn parse_variable(&mut self, variable: &mut AField, package: &str) -> Result<()> {
        self.parse_annotations(&mut variable.tl_annotations_here, package)?;
        self.parse_inner_types(&mut variable.inner_types, package)?;
        while self.parse_insertion(&mut variable.decl, package)? {}
        Ok(())
    }

    fn parse_type_element(&mut self, ty: &mut ATypeElement, package: &str) -> Result<()> {
        self.parse_annotations(&mut ty.tl_annotations_here, package)?;
        self.parse_inner_types(&mut ty.inner_types, package)
    }

    fn parse_inner_types(
        &mut self,
        inner_types: &mut VivifyMap<InnerTypeLocation, ATypeElement>,
        package: &str,
    ) -> Result<()> {
        while self.match_keyword("inner-type") {
            let mut steps = vec![self.expect_u32()?];
            while self.match_char(',') {
                steps.push(self.expect_u32()?);
            }
            self.expect_char(':')?;
            let inner = inner_types.vivify(InnerTypeLocation::new(steps));
            self.parse_annotations(&mut inner.tl_annotations_here, package)?;
        }
        Ok(())
    }

    // ---- methods -------------------------------------------------------

    /// Method keys (`name(descriptor)return`) are reassembled from the tokens
    /// up to the next `:`; they never contain whitespace.
    fn parse_method_key(&mut self) -> Result<String> {
        let mut key = String::new();
        while !self.check_char(':') {
            let token = self.peek();
            let Some(text) = token.text() else {
                return Err(self.error("Expected a method signature followed by `:'"));
            };
            key.push_str(&text);
            self.bump();
        }
        self.expect_char(':')?;
        if key.is_empty() {
            return Err(self.error("Expected a method signature"));
        }
        Ok(key)
    }

    fn parse_method(&mut self, method: &mut AMethod, package: &str) -> Result<()> {
        self.parse_annotations(&mut method.tl_annotations_here, package)?;
        loop {
            if self.check_keyword("bound") {
                self.parse_bound(&mut method.bounds, package)?;
            } else if self.match_keyword("return") {
                self.expect_char(':')?;
                self.parse_type_element(&mut method.return_type, package)?;
            } else if self.match_keyword("receiver") {
                self.expect_char(':')?;
                self.parse_variable(&mut method.receiver, package)?;
            } else if self.match_keyword("parameter") {
                self.expect_char('#')?;
                let index = self.expect_u32()?;
                self.expect_char(':')?;
                self.parse_variable(method.parameters.vivify(index), package)?;
            } else if self.match_keyword("throws") {
                let index = self.expect_u32()?;
                self.expect_char(':')?;
                self.parse_type_element(method.throws.vivify(index), package)?;
            } else if self.parse_block_section(&mut method.body, package)? {
                continue;
            } else if !self.parse_insertion(&mut method.decl, package)? {
                return Ok(());
            }
        }
    }

    fn parse_block(&mut self, block: &mut ABlock, package: &str) -> Result<()> {
        while self.parse_block_section(block, package)? {}
        Ok(())
    }

    /// Parses one `local`/`typecast`/`instanceof`/`new` section, if present.
    fn parse_block_section(&mut self, block: &mut ABlock, package: &str) -> Result<bool> {
        if self.match_keyword("local") {
            let index = self.expect_u32()?;
            self.expect_char('#')?;
            let start = self.expect_u32()?;
            self.expect_char('+')?;
            let length = self.expect_u32()?;
            self.expect_char(':')?;
            let local = block.locals.vivify(LocalLocation::new(index, start, length));
            self.parse_variable(local, package)?;
            return Ok(true);
        }
        if self.at_expression_section() {
            self.parse_expression_section(&mut block.expression, package)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn at_expression_section(&self) -> bool {
        ["typecast", "instanceof", "new"]
            .iter()
            .any(|keyword| self.check_keyword(keyword))
    }

    fn parse_expression_section(&mut self, expr: &mut AExpression, package: &str) -> Result<()> {
        let keyword = self.expect_word("`typecast', `instanceof' or `new'")?;
        let location = self.parse_relative_location()?;
        self.expect_char(':')?;
        let map = match keyword.as_str() {
            "typecast" => &mut expr.typecasts,
            "instanceof" => &mut expr.instanceofs,
            _ => &mut expr.news,
        };
        self.parse_type_element(map.vivify(location), package)
    }

    fn parse_relative_location(&mut self) -> Result<RelativeLocation> {
        if self.match_char('#') {
            Ok(RelativeLocation::offset(self.expect_u32()?))
        } else if self.match_char('*') {
            Ok(RelativeLocation::index(self.expect_u32()?))
        } else {
            Err(self.error("Expected `#' or `*'"))
        }
    }

    // ---- source insertions ---------------------------------------------

    /// Parses one `insert-annotation` or `insert-typecast` section, if present.
    fn parse_insertion(&mut self, decl: &mut ADeclaration, package: &str) -> Result<bool> {
        if self.match_keyword("insert-annotation") {
            let path = self.parse_ast_path()?;
            self.parse_type_element(decl.insert_annotations.vivify(path), package)?;
            Ok(true)
        } else if self.match_keyword("insert-typecast") {
            let path = self.parse_ast_path()?;
            let cast = decl.insert_typecasts.vivify(path);
            self.parse_typecast_insertion(cast, package)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn parse_typecast_insertion(
        &mut self,
        cast: &mut ATypeElementWithType,
        package: &str,
    ) -> Result<()> {
        self.parse_annotations(&mut cast.element.tl_annotations_here, package)?;
        if self.peek().word().is_some() && !self.at_section_keyword() {
            let line = self.peek().line;
            let ty = self.parse_java_type()?;
            if let Some(existing) = &cast.base_type {
                if *existing != ty {
                    return Err(ParseError::new(
                        line,
                        format!("Conflicting cast types {existing} and {ty}"),
                    ));
                }
            }
            cast.base_type = Some(ty);
        }
        self.parse_inner_types(&mut cast.element.inner_types, package)
    }

    /// `Kind.selector [n](, Kind.selector [n])* :`
    fn parse_ast_path(&mut self) -> Result<AstPath> {
        let mut path = AstPath::default();
        loop {
            let kind = self.expect_identifier()?;
            self.expect_char('.')?;
            let selector = self.expect_identifier()?;
            let mut entry = AstPathEntry::new(kind, selector);
            if let Some(arg) = self.peek().word().and_then(|w| w.parse::<u32>().ok()) {
                self.bump();
                entry = entry.with_argument(arg);
            }
            path.push(entry);
            if !self.match_char(',') {
                break;
            }
        }
        self.expect_char(':')?;
        Ok(path)
    }

    /// An un-annotated Java type: `a.b.C<T, ? extends U>[]`.
    fn parse_java_type(&mut self) -> Result<String> {
        let mut out = self.expect_qualified_name()?;
        if self.match_char('<') {
            out.push('<');
            loop {
                if self.match_char('?') {
                    out.push('?');
                    if self.match_keyword("extends") {
                        out.push_str(" extends ");
                        out.push_str(&self.parse_java_type()?);
                    } else if self.match_keyword("super") {
                        out.push_str(" super ");
                        out.push_str(&self.parse_java_type()?);
                    }
                } else {
                    out.push_str(&self.parse_java_type()?);
                }
                if self.match_char(',') {
                    out.push_str(", ");
                } else {
                    break;
                }
            }
            self.expect_char('>')?;
            out.push('>');
        }
        while self.match_char('[') {
            self.expect_char(']')?;
            out.push_str("[]");
        }
        Ok(out)
    }
}

fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{package}.{name}")
    }
}

/// Decimal, `0x` hexadecimal or leading-zero octal, with an optional `-`
/// sign and `L` suffix.
fn parse_java_integer(text: &str) -> Option<i64> {
    let text = text.strip_suffix(['l', 'L']).unwrap_or(text);
    let text = text.replace('_', "");
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        unsigned(hex, 16)?
    } else if digits.len() > 1 && digits.starts_with('0') {
        unsigned(&digits[1..], 8)?
    } else {
        unsigned(digits, 10)?
    };
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}

/// Digits only; `from_str_radix` would also take a sign.
fn unsigned(digits: &str, radix: u32) -> Option<i128> {
    if digits.starts_with(['+', '-']) {
        return None;
    }
    i128::from_str_radix(digits, radix).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jaif_scene::Element;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_field_annotation_with_value() {
        let scene = parse_str(
            "package p: annotation visible @A: int value\nclass Foo: field x: @A(value=5)\n",
        )
        .unwrap();
        let field = &scene.classes["p.Foo"].fields["x"];
        assert_eq!(field.tl_annotations_here.len(), 1);
        let ann = field.lookup("p.A").unwrap();
        assert_eq!(ann.def.retention, Some(RetentionPolicy::Runtime));
        assert_eq!(ann.get("value"), Some(&AnnotationValue::Int(5)));
    }

    #[test]
    fn duplicate_annotation_on_one_element_is_rejected() {
        let err = parse_str("package: annotation visible @ReadOnly:\nclass Foo: @ReadOnly @ReadOnly\n")
            .unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("Duplicate annotation"), "{err}");
    }

    #[test]
    fn unknown_array_must_be_empty() {
        let ok = "package: annotation invisible @Foo: unknown[] arr\nclass Bar: @Foo(arr={})";
        let scene = parse_str(ok).unwrap();
        let ann = scene.classes["Bar"].lookup("Foo").unwrap();
        assert_eq!(ann.get("arr"), Some(&AnnotationValue::Array(Vec::new())));

        let bad = "package: annotation invisible @Foo: unknown[] arr\nclass Bar: @Foo(arr={1})";
        assert!(parse_str(bad).is_err());
    }

    #[test]
    fn top_level_use_requires_retention() {
        let err = parse_str("package p: annotation @Sub: int x\nclass C: @Sub(x=1)").unwrap_err();
        assert!(err.message.contains("retention policy"), "{err}");
    }

    #[test]
    fn annotation_must_be_defined_in_this_file() {
        let err = parse_str("package p:\nclass C: @Missing").unwrap_err();
        assert_eq!(err.message, "No definition for annotation type Missing");
    }

    #[test]
    fn subannotation_type_must_match_field() {
        let text = "package p:\n\
            annotation @B: int x\n\
            annotation @D: int y\n\
            annotation visible @A: annotation-field B b\n\
            class C: @A(b=@D(y=1))";
        let err = parse_str(text).unwrap_err();
        assert_eq!(err.message, "Expected annotation of type p.B, found p.D");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = parse_str("package: annotation visible @A: int x\nclass C: @A(y=1)").unwrap_err();
        assert!(err.message.contains("Unknown field y"), "{err}");
    }

    #[test]
    fn parses_typed_values() {
        let text = r#"package p:
annotation visible @V:
    boolean b
    char c
    byte by
    short s
    long l
    float f
    double d
    String str
    Class cls
    enum java.lang.annotation.ElementType e
    int[] ints
class C: @V(b=true, c='x', by=-3, s=0x10, l=9000000000L, f=1.5f, d=-2.25, str="hi", cls=java.lang.String[].class, e=TYPE, ints={1, 2})
"#;
        let scene = parse_str(text).unwrap();
        let ann = scene.classes["p.C"].lookup("p.V").unwrap();
        let expected = [
            ("b", AnnotationValue::Boolean(true)),
            ("c", AnnotationValue::Char('x')),
            ("by", AnnotationValue::Byte(-3)),
            ("s", AnnotationValue::Short(16)),
            ("l", AnnotationValue::Long(9_000_000_000)),
            ("f", AnnotationValue::Float(1.5)),
            ("d", AnnotationValue::Double(-2.25)),
            ("str", AnnotationValue::String("hi".into())),
            ("cls", AnnotationValue::Class("java.lang.String[]".into())),
            ("e", AnnotationValue::Enum("TYPE".into())),
            (
                "ints",
                AnnotationValue::Array(vec![AnnotationValue::Int(1), AnnotationValue::Int(2)]),
            ),
        ];
        for (field, value) in expected {
            assert_eq!(ann.get(field), Some(&value), "field {field}");
        }
    }

    #[test]
    fn parses_method_sections() {
        let text = "package p: annotation visible @A:\n\
            class C:\n\
            \x20   method <init>(Ljava/lang/String;)V: @A\n\
            \x20       bound 0&1: @A\n\
            \x20       return: @A\n\
            \x20       receiver: @A\n\
            \x20       parameter #0: @A\n\
            \x20           inner-type 1,0: @A\n\
            \x20       throws 0: @A\n\
            \x20       local 2 #3+10: @A\n\
            \x20       typecast #7: @A\n\
            \x20       instanceof *1: @A\n\
            \x20       new #12: @A\n";
        let scene = parse_str(text).unwrap();
        let method = &scene.classes["p.C"].methods["<init>(Ljava/lang/String;)V"];
        assert!(method.lookup("p.A").is_some());
        assert!(method.bounds[&BoundLocation::new(0, 1)].lookup("p.A").is_some());
        assert!(method.return_type.lookup("p.A").is_some());
        assert!(method.receiver.lookup("p.A").is_some());
        let param = &method.parameters[&0u32];
        assert!(param.inner_types[&InnerTypeLocation::new(vec![1, 0])]
            .lookup("p.A")
            .is_some());
        assert!(method.throws[&0u32].lookup("p.A").is_some());
        assert!(method.body.locals[&LocalLocation::new(2, 3, 10)]
            .lookup("p.A")
            .is_some());
        let expr = &method.body.expression;
        assert!(expr.typecasts[&RelativeLocation::offset(7)].lookup("p.A").is_some());
        assert!(expr.instanceofs[&RelativeLocation::index(1)].lookup("p.A").is_some());
        assert!(expr.news[&RelativeLocation::offset(12)].lookup("p.A").is_some());
    }

    #[test]
    fn parses_class_sections_and_insertions() {
        let text = "package p: annotation visible @A:\n\
            class C: @A\n\
            \x20   insert-typecast Method.body, Block.statement 0: @A java.util.List<? extends Object>[]\n\
            \x20       inner-type 0: @A\n\
            \x20   extends: @A\n\
            \x20   implements 1: @A\n\
            \x20   field f: @A\n\
            \x20       insert-annotation Variable.initializer: @A\n\
            \x20       new *0: @A\n\
            \x20   staticinit *0:\n\
            \x20       typecast #3: @A\n";
        let scene = parse_str(text).unwrap();
        let class = &scene.classes["p.C"];
        let path = AstPath::new(vec![
            AstPathEntry::new("Method", "body"),
            AstPathEntry::new("Block", "statement").with_argument(0),
        ]);
        let cast = &class.decl.insert_typecasts[&path];
        assert_eq!(cast.base_type.as_deref(), Some("java.util.List<? extends Object>[]"));
        assert!(cast.element.inner_types[&InnerTypeLocation::new(vec![0])]
            .lookup("p.A")
            .is_some());
        assert!(class.extends_implements[&TypeIndexLocation::EXTENDS]
            .lookup("p.A")
            .is_some());
        assert!(class.extends_implements[&TypeIndexLocation::implements(1).unwrap()]
            .lookup("p.A")
            .is_some());
        let field = &class.fields["f"];
        let init_path = AstPath::new(vec![AstPathEntry::new("Variable", "initializer")]);
        assert!(field.decl.insert_annotations[&init_path].lookup("p.A").is_some());
        let init = field.init.as_ref().unwrap();
        assert!(init.news[&RelativeLocation::index(0)].lookup("p.A").is_some());
        assert!(class.static_inits[&0u32].expression.typecasts[&RelativeLocation::offset(3)]
            .lookup("p.A")
            .is_some());
    }

    #[test]
    fn meta_annotations_and_subannotation_fields() {
        let text = "package p:\n\
            annotation visible @Meta:\n\
            annotation @Inner: String s\n\
            annotation invisible @Outer: @Meta annotation-field @Inner inner\n\
            \x20   annotation-field Inner[] many\n\
            package q:\n\
            class D: @p.Outer(inner=@p.Inner(s=\"x\"), many={@p.Inner(s=\"y\")})";
        let scene = parse_str(text).unwrap();
        let outer = scene.classes["q.D"].lookup("p.Outer").unwrap();
        assert!(outer.def.meta_annotations.lookup("p.Meta").is_some());
        match outer.get("many") {
            Some(AnnotationValue::Array(values)) => assert_eq!(values.len(), 1),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn duplicate_definitions_are_rejected() {
        let err = parse_str("package p: annotation visible @A:\nannotation visible @A:").unwrap_err();
        assert!(err.message.contains("Duplicate definition"), "{err}");
    }

    #[test]
    fn duplicate_definition_reports_its_own_line() {
        let text = "package p:\n\
            annotation visible @A:\n\
            annotation visible @A:\n\
            \x20   int value\n\
            \x20   String name\n\
            class C: @A\n";
        let err = parse_str(text).unwrap_err();
        assert!(err.message.contains("Duplicate definition"), "{err}");
        assert_eq!(err.line, 3);
    }

    #[test]
    fn errors_report_expectations() {
        let err = parse_str("package p: annotation visible A:").unwrap_err();
        assert_eq!(err.message, "Expected `@'");
        assert_eq!(err.line, 1);

        let err = parse_str("package p:\n\nbogus").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn java_integer_literals() {
        assert_eq!(parse_java_integer("42"), Some(42));
        assert_eq!(parse_java_integer("-0x1F"), Some(-31));
        assert_eq!(parse_java_integer("017"), Some(15));
        assert_eq!(parse_java_integer("10L"), Some(10));
        assert_eq!(parse_java_integer("abc"), None);
        assert_eq!(parse_java_integer("0x-5"), None);
        assert_eq!(parse_java_integer("0X+5"), None);
        assert_eq!(parse_java_integer("0-7"), None);
        assert_eq!(parse_java_integer("--5"), None);
        assert_eq!(parse_java_integer("+5"), None);
        assert_eq!(parse_java_integer("-0x10"), Some(-16));
    }

    #[test]
    fn signed_hex_values_are_rejected() {
        let err = parse_str(
            "package p: annotation visible @A: int value\nclass C: @A(value=0x-5)\n",
        )
        .unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn interface_index_must_fit_a_supertype_slot() {
        let text = "package p: annotation visible @A:\n\
            class C:\n\
            \x20   extends: @A\n\
            \x20   implements 3000000000: @A\n";
        let err = parse_str(text).unwrap_err();
        assert_eq!(err.message, "Expected an interface index");
        assert_eq!(err.line, 4);

        let scene = parse_str(&text.replace("3000000000", "2147483647")).unwrap();
        let class = &scene.classes["p.C"];
        let last = TypeIndexLocation::implements(i32::MAX as u32).unwrap();
        assert!(class.extends_implements[&last].lookup("p.A").is_some());
        assert_eq!(class.extends_implements.len(), 2);
    }
}
