//! Adapts the different ways a schema can be expressed into one [`Parser`].
//!
//! A schema can be handed to [`Procedure::query`](crate::Procedure::query) or
//! [`Procedure::body`](crate::Procedure::body) in any of these shapes:
//!
//! | Shape                                       | [`ParserKind`]                 |
//! |---------------------------------------------|--------------------------------|
//! | `Fn(Value) -> Result<T, E>`                 | [`ParserKind::Callable`]       |
//! | a type implementing [`Schema`]              | [`ParserKind::Parse`]          |
//! | [`Validated<T>`] (`validator`)              | [`ParserKind::ValidateSync`]   |
//! | [`JsonSchema`] (`jsonschema`)               | [`ParserKind::Validate`]       |
//! | [`Deserialized<T>`] (`serde`)               | [`ParserKind::Create`]         |
//!
//! [`ParserShape`] covers schemas whose capabilities are only known at runtime, it is resolved by
//! probing the kinds in the order of the table above.

use std::{fmt, marker::PhantomData, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{AdapterError, ValidationError};

type ParseFn<T> = Arc<dyn Fn(Value) -> Result<T, ValidationError> + Send + Sync>;

/// The calling convention a [`Parser`] was adapted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserKind {
    Callable,
    Parse,
    ValidateSync,
    Validate,
    Create,
}

/// A schema in its uniform shape: parse a raw value into `T` or reject it.
pub struct Parser<T> {
    kind: ParserKind,
    parse: ParseFn<T>,
}

impl<T> Clone for Parser<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            parse: self.parse.clone(),
        }
    }
}

impl<T> fmt::Debug for Parser<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("kind", &self.kind)
            .field("parse", &"...")
            .finish()
    }
}

impl<T> Parser<T> {
    pub fn new(
        kind: ParserKind,
        parse: impl Fn(Value) -> Result<T, ValidationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            parse: Arc::new(parse),
        }
    }

    pub fn kind(&self) -> ParserKind {
        self.kind
    }

    pub fn parse(&self, value: Value) -> Result<T, ValidationError> {
        (self.parse)(value)
    }
}

impl<T: Serialize + 'static> Parser<T> {
    /// Forget the output type so parsers with different outputs can be stored together.
    pub(crate) fn erase(self) -> Parser<Value> {
        let parse = self.parse;
        Parser {
            kind: self.kind,
            parse: Arc::new(move |value| {
                let output = parse(value)?;
                serde_json::to_value(output).map_err(ValidationError::from)
            }),
        }
    }
}

/// Anything that can be adapted into a [`Parser`].
///
/// `M` is a marker type which only exists so the implementations don't overlap, it is always
/// inferred.
pub trait IntoParser<M>: Sized {
    type Output;

    fn into_parser(self) -> Result<Parser<Self::Output>, AdapterError>;
}

#[doc(hidden)]
pub struct CallableMarker<E>(PhantomData<E>);

impl<F, T, E> IntoParser<CallableMarker<E>> for F
where
    F: Fn(Value) -> Result<T, E> + Send + Sync + 'static,
    E: Into<ValidationError>,
{
    type Output = T;

    fn into_parser(self) -> Result<Parser<T>, AdapterError> {
        Ok(Parser::new(ParserKind::Callable, move |value| {
            (self)(value).map_err(Into::into)
        }))
    }
}

/// A schema object which knows how to parse a raw value.
///
/// ```rust
/// use routekit::{Schema, ValidationError};
/// use serde_json::Value;
///
/// struct NonEmpty;
///
/// impl Schema for NonEmpty {
///     type Output = Value;
///
///     fn parse(&self, value: Value) -> Result<Value, ValidationError> {
///         match value.as_object() {
///             Some(map) if !map.is_empty() => Ok(value),
///             _ => Err(ValidationError::new("Expected a non-empty object")),
///         }
///     }
/// }
/// ```
pub trait Schema: Send + Sync + 'static {
    type Output;

    fn parse(&self, value: Value) -> Result<Self::Output, ValidationError>;
}

#[doc(hidden)]
pub struct SchemaMarker;

impl<S: Schema> IntoParser<SchemaMarker> for S {
    type Output = S::Output;

    fn into_parser(self) -> Result<Parser<S::Output>, AdapterError> {
        Ok(Parser::new(ParserKind::Parse, move |value| self.parse(value)))
    }
}

/// Coerce the raw value into `T` using its [`serde::Deserialize`] implementation.
pub struct Deserialized<T>(PhantomData<fn() -> T>);

impl<T> Deserialized<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Deserialized<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Deserialized<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Deserialized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deserialized<{}>", std::any::type_name::<T>())
    }
}

#[doc(hidden)]
pub struct CreateMarker;

impl<T: DeserializeOwned + 'static> IntoParser<CreateMarker> for Deserialized<T> {
    type Output = T;

    fn into_parser(self) -> Result<Parser<T>, AdapterError> {
        Ok(Parser::new(ParserKind::Create, deserialize::<T>))
    }
}

fn deserialize<T: DeserializeOwned>(value: Value) -> Result<T, ValidationError> {
    serde_path_to_error::deserialize(value).map_err(ValidationError::from_path_error)
}

#[cfg(feature = "validator")]
pub use validated::*;

#[cfg(feature = "validator")]
mod validated {
    use std::{fmt, marker::PhantomData};

    use serde::de::DeserializeOwned;
    use validator::{Validate, ValidationErrors, ValidationErrorsKind};

    use super::{deserialize, IntoParser, Parser, ParserKind};
    use crate::{AdapterError, Issue, PathSegment, ValidationError};

    /// Deserialize the raw value into `T` and then run its [`validator::Validate`] rules.
    pub struct Validated<T>(PhantomData<fn() -> T>);

    impl<T> Validated<T> {
        pub fn new() -> Self {
            Self(PhantomData)
        }
    }

    impl<T> Default for Validated<T> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<T> Clone for Validated<T> {
        fn clone(&self) -> Self {
            Self::new()
        }
    }

    impl<T> fmt::Debug for Validated<T> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Validated<{}>", std::any::type_name::<T>())
        }
    }

    #[doc(hidden)]
    pub struct ValidateSyncMarker;

    impl<T: DeserializeOwned + Validate + 'static> IntoParser<ValidateSyncMarker> for Validated<T> {
        type Output = T;

        fn into_parser(self) -> Result<Parser<T>, AdapterError> {
            Ok(Parser::new(ParserKind::ValidateSync, |value| {
                let value = deserialize::<T>(value)?;
                value.validate().map_err(from_validation_errors)?;
                Ok(value)
            }))
        }
    }

    pub(crate) fn from_validation_errors(errors: ValidationErrors) -> ValidationError {
        let mut issues = Vec::new();
        collect(&errors, &mut Vec::new(), &mut issues);
        ValidationError::from_issues(issues)
    }

    fn collect(errors: &ValidationErrors, path: &mut Vec<PathSegment>, issues: &mut Vec<Issue>) {
        let mut entries = errors.errors().iter().collect::<Vec<_>>();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        for (field, kind) in entries {
            // `__all__` holds struct level errors
            let pushed = *field != "__all__";
            if pushed {
                path.push(PathSegment::Key(field.to_string()));
            }

            match kind {
                ValidationErrorsKind::Field(errors) => {
                    for error in errors {
                        issues.push(Issue {
                            path: path.clone(),
                            message: match &error.message {
                                Some(message) => message.to_string(),
                                None => format!("failed `{}` validation", error.code),
                            },
                        });
                    }
                }
                ValidationErrorsKind::Struct(inner) => collect(inner, path, issues),
                ValidationErrorsKind::List(items) => {
                    for (index, inner) in items {
                        path.push(PathSegment::Index(*index));
                        collect(inner, path, issues);
                        path.pop();
                    }
                }
            }

            if pushed {
                path.pop();
            }
        }
    }
}

#[cfg(feature = "jsonschema")]
pub use json_schema::*;

#[cfg(feature = "jsonschema")]
mod json_schema {
    use serde_json::Value;

    use super::{IntoParser, Parser, ParserKind};
    use crate::{AdapterError, Issue, PathSegment, ValidationError};

    /// Check the raw value against a JSON Schema document.
    ///
    /// The schema is compiled when the procedure is built so a broken schema is reported before
    /// any request is served.
    #[derive(Debug, Clone)]
    pub struct JsonSchema {
        schema: Value,
        validate_formats: bool,
    }

    impl JsonSchema {
        pub fn new(schema: Value) -> Self {
            Self {
                schema,
                validate_formats: true,
            }
        }

        /// Whether `format` keywords (`uuid`, `email`, ...) are asserted. Enabled by default.
        pub fn validate_formats(mut self, enabled: bool) -> Self {
            self.validate_formats = enabled;
            self
        }
    }

    #[doc(hidden)]
    pub struct ValidateMarker;

    impl IntoParser<ValidateMarker> for JsonSchema {
        type Output = Value;

        fn into_parser(self) -> Result<Parser<Value>, AdapterError> {
            let validator = jsonschema::options()
                .should_validate_formats(self.validate_formats)
                .build(&self.schema)
                .map_err(|err| AdapterError::InvalidSchema(err.to_string()))?;

            Ok(Parser::new(ParserKind::Validate, move |value| {
                let issues = validator
                    .iter_errors(&value)
                    .map(|err| Issue {
                        path: pointer_segments(&err.instance_path.to_string()),
                        message: err.to_string(),
                    })
                    .collect::<Vec<_>>();

                if issues.is_empty() {
                    Ok(value)
                } else {
                    Err(ValidationError::from_issues(issues))
                }
            }))
        }
    }

    pub(crate) fn pointer_segments(pointer: &str) -> Vec<PathSegment> {
        pointer
            .split('/')
            .skip(1)
            .filter(|segment| !segment.is_empty())
            .map(|segment| match segment.parse::<usize>() {
                Ok(index) => PathSegment::Index(index),
                Err(_) => PathSegment::Key(segment.replace("~1", "/").replace("~0", "~")),
            })
            .collect()
    }
}

/// A schema described by whichever functions it happens to expose.
///
/// Adapting it picks the first function present in the order `call`, `parse`, `validate_sync`,
/// `validate`, `create`. Adapting a shape with none of them fails with
/// [`AdapterError::UnsupportedShape`].
pub struct ParserShape<T> {
    call: Option<ParseFn<T>>,
    parse: Option<ParseFn<T>>,
    validate_sync: Option<ParseFn<T>>,
    validate: Option<ParseFn<T>>,
    create: Option<ParseFn<T>>,
}

impl<T> Default for ParserShape<T> {
    fn default() -> Self {
        Self {
            call: None,
            parse: None,
            validate_sync: None,
            validate: None,
            create: None,
        }
    }
}

impl<T> fmt::Debug for ParserShape<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserShape")
            .field("call", &self.call.is_some())
            .field("parse", &self.parse.is_some())
            .field("validate_sync", &self.validate_sync.is_some())
            .field("validate", &self.validate.is_some())
            .field("create", &self.create.is_some())
            .finish()
    }
}

fn parse_fn<T, E>(
    f: impl Fn(Value) -> Result<T, E> + Send + Sync + 'static,
) -> Option<ParseFn<T>>
where
    E: Into<ValidationError>,
{
    Some(Arc::new(move |value| f(value).map_err(Into::into)))
}

impl<T> ParserShape<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call<E: Into<ValidationError>>(
        mut self,
        f: impl Fn(Value) -> Result<T, E> + Send + Sync + 'static,
    ) -> Self {
        self.call = parse_fn(f);
        self
    }

    pub fn parse<E: Into<ValidationError>>(
        mut self,
        f: impl Fn(Value) -> Result<T, E> + Send + Sync + 'static,
    ) -> Self {
        self.parse = parse_fn(f);
        self
    }

    pub fn validate_sync<E: Into<ValidationError>>(
        mut self,
        f: impl Fn(Value) -> Result<T, E> + Send + Sync + 'static,
    ) -> Self {
        self.validate_sync = parse_fn(f);
        self
    }

    pub fn validate<E: Into<ValidationError>>(
        mut self,
        f: impl Fn(Value) -> Result<T, E> + Send + Sync + 'static,
    ) -> Self {
        self.validate = parse_fn(f);
        self
    }

    pub fn create<E: Into<ValidationError>>(
        mut self,
        f: impl Fn(Value) -> Result<T, E> + Send + Sync + 'static,
    ) -> Self {
        self.create = parse_fn(f);
        self
    }
}

#[doc(hidden)]
pub struct ShapeMarker;

impl<T> IntoParser<ShapeMarker> for ParserShape<T> {
    type Output = T;

    fn into_parser(self) -> Result<Parser<T>, AdapterError> {
        [
            (ParserKind::Callable, self.call),
            (ParserKind::Parse, self.parse),
            (ParserKind::ValidateSync, self.validate_sync),
            (ParserKind::Validate, self.validate),
            (ParserKind::Create, self.create),
        ]
        .into_iter()
        .find_map(|(kind, parse)| parse.map(|parse| Parser { kind, parse }))
        .ok_or(AdapterError::UnsupportedShape)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::{Issue, PathSegment};

    #[test]
    fn closure_is_callable() {
        let parser = (|value: Value| match value.as_str() {
            Some(s) => Ok(s.len()),
            None => Err("Expected string"),
        })
        .into_parser()
        .unwrap();

        assert_eq!(parser.kind(), ParserKind::Callable);
        assert_eq!(parser.parse(json!("abc")).unwrap(), 3);
        assert_eq!(
            parser.parse(json!(1)).unwrap_err().to_string(),
            "Expected string"
        );
    }

    #[test]
    fn shape_probes_in_priority_order() {
        let shape = ParserShape::new()
            .create(|_| Ok::<_, ValidationError>("create"))
            .validate(|_| Ok::<_, ValidationError>("validate"))
            .validate_sync(|_| Ok::<_, ValidationError>("validate_sync"));
        let parser = shape.into_parser().unwrap();
        assert_eq!(parser.kind(), ParserKind::ValidateSync);
        assert_eq!(parser.parse(Value::Null).unwrap(), "validate_sync");

        let shape = ParserShape::new()
            .create(|_| Ok::<_, ValidationError>(1))
            .parse(|_| Ok::<_, ValidationError>(2))
            .call(|_| Ok::<_, ValidationError>(3));
        assert_eq!(shape.into_parser().unwrap().kind(), ParserKind::Callable);

        let shape = ParserShape::new().create(|_| Ok::<_, ValidationError>(1));
        assert_eq!(shape.into_parser().unwrap().kind(), ParserKind::Create);
    }

    #[test]
    fn empty_shape_is_rejected() {
        let err = ParserShape::<Value>::new().into_parser().unwrap_err();
        assert_eq!(err, AdapterError::UnsupportedShape);
    }

    #[test]
    fn deserialized_reports_field() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Person {
            age: u32,
        }

        let parser = Deserialized::<Person>::new().into_parser().unwrap();
        assert_eq!(parser.kind(), ParserKind::Create);

        let err = parser.parse(json!({ "age": -1 })).unwrap_err();
        assert_eq!(err.issues()[0].field().as_deref(), Some("age"));
        assert_eq!(parser.parse(json!({ "age": 3 })).unwrap().age, 3);
    }

    #[test]
    fn erased_parser_serializes_output() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Count {
            count: u8,
        }

        let parser = Deserialized::<Count>::new().into_parser().unwrap().erase();
        assert_eq!(
            parser.parse(json!({ "count": 2, "extra": true })).unwrap(),
            json!({ "count": 2 })
        );
    }

    #[cfg(feature = "validator")]
    #[test]
    fn validated_runs_rules() {
        use validator::Validate;

        #[derive(Debug, Serialize, Deserialize, Validate)]
        struct Signup {
            #[validate(length(min = 1))]
            name: String,
            #[validate(range(min = 0))]
            age: i64,
        }

        let parser = Validated::<Signup>::new().into_parser().unwrap();
        assert_eq!(parser.kind(), ParserKind::ValidateSync);

        let err = parser.parse(json!({ "name": "", "age": -1 })).unwrap_err();
        let fields = err
            .issues()
            .iter()
            .filter_map(Issue::field)
            .collect::<Vec<_>>();
        assert_eq!(fields, vec!["age".to_string(), "name".to_string()]);

        assert!(parser.parse(json!({ "name": "x", "age": 1 })).is_ok());
    }

    #[cfg(feature = "jsonschema")]
    #[test]
    fn json_schema_paths() {
        let parser = JsonSchema::new(json!({
            "type": "object",
            "properties": {
                "tags": { "type": "array", "items": { "type": "string" } }
            }
        }))
        .into_parser()
        .unwrap();
        assert_eq!(parser.kind(), ParserKind::Validate);

        let err = parser.parse(json!({ "tags": ["a", 1] })).unwrap_err();
        assert_eq!(err.issues()[0].field().as_deref(), Some("tags.1"));
    }

    #[cfg(feature = "jsonschema")]
    #[test]
    fn broken_json_schema_fails_fast() {
        let err = JsonSchema::new(json!({ "type": 12 })).into_parser().unwrap_err();
        assert!(matches!(err, AdapterError::InvalidSchema(_)));
    }

    #[cfg(feature = "jsonschema")]
    #[test]
    fn pointer_unescapes() {
        assert_eq!(
            pointer_segments("/a~1b/0/c~0d"),
            vec![
                PathSegment::Key("a/b".into()),
                PathSegment::Index(0),
                PathSegment::Key("c~d".into()),
            ]
        );
        assert!(pointer_segments("").is_empty());
    }
}
