use serde_json::{Map, Value};

use crate::ValidationError;

/// Key used for issues which don't point at a specific field.
pub const PARENT_KEY: &str = "parent";

/// Turns the validation errors collected for a request into the `errors` field of the `422`
/// response.
///
/// Any `Fn(&[ValidationError]) -> Value` is an error formatter.
pub trait ErrorFormatter: Send + Sync + 'static {
    fn format(&self, errors: &[ValidationError]) -> Value;
}

impl<F> ErrorFormatter for F
where
    F: Fn(&[ValidationError]) -> Value + Send + Sync + 'static,
{
    fn format(&self, errors: &[ValidationError]) -> Value {
        (self)(errors)
    }
}

/// The default formatter.
///
/// Produces one object per failed parser, mapping each field path to its message:
///
/// ```json
/// [{ "userId": "Invalid uuid" }, { "age": "Number must be greater than or equal to 0" }]
/// ```
///
/// Several messages for the same field of one error are joined with `", "`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldFormatter;

impl ErrorFormatter for FieldFormatter {
    fn format(&self, errors: &[ValidationError]) -> Value {
        Value::Array(
            errors
                .iter()
                .map(|error| {
                    let mut fields = Map::new();
                    for issue in error.issues() {
                        let key = issue.field().unwrap_or_else(|| PARENT_KEY.to_owned());
                        match fields.get_mut(&key) {
                            Some(Value::String(existing)) => {
                                existing.push_str(", ");
                                existing.push_str(&issue.message);
                            }
                            _ => {
                                fields.insert(key, Value::String(issue.message.clone()));
                            }
                        }
                    }
                    Value::Object(fields)
                })
                .collect(),
        )
    }
}

/// Merges every error into a single object, later duplicate fields overwrite earlier ones.
///
/// Returns `null` when there are no errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergedFormatter;

impl ErrorFormatter for MergedFormatter {
    fn format(&self, errors: &[ValidationError]) -> Value {
        if errors.is_empty() {
            return Value::Null;
        }

        let mut fields = Map::new();
        for issue in errors.iter().flat_map(ValidationError::issues) {
            fields.insert(
                issue.field().unwrap_or_else(|| PARENT_KEY.to_owned()),
                Value::String(issue.message.clone()),
            );
        }
        Value::Object(fields)
    }
}
