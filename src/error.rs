use std::{borrow::Cow, error, fmt};

use serde::Serialize;
use thiserror::Error;

/// The error type returned by handler callbacks once it has been type erased.
pub type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// A parser could not be adapted.
///
/// This is raised while the route is being constructed, never while a request is being served.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AdapterError {
    #[error(
        "unsupported parser shape: expected a callable or an object exposing one of \
         `parse`, `validate_sync`, `validate` or `create`"
    )]
    UnsupportedShape,
    #[error("invalid JSON schema: {0}")]
    InvalidSchema(String),
}

/// Which part of the request a [`ValidationError`] was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Query,
    Body,
}

/// One step into a nested value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// A single problem found by a parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl Issue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
        }
    }

    pub fn at<P: Into<PathSegment>>(
        path: impl IntoIterator<Item = P>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }

    /// The path joined with `.`, or `None` if the issue concerns the whole value.
    pub fn field(&self) -> Option<String> {
        if self.path.is_empty() {
            return None;
        }

        Some(
            self.path
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("."),
        )
    }
}

/// A rejection produced by one parser invocation.
///
/// Whatever the native error of the schema library was, it ends up as one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) location: Option<Location>,
    pub(crate) issues: Vec<Issue>,
}

impl ValidationError {
    /// A rejection of the whole value.
    pub fn new(message: impl Into<String>) -> Self {
        Self::from_issues([Issue::new(message)])
    }

    pub fn from_issues(issues: impl IntoIterator<Item = Issue>) -> Self {
        let mut issues = issues.into_iter().collect::<Vec<_>>();
        if issues.is_empty() {
            issues.push(Issue::new("Invalid input"));
        }

        Self {
            location: None,
            issues,
        }
    }

    /// A rejection of a single field.
    pub fn field<P: Into<PathSegment>>(
        path: impl IntoIterator<Item = P>,
        message: impl Into<String>,
    ) -> Self {
        Self::from_issues([Issue::at(path, message)])
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    pub(crate) fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub(crate) fn from_path_error(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let mut path = err
            .path()
            .iter()
            .filter_map(|segment| match segment {
                serde_path_to_error::Segment::Seq { index } => Some(PathSegment::Index(*index)),
                serde_path_to_error::Segment::Map { key } => Some(PathSegment::Key(key.clone())),
                serde_path_to_error::Segment::Enum { variant } => {
                    Some(PathSegment::Key(variant.clone()))
                }
                serde_path_to_error::Segment::Unknown => None,
            })
            .collect::<Vec<_>>();
        let message = clean_serde_message(&err.into_inner());

        // A missing field is reported against its parent, point at the field itself instead.
        if let Some(field) = message
            .strip_prefix("missing field `")
            .and_then(|rest| rest.strip_suffix('`'))
        {
            path.push(PathSegment::Key(field.to_owned()));
        }

        Self::from_issues([Issue { path, message }])
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i != 0 {
                f.write_str("; ")?;
            }

            match issue.field() {
                Some(field) => write!(f, "{field}: {}", issue.message)?,
                None => f.write_str(&issue.message)?,
            }
        }

        Ok(())
    }
}

impl error::Error for ValidationError {}

impl From<String> for ValidationError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ValidationError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<Cow<'_, str>> for ValidationError {
    fn from(message: Cow<'_, str>) -> Self {
        Self::new(message.into_owned())
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(clean_serde_message(&err))
    }
}

impl From<Issue> for ValidationError {
    fn from(issue: Issue) -> Self {
        Self::from_issues([issue])
    }
}

// `serde_json` appends " at line 1 column 2" which is meaningless for already parsed values.
fn clean_serde_message(err: &serde_json::Error) -> String {
    let message = err.to_string();
    match message.rfind(" at line ") {
        Some(idx) if err.line() != 0 => message[..idx].to_owned(),
        _ => message,
    }
}
