//! Error types for sensorthings operations.

use uuid::Uuid;

use crate::EntityKind;

/// Upper bound on how much of an offending document is echoed back in a message.
const MAX_DOCUMENT_RENDERING: usize = 512;

/// A structurally or semantically invalid input document.
///
/// Carries the offending field (when one is known) and a rendering of the
/// document it was found in, so a caller can report exactly what was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {}: {reason} in {document}", .field.as_deref().unwrap_or("document"))]
pub struct InvalidError {
    /// The field that failed validation, if the failure is field-specific.
    pub field: Option<String>,
    /// Human-readable description of the failure.
    pub reason: String,
    /// The literal document (or cell) that was being validated.
    pub document: String,
}

impl InvalidError {
    /// Creates an error naming `field` within `document`.
    pub fn field(
        field: impl Into<String>,
        reason: impl Into<String>,
        document: &impl std::fmt::Display,
    ) -> Self {
        InvalidError {
            field: Some(field.into()),
            reason: reason.into(),
            document: render(document),
        }
    }

    /// Creates an error about the document as a whole.
    pub fn document(reason: impl Into<String>, document: &impl std::fmt::Display) -> Self {
        InvalidError {
            field: None,
            reason: reason.into(),
            document: render(document),
        }
    }

    /// Creates an error for a required field that is absent.
    pub fn missing(field: impl Into<String>, document: &impl std::fmt::Display) -> Self {
        let field = field.into();
        let reason = format!("missing required field {}", field);
        InvalidError::field(field, reason, document)
    }
}

fn render(document: &impl std::fmt::Display) -> String {
    let mut rendered = document.to_string();
    if rendered.len() > MAX_DOCUMENT_RENDERING {
        let mut cut = MAX_DOCUMENT_RENDERING;
        while !rendered.is_char_boundary(cut) {
            cut -= 1;
        }
        rendered.truncate(cut);
        rendered.push_str("...");
    }
    rendered
}

/// A string that is neither a valid ISO-8601 instant nor a valid interval.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot parse {input:?} as {expected}")]
pub struct TimeParseError {
    /// The text that failed to parse.
    pub input: String,
    /// What the parser was looking for ("instant", "interval", ...).
    pub expected: &'static str,
}

impl From<TimeParseError> for InvalidError {
    fn from(err: TimeParseError) -> Self {
        let reason = err.to_string();
        InvalidError::document(reason, &err.input)
    }
}

impl From<TimeParseError> for Error {
    fn from(err: TimeParseError) -> Self {
        Error::Invalid(err.into())
    }
}

/// Errors that can occur during data store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataStoreError {
    /// The requested entity was not found in the data store.
    #[error("{kind} {id} not found")]
    NotFound {
        /// The kind that was looked up.
        kind: EntityKind,
        /// The identifier that was looked up.
        id: Uuid,
    },
    /// An entity with the same identifier already exists.
    #[error("{kind} {id} already exists")]
    AlreadyExists {
        /// The kind being created.
        kind: EntityKind,
        /// The conflicting identifier.
        id: Uuid,
    },
    /// An internal storage system error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Every failure a create, update, or ingest call can surface to its caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The input document was rejected.
    #[error(transparent)]
    Invalid(#[from] InvalidError),
    /// The persistence collaborator failed; `NotFound` is passed through unchanged.
    #[error(transparent)]
    Store(#[from] DataStoreError),
}

impl Error {
    /// True when this is a missing related or target entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Store(DataStoreError::NotFound { .. }))
    }
}
