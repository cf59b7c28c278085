use std::fmt;

/// An error raised by a schema-graph operation: adding or removing a node,
/// looking up a name, or resolving a field's named type reference.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

#[derive(Debug)]
enum ErrorKind {
    TypeError {
        message: String,
    },
    DuplicateName {
        parent: String,
        name: String,
    },
    NotFound {
        parent: String,
        name: String,
    },
    Resolve {
        field: String,
        type_name: String,
    },
    InvalidName {
        name: String,
        reason: &'static str,
    },
}

impl Error {
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::TypeError {
                message: message.into(),
            },
        }
    }

    pub(crate) fn duplicate_name(parent: impl ToString, name: impl ToString) -> Self {
        Error {
            kind: ErrorKind::DuplicateName {
                parent: parent.to_string(),
                name: name.to_string(),
            },
        }
    }

    pub(crate) fn not_found(parent: impl ToString, name: impl ToString) -> Self {
        Error {
            kind: ErrorKind::NotFound {
                parent: parent.to_string(),
                name: name.to_string(),
            },
        }
    }

    pub(crate) fn resolve(field: impl ToString, type_name: impl ToString) -> Self {
        Error {
            kind: ErrorKind::Resolve {
                field: field.to_string(),
                type_name: type_name.to_string(),
            },
        }
    }

    pub(crate) fn invalid_name(name: impl ToString, reason: &'static str) -> Self {
        Error {
            kind: ErrorKind::InvalidName {
                name: name.to_string(),
                reason,
            },
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::TypeError { message } => write!(f, "{}", message),
            ErrorKind::DuplicateName { parent, name } => write!(
                f,
                "'{}' already has a child named '{}'",
                parent, name
            ),
            ErrorKind::NotFound { parent, name } => {
                write!(f, "'{}' has no child named '{}'", parent, name)
            }
            ErrorKind::Resolve { field, type_name } => write!(
                f,
                "field '{}' references unknown type '{}'",
                field, type_name
            ),
            ErrorKind::InvalidName { name, reason } => {
                write!(f, "'{}' is not a valid name: {}", name, reason)
            }
        }
    }
}

/// An error raised while encoding a message instance to the wire format.
#[derive(Debug)]
pub struct EncodeError {
    kind: EncodeErrorKind,
}

#[derive(Debug)]
enum EncodeErrorKind {
    NotRepresentable { field: String, reason: String },
    Unresolved { field: String },
}

impl EncodeError {
    pub(crate) fn not_representable(field: impl ToString, reason: impl Into<String>) -> Self {
        EncodeError {
            kind: EncodeErrorKind::NotRepresentable {
                field: field.to_string(),
                reason: reason.into(),
            },
        }
    }

    pub(crate) fn unresolved(field: impl ToString) -> Self {
        EncodeError {
            kind: EncodeErrorKind::Unresolved {
                field: field.to_string(),
            },
        }
    }
}

impl std::error::Error for EncodeError {}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EncodeErrorKind::NotRepresentable { field, reason } => {
                write!(f, "field '{}' cannot be encoded: {}", field, reason)
            }
            EncodeErrorKind::Unresolved { field } => write!(
                f,
                "field '{}' was encoded before its type was resolved",
                field
            ),
        }
    }
}
