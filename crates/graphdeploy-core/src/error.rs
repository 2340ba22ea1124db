//! Error types for the reconciliation engine.
//!
//! Validation errors are raised before any mutating collaborator call is
//! issued. Provider errors are carried unchanged from the [`ResourceClient`]
//! that produced them.
//!
//! [`ResourceClient`]: crate::client::ResourceClient

use std::fmt;

use crate::client::ResourceKind;
use crate::state::StateError;

/// Where a resolver definition was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverOrigin {
    /// The code resolver module shipped with the source bundle.
    Code,
    /// The `resolvers` table of the desired state.
    Config,
}

impl fmt::Display for ResolverOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code => write!(f, "the resolver module"),
            Self::Config => write!(f, "the resolvers configuration"),
        }
    }
}

/// Error surfaced by a [`ResourceClient`](crate::client::ResourceClient) call.
///
/// The reconciler never inspects these beyond logging; they abort the run
/// and propagate to the caller as [`DeployError::Provider`].
#[derive(Debug, thiserror::Error)]
#[error("{kind} {operation} failed: {message}")]
pub struct ProviderError {
    /// Resource kind the call was addressed to.
    pub kind: ResourceKind,
    /// Operation name (`deploy`, `remove`).
    pub operation: String,
    /// Provider supplied description.
    pub message: String,
}

impl ProviderError {
    /// Creates a new provider error.
    pub fn new(kind: ResourceKind, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Errors produced by deploy and remove runs.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Credentials not found. Configure provider credentials before deploying")]
    CredentialsMissing,

    #[error("No source bundle was supplied and the source policy requires one")]
    MissingSource,

    #[error("The \"{filename}\" file was not found in your source directory")]
    MissingSchemaFile { filename: String },

    #[error("The \"{filename}\" resolver module was not found in your source directory")]
    MissingResolverFile { filename: String },

    #[error("{}", shape_message(.origin, .type_name, .field_name.as_deref(), .expected))]
    InvalidResolverShape {
        origin: ResolverOrigin,
        type_name: String,
        field_name: Option<String>,
        expected: String,
    },

    #[error("Missing request property for resolver \"{type_name}.{field_name}\"")]
    MissingRequestTemplate {
        type_name: String,
        field_name: String,
    },

    #[error(
        "Resolver \"{type_name}.{field_name}\" is declared both in the resolver module and in the resolvers configuration"
    )]
    ConflictingResolver {
        type_name: String,
        field_name: String,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("State store error: {0}")]
    State(#[from] StateError),

    #[error("Source error: {message}")]
    Source { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn shape_message(
    origin: &ResolverOrigin,
    type_name: &str,
    field_name: Option<&str>,
    expected: &str,
) -> String {
    match field_name {
        Some(field) => format!("resolver \"{type_name}.{field}\" in {origin} must be {expected}"),
        None => format!("resolver type \"{type_name}\" in {origin} must be {expected}"),
    }
}

impl DeployError {
    /// Create a new MissingSchemaFile error
    pub fn missing_schema_file(filename: impl Into<String>) -> Self {
        Self::MissingSchemaFile {
            filename: filename.into(),
        }
    }

    /// Create a new MissingResolverFile error
    pub fn missing_resolver_file(filename: impl Into<String>) -> Self {
        Self::MissingResolverFile {
            filename: filename.into(),
        }
    }

    /// Create an InvalidResolverShape error for a type entry
    pub fn invalid_type_shape(
        origin: ResolverOrigin,
        type_name: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidResolverShape {
            origin,
            type_name: type_name.into(),
            field_name: None,
            expected: expected.into(),
        }
    }

    /// Create an InvalidResolverShape error for a field entry
    pub fn invalid_field_shape(
        origin: ResolverOrigin,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidResolverShape {
            origin,
            type_name: type_name.into(),
            field_name: Some(field_name.into()),
            expected: expected.into(),
        }
    }

    /// Create a new MissingRequestTemplate error
    pub fn missing_request_template(
        type_name: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self::MissingRequestTemplate {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }

    /// Create a new ConflictingResolver error
    pub fn conflicting_resolver(
        type_name: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self::ConflictingResolver {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }

    /// Create a new Source error
    pub fn source_error(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Returns `true` for errors raised by the validation pass.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidResolverShape { .. }
            | Self::MissingRequestTemplate { .. }
            | Self::ConflictingResolver { .. } => ErrorCategory::Validation,
            Self::CredentialsMissing
            | Self::MissingSource
            | Self::MissingSchemaFile { .. }
            | Self::MissingResolverFile { .. } => ErrorCategory::Configuration,
            Self::Provider(_) => ErrorCategory::Provider,
            Self::State(_) => ErrorCategory::State,
            Self::Source { .. } | Self::Io(_) => ErrorCategory::Io,
        }
    }
}

/// Categories of deploy errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Resolver definitions failed validation.
    Validation,
    /// Credentials or source files are missing.
    Configuration,
    /// A collaborator call failed.
    Provider,
    /// Loading or saving converged state failed.
    State,
    /// Working directory access failed.
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Configuration => write!(f, "configuration"),
            Self::Provider => write!(f, "provider"),
            Self::State => write!(f, "state"),
            Self::Io => write!(f, "io"),
        }
    }
}

/// Result type for deploy operations.
pub type Result<T> = std::result::Result<T, DeployError>;
