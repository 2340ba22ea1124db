/// Error returned by a resolver handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ResolverError {
    pub message: String,
}

impl ResolverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors produced while routing an invocation to its resolver.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("The \"resolvers.json\" file was not found in your source directory")]
    ModuleMissing,

    #[error("The \"{type_name}\" type is not exported in resolvers.json")]
    TypeNotExported { type_name: String },

    #[error("Resolver \"{field_name}\" for type \"{type_name}\" is not exported in resolvers.json")]
    FieldNotExported {
        type_name: String,
        field_name: String,
    },

    #[error("Resolver \"{field_name}\" for type \"{type_name}\" must be a function")]
    NotInvocable {
        type_name: String,
        field_name: String,
    },

    #[error("Invalid resolver event: {0}")]
    InvalidEvent(#[from] serde_json::Error),

    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

impl DispatchError {
    pub fn type_not_exported(type_name: impl Into<String>) -> Self {
        Self::TypeNotExported {
            type_name: type_name.into(),
        }
    }

    pub fn field_not_exported(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self::FieldNotExported {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }

    pub fn not_invocable(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self::NotInvocable {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }
}
