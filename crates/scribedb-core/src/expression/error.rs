//! Error type for expression translation.

/// Errors produced while translating an expression AST.
///
/// These represent schema or programming mistakes, not transient failures;
/// none are retried internally and all propagate unchanged to the caller.
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    /// A referenced property is absent from the supplied schema.
    #[error("Property '{property}' is not mapped on entity '{entity}'")]
    UnmappedProperty {
        /// The logical property name.
        property: String,
        /// The entity (table) the schema describes.
        entity: String,
    },

    /// A key-only condition referenced a non-key property.
    #[error(
        "Property '{property}' is not a partition or sort key; move this condition to a filter expression"
    )]
    InvalidKeyExpression {
        /// The offending property name.
        property: String,
    },

    /// An operator, method, or property use outside the recognized set.
    #[error("Unsupported expression: {construct}")]
    UnsupportedExpression {
        /// Description naming the offending construct.
        construct: String,
    },

    /// An update binding targets a property that must not be mutated.
    #[error("Invalid update operation on property '{property}': {reason}")]
    InvalidUpdateOperation {
        /// The offending property name.
        property: String,
        /// Why the mutation is rejected.
        reason: String,
    },

    /// The AST has an unexpected shape, or a deferred caller-supplied
    /// evaluation failed.
    #[error("Translation failed: {message}")]
    TranslationFailure {
        /// Explanation.
        message: String,
        /// The caller's error, when a deferred evaluation failed.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A format specifier is invalid for the property's declared type.
    #[error("Invalid format '{format}' for property '{property}' of type {value_type}")]
    FormatError {
        /// The offending format string.
        format: String,
        /// The property carrying the format.
        property: String,
        /// The property's declared type name.
        value_type: &'static str,
    },

    /// A function or marker node is missing a required argument.
    #[error("Missing required argument for {operation}")]
    NullArgument {
        /// The operation whose argument is missing.
        operation: String,
    },
}

impl TranslationError {
    /// Unsupported-expression error naming the offending construct.
    #[must_use]
    pub fn unsupported(construct: impl Into<String>) -> Self {
        Self::UnsupportedExpression {
            construct: construct.into(),
        }
    }

    /// Translation failure with a plain message and no source.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::TranslationFailure {
            message: message.into(),
            source: None,
        }
    }
}
