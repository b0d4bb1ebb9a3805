//! Stable error codes for every crate in the workspace.
//!
//! Callers discriminate failures by [`ErrorCode`] rather than matching on
//! message text. Each per-domain error enum below implements
//! [`CodedError`] and converts into the aggregate [`StacksError`] via
//! `#[from]` for binary-level call sites.

use thiserror::Error;

/// A stable string discriminant, stable across error message wording changes.
pub trait CodedError {
    fn code(&self) -> &'static str;
}

/// Caller-contract violations, recoverable failures, and fatal failures for
/// the vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("text must not be empty")]
    EmptyText,
    #[error("embedding must not be empty")]
    EmptyEmbedding,
    #[error("store is not loaded")]
    NotLoaded,
    #[error("store backend signaled a decoding failure: {0}")]
    Corrupt(String),
    #[error("store backend I/O failure: {0}")]
    Io(String),
    #[error("store operation failed: {0}")]
    Other(String),
}

impl CodedError for StoreError {
    fn code(&self) -> &'static str {
        match self {
            StoreError::EmptyText => "STACKS_EMPTY_TEXT",
            StoreError::EmptyEmbedding => "STACKS_EMPTY_EMBEDDING",
            StoreError::NotLoaded => "STACKS_NOT_LOADED",
            StoreError::Corrupt(_) => "STACKS_CORRUPT",
            StoreError::Io(_) => "STACKS_IO",
            StoreError::Other(_) => "STACKS_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("embedding provider failed: {0}")]
    Embedding(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("library operation failed: {0}")]
    Other(String),
}

impl CodedError for LibraryError {
    fn code(&self) -> &'static str {
        match self {
            LibraryError::Embedding(_) => "EMBEDDING_ERROR",
            LibraryError::Store(inner) => inner.code(),
            LibraryError::Other(_) => "LIBRARY_ERROR",
        }
    }
}

/// Reserved for a future chain-of-steps component. No chain subsystem is
/// implemented; these variants exist solely so the §6.3 taxonomy is
/// complete and constructible by callers that expect the codes to exist.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain has no steps")]
    Empty,
    #[error("chain step failed: {0}")]
    StepFailed(String),
    #[error("chain not found: {0}")]
    NotFound(String),
}

impl CodedError for ChainError {
    fn code(&self) -> &'static str {
        match self {
            ChainError::Empty => "CHAIN_EMPTY",
            ChainError::StepFailed(_) => "CHAIN_STEP_ERROR",
            ChainError::NotFound(_) => "CHAIN_NOT_FOUND",
        }
    }
}

/// Reserved for a future template-rendering component, same rationale as
/// [`ChainError`].
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template is empty")]
    Empty,
    #[error("template is missing variables: {0:?}")]
    MissingVariables(Vec<String>),
}

impl CodedError for TemplateError {
    fn code(&self) -> &'static str {
        match self {
            TemplateError::Empty => "TEMPLATE_EMPTY",
            TemplateError::MissingVariables(_) => "TEMPLATE_MISSING_VARIABLES",
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),
}

impl CodedError for ToolError {
    fn code(&self) -> &'static str {
        match self {
            ToolError::NotFound(_) => "TOOL_NOT_FOUND",
            ToolError::ExecutionFailed(_) => "TOOL_EXECUTION_ERROR",
        }
    }
}

/// Aggregate error type for binary-level call sites that need a single
/// `Result` alias across subsystems.
#[derive(Debug, Error)]
pub enum StacksError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl CodedError for StacksError {
    fn code(&self) -> &'static str {
        match self {
            StacksError::Store(e) => e.code(),
            StacksError::Library(e) => e.code(),
            StacksError::Chain(e) => e.code(),
            StacksError::Template(e) => e.code(),
            StacksError::Tool(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_codes_match_taxonomy() {
        assert_eq!(StoreError::EmptyText.code(), "STACKS_EMPTY_TEXT");
        assert_eq!(StoreError::EmptyEmbedding.code(), "STACKS_EMPTY_EMBEDDING");
        assert_eq!(StoreError::NotLoaded.code(), "STACKS_NOT_LOADED");
        assert_eq!(StoreError::Corrupt("x".into()).code(), "STACKS_CORRUPT");
        assert_eq!(StoreError::Io("x".into()).code(), "STACKS_IO");
        assert_eq!(StoreError::Other("x".into()).code(), "STACKS_ERROR");
    }

    #[test]
    fn library_error_delegates_store_code() {
        let e: LibraryError = StoreError::EmptyText.into();
        assert_eq!(e.code(), "STACKS_EMPTY_TEXT");
    }

    #[test]
    fn aggregate_error_preserves_code() {
        let e: StacksError = ToolError::NotFound("grep".into()).into();
        assert_eq!(e.code(), "TOOL_NOT_FOUND");
    }
}
