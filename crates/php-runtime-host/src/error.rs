//! Error types shared across the host boundary.

/// An error raised by PHP code while it runs.
///
/// Carries the stack captured by the host at the raise site, in the host's
/// textual frame format.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct PhpError {
    pub message: String,
    pub stack: String,
}

impl PhpError {
    pub fn new(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: stack.into(),
        }
    }
}

/// A PHP syntax error reported by the parser.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("PHP Parse error: {message} in {} on line {line}", .path.as_deref().unwrap_or("(program)"))]
pub struct ParseError {
    pub message: String,
    pub path: Option<String>,
    pub line: u32,
}

/// A failure reported by the PHP-to-target compiler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Compile error: {message}")]
pub struct CompileError {
    pub message: String,
}

/// Failures reported by the host runtime.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Evaluation of generated code failed: {0}")]
    Evaluation(String),

    #[error("Environment creation failed: {0}")]
    Environment(String),
}

/// Errors from the service container.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("Service '{0}' is already defined and overrides are not allowed")]
    AlreadyDefined(String),

    #[error("Service '{0}' is not defined")]
    NotFound(String),

    #[error("Service '{0}' has an unexpected type")]
    WrongType(String),
}
