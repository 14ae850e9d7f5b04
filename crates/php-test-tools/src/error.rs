//! Error types for the test tools.

use php_runtime_host::{CompileError, HostError, ParseError, ServiceError};

/// Errors setting up runtimes and environments.
#[derive(Debug, thiserror::Error)]
pub enum ToolsError {
    #[error("Service setup failed: {0}")]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Errors turning PHP source into a module.
///
/// Parser and compiler errors are passed through untouched so tests can
/// assert on them directly.
#[derive(Debug, thiserror::Error)]
pub enum TranspileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Evaluate(#[from] HostError),

    #[error("Compiler returned no source map although one was requested")]
    MissingSourceMap,

    #[error("Runtime unavailable: {0}")]
    Runtime(#[from] ToolsError),
}

/// Errors normalising a stack trace.
#[derive(Debug, thiserror::Error)]
pub enum NormaliseError {
    #[error(
        "No source map registered for this module: \
         transpile it with source maps enabled before normalising its stacks"
    )]
    SourceMapNotRegistered,

    #[error("Failed to map generated position {line}:{column} of frame `{frame}`")]
    UnmappableFrame {
        frame: String,
        line: u32,
        column: u32,
    },

    #[error("Header probe stack has no evaluated frame: {probe}")]
    HeaderProbeFailed { probe: String },

    #[error("Failed to decode source map: {0}")]
    Decode(#[source] anyhow::Error),
}

/// Errors loading tool configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParseError(#[from] toml::de::Error),
}
