//! Parser, compiler, evaluator and source-map decoder seams.
//!
//! These are the external stages between PHP text and an invokable module.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, HostError, ParseError};
use crate::mode::Mode;
use crate::runtime::{ModuleFactory, Runtime};

/// Parsed PHP syntax tree, as produced by the parser.
pub type Ast = serde_json::Value;

/// Raw source-map data, as produced by the compiler.
pub type SourceMapData = serde_json::Value;

/// Parser options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParserOptions {
    /// Record full start/end bounds on every node.
    pub capture_all_bounds: bool,
    /// Logical path, stored in parser state for error messages.
    pub path: Option<String>,
}

/// Compiler options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerOptions {
    /// Mode of the runtime the code will be bound to.
    pub mode: Mode,
    /// Emit line-number tracking code.
    pub line_numbers: bool,
    /// Logical path propagated into the generated code.
    pub path: Option<String>,
    /// Text emitted before the generated code.
    pub prefix: String,
    /// Request a source map alongside the code.
    pub source_map: Option<SourceMapRequest>,
}

/// Source-map generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMapRequest {
    /// Original PHP text, embedded into the map.
    pub source_content: String,
    /// Return the map together with the code.
    pub return_map: bool,
}

/// Compiler output.
#[derive(Debug, Clone, PartialEq)]
pub struct TranspileOutput {
    pub code: String,
    /// Present when a map was requested with `return_map`.
    pub map: Option<SourceMapData>,
}

/// Parses PHP source text.
pub trait PhpParser: Send + Sync {
    fn parse(&self, source: &str, options: &ParserOptions) -> Result<Ast, ParseError>;
}

/// Compiles a PHP syntax tree to target code.
pub trait PhpCompiler: Send + Sync {
    fn transpile(&self, ast: &Ast, options: &CompilerOptions) -> Result<TranspileOutput, CompileError>;
}

/// Evaluates generated code.
pub trait CodeEvaluator: Send + Sync {
    /// Evaluate `code` in a scope whose only capability is `runtime`.
    ///
    /// The code was compiled with a return-oriented prefix; the value it
    /// returns is the module factory.
    fn evaluate(&self, code: &str, runtime: Arc<dyn Runtime>) -> Result<Arc<dyn ModuleFactory>, HostError>;

    /// Evaluate a snippet that raises on its first line and return the
    /// captured stack.
    ///
    /// Frames of evaluated code report line numbers shifted by the header
    /// lines the evaluator wraps code in; this probe exposes that shift.
    fn probe_stack(&self) -> String;
}

/// Position in the original source, `None` where unmappable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: Option<String>,
    /// 1-based line.
    pub line: Option<u32>,
    /// 0-based column.
    pub column: Option<u32>,
}

/// Decodes source maps.
#[async_trait]
pub trait SourceMapDecoder: Send + Sync {
    async fn consume(&self, map: &SourceMapData) -> anyhow::Result<Box<dyn SourceMapConsumer>>;
}

/// A decoded source map.
pub trait SourceMapConsumer: Send + Sync {
    /// Look up a generated position (1-based line, 0-based column).
    fn original_position_for(&self, line: u32, column: u32) -> OriginalPosition;
}
