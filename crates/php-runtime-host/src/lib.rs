//! PHP Runtime Host Contract
//!
//! This crate describes the embedded PHP runtime as seen by test tooling.
//! The runtime itself, the PHP parser, the PHP-to-target compiler and the
//! source-map decoder all live elsewhere; they plug in by implementing the
//! traits defined here.
//!
//! # Architecture
//!
//! - A runtime is created per [`Mode`] by a [`RuntimeProvider`]
//! - Each runtime owns a [`ServiceContainer`] of named, swappable services
//! - The lowest-level primitive is the [`OpcodeExecutor`] service, whose
//!   results come in the shapes of [`OpcodeResult`]
//! - Asynchronous completion is modelled by [`Deferred`]

pub mod deferred;
pub mod error;
pub mod mode;
pub mod opcode;
pub mod runtime;
pub mod services;
pub mod toolchain;

pub use deferred::{Deferred, Outcome};
pub use error::{CompileError, HostError, ParseError, PhpError, ServiceError};
pub use mode::Mode;
pub use opcode::{Opcode, OpcodeExecutor, OpcodeResult, Reference, ReferenceHandle};
pub use runtime::{
    Addon, Environment, EnvironmentOptions, ModuleFactory, ModuleOptions, Runtime,
    RuntimeProvider, ServiceGroup,
};
pub use services::ServiceContainer;
pub use toolchain::{
    Ast, CodeEvaluator, CompilerOptions, OriginalPosition, ParserOptions, PhpCompiler, PhpParser,
    SourceMapConsumer, SourceMapData, SourceMapDecoder, SourceMapRequest, TranspileOutput,
};

/// Runtime values exchanged across the host boundary.
pub type Value = serde_json::Value;
