//! PHP Test Tools
//!
//! Harness used by integration tests of an embedded PHP runtime. It turns
//! PHP source text into invokable modules bound to a runtime of a chosen
//! [`Mode`](php_runtime_host::Mode), and turns the raw stacks those modules
//! raise into stable text that can be compared against fixtures.
//!
//! # Architecture
//!
//! - [`RuntimeFactory`] memoises one runtime per mode and applies hooks to
//!   every runtime it creates
//! - [`Transpiler`] runs the parse, compile and evaluate stages of a
//!   [`Toolchain`] and records each module's source map in a
//!   [`SourceMapRegistry`]
//! - [`StackNormaliser`] maps evaluated frames back to PHP positions and
//!   folds away test-runner and platform noise
//! - [`TestTools`] is the facade tests use

pub mod config;
pub mod error;
pub mod factory;
pub mod forced_async;
pub mod module;
pub mod registry;
pub mod stack;
pub mod tools;
pub mod transpile;

#[cfg(test)]
mod fixtures;

pub use config::{NormaliseConfig, ToolsConfig};
pub use error::{ConfigError, NormaliseError, ToolsError, TranspileError};
pub use factory::{InitHook, RuntimeFactory};
pub use forced_async::{install_forced_async_opcode_hook, DeferredReference, ForcedAsyncExecutor};
pub use module::Module;
pub use registry::{SourceMapEntry, SourceMapRegistry};
pub use stack::StackNormaliser;
pub use tools::{create_test_tools, TestTools, TestToolsBuilder};
pub use transpile::{Toolchain, TranspileOptions, Transpiler, RETURN_PREFIX};
