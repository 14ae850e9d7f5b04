//! Transpile-and-load: PHP source text to an invokable [`Module`].

use std::sync::Arc;

use php_runtime_host::{
    CodeEvaluator, CompilerOptions, ModuleOptions, ParserOptions, PhpCompiler, PhpParser, Runtime,
    SourceMapDecoder, SourceMapRequest,
};

use crate::error::TranspileError;
use crate::module::Module;
use crate::registry::{SourceMapEntry, SourceMapRegistry};

/// Prefix making the generated code evaluate to its module factory.
pub const RETURN_PREFIX: &str = "return ";

/// The external stages used to build and inspect modules.
#[derive(Clone)]
pub struct Toolchain {
    pub parser: Arc<dyn PhpParser>,
    pub compiler: Arc<dyn PhpCompiler>,
    pub evaluator: Arc<dyn CodeEvaluator>,
    pub source_maps: Arc<dyn SourceMapDecoder>,
}

/// Per-call transpilation options.
#[derive(Debug, Clone, Default)]
pub struct TranspileOptions {
    /// Generate a source map and register it for stack normalisation.
    pub source_map: bool,
    /// Extra module-level configuration bound onto the module.
    pub module: ModuleOptions,
}

impl TranspileOptions {
    pub fn with_source_map() -> Self {
        Self {
            source_map: true,
            ..Self::default()
        }
    }
}

/// Turns PHP source into modules bound to a runtime.
pub struct Transpiler {
    toolchain: Toolchain,
    registry: Arc<SourceMapRegistry>,
}

impl Transpiler {
    pub fn new(toolchain: Toolchain, registry: Arc<SourceMapRegistry>) -> Self {
        Self { toolchain, registry }
    }

    /// Parse, compile and evaluate `php` against `runtime`.
    ///
    /// Parser and compiler errors are returned as-is.
    pub fn transpile(
        &self,
        runtime: Arc<dyn Runtime>,
        path: Option<&str>,
        php: &str,
        options: &TranspileOptions,
    ) -> Result<Module, TranspileError> {
        let ast = self.toolchain.parser.parse(
            php,
            &ParserOptions {
                capture_all_bounds: true,
                path: path.map(str::to_string),
            },
        )?;

        let output = self.toolchain.compiler.transpile(
            &ast,
            &CompilerOptions {
                mode: runtime.mode(),
                line_numbers: true,
                path: path.map(str::to_string),
                prefix: RETURN_PREFIX.to_string(),
                source_map: options.source_map.then(|| SourceMapRequest {
                    source_content: php.to_string(),
                    return_map: true,
                }),
            },
        )?;

        let map = match (options.source_map, output.map) {
            (true, Some(map)) => Some(map),
            (true, None) => return Err(TranspileError::MissingSourceMap),
            (false, _) => None,
        };

        let factory = self.toolchain.evaluator.evaluate(&output.code, runtime)?;
        let mut module = Module::new(factory);

        let mut bound = options.module.clone();
        if let Some(path) = path {
            bound.path = Some(path.to_string());
        }
        if bound != ModuleOptions::default() {
            module = module.using(bound);
        }

        if let Some(map) = map {
            self.registry.insert(
                &module,
                SourceMapEntry {
                    map,
                    path: path.map(str::to_string),
                },
            );
            tracing::debug!(path = ?path, "Registered source map");
        }

        tracing::debug!(path = ?path, source_map = options.source_map, "Transpiled module");
        Ok(module)
    }
}
