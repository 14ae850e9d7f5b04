//! The test tools facade handed to integration tests.

use std::sync::{Arc, OnceLock};

use php_runtime_host::{Addon, Environment, EnvironmentOptions, Mode, Runtime, RuntimeProvider, ServiceError};

use crate::config::ToolsConfig;
use crate::error::{NormaliseError, ToolsError, TranspileError};
use crate::factory::{InitHook, RuntimeFactory};
use crate::forced_async::install_forced_async_opcode_hook;
use crate::module::Module;
use crate::registry::SourceMapRegistry;
use crate::stack::{header_lines_from_probe, StackNormaliser};
use crate::transpile::{Toolchain, TranspileOptions, Transpiler};

/// Create test tools for the runtime installed at `runtime_library_path`.
///
/// `init_hook` runs on every new runtime; `force_async` installs the
/// forced-async opcode hook on async runtimes.
pub fn create_test_tools(
    runtime_library_path: impl Into<String>,
    provider: Arc<dyn RuntimeProvider>,
    toolchain: Toolchain,
    init_hook: Option<InitHook>,
    force_async: bool,
) -> TestTools {
    let mut builder = TestTools::builder(provider, toolchain)
        .runtime_library_path(runtime_library_path)
        .force_async(force_async);
    if let Some(hook) = init_hook {
        builder = builder.init_hook(hook);
    }
    builder.build()
}

/// Builder for [`TestTools`].
pub struct TestToolsBuilder {
    provider: Arc<dyn RuntimeProvider>,
    toolchain: Toolchain,
    init_hook: Option<InitHook>,
    config: ToolsConfig,
}

impl TestToolsBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: ToolsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn runtime_library_path(mut self, path: impl Into<String>) -> Self {
        self.config.runtime_library_path = Some(path.into());
        self
    }

    pub fn force_async(mut self, force_async: bool) -> Self {
        self.config.force_async = force_async;
        self
    }

    pub fn init_hook(mut self, hook: InitHook) -> Self {
        self.init_hook = Some(hook);
        self
    }

    pub fn build(self) -> TestTools {
        let registry = Arc::new(SourceMapRegistry::new());
        let normaliser = StackNormaliser::new(
            self.config.normalise.clone(),
            self.config.runtime_library_path.clone(),
        );

        TestTools {
            factory: RuntimeFactory::new(self.provider, self.init_hook, self.config.force_async),
            transpiler: Transpiler::new(self.toolchain.clone(), Arc::clone(&registry)),
            toolchain: self.toolchain,
            registry,
            normaliser,
            header_lines: OnceLock::new(),
            config: self.config,
        }
    }
}

/// Runtimes, transpilation and stack normalisation for PHP integration tests.
pub struct TestTools {
    factory: RuntimeFactory,
    transpiler: Transpiler,
    toolchain: Toolchain,
    registry: Arc<SourceMapRegistry>,
    normaliser: StackNormaliser,
    header_lines: OnceLock<u32>,
    config: ToolsConfig,
}

impl TestTools {
    pub fn builder(provider: Arc<dyn RuntimeProvider>, toolchain: Toolchain) -> TestToolsBuilder {
        TestToolsBuilder {
            provider,
            toolchain,
            init_hook: None,
            config: ToolsConfig::default(),
        }
    }

    pub fn config(&self) -> &ToolsConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────
    // Runtimes
    // ─────────────────────────────────────────────────────────────────────

    /// The shared runtime for `mode`.
    pub fn runtime(&self, mode: Mode) -> Result<Arc<dyn Runtime>, ToolsError> {
        self.factory.runtime(mode)
    }

    pub fn async_runtime(&self) -> Result<Arc<dyn Runtime>, ToolsError> {
        self.runtime(Mode::Async)
    }

    pub fn psync_runtime(&self) -> Result<Arc<dyn Runtime>, ToolsError> {
        self.runtime(Mode::Psync)
    }

    pub fn sync_runtime(&self) -> Result<Arc<dyn Runtime>, ToolsError> {
        self.runtime(Mode::Sync)
    }

    /// A fresh runtime for `mode`, isolated from the shared one.
    pub fn create_runtime(&self, mode: Mode) -> Result<Arc<dyn Runtime>, ToolsError> {
        self.factory.create(mode)
    }

    pub fn create_async_runtime(&self) -> Result<Arc<dyn Runtime>, ToolsError> {
        self.create_runtime(Mode::Async)
    }

    pub fn create_psync_runtime(&self) -> Result<Arc<dyn Runtime>, ToolsError> {
        self.create_runtime(Mode::Psync)
    }

    pub fn create_sync_runtime(&self) -> Result<Arc<dyn Runtime>, ToolsError> {
        self.create_runtime(Mode::Sync)
    }

    /// Install the forced-async opcode hook on `runtime`. Call at most once per runtime.
    pub fn install_forced_async_opcode_hook(&self, runtime: &dyn Runtime) -> Result<(), ServiceError> {
        install_forced_async_opcode_hook(runtime)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Environments
    // ─────────────────────────────────────────────────────────────────────

    /// Create an environment on the shared runtime for `mode`.
    pub fn create_environment(
        &self,
        mode: Mode,
        options: &EnvironmentOptions,
        addons: &[Addon],
    ) -> Result<Arc<dyn Environment>, ToolsError> {
        Ok(self.runtime(mode)?.create_environment(options, addons)?)
    }

    pub fn create_async_environment(
        &self,
        options: &EnvironmentOptions,
        addons: &[Addon],
    ) -> Result<Arc<dyn Environment>, ToolsError> {
        self.create_environment(Mode::Async, options, addons)
    }

    pub fn create_psync_environment(
        &self,
        options: &EnvironmentOptions,
        addons: &[Addon],
    ) -> Result<Arc<dyn Environment>, ToolsError> {
        self.create_environment(Mode::Psync, options, addons)
    }

    pub fn create_sync_environment(
        &self,
        options: &EnvironmentOptions,
        addons: &[Addon],
    ) -> Result<Arc<dyn Environment>, ToolsError> {
        self.create_environment(Mode::Sync, options, addons)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transpilation
    // ─────────────────────────────────────────────────────────────────────

    /// Transpile `php` into a module bound to `runtime`.
    pub fn transpile(
        &self,
        runtime: Arc<dyn Runtime>,
        path: Option<&str>,
        php: &str,
        options: &TranspileOptions,
    ) -> Result<Module, TranspileError> {
        self.transpiler.transpile(runtime, path, php, options)
    }

    pub fn async_transpile(
        &self,
        path: Option<&str>,
        php: &str,
        options: &TranspileOptions,
    ) -> Result<Module, TranspileError> {
        self.transpile(self.async_runtime()?, path, php, options)
    }

    pub fn psync_transpile(
        &self,
        path: Option<&str>,
        php: &str,
        options: &TranspileOptions,
    ) -> Result<Module, TranspileError> {
        self.transpile(self.psync_runtime()?, path, php, options)
    }

    pub fn sync_transpile(
        &self,
        path: Option<&str>,
        php: &str,
        options: &TranspileOptions,
    ) -> Result<Module, TranspileError> {
        self.transpile(self.sync_runtime()?, path, php, options)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Stacks
    // ─────────────────────────────────────────────────────────────────────

    /// Normalise a stack raised by `module`.
    ///
    /// `module` must have been transpiled with source maps enabled.
    pub async fn normalise_stack(&self, stack: &str, module: &Module) -> Result<String, NormaliseError> {
        let entry = self
            .registry
            .get(module)
            .ok_or(NormaliseError::SourceMapNotRegistered)?;

        self.normaliser
            .normalise(stack, &entry, self.toolchain.source_maps.as_ref(), self.header_lines()?)
            .await
    }

    /// Header lines the evaluator wraps code in, measured once it succeeds.
    fn header_lines(&self) -> Result<u32, NormaliseError> {
        if let Some(lines) = self.header_lines.get() {
            return Ok(*lines);
        }

        let lines = header_lines_from_probe(&self.toolchain.evaluator.probe_stack())?;
        Ok(*self.header_lines.get_or_init(|| lines))
    }
}
