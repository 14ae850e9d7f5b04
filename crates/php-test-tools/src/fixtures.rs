// In-memory stand-ins for the runtime, toolchain and source-map decoder.
//
// The "compiler" emits the PHP text itself behind the return prefix and maps
// each line (and each `throw`) one-to-one; the "evaluator" raises from the
// first `throw new Exception('...')` it finds, with a host-style stack.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use php_runtime_host::services::OPCODE_EXECUTOR;
use php_runtime_host::{
    Addon, Ast, CodeEvaluator, CompileError, CompilerOptions, Deferred, Environment, EnvironmentOptions,
    HostError, Mode, ModuleFactory, ModuleOptions, Opcode, OpcodeExecutor, OpcodeResult,
    OriginalPosition, ParseError, ParserOptions, PhpCompiler, PhpError, PhpParser, Reference,
    ReferenceHandle, Runtime, RuntimeProvider, ServiceContainer, SourceMapConsumer, SourceMapData,
    SourceMapDecoder, TranspileOutput, Value,
};
use serde_json::json;

use crate::transpile::Toolchain;

pub const RUNTIME_LIBRARY_PATH: &str = "/opt/php-runtime";

/// Lines the fake evaluator wraps generated code in.
pub const HEADER_LINES: usize = 2;

pub const STACK_TAIL: &str = concat!(
    "    at Engine.execute (/opt/php-runtime/src/Engine.js:120:14)\n",
    "    at Context.<anonymous> (/project/node_modules/mocha/lib/runnable.js:354:21)\n",
    "    at Runnable.run (/project/node_modules/mocha/lib/runnable.js:398:7)\n",
    "    at Runner.runTest (/project/node_modules/mocha/lib/runner.js:801:10)\n",
    "    at next (/project/node_modules/mocha/lib/runner.js:594:14)\n",
    "    at Immediate._onImmediate (/project/node_modules/mocha/lib/runner.js:644:5)\n",
    "    at process.processImmediate (node:internal/timers:478:21)\n",
    "    at node:internal/main/run_main_module:28:49\n",
);

/// Route tool logs through the test writer; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn toolchain() -> Toolchain {
    Toolchain {
        parser: Arc::new(FakeParser),
        compiler: Arc::new(ScriptCompiler),
        evaluator: Arc::new(ScriptEvaluator::default()),
        source_maps: Arc::new(TableDecoder),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runtime
// ─────────────────────────────────────────────────────────────────────────────

pub struct TestOpcode {
    name: String,
    traced: bool,
}

impl TestOpcode {
    pub fn traced(name: &str) -> Self {
        Self {
            name: name.to_string(),
            traced: true,
        }
    }

    pub fn untraced(name: &str) -> Self {
        Self {
            name: name.to_string(),
            traced: false,
        }
    }
}

impl Opcode for TestOpcode {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_traced(&self) -> bool {
        self.traced
    }
}

/// Function-based opcode executor
pub struct FnExecutor<F>
where
    F: Fn(&dyn Opcode) -> OpcodeResult + Send + Sync,
{
    func: F,
}

impl<F> FnExecutor<F>
where
    F: Fn(&dyn Opcode) -> OpcodeResult + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> OpcodeExecutor for FnExecutor<F>
where
    F: Fn(&dyn Opcode) -> OpcodeResult + Send + Sync,
{
    fn execute(&self, opcode: &dyn Opcode) -> OpcodeResult {
        (self.func)(opcode)
    }
}

pub struct FakeReference {
    value: Mutex<Option<Value>>,
    target: Mutex<Option<ReferenceHandle>>,
}

impl FakeReference {
    pub fn new(value: Value) -> Self {
        Self {
            value: Mutex::new(Some(value)),
            target: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Value {
        self.value.lock().clone().unwrap_or(Value::Null)
    }
}

impl Reference for FakeReference {
    fn get_value(&self) -> Deferred {
        Deferred::resolved(self.current())
    }

    fn set_value(&self, value: Value) -> Deferred {
        *self.value.lock() = Some(value.clone());
        Deferred::resolved(value)
    }

    fn unset(&self) -> Deferred {
        *self.value.lock() = None;
        Deferred::resolved(Value::Null)
    }

    fn get_reference(&self) -> Option<ReferenceHandle> {
        self.target.lock().clone()
    }

    fn set_reference(&self, reference: ReferenceHandle) {
        *self.target.lock() = Some(reference);
    }

    fn clear_reference(&self) {
        *self.target.lock() = None;
    }

    fn is_reference(&self) -> bool {
        self.target.lock().is_some()
    }

    fn is_defined(&self) -> bool {
        self.value.lock().is_some()
    }

    fn is_readable(&self) -> bool {
        self.is_defined()
    }

    fn is_empty(&self) -> Deferred {
        let value = self.current();
        let empty = value.is_null() || value == json!(false) || value == json!(0) || value == json!("");
        Deferred::resolved(json!(empty))
    }

    fn is_set(&self) -> Deferred {
        Deferred::resolved(json!(!self.current().is_null()))
    }

    fn raise_undefined(&self) -> Deferred {
        Deferred::rejected(PhpError::new("Undefined variable", ""))
    }
}

pub struct FakeEnvironment {
    mode: Mode,
}

impl Environment for FakeEnvironment {
    fn mode(&self) -> Mode {
        self.mode
    }
}

pub struct FakeRuntime {
    mode: Mode,
    services: ServiceContainer,
}

impl FakeRuntime {
    /// Runtime whose executor returns each opcode's name as a value.
    pub fn new(mode: Mode) -> Self {
        Self::with_executor(
            mode,
            FnExecutor::new(|opcode: &dyn Opcode| OpcodeResult::Value(json!(opcode.name()))),
        )
    }

    pub fn with_executor(mode: Mode, executor: impl OpcodeExecutor + 'static) -> Self {
        let runtime = Self::empty(mode);
        let executor: Arc<dyn OpcodeExecutor> = Arc::new(executor);
        runtime
            .services
            .define(OPCODE_EXECUTOR, executor)
            .expect("fresh container accepts the executor");
        runtime
    }

    /// Runtime with no services at all.
    pub fn empty(mode: Mode) -> Self {
        Self {
            mode,
            services: ServiceContainer::new(),
        }
    }

    /// Execute through whatever executor is currently installed.
    pub fn execute(&self, opcode: &dyn Opcode) -> OpcodeResult {
        self.services
            .opcode_executor()
            .expect("executor is defined")
            .execute(opcode)
    }
}

impl Runtime for FakeRuntime {
    fn mode(&self) -> Mode {
        self.mode
    }

    fn services(&self) -> &ServiceContainer {
        &self.services
    }

    fn create_environment(
        &self,
        options: &EnvironmentOptions,
        _addons: &[Addon],
    ) -> Result<Arc<dyn Environment>, HostError> {
        if options.contains_key("invalid") {
            return Err(HostError::Environment("invalid option".to_string()));
        }
        Ok(Arc::new(FakeEnvironment { mode: self.mode }))
    }
}

#[derive(Default)]
pub struct FakeProvider {
    created: AtomicUsize,
}

impl FakeProvider {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl RuntimeProvider for FakeProvider {
    fn create(&self, mode: Mode) -> Arc<dyn Runtime> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(FakeRuntime::new(mode))
    }
}

/// Module factory that always completes with the same value.
pub struct StaticModule {
    value: Value,
}

impl StaticModule {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl ModuleFactory for StaticModule {
    fn execute(&self, _options: &ModuleOptions, _environment: Option<Arc<dyn Environment>>) -> Deferred {
        Deferred::resolved(self.value.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Toolchain
// ─────────────────────────────────────────────────────────────────────────────

pub struct FakeParser;

impl PhpParser for FakeParser {
    fn parse(&self, source: &str, options: &ParserOptions) -> Result<Ast, ParseError> {
        let error = |message: &str, offset: usize| ParseError {
            message: message.to_string(),
            path: options.path.clone(),
            line: source[..offset].matches('\n').count() as u32 + 1,
        };

        if !source.starts_with("<?php") {
            return Err(error("syntax error, unexpected end of file", 0));
        }
        if let Some(offset) = source.find("= ;") {
            return Err(error("syntax error, unexpected ';'", offset));
        }

        Ok(json!({
            "source": source,
            "path": options.path,
            "bounds": options.capture_all_bounds,
        }))
    }
}

pub struct ScriptCompiler;

impl PhpCompiler for ScriptCompiler {
    fn transpile(&self, ast: &Ast, options: &CompilerOptions) -> Result<TranspileOutput, CompileError> {
        let source = ast["source"].as_str().unwrap_or_default();
        if source.contains("goto") {
            return Err(CompileError {
                message: "Unsupported statement: goto".to_string(),
            });
        }

        let map = options
            .source_map
            .as_ref()
            .filter(|request| request.return_map)
            .map(|_| {
                let mut mappings = Vec::new();
                for (index, line) in source.lines().enumerate() {
                    let number = index + 1;
                    let offset = if index == 0 { options.prefix.len() } else { 0 };
                    mappings.push(json!([number, offset, number, 0]));
                    if let Some(column) = line.find("throw") {
                        mappings.push(json!([number, offset + column, number, column]));
                    }
                }
                json!({
                    "sources": [options.path.clone().unwrap_or_else(|| "(program)".to_string())],
                    "mappings": mappings,
                })
            });

        Ok(TranspileOutput {
            code: format!("{}{}", options.prefix, source),
            map,
        })
    }
}

/// Compiler that remembers the options of its last call.
#[derive(Default)]
pub struct RecordingCompiler {
    last: Mutex<Option<CompilerOptions>>,
}

impl RecordingCompiler {
    pub fn last_options(&self) -> Option<CompilerOptions> {
        self.last.lock().clone()
    }
}

impl PhpCompiler for RecordingCompiler {
    fn transpile(&self, ast: &Ast, options: &CompilerOptions) -> Result<TranspileOutput, CompileError> {
        *self.last.lock() = Some(options.clone());
        ScriptCompiler.transpile(ast, options)
    }
}

#[derive(Default)]
pub struct ScriptEvaluator {
    probes: AtomicUsize,
    probe: Option<String>,
}

impl ScriptEvaluator {
    /// Evaluator whose header probe returns `probe` verbatim.
    pub fn with_probe(probe: &str) -> Self {
        Self {
            probe: Some(probe.to_string()),
            ..Self::default()
        }
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl CodeEvaluator for ScriptEvaluator {
    fn evaluate(&self, code: &str, runtime: Arc<dyn Runtime>) -> Result<Arc<dyn ModuleFactory>, HostError> {
        Ok(Arc::new(ScriptModule {
            code: code.to_string(),
            runtime,
        }))
    }

    fn probe_stack(&self) -> String {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if let Some(probe) = &self.probe {
            return probe.clone();
        }
        format!(
            "Error: probe\n    at eval (eval at probe_stack (/harness/src/evaluator.rs:9:5), <anonymous>:{}:1)\n",
            HEADER_LINES + 1
        )
    }
}

pub struct ScriptModule {
    code: String,
    runtime: Arc<dyn Runtime>,
}

impl ScriptModule {
    fn run(&self) -> Result<Value, PhpError> {
        const THROW: &str = "throw new Exception('";

        for (index, line) in self.code.lines().enumerate() {
            if let Some(column) = line.find(THROW) {
                let message = line[column + THROW.len()..].split('\'').next().unwrap_or_default();
                let stack = format!(
                    "Exception: {}\n    at Closure (eval at evaluate (/harness/src/evaluator.rs:42:17), <anonymous>:{}:{})\n{}",
                    message,
                    index + 1 + HEADER_LINES,
                    column + 1,
                    STACK_TAIL
                );
                return Err(PhpError::new(message, stack));
            }
        }

        Ok(self
            .code
            .rfind("return ")
            .and_then(|at| self.code[at + "return ".len()..].trim_end().trim_end_matches(';').parse::<i64>().ok())
            .map(|number| json!(number))
            .unwrap_or(Value::Null))
    }
}

impl ModuleFactory for ScriptModule {
    fn execute(&self, _options: &ModuleOptions, environment: Option<Arc<dyn Environment>>) -> Deferred {
        let mode = environment.map_or(self.runtime.mode(), |environment| environment.mode());
        let outcome = self.run();

        match mode {
            Mode::Async => Deferred::on_next_tick(outcome),
            Mode::Sync | Mode::Psync => Deferred::settled(outcome),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Source maps
// ─────────────────────────────────────────────────────────────────────────────

/// Decodes maps of the form `{ sources: [..], mappings: [[gen_line, gen_col, line, col], ..] }`.
pub struct TableDecoder;

#[async_trait]
impl SourceMapDecoder for TableDecoder {
    async fn consume(&self, map: &SourceMapData) -> anyhow::Result<Box<dyn SourceMapConsumer>> {
        let source = map
            .get("sources")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("source map has no sources"))?
            .first()
            .and_then(Value::as_str)
            .map(str::to_string);

        let mappings = map
            .get("mappings")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("source map has no mappings"))?
            .iter()
            .map(|mapping| {
                let field = |i: usize| mapping.get(i).and_then(Value::as_u64).map(|n| n as u32);
                match (field(0), field(1), field(2), field(3)) {
                    (Some(a), Some(b), Some(c), Some(d)) => Ok([a, b, c, d]),
                    _ => Err(anyhow!("malformed mapping {}", mapping)),
                }
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Box::new(TableConsumer { source, mappings }))
    }
}

struct TableConsumer {
    source: Option<String>,
    mappings: Vec<[u32; 4]>,
}

impl SourceMapConsumer for TableConsumer {
    fn original_position_for(&self, line: u32, column: u32) -> OriginalPosition {
        self.mappings
            .iter()
            .filter(|[generated_line, generated_column, _, _]| *generated_line == line && *generated_column <= column)
            .max_by_key(|[_, generated_column, _, _]| *generated_column)
            .map(|[_, _, original_line, original_column]| OriginalPosition {
                source: self.source.clone(),
                line: Some(*original_line),
                column: Some(*original_column),
            })
            .unwrap_or_default()
    }
}
