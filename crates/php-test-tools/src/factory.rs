//! Runtime factory: one memoised runtime per mode, plus fresh isolated ones.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use php_runtime_host::{Mode, Runtime, RuntimeProvider};

use crate::error::ToolsError;
use crate::forced_async::install_forced_async_opcode_hook;

/// Hook applied to every freshly created runtime before first use.
pub type InitHook = Arc<dyn Fn(&dyn Runtime) + Send + Sync>;

/// Creates and memoises runtimes.
///
/// Runtimes are never torn down; tests that must not share state ask for a
/// fresh one with [`create`](Self::create).
pub struct RuntimeFactory {
    provider: Arc<dyn RuntimeProvider>,
    init_hook: Option<InitHook>,
    force_async: bool,
    runtimes: Mutex<HashMap<Mode, Arc<dyn Runtime>>>,
}

impl RuntimeFactory {
    pub fn new(provider: Arc<dyn RuntimeProvider>, init_hook: Option<InitHook>, force_async: bool) -> Self {
        Self {
            provider,
            init_hook,
            force_async,
            runtimes: Mutex::new(HashMap::new()),
        }
    }

    /// The shared runtime for `mode`, created on first request.
    pub fn runtime(&self, mode: Mode) -> Result<Arc<dyn Runtime>, ToolsError> {
        if let Some(runtime) = self.runtimes.lock().get(&mode) {
            return Ok(Arc::clone(runtime));
        }

        // Created outside the lock so init hooks may use the factory
        let created = self.create(mode)?;
        let mut runtimes = self.runtimes.lock();
        Ok(Arc::clone(runtimes.entry(mode).or_insert(created)))
    }

    /// A new runtime for `mode`, independent of the shared one.
    pub fn create(&self, mode: Mode) -> Result<Arc<dyn Runtime>, ToolsError> {
        let runtime = self.provider.create(mode);

        if mode == Mode::Async && self.force_async {
            install_forced_async_opcode_hook(runtime.as_ref())?;
        }
        if let Some(hook) = &self.init_hook {
            hook(runtime.as_ref());
        }

        tracing::debug!(%mode, force_async = self.force_async, "Created runtime");
        Ok(runtime)
    }
}
