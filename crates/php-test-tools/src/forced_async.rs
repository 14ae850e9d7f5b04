//! Forced-async opcode interception.
//!
//! Async-mode tests can pass by accident when every operation happens to
//! complete synchronously. [`install_forced_async_opcode_hook`] replaces a
//! runtime's opcode executor with [`ForcedAsyncExecutor`], which pushes the
//! result of every traced opcode onto a later scheduler tick.

use std::sync::Arc;

use php_runtime_host::services::OPCODE_EXECUTOR;
use php_runtime_host::{
    Deferred, Opcode, OpcodeExecutor, OpcodeResult, Reference, ReferenceHandle, Runtime,
    ServiceContainer, ServiceError, Value,
};

/// Replace the opcode executor of `runtime` with a [`ForcedAsyncExecutor`]
/// wrapping the current one.
///
/// Must be called at most once per runtime, before any module runs on it.
pub fn install_forced_async_opcode_hook(runtime: &dyn Runtime) -> Result<(), ServiceError> {
    let mode = runtime.mode();

    runtime.install(Box::new(move |services: &ServiceContainer| {
        let previous = services.opcode_executor()?;

        services.allow_override();
        let executor: Arc<dyn OpcodeExecutor> = Arc::new(ForcedAsyncExecutor::new(previous));
        services.define(OPCODE_EXECUTOR, executor)?;

        tracing::debug!(%mode, "Installed forced-async opcode hook");
        Ok(())
    }))
}

/// Opcode executor that defers the results of traced opcodes.
pub struct ForcedAsyncExecutor {
    inner: Arc<dyn OpcodeExecutor>,
}

impl ForcedAsyncExecutor {
    pub fn new(inner: Arc<dyn OpcodeExecutor>) -> Self {
        Self { inner }
    }
}

impl OpcodeExecutor for ForcedAsyncExecutor {
    fn execute(&self, opcode: &dyn Opcode) -> OpcodeResult {
        let result = self.inner.execute(opcode);

        // Resuming inside an untraced opcode is unsupported, so leave it be
        if !opcode.is_traced() {
            return result;
        }

        match result {
            OpcodeResult::Deferred(deferred) => match deferred.into_settled() {
                Ok(outcome) => OpcodeResult::Deferred(Deferred::on_next_tick(outcome)),
                Err(pending) => OpcodeResult::Deferred(pending),
            },
            OpcodeResult::Value(value) => OpcodeResult::Deferred(Deferred::on_next_tick(Ok(value))),
            OpcodeResult::Reference(reference) => {
                OpcodeResult::Reference(Arc::new(DeferredReference::new(reference)))
            }
            other => other,
        }
    }
}

/// Await `issued` after yielding to the scheduler once.
///
/// The operation behind `issued` has already been applied; only its
/// completion moves.
fn completed_later(issued: Deferred) -> Deferred {
    Deferred::pending(async move {
        tokio::task::yield_now().await;
        issued.await
    })
}

/// Reference proxy whose value reads and writes complete on a later tick.
///
/// Structural capabilities stay synchronous: the binding between slots must
/// be observable immediately by whatever made it.
pub struct DeferredReference {
    inner: ReferenceHandle,
}

impl DeferredReference {
    pub fn new(inner: ReferenceHandle) -> Self {
        Self { inner }
    }
}

impl Reference for DeferredReference {
    fn get_value(&self) -> Deferred {
        completed_later(self.inner.get_value())
    }

    fn set_value(&self, value: Value) -> Deferred {
        completed_later(self.inner.set_value(value))
    }

    fn unset(&self) -> Deferred {
        completed_later(self.inner.unset())
    }

    fn get_reference(&self) -> Option<ReferenceHandle> {
        self.inner.get_reference()
    }

    fn set_reference(&self, reference: ReferenceHandle) {
        self.inner.set_reference(reference)
    }

    fn clear_reference(&self) {
        self.inner.clear_reference()
    }

    fn is_reference(&self) -> bool {
        self.inner.is_reference()
    }

    fn is_defined(&self) -> bool {
        self.inner.is_defined()
    }

    fn is_readable(&self) -> bool {
        self.inner.is_readable()
    }

    fn is_empty(&self) -> Deferred {
        self.inner.is_empty()
    }

    fn is_set(&self) -> Deferred {
        self.inner.is_set()
    }

    fn raise_undefined(&self) -> Deferred {
        self.inner.raise_undefined()
    }
}
