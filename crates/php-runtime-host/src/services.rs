//! Runtime service container.
//!
//! Services are named singletons the runtime fetches by name. Tooling may
//! swap one out (e.g. the opcode executor), but only after explicitly
//! opening the override gate.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::ServiceError;
use crate::opcode::OpcodeExecutor;

/// Name of the opcode executor service.
pub const OPCODE_EXECUTOR: &str = "opcode_executor";

/// Named services of a single runtime.
#[derive(Default)]
pub struct ServiceContainer {
    services: DashMap<String, Arc<dyn Any + Send + Sync>>,
    override_allowed: AtomicBool,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a service.
    ///
    /// Fails if `name` is already defined, unless [`allow_override`](Self::allow_override)
    /// has been called.
    pub fn define<T>(&self, name: &str, service: T) -> Result<(), ServiceError>
    where
        T: Any + Send + Sync,
    {
        match self.services.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                if !self.override_allowed.load(Ordering::SeqCst) {
                    return Err(ServiceError::AlreadyDefined(name.to_string()));
                }
                tracing::debug!(service = name, "Overriding service");
                entry.insert(Arc::new(service));
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(service));
            }
        }
        Ok(())
    }

    /// Fetch a service by name.
    pub fn get<T>(&self, name: &str) -> Result<T, ServiceError>
    where
        T: Any + Send + Sync + Clone,
    {
        let service = self
            .services
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;

        service
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| ServiceError::WrongType(name.to_string()))
    }

    /// Permit later definitions to replace existing services.
    pub fn allow_override(&self) {
        self.override_allowed.store(true, Ordering::SeqCst);
    }

    pub fn is_override_allowed(&self) -> bool {
        self.override_allowed.load(Ordering::SeqCst)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// The current opcode executor.
    pub fn opcode_executor(&self) -> Result<Arc<dyn OpcodeExecutor>, ServiceError> {
        self.get(OPCODE_EXECUTOR)
    }
}
