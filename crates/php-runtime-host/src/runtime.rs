//! Runtime, environment and module contracts.

use std::any::Any;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::deferred::Deferred;
use crate::error::{HostError, ServiceError};
use crate::mode::Mode;
use crate::services::ServiceContainer;
use crate::Value;

/// Options passed when creating an environment.
pub type EnvironmentOptions = serde_json::Map<String, Value>;

/// An addon installed into an environment (classes, functions, bindings...).
///
/// Opaque to tooling; the runtime downcasts to its own addon type.
pub type Addon = Arc<dyn Any + Send + Sync>;

/// A group of service definitions applied to a runtime's container.
pub type ServiceGroup = Box<dyn FnOnce(&ServiceContainer) -> Result<(), ServiceError> + Send>;

/// Creates runtimes.
pub trait RuntimeProvider: Send + Sync {
    /// Create a new, independent runtime for `mode`.
    fn create(&self, mode: Mode) -> Arc<dyn Runtime>;
}

/// An embedded PHP runtime instance.
pub trait Runtime: Send + Sync {
    fn mode(&self) -> Mode;

    /// The runtime's service container.
    fn services(&self) -> &ServiceContainer;

    /// Apply a group of service definitions.
    fn install(&self, group: ServiceGroup) -> Result<(), ServiceError> {
        group(self.services())
    }

    /// Create an environment that modules can be executed in.
    fn create_environment(
        &self,
        options: &EnvironmentOptions,
        addons: &[Addon],
    ) -> Result<Arc<dyn Environment>, HostError>;
}

/// An execution environment created by a runtime.
pub trait Environment: Send + Sync {
    fn mode(&self) -> Mode;
}

/// Module-level configuration bound onto a module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleOptions {
    /// Logical path of the PHP script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ModuleOptions {
    /// Overlay `other` onto these options; `other` wins on conflicts.
    pub fn merged(&self, other: &ModuleOptions) -> ModuleOptions {
        let mut extra = self.extra.clone();
        extra.extend(other.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        ModuleOptions {
            path: other.path.clone().or_else(|| self.path.clone()),
            extra,
        }
    }
}

/// The invokable product of evaluating generated code.
pub trait ModuleFactory: Send + Sync {
    /// Run the module's top-level code.
    ///
    /// Uses a fresh environment from the module's runtime when `environment`
    /// is `None`.
    fn execute(
        &self,
        options: &ModuleOptions,
        environment: Option<Arc<dyn Environment>>,
    ) -> Deferred;
}
