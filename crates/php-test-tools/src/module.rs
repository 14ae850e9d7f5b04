//! Module handles produced by transpilation.

use std::sync::{Arc, Weak};

use php_runtime_host::{Deferred, Environment, ModuleFactory, ModuleOptions};

/// An invokable module compiled from PHP source.
///
/// Cloning shares identity: clones look up the same source-map entry.
#[derive(Clone)]
pub struct Module {
    inner: Arc<ModuleInner>,
}

pub(crate) struct ModuleInner {
    factory: Arc<dyn ModuleFactory>,
    options: ModuleOptions,
}

/// Non-owning counterpart of [`Module`], used as a registry key.
#[derive(Clone)]
pub(crate) struct WeakModule(Weak<ModuleInner>);

impl WeakModule {
    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub(crate) fn points_to(&self, module: &Module) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&module.inner))
    }
}

impl Module {
    pub(crate) fn new(factory: Arc<dyn ModuleFactory>) -> Self {
        Self {
            inner: Arc::new(ModuleInner {
                factory,
                options: ModuleOptions::default(),
            }),
        }
    }

    /// Bind module-level configuration, producing a new module handle.
    pub fn using(&self, options: ModuleOptions) -> Module {
        Module {
            inner: Arc::new(ModuleInner {
                factory: Arc::clone(&self.inner.factory),
                options: self.inner.options.merged(&options),
            }),
        }
    }

    /// Logical path bound onto the module, if any.
    pub fn path(&self) -> Option<&str> {
        self.inner.options.path.as_deref()
    }

    pub fn options(&self) -> &ModuleOptions {
        &self.inner.options
    }

    /// Run the module in a fresh environment.
    pub fn execute(&self) -> Deferred {
        self.inner.factory.execute(&self.inner.options, None)
    }

    /// Run the module in an existing environment.
    pub fn execute_in(&self, environment: Arc<dyn Environment>) -> Deferred {
        self.inner.factory.execute(&self.inner.options, Some(environment))
    }

    /// Identity of this handle, shared by its clones.
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> WeakModule {
        WeakModule(Arc::downgrade(&self.inner))
    }

    /// Whether two handles are the same module.
    pub fn ptr_eq(&self, other: &Module) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id())
            .field("options", &self.inner.options)
            .finish()
    }
}
