// Source-map registry - side table from module handles to their source maps
//
// Entries hold only a weak link to their module, so registering a map never
// keeps a module alive. Entries whose module has been dropped are treated as
// absent and pruned on the next insert.

use std::sync::Arc;

use dashmap::DashMap;
use php_runtime_host::SourceMapData;

use crate::module::{Module, WeakModule};

/// Source-map data recorded for one transpilation.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMapEntry {
    pub map: SourceMapData,
    /// Logical path the module was compiled with.
    pub path: Option<String>,
}

struct Slot {
    module: WeakModule,
    entry: Arc<SourceMapEntry>,
}

/// Weakly-keyed registry of source maps.
#[derive(Default)]
pub struct SourceMapRegistry {
    slots: DashMap<usize, Slot>,
}

impl SourceMapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the source map of `module`.
    pub fn insert(&self, module: &Module, entry: SourceMapEntry) {
        self.prune();
        self.slots.insert(
            module.id(),
            Slot {
                module: module.downgrade(),
                entry: Arc::new(entry),
            },
        );
    }

    /// Look up the source map of `module`.
    pub fn get(&self, module: &Module) -> Option<Arc<SourceMapEntry>> {
        self.slots
            .get(&module.id())
            .filter(|slot| slot.module.points_to(module) && slot.module.is_alive())
            .map(|slot| Arc::clone(&slot.entry))
    }

    /// Number of entries whose module is still alive.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.module.is_alive()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&self) {
        self.slots.retain(|_, slot| slot.module.is_alive());
    }
}
