//! Opcodes, their executor service and the shapes of their results.

use std::any::Any;
use std::sync::Arc;

use crate::deferred::Deferred;
use crate::Value;

/// A single low-level operation of the runtime's instruction model.
pub trait Opcode: Send + Sync {
    /// Name of the operation, for diagnostics.
    fn name(&self) -> &str;

    /// Whether execution can be paused and resumed inside this opcode.
    ///
    /// Untraced opcodes run purely synchronously with no resume point.
    fn is_traced(&self) -> bool;
}

/// The service that executes one opcode at a time.
///
/// Registered in the runtime's [`ServiceContainer`](crate::ServiceContainer)
/// under [`OPCODE_EXECUTOR`](crate::services::OPCODE_EXECUTOR).
pub trait OpcodeExecutor: Send + Sync {
    fn execute(&self, opcode: &dyn Opcode) -> OpcodeResult;
}

/// Shared handle to a reference-like result.
pub type ReferenceHandle = Arc<dyn Reference>;

/// What executing an opcode produced.
pub enum OpcodeResult {
    /// A deferred computation, settled or not.
    Deferred(Deferred),
    /// A plain runtime value.
    Value(Value),
    /// A reference or a variable.
    Reference(ReferenceHandle),
    /// Any other result kind, opaque to tooling.
    Other(Box<dyn Any + Send>),
}

impl OpcodeResult {
    pub fn kind(&self) -> &'static str {
        match self {
            OpcodeResult::Deferred(_) => "deferred",
            OpcodeResult::Value(_) => "value",
            OpcodeResult::Reference(_) => "reference",
            OpcodeResult::Other(_) => "other",
        }
    }
}

impl std::fmt::Debug for OpcodeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpcodeResult::Deferred(deferred) => f.debug_tuple("Deferred").field(deferred).finish(),
            OpcodeResult::Value(value) => f.debug_tuple("Value").field(value).finish(),
            OpcodeResult::Reference(_) => f.write_str("Reference(..)"),
            OpcodeResult::Other(_) => f.write_str("Other(..)"),
        }
    }
}

/// A runtime-level indirection onto a storage slot (a reference or a variable).
///
/// Capabilities fall into three groups:
/// - value-producing and mutating: `get_value`, `set_value`, `unset`
/// - structural: `get_reference`, `set_reference`, `clear_reference`, `is_reference`
/// - checks: `is_defined`, `is_readable`, `is_empty`, `is_set`, `raise_undefined`
pub trait Reference: Send + Sync {
    /// Read the value stored in the slot.
    fn get_value(&self) -> Deferred;

    /// Assign to the slot, completing with the assigned value.
    fn set_value(&self, value: Value) -> Deferred;

    /// Unset the slot.
    fn unset(&self) -> Deferred;

    /// The reference this slot is bound to, if any.
    fn get_reference(&self) -> Option<ReferenceHandle>;

    /// Bind this slot to another reference.
    fn set_reference(&self, reference: ReferenceHandle);

    /// Remove any reference binding.
    fn clear_reference(&self);

    /// Whether the slot is bound to a reference.
    fn is_reference(&self) -> bool;

    fn is_defined(&self) -> bool;

    fn is_readable(&self) -> bool;

    /// PHP `empty()` semantics.
    fn is_empty(&self) -> Deferred;

    /// PHP `isset()` semantics.
    fn is_set(&self) -> Deferred;

    /// Raise the "undefined variable/index" notice or error for this slot.
    fn raise_undefined(&self) -> Deferred;
}
