// Wrapper instance base: every script-visible proxy of a native value
// carries a WrapperBase, which registers the wrapper with the bridge's
// reference collector on construction and unregisters it on drop.
//
// The per-type "report referenced objects" callback is registered once per
// wrapper kind through `inventory`, not stored per instance.

use std::any::Any;
use std::rc::{Rc, Weak};

use ubridge_host::{Host, ReferenceCollector};

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::policy::OwnerContext;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum WrapperKind {
    Object,
    Struct,
    Array,
    FixedArray,
    Set,
    Map,
}

/// Common interface of registered wrappers.
pub trait WrappedInstance: Any {
    fn wrapper_kind(&self) -> WrapperKind;

    /// Owner of this wrapper's storage, if it lives inside another wrapper.
    fn owner_context(&self) -> OwnerContext;

    /// A child wrapper whose storage lives inside ours was mutated.
    fn on_child_changed(&self, property: Option<&str>);

    fn as_any(&self) -> &dyn Any;
}

/// Reports every object handle a wrapper keeps alive. Collectors may rewrite
/// the handles they are given.
pub type ReportReferencedObjects = fn(&dyn WrappedInstance, &mut dyn ReferenceCollector);

/// Static registration of a wrapper kind's collector callback.
pub struct WrapperTypeRegistration {
    pub kind: WrapperKind,
    pub name: &'static str,
    pub add_referenced_objects: ReportReferencedObjects,
}

inventory::collect!(WrapperTypeRegistration);

/// Registration bracket shared by every wrapper. Must be the first field of
/// the wrapper struct so it is dropped (unregistered) before the storage.
pub struct WrapperBase {
    bridge: Rc<Bridge>,
    key: usize,
}

impl WrapperBase {
    /// Register the wrapper under construction. Called from `Rc::new_cyclic`.
    pub(crate) fn new<T: WrappedInstance>(bridge: &Rc<Bridge>, this: &Weak<T>) -> Self {
        let instance: Weak<dyn WrappedInstance> = this.clone();
        let key = bridge.collector().add_wrapped_instance(instance);
        WrapperBase { bridge: bridge.clone(), key }
    }

    pub fn bridge(&self) -> &Rc<Bridge> {
        &self.bridge
    }

    pub fn host(&self) -> &Host {
        self.bridge.host()
    }
}

impl Drop for WrapperBase {
    fn drop(&mut self) {
        self.bridge.collector().remove_wrapped_instance(self.key);
    }
}

/// Rich comparison operator.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
}

/// Rich comparison for wrappers that only define equality. `equal` is
/// `None` when the other operand is not comparable at all.
pub(crate) fn equality_compare(op: CompareOp, equal: Option<bool>, type_name: &str) -> BridgeResult<Option<bool>> {
    match op {
        CompareOp::Eq => Ok(equal),
        CompareOp::Ne => Ok(equal.map(|e| !e)),
        _ => Err(BridgeError::TypeError(format!("'{type_name}' only supports == and != comparison"))),
    }
}

/// Order-dependent hash mixing for container and struct hashes.
pub(crate) fn hash_combine(seed: u32, value: u32) -> u32 {
    seed ^ value.wrapping_add(0x9e37_79b9).wrapping_add(seed << 6).wrapping_add(seed >> 2)
}

/// Error raised when hashing a value whose type has no value hash.
pub(crate) fn unhashable() -> BridgeError {
    BridgeError::Exception("Type cannot be hashed".to_string())
}

/// Name of a registered wrapper kind, for diagnostics.
pub fn wrapper_kind_name(kind: WrapperKind) -> &'static str {
    inventory::iter::<WrapperTypeRegistration>
        .into_iter()
        .find(|r| r.kind == kind)
        .map_or("Unknown", |r| r.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_is_registered_once() {
        let kinds = [
            WrapperKind::Object,
            WrapperKind::Struct,
            WrapperKind::Array,
            WrapperKind::FixedArray,
            WrapperKind::Set,
            WrapperKind::Map,
        ];
        for kind in kinds {
            let count = inventory::iter::<WrapperTypeRegistration>.into_iter().filter(|r| r.kind == kind).count();
            assert_eq!(count, 1, "{kind:?}");
        }
        assert_eq!(wrapper_kind_name(WrapperKind::Array), "Array");
    }

    #[test]
    fn equality_only_types_reject_ordering() {
        assert_eq!(equality_compare(CompareOp::Ne, Some(true), "Array").unwrap(), Some(false));
        assert_eq!(equality_compare(CompareOp::Eq, None, "Array").unwrap(), None);
        assert!(matches!(equality_compare(CompareOp::Lt, Some(true), "Array"), Err(BridgeError::TypeError(_))));
    }

    #[test]
    fn hash_combine_depends_on_order() {
        assert_ne!(hash_combine(hash_combine(0, 1), 2), hash_combine(hash_combine(0, 2), 1));
    }
}
