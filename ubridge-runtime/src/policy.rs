// Ownership / conversion policy for wrapper storage.
//
// A wrapper either owns its native storage (Copy, Steal) or points into
// storage owned by something else (Reference). When the storage lives inside
// another wrapper, the OwnerContext names that wrapper and the property the
// storage belongs to, so mutations can be reported upwards.

use std::fmt;
use std::rc::{Rc, Weak};

use ubridge_host::Host;

use crate::error::{BridgeError, BridgeResult};
use crate::storage::NativeRef;
use crate::wrapper::WrappedInstance;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConversionMethod {
    /// Allocate fresh storage and deep-copy the source into it.
    Copy,
    /// The caller's value is logically transferred. Behaves as `Copy`: the
    /// wrapper deep-copies and owns the copy.
    Steal,
    /// Point at the source storage; never allocate or free it.
    Reference,
}

/// Non-owning back reference from a child wrapper to the wrapper whose
/// storage contains it.
#[derive(Clone, Default)]
pub struct OwnerContext {
    owner: Option<Weak<dyn WrappedInstance>>,
    property: Option<String>,
}

impl OwnerContext {
    pub fn none() -> Self {
        OwnerContext::default()
    }

    pub fn new(owner: Weak<dyn WrappedInstance>, property: impl Into<String>) -> Self {
        OwnerContext { owner: Some(owner), property: Some(property.into()) }
    }

    pub fn has_owner(&self) -> bool {
        self.owner.is_some()
    }

    /// The owning wrapper, if it is still alive.
    pub fn owner(&self) -> Option<Rc<dyn WrappedInstance>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }

    pub fn property_name(&self) -> Option<&str> {
        self.property.as_deref()
    }

    /// Storage with an owner can only be referenced, never copied.
    pub fn assert_valid_conversion_method(&self, method: ConversionMethod) -> BridgeResult<()> {
        if self.has_owner() && method != ConversionMethod::Reference {
            return Err(BridgeError::Internal(format!(
                "Owner context for '{}' requires the Reference conversion method (got {method:?})",
                self.property.as_deref().unwrap_or("None")
            )));
        }
        Ok(())
    }

    /// Tell the owner that the storage for our property changed.
    pub fn notify_changed(&self) {
        if let Some(owner) = self.owner() {
            owner.on_child_changed(self.property.as_deref());
        }
    }
}

impl fmt::Debug for OwnerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerContext")
            .field("has_owner", &self.has_owner())
            .field("property", &self.property)
            .finish()
    }
}

/// Resolve the storage a wrapper will use for `source` under `method`.
///
/// Copy and Steal snapshot the source into a freshly allocated host buffer
/// the wrapper owns; Reference hands back the source itself.
pub(crate) fn init_storage(
    host: &Host,
    owner: &OwnerContext,
    source: &NativeRef,
    method: ConversionMethod,
    what: &str,
) -> BridgeResult<NativeRef> {
    owner.assert_valid_conversion_method(method)?;
    match method {
        ConversionMethod::Copy | ConversionMethod::Steal => {
            let value = source.snapshot(host, what)?;
            Ok(NativeRef::owned(host.allocate(value)))
        }
        ConversionMethod::Reference => Ok(source.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ubridge_host::NativeValue;

    #[test]
    fn copy_and_steal_allocate_reference_does_not() {
        let host = Host::new();
        let source = NativeRef::owned(host.allocate(NativeValue::Int(4)));
        assert_eq!(host.live_allocations(), 1);

        let copied = init_storage(&host, &OwnerContext::none(), &source, ConversionMethod::Copy, "Test").unwrap();
        let stolen = init_storage(&host, &OwnerContext::none(), &source, ConversionMethod::Steal, "Test").unwrap();
        assert_eq!(host.live_allocations(), 3);

        let referenced =
            init_storage(&host, &OwnerContext::none(), &source, ConversionMethod::Reference, "Test").unwrap();
        assert_eq!(host.live_allocations(), 3);

        copied.replace(&host, "Test", NativeValue::Int(9)).unwrap();
        assert_eq!(source.snapshot(&host, "Test").unwrap(), NativeValue::Int(4));
        referenced.replace(&host, "Test", NativeValue::Int(7)).unwrap();
        assert_eq!(source.snapshot(&host, "Test").unwrap(), NativeValue::Int(7));

        drop((copied, stolen, referenced));
        assert_eq!(host.live_allocations(), 1);
    }

    #[test]
    fn no_owner_means_no_notification_target() {
        let ctx = OwnerContext::none();
        assert!(!ctx.has_owner());
        assert!(ctx.owner().is_none());
        ctx.notify_changed();
        assert!(ctx.assert_valid_conversion_method(ConversionMethod::Copy).is_ok());
    }
}
