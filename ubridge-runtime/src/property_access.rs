// Attribute access through native properties, shared by the struct and
// object wrappers. Exposure and read-only checks happen here so both wrapper
// kinds report the same messages.

use std::rc::Rc;

use ubridge_host::{Property, CPF_BLUEPRINT_VISIBLE, CPF_EDIT};

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::policy::OwnerContext;
use crate::script::ScriptValue;
use crate::storage::NativeRef;

/// Script-exposed properties carry `CPF_EDIT` or `CPF_BLUEPRINT_VISIBLE`.
pub(crate) fn is_exposed(prop: &Property) -> bool {
    prop.has_any_flags(CPF_EDIT | CPF_BLUEPRINT_VISIBLE)
}

pub(crate) fn no_attribute(type_name: &str, attribute: &str) -> BridgeError {
    BridgeError::AttributeError(format!("'{type_name}' object has no attribute '{attribute}'"))
}

pub(crate) fn missing_property(prop_name: &str, attribute: &str, owner: &str) -> BridgeError {
    BridgeError::Exception(format!("Failed to find property '{prop_name}' for attribute '{attribute}' on '{owner}'"))
}

/// Read the value of `prop` stored at `storage` for attribute `attribute`.
pub(crate) fn read_property(
    bridge: &Rc<Bridge>,
    owner_name: &str,
    prop: &Property,
    attribute: &str,
    storage: &NativeRef,
    owner: OwnerContext,
) -> BridgeResult<ScriptValue> {
    if !is_exposed(prop) {
        return Err(BridgeError::Exception(format!(
            "Property '{}' for attribute '{attribute}' on '{owner_name}' is protected and cannot be read",
            prop.name
        )));
    }
    bridge.to_script_ref(prop, storage, owner).map_err(|err| match err {
        BridgeError::TypeError(_) => BridgeError::TypeError(format!(
            "Failed to convert property '{}' ({}) for attribute '{attribute}' on '{owner_name}'",
            prop.name,
            prop.class_name()
        )),
        other => other,
    })
}

/// Convert `value` and store it as the value of `prop` at `storage`.
/// Properties carrying any of `read_only_flags` are rejected.
pub(crate) fn write_property(
    bridge: &Rc<Bridge>,
    owner_name: &str,
    prop: &Property,
    attribute: &str,
    value: &ScriptValue,
    storage: &NativeRef,
    read_only_flags: u64,
) -> BridgeResult<()> {
    if !is_exposed(prop) {
        return Err(BridgeError::Exception(format!(
            "Property '{}' for attribute '{attribute}' on '{owner_name}' is protected and cannot be set",
            prop.name
        )));
    }
    if prop.has_any_flags(read_only_flags) {
        return Err(BridgeError::Exception(format!(
            "Property '{}' for attribute '{attribute}' on '{owner_name}' is read-only and cannot be set",
            prop.name
        )));
    }
    let native = bridge.to_native(value, prop).map_err(|err| match err {
        BridgeError::TypeError(_) => BridgeError::TypeError(format!(
            "Failed to convert type '{}' to property '{}' ({}) for attribute '{attribute}' on '{owner_name}'",
            value.type_name(),
            prop.name,
            prop.class_name()
        )),
        other => other,
    })?;
    storage.replace(bridge.host(), &prop.name, native)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use ubridge_host::{Host, NativeValue, PropertyKind, CPF_SCRIPT_READ_ONLY};

    fn bridge() -> Rc<Bridge> {
        Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap()
    }

    #[test]
    fn protected_properties_are_hidden() {
        let bridge = bridge();
        let storage = NativeRef::owned(bridge.host().allocate(NativeValue::Int(1)));
        let hidden = Property::new("Secret", PropertyKind::Int32);
        let err = read_property(&bridge, "Thing", &hidden, "secret", &storage, OwnerContext::none()).unwrap_err();
        assert_eq!(err.message(), "Property 'Secret' for attribute 'secret' on 'Thing' is protected and cannot be read");
    }

    #[test]
    fn read_only_properties_reject_writes() {
        let bridge = bridge();
        let storage = NativeRef::owned(bridge.host().allocate(NativeValue::Int(1)));
        let prop = Property::new("Count", PropertyKind::Int32).with_flags(CPF_EDIT | CPF_SCRIPT_READ_ONLY);
        let err = write_property(&bridge, "Thing", &prop, "count", &ScriptValue::Int(2), &storage, CPF_SCRIPT_READ_ONLY)
            .unwrap_err();
        assert_eq!(err.message(), "Property 'Count' for attribute 'count' on 'Thing' is read-only and cannot be set");
        // Construction paths pass no read-only flags.
        write_property(&bridge, "Thing", &prop, "count", &ScriptValue::Int(2), &storage, 0).unwrap();
        assert_eq!(storage.snapshot(bridge.host(), "Test").unwrap(), NativeValue::Int(2));
    }

    #[test]
    fn conversion_failures_name_the_attribute() {
        let bridge = bridge();
        let storage = NativeRef::owned(bridge.host().allocate(NativeValue::Int(1)));
        let prop = Property::new("Count", PropertyKind::Int32).with_flags(CPF_EDIT);
        let err = write_property(&bridge, "Thing", &prop, "count", &ScriptValue::str("x"), &storage, 0).unwrap_err();
        assert_eq!(
            err,
            BridgeError::TypeError(
                "Failed to convert type 'str' to property 'Count' (IntProperty) for attribute 'count' on 'Thing'".into()
            )
        );
        assert_eq!(storage.snapshot(bridge.host(), "Test").unwrap(), NativeValue::Int(1));
    }
}
