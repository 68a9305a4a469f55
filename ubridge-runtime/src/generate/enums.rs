// Enum generation. Each declared value becomes an entry, and the type body
// member is replaced by the matching enum value.

use std::rc::Rc;

use ubridge_host::{EnumDef, EnumHandle, TypeHandle};

use super::{generation_error, install, logged, BLUEPRINT_TYPE_METADATA};
use crate::bridge::Bridge;
use crate::defs::MemberDef;
use crate::enum_value::EnumValue;
use crate::error::{BridgeError, BridgeResult};
use crate::logging::LOG_DISPLAY;
use crate::registry::TOOLTIP_METADATA;
use crate::script::{ScriptType, ScriptValue, TypeFamily};

/// Generate a native enum for `ty`. A no-op returning the bound enum when
/// `ty` already has one.
pub fn generate_enum(bridge: &Rc<Bridge>, ty: &Rc<ScriptType>) -> BridgeResult<EnumHandle> {
    if let Some(TypeHandle::Enum(existing)) = ty.native() {
        return Ok(existing);
    }
    logged(bridge, ty, build_enum(bridge, ty))
}

fn build_enum(bridge: &Rc<Bridge>, ty: &Rc<ScriptType>) -> BridgeResult<EnumHandle> {
    if ty.family() != TypeFamily::Enum {
        return Err(BridgeError::type_error(format!("Type '{}' does not derive from a native enum type", ty.name())));
    }
    let mut def = EnumDef::new(ty.name(), bridge.type_container());
    def.header.metadata.insert(BLUEPRINT_TYPE_METADATA.to_string(), "true".to_string());
    if let Some(doc) = ty.doc() {
        def.header.metadata.insert(TOOLTIP_METADATA.to_string(), doc.to_string());
    }
    let mut entries = Vec::new();
    for (field, member) in ty.own_members() {
        let ScriptValue::Def(member) = member else {
            continue;
        };
        match &*member {
            MemberDef::Property(_) => return Err(generation_error("Enums do not support properties")),
            MemberDef::Function(_) => return Err(generation_error("Enums do not support functions")),
            MemberDef::Value(value) => {
                let ScriptValue::Int(v) = value.value else {
                    return Err(generation_error(format!("Enum value '{field}' must be an integer")));
                };
                def.add_entry(field.clone(), v).metadata = value.meta.clone();
                entries.push((field, v));
            }
        }
    }

    let (handle, superseded) = install(bridge, ty.name(), |host| host.add_enum(def))?;
    // Enums carry no instances to reinstance. The set-aside record stays for
    // properties still typed with it, but name lookups resolve the new type.
    if let Some(old) = superseded {
        bridge.types().unregister(old);
    }
    bridge.types().register(TypeHandle::Enum(handle), ty);
    for (field, v) in entries {
        ty.set_member(&field, ScriptValue::Enum(EnumValue::new(ty.clone(), field.clone(), v)));
    }
    crate::blog!(bridge, LOG_DISPLAY, "Generated enum '{}'", bridge.host().type_path(TypeHandle::Enum(handle)));
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::defs::{PropertyDef, TypeRef, ValueDef};
    use ubridge_host::{Host, Metadata, NativeValue, Property, PropertyKind};

    fn bridge() -> Rc<Bridge> {
        Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap()
    }

    fn value(v: ScriptValue) -> ScriptValue {
        ValueDef::new(v, Metadata::new()).unwrap().into()
    }

    #[test]
    fn values_become_entries_and_members() {
        let bridge = bridge();
        let mut meta = Metadata::new();
        meta.insert("DisplayName".to_string(), "Hard Mode".to_string());
        let ty = Rc::new(
            ScriptType::subclass("Difficulty", &bridge.types().enum_base())
                .with_member("Easy", value(ScriptValue::Int(0)))
                .with_member("Hard", ValueDef::new(ScriptValue::Int(2), meta).unwrap().into()),
        );
        let handle = generate_enum(&bridge, &ty).unwrap();
        let host = bridge.host();
        {
            let def = host.enum_def(handle).unwrap();
            assert_eq!(def.value_by_name("Hard"), Some(2));
            assert_eq!(def.entries[1].metadata.get("DisplayName").map(String::as_str), Some("Hard Mode"));
        }

        let Some(ScriptValue::Enum(hard)) = ty.find_member("Hard") else { panic!("member was not replaced") };
        assert_eq!(hard.value(), 2);
        assert_eq!(hard.to_string(), "Difficulty.Hard");

        let mut prop = Property::new("Mode", PropertyKind::Enum(handle));
        host.link_property(&mut prop);
        assert_eq!(bridge.to_native(&ScriptValue::Enum(hard), &prop).unwrap(), NativeValue::Enum(2));
    }

    #[test]
    fn regenerating_an_enum_replaces_its_registration() {
        let bridge = bridge();
        let base = bridge.types().enum_base();
        let first = Rc::new(ScriptType::subclass("Mood", &base).with_member("Calm", value(ScriptValue::Int(0))));
        let old = generate_enum(&bridge, &first).unwrap();
        let second = Rc::new(
            ScriptType::subclass("Mood", &base)
                .with_member("Calm", value(ScriptValue::Int(0)))
                .with_member("Angry", value(ScriptValue::Int(1))),
        );
        let new = generate_enum(&bridge, &second).unwrap();
        assert_ne!(old, new);

        let types = bridge.types();
        assert!(types.get(TypeHandle::Enum(old)).is_none());
        assert!(Rc::ptr_eq(&types.get(TypeHandle::Enum(new)).unwrap(), &second));
        assert!(Rc::ptr_eq(&types.find_by_name("Mood").unwrap(), &second));
        assert_eq!(bridge.host().type_header(TypeHandle::Enum(old)).unwrap().name, "Mood_REINST");
    }

    #[test]
    fn enums_only_accept_integer_values() {
        let bridge = bridge();
        let base = bridge.types().enum_base();
        let text = Rc::new(ScriptType::subclass("Bad", &base).with_member("A", value(ScriptValue::str("a"))));
        assert_eq!(generate_enum(&bridge, &text).unwrap_err().message(), "Enum value 'A' must be an integer");

        let prop = Rc::new(
            ScriptType::subclass("AlsoBad", &base).with_member("P", PropertyDef::new(TypeRef::Int).into()),
        );
        assert_eq!(generate_enum(&bridge, &prop).unwrap_err().message(), "Enums do not support properties");
        assert_eq!(bridge.host().find_enum_in(bridge.type_container(), "Bad"), None);
    }
}
