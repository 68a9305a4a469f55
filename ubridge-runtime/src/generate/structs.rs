// Struct generation.

use std::rc::Rc;

use ubridge_host::{Host, Property, StructDef, StructHandle, TypeHandle};

use super::{base_collision, declared_property, generation_error, install, logged, BLUEPRINT_TYPE_METADATA};
use crate::bridge::Bridge;
use crate::defs::{MemberDef, PropertyDef};
use crate::error::{BridgeError, BridgeResult};
use crate::logging::LOG_DISPLAY;
use crate::registry::{build_descriptors, TOOLTIP_METADATA};
use crate::script::{ScriptType, ScriptValue, TypeFamily};

/// Generate a native struct for `ty`. A no-op returning the bound struct
/// when `ty` already has one.
pub fn generate_struct(bridge: &Rc<Bridge>, ty: &Rc<ScriptType>) -> BridgeResult<StructHandle> {
    if let Some(TypeHandle::Struct(existing)) = ty.native() {
        return Ok(existing);
    }
    logged(bridge, ty, build_struct(bridge, ty))
}

fn build_struct(bridge: &Rc<Bridge>, ty: &Rc<ScriptType>) -> BridgeResult<StructHandle> {
    if ty.family() != TypeFamily::Struct {
        return Err(BridgeError::type_error(format!("Type '{}' does not derive from a native struct type", ty.name())));
    }
    let super_struct = match ty.base() {
        Some(base) if Rc::ptr_eq(&base, &bridge.types().struct_base()) => None,
        Some(base) => match base.native() {
            Some(TypeHandle::Struct(s)) => Some(s),
            _ => return Err(generation_error("No super struct could be found for this script type")),
        },
        None => return Err(generation_error("No super struct could be found for this script type")),
    };

    let host = bridge.host();
    let mut def = StructDef::new(ty.name(), bridge.type_container(), super_struct);
    def.header.metadata.insert(BLUEPRINT_TYPE_METADATA.to_string(), "true".to_string());
    if let Some(doc) = ty.doc() {
        def.header.metadata.insert(TOOLTIP_METADATA.to_string(), doc.to_string());
    }
    for (field, member) in ty.own_members() {
        let ScriptValue::Def(member) = member else {
            continue;
        };
        match &*member {
            MemberDef::Value(_) => return Err(generation_error("Structs do not support values")),
            MemberDef::Function(_) => return Err(generation_error("Structs do not support functions")),
            MemberDef::Property(prop) => def.properties.push(struct_property(host, super_struct, &field, prop)?),
        }
    }
    def.hashable = def.properties.iter().all(Property::has_value_hash) && super_is_hashable(host, super_struct)?;

    let descriptors = build_descriptors(&def.properties, &[]);
    let (handle, superseded) = install(bridge, ty.name(), |host| host.add_struct(def))?;
    bridge.types().register(TypeHandle::Struct(handle), ty);
    ty.set_descriptors(descriptors);
    crate::blog!(bridge, LOG_DISPLAY, "Generated struct '{}'", host.type_path(TypeHandle::Struct(handle)));

    if let Some(TypeHandle::Struct(old)) = superseded {
        bridge.reinstancer().add_pending_struct(old, handle);
    }
    Ok(handle)
}

fn struct_property(
    host: &Host,
    super_struct: Option<StructHandle>,
    field: &str,
    def: &PropertyDef,
) -> BridgeResult<Property> {
    if def.getter.is_some() || def.setter.is_some() {
        return Err(generation_error(format!("Struct property '{field}' cannot specify a getter or setter")));
    }
    if super_struct.is_some_and(|s| host.find_struct_property(s, field).is_some()) {
        return Err(base_collision(field, def));
    }
    declared_property(host, field, def)
}

fn super_is_hashable(host: &Host, super_struct: Option<StructHandle>) -> BridgeResult<bool> {
    match super_struct {
        Some(s) => Ok(host.struct_def(s)?.hashable),
        None => Ok(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::defs::{FunctionDef, TypeRef};
    use crate::map::MapWrapper;
    use crate::script::{ScriptDict, ScriptFunction};
    use crate::struct_wrapper::StructWrapper;
    use ubridge_host::PropertyKind;

    fn bridge() -> Rc<Bridge> {
        Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap()
    }

    fn pair_type(bridge: &Rc<Bridge>, second: TypeRef) -> Rc<ScriptType> {
        Rc::new(
            ScriptType::subclass("Pair", &bridge.types().struct_base())
                .with_member("First", PropertyDef::new(TypeRef::Int).into())
                .with_member("Second", PropertyDef::new(second).into()),
        )
    }

    #[test]
    fn generated_structs_are_constructible() {
        let bridge = bridge();
        let ty = pair_type(&bridge, TypeRef::Str);
        let handle = generate_struct(&bridge, &ty).unwrap();
        let host = bridge.host();
        assert!(host.struct_def(handle).unwrap().hashable);
        assert_eq!(
            host.struct_def(handle).unwrap().header.metadata.get(BLUEPRINT_TYPE_METADATA).map(String::as_str),
            Some("true")
        );

        let kwargs = ScriptDict::from_str_pairs([("Second", ScriptValue::str("two"))]);
        let pair = StructWrapper::construct(&bridge, &ty, &[ScriptValue::Int(1)], &kwargs).unwrap();
        assert_eq!(pair.get_field("First").unwrap().as_int(), Some(1));
        assert_eq!(pair.get_field("Second").unwrap().as_str(), Some("two"));
        assert_eq!(generate_struct(&bridge, &ty).unwrap(), handle);
    }

    #[test]
    fn generated_structs_cast_from_sequences_and_mappings() {
        let bridge = bridge();
        let ty = Rc::new(
            ScriptType::subclass("Coord", &bridge.types().struct_base())
                .with_member("x", PropertyDef::new(TypeRef::Int).into())
                .with_member("y", PropertyDef::new(TypeRef::Int).into()),
        );
        generate_struct(&bridge, &ty).unwrap();
        let coords = |c: &StructWrapper| (c.get_field("x").unwrap().as_int(), c.get_field("y").unwrap().as_int());

        let from_tuple = StructWrapper::cast(&bridge, &ScriptValue::tuple(vec![ScriptValue::Int(5), ScriptValue::Int(7)]), &ty).unwrap();
        assert_eq!(coords(&from_tuple), (Some(5), Some(7)));

        let from_dict = StructWrapper::cast(&bridge, &ScriptValue::str_dict([("x", ScriptValue::Int(9))]), &ty).unwrap();
        assert_eq!(coords(&from_dict), (Some(9), Some(0)));

        let map = MapWrapper::new(&bridge, &Property::new("Key", PropertyKind::Str), &Property::new("Value", PropertyKind::Int32)).unwrap();
        map.set_item(&ScriptValue::str("y"), &ScriptValue::Int(2)).unwrap();
        let from_map = StructWrapper::cast(&bridge, &ScriptValue::Map(map), &ty).unwrap();
        assert_eq!(coords(&from_map), (Some(0), Some(2)));
    }

    #[test]
    fn structs_reject_functions_values_and_accessors() {
        let bridge = bridge();
        let base = bridge.types().struct_base();
        let func = Rc::new(ScriptFunction::new("f", vec![], |_| Ok(ScriptValue::None)));

        let with_func = Rc::new(ScriptType::subclass("A", &base).with_member("f", FunctionDef::new(func).into()));
        assert_eq!(generate_struct(&bridge, &with_func).unwrap_err().message(), "Structs do not support functions");

        let with_getter = Rc::new(
            ScriptType::subclass("B", &base)
                .with_member("X", PropertyDef::new(TypeRef::Int).with_getter("GetX").into()),
        );
        assert_eq!(
            generate_struct(&bridge, &with_getter).unwrap_err().message(),
            "Struct property 'X' cannot specify a getter or setter"
        );

        let object = bridge.types().object_type();
        assert_eq!(
            generate_struct(&bridge, &object).unwrap_err().message(),
            "Type 'Object' does not derive from a native struct type"
        );
    }

    #[test]
    fn derived_structs_extend_their_base() {
        let bridge = bridge();
        let pair = pair_type(&bridge, TypeRef::Int);
        let base = generate_struct(&bridge, &pair).unwrap();
        let triple = Rc::new(
            ScriptType::subclass("Triple", &pair).with_member("Third", PropertyDef::new(TypeRef::Double).into()),
        );
        let derived = generate_struct(&bridge, &triple).unwrap();
        let host = bridge.host();
        assert!(host.is_child_struct_of(derived, base));
        let names: Vec<String> = host.struct_properties(derived).unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);

        let clash = Rc::new(ScriptType::subclass("Clash", &pair).with_member("First", PropertyDef::new(TypeRef::Str).into()));
        assert_eq!(
            generate_struct(&bridge, &clash).unwrap_err().message(),
            "Property 'First' (str) cannot override a property from the base type"
        );
    }

    #[test]
    fn regenerating_queues_the_old_struct() {
        let bridge = bridge();
        let old = generate_struct(&bridge, &pair_type(&bridge, TypeRef::Int)).unwrap();
        let new = generate_struct(&bridge, &pair_type(&bridge, TypeRef::Str)).unwrap();
        assert_ne!(old, new);
        assert_eq!(bridge.host().type_name(TypeHandle::Struct(old)), "Pair_REINST");
        assert_eq!(bridge.reinstancer().pending(), (0, 1));
    }
}
