// Math built-ins: the core Vector and Vector2D structs, their named
// constants, and conversions to and from glam.

use std::rc::Rc;

use glam::{DVec2, DVec3};
use ubridge_host::{Property, PropertyKind, StructDef, StructHandle, TypeHandle, CPF_BLUEPRINT_VISIBLE, CPF_EDIT};

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::script::{ScriptDict, ScriptType, ScriptValue};
use crate::struct_wrapper::StructWrapper;

pub const VECTOR: &str = "Vector";
pub const VECTOR_2D: &str = "Vector2D";

/// Names accepted by `math_constant`.
pub const VECTOR_CONSTANTS: [&str; 5] = ["ZERO_VECTOR", "ONE_VECTOR", "UP_VECTOR", "FORWARD_VECTOR", "RIGHT_VECTOR"];

/// Add `Vector` and `Vector2D` to the core package (once per host) and bind
/// their script types.
pub fn register_math_types(bridge: &Rc<Bridge>) -> BridgeResult<()> {
    let vector = core_struct(bridge, VECTOR, &["X", "Y", "Z"])?;
    let vector_2d = core_struct(bridge, VECTOR_2D, &["X", "Y"])?;
    let host = bridge.host();
    bridge.types().script_type(host, TypeHandle::Struct(vector))?;
    bridge.types().script_type(host, TypeHandle::Struct(vector_2d))?;
    Ok(())
}

fn core_struct(bridge: &Bridge, name: &str, axes: &[&str]) -> BridgeResult<StructHandle> {
    let host = bridge.host();
    let core = host.core_package();
    if let Some(existing) = host.find_struct_in(core, name) {
        return Ok(existing);
    }
    let mut def = StructDef::new(name, core, None);
    for axis in axes {
        let mut prop = Property::new(*axis, PropertyKind::Double).with_flags(CPF_EDIT | CPF_BLUEPRINT_VISIBLE);
        host.link_property(&mut prop);
        def.properties.push(prop);
    }
    def.hashable = true;
    Ok(host.add_struct(def)?)
}

fn math_type(bridge: &Bridge, name: &str) -> BridgeResult<Rc<ScriptType>> {
    let host = bridge.host();
    let handle = host
        .find_struct_in(host.core_package(), name)
        .ok_or_else(|| BridgeError::exception(format!("Math type '{name}' is not registered")))?;
    bridge.types().script_type(host, TypeHandle::Struct(handle))
}

pub fn vector_type(bridge: &Bridge) -> BridgeResult<Rc<ScriptType>> {
    math_type(bridge, VECTOR)
}

pub fn vector_2d_type(bridge: &Bridge) -> BridgeResult<Rc<ScriptType>> {
    math_type(bridge, VECTOR_2D)
}

/// A fresh `Vector` for one of the named constants, `None` for any other
/// name. Each call returns a new value so callers may mutate it.
pub fn math_constant(bridge: &Rc<Bridge>, name: &str) -> BridgeResult<Option<ScriptValue>> {
    let v = match name {
        "ZERO_VECTOR" => DVec3::ZERO,
        "ONE_VECTOR" => DVec3::ONE,
        "UP_VECTOR" => DVec3::Z,
        "FORWARD_VECTOR" => DVec3::X,
        "RIGHT_VECTOR" => DVec3::Y,
        _ => return Ok(None),
    };
    Ok(Some(ScriptValue::Struct(vector_from_dvec3(bridge, v)?)))
}

// ---------------------------------------------------------------------------
// glam conversions
// ---------------------------------------------------------------------------

pub fn vector_from_dvec3(bridge: &Rc<Bridge>, v: DVec3) -> BridgeResult<Rc<StructWrapper>> {
    let args = [ScriptValue::Float(v.x), ScriptValue::Float(v.y), ScriptValue::Float(v.z)];
    StructWrapper::construct(bridge, &vector_type(bridge)?, &args, &ScriptDict::new())
}

pub fn vector_2d_from_dvec2(bridge: &Rc<Bridge>, v: DVec2) -> BridgeResult<Rc<StructWrapper>> {
    let args = [ScriptValue::Float(v.x), ScriptValue::Float(v.y)];
    StructWrapper::construct(bridge, &vector_2d_type(bridge)?, &args, &ScriptDict::new())
}

pub trait StructVectorExt {
    fn to_dvec3(&self) -> BridgeResult<DVec3>;
    fn to_dvec2(&self) -> BridgeResult<DVec2>;
}

impl StructVectorExt for StructWrapper {
    fn to_dvec3(&self) -> BridgeResult<DVec3> {
        expect_type(self, VECTOR)?;
        Ok(DVec3::new(axis(self, "X")?, axis(self, "Y")?, axis(self, "Z")?))
    }

    fn to_dvec2(&self) -> BridgeResult<DVec2> {
        expect_type(self, VECTOR_2D)?;
        Ok(DVec2::new(axis(self, "X")?, axis(self, "Y")?))
    }
}

fn expect_type(value: &StructWrapper, name: &str) -> BridgeResult<()> {
    if value.type_name() == name {
        Ok(())
    } else {
        Err(BridgeError::type_error(format!("Cannot convert '{}' to '{name}'", value.type_name())))
    }
}

fn axis(value: &StructWrapper, name: &str) -> BridgeResult<f64> {
    let field = value.get_field(name)?;
    field
        .as_float()
        .ok_or_else(|| BridgeError::type_error(format!("'{name}' is a '{}', not a float", field.type_name())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use ubridge_host::Host;

    fn bridge() -> Rc<Bridge> {
        Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap()
    }

    #[test]
    fn vectors_live_in_the_core_package_and_hash() {
        let bridge = bridge();
        let host = bridge.host();
        let vector = host.find_struct_in(host.core_package(), VECTOR).unwrap();
        assert!(host.struct_def(vector).unwrap().hashable);
        assert_eq!(host.type_path(TypeHandle::Struct(vector)), "/Script/CoreUObject.Vector");

        let a = vector_from_dvec3(&bridge, DVec3::new(1.0, 2.0, 3.0)).unwrap();
        let b = vector_from_dvec3(&bridge, DVec3::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
        assert_eq!(a.to_dvec3().unwrap(), DVec3::new(1.0, 2.0, 3.0));
        assert!(a.to_dvec2().is_err());
    }

    #[test]
    fn constants_are_fresh_values() {
        let bridge = bridge();
        let Some(ScriptValue::Struct(up)) = math_constant(&bridge, "UP_VECTOR").unwrap() else {
            panic!("UP_VECTOR is not a struct");
        };
        assert_eq!(up.to_dvec3().unwrap(), DVec3::Z);
        up.set_field("Z", &ScriptValue::Float(5.0), false).unwrap();

        let Some(ScriptValue::Struct(again)) = math_constant(&bridge, "UP_VECTOR").unwrap() else {
            panic!("UP_VECTOR is not a struct");
        };
        assert_eq!(again.to_dvec3().unwrap(), DVec3::Z);
        assert!(math_constant(&bridge, "LEFT_VECTOR").unwrap().is_none());
    }

    #[test]
    fn vector_2d_round_trips_through_glam() {
        let bridge = bridge();
        let v = vector_2d_from_dvec2(&bridge, DVec2::new(-1.5, 4.0)).unwrap();
        assert_eq!(v.type_name(), VECTOR_2D);
        assert_eq!(v.to_dvec2().unwrap(), DVec2::new(-1.5, 4.0));
    }

    #[test]
    fn a_second_bridge_reuses_the_core_structs() {
        let host = Rc::new(Host::new());
        let first = Bridge::new(host.clone(), BridgeConfig::default()).unwrap();
        let second = Bridge::new(host.clone(), BridgeConfig::default()).unwrap();
        assert_eq!(
            vector_type(&first).unwrap().native(),
            vector_type(&second).unwrap().native()
        );
    }
}
