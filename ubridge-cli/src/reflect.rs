// JSON view of generated reflection records.

use serde_json::{json, Value};
use ubridge_host::{Host, Property, TypeHandle};
use ubridge_runtime::BridgeResult;

fn hex(flags: impl std::fmt::LowerHex) -> String {
    format!("{flags:#x}")
}

fn property_json(host: &Host, prop: &Property) -> Value {
    json!({
        "name": prop.name,
        "type": host.property_type_name(prop),
        "array_dim": prop.array_dim,
        "flags": hex(prop.flags),
        "metadata": prop.metadata,
    })
}

pub fn type_json(host: &Host, ty: TypeHandle) -> BridgeResult<Value> {
    let path = host.type_path(ty);
    Ok(match ty {
        TypeHandle::Class(class) => {
            let def = host.class_def(class)?;
            let functions: Vec<Value> = def
                .functions
                .iter()
                .map(|func| {
                    json!({
                        "name": func.name,
                        "flags": hex(func.flags),
                        "params": func.params.iter().map(|p| property_json(host, p)).collect::<Vec<_>>(),
                        "metadata": func.metadata,
                    })
                })
                .collect();
            json!({
                "kind": "class",
                "name": def.header.name,
                "path": path,
                "super": def.super_class.map(|s| host.type_path(TypeHandle::Class(s))),
                "flags": hex(def.class_flags),
                "metadata": def.header.metadata,
                "properties": def.properties.iter().map(|p| property_json(host, p)).collect::<Vec<_>>(),
                "functions": functions,
            })
        }
        TypeHandle::Struct(s) => {
            let def = host.struct_def(s)?;
            json!({
                "kind": "struct",
                "name": def.header.name,
                "path": path,
                "super": def.super_struct.map(|s| host.type_path(TypeHandle::Struct(s))),
                "hashable": def.hashable,
                "metadata": def.header.metadata,
                "properties": def.properties.iter().map(|p| property_json(host, p)).collect::<Vec<_>>(),
            })
        }
        TypeHandle::Enum(e) => {
            let def = host.enum_def(e)?;
            let entries: Vec<Value> = def
                .entries
                .iter()
                .map(|entry| json!({ "name": entry.name, "value": entry.value, "metadata": entry.metadata }))
                .collect();
            json!({
                "kind": "enum",
                "name": def.header.name,
                "path": path,
                "metadata": def.header.metadata,
                "entries": entries,
            })
        }
    })
}

/// All records, in the order given.
pub fn types_json(host: &Host, types: &[TypeHandle]) -> BridgeResult<Value> {
    Ok(Value::Array(types.iter().map(|ty| type_json(host, *ty)).collect::<BridgeResult<_>>()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::generate_manifest;
    use crate::manifest::TypesManifest;
    use std::rc::Rc;
    use ubridge_runtime::{Bridge, BridgeConfig};

    #[test]
    fn records_carry_types_and_metadata() {
        let bridge = Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap();
        let manifest = TypesManifest::from_toml_str(
            r#"
            [[enum]]
            name = "Mood"
            values = [{ name = "Calm", value = 1, meta = { DisplayName = "Calm" } }]

            [[struct]]
            name = "Tag"
            doc = "A labelled value."
            properties = [{ name = "Label", type = "str" }, { name = "Weights", type = "Map(Name, float)" }]

            [[class]]
            name = "Npc"

            [[class.functions]]
            name = "Feel"
            params = [{ name = "mood", type = "Mood" }]
            ret = "bool"
            "#,
        )
        .unwrap();
        let handles = generate_manifest(&bridge, &manifest).unwrap();
        let records = types_json(bridge.host(), &handles).unwrap();

        assert_eq!(records[0]["kind"], "enum");
        assert_eq!(records[0]["entries"][0]["value"], 1);
        assert_eq!(records[0]["entries"][0]["metadata"]["DisplayName"], "Calm");

        assert_eq!(records[1]["path"], "/Engine/ScriptTypes.Tag");
        assert_eq!(records[1]["super"], Value::Null);
        assert_eq!(records[1]["hashable"], false);
        assert_eq!(records[1]["metadata"]["ToolTip"], "A labelled value.");
        assert_eq!(records[1]["properties"][1]["type"], "Map(Name, float)");

        assert_eq!(records[2]["super"], "/Script/CoreUObject.Object");
        let params = records[2]["functions"][0]["params"].as_array().unwrap();
        let names: Vec<&str> = params.iter().filter_map(|p| p["name"].as_str()).collect();
        assert!(names.contains(&"mood"));
        assert!(names.contains(&"ReturnValue"));
    }
}
