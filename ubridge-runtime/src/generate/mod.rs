// Native type generation from script-authored types.
//
// Each generator builds the complete native record in memory, validates
// every declared member, and only then touches the host: an existing type of
// the same name in the type container is renamed aside and marked
// superseded, the new record is installed, and the script type is bound to
// it. A failure before installation leaves the host untouched; a failure
// while installing restores the superseded type.

mod class;
mod enums;
mod structs;

pub use class::{generate_class, POST_INIT_FUNCTION};
pub use enums::generate_enum;
pub use structs::generate_struct;

use std::rc::Rc;

use ubridge_host::{
    Host, ObjectHandle, Property, TypeHandle, TypeHeader, CLASS_NEWER_VERSION_EXISTS, CPF_BLUEPRINT_VISIBLE, CPF_EDIT,
    RF_NEWER_VERSION_EXISTS, RF_PUBLIC, RF_STANDALONE,
};

use crate::bridge::Bridge;
use crate::defs::PropertyDef;
use crate::error::{BridgeError, BridgeResult};
use crate::logging::LOG_ERROR;
use crate::script::{ScriptType, TypeFamily};

/// Metadata stamped on every generated class and struct.
pub(crate) const BLUEPRINT_TYPE_METADATA: &str = "BlueprintType";

/// Generate the native twin of `ty`, dispatching on its family.
pub fn generate_type(bridge: &Rc<Bridge>, ty: &Rc<ScriptType>) -> BridgeResult<TypeHandle> {
    match ty.family() {
        TypeFamily::Object => generate_class(bridge, ty).map(TypeHandle::Class),
        TypeFamily::Struct => generate_struct(bridge, ty).map(TypeHandle::Struct),
        TypeFamily::Enum => generate_enum(bridge, ty).map(TypeHandle::Enum),
    }
}

/// Log a generation failure and pass it on.
pub(crate) fn logged<T>(bridge: &Bridge, ty: &ScriptType, result: BridgeResult<T>) -> BridgeResult<T> {
    if let Err(err) = &result {
        crate::blog!(bridge, LOG_ERROR, "Failed to generate '{}': {}", ty.name(), err.message());
    }
    result
}

pub(crate) fn generation_error(msg: impl Into<String>) -> BridgeError {
    BridgeError::Generation(msg.into())
}

/// A native property for a declared `PropertyDef`, visible to scripts and
/// editors, carrying the declaration's metadata.
pub(crate) fn declared_property(host: &Host, field: &str, def: &PropertyDef) -> BridgeResult<Property> {
    let mut prop = def.ty.to_property(field).ok_or_else(|| {
        generation_error(format!("Failed to create property for '{field}' ({})", def.ty.friendly_name()))
    })?;
    prop.flags |= CPF_EDIT | CPF_BLUEPRINT_VISIBLE;
    for (key, value) in &def.meta {
        prop.set_metadata(key.clone(), value.clone());
    }
    host.link_property(&mut prop);
    Ok(prop)
}

pub(crate) fn base_collision(field: &str, def: &PropertyDef) -> BridgeError {
    generation_error(format!(
        "Property '{field}' ({}) cannot override a property from the base type",
        def.ty.friendly_name()
    ))
}

// ---------------------------------------------------------------------------
// Superseding
// ---------------------------------------------------------------------------

/// A previous type of the generated name, renamed to `{Name}_REINST` and
/// flagged as having a newer version.
pub(crate) struct Superseded {
    pub handle: TypeHandle,
    name: String,
    object_flags: u32,
}

impl Superseded {
    /// Rename aside whatever type called `name` lives in `package`.
    pub(crate) fn take(host: &Host, package: ObjectHandle, name: &str) -> BridgeResult<Option<Superseded>> {
        let Some(handle) = host.find_type_in(package, name) else {
            return Ok(None);
        };
        let object_flags = host.type_header(handle)?.object_flags;
        let aside = host.make_unique_type_name(package, &format!("{name}_REINST"));
        host.rename_type(handle, &aside)?;
        with_header_mut(host, handle, |header| {
            header.object_flags = (header.object_flags | RF_NEWER_VERSION_EXISTS) & !(RF_PUBLIC | RF_STANDALONE);
        })?;
        if let TypeHandle::Class(c) = handle {
            host.class_def_mut(c)?.class_flags |= CLASS_NEWER_VERSION_EXISTS;
        }
        Ok(Some(Superseded { handle, name: name.to_string(), object_flags }))
    }

    /// Undo `take` after the replacement failed to install. Each step is
    /// attempted; failures are logged and leave the old type set aside.
    pub(crate) fn restore(self, bridge: &Bridge) {
        let host = bridge.host();
        let object_flags = self.object_flags;
        if let Err(err) = host.rename_type(self.handle, &self.name) {
            let err = BridgeError::from(err);
            crate::blog!(bridge, LOG_ERROR, "Failed to restore the name of '{}': {}", self.name, err.message());
        }
        if let Err(err) = with_header_mut(host, self.handle, |header| header.object_flags = object_flags) {
            crate::blog!(bridge, LOG_ERROR, "Failed to restore the flags of '{}': {}", self.name, err.message());
        }
        if let TypeHandle::Class(c) = self.handle {
            match host.class_def_mut(c) {
                Ok(mut def) => def.class_flags &= !CLASS_NEWER_VERSION_EXISTS,
                Err(err) => {
                    let err = BridgeError::from(err);
                    crate::blog!(bridge, LOG_ERROR, "Failed to restore the class flags of '{}': {}", self.name, err.message());
                }
            }
        }
    }
}

fn with_header_mut(host: &Host, handle: TypeHandle, f: impl FnOnce(&mut TypeHeader)) -> BridgeResult<()> {
    match handle {
        TypeHandle::Class(c) => f(&mut host.class_def_mut(c)?.header),
        TypeHandle::Struct(s) => f(&mut host.struct_def_mut(s)?.header),
        TypeHandle::Enum(e) => f(&mut host.enum_def_mut(e)?.header),
    }
    Ok(())
}

/// Install a record built for `name`, superseding any previous type of that
/// name in the bridge's type container.
pub(crate) fn install<H>(
    bridge: &Bridge,
    name: &str,
    add: impl FnOnce(&Host) -> ubridge_host::HostResult<H>,
) -> BridgeResult<(H, Option<TypeHandle>)> {
    let host = bridge.host();
    let superseded = Superseded::take(host, bridge.type_container(), name)?;
    match add(host) {
        Ok(handle) => Ok((handle, superseded.map(|s| s.handle))),
        Err(err) => {
            if let Some(old) = superseded {
                old.restore(bridge);
            }
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use ubridge_host::StructDef;

    #[test]
    fn superseded_types_are_renamed_and_flagged() {
        let bridge = Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap();
        let host = bridge.host();
        let package = bridge.type_container();
        let old = host.add_struct(StructDef::new("Pair", package, None)).unwrap();

        let taken = Superseded::take(host, package, "Pair").unwrap().unwrap();
        assert_eq!(taken.handle, TypeHandle::Struct(old));
        let header = host.type_header(TypeHandle::Struct(old)).unwrap();
        assert_eq!(header.name, "Pair_REINST");
        assert_ne!(header.object_flags & RF_NEWER_VERSION_EXISTS, 0);
        assert_eq!(header.object_flags & (RF_PUBLIC | RF_STANDALONE), 0);

        taken.restore(&bridge);
        let header = host.type_header(TypeHandle::Struct(old)).unwrap();
        assert_eq!(header.name, "Pair");
        assert_eq!(header.object_flags & RF_NEWER_VERSION_EXISTS, 0);
    }

    #[test]
    fn restore_failures_are_logged() {
        let bridge = Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap();
        let host = bridge.host();
        let package = bridge.type_container();
        let old = host.add_struct(StructDef::new("Pair", package, None)).unwrap();
        let taken = Superseded::take(host, package, "Pair").unwrap().unwrap();
        let squatter = host.add_struct(StructDef::new("Pair", package, None)).unwrap();

        taken.restore(&bridge);
        assert_eq!(host.find_type_in(package, "Pair"), Some(TypeHandle::Struct(squatter)));
        assert_eq!(host.type_header(TypeHandle::Struct(old)).unwrap().name, "Pair_REINST");
        let errors: Vec<String> = host
            .log_sink()
            .records()
            .into_iter()
            .filter(|r| r.verbosity == LOG_ERROR)
            .map(|r| r.message)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Failed to restore the name of 'Pair'"));
    }

    #[test]
    fn a_failed_install_restores_the_old_type() {
        let bridge = Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap();
        let host = bridge.host();
        let package = bridge.type_container();
        let old = host.add_struct(StructDef::new("Pair", package, None)).unwrap();
        let result = install(&bridge, "Pair", |host| {
            host.add_struct(StructDef::new("Pair", package, Some(ubridge_host::StructHandle::NULL)))
        });
        assert!(result.is_err());
        assert_eq!(host.find_type_in(package, "Pair"), Some(TypeHandle::Struct(old)));
    }
}
