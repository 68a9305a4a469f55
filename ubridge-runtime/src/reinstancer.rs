// Reinstancer: after a type is regenerated, moves live instances of the
// superseded type onto its replacement.
//
// Generators only queue (old, new) pairs; `process_pending` does the work
// once a whole module has been (re)generated, so a class and the structs it
// uses are swapped together.

use std::cell::RefCell;
use std::rc::Rc;

use ubridge_host::{ClassHandle, StructHandle, TypeHandle};

use crate::bridge::Bridge;
use crate::error::BridgeResult;
use crate::logging::{LOG_DISPLAY, LOG_WARNING};
use crate::struct_wrapper::StructWrapper;

#[derive(Default)]
pub struct Reinstancer {
    pending_classes: RefCell<Vec<(ClassHandle, ClassHandle)>>,
    pending_structs: RefCell<Vec<(StructHandle, StructHandle)>>,
}

impl Reinstancer {
    pub fn add_pending_class(&self, old: ClassHandle, new: ClassHandle) {
        self.pending_classes.borrow_mut().push((old, new));
    }

    pub fn add_pending_struct(&self, old: StructHandle, new: StructHandle) {
        self.pending_structs.borrow_mut().push((old, new));
    }

    /// Queued (classes, structs).
    pub fn pending(&self) -> (usize, usize) {
        (self.pending_classes.borrow().len(), self.pending_structs.borrow().len())
    }

    pub fn clear(&self) {
        self.pending_classes.borrow_mut().clear();
        self.pending_structs.borrow_mut().clear();
    }

    /// Reinstance everything queued. Returns the number of objects and
    /// struct wrappers moved onto a new type.
    pub fn process_pending(&self, bridge: &Rc<Bridge>) -> BridgeResult<usize> {
        let classes = std::mem::take(&mut *self.pending_classes.borrow_mut());
        let structs = std::mem::take(&mut *self.pending_structs.borrow_mut());
        let mut moved = 0;
        for (old, new) in structs {
            moved += reinstance_structs(bridge, old, new);
        }
        for (old, new) in classes {
            moved += reinstance_objects(bridge, old, new);
        }
        if moved > 0 {
            crate::blog!(bridge, LOG_DISPLAY, "Reinstanced {moved} instance(s)");
        }
        Ok(moved)
    }
}

fn reinstance_objects(bridge: &Rc<Bridge>, old: ClassHandle, new: ClassHandle) -> usize {
    let host = bridge.host();
    let ty = bridge.types().get(TypeHandle::Class(new));
    let mut moved = 0;
    for object in host.objects_of_class(old) {
        if let Err(err) = host.reinstance_object(object, new) {
            crate::blog!(bridge, LOG_WARNING, "Failed to reinstance '{}': {err}", host.path_name(object));
            continue;
        }
        if let (Some(wrapper), Some(ty)) = (bridge.objects().find(object), &ty) {
            wrapper.set_script_type(ty);
        }
        moved += 1;
    }
    bridge.types().unregister(TypeHandle::Class(old));
    moved
}

/// Only wrappers that own their value are moved; a struct stored inside a
/// container or object field belongs to that storage's type.
fn reinstance_structs(bridge: &Rc<Bridge>, old: StructHandle, new: StructHandle) -> usize {
    let Some(ty) = bridge.types().get(TypeHandle::Struct(new)) else {
        return 0;
    };
    let mut moved = 0;
    for instance in bridge.collector().live_instances() {
        let Some(wrapper) = instance.as_any().downcast_ref::<StructWrapper>() else {
            continue;
        };
        if !wrapper.owns_storage() || wrapper.struct_handle().ok() != Some(old) {
            continue;
        }
        match wrapper.reinstance(new, &ty) {
            Ok(()) => moved += 1,
            Err(err) => crate::blog!(bridge, LOG_WARNING, "Failed to reinstance struct '{}': {}", ty.name(), err.message()),
        }
    }
    bridge.types().unregister(TypeHandle::Struct(old));
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::defs::{PropertyDef, TypeRef};
    use crate::generate::{generate_class, generate_struct};
    use crate::object_wrapper::ObjectWrapper;
    use crate::script::{ScriptDict, ScriptType, ScriptValue};
    use ubridge_host::Host;

    fn bridge() -> Rc<Bridge> {
        Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap()
    }

    fn counter_type(bridge: &Rc<Bridge>, extra: Option<&str>) -> Rc<ScriptType> {
        let mut ty = ScriptType::subclass("Counter", &bridge.types().object_type())
            .with_member("Count", PropertyDef::new(TypeRef::Int).into());
        if let Some(extra) = extra {
            ty = ty.with_member(extra, PropertyDef::new(TypeRef::Str).into());
        }
        Rc::new(ty)
    }

    #[test]
    fn live_objects_move_to_the_new_class() {
        let bridge = bridge();
        let v1 = counter_type(&bridge, None);
        generate_class(&bridge, &v1).unwrap();
        let counter = ObjectWrapper::construct(&bridge, &v1, None, None).unwrap();
        counter.set_attr("Count", &ScriptValue::Int(3)).unwrap();

        let v2 = counter_type(&bridge, Some("Label"));
        let new_class = generate_class(&bridge, &v2).unwrap();
        assert_eq!(bridge.reinstancer().pending(), (1, 0));
        assert_eq!(bridge.reinstancer().process_pending(&bridge).unwrap(), 1);
        assert_eq!(bridge.reinstancer().pending(), (0, 0));

        assert_eq!(bridge.host().class_of(counter.handle().unwrap()).unwrap(), new_class);
        assert!(Rc::ptr_eq(&counter.script_type(), &v2));
        assert_eq!(counter.get_attr("Count").unwrap().as_int(), Some(3));
        assert_eq!(counter.get_attr("Label").unwrap().as_str(), Some(""));
    }

    #[test]
    fn owned_struct_wrappers_move_to_the_new_struct() {
        let bridge = bridge();
        let point = |second: TypeRef| {
            Rc::new(
                ScriptType::subclass("Point", &bridge.types().struct_base())
                    .with_member("X", PropertyDef::new(TypeRef::Int).into())
                    .with_member("Y", PropertyDef::new(second).into()),
            )
        };
        let v1 = point(TypeRef::Int);
        generate_struct(&bridge, &v1).unwrap();
        let value = StructWrapper::construct(&bridge, &v1, &[ScriptValue::Int(4), ScriptValue::Int(5)], &ScriptDict::new())
            .unwrap();

        let v2 = point(TypeRef::Str);
        let new_struct = generate_struct(&bridge, &v2).unwrap();
        assert_eq!(bridge.reinstancer().process_pending(&bridge).unwrap(), 1);
        assert_eq!(value.struct_handle().unwrap(), new_struct);
        assert_eq!(value.get_field("X").unwrap().as_int(), Some(4));
        assert_eq!(value.get_field("Y").unwrap().as_str(), Some(""));
    }
}
