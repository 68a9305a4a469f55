// Reference collector: keeps host objects alive while a script wrapper can
// see them, and nulls wrapper references to objects that are being purged.
//
// The bridge registers itself with the host as a GcObject; during the host's
// mark pass it forwards here. Nothing in this module allocates script values
// or calls into script code.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::{Rc, Weak};

use ubridge_host::{
    Host, NativeValue, ObjectHandle, Property, PropertyKind, ReferenceCollector, StructHandle, StructValue,
};

use crate::bridge::Bridge;
use crate::logging::LOG_WARNING;
use crate::storage::ProxyCell;
use crate::wrapper::{ReportReferencedObjects, WrappedInstance, WrapperKind, WrapperTypeRegistration};

pub struct WrapperReferenceCollector {
    instances: RefCell<BTreeMap<usize, Weak<dyn WrappedInstance>>>,
    next_key: Cell<usize>,
    reporters: HashMap<WrapperKind, ReportReferencedObjects>,
}

impl Default for WrapperReferenceCollector {
    fn default() -> Self {
        WrapperReferenceCollector::new()
    }
}

impl WrapperReferenceCollector {
    pub fn new() -> Self {
        let reporters = inventory::iter::<WrapperTypeRegistration>
            .into_iter()
            .map(|r| (r.kind, r.add_referenced_objects))
            .collect();
        WrapperReferenceCollector { instances: RefCell::new(BTreeMap::new()), next_key: Cell::new(1), reporters }
    }

    /// Register a live wrapper; returns the key to unregister it with.
    pub fn add_wrapped_instance(&self, instance: Weak<dyn WrappedInstance>) -> usize {
        let key = self.next_key.get();
        self.next_key.set(key + 1);
        self.instances.borrow_mut().insert(key, instance);
        key
    }

    pub fn remove_wrapped_instance(&self, key: usize) {
        self.instances.borrow_mut().remove(&key);
    }

    /// Number of registered wrappers.
    pub fn len(&self) -> usize {
        self.instances.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Strong handles to every registered wrapper that is still alive.
    pub fn live_instances(&self) -> Vec<Rc<dyn WrappedInstance>> {
        self.instances.borrow().values().filter_map(Weak::upgrade).collect()
    }

    /// Report every object kept alive by a wrapper. Wrappers whose owner is
    /// still alive are skipped: the owner's storage already contains theirs.
    /// A child that outlived its owner reports its own storage.
    pub fn add_referenced_objects(&self, collector: &mut dyn ReferenceCollector) {
        for instance in self.live_instances() {
            if instance.owner_context().owner().is_some() {
                continue;
            }
            if let Some(report) = self.reporters.get(&instance.wrapper_kind()) {
                report(&*instance, collector);
            }
        }
    }

    /// Null every wrapper reference to `objects` (and, with `include_inners`,
    /// to every object inside them).
    pub fn purge_object_references(&self, host: &Host, objects: &[ObjectHandle], include_inners: bool) {
        let mut doomed: BTreeSet<ObjectHandle> = objects.iter().copied().filter(|h| !h.is_null()).collect();
        if include_inners {
            for object in objects {
                doomed.extend(host.inners_of(*object));
            }
        }
        let mut purger = PurgingCollector { doomed };
        self.add_referenced_objects(&mut purger);
    }
}

/// One-shot collector that nulls references to doomed objects.
struct PurgingCollector {
    doomed: BTreeSet<ObjectHandle>,
}

impl ReferenceCollector for PurgingCollector {
    fn add_referenced_object(&mut self, object: &mut ObjectHandle) {
        if self.doomed.contains(object) {
            *object = ObjectHandle::NULL;
        }
    }
}

/// Report the objects held in a proxy wrapper's storage. Storage that is
/// borrowed elsewhere is skipped with a warning.
pub(crate) fn report_proxy_storage(bridge: &Bridge, state: &ProxyCell, collector: &mut dyn ReferenceCollector) {
    let Ok((prop, storage)) = state.parts() else {
        return;
    };
    let host = bridge.host();
    let walked = storage.write(host, state.what(), |value| {
        add_referenced_objects_from_property(host, &prop, value, collector)
    });
    if let Err(err) = walked {
        crate::blog!(bridge, LOG_WARNING, "Skipped {} during reference collection: {}", state.what(), err.message());
    }
}

// ---------------------------------------------------------------------------
// Recursive property walk
// ---------------------------------------------------------------------------

/// Report every object reachable through `value`, a complete value of
/// `prop` (fixed-size storage included). Returns true if the collector
/// rewrote any handle.
pub fn add_referenced_objects_from_property(
    host: &Host,
    prop: &Property,
    value: &mut NativeValue,
    collector: &mut dyn ReferenceCollector,
) -> bool {
    match value {
        NativeValue::Array(items) if prop.is_fixed_array() => {
            let mut changed = false;
            for item in items.iter_mut() {
                changed |= add_referenced_objects_from_element(host, prop, item, collector);
            }
            changed
        }
        _ => add_referenced_objects_from_element(host, prop, value, collector),
    }
}

/// Walk every field of a struct value.
pub fn add_referenced_objects_from_struct(
    host: &Host,
    struct_type: StructHandle,
    value: &mut StructValue,
    collector: &mut dyn ReferenceCollector,
) -> bool {
    let Ok(props) = host.struct_properties(struct_type) else {
        return false;
    };
    let mut changed = false;
    for (prop, field) in props.iter().zip(value.fields.iter_mut()) {
        changed |= add_referenced_objects_from_property(host, prop, field, collector);
    }
    changed
}

fn add_referenced_objects_from_element(
    host: &Host,
    prop: &Property,
    value: &mut NativeValue,
    collector: &mut dyn ReferenceCollector,
) -> bool {
    match (&prop.kind, value) {
        (PropertyKind::Object(_) | PropertyKind::Interface(_), NativeValue::Object(h)) => {
            let before = *h;
            collector.add_referenced_object(h);
            *h != before
        }
        (PropertyKind::Struct(s), NativeValue::Struct(sv)) => add_referenced_objects_from_struct(host, *s, sv, collector),
        (PropertyKind::Array(inner), NativeValue::Array(items)) => {
            let mut changed = false;
            for item in items.iter_mut() {
                changed |= add_referenced_objects_from_element(host, inner, item, collector);
            }
            changed
        }
        (PropertyKind::Set(inner), NativeValue::Set(set)) => {
            let mut changed = false;
            for (_, item) in set.iter_mut() {
                changed |= add_referenced_objects_from_element(host, inner, item, collector);
            }
            // Elements are keys: a changed element sits in a stale bucket.
            if changed {
                set.rehash(|v| inner.value_hash(v));
            }
            changed
        }
        (PropertyKind::Map(key_prop, value_prop), NativeValue::Map(map)) => {
            let mut keys_changed = false;
            let mut values_changed = false;
            for (_, (k, v)) in map.iter_mut() {
                keys_changed |= add_referenced_objects_from_element(host, key_prop, k, collector);
                values_changed |= add_referenced_objects_from_element(host, value_prop, v, collector);
            }
            if keys_changed {
                map.rehash(|(k, _)| key_prop.value_hash(k));
            }
            keys_changed || values_changed
        }
        _ => false,
    }
}
