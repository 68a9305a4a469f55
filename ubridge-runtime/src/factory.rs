// Object wrapper factory: at most one live wrapper per host object.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use ubridge_host::{ObjectHandle, TypeHandle};

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::object_wrapper::ObjectWrapper;

#[derive(Default)]
pub struct ObjectWrapperFactory {
    instances: RefCell<HashMap<ObjectHandle, Weak<ObjectWrapper>>>,
}

impl ObjectWrapperFactory {
    /// The live wrapper for `object`, or a new one typed after its class.
    pub fn find_or_create(&self, bridge: &Rc<Bridge>, object: ObjectHandle) -> BridgeResult<Rc<ObjectWrapper>> {
        if object.is_null() {
            return Err(BridgeError::null_internal("ObjectInstance"));
        }
        let host = bridge.host();
        if !host.is_valid(object) {
            return Err(BridgeError::ObjectDestroyed);
        }
        if let Some(existing) = self.find(object) {
            return Ok(existing);
        }
        let class = host.class_of(object)?;
        let ty = bridge.types().script_type(host, TypeHandle::Class(class))?;
        let wrapper = ObjectWrapper::new(bridge, object, &ty);
        let mut instances = self.instances.borrow_mut();
        instances.retain(|_, w| w.strong_count() > 0);
        instances.insert(object, Rc::downgrade(&wrapper));
        Ok(wrapper)
    }

    /// The live wrapper for `object`, if any. Purged wrappers no longer
    /// count as wrapping their old object.
    pub fn find(&self, object: ObjectHandle) -> Option<Rc<ObjectWrapper>> {
        let existing = self.instances.borrow().get(&object).and_then(Weak::upgrade);
        existing.filter(|w| w.raw_handle() == object)
    }

    /// Every live wrapper still bound to its object.
    pub fn live_wrappers(&self) -> Vec<Rc<ObjectWrapper>> {
        let instances = self.instances.borrow();
        instances
            .iter()
            .filter_map(|(h, w)| w.upgrade().filter(|w| w.raw_handle() == *h))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.instances.borrow().values().filter(|w| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
