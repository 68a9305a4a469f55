// Garbage collection interfaces (FReferenceCollector / FGCObject).
//
// The host runs a mark/sweep pass in `Host::collect_garbage`. Anything outside
// the object table that keeps objects alive registers a `GcObject`; during the
// mark phase each one reports its handles through a `ReferenceCollector`.
// Collectors receive `&mut ObjectHandle` so a collector may rewrite (null) a
// reference; the mark collector only reads.

use crate::handles::ObjectHandle;

pub trait ReferenceCollector {
    fn add_referenced_object(&mut self, object: &mut ObjectHandle);
}

pub trait GcObject {
    fn add_referenced_objects(&self, collector: &mut dyn ReferenceCollector);

    fn referencer_name(&self) -> String {
        "GcObject".to_string()
    }
}

/// Collector used by the mark phase: records every non-null handle.
#[derive(Default)]
pub(crate) struct MarkCollector {
    pub(crate) found: Vec<ObjectHandle>,
}

impl ReferenceCollector for MarkCollector {
    fn add_referenced_object(&mut self, object: &mut ObjectHandle) {
        if !object.is_null() {
            self.found.push(*object);
        }
    }
}

/// Outcome of one `collect_garbage` pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GcReport {
    /// Objects that survived the pass.
    pub reachable: usize,
    /// Objects destroyed by the pass, in handle order.
    pub destroyed: Vec<ObjectHandle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_collector_skips_null() {
        let mut c = MarkCollector::default();
        let mut a = ObjectHandle(5);
        let mut n = ObjectHandle::NULL;
        c.add_referenced_object(&mut a);
        c.add_referenced_object(&mut n);
        assert_eq!(c.found, vec![ObjectHandle(5)]);
        assert_eq!(a, ObjectHandle(5));
    }
}
