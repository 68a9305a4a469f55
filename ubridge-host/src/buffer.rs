// NativeBuffer: a heap allocation holding one native value.
//
// Every buffer is created through `Host::allocate`, which counts it as live;
// dropping the last `Rc` frees it and decrements the count. Ownership tests
// use the count to prove each owned value is freed exactly once.

use std::cell::{BorrowError, BorrowMutError, Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::value::NativeValue;

pub struct NativeBuffer {
    value: RefCell<NativeValue>,
    live: Rc<Cell<usize>>,
}

impl NativeBuffer {
    pub(crate) fn new(value: NativeValue, live: Rc<Cell<usize>>) -> Self {
        live.set(live.get() + 1);
        NativeBuffer { value: RefCell::new(value), live }
    }

    pub fn borrow(&self) -> Ref<'_, NativeValue> {
        self.value.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, NativeValue> {
        self.value.borrow_mut()
    }

    pub fn try_borrow(&self) -> Result<Ref<'_, NativeValue>, BorrowError> {
        self.value.try_borrow()
    }

    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, NativeValue>, BorrowMutError> {
        self.value.try_borrow_mut()
    }

    /// Clone the contained value.
    pub fn snapshot(&self) -> NativeValue {
        self.value.borrow().clone()
    }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        self.live.set(self.live.get().saturating_sub(1));
    }
}

impl std::fmt::Debug for NativeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBuffer").field("value", &self.value).finish()
    }
}
