// Native storage addressing for wrappers.
//
// A NativeRef names a value either in a host buffer the wrapper (or an
// ancestor) owns, or in a field of a live host object, followed by a path of
// struct field indices. Reference wrappers for struct fields extend their
// parent's path, so every wrapper in an owner chain sees the same storage.

use std::cell::RefCell;
use std::rc::Rc;

use ubridge_host::{Host, NativeBuffer, NativeValue, ObjectHandle, Property};

use crate::error::{BridgeError, BridgeResult};
use crate::policy::OwnerContext;

#[derive(Clone, Debug)]
enum StorageRoot {
    Buffer(Rc<NativeBuffer>),
    Object(ObjectHandle),
}

#[derive(Clone, Debug)]
pub struct NativeRef {
    root: StorageRoot,
    path: Vec<usize>,
}

impl NativeRef {
    /// The whole value held in `buffer`.
    pub fn owned(buffer: Rc<NativeBuffer>) -> Self {
        NativeRef { root: StorageRoot::Buffer(buffer), path: Vec::new() }
    }

    /// Field `index` (class layout order) of a host object.
    pub fn object_field(object: ObjectHandle, index: usize) -> Self {
        NativeRef { root: StorageRoot::Object(object), path: vec![index] }
    }

    /// Struct field `index` of the value this ref points at.
    pub fn field(&self, index: usize) -> Self {
        let mut path = self.path.clone();
        path.push(index);
        NativeRef { root: self.root.clone(), path }
    }

    /// The host object this storage lives in, if any.
    pub fn object(&self) -> Option<ObjectHandle> {
        match self.root {
            StorageRoot::Object(h) => Some(h),
            StorageRoot::Buffer(_) => None,
        }
    }

    /// True when this ref names the whole of a buffer, not a part of one.
    pub fn is_whole_buffer(&self) -> bool {
        matches!(self.root, StorageRoot::Buffer(_)) && self.path.is_empty()
    }

    pub fn read<R>(&self, host: &Host, what: &str, f: impl FnOnce(&NativeValue) -> R) -> BridgeResult<R> {
        match &self.root {
            StorageRoot::Buffer(buffer) => {
                let value = buffer.try_borrow().map_err(|_| busy(what))?;
                walk(&value, &self.path).map(f).ok_or_else(|| BridgeError::null_internal(what))
            }
            StorageRoot::Object(h) => {
                let (first, rest) = self.path.split_first().ok_or_else(|| BridgeError::null_internal(what))?;
                host.with_fields(*h, |fields| fields.get(*first).and_then(|v| walk(v, rest)).map(f))?
                    .ok_or_else(|| BridgeError::null_internal(what))
            }
        }
    }

    pub fn write<R>(&self, host: &Host, what: &str, f: impl FnOnce(&mut NativeValue) -> R) -> BridgeResult<R> {
        match &self.root {
            StorageRoot::Buffer(buffer) => {
                let mut value = buffer.try_borrow_mut().map_err(|_| busy(what))?;
                walk_mut(&mut value, &self.path).map(f).ok_or_else(|| BridgeError::null_internal(what))
            }
            StorageRoot::Object(h) => {
                let (first, rest) = self.path.split_first().ok_or_else(|| BridgeError::null_internal(what))?;
                host.with_fields(*h, |fields| fields.get_mut(*first).and_then(|v| walk_mut(v, rest)).map(f))?
                    .ok_or_else(|| BridgeError::null_internal(what))
            }
        }
    }

    pub fn snapshot(&self, host: &Host, what: &str) -> BridgeResult<NativeValue> {
        self.read(host, what, NativeValue::clone)
    }

    pub fn replace(&self, host: &Host, what: &str, value: NativeValue) -> BridgeResult<()> {
        self.write(host, what, |slot| *slot = value)
    }
}

fn busy(what: &str) -> BridgeError {
    BridgeError::Exception(format!("Storage for '{what}' is already in use"))
}

fn walk<'a>(value: &'a NativeValue, path: &[usize]) -> Option<&'a NativeValue> {
    path.iter().try_fold(value, |v, &i| match v {
        NativeValue::Struct(s) => s.fields.get(i),
        _ => None,
    })
}

fn walk_mut<'a>(value: &'a mut NativeValue, path: &[usize]) -> Option<&'a mut NativeValue> {
    path.iter().try_fold(value, |v, &i| match v {
        NativeValue::Struct(s) => s.fields.get_mut(i),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Proxy state shared by container and struct wrappers
// ---------------------------------------------------------------------------

pub(crate) struct ProxyState {
    pub owner: OwnerContext,
    pub prop: Rc<Property>,
    pub storage: NativeRef,
}

/// Uninitialized -> Initialized -> Deinitialized state of a proxy wrapper.
pub(crate) struct ProxyCell {
    what: &'static str,
    state: RefCell<Option<ProxyState>>,
}

impl ProxyCell {
    pub fn empty(what: &'static str) -> Self {
        ProxyCell { what, state: RefCell::new(None) }
    }

    pub fn what(&self) -> &'static str {
        self.what
    }

    /// Install new state; any previous state is released first.
    pub fn init(&self, state: ProxyState) {
        self.deinit();
        *self.state.borrow_mut() = Some(state);
    }

    pub fn deinit(&self) {
        let old = self.state.borrow_mut().take();
        drop(old);
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Property and storage, or the `Internal Error - X is null!` error.
    pub fn parts(&self) -> BridgeResult<(Rc<Property>, NativeRef)> {
        self.state
            .borrow()
            .as_ref()
            .map(|s| (s.prop.clone(), s.storage.clone()))
            .ok_or_else(|| BridgeError::null_internal(self.what))
    }

    pub fn owner(&self) -> OwnerContext {
        self.state.borrow().as_ref().map(|s| s.owner.clone()).unwrap_or_default()
    }
}
