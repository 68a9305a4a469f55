// Fixed array proxy: a property with `array_dim > 1`, seen from script as a
// sequence whose length never changes.

use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

use ubridge_host::{NativeValue, Property, ReferenceCollector};

use crate::array::{convert_items, not_found, resolve_index, sequence_items};
use crate::bridge::Bridge;
use crate::collector::report_proxy_storage;
use crate::error::{BridgeError, BridgeResult};
use crate::policy::{init_storage, ConversionMethod, OwnerContext};
use crate::script::ScriptValue;
use crate::storage::{NativeRef, ProxyCell, ProxyState};
use crate::wrapper::{
    equality_compare, hash_combine, unhashable, CompareOp, WrappedInstance, WrapperBase, WrapperKind,
    WrapperTypeRegistration,
};

const WHAT: &str = "FixedArrayInstance";
const TYPE_NAME: &str = "FixedArray";

pub struct FixedArrayWrapper {
    base: WrapperBase,
    state: ProxyCell,
}

impl FixedArrayWrapper {
    fn alloc(bridge: &Rc<Bridge>) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<FixedArrayWrapper>| FixedArrayWrapper {
            base: WrapperBase::new(bridge, this),
            state: ProxyCell::empty(WHAT),
        })
    }

    /// `len` default elements of `element`.
    pub fn new(bridge: &Rc<Bridge>, element: &Property, len: usize) -> BridgeResult<Rc<Self>> {
        if len < 2 {
            return Err(BridgeError::value_error(format!("Fixed arrays need at least 2 elements (got {len})")));
        }
        let mut prop = element.clone().with_array_dim(len);
        bridge.host().link_property(&mut prop);
        let value = bridge.host().default_complete_value(&prop)?;
        Ok(Self::from_value(bridge, prop, value))
    }

    fn from_value(bridge: &Rc<Bridge>, prop: Property, value: NativeValue) -> Rc<Self> {
        let storage = NativeRef::owned(bridge.host().allocate(value));
        let wrapper = Self::alloc(bridge);
        wrapper.state.init(ProxyState { owner: OwnerContext::none(), prop: Rc::new(prop), storage });
        wrapper
    }

    pub fn wrap(
        bridge: &Rc<Bridge>,
        owner: OwnerContext,
        prop: &Property,
        source: &NativeRef,
        method: ConversionMethod,
    ) -> BridgeResult<Rc<Self>> {
        if !prop.is_fixed_array() {
            return Err(BridgeError::Internal(format!("'{}' ({}) is not a fixed array property", prop.name, prop.class_name())));
        }
        let storage = init_storage(bridge.host(), &owner, source, method, WHAT)?;
        let wrapper = Self::alloc(bridge);
        wrapper.state.init(ProxyState { owner, prop: Rc::new(prop.clone()), storage });
        Ok(wrapper)
    }

    /// Convert `value` to a fixed array shaped like `prop`: the same wrapper
    /// if it already is one, else any sized sequence of exactly the right
    /// length.
    pub fn cast(bridge: &Rc<Bridge>, value: &ScriptValue, prop: &Property) -> BridgeResult<Rc<Self>> {
        if let ScriptValue::FixedArray(existing) = value {
            if existing.property()?.same_type(prop) {
                return Ok(existing.clone());
            }
        }
        let Some(items) = sequence_items(value)? else {
            return Err(BridgeError::TypeError(format!("Cannot cast type '{}' to '{TYPE_NAME}'", value.type_name())));
        };
        if items.len() != prop.array_dim {
            return Err(BridgeError::TypeError(format!(
                "Cannot cast type '{}' to '{TYPE_NAME}' (expected {} elements, got {})",
                value.type_name(),
                prop.array_dim,
                items.len()
            )));
        }
        let element = element_of(prop);
        let natives = convert_items(bridge, &items, &element)?;
        Ok(Self::from_value(bridge, prop.clone(), NativeValue::Array(natives)))
    }

    // -----------------------------------------------------------------------
    // Storage access
    // -----------------------------------------------------------------------

    pub fn property(&self) -> BridgeResult<Rc<Property>> {
        Ok(self.state.parts()?.0)
    }

    pub fn native_value(&self) -> BridgeResult<NativeValue> {
        let (_, storage) = self.state.parts()?;
        storage.snapshot(self.base.host(), WHAT)
    }

    fn items(&self) -> BridgeResult<Vec<NativeValue>> {
        match self.native_value()? {
            NativeValue::Array(items) => Ok(items),
            _ => Err(BridgeError::null_internal(WHAT)),
        }
    }

    fn needle(&self, value: &ScriptValue) -> BridgeResult<(Property, NativeValue)> {
        let element = element_of(&*self.property()?);
        let native = self.base.bridge().to_native_element(value, &element)?;
        Ok((element, native))
    }

    // -----------------------------------------------------------------------
    // Sequence protocol
    // -----------------------------------------------------------------------

    pub fn len(&self) -> BridgeResult<usize> {
        Ok(self.property()?.array_dim)
    }

    pub fn is_empty(&self) -> BridgeResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get_item(&self, index: i64) -> BridgeResult<ScriptValue> {
        let prop = self.property()?;
        let items = self.items()?;
        let i = resolve_index(index, items.len(), &prop)?;
        self.base.bridge().to_script_element(&element_of(&prop), &items[i])
    }

    pub fn set_item(&self, index: i64, value: &ScriptValue) -> BridgeResult<()> {
        let (prop, storage) = self.state.parts()?;
        let i = resolve_index(index, prop.array_dim, &prop)?;
        let (_, native) = self.needle(value)?;
        storage.write(self.base.host(), WHAT, |v| match v {
            NativeValue::Array(items) if i < items.len() => {
                items[i] = native;
                Ok(())
            }
            _ => Err(BridgeError::null_internal(WHAT)),
        })??;
        self.state.owner().notify_changed();
        Ok(())
    }

    pub fn contains(&self, value: &ScriptValue) -> BridgeResult<bool> {
        Ok(self.count(value)? > 0)
    }

    pub fn count(&self, value: &ScriptValue) -> BridgeResult<usize> {
        let (element, needle) = self.needle(value)?;
        Ok(self.items()?.iter().filter(|item| element.identical(item, &needle)).count())
    }

    pub fn index(&self, value: &ScriptValue) -> BridgeResult<usize> {
        let (element, needle) = self.needle(value)?;
        self.items()?.iter().position(|item| element.identical(item, &needle)).ok_or_else(not_found)
    }

    // -----------------------------------------------------------------------
    // Copy, comparison, hashing, display
    // -----------------------------------------------------------------------

    pub fn copy(&self) -> BridgeResult<Rc<Self>> {
        let (prop, storage) = self.state.parts()?;
        Self::wrap(self.base.bridge(), OwnerContext::none(), &prop, &storage, ConversionMethod::Copy)
    }

    pub fn equals(&self, other: &ScriptValue) -> BridgeResult<Option<bool>> {
        let prop = self.property()?;
        let Ok(other) = Self::cast(self.base.bridge(), other, &prop) else {
            return Ok(None);
        };
        let ours = self.items()?;
        let theirs = other.items()?;
        Ok(Some(ours.len() == theirs.len() && ours.iter().zip(&theirs).all(|(a, b)| prop.identical(a, b))))
    }

    pub fn compare(&self, op: CompareOp, other: &ScriptValue) -> BridgeResult<Option<bool>> {
        equality_compare(op, self.equals(other)?, TYPE_NAME)
    }

    pub fn hash(&self) -> BridgeResult<u32> {
        let prop = self.property()?;
        if !prop.has_value_hash() {
            return Err(unhashable());
        }
        Ok(self.items()?.iter().fold(0, |seed, item| hash_combine(seed, prop.value_hash(item))))
    }

    pub fn values(&self) -> BridgeResult<Vec<ScriptValue>> {
        let element = element_of(&*self.property()?);
        let bridge = self.base.bridge();
        self.items()?.iter().map(|item| bridge.to_script_element(&element, item)).collect()
    }

    pub fn to_display_string(&self) -> BridgeResult<String> {
        let parts: Vec<String> = self.values()?.iter().map(ScriptValue::repr).collect();
        Ok(format!("[{}]", parts.join(", ")))
    }
}

/// The single-element property of a fixed array property.
fn element_of(prop: &Property) -> Property {
    let mut element = prop.clone();
    element.array_dim = 1;
    element
}

impl fmt::Debug for FixedArrayWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedArrayWrapper")
            .field("owner", &self.owner_context())
            .finish_non_exhaustive()
    }
}

impl WrappedInstance for FixedArrayWrapper {
    fn wrapper_kind(&self) -> WrapperKind {
        WrapperKind::FixedArray
    }

    fn owner_context(&self) -> OwnerContext {
        self.state.owner()
    }

    fn on_child_changed(&self, _property: Option<&str>) {
        self.state.owner().notify_changed();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn report_referenced_objects(instance: &dyn WrappedInstance, collector: &mut dyn ReferenceCollector) {
    if let Some(array) = instance.as_any().downcast_ref::<FixedArrayWrapper>() {
        report_proxy_storage(array.base.bridge(), &array.state, collector);
    }
}

inventory::submit! {
    WrapperTypeRegistration {
        kind: WrapperKind::FixedArray,
        name: "FixedArray",
        add_referenced_objects: report_referenced_objects,
    }
}
