// Dynamic array proxy: the script-side sequence protocol over native array
// storage of one element property.
//
// Elements read out of the array are copies; struct and container elements
// do not write back. Script values are converted to native elements before
// the storage is borrowed, so `a.extend(a)` and similar self-references are
// safe. Every successful mutation is reported to the owner context, if any.

use std::any::Any;
use std::fmt;
use std::cmp::Ordering;
use std::rc::{Rc, Weak};

use ubridge_host::{NativeValue, Property, PropertyKind, ReferenceCollector};

use crate::bridge::Bridge;
use crate::collector::report_proxy_storage;
use crate::error::{BridgeError, BridgeResult};
use crate::policy::{init_storage, ConversionMethod, OwnerContext};
use crate::script::{script_cmp, ScriptFunction, ScriptValue};
use crate::storage::{NativeRef, ProxyCell, ProxyState};
use crate::wrapper::{
    equality_compare, hash_combine, unhashable, CompareOp, WrappedInstance, WrapperBase, WrapperKind,
    WrapperTypeRegistration,
};

const WHAT: &str = "ArrayInstance";
const TYPE_NAME: &str = "Array";

pub struct ArrayWrapper {
    base: WrapperBase,
    state: ProxyCell,
}

impl ArrayWrapper {
    fn alloc(bridge: &Rc<Bridge>) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<ArrayWrapper>| ArrayWrapper {
            base: WrapperBase::new(bridge, this),
            state: ProxyCell::empty(WHAT),
        })
    }

    /// Empty array of `element`, in storage the wrapper owns.
    pub fn new(bridge: &Rc<Bridge>, element: &Property) -> Rc<Self> {
        Self::from_items(bridge, element, Vec::new())
    }

    fn from_items(bridge: &Rc<Bridge>, element: &Property, items: Vec<NativeValue>) -> Rc<Self> {
        let mut inner = element.clone();
        inner.array_dim = 1;
        let mut prop = Property::new(element.name.clone(), PropertyKind::Array(Box::new(inner)));
        bridge.host().link_property(&mut prop);
        let storage = NativeRef::owned(bridge.host().allocate(NativeValue::Array(items)));
        let wrapper = Self::alloc(bridge);
        wrapper.state.init(ProxyState { owner: OwnerContext::none(), prop: Rc::new(prop), storage });
        wrapper
    }

    /// Wrap the array value at `source` under `method`.
    pub fn wrap(
        bridge: &Rc<Bridge>,
        owner: OwnerContext,
        prop: &Property,
        source: &NativeRef,
        method: ConversionMethod,
    ) -> BridgeResult<Rc<Self>> {
        if prop.element_property().is_none() || !matches!(prop.kind, PropertyKind::Array(_)) {
            return Err(BridgeError::Internal(format!("'{}' ({}) is not an array property", prop.name, prop.class_name())));
        }
        let mut prop = prop.clone();
        prop.array_dim = 1;
        let storage = init_storage(bridge.host(), &owner, source, method, WHAT)?;
        let wrapper = Self::alloc(bridge);
        wrapper.state.init(ProxyState { owner, prop: Rc::new(prop), storage });
        Ok(wrapper)
    }

    /// Convert `value` to an array of `element`.
    ///
    /// An array with the same element type is returned as-is. An array of a
    /// different element type is converted element by element through text
    /// export/import. Any other sized, non-mapping iterable is converted item
    /// by item.
    pub fn cast(bridge: &Rc<Bridge>, value: &ScriptValue, element: &Property) -> BridgeResult<Rc<Self>> {
        let host = bridge.host();
        if let ScriptValue::Array(array) = value {
            let source_element = array.element_property()?;
            if source_element.same_type(element) {
                return Ok(array.clone());
            }
            let mut items = Vec::new();
            for (index, item) in array.native_items()?.iter().enumerate() {
                let exported = host.export_text(&source_element, item);
                let imported = host.import_text(element, &exported).ok_or_else(|| {
                    BridgeError::Exception(format!(
                        "Failed to import text '{exported}' element for property '{}' ({}) at index {index}",
                        element.name,
                        element.class_name()
                    ))
                })?;
                items.push(imported);
            }
            return Ok(Self::from_items(bridge, element, items));
        }

        let Some(sequence) = sequence_items(value)? else {
            return Err(BridgeError::TypeError(format!("Cannot cast type '{}' to '{TYPE_NAME}'", value.type_name())));
        };
        let items = convert_items(bridge, &sequence, element)?;
        Ok(Self::from_items(bridge, element, items))
    }

    // -----------------------------------------------------------------------
    // Storage access
    // -----------------------------------------------------------------------

    pub fn bridge(&self) -> &Rc<Bridge> {
        self.base.bridge()
    }

    /// Property describing this array (kind `Array(element)`).
    pub fn property(&self) -> BridgeResult<Rc<Property>> {
        Ok(self.state.parts()?.0)
    }

    pub fn element_property(&self) -> BridgeResult<Property> {
        let prop = self.property()?;
        prop.element_property().cloned().ok_or_else(|| BridgeError::null_internal("ArrayProp"))
    }

    /// Snapshot of the whole native array value.
    pub fn native_value(&self) -> BridgeResult<NativeValue> {
        let (_, storage) = self.state.parts()?;
        storage.snapshot(self.base.host(), WHAT)
    }

    fn native_items(&self) -> BridgeResult<Vec<NativeValue>> {
        self.read(|_, items| items.clone())
    }

    fn read<R>(&self, f: impl FnOnce(&Property, &Vec<NativeValue>) -> R) -> BridgeResult<R> {
        let (prop, storage) = self.state.parts()?;
        let element = prop.element_property().ok_or_else(|| BridgeError::null_internal("ArrayProp"))?;
        storage.read(self.base.host(), WHAT, |value| match value {
            NativeValue::Array(items) => Ok(f(element, items)),
            _ => Err(BridgeError::null_internal(WHAT)),
        })?
    }

    fn write<R>(&self, f: impl FnOnce(&Property, &mut Vec<NativeValue>) -> R) -> BridgeResult<R> {
        let (prop, storage) = self.state.parts()?;
        let element = prop.element_property().ok_or_else(|| BridgeError::null_internal("ArrayProp"))?;
        let result = storage.write(self.base.host(), WHAT, |value| match value {
            NativeValue::Array(items) => Ok(f(element, items)),
            _ => Err(BridgeError::null_internal(WHAT)),
        })??;
        self.state.owner().notify_changed();
        Ok(result)
    }

    fn to_element(&self, value: &ScriptValue, element: &Property) -> BridgeResult<NativeValue> {
        self.bridge().to_native_element(value, element)
    }

    /// Conversion for values being inserted into the array.
    fn to_inserted_element(&self, value: &ScriptValue) -> BridgeResult<NativeValue> {
        let element = self.element_property()?;
        self.to_element(value, &element).map_err(|err| match err {
            BridgeError::TypeError(_) => BridgeError::TypeError(format!(
                "Failed to convert '{}' to an element of '{TYPE_NAME}' for insertion",
                value.type_name()
            )),
            other => other,
        })
    }

    fn to_script_items(&self, items: &[NativeValue], element: &Property) -> BridgeResult<Vec<ScriptValue>> {
        items.iter().map(|item| self.bridge().to_script_element(element, item)).collect()
    }

    // -----------------------------------------------------------------------
    // Sequence protocol
    // -----------------------------------------------------------------------

    pub fn len(&self) -> BridgeResult<usize> {
        self.read(|_, items| items.len())
    }

    pub fn is_empty(&self) -> BridgeResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get_item(&self, index: i64) -> BridgeResult<ScriptValue> {
        let element = self.element_property()?;
        let (prop, _) = self.state.parts()?;
        let item = self.read(|_, items| resolve_index(index, items.len(), &prop).map(|i| items[i].clone()))??;
        self.bridge().to_script_element(&element, &item)
    }

    pub fn set_item(&self, index: i64, value: &ScriptValue) -> BridgeResult<()> {
        let (prop, _) = self.state.parts()?;
        let element = self.element_property()?;
        let len = self.len()?;
        let i = resolve_index(index, len, &prop)?;
        let native = self.to_element(value, &element).map_err(|err| element_error(err, &element, i))?;
        self.write(|_, items| match items.get_mut(i) {
            Some(slot) => {
                *slot = native;
                Ok(())
            }
            None => Err(index_error(index, items.len(), &prop)),
        })?
    }

    pub fn del_item(&self, index: i64) -> BridgeResult<()> {
        let (prop, _) = self.state.parts()?;
        self.write(|_, items| {
            let i = resolve_index(index, items.len(), &prop)?;
            items.remove(i);
            Ok(())
        })?
    }

    /// `value in array`. A value that cannot be converted to the element
    /// type is a TypeError.
    pub fn contains(&self, value: &ScriptValue) -> BridgeResult<bool> {
        Ok(self.count(value)? > 0)
    }

    pub fn count(&self, value: &ScriptValue) -> BridgeResult<usize> {
        let element = self.element_property()?;
        let needle = self.to_element(value, &element)?;
        self.read(|element, items| items.iter().filter(|item| element.identical(item, &needle)).count())
    }

    /// Index of the first element equal to `value` within `start..stop`.
    pub fn index(&self, value: &ScriptValue, start: Option<i64>, stop: Option<i64>) -> BridgeResult<usize> {
        let element = self.element_property()?;
        let needle = self.to_element(value, &element)?;
        let found = self.read(|element, items| {
            let (start, stop) = clamp_range(start, stop, items.len());
            (start..stop).find(|&i| element.identical(&items[i], &needle))
        })?;
        found.ok_or_else(not_found)
    }

    // -----------------------------------------------------------------------
    // Concatenation and repetition
    // -----------------------------------------------------------------------

    /// `self + other`, as a new array.
    pub fn concat(&self, other: &ScriptValue) -> BridgeResult<Rc<Self>> {
        let result = self.copy()?;
        result.concat_inplace(other)?;
        Ok(result)
    }

    /// `self += other`.
    pub fn concat_inplace(&self, other: &ScriptValue) -> BridgeResult<()> {
        let element = self.element_property()?;
        let other_array = Self::cast(self.bridge(), other, &element).map_err(|_| {
            BridgeError::TypeError(format!(
                "Cannot concatenate types '{TYPE_NAME}' and '{}' together",
                other.type_name()
            ))
        })?;
        let extra = other_array.native_items()?;
        self.write(|_, items| items.extend(extra))
    }

    /// `self * count`, as a new array. Counts below one give an empty array.
    pub fn repeat(&self, count: i64) -> BridgeResult<Rc<Self>> {
        let result = self.copy()?;
        result.repeat_inplace(count)?;
        Ok(result)
    }

    pub fn repeat_inplace(&self, count: i64) -> BridgeResult<()> {
        self.write(|_, items| {
            if count <= 0 {
                items.clear();
                return;
            }
            let once = items.clone();
            for _ in 1..count {
                items.extend(once.iter().cloned());
            }
        })
    }

    // -----------------------------------------------------------------------
    // List methods
    // -----------------------------------------------------------------------

    pub fn append(&self, value: &ScriptValue) -> BridgeResult<()> {
        let native = self.to_inserted_element(value)?;
        self.write(|_, items| items.push(native))
    }

    /// Append every item of an iterable.
    pub fn extend(&self, values: &ScriptValue) -> BridgeResult<()> {
        let items = values.iter_values()?.ok_or_else(|| {
            BridgeError::TypeError(format!("'{}' object is not iterable", values.type_name()))
        })?;
        let element = self.element_property()?;
        let natives = convert_items(self.bridge(), &items, &element)?;
        self.write(|_, items| items.extend(natives))
    }

    /// Insert before `index`; out-of-range indices clamp to either end.
    pub fn insert(&self, index: i64, value: &ScriptValue) -> BridgeResult<()> {
        let native = self.to_inserted_element(value)?;
        self.write(|_, items| {
            let len = items.len() as i64;
            let at = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(at as usize, native);
        })
    }

    /// Remove and return the element at `index` (default: the last one).
    pub fn pop(&self, index: Option<i64>) -> BridgeResult<ScriptValue> {
        let (prop, _) = self.state.parts()?;
        let element = self.element_property()?;
        let removed = self.write(|_, items| {
            let i = resolve_index(index.unwrap_or(-1), items.len(), &prop)?;
            Ok::<_, BridgeError>(items.remove(i))
        })??;
        self.bridge().to_script_element(&element, &removed)
    }

    /// Remove the first element equal to `value`.
    pub fn remove(&self, value: &ScriptValue) -> BridgeResult<()> {
        let index = self.index(value, None, None)?;
        self.write(|_, items| {
            items.remove(index);
        })
    }

    pub fn reverse(&self) -> BridgeResult<()> {
        self.write(|_, items| items.reverse())
    }

    /// Stable sort. Native element types expose no ordering, so elements
    /// are ordered as script values (or by `key` applied to them) and the
    /// resulting order is applied back to the native storage.
    pub fn sort(&self, key: Option<&ScriptFunction>, reverse: bool) -> BridgeResult<()> {
        let element = self.element_property()?;
        let natives = self.native_items()?;
        let values = self.to_script_items(&natives, &element)?;
        let keys = match key {
            Some(key) => values.iter().map(|v| key.call(std::slice::from_ref(v))).collect::<BridgeResult<Vec<_>>>()?,
            None => values,
        };

        let mut order: Vec<usize> = (0..natives.len()).collect();
        let mut failure = None;
        order.sort_by(|&a, &b| match script_cmp(&keys[a], &keys[b]) {
            Ok(ordering) if reverse => ordering.reverse(),
            Ok(ordering) => ordering,
            Err(err) => {
                failure.get_or_insert(err);
                Ordering::Equal
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }

        let sorted: Vec<NativeValue> = order.into_iter().map(|i| natives[i].clone()).collect();
        self.write(|_, items| *items = sorted)
    }

    /// Grow with default elements or truncate to `len`.
    pub fn resize(&self, len: usize) -> BridgeResult<()> {
        let element = self.element_property()?;
        let default = self.bridge().host().default_value(&element)?;
        self.write(|_, items| items.resize(len, default))
    }

    // -----------------------------------------------------------------------
    // Slicing
    // -----------------------------------------------------------------------

    pub fn get_slice(&self, start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> BridgeResult<Rc<Self>> {
        check_step(step)?;
        let element = self.element_property()?;
        let items = self.read(|_, items| {
            let (start, stop) = clamp_range(start, stop, items.len());
            items[start..stop.max(start)].to_vec()
        })?;
        Ok(Self::from_items(self.bridge(), &element, items))
    }

    /// Replace `start..stop` with the items of `value`, or delete the range
    /// when `value` is `None`.
    pub fn set_slice(
        &self,
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
        value: Option<&ScriptValue>,
    ) -> BridgeResult<()> {
        check_step(step)?;
        let replacement = match value {
            Some(value) => {
                let element = self.element_property()?;
                let source = Self::cast(self.bridge(), value, &element).map_err(|_| {
                    BridgeError::TypeError(format!(
                        "Cannot assign type '{}' to type '{TYPE_NAME}' during a slice",
                        value.type_name()
                    ))
                })?;
                source.native_items()?
            }
            None => Vec::new(),
        };
        self.write(|_, items| {
            let (start, stop) = clamp_range(start, stop, items.len());
            items.splice(start..stop.max(start), replacement);
        })
    }

    // -----------------------------------------------------------------------
    // Copy, comparison, hashing, display
    // -----------------------------------------------------------------------

    /// Deep copy into storage the new wrapper owns.
    pub fn copy(&self) -> BridgeResult<Rc<Self>> {
        let (prop, storage) = self.state.parts()?;
        Self::wrap(self.bridge(), OwnerContext::none(), &prop, &storage, ConversionMethod::Copy)
    }

    /// Element-wise equality against anything castable to this array type;
    /// `None` when `other` is not comparable.
    pub fn equals(&self, other: &ScriptValue) -> BridgeResult<Option<bool>> {
        let element = self.element_property()?;
        let Ok(other) = Self::cast(self.bridge(), other, &element) else {
            return Ok(None);
        };
        let theirs = other.native_items()?;
        self.read(|element, items| {
            Some(items.len() == theirs.len() && items.iter().zip(&theirs).all(|(a, b)| element.identical(a, b)))
        })
    }

    pub fn compare(&self, op: CompareOp, other: &ScriptValue) -> BridgeResult<Option<bool>> {
        equality_compare(op, self.equals(other)?, TYPE_NAME)
    }

    /// Combined element hash; an error if the element type has no value hash.
    pub fn hash(&self) -> BridgeResult<u32> {
        self.read(|element, items| {
            if !element.has_value_hash() {
                return Err(unhashable());
            }
            Ok(items.iter().fold(0, |seed, item| hash_combine(seed, element.value_hash(item))))
        })?
    }

    /// Copies of every element, in order.
    pub fn values(&self) -> BridgeResult<Vec<ScriptValue>> {
        let element = self.element_property()?;
        let items = self.native_items()?;
        self.to_script_items(&items, &element)
    }

    pub fn to_display_string(&self) -> BridgeResult<String> {
        let parts: Vec<String> = self.values()?.iter().map(ScriptValue::repr).collect();
        Ok(format!("[{}]", parts.join(", ")))
    }
}

impl fmt::Debug for ArrayWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayWrapper")
            .field("owner", &self.owner_context())
            .finish_non_exhaustive()
    }
}

impl WrappedInstance for ArrayWrapper {
    fn wrapper_kind(&self) -> WrapperKind {
        WrapperKind::Array
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
    if let Some(array) = instance.as_any().downcast_ref::<ArrayWrapper>() {
        report_proxy_storage(array.base.bridge(), &array.state, collector);
    }
}

inventory::submit! {
    WrapperTypeRegistration {
        kind: WrapperKind::Array,
        name: "Array",
        add_referenced_objects: report_referenced_objects,
    }
}

// ---------------------------------------------------------------------------
// Shared sequence helpers
// ---------------------------------------------------------------------------

/// Items of a sized, non-mapping iterable; `None` for anything else.
pub(crate) fn sequence_items(value: &ScriptValue) -> BridgeResult<Option<Vec<ScriptValue>>> {
    if value.is_mapping() || value.length()?.is_none() {
        return Ok(None);
    }
    value.iter_values()
}

/// Convert script items to native elements, naming the failing index.
pub(crate) fn convert_items(
    bridge: &Rc<Bridge>,
    items: &[ScriptValue],
    element: &Property,
) -> BridgeResult<Vec<NativeValue>> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| bridge.to_native_element(item, element).map_err(|err| element_error(err, element, i)))
        .collect()
}

fn element_error(err: BridgeError, element: &Property, index: usize) -> BridgeError {
    match err {
        BridgeError::TypeError(_) => BridgeError::TypeError(format!(
            "Failed to convert element property '{}' ({}) at index {index}",
            element.name,
            element.class_name()
        )),
        other => other,
    }
}

/// Resolve a possibly negative index against `len`.
pub(crate) fn resolve_index(index: i64, len: usize, prop: &Property) -> BridgeResult<usize> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved >= len as i64 {
        return Err(index_error(index, len, prop));
    }
    Ok(resolved as usize)
}

fn index_error(index: i64, len: usize, prop: &Property) -> BridgeError {
    BridgeError::IndexError(format!(
        "Index {index} is out-of-bounds (len: {len}) for property '{}' ({})",
        prop.name,
        prop.class_name()
    ))
}

/// Clamp optional slice bounds to `0..=len`, counting negatives from the end.
pub(crate) fn clamp_range(start: Option<i64>, stop: Option<i64>, len: usize) -> (usize, usize) {
    let len = len as i64;
    let clamp = |v: i64| if v < 0 { (v + len).max(0) } else { v.min(len) };
    let start = start.map_or(0, clamp);
    let stop = stop.map_or(len, clamp);
    (start as usize, stop as usize)
}

fn check_step(step: Option<i64>) -> BridgeResult<()> {
    match step {
        None | Some(1) => Ok(()),
        Some(_) => Err(BridgeError::Exception("Slice step must be 1".to_string())),
    }
}

pub(crate) fn not_found() -> BridgeError {
    BridgeError::ValueError("The given value was not found in the array".to_string())
}
