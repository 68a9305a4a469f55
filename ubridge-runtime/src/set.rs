// Set proxy: the script-side set protocol over native sparse hash storage.
//
// Elements are located through the element property's value hash and
// compared with `identical`. The element type must support value hashing.

use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

use ubridge_host::{NativeValue, Property, PropertyKind, ReferenceCollector, SetStorage};

use crate::array::sequence_items;
use crate::bridge::Bridge;
use crate::collector::report_proxy_storage;
use crate::error::{BridgeError, BridgeResult};
use crate::policy::{init_storage, ConversionMethod, OwnerContext};
use crate::script::ScriptValue;
use crate::storage::{NativeRef, ProxyCell, ProxyState};
use crate::wrapper::{
    equality_compare, unhashable, CompareOp, WrappedInstance, WrapperBase, WrapperKind, WrapperTypeRegistration,
};

const WHAT: &str = "SetInstance";
const TYPE_NAME: &str = "Set";

pub struct SetWrapper {
    base: WrapperBase,
    state: ProxyCell,
}

impl SetWrapper {
    fn alloc(bridge: &Rc<Bridge>) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<SetWrapper>| SetWrapper {
            base: WrapperBase::new(bridge, this),
            state: ProxyCell::empty(WHAT),
        })
    }

    /// Empty set of `element`.
    pub fn new(bridge: &Rc<Bridge>, element: &Property) -> BridgeResult<Rc<Self>> {
        Self::from_elements(bridge, element, Vec::new())
    }

    fn from_elements(bridge: &Rc<Bridge>, element: &Property, values: Vec<NativeValue>) -> BridgeResult<Rc<Self>> {
        let mut inner = element.clone();
        inner.array_dim = 1;
        let mut prop = Property::new(element.name.clone(), PropertyKind::Set(Box::new(inner)));
        bridge.host().link_property(&mut prop);
        let inner = require_hashable(&prop)?;
        let mut set = SetStorage::new();
        for value in values {
            insert(&mut set, inner, value);
        }
        let storage = NativeRef::owned(bridge.host().allocate(NativeValue::Set(set)));
        let wrapper = Self::alloc(bridge);
        wrapper.state.init(ProxyState { owner: OwnerContext::none(), prop: Rc::new(prop), storage });
        Ok(wrapper)
    }

    pub fn wrap(
        bridge: &Rc<Bridge>,
        owner: OwnerContext,
        prop: &Property,
        source: &NativeRef,
        method: ConversionMethod,
    ) -> BridgeResult<Rc<Self>> {
        if !matches!(prop.kind, PropertyKind::Set(_)) {
            return Err(BridgeError::Internal(format!("'{}' ({}) is not a set property", prop.name, prop.class_name())));
        }
        require_hashable(prop)?;
        let mut prop = prop.clone();
        prop.array_dim = 1;
        let storage = init_storage(bridge.host(), &owner, source, method, WHAT)?;
        let wrapper = Self::alloc(bridge);
        wrapper.state.init(ProxyState { owner, prop: Rc::new(prop), storage });
        Ok(wrapper)
    }

    /// Convert `value` to a set of `element`: the same set if the element
    /// types match, a text-converted copy of a set of another element type,
    /// or the distinct items of any sized, non-mapping iterable.
    pub fn cast(bridge: &Rc<Bridge>, value: &ScriptValue, element: &Property) -> BridgeResult<Rc<Self>> {
        let host = bridge.host();
        if let ScriptValue::Set(set) = value {
            let source_element = set.element_property()?;
            if source_element.same_type(element) {
                return Ok(set.clone());
            }
            let mut converted = Vec::new();
            for (index, item) in set.native_elements()?.iter().enumerate() {
                let exported = host.export_text(&source_element, item);
                let imported = host.import_text(element, &exported).ok_or_else(|| {
                    BridgeError::Exception(format!(
                        "Failed to import text '{exported}' element for property '{}' ({}) at index {index}",
                        element.name,
                        element.class_name()
                    ))
                })?;
                converted.push(imported);
            }
            return Self::from_elements(bridge, element, converted);
        }

        let Some(items) = sequence_items(value)? else {
            return Err(BridgeError::TypeError(format!("Cannot cast type '{}' to '{TYPE_NAME}'", value.type_name())));
        };
        let mut converted = Vec::with_capacity(items.len());
        for item in &items {
            converted.push(bridge.to_native_element(item, element).map_err(|err| element_error(err, element))?);
        }
        Self::from_elements(bridge, element, converted)
    }

    // -----------------------------------------------------------------------
    // Storage access
    // -----------------------------------------------------------------------

    pub fn property(&self) -> BridgeResult<Rc<Property>> {
        Ok(self.state.parts()?.0)
    }

    pub fn element_property(&self) -> BridgeResult<Property> {
        let prop = self.property()?;
        prop.element_property().cloned().ok_or_else(|| BridgeError::null_internal("SetProp"))
    }

    pub fn native_value(&self) -> BridgeResult<NativeValue> {
        let (_, storage) = self.state.parts()?;
        storage.snapshot(self.base.host(), WHAT)
    }

    fn native_elements(&self) -> BridgeResult<Vec<NativeValue>> {
        self.read(|_, set| set.values().cloned().collect())
    }

    fn read<R>(&self, f: impl FnOnce(&Property, &SetStorage) -> R) -> BridgeResult<R> {
        let (prop, storage) = self.state.parts()?;
        let element = prop.element_property().ok_or_else(|| BridgeError::null_internal("SetProp"))?;
        storage.read(self.base.host(), WHAT, |value| match value {
            NativeValue::Set(set) => Ok(f(element, set)),
            _ => Err(BridgeError::null_internal(WHAT)),
        })?
    }

    fn write<R>(&self, f: impl FnOnce(&Property, &mut SetStorage) -> R) -> BridgeResult<R> {
        let (prop, storage) = self.state.parts()?;
        let element = prop.element_property().ok_or_else(|| BridgeError::null_internal("SetProp"))?;
        let result = storage.write(self.base.host(), WHAT, |value| match value {
            NativeValue::Set(set) => Ok(f(element, set)),
            _ => Err(BridgeError::null_internal(WHAT)),
        })??;
        self.state.owner().notify_changed();
        Ok(result)
    }

    fn to_element(&self, value: &ScriptValue) -> BridgeResult<NativeValue> {
        let element = self.element_property()?;
        self.base.bridge().to_native_element(value, &element).map_err(|err| element_error(err, &element))
    }

    /// Elements of the `index`th argument of a multi-argument set operation.
    fn argument(&self, index: Option<usize>, other: &ScriptValue) -> BridgeResult<Vec<NativeValue>> {
        let element = self.element_property()?;
        let cast = Self::cast(self.base.bridge(), other, &element).map_err(|_| {
            BridgeError::TypeError(match index {
                Some(i) => format!("Cannot convert argument {i} ({}) to '{TYPE_NAME}'", other.type_name()),
                None => format!("Cannot convert argument ({}) to '{TYPE_NAME}'", other.type_name()),
            })
        })?;
        cast.native_elements()
    }

    fn arguments(&self, others: &[ScriptValue]) -> BridgeResult<Vec<Vec<NativeValue>>> {
        others.iter().enumerate().map(|(i, other)| self.argument(Some(i), other)).collect()
    }

    fn with_elements(&self, values: Vec<NativeValue>) -> BridgeResult<Rc<Self>> {
        Self::from_elements(self.base.bridge(), &self.element_property()?, values)
    }

    // -----------------------------------------------------------------------
    // Set protocol
    // -----------------------------------------------------------------------

    pub fn len(&self) -> BridgeResult<usize> {
        self.read(|_, set| set.len())
    }

    pub fn is_empty(&self) -> BridgeResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, value: &ScriptValue) -> BridgeResult<bool> {
        let needle = self.to_element(value)?;
        self.read(|element, set| find(set, element, &needle).is_some())
    }

    pub fn add(&self, value: &ScriptValue) -> BridgeResult<()> {
        let native = self.to_element(value)?;
        self.write(|element, set| {
            insert(set, element, native);
        })
    }

    /// Remove `value` if present.
    pub fn discard(&self, value: &ScriptValue) -> BridgeResult<()> {
        let needle = self.to_element(value)?;
        if self.read(|element, set| find(set, element, &needle))?.is_none() {
            return Ok(());
        }
        self.write(|element, set| {
            if let Some(index) = find(set, element, &needle) {
                set.remove_at(index);
            }
        })
    }

    /// Remove `value`; KeyError if it is absent.
    pub fn remove(&self, value: &ScriptValue) -> BridgeResult<()> {
        let needle = self.to_element(value)?;
        let Some(index) = self.read(|element, set| find(set, element, &needle))? else {
            return Err(BridgeError::KeyError("The given value was not found in the set".to_string()));
        };
        self.write(|_, set| {
            set.remove_at(index);
        })
    }

    /// Remove and return an arbitrary element; KeyError if empty.
    pub fn pop(&self) -> BridgeResult<ScriptValue> {
        let element = self.element_property()?;
        let Some(index) = self.read(|_, set| set.first_index())? else {
            return Err(BridgeError::KeyError("Cannot pop from an empty set".to_string()));
        };
        let removed = self.write(|_, set| set.remove_at(index))?;
        let removed = removed.ok_or_else(|| BridgeError::null_internal(WHAT))?;
        self.base.bridge().to_script_element(&element, &removed)
    }

    pub fn clear(&self) -> BridgeResult<()> {
        self.write(|_, set| set.clear())
    }

    // -----------------------------------------------------------------------
    // Set algebra
    // -----------------------------------------------------------------------

    /// Elements of this set that are in none of `others`.
    pub fn difference(&self, others: &[ScriptValue]) -> BridgeResult<Rc<Self>> {
        let result = self.copy()?;
        result.difference_update(others)?;
        Ok(result)
    }

    pub fn difference_update(&self, others: &[ScriptValue]) -> BridgeResult<()> {
        let others = self.arguments(others)?;
        self.write(|element, set| {
            for value in others.iter().flatten() {
                if let Some(index) = find(set, element, value) {
                    set.remove_at(index);
                }
            }
        })
    }

    /// Elements of this set that are in every one of `others`.
    pub fn intersection(&self, others: &[ScriptValue]) -> BridgeResult<Rc<Self>> {
        let result = self.copy()?;
        result.intersection_update(others)?;
        Ok(result)
    }

    pub fn intersection_update(&self, others: &[ScriptValue]) -> BridgeResult<()> {
        let others = self.arguments(others)?;
        let element = self.element_property()?;
        let kept: Vec<NativeValue> = self
            .native_elements()?
            .into_iter()
            .filter(|value| others.iter().all(|other| other.iter().any(|o| element.identical(o, value))))
            .collect();
        self.write(|element, set| {
            set.clear();
            for value in kept {
                insert(set, element, value);
            }
        })
    }

    /// Elements in exactly one of this set and `other`.
    pub fn symmetric_difference(&self, other: &ScriptValue) -> BridgeResult<Rc<Self>> {
        let result = self.copy()?;
        result.symmetric_difference_update(other)?;
        Ok(result)
    }

    pub fn symmetric_difference_update(&self, other: &ScriptValue) -> BridgeResult<()> {
        let other = self.argument(None, other)?;
        self.write(|element, set| {
            for value in other {
                match find(set, element, &value) {
                    Some(index) => {
                        set.remove_at(index);
                    }
                    None => {
                        insert(set, element, value);
                    }
                }
            }
        })
    }

    /// Elements in this set or any of `others`.
    pub fn union(&self, others: &[ScriptValue]) -> BridgeResult<Rc<Self>> {
        let result = self.copy()?;
        result.update(others)?;
        Ok(result)
    }

    pub fn update(&self, others: &[ScriptValue]) -> BridgeResult<()> {
        let others = self.arguments(others)?;
        self.write(|element, set| {
            for value in others.into_iter().flatten() {
                insert(set, element, value);
            }
        })
    }

    pub fn isdisjoint(&self, other: &ScriptValue) -> BridgeResult<bool> {
        let other = self.argument(None, other)?;
        self.read(|element, set| other.iter().all(|value| find(set, element, value).is_none()))
    }

    pub fn issubset(&self, other: &ScriptValue) -> BridgeResult<bool> {
        let other = self.argument(None, other)?;
        let element = self.element_property()?;
        Ok(self
            .native_elements()?
            .iter()
            .all(|value| other.iter().any(|o| element.identical(o, value))))
    }

    pub fn issuperset(&self, other: &ScriptValue) -> BridgeResult<bool> {
        let other = self.argument(None, other)?;
        self.read(|element, set| other.iter().all(|value| find(set, element, value).is_some()))
    }

    // -----------------------------------------------------------------------
    // Copy, comparison, display
    // -----------------------------------------------------------------------

    pub fn copy(&self) -> BridgeResult<Rc<Self>> {
        let (prop, storage) = self.state.parts()?;
        Self::wrap(self.base.bridge(), OwnerContext::none(), &prop, &storage, ConversionMethod::Copy)
    }

    /// Same elements, in any order; `None` when `other` is not set-like.
    pub fn equals(&self, other: &ScriptValue) -> BridgeResult<Option<bool>> {
        let element = self.element_property()?;
        let Ok(other) = Self::cast(self.base.bridge(), other, &element) else {
            return Ok(None);
        };
        let theirs = other.native_elements()?;
        self.read(|element, set| {
            Some(set.len() == theirs.len() && theirs.iter().all(|value| find(set, element, value).is_some()))
        })
    }

    pub fn compare(&self, op: CompareOp, other: &ScriptValue) -> BridgeResult<Option<bool>> {
        equality_compare(op, self.equals(other)?, TYPE_NAME)
    }

    /// Sets are mutable and never hashable.
    pub fn hash(&self) -> BridgeResult<u32> {
        Err(unhashable())
    }

    pub fn values(&self) -> BridgeResult<Vec<ScriptValue>> {
        let element = self.element_property()?;
        let bridge = self.base.bridge();
        self.native_elements()?.iter().map(|value| bridge.to_script_element(&element, value)).collect()
    }

    pub fn to_display_string(&self) -> BridgeResult<String> {
        let parts: Vec<String> = self.values()?.iter().map(ScriptValue::repr).collect();
        Ok(format!("{{{}}}", parts.join(", ")))
    }
}

fn require_hashable(prop: &Property) -> BridgeResult<&Property> {
    let element = prop.element_property().ok_or_else(|| BridgeError::null_internal("SetProp"))?;
    if !element.has_value_hash() {
        return Err(BridgeError::Exception(format!(
            "Set element type must be hashable: {} ({})",
            element.name,
            element.class_name()
        )));
    }
    Ok(element)
}

fn find(set: &SetStorage, element: &Property, value: &NativeValue) -> Option<usize> {
    set.find_by(element.value_hash(value), |existing| element.identical(existing, value))
}

/// Add `value` unless an identical element is already present.
fn insert(set: &mut SetStorage, element: &Property, value: NativeValue) -> bool {
    if find(set, element, &value).is_some() {
        return false;
    }
    let hash = element.value_hash(&value);
    set.add(value, hash);
    true
}

fn element_error(err: BridgeError, element: &Property) -> BridgeError {
    match err {
        BridgeError::TypeError(_) => BridgeError::TypeError(format!(
            "Failed to convert element property '{}' ({})",
            element.name,
            element.class_name()
        )),
        other => other,
    }
}

impl fmt::Debug for SetWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetWrapper")
            .field("owner", &self.owner_context())
            .finish_non_exhaustive()
    }
}

impl WrappedInstance for SetWrapper {
    fn wrapper_kind(&self) -> WrapperKind {
        WrapperKind::Set
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
    if let Some(set) = instance.as_any().downcast_ref::<SetWrapper>() {
        report_proxy_storage(set.base.bridge(), &set.state, collector);
    }
}

inventory::submit! {
    WrapperTypeRegistration {
        kind: WrapperKind::Set,
        name: "Set",
        add_referenced_objects: report_referenced_objects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use ubridge_host::Host;

    fn bridge() -> Rc<Bridge> {
        Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap()
    }

    fn names(bridge: &Rc<Bridge>, values: &[&str]) -> Rc<SetWrapper> {
        let set = SetWrapper::new(bridge, &Property::new("Tag", PropertyKind::Name)).unwrap();
        for v in values {
            set.add(&ScriptValue::str(*v)).unwrap();
        }
        set
    }

    fn sorted(set: &SetWrapper) -> Vec<String> {
        let mut out: Vec<String> = set.values().unwrap().iter().map(|v| v.to_string()).collect();
        out.sort();
        out
    }

    fn list(values: &[&str]) -> ScriptValue {
        ScriptValue::list(values.iter().map(|v| ScriptValue::str(*v)).collect())
    }

    #[test]
    fn unhashable_element_types_are_rejected() {
        let bridge = bridge();
        let err = SetWrapper::new(&bridge, &Property::new("Label", PropertyKind::Text)).unwrap_err();
        assert_eq!(err, BridgeError::Exception("Set element type must be hashable: Label (TextProperty)".into()));
    }

    #[test]
    fn add_is_idempotent_and_remove_reports_missing() {
        let bridge = bridge();
        let set = names(&bridge, &["a", "b", "a"]);
        assert_eq!(set.len().unwrap(), 2);
        assert!(set.contains(&ScriptValue::str("b")).unwrap());
        set.discard(&ScriptValue::str("zzz")).unwrap();
        let err = set.remove(&ScriptValue::str("zzz")).unwrap_err();
        assert_eq!(err, BridgeError::KeyError("The given value was not found in the set".into()));
        set.remove(&ScriptValue::str("a")).unwrap();
        assert_eq!(sorted(&set), vec!["b"]);
    }

    #[test]
    fn pop_until_empty() {
        let bridge = bridge();
        let set = names(&bridge, &["x"]);
        assert_eq!(set.pop().unwrap().to_string(), "x");
        let err = set.pop().unwrap_err();
        assert_eq!(err, BridgeError::KeyError("Cannot pop from an empty set".into()));
    }

    #[test]
    fn algebra_returns_new_sets() {
        let bridge = bridge();
        let set = names(&bridge, &["a", "b", "c"]);
        assert_eq!(sorted(&set.difference(&[list(&["a"]), list(&["c"])]).unwrap()), vec!["b"]);
        assert_eq!(sorted(&set.intersection(&[list(&["a", "b", "z"]), list(&["b"])]).unwrap()), vec!["b"]);
        assert_eq!(sorted(&set.symmetric_difference(&list(&["c", "d"])).unwrap()), vec!["a", "b", "d"]);
        assert_eq!(sorted(&set.union(&[list(&["d"])]).unwrap()), vec!["a", "b", "c", "d"]);
        assert_eq!(sorted(&set), vec!["a", "b", "c"]);
    }

    #[test]
    fn update_variants_mutate_in_place() {
        let bridge = bridge();
        let set = names(&bridge, &["a", "b", "c"]);
        set.difference_update(&[list(&["a"])]).unwrap();
        set.symmetric_difference_update(&list(&["b", "z"])).unwrap();
        set.update(&[list(&["q"])]).unwrap();
        assert_eq!(sorted(&set), vec!["c", "q", "z"]);
        set.intersection_update(&[list(&["q", "z"])]).unwrap();
        assert_eq!(sorted(&set), vec!["q", "z"]);
        set.clear().unwrap();
        assert!(set.is_empty().unwrap());
    }

    #[test]
    fn predicates() {
        let bridge = bridge();
        let set = names(&bridge, &["a", "b"]);
        assert!(set.issubset(&list(&["a", "b", "c"])).unwrap());
        assert!(!set.issuperset(&list(&["a", "c"])).unwrap());
        assert!(set.isdisjoint(&list(&["x"])).unwrap());
        let err = set.issubset(&ScriptValue::Int(3)).unwrap_err();
        assert_eq!(err.message(), "Cannot convert argument (int) to 'Set'");
        let err = set.update(&[list(&["x"]), ScriptValue::Int(3)]).unwrap_err();
        assert_eq!(err.message(), "Cannot convert argument 1 (int) to 'Set'");
    }

    #[test]
    fn equality_ignores_order_and_hashing_is_refused() {
        let bridge = bridge();
        let a = names(&bridge, &["a", "b"]);
        let b = names(&bridge, &["b", "a"]);
        assert_eq!(a.compare(CompareOp::Eq, &ScriptValue::Set(b.clone())).unwrap(), Some(true));
        assert_eq!(a.equals(&list(&["a"])).unwrap(), Some(false));
        assert_eq!(a.equals(&ScriptValue::Int(1)).unwrap(), None);
        assert_eq!(a.hash().unwrap_err(), unhashable());
    }

    #[test]
    fn cast_identity_and_conversion() {
        let bridge = bridge();
        let set = names(&bridge, &["a"]);
        let element = Property::new("Other", PropertyKind::Name);
        let same = SetWrapper::cast(&bridge, &ScriptValue::Set(set.clone()), &element).unwrap();
        assert!(Rc::ptr_eq(&set, &same));
        let strings = SetWrapper::cast(&bridge, &ScriptValue::Set(set.clone()), &Property::new("S", PropertyKind::Str)).unwrap();
        assert!(!Rc::ptr_eq(&set, &strings));
        assert_eq!(sorted(&strings), vec!["a"]);
        let err = SetWrapper::cast(&bridge, &ScriptValue::Float(1.0), &element).unwrap_err();
        assert_eq!(err.message(), "Cannot cast type 'float' to 'Set'");
    }
}
