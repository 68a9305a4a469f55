// Map proxy: the script-side mapping protocol over native sparse hash
// storage of (key, value) pairs, plus live key/value/item views.
//
// Keys are located by the key property's value hash. Values are replaced in
// place; keys are never mutated in storage, only removed and re-added.

use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

use ubridge_host::{MapStorage, NativeValue, Property, PropertyKind, ReferenceCollector};

use crate::array::sequence_items;
use crate::bridge::Bridge;
use crate::collector::report_proxy_storage;
use crate::error::{BridgeError, BridgeResult};
use crate::policy::{init_storage, ConversionMethod, OwnerContext};
use crate::script::{script_eq, ScriptDict, ScriptValue};
use crate::storage::{NativeRef, ProxyCell, ProxyState};
use crate::wrapper::{
    equality_compare, unhashable, CompareOp, WrappedInstance, WrapperBase, WrapperKind, WrapperTypeRegistration,
};

const WHAT: &str = "MapInstance";
const TYPE_NAME: &str = "Map";

type NativePair = (NativeValue, NativeValue);

pub struct MapWrapper {
    base: WrapperBase,
    state: ProxyCell,
}

impl MapWrapper {
    fn alloc(bridge: &Rc<Bridge>) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<MapWrapper>| MapWrapper {
            base: WrapperBase::new(bridge, this),
            state: ProxyCell::empty(WHAT),
        })
    }

    /// Empty map from `key` to `value`.
    pub fn new(bridge: &Rc<Bridge>, key: &Property, value: &Property) -> BridgeResult<Rc<Self>> {
        Self::from_pairs(bridge, key, value, Vec::new())
    }

    fn from_pairs(
        bridge: &Rc<Bridge>,
        key: &Property,
        value: &Property,
        pairs: Vec<NativePair>,
    ) -> BridgeResult<Rc<Self>> {
        let mut key = key.clone();
        key.array_dim = 1;
        let mut value = value.clone();
        value.array_dim = 1;
        let mut prop = Property::new(key.name.clone(), PropertyKind::Map(Box::new(key), Box::new(value)));
        bridge.host().link_property(&mut prop);
        let (key, _) = require_hashable(&prop)?;
        let mut map = MapStorage::new();
        for (k, v) in pairs {
            upsert(&mut map, key, k, v);
        }
        let storage = NativeRef::owned(bridge.host().allocate(NativeValue::Map(map)));
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
        if !matches!(prop.kind, PropertyKind::Map(..)) {
            return Err(BridgeError::Internal(format!("'{}' ({}) is not a map property", prop.name, prop.class_name())));
        }
        require_hashable(prop)?;
        let mut prop = prop.clone();
        prop.array_dim = 1;
        let storage = init_storage(bridge.host(), &owner, source, method, WHAT)?;
        let wrapper = Self::alloc(bridge);
        wrapper.state.init(ProxyState { owner, prop: Rc::new(prop), storage });
        Ok(wrapper)
    }

    /// Convert `value` to a map of `key` to `value_prop`: the same map if the
    /// key and value types match, a text-converted copy of a map of other
    /// types, or a new map built from a dict or a sequence of pairs.
    pub fn cast(
        bridge: &Rc<Bridge>,
        value: &ScriptValue,
        key: &Property,
        value_prop: &Property,
    ) -> BridgeResult<Rc<Self>> {
        if let ScriptValue::Map(map) = value {
            let (source_key, source_value) = map.key_value_properties()?;
            if source_key.same_type(key) && source_value.same_type(value_prop) {
                return Ok(map.clone());
            }
            let host = bridge.host();
            let import = |prop: &Property, what: &str, text: String, index: usize| {
                host.import_text(prop, &text).ok_or_else(|| {
                    BridgeError::Exception(format!(
                        "Failed to import text '{text}' {what} for property '{}' ({}) at index {index}",
                        prop.name,
                        prop.class_name()
                    ))
                })
            };
            let mut converted = Vec::new();
            for (index, (k, v)) in map.native_pairs()?.iter().enumerate() {
                let k = import(key, "key", host.export_text(&source_key, k), index)?;
                let v = import(value_prop, "value", host.export_text(&source_value, v), index)?;
                converted.push((k, v));
            }
            return Self::from_pairs(bridge, key, value_prop, converted);
        }

        let Some(pairs) = script_pairs(value)? else {
            return Err(BridgeError::TypeError(format!("Cannot cast type '{}' to '{TYPE_NAME}'", value.type_name())));
        };
        let mut converted = Vec::with_capacity(pairs.len());
        for (k, v) in &pairs {
            let native_key = convert_key(bridge, k, key)?;
            let native_value = convert_value(bridge, v, value_prop, k)?;
            converted.push((native_key, native_value));
        }
        Self::from_pairs(bridge, key, value_prop, converted)
    }

    /// New map with every item of `sequence` as a key, all mapped to `value`
    /// (or the value type's default).
    pub fn fromkeys(
        bridge: &Rc<Bridge>,
        sequence: &ScriptValue,
        value: Option<&ScriptValue>,
        key: &Property,
        value_prop: &Property,
    ) -> BridgeResult<Rc<Self>> {
        let Some(items) = sequence.iter_values()? else {
            return Err(BridgeError::Exception(format!("'sequence' ({}) must be iterable", sequence.type_name())));
        };
        let shared = match value {
            Some(v) => convert_value(bridge, v, value_prop, &ScriptValue::None)?,
            None => bridge.host().default_value(value_prop)?,
        };
        let mut pairs = Vec::with_capacity(items.len());
        for item in &items {
            pairs.push((convert_key(bridge, item, key)?, shared.clone()));
        }
        Self::from_pairs(bridge, key, value_prop, pairs)
    }

    // -----------------------------------------------------------------------
    // Storage access
    // -----------------------------------------------------------------------

    pub fn property(&self) -> BridgeResult<Rc<Property>> {
        Ok(self.state.parts()?.0)
    }

    pub fn key_value_properties(&self) -> BridgeResult<(Property, Property)> {
        let prop = self.property()?;
        let (key, value) = prop.map_properties().ok_or_else(|| BridgeError::null_internal("MapProp"))?;
        Ok((key.clone(), value.clone()))
    }

    pub fn native_value(&self) -> BridgeResult<NativeValue> {
        let (_, storage) = self.state.parts()?;
        storage.snapshot(self.base.host(), WHAT)
    }

    fn native_pairs(&self) -> BridgeResult<Vec<NativePair>> {
        self.read(|_, map| map.values().cloned().collect())
    }

    fn read<R>(&self, f: impl FnOnce(&Property, &MapStorage) -> R) -> BridgeResult<R> {
        let (prop, storage) = self.state.parts()?;
        let (key, _) = prop.map_properties().ok_or_else(|| BridgeError::null_internal("MapProp"))?;
        storage.read(self.base.host(), WHAT, |value| match value {
            NativeValue::Map(map) => Ok(f(key, map)),
            _ => Err(BridgeError::null_internal(WHAT)),
        })?
    }

    fn write<R>(&self, f: impl FnOnce(&Property, &mut MapStorage) -> R) -> BridgeResult<R> {
        let (prop, storage) = self.state.parts()?;
        let (key, _) = prop.map_properties().ok_or_else(|| BridgeError::null_internal("MapProp"))?;
        let result = storage.write(self.base.host(), WHAT, |value| match value {
            NativeValue::Map(map) => Ok(f(key, map)),
            _ => Err(BridgeError::null_internal(WHAT)),
        })??;
        self.state.owner().notify_changed();
        Ok(result)
    }

    fn to_key(&self, key: &ScriptValue) -> BridgeResult<NativeValue> {
        let (key_prop, _) = self.key_value_properties()?;
        convert_key(self.base.bridge(), key, &key_prop)
    }

    fn to_value(&self, value: &ScriptValue, key: &ScriptValue) -> BridgeResult<NativeValue> {
        let (_, value_prop) = self.key_value_properties()?;
        convert_value(self.base.bridge(), value, &value_prop, key)
    }

    fn lookup(&self, key: &NativeValue) -> BridgeResult<Option<NativeValue>> {
        self.read(|key_prop, map| {
            find(map, key_prop, key).and_then(|index| map.get(index)).map(|(_, v)| v.clone())
        })
    }

    fn value_to_script(&self, value: &NativeValue) -> BridgeResult<ScriptValue> {
        let (_, value_prop) = self.key_value_properties()?;
        self.base.bridge().to_script_element(&value_prop, value)
    }

    fn missing_key(key: &ScriptValue) -> BridgeError {
        BridgeError::KeyError(format!("Key '{key}' was not found in the map"))
    }

    // -----------------------------------------------------------------------
    // Mapping protocol
    // -----------------------------------------------------------------------

    pub fn len(&self) -> BridgeResult<usize> {
        self.read(|_, map| map.len())
    }

    pub fn is_empty(&self) -> BridgeResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get_item(&self, key: &ScriptValue) -> BridgeResult<ScriptValue> {
        let native = self.to_key(key)?;
        match self.lookup(&native)? {
            Some(value) => self.value_to_script(&value),
            None => Err(Self::missing_key(key)),
        }
    }

    pub fn set_item(&self, key: &ScriptValue, value: &ScriptValue) -> BridgeResult<()> {
        let native_key = self.to_key(key)?;
        let native_value = self.to_value(value, key)?;
        self.write(|key_prop, map| upsert(map, key_prop, native_key, native_value))
    }

    pub fn del_item(&self, key: &ScriptValue) -> BridgeResult<()> {
        self.take(key)?.map(|_| ()).ok_or_else(|| Self::missing_key(key))
    }

    pub fn contains(&self, key: &ScriptValue) -> BridgeResult<bool> {
        let native = self.to_key(key)?;
        self.read(|key_prop, map| find(map, key_prop, &native).is_some())
    }

    pub fn clear(&self) -> BridgeResult<()> {
        self.write(|_, map| map.clear())
    }

    /// Remove `key`, returning its value if it was present.
    fn take(&self, key: &ScriptValue) -> BridgeResult<Option<NativeValue>> {
        let native = self.to_key(key)?;
        let Some(index) = self.read(|key_prop, map| find(map, key_prop, &native))? else {
            return Ok(None);
        };
        Ok(self.write(|_, map| map.remove_at(index))?.map(|(_, v)| v))
    }

    // -----------------------------------------------------------------------
    // Dict-style helpers
    // -----------------------------------------------------------------------

    /// Value for `key`, or `default` (None) if absent.
    pub fn get(&self, key: &ScriptValue, default: Option<&ScriptValue>) -> BridgeResult<ScriptValue> {
        let native = self.to_key(key)?;
        match self.lookup(&native)? {
            Some(value) => self.value_to_script(&value),
            None => Ok(default.cloned().unwrap_or(ScriptValue::None)),
        }
    }

    /// Value for `key`, inserting `default` first if the key is absent.
    /// Without a default the inserted value is the value property's default.
    pub fn setdefault(&self, key: &ScriptValue, default: Option<&ScriptValue>) -> BridgeResult<ScriptValue> {
        let native_key = self.to_key(key)?;
        if let Some(existing) = self.lookup(&native_key)? {
            return self.value_to_script(&existing);
        }
        let native_value = match default {
            Some(default) => self.to_value(default, key)?,
            None => {
                let (_, value_prop) = self.key_value_properties()?;
                self.base.host().default_value(&value_prop)?
            }
        };
        let stored = native_value.clone();
        self.write(|key_prop, map| upsert(map, key_prop, native_key, native_value))?;
        self.value_to_script(&stored)
    }

    /// Remove `key` and return its value; without a default a missing key
    /// is a KeyError.
    pub fn pop(&self, key: &ScriptValue, default: Option<&ScriptValue>) -> BridgeResult<ScriptValue> {
        match (self.take(key)?, default) {
            (Some(value), _) => self.value_to_script(&value),
            (None, Some(default)) => Ok(default.clone()),
            (None, None) => Err(Self::missing_key(key)),
        }
    }

    /// Remove and return an arbitrary `(key, value)` pair.
    pub fn popitem(&self) -> BridgeResult<ScriptValue> {
        let Some(index) = self.read(|_, map| map.first_index())? else {
            return Err(BridgeError::KeyError("Cannot pop from an empty map".to_string()));
        };
        let (key, value) = self.write(|_, map| map.remove_at(index))?.ok_or_else(|| BridgeError::null_internal(WHAT))?;
        let (key_prop, value_prop) = self.key_value_properties()?;
        let bridge = self.base.bridge();
        Ok(ScriptValue::tuple(vec![
            bridge.to_script_element(&key_prop, &key)?,
            bridge.to_script_element(&value_prop, &value)?,
        ]))
    }

    /// Merge `other` (a mapping or a sequence of pairs) then `kwargs` into
    /// this map. Nothing is written unless every entry converts.
    pub fn update(&self, other: Option<&ScriptValue>, kwargs: &ScriptDict) -> BridgeResult<()> {
        let (key_prop, value_prop) = self.key_value_properties()?;
        let bridge = self.base.bridge();
        let mut pending = Vec::new();
        if let Some(other) = other {
            let cast = Self::cast(bridge, other, &key_prop, &value_prop).map_err(|err| match err {
                BridgeError::TypeError(msg) if msg.starts_with("Cannot cast type") => BridgeError::TypeError(format!(
                    "Cannot convert argument ({}) to '{TYPE_NAME}'",
                    other.type_name()
                )),
                err => err,
            })?;
            pending.extend(cast.native_pairs()?);
        }
        for (k, v) in kwargs.items() {
            pending.push((convert_key(bridge, k, &key_prop)?, convert_value(bridge, v, &value_prop, k)?));
        }
        self.write(|key_prop, map| {
            for (k, v) in pending {
                upsert(map, key_prop, k, v);
            }
        })
    }

    pub fn keys(self: &Rc<Self>) -> MapView {
        MapView { map: self.clone(), kind: MapViewKind::Keys }
    }

    pub fn values(self: &Rc<Self>) -> MapView {
        MapView { map: self.clone(), kind: MapViewKind::Values }
    }

    pub fn items(self: &Rc<Self>) -> MapView {
        MapView { map: self.clone(), kind: MapViewKind::Items }
    }

    /// Keys as script values; iterating a map yields these.
    pub fn key_values(&self) -> BridgeResult<Vec<ScriptValue>> {
        Ok(self.pairs()?.into_iter().map(|(k, _)| k).collect())
    }

    /// Every `(key, value)` pair as script values, in storage order.
    pub fn pairs(&self) -> BridgeResult<Vec<(ScriptValue, ScriptValue)>> {
        let (key_prop, value_prop) = self.key_value_properties()?;
        let bridge = self.base.bridge();
        self.native_pairs()?
            .iter()
            .map(|(k, v)| Ok((bridge.to_script_element(&key_prop, k)?, bridge.to_script_element(&value_prop, v)?)))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Copy, comparison, display
    // -----------------------------------------------------------------------

    pub fn copy(&self) -> BridgeResult<Rc<Self>> {
        let (prop, storage) = self.state.parts()?;
        Self::wrap(self.base.bridge(), OwnerContext::none(), &prop, &storage, ConversionMethod::Copy)
    }

    /// Same keys mapped to identical values; `None` when `other` cannot be
    /// converted to this map type.
    pub fn equals(&self, other: &ScriptValue) -> BridgeResult<Option<bool>> {
        let (key_prop, value_prop) = self.key_value_properties()?;
        let Ok(other) = Self::cast(self.base.bridge(), other, &key_prop, &value_prop) else {
            return Ok(None);
        };
        let theirs = other.native_pairs()?;
        self.read(|key_prop, map| {
            Some(
                map.len() == theirs.len()
                    && theirs.iter().all(|(k, v)| {
                        find(map, key_prop, k)
                            .and_then(|index| map.get(index))
                            .is_some_and(|(_, mine)| value_prop.identical(mine, v))
                    }),
            )
        })
    }

    pub fn compare(&self, op: CompareOp, other: &ScriptValue) -> BridgeResult<Option<bool>> {
        equality_compare(op, self.equals(other)?, TYPE_NAME)
    }

    pub fn hash(&self) -> BridgeResult<u32> {
        Err(unhashable())
    }

    pub fn to_display_string(&self) -> BridgeResult<String> {
        let parts: Vec<String> = self.pairs()?.iter().map(|(k, v)| format!("{}: {}", k.repr(), v.repr())).collect();
        Ok(format!("{{{}}}", parts.join(", ")))
    }
}

// ---------------------------------------------------------------------------
// Live views
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MapViewKind {
    Keys,
    Values,
    Items,
}

/// Live view over a map's keys, values or items. Reads always reflect the
/// map's current contents.
#[derive(Clone, Debug)]
pub struct MapView {
    map: Rc<MapWrapper>,
    kind: MapViewKind,
}

impl MapView {
    pub fn kind(&self) -> MapViewKind {
        self.kind
    }

    pub fn map(&self) -> &Rc<MapWrapper> {
        &self.map
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            MapViewKind::Keys => "MapKeysView",
            MapViewKind::Values => "MapValuesView",
            MapViewKind::Items => "MapItemsView",
        }
    }

    pub fn len(&self) -> BridgeResult<usize> {
        self.map.len()
    }

    pub fn is_empty(&self) -> BridgeResult<bool> {
        self.map.is_empty()
    }

    pub fn values(&self) -> BridgeResult<Vec<ScriptValue>> {
        let pairs = self.map.pairs()?;
        Ok(match self.kind {
            MapViewKind::Keys => pairs.into_iter().map(|(k, _)| k).collect(),
            MapViewKind::Values => pairs.into_iter().map(|(_, v)| v).collect(),
            MapViewKind::Items => pairs.into_iter().map(|(k, v)| ScriptValue::tuple(vec![k, v])).collect(),
        })
    }

    pub fn contains(&self, value: &ScriptValue) -> BridgeResult<bool> {
        match self.kind {
            MapViewKind::Keys => self.map.contains(value),
            MapViewKind::Values => {
                for candidate in self.values()? {
                    if script_eq(&candidate, value)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            MapViewKind::Items => {
                let Some(pair) = sequence_items(value)? else {
                    return Ok(false);
                };
                let [key, expected] = pair.as_slice() else {
                    return Ok(false);
                };
                if !self.map.contains(key)? {
                    return Ok(false);
                }
                script_eq(&self.map.get_item(key)?, expected)
            }
        }
    }

    pub fn to_display_string(&self) -> BridgeResult<String> {
        Ok(format!("{}({})", self.type_name(), ScriptValue::list(self.values()?).repr()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_hashable(prop: &Property) -> BridgeResult<(&Property, &Property)> {
    let (key, value) = prop.map_properties().ok_or_else(|| BridgeError::null_internal("MapProp"))?;
    if !key.has_value_hash() {
        return Err(BridgeError::Exception(format!(
            "Map key type must be hashable: {} ({})",
            key.name,
            key.class_name()
        )));
    }
    Ok((key, value))
}

fn find(map: &MapStorage, key_prop: &Property, key: &NativeValue) -> Option<usize> {
    map.find_by(key_prop.value_hash(key), |(existing, _)| key_prop.identical(existing, key))
}

/// Insert or replace the value stored under `key`.
fn upsert(map: &mut MapStorage, key_prop: &Property, key: NativeValue, value: NativeValue) {
    match find(map, key_prop, &key).and_then(|index| map.get_mut(index)) {
        Some(slot) => slot.1 = value,
        None => {
            let hash = key_prop.value_hash(&key);
            map.add((key, value), hash);
        }
    }
}

fn convert_key(bridge: &Rc<Bridge>, key: &ScriptValue, key_prop: &Property) -> BridgeResult<NativeValue> {
    bridge.to_native_element(key, key_prop).map_err(|err| match err {
        BridgeError::TypeError(_) => BridgeError::TypeError(format!(
            "Failed to convert key property '{}' ({})",
            key_prop.name,
            key_prop.class_name()
        )),
        other => other,
    })
}

fn convert_value(
    bridge: &Rc<Bridge>,
    value: &ScriptValue,
    value_prop: &Property,
    key: &ScriptValue,
) -> BridgeResult<NativeValue> {
    bridge.to_native_element(value, value_prop).map_err(|err| match err {
        BridgeError::TypeError(_) => BridgeError::TypeError(format!(
            "Failed to convert value property '{}' ({}) for key '{key}'",
            value_prop.name,
            value_prop.class_name()
        )),
        other => other,
    })
}

/// `(key, value)` pairs of a dict, a map, or a sequence of two-item
/// sequences; `None` for anything else.
fn script_pairs(value: &ScriptValue) -> BridgeResult<Option<Vec<(ScriptValue, ScriptValue)>>> {
    match value {
        ScriptValue::Dict(dict) => Ok(Some(dict.borrow().items().to_vec())),
        ScriptValue::Map(map) => map.pairs().map(Some),
        other => {
            let Some(items) = sequence_items(other)? else {
                return Ok(None);
            };
            let mut pairs = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let Some(pair) = sequence_items(item)? else {
                    return Err(BridgeError::TypeError(format!(
                        "Failed to convert item at index {index} to a sequence"
                    )));
                };
                let [k, v] = pair.as_slice() else {
                    return Err(BridgeError::TypeError(format!(
                        "Failed to convert item at index {index} as it was not a pair (len != 2)"
                    )));
                };
                pairs.push((k.clone(), v.clone()));
            }
            Ok(Some(pairs))
        }
    }
}

impl fmt::Debug for MapWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapWrapper")
            .field("owner", &self.owner_context())
            .finish_non_exhaustive()
    }
}

impl WrappedInstance for MapWrapper {
    fn wrapper_kind(&self) -> WrapperKind {
        WrapperKind::Map
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
    if let Some(map) = instance.as_any().downcast_ref::<MapWrapper>() {
        report_proxy_storage(map.base.bridge(), &map.state, collector);
    }
}

inventory::submit! {
    WrapperTypeRegistration {
        kind: WrapperKind::Map,
        name: "Map",
        add_referenced_objects: report_referenced_objects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use ubridge_host::{ClassDef, Host};

    fn bridge() -> Rc<Bridge> {
        Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap()
    }

    fn str_to_int(bridge: &Rc<Bridge>) -> Rc<MapWrapper> {
        MapWrapper::new(
            bridge,
            &Property::new("Key", PropertyKind::Str),
            &Property::new("Value", PropertyKind::Int32),
        )
        .unwrap()
    }

    #[test]
    fn setdefault_and_pop_scenario() {
        let bridge = bridge();
        let map = str_to_int(&bridge);
        map.set_item(&"a".into(), &ScriptValue::Int(1)).unwrap();

        let got = map.setdefault(&"b".into(), Some(&ScriptValue::Int(2))).unwrap();
        assert!(script_eq(&got, &ScriptValue::Int(2)).unwrap());
        assert_eq!(map.to_display_string().unwrap(), "{'a': 1, 'b': 2}");

        let popped = map.pop(&"a".into(), None).unwrap();
        assert!(script_eq(&popped, &ScriptValue::Int(1)).unwrap());
        assert_eq!(map.to_display_string().unwrap(), "{'b': 2}");

        let fallback = map.pop(&"z".into(), Some(&ScriptValue::Int(-1))).unwrap();
        assert!(script_eq(&fallback, &ScriptValue::Int(-1)).unwrap());
        assert_eq!(map.len().unwrap(), 1);
    }

    #[test]
    fn setdefault_keeps_existing_values() {
        let bridge = bridge();
        let map = str_to_int(&bridge);
        map.set_item(&"a".into(), &ScriptValue::Int(1)).unwrap();
        let got = map.setdefault(&"a".into(), Some(&ScriptValue::Int(5))).unwrap();
        assert!(script_eq(&got, &ScriptValue::Int(1)).unwrap());
    }

    #[test]
    fn setdefault_without_a_default_inserts_the_value_default() {
        let bridge = bridge();
        let map = str_to_int(&bridge);
        let got = map.setdefault(&"c".into(), None).unwrap();
        assert!(script_eq(&got, &ScriptValue::Int(0)).unwrap());
        assert_eq!(map.to_display_string().unwrap(), "{'c': 0}");
    }

    #[test]
    fn purged_object_keys_stay_addressable() {
        let bridge = bridge();
        let host = bridge.host();
        let package = host.create_package("/Game/Maps");
        let class = host.add_class(ClassDef::new("Thing", package, Some(host.root_class()))).unwrap();
        let obj = host.new_object(class, package, None).unwrap();
        let map = MapWrapper::new(
            &bridge,
            &Property::new("Key", PropertyKind::Object(host.root_class())),
            &Property::new("Value", PropertyKind::Int32),
        )
        .unwrap();
        let key = ScriptValue::Object(bridge.objects().find_or_create(&bridge, obj).unwrap());
        map.set_item(&key, &ScriptValue::Int(7)).unwrap();
        drop(key);

        bridge.collector().purge_object_references(host, &[obj], false);
        assert_eq!(map.len().unwrap(), 1);
        assert!(map.contains(&ScriptValue::None).unwrap());
        assert!(script_eq(&map.get_item(&ScriptValue::None).unwrap(), &ScriptValue::Int(7)).unwrap());
        assert!(script_eq(&map.get(&ScriptValue::None, None).unwrap(), &ScriptValue::Int(7)).unwrap());

        map.set_item(&ScriptValue::None, &ScriptValue::Int(8)).unwrap();
        assert_eq!(map.len().unwrap(), 1);
        map.del_item(&ScriptValue::None).unwrap();
        assert_eq!(map.len().unwrap(), 0);
    }

    #[test]
    fn missing_keys_are_key_errors() {
        let bridge = bridge();
        let map = str_to_int(&bridge);
        assert_eq!(map.get_item(&"q".into()).unwrap_err(), BridgeError::KeyError("Key 'q' was not found in the map".into()));
        assert!(matches!(map.del_item(&"q".into()), Err(BridgeError::KeyError(_))));
        assert!(matches!(map.pop(&"q".into(), None), Err(BridgeError::KeyError(_))));
        assert_eq!(map.popitem().unwrap_err(), BridgeError::KeyError("Cannot pop from an empty map".into()));
        assert!(map.get(&"q".into(), None).unwrap().is_none());
    }

    #[test]
    fn bad_keys_and_values_name_the_property() {
        let bridge = bridge();
        let map = str_to_int(&bridge);
        let err = map.set_item(&ScriptValue::Int(1), &ScriptValue::Int(1)).unwrap_err();
        assert_eq!(err.message(), "Failed to convert key property 'Key' (StrProperty)");
        let err = map.set_item(&"k".into(), &"v".into()).unwrap_err();
        assert_eq!(err.message(), "Failed to convert value property 'Value' (IntProperty) for key 'k'");
        assert!(map.is_empty().unwrap());
    }

    #[test]
    fn text_keys_cannot_be_hashed() {
        let bridge = bridge();
        let err = MapWrapper::new(&bridge, &Property::new("K", PropertyKind::Text), &Property::new("V", PropertyKind::Int32))
            .unwrap_err();
        assert_eq!(err, BridgeError::Exception("Map key type must be hashable: K (TextProperty)".into()));
    }

    #[test]
    fn update_accepts_mappings_pairs_and_keywords() {
        let bridge = bridge();
        let map = str_to_int(&bridge);
        map.update(Some(&ScriptValue::str_dict([("a", ScriptValue::Int(1))])), &ScriptDict::new()).unwrap();
        let pairs = ScriptValue::list(vec![ScriptValue::tuple(vec!["b".into(), ScriptValue::Int(2)])]);
        map.update(Some(&pairs), &ScriptDict::from_str_pairs([("c", ScriptValue::Int(3))])).unwrap();
        assert_eq!(map.to_display_string().unwrap(), "{'a': 1, 'b': 2, 'c': 3}");

        let bad = ScriptValue::list(vec![ScriptValue::tuple(vec![ScriptValue::Int(1)])]);
        let err = map.update(Some(&bad), &ScriptDict::new()).unwrap_err();
        assert_eq!(err.message(), "Failed to convert item at index 0 as it was not a pair (len != 2)");
        let err = map.update(Some(&ScriptValue::Int(4)), &ScriptDict::new()).unwrap_err();
        assert_eq!(err.message(), "Cannot convert argument (int) to 'Map'");
        assert_eq!(map.len().unwrap(), 3);
    }

    #[test]
    fn views_are_live() {
        let bridge = bridge();
        let map = str_to_int(&bridge);
        let keys = map.keys();
        let items = map.items();
        assert_eq!(keys.len().unwrap(), 0);
        map.set_item(&"x".into(), &ScriptValue::Int(7)).unwrap();
        assert_eq!(keys.to_display_string().unwrap(), "MapKeysView(['x'])");
        assert!(items.contains(&ScriptValue::tuple(vec!["x".into(), ScriptValue::Int(7)])).unwrap());
        assert!(!items.contains(&ScriptValue::tuple(vec!["x".into(), ScriptValue::Int(8)])).unwrap());
        assert!(map.values().contains(&ScriptValue::Int(7)).unwrap());
    }

    #[test]
    fn fromkeys_uses_default_or_given_value() {
        let bridge = bridge();
        let key = Property::new("Key", PropertyKind::Str);
        let value = Property::new("Value", PropertyKind::Int32);
        let keys = ScriptValue::list(vec!["a".into(), "b".into()]);
        let map = MapWrapper::fromkeys(&bridge, &keys, None, &key, &value).unwrap();
        assert_eq!(map.to_display_string().unwrap(), "{'a': 0, 'b': 0}");
        let map = MapWrapper::fromkeys(&bridge, &keys, Some(&ScriptValue::Int(3)), &key, &value).unwrap();
        assert_eq!(map.to_display_string().unwrap(), "{'a': 3, 'b': 3}");
        let err = MapWrapper::fromkeys(&bridge, &ScriptValue::Int(1), None, &key, &value).unwrap_err();
        assert_eq!(err, BridgeError::Exception("'sequence' (int) must be iterable".into()));
    }

    #[test]
    fn equality_and_cast() {
        let bridge = bridge();
        let map = str_to_int(&bridge);
        map.set_item(&"a".into(), &ScriptValue::Int(1)).unwrap();
        let dict = ScriptValue::str_dict([("a", ScriptValue::Int(1))]);
        assert_eq!(map.compare(CompareOp::Eq, &dict).unwrap(), Some(true));
        assert_eq!(map.compare(CompareOp::Ne, &ScriptValue::dict(ScriptDict::new())).unwrap(), Some(true));
        assert!(map.compare(CompareOp::Lt, &dict).is_err());
        assert_eq!(map.hash().unwrap_err(), unhashable());

        let (key, value) = map.key_value_properties().unwrap();
        let same = MapWrapper::cast(&bridge, &ScriptValue::Map(map.clone()), &key, &value).unwrap();
        assert!(Rc::ptr_eq(&same, &map));
        let names = MapWrapper::cast(&bridge, &ScriptValue::Map(map.clone()), &Property::new("N", PropertyKind::Name), &value)
            .unwrap();
        assert!(!Rc::ptr_eq(&names, &map));
        assert!(names.contains(&ScriptValue::Name("a".into())).unwrap());
    }

    #[test]
    fn copy_is_independent() {
        let bridge = bridge();
        let map = str_to_int(&bridge);
        map.set_item(&"a".into(), &ScriptValue::Int(1)).unwrap();
        let copy = map.copy().unwrap();
        copy.clear().unwrap();
        assert_eq!(map.len().unwrap(), 1);
        assert!(copy.is_empty().unwrap());
    }
}
