// Struct proxy: a script instance of a native struct type.
//
// Field access resolves the attribute through the script type's property
// descriptors, then reads or writes the matching field of the native value.
// Struct and container fields come back as reference wrappers owned by this
// struct, so edits to them write through and are reported upwards.

use std::any::Any;
use std::fmt;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ubridge_host::{NativeValue, Property, PropertyKind, ReferenceCollector, StructHandle, TypeHandle, CPF_SCRIPT_READ_ONLY};

use crate::array::sequence_items;
use crate::bridge::Bridge;
use crate::collector::report_proxy_storage;
use crate::error::{BridgeError, BridgeResult};
use crate::policy::{init_storage, ConversionMethod, OwnerContext};
use crate::property_access::{is_exposed, missing_property, no_attribute, read_property, write_property};
use crate::script::{ScriptDict, ScriptType, ScriptValue};
use crate::storage::{NativeRef, ProxyCell, ProxyState};
use crate::wrapper::{
    equality_compare, unhashable, CompareOp, WrappedInstance, WrapperBase, WrapperKind, WrapperTypeRegistration,
};

const WHAT: &str = "StructInstance";

/// A struct field a script may assign at construction.
struct InitParam {
    attribute: String,
    index: usize,
    prop: Property,
}

pub struct StructWrapper {
    base: WrapperBase,
    state: ProxyCell,
    ty: RefCell<Rc<ScriptType>>,
    this: Weak<StructWrapper>,
}

impl StructWrapper {
    fn alloc(bridge: &Rc<Bridge>, ty: &Rc<ScriptType>) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<StructWrapper>| StructWrapper {
            base: WrapperBase::new(bridge, this),
            state: ProxyCell::empty(WHAT),
            ty: RefCell::new(ty.clone()),
            this: this.clone(),
        })
    }

    /// Default-initialized instance of the native struct bound to `ty`.
    pub fn new(bridge: &Rc<Bridge>, ty: &Rc<ScriptType>) -> BridgeResult<Rc<Self>> {
        let Some(TypeHandle::Struct(s)) = ty.native() else {
            return Err(BridgeError::null_internal("ScriptStruct"));
        };
        let host = bridge.host();
        let value = NativeValue::Struct(host.struct_default(s)?);
        let mut prop = Property::new(ty.name(), PropertyKind::Struct(s));
        host.link_property(&mut prop);
        let storage = NativeRef::owned(host.allocate(value));
        let wrapper = Self::alloc(bridge, ty);
        wrapper.state.init(ProxyState { owner: OwnerContext::none(), prop: Rc::new(prop), storage });
        Ok(wrapper)
    }

    pub fn wrap(
        bridge: &Rc<Bridge>,
        ty: &Rc<ScriptType>,
        owner: OwnerContext,
        prop: &Property,
        source: &NativeRef,
        method: ConversionMethod,
    ) -> BridgeResult<Rc<Self>> {
        if !matches!(prop.kind, PropertyKind::Struct(_)) {
            return Err(BridgeError::Internal(format!(
                "'{}' ({}) is not a struct property",
                prop.name,
                prop.class_name()
            )));
        }
        let mut prop = prop.clone();
        prop.array_dim = 1;
        let storage = init_storage(bridge.host(), &owner, source, method, WHAT)?;
        let wrapper = Self::alloc(bridge, ty);
        wrapper.state.init(ProxyState { owner, prop: Rc::new(prop), storage });
        Ok(wrapper)
    }

    /// Script constructor: positional arguments fill the init params in
    /// declaration order, keywords fill them by name.
    pub fn construct(
        bridge: &Rc<Bridge>,
        ty: &Rc<ScriptType>,
        args: &[ScriptValue],
        kwargs: &ScriptDict,
    ) -> BridgeResult<Rc<Self>> {
        let wrapper = Self::new(bridge, ty)?;
        let params = wrapper.init_params()?;
        if args.len() > params.len() {
            return Err(BridgeError::TypeError(format!(
                "{}() takes at most {} arguments ({} given)",
                ty.name(),
                params.len(),
                args.len()
            )));
        }
        for (value, param) in args.iter().zip(&params) {
            wrapper.assign_init_param(param, value)?;
        }
        for (key, value) in kwargs.items() {
            let param = key
                .as_str()
                .and_then(|name| params.iter().find(|p| p.attribute == name))
                .ok_or_else(|| {
                    BridgeError::TypeError(format!("{} is an invalid keyword argument for {}()", key.repr(), ty.name()))
                })?;
            wrapper.assign_init_param(param, value)?;
        }
        Ok(wrapper)
    }

    /// Convert `value` to an instance of `ty`.
    ///
    /// An instance of the same native struct passes through unchanged; an
    /// instance of a derived struct is sliced into a new copy. A non-mapping
    /// sequence assigns init params positionally and may be shorter than the
    /// parameter list; a mapping assigns only the params it names.
    pub fn cast(bridge: &Rc<Bridge>, value: &ScriptValue, ty: &Rc<ScriptType>) -> BridgeResult<Rc<Self>> {
        let Some(TypeHandle::Struct(target)) = ty.native() else {
            return Err(BridgeError::null_internal("ScriptStruct"));
        };
        let host = bridge.host();
        let cannot_cast = || BridgeError::TypeError(format!("Cannot cast type '{}' to '{}'", value.type_name(), ty.name()));

        if let ScriptValue::Struct(source) = value {
            let source_struct = source.struct_handle()?;
            if source_struct == target {
                return Ok(source.clone());
            }
            if !host.is_child_struct_of(source_struct, target) {
                return Err(cannot_cast());
            }
            let NativeValue::Struct(mut sliced) = source.native_value()? else {
                return Err(BridgeError::null_internal(WHAT));
            };
            sliced.fields.truncate(host.struct_properties(target)?.len());
            sliced.struct_type = target;
            let wrapper = Self::new(bridge, ty)?;
            let (_, storage) = wrapper.state.parts()?;
            storage.replace(host, WHAT, NativeValue::Struct(sliced))?;
            return Ok(wrapper);
        }

        let mapping = match value {
            ScriptValue::Dict(dict) => Some(dict.borrow().items().to_vec()),
            ScriptValue::Map(map) => Some(map.pairs()?),
            _ => None,
        };
        if let Some(items) = mapping {
            let wrapper = Self::new(bridge, ty)?;
            for param in wrapper.init_params()? {
                let found = items.iter().find(|(k, _)| k.as_str() == Some(param.attribute.as_str()));
                if let Some((_, item)) = found {
                    wrapper.assign_init_param(&param, item)?;
                }
            }
            return Ok(wrapper);
        }

        let Some(items) = sequence_items(value)? else {
            return Err(cannot_cast());
        };
        let wrapper = Self::new(bridge, ty)?;
        let params = wrapper.init_params()?;
        if items.len() > params.len() {
            return Err(BridgeError::TypeError(format!(
                "Cannot cast type '{}' to '{}': {} items given for {} fields",
                value.type_name(),
                ty.name(),
                items.len(),
                params.len()
            )));
        }
        for (item, param) in items.iter().zip(&params) {
            wrapper.assign_init_param(param, item)?;
        }
        Ok(wrapper)
    }

    // -----------------------------------------------------------------------
    // Storage access
    // -----------------------------------------------------------------------

    pub fn property(&self) -> BridgeResult<Rc<Property>> {
        Ok(self.state.parts()?.0)
    }

    pub fn struct_handle(&self) -> BridgeResult<StructHandle> {
        match self.property()?.kind {
            PropertyKind::Struct(s) => Ok(s),
            _ => Err(BridgeError::null_internal("ScriptStruct")),
        }
    }

    pub fn native_value(&self) -> BridgeResult<NativeValue> {
        let (_, storage) = self.state.parts()?;
        storage.snapshot(self.base.host(), WHAT)
    }

    pub fn script_type(&self) -> Rc<ScriptType> {
        self.ty.borrow().clone()
    }

    pub(crate) fn set_script_type(&self, ty: Rc<ScriptType>) {
        *self.ty.borrow_mut() = ty;
    }

    pub fn type_name(&self) -> String {
        self.ty.borrow().name().to_string()
    }

    fn init_params(&self) -> BridgeResult<Vec<InitParam>> {
        let s = self.struct_handle()?;
        let host = self.base.host();
        let mut params = Vec::new();
        for descriptor in self.script_type().all_property_descriptors() {
            if !is_exposed(&descriptor.property) {
                continue;
            }
            if let Some((index, prop)) = host.find_struct_property(s, &descriptor.property.name) {
                params.push(InitParam { attribute: descriptor.name, index, prop });
            }
        }
        Ok(params)
    }

    fn assign_init_param(&self, param: &InitParam, value: &ScriptValue) -> BridgeResult<()> {
        let (_, storage) = self.state.parts()?;
        write_property(
            self.base.bridge(),
            &self.type_name(),
            &param.prop,
            &param.attribute,
            value,
            &storage.field(param.index),
            0,
        )
    }

    /// Field index and property behind `attribute`.
    fn resolve_field(&self, attribute: &str) -> BridgeResult<(usize, Property)> {
        let ty = self.script_type();
        let descriptor =
            ty.find_property_descriptor(attribute).ok_or_else(|| no_attribute(ty.name(), attribute))?;
        self.base
            .host()
            .find_struct_property(self.struct_handle()?, &descriptor.property.name)
            .ok_or_else(|| missing_property(&descriptor.property.name, attribute, ty.name()))
    }

    // -----------------------------------------------------------------------
    // Fields
    // -----------------------------------------------------------------------

    pub fn get_field(&self, attribute: &str) -> BridgeResult<ScriptValue> {
        let (index, prop) = self.resolve_field(attribute)?;
        let (_, storage) = self.state.parts()?;
        let owner: Weak<dyn WrappedInstance> = self.this.clone();
        read_property(
            self.base.bridge(),
            &self.type_name(),
            &prop,
            attribute,
            &storage.field(index),
            OwnerContext::new(owner, prop.name.clone()),
        )
    }

    /// Assign a field; `notify` reports the change to this struct's owner.
    pub fn set_field(&self, attribute: &str, value: &ScriptValue, notify: bool) -> BridgeResult<()> {
        let (index, prop) = self.resolve_field(attribute)?;
        let (_, storage) = self.state.parts()?;
        write_property(
            self.base.bridge(),
            &self.type_name(),
            &prop,
            attribute,
            value,
            &storage.field(index),
            CPF_SCRIPT_READ_ONLY,
        )?;
        if notify {
            self.state.owner().notify_changed();
        }
        Ok(())
    }

    pub fn set_attr(&self, attribute: &str, value: &ScriptValue) -> BridgeResult<()> {
        self.set_field(attribute, value, true)
    }

    pub fn del_attr(&self, attribute: &str) -> BridgeResult<()> {
        Err(BridgeError::TypeError(format!("Cannot delete attribute '{attribute}' from '{}'", self.type_name())))
    }

    // -----------------------------------------------------------------------
    // Value protocol
    // -----------------------------------------------------------------------

    /// Deep copy in storage owned by the new wrapper.
    pub fn copy(&self) -> BridgeResult<Rc<Self>> {
        let (prop, storage) = self.state.parts()?;
        Self::wrap(self.base.bridge(), &self.script_type(), OwnerContext::none(), &prop, &storage, ConversionMethod::Copy)
    }

    /// Native identity after casting `other` to this struct type; `None`
    /// when `other` does not convert.
    pub fn equals(&self, other: &ScriptValue) -> BridgeResult<Option<bool>> {
        let Ok(other) = Self::cast(self.base.bridge(), other, &self.script_type()) else {
            return Ok(None);
        };
        let prop = self.property()?;
        Ok(Some(prop.identical(&self.native_value()?, &other.native_value()?)))
    }

    pub fn compare(&self, op: CompareOp, other: &ScriptValue) -> BridgeResult<Option<bool>> {
        equality_compare(op, self.equals(other)?, &self.type_name())
    }

    /// Only structs whose native type supports value hashing hash.
    pub fn hash(&self) -> BridgeResult<u32> {
        let prop = self.property()?;
        if !prop.has_value_hash() {
            return Err(unhashable());
        }
        Ok(prop.value_hash(&self.native_value()?))
    }

    /// `<Struct 'Name' (A=1,B=2)>`
    pub fn to_display_string(&self) -> BridgeResult<String> {
        let prop = self.property()?;
        let exported = self.base.host().export_text(&prop, &self.native_value()?);
        Ok(format!("<Struct '{}' {exported}>", self.type_name()))
    }

    // -----------------------------------------------------------------------
    // Reinstancing
    // -----------------------------------------------------------------------

    /// Whether this wrapper owns the whole buffer it stores into.
    pub(crate) fn owns_storage(&self) -> bool {
        !self.state.owner().has_owner() && self.state.parts().is_ok_and(|(_, storage)| storage.is_whole_buffer())
    }

    /// Move an owned value onto `new_struct`, carrying fields over by name
    /// where the property type is unchanged.
    pub(crate) fn reinstance(&self, new_struct: StructHandle, ty: &Rc<ScriptType>) -> BridgeResult<()> {
        let (_, storage) = self.state.parts()?;
        let host = self.base.host();
        let old_struct = self.struct_handle()?;
        let old_props = host.struct_properties(old_struct)?;
        let NativeValue::Struct(old_value) = storage.snapshot(host, WHAT)? else {
            return Err(BridgeError::null_internal(WHAT));
        };
        let mut new_value = host.struct_default(new_struct)?;
        for (prop, field) in host.struct_properties(new_struct)?.iter().zip(new_value.fields.iter_mut()) {
            let carried = old_props.iter().position(|old| old.name == prop.name && old.same_type(prop));
            if let Some(value) = carried.and_then(|i| old_value.fields.get(i)) {
                *field = value.clone();
            }
        }
        storage.replace(host, WHAT, NativeValue::Struct(new_value))?;

        let mut prop = Property::new(ty.name(), PropertyKind::Struct(new_struct));
        host.link_property(&mut prop);
        self.state.init(ProxyState { owner: OwnerContext::none(), prop: Rc::new(prop), storage });
        self.set_script_type(ty.clone());
        Ok(())
    }
}

impl fmt::Debug for StructWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructWrapper")
            .field("type", &self.type_name())
            .field("owner", &self.owner_context())
            .finish_non_exhaustive()
    }
}

impl WrappedInstance for StructWrapper {
    fn wrapper_kind(&self) -> WrapperKind {
        WrapperKind::Struct
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
    if let Some(wrapper) = instance.as_any().downcast_ref::<StructWrapper>() {
        report_proxy_storage(wrapper.base.bridge(), &wrapper.state, collector);
    }
}

inventory::submit! {
    WrapperTypeRegistration {
        kind: WrapperKind::Struct,
        name: "Struct",
        add_referenced_objects: report_referenced_objects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::map::MapWrapper;
    use ubridge_host::{ClassDef, Host, ObjectHandle, StructDef, CPF_EDIT};

    fn bridge() -> Rc<Bridge> {
        Bridge::new(Rc::new(Host::new()), BridgeConfig::default()).unwrap()
    }

    fn point(bridge: &Rc<Bridge>) -> Rc<ScriptType> {
        let host = bridge.host();
        let package = host.create_package("/Game/Structs");
        let mut def = StructDef::new("Point", package, None);
        def.hashable = true;
        def.properties = vec![
            Property::new("x", PropertyKind::Int32).with_flags(CPF_EDIT),
            Property::new("y", PropertyKind::Int32).with_flags(CPF_EDIT),
        ];
        let s = host.add_struct(def).unwrap();
        bridge.types().script_type(host, TypeHandle::Struct(s)).unwrap()
    }

    fn ints(wrapper: &StructWrapper) -> (i64, i64) {
        (
            wrapper.get_field("x").unwrap().as_int().unwrap(),
            wrapper.get_field("y").unwrap().as_int().unwrap(),
        )
    }

    #[test]
    fn sequences_assign_positionally_and_mappings_by_name() {
        let bridge = bridge();
        let ty = point(&bridge);

        let from_tuple = StructWrapper::cast(&bridge, &ScriptValue::tuple(vec![ScriptValue::Int(5), ScriptValue::Int(7)]), &ty).unwrap();
        assert_eq!(ints(&from_tuple), (5, 7));

        let from_dict = StructWrapper::cast(&bridge, &ScriptValue::str_dict([("x", ScriptValue::Int(9))]), &ty).unwrap();
        assert_eq!(ints(&from_dict), (9, 0));

        let short = StructWrapper::cast(&bridge, &ScriptValue::list(vec![ScriptValue::Int(3)]), &ty).unwrap();
        assert_eq!(ints(&short), (3, 0));

        let err = StructWrapper::cast(&bridge, &ScriptValue::tuple(vec![ScriptValue::Int(1), ScriptValue::Int(2), ScriptValue::Int(3)]), &ty).unwrap_err();
        assert!(matches!(err, BridgeError::TypeError(_)));
    }

    #[test]
    fn map_wrappers_cast_by_name() {
        let bridge = bridge();
        let ty = point(&bridge);
        let map = MapWrapper::new(
            &bridge,
            &Property::new("Key", PropertyKind::Str),
            &Property::new("Value", PropertyKind::Int32),
        )
        .unwrap();
        map.set_item(&ScriptValue::str("y"), &ScriptValue::Int(4)).unwrap();
        map.set_item(&ScriptValue::str("z"), &ScriptValue::Int(8)).unwrap();

        let from_map = StructWrapper::cast(&bridge, &ScriptValue::Map(map), &ty).unwrap();
        assert_eq!(ints(&from_map), (0, 4));
        assert!(format!("{from_map:?}").starts_with("StructWrapper { type: \"Point\""));
    }

    #[test]
    fn casting_an_instance_of_the_same_type_is_identity() {
        let bridge = bridge();
        let ty = point(&bridge);
        let p = StructWrapper::new(&bridge, &ty).unwrap();
        let same = StructWrapper::cast(&bridge, &ScriptValue::Struct(p.clone()), &ty).unwrap();
        assert!(Rc::ptr_eq(&p, &same));
        let err = StructWrapper::cast(&bridge, &ScriptValue::Int(1), &ty).unwrap_err();
        assert_eq!(err.message(), "Cannot cast type 'int' to 'Point'");
    }

    #[test]
    fn construct_takes_positional_and_keyword_arguments() {
        let bridge = bridge();
        let ty = point(&bridge);
        let kwargs = ScriptDict::from_str_pairs([("y", ScriptValue::Int(4))]);
        let p = StructWrapper::construct(&bridge, &ty, &[ScriptValue::Int(1)], &kwargs).unwrap();
        assert_eq!(ints(&p), (1, 4));

        let bad = ScriptDict::from_str_pairs([("z", ScriptValue::Int(4))]);
        let err = StructWrapper::construct(&bridge, &ty, &[], &bad).unwrap_err();
        assert_eq!(err.message(), "'z' is an invalid keyword argument for Point()");
    }

    #[test]
    fn equality_and_hash_follow_native_identity() {
        let bridge = bridge();
        let ty = point(&bridge);
        let a = StructWrapper::cast(&bridge, &ScriptValue::tuple(vec![ScriptValue::Int(1), ScriptValue::Int(2)]), &ty).unwrap();
        let b = StructWrapper::cast(&bridge, &ScriptValue::tuple(vec![ScriptValue::Int(1), ScriptValue::Int(2)]), &ty).unwrap();
        assert_eq!(a.equals(&ScriptValue::Struct(b.clone())).unwrap(), Some(true));
        assert_eq!(a.equals(&ScriptValue::tuple(vec![ScriptValue::Int(1), ScriptValue::Int(2)])).unwrap(), Some(true));
        assert_eq!(a.equals(&ScriptValue::Int(3)).unwrap(), None);
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
        assert!(a.compare(CompareOp::Lt, &ScriptValue::Struct(b)).is_err());
        assert_eq!(a.to_display_string().unwrap(), "<Struct 'Point' (x=1,y=2)>");
    }

    #[test]
    fn unhashable_struct_types_refuse_to_hash() {
        let bridge = bridge();
        let host = bridge.host();
        let package = host.create_package("/Game/Structs");
        let mut def = StructDef::new("Loose", package, None);
        def.properties = vec![Property::new("v", PropertyKind::Int32).with_flags(CPF_EDIT)];
        let s = host.add_struct(def).unwrap();
        let ty = bridge.types().script_type(host, TypeHandle::Struct(s)).unwrap();
        let loose = StructWrapper::new(&bridge, &ty).unwrap();
        assert_eq!(loose.hash().unwrap_err().message(), "Type cannot be hashed");
    }

    #[test]
    fn container_fields_write_through_to_the_struct() {
        let bridge = bridge();
        let host = bridge.host();
        let package = host.create_package("/Game/Structs");
        let mut def = StructDef::new("Bag", package, None);
        def.properties = vec![Property::new(
            "items",
            PropertyKind::Array(Box::new(Property::new("items", PropertyKind::Int32))),
        )
        .with_flags(CPF_EDIT)];
        let s = host.add_struct(def).unwrap();
        let ty = bridge.types().script_type(host, TypeHandle::Struct(s)).unwrap();
        let bag = StructWrapper::new(&bridge, &ty).unwrap();

        let ScriptValue::Array(items) = bag.get_field("items").unwrap() else {
            panic!("expected an array");
        };
        assert!(items.owner_context().has_owner());
        items.append(&ScriptValue::Int(4)).unwrap();
        let NativeValue::Struct(value) = bag.native_value().unwrap() else { panic!("expected a struct") };
        assert_eq!(value.fields[0], NativeValue::Array(vec![NativeValue::Int(4)]));
    }

    #[test]
    fn unknown_and_protected_attributes() {
        let bridge = bridge();
        let host = bridge.host();
        let package = host.create_package("/Game/Structs");
        let mut def = StructDef::new("Guarded", package, None);
        def.properties = vec![Property::new("hidden", PropertyKind::Int32)];
        let s = host.add_struct(def).unwrap();
        let ty = bridge.types().script_type(host, TypeHandle::Struct(s)).unwrap();
        let g = StructWrapper::new(&bridge, &ty).unwrap();

        assert_eq!(g.get_field("nope").unwrap_err(), BridgeError::AttributeError("'Guarded' object has no attribute 'nope'".into()));
        assert!(g.get_field("hidden").unwrap_err().message().contains("is protected and cannot be read"));
        assert!(matches!(g.del_attr("hidden"), Err(BridgeError::TypeError(_))));
    }

    #[test]
    fn object_fields_keep_objects_alive() {
        let bridge = bridge();
        let host = bridge.host();
        let package = host.create_package("/Game/Structs");
        let mut def = StructDef::new("Holder", package, None);
        def.properties = vec![Property::new("target", PropertyKind::Object(host.root_class())).with_flags(CPF_EDIT)];
        let s = host.add_struct(def).unwrap();
        let ty = bridge.types().script_type(host, TypeHandle::Struct(s)).unwrap();

        let class = host.add_class(ClassDef::new("Thing", package, Some(host.root_class()))).unwrap();
        let obj = host.new_object(class, package, None).unwrap();
        let holder = StructWrapper::new(&bridge, &ty).unwrap();
        holder.set_attr("target", &ScriptValue::Object(bridge.objects().find_or_create(&bridge, obj).unwrap())).unwrap();

        host.collect_garbage();
        assert!(host.is_valid(obj));

        bridge.collector().purge_object_references(host, &[obj], false);
        assert!(holder.get_field("target").unwrap().is_none());
        host.collect_garbage();
        assert!(!host.is_valid(obj));
        assert_eq!(holder.native_value().unwrap().as_struct().unwrap().fields[0], NativeValue::Object(ObjectHandle::NULL));
    }

    #[test]
    fn containers_outliving_their_struct_keep_objects_alive() {
        let bridge = bridge();
        let host = bridge.host();
        let package = host.create_package("/Game/Structs");
        let mut def = StructDef::new("Crate", package, None);
        def.properties = vec![Property::new(
            "items",
            PropertyKind::Array(Box::new(Property::new("items", PropertyKind::Object(host.root_class())))),
        )
        .with_flags(CPF_EDIT)];
        let s = host.add_struct(def).unwrap();
        let ty = bridge.types().script_type(host, TypeHandle::Struct(s)).unwrap();

        let class = host.add_class(ClassDef::new("Thing", package, Some(host.root_class()))).unwrap();
        let obj = host.new_object(class, package, None).unwrap();
        let holder = StructWrapper::new(&bridge, &ty).unwrap();
        let ScriptValue::Array(items) = holder.get_field("items").unwrap() else {
            panic!("expected an array");
        };
        items.append(&ScriptValue::Object(bridge.objects().find_or_create(&bridge, obj).unwrap())).unwrap();
        drop(holder);
        assert!(items.owner_context().owner().is_none());

        host.collect_garbage();
        assert!(host.is_valid(obj));
        let ScriptValue::Object(first) = items.get_item(0).unwrap() else {
            panic!("expected an object");
        };
        assert_eq!(first.handle().unwrap(), obj);
    }

    #[test]
    fn derived_struct_instances_slice_to_the_base() {
        let bridge = bridge();
        let base_ty = point(&bridge);
        let host = bridge.host();
        let Some(TypeHandle::Struct(base)) = base_ty.native() else { panic!("no native struct") };
        let mut def = StructDef::new("Point3", host.create_package("/Game/Structs"), Some(base));
        def.properties = vec![Property::new("z", PropertyKind::Int32).with_flags(CPF_EDIT)];
        let derived = host.add_struct(def).unwrap();
        let derived_ty = bridge.types().script_type(host, TypeHandle::Struct(derived)).unwrap();

        let p3 = StructWrapper::cast(&bridge, &ScriptValue::tuple(vec![ScriptValue::Int(1), ScriptValue::Int(2), ScriptValue::Int(3)]), &derived_ty).unwrap();
        let p2 = StructWrapper::cast(&bridge, &ScriptValue::Struct(p3.clone()), &base_ty).unwrap();
        assert!(!Rc::ptr_eq(&p2, &p3));
        assert_eq!(ints(&p2), (1, 2));
        assert_eq!(p2.struct_handle().unwrap(), base);
    }
}
