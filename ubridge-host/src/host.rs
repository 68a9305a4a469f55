// Host: the reflection-based, garbage-collected object model.
//
// Owns the object table, the class/struct/enum records, the root set and the
// registered GC referencers. Everything uses interior mutability because the
// host is shared (`Rc<Host>`) by the bridge and its wrappers on one thread.
// No borrow of an internal table is held while calling out to a thunk,
// post-init hook, package loader or GC referencer, so those may re-enter.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::{Rc, Weak};

use ubridge_flags::*;

use crate::buffer::NativeBuffer;
use crate::error::{HostError, HostResult};
use crate::gc::{GcObject, GcReport, MarkCollector};
use crate::handles::{ClassHandle, EnumHandle, ObjectHandle, StructHandle, TypeHandle};
use crate::log::{LogSink, LOG_WARNING};
use crate::property::Property;
use crate::text::{Text, MISSING_STRING_TABLE_ENTRY};
use crate::types::{ClassDef, EnumDef, FunctionDef, PostInitHook, StructDef, TypeHeader};
use crate::value::NativeValue;

/// Package holding the bootstrap `Object` and `Package` classes.
pub const CORE_PACKAGE: &str = "/Script/CoreUObject";

const LOG_CATEGORY: &str = "LogUObjectGlobals";

/// Brings packages into memory on demand for the `load_*` family.
pub trait PackageLoader {
    /// Create the named package and its objects. Returns `false` if the
    /// package does not exist.
    fn load_package(&self, host: &Host, name: &str) -> bool;
}

#[derive(Clone, Debug, PartialEq)]
pub struct ObjectRecord {
    pub name: String,
    pub outer: ObjectHandle,
    pub class: ClassHandle,
    pub flags: u32,
    /// One value per property of the class layout (super class first).
    pub fields: Vec<NativeValue>,
}

/// A property change notification raised on an object.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyChange {
    pub object: ObjectHandle,
    pub property: String,
}

pub struct Host {
    objects: RefCell<BTreeMap<ObjectHandle, ObjectRecord>>,
    next_object: Cell<u64>,
    classes: RefCell<Vec<ClassDef>>,
    structs: RefCell<Vec<StructDef>>,
    enums: RefCell<Vec<EnumDef>>,
    roots: RefCell<BTreeSet<ObjectHandle>>,
    gc_objects: RefCell<Vec<Weak<dyn GcObject>>>,
    loader: RefCell<Option<Rc<dyn PackageLoader>>>,
    string_tables: RefCell<HashMap<String, HashMap<String, String>>>,
    translations: RefCell<HashMap<(String, String), String>>,
    changes: RefCell<Vec<PropertyChange>>,
    live_allocations: Rc<Cell<usize>>,
    log: LogSink,
    root_class: ClassHandle,
    package_class: ClassHandle,
    core_package: ObjectHandle,
}

impl Default for Host {
    fn default() -> Self {
        Host::new()
    }
}

impl Host {
    pub fn new() -> Self {
        let host = Host {
            objects: RefCell::new(BTreeMap::new()),
            next_object: Cell::new(1),
            classes: RefCell::new(Vec::new()),
            structs: RefCell::new(Vec::new()),
            enums: RefCell::new(Vec::new()),
            roots: RefCell::new(BTreeSet::new()),
            gc_objects: RefCell::new(Vec::new()),
            loader: RefCell::new(None),
            string_tables: RefCell::new(HashMap::new()),
            translations: RefCell::new(HashMap::new()),
            changes: RefCell::new(Vec::new()),
            live_allocations: Rc::new(Cell::new(0)),
            log: LogSink::default(),
            root_class: ClassHandle::from_index(0),
            package_class: ClassHandle::from_index(1),
            core_package: ObjectHandle(1),
        };

        // Bootstrap: the core package, then Object and Package classes.
        let core = host.alloc_handle();
        host.objects.borrow_mut().insert(
            core,
            ObjectRecord {
                name: CORE_PACKAGE.to_string(),
                outer: ObjectHandle::NULL,
                class: host.package_class,
                flags: RF_PUBLIC | RF_STANDALONE,
                fields: Vec::new(),
            },
        );
        let mut object = ClassDef::new("Object", core, None);
        object.class_flags = CLASS_NATIVE;
        let mut package = ClassDef::new("Package", core, Some(host.root_class));
        package.class_flags = CLASS_NATIVE;
        host.classes.borrow_mut().extend([object, package]);
        host
    }

    /// The root `Object` class.
    pub fn root_class(&self) -> ClassHandle {
        self.root_class
    }

    pub fn package_class(&self) -> ClassHandle {
        self.package_class
    }

    pub fn core_package(&self) -> ObjectHandle {
        self.core_package
    }

    // -----------------------------------------------------------------------
    // Type records
    // -----------------------------------------------------------------------

    pub fn class_def(&self, h: ClassHandle) -> HostResult<Ref<'_, ClassDef>> {
        let classes = self.classes.borrow();
        let idx = h.index().filter(|&i| i < classes.len()).ok_or(HostError::InvalidClass(h))?;
        Ok(Ref::map(classes, |c| &c[idx]))
    }

    pub fn class_def_mut(&self, h: ClassHandle) -> HostResult<RefMut<'_, ClassDef>> {
        let classes = self.classes.try_borrow_mut().map_err(|_| HostError::Busy("class table"))?;
        let idx = h.index().filter(|&i| i < classes.len()).ok_or(HostError::InvalidClass(h))?;
        Ok(RefMut::map(classes, |c| &mut c[idx]))
    }

    pub fn struct_def(&self, h: StructHandle) -> HostResult<Ref<'_, StructDef>> {
        let structs = self.structs.borrow();
        let idx = h.index().filter(|&i| i < structs.len()).ok_or(HostError::InvalidStruct(h))?;
        Ok(Ref::map(structs, |s| &s[idx]))
    }

    pub fn struct_def_mut(&self, h: StructHandle) -> HostResult<RefMut<'_, StructDef>> {
        let structs = self.structs.try_borrow_mut().map_err(|_| HostError::Busy("struct table"))?;
        let idx = h.index().filter(|&i| i < structs.len()).ok_or(HostError::InvalidStruct(h))?;
        Ok(RefMut::map(structs, |s| &mut s[idx]))
    }

    pub fn enum_def(&self, h: EnumHandle) -> HostResult<Ref<'_, EnumDef>> {
        let enums = self.enums.borrow();
        let idx = h.index().filter(|&i| i < enums.len()).ok_or(HostError::InvalidEnum(h))?;
        Ok(Ref::map(enums, |e| &e[idx]))
    }

    pub fn enum_def_mut(&self, h: EnumHandle) -> HostResult<RefMut<'_, EnumDef>> {
        let enums = self.enums.try_borrow_mut().map_err(|_| HostError::Busy("enum table"))?;
        let idx = h.index().filter(|&i| i < enums.len()).ok_or(HostError::InvalidEnum(h))?;
        Ok(RefMut::map(enums, |e| &mut e[idx]))
    }

    /// Install a class record. Fails if its package already holds a type of that name.
    pub fn add_class(&self, mut def: ClassDef) -> HostResult<ClassHandle> {
        self.check_type_name_free(&def.header)?;
        if let Some(super_class) = def.super_class {
            self.class_def(super_class)?;
        }
        for prop in &mut def.properties {
            self.link_property(prop);
        }
        for func in &mut def.functions {
            for param in &mut func.params {
                self.link_property(param);
            }
        }
        let mut classes = self.classes.borrow_mut();
        classes.push(def);
        Ok(ClassHandle::from_index(classes.len() - 1))
    }

    pub fn add_struct(&self, mut def: StructDef) -> HostResult<StructHandle> {
        self.check_type_name_free(&def.header)?;
        if let Some(super_struct) = def.super_struct {
            self.struct_def(super_struct)?;
        }
        for prop in &mut def.properties {
            self.link_property(prop);
        }
        let mut structs = self.structs.borrow_mut();
        structs.push(def);
        Ok(StructHandle::from_index(structs.len() - 1))
    }

    pub fn add_enum(&self, def: EnumDef) -> HostResult<EnumHandle> {
        self.check_type_name_free(&def.header)?;
        let mut enums = self.enums.borrow_mut();
        enums.push(def);
        Ok(EnumHandle::from_index(enums.len() - 1))
    }

    fn check_type_name_free(&self, header: &TypeHeader) -> HostResult<()> {
        if self.find_type_in(header.package, &header.name).is_some() {
            return Err(HostError::NameCollision(format!(
                "{}.{}",
                self.path_name(header.package),
                header.name
            )));
        }
        Ok(())
    }

    pub fn find_class_in(&self, package: ObjectHandle, name: &str) -> Option<ClassHandle> {
        self.classes
            .borrow()
            .iter()
            .position(|c| c.header.package == package && c.header.name == name)
            .map(ClassHandle::from_index)
    }

    pub fn find_struct_in(&self, package: ObjectHandle, name: &str) -> Option<StructHandle> {
        self.structs
            .borrow()
            .iter()
            .position(|s| s.header.package == package && s.header.name == name)
            .map(StructHandle::from_index)
    }

    pub fn find_enum_in(&self, package: ObjectHandle, name: &str) -> Option<EnumHandle> {
        self.enums
            .borrow()
            .iter()
            .position(|e| e.header.package == package && e.header.name == name)
            .map(EnumHandle::from_index)
    }

    /// Find a class by short name in any package.
    pub fn find_class(&self, name: &str) -> Option<ClassHandle> {
        self.classes.borrow().iter().position(|c| c.header.name == name).map(ClassHandle::from_index)
    }

    pub fn find_struct(&self, name: &str) -> Option<StructHandle> {
        self.structs.borrow().iter().position(|s| s.header.name == name).map(StructHandle::from_index)
    }

    pub fn find_enum(&self, name: &str) -> Option<EnumHandle> {
        self.enums.borrow().iter().position(|e| e.header.name == name).map(EnumHandle::from_index)
    }

    pub fn find_type_in(&self, package: ObjectHandle, name: &str) -> Option<TypeHandle> {
        self.find_class_in(package, name)
            .map(TypeHandle::Class)
            .or_else(|| self.find_struct_in(package, name).map(TypeHandle::Struct))
            .or_else(|| self.find_enum_in(package, name).map(TypeHandle::Enum))
    }

    /// Resolve a type by `outer` + `name`, or by full path (`/Script/Pkg.Name`)
    /// or short name when `outer` is null.
    pub fn find_type(&self, outer: ObjectHandle, name: &str) -> Option<TypeHandle> {
        if !outer.is_null() {
            return self.find_type_in(outer, name);
        }
        match name.rsplit_once('.') {
            Some((package, short)) => {
                let package = self.find_package(ObjectHandle::NULL, package)?;
                self.find_type_in(package, short)
            }
            None => self
                .find_class(name)
                .map(TypeHandle::Class)
                .or_else(|| self.find_struct(name).map(TypeHandle::Struct))
                .or_else(|| self.find_enum(name).map(TypeHandle::Enum)),
        }
    }

    /// `base` if unused in `package`, else `base_1`, `base_2`, ...
    pub fn make_unique_type_name(&self, package: ObjectHandle, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut n = 0;
        while self.find_type_in(package, &candidate).is_some() {
            n += 1;
            candidate = format!("{base}_{n}");
        }
        candidate
    }

    pub fn rename_type(&self, ty: TypeHandle, new_name: &str) -> HostResult<()> {
        let package = self.type_header(ty)?.package;
        if self.find_type_in(package, new_name).is_some() {
            return Err(HostError::NameCollision(new_name.to_string()));
        }
        match ty {
            TypeHandle::Class(h) => self.class_def_mut(h)?.header.name = new_name.to_string(),
            TypeHandle::Struct(h) => self.struct_def_mut(h)?.header.name = new_name.to_string(),
            TypeHandle::Enum(h) => self.enum_def_mut(h)?.header.name = new_name.to_string(),
        }
        Ok(())
    }

    pub fn type_header(&self, ty: TypeHandle) -> HostResult<TypeHeader> {
        Ok(match ty {
            TypeHandle::Class(h) => self.class_def(h)?.header.clone(),
            TypeHandle::Struct(h) => self.struct_def(h)?.header.clone(),
            TypeHandle::Enum(h) => self.enum_def(h)?.header.clone(),
        })
    }

    pub fn type_name(&self, ty: TypeHandle) -> String {
        self.type_header(ty).map(|h| h.name).unwrap_or_else(|_| "None".to_string())
    }

    pub fn type_path(&self, ty: TypeHandle) -> String {
        match self.type_header(ty) {
            Ok(header) => format!("{}.{}", self.path_name(header.package), header.name),
            Err(_) => "None".to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Hierarchy queries
    // -----------------------------------------------------------------------

    pub fn super_class(&self, h: ClassHandle) -> Option<ClassHandle> {
        self.class_def(h).ok().and_then(|c| c.super_class)
    }

    pub fn is_child_of(&self, child: ClassHandle, parent: ClassHandle) -> bool {
        let mut current = Some(child);
        while let Some(c) = current {
            if c == parent {
                return true;
            }
            current = self.super_class(c);
        }
        false
    }

    /// Direct subclasses of `h`.
    pub fn derived_classes(&self, h: ClassHandle) -> Vec<ClassHandle> {
        self.classes
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.super_class == Some(h))
            .map(|(i, _)| ClassHandle::from_index(i))
            .collect()
    }

    /// Full property layout of a class, super class properties first.
    pub fn class_properties(&self, h: ClassHandle) -> HostResult<Vec<Property>> {
        let mut chain = Vec::new();
        let mut current = Some(h);
        while let Some(c) = current {
            let def = self.class_def(c)?;
            chain.push(def.properties.clone());
            current = def.super_class;
        }
        Ok(chain.into_iter().rev().flatten().collect())
    }

    pub fn find_class_property(&self, h: ClassHandle, name: &str) -> Option<(usize, Property)> {
        let props = self.class_properties(h).ok()?;
        props.into_iter().enumerate().find(|(_, p)| p.name == name)
    }

    /// Find a function on `h` or its super classes.
    pub fn find_function(&self, h: ClassHandle, name: &str) -> Option<(ClassHandle, FunctionDef)> {
        let mut current = Some(h);
        while let Some(c) = current {
            let def = self.class_def(c).ok()?;
            if let Some(func) = def.functions.iter().find(|f| f.name == name) {
                return Some((c, func.clone()));
            }
            current = def.super_class;
        }
        None
    }

    pub fn struct_properties(&self, h: StructHandle) -> HostResult<Vec<Property>> {
        let mut chain = Vec::new();
        let mut current = Some(h);
        while let Some(s) = current {
            let def = self.struct_def(s)?;
            chain.push(def.properties.clone());
            current = def.super_struct;
        }
        Ok(chain.into_iter().rev().flatten().collect())
    }

    pub fn find_struct_property(&self, h: StructHandle, name: &str) -> Option<(usize, Property)> {
        let props = self.struct_properties(h).ok()?;
        props.into_iter().enumerate().find(|(_, p)| p.name == name)
    }

    pub fn is_child_struct_of(&self, child: StructHandle, parent: StructHandle) -> bool {
        let mut current = Some(child);
        while let Some(s) = current {
            if s == parent {
                return true;
            }
            current = self.struct_def(s).ok().and_then(|d| d.super_struct);
        }
        false
    }

    fn post_init_hook(&self, class: ClassHandle) -> Option<PostInitHook> {
        let mut current = Some(class);
        while let Some(c) = current {
            let def = self.class_def(c).ok()?;
            if let Some(hook) = &def.post_init {
                return Some(hook.clone());
            }
            current = def.super_class;
        }
        None
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    fn alloc_handle(&self) -> ObjectHandle {
        let h = ObjectHandle(self.next_object.get());
        self.next_object.set(h.0 + 1);
        h
    }

    /// Find or create a top-level package.
    pub fn create_package(&self, name: &str) -> ObjectHandle {
        if let Some(existing) = self.find_package(ObjectHandle::NULL, name) {
            return existing;
        }
        let h = self.alloc_handle();
        self.objects.borrow_mut().insert(
            h,
            ObjectRecord {
                name: name.to_string(),
                outer: ObjectHandle::NULL,
                class: self.package_class,
                flags: RF_PUBLIC | RF_STANDALONE,
                fields: Vec::new(),
            },
        );
        h
    }

    pub fn new_object(&self, class: ClassHandle, outer: ObjectHandle, name: Option<&str>) -> HostResult<ObjectHandle> {
        self.new_object_with_flags(class, outer, name, RF_NO_FLAGS)
    }

    /// Construct an instance of `class`, run its post-init hook, return its handle.
    pub fn new_object_with_flags(
        &self,
        class: ClassHandle,
        outer: ObjectHandle,
        name: Option<&str>,
        flags: u32,
    ) -> HostResult<ObjectHandle> {
        if !outer.is_null() && !self.is_valid(outer) {
            return Err(HostError::ObjectDestroyed(outer));
        }
        let class_name = self.class_def(class)?.header.name.clone();
        let fields = self
            .class_properties(class)?
            .iter()
            .map(|p| self.default_complete_value(p))
            .collect::<HostResult<Vec<_>>>()?;
        let handle = self.alloc_handle();
        let name = match name {
            Some(n) => {
                if self.find_object_in(outer, n).is_some() {
                    return Err(HostError::NameCollision(n.to_string()));
                }
                n.to_string()
            }
            None => format!("{class_name}_{}", handle.0),
        };
        self.objects
            .borrow_mut()
            .insert(handle, ObjectRecord { name, outer, class, flags, fields });

        if let Some(hook) = self.post_init_hook(class) {
            hook(self, handle);
        }
        Ok(handle)
    }

    pub fn is_valid(&self, h: ObjectHandle) -> bool {
        !h.is_null() && self.objects.borrow().contains_key(&h)
    }

    fn with_record<R>(&self, h: ObjectHandle, f: impl FnOnce(&ObjectRecord) -> R) -> HostResult<R> {
        let objects = self.objects.try_borrow().map_err(|_| HostError::Busy("object table"))?;
        objects.get(&h).map(f).ok_or(HostError::ObjectDestroyed(h))
    }

    pub fn object_name(&self, h: ObjectHandle) -> HostResult<String> {
        self.with_record(h, |r| r.name.clone())
    }

    pub fn object_outer(&self, h: ObjectHandle) -> HostResult<ObjectHandle> {
        self.with_record(h, |r| r.outer)
    }

    pub fn class_of(&self, h: ObjectHandle) -> HostResult<ClassHandle> {
        self.with_record(h, |r| r.class)
    }

    pub fn object_flags(&self, h: ObjectHandle) -> HostResult<u32> {
        self.with_record(h, |r| r.flags)
    }

    pub fn set_object_flags(&self, h: ObjectHandle, flags: u32) -> HostResult<()> {
        let mut objects = self.objects.try_borrow_mut().map_err(|_| HostError::Busy("object table"))?;
        let record = objects.get_mut(&h).ok_or(HostError::ObjectDestroyed(h))?;
        record.flags |= flags;
        Ok(())
    }

    pub fn clear_object_flags(&self, h: ObjectHandle, flags: u32) -> HostResult<()> {
        let mut objects = self.objects.try_borrow_mut().map_err(|_| HostError::Busy("object table"))?;
        let record = objects.get_mut(&h).ok_or(HostError::ObjectDestroyed(h))?;
        record.flags &= !flags;
        Ok(())
    }

    /// Full path: `/Game/Pkg.Asset.Inner`, or `None` for a null/dead handle.
    pub fn path_name(&self, h: ObjectHandle) -> String {
        let objects = self.objects.borrow();
        let mut names = Vec::new();
        let mut current = h;
        while let Some(record) = objects.get(&current) {
            names.push(record.name.as_str());
            current = record.outer;
        }
        if names.is_empty() {
            return "None".to_string();
        }
        names.reverse();
        names.join(".")
    }

    pub fn is_a(&self, h: ObjectHandle, class: ClassHandle) -> bool {
        self.class_of(h).is_ok_and(|c| self.is_child_of(c, class))
    }

    pub fn is_package(&self, h: ObjectHandle) -> bool {
        self.class_of(h).is_ok_and(|c| c == self.package_class)
    }

    /// Outermost object of `h` (its package).
    pub fn package_of(&self, h: ObjectHandle) -> ObjectHandle {
        let objects = self.objects.borrow();
        let mut current = h;
        while let Some(record) = objects.get(&current) {
            if record.outer.is_null() {
                return current;
            }
            current = record.outer;
        }
        ObjectHandle::NULL
    }

    /// Public, non-transient, non-CDO object directly inside a package.
    pub fn is_asset(&self, h: ObjectHandle) -> bool {
        let Ok((outer, flags)) = self.with_record(h, |r| (r.outer, r.flags)) else {
            return false;
        };
        !self.is_package(h)
            && self.is_package(outer)
            && flags & RF_PUBLIC != 0
            && flags & (RF_TRANSIENT | RF_CLASS_DEFAULT_OBJECT) == 0
    }

    /// Every object whose outer chain contains `h`.
    pub fn inners_of(&self, h: ObjectHandle) -> Vec<ObjectHandle> {
        let objects = self.objects.borrow();
        objects
            .iter()
            .filter(|(candidate, _)| {
                let mut outer = objects.get(*candidate).map(|r| r.outer);
                while let Some(o) = outer {
                    if o == h {
                        return true;
                    }
                    outer = objects.get(&o).map(|r| r.outer);
                }
                false
            })
            .map(|(handle, _)| *handle)
            .collect()
    }

    pub fn objects_of_class(&self, class: ClassHandle) -> Vec<ObjectHandle> {
        self.objects
            .borrow()
            .iter()
            .filter(|(_, r)| r.class == class)
            .map(|(h, _)| *h)
            .collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.borrow().len()
    }

    /// Run `f` against the field storage of `h`.
    pub fn with_fields<R>(&self, h: ObjectHandle, f: impl FnOnce(&mut Vec<NativeValue>) -> R) -> HostResult<R> {
        let mut objects = self.objects.try_borrow_mut().map_err(|_| HostError::Busy("object table"))?;
        let record = objects.get_mut(&h).ok_or(HostError::ObjectDestroyed(h))?;
        Ok(f(&mut record.fields))
    }

    pub fn get_property_value(&self, h: ObjectHandle, name: &str) -> HostResult<NativeValue> {
        let class = self.class_of(h)?;
        let (index, _) = self
            .find_class_property(class, name)
            .ok_or_else(|| HostError::PropertyNotFound(name.to_string()))?;
        self.with_fields(h, |fields| fields.get(index).cloned())?
            .ok_or_else(|| HostError::PropertyNotFound(name.to_string()))
    }

    pub fn set_property_value(&self, h: ObjectHandle, name: &str, value: NativeValue) -> HostResult<()> {
        let class = self.class_of(h)?;
        let (index, _) = self
            .find_class_property(class, name)
            .ok_or_else(|| HostError::PropertyNotFound(name.to_string()))?;
        self.with_fields(h, |fields| match fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(HostError::PropertyNotFound(name.to_string())),
        })?
    }

    /// Re-point `h` at `new_class`, carrying field values over by name where
    /// the property kind is unchanged; other fields take their defaults.
    pub fn reinstance_object(&self, h: ObjectHandle, new_class: ClassHandle) -> HostResult<()> {
        let old_class = self.class_of(h)?;
        let old_props = self.class_properties(old_class)?;
        let new_props = self.class_properties(new_class)?;
        let old_fields = self.with_fields(h, std::mem::take)?;
        let mut fields = Vec::with_capacity(new_props.len());
        for prop in &new_props {
            let carried = old_props
                .iter()
                .position(|old| old.name == prop.name && old.kind == prop.kind && old.array_dim == prop.array_dim)
                .and_then(|i| old_fields.get(i).cloned());
            fields.push(match carried {
                Some(value) => value,
                None => self.default_complete_value(prop)?,
            });
        }
        let mut objects = self.objects.try_borrow_mut().map_err(|_| HostError::Busy("object table"))?;
        let record = objects.get_mut(&h).ok_or(HostError::ObjectDestroyed(h))?;
        record.class = new_class;
        record.fields = fields;
        Ok(())
    }

    /// Record a PostEditChange-style notification.
    pub fn notify_property_changed(&self, h: ObjectHandle, property: &str) {
        self.changes
            .borrow_mut()
            .push(PropertyChange { object: h, property: property.to_string() });
    }

    pub fn take_property_changes(&self) -> Vec<PropertyChange> {
        std::mem::take(&mut *self.changes.borrow_mut())
    }

    /// Destroy `h` and everything inside it out-of-band. Returns the
    /// destroyed handles.
    pub fn destroy_object(&self, h: ObjectHandle) -> Vec<ObjectHandle> {
        if !self.is_valid(h) {
            return Vec::new();
        }
        let mut doomed = vec![h];
        doomed.extend(self.inners_of(h));
        let mut objects = self.objects.borrow_mut();
        let mut roots = self.roots.borrow_mut();
        for d in &doomed {
            objects.remove(d);
            roots.remove(d);
        }
        doomed
    }

    // -----------------------------------------------------------------------
    // Find / load
    // -----------------------------------------------------------------------

    fn find_object_in(&self, outer: ObjectHandle, name: &str) -> Option<ObjectHandle> {
        self.objects
            .borrow()
            .iter()
            .find(|(_, r)| r.outer == outer && r.name == name)
            .map(|(h, _)| *h)
    }

    fn resolve_relative(&self, outer: ObjectHandle, path: &str) -> Option<ObjectHandle> {
        path.split(['.', ':'])
            .try_fold(outer, |current, segment| self.find_object_in(current, segment))
    }

    /// StaticFindObject: `name` is relative to `outer`, or a full path when
    /// `outer` is null. Results not of `class` are discarded.
    pub fn find_object(&self, class: Option<ClassHandle>, outer: ObjectHandle, name: &str) -> Option<ObjectHandle> {
        let found = if outer.is_null() {
            match name.split_once('.') {
                Some((package, rest)) => {
                    let package = self.find_object_in(ObjectHandle::NULL, package)?;
                    self.resolve_relative(package, rest)
                }
                None => self.find_object_in(ObjectHandle::NULL, name),
            }
        } else {
            self.resolve_relative(outer, name)
        };
        found.filter(|h| class.is_none_or(|c| self.is_a(*h, c)))
    }

    pub fn find_package(&self, outer: ObjectHandle, name: &str) -> Option<ObjectHandle> {
        self.find_object_in(outer, name).filter(|h| self.is_package(*h))
    }

    pub fn set_package_loader(&self, loader: Rc<dyn PackageLoader>) {
        *self.loader.borrow_mut() = Some(loader);
    }

    pub fn load_package(&self, outer: ObjectHandle, name: &str) -> Option<ObjectHandle> {
        if let Some(found) = self.find_package(outer, name) {
            return Some(found);
        }
        let loader = self.loader.borrow().clone();
        let loaded = loader.is_some_and(|l| l.load_package(self, name));
        let found = if loaded { self.find_package(outer, name) } else { None };
        if found.is_none() {
            self.log.log(LOG_CATEGORY, LOG_WARNING, format!("Failed to load package '{name}'"));
        }
        found
    }

    fn package_name_for(&self, outer: ObjectHandle, name: &str) -> String {
        if outer.is_null() {
            name.split('.').next().unwrap_or(name).to_string()
        } else {
            self.path_name(self.package_of(outer))
        }
    }

    /// StaticLoadObject: find, else load the owning package and find again.
    pub fn load_object(&self, class: Option<ClassHandle>, outer: ObjectHandle, name: &str) -> Option<ObjectHandle> {
        if let Some(found) = self.find_object(class, outer, name) {
            return Some(found);
        }
        let package = self.package_name_for(outer, name);
        self.load_package(ObjectHandle::NULL, &package)?;
        self.find_object(class, outer, name)
    }

    /// Find a type, loading its package first if needed.
    pub fn load_type(&self, outer: ObjectHandle, name: &str) -> Option<TypeHandle> {
        if let Some(found) = self.find_type(outer, name) {
            return Some(found);
        }
        let package = if outer.is_null() {
            name.rsplit_once('.').map(|(p, _)| p.to_string())?
        } else {
            self.path_name(self.package_of(outer))
        };
        self.load_package(ObjectHandle::NULL, &package)?;
        self.find_type(outer, name)
    }

    // -----------------------------------------------------------------------
    // Garbage collection
    // -----------------------------------------------------------------------

    pub fn add_to_root(&self, h: ObjectHandle) {
        self.roots.borrow_mut().insert(h);
    }

    pub fn remove_from_root(&self, h: ObjectHandle) {
        self.roots.borrow_mut().remove(&h);
    }

    pub fn add_gc_object(&self, object: Weak<dyn GcObject>) {
        self.gc_objects.borrow_mut().push(object);
    }

    /// Mark from the root set, standalone objects, packages and every GC
    /// referencer, following outers and object-valued fields; destroy the rest.
    pub fn collect_garbage(&self) -> GcReport {
        let referencers: Vec<Rc<dyn GcObject>> = {
            let mut list = self.gc_objects.borrow_mut();
            list.retain(|w| w.strong_count() > 0);
            list.iter().filter_map(Weak::upgrade).collect()
        };
        let mut mark = MarkCollector::default();
        for referencer in &referencers {
            referencer.add_referenced_objects(&mut mark);
        }
        drop(referencers);

        let Ok(mut objects) = self.objects.try_borrow_mut() else {
            self.log.log(LOG_CATEGORY, LOG_WARNING, "Garbage collection skipped: object table is busy");
            return GcReport::default();
        };
        let mut work: Vec<ObjectHandle> = self.roots.borrow().iter().copied().collect();
        work.extend(mark.found);
        work.extend(
            objects
                .iter()
                .filter(|(_, r)| r.flags & RF_STANDALONE != 0 || r.class == self.package_class)
                .map(|(h, _)| *h),
        );

        let mut reachable = BTreeSet::new();
        while let Some(h) = work.pop() {
            let Some(record) = objects.get(&h) else { continue };
            if !reachable.insert(h) {
                continue;
            }
            if !record.outer.is_null() {
                work.push(record.outer);
            }
            for field in &record.fields {
                field.collect_objects(&mut work);
            }
        }

        let destroyed: Vec<ObjectHandle> = objects.keys().filter(|h| !reachable.contains(h)).copied().collect();
        for h in &destroyed {
            objects.remove(h);
        }
        GcReport { reachable: reachable.len(), destroyed }
    }

    // -----------------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------------

    /// Call `name` (found on `class` or its supers) with the given input
    /// arguments. Returns the return value followed by out parameters.
    pub fn call_function(
        &self,
        object: ObjectHandle,
        class: ClassHandle,
        name: &str,
        args: Vec<NativeValue>,
    ) -> HostResult<Vec<NativeValue>> {
        let (_, func) = self
            .find_function(class, name)
            .ok_or_else(|| HostError::FunctionNotFound(name.to_string()))?;
        if !func.has_any_flags(FUNC_STATIC) && !self.is_valid(object) {
            return Err(HostError::ObjectDestroyed(object));
        }

        let mut args = args.into_iter();
        let mut frame = Vec::with_capacity(func.params.len());
        for param in &func.params {
            if param.is_input_parameter() {
                match args.next() {
                    Some(value) => frame.push(value),
                    None => frame.push(self.param_default(&func, param)?),
                }
            } else {
                frame.push(self.default_complete_value(param)?);
            }
        }
        if args.next().is_some() {
            return Err(HostError::TypeMismatch(format!("too many arguments for '{name}'")));
        }

        let thunk = func
            .thunk
            .clone()
            .ok_or_else(|| HostError::FunctionFailed(format!("'{name}' has no native implementation")))?;
        thunk(self, object, &mut frame)?;

        let mut outputs = Vec::new();
        if let Some(i) = func.params.iter().position(|p| p.has_any_flags(CPF_RETURN_PARM)) {
            outputs.push(frame[i].clone());
        }
        for (i, param) in func.params.iter().enumerate() {
            if param.has_any_flags(CPF_OUT_PARM) && !param.has_any_flags(CPF_RETURN_PARM) {
                outputs.push(frame[i].clone());
            }
        }
        Ok(outputs)
    }

    fn param_default(&self, func: &FunctionDef, param: &Property) -> HostResult<NativeValue> {
        let key = format!("CPP_Default_{}", param.name);
        match func.metadata.get(&key) {
            Some(text) => self.import_text(param, text).ok_or_else(|| {
                HostError::TypeMismatch(format!("bad default '{text}' for parameter '{}'", param.name))
            }),
            None => self.default_complete_value(param),
        }
    }

    // -----------------------------------------------------------------------
    // Localization
    // -----------------------------------------------------------------------

    pub fn register_string_table(&self, table_id: &str, entries: impl IntoIterator<Item = (String, String)>) {
        self.string_tables
            .borrow_mut()
            .entry(table_id.to_string())
            .or_default()
            .extend(entries);
    }

    pub fn add_translation(&self, namespace: &str, key: &str, display: &str) {
        self.translations
            .borrow_mut()
            .insert((namespace.to_string(), key.to_string()), display.to_string());
    }

    /// NSLOCTEXT: displays the translation for namespace/key, else `source`.
    pub fn localized_text(&self, namespace: &str, key: &str, source: &str) -> Text {
        let display = self
            .translations
            .borrow()
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
            .unwrap_or_else(|| source.to_string());
        Text::localized(namespace, key, source, display)
    }

    /// LOCTABLE: the string table entry, or a missing-entry marker.
    pub fn string_table_text(&self, table_id: &str, key: &str) -> Text {
        let display = self
            .string_tables
            .borrow()
            .get(table_id)
            .and_then(|t| t.get(key))
            .cloned()
            .unwrap_or_else(|| MISSING_STRING_TABLE_ENTRY.to_string());
        Text::string_table(table_id, key, display)
    }

    // -----------------------------------------------------------------------
    // Allocation and logging
    // -----------------------------------------------------------------------

    /// Allocate a counted native buffer holding `value`.
    pub fn allocate(&self, value: NativeValue) -> Rc<NativeBuffer> {
        Rc::new(NativeBuffer::new(value, self.live_allocations.clone()))
    }

    /// Number of native buffers currently alive.
    pub fn live_allocations(&self) -> usize {
        self.live_allocations.get()
    }

    pub fn log(&self, category: &str, verbosity: u8, message: impl Into<String>) {
        self.log.log(category, verbosity, message);
    }

    pub fn log_sink(&self) -> &LogSink {
        &self.log
    }
}
