// Bridge context: everything one scripting runtime shares with one host.
//
// The bridge owns the wrapper reference collector, the script <-> native type
// registry, the object wrapper factory, the reinstancer and the module
// registry. It is created once per host (`Bridge::new`) and registers itself
// with the host as a GC referencer; `shutdown` releases the script types and
// modules it holds so wrappers stored in type bodies are dropped.

use std::rc::{Rc, Weak};

use ubridge_host::{GcObject, Host, ObjectHandle, ReferenceCollector};

use crate::collector::WrapperReferenceCollector;
use crate::config::BridgeConfig;
use crate::error::BridgeResult;
use crate::factory::ObjectWrapperFactory;
use crate::guard::host_boundary;
use crate::logging::LOG_DISPLAY;
use crate::module::ModuleRegistry;
use crate::registry::TypeRegistry;
use crate::reinstancer::Reinstancer;

pub struct Bridge {
    host: Rc<Host>,
    config: BridgeConfig,
    collector: WrapperReferenceCollector,
    types: TypeRegistry,
    objects: ObjectWrapperFactory,
    reinstancer: Reinstancer,
    modules: ModuleRegistry,
    type_container: ObjectHandle,
    this: Weak<Bridge>,
}

impl Bridge {
    /// Create the bridge for `host` and register it as a GC referencer.
    pub fn new(host: Rc<Host>, config: BridgeConfig) -> BridgeResult<Rc<Bridge>> {
        host.log_sink().set_echo(config.bridge.echo_log);
        let type_container = host.create_package(&config.bridge.type_container);
        let types = TypeRegistry::new(&host);
        let bridge = Rc::new_cyclic(|this| Bridge {
            host: host.clone(),
            config,
            collector: WrapperReferenceCollector::new(),
            types,
            objects: ObjectWrapperFactory::default(),
            reinstancer: Reinstancer::default(),
            modules: ModuleRegistry::default(),
            type_container,
            this: this.clone(),
        });

        let referencer: Weak<Bridge> = Rc::downgrade(&bridge);
        let referencer: Weak<dyn GcObject> = referencer;
        host.add_gc_object(referencer);

        crate::math::register_math_types(&bridge)?;
        crate::blog!(bridge, LOG_DISPLAY, "Script bridge started (types in '{}')", bridge.config.bridge.type_container);
        Ok(bridge)
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn host_rc(&self) -> Rc<Host> {
        self.host.clone()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn collector(&self) -> &WrapperReferenceCollector {
        &self.collector
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn objects(&self) -> &ObjectWrapperFactory {
        &self.objects
    }

    pub fn reinstancer(&self) -> &Reinstancer {
        &self.reinstancer
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    /// Package that receives generated types.
    pub fn type_container(&self) -> ObjectHandle {
        self.type_container
    }

    /// Weak handle to this bridge, for callbacks handed to the host.
    pub fn weak(&self) -> Weak<Bridge> {
        self.this.clone()
    }

    /// Log under the configured category. Used by `blog!`.
    pub fn log(&self, level: u8, message: String) {
        self.host.log(&self.config.bridge.log_category, level, message);
    }

    /// Drop every script type and module the bridge holds.
    pub fn shutdown(&self) {
        self.reinstancer.clear();
        self.modules.clear();
        self.types.clear();
    }
}

impl GcObject for Bridge {
    fn add_referenced_objects(&self, collector: &mut dyn ReferenceCollector) {
        host_boundary(&self.host, (), || self.collector.add_referenced_objects(collector));
    }

    fn referencer_name(&self) -> String {
        "ScriptBridge".to_string()
    }
}
