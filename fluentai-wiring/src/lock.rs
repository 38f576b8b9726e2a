//! Two-phase engine state: configuring, then frozen

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{DiError, DiResult};
use crate::lazy::{DefaultFileLoader, FileLoader};
use crate::settings::EngineSettings;
use crate::spec::{CompiledSpecs, InjectionSpecStore, SpecUnifier};
use crate::types::{TypeCatalog, TypeIntrospector};
use crate::value::ObjectRef;

/// Everything that can still change before lock
pub struct Configuration {
    pub catalog: TypeCatalog,
    pub specs: InjectionSpecStore,
    pub settings: EngineSettings,
    pub file_loader: Arc<dyn FileLoader>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::with_settings(EngineSettings::default())
    }
}

impl Configuration {
    pub fn with_settings(settings: EngineSettings) -> Self {
        Self {
            catalog: TypeCatalog::new(),
            specs: InjectionSpecStore::new(),
            settings,
            file_loader: Arc::new(DefaultFileLoader),
        }
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("catalog", &self.catalog)
            .field("specs", &self.specs)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Immutable engine state shared by every build after lock
pub struct Frozen {
    pub(crate) introspector: TypeIntrospector,
    pub(crate) unifier: SpecUnifier,
    pub(crate) specs: Arc<CompiledSpecs>,
    pub(crate) settings: EngineSettings,
    pub(crate) file_loader: Arc<dyn FileLoader>,
    pub(crate) shared: Mutex<FxHashMap<String, ObjectRef>>,
}

impl Frozen {
    /// Compile a configuration, locking every lazy node it references
    pub fn compile(config: Configuration) -> Self {
        let specs = Arc::new(config.specs.freeze(config.settings.default_scope));
        specs.lock_lazies();

        Self {
            introspector: TypeIntrospector::new(config.catalog),
            unifier: SpecUnifier::new(Arc::clone(&specs)),
            specs,
            settings: config.settings,
            file_loader: config.file_loader,
            shared: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn introspector(&self) -> &TypeIntrospector {
        &self.introspector
    }

    pub fn specs(&self) -> &CompiledSpecs {
        &self.specs
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Cached shared instance of `type_name`, if one has been built
    pub fn shared_instance(&self, type_name: &str) -> Option<ObjectRef> {
        self.shared.lock().get(type_name).cloned()
    }
}

enum Phase {
    Open(Box<Configuration>),
    Locked(Arc<Frozen>),
}

/// Owns the irreversible configuring-to-frozen transition
pub struct LockController {
    phase: RwLock<Phase>,
}

impl Default for LockController {
    fn default() -> Self {
        Self::new(Configuration::default())
    }
}

impl LockController {
    pub fn new(config: Configuration) -> Self {
        Self {
            phase: RwLock::new(Phase::Open(Box::new(config))),
        }
    }

    /// Mutate the configuration; fails with `Locked` once frozen
    pub fn configure<R>(&self, f: impl FnOnce(&mut Configuration) -> DiResult<R>) -> DiResult<R> {
        match &mut *self.phase.write() {
            Phase::Open(config) => f(config),
            Phase::Locked(_) => Err(DiError::Locked { target: "engine" }),
        }
    }

    /// Read the configuration while still open
    pub fn inspect<R>(&self, f: impl FnOnce(&Configuration) -> R) -> Option<R> {
        match &*self.phase.read() {
            Phase::Open(config) => Some(f(config)),
            Phase::Locked(_) => None,
        }
    }

    /// Freeze the configuration; later calls return the same state
    pub fn lock(&self) -> Arc<Frozen> {
        let mut phase = self.phase.write();
        if let Phase::Locked(frozen) = &*phase {
            return Arc::clone(frozen);
        }

        let frozen = match std::mem::replace(&mut *phase, Phase::Open(Box::default())) {
            Phase::Open(config) => Arc::new(Frozen::compile(*config)),
            Phase::Locked(frozen) => frozen,
        };
        debug!(
            "Engine locked with {} registered types",
            frozen.introspector.catalog().len()
        );
        *phase = Phase::Locked(Arc::clone(&frozen));
        frozen
    }

    pub fn is_locked(&self) -> bool {
        matches!(&*self.phase.read(), Phase::Locked(_))
    }

    /// Frozen state; fails with `NotLocked` before lock
    pub fn frozen(&self) -> DiResult<Arc<Frozen>> {
        match &*self.phase.read() {
            Phase::Locked(frozen) => Ok(Arc::clone(frozen)),
            Phase::Open(_) => Err(DiError::NotLocked),
        }
    }
}
