use std::any::{Any, TypeId};
use std::collections::hash_map::{Entry, HashMap};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::binder::Bindings;
use crate::config::InjectionMode;
use crate::descriptor::{ComponentDescriptor, Hook, SharedInstance};
use crate::error::{HookError, LookupError};
use crate::index::TypeIndex;
use crate::inject::InjectionEngine;
use crate::logging::SERVICES_TARGET;
use crate::markers::Service;

/// Live component kept by the container
#[derive(Clone)]
pub struct RegisteredService {
    descriptor: Arc<ComponentDescriptor>,
    instance: SharedInstance,
}

impl RegisteredService {
    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    pub fn instance(&self) -> &Arc<dyn Any + Send + Sync> {
        self.instance.value()
    }
}

enum ServiceTableContent<T> {
    None,
    Mismatch,
    Ready(Arc<T>),
}

/// Store the shared instance of every started component, keyed by its type
///
/// Entries are inserted once, during startup, and never removed.
#[derive(Default)]
pub struct ServiceTable(HashMap<TypeId, RegisteredService>);

impl ServiceTable {
    fn get<T: Any + Send + Sync>(&self) -> ServiceTableContent<T> {
        match self.0.get(&TypeId::of::<T>()) {
            None => ServiceTableContent::None,
            Some(service) => match Arc::clone(service.instance.value()).downcast::<T>() {
                Err(_) => ServiceTableContent::Mismatch,
                Ok(instance) => ServiceTableContent::Ready(instance),
            },
        }
    }

    /// Shared instance of a registered component
    pub fn lookup<T: Any + Send + Sync>(&self) -> Result<Arc<T>, LookupError> {
        match self.get::<T>() {
            ServiceTableContent::Ready(instance) => Ok(instance),
            ServiceTableContent::Mismatch => Err(LookupError::TypeMismatch {
                type_name: std::any::type_name::<T>(),
            }),
            ServiceTableContent::None => Err(LookupError::NotRegistered {
                type_name: std::any::type_name::<T>(),
            }),
        }
    }

    /// Fill a free spot; an occupied spot keeps its first instance
    fn set_if_vacant(&mut self, service: RegisteredService) -> bool {
        match self.0.entry(service.descriptor.info().id()) {
            Entry::Vacant(v) => {
                v.insert(service);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.0.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Registered services, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredService> {
        self.0.values()
    }
}

/// Display names of the components which completed or failed a lifecycle pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LifecycleReport {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
}

/// Drive the startup and shutdown passes over the indexed components
pub struct LifecycleManager<'a> {
    index: &'a TypeIndex,
    bindings: &'a Bindings,
    mode: InjectionMode,
}

impl<'a> LifecycleManager<'a> {
    pub fn new(index: &'a TypeIndex, bindings: &'a Bindings, mode: InjectionMode) -> Self {
        Self {
            index,
            bindings,
            mode,
        }
    }

    /// Components taking part in startup, highest priority first.
    ///
    /// The sort is stable: equal priorities keep discovery order.
    pub fn startup_order(&self) -> Vec<Arc<ComponentDescriptor>> {
        let mut components: Vec<_> = self
            .index
            .types_annotated_with::<Service>()
            .into_iter()
            .filter(|c| !c.is_ignored())
            .collect();
        components.sort_by(|a, b| b.get_priority().cmp(&a.get_priority()));
        components
    }

    /// Resolve, inject, register and configure every component
    pub fn startup(&self, table: &mut ServiceTable) -> LifecycleReport {
        let engine = InjectionEngine::new(self.bindings, self.mode);
        let mut report = LifecycleReport::default();

        for descriptor in self.startup_order() {
            let name = descriptor.display_name().to_string();
            if self.load(&engine, &descriptor, table) {
                report.completed.push(name);
            } else {
                report.failed.push(name);
            }
        }
        report
    }

    fn load(
        &self,
        engine: &InjectionEngine<'_>,
        descriptor: &Arc<ComponentDescriptor>,
        table: &mut ServiceTable,
    ) -> bool {
        let name = descriptor.display_name();

        let instance = match descriptor.resolve_instance() {
            Ok(instance) => instance,
            Err(err) => {
                warn!(service = name, error = %err, "An exception was thrown during injection");
                info!(target: SERVICES_TARGET, "[Services] [{}] Failed to load!", name);
                return false;
            }
        };

        let injection = engine.inject(name, instance.target());
        if self.mode == InjectionMode::Strict {
            if let Some(err) = injection.into_strict_error() {
                warn!(service = name, error = %err, "An exception was thrown during injection");
                info!(target: SERVICES_TARGET, "[Services] [{}] Failed to load!", name);
                return false;
            }
        }

        let registered = RegisteredService {
            descriptor: Arc::clone(descriptor),
            instance: instance.clone(),
        };
        if !table.set_if_vacant(registered) {
            warn!(service = name, "service already registered, keeping the first instance");
        }

        match tracked(name, descriptor.configure_hook(), &instance) {
            Ok(millis) => {
                info!(target: SERVICES_TARGET, elapsed_ms = millis, "[Services] [{}] Loaded in {}ms.", name, millis);
                true
            }
            Err(err) => {
                error!(error = ?err, "An exception was thrown while configuring service - {}", name);
                info!(target: SERVICES_TARGET, "[Services] [{}] Failed to load!", name);
                false
            }
        }
    }

    /// Invoke the Close hook of every registered component
    ///
    /// The table is walked in its natural order, not in reverse startup order.
    pub fn close(&self, table: &ServiceTable) -> LifecycleReport {
        let mut report = LifecycleReport::default();

        for service in table.iter() {
            let name = service.descriptor.display_name();
            match tracked(name, service.descriptor.close_hook(), &service.instance) {
                Ok(millis) => {
                    info!(target: SERVICES_TARGET, elapsed_ms = millis, "[Services] [{}] Shutdown in {}ms.", name, millis);
                    report.completed.push(name.to_string());
                }
                Err(err) => {
                    error!(error = ?err, "An exception was thrown while closing service - {}", name);
                    info!(target: SERVICES_TARGET, "[Services] [{}] Failed to shutdown!", name);
                    report.failed.push(name.to_string());
                }
            }
        }
        report
    }
}

/// Invoke an optional hook while measuring the wall-clock time it took, in milliseconds
fn tracked(name: &str, hook: Option<&Hook>, instance: &SharedInstance) -> Result<u64, HookError> {
    let start = Instant::now();
    if let Some(hook) = hook {
        hook.invoke(name, instance.value().as_ref())?;
    }
    Ok(u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX))
}
