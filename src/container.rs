use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use crate::binder::{Binder, BinderContainer, Bindings};
use crate::config::{ContainerOptions, InjectionMode};
use crate::descriptor::simple_type_name;
use crate::error::{InjectionError, LifecycleError, LookupError};
use crate::index::TypeIndex;
use crate::inject::{Callable, Injectable, InjectionEngine};
use crate::lifecycle::{LifecycleManager, LifecycleReport, ServiceTable};

/// Lifecycle state of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unstarted,
    Started,
    Closed,
}

/// Dependency injection and lifecycle container.
///
/// Owns the bindings, the component index and the table of started components.
/// Bindings and startup need exclusive access; once started, the container can be shared
/// (e.g. in an `Arc`) and queried from any thread.
pub struct Armature {
    options: ContainerOptions,
    index: TypeIndex,
    bindings: Bindings,
    services: ServiceTable,
    state: State,
}

impl Armature {
    /// Create a container indexing the static registry, anchored on `Root` and restricted
    /// to the package configured in the options.
    pub fn new<Root: ?Sized + 'static>(options: ContainerOptions) -> Self {
        let index = TypeIndex::builder::<Root>()
            .scope(options.scope())
            .parallel(options.parallel_scan)
            .build();
        Self::with_index(index, options)
    }

    /// Create a container over an index built by the caller
    pub fn with_index(index: TypeIndex, options: ContainerOptions) -> Self {
        Self {
            options,
            index,
            bindings: Bindings::default(),
            services: ServiceTable::default(),
            state: State::Unstarted,
        }
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    pub fn index(&self) -> &TypeIndex {
        &self.index
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Start declaring a binding for the capability type `C`
    pub fn bind<C: ?Sized + Send + Sync + 'static>(&mut self) -> Binder<'_, C> {
        self.bindings.declare::<C>()
    }

    /// Import the bindings declared by a binder container
    pub fn inherit(&mut self, container: &impl BinderContainer) -> &mut Self {
        let mut inherited = Bindings::default();
        container.populate(&mut inherited);
        debug!(bindings = inherited.len(), "inherited binder container");
        self.bindings.append(inherited);
        self
    }

    /// Construct a value by calling `constructor` with `args`, then inject it
    pub fn injected<Args, T, F>(&self, constructor: F, args: Args) -> Result<T, InjectionError>
    where
        F: Callable<Args, T>,
        T: Injectable,
    {
        let instance = constructor.call(args);
        self.inject(&instance)?;
        Ok(instance)
    }

    /// Fill the injection points of an existing value.
    ///
    /// Only fails in strict mode, when a point has no matching binding; every point is
    /// processed in any case.
    pub fn inject<T: Injectable>(&self, target: &T) -> Result<(), InjectionError> {
        let owner = simple_type_name(std::any::type_name::<T>());
        let report =
            InjectionEngine::new(&self.bindings, self.options.injection).inject(owner, target);
        match self.options.injection {
            InjectionMode::Strict => match report.into_strict_error() {
                Some(err) => Err(err),
                None => Ok(()),
            },
            InjectionMode::Lenient => Ok(()),
        }
    }

    /// Shared instance of a started component
    pub fn service<T: Any + Send + Sync>(&self) -> Result<Arc<T>, LookupError> {
        self.services.lookup::<T>()
    }

    /// Start every indexed component, highest priority first
    pub fn startup(&mut self) -> Result<LifecycleReport, LifecycleError> {
        self.transition(State::Unstarted, State::Started)?;
        let manager = LifecycleManager::new(&self.index, &self.bindings, self.options.injection);
        Ok(manager.startup(&mut self.services))
    }

    /// Invoke the Close hook of every started component
    pub fn close(&mut self) -> Result<LifecycleReport, LifecycleError> {
        self.transition(State::Started, State::Closed)?;
        let manager = LifecycleManager::new(&self.index, &self.bindings, self.options.injection);
        Ok(manager.close(&self.services))
    }

    fn transition(&mut self, from: State, to: State) -> Result<(), LifecycleError> {
        if self.state != from {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}
