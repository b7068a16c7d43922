//! Dependency injection and lifecycle container for modular host applications.
//!
//! # Simple use case
//!
//! ```
//! # use std::sync::Arc;
//! # use armature::*;
//! // Define a capability and an implementor
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "Hello world".to_string()
//!     }
//! }
//!
//! // Define a component with an injection point
//! #[derive(Default)]
//! struct Banner {
//!     greeter: Inject<dyn Greeter>,
//! }
//! injectable!(Banner { greeter });
//!
//! # fn main() -> Result<(), InjectionError> {
//! let index = TypeIndex::builder::<Banner>().without_static_registry().build();
//! let mut container = Armature::with_index(index, ContainerOptions::default());
//! container.bind::<dyn Greeter>().to(Arc::new(English));
//!
//! let banner = container.injected(Banner::default, ())?;
//! assert_eq!(banner.greeter.get().unwrap().greet(), "Hello world");
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! Runtime reflection is replaced by explicit, typed declarations:
//!
//! * A [Binding] associates a capability type (usually a trait object type) with a shared
//!   instance, stored as an `Arc<C>` behind `dyn Any`. Bindings may carry qualifier
//!   predicates, keyed by the type of the qualifier they inspect.
//! * An [Inject] field is an injection point: a write-once slot declaring a capability type
//!   and optional qualifier values. The [Injectable] trait (usually derived with
//!   [injectable!]) lists the injection points of a value.
//! * A [ComponentDescriptor] describes a component: name, priority, markers, the provider of
//!   its process-wide shared instance and its Configure/Close hooks. Descriptors are
//!   registered statically with [register_component!] or explicitly on a [TypeIndexBuilder].
//!
//! The [Armature] container resolves each injection point to the first binding assignable to
//! its capability whose predicates accept the point's qualifiers. On startup it injects and
//! configures every component, highest priority first, and on close it invokes their Close
//! hooks. Failures are logged with `tracing` and contained to the component that caused them.

mod binder;
mod config;
mod container;
mod descriptor;
mod error;
mod extension;
mod index;
mod inject;
mod lifecycle;
pub mod logging;
pub mod markers;
mod provide;

pub use binder::{
    Binder, BinderContainer, Binding, BindingOptions, Bindings, InjectScope, MultiBinder,
};
pub use config::{ConfigLoader, ContainerOptions, InjectionMode, LoggingOptions, ENV_PREFIX};
pub use container::{Armature, State};
pub use descriptor::{
    ComponentDescriptor, Hook, MethodDescriptor, MethodTarget, SharedInstance, TypeInfo,
};
pub use error::{
    BoxError, ConfigError, DiscoveryError, HookError, InjectionError, LifecycleError,
    LookupError,
};
pub use extension::{CoreBinder, Extension};
pub use index::{
    ComponentRegistration, IndexScope, InvocationReport, MethodRegistration, TypeIndex,
    TypeIndexBuilder, COMPONENTS, METHODS,
};
pub use inject::{
    AssignError, Callable, Inject, Injectable, InjectionEngine, InjectionPoint, InjectionReport,
    Qualifier, Slot,
};
pub use lifecycle::{LifecycleManager, LifecycleReport, RegisteredService, ServiceTable};
pub use markers::Named;
pub use provide::{FactoryProvider, Provide, Provider, SingletonProvider};

#[doc(hidden)]
pub use linkme;
#[doc(hidden)]
pub use once_cell;

#[cfg(test)]
mod tests;
