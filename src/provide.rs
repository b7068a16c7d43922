//! Providers for process-wide shared instances
//!
//! A component is never constructed by the container: its descriptor carries a provider
//! that hands out the one shared instance of the component type. The container calls it
//! once during startup, injects the returned instance and keeps it in the service table.
//!
//! * [SingletonProvider] clones a value it owns (usually an `Arc`).
//! * [FactoryProvider] calls a function, typically one declared with [shared_instance!]
//!   which lazily builds the instance on first use.

use std::sync::Arc;

/// Provide an instance of a given type
///
/// This trait allows to use a uniform API for both
/// shared components (the provider holds the singleton)
/// and lazily created ones (the provider is a function).
pub trait Provide<T>: Send + Sync {
    fn provide(&self) -> T;
}

/// Shared trait object implementing [Provide]
pub type Provider<T> = Arc<dyn Provide<T>>;

/// Generic clone-based provider
pub struct SingletonProvider<T>(T);

impl<T> SingletonProvider<T> {
    pub fn build(data: T) -> Arc<Self> {
        Arc::new(SingletonProvider(data))
    }
}

impl<T: Clone + Send + Sync> Provide<T> for SingletonProvider<T> {
    fn provide(&self) -> T {
        self.0.clone()
    }
}

/// Function-based provider
pub struct FactoryProvider<T>(fn() -> T);

impl<T> FactoryProvider<T> {
    pub fn build(factory: fn() -> T) -> Arc<Self> {
        Arc::new(FactoryProvider(factory))
    }
}

impl<T> Provide<T> for FactoryProvider<T> {
    fn provide(&self) -> T {
        (self.0)()
    }
}

/// Declare an accessor for the process-wide shared instance of a type.
///
/// The instance is built by `$init` on first access and every call returns the same `Arc`.
///
/// ```
/// # use armature::shared_instance;
/// # use std::sync::Arc;
/// #[derive(Default)]
/// struct Registry;
///
/// impl Registry {
///     shared_instance!(pub fn instance() -> Registry = Registry::default());
/// }
///
/// assert!(Arc::ptr_eq(&Registry::instance(), &Registry::instance()));
/// ```
#[macro_export]
macro_rules! shared_instance {
    ($vis:vis fn $name:ident() -> $ty:ty = $init:expr) => {
        $vis fn $name() -> ::std::sync::Arc<$ty> {
            static INSTANCE: $crate::once_cell::sync::Lazy<::std::sync::Arc<$ty>> =
                $crate::once_cell::sync::Lazy::new(|| ::std::sync::Arc::new($init));
            ::std::sync::Arc::clone(&INSTANCE)
        }
    };
}
