//! Typed descriptors of components and marked methods
//!
//! Descriptors replace annotation metadata: everything the container needs to know about a
//! component (name, priority, markers, how to reach its shared instance, lifecycle hooks) is
//! declared once, when the descriptor is built.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{panic_message, BoxError, DiscoveryError, HookError};
use crate::inject::Injectable;
use crate::markers::{IgnoreAutoScan, Service};
use crate::provide::{FactoryProvider, Provider};

/// Runtime identity of a type
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, without generic arguments
    pub fn simple_name(&self) -> &'static str {
        simple_type_name(self.name)
    }
}

/// Last path segment of a type name, without generic arguments
pub(crate) fn simple_type_name(name: &'static str) -> &'static str {
    let name = name.strip_prefix("dyn ").unwrap_or(name);
    let name = name.split('<').next().unwrap_or(name);
    name.rsplit("::").next().unwrap_or(name)
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Shared instance of a component, seen both as a value and as an injection target
#[derive(Clone)]
pub struct SharedInstance {
    value: Arc<dyn Any + Send + Sync>,
    target: Arc<dyn Injectable>,
}

impl SharedInstance {
    pub fn new<T: Injectable + 'static>(instance: Arc<T>) -> Self {
        Self {
            value: instance.clone(),
            target: instance,
        }
    }

    pub fn value(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.value
    }

    pub fn target(&self) -> &dyn Injectable {
        self.target.as_ref()
    }
}

type InstanceFn = Arc<dyn Fn() -> SharedInstance + Send + Sync>;
type HookFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<(), BoxError> + Send + Sync>;

/// Zero-argument callback invoked on a component's shared instance
#[derive(Clone)]
pub struct Hook {
    kind: &'static str,
    expected: &'static str,
    call: HookFn,
}

impl Hook {
    fn new<T: Any + Send + Sync>(
        kind: &'static str,
        hook: impl Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        let call: HookFn = Arc::new(move |target: &(dyn Any + Send + Sync)| {
            match target.downcast_ref::<T>() {
                Some(target) => hook(target),
                None => Err(HookError::TargetMismatch {
                    hook: kind,
                    expected: type_name::<T>(),
                }
                .into()),
            }
        });
        Self {
            kind,
            expected: type_name::<T>(),
            call,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Invoke the hook on a target, turning panics into errors
    pub fn invoke(&self, name: &str, target: &(dyn Any + Send + Sync)) -> Result<(), HookError> {
        guarded(name, self.kind, || (self.call)(target))
    }

    /// Type the hook expects as receiver
    pub fn receiver(&self) -> &'static str {
        self.expected
    }
}

/// Run a fallible callback, converting a returned error or a panic into a [HookError]
pub(crate) fn guarded(
    name: &str,
    hook: &'static str,
    f: impl FnOnce() -> Result<(), BoxError>,
) -> Result<(), HookError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(HookError::Failed {
            name: name.to_string(),
            hook,
            source,
        }),
        Err(payload) => Err(HookError::Panicked {
            name: name.to_string(),
            hook,
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Description of a component taking part in the container lifecycle
///
/// ```
/// # use std::sync::Arc;
/// # use armature::*;
/// #[derive(Default)]
/// struct Metrics;
/// injectable!(Metrics);
///
/// impl Metrics {
///     shared_instance!(fn instance() -> Metrics = Metrics::default());
///
///     fn configure(&self) -> Result<(), BoxError> {
///         Ok(())
///     }
/// }
///
/// let descriptor = ComponentDescriptor::new::<Metrics>()
///     .name("metrics")
///     .priority(10)
///     .instance(Metrics::instance)
///     .on_configure(Metrics::configure);
/// assert_eq!(descriptor.display_name(), "metrics");
/// ```
#[derive(Clone)]
pub struct ComponentDescriptor {
    info: TypeInfo,
    origin: &'static str,
    name: Option<String>,
    priority: i32,
    ignore: bool,
    markers: Vec<TypeInfo>,
    implements: Vec<TypeInfo>,
    instance: Option<InstanceFn>,
    configure: Option<Hook>,
    close: Option<Hook>,
}

impl ComponentDescriptor {
    pub const DEFAULT_PRIORITY: i32 = 1;

    pub fn new<T: Injectable + 'static>() -> Self {
        Self {
            info: TypeInfo::of::<T>(),
            origin: "",
            name: None,
            priority: Self::DEFAULT_PRIORITY,
            ignore: false,
            markers: Vec::new(),
            implements: Vec::new(),
            instance: None,
            configure: None,
            close: None,
        }
    }

    /// Display name used in logs; defaults to the type name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.is_empty() { None } else { Some(name) };
        self
    }

    /// Higher priorities start first
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Exclude the component from automatic startup
    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Tag the component with an extra marker
    pub fn marked<M: ?Sized + 'static>(mut self) -> Self {
        self.markers.push(TypeInfo::of::<M>());
        self
    }

    /// Declare a capability type implemented by the component
    pub fn implements<C: ?Sized + 'static>(mut self) -> Self {
        self.implements.push(TypeInfo::of::<C>());
        self
    }

    /// Provide the shared instance through a function
    pub fn instance<T: Injectable + 'static>(self, factory: fn() -> Arc<T>) -> Self {
        self.provided_by(FactoryProvider::build(factory))
    }

    /// Provide the shared instance through any [Provide](crate::Provide) implementation
    pub fn provided_by<T: Injectable + 'static>(mut self, provider: Provider<Arc<T>>) -> Self {
        debug_assert_eq!(self.info.id(), TypeId::of::<T>());
        self.instance = Some(Arc::new(move || SharedInstance::new(provider.provide())));
        self
    }

    /// Hook invoked on the shared instance during startup
    pub fn on_configure<T: Any + Send + Sync>(
        mut self,
        hook: impl Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.configure = Some(Hook::new("configure", hook));
        self
    }

    /// Hook invoked on the shared instance during shutdown
    pub fn on_close<T: Any + Send + Sync>(
        mut self,
        hook: impl Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.close = Some(Hook::new("close", hook));
        self
    }

    pub(crate) fn with_origin(mut self, origin: &'static str) -> Self {
        self.origin = origin;
        self
    }

    pub fn info(&self) -> TypeInfo {
        self.info
    }

    /// Module path the component was registered from (empty for explicit registrations)
    pub fn origin(&self) -> &'static str {
        self.origin
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.info.simple_name())
    }

    pub fn get_priority(&self) -> i32 {
        self.priority
    }

    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    pub fn is_marked_with(&self, marker: TypeId) -> bool {
        marker == TypeId::of::<Service>()
            || (self.ignore && marker == TypeId::of::<IgnoreAutoScan>())
            || self.markers.iter().any(|m| m.id() == marker)
    }

    pub fn is_subtype_of(&self, capability: TypeId) -> bool {
        self.implements.iter().any(|c| c.id() == capability)
    }

    pub fn configure_hook(&self) -> Option<&Hook> {
        self.configure.as_ref()
    }

    pub fn close_hook(&self) -> Option<&Hook> {
        self.close.as_ref()
    }

    /// Obtain the component's shared instance from its provider
    pub fn resolve_instance(&self) -> Result<SharedInstance, DiscoveryError> {
        let provider = self
            .instance
            .as_ref()
            .ok_or(DiscoveryError::NoSharedInstance {
                type_name: self.info.name(),
            })?;
        catch_unwind(AssertUnwindSafe(|| provider())).map_err(|payload| {
            DiscoveryError::ProviderPanicked {
                type_name: self.info.name(),
                message: panic_message(payload.as_ref()),
            }
        })
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("type", &self.info)
            .field("name", &self.display_name())
            .field("priority", &self.priority)
            .field("ignore", &self.ignore)
            .finish_non_exhaustive()
    }
}

/// Target of a marked method
#[derive(Clone)]
pub enum MethodTarget {
    /// Free function, invoked without a receiver
    Static(fn() -> Result<(), BoxError>),
    /// Method invoked on the declaring type's shared instance
    Instance {
        resolve: Option<Arc<dyn Fn() -> Arc<dyn Any + Send + Sync> + Send + Sync>>,
        hook: Hook,
    },
}

/// Description of a method tagged with a marker
#[derive(Clone)]
pub struct MethodDescriptor {
    declaring: TypeInfo,
    name: &'static str,
    marker: TypeInfo,
    origin: &'static str,
    target: MethodTarget,
}

impl MethodDescriptor {
    /// A free function declared by `D`, tagged with the marker `M`
    pub fn function<D: ?Sized + 'static, M: ?Sized + 'static>(
        name: &'static str,
        function: fn() -> Result<(), BoxError>,
    ) -> Self {
        Self {
            declaring: TypeInfo::of::<D>(),
            name,
            marker: TypeInfo::of::<M>(),
            origin: "",
            target: MethodTarget::Static(function),
        }
    }

    /// A method of `T` invoked on the shared instance returned by `instance`
    pub fn method<T: Any + Send + Sync, M: ?Sized + 'static>(
        name: &'static str,
        instance: fn() -> Arc<T>,
        method: impl Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        let resolve: Arc<dyn Fn() -> Arc<dyn Any + Send + Sync> + Send + Sync> =
            Arc::new(move || instance() as Arc<dyn Any + Send + Sync>);
        Self {
            declaring: TypeInfo::of::<T>(),
            name,
            marker: TypeInfo::of::<M>(),
            origin: "",
            target: MethodTarget::Instance {
                resolve: Some(resolve),
                hook: Hook::new(name, method),
            },
        }
    }

    /// A method of `T` whose declaring type has no reachable shared instance
    pub fn detached<T: Any + Send + Sync, M: ?Sized + 'static>(
        name: &'static str,
        method: impl Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            declaring: TypeInfo::of::<T>(),
            name,
            marker: TypeInfo::of::<M>(),
            origin: "",
            target: MethodTarget::Instance {
                resolve: None,
                hook: Hook::new(name, method),
            },
        }
    }

    pub(crate) fn with_origin(mut self, origin: &'static str) -> Self {
        self.origin = origin;
        self
    }

    pub fn declaring_type(&self) -> TypeInfo {
        self.declaring
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn marker(&self) -> TypeInfo {
        self.marker
    }

    pub fn origin(&self) -> &'static str {
        self.origin
    }

    pub fn target(&self) -> &MethodTarget {
        &self.target
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{} [{}]",
            self.declaring.simple_name(),
            self.name,
            self.marker.simple_name()
        )
    }
}
