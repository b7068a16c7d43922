//! Discovery of components and marked methods
//!
//! Components and methods enter the index two ways:
//!
//! * statically, through [register_component!](crate::register_component) and
//!   [register_method!](crate::register_method), which submit entries to `linkme`
//!   distributed slices at link time;
//! * explicitly, through [TypeIndexBuilder::component] and [TypeIndexBuilder::method].
//!
//! The index is built once. Static entries are filtered by the [IndexScope], described
//! (possibly on rayon workers) and sorted by origin module path and type name; explicit
//! entries follow in registration order.

use std::any::TypeId;
use std::sync::Arc;

use linkme::distributed_slice;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::descriptor::{ComponentDescriptor, MethodDescriptor, MethodTarget, TypeInfo};
use crate::error::DiscoveryError;

/// Statically registered component
pub struct ComponentRegistration {
    pub module_path: &'static str,
    pub describe: fn() -> ComponentDescriptor,
}

/// Statically registered marked method
pub struct MethodRegistration {
    pub module_path: &'static str,
    pub describe: fn() -> MethodDescriptor,
}

#[distributed_slice]
pub static COMPONENTS: [ComponentRegistration] = [..];

#[distributed_slice]
pub static METHODS: [MethodRegistration] = [..];

/// Register a component descriptor in the static registry.
///
/// ```ignore
/// register_component!(|| ComponentDescriptor::new::<Metrics>().instance(Metrics::instance));
/// ```
#[macro_export]
macro_rules! register_component {
    ($describe:expr) => {
        const _: () = {
            #[$crate::linkme::distributed_slice($crate::COMPONENTS)]
            #[linkme(crate = $crate::linkme)]
            static REGISTRATION: $crate::ComponentRegistration = $crate::ComponentRegistration {
                module_path: module_path!(),
                describe: $describe,
            };
        };
    };
}

/// Register a marked method in the static registry.
///
/// ```ignore
/// register_method!(|| MethodDescriptor::function::<Metrics, OnReload>("flush", flush));
/// ```
#[macro_export]
macro_rules! register_method {
    ($describe:expr) => {
        const _: () = {
            #[$crate::linkme::distributed_slice($crate::METHODS)]
            #[linkme(crate = $crate::linkme)]
            static REGISTRATION: $crate::MethodRegistration = $crate::MethodRegistration {
                module_path: module_path!(),
                describe: $describe,
            };
        };
    };
}

/// Restriction of the static registry to a module subtree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexScope(Option<String>);

impl IndexScope {
    /// Every static registration linked into the binary
    pub fn everything() -> Self {
        IndexScope(None)
    }

    /// Registrations made in `package` or one of its submodules
    pub fn package(package: impl Into<String>) -> Self {
        let package = package.into();
        if package.is_empty() {
            IndexScope(None)
        } else {
            IndexScope(Some(package))
        }
    }

    /// The module declaring `Root`, as found in its type name
    pub fn package_of<Root: ?Sized + 'static>() -> Self {
        let name = TypeInfo::of::<Root>().name();
        let name = name.strip_prefix("dyn ").unwrap_or(name);
        let path = name.split('<').next().unwrap_or(name);
        match path.rsplit_once("::") {
            Some((package, _)) => Self::package(package),
            None => Self::everything(),
        }
    }

    pub fn as_package(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn contains(&self, module_path: &str) -> bool {
        match &self.0 {
            None => true,
            Some(package) => match module_path.strip_prefix(package.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with("::"),
                None => false,
            },
        }
    }
}

impl From<Option<String>> for IndexScope {
    fn from(package: Option<String>) -> Self {
        package.map(IndexScope::package).unwrap_or_default()
    }
}

/// Number of marked methods invoked, and how many of them failed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InvocationReport {
    pub invoked: usize,
    pub failed: usize,
}

/// Builder for a [TypeIndex]
pub struct TypeIndexBuilder {
    root: TypeInfo,
    scope: IndexScope,
    parallel: bool,
    static_registry: bool,
    components: Vec<ComponentDescriptor>,
    methods: Vec<MethodDescriptor>,
}

impl TypeIndexBuilder {
    pub fn scope(mut self, scope: IndexScope) -> Self {
        self.scope = scope;
        self
    }

    /// Describe static registrations on the rayon pool
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Skip the static registry, keeping explicit registrations only
    pub fn without_static_registry(mut self) -> Self {
        self.static_registry = false;
        self
    }

    pub fn component(mut self, descriptor: ComponentDescriptor) -> Self {
        self.components.push(descriptor);
        self
    }

    pub fn method(mut self, descriptor: MethodDescriptor) -> Self {
        self.methods.push(descriptor);
        self
    }

    pub fn build(self) -> TypeIndex {
        let (mut components, mut methods) = if self.static_registry {
            (
                scan(COMPONENTS.static_slice(), &self.scope, self.parallel, |r| {
                    (r.describe)().with_origin(r.module_path)
                }),
                scan(METHODS.static_slice(), &self.scope, self.parallel, |r| {
                    (r.describe)().with_origin(r.module_path)
                }),
            )
        } else {
            (Vec::new(), Vec::new())
        };
        components.sort_by(|a, b| {
            (a.origin(), a.info().name()).cmp(&(b.origin(), b.info().name()))
        });
        methods.sort_by(|a, b| {
            (a.origin(), a.declaring_type().name(), a.name()).cmp(&(
                b.origin(),
                b.declaring_type().name(),
                b.name(),
            ))
        });
        components.extend(self.components);
        methods.extend(self.methods);

        debug!(
            root = self.root.name(),
            scope = ?self.scope.as_package(),
            components = components.len(),
            methods = methods.len(),
            "type index built"
        );
        TypeIndex {
            root: self.root,
            scope: self.scope,
            components: components.into_iter().map(Arc::new).collect(),
            methods: methods.into_iter().map(Arc::new).collect(),
        }
    }
}

/// Describe the registrations of a slice which fall within the scope
fn scan<R, D>(
    registry: &[R],
    scope: &IndexScope,
    parallel: bool,
    describe: impl Fn(&R) -> D + Sync + Send,
) -> Vec<D>
where
    R: HasModulePath + Sync,
    D: Send,
{
    if parallel {
        registry
            .par_iter()
            .filter(|r| scope.contains(r.module_path()))
            .map(describe)
            .collect()
    } else {
        registry
            .iter()
            .filter(|r| scope.contains(r.module_path()))
            .map(describe)
            .collect()
    }
}

trait HasModulePath {
    fn module_path(&self) -> &'static str;
}

impl HasModulePath for ComponentRegistration {
    fn module_path(&self) -> &'static str {
        self.module_path
    }
}

impl HasModulePath for MethodRegistration {
    fn module_path(&self) -> &'static str {
        self.module_path
    }
}

/// Immutable index of the components and marked methods of a code universe
#[derive(Debug)]
pub struct TypeIndex {
    root: TypeInfo,
    scope: IndexScope,
    components: Vec<Arc<ComponentDescriptor>>,
    methods: Vec<Arc<MethodDescriptor>>,
}

impl TypeIndex {
    /// Start building an index anchored on `Root`
    pub fn builder<Root: ?Sized + 'static>() -> TypeIndexBuilder {
        TypeIndexBuilder {
            root: TypeInfo::of::<Root>(),
            scope: IndexScope::everything(),
            parallel: true,
            static_registry: true,
            components: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Index the static registry, restricted to a scope
    pub fn new<Root: ?Sized + 'static>(scope: IndexScope) -> Self {
        Self::builder::<Root>().scope(scope).build()
    }

    pub fn root(&self) -> TypeInfo {
        self.root
    }

    pub fn scope(&self) -> &IndexScope {
        &self.scope
    }

    /// Components carrying the marker `M`, in discovery order
    pub fn types_annotated_with<M: ?Sized + 'static>(&self) -> Vec<Arc<ComponentDescriptor>> {
        let marker = TypeId::of::<M>();
        self.components
            .iter()
            .filter(|c| c.is_marked_with(marker))
            .cloned()
            .collect()
    }

    /// Methods carrying the marker `M`, in discovery order
    pub fn methods_annotated_with<M: ?Sized + 'static>(&self) -> Vec<Arc<MethodDescriptor>> {
        let marker = TypeId::of::<M>();
        self.methods
            .iter()
            .filter(|m| m.marker().id() == marker)
            .cloned()
            .collect()
    }

    /// Components declaring that they implement `C`
    pub fn subtypes_of<C: ?Sized + 'static>(&self) -> Vec<Arc<ComponentDescriptor>> {
        let capability = TypeId::of::<C>();
        self.components
            .iter()
            .filter(|c| c.is_subtype_of(capability))
            .cloned()
            .collect()
    }

    /// Invoke every method carrying the marker `M`.
    ///
    /// Free functions are called directly, methods on the shared instance of their declaring
    /// type. A failure is logged and does not prevent the remaining invocations.
    pub fn invoke_methods_annotated_with<M: ?Sized + 'static>(&self) -> InvocationReport {
        let marker = TypeInfo::of::<M>();
        let mut report = InvocationReport::default();

        for method in self.methods_annotated_with::<M>() {
            report.invoked += 1;
            let declaring = method.declaring_type();
            let result = match method.target() {
                MethodTarget::Static(function) => {
                    crate::descriptor::guarded(declaring.simple_name(), method.name(), function)
                        .map_err(|e| e.to_string())
                }
                MethodTarget::Instance { resolve, hook } => match resolve {
                    None => Err(DiscoveryError::NoSharedInstance {
                        type_name: declaring.name(),
                    }
                    .to_string()),
                    Some(resolve) => {
                        let target = std::panic::catch_unwind(std::panic::AssertUnwindSafe(
                            || resolve(),
                        ))
                        .map_err(|payload| {
                            DiscoveryError::ProviderPanicked {
                                type_name: declaring.name(),
                                message: crate::error::panic_message(payload.as_ref()),
                            }
                            .to_string()
                        });
                        target.and_then(|target| {
                            hook.invoke(declaring.simple_name(), target.as_ref())
                                .map_err(|e| e.to_string())
                        })
                    }
                },
            };

            if let Err(error) = result {
                report.failed += 1;
                warn!(
                    declaring_type = declaring.name(),
                    marker = marker.simple_name(),
                    method = method.name(),
                    %error,
                    "Failed to run container part {} on {} : {}",
                    declaring.simple_name(),
                    marker.simple_name(),
                    method.name()
                );
            }
        }
        report
    }
}
