//! Binding declarations
//!
//! A [Binding] associates a capability type with a shared instance. Bindings are declared
//! either one capability at a time with a [Binder], or one instance at a time with a
//! [MultiBinder] which fans the instance out to several capability types. Both collect into
//! an ordered [Bindings] list; the order of that list is the resolution order.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::descriptor::TypeInfo;
use crate::inject::Qualifier;

/// Scope tag carried by a binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InjectScope {
    /// The bound instance is the process-wide shared instance of its type
    Singleton,
    #[default]
    Unscoped,
}

type QualifierCheck = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> bool + Send + Sync>;

/// Scope and qualifier predicates of a binding
#[derive(Clone, Default)]
pub struct BindingOptions {
    scope: InjectScope,
    checks: HashMap<TypeId, QualifierCheck>,
}

impl BindingOptions {
    pub fn scoped(&mut self, scope: InjectScope) -> &mut Self {
        self.scope = scope;
        self
    }

    /// Only satisfy injection points whose qualifier of type `Q` passes the predicate.
    ///
    /// Registering a second predicate for the same qualifier type replaces the first one.
    pub fn annotated<Q: Any + Send + Sync>(
        &mut self,
        predicate: impl Fn(&Q) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        let check: QualifierCheck =
            Arc::new(move |value: &(dyn Any + Send + Sync)| {
                value.downcast_ref::<Q>().map_or(false, &predicate)
            });
        self.checks.insert(TypeId::of::<Q>(), check);
        self
    }

    pub fn scope(&self) -> InjectScope {
        self.scope
    }

    pub fn has_check_for(&self, qualifier: TypeId) -> bool {
        self.checks.contains_key(&qualifier)
    }

    /// Outcome of the predicate registered for this qualifier's type, if any
    pub fn accepts(&self, qualifier: &Qualifier) -> Option<bool> {
        self.checks
            .get(&qualifier.info().id())
            .map(|check| check(qualifier.value()))
    }
}

impl fmt::Debug for BindingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingOptions")
            .field("scope", &self.scope)
            .field("checks", &self.checks.len())
            .finish()
    }
}

/// Instance of a binding seen as one capability type (an `Arc<C>` behind `dyn Any`)
#[derive(Clone)]
struct View {
    capability: TypeInfo,
    instance: Arc<dyn Any + Send + Sync>,
}

impl View {
    fn new<C: ?Sized + Send + Sync + 'static>(instance: Arc<C>) -> Self {
        Self {
            capability: TypeInfo::of::<C>(),
            instance: Arc::new(instance),
        }
    }
}

/// Association of a capability type with a shared instance
#[derive(Clone)]
pub struct Binding {
    views: Vec<View>,
    options: BindingOptions,
}

impl Binding {
    fn new(primary: View, supertypes: Vec<View>, options: BindingOptions) -> Self {
        let mut views = Vec::with_capacity(supertypes.len() + 1);
        views.push(primary);
        views.extend(supertypes);
        Self { views, options }
    }

    /// Capability type the binding was declared for
    pub fn capability(&self) -> TypeInfo {
        self.views[0].capability
    }

    pub fn options(&self) -> &BindingOptions {
        &self.options
    }

    pub fn scope(&self) -> InjectScope {
        self.options.scope
    }

    /// Whether the binding can fill an injection point declared with this capability
    pub fn is_assignable_to(&self, capability: TypeId) -> bool {
        self.views.iter().any(|v| v.capability.id() == capability)
    }

    /// Bound instance as an `Arc<C>` behind `dyn Any`, for the given capability
    pub fn instance_for(&self, capability: TypeId) -> Option<&(dyn Any + Send + Sync)> {
        self.views
            .iter()
            .find(|v| v.capability.id() == capability)
            .map(|v| v.instance.as_ref())
    }

    /// Bound instance, typed
    pub fn instance<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.instance_for(TypeId::of::<C>())
            .and_then(|i| i.downcast_ref::<Arc<C>>())
            .cloned()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("capability", &self.capability())
            .field(
                "assignable_to",
                &self.views[1..].iter().map(|v| v.capability).collect::<Vec<_>>(),
            )
            .field("options", &self.options)
            .finish()
    }
}

/// Ordered, append-only list of bindings
#[derive(Clone, Default, Debug)]
pub struct Bindings(Vec<Binding>);

impl Bindings {
    /// Start declaring a binding for the capability type `C`
    pub fn declare<C: ?Sized + Send + Sync + 'static>(&mut self) -> Binder<'_, C> {
        Binder {
            bindings: self,
            options: BindingOptions::default(),
            supertypes: Vec::new(),
            _capability: PhantomData,
        }
    }

    /// Start binding one instance to several capability types
    pub fn bind<T: Send + Sync + 'static>(&mut self, instance: Arc<T>) -> MultiBinder<'_, T> {
        MultiBinder {
            bindings: self,
            instance,
            targets: Vec::new(),
            populator: None,
        }
    }

    pub fn push(&mut self, binding: Binding) {
        self.0.push(binding);
    }

    /// Append all bindings of another list, keeping their order
    pub fn append(&mut self, other: Bindings) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Bindings {
    type Item = &'a Binding;
    type IntoIter = std::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Declaration of a binding for the capability type `C`
///
/// Nothing is recorded until [Binder::to] provides the instance.
#[must_use = "a binder records nothing until `to` is called"]
pub struct Binder<'a, C: ?Sized + 'static> {
    bindings: &'a mut Bindings,
    options: BindingOptions,
    supertypes: Vec<Box<dyn FnOnce(&Arc<C>) -> View>>,
    _capability: PhantomData<fn() -> Box<C>>,
}

impl<'a, C: ?Sized + Send + Sync + 'static> Binder<'a, C> {
    pub fn scoped(mut self, scope: InjectScope) -> Self {
        self.options.scoped(scope);
        self
    }

    /// See [BindingOptions::annotated]
    pub fn annotated<Q: Any + Send + Sync>(
        mut self,
        predicate: impl Fn(&Q) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.options.annotated(predicate);
        self
    }

    /// Also satisfy injection points declared with the supertype `S`.
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use armature::*;
    /// trait Sink: Send + Sync {}
    /// struct FileJournal;
    /// impl Sink for FileJournal {}
    ///
    /// let mut bindings = Bindings::default();
    /// bindings
    ///     .declare::<FileJournal>()
    ///     .assignable_to(|j| j as Arc<dyn Sink>)
    ///     .to(Arc::new(FileJournal));
    ///
    /// let binding = bindings.iter().next().unwrap();
    /// assert!(binding.instance::<dyn Sink>().is_some());
    /// ```
    pub fn assignable_to<S: ?Sized + Send + Sync + 'static>(
        mut self,
        upcast: impl FnOnce(Arc<C>) -> Arc<S> + 'static,
    ) -> Self {
        self.supertypes
            .push(Box::new(move |instance: &Arc<C>| {
                View::new(upcast(Arc::clone(instance)))
            }));
        self
    }

    /// Record the binding with its instance
    pub fn to(self, instance: Arc<C>) {
        let supertypes = self
            .supertypes
            .into_iter()
            .map(|upcast| upcast(&instance))
            .collect();
        let binding = Binding::new(View::new(instance), supertypes, self.options);
        self.bindings.push(binding);
    }
}

type Target<T> = Box<dyn Fn(&Arc<T>) -> View>;

/// Fan-out of one instance to several capability types
#[must_use = "a multi-binder records nothing until `bind` is called"]
pub struct MultiBinder<'a, T> {
    bindings: &'a mut Bindings,
    instance: Arc<T>,
    targets: Vec<Target<T>>,
    populator: Option<Box<dyn Fn(&mut BindingOptions)>>,
}

impl<'a, T: Send + Sync + 'static> MultiBinder<'a, T> {
    /// Add a capability type, given as the coercion of the instance to it.
    ///
    /// Use `|it| it` for the instance's own type and `|it| it as Arc<dyn Trait>` for a trait.
    pub fn to<C: ?Sized + Send + Sync + 'static>(mut self, upcast: fn(Arc<T>) -> Arc<C>) -> Self {
        self.targets
            .push(Box::new(move |instance: &Arc<T>| {
                View::new(upcast(Arc::clone(instance)))
            }));
        self
    }

    /// Customise the options of every resulting binding
    pub fn populate(mut self, populator: impl Fn(&mut BindingOptions) + 'static) -> Self {
        self.populator = Some(Box::new(populator));
        self
    }

    /// Record one binding per capability type
    pub fn bind(self) {
        for target in &self.targets {
            let mut options = BindingOptions::default();
            if let Some(populate) = &self.populator {
                populate(&mut options);
            }
            let binding = Binding::new(target(&self.instance), Vec::new(), options);
            self.bindings.push(binding);
        }
    }
}

/// Batch of binding declarations, imported with [Armature::inherit](crate::Armature::inherit)
pub trait BinderContainer {
    fn populate(&self, bindings: &mut Bindings);
}

impl<F: Fn(&mut Bindings)> BinderContainer for F {
    fn populate(&self, bindings: &mut Bindings) {
        self(bindings)
    }
}
