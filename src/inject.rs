use std::any::Any;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, error};

use crate::binder::{Binding, Bindings};
use crate::config::InjectionMode;
use crate::descriptor::TypeInfo;
use crate::error::InjectionError;

/// Qualifier value attached to an injection point
///
/// Bindings that registered a predicate for the qualifier's type are only
/// eligible if the predicate accepts the value.
pub struct Qualifier {
    info: TypeInfo,
    value: Box<dyn Any + Send + Sync>,
}

impl Qualifier {
    pub fn new<Q: Any + Send + Sync>(value: Q) -> Self {
        Self {
            info: TypeInfo::of::<Q>(),
            value: Box::new(value),
        }
    }

    pub fn info(&self) -> TypeInfo {
        self.info
    }

    pub fn value(&self) -> &(dyn Any + Send + Sync) {
        self.value.as_ref()
    }
}

impl fmt::Debug for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Qualifier").field(&self.info.name()).finish()
    }
}

/// Type-erased view on an injection slot
pub trait Slot: Send + Sync {
    /// Capability type declared by the slot
    fn capability(&self) -> TypeInfo;

    fn qualifiers(&self) -> &[Qualifier];

    /// Store a bound instance (an `Arc<C>` behind `dyn Any`) into the slot
    fn assign(&self, instance: &(dyn Any + Send + Sync)) -> Result<(), AssignError>;
}

/// Reason a slot refused an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    AlreadyAssigned,
    TypeMismatch,
}

/// Injection point holding an instance of the capability type `C`
///
/// The slot starts empty and is filled at most once, through a shared reference,
/// by the container.
///
/// ```
/// # use std::sync::Arc;
/// # use armature::*;
/// trait Clock: Send + Sync {}
///
/// struct Scheduler {
///     clock: Inject<dyn Clock>,
///     zone: Inject<String>,
/// }
///
/// injectable!(Scheduler { clock, zone });
///
/// let scheduler = Scheduler {
///     clock: Inject::new(),
///     zone: Inject::new().qualified(Named::new("zone")),
/// };
/// assert!(scheduler.clock.get().is_none());
/// ```
pub struct Inject<C: ?Sized> {
    cell: OnceCell<Arc<C>>,
    qualifiers: Vec<Qualifier>,
}

impl<C: ?Sized + Send + Sync + 'static> Inject<C> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            qualifiers: Vec::new(),
        }
    }

    /// Attach a qualifier value to this injection point
    pub fn qualified<Q: Any + Send + Sync>(mut self, qualifier: Q) -> Self {
        self.qualifiers.push(Qualifier::new(qualifier));
        self
    }

    /// The injected instance, if any
    pub fn get(&self) -> Option<&Arc<C>> {
        self.cell.get()
    }

    pub fn is_injected(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<C: ?Sized + Send + Sync + 'static> Default for Inject<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> fmt::Debug for Inject<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inject")
            .field("capability", &std::any::type_name::<C>())
            .field("injected", &self.cell.get().is_some())
            .field("qualifiers", &self.qualifiers)
            .finish()
    }
}

impl<C: ?Sized + Send + Sync + 'static> Slot for Inject<C> {
    fn capability(&self) -> TypeInfo {
        TypeInfo::of::<C>()
    }

    fn qualifiers(&self) -> &[Qualifier] {
        &self.qualifiers
    }

    fn assign(&self, instance: &(dyn Any + Send + Sync)) -> Result<(), AssignError> {
        let instance = instance
            .downcast_ref::<Arc<C>>()
            .ok_or(AssignError::TypeMismatch)?;
        self.cell
            .set(Arc::clone(instance))
            .map_err(|_| AssignError::AlreadyAssigned)
    }
}

/// Named slot of an injectable value
pub struct InjectionPoint<'a> {
    field: &'static str,
    slot: &'a dyn Slot,
}

impl<'a> InjectionPoint<'a> {
    pub fn new(field: &'static str, slot: &'a dyn Slot) -> Self {
        Self { field, slot }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn slot(&self) -> &'a dyn Slot {
        self.slot
    }
}

/// Values which expose injection points
///
/// The default implementation has none, which makes injection a no-op.
/// Use [injectable!] to derive the implementation from a list of [Inject] fields.
pub trait Injectable: Send + Sync {
    fn injection_points(&self) -> Vec<InjectionPoint<'_>> {
        Vec::new()
    }
}

/// Implement [Injectable] for a type, listing its [Inject] fields.
#[macro_export]
macro_rules! injectable {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::Injectable for $ty {
            fn injection_points(&self) -> ::std::vec::Vec<$crate::InjectionPoint<'_>> {
                ::std::vec![$($crate::InjectionPoint::new(stringify!($field), &self.$field)),+]
            }
        }
    };
    ($ty:ty) => {
        impl $crate::Injectable for $ty {}
    };
}

/// Outcome of injecting a single value
#[derive(Debug, Default)]
pub struct InjectionReport {
    pub assigned: usize,
    pub skipped: usize,
    pub errors: Vec<InjectionError>,
}

impl InjectionReport {
    /// First unsatisfied point, if the engine ran in strict mode
    pub fn into_strict_error(self) -> Option<InjectionError> {
        self.errors
            .into_iter()
            .find(|e| matches!(e, InjectionError::Unsatisfied { .. }))
    }
}

/// Resolve injection points against a snapshot of the bindings
pub struct InjectionEngine<'a> {
    bindings: &'a Bindings,
    mode: InjectionMode,
}

impl<'a> InjectionEngine<'a> {
    pub fn new(bindings: &'a Bindings, mode: InjectionMode) -> Self {
        Self { bindings, mode }
    }

    /// Pick the binding for an injection point.
    ///
    /// Candidates are the bindings assignable to the declared capability, in registration
    /// order. A candidate is dropped if it registered a predicate for one of the point's
    /// qualifier types and this predicate rejects the qualifier value. The first survivor wins.
    pub fn select(&self, point: &InjectionPoint<'_>) -> Option<&'a Binding> {
        let capability = point.slot().capability();
        let candidates: Vec<&'a Binding> = self
            .bindings
            .iter()
            .filter(|b| b.is_assignable_to(capability.id()))
            .collect();

        let eligible: Vec<&'a Binding> = candidates
            .iter()
            .copied()
            .filter(|b| {
                point
                    .slot()
                    .qualifiers()
                    .iter()
                    .all(|q| b.options().accepts(q).unwrap_or(true))
            })
            .collect();

        debug!(
            field = point.field(),
            capability = capability.name(),
            candidates = candidates.len(),
            eligible = eligible.len(),
            "resolved injection candidates"
        );
        eligible.first().copied()
    }

    /// Inject every point of `target`.
    ///
    /// Failures are logged and collected; they never stop the remaining points.
    pub fn inject(&self, owner: &str, target: &dyn Injectable) -> InjectionReport {
        let mut report = InjectionReport::default();

        for point in target.injection_points() {
            let capability = point.slot().capability();
            let Some(binding) = self.select(&point) else {
                report.skipped += 1;
                if self.mode == InjectionMode::Strict {
                    let err = InjectionError::Unsatisfied {
                        owner: owner.to_string(),
                        field: point.field(),
                        capability: capability.name(),
                    };
                    error!(error = %err, "unsatisfied injection point");
                    report.errors.push(err);
                } else {
                    debug!(owner, field = point.field(), "no binding, injection point skipped");
                }
                continue;
            };

            let Some(instance) = binding.instance_for(capability.id()) else {
                report.skipped += 1;
                continue;
            };

            match point.slot().assign(instance) {
                Ok(()) => report.assigned += 1,
                Err(kind) => {
                    let err = match kind {
                        AssignError::AlreadyAssigned => InjectionError::AlreadyAssigned {
                            owner: owner.to_string(),
                            field: point.field(),
                        },
                        AssignError::TypeMismatch => InjectionError::TypeMismatch {
                            owner: owner.to_string(),
                            field: point.field(),
                            capability: capability.name(),
                        },
                    };
                    error!(error = %err, "an exception was thrown while injecting field");
                    report.errors.push(err);
                }
            }
        }
        report
    }
}

/*
 * The following is used to call constructors with up to 10 parameters
 * inspired by https://nickbryan.co.uk/software/using-a-type-map-for-dependency-injection-in-rust/
 */

/// A Callable has a ```call``` function with a single argument and a single return type.
///
/// This trait is implemented for all functions with up to 10 arguments, using a tuple to
/// wrap them all in a single type.
pub trait Callable<Args, Ret> {
    fn call(&self, args: Args) -> Ret;
}

macro_rules! callable_tuple ({ $($param:ident)* } => {
    impl<Func, Ret, $($param,)*> Callable<($($param,)*), Ret> for Func
    where
        Func: Fn($($param),*) -> Ret,
    {
        #[inline]
        #[allow(non_snake_case)]
        fn call(&self, ($($param,)*): ($($param,)*)) -> Ret {
            (self)($($param,)*)
        }
    }
});

callable_tuple! {}
callable_tuple! { A }
callable_tuple! { A B }
callable_tuple! { A B C }
callable_tuple! { A B C D }
callable_tuple! { A B C D E }
callable_tuple! { A B C D E F }
callable_tuple! { A B C D E F G }
callable_tuple! { A B C D E F G H }
callable_tuple! { A B C D E F G H I }
callable_tuple! { A B C D E F G H I J }
