//! Built-in markers and qualifiers
//!
//! A marker is any `'static` type used as a key: components and methods are tagged with
//! markers when they are registered, and injection points carry qualifier values whose
//! type selects the binding predicate to run.

/// Carried by every registered component; `TypeIndex::types_annotated_with::<Service>()`
/// is the set of components driven by the lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct Service;

/// Carried by components that opted out of automatic startup.
#[derive(Debug, Clone, Copy)]
pub struct IgnoreAutoScan;

/// Methods invoked when an [Extension](crate::Extension) is loaded.
#[derive(Debug, Clone, Copy)]
pub struct OnLoad;

/// Methods invoked after the container started.
#[derive(Debug, Clone, Copy)]
pub struct OnEnable;

/// Methods invoked before the container closes.
#[derive(Debug, Clone, Copy)]
pub struct OnDisable;

/// Methods invoked when the extension is asked to reload.
#[derive(Debug, Clone, Copy)]
pub struct OnReload;

/// Name qualifier, used to tell apart several bindings of one capability
///
/// ```
/// # use std::sync::Arc;
/// # use armature::*;
/// let mut bindings = Bindings::default();
/// bindings
///     .declare::<String>()
///     .annotated::<Named>(|n| n.value() == "motd")
///     .to(Arc::new("welcome".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Named(String);

impl Named {
    pub fn new(value: impl Into<String>) -> Self {
        Named(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}
