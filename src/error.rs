//! Errors raised while discovering, wiring and driving components
//!
//! Only [LookupError], [LifecycleError], [ConfigError] and strict-mode [InjectionError]s
//! ever reach the caller. Everything else is logged by the container and contained to the
//! component that caused it.

use thiserror::Error;

use crate::container::State;

/// Boxed error returned by lifecycle hooks and marked methods
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A marked type or method could not be resolved to a live target
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("{type_name} has no shared instance provider")]
    NoSharedInstance { type_name: &'static str },
    #[error("shared instance provider of {type_name} panicked: {message}")]
    ProviderPanicked {
        type_name: &'static str,
        message: String,
    },
}

/// Assigning a bound instance into an injection point failed
#[derive(Error, Debug)]
pub enum InjectionError {
    #[error("no binding satisfies {owner}.{field} ({capability})")]
    Unsatisfied {
        owner: String,
        field: &'static str,
        capability: &'static str,
    },
    #[error("{owner}.{field} was already assigned")]
    AlreadyAssigned { owner: String, field: &'static str },
    #[error("bound instance for {owner}.{field} is not a {capability}")]
    TypeMismatch {
        owner: String,
        field: &'static str,
        capability: &'static str,
    },
}

/// A Configure or Close hook, or a marked method, did not complete
#[derive(Error, Debug)]
pub enum HookError {
    #[error("{hook} hook of {name} failed: {source}")]
    Failed {
        name: String,
        hook: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("{hook} hook of {name} panicked: {message}")]
    Panicked {
        name: String,
        hook: &'static str,
        message: String,
    },
    #[error("{hook} hook target is not a {expected}")]
    TargetMismatch {
        hook: &'static str,
        expected: &'static str,
    },
}

/// A service was requested that the container never registered
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LookupError {
    #[error("{type_name} is not a registered service")]
    NotRegistered { type_name: &'static str },
    #[error("registered service does not downcast to {type_name}")]
    TypeMismatch { type_name: &'static str },
}

/// The container was driven through an illegal state transition
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("cannot move the container from {from:?} to {to:?}")]
    InvalidTransition { from: State, to: State },
}

/// Configuration could not be loaded, or logging could not be installed
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid container configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
    #[error("invalid log filter `{filter}`: {message}")]
    LogFilter { filter: String, message: String },
    #[error("a global tracing subscriber is already installed")]
    SubscriberAlreadySet,
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Extract(Box::new(err))
    }
}

/// Render a panic payload the way the default panic hook does
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
