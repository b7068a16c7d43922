//! Host extension phases
//!
//! An [Extension] wraps a container and drives it through the phases of a host
//! application: load, enable, disable and reload. Each phase invokes the methods carrying
//! the matching marker ([OnLoad], [OnEnable], [OnDisable], [OnReload]).

use std::sync::Arc;

use tracing::info;

use crate::binder::{BinderContainer, Bindings};
use crate::config::ContainerOptions;
use crate::container::Armature;
use crate::error::LifecycleError;
use crate::index::{InvocationReport, TypeIndex};
use crate::lifecycle::LifecycleReport;
use crate::markers::{OnDisable, OnEnable, OnLoad, OnReload};

/// Binds the container options, so components can inject their configuration
pub struct CoreBinder {
    options: Arc<ContainerOptions>,
}

impl CoreBinder {
    pub fn new(options: ContainerOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }
}

impl BinderContainer for CoreBinder {
    fn populate(&self, bindings: &mut Bindings) {
        bindings.bind(Arc::clone(&self.options)).to(|it| it).bind();
    }
}

/// Container driven through the load/enable/disable/reload phases
pub struct Extension {
    name: String,
    container: Armature,
}

impl Extension {
    /// Index the static registry anchored on `Root`, run the load methods and import the
    /// core bindings followed by the host's own.
    pub fn load<Root: ?Sized + 'static>(
        name: impl Into<String>,
        options: ContainerOptions,
        binders: &impl BinderContainer,
    ) -> Self {
        let container = Armature::new::<Root>(options);
        Self::load_with(name, container, binders)
    }

    /// Same as [Extension::load] over a prebuilt index
    pub fn load_with_index(
        name: impl Into<String>,
        index: TypeIndex,
        options: ContainerOptions,
        binders: &impl BinderContainer,
    ) -> Self {
        Self::load_with(name, Armature::with_index(index, options), binders)
    }

    fn load_with(
        name: impl Into<String>,
        mut container: Armature,
        binders: &impl BinderContainer,
    ) -> Self {
        let name = name.into();
        let report = container.index().invoke_methods_annotated_with::<OnLoad>();
        log_phase(&name, "load", report);

        let core = CoreBinder::new(container.options().clone());
        container.inherit(&core).inherit(binders);
        Self { name, container }
    }

    /// Start the container, then run the enable methods
    pub fn enable(&mut self) -> Result<LifecycleReport, LifecycleError> {
        let startup = self.container.startup()?;
        let report = self.container.index().invoke_methods_annotated_with::<OnEnable>();
        log_phase(&self.name, "enable", report);
        Ok(startup)
    }

    /// Run the disable methods, then close the container
    pub fn disable(&mut self) -> Result<LifecycleReport, LifecycleError> {
        let report = self.container.index().invoke_methods_annotated_with::<OnDisable>();
        log_phase(&self.name, "disable", report);
        self.container.close()
    }

    /// Run the reload methods
    pub fn reload(&self) -> InvocationReport {
        let report = self.container.index().invoke_methods_annotated_with::<OnReload>();
        log_phase(&self.name, "reload", report);
        report
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn container(&self) -> &Armature {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Armature {
        &mut self.container
    }
}

fn log_phase(name: &str, phase: &'static str, report: InvocationReport) {
    info!(
        extension = name,
        phase,
        invoked = report.invoked,
        failed = report.failed,
        "extension phase completed"
    );
}
