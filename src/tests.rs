use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use super::*;
use crate::markers::{IgnoreAutoScan, OnDisable, OnEnable, OnLoad, OnReload, Service};

/// Ordered record of hook invocations shared between a test and its components
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Log output captured from a scoped tracing subscriber
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.text())
}

/// Compare the data pointers of two `Arc`s, ignoring vtables
fn same_instance<T: ?Sized, U: ?Sized>(a: &Arc<T>, b: &Arc<U>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn explicit_index() -> TypeIndexBuilder {
    TypeIndex::builder::<Armature>().without_static_registry()
}

fn container_over(index: TypeIndexBuilder) -> Armature {
    Armature::with_index(index.build(), ContainerOptions::default())
}

/// Descriptor of a component with its own shared instance, whose Configure hook records
/// its label in the journal
fn recording<T: Injectable + Default + 'static>(
    journal: &Journal,
    label: &'static str,
) -> ComponentDescriptor {
    let journal = journal.clone();
    ComponentDescriptor::new::<T>()
        .provided_by(SingletonProvider::build(Arc::new(T::default())))
        .on_configure(move |_: &T| {
            journal.push(label);
            Ok(())
        })
}

macro_rules! plain_components {
    ($($name:ident),+) => {
        $(
            #[derive(Default, Debug)]
            struct $name;
            injectable!($name);
        )+
    };
}

plain_components!(Alpha, Beta, Gamma, Delta);

// Capabilities and implementors

trait Logger: Send + Sync {
    fn log(&self, content: &str) -> String;
}

#[derive(Default)]
struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, content: &str) -> String {
        format!("console: {}", content)
    }
}

trait Notifier: Send + Sync {
    fn channel(&self) -> &str;
}

struct ChannelNotifier(&'static str);

impl Notifier for ChannelNotifier {
    fn channel(&self) -> &str {
        self.0
    }
}

trait Sink: Send + Sync {}

#[derive(Default)]
struct FileSink;

impl Sink for FileSink {}

#[derive(Debug, PartialEq, Eq)]
struct Version(&'static str);

#[test]
fn startup_runs_by_descending_priority_and_keeps_discovery_order_for_ties() {
    let journal = Journal::default();
    let mut container = container_over(
        explicit_index()
            .component(recording::<Alpha>(&journal, "A").priority(5))
            .component(recording::<Beta>(&journal, "B").priority(10))
            .component(recording::<Gamma>(&journal, "C").priority(5))
            .component(recording::<Delta>(&journal, "D").priority(1)),
    );

    let report = container.startup().unwrap();

    assert_eq!(journal.entries(), ["B", "A", "C", "D"]);
    assert_eq!(report.completed, ["Beta", "Alpha", "Gamma", "Delta"]);
    assert!(report.failed.is_empty());
}

#[test]
fn higher_priority_service_is_configured_first() {
    let journal = Journal::default();
    let mut container = container_over(
        explicit_index()
            .component(recording::<Alpha>(&journal, "A").priority(5))
            .component(recording::<Beta>(&journal, "B").priority(10)),
    );

    container.startup().unwrap();

    assert_eq!(journal.entries(), ["B", "A"]);
}

#[test]
fn default_priority_is_one() {
    let descriptor = ComponentDescriptor::new::<Alpha>();
    assert_eq!(descriptor.get_priority(), ComponentDescriptor::DEFAULT_PRIORITY);
    assert_eq!(descriptor.get_priority(), 1);
}

#[derive(Default)]
struct Reporter {
    logger: Inject<dyn Logger>,
}

injectable!(Reporter { logger });

#[test]
fn bound_instance_is_injected_by_reference() {
    let logger = Arc::new(ConsoleLogger);
    let mut container = container_over(explicit_index());
    let bound = Arc::clone(&logger);
    container.inherit(&move |bindings: &mut Bindings| {
        bindings
            .bind(Arc::clone(&bound))
            .to(|it| it as Arc<dyn Logger>)
            .bind();
    });

    let reporter = Reporter::default();
    container.inject(&reporter).unwrap();

    let injected = reporter.logger.get().unwrap();
    assert!(same_instance(injected, &logger));
    assert_eq!(injected.log("ready"), "console: ready");
}

struct Alerts {
    notifier: Inject<dyn Notifier>,
}

injectable!(Alerts { notifier });

impl Alerts {
    fn named(name: &str) -> Self {
        Self {
            notifier: Inject::new().qualified(Named::new(name)),
        }
    }
}

#[test]
fn qualified_binding_is_selected_for_matching_qualifier() {
    let mut container = container_over(explicit_index());
    container
        .bind::<dyn Notifier>()
        .annotated::<Named>(|v| v.value() == "a")
        .to(Arc::new(ChannelNotifier("qualified")));
    container
        .bind::<dyn Notifier>()
        .to(Arc::new(ChannelNotifier("plain")));

    let alerts = Alerts::named("a");
    container.inject(&alerts).unwrap();
    assert_eq!(alerts.notifier.get().unwrap().channel(), "qualified");

    // the predicate rejects "b", leaving the unqualified binding
    let other = Alerts::named("b");
    container.inject(&other).unwrap();
    assert_eq!(other.notifier.get().unwrap().channel(), "plain");
}

#[test]
fn passing_predicate_wins_regardless_of_registration_order() {
    let mut container = container_over(explicit_index());
    container
        .bind::<dyn Notifier>()
        .annotated::<Named>(|v| v.value() == "a")
        .to(Arc::new(ChannelNotifier("first")));
    container
        .bind::<dyn Notifier>()
        .annotated::<Named>(|v| v.value() == "b")
        .to(Arc::new(ChannelNotifier("second")));

    let alerts = Alerts::named("b");
    container.inject(&alerts).unwrap();
    assert_eq!(alerts.notifier.get().unwrap().channel(), "second");
}

#[test]
fn unfiltered_candidates_resolve_first_match_wins() {
    let mut container = container_over(explicit_index());
    container
        .bind::<dyn Notifier>()
        .to(Arc::new(ChannelNotifier("plain")));
    container
        .bind::<dyn Notifier>()
        .annotated::<Named>(|v| v.value() == "a")
        .to(Arc::new(ChannelNotifier("qualified")));

    // the unqualified binding has no predicate for Named, so it is never excluded
    let alerts = Alerts::named("a");
    container.inject(&alerts).unwrap();
    assert_eq!(alerts.notifier.get().unwrap().channel(), "plain");

    // qualifiers of another type are ignored by Named predicates
    let untagged = Alerts {
        notifier: Inject::new().qualified(7u32),
    };
    container.inject(&untagged).unwrap();
    assert_eq!(untagged.notifier.get().unwrap().channel(), "plain");
}

#[test]
fn rejected_candidates_do_not_hide_later_ones() {
    // consecutive rejected bindings must all be skipped, then the next eligible one chosen
    let mut container = container_over(explicit_index());
    for channel in ["x", "y", "z"] {
        container
            .bind::<dyn Notifier>()
            .annotated::<Named>(move |v| v.value() == channel)
            .to(Arc::new(ChannelNotifier(channel)));
    }

    let alerts = Alerts::named("z");
    container.inject(&alerts).unwrap();
    assert_eq!(alerts.notifier.get().unwrap().channel(), "z");
    assert_eq!(container.bindings().len(), 3);
}

#[derive(Default)]
struct Archive {
    sink: Inject<dyn Sink>,
    file: Inject<FileSink>,
}

injectable!(Archive { sink, file });

#[test]
fn binding_satisfies_declared_supertypes() {
    let sink = Arc::new(FileSink);
    let mut container = container_over(explicit_index());
    container
        .bind::<FileSink>()
        .assignable_to(|it| it as Arc<dyn Sink>)
        .to(Arc::clone(&sink));

    let archive = Archive::default();
    container.inject(&archive).unwrap();

    assert!(same_instance(archive.sink.get().unwrap(), &sink));
    assert!(same_instance(archive.file.get().unwrap(), &sink));
}

#[test]
fn capability_binding_does_not_satisfy_a_concrete_point() {
    let mut container = container_over(explicit_index());
    container
        .bind::<dyn Sink>()
        .to(Arc::new(FileSink) as Arc<dyn Sink>);

    let archive = Archive::default();
    container.inject(&archive).unwrap();

    assert!(archive.sink.is_injected());
    assert!(!archive.file.is_injected());
}

#[derive(Default)]
struct Plain {
    value: u32,
}

injectable!(Plain);

#[test]
fn injecting_a_value_without_points_is_a_no_op() {
    let mut container = Armature::with_index(
        explicit_index().build(),
        ContainerOptions::default().strict(),
    );
    container.bind::<dyn Logger>().to(Arc::new(ConsoleLogger));

    let plain = Plain { value: 3 };
    assert!(container.inject(&plain).is_ok());
    assert_eq!(plain.value, 3);
}

#[test]
fn missing_binding_is_skipped_in_lenient_mode() {
    let container = container_over(explicit_index());
    let reporter = Reporter::default();

    let (result, logs) = capture_logs(|| container.inject(&reporter));

    assert!(result.is_ok());
    assert!(!reporter.logger.is_injected());
    assert!(logs.contains("injection point skipped"));
}

#[test]
fn missing_binding_fails_in_strict_mode() {
    let container = Armature::with_index(
        explicit_index().build(),
        ContainerOptions::default().strict(),
    );
    let reporter = Reporter::default();

    let err = container.inject(&reporter).unwrap_err();

    match err {
        InjectionError::Unsatisfied {
            owner,
            field,
            capability,
        } => {
            assert_eq!(owner, "Reporter");
            assert_eq!(field, "logger");
            assert!(capability.contains("Logger"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn reinjection_keeps_the_first_instance() {
    let first = Arc::new(ConsoleLogger);
    let mut container = container_over(explicit_index());
    container.bind::<dyn Logger>().to(Arc::clone(&first) as Arc<dyn Logger>);

    let reporter = Reporter::default();
    container.inject(&reporter).unwrap();
    container.bind::<dyn Logger>().to(Arc::new(ConsoleLogger));

    let (result, logs) = capture_logs(|| container.inject(&reporter));

    assert!(result.is_ok());
    assert!(same_instance(reporter.logger.get().unwrap(), &first));
    assert!(logs.contains("was already assigned"));
}

struct Greeting {
    text: String,
    logger: Inject<dyn Logger>,
}

impl Greeting {
    fn new(text: String, punctuation: char) -> Self {
        Self {
            text: format!("{}{}", text, punctuation),
            logger: Inject::new(),
        }
    }
}

injectable!(Greeting { logger });

#[test]
fn injected_constructs_then_injects() {
    let mut container = container_over(explicit_index());
    container.bind::<dyn Logger>().to(Arc::new(ConsoleLogger));

    let greeting = container
        .injected(Greeting::new, ("hello".to_string(), '!'))
        .unwrap();

    assert_eq!(greeting.text, "hello!");
    assert_eq!(
        greeting.logger.get().unwrap().log(&greeting.text),
        "console: hello!"
    );
}

/// Bindings of a host, fanning instances out to several capabilities
struct HostBinder {
    logger: Arc<ConsoleLogger>,
}

impl BinderContainer for HostBinder {
    fn populate(&self, bindings: &mut Bindings) {
        bindings
            .bind(Arc::clone(&self.logger))
            .to(|it| it)
            .to(|it| it as Arc<dyn Logger>)
            .bind();

        bindings
            .bind(Arc::new(Version("1.4.0")))
            .to(|it| it)
            .populate(|it| {
                it.annotated::<Named>(|n| n.value() == "plugin:version");
            })
            .bind();

        bindings
            .bind(Arc::new(Version("1.21")))
            .to(|it| it)
            .populate(|it| {
                it.scoped(InjectScope::Singleton)
                    .annotated::<Named>(|n| n.value() == "host:version");
            })
            .bind();
    }
}

struct VersionReport {
    plugin: Inject<Version>,
    host: Inject<Version>,
    logger: Inject<dyn Logger>,
    console: Inject<ConsoleLogger>,
}

injectable!(VersionReport {
    plugin,
    host,
    logger,
    console
});

#[test]
fn inherited_container_fans_instances_out() {
    let logger = Arc::new(ConsoleLogger);
    let mut container = container_over(explicit_index());
    container.inherit(&HostBinder {
        logger: Arc::clone(&logger),
    });

    assert_eq!(container.bindings().len(), 4);
    let scopes: Vec<_> = container.bindings().iter().map(Binding::scope).collect();
    assert_eq!(
        scopes,
        [
            InjectScope::Unscoped,
            InjectScope::Unscoped,
            InjectScope::Unscoped,
            InjectScope::Singleton
        ]
    );

    let report = VersionReport {
        plugin: Inject::new().qualified(Named::new("plugin:version")),
        host: Inject::new().qualified(Named::new("host:version")),
        logger: Inject::new(),
        console: Inject::new(),
    };
    container.inject(&report).unwrap();

    assert_eq!(**report.plugin.get().unwrap(), Version("1.4.0"));
    assert_eq!(**report.host.get().unwrap(), Version("1.21"));
    assert!(same_instance(report.logger.get().unwrap(), &logger));
    assert!(same_instance(report.console.get().unwrap(), &logger));
}

#[test]
fn service_returns_the_started_instance() {
    let alpha = Arc::new(Alpha);
    let mut container = container_over(
        explicit_index().component(
            ComponentDescriptor::new::<Alpha>()
                .provided_by(SingletonProvider::build(Arc::clone(&alpha))),
        ),
    );

    assert_eq!(
        container.service::<Alpha>().unwrap_err(),
        LookupError::NotRegistered {
            type_name: std::any::type_name::<Alpha>()
        }
    );

    container.startup().unwrap();

    let first = container.service::<Alpha>().unwrap();
    let second = container.service::<Alpha>().unwrap();
    assert!(Arc::ptr_eq(&first, &alpha));
    assert!(Arc::ptr_eq(&first, &second));
    assert!(matches!(
        container.service::<Beta>(),
        Err(LookupError::NotRegistered { .. })
    ));
}

#[derive(Default)]
struct Mailer {
    logger: Inject<dyn Logger>,
}

injectable!(Mailer { logger });

#[test]
fn started_services_are_injected_before_configure() {
    let journal = Journal::default();
    let hook_journal = journal.clone();
    let mut container = container_over(
        explicit_index().component(
            ComponentDescriptor::new::<Mailer>()
                .provided_by(SingletonProvider::build(Arc::new(Mailer::default())))
                .on_configure(move |mailer: &Mailer| {
                    let logger = mailer.logger.get().ok_or("logger missing")?;
                    hook_journal.push(logger.log("configured"));
                    Ok(())
                }),
        ),
    );
    container.bind::<dyn Logger>().to(Arc::new(ConsoleLogger));

    container.startup().unwrap();

    assert_eq!(journal.entries(), ["console: configured"]);
    assert!(container.service::<Mailer>().unwrap().logger.is_injected());
}

#[test]
fn startup_isolates_failing_components() {
    let journal = Journal::default();
    let mut container = container_over(
        explicit_index()
            .component(recording::<Alpha>(&journal, "A").priority(4))
            // no shared instance provider
            .component(ComponentDescriptor::new::<Beta>().priority(3))
            .component(
                ComponentDescriptor::new::<Gamma>()
                    .name("gamma-service")
                    .priority(2)
                    .provided_by(SingletonProvider::build(Arc::new(Gamma)))
                    .on_configure(|_: &Gamma| Err("database offline".into())),
            )
            .component(recording::<Delta>(&journal, "D").priority(1)),
    );

    let (report, logs) = capture_logs(|| container.startup().unwrap());

    assert_eq!(journal.entries(), ["A", "D"]);
    assert_eq!(report.completed, ["Alpha", "Delta"]);
    assert_eq!(report.failed, ["Beta", "gamma-service"]);
    assert!(logs.contains("[Services] [Alpha] Loaded in"));
    assert!(logs.contains("[Services] [Beta] Failed to load!"));
    assert!(logs.contains("[Services] [gamma-service] Failed to load!"));
    assert!(logs.contains("has no shared instance provider"));

    // a component whose configure hook failed is still registered
    assert!(container.service::<Gamma>().is_ok());
    assert!(container.service::<Beta>().is_err());
}

#[test]
fn panicking_provider_is_a_discovery_failure() {
    fn exploding() -> Arc<Beta> {
        panic!("no instance today")
    }

    let journal = Journal::default();
    let mut container = container_over(
        explicit_index()
            .component(ComponentDescriptor::new::<Beta>().instance(exploding))
            .component(recording::<Alpha>(&journal, "A")),
    );

    let (report, logs) = capture_logs(|| container.startup().unwrap());

    assert_eq!(report.failed, ["Beta"]);
    assert_eq!(journal.entries(), ["A"]);
    assert!(logs.contains("no instance today"));
}

#[test]
fn ignored_components_are_indexed_but_not_started() {
    let journal = Journal::default();
    let mut container = container_over(
        explicit_index()
            .component(recording::<Alpha>(&journal, "A").ignored())
            .component(recording::<Beta>(&journal, "B")),
    );

    let ignored = container.index().types_annotated_with::<IgnoreAutoScan>();
    assert_eq!(ignored.len(), 1);
    assert_eq!(ignored[0].display_name(), "Alpha");
    assert_eq!(container.index().types_annotated_with::<Service>().len(), 2);

    container.startup().unwrap();

    assert_eq!(journal.entries(), ["B"]);
    assert!(container.service::<Alpha>().is_err());
}

#[test]
fn strict_mode_refuses_components_with_unsatisfied_points() {
    let journal = Journal::default();
    let mut container = Armature::with_index(
        explicit_index()
            .component(recording::<Mailer>(&journal, "mailer"))
            .component(recording::<Alpha>(&journal, "A"))
            .build(),
        ContainerOptions::default().strict(),
    );

    let report = container.startup().unwrap();

    assert_eq!(report.failed, ["Mailer"]);
    assert_eq!(journal.entries(), ["A"]);
    assert!(container.service::<Mailer>().is_err());
}

#[test]
fn close_isolates_failing_hooks() {
    let journal = Journal::default();
    let closing = |label: &'static str| {
        let journal = journal.clone();
        move || -> Result<(), BoxError> {
            journal.push(label);
            Ok(())
        }
    };
    let alpha_close = closing("A");
    let delta_close = closing("D");
    let failing = journal.clone();
    let panicking = journal.clone();

    let mut container = container_over(
        explicit_index()
            .component(
                ComponentDescriptor::new::<Alpha>()
                    .provided_by(SingletonProvider::build(Arc::new(Alpha)))
                    .on_close(move |_: &Alpha| alpha_close()),
            )
            .component(
                ComponentDescriptor::new::<Beta>()
                    .provided_by(SingletonProvider::build(Arc::new(Beta)))
                    .on_close(move |_: &Beta| {
                        failing.push("B");
                        Err("flush failed".into())
                    }),
            )
            .component(
                ComponentDescriptor::new::<Gamma>()
                    .provided_by(SingletonProvider::build(Arc::new(Gamma)))
                    .on_close(move |_: &Gamma| -> Result<(), BoxError> {
                        panicking.push("C");
                        panic!("socket poisoned")
                    }),
            )
            .component(
                ComponentDescriptor::new::<Delta>()
                    .provided_by(SingletonProvider::build(Arc::new(Delta)))
                    .on_close(move |_: &Delta| delta_close()),
            ),
    );
    container.startup().unwrap();

    let (report, logs) = capture_logs(|| container.close().unwrap());

    let mut closed = journal.entries();
    closed.sort();
    assert_eq!(closed, ["A", "B", "C", "D"]);

    let mut completed = report.completed.clone();
    completed.sort();
    assert_eq!(completed, ["Alpha", "Delta"]);
    let mut failed = report.failed.clone();
    failed.sort();
    assert_eq!(failed, ["Beta", "Gamma"]);

    assert!(logs.contains("[Services] [Alpha] Shutdown in"));
    assert!(logs.contains("[Services] [Beta] Failed to shutdown!"));
    assert!(logs.contains("socket poisoned"));
}

#[test]
fn components_without_close_hook_shut_down_cleanly() {
    let mut container = container_over(
        explicit_index().component(
            ComponentDescriptor::new::<Alpha>()
                .provided_by(SingletonProvider::build(Arc::new(Alpha))),
        ),
    );
    container.startup().unwrap();

    let report = container.close().unwrap();

    assert_eq!(report.completed, ["Alpha"]);
    assert!(report.failed.is_empty());
}

#[test]
fn container_transitions_once() {
    let mut container = container_over(explicit_index());
    assert_eq!(container.state(), State::Unstarted);

    assert_eq!(
        container.close().unwrap_err(),
        LifecycleError::InvalidTransition {
            from: State::Unstarted,
            to: State::Closed
        }
    );

    container.startup().unwrap();
    assert_eq!(container.state(), State::Started);
    assert_eq!(
        container.startup().unwrap_err(),
        LifecycleError::InvalidTransition {
            from: State::Started,
            to: State::Started
        }
    );

    container.close().unwrap();
    assert_eq!(container.state(), State::Closed);
    assert!(container.close().is_err());
    assert!(container.startup().is_err());
}

#[test]
fn service_lookups_are_shareable_across_threads() {
    let mut container = container_over(
        explicit_index().component(
            ComponentDescriptor::new::<Alpha>()
                .provided_by(SingletonProvider::build(Arc::new(Alpha))),
        ),
    );
    container.startup().unwrap();
    let container = Arc::new(container);
    let expected = container.service::<Alpha>().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let container = Arc::clone(&container);
            std::thread::spawn(move || container.service::<Alpha>().unwrap())
        })
        .collect();

    for handle in handles {
        assert!(Arc::ptr_eq(&handle.join().unwrap(), &expected));
    }
}

#[test]
fn subtypes_are_answered_from_declared_capabilities() {
    let index = explicit_index()
        .component(ComponentDescriptor::new::<Alpha>().implements::<dyn Sink>())
        .component(ComponentDescriptor::new::<Beta>())
        .component(
            ComponentDescriptor::new::<Gamma>()
                .implements::<dyn Sink>()
                .marked::<OnReload>(),
        )
        .build();

    let sinks: Vec<_> = index
        .subtypes_of::<dyn Sink>()
        .iter()
        .map(|c| c.display_name().to_string())
        .collect();
    assert_eq!(sinks, ["Alpha", "Gamma"]);

    let marked = index.types_annotated_with::<OnReload>();
    assert_eq!(marked.len(), 1);
    assert_eq!(marked[0].info(), TypeInfo::of::<Gamma>());
}

#[test]
fn scope_matches_whole_module_segments() {
    let scope = IndexScope::package("app::services");
    assert!(scope.contains("app::services"));
    assert!(scope.contains("app::services::mail"));
    assert!(!scope.contains("app::servicesx"));
    assert!(!scope.contains("app"));
    assert!(IndexScope::everything().contains("anything::at::all"));
    assert_eq!(IndexScope::package(""), IndexScope::everything());

    assert_eq!(
        IndexScope::package_of::<Alpha>().as_package(),
        Some("armature::tests")
    );
}

#[test]
fn type_names_are_shortened_for_display() {
    assert_eq!(TypeInfo::of::<Alpha>().simple_name(), "Alpha");
    assert_eq!(TypeInfo::of::<dyn Logger>().simple_name(), "Logger");
    assert_eq!(TypeInfo::of::<Inject<Version>>().simple_name(), "Inject");
}

/// Components and methods submitted to the static registry
mod registered {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::markers::{OnLoad, OnReload};
    use crate::*;

    pub static RELOADS: AtomicUsize = AtomicUsize::new(0);
    pub static REFRESHES: AtomicUsize = AtomicUsize::new(0);
    pub static LOADS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    pub struct Catalog;
    injectable!(Catalog);

    impl Catalog {
        shared_instance!(pub fn instance() -> Catalog = Catalog);

        fn refresh(&self) -> Result<(), BoxError> {
            REFRESHES.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct Inventory;
    injectable!(Inventory);

    fn describe_catalog() -> ComponentDescriptor {
        ComponentDescriptor::new::<Catalog>()
            .priority(3)
            .implements::<dyn Iterator<Item = u8>>()
            .instance(Catalog::instance)
    }

    fn describe_inventory() -> ComponentDescriptor {
        ComponentDescriptor::new::<Inventory>().name("inventory")
    }

    fn reload_all() -> Result<(), BoxError> {
        RELOADS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn fail_reload() -> Result<(), BoxError> {
        Err("cache locked".into())
    }

    fn count_load() -> Result<(), BoxError> {
        LOADS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe_reload_all() -> MethodDescriptor {
        MethodDescriptor::function::<Catalog, OnReload>("reload_all", reload_all)
    }

    fn describe_refresh() -> MethodDescriptor {
        MethodDescriptor::method::<Catalog, OnReload>("refresh", Catalog::instance, Catalog::refresh)
    }

    fn describe_fail_reload() -> MethodDescriptor {
        MethodDescriptor::function::<Inventory, OnReload>("fail_reload", fail_reload)
    }

    fn describe_detached() -> MethodDescriptor {
        MethodDescriptor::detached::<Inventory, OnReload>("recount", |_: &Inventory| Ok(()))
    }

    fn describe_count_load() -> MethodDescriptor {
        MethodDescriptor::function::<Inventory, OnLoad>("count_load", count_load)
    }

    register_component!(describe_catalog);
    register_component!(describe_inventory);
    register_method!(describe_reload_all);
    register_method!(describe_refresh);
    register_method!(describe_fail_reload);
    register_method!(describe_detached);
    register_method!(describe_count_load);
}

#[test]
fn static_registry_is_indexed_within_scope() {
    let scope = IndexScope::package(module_path!().to_string() + "::registered");
    let index = TypeIndex::new::<Armature>(scope.clone());

    let names: Vec<_> = index
        .types_annotated_with::<Service>()
        .iter()
        .map(|c| c.display_name().to_string())
        .collect();
    // sorted by type name within the module
    assert_eq!(names, ["Catalog", "inventory"]);
    assert!(index
        .types_annotated_with::<Service>()
        .iter()
        .all(|c| c.origin().ends_with("::registered")));
    assert_eq!(index.subtypes_of::<dyn Iterator<Item = u8>>().len(), 1);
    assert_eq!(index.methods_annotated_with::<OnReload>().len(), 4);
    assert_eq!(index.methods_annotated_with::<OnLoad>().len(), 1);

    let sequential = TypeIndex::builder::<Armature>()
        .scope(scope)
        .parallel(false)
        .build();
    assert_eq!(sequential.types_annotated_with::<Service>().len(), 2);

    let elsewhere = TypeIndex::new::<Armature>(IndexScope::package("armature::nowhere"));
    assert!(elsewhere.types_annotated_with::<Service>().is_empty());
}

#[test]
fn marked_methods_run_with_failures_isolated() {
    let index = TypeIndex::new::<Armature>(IndexScope::package(
        module_path!().to_string() + "::registered",
    ));
    let reloads = registered::RELOADS.load(Ordering::SeqCst);
    let refreshes = registered::REFRESHES.load(Ordering::SeqCst);

    let (report, logs) = capture_logs(|| index.invoke_methods_annotated_with::<OnReload>());

    assert_eq!(
        report,
        InvocationReport {
            invoked: 4,
            failed: 2
        }
    );
    assert_eq!(registered::RELOADS.load(Ordering::SeqCst), reloads + 1);
    assert_eq!(registered::REFRESHES.load(Ordering::SeqCst), refreshes + 1);
    assert!(logs.contains("Failed to run container part Inventory on OnReload : fail_reload"));
    assert!(logs.contains("Failed to run container part Inventory on OnReload : recount"));
    assert!(logs.contains("cache locked"));
}

/// Components driven through the extension phases
mod phased {
    use crate::markers::{OnDisable, OnEnable, OnLoad, OnReload};
    use crate::*;

    use super::Journal;

    pub(super) static JOURNAL: once_cell::sync::Lazy<Journal> =
        once_cell::sync::Lazy::new(Journal::default);

    pub struct Scheduler {
        pub options: Inject<ContainerOptions>,
    }
    injectable!(Scheduler { options });

    impl Scheduler {
        shared_instance!(pub fn instance() -> Scheduler = Scheduler { options: Inject::new() });
    }

    fn describe_scheduler() -> ComponentDescriptor {
        ComponentDescriptor::new::<Scheduler>()
            .instance(Scheduler::instance)
            .on_configure(|_: &Scheduler| {
                JOURNAL.push("configure");
                Ok(())
            })
            .on_close(|_: &Scheduler| {
                JOURNAL.push("close");
                Ok(())
            })
    }

    fn phase(name: &'static str) -> Result<(), BoxError> {
        JOURNAL.push(name);
        Ok(())
    }

    fn describe_load() -> MethodDescriptor {
        MethodDescriptor::function::<Scheduler, OnLoad>("load", || phase("load"))
    }

    fn describe_enable() -> MethodDescriptor {
        MethodDescriptor::method::<Scheduler, OnEnable>("enable", Scheduler::instance, |s| {
            if s.options.is_injected() {
                phase("enable")
            } else {
                Err("options not injected".into())
            }
        })
    }

    fn describe_disable() -> MethodDescriptor {
        MethodDescriptor::function::<Scheduler, OnDisable>("disable", || phase("disable"))
    }

    fn describe_reload() -> MethodDescriptor {
        MethodDescriptor::function::<Scheduler, OnReload>("reload", || phase("reload"))
    }

    register_component!(describe_scheduler);
    register_method!(describe_load);
    register_method!(describe_enable);
    register_method!(describe_disable);
    register_method!(describe_reload);
}

#[test]
fn extension_drives_phases_around_the_container() {
    let options = ContainerOptions::default().with_package(module_path!().to_string() + "::phased");
    let logger = Arc::new(ConsoleLogger);
    let bound = Arc::clone(&logger);

    let mut extension = Extension::load::<Armature>("scheduler", options.clone(), &move |b: &mut Bindings| {
        b.declare::<dyn Logger>().to(Arc::clone(&bound) as Arc<dyn Logger>);
    });
    assert_eq!(extension.container().bindings().len(), 2);

    let startup = extension.enable().unwrap();
    assert_eq!(startup.completed, ["Scheduler"]);
    assert_eq!(extension.reload(), InvocationReport { invoked: 1, failed: 0 });
    let shutdown = extension.disable().unwrap();
    assert_eq!(shutdown.completed, ["Scheduler"]);

    assert_eq!(
        phased::JOURNAL.entries(),
        ["load", "configure", "enable", "reload", "disable", "close"]
    );
    let scheduler = extension.container().service::<phased::Scheduler>().unwrap();
    assert_eq!(**scheduler.options.get().unwrap(), options);
    assert_eq!(extension.container().state(), State::Closed);
    assert!(extension.disable().is_err());
}

#[test]
fn options_merge_defaults_file_and_environment() {
    figment::Jail::expect_with(|jail| {
        let defaults: ContainerOptions = ContainerOptions::figment(None).extract()?;
        assert_eq!(defaults, ContainerOptions::default());

        jail.create_file(
            "armature.toml",
            r#"
                package = "app::services"
                parallel_scan = false

                [logging]
                level = "debug"
            "#,
        )?;
        jail.set_env("ARMATURE_INJECTION", "strict");
        jail.set_env("ARMATURE_LOGGING__ANSI", "false");

        let loader = ConfigLoader::new().with_config_path("armature.toml");
        let options = loader.load().map_err(|e| e.to_string())?;
        assert_eq!(options.package.as_deref(), Some("app::services"));
        assert_eq!(options.injection, InjectionMode::Strict);
        assert!(!options.parallel_scan);
        assert_eq!(options.logging.level, "debug");
        assert!(!options.logging.ansi);
        assert_eq!(options.scope(), IndexScope::package("app::services"));
        Ok(())
    });
}

#[test]
fn invalid_options_are_reported() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("ARMATURE_INJECTION", "sometimes");
        assert!(matches!(
            ContainerOptions::load(None),
            Err(ConfigError::Extract(_))
        ));
        Ok(())
    });
}

#[test]
fn unknown_log_level_is_rejected() {
    let options = LoggingOptions {
        level: "armature=loudest".to_string(),
        ansi: false,
    };
    if std::env::var(logging::LOG_ENV).is_err() {
        assert!(matches!(
            logging::env_filter(&options),
            Err(ConfigError::LogFilter { .. })
        ));
    }
}

#[test]
fn invocation_counts_are_independent_per_marker() {
    fn noop() -> Result<(), BoxError> {
        Ok(())
    }
    let index = explicit_index()
        .method(MethodDescriptor::function::<Alpha, OnEnable>("enable", noop))
        .method(MethodDescriptor::function::<Alpha, OnDisable>("disable", noop))
        .method(MethodDescriptor::function::<Beta, OnEnable>("enable", noop))
        .build();

    assert_eq!(index.invoke_methods_annotated_with::<OnEnable>().invoked, 2);
    assert_eq!(index.invoke_methods_annotated_with::<OnDisable>().invoked, 1);
    assert_eq!(index.invoke_methods_annotated_with::<OnLoad>().invoked, 0);
    assert_eq!(
        format!("{:?}", index.methods_annotated_with::<OnDisable>()[0]),
        "Alpha::disable [OnDisable]"
    );
}
