use std::{sync::Arc, time::SystemTime};

use armature::markers::{OnEnable, OnReload};
use armature::*;

// Define regular traits and implementor structs

trait Logger: Send + Sync {
    fn log(&self, content: &str);
}

trait DateLogger: Send + Sync {
    fn log_date(&self);
}

#[derive(Default)]
struct LoggerImpl;

impl Logger for LoggerImpl {
    fn log(&self, content: &str) {
        println!("{}", content);
    }
}

// A component: its shared instance is injected and configured on startup

struct DateLoggerImpl {
    logger: Inject<dyn Logger>,
    greeting: Inject<String>,
}

injectable!(DateLoggerImpl { logger, greeting });

impl DateLoggerImpl {
    shared_instance!(fn instance() -> DateLoggerImpl = DateLoggerImpl {
        logger: Inject::new(),
        greeting: Inject::new().qualified(Named::new("greeting")),
    });

    fn configure(&self) -> Result<(), BoxError> {
        let logger = self.logger.get().ok_or("no logger bound")?;
        if let Some(greeting) = self.greeting.get() {
            logger.log(greeting);
        }
        Ok(())
    }

    fn close(&self) -> Result<(), BoxError> {
        self.log_date();
        Ok(())
    }
}

impl DateLogger for DateLoggerImpl {
    fn log_date(&self) {
        let Some(logger) = self.logger.get() else {
            return;
        };
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        logger.log(&format!("{}s since epoch", now.as_secs()));
    }
}

fn describe_date_logger() -> ComponentDescriptor {
    ComponentDescriptor::new::<DateLoggerImpl>()
        .name("date-logger")
        .priority(10)
        .implements::<dyn DateLogger>()
        .instance(DateLoggerImpl::instance)
        .on_configure(DateLoggerImpl::configure)
        .on_close(DateLoggerImpl::close)
}

fn describe_enable() -> MethodDescriptor {
    MethodDescriptor::method::<DateLoggerImpl, OnEnable>(
        "log_date",
        DateLoggerImpl::instance,
        |it| {
            it.log_date();
            Ok(())
        },
    )
}

fn reload() -> Result<(), BoxError> {
    println!("reloading");
    Ok(())
}

fn describe_reload() -> MethodDescriptor {
    MethodDescriptor::function::<DateLoggerImpl, OnReload>("reload", reload)
}

register_component!(describe_date_logger);
register_method!(describe_enable);
register_method!(describe_reload);

// Host bindings

struct HostBinder;

impl BinderContainer for HostBinder {
    fn populate(&self, bindings: &mut Bindings) {
        bindings
            .declare::<dyn Logger>()
            .scoped(InjectScope::Singleton)
            .to(Arc::new(LoggerImpl));
        bindings
            .declare::<String>()
            .annotated::<Named>(|n| n.value() == "greeting")
            .to(Arc::new("Hello from the demo".to_string()));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = ConfigLoader::new().with_config_path("armature.toml").load()?;
    logging::init_logging(&options.logging)?;

    let mut extension = Extension::load::<DateLoggerImpl>("demo", options, &HostBinder);
    extension.enable()?;

    let date_logger = extension.container().service::<DateLoggerImpl>()?;
    date_logger.log_date();
    extension.reload();

    extension.disable()?;
    Ok(())
}
