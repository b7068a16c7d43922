//! Container configuration
//!
//! Sources are merged in this order (later sources override earlier):
//! 1. `ContainerOptions::default()`
//! 2. a TOML file, if one is given and exists
//! 3. environment variables prefixed with `ARMATURE_`, nested keys separated by `__`
//!    (e.g. `ARMATURE_LOGGING__LEVEL=debug`)

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::index::IndexScope;

pub const ENV_PREFIX: &str = "ARMATURE_";

/// How to treat an injection point that no binding satisfies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectionMode {
    /// Leave the point empty
    #[default]
    Lenient,
    /// Report the point as an error; during startup the component fails to load
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default filter directive, overridden by the `ARMATURE_LOG` variable
    pub level: String,
    pub ansi: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerOptions {
    /// Module path restricting the static registry; absent means every registration
    pub package: Option<String>,
    pub injection: InjectionMode,
    /// Describe static registrations on the rayon pool
    pub parallel_scan: bool,
    pub logging: LoggingOptions,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            package: None,
            injection: InjectionMode::Lenient,
            parallel_scan: true,
            logging: LoggingOptions::default(),
        }
    }
}

impl ContainerOptions {
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn with_injection(mut self, injection: InjectionMode) -> Self {
        self.injection = injection;
        self
    }

    pub fn strict(self) -> Self {
        self.with_injection(InjectionMode::Strict)
    }

    pub fn scope(&self) -> IndexScope {
        IndexScope::from(self.package.clone())
    }

    /// Figment merging defaults, an optional TOML file and the environment
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(ContainerOptions::default()));
        if let Some(path) = config_path {
            if path.exists() {
                info!(path = %path.display(), "configuration loaded");
                figment = figment.merge(Toml::file(path));
            } else {
                warn!(path = %path.display(), "configuration file not found");
            }
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load options from all sources
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment(config_path).extract()?)
    }
}

/// Loader remembering where the configuration lives
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn load(&self) -> Result<ContainerOptions, ConfigError> {
        ContainerOptions::load(self.config_path.as_deref())
    }
}
