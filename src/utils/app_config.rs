use config::{Config, Environment};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::ops::Deref;
use std::sync::RwLock;

use super::error::Result;

// CONFIG static variable. It's actually a config::Config
// inside an RwLock.
lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::new());
}

/// Verbosity levels recognized by `Controller::start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Quiet,
    Information,
    Debug,
}

impl Verbosity {
    /// Parses a raw `verbosity` string as accepted by `Controller::start`,
    /// matching the recognized values of this enum (case-sensitive,
    /// lowercase). Returns `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quiet" => Some(Verbosity::Quiet),
            "information" => Some(Verbosity::Information),
            "debug" => Some(Verbosity::Debug),
            _ => None,
        }
    }
}

/// The subset of `start()`'s inputs the core itself consumes. Workload-file
/// parsing and CLI argument handling stay outside this crate; this struct
/// only carries what the controller needs to hand to the simulator adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct RjmsConfig {
    pub platform_spec: String,
    pub workload: Option<String>,
    pub output: Option<String>,
    pub simulation_time: Option<f64>,
    pub qos: Option<f64>,
    #[serde(default)]
    pub verbosity: Option<Verbosity>,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub rjms: RjmsConfig,
}

impl AppConfig {
    pub fn init(default_config: Option<&str>) -> Result<()> {
        let mut settings = Config::new();

        if let Some(config_contents) = default_config {
            settings.merge(config::File::from_str(config_contents, config::FileFormat::Toml))?;
        }

        // Merge settings with env variables, e.g. RJMS_RJMS.SIMULATION_TIME
        settings.merge(Environment::with_prefix("RJMS").separator("."))?;

        {
            let mut w = CONFIG.write().unwrap();
            *w = settings;
        }

        Ok(())
    }

    pub fn merge_config(config_file: Option<&str>) -> Result<()> {
        if let Some(config_file_path) = config_file {
            CONFIG
                .write()
                .unwrap()
                .merge(config::File::with_name(config_file_path))?;
        }
        Ok(())
    }

    pub fn set(key: &str, value: &str) -> Result<()> {
        CONFIG.write().unwrap().set(key, value)?;
        Ok(())
    }

    pub fn get<'de, T>(key: &'de str) -> Result<T>
    where
        T: serde::Deserialize<'de>,
    {
        Ok(CONFIG.read().unwrap().get::<T>(key)?)
    }

    /// Clones the current `config::Config` (from the `RwLock`) into a new
    /// `AppConfig`. Fetch again after changing the configuration.
    pub fn fetch() -> Result<AppConfig> {
        let r = CONFIG.read().unwrap();
        let config_clone = r.deref().clone();
        Ok(config_clone.try_into()?)
    }
}
