//! Server settings
//!
//! Built-in defaults, overridden by an optional TOML file (`tasks.toml`, or the
//! path in `TASKS_CONFIG`), overridden by `TASKS_*` environment variables. Nested
//! keys use `__`, e.g. `TASKS_TASKS__ID_RANGE_SIZE=100`.

use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tasks_core::TaskManagerConfig;

const DEFAULT_CONFIG_FILE: &str = "tasks.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_address: String,
    pub database_path: String,
    /// `limit` used by listings that don't pass one
    pub default_page_size: i64,
    pub tasks: TaskManagerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            database_path: "data/tasks.db".to_string(),
            default_page_size: 100,
            tasks: TaskManagerConfig::default(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let path = std::env::var("TASKS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path, Environment::with_prefix("TASKS"))
    }

    fn load_from(path: &str, env: Environment) -> Result<Self> {
        let defaults = Config::try_from(&Settings::default()).context("Failed to encode default settings")?;

        let settings: Settings = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(path).required(false))
            .add_source(env.prefix_separator("_").separator("__").try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read configuration (file: {})", path))?
            .try_deserialize()
            .context("Invalid configuration")?;

        if settings.default_page_size <= 0 || settings.default_page_size > settings.tasks.max_page_size {
            anyhow::bail!(
                "default_page_size must be in 1..={}, got {}",
                settings.tasks.max_page_size,
                settings.default_page_size
            );
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tasks_core::CacheSettings;
    use tokio_test::{assert_err, assert_ok};

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Environment::with_prefix("TASKS").source(Some(source))
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let settings = assert_ok!(Settings::load_from("does-not-exist.toml", env(&[])));

        assert_eq!(settings.bind_address, "0.0.0.0:8080");
        assert_eq!(settings.default_page_size, 100);
        assert_eq!(settings.tasks, TaskManagerConfig::default());
    }

    #[test]
    fn test_file_then_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.toml");
        std::fs::write(
            &path,
            r#"
database_path = "/tmp/other.db"
default_page_size = 20

[tasks]
id_range_size = 50

[tasks.page_cache]
max_size = 10
expire_after_ms = 1000
"#,
        )
        .unwrap();

        let settings = Settings::load_from(
            path.to_str().unwrap(),
            env(&[("TASKS_BIND_ADDRESS", "127.0.0.1:9999"), ("TASKS_TASKS__ID_RANGE_SIZE", "25")]),
        )
        .unwrap();

        assert_eq!(settings.bind_address, "127.0.0.1:9999");
        assert_eq!(settings.database_path, "/tmp/other.db");
        assert_eq!(settings.default_page_size, 20);
        assert_eq!(settings.tasks.id_range_size, 25);
        assert_eq!(settings.tasks.page_cache, CacheSettings::new(10, Duration::from_secs(1)));
        assert_eq!(settings.tasks.entity_cache, CacheSettings::default());
    }

    #[test]
    fn test_page_size_must_fit_max() {
        assert_err!(Settings::load_from(
            "does-not-exist.toml",
            env(&[("TASKS_DEFAULT_PAGE_SIZE", "0")])
        ));
    }
}
