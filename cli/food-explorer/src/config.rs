use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use config::{Config as HierarchicalConfig, Environment};
use food_catalog::{
    CatalogClientConfig,
    DEFAULT_CATALOG_URL,
    DEFAULT_DEBOUNCE,
    DEFAULT_DURABLE_CACHE_TTL,
    DEFAULT_MEMORY_CACHE_TTL,
    DEFAULT_PAGE_SIZE,
    DEFAULT_REQUEST_TIMEOUT,
    DurableCacheConfig,
    SearchControllerConfig,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the directories food-explorer manages (config, cache)
const APP_DIR_NAME: &str = "food-explorer";
const CONFIG_DIR_VAR: &str = "FOOD_EXPLORER_CONFIG_DIR";
const ENV_PREFIX: &str = "FOOD_EXPLORER";
pub const CONFIG_FILE: &str = "food-explorer.toml";
/// File name of the durable response cache inside `cache_dir`
pub const RESPONSE_CACHE_FILE: &str = "responses.json";

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Base URL of the catalog API
    pub catalog_url: String,
    /// Directory for the response cache (default: `$XDG_CACHE_HOME/food-explorer`)
    pub cache_dir: PathBuf,
    pub request_timeout_ms: u64,
    pub memory_cache_ttl_secs: u64,
    pub durable_cache_ttl_secs: u64,
    /// Keep responses in memory only
    #[serde(default)]
    pub disable_durable_cache: bool,
    /// Products per result page
    pub page_size: u32,
    /// Quiet period before an edited search text is searched for
    pub debounce_ms: u64,
}

impl Config {
    /// Creates a [Config] from the config files and the environment
    pub fn parse() -> Result<Config> {
        let config_dir = config_dir()?;
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join(APP_DIR_NAME);

        let files = [
            PathBuf::from("/etc").join(APP_DIR_NAME).join(CONFIG_FILE),
            config_dir.join(CONFIG_FILE),
        ];
        Self::read(&files, &cache_dir)
    }

    /// Layer defaults, `files` (in order, all optional) and environment
    /// variables.
    fn read(files: &[PathBuf], default_cache_dir: &Path) -> Result<Config> {
        let mut builder = HierarchicalConfig::builder()
            .set_default("catalog_url", DEFAULT_CATALOG_URL)?
            .set_default("cache_dir", default_cache_dir.to_string_lossy().as_ref())?
            .set_default("request_timeout_ms", millis(DEFAULT_REQUEST_TIMEOUT))?
            .set_default("memory_cache_ttl_secs", secs(DEFAULT_MEMORY_CACHE_TTL))?
            .set_default("durable_cache_ttl_secs", secs(DEFAULT_DURABLE_CACHE_TTL))?
            .set_default("disable_durable_cache", false)?
            .set_default("page_size", i64::from(DEFAULT_PAGE_SIZE))?
            .set_default("debounce_ms", millis(DEFAULT_DEBOUNCE))?;

        for file in files {
            debug!(path = %file.display(), "adding config file");
            builder = builder.add_source(
                config::File::from(file.as_path())
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        // override via env variables
        let builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: Config = builder
            .build()?
            .try_deserialize()
            .context("Could not parse config")?;
        ensure!(config.page_size > 0, "page_size must be at least 1");
        Ok(config)
    }

    pub fn durable_cache_path(&self) -> PathBuf {
        self.cache_dir.join(RESPONSE_CACHE_FILE)
    }

    pub fn catalog_client_config(&self) -> CatalogClientConfig {
        let durable_cache = (!self.disable_durable_cache).then(|| DurableCacheConfig {
            path: self.durable_cache_path(),
            ttl: Duration::from_secs(self.durable_cache_ttl_secs),
        });

        CatalogClientConfig {
            catalog_url: self.catalog_url.clone(),
            user_agent: Some(format!(
                "{APP_DIR_NAME}/{}",
                env!("CARGO_PKG_VERSION")
            )),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            memory_cache_ttl: Duration::from_secs(self.memory_cache_ttl_secs),
            page_size: self.page_size,
            durable_cache,
            ..Default::default()
        }
    }

    pub fn controller_config(&self) -> SearchControllerConfig {
        SearchControllerConfig {
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }
}

/// Directory holding the user's config file, `$FOOD_EXPLORER_CONFIG_DIR` if set.
fn config_dir() -> Result<PathBuf> {
    match env::var(CONFIG_DIR_VAR) {
        Ok(dir) => {
            debug!("`${CONFIG_DIR_VAR}` set: {dir}");
            Ok(dir.into())
        },
        Err(_) => {
            let dir = dirs::config_dir()
                .context("Could not determine the config directory")?
                .join(APP_DIR_NAME);
            debug!("`${CONFIG_DIR_VAR}` not set, using {}", dir.display());
            Ok(dir)
        },
    }
}

fn millis(duration: Duration) -> i64 {
    duration.as_millis().try_into().unwrap_or(i64::MAX)
}

fn secs(duration: Duration) -> i64 {
    duration.as_secs().try_into().unwrap_or(i64::MAX)
}
