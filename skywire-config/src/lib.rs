//! Loader for skywire configuration with YAML + environment overlays.
//!
//! Precedence, lowest first:
//!
//! 1. built-in defaults
//! 2. YAML files, in the order they were attached
//! 3. `SKYWIRE_*` environment variables (`SKYWIRE_PDS_HOST`, `SKYWIRE_PAGE_SIZE`, ...)
//! 4. the legacy variables `BLUESKY_HANDLE`, `BLUESKY_PASSWORD` and `PDSHOST`
//!
//! String values read from YAML may contain `${VAR}` placeholders; they are
//! expanded once the file layers are merged. Environment values are taken
//! verbatim, so a password holding `$` reaches the server unchanged.
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Largest page the XRPC list endpoints accept.
pub const MAX_PAGE_SIZE: u32 = 100;

pub const DEFAULT_PDS_HOST: &str = "https://bsky.social";
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_BATCH_SIZE: usize = 25;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://skywire.db";
pub const DEFAULT_FEED_FILTER: &str = "posts_with_replies";

pub const CONFIG_FILE_NAME: &str = "skywire.yaml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("missing credentials: set BLUESKY_HANDLE and BLUESKY_PASSWORD (or identifier/password in {CONFIG_FILE_NAME})")]
    MissingCredentials,
}

/// Resolved runtime configuration, built once at process start.
#[derive(Clone, Serialize, Deserialize)]
pub struct SkywireConfig {
    /// Base URL of the PDS / AppView host.
    pub pds_host: String,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Items requested per page on cursor-paged endpoints.
    pub page_size: u32,
    /// Actors per `getProfiles` call in bulk mode.
    pub batch_size: usize,
    /// Client-wide request timeout. Unset means the transport default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    pub database_url: String,
    /// `posts_with_replies`, `posts_no_replies`, `posts_with_media`, `posts_and_author_threads`
    pub feed_filter: String,
    pub include_pins: bool,
}

impl Default for SkywireConfig {
    fn default() -> Self {
        Self {
            pds_host: DEFAULT_PDS_HOST.into(),
            identifier: None,
            password: None,
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: None,
            database_url: DEFAULT_DATABASE_URL.into(),
            feed_filter: DEFAULT_FEED_FILTER.into(),
            include_pins: true,
        }
    }
}

impl fmt::Debug for SkywireConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkywireConfig")
            .field("pds_host", &self.pds_host)
            .field("identifier", &self.identifier)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("page_size", &self.page_size)
            .field("batch_size", &self.batch_size)
            .field("timeout_secs", &self.timeout_secs)
            .field("database_url", &self.database_url)
            .field("feed_filter", &self.feed_filter)
            .field("include_pins", &self.include_pins)
            .finish()
    }
}

impl SkywireConfig {
    /// Identifier and password, or an error naming the variables to set.
    pub fn credentials(&self) -> Result<(&str, &str), SettingsError> {
        match (self.identifier.as_deref(), self.password.as_deref()) {
            (Some(id), Some(pw)) if !id.is_empty() && !pw.is_empty() => Ok((id, pw)),
            _ => Err(SettingsError::MissingCredentials),
        }
    }

    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout_secs.map(std::time::Duration::from_secs)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.pds_host.trim().is_empty() {
            return Err(SettingsError::Invalid("pds_host must not be empty".into()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(SettingsError::Invalid(format!(
                "page_size must be within 1..={MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.batch_size == 0 {
            return Err(SettingsError::Invalid("batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

enum Layer {
    File { path: PathBuf, required: bool },
    Inline(String),
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct SkywireConfigLoader {
    layers: Vec<Layer>,
    env_prefix: &'static str,
    legacy_env: bool,
}

impl Default for SkywireConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SkywireConfigLoader {
    /// Start with defaults, `SKYWIRE_` env overrides and the legacy variables.
    ///
    /// ```
    /// use skywire_config::SkywireConfigLoader;
    ///
    /// let config = SkywireConfigLoader::new()
    ///     .without_legacy_env()
    ///     .with_yaml_str("page_size: 50")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.page_size, 50);
    /// assert_eq!(config.batch_size, 25);
    /// ```
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            env_prefix: "SKYWIRE",
            legacy_env: true,
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.layers.push(Layer::File {
            path: path.as_ref().to_path_buf(),
            required: true,
        });
        self
    }

    /// Attach a file that is merged only when present.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.layers.push(Layer::File {
            path: path.as_ref().to_path_buf(),
            required: false,
        });
        self
    }

    /// `./skywire.yaml` when it exists, else `<config_dir>/skywire/skywire.yaml`.
    /// Either may be absent.
    pub fn with_default_locations(self) -> Self {
        match default_location(Path::new("."), dirs::config_dir().as_deref()) {
            Some(path) => self.with_optional_file(path),
            None => self,
        }
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.layers.push(Layer::Inline(yaml.to_string()));
        self
    }

    /// Ignore `BLUESKY_HANDLE`, `BLUESKY_PASSWORD` and `PDSHOST`.
    pub fn without_legacy_env(mut self) -> Self {
        self.legacy_env = false;
        self
    }

    /// Consume the builder and produce a validated [`SkywireConfig`].
    ///
    /// ```
    /// use skywire_config::SkywireConfigLoader;
    ///
    /// unsafe { std::env::set_var("SKYWIRE_DOC_HOST", "https://pds.example.test"); }
    ///
    /// let config = SkywireConfigLoader::new()
    ///     .without_legacy_env()
    ///     .with_yaml_str("pds_host: \"${SKYWIRE_DOC_HOST}\"")
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.pds_host, "https://pds.example.test");
    ///
    /// unsafe { std::env::remove_var("SKYWIRE_DOC_HOST"); }
    /// ```
    pub fn load(self) -> Result<SkywireConfig, SettingsError> {
        let defaults = SkywireConfig::default();
        let mut files = Config::builder()
            .set_default("pds_host", defaults.pds_host)?
            .set_default("page_size", i64::from(defaults.page_size))?
            .set_default("batch_size", defaults.batch_size as i64)?
            .set_default("database_url", defaults.database_url)?
            .set_default("feed_filter", defaults.feed_filter)?
            .set_default("include_pins", defaults.include_pins)?;

        for layer in self.layers {
            files = match layer {
                Layer::File { path, required } => {
                    files.add_source(File::from(path).required(required))
                }
                Layer::Inline(yaml) => files.add_source(File::from_str(&yaml, FileFormat::Yaml)),
            };
        }

        // Expand placeholders in file values before any environment layer is
        // merged; env-provided secrets must not be rewritten.
        let from_files: SkywireConfig = files.build()?.try_deserialize()?;
        let mut v =
            serde_json::to_value(&from_files).map_err(|e| SettingsError::Invalid(e.to_string()))?;
        expand_env_in_value(&mut v);
        let expanded = v.to_string();

        let mut builder = Config::builder()
            .add_source(File::from_str(&expanded, FileFormat::Json))
            .add_source(
                Environment::with_prefix(self.env_prefix)
                    .prefix_separator("_")
                    .separator("__"),
            );

        if self.legacy_env {
            builder = builder
                .set_override_option("identifier", std::env::var("BLUESKY_HANDLE").ok())?
                .set_override_option("password", std::env::var("BLUESKY_PASSWORD").ok())?
                .set_override_option(
                    "pds_host",
                    std::env::var("PDSHOST").ok().filter(|h| !h.is_empty()),
                )?;
        }

        let mut cfg: SkywireConfig = builder.build()?.try_deserialize()?;
        cfg.pds_host = cfg.pds_host.trim_end_matches('/').to_string();
        cfg.validate()?;
        Ok(cfg)
    }
}

/// The single default config file: the working directory copy wins outright.
fn default_location(cwd: &Path, config_dir: Option<&Path>) -> Option<PathBuf> {
    let local = cwd.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    config_dir.map(|dir| dir.join("skywire").join(CONFIG_FILE_NAME))
}
