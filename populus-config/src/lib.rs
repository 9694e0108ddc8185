//! Loader for Populus configuration with YAML + environment overlays.
//!
//! Sources, lowest precedence first:
//!
//! 1. the built-in defaults (`populus.default.yaml`, embedded at compile time);
//! 2. YAML files and inline snippets, in the order they were attached;
//! 3. `POPULUS__`-prefixed environment variables, `__` separating path segments
//!    (`POPULUS__HTTP__TIMEOUT_SECS=30`, `POPULUS__PROVIDERS=google,bing`).
//!
//! After merging, `${VAR}` placeholders in string values are expanded from the
//! process environment. A credential whose placeholder is still unresolved is
//! treated as missing by [`PopulusConfig::check_credentials`].
use config::{Config, ConfigError, Environment, File, FileFormat};
use populus_common::observability::{LogConfig, LogFormat};
use populus_common::{PopulusError, ProviderKind, Theme};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const DEFAULT_YAML: &str = include_str!("../populus.default.yaml");

/// File picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "populus.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct PopulusConfig {
    pub providers: Vec<ProviderKind>,
    pub credentials: Credentials,
    pub endpoints: Endpoints,
    pub http: HttpSettings,
    pub trends: TrendsSettings,
    pub search: SearchSettings,
    pub wordcloud: WordcloudSettings,
    pub dashboard: DashboardSettings,
    pub logging: LoggingSettings,
}

/// Raw credential strings as configured; use the accessors to read them.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(default, deserialize_with = "lenient_string")]
    google_api_key: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    search_engine_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    bing_api_key: Option<String>,
}

impl Credentials {
    pub fn google_api_key(&self) -> Option<&str> {
        resolved(&self.google_api_key)
    }

    pub fn search_engine_id(&self) -> Option<&str> {
        resolved(&self.search_engine_id)
    }

    pub fn bing_api_key(&self) -> Option<&str> {
        resolved(&self.bing_api_key)
    }
}

/// Blank values and unexpanded `${VAR}` placeholders count as absent.
fn resolved(raw: &Option<String>) -> Option<&str> {
    let value = raw.as_deref()?.trim();
    if value.is_empty() || value.contains("${") {
        None
    } else {
        Some(value)
    }
}

/// Base URLs of the external services. Tests point these at mock servers.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoints {
    pub google_search: String,
    pub bing_search: String,
    pub duckduckgo: String,
    pub trends: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    pub timeout_secs: u64,
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendsSettings {
    pub timeframe: String,
    /// Minutes west of UTC, as the Trends API expects.
    pub tz: i32,
    /// Cap on unique terms looked up per run; unlimited when absent.
    #[serde(default)]
    pub max_terms: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    pub max_results: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WordcloudSettings {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    pub max_words: usize,
    pub min_font_size: f32,
    pub max_font_size: f32,
    pub theme: Theme,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub stderr: bool,
    pub filter: String,
}

impl LoggingSettings {
    /// Build the observability config; `verbose` forces stderr duplication.
    pub fn to_log_config(&self, verbose: bool) -> LogConfig {
        LogConfig {
            log_dir: self.dir.clone(),
            emit_stderr: self.stderr || verbose,
            format: self.format,
            default_filter: self.filter.clone(),
            ..LogConfig::default()
        }
    }
}

impl PopulusConfig {
    /// Providers to consult: the explicit selection if given, else the
    /// configured list. Sorted into priority order without duplicates.
    pub fn selected_providers(&self, explicit: Option<&[ProviderKind]>) -> Vec<ProviderKind> {
        let mut kinds = explicit.unwrap_or(&self.providers).to_vec();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// Fail fast when a selected provider lacks its credentials.
    ///
    /// ```
    /// use populus_common::ProviderKind;
    /// use populus_config::PopulusConfigLoader;
    ///
    /// let cfg = PopulusConfigLoader::new()
    ///     .with_yaml_str("credentials: { bing_api_key: '' }")
    ///     .load()
    ///     .unwrap();
    /// assert!(cfg.check_credentials(&[ProviderKind::DuckDuckGo]).is_ok());
    /// assert!(cfg.check_credentials(&[ProviderKind::Bing]).is_err());
    /// ```
    pub fn check_credentials(&self, selected: &[ProviderKind]) -> Result<(), PopulusError> {
        if selected.is_empty() {
            return Err(PopulusError::Config("no providers selected".into()));
        }

        let mut missing = Vec::new();
        for kind in selected {
            match kind {
                ProviderKind::Google => {
                    if self.credentials.google_api_key().is_none() {
                        missing.push("Google needs GOOGLE_API_KEY (credentials.google_api_key)");
                    }
                    if self.credentials.search_engine_id().is_none() {
                        missing.push("Google needs SEARCH_ENGINE_ID (credentials.search_engine_id)");
                    }
                }
                ProviderKind::Bing => {
                    if self.credentials.bing_api_key().is_none() {
                        missing.push("Bing needs BING_API_KEY (credentials.bing_api_key)");
                    }
                }
                ProviderKind::DuckDuckGo => {}
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PopulusError::Config(format!(
                "missing credentials: {}",
                missing.join("; ")
            )))
        }
    }
}

/// Accept numbers and booleans where a string is expected. Environment
/// overrides are type-inferred, so a numeric key would otherwise be rejected.
fn lenient_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(de)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
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

/// Builder hides the `config` crate wiring (defaults + YAML + env overrides).
pub struct PopulusConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for PopulusConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PopulusConfigLoader {
    /// Start from the built-in defaults.
    ///
    /// ```
    /// use populus_config::PopulusConfigLoader;
    ///
    /// let config = PopulusConfigLoader::new().load().expect("defaults are valid");
    /// assert_eq!(config.dashboard.port, 8501);
    /// assert_eq!(config.trends.timeframe, "today 5-y");
    /// assert_eq!(config.providers.len(), 3);
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_YAML, FileFormat::Yaml));
        Self { builder }
    }

    /// Attach a YAML file that must exist.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a YAML file that is merged only when present.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use populus_common::{ProviderKind, Theme};
    /// use populus_config::PopulusConfigLoader;
    ///
    /// let cfg = PopulusConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// providers: [ddg]
    /// wordcloud:
    ///   theme: dark
    /// trends:
    ///   max_terms: 20
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.providers, vec![ProviderKind::DuckDuckGo]);
    /// assert_eq!(cfg.wordcloud.theme, Theme::Dark);
    /// assert_eq!(cfg.trends.max_terms, Some(20));
    /// assert_eq!(cfg.wordcloud.width, 800);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self.builder.add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// ```
    /// use populus_config::PopulusConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOC_BING_KEY", "injected-from-env"); }
    ///
    /// let config = PopulusConfigLoader::new()
    ///     .with_yaml_str("credentials:\n  bing_api_key: \"${DOC_BING_KEY}\"")
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.credentials.bing_api_key(), Some("injected-from-env"));
    ///
    /// unsafe { std::env::remove_var("DOC_BING_KEY"); }
    /// ```
    pub fn load(self) -> Result<PopulusConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("POPULUS")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("providers"),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
