use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment overrides: `APP__SERVER__PORT=9000` sets `server.port`.
const ENV_PREFIX: &str = "APP__";
/// Directory created under the platform base when `server.home_dir` is empty.
const HOME_SUBDIR: &str = ".user_management";

/// Server-wide settings plus a per-module bag that each module parses into
/// its own typed config via [`AppConfig::module_config`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// `None` falls back to [`default_logging_config`].
    pub logging: Option<LoggingConfig>,
    /// Extra `<module>.yaml` files merged into `modules` after loading.
    #[serde(default)]
    pub modules_dir: Option<String>,
    #[serde(default)]
    pub modules: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Absolute after loading; anchors relative log paths.
    pub home_dir: String,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            home_dir: String::new(),
            host: "127.0.0.1".to_string(),
            port: 5011,
        }
    }
}

/// Logging sections keyed by `default` or a crate/module target prefix.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String,
    /// Empty disables the file sink for this section.
    pub file: String,
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

/// Main log for the whole server, with the HTTP edge (access lines, auth
/// decisions, unhandled failures) split into its own file.
pub fn default_logging_config() -> LoggingConfig {
    HashMap::from([
        (
            "default".to_string(),
            Section {
                console_level: "info".to_string(),
                file: "logs/user_management.log".to_string(),
                file_level: "debug".to_string(),
                max_backups: Some(3),
                max_size_mb: Some(100),
            },
        ),
        (
            "api_ingress".to_string(),
            Section {
                console_level: "info".to_string(),
                file: "logs/ingress.log".to_string(),
                file_level: "info".to_string(),
                max_backups: Some(5),
                max_size_mb: Some(50),
            },
        ),
    ])
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: Some(default_logging_config()),
            modules_dir: None,
            modules: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Built-in defaults, then the YAML file (which must exist when given),
    /// then `APP__*` environment variables.
    ///
    /// `server.home_dir` comes back absolute and created, and `modules_dir`
    /// files are merged into `modules`.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let base = AppConfig {
            logging: None,
            ..AppConfig::default()
        };
        let mut figment = Figment::from(Serialized::defaults(base));

        if let Some(path) = config_path {
            if !path.is_file() {
                bail!("config file not found: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }

        let mut config: AppConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| match config_path {
                Some(path) => format!("Failed to parse yaml config file {}", path.display()),
                None => "Failed to read configuration from environment".to_string(),
            })?;

        config.logging.get_or_insert_with(default_logging_config);

        let home = resolve_home_dir(&config.server.home_dir)
            .context("Failed to resolve server.home_dir")?;
        config.server.home_dir = home.to_string_lossy().into_owned();

        if let Some(dir) = config.modules_dir.clone() {
            merge_module_files(&mut config.modules, Path::new(&dir))?;
        }

        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// `--port` replaces `server.port`; each `-v` raises the default console level.
    pub fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }

        let level = match overrides.verbose {
            0 => return,
            1 => "debug",
            _ => "trace",
        };
        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(section) = logging.get_mut("default") {
            section.console_level = level.to_string();
        }
    }

    /// Typed view of `modules.<name>`; an absent section yields `T::default()`.
    pub fn module_config<T: DeserializeOwned + Default>(&self, module_name: &str) -> Result<T> {
        match self.modules.get(module_name) {
            Some(value) => serde_json::from_value(value.clone())
                .with_context(|| format!("invalid configuration for module '{module_name}'")),
            None => Ok(T::default()),
        }
    }

    /// `host:port` from the server section.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Command-line values that take precedence over the loaded config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub verbose: u8,
}

// -------- home_dir --------

/// `~` and the default home live under the user's home directory on Unix
/// and under the roaming config directory (`%APPDATA%`) on Windows.
fn platform_base_dir() -> Result<PathBuf> {
    #[cfg(target_os = "windows")]
    let base = dirs::config_dir();
    #[cfg(not(target_os = "windows"))]
    let base = dirs::home_dir();

    base.context("cannot determine the user's home directory")
}

fn expand_tilde(raw: &str) -> Result<PathBuf> {
    if raw == "~" {
        return platform_base_dir();
    }
    match raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        Some(rest) => Ok(platform_base_dir()?.join(rest)),
        None => Ok(PathBuf::from(raw)),
    }
}

/// Absolute, existing home directory for `configured` (empty means the
/// platform default). Relative paths resolve against the working directory.
fn resolve_home_dir(configured: &str) -> Result<PathBuf> {
    let configured = configured.trim();
    let mut path = if configured.is_empty() {
        platform_base_dir()?.join(HOME_SUBDIR)
    } else {
        expand_tilde(configured)?
    };

    if path.is_relative() {
        path = std::env::current_dir()
            .context("cannot determine current directory")?
            .join(path);
    }

    std::fs::create_dir_all(&path)
        .with_context(|| format!("failed to create home_dir {}", path.display()))?;
    Ok(path)
}

// -------- modules_dir --------

/// Each `<module>.yaml`/`.yml` file becomes `modules.<module>`, replacing an
/// inline section of the same name. Other files are skipped.
fn merge_module_files(bag: &mut HashMap<String, serde_json::Value>, dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("cannot read modules_dir {}", dir.display()))?
    {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        let Some(module) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !path.is_file() || !is_yaml {
            continue;
        }

        let raw = std::fs::read_to_string(&path)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid module yaml {}", path.display()))?;
        bag.insert(module.to_string(), serde_json::to_value(value)?);
    }
    Ok(())
}
