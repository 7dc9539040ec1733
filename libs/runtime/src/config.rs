use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::paths::resolve_home_dir;

/// Directory under the user home used when `server.home_dir` is empty.
const HOME_SUBDIR: &str = ".profile_server";

/// Environment overrides: `APP__SERVER__PORT=8087` sets `server.port`.
const ENV_PREFIX: &str = "APP__";

/// Process configuration: typed global sections plus one free-form JSON
/// section per module under `modules`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// `None` unless the file or the environment provides it.
    pub database: Option<DatabaseConfig>,
    /// `None` falls back to [`default_logging_config`] at startup.
    pub logging: Option<LoggingConfig>,
    /// Extra `<module>.yaml` files, merged into `modules` by file stem.
    #[serde(default)]
    pub modules_dir: Option<String>,
    #[serde(default)]
    pub modules: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Absolute after loading; relative data paths (database, uploads, logs) hang off it.
    pub home_dir: String,
    pub host: String,
    pub port: u16,
    /// Request timeout handed to the HTTP host; 0 keeps the host default.
    #[serde(default)]
    pub timeout_sec: u64,
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// `sqlite://database/profile.db`, `sqlite::memory:` or `postgres://...`.
    pub url: String,
    pub max_conns: Option<u32>,
    /// SQLite only.
    pub busy_timeout_ms: Option<u32>,
}

/// Subsystem (tracing target prefix) → its sinks. `default` catches the rest.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    /// trace | debug | info | warn | error | off
    pub console_level: String,
    /// Relative to `server.home_dir`; empty disables the file sink.
    pub file: String,
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            home_dir: String::new(),
            host: "127.0.0.1".to_string(),
            port: 5000,
            timeout_sec: 0,
        }
    }
}

pub fn default_logging_config() -> LoggingConfig {
    HashMap::from([(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/profile-server.log".to_string(),
            file_level: "debug".to_string(),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    )])
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: Some(DatabaseConfig {
                url: "sqlite://database/profile.db".to_string(),
                max_conns: Some(10),
                busy_timeout_ms: Some(5000),
            }),
            logging: Some(default_logging_config()),
            modules_dir: None,
            modules: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Built-in server defaults, then the YAML file, then `APP__*` variables.
    ///
    /// The file must exist. `server.home_dir` comes back absolute and created,
    /// and `modules_dir` files are folded into `modules`.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        let config_path = config_path.as_ref();
        if !config_path.is_file() {
            bail!("config file not found: {}", config_path.display());
        }

        // only `server` has built-in values here; optional sections stay unset
        let skeleton = AppConfig {
            database: None,
            logging: None,
            ..AppConfig::default()
        };

        let mut config: AppConfig = Figment::from(Serialized::defaults(skeleton))
            .merge(Yaml::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

        config.server.home_dir = normalized_home(&config.server.home_dir)?;

        if let Some(dir) = &config.modules_dir {
            let extra = read_module_files(Path::new(dir))?;
            config.modules.extend(extra);
        }
        Ok(config)
    }

    /// Without a path the defaults are used as they are (home dir still normalized).
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        let Some(path) = config_path else {
            let mut config = Self::default();
            config.server.home_dir = normalized_home(&config.server.home_dir)?;
            return Ok(config);
        };
        Self::load_layered(path)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Typed view of one entry of the `modules` bag; a missing entry yields `T::default()`.
    pub fn module_config<T>(&self, module_name: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let Some(raw) = self.modules.get(module_name) else {
            return Ok(T::default());
        };
        serde_json::from_value(raw.clone())
            .with_context(|| format!("Invalid config for module '{module_name}'"))
    }

    /// `--port` replaces `server.port`; each `-v` raises the default console level.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }

        let level = match args.verbose {
            0 => return,
            1 => "debug",
            _ => "trace",
        };
        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(section) = logging.get_mut("default") {
            section.console_level = level.to_string();
        }
    }
}

/// Flags of the server binary that feed into the configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub port: Option<u16>,
    pub print_config: bool,
    pub verbose: u8,
    pub mock: bool,
}

fn normalized_home(configured: &str) -> Result<String> {
    let configured = configured.trim();
    let raw = (!configured.is_empty()).then(|| configured.to_string());
    let home: PathBuf =
        resolve_home_dir(raw, HOME_SUBDIR, true).context("Failed to resolve server.home_dir")?;
    Ok(home.to_string_lossy().into_owned())
}

/// `<dir>/<name>.yaml` (or `.yml`) becomes `modules[<name>]`. A missing dir is not an error.
fn read_module_files(dir: &Path) -> Result<HashMap<String, serde_json::Value>> {
    let mut found = HashMap::new();
    if !dir.is_dir() {
        return Ok(found);
    }

    let entries =
        std::fs::read_dir(dir).with_context(|| format!("cannot list {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !path.is_file() || !is_yaml {
            continue;
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let value: serde_yaml::Value = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse module config {}", path.display()))?;
        found.insert(name.to_string(), serde_json::to_value(value)?);
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct BioLimits {
        #[serde(default)]
        profile_key: String,
        #[serde(default)]
        max_bio_length: usize,
    }

    fn write_yaml(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn fwd(p: &Path) -> String {
        p.to_string_lossy().replace('\\', "/")
    }

    #[test]
    fn defaults_point_at_local_sqlite() {
        let config = AppConfig::default();
        assert_eq!(config.server.listen_addr(), "127.0.0.1:5000");
        assert_eq!(config.database.unwrap().url, "sqlite://database/profile.db");
        assert_eq!(
            config.logging.unwrap()["default"].file,
            "logs/profile-server.log"
        );
        assert!(config.modules.is_empty());
    }

    #[test]
    fn yaml_file_overrides_defaults_and_home_is_made_absolute() {
        let tmp = tempdir().unwrap();
        let home = tmp.path().join("home");
        let path = write_yaml(
            tmp.path(),
            "cfg.yaml",
            &format!(
                r#"
server:
  home_dir: "{}"
  host: "0.0.0.0"
  port: 9090
database:
  url: "sqlite://profile.db"
  max_conns: 2
modules:
  profile:
    profile_key: "ada"
    max_bio_length: 280
"#,
                fwd(&home)
            ),
        );

        let config = AppConfig::load_layered(&path).unwrap();
        assert!(Path::new(&config.server.home_dir).is_absolute());
        assert!(home.is_dir());
        assert_eq!(config.server.listen_addr(), "0.0.0.0:9090");
        assert_eq!(config.database.as_ref().unwrap().max_conns, Some(2));
        assert!(config.logging.is_none());
        assert_eq!(
            config.module_config::<BioLimits>("profile").unwrap(),
            BioLimits {
                profile_key: "ada".into(),
                max_bio_length: 280
            }
        );
    }

    #[test]
    fn module_sections_default_or_fail_loudly() {
        let mut config = AppConfig::default();
        assert_eq!(
            config.module_config::<BioLimits>("absent").unwrap(),
            BioLimits::default()
        );

        config
            .modules
            .insert("profile".into(), serde_json::json!({ "max_bio_length": "lots" }));
        let err = config.module_config::<BioLimits>("profile").unwrap_err();
        assert!(err.to_string().contains("'profile'"));
    }

    #[test]
    fn verbosity_raises_console_level() {
        for (verbose, expected) in [(0, "info"), (1, "debug"), (2, "trace"), (5, "trace")] {
            let mut config = AppConfig::default();
            config.apply_cli_overrides(&CliArgs {
                port: Some(3000),
                verbose,
                ..Default::default()
            });
            assert_eq!(config.server.port, 3000);
            assert_eq!(config.logging.unwrap()["default"].console_level, expected);
        }
    }

    #[test]
    fn module_files_are_folded_into_the_bag() {
        let tmp = tempdir().unwrap();
        let modules = tmp.path().join("modules");
        fs::create_dir_all(&modules).unwrap();
        write_yaml(&modules, "api_ingress.yaml", "bind_addr: \"127.0.0.1:5001\"\n");
        write_yaml(&modules, "notes.txt", "ignored");

        let path = write_yaml(
            tmp.path(),
            "cfg.yaml",
            &format!(
                "server:\n  home_dir: \"{}\"\n  host: \"127.0.0.1\"\n  port: 5000\nmodules_dir: \"{}\"\n",
                fwd(&tmp.path().join("home")),
                fwd(&modules)
            ),
        );

        let config = AppConfig::load_layered(&path).unwrap();
        assert_eq!(config.modules["api_ingress"]["bind_addr"], "127.0.0.1:5001");
        assert!(!config.modules.contains_key("notes"));
    }

    #[test]
    fn yaml_dump_reads_back() {
        let yaml = AppConfig::default().to_yaml().unwrap();
        let back: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.server.port, 5000);
        assert!(back.database.is_some());
    }

    #[test]
    fn unknown_server_keys_are_rejected() {
        let tmp = tempdir().unwrap();
        let path = write_yaml(
            tmp.path(),
            "typo.yaml",
            "server:\n  host: \"127.0.0.1\"\n  prot: 5000\n",
        );
        let err = AppConfig::load_layered(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = tempdir().unwrap();
        let err = AppConfig::load_layered(tmp.path().join("absent.yaml")).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
