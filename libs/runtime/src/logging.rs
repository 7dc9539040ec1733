use crate::config::{LoggingConfig, Section};
use std::collections::HashMap;
use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::filter::{FilterFn, Targets};
use tracing_subscriber::{fmt, layer::SubscriberExt, prelude::*, Registry};

use file_rotate::{
    compression::Compression,
    suffix::{AppendCount, FileLimit},
    ContentLimit, FileRotate,
};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;
const DEFAULT_MAX_BACKUPS: usize = 3;

fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" | "" => None,
        _ => Some(Level::INFO),
    }
}

/// `target == name` or `target` starts with `name::`
fn owns_target(target: &str, name: &str) -> bool {
    target
        .strip_prefix(name)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

type CatchAllFilter = FilterFn<Box<dyn Fn(&tracing::Metadata<'_>) -> bool + Send + Sync>>;

/// Passes records that no named subsystem claims, up to `max_level`.
fn catch_all_filter(subsystems: &[String], max_level: Level) -> CatchAllFilter {
    let subsystems = subsystems.to_vec();
    FilterFn::new(Box::new(move |meta: &tracing::Metadata<'_>| {
        !subsystems.iter().any(|s| owns_target(meta.target(), s)) && *meta.level() <= max_level
    }))
}

// -------- rotating file sinks --------

type SharedRotate = Arc<Mutex<FileRotate<AppendCount>>>;

#[derive(Clone)]
struct FileSink(SharedRotate);

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.0.lock() {
            Ok(mut f) => f.write(buf),
            // a panicked writer must not take logging down with it
            Err(poisoned) => poisoned.into_inner().write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.0.lock() {
            Ok(mut f) => f.flush(),
            Err(poisoned) => poisoned.into_inner().flush(),
        }
    }
}

/// Writer that silently drops records when no file is routed.
struct MaybeSink(Option<FileSink>);

impl Write for MaybeSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.0 {
            Some(s) => s.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.0 {
            Some(s) => s.flush(),
            None => Ok(()),
        }
    }
}

/// Routes each record to the file of the subsystem owning its target,
/// falling back to the `default` file.
#[derive(Clone, Default)]
struct FileRouter {
    fallback: Option<FileSink>,
    by_subsystem: HashMap<String, FileSink>,
}

impl FileRouter {
    fn route(&self, target: &str) -> Option<FileSink> {
        self.by_subsystem
            .iter()
            .find(|(name, _)| owns_target(target, name))
            .map(|(_, sink)| sink.clone())
            .or_else(|| self.fallback.clone())
    }

    fn is_empty(&self) -> bool {
        self.fallback.is_none() && self.by_subsystem.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = MaybeSink;

    fn make_writer(&'a self) -> Self::Writer {
        MaybeSink(self.fallback.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        MaybeSink(self.route(meta.target()))
    }
}

/// Relative log paths live under the server home directory.
fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn open_sink(path: &Path, section: &Section) -> std::io::Result<FileSink> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) * 1024 * 1024;
    let keep = section.max_backups.unwrap_or(DEFAULT_MAX_BACKUPS);

    let rot = FileRotate::new(
        path,
        AppendCount::new(keep),
        ContentLimit::BytesSurpassed(max_bytes as usize),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(FileSink(Arc::new(Mutex::new(rot))))
}

fn sink_for(name: &str, section: &Section, base_dir: &Path) -> Option<FileSink> {
    if section.file.trim().is_empty() {
        return None;
    }
    let path = resolve_log_path(&section.file, base_dir);
    match open_sink(&path, section) {
        Ok(sink) => Some(sink),
        Err(e) => {
            // the subscriber is not installed yet
            eprintln!(
                "cannot open log file for '{name}' at {}: {e}",
                path.display()
            );
            None
        }
    }
}

/// Split view of a [`LoggingConfig`]: the catch-all section plus named subsystems.
struct Plan<'a> {
    fallback: Option<&'a Section>,
    subsystems: Vec<(&'a str, &'a Section)>,
}

impl<'a> Plan<'a> {
    fn new(cfg: &'a LoggingConfig) -> Self {
        let mut subsystems: Vec<_> = cfg
            .iter()
            .filter(|(k, _)| k.as_str() != DEFAULT_SECTION)
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        subsystems.sort_by_key(|(k, _)| *k);
        Self {
            fallback: cfg.get(DEFAULT_SECTION),
            subsystems,
        }
    }

    fn subsystem_names(&self) -> Vec<String> {
        self.subsystems.iter().map(|(n, _)| n.to_string()).collect()
    }

    fn console_targets(&self) -> Targets {
        self.subsystems
            .iter()
            .filter_map(|(n, s)| parse_level(&s.console_level).map(|l| (*n, l)))
            .fold(Targets::new().with_default(LevelFilter::OFF), |t, (n, l)| {
                t.with_target(n, LevelFilter::from_level(l))
            })
    }

    fn file_targets(&self) -> Targets {
        self.subsystems
            .iter()
            .filter(|(_, s)| !s.file.trim().is_empty())
            .filter_map(|(n, s)| parse_level(&s.file_level).map(|l| (*n, l)))
            .fold(Targets::new().with_default(LevelFilter::OFF), |t, (n, l)| {
                t.with_target(n, LevelFilter::from_level(l))
            })
    }

    fn file_router(&self, base_dir: &Path) -> FileRouter {
        FileRouter {
            fallback: self
                .fallback
                .and_then(|s| sink_for(DEFAULT_SECTION, s, base_dir)),
            by_subsystem: self
                .subsystems
                .iter()
                .filter_map(|(n, s)| sink_for(n, s, base_dir).map(|w| (n.to_string(), w)))
                .collect(),
        }
    }
}

/// Install the global subscriber described by `cfg`.
///
/// Console output is human readable; files receive JSON lines. Relative
/// file paths are resolved against `base_dir` (normally `server.home_dir`).
/// Calling this twice is harmless: the second install is ignored.
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    // bridge `log` records before the subscriber goes in
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        let _ = tracing_subscriber::fmt()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .try_init();
        return;
    }

    let plan = Plan::new(cfg);
    let names = plan.subsystem_names();
    let router = plan.file_router(base_dir);
    let ansi = atty::is(atty::Stream::Stdout);

    let console_named = fmt::layer()
        .with_ansi(ansi)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(plan.console_targets());

    let console_rest = plan
        .fallback
        .and_then(|s| parse_level(&s.console_level))
        .map(|level| {
            fmt::layer()
                .with_ansi(ansi)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_filter(catch_all_filter(&names, level))
        });

    let (file_named, file_rest) = if router.is_empty() {
        (None, None)
    } else {
        let named = fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(router.clone())
            .with_filter(plan.file_targets());

        let rest = plan
            .fallback
            .filter(|_| router.fallback.is_some())
            .and_then(|s| parse_level(&s.file_level))
            .map(|level| {
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_target(true)
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .with_writer(router.clone())
                    .with_filter(catch_all_filter(&names, level))
            });
        (Some(named), rest)
    };

    let _ = Registry::default()
        .with(console_named)
        .with(console_rest)
        .with(file_named)
        .with(file_rest)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_logging_config, AppConfig};
    use std::fs;
    use tempfile::tempdir;

    fn section(file: &str) -> Section {
        Section {
            console_level: "info".into(),
            file: file.into(),
            file_level: "debug".into(),
            max_backups: Some(2),
            max_size_mb: Some(1),
        }
    }

    #[test]
    fn level_parsing() {
        assert_eq!(parse_level("trace"), Some(Level::TRACE));
        assert_eq!(parse_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_level(" Warning "), Some(Level::WARN));
        assert_eq!(parse_level("off"), None);
        assert_eq!(parse_level(""), None);
        assert_eq!(parse_level("chatty"), Some(Level::INFO));
    }

    #[test]
    fn target_ownership_respects_module_boundaries() {
        assert!(owns_target("profile", "profile"));
        assert!(owns_target("profile::domain::service", "profile"));
        assert!(!owns_target("profile_server", "profile"));
        assert!(!owns_target("api_ingress", "profile"));
    }

    #[test]
    fn plan_separates_default_from_subsystems() {
        let mut cfg = default_logging_config();
        cfg.insert("profile".into(), section("logs/profile.log"));
        cfg.insert("api_ingress".into(), section(""));

        let plan = Plan::new(&cfg);
        assert!(plan.fallback.is_some());
        assert_eq!(plan.subsystem_names(), vec!["api_ingress", "profile"]);
    }

    #[test]
    fn router_prefers_subsystem_file_over_default() {
        let tmp = tempdir().unwrap();
        let mut cfg = default_logging_config();
        cfg.insert("profile".into(), section("logs/profile.log"));
        cfg.insert("api_ingress".into(), section(""));

        let router = Plan::new(&cfg).file_router(tmp.path());
        assert!(router.fallback.is_some());
        assert_eq!(router.by_subsystem.len(), 1);

        let routed = router.route("profile::api::relay").unwrap();
        assert!(Arc::ptr_eq(&routed.0, &router.by_subsystem["profile"].0));

        let other = router.route("api_ingress").unwrap();
        assert!(Arc::ptr_eq(&other.0, &router.fallback.as_ref().unwrap().0));
    }

    #[test]
    fn relative_paths_resolve_under_base_dir() {
        let tmp = tempdir().unwrap();
        let resolved = resolve_log_path("logs/test.log", tmp.path());
        assert!(resolved.starts_with(tmp.path()));
        assert!(resolved.ends_with("logs/test.log"));

        let abs = tmp.path().join("abs.log");
        assert_eq!(resolve_log_path(abs.to_str().unwrap(), Path::new("/elsewhere")), abs);
    }

    #[test]
    fn opening_a_sink_creates_parent_dirs_and_writes() {
        let tmp = tempdir().unwrap();
        let p = tmp.path().join("nested/dir/app.log");

        let mut sink = open_sink(&p, &section("unused")).unwrap();
        sink.write_all(b"hello\n").unwrap();
        sink.flush().unwrap();

        assert!(p.parent().unwrap().exists());
        assert_eq!(fs::read_to_string(&p).unwrap(), "hello\n");
    }

    #[test]
    fn config_file_logging_section_resolves_against_home_dir() {
        let tmp = tempdir().unwrap();
        let config_path = tmp.path().join("cfg.yaml");
        let home = tmp.path().join("home").to_string_lossy().replace('\\', "/");

        let yaml = format!(
            r#"
server:
  home_dir: "{home}"
  host: "127.0.0.1"
  port: 5000

logging:
  default:
    console_level: info
    file: ""
    file_level: debug
  profile:
    console_level: debug
    file: "logs/profile.log"
    file_level: warn
    max_size_mb: 5
    max_backups: 2
"#
        );
        fs::write(&config_path, yaml).unwrap();

        let config = AppConfig::load_layered(&config_path).unwrap();
        let logging = config.logging.as_ref().unwrap();
        let router = Plan::new(logging).file_router(Path::new(&config.server.home_dir));

        assert!(router.fallback.is_none());
        assert!(router.by_subsystem.contains_key("profile"));
        assert!(Path::new(&config.server.home_dir).join("logs").is_dir());
    }
}
