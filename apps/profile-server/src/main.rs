use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use runtime::{AppConfig, CliArgs, DatabaseConfig};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use api_ingress::{ApiIngress, ApiIngressConfig};
use modkit::{ModuleCtxBuilder, ModuleEntry, ModuleRegistry};
use profile::{config::ProfileConfig, ProfileModule};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const IN_MEMORY_DSN: &str = "sqlite::memory:";

// Adapter exposing the `modules` bag of AppConfig to modkit
struct ModkitConfigAdapter(Arc<AppConfig>);

impl modkit::ConfigProvider for ModkitConfigAdapter {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.0.modules.get(module_name)
    }
}

/// Expand a sqlite DSN into an absolute-path DSN using a base directory.
/// - Keeps in-memory DSNs as-is.
/// - Normalizes backslashes into forward slashes (important on Windows).
/// - Adds `mode=rwc` so a missing database file gets created.
fn absolutize_sqlite_dsn(dsn: &str, base_dir: &Path, create_dirs: bool) -> Result<String> {
    if dsn.eq_ignore_ascii_case(IN_MEMORY_DSN) || dsn.eq_ignore_ascii_case("sqlite://:memory:") {
        return Ok(IN_MEMORY_DSN.to_string());
    }
    let db_path = dsn
        .strip_prefix("sqlite://")
        .ok_or_else(|| anyhow!("DSN must start with sqlite:// (got: {})", dsn))?;

    let (path_str, query) = match db_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (db_path, None),
    };

    let mut p = PathBuf::from(path_str);
    if p.as_os_str().is_empty() {
        return Err(anyhow!("Empty SQLite path in DSN"));
    }
    if p.is_relative() {
        p = base_dir.join(p);
    }

    if create_dirs {
        if let Some(dir) = p.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create database dir {}", dir.display()))?;
        }
    }

    let mut out = String::from("sqlite://");
    out.push_str(&p.to_string_lossy().replace('\\', "/"));
    match query {
        Some(q) if q.contains("mode=") => {
            out.push('?');
            out.push_str(q);
        }
        Some(q) => {
            out.push('?');
            out.push_str(q);
            out.push_str("&mode=rwc");
        }
        None => out.push_str("?mode=rwc"),
    }
    Ok(out)
}

/// Profile Server - single-profile editor backend with a real-time change relay
#[derive(Parser)]
#[command(name = "profile-server")]
#[command(about = "Profile Server - single-profile editor backend with a real-time change relay")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use an in-memory SQLite database
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
        mock: cli.mock,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);
    apply_server_section(&mut config, args.port.is_some())?;

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let logging_config = config
        .logging
        .clone()
        .unwrap_or_else(runtime::default_logging_config);
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.server.home_dir));
    tracing::info!(home_dir = %config.server.home_dir, "Profile Server starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config, args).await,
        Commands::Check => check_config(&config),
    }
}

/// `server.host`/`server.port` feed the ingress bind address unless the
/// `api_ingress` section sets its own; `--port` always wins.
fn apply_server_section(config: &mut AppConfig, port_override: bool) -> Result<()> {
    let bind_addr = config.server.listen_addr();
    let timeout_sec = config.server.timeout_sec;

    let section = config
        .modules
        .entry("api_ingress".to_string())
        .or_insert_with(|| serde_json::json!({}));
    let obj = section
        .as_object_mut()
        .ok_or_else(|| anyhow!("modules.api_ingress must be a mapping"))?;

    if port_override || !obj.contains_key("bind_addr") {
        obj.insert("bind_addr".into(), serde_json::Value::String(bind_addr));
    }
    if timeout_sec > 0 && !obj.contains_key("request_timeout_secs") {
        obj.insert("request_timeout_secs".into(), timeout_sec.into());
    }
    Ok(())
}

/// Detect DB backend from URL scheme.
fn detect_from_dsn(cfg: &DatabaseConfig) -> Result<&'static str> {
    let raw = cfg.url.trim();
    if raw.is_empty() {
        return Err(anyhow!("Database URL not configured"));
    }
    if raw.eq_ignore_ascii_case(IN_MEMORY_DSN) {
        return Ok("sqlite");
    }

    let url = Url::parse(raw).map_err(|e| anyhow!("Invalid database DSN '{}': {}", raw, e))?;
    match url.scheme() {
        "sqlite" => Ok("sqlite"),
        "postgres" | "postgresql" => Ok("postgres"),
        other => Err(anyhow!("Unsupported database type: {}", other)),
    }
}

async fn connect_db(config: &AppConfig, args: &CliArgs) -> Result<DatabaseConnection> {
    let db_config = match (&config.database, args.mock) {
        // in-memory sqlite is per connection, so the pool holds exactly one
        (_, true) => DatabaseConfig {
            url: IN_MEMORY_DSN.to_string(),
            max_conns: Some(1),
            busy_timeout_ms: None,
        },
        (Some(db), false) => db.clone(),
        (None, false) => return Err(anyhow!("database section is required (or pass --mock)")),
    };
    let backend = detect_from_dsn(&db_config)?;

    let mut dsn = db_config.url.trim().to_owned();
    if dsn.starts_with("sqlite://") {
        dsn = absolutize_sqlite_dsn(&dsn, Path::new(&config.server.home_dir), true)?;
    }

    let mut opts = ConnectOptions::new(dsn.clone());
    opts.max_connections(db_config.max_conns.unwrap_or(10))
        .acquire_timeout(Duration::from_secs(5))
        .sqlx_logging(false);
    if let Some(ms) = db_config.busy_timeout_ms {
        opts.map_sqlx_sqlite_opts(move |o| o.busy_timeout(Duration::from_millis(u64::from(ms))));
    }

    tracing::info!(backend, dsn = %dsn, "Connecting to database");
    Database::connect(opts)
        .await
        .with_context(|| format!("cannot connect to database {dsn}"))
}

async fn run_server(config: AppConfig, args: CliArgs) -> Result<()> {
    tracing::info!("Initializing modules...");
    let cancel = CancellationToken::new();
    let home_dir = PathBuf::from(&config.server.home_dir);

    let db = connect_db(&config, &args).await?;
    let provider = Arc::new(ModkitConfigAdapter(Arc::new(config)));

    let ingress = Arc::new(ApiIngress::default());
    let profile = Arc::new(ProfileModule::default());
    let registry = ModuleRegistry::builder()
        .register(
            ModuleEntry::new("api_ingress", ingress.clone())
                .rest_host(ingress.clone())
                .stateful(ingress.clone()),
        )
        .register(
            ModuleEntry::new("profile", profile.clone())
                .deps(&["api_ingress"])
                .db(profile.clone())
                .rest(profile),
        )
        .build()?;

    let ctx = ModuleCtxBuilder::new(cancel.clone())
        .with_db(db.clone())
        .with_config_provider(provider)
        .with_home_dir(home_dir)
        .build();

    registry.run_init_phase(&ctx).await?;
    registry.run_db_phase(&db).await?;

    let openapi = utoipa::openapi::OpenApiBuilder::new()
        .info(
            utoipa::openapi::InfoBuilder::new()
                .title("Profile Server API")
                .version(env!("CARGO_PKG_VERSION"))
                .build(),
        )
        .build();
    registry.run_rest_phase(&ctx, axum::Router::new(), openapi)?;
    registry.run_start_phase(cancel.clone()).await?;

    if let Some(addr) = ingress.local_addr() {
        tracing::info!(%addr, "Profile Server ready");
    }

    modkit::shutdown::wait_for_shutdown().await?;
    cancel.cancel();
    registry.run_stop_phase(cancel).await;
    tracing::info!("Profile Server stopped");
    Ok(())
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    if let Some(db) = &config.database {
        let backend = detect_from_dsn(db)?;
        println!("Database backend: {backend}");
    }

    let ingress: ApiIngressConfig = config.module_config("api_ingress")?;
    ingress
        .bind_addr
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid bind address '{}'", ingress.bind_addr))?;

    let profile: ProfileConfig = config.module_config("profile")?;
    if !profile.api_prefix.is_empty() && !profile.api_prefix.starts_with('/') {
        return Err(anyhow!(
            "invalid profile api_prefix '{}': must start with '/'",
            profile.api_prefix
        ));
    }

    println!("Configuration check passed");
    println!("Listening address: {}", ingress.bind_addr);
    println!("Profile key: {} (routes under '{}')", profile.profile_key, profile.api_prefix);
    Ok(())
}
