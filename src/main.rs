pub mod api;
pub mod config;
pub mod db {
    pub mod enums;
    pub mod models;
    pub mod store;
}
pub mod error;
pub mod schema;
pub mod services {
    pub mod accounts;
    pub mod activity;
    pub mod aggregation;
    pub mod ingest;
    pub mod reports;
    pub mod sample_data;
    pub mod settings;
}

use crate::api::{AppState, DbPool};
use crate::config::Config;
use crate::services::{accounts, sample_data};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::ffi::OsString;
use std::path::PathBuf;

const USAGE: &str = "\
usage: water-monitor [--env-file PATH]

Settings come from the process environment, then from PATH (default ./.env):
  DATABASE_URL        PostgreSQL connection string
  BIND_ADDR           listen address, e.g. 0.0.0.0:8000
  DB_POOL_SIZE        pooled database connections
  SEED_SAMPLE_DATA    seed demo zones and readings into an empty database
  ADMIN_USERNAME      account created when no users exist
  ADMIN_TOKEN         bearer token for that account (generated when unset)
  ORGANIZATION_EMAIL  contact address for the default settings
  RUST_LOG            log filter (default: info)";

#[derive(Debug, PartialEq)]
enum Command {
    Serve { env_file: Option<PathBuf> },
    Help,
}

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
    applied: usize,
}

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

fn apply_database_migrations(conn: &mut PgConnection) -> Result<(), String> {
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) => {
            if applied.is_empty() {
                info!("Database schema is up to date; no migrations were applied");
            } else {
                let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                info!("Applied {} database migration(s): {}", applied.len(), names);
            }
            Ok(())
        }
        Err(e) => Err(format!("Applying database migrations failed: {}", e)),
    }
}

fn prepare_database(cfg: &Config) -> Result<DbPool, String> {
    let manager = ConnectionManager::<PgConnection>::new(&cfg.database_url);
    let pool = Pool::builder()
        .max_size(cfg.db_pool_size.get())
        .build(manager)
        .map_err(|e| format!("DB connection failed: {}", e))?;
    info!("Connected to database ({})", cfg.redacted_database_url());

    let mut conn = pool.get().map_err(|e| format!("DB connection failed: {}", e))?;
    apply_database_migrations(&mut conn)?;

    match accounts::ensure_admin(&mut conn, &cfg.admin_username, cfg.admin_token.clone())
        .map_err(|e| format!("Bootstrapping admin account failed: {}", e))?
    {
        Some(registration) if cfg.admin_token.is_none() => warn!(
            "Admin token for '{}' (shown once, store it now): {}",
            registration.user.username, registration.token
        ),
        Some(registration) => info!("Admin '{}' uses the token from ADMIN_TOKEN", registration.user.username),
        None => {}
    }

    if cfg.seed_sample_data {
        info!("Seeding sample data");
        sample_data::run(&mut conn, &cfg.settings_defaults())?;
    }

    Ok(pool)
}

pub fn run() -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (bind_addr={}, db_pool_size={}, seed_sample_data={}, admin_username={})",
        cfg.bind_addr,
        cfg.db_pool_size,
        cfg.seed_sample_data,
        cfg.admin_username
    );

    // 2) Connect DB, apply migrations, bootstrap accounts
    let pool = prepare_database(&cfg)?;

    // 3) Serve the API
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Starting async runtime failed: {}", e))?;
    runtime.block_on(serve(AppState::new(pool, cfg)))
}

async fn serve(state: AppState) -> Result<(), String> {
    let bind_addr = state.config.bind_addr;
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| format!("Binding {} failed: {}", bind_addr, e))?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("HTTP server failed: {}", e))?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received; draining connections");
}

fn parse_args<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter();
    let mut env_file = None;

    while let Some(arg) = args.next() {
        let path = match arg.to_str() {
            Some("-h" | "--help") => return Ok(Command::Help),
            Some("--env-file") => args
                .next()
                .map(PathBuf::from)
                .ok_or_else(|| "`--env-file` needs a path".to_string())?,
            Some(other) => match other.strip_prefix("--env-file=") {
                Some("") => return Err("`--env-file` needs a path".to_string()),
                Some(path) => PathBuf::from(path),
                None => return Err(format!("unrecognised argument: {} (see --help)", other)),
            },
            None => return Err("argument contains invalid UTF-8".to_string()),
        };
        if env_file.replace(path).is_some() {
            return Err("`--env-file` given more than once".to_string());
        }
    }

    Ok(Command::Serve { env_file })
}

/// Applies `env_file`, or `./.env` when none was given and one exists.
/// Variables already present in the process environment are left alone.
fn load_env(env_file: Option<PathBuf>) -> Result<Option<LoadedEnvFile>, String> {
    let (path, explicit) = match env_file {
        Some(path) if path.is_file() => (path, true),
        Some(path) => return Err(format!("env file not found: {}", path.display())),
        None => {
            let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
            let path = cwd.join(".env");
            if !path.is_file() {
                return Ok(None);
            }
            (path, false)
        }
    };

    let contents = std::fs::read_to_string(&path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    let assignments = parse_env_file(&contents).map_err(|e| format!("{}:{}", path.display(), e))?;

    let mut applied = 0;
    for (key, value) in assignments {
        if std::env::var_os(&key).is_none() {
            // Updating process-level environment variables is unsafe on some targets.
            unsafe {
                std::env::set_var(&key, value);
            }
            applied += 1;
        }
    }

    Ok(Some(LoadedEnvFile { path, explicit, applied }))
}

/// Errors are prefixed with the 1-based line number.
fn parse_env_file(contents: &str) -> Result<Vec<(String, String)>, String> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            parse_env_assignment(line)
                .map_err(|e| format!("{}: {}", index + 1, e))
                .transpose()
        })
        .collect()
}

fn parse_env_assignment(line: &str) -> Result<Option<(String, String)>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
    let (key, raw) = line
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=value, got `{}`", line))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("missing variable name before '='".to_string());
    }
    if key.contains(char::is_whitespace) {
        return Err(format!("variable name contains whitespace: {}", key));
    }

    Ok(Some((key.to_string(), parse_env_value(raw.trim())?)))
}

fn parse_env_value(raw: &str) -> Result<String, String> {
    match raw.chars().next() {
        Some(quote @ ('"' | '\'')) => parse_quoted(&raw[1..], quote),
        _ => Ok(raw.split('#').next().unwrap_or_default().trim_end().to_string()),
    }
}

/// Double quotes understand `\n`, `\r`, `\t` and backslash escapes; single quotes are literal.
fn parse_quoted(input: &str, quote: char) -> Result<String, String> {
    let mut value = String::new();
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if quote == '"' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| "unterminated escape sequence".to_string())?;
                value.push(match escaped {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    other => other,
                });
            }
            c if c == quote => {
                let rest = chars.as_str().trim();
                return if rest.is_empty() || rest.starts_with('#') {
                    Ok(value)
                } else {
                    Err(format!("unexpected text after closing {}: {}", quote, rest))
                };
            }
            other => value.push(other),
        }
    }

    Err(format!("missing closing {}", quote))
}

fn main() {
    let loaded_env = match parse_args(std::env::args_os().skip(1)) {
        Ok(Command::Help) => {
            println!("{}", USAGE);
            return;
        }
        Ok(Command::Serve { env_file }) => load_env(env_file),
        Err(e) => Err(e),
    };
    let loaded_env = match loaded_env {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "--env-file" } else { "default .env" };
        info!(
            "Applied {} variable(s) from {} {}",
            info.applied,
            origin,
            info.path.display()
        );
    }

    info!(
        "water-monitor {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run() {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(key: &str, value: &str) -> Option<(String, String)> {
        Some((key.to_string(), value.to_string()))
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        assert_eq!(parse_env_assignment(""), Ok(None));
        assert_eq!(parse_env_assignment("   "), Ok(None));
        assert_eq!(parse_env_assignment("# DATABASE_URL=postgres://x"), Ok(None));
    }

    #[test]
    fn parses_plain_and_exported_values() {
        assert_eq!(parse_env_assignment("BIND_ADDR=0.0.0.0:8000"), Ok(pair("BIND_ADDR", "0.0.0.0:8000")));
        assert_eq!(
            parse_env_assignment("export  DB_POOL_SIZE = 4 # per worker"),
            Ok(pair("DB_POOL_SIZE", "4"))
        );
        assert_eq!(parse_env_assignment("ADMIN_TOKEN="), Ok(pair("ADMIN_TOKEN", "")));
    }

    #[test]
    fn parses_quoted_values() {
        assert_eq!(
            parse_env_assignment(r#"ORGANIZATION_EMAIL="ops@example.com" # contact"#),
            Ok(pair("ORGANIZATION_EMAIL", "ops@example.com"))
        );
        assert_eq!(
            parse_env_assignment(r#"GREETING="line\nnext \"quoted\"""#),
            Ok(pair("GREETING", "line\nnext \"quoted\""))
        );
        assert_eq!(
            parse_env_assignment("RUST_LOG='info,water_monitor=debug # not a comment'"),
            Ok(pair("RUST_LOG", "info,water_monitor=debug # not a comment"))
        );
    }

    fn args(list: &[&str]) -> Result<Command, String> {
        parse_args(list.iter().map(OsString::from))
    }

    #[test]
    fn reads_env_file_flag_in_both_forms() {
        assert_eq!(args(&[]), Ok(Command::Serve { env_file: None }));
        assert_eq!(
            args(&["--env-file", "deploy/water.env"]),
            Ok(Command::Serve {
                env_file: Some(PathBuf::from("deploy/water.env"))
            })
        );
        assert_eq!(
            args(&["--env-file=.env.staging"]),
            Ok(Command::Serve {
                env_file: Some(PathBuf::from(".env.staging"))
            })
        );
        assert_eq!(args(&["--help"]), Ok(Command::Help));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(args(&["--env-file"]).is_err());
        assert!(args(&["--env-file="]).is_err());
        assert!(args(&["--env-file", "a.env", "--env-file=b.env"]).is_err());
        assert!(args(&["--seed"]).is_err());
    }

    #[test]
    fn env_file_errors_carry_line_numbers() {
        let contents = "# water-monitor\nDATABASE_URL=postgres://db/water\n\nADMIN_USERNAME='ops'\n";
        assert_eq!(
            parse_env_file(contents),
            Ok(vec![
                ("DATABASE_URL".to_string(), "postgres://db/water".to_string()),
                ("ADMIN_USERNAME".to_string(), "ops".to_string()),
            ])
        );

        let err = parse_env_file("BIND_ADDR=0.0.0.0:8000\nSEED_SAMPLE_DATA\n").unwrap_err();
        assert!(err.starts_with("2: "), "{}", err);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_env_assignment("JUST_A_NAME").is_err());
        assert!(parse_env_assignment("=value").is_err());
        assert!(parse_env_assignment("BAD NAME=1").is_err());
        assert!(parse_env_assignment(r#"OPEN="unterminated"#).is_err());
        assert!(parse_env_assignment(r#"TRAILING="ok" junk"#).is_err());
        assert!(parse_env_assignment("SINGLE='open").is_err());
    }
}
