//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroUsize, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{CliArgs, Command, NextDueArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "fleetdesk";
const ENV_PREFIX: &str = "FLEETDESK";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CACHE_MAX_ENTRIES: u64 = 2_000;
const DEFAULT_CACHE_TTL_SECS: u64 = 120;
const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_CACHE_SWEEP_SECS: u64 = 60;
const DEFAULT_SCHEDULER_CADENCE_SECS: u64 = 300;
const DEFAULT_MAINTENANCE_LEAD_DAYS: u32 = 14;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub scheduler: SchedulerSettings,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub max_entries: NonZeroUsize,
    pub default_ttl: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub cadence: Duration,
    pub maintenance_lead_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRole {
    Admin,
    Staff,
}

impl TokenRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
        }
    }
}

/// A bearer token configured as `user_id:secret`.
#[derive(Clone)]
pub struct ApiToken {
    pub user_id: String,
    pub secret: String,
    pub role: TokenRole,
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiToken")
            .field("user_id", &self.user_id)
            .field("secret", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub tokens: Vec<ApiToken>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("auth.admin_tokens")
            .with_list_parse_key("auth.staff_tokens"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::NextDue(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    scheduler: RawSchedulerSettings,
    auth: RawAuthSettings,
}

impl RawSettings {
    /// CLI flags win over every file and environment source.
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        overlay(&mut self.server.host, &overrides.server_host);
        overlay(&mut self.server.port, &overrides.server_port);
        overlay(
            &mut self.server.graceful_shutdown_seconds,
            &overrides.server_graceful_shutdown_seconds,
        );
        overlay(&mut self.logging.level, &overrides.log_level);
        overlay(&mut self.logging.json, &overrides.log_json);
        overlay(&mut self.cache.enabled, &overrides.cache_enabled);
        overlay(&mut self.cache.max_entries, &overrides.cache_max_entries);
        overlay(
            &mut self.cache.default_ttl_seconds,
            &overrides.cache_default_ttl_seconds,
        );
        overlay(
            &mut self.scheduler.cadence_seconds,
            &overrides.scheduler_cadence_seconds,
        );
    }
}

fn overlay<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            scheduler,
            auth,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;
        let scheduler = build_scheduler_settings(scheduler)?;
        let auth = build_auth_settings(auth)?;

        Ok(Self {
            server,
            logging,
            cache,
            scheduler,
            auth,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let max_entries_value = cache.max_entries.unwrap_or(DEFAULT_CACHE_MAX_ENTRIES);
    let max_entries = usize::try_from(max_entries_value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            LoadError::invalid("cache.max_entries", "must be between 1 and usize::MAX")
        })?;

    let default_ttl_seconds = cache.default_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if default_ttl_seconds > MAX_CACHE_TTL_SECS {
        return Err(LoadError::invalid(
            "cache.default_ttl_seconds",
            format!("must not exceed {MAX_CACHE_TTL_SECS}"),
        ));
    }
    let default_ttl = positive_seconds(default_ttl_seconds, "cache.default_ttl_seconds")?;
    let sweep_interval = positive_seconds(
        cache
            .sweep_interval_seconds
            .unwrap_or(DEFAULT_CACHE_SWEEP_SECS),
        "cache.sweep_interval_seconds",
    )?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        max_entries,
        default_ttl,
        sweep_interval,
    })
}

fn build_scheduler_settings(
    scheduler: RawSchedulerSettings,
) -> Result<SchedulerSettings, LoadError> {
    let cadence = positive_seconds(
        scheduler
            .cadence_seconds
            .unwrap_or(DEFAULT_SCHEDULER_CADENCE_SECS),
        "scheduler.cadence_seconds",
    )?;

    Ok(SchedulerSettings {
        cadence,
        maintenance_lead_days: scheduler
            .maintenance_lead_days
            .unwrap_or(DEFAULT_MAINTENANCE_LEAD_DAYS),
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let mut tokens = Vec::new();
    for entry in auth.admin_tokens.unwrap_or_default() {
        tokens.push(parse_token(&entry, TokenRole::Admin, "auth.admin_tokens")?);
    }
    for entry in auth.staff_tokens.unwrap_or_default() {
        tokens.push(parse_token(&entry, TokenRole::Staff, "auth.staff_tokens")?);
    }
    Ok(AuthSettings { tokens })
}

fn parse_token(entry: &str, role: TokenRole, key: &'static str) -> Result<ApiToken, LoadError> {
    let (user_id, secret) = entry
        .trim()
        .split_once(':')
        .ok_or_else(|| LoadError::invalid(key, "entries must look like `user_id:secret`"))?;
    let (user_id, secret) = (user_id.trim(), secret.trim());
    if user_id.is_empty() || secret.is_empty() {
        return Err(LoadError::invalid(
            key,
            "user id and secret must not be empty",
        ));
    }
    Ok(ApiToken {
        user_id: user_id.to_string(),
        secret: secret.to_string(),
        role,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    max_entries: Option<u64>,
    default_ttl_seconds: Option<u64>,
    sweep_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSchedulerSettings {
    cadence_seconds: Option<u64>,
    maintenance_lead_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    admin_tokens: Option<Vec<String>>,
    staff_tokens: Option<Vec<String>>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::domain::recurrence::IntervalKind;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.max_entries.get(), 2_000);
        assert_eq!(settings.cache.default_ttl, Duration::from_secs(120));
        assert_eq!(settings.scheduler.maintenance_lead_days, 14);
        assert!(settings.auth.tokens.is_empty());
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());
        raw.cache.max_entries = Some(50);

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            cache_max_entries: Some(10),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert_eq!(settings.cache.max_entries.get(), 10);
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn oversized_cache_ttl_is_rejected() {
        let mut raw = RawSettings::default();
        raw.cache.default_ttl_seconds = Some(1_000_000_000_000);

        let err = Settings::from_raw(raw).expect_err("ttl above the cap");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "cache.default_ttl_seconds",
                ..
            }
        ));
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut raw = RawSettings::default();
        raw.cache.max_entries = Some(0);
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid {
                key: "cache.max_entries",
                ..
            })
        ));

        let mut raw = RawSettings::default();
        raw.cache.default_ttl_seconds = Some(0);
        assert!(Settings::from_raw(raw).is_err());

        let mut raw = RawSettings::default();
        raw.scheduler.cadence_seconds = Some(0);
        assert!(Settings::from_raw(raw).is_err());

        let mut raw = RawSettings::default();
        raw.server.port = Some(0);
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn environment_layer_overrides_file_defaults() {
        // SAFETY: serialised with every other test that touches the environment.
        unsafe {
            std::env::set_var("FLEETDESK__CACHE__MAX_ENTRIES", "77");
            std::env::set_var("FLEETDESK__AUTH__ADMIN_TOKENS", "ops:a1,lead:b2");
        }

        let cli = CliArgs::parse_from(["fleetdesk"]);
        let loaded = load(&cli);

        unsafe {
            std::env::remove_var("FLEETDESK__CACHE__MAX_ENTRIES");
            std::env::remove_var("FLEETDESK__AUTH__ADMIN_TOKENS");
        }

        let settings = loaded.expect("settings load");
        assert_eq!(settings.cache.max_entries.get(), 77);
        let admins: Vec<&str> = settings
            .auth
            .tokens
            .iter()
            .filter(|token| token.role == TokenRole::Admin)
            .map(|token| token.user_id.as_str())
            .collect();
        assert_eq!(admins, vec!["ops", "lead"]);
    }

    #[test]
    fn tokens_are_parsed_with_roles() {
        let mut raw = RawSettings::default();
        raw.auth.admin_tokens = Some(vec!["ops:s3cret".to_string()]);
        raw.auth.staff_tokens = Some(vec![" desk : t0ken ".to_string()]);

        let settings = Settings::from_raw(raw).expect("valid settings");
        let tokens = &settings.auth.tokens;

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].user_id, "ops");
        assert_eq!(tokens[0].role, TokenRole::Admin);
        assert_eq!(tokens[1].user_id, "desk");
        assert_eq!(tokens[1].secret, "t0ken");
        assert_eq!(tokens[1].role, TokenRole::Staff);
    }

    #[test]
    fn malformed_token_is_rejected() {
        let mut raw = RawSettings::default();
        raw.auth.admin_tokens = Some(vec!["no-separator".to_string()]);
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid {
                key: "auth.admin_tokens",
                ..
            })
        ));
    }

    #[test]
    fn token_debug_redacts_secret() {
        let token = ApiToken {
            user_id: "ops".to_string(),
            secret: "s3cret".to_string(),
            role: TokenRole::Admin,
        };
        assert!(!format!("{token:?}").contains("s3cret"));
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["fleetdesk"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "fleetdesk",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--cache-enabled",
            "false",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(serve.overrides.cache_enabled, Some(false));
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_next_due_arguments() {
        let args = CliArgs::parse_from([
            "fleetdesk",
            "next-due",
            "--anchor",
            "2024-01-31",
            "--interval",
            "monthly",
            "--count",
            "3",
        ]);

        match args.command.expect("next-due command") {
            Command::NextDue(next) => {
                assert_eq!(next.anchor, date!(2024 - 01 - 31));
                assert_eq!(next.interval, IntervalKind::Monthly);
                assert_eq!(next.days, None);
                assert_eq!(next.count, 3);
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn next_due_rejects_bad_dates() {
        let result = CliArgs::try_parse_from([
            "fleetdesk",
            "next-due",
            "--anchor",
            "2024-02-30",
            "--interval",
            "monthly",
        ]);
        assert!(result.is_err());
    }
}
