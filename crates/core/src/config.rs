use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpq::pricing::PricingPolicy;
use crate::domain::quote::Currency;
use crate::reporting::{ProfitBasis, ReportingPolicy};
use crate::session::{ProductField, Role, VisibilityPolicy};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub pricing: PricingConfig,
    pub reporting: ReportingConfig,
    pub visibility: VisibilityPolicy,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub buffer_percentage: Decimal,
    pub default_markup_percentage: Decimal,
    pub default_exchange_rate: Decimal,
    pub default_currency: Currency,
}

#[derive(Clone, Debug)]
pub struct ReportingConfig {
    pub top_n: usize,
    pub profit_basis: ProfitBasis,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub buffer_percentage: Option<Decimal>,
    pub profit_basis: Option<ProfitBasis>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://quotedesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            pricing: PricingConfig {
                buffer_percentage: PricingPolicy::default().buffer_percentage,
                default_markup_percentage: Decimal::new(15, 0),
                default_exchange_rate: Decimal::new(72, 1),
                default_currency: Currency::Usd,
            },
            reporting: ReportingConfig { top_n: 5, profit_basis: ProfitBasis::LiveCatalog },
            visibility: VisibilityPolicy::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("quotedesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy { buffer_percentage: self.pricing.buffer_percentage }
    }

    pub fn reporting_policy(&self) -> ReportingPolicy {
        ReportingPolicy { top_n: self.reporting.top_n, profit_basis: self.reporting.profit_basis }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(buffer_percentage) = pricing.buffer_percentage {
                self.pricing.buffer_percentage = buffer_percentage;
            }
            if let Some(default_markup_percentage) = pricing.default_markup_percentage {
                self.pricing.default_markup_percentage = default_markup_percentage;
            }
            if let Some(default_exchange_rate) = pricing.default_exchange_rate {
                self.pricing.default_exchange_rate = default_exchange_rate;
            }
            if let Some(default_currency) = pricing.default_currency {
                self.pricing.default_currency = default_currency;
            }
        }

        if let Some(reporting) = patch.reporting {
            if let Some(top_n) = reporting.top_n {
                self.reporting.top_n = top_n;
            }
            if let Some(profit_basis) = reporting.profit_basis {
                self.reporting.profit_basis = profit_basis;
            }
        }

        if let Some(visibility) = patch.visibility {
            for (role, fields) in visibility {
                let role = role
                    .parse::<Role>()
                    .map_err(|error| ConfigError::Validation(format!("visibility: {error}")))?;
                let fields = fields
                    .iter()
                    .map(|field| field.parse::<ProductField>())
                    .collect::<Result<BTreeSet<_>, _>>()
                    .map_err(|error| {
                        ConfigError::Validation(format!("visibility.{role}: {error}"))
                    })?;
                self.visibility.set_fields(role, fields);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("QUOTEDESK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("QUOTEDESK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("QUOTEDESK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("QUOTEDESK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("QUOTEDESK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("QUOTEDESK_PRICING_BUFFER_PERCENTAGE") {
            self.pricing.buffer_percentage =
                parse_env("QUOTEDESK_PRICING_BUFFER_PERCENTAGE", &value)?;
        }
        if let Some(value) = read_env("QUOTEDESK_PRICING_DEFAULT_MARKUP_PERCENTAGE") {
            self.pricing.default_markup_percentage =
                parse_env("QUOTEDESK_PRICING_DEFAULT_MARKUP_PERCENTAGE", &value)?;
        }
        if let Some(value) = read_env("QUOTEDESK_PRICING_DEFAULT_EXCHANGE_RATE") {
            self.pricing.default_exchange_rate =
                parse_env("QUOTEDESK_PRICING_DEFAULT_EXCHANGE_RATE", &value)?;
        }
        if let Some(value) = read_env("QUOTEDESK_PRICING_DEFAULT_CURRENCY") {
            self.pricing.default_currency = parse_env("QUOTEDESK_PRICING_DEFAULT_CURRENCY", &value)?;
        }

        if let Some(value) = read_env("QUOTEDESK_REPORTING_TOP_N") {
            self.reporting.top_n = parse_env("QUOTEDESK_REPORTING_TOP_N", &value)?;
        }
        if let Some(value) = read_env("QUOTEDESK_REPORTING_PROFIT_BASIS") {
            self.reporting.profit_basis = parse_env("QUOTEDESK_REPORTING_PROFIT_BASIS", &value)?;
        }

        let log_level =
            read_env("QUOTEDESK_LOGGING_LEVEL").or_else(|| read_env("QUOTEDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("QUOTEDESK_LOGGING_FORMAT").or_else(|| read_env("QUOTEDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(buffer_percentage) = overrides.buffer_percentage {
            self.pricing.buffer_percentage = buffer_percentage;
        }
        if let Some(profit_basis) = overrides.profit_basis {
            self.reporting.profit_basis = profit_basis;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_pricing(&self.pricing)?;
        validate_reporting(&self.reporting)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("quotedesk.toml"), PathBuf::from("config/quotedesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

pub fn detect_config_path() -> Option<PathBuf> {
    resolve_config_path(None)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if pricing.buffer_percentage < Decimal::ZERO || pricing.buffer_percentage >= Decimal::ONE_HUNDRED
    {
        return Err(ConfigError::Validation(
            "pricing.buffer_percentage must be in range 0..100".to_string(),
        ));
    }

    if pricing.default_exchange_rate <= Decimal::ZERO {
        return Err(ConfigError::Validation(
            "pricing.default_exchange_rate must be greater than zero".to_string(),
        ));
    }

    if pricing.default_markup_percentage <= -Decimal::ONE_HUNDRED {
        return Err(ConfigError::Validation(
            "pricing.default_markup_percentage must be greater than -100".to_string(),
        ));
    }

    Ok(())
}

fn validate_reporting(reporting: &ReportingConfig) -> Result<(), ConfigError> {
    if reporting.top_n == 0 {
        return Err(ConfigError::Validation(
            "reporting.top_n must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    pricing: Option<PricingPatch>,
    reporting: Option<ReportingPatch>,
    visibility: Option<BTreeMap<String, Vec<String>>>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    buffer_percentage: Option<Decimal>,
    default_markup_percentage: Option<Decimal>,
    default_exchange_rate: Option<Decimal>,
    default_currency: Option<Currency>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportingPatch {
    top_n: Option<usize>,
    profit_basis: Option<ProfitBasis>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::domain::quote::Currency;
    use crate::reporting::ProfitBasis;
    use crate::session::{ProductField, Role};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn write_config(dir: &TempDir, contents: &str) -> Result<std::path::PathBuf, String> {
        let path = dir.path().join("quotedesk.toml");
        fs::write(&path, contents).map_err(|err| err.to_string())?;
        Ok(path)
    }

    #[test]
    fn defaults_match_quote_builder_policy() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.pricing.buffer_percentage == Decimal::new(3, 0), "default buffer is 3%")?;
        ensure(
            config.pricing.default_markup_percentage == Decimal::new(15, 0),
            "default markup is 15%",
        )?;
        ensure(config.pricing.default_currency == Currency::Usd, "default currency is USD")?;
        ensure(config.reporting.top_n == 5, "default top_n is 5")?;
        ensure(
            config.reporting.profit_basis == ProfitBasis::LiveCatalog,
            "profit follows the live catalog by default",
        )?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "compact logging by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_QUOTEDESK_DB", "sqlite://interpolated.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[database]
url = "${TEST_QUOTEDESK_DB}"

[pricing]
buffer_percentage = "4.5"
default_currency = "EUR"
"#,
            )?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://interpolated.db",
                "database url should be interpolated from environment",
            )?;
            ensure(
                config.pricing_policy().buffer_percentage == Decimal::new(45, 1),
                "buffer percentage should come from the file",
            )?;
            ensure(config.pricing.default_currency == Currency::Eur, "currency from file")
        })();

        clear_vars(&["TEST_QUOTEDESK_DB"]);
        result
    }

    #[test]
    fn visibility_section_replaces_role_fields() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(
            &dir,
            r#"
[visibility]
customer = ["name", "specifications"]
"#,
        )?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;

        ensure(
            !config.visibility.allows(Role::Customer, ProductField::QuotationBase),
            "customer fields should be replaced by the file",
        )?;
        ensure(
            config.visibility.allows(Role::Agent, ProductField::RealCost),
            "agent fields keep their default",
        )
    }

    #[test]
    fn unknown_visibility_field_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(
            &dir,
            r#"
[visibility]
customer = ["name", "margin"]
"#,
        )?;

        match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() }) {
            Ok(_) => Err("expected visibility validation failure".to_string()),
            Err(error) => ensure(
                matches!(error, ConfigError::Validation(ref message) if message.contains("margin")),
                "validation failure should name the unknown field",
            ),
        }
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QUOTEDESK_LOG_LEVEL", "warn");
        env::set_var("QUOTEDESK_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["QUOTEDESK_LOG_LEVEL", "QUOTEDESK_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QUOTEDESK_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("QUOTEDESK_REPORTING_TOP_N", "10");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[database]
url = "sqlite://from-file.db"

[reporting]
top_n = 3
profit_basis = "live_catalog"

[logging]
level = "warn"
"#,
            )?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    profit_basis: Some(ProfitBasis::Snapshot),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.reporting.top_n == 10, "env top_n should win over file")?;
            ensure(
                config.reporting_policy().profit_basis == ProfitBasis::Snapshot,
                "override profit basis should win",
            )
        })();

        clear_vars(&["QUOTEDESK_DATABASE_URL", "QUOTEDESK_REPORTING_TOP_N"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QUOTEDESK_PRICING_BUFFER_PERCENTAGE", "150");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("pricing.buffer_percentage")
            );
            ensure(has_message, "validation failure should mention pricing.buffer_percentage")
        })();

        clear_vars(&["QUOTEDESK_PRICING_BUFFER_PERCENTAGE"]);
        result
    }

    #[test]
    fn malformed_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QUOTEDESK_REPORTING_TOP_N", "many");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected env override failure".to_string()),
            Err(error) => ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "QUOTEDESK_REPORTING_TOP_N"),
                "error should name the offending variable",
            ),
        };

        clear_vars(&["QUOTEDESK_REPORTING_TOP_N"]);
        result
    }
}
