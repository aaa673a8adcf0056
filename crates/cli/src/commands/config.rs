use std::env;
use std::fs;
use std::path::Path;

use quotedesk_core::config::{detect_config_path, AppConfig, LoadOptions};
use quotedesk_core::session::Role;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: Option<&str>| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", Some("QUOTEDESK_DATABASE_URL")),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", Some("QUOTEDESK_DATABASE_MAX_CONNECTIONS")),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", Some("QUOTEDESK_DATABASE_TIMEOUT_SECS")),
    ));

    lines.push(render_line(
        "pricing.buffer_percentage",
        &config.pricing.buffer_percentage.to_string(),
        source("pricing.buffer_percentage", Some("QUOTEDESK_PRICING_BUFFER_PERCENTAGE")),
    ));
    lines.push(render_line(
        "pricing.default_markup_percentage",
        &config.pricing.default_markup_percentage.to_string(),
        source(
            "pricing.default_markup_percentage",
            Some("QUOTEDESK_PRICING_DEFAULT_MARKUP_PERCENTAGE"),
        ),
    ));
    lines.push(render_line(
        "pricing.default_exchange_rate",
        &config.pricing.default_exchange_rate.to_string(),
        source("pricing.default_exchange_rate", Some("QUOTEDESK_PRICING_DEFAULT_EXCHANGE_RATE")),
    ));
    lines.push(render_line(
        "pricing.default_currency",
        config.pricing.default_currency.code(),
        source("pricing.default_currency", Some("QUOTEDESK_PRICING_DEFAULT_CURRENCY")),
    ));

    lines.push(render_line(
        "reporting.top_n",
        &config.reporting.top_n.to_string(),
        source("reporting.top_n", Some("QUOTEDESK_REPORTING_TOP_N")),
    ));
    lines.push(render_line(
        "reporting.profit_basis",
        &config.reporting.profit_basis.to_string(),
        source("reporting.profit_basis", Some("QUOTEDESK_REPORTING_PROFIT_BASIS")),
    ));

    for role in [Role::Agent, Role::Customer] {
        let fields = config
            .visibility
            .fields_for(role)
            .map(|fields| fields.iter().map(|field| field.as_str()).collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        let key_path = format!("visibility.{role}");
        lines.push(render_line(&key_path, &format!("[{fields}]"), source(&key_path, None)));
    }

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", Some("QUOTEDESK_LOGGING_LEVEL")),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", Some("QUOTEDESK_LOGGING_FORMAT")),
    ));

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
