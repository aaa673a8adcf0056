use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use quotedesk_cli::commands::{migrate, price, products, quotes, report, seed, transition};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("QUOTEDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_bad_override() {
    with_env(
        &[("QUOTEDESK_DATABASE_URL", "sqlite::memory:"), ("QUOTEDESK_REPORTING_TOP_N", "many")],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn non_sqlite_database_url_is_a_config_failure() {
    with_env(&[("QUOTEDESK_DATABASE_URL", "postgres://localhost/quotes")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = database_url(&dir);

    with_env(&[("QUOTEDESK_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["message"], "demo dataset loaded: 4 products, 5 quotes");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(second_payload["status"], "ok");
        assert_eq!(
            second_payload["message"],
            "catalog already populated; demo dataset left unchanged"
        );
    });
}

#[test]
fn seeded_database_supports_reporting_and_transitions() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = database_url(&dir);

    with_env(&[("QUOTEDESK_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let report = parse_payload(&report::run("all").output);
        assert_eq!(report["status"], "ok");
        assert_eq!(report["data"]["total_quotes"], 5);
        assert_eq!(report["data"]["counts"]["accepted"], 2);
        assert_eq!(report["data"]["total_products"], 4);

        // Quote 2 was seeded in the sent state.
        let accepted = transition::run(2, "accept");
        assert_eq!(accepted.exit_code, 0, "{}", accepted.output);
        assert_eq!(parse_payload(&accepted.output)["data"]["status"], "accepted");

        let report = parse_payload(&report::run("all").output);
        assert_eq!(report["data"]["counts"]["accepted"], 3);
        assert_eq!(report["data"]["counts"]["sent"], 0);
    });
}

#[test]
fn terminal_quotes_reject_further_transitions() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = database_url(&dir);

    with_env(&[("QUOTEDESK_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = transition::run(1, "send");
        assert_eq!(result.exit_code, 6);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_transition");

        let missing = transition::run(99, "send");
        assert_eq!(missing.exit_code, 6);
        assert_eq!(parse_payload(&missing.output)["error_class"], "referential_integrity");

        let unknown = transition::run(1, "archive");
        assert_eq!(unknown.exit_code, 6);
        assert_eq!(parse_payload(&unknown.output)["error_class"], "invalid_input");
    });
}

#[test]
fn price_saves_a_draft_quote_when_requested() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = database_url(&dir);
    let input = dir.path().join("quote.json");
    fs::write(
        &input,
        r#"{"customer_id":"new@buyer.example","currency":"EUR","exchange_rate":"7.85","lines":[{"product_id":2,"quantity":10}]}"#,
    )
    .expect("write input");

    with_env(&[("QUOTEDESK_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let preview = parse_payload(&price::run(&input, false).output);
        assert_eq!(preview["status"], "ok");
        assert_eq!(preview["data"]["quote_id"], Value::Null);
        assert_eq!(preview["data"]["currency"], "EUR");

        let saved = price::run(&input, true);
        assert_eq!(saved.exit_code, 0, "{}", saved.output);
        let saved = parse_payload(&saved.output);
        assert_eq!(saved["data"]["quote_id"], 6);
        assert_eq!(
            saved["data"]["total_customer_currency"],
            preview["data"]["total_customer_currency"]
        );

        let listed = parse_payload(&quotes::run("agent").output);
        assert_eq!(listed["data"]["quotes"].as_array().map(Vec::len), Some(6));
    });
}

#[test]
fn price_reports_unknown_products() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = database_url(&dir);
    let input = dir.path().join("quote.json");
    fs::write(&input, r#"{"customer_id":"a@b.example","lines":[{"product_id":40,"quantity":1}]}"#)
        .expect("write input");

    with_env(&[("QUOTEDESK_DATABASE_URL", url.as_str())], || {
        let result = price::run(&input, false);
        assert_eq!(result.exit_code, 6);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "referential_integrity");
        assert!(payload["correlation_id"].is_string());
        assert_eq!(payload["user_message"], "The referenced product or quote no longer exists.");

        // The failed run released its connections; the database stays usable.
        assert_eq!(seed::run().exit_code, 0);
    });
}

#[test]
fn out_of_range_amounts_fail_without_crashing() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = database_url(&dir);
    let input = dir.path().join("quote.json");
    fs::write(
        &input,
        r#"{"customer_id":"a@b.example","exchange_rate":"0.0000000000000000000000000001","lines":[{"product_id":1,"quantity":2}]}"#,
    )
    .expect("write input");

    with_env(&[("QUOTEDESK_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = price::run(&input, true);
        assert_eq!(result.exit_code, 6);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_input");
        assert!(payload["message"]
            .as_str()
            .is_some_and(|message| message.contains("amount exceeds supported range")));

        let listed = parse_payload(&quotes::run("agent").output);
        assert_eq!(listed["data"]["quotes"].as_array().map(Vec::len), Some(5));
    });
}

#[test]
fn customers_see_redacted_products_and_only_their_quotes() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = database_url(&dir);

    with_env(&[("QUOTEDESK_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let catalog = parse_payload(&products::run("customer", Some("lamp".to_string())).output);
        let views = catalog["data"].as_array().expect("product list");
        assert_eq!(views.len(), 1);
        assert_eq!(views[0]["name"], "Rattan Floor Lamp");
        assert!(views[0].get("real_cost_rmb").is_none());
        assert!(views[0].get("quotation_base_rmb").is_some());

        let listed = parse_payload(&quotes::run("customer").output);
        let own = listed["data"]["quotes"].as_array().expect("quote list");
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|quote| quote["customer_id"] == "jane.customer@company.com"));
        assert_eq!(listed["data"]["dashboard"]["my_quotes"], 2);

        let agent = parse_payload(&quotes::run("agent").output);
        assert_eq!(agent["data"]["dashboard"], Value::Null);
    });
}

#[test]
fn invalid_report_window_is_rejected_before_connecting() {
    with_env(&[("QUOTEDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = report::run("fortnight");
        assert_eq!(result.exit_code, 6);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_input");
    });
}

fn database_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}", dir.path().join("quotedesk.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "QUOTEDESK_DATABASE_URL",
        "QUOTEDESK_DATABASE_MAX_CONNECTIONS",
        "QUOTEDESK_DATABASE_TIMEOUT_SECS",
        "QUOTEDESK_PRICING_BUFFER_PERCENTAGE",
        "QUOTEDESK_PRICING_DEFAULT_MARKUP_PERCENTAGE",
        "QUOTEDESK_PRICING_DEFAULT_EXCHANGE_RATE",
        "QUOTEDESK_PRICING_DEFAULT_CURRENCY",
        "QUOTEDESK_REPORTING_TOP_N",
        "QUOTEDESK_REPORTING_PROFIT_BASIS",
        "QUOTEDESK_LOGGING_LEVEL",
        "QUOTEDESK_LOGGING_FORMAT",
        "QUOTEDESK_LOG_LEVEL",
        "QUOTEDESK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
