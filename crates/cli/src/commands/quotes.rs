use quotedesk_core::errors::ApplicationError;
use quotedesk_core::session::Role;
use serde_json::json;

use crate::commands::{
    application_failure, execute, open_desk, session_for, to_data, CommandResult, Failure,
};

/// Lists the quotes the role may see. Customers also get their dashboard.
pub fn run(role: &str) -> CommandResult {
    let role = match role.parse::<Role>() {
        Ok(role) => role,
        Err(error) => return CommandResult::failure("quotes", "invalid_input", error.to_string(), 6),
    };

    execute("quotes", |config| async move {
        let (pool, desk) = open_desk(&config).await?;
        let session = session_for(role)?;

        let listed = async {
            let quotes = desk.list_quotes(&session).await?;
            let dashboard = if session.is_customer() {
                Some(desk.customer_dashboard(&session).await?)
            } else {
                None
            };
            Ok::<_, ApplicationError>((quotes, dashboard))
        }
        .await
        .map_err(application_failure);
        pool.close().await;
        let (quotes, dashboard) = listed?;

        let message = format!("{} quote(s) visible to {}", quotes.len(), session.actor());
        let data = json!({
            "quotes": to_data(&quotes)?,
            "dashboard": to_data(&dashboard)?,
        });
        Ok::<_, Failure>(CommandResult::success_with_data("quotes", message, data))
    })
}
