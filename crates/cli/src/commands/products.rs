use quotedesk_core::session::Role;

use crate::commands::{
    application_failure, execute, open_desk, session_for, to_data, CommandResult, Failure,
};

/// Lists the catalog as the given role sees it.
pub fn run(role: &str, search: Option<String>) -> CommandResult {
    let role = match role.parse::<Role>() {
        Ok(role) => role,
        Err(error) => return CommandResult::failure("products", "invalid_input", error.to_string(), 6),
    };

    execute("products", |config| async move {
        let (pool, desk) = open_desk(&config).await?;
        let session = session_for(role)?;
        let views =
            desk.product_views(&session, search.as_deref()).await.map_err(application_failure);
        pool.close().await;
        let views = views?;

        let message = format!("{} product(s) visible to {role}", views.len());
        Ok::<_, Failure>(CommandResult::success_with_data("products", message, to_data(&views)?))
    })
}
