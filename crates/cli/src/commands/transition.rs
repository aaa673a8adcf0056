use quotedesk_core::domain::quote::{QuoteAction, QuoteId};
use quotedesk_core::session::Role;

use crate::commands::{
    application_failure, execute, open_desk, session_for, to_data, CommandResult, Failure,
};

pub fn run(quote_id: i64, action: &str) -> CommandResult {
    let action = match action.parse::<QuoteAction>() {
        Ok(action) => action,
        Err(error) => {
            return CommandResult::failure("transition", "invalid_input", error.to_string(), 6)
        }
    };

    execute("transition", |config| async move {
        let (pool, desk) = open_desk(&config).await?;
        let agent = session_for(Role::Agent)?;
        let quote = desk
            .transition_quote(&agent, QuoteId(quote_id), action)
            .await
            .map_err(application_failure);
        pool.close().await;
        let quote = quote?;

        let message = format!("quote {} is now {}", quote.id, quote.status);
        Ok::<_, Failure>(CommandResult::success_with_data("transition", message, to_data(&quote)?))
    })
}
