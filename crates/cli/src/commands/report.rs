use chrono::Utc;
use quotedesk_core::reporting::ReportWindow;
use quotedesk_core::session::Role;

use crate::commands::{
    application_failure, execute, open_desk, session_for, to_data, CommandResult, Failure,
};

pub fn run(window: &str) -> CommandResult {
    let window = match window.parse::<ReportWindow>() {
        Ok(window) => window,
        Err(error) => return CommandResult::failure("report", "invalid_input", error.to_string(), 6),
    };

    execute("report", |config| async move {
        let (pool, desk) = open_desk(&config).await?;
        let agent = session_for(Role::Agent)?;
        let report = desk.report(&agent, window, Utc::now()).await.map_err(application_failure);
        pool.close().await;
        let report = report?;

        let message = format!(
            "{window} report: {} quotes, acceptance rate {}%",
            report.total_quotes,
            report.acceptance_rate.round_dp(2)
        );
        Ok::<_, Failure>(CommandResult::success_with_data("report", message, to_data(&report)?))
    })
}
