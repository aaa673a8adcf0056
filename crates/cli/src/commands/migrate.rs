use quotedesk_db::migrations;

use crate::commands::{connect, execute, CommandResult, Failure};

pub fn run() -> CommandResult {
    execute("migrate", |config| async move {
        let pool = connect(&config).await?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| Failure::new("migration", error.to_string(), 5))?;
        pool.close().await;
        Ok::<_, Failure>(CommandResult::success("migrate", "applied pending migrations"))
    })
}
