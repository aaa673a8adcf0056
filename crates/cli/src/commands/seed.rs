use quotedesk_core::session::Role;
use quotedesk_db::DemoSeedDataset;

use crate::commands::{execute, open_desk, session_for, CommandResult, Failure};

pub fn run() -> CommandResult {
    execute("seed", |config| async move {
        let (pool, desk) = open_desk(&config).await?;
        let agent = session_for(Role::Agent)?;

        let seed_result = DemoSeedDataset::load(&desk, &agent)
            .await
            .map_err(|error| Failure::new("seed_execution", error.to_string(), 5))?;
        if !seed_result.seeded {
            pool.close().await;
            return Ok(CommandResult::success(
                "seed",
                "catalog already populated; demo dataset left unchanged",
            ));
        }

        let verification = DemoSeedDataset::verify(&desk, &agent)
            .await
            .map_err(|error| Failure::new("seed_verification", error.to_string(), 5))?;
        pool.close().await;

        if !verification.all_present {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
                .collect::<Vec<_>>();
            let message = verification_message(&failed_checks);
            return Err(Failure::new("seed_verification", message, 5));
        }

        let message = format!(
            "demo dataset loaded: {} products, {} quotes",
            seed_result.products_seeded, seed_result.quotes_seeded
        );
        Ok::<_, Failure>(CommandResult::success("seed", message))
    })
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
